use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    SubtopicOf,
    RelatedTo,
    PartOf,
    DependsOn,
    Precedes,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubtopicOf => "subtopic_of",
            Self::RelatedTo => "related_to",
            Self::PartOf => "part_of",
            Self::DependsOn => "depends_on",
            Self::Precedes => "precedes",
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EdgeType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subtopic_of" => Ok(Self::SubtopicOf),
            "related_to" => Ok(Self::RelatedTo),
            "part_of" => Ok(Self::PartOf),
            "depends_on" => Ok(Self::DependsOn),
            "precedes" => Ok(Self::Precedes),
            _ => Err(format!("Unknown edge type: {}", s)),
        }
    }
}

/// Directed, typed, weighted edge between two nodes of the same user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEdge {
    #[serde(default = "crate::id_gen::edge_id")]
    pub id: String,
    pub user_id: String,
    pub source_id: String,
    pub target_id: String,
    pub edge_type: EdgeType,
    /// In [0,1]; multiplies the decayed score on traversal.
    pub weight: f64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "crate::time_utils::now")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_type_parse() {
        assert_eq!("subtopic_of".parse::<EdgeType>().unwrap(), EdgeType::SubtopicOf);
        assert_eq!(EdgeType::DependsOn.to_string(), "depends_on");
        assert!("SubtopicOf".parse::<EdgeType>().is_err());
    }
}
