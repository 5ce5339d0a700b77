mod cli;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use graph_recall::memory::MemoryType;
use graph_recall::node::NodeType;
use graph_recall::retrieval::StrategyKind;
use graph_recall::storage::path_utils;

use cli::search::SearchMode;

#[derive(Parser)]
#[command(name = "graph-recall", version, about = "Graph Recall — graph-guided memory retrieval")]
struct App {
    /// Database path (defaults to the data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or migrate the database
    Init,
    /// Load a JSON graph snapshot (nodes, edges, memories, associations)
    Import {
        file: PathBuf,
        /// Compute missing embeddings with the configured embedder
        #[arg(long)]
        embed: bool,
    },
    /// Top-level search (hybrid RRF, hierarchical, or graph-guided)
    Search {
        query: String,
        #[arg(long)]
        user: String,
        #[arg(long, value_enum, default_value = "hybrid")]
        mode: SearchMode,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        memory_type: Option<MemoryType>,
        /// Metadata equality filter, key=value (repeatable)
        #[arg(long = "filter")]
        filters: Vec<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Route a query to a strategy and run it
    Route {
        query: String,
        #[arg(long)]
        user: String,
        /// Skip classification and use this strategy
        #[arg(long)]
        strategy: Option<StrategyKind>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        memory_type: Option<MemoryType>,
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,
        #[arg(long)]
        match_all: bool,
        /// Relative window like "3 days"
        #[arg(long)]
        since: Option<String>,
        /// Root memory id for the graph strategy
        #[arg(long)]
        root: Option<String>,
        /// Hybrid weights, strategy=weight (comma separated)
        #[arg(long, value_delimiter = ',')]
        weights: Vec<String>,
        #[arg(long)]
        no_classifier: bool,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Show the nodes the Node Locator picks for a query
    Nodes {
        query: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long = "node-type", value_delimiter = ',')]
        node_types: Vec<NodeType>,
        /// Name matching instead of embeddings
        #[arg(long)]
        text: bool,
    },
    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Display the effective configuration
    Show,
    /// Get a config value (dot notation: graph.decay_factor)
    Get { key: String },
}

fn main() {
    let app = App::parse();

    if app.verbose {
        graph_recall::tracing_init::init_stderr_tracing();
    } else {
        graph_recall::tracing_init::init_file_tracing(&path_utils::log_path());
    }

    let db = app.db.as_deref();
    let result = match app.command {
        Commands::Init => cli::init::run(db),
        Commands::Import { file, embed } => cli::import::run(&file, db, embed),
        Commands::Search { query, user, mode, limit, memory_type, filters, timeout_secs } => {
            cli::parse_filters(&filters).and_then(|filters| {
                cli::search::run(cli::search::SearchArgs {
                    query: &query,
                    user: &user,
                    mode,
                    limit,
                    memory_type,
                    filters,
                    db,
                    timeout_secs,
                })
            })
        }
        Commands::Route {
            query,
            user,
            strategy,
            limit,
            memory_type,
            keywords,
            categories,
            match_all,
            since,
            root,
            weights,
            no_classifier,
            timeout_secs,
        } => cli::route::run(cli::route::RouteArgs {
            query: &query,
            user: &user,
            strategy,
            limit,
            memory_type,
            keywords,
            categories,
            match_all,
            since,
            root,
            weights,
            no_classifier,
            db,
            timeout_secs,
        }),
        Commands::Nodes { query, user, top_k, node_types, text } => {
            cli::nodes::run(&query, &user, top_k, node_types, text, db)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::config::run_show(),
            ConfigAction::Get { key } => cli::config::run_get(&key),
        },
    };

    if let Err(e) = result {
        tracing::error!(error = %format!("{:#}", e), "Command failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
