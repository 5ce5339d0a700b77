//! LLM Subprocess — calls the `claude` CLI for query classification.
//!
//! Retry: `max_retries` extra attempts after the first failure.
//! Each attempt is bounded by `timeout` and by the caller's cancel token;
//! the child process is killed when either fires.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::{RecallError, RecallResult};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Call claude CLI with a specific model and return the response text.
pub fn call_claude_with_model(
    prompt: &str,
    model: &str,
    timeout: Duration,
    max_retries: u32,
    cancel: &CancelToken,
) -> RecallResult<String> {
    tracing::info!(model = %model, prompt_len = prompt.len(), "LLM subprocess call starting");
    let mut last_err = None;

    for attempt in 0..=max_retries {
        cancel.check()?;
        match execute_claude(prompt, model, timeout, cancel) {
            Ok(response) => return Ok(response),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    "Claude subprocess attempt {}/{} failed: {}",
                    attempt + 1,
                    max_retries + 1,
                    e
                );
                last_err = Some(e);
            }
        }
    }

    tracing::error!(model = %model, "LLM subprocess: all retries exhausted");
    Err(last_err.unwrap_or_else(|| RecallError::Provider("All retries failed".into())))
}

fn execute_claude(
    prompt: &str,
    model: &str,
    timeout: Duration,
    cancel: &CancelToken,
) -> RecallResult<String> {
    let mut child = Command::new("claude")
        .args(["--model", model, "-p", prompt])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            RecallError::Provider(format!(
                "Failed to spawn claude subprocess: {}. Is `claude` CLI installed?",
                e
            ))
        })?;

    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|e| RecallError::Provider(format!("Claude subprocess wait failed: {}", e)))?
        {
            break status;
        }
        if let Err(e) = cancel.check() {
            kill(&mut child);
            return Err(e);
        }
        if started.elapsed() >= timeout {
            kill(&mut child);
            return Err(RecallError::Provider(format!(
                "Claude subprocess timed out after {}s",
                timeout.as_secs()
            )));
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    if !status.success() {
        return Err(RecallError::Provider(format!(
            "Claude subprocess failed (exit {}): {}",
            status, stderr
        )));
    }

    if stdout.trim().is_empty() {
        return Err(RecallError::Provider("Claude returned empty response".into()));
    }

    Ok(stdout)
}

/// Read a child pipe to completion on a helper thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe {
            let _ = p.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!(error = %e, "Claude subprocess already exited");
    }
    let _ = child.wait();
}

/// Check if claude CLI is available on PATH.
pub fn is_claude_available() -> bool {
    Command::new("claude")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_before_spawn() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = call_claude_with_model("hi", "haiku", Duration::from_secs(1), 3, &cancel).unwrap_err();
        assert!(matches!(err, RecallError::Cancelled));
    }
}
