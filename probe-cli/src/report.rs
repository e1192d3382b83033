//! Plain-text metrics for generate runs and chat sessions.

use std::time::Duration;

use probe_stream::{GenerateError, StreamResult};

/// Outcome of one timed request.
#[derive(Debug)]
pub struct RunOutcome {
    /// Wall time from sending the request to the final byte.
    pub elapsed: Duration,
    /// The answer, or the error message for a failed run.
    pub result: Result<StreamResult, String>,
}

/// Aggregate over a series of runs of the same prompt.
#[derive(Debug, PartialEq)]
pub struct Summary {
    /// Number of runs attempted.
    pub runs: usize,
    /// Runs that ended in an error.
    pub failures: usize,
    /// Fastest successful run.
    pub min: Option<Duration>,
    /// Mean latency of successful runs.
    pub mean: Option<Duration>,
    /// Slowest successful run.
    pub max: Option<Duration>,
    /// Every run succeeded and all answers match after trimming.
    pub all_identical: bool,
}

/// Aggregate `outcomes`. Latency figures cover successful runs only and are
/// `None` when every run failed.
pub fn summarize(outcomes: &[RunOutcome]) -> Summary {
    let ok: Vec<(&Duration, &StreamResult)> = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok().map(|r| (&o.elapsed, r)))
        .collect();

    let latencies: Vec<Duration> = ok.iter().map(|(d, _)| **d).collect();
    let mean = (!latencies.is_empty())
        .then(|| latencies.iter().sum::<Duration>() / latencies.len() as u32);

    let failures = outcomes.len() - ok.len();
    let all_identical = failures == 0
        && ok
            .first()
            .is_some_and(|(_, first)| ok.iter().all(|(_, r)| r.full_text.trim() == first.full_text.trim()));

    Summary {
        runs: outcomes.len(),
        failures,
        min: latencies.iter().min().copied(),
        mean,
        max: latencies.iter().max().copied(),
        all_identical,
    }
}

/// First `max_chars` characters of `text`, with `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Metrics lines printed after an answer.
pub fn footer(result: &StreamResult, elapsed: Duration) -> String {
    let mut lines = vec![format!("elapsed: {:.2}s", elapsed.as_secs_f64())];
    lines.push(format!("tokens generated: {}", count_or_na(result.eval_count)));
    lines.push(format!("prompt tokens: {}", count_or_na(result.prompt_eval_count)));
    if let Some(tps) = result.tokens_per_second() {
        lines.push(format!("throughput: {tps:.2} tokens/sec"));
    }
    if let Some(load) = result.load_duration_nanos {
        lines.push(format!("model load: {:.2}s", load as f64 / 1e9));
    }
    lines.join("\n")
}

fn count_or_na(count: Option<u64>) -> String {
    count.map_or_else(|| "N/A".to_string(), |c| c.to_string())
}

/// Render a [`Summary`] as the block printed after `repeat`.
pub fn format_summary(summary: &Summary) -> String {
    let secs = |d: Option<Duration>| d.map_or_else(|| "N/A".to_string(), |d| format!("{:.2}s", d.as_secs_f64()));
    format!(
        "runs: {} ({} failed)\nlatency min/mean/max: {} / {} / {}\nall identical: {}",
        summary.runs,
        summary.failures,
        secs(summary.min),
        secs(summary.mean),
        secs(summary.max),
        if summary.all_identical { "yes" } else { "no" },
    )
}

/// One-line `Kind: detail` description of a generate error.
pub fn describe(err: &GenerateError) -> String {
    match err {
        // Display for this kind repeats the kind name; show the cause instead.
        GenerateError::TransportError(source) => format!("{}: {source}", err.kind()),
        _ => format!("{}: {err}", err.kind()),
    }
}

/// What to show for a failed `generate` and whether the run counts as failed.
#[derive(Debug, PartialEq)]
pub struct ErrorReport {
    /// Partial answer for stdout, when it is not already on screen.
    pub partial: Option<String>,
    /// Metrics footer for stdout, when the answer is usable.
    pub footer: Option<String>,
    /// One-line diagnostic for stderr.
    pub diagnostic: String,
    /// Whether the process exits non-zero.
    pub failed: bool,
}

/// Decide the output for `err`. `streamed` means fragments were already
/// printed as they arrived.
///
/// `IncompleteStream` keeps the partial answer as a text-only result and is
/// only a warning. Every other kind fails the run.
pub fn error_report(err: &GenerateError, streamed: bool, elapsed: Duration) -> ErrorReport {
    let partial = err
        .partial_text()
        .filter(|p| !streamed && !p.is_empty())
        .map(str::to_string);

    match err {
        GenerateError::IncompleteStream { partial: text } => ErrorReport {
            partial,
            footer: Some(footer(&StreamResult::text_only(text.as_str()), elapsed)),
            diagnostic: format!("warning: {}", describe(err)),
            failed: false,
        },
        _ => ErrorReport {
            partial,
            footer: None,
            diagnostic: format!("error: {}", describe(err)),
            failed: true,
        },
    }
}

/// Running totals for an interactive chat.
#[derive(Debug, Default, PartialEq)]
pub struct ChatSession {
    /// Prompts sent plus non-empty answers received.
    pub messages: usize,
    /// Sum of `eval_count` over the answers that reported one.
    pub total_tokens: u64,
}

impl ChatSession {
    /// Count a prompt sent to the model.
    pub fn record_prompt(&mut self) {
        self.messages += 1;
    }

    /// Count an answer. Empty answers are not messages.
    pub fn record_answer(&mut self, answer: &StreamResult) {
        if answer.full_text.trim().is_empty() {
            return;
        }
        self.messages += 1;
        self.total_tokens += answer.eval_count.unwrap_or(0);
    }
}

/// Render session totals for a chat that lasted `duration`.
pub fn format_stats(session: &ChatSession, duration: Duration) -> String {
    let secs = duration.as_secs();
    let tokens = match session.total_tokens {
        0 => "N/A".to_string(),
        n => n.to_string(),
    };
    format!(
        "messages: {}\nsession time: {}m {}s\ntokens: {tokens}",
        session.messages,
        secs / 60,
        secs % 60,
    )
}
