//! `ollama-probe`: time and inspect generations from a local Ollama server.
//!
//! Run with: `cargo run -p probe-cli -- generate --stream "What is Python?"`

mod args;
mod report;

use std::io::Write;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use futures::StreamExt;
use probe_stream::{GenerateError, Ollama, ReadEvent, StreamResult};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use args::{Cli, Commands, is_exit_command, options};
use report::{
    ChatSession, RunOutcome, describe, error_report, footer, format_stats, format_summary,
    preview, summarize,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let client = cli.client();
    tracing::debug!(url = %client.generate_url(), model = client.model_name(), "client configured");

    match cli.command {
        Commands::Generate {
            prompt,
            stream,
            temperature,
        } => generate(&client, &prompt, stream, temperature).await,
        Commands::Repeat {
            prompt,
            count,
            temperature,
            delay_ms,
        } => {
            repeat(&client, &prompt, count, temperature, delay_ms).await;
            ExitCode::SUCCESS
        }
        Commands::Chat { temperature } => chat(&client, temperature).await,
    }
}

async fn generate(
    client: &Ollama,
    prompt: &str,
    stream: bool,
    temperature: Option<f64>,
) -> ExitCode {
    println!("prompt: {prompt}\n");
    let start = Instant::now();

    let outcome = if stream {
        stream_to_stdout(client, prompt, temperature).await
    } else {
        let result = client.generate(prompt, options(temperature)).await;
        if let Ok(r) = &result {
            println!("{}", r.full_text);
        }
        result
    };
    let elapsed = start.elapsed();

    let err = match outcome {
        Ok(result) => {
            println!("\n{}", footer(&result, elapsed));
            return ExitCode::SUCCESS;
        }
        Err(err) => err,
    };

    let report = error_report(&err, stream, elapsed);
    if let Some(partial) = &report.partial {
        println!("{partial}");
    }
    if let Some(footer) = &report.footer {
        println!("\n{footer}");
    }
    eprintln!("{}", report.diagnostic);

    if report.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Print fragments as they arrive; the returned text is already on stdout.
///
/// A body that ends without a final chunk yields `IncompleteStream` carrying
/// everything printed so far.
async fn stream_to_stdout(
    client: &Ollama,
    prompt: &str,
    temperature: Option<f64>,
) -> Result<StreamResult, GenerateError> {
    let mut events = client
        .stream_incremental(prompt, options(temperature))
        .await?;
    let mut stdout = std::io::stdout();
    let mut shown = String::new();

    let outcome = loop {
        match events.next().await {
            Some(Ok(ReadEvent::Fragment(text))) => {
                print!("{text}");
                let _ = stdout.flush();
                shown.push_str(&text);
            }
            Some(Ok(ReadEvent::Done(result))) => break Ok(result),
            Some(Err(err)) => break Err(err),
            None => {
                break Err(GenerateError::IncompleteStream {
                    partial: std::mem::take(&mut shown),
                });
            }
        }
    };

    println!();
    outcome
}

async fn repeat(
    client: &Ollama,
    prompt: &str,
    count: usize,
    temperature: Option<f64>,
    delay_ms: u64,
) {
    println!("prompt: {prompt}");
    println!("model: {} ({count} runs)\n", client.model_name());

    let mut outcomes = Vec::with_capacity(count);
    for run in 1..=count {
        let start = Instant::now();
        let result = client.generate(prompt, options(temperature)).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(r) => println!(
                "run {run}: {:.2}s, {} tokens: {}",
                elapsed.as_secs_f64(),
                r.eval_count.map_or_else(|| "N/A".to_string(), |c| c.to_string()),
                preview(&r.full_text, 50),
            ),
            Err(err) => println!("run {run}: {:.2}s, {}", elapsed.as_secs_f64(), describe(err)),
        }

        outcomes.push(RunOutcome {
            elapsed,
            result: result.map_err(|e| e.to_string()),
        });

        if run < count && delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    println!("\n{}", format_summary(&summarize(&outcomes)));
}

/// Read prompts line by line and stream each answer until an exit word,
/// end of input or Ctrl-C.
async fn chat(client: &Ollama, temperature: Option<f64>) -> ExitCode {
    println!(
        "chatting with {} (quit, exit or q to leave)",
        client.model_name()
    );

    let started = Instant::now();
    let mut session = ChatSession::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut code = ExitCode::SUCCESS;

    loop {
        print!("\n> ");
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let prompt = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                println!();
                break;
            }
            Err(err) => {
                eprintln!("error: reading stdin: {err}");
                code = ExitCode::FAILURE;
                break;
            }
        };

        let prompt = prompt.trim();
        if prompt.is_empty() {
            continue;
        }
        if is_exit_command(prompt) {
            break;
        }

        session.record_prompt();
        let start = Instant::now();
        let answer = tokio::select! {
            answer = stream_to_stdout(client, prompt, temperature) => answer,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let elapsed = start.elapsed();

        match answer {
            Ok(result) => {
                session.record_answer(&result);
                println!("({:.2}s)", elapsed.as_secs_f64());
            }
            Err(err) => {
                eprintln!("{}", error_report(&err, true, elapsed).diagnostic);
                if let Ok(partial) = err.recover() {
                    session.record_answer(&partial);
                }
            }
        }
    }

    println!("\n{}", format_stats(&session, started.elapsed()));
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_stream(server: &MockServer, lines: &[serde_json::Value]) {
        let body: String = lines.iter().map(|l| format!("{l}\n")).collect();
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "application/x-ndjson"),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn stream_without_final_chunk_keeps_shown_text() {
        let server = MockServer::start().await;
        mount_stream(
            &server,
            &[
                serde_json::json!({"response": "Hel", "done": false}),
                serde_json::json!({"response": "lo", "done": false}),
            ],
        )
        .await;

        let client = Ollama::new().base_url(server.uri());
        let err = stream_to_stdout(&client, "hi", None).await.unwrap_err();
        assert!(err.is_recoverable(), "expected IncompleteStream, got: {err:?}");
        assert_eq!(err.partial_text(), Some("Hello"));
        assert_eq!(err.recover().unwrap().full_text, "Hello");
    }

    #[tokio::test]
    async fn stream_with_final_chunk_returns_metadata() {
        let server = MockServer::start().await;
        mount_stream(
            &server,
            &[
                serde_json::json!({"response": "Hi", "done": false}),
                serde_json::json!({"response": "", "done": true, "eval_count": 1}),
            ],
        )
        .await;

        let client = Ollama::new().base_url(server.uri());
        let result = stream_to_stdout(&client, "hi", Some(0.0)).await.unwrap();
        assert_eq!(result.full_text, "Hi");
        assert_eq!(result.eval_count, Some(1));
    }
}
