//! Streaming example: print fragments from a local Ollama as they arrive.
//!
//! Make sure Ollama is running locally and run:
//!   cargo run --example streaming -p probe-stream

use futures::StreamExt;
use probe_stream::{GenerateOptions, Ollama, ReadEvent};
use std::io::Write;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Ollama::new();

    let mut events = client
        .stream_incremental(
            "Explain machine learning in one sentence.",
            GenerateOptions::default(),
        )
        .await?;

    print!("Streaming: ");
    std::io::stdout().flush()?;

    while let Some(event) = events.next().await {
        match event {
            Ok(ReadEvent::Fragment(text)) => {
                print!("{text}");
                std::io::stdout().flush()?;
            }
            Ok(ReadEvent::Done(result)) => {
                println!();
                println!(
                    "Tokens: {:?} generated, {:?} tokens/sec",
                    result.eval_count,
                    result.tokens_per_second()
                );
            }
            Err(err) => {
                eprintln!("\nStream error ({}): {err}", err.kind());
                if let Some(partial) = err.partial_text() {
                    eprintln!("Received so far: {partial}");
                }
            }
        }
    }

    Ok(())
}
