use std::time::Duration;

use clap::{Parser, Subcommand};
use probe_stream::{GenerateOptions, Ollama};

#[derive(Parser, Debug)]
#[command(name = "ollama-probe")]
#[command(about = "Send prompts to a local Ollama server and time the answers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Ollama base URL
    #[arg(long, env = "OLLAMA_HOST", default_value = probe_stream::client::DEFAULT_BASE_URL, global = true)]
    pub host: String,

    /// Model to query
    #[arg(short, long, env = "OLLAMA_MODEL", default_value = probe_stream::client::DEFAULT_MODEL, global = true)]
    pub model: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 120, global = true)]
    pub timeout: u64,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Send one prompt and print the answer with timing metrics
    Generate {
        /// The prompt text
        prompt: String,

        /// Print fragments as they arrive
        #[arg(long)]
        stream: bool,

        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f64>,
    },

    /// Send the same prompt several times and compare latency and answers
    Repeat {
        /// The prompt text
        prompt: String,

        /// Number of runs
        #[arg(short = 'n', long, default_value_t = 3)]
        count: usize,

        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f64>,

        /// Pause between runs, in milliseconds
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
    },

    /// Read prompts from stdin and stream each answer
    Chat {
        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f64>,
    },
}

impl Cli {
    /// Client configured from the global flags.
    pub fn client(&self) -> Ollama {
        Ollama::new()
            .base_url(&self.host)
            .model(&self.model)
            .timeout(Duration::from_secs(self.timeout))
    }

    /// Default log filter for the `-v` count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Request options for the `--temperature` flag; empty when it is unset.
pub fn options(temperature: Option<f64>) -> GenerateOptions {
    GenerateOptions {
        temperature,
        ..Default::default()
    }
}

/// Whether a chat input line ends the session (`quit`, `exit` or `q`).
pub fn is_exit_command(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "quit" | "exit" | "q")
}
