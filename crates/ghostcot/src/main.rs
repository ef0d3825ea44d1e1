//! Ask a model a question and print its reasoning and answer separately.
//!
//! Reads the API key from the `OPENAI_API_KEY` environment variable and an
//! optional endpoint from `OPENAI_BASE_URL`.
//!
//! # Examples
//!
//! ```sh
//! # Streamed reasoning, then the answer
//! ghostcot --user "2 + π ≈ ?"
//!
//! # One complete response, split afterwards
//! ghostcot --user "2 + π ≈ ?" --no-stream
//!
//! # Custom tags and a local server
//! OPENAI_BASE_URL=http://localhost:8000/v1 ghostcot \
//!   --model qwen2.5-7b-instruct --start-tag "<reason>" --end-tag "</reason>" \
//!   --user "Is 221 prime?"
//!
//! # Pipe content from stdin
//! cat problem.md | ghostcot --system "You are a careful tutor." --stdin
//! ```

use std::io::{self, Read, Write};
use std::process;

use clap::Parser;
use futures::StreamExt;
use ghostcot::api::OpenAiClient;
use ghostcot::config::CotConfig;
use ghostcot::splitter::OutputFragment;
use ghostcot::transport::CotChat;
use ghostcot::{DEFAULT_END_TAG, DEFAULT_START_TAG, Message};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const RULE: &str = "------------------------------------------------------------";

/// Ask a model a question and print its reasoning and answer separately.
///
/// Reads the API key from the OPENAI_API_KEY environment variable.
#[derive(Parser)]
#[command(name = "ghostcot")]
struct Cli {
    // ── Message content ────────────────────────────────────────
    /// User message to send
    #[arg(long)]
    user: Option<String>,

    /// Read user content from stdin
    #[arg(long)]
    stdin: bool,

    /// System prompt (the tag instruction is appended to it)
    #[arg(long)]
    system: Option<String>,

    // ── Transport ──────────────────────────────────────────────
    /// Model to use
    #[arg(long, default_value = ghostcot::api::DEFAULT_MODEL)]
    model: String,

    /// API root of an OpenAI-compatible server (overrides OPENAI_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum tokens in the response
    #[arg(long)]
    max_tokens: Option<u32>,

    // ── Tags ───────────────────────────────────────────────────
    /// Tag opening the reasoning block
    #[arg(long, default_value = DEFAULT_START_TAG)]
    start_tag: String,

    /// Tag closing the reasoning block
    #[arg(long, default_value = DEFAULT_END_TAG)]
    end_tag: String,

    /// Custom instruction instead of the generated one
    #[arg(long)]
    instruction: Option<String>,

    // ── Output mode ────────────────────────────────────────────
    /// Wait for the complete response instead of streaming
    #[arg(long)]
    no_stream: bool,
}

// ── Helpers ────────────────────────────────────────────────────────

fn read_stdin_content() -> Result<String, String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    Ok(buf)
}

fn build_user_content(cli: &Cli) -> Result<String, String> {
    let stdin_text = if cli.stdin {
        Some(read_stdin_content()?)
    } else {
        None
    };

    match (&cli.user, stdin_text) {
        (Some(msg), Some(piped)) => Ok(format!("{msg}\n\n{piped}")),
        (Some(msg), None) => Ok(msg.clone()),
        (None, Some(piped)) => Ok(piped),
        (None, None) => Err("provide --user, --stdin, or both".to_string()),
    }
}

fn build_config(cli: &Cli) -> CotConfig {
    let config = CotConfig::default().with_tags(&cli.start_tag, &cli.end_tag);
    match &cli.instruction {
        Some(instruction) => config.with_instruction(instruction),
        None => config,
    }
}

fn build_client(cli: &Cli) -> Result<OpenAiClient, String> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| "OPENAI_API_KEY environment variable is not set".to_string())?;

    let mut client = OpenAiClient::new(api_key)
        .map_err(|e| format!("failed to build HTTP client: {e}"))?
        .with_model(&cli.model);
    if let Some(base_url) = cli
        .base_url
        .clone()
        .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
    {
        client = client.with_base_url(base_url);
    }
    if let Some(temperature) = cli.temperature {
        client = client.with_temperature(temperature);
    }
    if let Some(max_tokens) = cli.max_tokens {
        client = client.with_max_tokens(max_tokens);
    }
    Ok(client)
}

fn print_header(title: &str) {
    println!("{RULE}");
    println!("{title}");
    println!("{RULE}");
}

async fn run(cli: &Cli) -> Result<(), String> {
    let user_content = build_user_content(cli)?;
    let client = build_client(cli)?;
    let chat = CotChat::new(client, build_config(cli)).map_err(|e| e.to_string())?;

    let mut messages = Vec::new();
    if let Some(system) = &cli.system {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(user_content));

    if cli.no_stream {
        let completion = chat.chat(&messages).await.map_err(|e| e.to_string())?;
        print_header("Reasoning:");
        println!("{}", completion.reasoning);
        print_header("Answer:");
        println!("{}", completion.answer);
        return Ok(());
    }

    let mut stream = chat
        .chat_stream(&messages)
        .await
        .map_err(|e| e.to_string())?;

    print_header("Reasoning:");
    let mut answer_started = false;
    let mut stdout = io::stdout();
    while let Some(fragment) = stream.next().await {
        match fragment.map_err(|e| e.to_string())? {
            OutputFragment::Reasoning(text) => print!("{text}"),
            OutputFragment::Answer(text) => {
                if !answer_started {
                    println!();
                    print_header("Answer:");
                    answer_started = true;
                }
                print!("{text}");
            }
        }
        stdout
            .flush()
            .map_err(|e| format!("failed to write output: {e}"))?;
    }
    println!();
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
