//! gemrelay -- OpenAI-style chat against the Cloud Code Gemini backend.
//!
//! Sends one prompt and prints either the normalized chunk stream (one JSON
//! object per line) or the aggregated OpenAI chat completion.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use gemrelay::auth::StaticCredentials;
use gemrelay::config::Config;
use gemrelay::providers::gemini::GeminiProvider;
use gemrelay::providers::types::{ChatMessage, ChatRequest};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";

// ---------------------------------------------------------------------------
// CLI argument parsing (minimal, no clap dependency)
// ---------------------------------------------------------------------------

struct CliArgs {
    config_path: PathBuf,
    model: String,
    stream: bool,
    prompt: String,
}

fn parse_args() -> CliArgs {
    let mut args = std::env::args().skip(1);
    let mut config_path = PathBuf::from("gemrelay.toml");
    let mut model = DEFAULT_MODEL.to_string();
    let mut stream = true;
    let mut prompt = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(path) => config_path = PathBuf::from(path),
                None => fail("--config requires a path argument"),
            },
            "--model" | "-m" => match args.next() {
                Some(m) => model = m,
                None => fail("--model requires a model id"),
            },
            "--no-stream" => stream = false,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("gemrelay {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown argument: {other}");
                eprintln!("Run with --help for usage information.");
                std::process::exit(1);
            }
            word => prompt.push(word.to_string()),
        }
    }

    if prompt.is_empty() {
        fail("a prompt is required");
    }

    CliArgs {
        config_path,
        model,
        stream,
        prompt: prompt.join(" "),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {message}");
    eprintln!("Run with --help for usage information.");
    std::process::exit(1);
}

fn print_usage() {
    println!(
        "\
gemrelay {version} -- OpenAI-compatible chat over Cloud Code

USAGE:
    gemrelay [OPTIONS] <PROMPT>...

OPTIONS:
    -c, --config <PATH>    Path to configuration file [default: gemrelay.toml]
    -m, --model <ID>       Model id [default: {model}]
        --no-stream        Print one aggregated chat completion
    -h, --help             Print this help message
    -V, --version          Print version information

ENVIRONMENT:
    RUST_LOG               Override log level (e.g. RUST_LOG=debug)
    GEMRELAY_CONFIG        Alternative to --config flag
    GEMRELAY_ACCESS_TOKEN  OAuth access token for the backend
",
        version = env!("CARGO_PKG_VERSION"),
        model = DEFAULT_MODEL,
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?
        .block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let cli = parse_args();

    let config_path = std::env::var("GEMRELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or(cli.config_path);
    let config = Config::load(&config_path)?;

    init_tracing(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        model = %cli.model,
        overrides = config.env_overrides.all().len(),
        "Starting gemrelay"
    );

    let token = config
        .auth
        .access_token
        .clone()
        .context("No access token: set auth.access_token or GEMRELAY_ACCESS_TOKEN")?;
    let provider = GeminiProvider::from_config(&config, Arc::new(StaticCredentials::new(token)))?;

    let mut request = ChatRequest::new(cli.model, vec![ChatMessage::user(cli.prompt)]);
    request.stream = cli.stream;

    tokio::select! {
        result = run(&provider, &request) => result,
        _ = signal::ctrl_c() => {
            tracing::info!("Interrupted");
            Ok(())
        }
    }
}

async fn run(provider: &GeminiProvider, request: &ChatRequest) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();

    if !request.stream {
        let response = provider.chat(request).await?;
        writeln!(stdout, "{}", serde_json::to_string_pretty(&response)?)?;
        return Ok(());
    }

    let mut stream = provider.stream_chat(request)?;
    while let Some(chunk) = stream.next().await {
        writeln!(stdout, "{}", serde_json::to_string(&chunk?)?)?;
        stdout.flush()?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

fn init_tracing(config: &Config) {
    // RUST_LOG env var takes precedence over config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("gemrelay={level},warn"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
