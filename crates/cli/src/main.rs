//! swcache command-line entry point.
//!
//! Runs one engine operation against the configured cache database and
//! exits once every detached store has finished.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use swcache_client::{FetchClient, FetchConfig, resolve};
use swcache_core::{AppConfig, CachePolicyEngine, CacheStorage, Request, RequestMode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swcache", version, about = "Offline cache policy engine")]
struct Opts {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Precache the application shell and warm third-party assets
    Install,
    /// Delete every generation except the current one
    Activate,
    /// Route one request through the engine and print the response
    Fetch(FetchOpts),
    /// List generations, oldest first
    Generations,
}

#[derive(Parser)]
struct FetchOpts {
    /// Absolute URL, or a path relative to the configured origin
    url: String,

    /// HTTP method
    #[arg(long, default_value = "GET")]
    method: String,

    /// Send the request in navigate mode
    #[arg(long)]
    navigate: bool,

    /// Accept header to send
    #[arg(long)]
    accept: Option<String>,

    /// Print response headers before the body
    #[arg(short = 'i', long)]
    include: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    let config = AppConfig::load().context("failed to load configuration")?;
    let storage = CacheStorage::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;

    if let Cmd::Generations = opts.cmd {
        for name in storage.generation_names().await? {
            let marker = if name == config.version { "*" } else { " " };
            println!("{marker} {name}");
        }
        return Ok(());
    }

    let client = FetchClient::new(FetchConfig::from(&config))?;
    let engine = CachePolicyEngine::new(&config, storage, Arc::new(client))?;

    let result = run(&engine, opts.cmd).await;
    engine.settle().await;
    result
}

async fn run(engine: &CachePolicyEngine, cmd: Cmd) -> Result<()> {
    match cmd {
        Cmd::Install => {
            let report = engine.on_install().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Cmd::Activate => {
            let report = engine.on_activate().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Cmd::Fetch(opts) => fetch(engine, opts).await?,
        Cmd::Generations => {}
    }
    Ok(())
}

async fn fetch(engine: &CachePolicyEngine, opts: FetchOpts) -> Result<()> {
    let url = resolve(engine.origin(), &opts.url)?;
    let mut request = Request::new(&opts.method, url);
    if opts.navigate {
        request = request.with_mode(RequestMode::Navigate);
    }
    if let Some(accept) = opts.accept {
        request = request.with_header("Accept", accept);
    }

    let classification = engine.classify(&request);
    let response = engine.on_request(&request).await?;
    tracing::info!(
        url = %request.url,
        strategy = classification.strategy(),
        status = response.status,
        "request served"
    );

    let mut stdout = std::io::stdout().lock();
    if opts.include {
        writeln!(stdout, "{} ({})", response.status, classification.strategy())?;
        for (name, value) in &response.headers {
            writeln!(stdout, "{name}: {value}")?;
        }
        writeln!(stdout)?;
    }
    stdout.write_all(&response.body)?;
    stdout.flush()?;
    Ok(())
}
