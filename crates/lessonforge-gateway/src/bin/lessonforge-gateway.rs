//! LessonForge Gateway Binary
//!
//! # Usage
//! ```bash
//! lessonforge-gateway [--config gateway.json] [--port 8787] [--host 127.0.0.1] [--verbose]
//! ```

use clap::Parser;
use lessonforge_gateway::{Gateway, GatewayConfig};
use tracing_subscriber::EnvFilter;

/// LessonForge Gateway - interactive lessons from an outline
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Keep lessons in memory instead of SQLite
    #[arg(long)]
    in_memory: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    // Initialize logging
    let fallback = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(args.verbose)
        .init();

    let mut config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if args.in_memory {
        config = config.with_database_path(None);
    }

    print_banner(&config);

    let gateway = Gateway::from_config(config)?;
    gateway.start().await?;

    Ok(())
}

fn print_banner(config: &GatewayConfig) {
    let base = format!("http://{}:{}", config.server.host, config.server.port);
    println!();
    println!("LessonForge gateway v{}", lessonforge_gateway::VERSION);
    println!("   ├─ model    {}", config.generator.model);
    println!(
        "   ├─ storage  {}",
        config.storage.database_path.as_deref().unwrap_or("in-memory")
    );
    println!("   └─ listen   {}", base);
    println!();
    println!("HTTP Endpoints");
    println!("   ├─ POST {}/api/lessons      generate a lesson", base);
    println!("   ├─ GET  {}/api/lessons      list lessons", base);
    println!("   ├─ GET  {}/api/lessons/:id  lesson record", base);
    println!("   ├─ POST {}/api/compile      compile TSX", base);
    println!("   ├─ GET  {}/lessons/:id      sandboxed lesson", base);
    println!("   └─ GET  {}/health           health check", base);
    println!();
    println!("Press Ctrl+C to stop the gateway");
    println!();
}
