use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

/// LessonForge CLI - check outlines and lesson sources offline
#[derive(Parser)]
#[command(name = "lessonforge", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the admission filter on an outline
    Admit {
        /// Outline text
        outline: String,
    },

    /// Statically validate a TSX lesson file
    Validate {
        file: PathBuf,
    },

    /// Compile a TSX lesson file to JavaScript
    Compile {
        file: PathBuf,

        /// Emit the sandboxed host page instead of bare JavaScript
        #[arg(long)]
        sandbox: bool,

        /// Write output here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let fallback = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();

    let passed = match cli.command {
        Commands::Admit { outline } => commands::admit(&outline, cli.json)?,
        Commands::Validate { file } => commands::validate(&file, cli.json)?,
        Commands::Compile {
            file,
            sandbox,
            output,
        } => commands::compile(
            &file,
            commands::CompileOptions {
                sandbox,
                output,
                json: cli.json,
            },
        )?,
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
