use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

/// modelver: Work with versioned JSON documents from the command line.
///
/// Convert documents between versions, inspect their version tag, and check
/// a model definition file.
#[derive(Parser)]
#[command(name = "modelver", version, about, long_about = None)]
struct Cli {
    /// Log conversion decisions.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a document at any known version and write it at another.
    Convert {
        /// Path to the model definition (TOML).
        model: String,

        /// JSON document to read. Reads stdin when omitted.
        input: Option<String>,

        /// Version to write. Defaults to the model's own resolution.
        #[arg(long)]
        to: Option<String>,

        /// Pretty-print the output.
        #[arg(long)]
        pretty: bool,
    },

    /// Show the version of a document and what reading it would do.
    Inspect {
        /// Path to the model definition (TOML).
        model: String,

        /// JSON document to read. Reads stdin when omitted.
        input: Option<String>,
    },

    /// Validate a model definition and its rule chains.
    Check {
        /// Path to the model definition (TOML).
        model: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::Convert {
            model,
            input,
            to,
            pretty,
        } => commands::convert(&model, input.as_deref(), to.as_deref(), pretty),
        Commands::Inspect { model, input } => commands::inspect(&model, input.as_deref()),
        Commands::Check { model } => commands::check(&model),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "modelver=debug,model_versioning=debug"
    } else {
        "modelver=info,model_versioning=warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
