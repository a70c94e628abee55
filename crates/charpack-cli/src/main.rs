mod commands;

use charpack_store::DigestAlgorithm;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_DEFINITION_ERROR, EXIT_FAILURE, EXIT_STORE_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "charpack",
    version,
    about = "Convert legacy character bundles into content-addressed asset packages"
)]
struct Cli {
    /// Path to the package store directory.
    #[arg(long, default_value = "~/.local/share/charpack")]
    store: String,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args)]
struct ConvertArgs {
    /// Shared assets installation. Auto-detected from the bundle's
    /// surroundings (a directory with a sounds/ subfolder) when omitted.
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Standard base manifest enabling dedup of sounds the runtime already
    /// ships. Without it every referenced sound is copied.
    #[arg(long)]
    base_manifest: Option<PathBuf>,

    /// Digest scheme addressing the package (crc32 or blake3).
    #[arg(long, default_value_t = DigestAlgorithm::Crc32)]
    digest: DigestAlgorithm,

    /// Fail when a preanimation has no [Time] entry instead of omitting
    /// the duration.
    #[arg(long, default_value_t = false)]
    strict_durations: bool,

    /// Directory for scoped conversion workspaces (defaults to the system
    /// temp directory).
    #[arg(long)]
    scratch: Option<PathBuf>,

    /// Author recorded in the package metadata.
    #[arg(long)]
    author: Option<String>,

    /// Free-text description recorded in the package metadata.
    #[arg(long)]
    description: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert a single character bundle.
    Convert {
        /// Character bundle directory (contains char.ini).
        char_dir: PathBuf,
        #[command(flatten)]
        args: ConvertArgs,
    },
    /// Convert every character bundle under a directory.
    ConvertAll {
        /// Directory whose subdirectories are character bundles.
        chars_dir: PathBuf,
        #[command(flatten)]
        args: ConvertArgs,
        /// Number of concurrent conversions.
        #[arg(long, default_value_t = charpack_core::DEFAULT_WORKERS)]
        jobs: usize,
    },
    /// List published packages.
    List,
    /// Print a published package's manifest.
    Inspect {
        /// Package digest (full or prefix, with or without the algorithm).
        digest: String,
    },
    /// Verify the integrity of every published package.
    Verify,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CHARPACK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    let store_path = expand_tilde(&cli.store);
    let json_output = cli.json;

    let result = match cli.command {
        Commands::Convert { char_dir, args } => {
            commands::convert::run(&store_path, &char_dir, &args, json_output)
        }
        Commands::ConvertAll {
            chars_dir,
            args,
            jobs,
        } => commands::convert_all::run(&store_path, &chars_dir, &args, jobs, json_output),
        Commands::List => commands::list::run(&store_path, json_output),
        Commands::Inspect { digest } => commands::inspect::run(&store_path, &digest, json_output),
        Commands::Verify => commands::verify::run(&store_path, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("definition error:")
                || msg.starts_with("base manifest error:")
            {
                EXIT_DEFINITION_ERROR
            } else if msg.starts_with("store error:") || msg.starts_with("store lock:") {
                EXIT_STORE_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
