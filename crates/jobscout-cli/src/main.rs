//! jobscout - command line front end for the jobscout service.
//!
//! Stands in for the browser forms: log in, register, log out, show the
//! signed-in user, and drive the image-generation endpoints.

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jobscout_core::{ApiClient, Config, MemoryStorage, SessionStorage, SessionStore};

use commands::Session;

#[derive(Parser, Debug)]
#[command(name = "jobscout", about = "jobscout job-search and image service CLI", version)]
struct Cli {
    /// API base URL (overrides the config file)
    #[arg(long, env = "JOBSCOUT_API_URL")]
    api_url: Option<String>,

    /// Keep the session in memory only; nothing is read from or written to disk
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the session
    Login(CredentialArgs),
    /// Create an account, then log in with it
    Register(CredentialArgs),
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami {
        /// Print the profile as JSON
        #[arg(long)]
        json: bool,
    },
    /// Image generation
    Image(ImageCommand),
}

#[derive(Args, Debug)]
struct CredentialArgs {
    #[arg(short, long, env = "JOBSCOUT_USERNAME")]
    username: Option<String>,
}

#[derive(Args, Debug)]
struct ImageCommand {
    #[command(subcommand)]
    command: ImageSubcommand,
}

#[derive(Subcommand, Debug)]
enum ImageSubcommand {
    /// List available styles
    Styles,
    /// Show whether the generation backend is up
    Status,
    /// Generate an image and write it to a file
    Generate {
        #[arg(short, long)]
        prompt: String,
        #[arg(short, long)]
        style: Option<String>,
        #[arg(long, requires = "height")]
        width: Option<u32>,
        #[arg(long, requires = "width")]
        height: Option<u32>,
        /// Output file; defaults to image.<format>
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });

    let base_url = cli.api_url.clone().unwrap_or_else(|| config.base_url());
    let api = ApiClient::new(base_url)?;
    info!(base_url = %api.base_url(), ephemeral = cli.ephemeral, "jobscout starting");
    let storage: Box<dyn SessionStorage> = if cli.ephemeral {
        Box::new(MemoryStorage::new())
    } else {
        config.open_storage()?
    };
    let mut session: Session = SessionStore::new(api, storage);

    let result = match cli.command {
        Command::Login(args) => commands::login(&mut session, &mut config, args.username).await,
        Command::Register(args) => commands::register(&mut session, &mut config, args.username).await,
        Command::Logout => commands::logout(&mut session),
        Command::Whoami { json } => commands::whoami(&mut session, json).await,
        Command::Image(image) => match image.command {
            ImageSubcommand::Styles => commands::image_styles(&mut session).await,
            ImageSubcommand::Status => commands::image_status(&mut session).await,
            ImageSubcommand::Generate {
                prompt,
                style,
                width,
                height,
                out,
            } => {
                let request = commands::generate_request(prompt, style, width, height);
                commands::image_generate(&mut session, request, out).await
            }
        },
    };

    session.dispose();
    result
}
