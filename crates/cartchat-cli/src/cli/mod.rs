//! CLI entry and dispatch.

use anyhow::{Context, Result};
use cartchat_core::config;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "cartchat")]
#[command(version)]
#[command(about = "Chat with the shopping assistant agent from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Agent backend URL (overrides CARTCHAT_BASE_URL and config)
    #[arg(long, value_name = "URL", global = true)]
    base_url: Option<String>,

    /// Tenant sent with every run
    #[arg(long, value_name = "ID", global = true)]
    tenant: Option<String>,

    /// User id used as the session id (default: guest)
    #[arg(long, value_name = "ID", global = true, env = "CARTCHAT_USER")]
    user: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Ask {
        /// The message to send
        #[arg(value_name = "MESSAGE")]
        message: String,

        /// Print the final reply as JSON instead of rendering it
        #[arg(long)]
        json: bool,
    },

    /// Interactive chat over stdin (default)
    Chat,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Print the config file path
    Path,
    /// Write a default config file
    Init,
    /// Print the effective configuration
    Show,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

/// Logs go to stderr so replies on stdout stay clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = config::Config::load().context("load config")?;

    let Cli {
        command,
        base_url,
        tenant,
        user,
    } = cli;

    if let Some(tenant) = tenant {
        config.tenant_id = tenant;
    }
    if let Some(user) = user {
        config.user_id = Some(user);
    }

    let connection = commands::Connection {
        config,
        base_url_override: base_url,
    };

    // default to chat mode
    let Some(command) = command else {
        return commands::chat::run(&connection).await;
    };

    match command {
        Commands::Ask { message, json } => commands::ask::run(&connection, &message, json).await,
        Commands::Chat => commands::chat::run(&connection).await,
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Show => commands::config::show(&connection),
        },
    }
}
