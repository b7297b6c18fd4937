//! StockMirror CLI: migrations, user bootstrap and headless sync runs.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! smctl migrate
//!
//! # Create the first admin (password from env)
//! STOCKMIRROR_USER_PASSWORD=... smctl user create -u admin -r admin
//!
//! # Push flagged products to every store
//! smctl sync push
//!
//! # Compare one SKU across stores
//! smctl sync compare TEE-S
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "smctl")]
#[command(author, version, about = "StockMirror CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Reconcile stock with Shopify
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: Option<String>,

        /// Role (`admin`, `manager`, `staff`)
        #[arg(short, long, default_value = "staff")]
        role: String,

        /// Initial password
        #[arg(long, env = "STOCKMIRROR_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Push local quantities to Shopify
    Push {
        /// Include products not flagged `needs_sync`
        #[arg(long)]
        all: bool,

        /// Limit to these store IDs (repeatable)
        #[arg(long = "store", value_name = "ID")]
        stores: Vec<i32>,
    },
    /// Compare one SKU against every store
    Compare {
        /// Product SKU
        sku: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = rustls::crypto::ring::default_provider().install_default();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                email,
                role,
                password,
            } => {
                commands::user::create(&username, email.as_deref(), &role, &password).await?;
            }
        },
        Commands::Sync { action } => match action {
            SyncAction::Push { all, stores } => commands::sync::push(all, &stores).await?,
            SyncAction::Compare { sku } => commands::sync::compare(&sku).await?,
        },
    }
    Ok(())
}
