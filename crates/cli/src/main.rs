//! Bazaar CLI - database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! bazaar-cli migrate
//!
//! # Create an admin account
//! bazaar-cli admin create -n "Store Admin" -e admin@example.com -p 'S3cure!pass'
//! ```
//!
//! Both commands read `BAZAAR_DATABASE_URL` (or `DATABASE_URL`) from the
//! environment or `.env`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bazaar-cli")]
#[command(author, version, about = "Bazaar CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin account
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (must satisfy the password policy)
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                name,
                email,
                password,
            } => {
                commands::admin::create_admin(&name, &email, &password).await?;
            }
        },
    }
    Ok(())
}
