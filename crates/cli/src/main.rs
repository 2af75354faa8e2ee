//! Shopforge CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! sf-cli migrate
//!
//! # Copy translation blobs into normalized tables (all targets)
//! sf-cli translations normalize
//! sf-cli translations normalize --target product_seo --dry-run
//!
//! # Issue an API token for a store owner, valid for 90 days
//! sf-cli token create -e owner@example.com -r store_owner -l "laptop" -d 90
//!
//! # Re-check pending custom domains (run from cron)
//! sf-cli domains sweep
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "Shopforge CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Translation maintenance
    Translations {
        #[command(subcommand)]
        action: TranslationsAction,
    },
    /// Manage API tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Custom domain maintenance
    Domains {
        #[command(subcommand)]
        action: DomainsAction,
    },
}

#[derive(Subcommand)]
enum TranslationsAction {
    /// Copy JSON translation blobs into the normalized tables
    Normalize {
        /// Only this target (see `translations targets`)
        #[arg(short, long)]
        target: Option<String>,

        /// Count what would be inserted without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// List normalization targets
    Targets,
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a new API token (the user is created if needed)
    Create {
        /// Email of the token's user
        #[arg(short, long)]
        email: String,

        /// Token role (`store_owner`, `customer`, `platform_admin`)
        #[arg(short, long, default_value = "store_owner")]
        role: String,

        /// Label shown in token listings
        #[arg(short, long)]
        label: Option<String>,

        /// Days until the token expires; never when omitted
        #[arg(short, long)]
        days: Option<i64>,
    },
    /// Revoke a token by id
    Revoke {
        #[arg(long)]
        id: i32,
    },
}

#[derive(Subcommand)]
enum DomainsAction {
    /// Re-check the TXT record of every pending domain
    Sweep,
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
        Commands::Translations { action } => match action {
            TranslationsAction::Normalize { target, dry_run } => {
                commands::translations::normalize(target.as_deref(), dry_run).await?;
            }
            TranslationsAction::Targets => commands::translations::targets(),
        },
        Commands::Token { action } => match action {
            TokenAction::Create {
                email,
                role,
                label,
                days,
            } => {
                commands::token::create(&email, &role, label.as_deref(), days).await?;
            }
            TokenAction::Revoke { id } => commands::token::revoke(id).await?,
        },
        Commands::Domains { action } => match action {
            DomainsAction::Sweep => commands::domains::sweep().await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_token_create() {
        let cli = Cli::try_parse_from([
            "sf-cli", "token", "create", "-e", "a@b.io", "-r", "customer", "--days", "30",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        match cli.command {
            Commands::Token {
                action: TokenAction::Create { email, role, label, days },
            } => {
                assert_eq!(email, "a@b.io");
                assert_eq!(role, "customer");
                assert!(label.is_none());
                assert_eq!(days, Some(30));
            }
            _ => panic!("parsed the wrong command"),
        }
    }

    #[test]
    fn test_parse_normalize_flags() {
        let cli = Cli::try_parse_from(["sf-cli", "translations", "normalize", "--dry-run"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::Translations {
                action: TranslationsAction::Normalize { target: None, dry_run: true }
            }
        ));
    }
}
