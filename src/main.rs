//! bsky-backup - Main entry point
//!
//! CLI for backing up Bluesky posts and publishing them to
//! content-addressed storage.

use anyhow::{bail, Context, Result};
use bsky_backup::backup::{list_backups, BackupPipeline, BackupWriter, RecordSource};
use bsky_backup::pds::PdsClient;
use bsky_backup::prompt::ConsolePrompter;
use bsky_backup::storage::StorachaClient;
use bsky_backup::utils::{self, format::format_size};
use bsky_backup::Config;
use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::{theme::ColorfulTheme, Input, Password};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Authenticate with the PDS and store the session
    Login {
        /// Handle or email to log in with
        #[arg(long)]
        handle: Option<String>,

        /// Custom PDS URL
        #[arg(long)]
        pds: Option<String>,
    },

    /// Remove stored credentials
    Logout,

    /// Backup and publish your posts
    #[command(subcommand)]
    Backup(BackupCommand),
}

#[derive(Subcommand, Debug)]
enum BackupCommand {
    /// Back up your posts to a local artifact, optionally publishing it
    Posts {
        /// Where structured records come from: the repository snapshot or
        /// the flat record listing
        #[arg(long, value_enum, default_value_t = RecordsFrom::Repo)]
        records_from: RecordsFrom,

        /// Record limit when listing (ignored for the repository snapshot)
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },

    /// Upload an existing backup without re-fetching
    Upload,

    /// List existing backups, newest first
    List,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RecordsFrom {
    Repo,
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_path().context("cannot determine config directory")?,
    };
    let mut config = Config::load(args.config.as_deref())?;

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    match args.command {
        Command::Login { handle, pds } => {
            if let Some(pds) = pds {
                config.pds.service_url = pds;
            }
            let identifier = match handle {
                Some(handle) => handle,
                None => Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("Handle or email")
                    .interact_text()?,
            };
            let password = Password::with_theme(&ColorfulTheme::default())
                .with_prompt("Password")
                .interact()?;

            let client = PdsClient::new(&config.pds.service_url);
            let session = client.create_session(&identifier, &password).await?;
            println!("Logged in as {} ({})", session.handle, session.did);

            config.pds.session = Some(session);
            config.save(&config_path)?;
        }

        Command::Logout => {
            config.pds.session = None;
            config.save(&config_path)?;
            println!("Stored credentials removed");
        }

        Command::Backup(cmd) => {
            let writer = BackupWriter::new(config.backup.root_dir());

            match cmd {
                BackupCommand::List => {
                    let entries = list_backups(writer.root())?;
                    if entries.is_empty() {
                        println!("No backup files found in {}", writer.root().display());
                    }
                    for entry in entries {
                        println!("{} ({})", entry.file_name, format_size(entry.size));
                    }
                }

                BackupCommand::Posts { records_from, limit } => {
                    let Some(session) = &config.pds.session else {
                        bail!("you need to login first: bsky-backup login");
                    };
                    let source = PdsClient::new(&config.pds.service_url)
                        .with_token(&session.access_jwt);
                    let backend =
                        StorachaClient::new(&config.storage.service_url, &config.storage.token);
                    let pipeline =
                        BackupPipeline::new(&source, &backend, &ConsolePrompter, writer)
                            .with_default_space(config.storage.space.clone());

                    let records = match records_from {
                        RecordsFrom::Repo => RecordSource::Repo,
                        RecordsFrom::List => RecordSource::Records { limit },
                    };
                    pipeline.backup_posts(&session.did, records).await?;
                }

                BackupCommand::Upload => {
                    let source = PdsClient::new(&config.pds.service_url);
                    let backend =
                        StorachaClient::new(&config.storage.service_url, &config.storage.token);
                    let pipeline =
                        BackupPipeline::new(&source, &backend, &ConsolePrompter, writer)
                            .with_default_space(config.storage.space.clone());
                    pipeline.upload_existing().await?;
                }
            }
        }
    }

    Ok(())
}
