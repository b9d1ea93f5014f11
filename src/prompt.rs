//! Interactive decisions, injected into the pipeline as a trait so the
//! control flow runs deterministically in tests without any console I/O.

use crate::backup::select::BackupEntry;
use crate::backup::writer::BackupFormat;
use crate::storage::Space;
use crate::utils::errors::BackupError;
use crate::utils::format::format_size;
use crate::Result;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

/// Outcome of the space selection prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceChoice {
    /// Index into the listed spaces.
    Existing(usize),
    /// Create a new space; the name is asked for separately.
    New,
}

/// Decision callbacks for the backup and upload flows. Cancelling a prompt
/// yields [`BackupError::Aborted`], which unwinds the flow without touching
/// already-written artifacts.
pub trait Prompter: Send + Sync {
    fn choose_format(&self, default: BackupFormat) -> Result<BackupFormat>;

    fn confirm_upload(&self) -> Result<bool>;

    fn choose_space(&self, spaces: &[Space]) -> Result<SpaceChoice>;

    fn space_name(&self) -> Result<String>;

    /// Pick one of the listed backups, or `None` to skip.
    fn choose_backup(&self, entries: &[BackupEntry]) -> Result<Option<usize>>;
}

/// Dialoguer-backed prompter for the CLI.
pub struct ConsolePrompter;

fn prompt_err(e: dialoguer::Error) -> BackupError {
    match e {
        dialoguer::Error::IO(io) => BackupError::Io(io),
    }
}

impl Prompter for ConsolePrompter {
    fn choose_format(&self, default: BackupFormat) -> Result<BackupFormat> {
        let formats = [BackupFormat::Car, BackupFormat::Json];
        let default_idx = formats.iter().position(|f| *f == default).unwrap_or(0);
        let idx = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("How do you want this data stored?")
            .items(&formats)
            .default(default_idx)
            .interact_opt()
            .map_err(prompt_err)?
            .ok_or(BackupError::Aborted)?;
        Ok(formats[idx])
    }

    fn confirm_upload(&self) -> Result<bool> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Do you want to upload your backup to Storacha?")
            .default(true)
            .interact_opt()
            .map_err(prompt_err)?
            .ok_or(BackupError::Aborted)
    }

    fn choose_space(&self, spaces: &[Space]) -> Result<SpaceChoice> {
        let mut items: Vec<String> = spaces.iter().map(|s| s.label()).collect();
        items.push("Create a new space".to_string());

        let idx = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Select a space or create a new one")
            .items(&items)
            .default(0)
            .interact_opt()
            .map_err(prompt_err)?
            .ok_or(BackupError::Aborted)?;

        if idx == spaces.len() {
            Ok(SpaceChoice::New)
        } else {
            Ok(SpaceChoice::Existing(idx))
        }
    }

    fn space_name(&self) -> Result<String> {
        Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Enter a name for your storage space")
            .validate_with(|input: &String| {
                if input.trim().is_empty() {
                    Err("Space name cannot be blank")
                } else {
                    Ok(())
                }
            })
            .interact_text()
            .map_err(prompt_err)
    }

    fn choose_backup(&self, entries: &[BackupEntry]) -> Result<Option<usize>> {
        let items: Vec<String> = entries
            .iter()
            .map(|e| format!("{} ({})", e.file_name, format_size(e.size)))
            .collect();

        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Select a backup file to upload")
            .items(&items)
            .default(0)
            .interact_opt()
            .map_err(prompt_err)
    }
}
