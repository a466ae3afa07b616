use std::path::Path;

use anyhow::{Context, Result};
use inquire::{Confirm, Password, PasswordDisplayMode};
use xfwidget_installer::{Credential, CredentialSource};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PasswordPrompt;

impl CredentialSource for PasswordPrompt {
    fn request_credential(&self) -> Option<Credential> {
        let answer = Password::new("sudo password:")
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .with_help_message("used for apt and kept in memory for this run only")
            .prompt();
        match answer {
            Ok(secret) if !secret.is_empty() => Some(Credential::new(secret)),
            Ok(_) => {
                log::warn!("empty sudo password entered");
                None
            }
            Err(err) => {
                log::warn!("sudo password prompt failed: {err}");
                None
            }
        }
    }
}

pub(crate) fn confirm_reinstall(bundle_dir: &Path) -> Result<bool> {
    let message = format!("{} already exists. Reinstall?", bundle_dir.display());
    Confirm::new(&message)
        .with_default(true)
        .with_help_message("the existing copy is kept as a timestamped backup")
        .prompt()
        .with_context(|| "reinstall confirmation was not answered")
}
