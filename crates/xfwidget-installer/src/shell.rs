use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use xfwidget_core::contains_settarget_block;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Bash,
    Zsh,
}

impl ShellKind {
    pub fn detect(shell: Option<&str>) -> Option<Self> {
        let name = Path::new(shell?).file_name()?.to_str()?;
        if name.contains("zsh") {
            Some(Self::Zsh)
        } else if name.contains("bash") {
            Some(Self::Bash)
        } else {
            None
        }
    }

    pub fn rc_file_name(self) -> &'static str {
        match self {
            Self::Bash => ".bashrc",
            Self::Zsh => ".zshrc",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    AlreadyPresent,
    Appended { created: bool },
}

pub fn rc_has_settarget(path: &Path) -> Result<bool> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(contains_settarget_block(&content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

pub fn append_settarget_block(path: &Path, block: &str) -> Result<AppendOutcome> {
    if rc_has_settarget(path)? {
        return Ok(AppendOutcome::AlreadyPresent);
    }

    let created = !path.exists();
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(block.as_bytes())
        .with_context(|| format!("failed to append to {}", path.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(AppendOutcome::Appended { created })
}
