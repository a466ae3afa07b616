use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::PluginId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    PackageInstalled {
        name: String,
    },
    FileCreated {
        path: PathBuf,
    },
    DirectoryCreated {
        path: PathBuf,
    },
    FileAppended {
        path: PathBuf,
        appended_text: String,
    },
    DirectoryBackedUp {
        original_path: PathBuf,
        backup_path: PathBuf,
    },
    PanelPluginCreated {
        id: PluginId,
    },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PackageInstalled { .. } => "package_installed",
            Self::FileCreated { .. } => "file_created",
            Self::DirectoryCreated { .. } => "directory_created",
            Self::FileAppended { .. } => "file_appended",
            Self::DirectoryBackedUp { .. } => "directory_backed_up",
            Self::PanelPluginCreated { .. } => "panel_plugin_created",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PackageInstalled { name } => write!(f, "package {name}"),
            Self::FileCreated { path } => write!(f, "file {}", path.display()),
            Self::DirectoryCreated { path } => write!(f, "directory {}", path.display()),
            Self::FileAppended { path, .. } => write!(f, "appended block in {}", path.display()),
            Self::DirectoryBackedUp {
                original_path,
                backup_path,
            } => write!(
                f,
                "backup {} -> {}",
                original_path.display(),
                backup_path.display()
            ),
            Self::PanelPluginCreated { id } => write!(f, "panel plugin {id}"),
        }
    }
}
