use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use xfwidget_core::{genmon_rc_file_name, PluginId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeLayout {
    home: PathBuf,
    source_dir: PathBuf,
    bundle_dir_name: String,
}

impl HomeLayout {
    pub fn new(home: impl Into<PathBuf>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            source_dir: source_dir.into(),
            bundle_dir_name: "bin".to_string(),
        }
    }

    pub fn with_bundle_dir_name(mut self, name: impl Into<String>) -> Self {
        self.bundle_dir_name = name.into();
        self
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn source_bundle_dir(&self) -> PathBuf {
        self.source_dir.join(&self.bundle_dir_name)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.home.join(".config")
    }

    pub fn bundle_dir(&self) -> PathBuf {
        self.config_dir().join(&self.bundle_dir_name)
    }

    pub fn bundle_script_path(&self, script: &str) -> PathBuf {
        self.bundle_dir().join(script)
    }

    pub fn target_file(&self) -> PathBuf {
        self.bundle_dir().join("target").join("target.txt")
    }

    pub fn panel_rc_dir(&self) -> PathBuf {
        self.config_dir().join("xfce4").join("panel")
    }

    pub fn genmon_rc_path(&self, id: PluginId) -> PathBuf {
        self.panel_rc_dir().join(genmon_rc_file_name(id))
    }

    pub fn shell_rc_path(&self, rc_file_name: &str) -> PathBuf {
        self.home.join(rc_file_name)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.home.join(".local").join("state").join("xfwidget")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.state_dir().join("runs")
    }

    pub fn active_run_path(&self) -> PathBuf {
        self.runs_dir().join("active")
    }

    pub fn run_metadata_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir().join(format!("{run_id}.json"))
    }

    pub fn run_journal_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir().join(format!("{run_id}.journal"))
    }

    pub fn backup_dir_path(&self, stamp: &str) -> PathBuf {
        self.config_dir()
            .join(format!("{}.bak-{stamp}", self.bundle_dir_name))
    }

    pub fn ensure_state_dirs(&self) -> Result<()> {
        let dir = self.runs_dir();
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))
    }
}
