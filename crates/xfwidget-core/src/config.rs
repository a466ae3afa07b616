use std::collections::HashSet;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::genmon::{DEFAULT_GENMON_FONT, DEFAULT_UPDATE_PERIOD_SECS};

pub const CONFIG_FILE_NAME: &str = "xfwidget.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallerConfig {
    pub packages: Vec<String>,
    pub bundle_dir: String,
    pub executable_scripts: Vec<String>,
    pub monitor_plugin_type: String,
    pub graph_plugin_type: String,
    pub separator_plugin_type: String,
    pub panel_channel: String,
    pub monitors: Vec<MonitorSpec>,
    pub timeouts: CommandTimeouts,
    pub step_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorSpec {
    pub script: String,
    #[serde(default = "default_update_period_secs")]
    pub update_period_secs: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub use_label: bool,
    #[serde(default)]
    pub font: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandTimeouts {
    pub command_secs: u64,
    pub package_secs: u64,
}

impl Default for CommandTimeouts {
    fn default() -> Self {
        Self {
            command_secs: 30,
            package_secs: 900,
        }
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            packages: vec!["jp2a".to_string(), "xclip".to_string()],
            bundle_dir: "bin".to_string(),
            executable_scripts: vec![
                "target.sh".to_string(),
                "ethernet.sh".to_string(),
                "vpnip.sh".to_string(),
            ],
            monitor_plugin_type: "genmon".to_string(),
            graph_plugin_type: "cpugraph".to_string(),
            separator_plugin_type: "separator".to_string(),
            panel_channel: "xfce4-panel".to_string(),
            monitors: vec![
                MonitorSpec::for_script("target.sh"),
                MonitorSpec::for_script("vpnip.sh"),
                MonitorSpec::for_script("ethernet.sh"),
            ],
            timeouts: CommandTimeouts::default(),
            step_delay_ms: 0,
        }
    }
}

impl MonitorSpec {
    pub fn for_script(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            update_period_secs: DEFAULT_UPDATE_PERIOD_SECS,
            text: String::new(),
            use_label: false,
            font: None,
        }
    }

    pub fn font(&self) -> &str {
        self.font.as_deref().unwrap_or(DEFAULT_GENMON_FONT)
    }
}

impl InstallerConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse xfwidget config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_file_name("bundle_dir", &self.bundle_dir)?;
        for (field, value) in [
            ("monitor_plugin_type", &self.monitor_plugin_type),
            ("graph_plugin_type", &self.graph_plugin_type),
            ("separator_plugin_type", &self.separator_plugin_type),
            ("panel_channel", &self.panel_channel),
        ] {
            if value.trim().is_empty() || value.chars().any(char::is_whitespace) {
                return Err(anyhow!("{field} must be a single non-empty token"));
            }
        }

        let mut seen_packages = HashSet::new();
        for package in &self.packages {
            if package.is_empty() || package.starts_with('-') || package.contains(char::is_whitespace)
            {
                return Err(anyhow!("invalid package name: '{package}'"));
            }
            if !seen_packages.insert(package.as_str()) {
                return Err(anyhow!("duplicate package: '{package}'"));
            }
        }

        for script in &self.executable_scripts {
            validate_file_name("executable_scripts", script)?;
        }

        if self.monitors.is_empty() {
            return Err(anyhow!("at least one monitor must be configured"));
        }
        for monitor in &self.monitors {
            validate_file_name("monitors.script", &monitor.script)?;
            if !monitor.update_period_secs.is_finite() || monitor.update_period_secs <= 0.0 {
                return Err(anyhow!(
                    "monitor '{}' update_period_secs must be positive",
                    monitor.script
                ));
            }
        }

        if self.timeouts.command_secs == 0 || self.timeouts.package_secs == 0 {
            return Err(anyhow!("command timeouts must be at least one second"));
        }
        Ok(())
    }

    pub fn required_scripts(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.executable_scripts
            .iter()
            .map(String::as_str)
            .chain(self.monitors.iter().map(|monitor| monitor.script.as_str()))
            .filter(|script| seen.insert(*script))
            .collect()
    }
}

fn default_update_period_secs() -> f64 {
    DEFAULT_UPDATE_PERIOD_SECS
}

fn validate_file_name(field: &str, value: &str) -> Result<()> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(anyhow!("{field} must be a plain file name, got '{value}'"));
    }
    Ok(())
}
