use anyhow::{anyhow, Result};

pub const DEFAULT_GENMON_FONT: &str = "Cantarell Ultra-Bold 10";
pub const DEFAULT_UPDATE_PERIOD_SECS: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct GenmonConfig {
    pub command: String,
    pub update_period_secs: f64,
    pub text: String,
    pub use_label: bool,
    pub font: String,
}

impl GenmonConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            update_period_secs: DEFAULT_UPDATE_PERIOD_SECS,
            text: String::new(),
            use_label: false,
            font: DEFAULT_GENMON_FONT.to_string(),
        }
    }

    pub fn update_period_millis(&self) -> u64 {
        (self.update_period_secs * 1000.0).round() as u64
    }

    pub fn render(&self) -> Result<String> {
        for (key, value) in [
            ("Command", &self.command),
            ("Text", &self.text),
            ("Font", &self.font),
        ] {
            if value.contains('\n') || value.contains('\r') {
                return Err(anyhow!("genmon {key} must not contain line breaks"));
            }
        }
        if !self.update_period_secs.is_finite() || self.update_period_secs <= 0.0 {
            return Err(anyhow!(
                "genmon update period must be a positive number of seconds, got {}",
                self.update_period_secs
            ));
        }

        Ok(format!(
            "Command={}\nUpdatePeriod={}\nText={}\nUseLabel={}\nFont={}\n",
            self.command,
            self.update_period_millis(),
            self.text,
            u8::from(self.use_label),
            self.font
        ))
    }
}

pub fn genmon_rc_file_name(id: crate::PluginId) -> String {
    format!("genmon-{id}.rc")
}
