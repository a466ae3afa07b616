use std::fmt;

use serde::{Deserialize, Serialize};

pub const PLUGINS_ROOT: &str = "/plugins";
pub const PANELS_ROOT: &str = "/panels";

const PLUGIN_PATH_PREFIX: &str = "/plugins/plugin-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PluginId(u32);

impl PluginId {
    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn store_path(self) -> String {
        format!("{PLUGIN_PATH_PREFIX}{}", self.0)
    }
}

impl TryFrom<u32> for PluginId {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "plugin id must be positive".to_string())
    }
}

impl From<PluginId> for u32 {
    fn from(value: PluginId) -> Self {
        value.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PanelId(pub u32);

impl PanelId {
    pub const DEFAULT: PanelId = PanelId(1);

    pub fn plugin_ids_path(self) -> String {
        format!("{PANELS_ROOT}/panel-{}/plugin-ids", self.0)
    }
}

impl Default for PanelId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub path: String,
    pub value: Option<String>,
}

pub fn plugin_root_id(path: &str) -> Option<PluginId> {
    let digits = path.strip_prefix(PLUGIN_PATH_PREFIX)?;
    parse_positive(digits)
}

pub fn plugin_id_in_path(path: &str) -> Option<PluginId> {
    let rest = path.strip_prefix(PLUGIN_PATH_PREFIX)?;
    let digits = match rest.split_once('/') {
        Some((digits, _)) => digits,
        None => rest,
    };
    parse_positive(digits)
}

pub fn next_plugin_id<I>(existing: I) -> PluginId
where
    I: IntoIterator<Item = PluginId>,
{
    existing
        .into_iter()
        .map(PluginId::get)
        .max()
        .and_then(|max| max.checked_add(1))
        .and_then(PluginId::new)
        .unwrap_or(PluginId(1))
}

pub fn parse_store_listing(raw: &str, verbose: bool) -> Vec<StoreEntry> {
    raw.lines()
        .map(str::trim)
        .filter(|line| line.starts_with('/'))
        .map(|line| {
            if !verbose {
                return StoreEntry {
                    path: line.to_string(),
                    value: None,
                };
            }
            match line.split_once(char::is_whitespace) {
                Some((path, value)) => StoreEntry {
                    path: path.to_string(),
                    value: Some(value.trim().to_string()),
                },
                None => StoreEntry {
                    path: line.to_string(),
                    value: Some(String::new()),
                },
            }
        })
        .collect()
}

pub fn parse_int_lines(raw: &str) -> Vec<u32> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|line| line.parse().ok())
        .collect()
}

pub fn parse_plugin_id_lines(raw: &str) -> Vec<PluginId> {
    parse_int_lines(raw)
        .into_iter()
        .filter_map(PluginId::new)
        .collect()
}

fn parse_positive(digits: &str) -> Option<PluginId> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().and_then(PluginId::new)
}
