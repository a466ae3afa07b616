mod action;
mod config;
mod genmon;
mod panel;
mod plugin;
mod target;

pub use action::Action;
pub use config::{CommandTimeouts, InstallerConfig, MonitorSpec, CONFIG_FILE_NAME};
pub use genmon::{genmon_rc_file_name, GenmonConfig, DEFAULT_GENMON_FONT};
pub use panel::{PanelLocation, PanelPluginList};
pub use plugin::{
    next_plugin_id, parse_int_lines, parse_plugin_id_lines, parse_store_listing, plugin_id_in_path,
    plugin_root_id, PanelId, PluginId, StoreEntry, PANELS_ROOT, PLUGINS_ROOT,
};
pub use target::{
    contains_settarget_block, remove_appended_block, render_settarget_block,
    validate_target_ip, TargetError, TargetSpec, SETTARGET_END_MARKER, SETTARGET_SIGNATURE,
    SETTARGET_START_MARKER,
};

#[cfg(test)]
mod tests;
