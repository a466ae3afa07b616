use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use xfwidget_core::{
    next_plugin_id, parse_plugin_id_lines, plugin_id_in_path, plugin_root_id, PanelId,
    PanelLocation, PanelPluginList, PluginId, PANELS_ROOT, PLUGINS_ROOT,
};

use crate::runner::{CommandRequest, CommandRunner};
use crate::xfconf::{ValueType, XfconfClient};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub removed: Vec<PluginId>,
    pub location: Option<PanelLocation>,
}

pub struct PanelPluginManager<'a, R: ?Sized> {
    client: XfconfClient<'a, R>,
}

impl<'a, R: CommandRunner + ?Sized> PanelPluginManager<'a, R> {
    pub fn new(client: XfconfClient<'a, R>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &XfconfClient<'a, R> {
        &self.client
    }

    pub fn scan_plugins_of_type(&self, kind: &str) -> Vec<PluginId> {
        self.client
            .list_entries(PLUGINS_ROOT, true)
            .into_iter()
            .filter(|entry| entry.value.as_deref() == Some(kind))
            .filter_map(|entry| plugin_root_id(&entry.path))
            .collect()
    }

    pub fn all_plugin_ids(&self) -> Vec<PluginId> {
        self.client
            .list_entries(PLUGINS_ROOT, false)
            .iter()
            .filter_map(|entry| plugin_id_in_path(&entry.path))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn panels(&self) -> Vec<PanelId> {
        let panels: Vec<PanelId> = self
            .client
            .read_int_array(PANELS_ROOT)
            .unwrap_or_default()
            .into_iter()
            .map(PanelId)
            .collect();
        if panels.is_empty() {
            vec![PanelId::DEFAULT]
        } else {
            panels
        }
    }

    pub fn panel_plugin_ids(&self, panel: PanelId) -> Option<PanelPluginList> {
        self.client
            .read_path(&panel.plugin_ids_path())
            .map(|raw| PanelPluginList::new(parse_plugin_id_lines(&raw)))
    }

    pub fn remove_plugins_of_type(&self, kind: &str) -> Result<RemovalReport> {
        let removed = self.scan_plugins_of_type(kind);
        if removed.is_empty() {
            log::info!("no {kind} plugins present");
            return Ok(RemovalReport::default());
        }
        let location = self.remove_plugin_ids(&removed)?;
        log::info!("removed {kind} plugins {removed:?}");
        Ok(RemovalReport { removed, location })
    }

    pub fn remove_first_plugin_of_type(&self, kind: &str) -> Result<Option<PanelLocation>> {
        let Some(first) = self.scan_plugins_of_type(kind).into_iter().next() else {
            log::info!("no {kind} plugin present; new plugins go to the end of panel 1");
            return Ok(None);
        };
        let location = self
            .remove_plugin_ids(&[first])?
            .unwrap_or_default();
        log::info!(
            "removed {kind} plugin {first} from panel {} at {:?}",
            location.panel,
            location.index
        );
        Ok(Some(location))
    }

    pub fn discard_plugin(&self, id: PluginId) -> Result<()> {
        if self.all_plugin_ids().contains(&id) {
            self.client.remove_subtree(&id.store_path())?;
        }
        self.splice_from_panels(&[id]).map(|_| ())
    }

    pub fn allocate_plugin_id(&self) -> PluginId {
        next_plugin_id(self.all_plugin_ids())
    }

    pub fn create_plugin(&self, kind: &str) -> Result<PluginId> {
        let id = self.allocate_plugin_id();
        self.client
            .create_typed_value(&id.store_path(), ValueType::String, kind)?;
        log::info!("created {kind} plugin {id}");
        Ok(id)
    }

    /// `on_created` runs after the plugin exists and before its properties are written.
    pub fn create_separator<F>(&self, kind: &str, on_created: F) -> Result<PluginId>
    where
        F: FnOnce(PluginId) -> Result<()>,
    {
        let id = self.create_plugin(kind)?;
        on_created(id)?;
        let root = id.store_path();
        self.client
            .create_typed_value(&format!("{root}/style"), ValueType::Int, "0")?;
        self.client
            .create_typed_value(&format!("{root}/expand"), ValueType::Bool, "false")?;
        Ok(id)
    }

    pub fn insert_plugin_ids(&self, location: PanelLocation, ids: &[PluginId]) -> Result<()> {
        let mut list = self.panel_plugin_ids(location.panel).unwrap_or_default();
        list.insert_at(location.index, ids);
        self.write_panel(location.panel, &list)?;
        log::info!("panel {} now lists {:?}", location.panel, list.ids());
        Ok(())
    }

    fn remove_plugin_ids(&self, ids: &[PluginId]) -> Result<Option<PanelLocation>> {
        for id in ids {
            self.client.remove_subtree(&id.store_path())?;
        }
        self.splice_from_panels(ids)
    }

    fn splice_from_panels(&self, ids: &[PluginId]) -> Result<Option<PanelLocation>> {
        let mut location = None;
        for panel in self.panels() {
            let Some(mut list) = self.panel_plugin_ids(panel) else {
                log::warn!("panel {panel} has no readable plugin list; skipping");
                continue;
            };
            let Some(index) = list.splice_out(ids) else {
                continue;
            };
            self.write_panel(panel, &list)?;
            location.get_or_insert(PanelLocation {
                panel,
                index: Some(index),
            });
        }
        Ok(location)
    }

    fn write_panel(&self, panel: PanelId, list: &PanelPluginList) -> Result<()> {
        let values: Vec<String> = list.ids().iter().map(ToString::to_string).collect();
        self.client
            .replace_array(&panel.plugin_ids_path(), ValueType::Int, &values)
    }
}

pub fn restart_panel<R: CommandRunner + ?Sized>(runner: &R, timeout_secs: u64) -> Result<()> {
    let request = CommandRequest::new("xfce4-panel", ["--restart"])
        .with_timeout(Duration::from_secs(timeout_secs));
    runner
        .run(&request)
        .context("failed to restart the panel")?;
    Ok(())
}
