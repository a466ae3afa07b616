use std::collections::HashSet;

use crate::{PanelId, PluginId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelLocation {
    pub panel: PanelId,
    pub index: Option<usize>,
}

impl Default for PanelLocation {
    fn default() -> Self {
        Self {
            panel: PanelId::DEFAULT,
            index: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PanelPluginList {
    ids: Vec<PluginId>,
}

impl PanelPluginList {
    pub fn new(ids: Vec<PluginId>) -> Self {
        let mut seen = HashSet::new();
        let ids = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        Self { ids }
    }

    pub fn ids(&self) -> &[PluginId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: PluginId) -> bool {
        self.ids.contains(&id)
    }

    pub fn position(&self, id: PluginId) -> Option<usize> {
        self.ids.iter().position(|candidate| *candidate == id)
    }

    pub fn splice_out(&mut self, targets: &[PluginId]) -> Option<usize> {
        let first = self.ids.iter().position(|id| targets.contains(id));
        if first.is_some() {
            self.ids.retain(|id| !targets.contains(id));
        }
        first
    }

    /// Inserts `new_ids` at `index` (end of list when `None` or past the end).
    /// Ids already present are moved rather than duplicated.
    pub fn insert_at(&mut self, index: Option<usize>, new_ids: &[PluginId]) {
        let mut fresh = Vec::with_capacity(new_ids.len());
        for id in new_ids {
            if !fresh.contains(id) {
                fresh.push(*id);
            }
        }

        let mut at = index.unwrap_or(self.ids.len()).min(self.ids.len());
        let before_at = self.ids[..at]
            .iter()
            .filter(|id| fresh.contains(id))
            .count();
        self.ids.retain(|id| !fresh.contains(id));
        at -= before_at;

        self.ids.splice(at..at, fresh);
    }

    pub fn into_ids(self) -> Vec<PluginId> {
        self.ids
    }
}
