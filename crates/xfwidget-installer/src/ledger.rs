use anyhow::Result;
use xfwidget_core::Action;

use crate::journal::{JournalEntry, RunJournal};

#[derive(Debug)]
pub struct ActionLedger {
    entries: Vec<JournalEntry>,
    journal: RunJournal,
}

impl ActionLedger {
    pub fn with_journal(journal: RunJournal) -> Self {
        Self {
            entries: Vec::new(),
            journal,
        }
    }

    // The in-memory entry is kept even if the journal write fails.
    pub fn record(&mut self, action: Action) -> Result<()> {
        log::info!("recorded {action}");
        let entry = JournalEntry {
            seq: self.entries.len() as u64 + 1,
            action,
        };
        let mirrored = self.journal.append(&entry);
        self.entries.push(entry);
        mirrored
    }

    pub fn take_reversed(&mut self) -> Vec<JournalEntry> {
        let mut entries = std::mem::take(&mut self.entries);
        entries.reverse();
        entries
    }
}
