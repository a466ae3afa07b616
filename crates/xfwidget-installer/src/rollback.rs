use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io;
use std::path::Path;

use xfwidget_core::{remove_appended_block, Action, InstallerConfig};

use crate::fs_utils::remove_file_if_exists;
use crate::journal::{
    clear_active_run, is_valid_run_id, latest_unsettled_run, outstanding_journal_entries,
    read_active_run, read_run_metadata, run_owner_alive, update_run_status, JournalEntry,
    RunJournal, RunStatus,
};
use crate::layout::HomeLayout;
use crate::packages::PackageManager;
use crate::panel::{restart_panel, PanelPluginManager};
use crate::runner::CommandRunner;
use crate::xfconf::XfconfClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackIssue {
    pub action: Action,
    pub message: String,
    pub manual_cleanup: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub undone: Vec<Action>,
    pub issues: Vec<RollbackIssue>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Undoes `entries` in the order given (newest first). A failed undo is
/// reported and the remaining entries are still attempted. Each successful
/// undo is marked in `journal` so a retry skips it.
pub fn rollback_actions<R, F>(
    runner: &R,
    layout: &HomeLayout,
    config: &InstallerConfig,
    entries: Vec<JournalEntry>,
    journal: Option<&RunJournal>,
    mut on_undo: F,
) -> RollbackReport
where
    R: CommandRunner + ?Sized,
    F: FnMut(&Action, Option<&RollbackIssue>),
{
    let client = XfconfClient::new(runner, config.panel_channel.clone())
        .with_timeout(std::time::Duration::from_secs(config.timeouts.command_secs));
    let panels = PanelPluginManager::new(client);
    let packages = PackageManager::new(runner, config.timeouts);
    let bundle_dir = layout.bundle_dir();

    let mut report = RollbackReport::default();
    let mut touched_panel = false;
    for JournalEntry { seq, action } in entries {
        let outcome = match &action {
            Action::PackageInstalled { name } => packages.remove(name),
            Action::FileCreated { path } => remove_file_if_exists(path)
                .with_context(|| format!("failed to remove {}", path.display())),
            Action::DirectoryCreated { path } if *path == bundle_dir => remove_tree_if_exists(path),
            Action::DirectoryCreated { path } => remove_empty_dir(path),
            Action::FileAppended {
                path,
                appended_text,
            } => strip_appended_text(path, appended_text),
            Action::DirectoryBackedUp {
                original_path,
                backup_path,
            } => restore_backup(original_path, backup_path),
            Action::PanelPluginCreated { id } => {
                touched_panel = true;
                panels.discard_plugin(*id)
            }
        };

        match outcome {
            Ok(()) => {
                log::info!("undid {action}");
                if let Some(journal) = journal {
                    if let Err(err) = journal.mark_undone(seq) {
                        log::error!(
                            "could not mark entry {seq} of run {} as undone: {err:#}",
                            journal.run_id()
                        );
                    }
                }
                on_undo(&action, None);
                report.undone.push(action);
            }
            Err(err) => {
                let manual_cleanup = matches!(action, Action::FileAppended { .. });
                log::error!("failed to undo {action}: {err:#}");
                let issue = RollbackIssue {
                    message: format!("{err:#}"),
                    action,
                    manual_cleanup,
                };
                on_undo(&issue.action, Some(&issue));
                report.issues.push(issue);
            }
        }
    }

    if touched_panel {
        if let Err(err) = restart_panel(runner, config.timeouts.command_secs) {
            log::warn!("panel restart after rollback failed: {err:#}");
        }
    }
    report
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    NothingToRollBack,
    AlreadySettled { run_id: String, status: RunStatus },
    RolledBack { run_id: String, report: RollbackReport },
}

pub fn recover_run<R, F>(
    runner: &R,
    layout: &HomeLayout,
    config: &InstallerConfig,
    run_id: Option<&str>,
    on_undo: F,
) -> Result<RecoveryOutcome>
where
    R: CommandRunner + ?Sized,
    F: FnMut(&Action, Option<&RollbackIssue>),
{
    let active = read_active_run(layout)?;
    let target = match run_id {
        Some(run_id) => {
            if !is_valid_run_id(run_id) {
                return Err(anyhow!("invalid run id: {run_id}"));
            }
            run_id.to_string()
        }
        None => match (&active, latest_unsettled_run(layout)?) {
            (Some(active), _) => active.clone(),
            (None, Some(latest)) => latest.run_id,
            (None, None) => return Ok(RecoveryOutcome::NothingToRollBack),
        },
    };
    let owns_marker = active.as_deref() == Some(target.as_str());

    let Some(metadata) = read_run_metadata(layout, &target)? else {
        if owns_marker {
            log::warn!("clearing stale active marker for unknown run {target}");
            clear_active_run(layout)?;
            return Ok(RecoveryOutcome::NothingToRollBack);
        }
        return Err(anyhow!("no metadata recorded for run {target}"));
    };

    if matches!(metadata.status, RunStatus::Planning | RunStatus::Applying)
        && owns_marker
        && run_owner_alive(&metadata)
    {
        return Err(anyhow!(
            "run {target} is still in progress (status={})",
            metadata.status
        ));
    }

    if metadata.status.is_settled() {
        if owns_marker {
            clear_active_run(layout)?;
        }
        return Ok(RecoveryOutcome::AlreadySettled {
            run_id: target,
            status: metadata.status,
        });
    }

    let mut entries = outstanding_journal_entries(layout, &target)?;
    entries.reverse();
    log::info!("rolling back run {target}: {} outstanding actions", entries.len());

    update_run_status(layout, &target, RunStatus::RollingBack)?;
    let journal = RunJournal::new(layout.clone(), target.clone());
    let report = rollback_actions(runner, layout, config, entries, Some(&journal), on_undo);
    let status = if report.is_clean() {
        RunStatus::RolledBack
    } else {
        RunStatus::Failed
    };
    update_run_status(layout, &target, status)?;
    if owns_marker {
        clear_active_run(layout)?;
    }

    Ok(RecoveryOutcome::RolledBack {
        run_id: target,
        report,
    })
}

fn remove_tree_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}

// A created parent that has since gained other content stays.
fn remove_empty_dir(path: &Path) -> Result<()> {
    let mut children = match fs::read_dir(path) {
        Ok(children) => children,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    if children.next().is_some() {
        log::warn!("leaving {} in place: it is not empty", path.display());
        return Ok(());
    }
    match fs::remove_dir(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}

fn strip_appended_text(path: &Path, appended_text: &str) -> Result<()> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    let stripped = remove_appended_block(&content, appended_text).ok_or_else(|| {
        anyhow!(
            "appended block in {} was edited; remove it by hand",
            path.display()
        )
    })?;
    fs::write(path, stripped).with_context(|| format!("failed to rewrite {}", path.display()))
}

fn restore_backup(original_path: &Path, backup_path: &Path) -> Result<()> {
    if !backup_path.exists() {
        return Err(anyhow!("backup {} is missing", backup_path.display()));
    }
    remove_tree_if_exists(original_path)?;
    fs::rename(backup_path, original_path).with_context(|| {
        format!(
            "failed to restore {} from {}",
            original_path.display(),
            backup_path.display()
        )
    })
}
