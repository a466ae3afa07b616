use anyhow::{anyhow, Context, Result};
use std::fs;

use xfwidget_core::{render_settarget_block, Action, GenmonConfig, MonitorSpec, PluginId};

use crate::fs_utils::{copy_dir_recursive, create_dir_all_tracked, set_executable};
use crate::ledger::ActionLedger;
use crate::orchestrator::Installer;
use crate::packages::PackageManager;
use crate::panel::{restart_panel, PanelPluginManager};
use crate::preflight::HostEnv;
use crate::runner::CommandRunner;
use crate::shell::{append_settarget_block, AppendOutcome, ShellKind};
use crate::types::{InstallReporter, InstallSummary, StepOutcome};
use crate::xfconf::XfconfClient;

const MAX_BACKUP_ATTEMPTS: u32 = 100;

impl<'a, R, H> Installer<'a, R, H>
where
    R: CommandRunner + ?Sized,
    H: HostEnv + ?Sized,
{
    fn panel_manager(&self) -> PanelPluginManager<'a, R> {
        let client = XfconfClient::new(self.runner, self.config.panel_channel.clone())
            .with_timeout(std::time::Duration::from_secs(
                self.config.timeouts.command_secs,
            ));
        PanelPluginManager::new(client)
    }

    pub(crate) fn install_packages(
        &self,
        ledger: &mut ActionLedger,
        summary: &mut InstallSummary,
        reporter: &mut dyn InstallReporter,
    ) -> Result<StepOutcome> {
        let packages = PackageManager::new(self.runner, self.config.timeouts);
        let mut pending = Vec::new();
        for name in &self.config.packages {
            if packages.is_installed(name) {
                log::info!("package {name} already installed");
                summary.packages_present.push(name.clone());
            } else {
                pending.push(name.as_str());
            }
        }
        if pending.is_empty() {
            return Ok(StepOutcome::Skipped(
                "all packages already installed".to_string(),
            ));
        }

        packages.refresh_index()?;
        let total = pending.len();
        for (done, name) in pending.into_iter().enumerate() {
            reporter.package_progress(name, done, total);
            match packages.install(name) {
                Ok(()) => {
                    ledger.record(Action::PackageInstalled {
                        name: name.to_string(),
                    })?;
                    summary.packages_installed.push(name.to_string());
                }
                Err(failure) => {
                    log::warn!("package {name} was not installed: {failure}");
                    reporter.notice(&format!("package {name} was not installed: {failure}"));
                    summary.packages_failed.push(name.to_string());
                }
            }
        }
        reporter.package_progress("", total, total);

        Ok(StepOutcome::Done(format!(
            "{} installed, {} already present, {} failed",
            summary.packages_installed.len(),
            summary.packages_present.len(),
            summary.packages_failed.len()
        )))
    }

    pub(crate) fn copy_bundle(
        &self,
        ledger: &mut ActionLedger,
        summary: &mut InstallSummary,
    ) -> Result<StepOutcome> {
        let source = self.layout.source_bundle_dir();
        let destination = self.layout.bundle_dir();

        if destination.exists() {
            let backup = self.free_backup_path()?;
            fs::rename(&destination, &backup).with_context(|| {
                format!(
                    "failed to move {} to {}",
                    destination.display(),
                    backup.display()
                )
            })?;
            ledger.record(Action::DirectoryBackedUp {
                original_path: destination.clone(),
                backup_path: backup.clone(),
            })?;
            summary.bundle_backup = Some(backup);
        } else if let Some(parent) = destination.parent() {
            for created in create_dir_all_tracked(parent)? {
                ledger.record(Action::DirectoryCreated { path: created })?;
            }
        }

        fs::create_dir(&destination)
            .with_context(|| format!("failed to create {}", destination.display()))?;
        ledger.record(Action::DirectoryCreated {
            path: destination.clone(),
        })?;
        copy_dir_recursive(&source, &destination)?;
        summary.bundle_dir = Some(destination.clone());

        let detail = match &summary.bundle_backup {
            Some(backup) => format!(
                "copied to {} (previous copy kept at {})",
                destination.display(),
                backup.display()
            ),
            None => format!("copied to {}", destination.display()),
        };
        Ok(StepOutcome::Done(detail))
    }

    fn free_backup_path(&self) -> Result<std::path::PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let first = self.layout.backup_dir_path(&stamp);
        if !first.exists() {
            return Ok(first);
        }
        (1..MAX_BACKUP_ATTEMPTS)
            .map(|attempt| self.layout.backup_dir_path(&format!("{stamp}-{attempt}")))
            .find(|candidate| !candidate.exists())
            .ok_or_else(|| anyhow!("no free backup name for {}", first.display()))
    }

    pub(crate) fn mark_executable(&self, summary: &mut InstallSummary) -> Result<StepOutcome> {
        for script in &self.config.executable_scripts {
            let path = self.layout.bundle_script_path(script);
            if !path.exists() {
                return Err(anyhow!("script {} was not copied", path.display()));
            }
            set_executable(&path)?;
            summary.executables.push(path);
        }
        Ok(StepOutcome::Done(format!(
            "{} scripts marked executable",
            summary.executables.len()
        )))
    }

    pub(crate) fn append_shell_function(
        &self,
        ledger: &mut ActionLedger,
        summary: &mut InstallSummary,
    ) -> Result<StepOutcome> {
        let shell = self.host.var("SHELL");
        let Some(kind) = ShellKind::detect(shell.as_deref()) else {
            return Ok(StepOutcome::Skipped(format!(
                "unsupported shell '{}'",
                shell.unwrap_or_default()
            )));
        };

        let rc_path = self.layout.shell_rc_path(kind.rc_file_name());
        let block = render_settarget_block(&self.layout.target_file());
        match append_settarget_block(&rc_path, &block)? {
            AppendOutcome::AlreadyPresent => Ok(StepOutcome::Skipped(format!(
                "settarget already defined in {}",
                rc_path.display()
            ))),
            AppendOutcome::Appended { created } => {
                let action = if created {
                    Action::FileCreated {
                        path: rc_path.clone(),
                    }
                } else {
                    Action::FileAppended {
                        path: rc_path.clone(),
                        appended_text: block,
                    }
                };
                ledger.record(action)?;
                summary.shell_rc = Some(rc_path.clone());
                Ok(StepOutcome::Done(format!(
                    "settarget added to {} ({})",
                    rc_path.display(),
                    kind.name()
                )))
            }
        }
    }

    pub(crate) fn remove_monitors(&self, summary: &mut InstallSummary) -> Result<StepOutcome> {
        let kind = &self.config.monitor_plugin_type;
        let report = self.panel_manager().remove_plugins_of_type(kind)?;
        if report.removed.is_empty() {
            return Ok(StepOutcome::Skipped(format!("no {kind} plugins present")));
        }
        let count = report.removed.len();
        summary.removed_monitors = report.removed;
        Ok(StepOutcome::Done(format!("removed {count} {kind} plugins")))
    }

    pub(crate) fn replace_graph(
        &self,
        ledger: &mut ActionLedger,
        summary: &mut InstallSummary,
    ) -> Result<StepOutcome> {
        let manager = self.panel_manager();
        let replaced = manager.remove_first_plugin_of_type(&self.config.graph_plugin_type)?;
        summary.replaced_graph = replaced;
        let location = replaced.unwrap_or_default();

        let mut new_ids = Vec::new();
        for (index, monitor) in self.config.monitors.iter().enumerate() {
            if index > 0 {
                let separator = manager
                    .create_separator(&self.config.separator_plugin_type, |id| {
                        ledger.record(Action::PanelPluginCreated { id })
                    })?;
                summary.separators_created.push(separator);
                new_ids.push(separator);
            }

            let id = manager.create_plugin(&self.config.monitor_plugin_type)?;
            ledger.record(Action::PanelPluginCreated { id })?;
            self.write_genmon_rc(id, monitor, ledger)?;
            summary.monitors_created.push(id);
            new_ids.push(id);
        }

        manager.insert_plugin_ids(location, &new_ids)?;
        Ok(StepOutcome::Done(format!(
            "{} monitors and {} separators added to panel {}",
            summary.monitors_created.len(),
            summary.separators_created.len(),
            location.panel
        )))
    }

    fn write_genmon_rc(
        &self,
        id: PluginId,
        monitor: &MonitorSpec,
        ledger: &mut ActionLedger,
    ) -> Result<()> {
        for created in create_dir_all_tracked(&self.layout.panel_rc_dir())? {
            ledger.record(Action::DirectoryCreated { path: created })?;
        }

        let config = GenmonConfig {
            command: self
                .layout
                .bundle_script_path(&monitor.script)
                .display()
                .to_string(),
            update_period_secs: monitor.update_period_secs,
            text: monitor.text.clone(),
            use_label: monitor.use_label,
            font: monitor.font().to_string(),
        };
        let rendered = config.render()?;

        let path = self.layout.genmon_rc_path(id);
        let existed = path.exists();
        if existed {
            log::warn!("overwriting stale {}", path.display());
        }
        fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
        if !existed {
            ledger.record(Action::FileCreated { path })?;
        }
        Ok(())
    }

    pub(crate) fn reload_panel(&self, summary: &mut InstallSummary) -> Result<StepOutcome> {
        restart_panel(self.runner, self.config.timeouts.command_secs)?;
        summary.panel_restarted = true;
        Ok(StepOutcome::Done("panel restarted".to_string()))
    }
}
