use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use xfwidget_core::InstallerConfig;

use crate::fs_utils::remove_file_if_exists;
use crate::journal::{
    clear_active_run, current_unix_timestamp, set_active_run, supersede_unsettled_runs,
    update_run_status, write_run_metadata, RunJournal, RunMetadata, RunStatus,
};
use crate::layout::HomeLayout;
use crate::ledger::ActionLedger;
use crate::preflight::{run_preflight, HostEnv};
use crate::rollback::rollback_actions;
use crate::runner::CommandRunner;
use crate::types::{
    InstallOutcome, InstallReporter, InstallState, InstallStep, InstallSummary, StepOutcome,
};

pub struct Installer<'a, R: ?Sized, H: ?Sized> {
    pub(crate) runner: &'a R,
    pub(crate) host: &'a H,
    pub(crate) layout: HomeLayout,
    pub(crate) config: InstallerConfig,
    cancel: Arc<AtomicBool>,
    state: InstallState,
}

impl<'a, R, H> Installer<'a, R, H>
where
    R: CommandRunner + ?Sized,
    H: HostEnv + ?Sized,
{
    pub fn new(runner: &'a R, host: &'a H, layout: HomeLayout, config: InstallerConfig) -> Self {
        Self {
            runner,
            host,
            layout,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            state: InstallState::Idle,
        }
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    pub fn layout(&self) -> &HomeLayout {
        &self.layout
    }

    fn set_state(&mut self, state: InstallState, reporter: &mut dyn InstallReporter) {
        log::debug!("install state {:?} -> {:?}", self.state, state);
        self.state = state;
        reporter.state_changed(state);
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn run(&mut self, reporter: &mut dyn InstallReporter) -> Result<InstallOutcome> {
        if self.state != InstallState::Idle {
            return Err(anyhow!("installer already ran (state {:?})", self.state));
        }

        self.set_state(InstallState::Checking, reporter);
        if let Err(err) = run_preflight(self.host, &self.layout, &self.config) {
            log::error!("preflight failed: {err}");
            self.set_state(InstallState::Aborted, reporter);
            return Ok(InstallOutcome {
                state: InstallState::Aborted,
                run_id: None,
                summary: InstallSummary::default(),
                failure: Some(err.to_string()),
                rollback: None,
            });
        }

        let run = match self.begin_run() {
            Ok(run) => run,
            Err(err) => {
                self.set_state(InstallState::Aborted, reporter);
                return Err(err);
            }
        };
        log::info!("install run {} started", run.run_id);

        let journal = RunJournal::new(self.layout.clone(), run.run_id.clone());
        let mut ledger = ActionLedger::with_journal(journal.clone());
        let mut summary = InstallSummary::default();
        let failure = self.run_steps(&mut ledger, &mut summary, reporter);

        let Some(failure) = failure else {
            update_run_status(&self.layout, &run.run_id, RunStatus::Committed)?;
            if let Err(err) = supersede_unsettled_runs(&self.layout, &run.run_id) {
                log::warn!("could not supersede earlier runs: {err:#}");
            }
            clear_active_run(&self.layout)?;
            log::info!("install run {} committed", run.run_id);
            self.set_state(InstallState::Completed, reporter);
            return Ok(InstallOutcome {
                state: InstallState::Completed,
                run_id: Some(run.run_id),
                summary,
                failure: None,
                rollback: None,
            });
        };

        log::error!("install run {} failed: {failure}", run.run_id);
        if let Err(err) = update_run_status(&self.layout, &run.run_id, RunStatus::RollingBack) {
            log::warn!("could not mark run {} as rolling back: {err:#}", run.run_id);
        }

        let entries = ledger.take_reversed();
        reporter.rollback_started(entries.len());
        let report = rollback_actions(
            self.runner,
            &self.layout,
            &self.config,
            entries,
            Some(&journal),
            |action, issue| reporter.action_undone(action, issue),
        );
        for id in &summary.removed_monitors {
            reporter.notice(&format!(
                "monitor plugin {id} was removed before the failure and is not restored"
            ));
        }
        if let Some(location) = summary.replaced_graph {
            reporter.notice(&format!(
                "the {} plugin removed from panel {} is not restored",
                self.config.graph_plugin_type, location.panel
            ));
        }

        let final_status = if report.is_clean() {
            RunStatus::RolledBack
        } else {
            RunStatus::Failed
        };
        if let Err(err) = update_run_status(&self.layout, &run.run_id, final_status) {
            log::warn!("could not record final status for run {}: {err:#}", run.run_id);
        }
        clear_active_run(&self.layout)?;
        log::info!(
            "install run {} rolled back ({} undone, {} issues)",
            run.run_id,
            report.undone.len(),
            report.issues.len()
        );

        self.set_state(InstallState::RolledBack, reporter);
        Ok(InstallOutcome {
            state: InstallState::RolledBack,
            run_id: Some(run.run_id),
            summary,
            failure: Some(failure),
            rollback: Some(report),
        })
    }

    fn begin_run(&self) -> Result<RunMetadata> {
        self.layout.ensure_state_dirs()?;
        let run = RunMetadata::new(current_unix_timestamp()?);
        write_run_metadata(&self.layout, &run)?;
        if let Err(err) = set_active_run(&self.layout, &run.run_id) {
            let _ = remove_file_if_exists(&self.layout.run_metadata_path(&run.run_id));
            return Err(err);
        }
        update_run_status(&self.layout, &run.run_id, RunStatus::Applying)?;
        Ok(run)
    }

    fn run_steps(
        &mut self,
        ledger: &mut ActionLedger,
        summary: &mut InstallSummary,
        reporter: &mut dyn InstallReporter,
    ) -> Option<String> {
        let total = InstallStep::ALL.len();
        for (index, step) in InstallStep::ALL.into_iter().enumerate() {
            if self.cancelled() {
                log::warn!("install cancelled before {step}");
                return Some(format!("cancelled before {step}"));
            }

            self.set_state(InstallState::Running(step), reporter);
            reporter.step_started(step, index + 1, total);
            log::info!("step {}/{total}: {step}", index + 1);

            match self
                .execute_step(step, ledger, summary, reporter)
                .with_context(|| format!("step '{step}' failed"))
            {
                Ok(outcome) => {
                    match &outcome {
                        StepOutcome::Done(detail) => log::info!("{step}: {detail}"),
                        StepOutcome::Skipped(reason) => log::info!("{step} skipped: {reason}"),
                    }
                    reporter.step_finished(step, &outcome);
                }
                Err(err) => {
                    reporter.step_failed(step, &err);
                    return Some(format!("{err:#}"));
                }
            }

            if self.config.step_delay_ms > 0 && index + 1 < total {
                thread::sleep(Duration::from_millis(self.config.step_delay_ms));
            }
        }
        None
    }

    fn execute_step(
        &self,
        step: InstallStep,
        ledger: &mut ActionLedger,
        summary: &mut InstallSummary,
        reporter: &mut dyn InstallReporter,
    ) -> Result<StepOutcome> {
        match step {
            InstallStep::InstallPackages => self.install_packages(ledger, summary, reporter),
            InstallStep::CopyBundle => self.copy_bundle(ledger, summary),
            InstallStep::MarkExecutable => self.mark_executable(summary),
            InstallStep::AppendShellFunction => self.append_shell_function(ledger, summary),
            InstallStep::RemoveMonitors => self.remove_monitors(summary),
            InstallStep::ReplaceGraph => self.replace_graph(ledger, summary),
            InstallStep::RestartPanel => self.reload_panel(summary),
        }
    }
}
