use std::fmt;
use std::path::PathBuf;

use xfwidget_core::{Action, PanelLocation, PluginId};

use crate::rollback::{RollbackIssue, RollbackReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    InstallPackages,
    CopyBundle,
    MarkExecutable,
    AppendShellFunction,
    RemoveMonitors,
    ReplaceGraph,
    RestartPanel,
}

impl InstallStep {
    pub const ALL: [InstallStep; 7] = [
        Self::InstallPackages,
        Self::CopyBundle,
        Self::MarkExecutable,
        Self::AppendShellFunction,
        Self::RemoveMonitors,
        Self::ReplaceGraph,
        Self::RestartPanel,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::InstallPackages => "install packages",
            Self::CopyBundle => "copy widget scripts",
            Self::MarkExecutable => "mark scripts executable",
            Self::AppendShellFunction => "add settarget shell function",
            Self::RemoveMonitors => "remove existing monitor widgets",
            Self::ReplaceGraph => "replace graph widget with monitors",
            Self::RestartPanel => "restart panel",
        }
    }
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Idle,
    Checking,
    Running(InstallStep),
    Completed,
    RolledBack,
    Aborted,
}

impl InstallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::RolledBack | Self::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done(String),
    Skipped(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallSummary {
    pub packages_installed: Vec<String>,
    pub packages_present: Vec<String>,
    pub packages_failed: Vec<String>,
    pub bundle_dir: Option<PathBuf>,
    pub bundle_backup: Option<PathBuf>,
    pub executables: Vec<PathBuf>,
    pub shell_rc: Option<PathBuf>,
    pub removed_monitors: Vec<PluginId>,
    pub replaced_graph: Option<PanelLocation>,
    pub monitors_created: Vec<PluginId>,
    pub separators_created: Vec<PluginId>,
    pub panel_restarted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub state: InstallState,
    pub run_id: Option<String>,
    pub summary: InstallSummary,
    pub failure: Option<String>,
    pub rollback: Option<RollbackReport>,
}

impl InstallOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == InstallState::Completed
    }
}

pub trait InstallReporter {
    fn state_changed(&mut self, _state: InstallState) {}
    fn step_started(&mut self, _step: InstallStep, _position: usize, _total: usize) {}
    fn step_finished(&mut self, _step: InstallStep, _outcome: &StepOutcome) {}
    fn step_failed(&mut self, _step: InstallStep, _error: &anyhow::Error) {}
    fn package_progress(&mut self, _name: &str, _done: usize, _total: usize) {}
    fn notice(&mut self, _message: &str) {}
    fn rollback_started(&mut self, _actions: usize) {}
    fn action_undone(&mut self, _action: &Action, _issue: Option<&RollbackIssue>) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl InstallReporter for NoopReporter {}
