mod fs_utils;
mod journal;
mod layout;
mod ledger;
mod orchestrator;
mod packages;
mod panel;
mod preflight;
mod rollback;
mod runner;
mod shell;
mod steps;
mod targets;
mod types;
mod xfconf;

pub use fs_utils::{copy_dir_recursive, create_dir_all_tracked, remove_file_if_exists, set_executable};
pub use journal::{
    append_journal_entry, append_undo_marker, clear_active_run, current_unix_timestamp,
    is_valid_run_id, latest_unsettled_run, outstanding_journal_entries, read_active_run,
    read_journal, read_run_metadata, run_owner_alive, set_active_run, supersede_unsettled_runs,
    update_run_status, write_run_metadata, JournalEntry, RunJournal, RunMetadata, RunStatus,
    UndoMarker, RUN_METADATA_VERSION,
};
pub use layout::HomeLayout;
pub use ledger::ActionLedger;
pub use orchestrator::Installer;
pub use packages::PackageManager;
pub use panel::{restart_panel, PanelPluginManager, RemovalReport};
pub use preflight::{
    check_all, run_preflight, HostEnv, PreflightCheck, PreflightError, SystemHost, DEBIAN_MARKER,
};
pub use rollback::{recover_run, rollback_actions, RecoveryOutcome, RollbackIssue, RollbackReport};
pub use runner::{
    CommandFailure, CommandFailureKind, CommandOutput, CommandRequest, CommandResult,
    CommandRunner, Credential, CredentialSource, SystemRunner, DEFAULT_COMMAND_TIMEOUT,
};
pub use shell::{append_settarget_block, rc_has_settarget, AppendOutcome, ShellKind};
pub use targets::{clear_target, read_target, write_target};
pub use types::{
    InstallOutcome, InstallReporter, InstallState, InstallStep, InstallSummary, NoopReporter,
    StepOutcome,
};
pub use xfconf::{ValueType, XfconfClient, XFCONF_QUERY};
