use super::*;
use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::CommandFactory;
use tempfile::TempDir;
use xfwidget_core::{Action, InstallerConfig, PluginId};
use xfwidget_installer::{HomeLayout, InstallSummary, RollbackIssue, RollbackReport};

use crate::completion::write_completions_script;
use crate::dispatch::{default_source_dir, load_config};
use crate::logging::{format_log_line, log_file_candidates, open_first_writable};
use crate::render::{
    format_elapsed, render_progress_line, rollback_report_lines, summary_lines, undo_line,
    OutputStyle,
};

fn plugin_id(value: u32) -> PluginId {
    PluginId::new(value).expect("positive id")
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn install_accepts_yes_flag() {
    let cli = Cli::try_parse_from(["xfwidget", "install", "--yes"]).expect("must parse");
    assert!(matches!(cli.command, Commands::Install { yes: true }));
}

#[test]
fn global_options_parse_after_subcommand() {
    let cli = Cli::try_parse_from([
        "xfwidget",
        "doctor",
        "--source-dir",
        "/opt/widgets",
        "--config",
        "/tmp/xfwidget.toml",
    ])
    .expect("must parse");
    assert!(matches!(cli.command, Commands::Doctor));
    assert_eq!(cli.source_dir, Some(PathBuf::from("/opt/widgets")));
    assert_eq!(cli.config, Some(PathBuf::from("/tmp/xfwidget.toml")));
}

#[test]
fn rollback_run_id_is_optional() {
    let bare = Cli::try_parse_from(["xfwidget", "rollback"]).expect("must parse");
    assert!(matches!(bare.command, Commands::Rollback { run_id: None }));

    let explicit =
        Cli::try_parse_from(["xfwidget", "rollback", "run-1700000000-42"]).expect("must parse");
    match explicit.command {
        Commands::Rollback { run_id } => assert_eq!(run_id.as_deref(), Some("run-1700000000-42")),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn target_set_requires_ip_and_name() {
    let cli = Cli::try_parse_from(["xfwidget", "target", "set", "10.10.11.5", "box"])
        .expect("must parse");
    match cli.command {
        Commands::Target {
            command: TargetCommands::Set { ip, name },
        } => {
            assert_eq!(ip, "10.10.11.5");
            assert_eq!(name, "box");
        }
        other => panic!("unexpected command: {other:?}"),
    }

    assert!(Cli::try_parse_from(["xfwidget", "target", "set", "10.10.11.5"]).is_err());
}

#[test]
fn completions_rejects_unknown_shell() {
    assert!(Cli::try_parse_from(["xfwidget", "completions", "bash"]).is_ok());
    assert!(Cli::try_parse_from(["xfwidget", "completions", "tcsh"]).is_err());
}

#[test]
fn bash_completions_cover_subcommands() {
    let mut out = Vec::new();
    write_completions_script(Shell::Bash, &mut out).expect("must write completions");
    let script = String::from_utf8(out).expect("must be utf-8");
    assert!(script.contains("xfwidget"));
    assert!(script.contains("rollback"));
    assert!(script.contains("shell-function"));
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "copied to /home/kali/.config/bin"),
        "copied to /home/kali/.config/bin"
    );
}

#[test]
fn render_status_line_rich_includes_ascii_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "panel restarted"),
        "[OK] panel restarted"
    );
}

#[test]
fn render_status_line_rich_formats_warning_and_error() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "package xclip was not installed"),
        "[WARN] package xclip was not installed"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "error", "install failed"),
        "[ERR] install failed"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "skip", "settarget already defined"),
        "[SKIP] settarget already defined"
    );
}

#[test]
fn undo_line_distinguishes_manual_cleanup() {
    let action = Action::FileAppended {
        path: PathBuf::from("/home/kali/.zshrc"),
        appended_text: "block".to_string(),
    };
    assert_eq!(
        undo_line(&action, None),
        "undid appended block in /home/kali/.zshrc"
    );

    let issue = RollbackIssue {
        action: action.clone(),
        message: "block was edited".to_string(),
        manual_cleanup: true,
    };
    assert_eq!(
        undo_line(&action, Some(&issue)),
        "manual cleanup needed for appended block in /home/kali/.zshrc: block was edited"
    );
}

#[test]
fn rollback_report_lines_list_issues() {
    let package = Action::PackageInstalled {
        name: "jp2a".to_string(),
    };
    let plugin = Action::PanelPluginCreated { id: plugin_id(7) };
    let report = RollbackReport {
        undone: vec![package],
        issues: vec![RollbackIssue {
            action: plugin,
            message: "xfconf-query timed out".to_string(),
            manual_cleanup: false,
        }],
    };

    let lines = rollback_report_lines(OutputStyle::Rich, &report);
    assert_eq!(
        lines,
        vec![
            "[OK] undid 1 of 2 recorded changes".to_string(),
            "[ERR] could not undo panel plugin 7: xfconf-query timed out".to_string(),
        ]
    );
}

#[test]
fn rollback_report_lines_for_empty_ledger() {
    let lines = rollback_report_lines(OutputStyle::Plain, &RollbackReport::default());
    assert_eq!(lines, vec!["nothing was recorded; no changes to undo".to_string()]);
}

#[test]
fn summary_lines_pair_monitors_with_created_plugins() {
    let config = InstallerConfig::default();
    let summary = InstallSummary {
        packages_installed: vec!["jp2a".to_string()],
        packages_failed: vec!["xclip".to_string()],
        shell_rc: Some(PathBuf::from("/home/kali/.zshrc")),
        monitors_created: vec![plugin_id(5), plugin_id(7), plugin_id(9)],
        ..InstallSummary::default()
    };

    let lines = summary_lines(&summary, &config);
    assert_eq!(lines.len(), 6);
    assert!(lines[0].contains("target"));
    assert!(lines[0].contains("panel plugin 5 running target.sh"));
    assert!(lines[1].contains("panel plugin 7 running vpnip.sh"));
    assert!(lines[2].contains("panel plugin 9 running ethernet.sh"));
    assert!(lines[3].contains("shell function in /home/kali/.zshrc"));
    assert!(lines[4].ends_with("jp2a"));
    assert!(lines[5].contains("xclip (install by hand)"));
}

#[test]
fn summary_lines_note_missing_shell_function() {
    let lines = summary_lines(&InstallSummary::default(), &InstallerConfig::default());
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("settarget"));
    assert!(lines[0].contains("not added"));
}

#[test]
fn log_candidates_prefer_executable_dir() {
    let layout = HomeLayout::new("/home/kali", "/opt/widgets");
    let candidates =
        log_file_candidates(Some(Path::new("/opt/widgets")), &layout, "20240102-030405");
    assert_eq!(
        candidates,
        vec![
            PathBuf::from("/opt/widgets/install.log"),
            PathBuf::from("/opt/widgets/install-20240102-030405.log"),
            layout.state_dir().join("install.log"),
        ]
    );

    let without_exe = log_file_candidates(None, &layout, "20240102-030405");
    assert_eq!(without_exe, vec![layout.state_dir().join("install.log")]);
}

#[test]
fn open_first_writable_skips_unusable_locations() {
    let tmp = TempDir::new().expect("must create temp dir");
    let missing = tmp.path().join("missing").join("install.log");
    let usable = tmp.path().join("install-1.log");

    let (path, _file) =
        open_first_writable(&[missing, usable.clone()]).expect("must open a candidate");
    assert_eq!(path, usable);
    assert!(usable.exists());
}

#[test]
fn log_lines_use_dash_separated_fields() {
    assert_eq!(
        format_log_line("2024-01-02 03:04:05", log::Level::Warn, "panel restart failed"),
        "2024-01-02 03:04:05 - WARN - panel restart failed"
    );
}

#[test]
fn source_dir_defaults_to_exe_dir_with_bundle() {
    let tmp = TempDir::new().expect("must create temp dir");
    let exe_dir = tmp.path().join("release");
    let cwd = tmp.path().join("work");
    fs::create_dir_all(exe_dir.join("bin")).expect("must create bundle dir");

    assert_eq!(default_source_dir(Some(&exe_dir), &cwd, "bin"), exe_dir);
    assert_eq!(default_source_dir(Some(&exe_dir), &cwd, "scripts"), cwd);
    assert_eq!(default_source_dir(None, &cwd, "bin"), cwd);
}

#[test]
fn config_defaults_when_source_has_none() {
    let tmp = TempDir::new().expect("must create temp dir");
    let config = load_config(None, tmp.path()).expect("must load default config");
    assert_eq!(config, InstallerConfig::default());
}

#[test]
fn config_is_read_from_source_dir() {
    let tmp = TempDir::new().expect("must create temp dir");
    fs::write(tmp.path().join("xfwidget.toml"), "step_delay_ms = 250\n")
        .expect("must write config");

    let config = load_config(None, tmp.path()).expect("must load config");
    assert_eq!(config.step_delay_ms, 250);
    assert_eq!(config.packages, InstallerConfig::default().packages);
}

#[test]
fn explicit_config_must_exist() {
    let tmp = TempDir::new().expect("must create temp dir");
    let missing = tmp.path().join("nope.toml");
    let err = load_config(Some(&missing), tmp.path()).expect_err("must fail");
    assert!(format!("{err:#}").contains("failed to read config"));
}

#[test]
fn invalid_config_names_the_file() {
    let tmp = TempDir::new().expect("must create temp dir");
    let path = tmp.path().join("broken.toml");
    fs::write(&path, "unknown_key = true\n").expect("must write config");

    let err = load_config(Some(&path), tmp.path()).expect_err("must fail");
    assert!(format!("{err:#}").contains("invalid config"));
}

#[test]
fn elapsed_is_rendered_with_millis() {
    assert_eq!(format_elapsed(Duration::from_millis(1_250)), "1.250s");
}

#[test]
fn progress_line_is_rich_only() {
    assert_eq!(
        render_progress_line(OutputStyle::Plain, "packages", 1, 2, None),
        None
    );

    let line = render_progress_line(
        OutputStyle::Rich,
        "packages",
        1,
        2,
        Some(Duration::from_millis(2_500)),
    )
    .expect("rich style must render a line");
    assert!(line.contains(" 50% 1/2"));
    assert!(line.ends_with("complete in 2.500s"));
}
