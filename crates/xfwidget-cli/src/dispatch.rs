use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use xfwidget_core::{render_settarget_block, InstallerConfig, TargetSpec, CONFIG_FILE_NAME};
use xfwidget_installer::{
    check_all, clear_target, latest_unsettled_run, read_active_run, read_run_metadata,
    read_target, recover_run, run_owner_alive, run_preflight, write_target, HomeLayout,
    InstallState, Installer, RecoveryOutcome, SystemHost, SystemRunner,
};

use crate::completion::write_completions_script;
use crate::logging::init_install_log;
use crate::prompts::{confirm_reinstall, PasswordPrompt};
use crate::render::{
    rollback_report_lines, summary_lines, undo_line, InstallView, TerminalRenderer,
};
use crate::{Cli, Commands, TargetCommands};

struct CliContext {
    layout: HomeLayout,
    config: InstallerConfig,
}

pub(crate) fn run_cli(cli: Cli) -> Result<ExitCode> {
    let renderer = TerminalRenderer::current();

    match cli.command {
        Commands::Version => {
            println!("xfwidget {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { shell } => {
            let mut stdout = io::stdout().lock();
            write_completions_script(shell, &mut stdout)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ShellFunction => {
            let context = resolve_context(cli.source_dir, cli.config.as_deref())?;
            print!("{}", render_settarget_block(&context.layout.target_file()));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Target { command } => {
            let context = resolve_context(cli.source_dir, cli.config.as_deref())?;
            run_target_command(&context.layout, command, renderer)
        }
        Commands::Doctor => {
            let context = resolve_context(cli.source_dir, cli.config.as_deref())?;
            run_doctor(&context, renderer)
        }
        Commands::Install { yes } => {
            let context = resolve_context(cli.source_dir, cli.config.as_deref())?;
            run_install(context, yes, renderer)
        }
        Commands::Rollback { run_id } => {
            let context = resolve_context(cli.source_dir, cli.config.as_deref())?;
            run_rollback(&context, run_id.as_deref(), renderer)
        }
    }
}

fn resolve_context(source_dir: Option<PathBuf>, config_path: Option<&Path>) -> Result<CliContext> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine the home directory"))?;
    let source_dir = match source_dir {
        Some(dir) => dir,
        None => {
            let exe_dir = env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf));
            let cwd = env::current_dir().context("failed to read the current directory")?;
            default_source_dir(exe_dir.as_deref(), &cwd, &InstallerConfig::default().bundle_dir)
        }
    };
    let config = load_config(config_path, &source_dir)?;
    let layout = HomeLayout::new(home, source_dir).with_bundle_dir_name(config.bundle_dir.clone());
    Ok(CliContext { layout, config })
}

pub(crate) fn default_source_dir(exe_dir: Option<&Path>, cwd: &Path, bundle_dir: &str) -> PathBuf {
    match exe_dir {
        Some(dir) if dir.join(bundle_dir).is_dir() => dir.to_path_buf(),
        _ => cwd.to_path_buf(),
    }
}

pub(crate) fn load_config(explicit: Option<&Path>, source_dir: &Path) -> Result<InstallerConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = source_dir.join(CONFIG_FILE_NAME);
            if !candidate.exists() {
                return Ok(InstallerConfig::default());
            }
            candidate
        }
    };
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    InstallerConfig::from_toml_str(&raw)
        .with_context(|| format!("invalid config {}", path.display()))
}

fn run_install(context: CliContext, yes: bool, renderer: TerminalRenderer) -> Result<ExitCode> {
    let log_path = init_install_log(&context.layout);
    log::info!("xfwidget {} install", env!("CARGO_PKG_VERSION"));

    let host = SystemHost;
    renderer.print_section("preflight");
    if let Err(err) = run_preflight(&host, &context.layout, &context.config) {
        renderer.print_status("error", &err.to_string());
        return Ok(ExitCode::FAILURE);
    }
    renderer.print_status("ok", "system checks passed");

    let bundle_dir = context.layout.bundle_dir();
    if bundle_dir.exists() && !yes && !confirm_reinstall(&bundle_dir)? {
        renderer.print_status("warn", "reinstall declined; nothing changed");
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    if let Err(err) = ctrlc::set_handler(move || {
        if !handler_flag.swap(true, Ordering::SeqCst) {
            eprintln!("interrupt received; stopping and rolling back after the current step");
        }
    }) {
        log::warn!("could not install the interrupt handler: {err}");
    }

    let runner = SystemRunner::new(PasswordPrompt);
    let config = context.config.clone();
    let mut installer = Installer::new(&runner, &host, context.layout, context.config)
        .with_cancel_flag(cancel);
    let mut view = InstallView::new(renderer);
    let outcome = match installer.run(&mut view) {
        Ok(outcome) => outcome,
        Err(err) => {
            if installer.state() == InstallState::Aborted {
                renderer.print_status(
                    "warn",
                    "if a previous run was interrupted, `xfwidget rollback` undoes it",
                );
            }
            return Err(err);
        }
    };

    let log_hint = log_path
        .map(|path| format!("details in {}", path.display()))
        .unwrap_or_else(|| "no install log could be written".to_string());
    match outcome.state {
        InstallState::Completed => {
            renderer.print_section("installed features");
            renderer.print_lines(&summary_lines(&outcome.summary, &config));
            println!();
            renderer.print_status(
                "ok",
                "click an IP in the panel to copy it; use `settarget <IP> <NAME>` to set the target",
            );
            renderer.print_status(
                "warn",
                "if the panel disappears briefly, run `xfce4-panel --restart` or log in again",
            );
            Ok(ExitCode::SUCCESS)
        }
        InstallState::Aborted => {
            let reason = outcome.failure.unwrap_or_else(|| "preflight failed".to_string());
            renderer.print_status("error", &reason);
            Ok(ExitCode::FAILURE)
        }
        _ => {
            let reason = outcome.failure.unwrap_or_else(|| "install failed".to_string());
            renderer.print_status("error", &format!("install failed: {reason}"));
            if let Some(report) = &outcome.rollback {
                renderer.print_lines(&rollback_report_lines(renderer.style(), report));
            }
            renderer.print_status("warn", &log_hint);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_rollback(
    context: &CliContext,
    run_id: Option<&str>,
    renderer: TerminalRenderer,
) -> Result<ExitCode> {
    init_install_log(&context.layout);
    let runner = SystemRunner::new(PasswordPrompt);
    renderer.print_section("rollback");

    let outcome = recover_run(
        &runner,
        &context.layout,
        &context.config,
        run_id,
        |action, issue| {
            let status = match issue {
                None => "ok",
                Some(issue) if issue.manual_cleanup => "warn",
                Some(_) => "error",
            };
            renderer.print_status(status, &undo_line(action, issue));
        },
    )?;

    match outcome {
        RecoveryOutcome::NothingToRollBack => {
            renderer.print_status("ok", "no rollback needed");
            Ok(ExitCode::SUCCESS)
        }
        RecoveryOutcome::AlreadySettled { run_id, status } => {
            renderer.print_status("ok", &format!("run {run_id} is {status}; no rollback needed"));
            Ok(ExitCode::SUCCESS)
        }
        RecoveryOutcome::RolledBack { run_id, report } => {
            renderer.print_lines(&rollback_report_lines(renderer.style(), &report));
            if report.is_clean() {
                renderer.print_status("ok", &format!("run {run_id} rolled back"));
                Ok(ExitCode::SUCCESS)
            } else {
                renderer.print_status(
                    "error",
                    &format!(
                        "run {run_id} rolled back with {} issues",
                        report.issues.len()
                    ),
                );
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn run_doctor(context: &CliContext, renderer: TerminalRenderer) -> Result<ExitCode> {
    let layout = &context.layout;
    renderer.print_section("system");
    let checks = check_all(&SystemHost, layout, &context.config);
    let mut healthy = true;
    for check in &checks {
        match &check.outcome {
            Ok(()) => renderer.print_status("ok", check.name),
            Err(err) => {
                healthy = false;
                renderer.print_status("error", &format!("{}: {err}", check.name));
            }
        }
    }

    renderer.print_section("paths");
    renderer.print_status("info", &format!("source: {}", layout.source_bundle_dir().display()));
    renderer.print_status("info", &format!("scripts: {}", layout.bundle_dir().display()));
    renderer.print_status("info", &format!("state: {}", layout.state_dir().display()));

    renderer.print_section("runs");
    match read_active_run(layout)? {
        Some(run_id) => match read_run_metadata(layout, &run_id)? {
            Some(metadata) if run_owner_alive(&metadata) => {
                renderer.print_status("warn", &format!("run {run_id} is in progress"));
            }
            Some(metadata) => {
                healthy = false;
                renderer.print_status(
                    "error",
                    &format!(
                        "run {run_id} was interrupted ({}); run `xfwidget rollback`",
                        metadata.status
                    ),
                );
            }
            None => {
                healthy = false;
                renderer.print_status(
                    "error",
                    &format!("active marker names unknown run {run_id}; run `xfwidget rollback`"),
                );
            }
        },
        None => match latest_unsettled_run(layout)? {
            Some(metadata) => {
                healthy = false;
                renderer.print_status(
                    "warn",
                    &format!(
                        "run {} did not finish cleanly ({}); `xfwidget rollback {}` retries it",
                        metadata.run_id, metadata.status, metadata.run_id
                    ),
                );
            }
            None => renderer.print_status("ok", "no interrupted runs"),
        },
    }

    renderer.print_section("target");
    match read_target(layout)? {
        Some(target) => renderer.print_status("ok", &format!("{} ({})", target.name, target.address)),
        None => renderer.print_status("info", "no target set"),
    }

    Ok(if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_target_command(
    layout: &HomeLayout,
    command: TargetCommands,
    renderer: TerminalRenderer,
) -> Result<ExitCode> {
    match command {
        TargetCommands::Set { ip, name } => {
            let target = TargetSpec::parse(&ip, &name)?;
            write_target(layout, &target)?;
            renderer.print_status(
                "ok",
                &format!("target set to {} ({})", target.name, target.address),
            );
        }
        TargetCommands::Clear => {
            if clear_target(layout)? {
                renderer.print_status("ok", "target cleared");
            } else {
                renderer.print_status("info", "no target to clear");
            }
        }
        TargetCommands::Show => match read_target(layout)? {
            Some(target) => {
                renderer.print_status("ok", &format!("{} {}", target.address, target.name))
            }
            None => renderer.print_status("info", "no target set"),
        },
    }
    Ok(ExitCode::SUCCESS)
}
