use std::env;
use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use xfwidget_core::{Action, InstallerConfig};
use xfwidget_installer::{
    InstallReporter, InstallStep, InstallSummary, RollbackIssue, RollbackReport, StepOutcome,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum UiMode {
    Plain,
    Interactive,
}

pub(crate) fn current_output_style() -> OutputStyle {
    if std::io::stdout().is_terminal() && env::var_os("NO_COLOR").is_none() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "error" => "[ERR]",
        "skip" => "[SKIP]",
        "step" => "[..]",
        _ => "[--]",
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
    mode: UiMode,
}

pub(crate) struct TerminalProgress {
    style: OutputStyle,
    label: String,
    total: u64,
    current: u64,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self {
            style,
            mode: ui_mode_from_style(style),
        }
    }

    pub(crate) fn current() -> Self {
        Self::from_style(current_output_style())
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_section(self, title: &str) {
        if let Some(line) = render_section_header(self.mode, title) {
            println!();
            let rendered = match self.style {
                OutputStyle::Plain => line,
                OutputStyle::Rich => colorize(section_style(), &line),
            };
            println!("{rendered}");
        }
    }

    pub(crate) fn start_progress(self, label: &str, total: u64) -> TerminalProgress {
        let progress_bar = if self.style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new(total.max(1));
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<12} [{bar:20.cyan/blue}] {pos:>3}/{len:3} {elapsed_precise}",
            ) {
                progress_bar.set_style(style.tick_chars(".oO@* ").progress_chars("=>-"));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        TerminalProgress {
            style: self.style,
            label: label.to_string(),
            total,
            current: 0,
            progress_bar,
            started_at: Instant::now(),
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }
}

impl TerminalProgress {
    fn set(&mut self, current: u64, message: &str) {
        self.current = current.min(self.total);

        let Some(progress_bar) = &self.progress_bar else {
            return;
        };

        let safe_total = self.total.max(1);
        progress_bar.set_length(safe_total);
        progress_bar.set_position(self.current.min(safe_total));
        if !message.is_empty() {
            progress_bar.set_message(message.to_string());
        }
    }

    fn println(&self, line: &str) {
        match &self.progress_bar {
            Some(progress_bar) => progress_bar.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }
    }

    fn finish_success(mut self) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };

        progress_bar.finish_and_clear();
        if let Some(line) = render_progress_line(
            self.style,
            &self.label,
            self.current,
            self.total,
            Some(self.started_at.elapsed()),
        ) {
            println!("{line}");
        }
    }

    fn finish_abandon(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

pub(crate) struct InstallView {
    renderer: TerminalRenderer,
    progress: Option<TerminalProgress>,
}

impl InstallView {
    pub(crate) fn new(renderer: TerminalRenderer) -> Self {
        Self {
            renderer,
            progress: None,
        }
    }

    fn status(&self, status: &str, message: &str) {
        let line = render_status_line(self.renderer.style(), status, message);
        match &self.progress {
            Some(progress) => progress.println(&line),
            None => println!("{line}"),
        }
    }

    fn finish_progress(&mut self, success: bool) {
        if let Some(progress) = self.progress.take() {
            if success {
                progress.finish_success();
            } else {
                progress.finish_abandon();
            }
        }
    }
}

impl InstallReporter for InstallView {
    fn step_started(&mut self, step: InstallStep, position: usize, total: usize) {
        self.renderer.print_section(&format!("{position}/{total} {step}"));
        if self.renderer.style() == OutputStyle::Plain {
            self.status("step", &format!("({position}/{total}) {step}"));
        }
    }

    fn step_finished(&mut self, step: InstallStep, outcome: &StepOutcome) {
        self.finish_progress(true);
        match outcome {
            StepOutcome::Done(detail) => self.status("ok", &format!("{step}: {detail}")),
            StepOutcome::Skipped(reason) => self.status("skip", &format!("{step}: {reason}")),
        }
    }

    fn step_failed(&mut self, step: InstallStep, error: &anyhow::Error) {
        self.finish_progress(false);
        self.status("error", &format!("{step}: {error:#}"));
    }

    fn package_progress(&mut self, name: &str, done: usize, total: usize) {
        if self.progress.is_none() && done < total {
            self.progress = Some(self.renderer.start_progress("packages", total as u64));
        }
        if let Some(progress) = self.progress.as_mut() {
            progress.set(done as u64, name);
        }
        if done >= total {
            self.finish_progress(true);
        }
    }

    fn notice(&mut self, message: &str) {
        self.status("warn", message);
    }

    fn rollback_started(&mut self, actions: usize) {
        self.finish_progress(false);
        self.renderer.print_section("rollback");
        self.status("warn", &format!("undoing {actions} recorded changes"));
    }

    fn action_undone(&mut self, action: &Action, issue: Option<&RollbackIssue>) {
        let line = undo_line(action, issue);
        match issue {
            None => self.status("ok", &line),
            Some(issue) if issue.manual_cleanup => self.status("warn", &line),
            Some(_) => self.status("error", &line),
        }
    }
}

pub(crate) fn undo_line(action: &Action, issue: Option<&RollbackIssue>) -> String {
    match issue {
        None => format!("undid {action}"),
        Some(issue) if issue.manual_cleanup => {
            format!("manual cleanup needed for {action}: {}", issue.message)
        }
        Some(issue) => format!("could not undo {action}: {}", issue.message),
    }
}

pub(crate) fn summary_lines(summary: &InstallSummary, config: &InstallerConfig) -> Vec<String> {
    let mut lines = Vec::new();
    for (monitor, id) in config.monitors.iter().zip(&summary.monitors_created) {
        lines.push(format!(
            "  {:<17} -> panel plugin {id} running {}",
            monitor_label(&monitor.script),
            monitor.script
        ));
    }
    match &summary.shell_rc {
        Some(rc) => lines.push(format!(
            "  {:<17} -> shell function in {}",
            "settarget",
            rc.display()
        )),
        None => lines.push(format!(
            "  {:<17} -> not added (already defined or unsupported shell)",
            "settarget"
        )),
    }
    if !summary.packages_installed.is_empty() {
        lines.push(format!(
            "  {:<17} -> {}",
            "packages",
            summary.packages_installed.join(", ")
        ));
    }
    if !summary.packages_failed.is_empty() {
        lines.push(format!(
            "  {:<17} -> {} (install by hand)",
            "missing packages",
            summary.packages_failed.join(", ")
        ));
    }
    if let Some(backup) = &summary.bundle_backup {
        lines.push(format!(
            "  {:<17} -> {}",
            "previous scripts",
            backup.display()
        ));
    }
    lines
}

fn monitor_label(script: &str) -> &str {
    script.strip_suffix(".sh").unwrap_or(script)
}

pub(crate) fn rollback_report_lines(style: OutputStyle, report: &RollbackReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.undone.is_empty() && report.issues.is_empty() {
        lines.push(render_status_line(style, "ok", "nothing was recorded; no changes to undo"));
        return lines;
    }
    let recorded = report.undone.len() + report.issues.len();
    lines.push(render_status_line(
        style,
        "ok",
        &format!("undid {} of {recorded} recorded changes", report.undone.len()),
    ));
    for issue in &report.issues {
        let status = if issue.manual_cleanup { "warn" } else { "error" };
        lines.push(render_status_line(
            style,
            status,
            &undo_line(&issue.action, Some(issue)),
        ));
    }
    lines
}

pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn progress_bar_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::BrightBlue.into()))
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn ui_mode_from_style(style: OutputStyle) -> UiMode {
    match style {
        OutputStyle::Plain => UiMode::Plain,
        OutputStyle::Rich => UiMode::Interactive,
    }
}

fn render_section_header(mode: UiMode, title: &str) -> Option<String> {
    match mode {
        UiMode::Plain => None,
        UiMode::Interactive => Some(format!("== {title} ==")),
    }
}

pub(crate) fn render_progress_line(
    style: OutputStyle,
    label: &str,
    current: u64,
    total: u64,
    elapsed: Option<Duration>,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }

    let width = 18_usize;
    let safe_total = total.max(1);
    let bounded_current = current.min(safe_total);
    let filled = ((bounded_current as usize) * width) / (safe_total as usize);
    let bar = format!(
        "{}{}",
        "=".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    let percent = (bounded_current * 100) / safe_total;
    let counts = format!("{}/{}", HumanCount(current), HumanCount(total));
    let suffix = elapsed
        .map(|value| format!(" complete in {}", format_elapsed(value)))
        .unwrap_or_default();

    Some(format!(
        "{} [{}] {:>3}% {}{}",
        colorize(progress_label_style(), label),
        colorize(progress_bar_style(), &bar),
        percent,
        counts,
        suffix
    ))
}
