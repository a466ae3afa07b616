mod completion;
mod dispatch;
mod logging;
mod prompts;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::dispatch::run_cli;
use crate::render::{current_output_style, render_status_line};

#[derive(Parser, Debug)]
#[command(name = "xfwidget")]
#[command(about = "Install XFCE panel network widgets with rollback", long_about = None)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Directory holding the widget script bundle and optional xfwidget.toml"
    )]
    source_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Install packages, scripts, the settarget function and panel widgets")]
    Install {
        #[arg(long, help = "Reinstall over an existing copy without asking")]
        yes: bool,
    },
    #[command(about = "Undo an interrupted or failed install run")]
    Rollback { run_id: Option<String> },
    Doctor,
    Target {
        #[command(subcommand)]
        command: TargetCommands,
    },
    #[command(about = "Print the settarget shell function block")]
    ShellFunction,
    Completions { shell: Shell },
    Version,
}

#[derive(Subcommand, Debug)]
enum TargetCommands {
    Set { ip: String, name: String },
    Clear,
    Show,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err:#}");
            eprintln!(
                "{}",
                render_status_line(current_output_style(), "error", &format!("{err:#}"))
            );
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests;
