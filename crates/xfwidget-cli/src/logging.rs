use std::env;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use env_logger::{Builder, Env, Target};
use xfwidget_installer::HomeLayout;

const LOG_FILE_NAME: &str = "install.log";

pub(crate) fn init_install_log(layout: &HomeLayout) -> Option<PathBuf> {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
    let candidates = log_file_candidates(exe_dir.as_deref(), layout, &stamp);
    if let Err(err) = layout.ensure_state_dirs() {
        eprintln!("could not create {}: {err:#}", layout.state_dir().display());
    }
    let (path, file) = open_first_writable(&candidates)?;

    let initialized = Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            writeln!(
                buf,
                "{}",
                format_log_line(&timestamp, record.level(), &record.args().to_string())
            )
        })
        .try_init();
    if initialized.is_err() {
        return None;
    }
    Some(path)
}

pub(crate) fn log_file_candidates(
    exe_dir: Option<&Path>,
    layout: &HomeLayout,
    stamp: &str,
) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = exe_dir {
        candidates.push(dir.join(LOG_FILE_NAME));
        candidates.push(dir.join(format!("install-{stamp}.log")));
    }
    candidates.push(layout.state_dir().join(LOG_FILE_NAME));
    candidates
}

pub(crate) fn open_first_writable(candidates: &[PathBuf]) -> Option<(PathBuf, File)> {
    candidates.iter().find_map(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
            .map(|file| (path.clone(), file))
    })
}

pub(crate) fn format_log_line(timestamp: &str, level: log::Level, message: &str) -> String {
    format!("{timestamp} - {level} - {message}")
}
