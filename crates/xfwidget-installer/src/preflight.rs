use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;
use xfwidget_core::InstallerConfig;

use crate::layout::HomeLayout;

pub const DEBIAN_MARKER: &str = "/etc/debian_version";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreflightError {
    #[error("refusing to run as root; run as your desktop user and sudo will be used when needed")]
    RunningAsRoot,
    #[error("this installer supports Debian-based systems only (/etc/debian_version not found)")]
    UnsupportedDistribution,
    #[error("sudo is not installed")]
    SudoUnavailable,
    #[error("source bundle directory not found: {}", .0.display())]
    MissingBundle(PathBuf),
    #[error("required script missing from bundle: {}", .0.display())]
    MissingScript(PathBuf),
    #[error("an XFCE session is required (XDG_CURRENT_DESKTOP={0})")]
    NotXfce(String),
}

pub trait HostEnv {
    fn is_root(&self) -> bool;
    fn path_exists(&self, path: &Path) -> bool;
    fn var(&self, key: &str) -> Option<String>;
    fn has_program(&self, program: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostEnv for SystemHost {
    #[cfg(unix)]
    fn is_root(&self) -> bool {
        use std::os::unix::fs::MetadataExt;

        std::fs::metadata("/proc/self")
            .map(|metadata| metadata.uid() == 0)
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    fn is_root(&self) -> bool {
        false
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    fn has_program(&self, program: &str) -> bool {
        env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightCheck {
    pub name: &'static str,
    pub outcome: Result<(), PreflightError>,
}

pub fn check_all<H: HostEnv + ?Sized>(
    host: &H,
    layout: &HomeLayout,
    config: &InstallerConfig,
) -> Vec<PreflightCheck> {
    vec![
        PreflightCheck {
            name: "user",
            outcome: check_not_root(host),
        },
        PreflightCheck {
            name: "distribution",
            outcome: check_distribution(host),
        },
        PreflightCheck {
            name: "sudo",
            outcome: check_sudo(host),
        },
        PreflightCheck {
            name: "bundle",
            outcome: check_bundle(host, layout, config),
        },
        PreflightCheck {
            name: "desktop",
            outcome: check_desktop(host),
        },
    ]
}

pub fn run_preflight<H: HostEnv + ?Sized>(
    host: &H,
    layout: &HomeLayout,
    config: &InstallerConfig,
) -> Result<(), PreflightError> {
    for check in check_all(host, layout, config) {
        check.outcome?;
        log::info!("preflight {} ok", check.name);
    }
    Ok(())
}

fn check_not_root<H: HostEnv + ?Sized>(host: &H) -> Result<(), PreflightError> {
    if host.is_root() {
        return Err(PreflightError::RunningAsRoot);
    }
    Ok(())
}

fn check_distribution<H: HostEnv + ?Sized>(host: &H) -> Result<(), PreflightError> {
    if !host.path_exists(Path::new(DEBIAN_MARKER)) {
        return Err(PreflightError::UnsupportedDistribution);
    }
    Ok(())
}

fn check_sudo<H: HostEnv + ?Sized>(host: &H) -> Result<(), PreflightError> {
    if !host.has_program("sudo") {
        return Err(PreflightError::SudoUnavailable);
    }
    Ok(())
}

fn check_bundle<H: HostEnv + ?Sized>(
    host: &H,
    layout: &HomeLayout,
    config: &InstallerConfig,
) -> Result<(), PreflightError> {
    let bundle = layout.source_bundle_dir();
    if !host.path_exists(&bundle) {
        return Err(PreflightError::MissingBundle(bundle));
    }
    for script in config.required_scripts() {
        let path = bundle.join(script);
        if !host.path_exists(&path) {
            return Err(PreflightError::MissingScript(path));
        }
    }
    Ok(())
}

fn check_desktop<H: HostEnv + ?Sized>(host: &H) -> Result<(), PreflightError> {
    let desktop = host.var("XDG_CURRENT_DESKTOP").unwrap_or_default();
    if !desktop.to_ascii_lowercase().contains("xfce") {
        return Err(PreflightError::NotXfce(desktop));
    }
    Ok(())
}
