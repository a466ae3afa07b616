use anyhow::{Context, Result};
use std::fs;
use std::io;

use xfwidget_core::TargetSpec;

use crate::layout::HomeLayout;

pub fn write_target(layout: &HomeLayout, target: &TargetSpec) -> Result<()> {
    let path = layout.target_file();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, target.line())
        .with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("target set to {} {}", target.address, target.name);
    Ok(())
}

pub fn clear_target(layout: &HomeLayout) -> Result<bool> {
    let path = layout.target_file();
    match fs::remove_file(&path) {
        Ok(()) => {
            log::info!("target cleared");
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("failed to clear {}", path.display())),
    }
}

pub fn read_target(layout: &HomeLayout) -> Result<Option<TargetSpec>> {
    let path = layout.target_file();
    match fs::read_to_string(&path) {
        Ok(raw) => Ok(TargetSpec::parse_line(&raw)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}
