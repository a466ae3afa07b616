use anyhow::{Context, Result};
use std::time::Duration;

use xfwidget_core::CommandTimeouts;

use crate::runner::{CommandFailure, CommandRequest, CommandRunner};

const INSTALLED_STATUS: &str = "Status: install ok installed";

pub struct PackageManager<'a, R: ?Sized> {
    runner: &'a R,
    query_timeout: Duration,
    install_timeout: Duration,
}

impl<'a, R: CommandRunner + ?Sized> PackageManager<'a, R> {
    pub fn new(runner: &'a R, timeouts: CommandTimeouts) -> Self {
        Self {
            runner,
            query_timeout: Duration::from_secs(timeouts.command_secs),
            install_timeout: Duration::from_secs(timeouts.package_secs),
        }
    }

    pub fn is_installed(&self, name: &str) -> bool {
        let request =
            CommandRequest::new("dpkg-query", ["-s", name]).with_timeout(self.query_timeout);
        match self.runner.run(&request) {
            Ok(output) => output
                .stdout
                .lines()
                .any(|line| line.trim() == INSTALLED_STATUS),
            Err(_) => false,
        }
    }

    pub fn refresh_index(&self) -> Result<()> {
        let request = CommandRequest::new("apt", ["update"])
            .elevated()
            .with_timeout(self.install_timeout);
        self.runner
            .run(&request)
            .context("failed to refresh package index")?;
        Ok(())
    }

    pub fn install(&self, name: &str) -> Result<(), CommandFailure> {
        let request = CommandRequest::new("apt", ["install", "-y", name])
            .elevated()
            .with_timeout(self.install_timeout);
        self.runner.run(&request).map(|_| ())
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let request = CommandRequest::new("apt", ["remove", "-y", name])
            .elevated()
            .with_timeout(self.install_timeout);
        self.runner
            .run(&request)
            .with_context(|| format!("failed to remove package {name}"))?;
        Ok(())
    }
}
