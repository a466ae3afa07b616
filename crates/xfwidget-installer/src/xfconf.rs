use anyhow::{Context, Result};
use std::time::Duration;

use xfwidget_core::{parse_int_lines, parse_store_listing, StoreEntry};

use crate::runner::{CommandRequest, CommandRunner, DEFAULT_COMMAND_TIMEOUT};

pub const XFCONF_QUERY: &str = "xfconf-query";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Bool,
    String,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Bool => "bool",
            Self::String => "string",
        }
    }
}

pub struct XfconfClient<'a, R: ?Sized> {
    runner: &'a R,
    channel: String,
    timeout: Duration,
}

impl<'a, R: CommandRunner + ?Sized> XfconfClient<'a, R> {
    pub fn new(runner: &'a R, channel: impl Into<String>) -> Self {
        Self {
            runner,
            channel: channel.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn request(&self, path: &str, extra: &[&str]) -> CommandRequest {
        let mut args = vec!["-c", self.channel.as_str(), "-p", path];
        args.extend_from_slice(extra);
        CommandRequest::new(XFCONF_QUERY, args).with_timeout(self.timeout)
    }

    pub fn list_entries(&self, prefix: &str, verbose: bool) -> Vec<StoreEntry> {
        let extra: &[&str] = if verbose { &["-l", "-v"] } else { &["-l"] };
        match self.runner.run(&self.request(prefix, extra)) {
            Ok(output) => parse_store_listing(&output.stdout, verbose),
            Err(failure) => {
                log::warn!("listing {prefix} returned nothing: {failure}");
                Vec::new()
            }
        }
    }

    pub fn read_path(&self, path: &str) -> Option<String> {
        self.runner
            .run(&self.request(path, &[]))
            .ok()
            .map(|output| output.stdout.trim_end_matches('\n').to_string())
    }

    pub fn read_int_array(&self, path: &str) -> Option<Vec<u32>> {
        self.read_path(path).map(|raw| parse_int_lines(&raw))
    }

    pub fn create_typed_value(&self, path: &str, value_type: ValueType, value: &str) -> Result<()> {
        self.runner
            .run(&self.request(
                path,
                &["-t", value_type.as_str(), "-s", value, "--create"],
            ))
            .with_context(|| format!("failed to create {path} in {}", self.channel))?;
        Ok(())
    }

    pub fn remove_subtree(&self, path: &str) -> Result<()> {
        self.runner
            .run(&self.request(path, &["-r", "-R"]))
            .with_context(|| format!("failed to remove {path} from {}", self.channel))?;
        Ok(())
    }

    /// Clears `path` and recreates it with `values` in order. Observers may
    /// briefly see the property missing between the two writes.
    pub fn replace_array(&self, path: &str, value_type: ValueType, values: &[String]) -> Result<()> {
        if let Err(failure) = self.runner.run(&self.request(path, &["-r"])) {
            log::warn!("clearing {path} before rewrite failed: {failure}");
        }
        if values.is_empty() {
            return Ok(());
        }

        let mut extra = vec!["--create", "-a"];
        for value in values {
            extra.extend(["-t", value_type.as_str(), "-s", value.as_str()]);
        }
        self.runner
            .run(&self.request(path, &extra))
            .with_context(|| format!("failed to rewrite array {path} in {}", self.channel))?;
        Ok(())
    }
}
