use std::cell::RefCell;
use std::fmt;
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use wait_timeout::ChildExt;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const SUDO_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const DRAIN_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub elevate: bool,
    pub timeout: Duration,
}

impl CommandRequest {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            elevate: false,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn elevated(mut self) -> Self {
        self.elevate = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    pub fn display(&self) -> String {
        let argv = self.argv().join(" ");
        if self.elevate {
            format!("sudo {argv}")
        } else {
            argv
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandFailureKind {
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("exited with status {}", exit_code_label(.code))]
    NonZeroExit { code: Option<i32> },
    #[error("permission denied")]
    PermissionDenied,
    #[error("failed to start: {0}")]
    Spawn(String),
    #[error("no elevation credential available")]
    CredentialUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{command}` {kind}")]
pub struct CommandFailure {
    pub command: String,
    pub kind: CommandFailureKind,
    pub output: CommandOutput,
}

impl CommandFailure {
    pub fn new(request: &CommandRequest, kind: CommandFailureKind, output: CommandOutput) -> Self {
        Self {
            command: request.display(),
            kind,
            output,
        }
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map(|code| code.to_string())
        .unwrap_or_else(|| "signal".to_string())
}

pub type CommandResult = Result<CommandOutput, CommandFailure>;

pub trait CommandRunner {
    fn run(&self, request: &CommandRequest) -> CommandResult;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, request: &CommandRequest) -> CommandResult {
        (**self).run(request)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

pub trait CredentialSource {
    fn request_credential(&self) -> Option<Credential>;
}

#[derive(Debug)]
enum Elevation {
    Unknown,
    Passwordless,
    Cached(Credential),
    Unavailable,
}

pub struct SystemRunner<C> {
    credentials: C,
    elevation: RefCell<Elevation>,
}

impl<C: CredentialSource> SystemRunner<C> {
    pub fn new(credentials: C) -> Self {
        Self {
            credentials,
            elevation: RefCell::new(Elevation::Unknown),
        }
    }

    pub fn elevation_available(&self) -> bool {
        let check = CommandRequest::new("sudo", ["-V"]).with_timeout(SUDO_CHECK_TIMEOUT);
        spawn_and_wait(&check, build_command(&check.program, &check.args), None).is_ok()
    }

    fn resolve_elevation(&self) {
        let mut state = self.elevation.borrow_mut();
        if !matches!(*state, Elevation::Unknown) {
            return;
        }

        let check = CommandRequest::new("sudo", ["-n", "true"]).with_timeout(SUDO_CHECK_TIMEOUT);
        if spawn_and_wait(&check, build_command(&check.program, &check.args), None).is_ok() {
            *state = Elevation::Passwordless;
            return;
        }

        *state = match self.credentials.request_credential() {
            Some(credential) => Elevation::Cached(credential),
            None => {
                log::warn!("elevation credential was not provided");
                Elevation::Unavailable
            }
        };
    }

    fn run_elevated(&self, request: &CommandRequest) -> CommandResult {
        self.resolve_elevation();
        let state = self.elevation.borrow();
        let (command, stdin_secret) = match &*state {
            Elevation::Passwordless => {
                let mut args = vec!["-n".to_string(), "--".to_string()];
                args.push(request.program.clone());
                args.extend(request.args.iter().cloned());
                (build_command("sudo", &args), None)
            }
            Elevation::Cached(credential) => {
                let mut args = vec![
                    "-S".to_string(),
                    "-p".to_string(),
                    String::new(),
                    "--".to_string(),
                ];
                args.push(request.program.clone());
                args.extend(request.args.iter().cloned());
                (
                    build_command("sudo", &args),
                    Some(format!("{}\n", credential.expose())),
                )
            }
            Elevation::Unknown | Elevation::Unavailable => {
                return Err(CommandFailure::new(
                    request,
                    CommandFailureKind::CredentialUnavailable,
                    CommandOutput::default(),
                ));
            }
        };
        let used_secret = stdin_secret.is_some();
        drop(state);

        let result = spawn_and_wait(request, command, stdin_secret.as_deref());
        if let Err(failure) = &result {
            if used_secret && credential_rejected(&failure.output.stderr) {
                log::warn!("cached elevation credential was rejected; it will be requested again");
                *self.elevation.borrow_mut() = Elevation::Unknown;
            }
        }
        result
    }
}

impl<C: CredentialSource> CommandRunner for SystemRunner<C> {
    fn run(&self, request: &CommandRequest) -> CommandResult {
        let result = if request.elevate {
            self.run_elevated(request)
        } else {
            spawn_and_wait(
                request,
                build_command(&request.program, &request.args),
                None,
            )
        };

        match &result {
            Ok(_) => log::debug!("command ok: {}", request.display()),
            Err(failure) => {
                let stderr = failure.output.stderr.trim();
                if stderr.is_empty() {
                    log::error!("command failed: {failure}");
                } else {
                    log::error!("command failed: {failure}; stderr: {stderr}");
                }
            }
        }
        result
    }
}

fn build_command(program: &str, args: &[String]) -> Command {
    let mut command = Command::new(program);
    command
        .args(args)
        .env("LC_ALL", "C")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

fn credential_rejected(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("incorrect password") || lower.contains("sorry, try again")
}

fn spawn_and_wait(
    request: &CommandRequest,
    mut command: Command,
    stdin_payload: Option<&str>,
) -> CommandResult {
    command.stdin(if stdin_payload.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let mut child = command.spawn().map_err(|err| {
        let kind = match err.kind() {
            io::ErrorKind::PermissionDenied => CommandFailureKind::PermissionDenied,
            _ => CommandFailureKind::Spawn(err.to_string()),
        };
        CommandFailure::new(request, kind, CommandOutput::default())
    })?;

    if let (Some(payload), Some(mut stdin)) = (stdin_payload, child.stdin.take()) {
        // sudo may exit before reading; a broken pipe here is not an error.
        let _ = stdin.write_all(payload.as_bytes());
    }

    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let status = match wait_with_timeout(&mut child, request.timeout) {
        Ok(Some(status)) => status,
        // A surviving grandchild may still hold the pipes; keep what was read.
        Ok(None) => {
            let deadline = Instant::now() + DRAIN_GRACE;
            let partial = CommandOutput {
                status_code: None,
                stdout: snapshot_drain(stdout_reader, deadline),
                stderr: snapshot_drain(stderr_reader, deadline),
            };
            return Err(CommandFailure::new(
                request,
                CommandFailureKind::Timeout(request.timeout),
                partial,
            ));
        }
        Err(err) => {
            let deadline = Instant::now() + DRAIN_GRACE;
            let output = CommandOutput {
                status_code: None,
                stdout: snapshot_drain(stdout_reader, deadline),
                stderr: snapshot_drain(stderr_reader, deadline),
            };
            return Err(CommandFailure::new(
                request,
                CommandFailureKind::Spawn(format!("failed waiting for child: {err}")),
                output,
            ));
        }
    };

    let output = CommandOutput {
        status_code: status.code(),
        stdout: finish_drain(stdout_reader),
        stderr: finish_drain(stderr_reader),
    };
    if status.success() {
        Ok(output)
    } else {
        Err(CommandFailure::new(
            request,
            CommandFailureKind::NonZeroExit {
                code: status.code(),
            },
            output,
        ))
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    match child.wait_timeout(timeout)? {
        Some(status) => Ok(Some(status)),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Ok(None)
        }
    }
}

struct Drain {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

fn drain<R>(stream: Option<R>) -> Option<Drain>
where
    R: Read + Send + 'static,
{
    stream.map(|mut stream| {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let handle = thread::spawn(move || {
            let mut chunk = [0_u8; 4096];
            loop {
                match stream.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(read) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..read]),
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        });
        Drain { buffer, handle }
    })
}

fn finish_drain(drain: Option<Drain>) -> String {
    let Some(drain) = drain else {
        return String::new();
    };
    let _ = drain.handle.join();
    drained_text(&drain.buffer)
}

fn snapshot_drain(drain: Option<Drain>, deadline: Instant) -> String {
    let Some(drain) = drain else {
        return String::new();
    };
    while !drain.handle.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    if drain.handle.is_finished() {
        let _ = drain.handle.join();
    }
    drained_text(&drain.buffer)
}

fn drained_text(buffer: &Mutex<Vec<u8>>) -> String {
    let bytes = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    String::from_utf8_lossy(&bytes).into_owned()
}
