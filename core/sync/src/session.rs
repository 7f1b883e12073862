//! A single synchronization attempt driven through rsync.
//!
//! The transfer tool runs on a pseudo-terminal so that ssh credential
//! prompts reach us instead of blocking on the operator's terminal. The
//! child's output is read as a stream of [`SessionEvent`]s and fed to
//! [`classify`], which decides the attempt once enough has been seen.

use async_trait::async_trait;
use nix::pty::{openpty, Winsize};
use nix::sys::termios::Termios;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use syncwarden_common::{Error, Result, SyncAttemptOutcome, Task};

/// Output fragments that mean ssh is asking for a secret.
pub const PROMPT_PATTERNS: &[&str] = &["password:", "passphrase for key"];

/// Bytes re-scanned before new output so a prompt split across reads is found.
const PROMPT_OVERLAP: usize = 32;

const READ_CHUNK: usize = 4096;

/// Drives one attempt for a task.
#[async_trait]
pub trait SessionRunner: Send + Sync {
    /// Run the transfer once and classify how it ended.
    ///
    /// Never fails: every fault is folded into the returned outcome.
    async fn attempt(&self, task: &Task) -> SyncAttemptOutcome;
}

/// Something observed while the child is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A chunk of terminal output.
    Output(Vec<u8>),
    /// The terminal closed and the child exited.
    Eof { exit_code: Option<i32> },
    /// The interaction deadline passed.
    Timeout,
}

/// Everything the child has written so far.
#[derive(Debug, Default)]
pub struct Transcript {
    bytes: Vec<u8>,
    scanned: usize,
}

impl Transcript {
    pub fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Check output that arrived since the last call for a credential prompt.
    pub fn take_prompt(&mut self) -> bool {
        let start = self.scanned.saturating_sub(PROMPT_OVERLAP);
        self.scanned = self.bytes.len();

        let window = self.bytes[start..].to_ascii_lowercase();
        PROMPT_PATTERNS.iter().any(|pattern| {
            let pattern = pattern.as_bytes();
            window.windows(pattern.len()).any(|w| w == pattern)
        })
    }

    /// Output as text with terminal line endings normalized.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).replace("\r\n", "\n")
    }
}

/// Advance the attempt by one event.
///
/// Returns `None` while the attempt is still undecided.
pub fn classify(event: SessionEvent, transcript: &mut Transcript) -> Option<SyncAttemptOutcome> {
    match event {
        SessionEvent::Output(chunk) => {
            transcript.push(&chunk);
            if transcript.take_prompt() {
                Some(SyncAttemptOutcome::TerminalFailure {
                    reason: "Password prompt detected. Likely due to incorrect username or SSH key."
                        .to_string(),
                })
            } else {
                None
            }
        }
        SessionEvent::Eof { exit_code: Some(0) } => Some(SyncAttemptOutcome::Success {
            output: transcript.text(),
        }),
        SessionEvent::Eof { exit_code } => {
            debug!("Transfer tool exited with {:?}", exit_code);
            Some(SyncAttemptOutcome::RetryableFailure {
                reason: format!(
                    "Error during synchronization with rsync: {}",
                    transcript.text()
                ),
            })
        }
        SessionEvent::Timeout => Some(SyncAttemptOutcome::RetryableFailure {
            reason: "rsync command timed out".to_string(),
        }),
    }
}

/// Runs rsync over ssh on a pseudo-terminal.
#[derive(Debug, Clone)]
pub struct RsyncRunner {
    program: String,
    leading_args: Vec<String>,
    expect_timeout: Option<Duration>,
}

impl RsyncRunner {
    pub fn new() -> Self {
        Self {
            program: "rsync".to_string(),
            leading_args: Vec::new(),
            expect_timeout: None,
        }
    }

    /// Launch `program leading_args.. <rsync args>` instead of plain rsync.
    pub fn with_command(mut self, program: impl Into<String>, leading_args: Vec<String>) -> Self {
        self.program = program.into();
        self.leading_args = leading_args;
        self
    }

    /// Give up on an attempt that has not finished after `timeout`.
    pub fn with_expect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.expect_timeout = timeout;
        self
    }

    /// Arguments handed to rsync for `task`.
    pub fn rsync_args(&self, task: &Task) -> Vec<String> {
        let mut args = vec![
            "-avz".to_string(),
            "--checksum".to_string(),
            "--partial".to_string(),
        ];
        if task.delete_remote_extraneous {
            args.push("--delete".to_string());
        }
        args.push("-e".to_string());
        args.push(format!(
            "ssh -i {} -p {}",
            task.credential_path.display(),
            task.port
        ));
        args.push(task.remote_spec());
        args.push(task.local_folder_path.clone());
        args
    }

    fn command_line(&self, task: &Task) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.leading_args.iter().cloned());
        parts.extend(self.rsync_args(task).into_iter().map(|arg| {
            if arg.contains(' ') {
                format!("'{}'", arg)
            } else {
                arg
            }
        }));
        parts.join(" ")
    }

    async fn drive(&self, task: &Task) -> Result<SyncAttemptOutcome> {
        let pty = openpty(None::<&Winsize>, None::<&Termios>)
            .map_err(|e| Error::Process(format!("Failed to open pseudo-terminal: {}", e)))?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(self.rsync_args(task))
            .stdin(Stdio::from(pty.slave.try_clone()?))
            .stdout(Stdio::from(pty.slave.try_clone()?))
            .stderr(Stdio::from(pty.slave))
            .kill_on_drop(true);

        // SAFETY: the hook only calls setsid(2) and ioctl(2), both
        // async-signal-safe, between fork and exec.
        unsafe {
            command.pre_exec(attach_controlling_terminal);
        }

        let mut child = command.spawn()?;
        // Release our copies of the slave side so the master sees EOF.
        drop(command);

        let mut master = tokio::fs::File::from_std(std::fs::File::from(pty.master));
        let deadline = self.expect_timeout.map(|timeout| Instant::now() + timeout);
        let mut transcript = Transcript::default();
        let mut buf = vec![0u8; READ_CHUNK];

        loop {
            let event = next_event(&mut master, &mut buf, deadline, &mut child).await?;
            let finished = matches!(event, SessionEvent::Eof { .. });

            if let Some(outcome) = classify(event, &mut transcript) {
                if !finished {
                    stop_child(&mut child).await;
                }
                return Ok(outcome);
            }
        }
    }
}

impl Default for RsyncRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionRunner for RsyncRunner {
    async fn attempt(&self, task: &Task) -> SyncAttemptOutcome {
        if let Err(e) = task.validate() {
            return SyncAttemptOutcome::RetryableFailure {
                reason: e.to_string(),
            };
        }

        info!("Running rsync command: {}", self.command_line(task));

        match self.drive(task).await {
            Ok(outcome) => outcome,
            Err(e) => SyncAttemptOutcome::RetryableFailure {
                reason: format!(
                    "Error during synchronization between {}:{}: {}",
                    task.server_address, task.port, e
                ),
            },
        }
    }
}

/// Make the pty slave on fd 0 the controlling terminal of a new session.
fn attach_controlling_terminal() -> io::Result<()> {
    nix::unistd::setsid()?;
    // SAFETY: fd 0 is the pty slave installed by the spawner.
    if unsafe { nix::libc::ioctl(0, nix::libc::TIOCSCTTY as _, 0) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

async fn next_event(
    master: &mut tokio::fs::File,
    buf: &mut [u8],
    deadline: Option<Instant>,
    child: &mut Child,
) -> Result<SessionEvent> {
    let read = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, master.read(buf)).await {
            Ok(read) => read,
            Err(_) => return Ok(SessionEvent::Timeout),
        },
        None => master.read(buf).await,
    };

    match read {
        Ok(0) => wait_exit(child).await,
        Ok(n) => Ok(SessionEvent::Output(buf[..n].to_vec())),
        // Linux reports a closed slave side as EIO on the master.
        Err(e) if e.raw_os_error() == Some(nix::libc::EIO) => wait_exit(child).await,
        Err(e) => Err(e.into()),
    }
}

async fn wait_exit(child: &mut Child) -> Result<SessionEvent> {
    let status = child.wait().await?;
    Ok(SessionEvent::Eof {
        exit_code: status.code(),
    })
}

async fn stop_child(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("Failed to stop transfer tool: {}", e);
        return;
    }
    let _ = child.wait().await;
}
