use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use ssh2::Session;
use tracing::{debug, instrument};

use logreach_types::{InspectError, RemoteError, RemoteTarget};

/// Captured output of a remote command
#[derive(Clone, Debug)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    /// Assemble from raw captured bytes; invalid UTF-8 is replaced, not
    /// rejected, matching the local decode paths.
    pub fn from_raw(exit_code: i32, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        }
    }

    pub fn ok(&self) -> bool {
        self.exit_code == 0
    }
}

/// Remote-shell execution seam.
///
/// Implementations are blocking and bounded by `timeout`; callers run them
/// off latency-sensitive threads (e.g. under `spawn_blocking`) and treat a
/// timeout as a normal outcome. No retries happen here; retry policy
/// belongs to the caller.
pub trait RemoteExec: Send + Sync {
    /// Open a fresh connection, run `command`, capture stdout/stderr and the
    /// exit code.
    fn execute(
        &self,
        target: &RemoteTarget,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, RemoteError>;

    /// Read a remote file fully over SFTP, failing with
    /// [`InspectError::PayloadTooLarge`] once the payload passes `max_bytes`.
    /// Oversized bytes are discarded, never returned partially.
    fn read_file(
        &self,
        target: &RemoteTarget,
        path: &str,
        max_bytes: u64,
        timeout: Duration,
    ) -> Result<Vec<u8>, InspectError>;

    /// Connectivity check: a no-op command round trip
    fn ping(&self, target: &RemoteTarget, timeout: Duration) -> Result<(), RemoteError> {
        let out = self.execute(target, "bash -lc 'true'", timeout)?;
        if out.ok() {
            Ok(())
        } else {
            Err(RemoteError::new(format!(
                "ping exited with code {}: {}",
                out.exit_code,
                out.stderr.trim()
            )))
        }
    }
}

/// `ssh2`-backed executor: one session per call, password-only auth.
///
/// Key-based and agent-based fallbacks are deliberately not attempted so the
/// behavior is deterministic for stored credentials.
#[derive(Clone, Copy, Debug, Default)]
pub struct SshExecutor;

impl SshExecutor {
    fn connect(&self, target: &RemoteTarget, timeout: Duration) -> Result<Session, RemoteError> {
        let addr = target
            .addr()
            .to_socket_addrs()
            .map_err(|err| RemoteError::new(format!("invalid address {}: {err}", target.addr())))?
            .next()
            .ok_or_else(|| RemoteError::new(format!("unresolvable address {}", target.addr())))?;

        let tcp = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|err| RemoteError::new(format!("connect to {} failed: {err}", target.addr())))?;

        let mut session = Session::new()
            .map_err(|err| RemoteError::new(format!("ssh session init failed: {err}")))?;
        // Bounds handshake, auth and channel I/O alike
        session.set_timeout(timeout.as_millis() as u32);
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|err| RemoteError::new(format!("ssh handshake with {} failed: {err}", target.host)))?;

        let username = target.username.as_deref().unwrap_or("root");
        let password = target.password.as_deref().unwrap_or("");
        session
            .userauth_password(username, password)
            .map_err(|err| {
                RemoteError::new(format!(
                    "ssh auth as {username}@{} failed: {err}",
                    target.host
                ))
            })?;
        if !session.authenticated() {
            return Err(RemoteError::new(format!(
                "ssh auth as {username}@{} rejected",
                target.host
            )));
        }
        Ok(session)
    }
}

impl RemoteExec for SshExecutor {
    #[instrument(skip(self, target), fields(host = %target.host))]
    fn execute(
        &self,
        target: &RemoteTarget,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, RemoteError> {
        let session = self.connect(target, timeout)?;
        let mut channel = session
            .channel_session()
            .map_err(|err| RemoteError::new(format!("ssh channel open failed: {err}")))?;
        channel
            .exec(command)
            .map_err(|err| RemoteError::new(format!("ssh exec failed: {err}")))?;

        let mut stdout = Vec::new();
        channel
            .read_to_end(&mut stdout)
            .map_err(|err| RemoteError::new(format!("ssh stdout read failed: {err}")))?;
        let mut stderr = Vec::new();
        channel
            .stderr()
            .read_to_end(&mut stderr)
            .map_err(|err| RemoteError::new(format!("ssh stderr read failed: {err}")))?;

        channel
            .wait_close()
            .map_err(|err| RemoteError::new(format!("ssh channel close failed: {err}")))?;
        let exit_code = channel
            .exit_status()
            .map_err(|err| RemoteError::new(format!("ssh exit status unavailable: {err}")))?;

        debug!(exit_code, stdout_bytes = stdout.len(), "remote command finished");
        Ok(ExecOutput::from_raw(exit_code, stdout, stderr))
    }

    #[instrument(skip(self, target), fields(host = %target.host, path))]
    fn read_file(
        &self,
        target: &RemoteTarget,
        path: &str,
        max_bytes: u64,
        timeout: Duration,
    ) -> Result<Vec<u8>, InspectError> {
        let session = self.connect(target, timeout)?;
        let sftp = session
            .sftp()
            .map_err(|err| RemoteError::new(format!("sftp subsystem failed: {err}")))?;
        let mut file = sftp
            .open(Path::new(path))
            .map_err(|err| RemoteError::new(format!("sftp open {path} failed: {err}")))?;

        // Read one byte past the ceiling to detect oversized payloads
        let mut data = Vec::new();
        file.by_ref()
            .take(max_bytes + 1)
            .read_to_end(&mut data)
            .map_err(|err| RemoteError::new(format!("sftp read {path} failed: {err}")))?;
        if data.len() as u64 > max_bytes {
            return Err(InspectError::PayloadTooLarge {
                size: data.len() as u64,
                limit: max_bytes,
            });
        }
        debug!(bytes = data.len(), "remote file fetched");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_replaces_invalid_utf8() {
        // journald and binary-tainted logs may emit arbitrary bytes
        let out = ExecOutput::from_raw(0, b"before \xff\xfe after\n".to_vec(), b"\xc3\x28".to_vec());
        assert!(out.ok());
        assert_eq!(out.stdout, "before \u{fffd}\u{fffd} after\n");
        assert_eq!(out.stderr, "\u{fffd}(");
    }

    #[test]
    fn from_raw_keeps_valid_utf8_verbatim() {
        let out = ExecOutput::from_raw(3, "línea\n".as_bytes().to_vec(), Vec::new());
        assert!(!out.ok());
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout, "línea\n");
        assert!(out.stderr.is_empty());
    }
}
