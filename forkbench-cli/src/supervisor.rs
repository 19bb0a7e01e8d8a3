//! Supervisor Side of the Worker Protocol
//!
//! Spawns one worker process per benchmark, hands it a [`StartMessage`] on
//! fd 3 and collects the single [`ExitMessage`] it writes to fd 4.

use forkbench_core::{IPC_FD_ENV, WORKER_FLAG};
use forkbench_ipc::{
    BenchmarkResult, ErrorKind, ExitMessage, FrameError, FrameReader, FrameWriter, StartMessage,
    WireError,
};
use std::fs::File;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Grace period between SIGTERM and SIGKILL
const TERM_GRACE: Duration = Duration::from_millis(500);

/// Failures that keep a worker from starting
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The worker process could not be started
    #[error("Failed to spawn worker {binary}: {source}")]
    SpawnFailed {
        /// Executable that was spawned
        binary: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// `std::env::current_exe` failed
    #[error("Cannot locate the current executable: {0}")]
    CurrentExe(#[source] std::io::Error),
}

/// Success carries the measured result, failure the worker's or the
/// supervisor's error
pub type WorkerOutcome = Result<BenchmarkResult, WireError>;

/// Result of polling for data
#[derive(Debug)]
enum PollResult {
    DataAvailable,
    Timeout,
    PipeClosed,
    Error(std::io::Error),
}

/// Wait for data to be available on a file descriptor with timeout
fn wait_for_data(fd: RawFd, timeout: Duration) -> PollResult {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;

    let result = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };

    if result < 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::Interrupted {
            PollResult::Timeout
        } else {
            PollResult::Error(err)
        }
    } else if result == 0 {
        PollResult::Timeout
    } else if pollfd.revents & libc::POLLIN != 0 {
        // A closing pipe can still hold the exit message
        PollResult::DataAvailable
    } else if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        PollResult::PipeClosed
    } else {
        PollResult::Timeout
    }
}

/// Create a pipe pair with close-on-exec set on both ends, returning
/// (read_fd, write_fd).
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];

    #[cfg(any(target_os = "linux", target_os = "android"))]
    let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let ret = unsafe {
        let ret = libc::pipe(fds.as_mut_ptr());
        if ret == 0 {
            for &fd in &fds {
                let flags = libc::fcntl(fd, libc::F_GETFD);
                libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
            }
        }
        ret
    };

    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok((fds[0], fds[1]))
}

fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

fn send_sigterm(pid: u32) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn describe_status(status: ExitStatus) -> String {
    match (status.code(), status.signal()) {
        (Some(code), _) => format!("exit code {code}"),
        (None, Some(signal)) => format!("signal {signal}"),
        (None, None) => "unknown status".to_string(),
    }
}

/// One worker process, good for exactly one benchmark
pub struct WorkerHandle {
    child: Child,
    reader: FrameReader<File>,
    writer: FrameWriter<File>,
    timeout: Duration,
    msg_read_fd: RawFd,
}

impl WorkerHandle {
    /// Spawn `binary` in worker mode with the IPC pipes on fd 3/4.
    pub fn spawn(binary: &Path, timeout: Duration) -> Result<Self, SupervisorError> {
        let spawn_failed = |source| SupervisorError::SpawnFailed {
            binary: binary.to_path_buf(),
            source,
        };

        // cmd_pipe: supervisor writes the start message, worker reads fd 3
        let (cmd_read, cmd_write) = create_pipe().map_err(spawn_failed)?;
        // msg_pipe: worker writes the exit message to fd 4
        let (msg_read, msg_write) = match create_pipe() {
            Ok(fds) => fds,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                return Err(spawn_failed(e));
            }
        };

        let mut command = Command::new(binary);
        command
            .arg(WORKER_FLAG)
            .env(IPC_FD_ENV, "3,4")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        // In the child: dup cmd_read->3, msg_write->4. dup2 leaves the new
        // descriptors without close-on-exec; everything else is closed on exec.
        unsafe {
            command.pre_exec(move || {
                if cmd_read != 3 {
                    libc::dup2(cmd_read, 3);
                } else {
                    let flags = libc::fcntl(3, libc::F_GETFD);
                    libc::fcntl(3, libc::F_SETFD, flags & !libc::FD_CLOEXEC);
                }
                if msg_write != 4 {
                    libc::dup2(msg_write, 4);
                } else {
                    let flags = libc::fcntl(4, libc::F_GETFD);
                    libc::fcntl(4, libc::F_SETFD, flags & !libc::FD_CLOEXEC);
                }
                Ok(())
            });
        }

        let child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                close_fd(msg_read);
                close_fd(msg_write);
                return Err(spawn_failed(e));
            }
        };

        // Close the child-side ends in the parent
        close_fd(cmd_read);
        close_fd(msg_write);

        let writer_file = unsafe { File::from_raw_fd(cmd_write) };
        let reader_file = unsafe { File::from_raw_fd(msg_read) };
        debug!(pid = child.id(), "spawned worker");

        Ok(Self {
            child,
            reader: FrameReader::new(reader_file),
            writer: FrameWriter::new(writer_file),
            timeout,
            msg_read_fd: msg_read,
        })
    }

    /// Process id of the worker
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Send `start`, wait for the exit message and the process exit, and
    /// classify the outcome.
    pub fn run(mut self, start: &StartMessage) -> WorkerOutcome {
        let deadline = Instant::now() + self.timeout;

        // A worker that dies before reading leaves a broken pipe; the exit
        // status below explains why.
        if let Err(e) = self.writer.write(start) {
            debug!(id = %start.benchmark_id, "failed to send start message: {}", e);
        }

        let message = match self.receive(deadline) {
            Some(message) => message,
            None => return Err(self.handle_timeout(&start.benchmark_id)),
        };

        let status = match self.wait_exit(deadline) {
            Some(status) => status,
            None => return Err(self.handle_timeout(&start.benchmark_id)),
        };

        classify(message, status)
    }

    /// Read the exit message. `None` means the deadline passed first; an
    /// inner `None` means the pipe closed without a message.
    fn receive(&mut self, deadline: Instant) -> Option<Option<Result<ExitMessage, FrameError>>> {
        loop {
            if self.reader.has_buffered_data() {
                return Some(Some(self.reader.read::<ExitMessage>()));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }

            match wait_for_data(self.msg_read_fd, remaining.min(Duration::from_millis(100))) {
                PollResult::DataAvailable => {
                    return match self.reader.read::<ExitMessage>() {
                        Err(FrameError::EndOfStream) => Some(None),
                        other => Some(Some(other)),
                    };
                }
                PollResult::PipeClosed => return Some(None),
                PollResult::Timeout => continue,
                PollResult::Error(e) => {
                    warn!("poll on worker pipe failed: {}", e);
                    return Some(None);
                }
            }
        }
    }

    fn wait_exit(&mut self, deadline: Instant) -> Option<ExitStatus> {
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) => {}
                Err(e) => {
                    warn!("failed to query worker status: {}", e);
                    return None;
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    /// SIGTERM, a short grace period, then SIGKILL.
    fn handle_timeout(&mut self, bench_id: &str) -> WireError {
        warn!(id = %bench_id, pid = self.child.id(), "worker timed out");
        let _ = send_sigterm(self.child.id());

        let grace = Instant::now() + TERM_GRACE;
        while Instant::now() < grace && self.is_alive() {
            std::thread::sleep(Duration::from_millis(10));
        }
        if self.is_alive() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();

        WireError::new(
            ErrorKind::WorkerTimeout,
            format!("worker did not finish within {:?}", self.timeout),
        )
    }

    /// Check if worker process is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn classify(message: Option<Result<ExitMessage, FrameError>>, status: ExitStatus) -> WorkerOutcome {
    match message {
        Some(Ok(ExitMessage::Result(result))) if status.success() => Ok(result),
        Some(Ok(ExitMessage::Result(_))) => Err(WireError::new(
            ErrorKind::WorkerCrash,
            format!("worker reported a result but exited with {}", describe_status(status)),
        )),
        Some(Ok(ExitMessage::Error(error))) => Err(error),
        Some(Err(e)) => Err(WireError::new(
            ErrorKind::Protocol,
            format!("unreadable exit message ({}): {}", describe_status(status), e),
        )),
        None if status.success() => Err(WireError::new(
            ErrorKind::Protocol,
            "worker exited without sending an exit message",
        )),
        None => Err(WireError::new(
            ErrorKind::WorkerCrash,
            format!("worker exited with {} without reporting", describe_status(status)),
        )),
    }
}

/// Path of the running binary, which doubles as the worker
pub fn current_binary() -> Result<PathBuf, SupervisorError> {
    std::env::current_exe().map_err(SupervisorError::CurrentExe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkbench_ipc::{BenchmarkOptions, ResultStats};

    fn status(code: i32) -> ExitStatus {
        ExitStatus::from_raw(code << 8)
    }

    fn result() -> BenchmarkResult {
        BenchmarkResult {
            id: "f.rs:a".to_string(),
            name: "a".to_string(),
            filename: "f.rs".to_string(),
            stats: ResultStats::default(),
            sample_count: 1,
            count: 1,
            options: BenchmarkOptions::default(),
            times: vec![1.0],
        }
    }

    #[test]
    fn test_classify_success() {
        let outcome = classify(Some(Ok(ExitMessage::Result(result()))), status(0));
        assert_eq!(outcome, Ok(result()));
    }

    #[test]
    fn test_classify_reported_error() {
        let error = WireError::new(ErrorKind::Measurement, "boom");
        let outcome = classify(Some(Ok(ExitMessage::Error(error.clone()))), status(1));
        assert_eq!(outcome, Err(error));
    }

    #[test]
    fn test_classify_crash_and_protocol_violation() {
        let crash = classify(None, status(101)).unwrap_err();
        assert_eq!(crash.kind(), Some(ErrorKind::WorkerCrash));
        assert!(crash.message.contains("exit code 101"));

        let killed = classify(None, ExitStatus::from_raw(libc::SIGKILL)).unwrap_err();
        assert_eq!(killed.kind(), Some(ErrorKind::WorkerCrash));
        assert!(killed.message.contains("signal 9"));

        let silent = classify(None, status(0)).unwrap_err();
        assert_eq!(silent.kind(), Some(ErrorKind::Protocol));
    }

    #[test]
    fn test_spawn_missing_binary() {
        let err = WorkerHandle::spawn(
            Path::new("/nonexistent/forkbench-worker"),
            Duration::from_secs(1),
        );
        assert!(matches!(err, Err(SupervisorError::SpawnFailed { .. })));
    }

    #[test]
    fn test_non_worker_binary_crashes() {
        // `false` ignores the protocol entirely and exits 1
        let Ok(worker) = WorkerHandle::spawn(Path::new("/bin/false"), Duration::from_secs(5)) else {
            return;
        };
        let start = StartMessage::new("f.rs:a", "f.rs", BenchmarkOptions::default());
        let error = worker.run(&start).unwrap_err();
        assert_eq!(error.kind(), Some(ErrorKind::WorkerCrash));
    }
}
