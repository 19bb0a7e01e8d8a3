//! Worker Process Entry Point
//!
//! A worker measures exactly one benchmark. It reads a single
//! [`StartMessage`], rebuilds the tree of the named file, measures the
//! benchmark with the options from the message, writes a single
//! [`ExitMessage`] and hands back the process exit code.
//!
//! On Unix the scheduler passes the IPC pipes as fd 3/4 and announces them
//! in `FORKBENCH_IPC_FD`; otherwise stdin/stdout are used.

use crate::discovery::{BenchFile, DiscoveryContext, DiscoveryError};
use crate::measure::Measurement;
use crate::panic_message;
use crate::timer::Timer;
use forkbench_ipc::{
    EXIT_FAILURE, EXIT_SUCCESS, ErrorKind, ExitMessage, FrameError, FrameReader, FrameWriter,
    PROTOCOL_VERSION, StartMessage, WireError,
};
use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

/// Environment variable carrying `<read_fd>,<write_fd>`
pub const IPC_FD_ENV: &str = "FORKBENCH_IPC_FD";

/// Command-line flag that switches a benchmark binary into worker mode
pub const WORKER_FLAG: &str = "--forkbench-worker";

/// Errors that prevent the worker from reporting at all
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The exit message could not be written
    #[error("failed to send exit message: {0}")]
    Report(#[from] FrameError),
}

enum IpcTransport {
    #[cfg(unix)]
    Fds { read_fd: i32, write_fd: i32 },
    Stdio,
}

fn detect_transport() -> IpcTransport {
    #[cfg(unix)]
    if let Ok(val) = std::env::var(IPC_FD_ENV) {
        if let Some((r, w)) = val.split_once(',') {
            if let (Ok(read_fd), Ok(write_fd)) = (r.trim().parse(), w.trim().parse()) {
                return IpcTransport::Fds { read_fd, write_fd };
            }
        }
        warn!(value = %val, "invalid {IPC_FD_ENV} (expected <read_fd>,<write_fd>), falling back to stdio");
    }
    IpcTransport::Stdio
}

/// One-shot worker bound to an IPC channel
pub struct WorkerMain {
    reader: FrameReader<Box<dyn Read>>,
    writer: FrameWriter<Box<dyn Write>>,
}

impl WorkerMain {
    /// Bind to fd 3/4 if announced, otherwise stdin/stdout
    pub fn new() -> Self {
        match detect_transport() {
            #[cfg(unix)]
            IpcTransport::Fds { read_fd, write_fd } => {
                // SAFETY: the scheduler dup'ed both pipe ends onto these fds
                // before exec and nothing else in this process owns them.
                let read_file = unsafe { std::fs::File::from_raw_fd(read_fd) };
                let write_file = unsafe { std::fs::File::from_raw_fd(write_fd) };
                Self::with_streams(Box::new(read_file), Box::new(write_file))
            }
            IpcTransport::Stdio => {
                Self::with_streams(Box::new(std::io::stdin()), Box::new(std::io::stdout()))
            }
        }
    }

    /// Bind to arbitrary streams
    pub fn with_streams(reader: Box<dyn Read>, writer: Box<dyn Write>) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }

    /// Serve one start message and return the exit code to use
    pub fn run(&mut self) -> Result<i32, WorkerError> {
        let message = match self.reader.read::<StartMessage>() {
            Ok(start) => execute(&start),
            Err(e) => ExitMessage::Error(WireError::new(
                ErrorKind::Protocol,
                format!("failed to read start message: {e}"),
            )),
        };

        self.report(&message)
    }

    /// Send `message`; one too large to frame is replaced by a protocol error
    fn report(&mut self, message: &ExitMessage) -> Result<i32, WorkerError> {
        let code = match message {
            ExitMessage::Result(_) => EXIT_SUCCESS,
            ExitMessage::Error(error) => {
                debug!(%error, "worker reporting failure");
                EXIT_FAILURE
            }
        };
        match self.writer.write(message) {
            Ok(()) => Ok(code),
            Err(FrameError::FrameTooLarge { size, max }) => {
                let error = WireError::new(
                    ErrorKind::Protocol,
                    format!("exit message of {size} bytes exceeds the {max} byte frame limit"),
                );
                warn!(%error, "exit message too large, reporting failure instead");
                self.writer.write(&ExitMessage::Error(error))?;
                Ok(EXIT_FAILURE)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for WorkerMain {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle one start message against the files linked into this binary
pub fn execute(start: &StartMessage) -> ExitMessage {
    if start.protocol_version != PROTOCOL_VERSION {
        return ExitMessage::Error(WireError::new(
            ErrorKind::Protocol,
            format!(
                "expected protocol version {PROTOCOL_VERSION}, got {}",
                start.protocol_version
            ),
        ));
    }

    let Some(file) = BenchFile::find(&start.filename) else {
        let error = DiscoveryError::UnknownFile(start.filename.clone());
        return ExitMessage::Error(WireError::new(ErrorKind::Discovery, error.to_string()));
    };
    execute_in(file, start)
}

/// Handle one start message against a specific file
pub fn execute_in(file: &BenchFile, start: &StartMessage) -> ExitMessage {
    let mut root = match DiscoveryContext::new(start.options).load_file(file) {
        Ok(root) => root,
        Err(e) => return ExitMessage::Error(WireError::new(ErrorKind::Discovery, e.to_string())),
    };

    let Some(bench) = root.find_benchmark_mut(&start.benchmark_id) else {
        return ExitMessage::Error(WireError::new(
            ErrorKind::BenchmarkNotFound,
            format!(
                "benchmark '{}' not found in '{}'",
                start.benchmark_id, start.filename
            ),
        ));
    };
    bench.options = start.options;

    let resolution = Timer::resolution();
    debug!(id = %bench.id, resolution, "measuring");
    let measurement = Measurement::new(bench.options, resolution);

    match panic::catch_unwind(AssertUnwindSafe(|| measurement.run(bench))) {
        Ok(Ok(result)) => ExitMessage::Result(result),
        Ok(Err(e)) => ExitMessage::Error(WireError::new(ErrorKind::Measurement, e.to_string())),
        Err(payload) => ExitMessage::Error(WireError::new(
            ErrorKind::Measurement,
            panic_message(payload.as_ref()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PartialOptions;
    use forkbench_ipc::{BenchmarkOptions, BenchmarkResult, MAX_FRAME_SIZE, ResultStats};
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    fn quick() -> BenchmarkOptions {
        BenchmarkOptions {
            min_time: 1_000,
            max_time: 100_000,
            min_samples: 2,
            max_samples: 5,
            ..Default::default()
        }
    }

    fn worker_file(ctx: &mut DiscoveryContext) {
        ctx.group("math", |ctx| {
            ctx.benchmark("add", || std::hint::black_box(2u64) + 2);
            ctx.benchmark("explode", || -> u64 { panic!("callable exploded") });
            ctx.benchmark_with(
                "pinned",
                PartialOptions::new().min_samples(9).max_samples(9),
                || std::hint::black_box(3u64) * 3,
            );
        });
    }

    inventory::submit! {
        BenchFile::new("worker-tests/math.rs", worker_file)
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn start(id: &str) -> StartMessage {
        StartMessage::new(id, "worker-tests/math.rs", quick())
    }

    #[test]
    fn test_execute_success_uses_message_options() {
        match execute(&start("worker-tests/math.rs:math:add")) {
            ExitMessage::Result(result) => {
                assert_eq!(result.id, "worker-tests/math.rs:math:add");
                assert_eq!(result.options, quick());
                assert!(result.sample_count >= 2 && result.sample_count <= 5);
            }
            ExitMessage::Error(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_message_options_replace_declared_options() {
        let options = BenchmarkOptions {
            min_samples: 2,
            max_samples: 3,
            ..quick()
        };
        let message = StartMessage::new(
            "worker-tests/math.rs:math:pinned",
            "worker-tests/math.rs",
            options,
        );
        match execute(&message) {
            ExitMessage::Result(result) => {
                assert_eq!(result.options, message.options);
                assert!(result.sample_count >= 2 && result.sample_count <= 3);
                assert_eq!(result.times.len() as u64, result.sample_count);
            }
            ExitMessage::Error(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_execute_reports_callable_panic() {
        let ExitMessage::Error(error) = execute(&start("worker-tests/math.rs:math:explode")) else {
            panic!("expected error");
        };
        assert_eq!(error.kind(), Some(ErrorKind::Measurement));
        assert_eq!(error.message, "callable exploded");
    }

    #[test]
    fn test_execute_not_found() {
        let ExitMessage::Error(error) = execute(&start("worker-tests/math.rs:math:missing")) else {
            panic!("expected error");
        };
        assert_eq!(error.name, "BenchmarkNotFoundError");
    }

    #[test]
    fn test_execute_unknown_file() {
        let message = StartMessage::new("nowhere.rs:x", "nowhere.rs", quick());
        let ExitMessage::Error(error) = execute(&message) else {
            panic!("expected error");
        };
        assert_eq!(error.kind(), Some(ErrorKind::Discovery));
    }

    #[test]
    fn test_execute_version_mismatch() {
        let mut message = start("worker-tests/math.rs:math:add");
        message.protocol_version = PROTOCOL_VERSION + 1;
        let ExitMessage::Error(error) = execute(&message) else {
            panic!("expected error");
        };
        assert_eq!(error.kind(), Some(ErrorKind::Protocol));
    }

    #[test]
    fn test_run_over_streams() {
        let mut input = Vec::new();
        FrameWriter::new(&mut input)
            .write(&start("worker-tests/math.rs:math:add"))
            .unwrap();
        let output = SharedBuf::default();

        let mut worker =
            WorkerMain::with_streams(Box::new(Cursor::new(input)), Box::new(output.clone()));
        assert_eq!(worker.run().unwrap(), EXIT_SUCCESS);

        let bytes = output.0.lock().unwrap().clone();
        let reply: ExitMessage = FrameReader::new(Cursor::new(bytes)).read().unwrap();
        assert!(matches!(reply, ExitMessage::Result(_)));
    }

    #[test]
    fn test_oversized_result_reported_as_error() {
        let times = vec![1.0; MAX_FRAME_SIZE / 8 + 1];
        let result = BenchmarkResult {
            id: "worker-tests/math.rs:math:add".to_string(),
            name: "add".to_string(),
            filename: "worker-tests/math.rs".to_string(),
            stats: ResultStats::default(),
            sample_count: times.len() as u64,
            count: 1,
            options: quick(),
            times,
        };
        let output = SharedBuf::default();
        let mut worker =
            WorkerMain::with_streams(Box::new(Cursor::new(Vec::new())), Box::new(output.clone()));

        assert_eq!(worker.report(&ExitMessage::Result(result)).unwrap(), EXIT_FAILURE);

        let bytes = output.0.lock().unwrap().clone();
        let reply: ExitMessage = FrameReader::new(Cursor::new(bytes)).read().unwrap();
        let ExitMessage::Error(error) = reply else {
            panic!("expected error");
        };
        assert_eq!(error.kind(), Some(ErrorKind::Protocol));
        assert!(error.message.contains("frame limit"));
    }

    #[test]
    fn test_run_without_start_message() {
        let output = SharedBuf::default();
        let mut worker =
            WorkerMain::with_streams(Box::new(Cursor::new(Vec::new())), Box::new(output.clone()));
        assert_eq!(worker.run().unwrap(), EXIT_FAILURE);

        let bytes = output.0.lock().unwrap().clone();
        let reply: ExitMessage = FrameReader::new(Cursor::new(bytes)).read().unwrap();
        let ExitMessage::Error(error) = reply else {
            panic!("expected error");
        };
        assert_eq!(error.kind(), Some(ErrorKind::Protocol));
    }
}
