use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::decode::StreamDecoder;
use crate::core::job::InvocationStatus;

const CHUNK_SIZE: usize = 8192;
const DRAIN_POLLS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// One run of the tool against one input file.
#[derive(Debug)]
pub struct Invocation<'a> {
    pub executable: &'a Path,
    pub argument: &'a Path,
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub cancel: &'a AtomicBool,
}

impl Invocation<'_> {
    fn abort_reason(&self, started: Instant) -> Option<InvocationStatus> {
        if self.cancel.load(Ordering::SeqCst) {
            return Some(InvocationStatus::Terminated);
        }
        match self.timeout {
            Some(limit) if started.elapsed() >= limit => Some(InvocationStatus::TimedOut),
            _ => None,
        }
    }

    /// Spawn the child, hand every decoded chunk of stdout/stderr to `emit` as it
    /// arrives, and block until the child exits or is killed.
    ///
    /// `emit` is only ever called on the calling thread.
    #[instrument(skip_all, fields(argument = %self.argument.display()))]
    pub fn run(&self, mut emit: impl FnMut(StreamKind, String)) -> InvocationStatus {
        let mut cmd = Command::new(self.executable);
        cmd.arg(self.argument)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("spawning child process");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(err = %err, "failed to spawn tool");
                return InvocationStatus::SpawnFailed(err.to_string());
            }
        };

        let (chunk_tx, chunk_rx) = mpsc::channel::<(StreamKind, String)>();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_chunk_reader(StreamKind::Stdout, stdout, chunk_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_chunk_reader(StreamKind::Stderr, stderr, chunk_tx.clone()));
        }
        drop(chunk_tx);

        let started = Instant::now();
        let mut streams_open = true;

        // The file is done when the tool exits, not when its pipes close: a
        // background child of the tool can keep them open indefinitely.
        let status = loop {
            if streams_open {
                match chunk_rx.recv_timeout(self.poll_interval) {
                    Ok((stream, text)) => emit(stream, text),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => streams_open = false,
                }
            }

            if let Some(reason) = self.abort_reason(started) {
                kill(&mut child);
                break reason;
            }

            let exited = if streams_open {
                child.try_wait()
            } else {
                child.wait_timeout(self.poll_interval)
            };
            match exited {
                Ok(Some(status)) => {
                    debug!(exit_code = ?status.code(), "tool finished");
                    break from_exit_status(status);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(err = %err, "failed to wait for tool");
                    kill(&mut child);
                    break InvocationStatus::SpawnFailed(err.to_string());
                }
            }
        };

        // Whatever the tool wrote before exiting still belongs to this file.
        self.drain(&chunk_rx, &mut emit);
        reap_readers(readers);
        status
    }

    /// Forward buffered chunks until the pipes close or stay quiet for one
    /// poll interval, bounded so a chatty grandchild cannot hold the batch.
    fn drain(
        &self,
        chunk_rx: &Receiver<(StreamKind, String)>,
        emit: &mut impl FnMut(StreamKind, String),
    ) {
        let deadline = Instant::now() + self.poll_interval * DRAIN_POLLS;
        while Instant::now() < deadline {
            match chunk_rx.recv_timeout(self.poll_interval) {
                Ok((stream, text)) => emit(stream, text),
                Err(_) => break,
            }
        }
    }
}

/// Join readers that already hit EOF. A reader whose pipe is still held open
/// by a grandchild is left detached; it exits on EOF or on its first send
/// after the receiver is gone.
fn reap_readers(readers: Vec<JoinHandle<()>>) {
    let mut detached = 0usize;
    for handle in readers {
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            detached += 1;
        }
    }
    if detached > 0 {
        debug!(detached, "pipe still held open after tool exit");
    }
}

fn from_exit_status(status: ExitStatus) -> InvocationStatus {
    match status.code() {
        Some(code) => InvocationStatus::Exited(code),
        None => InvocationStatus::Signaled,
    }
}

fn kill(child: &mut Child) {
    if let Err(err) = child.kill() {
        warn!(err = %err, "failed to kill tool");
    }
    match child.wait() {
        Ok(status) => debug!(status = %status, "tool killed"),
        Err(err) => warn!(err = %err, "failed to reap killed tool"),
    }
}

fn spawn_chunk_reader<R: Read + Send + 'static>(
    stream: StreamKind,
    mut reader: R,
    sender: Sender<(StreamKind, String)>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut decoder = StreamDecoder::new();
        let mut chunk = [0u8; CHUNK_SIZE];

        loop {
            let read = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            };

            let text = decoder.push(&chunk[..read]);
            if !text.is_empty() && sender.send((stream, text)).is_err() {
                return;
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            let _ = sender.send((stream, tail));
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    // Writing a script while another test thread forks can make exec fail
    // with ETXTBSY, so spawning tests run one at a time.
    static SPAWN_LOCK: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        SPAWN_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("tool.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    fn invoke(
        executable: &Path,
        argument: &Path,
        cancel: &AtomicBool,
    ) -> (InvocationStatus, String) {
        let request = Invocation {
            executable,
            argument,
            timeout: None,
            poll_interval: Duration::from_millis(10),
            cancel,
        };
        let mut output = String::new();
        let status = request.run(|_, text| output.push_str(&text));
        (status, output)
    }

    #[test]
    fn captures_both_streams_and_exit_code() {
        let _serial = serial();
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = script(dir.path(), "echo \"out $1\"\necho err >&2\nexit 3");
        let cancel = AtomicBool::new(false);

        let (status, output) = invoke(&tool, Path::new("/tmp/a.psd"), &cancel);

        assert_eq!(status, InvocationStatus::Exited(3));
        assert!(output.contains("out /tmp/a.psd\n"), "{output}");
        assert!(output.contains("err\n"), "{output}");
    }

    #[test]
    fn silent_tool_is_fine() {
        let _serial = serial();
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = script(dir.path(), "exit 0");
        let cancel = AtomicBool::new(false);

        let (status, output) = invoke(&tool, Path::new("x"), &cancel);

        assert!(status.success());
        assert!(output.is_empty());
    }

    #[test]
    fn missing_executable_is_a_spawn_failure() {
        let _serial = serial();
        let dir = tempfile::tempdir().expect("tempdir");
        let cancel = AtomicBool::new(false);

        let (status, _) = invoke(&dir.path().join("absent"), Path::new("x"), &cancel);

        assert!(matches!(status, InvocationStatus::SpawnFailed(_)));
        assert_eq!(status.code(), crate::core::job::SPAWN_FAILED);
    }

    #[test]
    fn preset_cancel_flag_terminates() {
        let _serial = serial();
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = script(dir.path(), "exec sleep 10");
        let cancel = AtomicBool::new(true);

        let started = Instant::now();
        let (status, _) = invoke(&tool, Path::new("x"), &cancel);

        assert_eq!(status, InvocationStatus::Terminated);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn timeout_kills_the_child() {
        let _serial = serial();
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = script(dir.path(), "exec sleep 10");
        let cancel = AtomicBool::new(false);
        let request = Invocation {
            executable: &tool,
            argument: Path::new("x"),
            timeout: Some(Duration::from_millis(100)),
            poll_interval: Duration::from_millis(10),
            cancel: &cancel,
        };

        let status = request.run(|_, _| {});

        assert_eq!(status, InvocationStatus::TimedOut);
    }

    #[test]
    fn exit_is_reported_while_a_background_child_holds_the_pipe() {
        let _serial = serial();
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = script(dir.path(), "sleep 4 &\necho ok\nexit 0");
        let cancel = AtomicBool::new(false);

        let started = Instant::now();
        let (status, output) = invoke(&tool, Path::new("x"), &cancel);

        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
        assert_eq!(status, InvocationStatus::Exited(0));
        assert_eq!(output, "ok\n");
    }

    #[test]
    fn cancel_returns_even_if_a_grandchild_keeps_the_pipe() {
        let _serial = serial();
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = script(dir.path(), "sleep 30 &\necho started\nexec sleep 30");
        let cancel = AtomicBool::new(true);

        let started = Instant::now();
        let (status, _) = invoke(&tool, Path::new("x"), &cancel);

        assert_eq!(status, InvocationStatus::Terminated);
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }
}
