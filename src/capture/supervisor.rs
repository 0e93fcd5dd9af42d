//! Capture process supervision
//!
//! ```text
//!   Stopped ──start()──► Starting ──spawned──► Running ──┬─ exits ──────► Exited(code)
//!                            │                           └─ shutdown() ─► Killed
//!                            └─ spawn fails ──► Stopped
//! ```
//!
//! The supervisor is consumed by [`CaptureSupervisor::start`], so each one
//! owns at most one capture process. The returned [`CaptureHandle`] is the
//! only way to reach that process. There is no restart on exit.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::config::CaptureConfig;
use super::pipeline::{log_stderr, pump_lines, run_decoder, PumpEnd};
use super::reframer::{FrameError, LineReframer};
use crate::hub::BroadcastHub;
use crate::stats::PipelineStats;

/// Capture process lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Not started, or failed to spawn
    Stopped,
    /// Spawn in progress
    Starting,
    /// Process running, output being relayed
    Running,
    /// Process exited on its own (exit code if it had one)
    Exited(Option<i32>),
    /// Process terminated by the supervisor
    Killed,
}

impl CaptureState {
    /// Whether the process has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaptureState::Exited(_) | CaptureState::Killed)
    }
}

/// Capture supervision error
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Capture program could not be started
    #[error("failed to spawn capture program '{program}': {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A stdio pipe was not available after spawn
    #[error("capture {0} pipe unavailable")]
    MissingPipe(&'static str),
}

/// Owns the capture configuration until the process is started
#[derive(Debug)]
pub struct CaptureSupervisor {
    config: CaptureConfig,
    hub: Arc<BroadcastHub>,
    stats: Arc<PipelineStats>,
    state: watch::Sender<CaptureState>,
}

impl CaptureSupervisor {
    /// Create a supervisor that will relay records into `hub`
    pub fn new(config: CaptureConfig, hub: Arc<BroadcastHub>, stats: Arc<PipelineStats>) -> Self {
        let (state, _) = watch::channel(CaptureState::Stopped);
        Self {
            config,
            hub,
            stats,
            state,
        }
    }

    /// Current state
    pub fn state(&self) -> CaptureState {
        *self.state.borrow()
    }

    /// Spawn the capture process and start relaying its output
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> Result<CaptureHandle, CaptureError> {
        let Self {
            config,
            hub,
            stats,
            state,
        } = self;

        state.send_replace(CaptureState::Starting);

        let args = config.build_args();
        let mut child = match Command::new(&config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                state.send_replace(CaptureState::Stopped);
                tracing::error!(
                    program = %config.program,
                    error = %source,
                    "Capture process failed to start"
                );
                return Err(CaptureError::Spawn {
                    program: config.program.clone(),
                    source,
                });
            }
        };

        let pid = child.id();
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            state.send_replace(CaptureState::Stopped);
            return Err(CaptureError::MissingPipe("stdio"));
        };

        state.send_replace(CaptureState::Running);
        tracing::info!(
            program = %config.program,
            args = ?args,
            pid = ?pid,
            "Capture process started"
        );

        let span = tracing::info_span!("capture", pid = ?pid);

        let (line_tx, line_rx) = mpsc::channel(config.line_channel_capacity.max(1));
        let (fail_tx, fail_rx) = oneshot::channel();
        let pump = {
            let reframer = LineReframer::new(config.max_line_len, config.overflow_policy);
            let stats = Arc::clone(&stats);
            let read_size = config.read_buffer_size;
            tokio::spawn(
                async move {
                    let end = pump_lines(stdout, reframer, line_tx, stats, read_size).await;
                    if let PumpEnd::Failed(ref e) = end {
                        let _ = fail_tx.send(e.clone());
                    }
                    end
                }
                .instrument(span.clone()),
            )
        };
        let decoder = tokio::spawn(run_decoder(line_rx, hub, stats).instrument(span.clone()));
        let stderr = tokio::spawn(log_stderr(stderr).instrument(span.clone()));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let grace = config.shutdown_grace;
        let state_rx = state.subscribe();

        let task = tokio::spawn(
            async move {
                let outcome = supervise(child, shutdown_rx, fail_rx, grace).await;
                drain(pump, decoder, stderr, grace).await;
                state.send_replace(outcome);
                outcome
            }
            .instrument(span),
        );

        Ok(CaptureHandle {
            pid,
            state: state_rx,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// Handle to a running capture process
#[derive(Debug)]
pub struct CaptureHandle {
    pid: Option<u32>,
    state: watch::Receiver<CaptureState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<CaptureState>,
}

impl CaptureHandle {
    /// OS process id, if the process was still running when spawned
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current state
    pub fn state(&self) -> CaptureState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.state.clone()
    }

    /// Wait for the process to exit on its own
    pub async fn wait(self) -> CaptureState {
        let Self {
            shutdown, task, ..
        } = self;
        // keep the shutdown channel open so waiting never requests a stop
        let _shutdown = shutdown;
        join(task).await
    }

    /// Terminate the process and wait until its output has drained
    pub async fn shutdown(mut self) -> CaptureState {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        join(self.task).await
    }
}

async fn join(task: JoinHandle<CaptureState>) -> CaptureState {
    match task.await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Capture supervisor task failed");
            CaptureState::Exited(None)
        }
    }
}

async fn supervise(
    mut child: Child,
    shutdown: oneshot::Receiver<()>,
    failed: oneshot::Receiver<FrameError>,
    grace: Duration,
) -> CaptureState {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => {
                tracing::info!(code = ?status.code(), "Capture process exited");
                CaptureState::Exited(status.code())
            }
            Ok(status) => {
                tracing::warn!(code = ?status.code(), status = %status, "Capture process exited");
                CaptureState::Exited(status.code())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to wait for capture process");
                CaptureState::Exited(None)
            }
        },
        Ok(()) = shutdown => {
            tracing::info!("Stopping capture process");
            terminate(&mut child, grace).await;
            CaptureState::Killed
        }
        Ok(e) = failed => {
            tracing::error!(error = %e, "Capture output unusable, stopping capture process");
            terminate(&mut child, grace).await;
            CaptureState::Killed
        }
    }
}

/// Ask the process to exit, then force it after `grace`
async fn terminate(child: &mut Child, grace: Duration) {
    if request_stop(child, grace).await {
        return;
    }

    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill capture process");
    }
}

/// Send SIGTERM and wait up to `grace`; true if the process exited
#[cfg(unix)]
async fn request_stop(child: &mut Child, grace: Duration) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };

    // SAFETY: kill(2) has no memory-safety preconditions; `pid` is our
    // unreaped child, so it cannot have been recycled.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        tracing::warn!(
            error = %std::io::Error::last_os_error(),
            "Failed to signal capture process"
        );
        return false;
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            tracing::info!(status = %status, "Capture process terminated");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Failed to wait for capture process");
            false
        }
        Err(_) => {
            tracing::warn!(
                grace_ms = grace.as_millis() as u64,
                "Capture process ignored SIGTERM, killing"
            );
            false
        }
    }
}

#[cfg(not(unix))]
async fn request_stop(_child: &mut Child, _grace: Duration) -> bool {
    false
}

/// Let the readers finish what the process already wrote
///
/// Readers still running after `grace` (a descendant holding the pipes open)
/// are aborted.
async fn drain(
    mut pump: JoinHandle<PumpEnd>,
    mut decoder: JoinHandle<u64>,
    mut stderr: JoinHandle<()>,
    grace: Duration,
) {
    let drained = tokio::time::timeout(grace, async {
        match (&mut pump).await {
            Ok(PumpEnd::Io(e)) => tracing::warn!(error = %e, "Capture stdout read failed"),
            Ok(end) => tracing::debug!(end = ?end, "Capture stdout closed"),
            Err(e) => tracing::error!(error = %e, "Capture stdout task failed"),
        }
        match (&mut decoder).await {
            Ok(records) => tracing::debug!(records = records, "Capture decoder finished"),
            Err(e) => tracing::error!(error = %e, "Capture decoder task failed"),
        }
        let _ = (&mut stderr).await;
    })
    .await;

    if drained.is_err() {
        tracing::warn!("Capture output still open after exit, abandoning readers");
        pump.abort();
        decoder.abort();
        stderr.abort();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::capture::OverflowPolicy;

    fn shell(script: &str) -> CaptureConfig {
        CaptureConfig::command("sh", vec!["-c".to_string(), script.to_string()])
            .shutdown_grace(Duration::from_secs(2))
    }

    fn supervisor(config: CaptureConfig) -> (CaptureSupervisor, Arc<BroadcastHub>, Arc<PipelineStats>) {
        let hub = Arc::new(BroadcastHub::new());
        let stats = Arc::new(PipelineStats::new());
        let supervisor = CaptureSupervisor::new(config, Arc::clone(&hub), Arc::clone(&stats));
        (supervisor, hub, stats)
    }

    #[tokio::test]
    async fn test_records_relayed_until_exit() {
        let (supervisor, hub, stats) = supervisor(shell(
            r#"printf '{"a":1}\n  {\n{"a":'; printf '2}\n'; echo 'Capturing on lo' >&2; exit 3"#,
        ));
        let (_id, mut rx) = hub.connect().await.unwrap();
        assert_eq!(supervisor.state(), CaptureState::Stopped);

        let handle = supervisor.start().unwrap();
        assert!(handle.pid().is_some());

        assert_eq!(handle.wait().await, CaptureState::Exited(Some(3)));

        assert_eq!(
            rx.recv().await.unwrap().as_str(),
            r#"{"event":"packetData","data":{"a":1}}"#
        );
        assert_eq!(
            rx.recv().await.unwrap().as_str(),
            r#"{"event":"packetData","data":{"a":2}}"#
        );
        assert!(rx.try_recv().is_err());

        let snap = stats.snapshot();
        assert_eq!(snap.records, 2);
        assert_eq!(snap.incomplete_lines, 1);
    }

    #[tokio::test]
    async fn test_shutdown_kills_running_process() {
        let (supervisor, hub, _stats) =
            supervisor(shell(r#"printf '{"a":1}\n'; exec sleep 30"#));
        let (_id, mut rx) = hub.connect().await.unwrap();

        let handle = supervisor.start().unwrap();
        let mut state = handle.subscribe();
        assert_eq!(*state.borrow_and_update(), CaptureState::Running);

        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(first.as_str().contains(r#""a":1"#));

        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .unwrap();
        assert_eq!(outcome, CaptureState::Killed);
        assert!(outcome.is_terminal());
        assert_eq!(*state.borrow(), CaptureState::Killed);
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_supervisor_stopped() {
        let config = CaptureConfig::command("/nonexistent/capture-tool", Vec::new());
        let (supervisor, _hub, _stats) = supervisor(config);

        let err = supervisor.start().unwrap_err();
        assert!(matches!(err, CaptureError::Spawn { ref program, .. } if program == "/nonexistent/capture-tool"));
    }

    #[tokio::test]
    async fn test_overflow_fail_stops_process() {
        let config = shell("printf 0123456789abcdef; exec sleep 30")
            .max_line_len(4)
            .overflow_policy(OverflowPolicy::Fail);
        let (supervisor, _hub, stats) = supervisor(config);

        let handle = supervisor.start().unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap();

        assert_eq!(outcome, CaptureState::Killed);
        assert_eq!(stats.snapshot().overflows, 1);
    }

    #[tokio::test]
    async fn test_invalid_stderr_bytes_do_not_stop_telemetry() {
        let (supervisor, hub, stats) = supervisor(shell(
            r#"printf '\377\376\n' >&2; sleep 0.3; for i in 1 2 3; do echo warn >&2; printf '{"n":%d}\n' $i; done"#,
        ));
        let (_id, mut rx) = hub.connect().await.unwrap();

        let handle = supervisor.start().unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap();

        assert_eq!(outcome, CaptureState::Exited(Some(0)));
        assert_eq!(stats.snapshot().records, 3);
        for n in 1..=3 {
            assert_eq!(
                rx.recv().await.unwrap().as_str(),
                format!(r#"{{"event":"packetData","data":{{"n":{}}}}}"#, n)
            );
        }
    }

    #[tokio::test]
    async fn test_readers_aborted_when_descendant_holds_pipes() {
        let config = shell("sleep 3 & exit 0").shutdown_grace(Duration::from_millis(200));
        let (supervisor, hub, stats) = supervisor(config);

        let handle = supervisor.start().unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(2), handle.wait())
            .await
            .unwrap();
        assert_eq!(outcome, CaptureState::Exited(Some(0)));

        // the reader tasks held the only other references
        tokio::time::timeout(Duration::from_secs(1), async {
            while Arc::strong_count(&hub) > 1 || Arc::strong_count(&stats) > 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
