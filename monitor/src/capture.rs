use chrono::Local;
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::detector::{DetectorError, MotionDetector};
use crate::persistence::PersistencePolicy;
use crate::source::{FrameSource, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("failed to start frame source: {0}")]
    Start(#[source] SourceError),
    #[error("frame capture failed: {0}")]
    Capture(#[source] SourceError),
    #[error("motion detection failed: {0}")]
    Detect(#[from] DetectorError),
    #[error("capture loop is {0:?}, expected Idle")]
    InvalidState(LoopState),
}

/// Periodic capture → score → save loop over one frame source.
///
/// Single task, strictly sequential. Shutdown is only observed while sleeping
/// between iterations, never in the middle of a capture or a save.
pub struct CaptureLoop<S: FrameSource> {
    source: S,
    detector: MotionDetector,
    policy: PersistencePolicy,
    interval: Duration,
    state: LoopState,
    iterations: u64,
    saved: u64,
}

impl<S: FrameSource> CaptureLoop<S> {
    pub fn new(
        source: S,
        detector: MotionDetector,
        policy: PersistencePolicy,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            detector,
            policy,
            interval,
            state: LoopState::Idle,
            iterations: 0,
            saved: 0,
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Completed capture → score → save iterations.
    #[allow(dead_code)]
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Snapshots written to disk.
    #[allow(dead_code)]
    pub fn saved(&self) -> u64 {
        self.saved
    }

    /// Run until Ctrl-C or a fatal error.
    pub async fn run(&mut self) -> Result<(), LoopError> {
        let (tx, rx) = oneshot::channel::<()>();
        let signal = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("received interrupt");
                    let _ = tx.send(());
                }
                Err(e) => {
                    // Keep `tx` alive so the loop is not told to stop.
                    warn!(error = %e, "failed to listen for Ctrl-C; stop the process externally");
                    std::future::pending::<()>().await;
                }
            }
        });
        // Let the signal task register its handler before the first capture.
        tokio::task::yield_now().await;

        let result = self
            .run_until(async {
                let _ = rx.await;
            })
            .await;
        signal.abort();
        result
    }

    /// Run until `shutdown` resolves or an iteration fails.
    ///
    /// `Ok(())` means an orderly shutdown. Every exit path releases the
    /// frame source and leaves the loop `Stopped`.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), LoopError>
    where
        F: Future<Output = ()>,
    {
        if self.state != LoopState::Idle {
            return Err(LoopError::InvalidState(self.state));
        }

        if let Err(e) = self.source.start().await {
            error!(error = %e, source = self.source.name(), "failed to start frame source");
            self.stop().await;
            return Err(LoopError::Start(e));
        }

        self.state = LoopState::Running;
        info!(
            source = self.source.name(),
            interval = ?self.interval,
            "Starting motion monitoring..."
        );

        tokio::pin!(shutdown);
        let result = loop {
            if let Err(e) = self.step().await {
                error!(error = %e, iteration = self.iterations, "Error occurred");
                break Err(e);
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Stopping monitoring...");
                    break Ok(());
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        };

        self.stop().await;
        result
    }

    async fn step(&mut self) -> Result<(), LoopError> {
        let frame = self.source.capture().await.map_err(LoopError::Capture)?;
        let score = self.detector.score(&frame)?;
        debug!(seq = frame.seq, score = format!("{score:.2}"), "movement level");

        let saved = self
            .policy
            .maybe_save(score, &frame, Local::now())
            .await;
        if saved.is_some() {
            self.saved += 1;
        }
        self.iterations += 1;
        if self.iterations % 100 == 0 {
            debug!(iterations = self.iterations, saved = self.saved, "frames processed");
        }
        Ok(())
    }

    async fn stop(&mut self) {
        self.source.stop().await;
        self.state = LoopState::Stopped;
        info!(
            iterations = self.iterations,
            saved = self.saved,
            "Monitoring stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NoopSink;
    use motion_monitor_common::frame::Frame;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Source that replays a fixed script of capture results.
    struct ScriptedSource {
        script: VecDeque<Result<Frame, SourceError>>,
        fail_start: bool,
        stops: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Frame, SourceError>>) -> (Self, Arc<AtomicUsize>) {
            let stops = Arc::new(AtomicUsize::new(0));
            let source = Self {
                script: script.into(),
                fail_start: false,
                stops: Arc::clone(&stops),
            };
            (source, stops)
        }
    }

    impl FrameSource for ScriptedSource {
        async fn start(&mut self) -> Result<(), SourceError> {
            if self.fail_start {
                return Err(SourceError::HttpStatus(503));
            }
            Ok(())
        }

        async fn capture(&mut self) -> Result<Frame, SourceError> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(SourceError::Exhausted("script".into())))
        }

        async fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn level(seq: u64, v: u8) -> Result<Frame, SourceError> {
        Ok(Frame::filled(8, 8, [v, v, v], 0, seq))
    }

    fn capture_loop(
        source: ScriptedSource,
        output_dir: &Path,
        interval: Duration,
    ) -> CaptureLoop<ScriptedSource> {
        let detector = MotionDetector::new(25, 1).unwrap();
        let policy =
            PersistencePolicy::new(25.0, output_dir.to_path_buf(), 90, Box::new(NoopSink)).unwrap();
        CaptureLoop::new(source, detector, policy, interval)
    }

    #[tokio::test]
    async fn saves_only_frames_with_movement() {
        let tmp = TempDir::new().unwrap();
        let (source, stops) = ScriptedSource::new(vec![level(0, 0), level(1, 255), level(2, 255)]);
        let mut lp = capture_loop(source, tmp.path(), Duration::from_millis(1));
        assert_eq!(lp.state(), LoopState::Idle);

        let result = lp.run_until(std::future::pending()).await;
        assert!(matches!(result, Err(LoopError::Capture(SourceError::Exhausted(_)))));
        assert_eq!(lp.iterations(), 3);
        assert_eq!(lp.saved(), 1);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(lp.state(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn failed_saves_do_not_stop_the_loop() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("frames");
        let (source, stops) = ScriptedSource::new(vec![
            level(0, 0),
            level(1, 255),
            level(2, 0),
            level(3, 255),
        ]);
        let mut lp = capture_loop(source, &dir, Duration::from_millis(1));

        // Every save will fail: the output directory is now a file.
        std::fs::remove_dir(&dir).unwrap();
        std::fs::write(&dir, b"blocked").unwrap();

        let result = lp.run_until(std::future::pending()).await;
        assert!(matches!(result, Err(LoopError::Capture(SourceError::Exhausted(_)))));
        assert_eq!(lp.iterations(), 4);
        assert_eq!(lp.saved(), 0);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn capture_failure_stops_and_releases_source() {
        let tmp = TempDir::new().unwrap();
        let (source, stops) = ScriptedSource::new(vec![
            level(0, 0),
            Err(SourceError::HttpStatus(500)),
            level(2, 255),
        ]);
        let mut lp = capture_loop(source, tmp.path(), Duration::from_millis(1));

        let result = lp.run_until(std::future::pending()).await;
        assert!(matches!(result, Err(LoopError::Capture(SourceError::HttpStatus(500)))));
        assert_eq!(lp.iterations(), 1);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(lp.state(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn size_change_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let (source, stops) = ScriptedSource::new(vec![
            level(0, 0),
            Ok(Frame::filled(16, 8, [0, 0, 0], 0, 1)),
        ]);
        let mut lp = capture_loop(source, tmp.path(), Duration::from_millis(1));

        let result = lp.run_until(std::future::pending()).await;
        assert!(matches!(
            result,
            Err(LoopError::Detect(DetectorError::DimensionMismatch { .. }))
        ));
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_during_sleep_is_clean() {
        let tmp = TempDir::new().unwrap();
        let (source, stops) = ScriptedSource::new(vec![level(0, 0), level(1, 255)]);
        let mut lp = capture_loop(source, tmp.path(), Duration::from_secs(3600));

        let result = lp
            .run_until(tokio::time::sleep(Duration::from_millis(20)))
            .await;
        assert!(result.is_ok());
        assert_eq!(lp.iterations(), 1);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(lp.state(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn start_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let (mut source, stops) = ScriptedSource::new(vec![level(0, 0)]);
        source.fail_start = true;
        let mut lp = capture_loop(source, tmp.path(), Duration::from_millis(1));

        let result = lp.run_until(std::future::pending()).await;
        assert!(matches!(result, Err(LoopError::Start(SourceError::HttpStatus(503)))));
        assert_eq!(lp.iterations(), 0);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(lp.state(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn loop_runs_only_once() {
        let tmp = TempDir::new().unwrap();
        let (source, _stops) = ScriptedSource::new(vec![]);
        let mut lp = capture_loop(source, tmp.path(), Duration::from_millis(1));

        let _ = lp.run_until(std::future::pending()).await;
        let again = lp.run_until(std::future::pending()).await;
        assert!(matches!(again, Err(LoopError::InvalidState(LoopState::Stopped))));
    }
}
