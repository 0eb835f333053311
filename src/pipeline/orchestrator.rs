//! The acquire, detect, fuse, emit loop.
//!
//! Only device-level failures end a run. Frame misses and detector
//! failures are absorbed per cycle so a live session survives sensor
//! glitches and occasional bad frames.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::sink::FrameSink;
use super::stats::CycleStats;
use crate::capture::{AcquisitionError, DepthCamera, DeviceConfig, DeviceError, FrameSource};
use crate::detection::{Detector, DetectorError};
use crate::fusion::DepthFuser;

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to start run: {0}")]
    Device(#[from] DeviceError),
    #[error("frame acquisition failed: {0}")]
    Acquisition(#[source] AcquisitionError),
    #[error("pipeline is not running")]
    NotRunning,
}

/// Run state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopping,
}

/// Out-of-band commands for a running pipeline.
///
/// Cloneable and safe to use from other threads, e.g. a signal handler.
#[derive(Debug, Clone, Default)]
pub struct ControlHandle {
    stop: Arc<AtomicBool>,
    snapshot: Arc<AtomicBool>,
}

impl ControlHandle {
    /// Asks the run to stop at the end of the current cycle.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Asks the sink to persist the next emitted frame.
    pub fn request_snapshot(&self) {
        self.snapshot.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn take_snapshot_request(&self) -> bool {
        self.snapshot.swap(false, Ordering::SeqCst)
    }

    fn reset_stop(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Sequence number of the processed color frame.
    pub sequence: u64,
    /// Fused detections emitted.
    pub detections: usize,
    /// Emitted detections that carried a distance.
    pub with_depth: usize,
    /// The detector failed and the cycle emitted no detections.
    pub detector_failed: bool,
    pub snapshot_taken: bool,
    pub elapsed: Duration,
}

/// Result of a cycle that did not end the run.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// No usable frame pair this cycle.
    Skipped(AcquisitionError),
}

/// Drives the per-frame cycle and owns the run state machine.
pub struct PipelineOrchestrator<C: DepthCamera, D: Detector, S: FrameSink> {
    source: FrameSource<C>,
    detector: D,
    fuser: DepthFuser,
    sink: S,
    device: DeviceConfig,
    confidence_threshold: f32,
    max_cycles: Option<u64>,
    snapshot_every: Option<u64>,
    state: RunState,
    control: ControlHandle,
    stats: CycleStats,
    awaiting_first_frame: bool,
}

impl<C: DepthCamera, D: Detector, S: FrameSink> PipelineOrchestrator<C, D, S> {
    pub fn new(camera: C, detector: D, sink: S, device: DeviceConfig) -> Self {
        Self {
            source: FrameSource::new(camera),
            detector,
            fuser: DepthFuser::default(),
            sink,
            device,
            confidence_threshold: 0.5,
            max_cycles: None,
            snapshot_every: None,
            state: RunState::Idle,
            control: ControlHandle::default(),
            stats: CycleStats::default(),
            awaiting_first_frame: true,
        }
    }

    pub fn with_fuser(mut self, fuser: DepthFuser) -> Self {
        self.fuser = fuser;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.set_confidence_threshold(threshold);
        self
    }

    /// Stops `run` after `cycles` cycles; `0` means no limit.
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = (cycles > 0).then_some(cycles);
        self
    }

    /// Snapshots every `cycles`-th completed cycle; `0` disables.
    pub fn with_snapshot_every(mut self, cycles: u64) -> Self {
        self.snapshot_every = (cycles > 0).then_some(cycles);
        self
    }

    /// Updates the detector threshold, clamped to `[0, 1]`.
    pub fn set_confidence_threshold(&mut self, threshold: f32) {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Handle for stop and snapshot requests.
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn source(&self) -> &FrameSource<C> {
        &self.source
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// `start-run`: starts the device and enters `Running`.
    ///
    /// On failure the orchestrator stays `Idle`. Starting a run that is
    /// already in progress fails with [`DeviceError::AlreadyStarted`].
    pub fn start_run(&mut self) -> Result<(), DeviceError> {
        if self.state != RunState::Idle {
            return Err(DeviceError::AlreadyStarted);
        }

        self.control.reset_stop();
        if let Err(e) = self.source.start(&self.device) {
            tracing::error!(error = %e, "Failed to start run");
            return Err(e);
        }

        self.awaiting_first_frame = true;
        self.state = RunState::Running;
        tracing::info!(
            confidence_threshold = self.confidence_threshold,
            sampling = ?self.fuser.policy(),
            "Run started"
        );
        Ok(())
    }

    /// `stop-run`: releases the device and returns to `Idle`.
    pub fn stop_run(&mut self) {
        if self.state == RunState::Idle {
            return;
        }
        self.state = RunState::Stopping;
        self.source.stop();
        self.state = RunState::Idle;
        tracing::info!(
            cycles = self.stats.cycles,
            completed = self.stats.completed,
            skipped = self.stats.skipped(),
            detector_failures = self.stats.detector_failures,
            "Run stopped"
        );
    }

    /// Runs one acquire, detect, fuse, emit cycle.
    ///
    /// Returns `Err` only for failures that end the run; the device has
    /// already been released when it does.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, PipelineError> {
        if self.state != RunState::Running {
            return Err(PipelineError::NotRunning);
        }
        let started = Instant::now();
        self.stats.cycles += 1;

        let timeout = if self.awaiting_first_frame {
            self.device.acquisition_timeout()
        } else {
            self.device.steady_state_timeout()
        };

        let (color, depth) = match self.source.get_aligned_frame(timeout) {
            Ok(pair) => pair,
            Err(e) if e.is_recoverable() => {
                tracing::debug!(cycle = self.stats.cycles, error = %e, "Skipping cycle");
                self.stats.record_skip(&e);
                self.poll_cancellation();
                return Ok(CycleOutcome::Skipped(e));
            }
            Err(e) => {
                tracing::error!(cycle = self.stats.cycles, error = %e, "Unrecoverable acquisition failure");
                self.stop_run();
                return Err(PipelineError::Acquisition(e));
            }
        };
        self.awaiting_first_frame = false;
        let sequence = color.sequence();

        let threshold = self.confidence_threshold;
        let detector = &mut self.detector;
        let result = panic::catch_unwind(AssertUnwindSafe(|| detector.detect(&color, threshold)))
            .unwrap_or_else(|payload| Err(DetectorError::Panicked(panic_message(payload))));
        let (detections, detector_failed) = match result {
            Ok(detections) => (detections, false),
            Err(e) => {
                tracing::warn!(sequence, error = %e, "Detector failed, continuing without detections");
                self.stats.detector_failures += 1;
                (Vec::new(), true)
            }
        };

        let fused = self.fuser.fuse(&detections, &depth);
        let with_depth = fused.iter().filter(|f| f.has_distance()).count();

        self.sink.emit(&color, &fused);
        let periodic = self
            .snapshot_every
            .is_some_and(|every| (self.stats.completed + 1) % every == 0);
        let snapshot_taken = self.control.take_snapshot_request() || periodic;
        if snapshot_taken {
            self.sink.snapshot(&color, &fused);
        }

        let elapsed = started.elapsed();
        self.stats.completed += 1;
        self.stats.detections += fused.len() as u64;
        self.stats.detections_without_depth += (fused.len() - with_depth) as u64;
        self.stats.last_cycle = Some(elapsed);
        tracing::trace!(
            sequence,
            detections = fused.len(),
            with_depth,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Cycle complete"
        );

        self.poll_cancellation();
        Ok(CycleOutcome::Completed(CycleReport {
            sequence,
            detections: fused.len(),
            with_depth,
            detector_failed,
            snapshot_taken,
            elapsed,
        }))
    }

    /// Starts if idle, then cycles until stopped, cancelled, or the cycle
    /// limit is reached. The device is released before returning.
    pub fn run(&mut self) -> Result<CycleStats, PipelineError> {
        self.run_with(|_, _| {})
    }

    /// Like [`run`](Self::run), calling `on_cycle` after every cycle that
    /// did not end the run.
    pub fn run_with<F>(&mut self, mut on_cycle: F) -> Result<CycleStats, PipelineError>
    where
        F: FnMut(&CycleOutcome, &CycleStats),
    {
        if self.state == RunState::Idle {
            self.start_run()?;
        }

        let mut cycles = 0u64;
        while self.state == RunState::Running {
            let outcome = self.run_cycle()?;
            on_cycle(&outcome, &self.stats);
            cycles += 1;
            if self.max_cycles.is_some_and(|max| cycles >= max) {
                tracing::info!(cycles, "Cycle limit reached");
                self.stop_run();
            }
        }

        self.stop_run();
        Ok(self.stats.clone())
    }

    fn poll_cancellation(&mut self) {
        if self.state == RunState::Running && self.control.is_stop_requested() {
            tracing::info!("Stop requested");
            self.stop_run();
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{
        CameraError, ColorFrame, SceneObject, SyntheticCamera, SyntheticFault, SyntheticScene,
    };
    use crate::detection::{BoundingBox, Detection, FixedDetector};
    use crate::fusion::{FusedDetection, SamplingPolicy};

    const WARM_UP: u32 = 2;

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<(u64, Vec<FusedDetection>)>,
        snapshots: Vec<u64>,
    }

    impl FrameSink for RecordingSink {
        fn emit(&mut self, color: &ColorFrame, detections: &[FusedDetection]) {
            self.frames.push((color.sequence(), detections.to_vec()));
        }

        fn snapshot(&mut self, color: &ColorFrame, _detections: &[FusedDetection]) {
            self.snapshots.push(color.sequence());
        }
    }

    /// Fails on the listed calls, otherwise behaves like the wrapped detector.
    struct FlakyDetector {
        inner: FixedDetector,
        calls: u64,
        fail_on: Vec<u64>,
        panic_on: Vec<u64>,
    }

    impl Detector for FlakyDetector {
        fn detect(
            &mut self,
            image: &ColorFrame,
            confidence_threshold: f32,
        ) -> Result<Vec<Detection>, DetectorError> {
            self.calls += 1;
            if self.fail_on.contains(&self.calls) {
                return Err(DetectorError::Inference("bad tensor".into()));
            }
            if self.panic_on.contains(&self.calls) {
                panic!("model exploded");
            }
            self.inner.detect(image, confidence_threshold)
        }
    }

    fn device() -> DeviceConfig {
        DeviceConfig {
            warm_up_frame_count: WARM_UP,
            ..DeviceConfig::with_dimensions(640, 480)
        }
    }

    fn target_box() -> Detection {
        Detection::new(BoundingBox::new(100, 100, 200, 200), 0, 0.9)
    }

    fn scene(object: SceneObject) -> SyntheticScene {
        SyntheticScene {
            background_m: 3.0,
            objects: vec![object],
        }
    }

    fn orchestrator(
        camera: SyntheticCamera,
    ) -> PipelineOrchestrator<SyntheticCamera, FixedDetector, RecordingSink> {
        PipelineOrchestrator::new(
            camera,
            FixedDetector::new(vec![target_box()]),
            RecordingSink::default(),
            device(),
        )
    }

    fn completed(outcome: CycleOutcome) -> CycleReport {
        match outcome {
            CycleOutcome::Completed(report) => report,
            CycleOutcome::Skipped(e) => panic!("cycle skipped: {e}"),
        }
    }

    #[test]
    fn test_object_distance_fused() {
        let camera = SyntheticCamera::new(scene(SceneObject::at(100, 100, 200, 200, 1.25)));
        let mut pipeline = orchestrator(camera);
        pipeline.start_run().unwrap();

        let report = completed(pipeline.run_cycle().unwrap());
        assert_eq!(report.detections, 1);
        assert_eq!(report.with_depth, 1);

        let (_, fused) = &pipeline.sink().frames[0];
        assert_eq!(fused[0].center, (150, 150));
        assert!((fused[0].distance_m.unwrap() - 1.25).abs() < 0.005);
    }

    #[test]
    fn test_dropout_reports_absent_distance() {
        let camera = SyntheticCamera::new(scene(SceneObject::dropout(100, 100, 200, 200)));
        let mut pipeline = orchestrator(camera);
        pipeline.start_run().unwrap();

        let report = completed(pipeline.run_cycle().unwrap());
        assert_eq!(report.detections, 1);
        assert_eq!(report.with_depth, 0);
        assert_eq!(pipeline.sink().frames[0].1[0].distance_m, None);
        assert_eq!(pipeline.stats().detections_without_depth, 1);
    }

    #[test]
    fn test_timeout_skips_only_that_cycle() {
        let mut camera = SyntheticCamera::new(scene(SceneObject::at(100, 100, 200, 200, 1.25)));
        camera.inject_fault(WARM_UP as u64 + 5, SyntheticFault::Timeout);
        let mut pipeline = orchestrator(camera);
        pipeline.start_run().unwrap();

        for cycle in 1..=8 {
            let outcome = pipeline.run_cycle().unwrap();
            match cycle {
                5 => assert!(matches!(
                    outcome,
                    CycleOutcome::Skipped(AcquisitionError::Timeout(_))
                )),
                _ => assert_eq!(completed(outcome).detections, 1),
            }
            assert_eq!(pipeline.state(), RunState::Running);
        }

        assert_eq!(pipeline.stats().skipped_timeout, 1);
        assert_eq!(pipeline.stats().completed, 7);
        assert_eq!(pipeline.sink().frames.len(), 7);
    }

    #[test]
    fn test_incomplete_frame_skipped() {
        let mut camera = SyntheticCamera::default();
        camera.inject_fault(WARM_UP as u64 + 1, SyntheticFault::MissingDepth);
        let mut pipeline = orchestrator(camera);
        pipeline.start_run().unwrap();

        assert!(matches!(
            pipeline.run_cycle().unwrap(),
            CycleOutcome::Skipped(AcquisitionError::Incomplete { .. })
        ));
        completed(pipeline.run_cycle().unwrap());
        assert_eq!(pipeline.stats().skipped_incomplete, 1);
    }

    #[test]
    fn test_first_frame_uses_long_timeout() {
        let mut camera = SyntheticCamera::default();
        camera.inject_fault(WARM_UP as u64 + 1, SyntheticFault::Timeout);
        camera.inject_fault(WARM_UP as u64 + 3, SyntheticFault::Timeout);
        let mut pipeline = orchestrator(camera);
        pipeline.start_run().unwrap();

        let first = pipeline.run_cycle().unwrap();
        assert!(matches!(
            first,
            CycleOutcome::Skipped(AcquisitionError::Timeout(t)) if t == Duration::from_millis(5000)
        ));
        completed(pipeline.run_cycle().unwrap());
        let later = pipeline.run_cycle().unwrap();
        assert!(matches!(
            later,
            CycleOutcome::Skipped(AcquisitionError::Timeout(t)) if t == Duration::from_millis(1000)
        ));
    }

    #[test]
    fn test_failing_detector_does_not_end_run() {
        let camera = SyntheticCamera::new(scene(SceneObject::at(100, 100, 200, 200, 1.25)));
        let detector = FlakyDetector {
            inner: FixedDetector::new(vec![target_box()]),
            calls: 0,
            fail_on: vec![1],
            panic_on: vec![3],
        };
        let mut pipeline =
            PipelineOrchestrator::new(camera, detector, RecordingSink::default(), device());
        pipeline.start_run().unwrap();

        let reports: Vec<CycleReport> = (0..4)
            .map(|_| completed(pipeline.run_cycle().unwrap()))
            .collect();

        assert!(reports[0].detector_failed);
        assert_eq!(reports[0].detections, 0);
        assert!(!reports[1].detector_failed);
        assert_eq!(reports[1].detections, 1);
        assert!(reports[2].detector_failed);
        assert_eq!(reports[3].detections, 1);

        assert_eq!(pipeline.state(), RunState::Running);
        assert_eq!(pipeline.stats().detector_failures, 2);
        assert!(pipeline.sink().frames[0].1.is_empty());
    }

    #[test]
    fn test_failed_start_stays_idle() {
        let camera = SyntheticCamera::default().failing_open();
        let closes = camera.close_counter();
        let mut pipeline = orchestrator(camera);

        assert!(matches!(
            pipeline.start_run(),
            Err(DeviceError::OpenFailed(CameraError::DeviceNotFound(_)))
        ));
        assert_eq!(pipeline.state(), RunState::Idle);
        assert!(matches!(pipeline.run_cycle(), Err(PipelineError::NotRunning)));
        assert!(matches!(pipeline.run(), Err(PipelineError::Device(_))));

        pipeline.stop_run();
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_request_ends_run_and_releases_device() {
        let camera = SyntheticCamera::default();
        let closes = camera.close_counter();
        let mut pipeline = orchestrator(camera);
        let control = pipeline.control();
        pipeline.start_run().unwrap();

        completed(pipeline.run_cycle().unwrap());
        control.request_stop();
        completed(pipeline.run_cycle().unwrap());

        assert_eq!(pipeline.state(), RunState::Idle);
        assert!(!pipeline.source().camera().is_open());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(matches!(pipeline.run_cycle(), Err(PipelineError::NotRunning)));
        assert_eq!(pipeline.stats().completed, 2);

        pipeline.start_run().unwrap();
        assert!(!control.is_stop_requested());
        completed(pipeline.run_cycle().unwrap());
        pipeline.stop_run();
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stop_during_skipped_cycle_releases_device() {
        let mut camera = SyntheticCamera::default();
        camera.inject_fault(WARM_UP as u64 + 1, SyntheticFault::Timeout);
        let closes = camera.close_counter();
        let mut pipeline = orchestrator(camera);
        pipeline.start_run().unwrap();

        pipeline.control().request_stop();
        assert!(matches!(
            pipeline.run_cycle().unwrap(),
            CycleOutcome::Skipped(AcquisitionError::Timeout(_))
        ));
        assert_eq!(pipeline.state(), RunState::Idle);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_while_running_is_rejected() {
        let mut pipeline = orchestrator(SyntheticCamera::default());
        pipeline.start_run().unwrap();

        assert!(matches!(
            pipeline.start_run(),
            Err(DeviceError::AlreadyStarted)
        ));
        assert_eq!(pipeline.state(), RunState::Running);
        completed(pipeline.run_cycle().unwrap());
    }

    #[test]
    fn test_truncated_depth_skips_cycle() {
        let mut camera = SyntheticCamera::new(scene(SceneObject::at(100, 100, 200, 200, 1.25)));
        camera.inject_fault(WARM_UP as u64 + 2, SyntheticFault::TruncatedDepth);
        let closes = camera.close_counter();
        let mut pipeline = orchestrator(camera);
        pipeline.start_run().unwrap();

        completed(pipeline.run_cycle().unwrap());
        assert!(matches!(
            pipeline.run_cycle().unwrap(),
            CycleOutcome::Skipped(AcquisitionError::Malformed { .. })
        ));
        assert_eq!(pipeline.state(), RunState::Running);
        assert_eq!(completed(pipeline.run_cycle().unwrap()).with_depth, 1);

        assert_eq!(pipeline.stats().skipped_malformed, 1);
        assert_eq!(pipeline.stats().completed, 2);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disconnect_is_fatal() {
        let mut camera = SyntheticCamera::default();
        camera.inject_fault(WARM_UP as u64 + 2, SyntheticFault::Disconnect);
        let closes = camera.close_counter();
        let mut pipeline = orchestrator(camera);

        let result = pipeline.run();
        assert!(matches!(
            result,
            Err(PipelineError::Acquisition(AcquisitionError::Device(
                CameraError::Disconnected
            )))
        ));
        assert_eq!(pipeline.state(), RunState::Idle);
        assert_eq!(pipeline.stats().completed, 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_honors_cycle_limit_and_restarts() {
        let camera = SyntheticCamera::default();
        let closes = camera.close_counter();
        let mut pipeline = orchestrator(camera).with_max_cycles(3);

        assert_eq!(pipeline.run().unwrap().cycles, 3);
        assert_eq!(pipeline.state(), RunState::Idle);
        assert_eq!(pipeline.run().unwrap().cycles, 6);
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_snapshot_taken_once() {
        let mut pipeline = orchestrator(SyntheticCamera::default());
        let control = pipeline.control();
        pipeline.start_run().unwrap();

        completed(pipeline.run_cycle().unwrap());
        control.request_snapshot();
        let report = completed(pipeline.run_cycle().unwrap());
        assert!(report.snapshot_taken);
        completed(pipeline.run_cycle().unwrap());

        assert_eq!(pipeline.sink().snapshots, vec![report.sequence]);
    }

    #[test]
    fn test_periodic_snapshot_lands_on_nth_completed_cycle() {
        let mut camera = SyntheticCamera::default();
        camera.inject_fault(WARM_UP as u64 + 2, SyntheticFault::Timeout);
        let mut pipeline = orchestrator(camera)
            .with_snapshot_every(3)
            .with_max_cycles(7);

        let mut completed_sequences = Vec::new();
        let stats = pipeline
            .run_with(|outcome, _| {
                if let CycleOutcome::Completed(report) = outcome {
                    completed_sequences.push((report.sequence, report.snapshot_taken));
                }
            })
            .unwrap();

        assert_eq!(stats.completed, 6);
        let snapshots: Vec<u64> = completed_sequences
            .iter()
            .filter(|(_, taken)| *taken)
            .map(|(sequence, _)| *sequence)
            .collect();
        assert_eq!(snapshots, vec![completed_sequences[2].0, completed_sequences[5].0]);
        assert_eq!(pipeline.sink().snapshots, snapshots);
    }

    #[test]
    fn test_run_with_reports_every_cycle() {
        let mut camera = SyntheticCamera::default();
        camera.inject_fault(WARM_UP as u64 + 3, SyntheticFault::MissingColor);
        let mut pipeline = orchestrator(camera).with_max_cycles(5);

        let mut seen = Vec::new();
        pipeline
            .run_with(|outcome, stats| {
                seen.push((matches!(outcome, CycleOutcome::Completed(_)), stats.cycles));
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![(true, 1), (true, 2), (false, 3), (true, 4), (true, 5)]
        );
        assert_eq!(pipeline.state(), RunState::Idle);
    }

    #[test]
    fn test_threshold_forwarded_to_detector() {
        let camera = SyntheticCamera::new(scene(SceneObject::at(100, 100, 200, 200, 1.25)));
        let mut pipeline = orchestrator(camera).with_confidence_threshold(0.95);
        pipeline.start_run().unwrap();
        assert_eq!(completed(pipeline.run_cycle().unwrap()).detections, 0);

        pipeline.set_confidence_threshold(0.5);
        assert_eq!(completed(pipeline.run_cycle().unwrap()).detections, 1);
    }

    #[test]
    fn test_patch_median_policy_in_pipeline() {
        let camera = SyntheticCamera::new(scene(SceneObject::at(100, 100, 200, 200, 2.0)));
        let mut pipeline = orchestrator(camera)
            .with_fuser(DepthFuser::new(SamplingPolicy::PatchMedian { radius: 2 }));
        pipeline.start_run().unwrap();
        completed(pipeline.run_cycle().unwrap());

        let distance = pipeline.sink().frames[0].1[0].distance_m.unwrap();
        assert!((distance - 2.0).abs() < 0.005);
    }
}
