//! Live preview session: per-frame guidance, auto-capture debounce and the
//! frame backpressure policy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::anchor::{
    classify_frame, AlignmentQuality, AnchorDetectionResult, FrameStabilityTracker,
    GeometryVerdict, StabilityState,
};
use crate::core::{FrameError, GrayImageView};
use crate::error::ScanError;
use crate::scan::{check_frame, OmrScanner, SheetScan};

/// Single-winner flag guarding the capture of one sheet.
///
/// Clones share the flag, so a UI thread can release what the analysis
/// thread acquired.
#[derive(Clone, Debug, Default)]
pub struct CaptureLatch {
    busy: Arc<AtomicBool>,
}

impl CaptureLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the latch. Exactly one caller wins until [`CaptureLatch::release`].
    pub fn try_begin(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_capturing(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Keep-only-latest gate for frame analysis: while one frame is being
/// analysed, new frames are dropped rather than queued.
#[derive(Clone, Debug, Default)]
pub struct AnalysisGate {
    in_flight: Arc<AtomicBool>,
}

impl AnalysisGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another analysis holds the gate; drop the frame.
    pub fn try_enter(&self) -> Option<AnalysisPermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| AnalysisPermit {
                in_flight: Arc::clone(&self.in_flight),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Held for the duration of one analysis; reopens the gate on drop.
#[derive(Debug)]
pub struct AnalysisPermit {
    in_flight: Arc<AtomicBool>,
}

impl Drop for AnalysisPermit {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Issued on the one frame that triggers auto-capture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureTicket {
    pub frame_index: u64,
    /// Anchor centres in the preview frame, `[TL, TR, BR, BL]`.
    pub anchors: [Point2<f32>; 4],
}

/// Guidance for one preview frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame_index: u64,
    pub anchors: AnchorDetectionResult,
    pub verdict: Option<GeometryVerdict>,
    pub stability: StabilityState,
    pub quality: AlignmentQuality,
    pub capture: Option<CaptureTicket>,
    /// Set when the frame buffer could not be read; nothing was detected.
    pub frame_error: Option<FrameError>,
}

impl FrameReport {
    pub fn guidance(&self) -> &'static str {
        match &self.frame_error {
            Some(_) => "Camera frame could not be read",
            None => self.quality.guidance(),
        }
    }
}

/// Per-session controller for a live camera preview.
pub struct ScanSession {
    scanner: OmrScanner,
    tracker: FrameStabilityTracker,
    latch: CaptureLatch,
    frames: u64,
}

impl ScanSession {
    pub fn new(scanner: OmrScanner) -> Self {
        let tracker = FrameStabilityTracker::new(scanner.params().required_stable_frames);
        Self {
            scanner,
            tracker,
            latch: CaptureLatch::new(),
            frames: 0,
        }
    }

    pub fn scanner(&self) -> &OmrScanner {
        &self.scanner
    }

    pub fn latch(&self) -> &CaptureLatch {
        &self.latch
    }

    /// Detect, validate and classify one upright preview frame.
    ///
    /// A frame counts towards the stability streak only when all four
    /// anchors are found and the quad is well aligned. While a capture is
    /// in progress no further ticket is issued. An unreadable frame breaks
    /// the streak and is reported through [`FrameReport::frame_error`].
    pub fn process_frame(&mut self, frame: &GrayImageView<'_>) -> FrameReport {
        let frame_index = self.frames;
        self.frames += 1;

        if let Err(err) = check_frame(frame) {
            log::warn!("frame {frame_index}: {err}");
            let stability = self.tracker.update(false);
            return FrameReport {
                frame_index,
                anchors: AnchorDetectionResult::default(),
                verdict: None,
                stability,
                quality: AlignmentQuality::None,
                capture: None,
                frame_error: Some(err),
            };
        }

        let prepared = self.scanner.prepare(frame);
        let anchors = self.scanner.detect_anchors(&prepared.view());
        let points = anchors.points();
        let verdict = points.as_ref().map(|p| self.scanner.validate_geometry(p));

        let stable = verdict.as_ref().is_some_and(GeometryVerdict::is_well_aligned);
        let stability = self.tracker.update(stable);
        let quality = classify_frame(anchors.count(), verdict.as_ref(), &stability);

        let capture = match points {
            Some(corners) if stability.ready_to_capture && self.latch.try_begin() => {
                log::info!("auto-capture on frame {frame_index}");
                Some(CaptureTicket {
                    frame_index,
                    anchors: corners,
                })
            }
            _ => None,
        };

        log::trace!(
            "frame {frame_index}: {} anchors, {:?}, streak {}/{}",
            anchors.count(),
            quality,
            stability.stable_count,
            stability.required
        );

        FrameReport {
            frame_index,
            anchors,
            verdict,
            stability,
            quality,
            capture,
            frame_error: None,
        }
    }

    /// Run the full scan on the still image taken for `ticket`.
    pub fn complete_capture(
        &self,
        ticket: &CaptureTicket,
        still: &GrayImageView<'_>,
    ) -> Result<SheetScan, ScanError> {
        log::debug!(
            "scanning {}x{} still for frame {}",
            still.width,
            still.height,
            ticket.frame_index
        );
        self.scanner.scan_guarded(still)
    }

    /// Start a fresh streak and allow the next capture.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.latch.release();
    }
}
