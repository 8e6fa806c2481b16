//! Debounce for auto-capture: a capture is signalled once, on the frame
//! where a run of consecutive stable frames first reaches the requirement.

use serde::{Deserialize, Serialize};

pub const DEFAULT_REQUIRED_STABLE_FRAMES: usize = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameOutcome {
    Stable,
    Unstable,
}

impl From<bool> for FrameOutcome {
    fn from(stable: bool) -> Self {
        if stable {
            FrameOutcome::Stable
        } else {
            FrameOutcome::Unstable
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityState {
    pub stable_count: usize,
    pub required: usize,
    /// True only on the frame that completes the streak.
    pub ready_to_capture: bool,
}

/// Per-session stable-frame counter.
#[derive(Clone, Debug)]
pub struct FrameStabilityTracker {
    required: usize,
    stable_count: usize,
}

impl Default for FrameStabilityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_STABLE_FRAMES)
    }
}

impl FrameStabilityTracker {
    /// `required` is clamped to at least one frame.
    pub fn new(required: usize) -> Self {
        Self {
            required: required.max(1),
            stable_count: 0,
        }
    }

    pub fn required(&self) -> usize {
        self.required
    }

    pub fn state(&self) -> StabilityState {
        StabilityState {
            stable_count: self.stable_count,
            required: self.required,
            ready_to_capture: false,
        }
    }

    pub fn update(&mut self, outcome: impl Into<FrameOutcome>) -> StabilityState {
        match outcome.into() {
            FrameOutcome::Stable => self.stable_count = self.stable_count.saturating_add(1),
            FrameOutcome::Unstable => self.stable_count = 0,
        }
        let ready = self.stable_count == self.required;
        if ready {
            log::debug!("stable for {} frames, ready to capture", self.required);
        }
        StabilityState {
            stable_count: self.stable_count,
            required: self.required,
            ready_to_capture: ready,
        }
    }

    pub fn reset(&mut self) {
        self.stable_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seven_stable_frames_signal_exactly_once() {
        let mut t = FrameStabilityTracker::default();
        let signals: Vec<bool> = (0..12)
            .map(|_| t.update(FrameOutcome::Stable).ready_to_capture)
            .collect();
        assert_eq!(signals.iter().filter(|&&s| s).count(), 1);
        assert!(signals[6]);
    }

    #[test]
    fn unstable_frame_resets_the_streak() {
        let mut t = FrameStabilityTracker::new(7);
        for _ in 0..6 {
            assert!(!t.update(true).ready_to_capture);
        }
        let s = t.update(false);
        assert_eq!(s.stable_count, 0);
        assert!(!s.ready_to_capture);
        for _ in 0..6 {
            assert!(!t.update(true).ready_to_capture);
        }
        assert!(t.update(true).ready_to_capture);
    }

    #[test]
    fn reset_starts_a_new_streak() {
        let mut t = FrameStabilityTracker::new(2);
        t.update(true);
        assert!(t.update(true).ready_to_capture);
        assert!(!t.update(true).ready_to_capture);
        t.reset();
        assert_eq!(t.state().stable_count, 0);
        t.update(true);
        assert!(t.update(true).ready_to_capture);
        assert_eq!(FrameStabilityTracker::new(0).required(), 1);
    }
}
