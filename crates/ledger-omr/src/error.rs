use thiserror::Error;

use crate::anchor::GeometryRejection;
use crate::core::{AnchorCorner, FrameError, RectifyError};

/// Errors produced by the end-to-end scanner.
///
/// Detection shortfalls are reported here only when a full scan was
/// requested; the live session reports them as guidance instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScanError {
    #[error(transparent)]
    InvalidFrame(#[from] FrameError),

    #[error("found {found}/4 anchors (missing {missing:?})")]
    AnchorsMissing {
        found: usize,
        missing: Vec<AnchorCorner>,
    },

    #[error("sheet rejected: {0}")]
    SheetCurved(GeometryRejection),

    #[error("alignment failed: {0}")]
    AlignmentFailed(#[from] RectifyError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Operator-facing hint for a failed scan.
    pub fn guidance(&self) -> &'static str {
        match self {
            ScanError::InvalidFrame(_) => "Could not read the image, try again",
            ScanError::AnchorsMissing { .. } => "Make sure all four corner marks are visible",
            ScanError::SheetCurved(_) => "Flatten the sheet on a hard surface",
            ScanError::AlignmentFailed(_) => "Hold the phone parallel to the sheet",
            ScanError::Internal(_) => "Something went wrong, try again",
        }
    }
}
