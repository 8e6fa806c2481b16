//! High-level facade for the `ledger-omr-*` workspace.
//!
//! This crate provides:
//! - re-exports of the stage crates (`core`, `anchor`, `bubble`, `grade`);
//! - [`OmrScanner`], which runs preprocess, anchor detection, geometry
//!   validation, rectification and bubble reading on one still image;
//! - [`ScanSession`], the live-preview controller with auto-capture
//!   debounce and a single-winner capture latch;
//! - (feature `image`) helpers that decode files with their EXIF
//!   orientation applied and scan them.
//!
//! ## Quickstart
//!
//! ```no_run
//! use ledger_omr::core::Template;
//! use ledger_omr::grade::{AnswerKey, MarkingScheme};
//! use ledger_omr::{detect, OmrScanner, ScanParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let template = Template::load_json("template.json")?;
//! let scanner = OmrScanner::new(template, ScanParams::default());
//! let scan = detect::scan_image_file(&scanner, "sheet.jpg")?;
//!
//! let key = AnswerKey::from_pairs([(0, 2), (1, 0), (2, 3)]);
//! let report = scan.evaluate(&key, &MarkingScheme::new(4.0, 1.0, true)?)?;
//! println!("{:?}", report.evaluation.map(|e| e.percentage));
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `ledger_omr::core`: grayscale buffers, frames, filters, homography, templates.
//! - `ledger_omr::anchor`: anchor detection, geometry validation, stability.
//! - `ledger_omr::bubble`: bubble and enrollment reading.
//! - `ledger_omr::grade`: marking schemes, answer keys, evaluation.
//! - `ledger_omr::detect` (feature `image`): end-to-end helpers from `image::GrayImage` and files.

pub use ledger_omr_anchor as anchor;
pub use ledger_omr_bubble as bubble;
pub use ledger_omr_core as core;
pub use ledger_omr_grade as grade;

mod error;
pub mod io;
mod scan;
mod session;
pub mod synthetic;

pub use error::ScanError;
pub use scan::{OmrScanner, ScanParams, SheetReport, SheetScan};
pub use session::{
    AnalysisGate, AnalysisPermit, CaptureLatch, CaptureTicket, FrameReport, ScanSession,
};

pub use ledger_omr_core::{GrayImage, GrayImageView, Template};
pub use ledger_omr_grade::{AnswerKey, EvaluationResult, MarkingScheme};

#[cfg(feature = "image")]
pub mod detect;
