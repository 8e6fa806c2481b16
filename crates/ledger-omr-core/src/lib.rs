//! Core types and utilities for OMR answer-sheet scanning.
//!
//! This crate holds everything the detection stages share: grayscale
//! buffers, frame normalisation, filters, thresholding, contour tracing,
//! homographies and the immutable sheet [`Template`]. It does not depend on
//! any concrete image codec.

pub mod contour;
mod filter;
mod frame;
pub mod geometry;
mod homography;
mod image;
mod layout;
mod logger;
mod rectify;
mod template;
pub mod threshold;

pub use filter::{
    equalize_adaptive, gaussian_blur_5tap, median_3x3, preprocess, ClaheParams, Denoise,
    PreprocessParams,
};
pub use frame::{rotate, upright_from_plane, FrameError, PlaneFrame, Rotation};
pub use homography::{
    fit_homography, homography_from_4pt, warp_perspective_gray, Homography,
};
pub use image::{sample_bilinear, sample_bilinear_or, sample_bilinear_u8, GrayImage, GrayImageView};
pub use layout::GridLayout;
pub use rectify::{rectify_sheet, RectifiedSheet, RectifyError, RectifyParams};
pub use template::{
    AnchorCorner, AnchorLayout, EnrollmentColumn, EnrollmentGrid, OptionBox, Question, Template,
    TemplateError,
};

#[cfg(feature = "tracing")]
pub use logger::{init_tracing, LogFormat};

pub use logger::init_with_level;
