//! Immutable answer-sheet template: sheet size, anchor positions, bubble
//! geometry and an optional enrollment grid.
//!
//! Question indices are 0-based positions in [`Template::questions`]; each
//! question's printed `number` is `index + 1`.

use std::{fs, path::Path};

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{is_convex, polygon_area, signed_area};

/// Anchors may not enclose less than this fraction of the sheet.
const MIN_ANCHOR_AREA_FRAC: f32 = 0.01;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid sheet size {width}x{height}")]
    InvalidSheetSize { width: f32, height: f32 },
    #[error("anchor quadrilateral is degenerate or not convex")]
    DegenerateAnchors,
    #[error("anchors must be ordered clockwise TL, TR, BR, BL")]
    AnchorOrder,
    #[error("at least two options per question are required, got {0}")]
    TooFewOptions(usize),
    #[error("question {index} has {found} options, expected {expected}")]
    OptionCountMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("question at index {index} is numbered {number}, expected {}", .index + 1)]
    QuestionNumber { index: usize, number: u32 },
    #[error("bubble {option} of question {index} has a non-positive radius or lies outside the sheet")]
    InvalidBubble { index: usize, option: usize },
    #[error("enrollment column {column} has {found} digit boxes, expected 10")]
    EnrollmentColumn { column: usize, found: usize },
    #[error("enrollment digit {digit} of column {column} has a non-positive radius or lies outside the sheet")]
    InvalidEnrollmentBubble { column: usize, digit: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One of the four registration marks, in clockwise order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorCorner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl AnchorCorner {
    pub const ALL: [AnchorCorner; 4] = [
        AnchorCorner::TopLeft,
        AnchorCorner::TopRight,
        AnchorCorner::BottomRight,
        AnchorCorner::BottomLeft,
    ];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            AnchorCorner::TopLeft => 0,
            AnchorCorner::TopRight => 1,
            AnchorCorner::BottomRight => 2,
            AnchorCorner::BottomLeft => 3,
        }
    }
}

/// Anchor centres in sheet coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorLayout {
    pub top_left: [f32; 2],
    pub top_right: [f32; 2],
    pub bottom_right: [f32; 2],
    pub bottom_left: [f32; 2],
}

impl AnchorLayout {
    /// Anchors at the exact sheet corners.
    pub fn sheet_corners(width: f32, height: f32) -> Self {
        Self {
            top_left: [0.0, 0.0],
            top_right: [width, 0.0],
            bottom_right: [width, height],
            bottom_left: [0.0, height],
        }
    }

    /// Clockwise `[TL, TR, BR, BL]`.
    pub fn points(&self) -> [Point2<f32>; 4] {
        AnchorCorner::ALL.map(|c| {
            let [x, y] = self.get(c);
            Point2::new(x, y)
        })
    }

    pub fn get(&self, corner: AnchorCorner) -> [f32; 2] {
        match corner {
            AnchorCorner::TopLeft => self.top_left,
            AnchorCorner::TopRight => self.top_right,
            AnchorCorner::BottomRight => self.bottom_right,
            AnchorCorner::BottomLeft => self.bottom_left,
        }
    }
}

/// A circular answer bubble.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptionBox {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

impl OptionBox {
    pub fn center(&self) -> Point2<f32> {
        Point2::new(self.x, self.y)
    }

    fn fits(&self, width: f32, height: f32) -> bool {
        self.radius.is_finite()
            && self.radius > 0.0
            && (0.0..=width).contains(&self.x)
            && (0.0..=height).contains(&self.y)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Printed, 1-based question number.
    pub number: u32,
    pub options: Vec<OptionBox>,
}

/// Digits 0..=9, top to bottom.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentColumn {
    pub digits: Vec<OptionBox>,
}

/// Bubble grid encoding a student's enrollment number, one digit per column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentGrid {
    pub columns: Vec<EnrollmentColumn>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub name: Option<String>,
    pub sheet_width: f32,
    pub sheet_height: f32,
    pub anchors: AnchorLayout,
    pub options_per_question: usize,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub enrollment_grid: Option<EnrollmentGrid>,
}

impl Template {
    /// Build and validate a template.
    pub fn new(
        sheet_width: f32,
        sheet_height: f32,
        anchors: AnchorLayout,
        options_per_question: usize,
        questions: Vec<Question>,
    ) -> Result<Self, TemplateError> {
        let t = Self {
            name: None,
            sheet_width,
            sheet_height,
            anchors,
            options_per_question,
            questions,
            enrollment_grid: None,
        };
        t.validate()?;
        Ok(t)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_enrollment(mut self, grid: EnrollmentGrid) -> Result<Self, TemplateError> {
        self.enrollment_grid = Some(grid);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        let (w, h) = (self.sheet_width, self.sheet_height);
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(TemplateError::InvalidSheetSize {
                width: w,
                height: h,
            });
        }

        let quad = self.anchors.points();
        if quad.iter().any(|p| !(p.x.is_finite() && p.y.is_finite()))
            || polygon_area(&quad) < MIN_ANCHOR_AREA_FRAC * w * h
            || !is_convex(&quad)
        {
            return Err(TemplateError::DegenerateAnchors);
        }
        if signed_area(&quad) <= 0.0 {
            return Err(TemplateError::AnchorOrder);
        }

        if self.options_per_question < 2 {
            return Err(TemplateError::TooFewOptions(self.options_per_question));
        }
        for (index, q) in self.questions.iter().enumerate() {
            if q.number as usize != index + 1 {
                return Err(TemplateError::QuestionNumber {
                    index,
                    number: q.number,
                });
            }
            if q.options.len() != self.options_per_question {
                return Err(TemplateError::OptionCountMismatch {
                    index,
                    expected: self.options_per_question,
                    found: q.options.len(),
                });
            }
            if let Some(option) = q.options.iter().position(|o| !o.fits(w, h)) {
                return Err(TemplateError::InvalidBubble { index, option });
            }
        }

        if let Some(grid) = &self.enrollment_grid {
            for (column, col) in grid.columns.iter().enumerate() {
                if col.digits.len() != 10 {
                    return Err(TemplateError::EnrollmentColumn {
                        column,
                        found: col.digits.len(),
                    });
                }
                if let Some(digit) = col.digits.iter().position(|o| !o.fits(w, h)) {
                    return Err(TemplateError::InvalidEnrollmentBubble { column, digit });
                }
            }
        }
        Ok(())
    }

    #[inline]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Output canvas size of the rectified sheet in whole pixels.
    pub fn canvas_size(&self) -> (usize, usize) {
        (
            self.sheet_width.ceil() as usize,
            self.sheet_height.ceil() as usize,
        )
    }

    /// Template anchors mapped into a buffer of `width x height` pixels,
    /// assuming the buffer shows the whole sheet.
    pub fn anchors_scaled_to(&self, width: usize, height: usize) -> [Point2<f32>; 4] {
        let sx = width as f32 / self.sheet_width;
        let sy = height as f32 / self.sheet_height;
        self.anchors
            .points()
            .map(|p| Point2::new(p.x * sx, p.y * sy))
    }

    /// Parse and validate a template from JSON text.
    pub fn from_json_str(raw: &str) -> Result<Self, TemplateError> {
        let t: Template = serde_json::from_str(raw)?;
        t.validate()?;
        Ok(t)
    }

    /// Load and validate a template from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Write this template as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), TemplateError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
