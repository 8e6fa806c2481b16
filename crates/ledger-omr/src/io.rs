//! JSON configuration and report helpers for scanning sheets from disk.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::core::{Template, TemplateError};
use crate::error::ScanError;
use crate::grade::{AnswerKey, Evaluator, GradeError, GradeScale, MarkingScheme};
use crate::scan::{OmrScanner, ScanParams, SheetReport};

#[derive(thiserror::Error, Debug)]
pub enum OmrIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// One scan job: which template, which image, and how to grade it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub template_path: String,
    pub image_path: String,
    #[serde(default)]
    pub answer_key: Option<AnswerKey>,
    #[serde(default)]
    pub marking_scheme: Option<MarkingScheme>,
    #[serde(default)]
    pub passing_percentage: Option<f64>,
    #[serde(default)]
    pub grade_scale: Option<GradeScale>,
    #[serde(default)]
    pub params: ScanParams,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl ScanConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, OmrIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), OmrIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("omr_scan_report.json"))
    }

    pub fn load_template(&self) -> Result<Template, OmrIoError> {
        Ok(Template::load_json(&self.template_path)?)
    }

    pub fn build_scanner(&self) -> Result<OmrScanner, OmrIoError> {
        Ok(OmrScanner::new(self.load_template()?, self.params.clone()))
    }

    /// Evaluator for a sheet of `total_questions` with this job's scheme,
    /// grade scale and passing percentage (defaults where unset).
    pub fn evaluator(&self, total_questions: usize) -> Result<Evaluator, GradeError> {
        let mut evaluator =
            Evaluator::new(total_questions, self.marking_scheme.unwrap_or_default())?;
        if let Some(scale) = &self.grade_scale {
            evaluator = evaluator.with_grades(scale.clone());
        }
        if let Some(p) = self.passing_percentage {
            evaluator = evaluator.with_passing_percentage(p);
        }
        Ok(evaluator)
    }
}

/// JSON report for one scanned image. Exactly one of `sheet` and `error`
/// is set once the scan has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub image_path: String,
    pub template_path: String,
    pub image_width: usize,
    pub image_height: usize,
    #[serde(default)]
    pub sheet: Option<SheetReport>,
    #[serde(default)]
    pub error: Option<String>,
    /// Operator hint matching `error`.
    #[serde(default)]
    pub guidance: Option<String>,
}

impl ScanReport {
    pub fn new(cfg: &ScanConfig, image_width: usize, image_height: usize) -> Self {
        Self {
            image_path: cfg.image_path.clone(),
            template_path: cfg.template_path.clone(),
            image_width,
            image_height,
            sheet: None,
            error: None,
            guidance: None,
        }
    }

    pub fn set_sheet(&mut self, sheet: SheetReport) {
        self.sheet = Some(sheet);
        self.error = None;
        self.guidance = None;
    }

    pub fn set_error(&mut self, err: &ScanError) {
        self.sheet = None;
        self.error = Some(err.to_string());
        self.guidance = Some(err.guidance().to_string());
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, OmrIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), OmrIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
