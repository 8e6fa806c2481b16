//! Regular sheet layouts: questions in columns, options in rows, square
//! anchors inset from the corners and an optional enrollment block.

use serde::{Deserialize, Serialize};

use crate::template::{
    AnchorLayout, EnrollmentColumn, EnrollmentGrid, OptionBox, Question, Template, TemplateError,
};

/// Description of a regular answer sheet, in sheet pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridLayout {
    pub name: Option<String>,
    pub sheet_width: f32,
    pub sheet_height: f32,
    /// Distance from each sheet edge to the anchor centre.
    pub anchor_inset: f32,
    /// Side of the printed square anchors.
    pub anchor_size: f32,
    pub questions: usize,
    pub options: usize,
    pub rows_per_column: usize,
    pub first_option_x: f32,
    pub question_top: f32,
    pub column_pitch: f32,
    pub row_pitch: f32,
    pub option_pitch: f32,
    pub bubble_radius: f32,
    /// Number of enrollment digit columns; 0 disables the block.
    pub enrollment_digits: usize,
    pub enrollment_left: f32,
    pub enrollment_top: f32,
    pub enrollment_pitch: f32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            name: None,
            sheet_width: 600.0,
            sheet_height: 800.0,
            anchor_inset: 30.0,
            anchor_size: 31.0,
            questions: 20,
            options: 4,
            rows_per_column: 12,
            first_option_x: 100.0,
            question_top: 150.0,
            column_pitch: 160.0,
            row_pitch: 30.0,
            option_pitch: 28.0,
            bubble_radius: 9.0,
            enrollment_digits: 0,
            enrollment_left: 200.0,
            enrollment_top: 70.0,
            enrollment_pitch: 20.0,
        }
    }
}

impl GridLayout {
    pub fn new(questions: usize, options: usize) -> Self {
        Self {
            questions,
            options,
            ..Self::default()
        }
    }

    pub fn with_enrollment(mut self, digits: usize) -> Self {
        self.enrollment_digits = digits;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn anchor_layout(&self) -> AnchorLayout {
        let (w, h, d) = (self.sheet_width, self.sheet_height, self.anchor_inset);
        AnchorLayout {
            top_left: [d, d],
            top_right: [w - d, d],
            bottom_right: [w - d, h - d],
            bottom_left: [d, h - d],
        }
    }

    /// Top of the first question row; pushed below the enrollment block
    /// when one is present.
    fn effective_question_top(&self) -> f32 {
        if self.enrollment_digits == 0 {
            return self.question_top;
        }
        let block_bottom = self.enrollment_top + 9.0 * self.enrollment_pitch + self.bubble_radius;
        self.question_top.max(block_bottom + 1.5 * self.row_pitch)
    }

    fn questions(&self) -> Vec<Question> {
        let rows = self.rows_per_column.max(1);
        let top = self.effective_question_top();
        (0..self.questions)
            .map(|index| {
                let col = index / rows;
                let row = index % rows;
                let x0 = self.first_option_x + col as f32 * self.column_pitch;
                let y = top + row as f32 * self.row_pitch;
                Question {
                    number: index as u32 + 1,
                    options: (0..self.options)
                        .map(|k| OptionBox {
                            x: x0 + k as f32 * self.option_pitch,
                            y,
                            radius: self.bubble_radius,
                        })
                        .collect(),
                }
            })
            .collect()
    }

    fn enrollment(&self) -> Option<EnrollmentGrid> {
        if self.enrollment_digits == 0 {
            return None;
        }
        let columns = (0..self.enrollment_digits)
            .map(|c| EnrollmentColumn {
                digits: (0..10)
                    .map(|d| OptionBox {
                        x: self.enrollment_left + c as f32 * self.enrollment_pitch,
                        y: self.enrollment_top + d as f32 * self.enrollment_pitch,
                        radius: self.bubble_radius * 0.8,
                    })
                    .collect(),
            })
            .collect();
        Some(EnrollmentGrid { columns })
    }

    /// Build and validate the template.
    pub fn build(&self) -> Result<Template, TemplateError> {
        let template = Template {
            name: self.name.clone(),
            sheet_width: self.sheet_width,
            sheet_height: self.sheet_height,
            anchors: self.anchor_layout(),
            options_per_question: self.options,
            questions: self.questions(),
            enrollment_grid: self.enrollment(),
        };
        template.validate()?;
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_valid() {
        let t = GridLayout::default().build().expect("template");
        assert_eq!(t.total_questions(), 20);
        assert_eq!(t.options_per_question, 4);
        assert_eq!(t.anchors.top_right, [570.0, 30.0]);
        // second column starts after rows_per_column questions
        assert_eq!(t.questions[12].options[0].x, 260.0);
        assert_eq!(t.questions[12].options[0].y, 150.0);
    }

    #[test]
    fn enrollment_pushes_questions_down() {
        let plain = GridLayout::new(5, 5).build().expect("plain");
        let t = GridLayout::new(5, 5).with_enrollment(6).build().expect("enrolled");
        let grid = t.enrollment_grid.as_ref().expect("grid");
        assert_eq!(grid.columns.len(), 6);
        assert!(grid.columns.iter().all(|c| c.digits.len() == 10));
        let last_digit = grid.columns[0].digits[9];
        assert!(t.questions[0].options[0].y > last_digit.y + last_digit.radius);
        assert!(t.questions[0].options[0].y > plain.questions[0].options[0].y);
    }

    #[test]
    fn overflowing_layout_fails_validation() {
        let layout = GridLayout {
            rows_per_column: 100,
            questions: 40,
            ..GridLayout::default()
        };
        assert!(matches!(
            layout.build(),
            Err(TemplateError::InvalidBubble { .. })
        ));
    }
}
