use serde::{Deserialize, Serialize};

use ledger_omr_core::{EnrollmentGrid, GrayImageView};

use crate::analyzer::BubbleAnalyzer;
use crate::params::BubbleParams;

/// Decoded enrollment number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentReading {
    /// One entry per column; `None` for blank or ambiguous columns.
    pub digits: Vec<Option<u8>>,
    /// All digits concatenated, only when every column decoded.
    pub number: Option<String>,
    /// Columns with more than one marked digit.
    pub ambiguous_columns: Vec<usize>,
}

impl EnrollmentReading {
    pub fn is_complete(&self) -> bool {
        self.number.is_some()
    }
}

/// Read each enrollment column as a single-choice question over digits 0..=9.
pub fn decode_enrollment(
    sheet: &GrayImageView<'_>,
    grid: &EnrollmentGrid,
    params: &BubbleParams,
    baseline: f32,
) -> EnrollmentReading {
    let analyzer = BubbleAnalyzer::new(params.clone());
    let mut digits = Vec::with_capacity(grid.columns.len());
    let mut ambiguous_columns = Vec::new();

    for (column, col) in grid.columns.iter().enumerate() {
        let fills = analyzer.fills(sheet, &col.digits, baseline);
        let marked: Vec<usize> = fills
            .iter()
            .enumerate()
            .filter(|(_, &f)| f >= params.mark_threshold)
            .map(|(d, _)| d)
            .collect();
        match marked.as_slice() {
            [d] => digits.push(Some(*d as u8)),
            [] => digits.push(None),
            _ => {
                ambiguous_columns.push(column);
                digits.push(None);
            }
        }
    }

    let number = if !digits.is_empty() && digits.iter().all(Option::is_some) {
        Some(
            digits
                .iter()
                .flatten()
                .map(|d| char::from(b'0' + d))
                .collect(),
        )
    } else {
        None
    };

    if !ambiguous_columns.is_empty() {
        log::warn!("enrollment columns {ambiguous_columns:?} have several marks");
    }

    EnrollmentReading {
        digits,
        number,
        ambiguous_columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_omr_core::{GrayImage, GridLayout, OptionBox};

    fn fill_disc(img: &mut GrayImage, b: &OptionBox) {
        let r = b.radius.ceil() as i32;
        for dy in -r..=r {
            for dx in -r..=r {
                if (dx * dx + dy * dy) as f32 <= b.radius * b.radius {
                    img.put((b.x as i32 + dx) as usize, (b.y as i32 + dy) as usize, 20);
                }
            }
        }
    }

    #[test]
    fn decodes_complete_and_ambiguous_numbers() {
        let t = GridLayout::new(2, 4).with_enrollment(4).build().expect("template");
        let grid = t.enrollment_grid.clone().expect("grid");
        let mut img = GrayImage::filled(600, 800, 235);
        for (col, digit) in [(0, 4usize), (1, 0), (2, 9), (3, 2)] {
            fill_disc(&mut img, &grid.columns[col].digits[digit]);
        }

        let params = BubbleParams::default();
        let r = decode_enrollment(&img.view(), &grid, &params, 235.0);
        assert_eq!(r.number.as_deref(), Some("4092"));
        assert!(r.is_complete());

        fill_disc(&mut img, &grid.columns[2].digits[3]);
        let r = decode_enrollment(&img.view(), &grid, &params, 235.0);
        assert_eq!(r.ambiguous_columns, vec![2]);
        assert_eq!(r.digits[2], None);
        assert!(r.number.is_none());
    }
}
