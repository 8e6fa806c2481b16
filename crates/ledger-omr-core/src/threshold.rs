//! Intensity statistics and binarization.

use crate::GrayImageView;

/// Binary image, `true` = foreground (dark ink).
#[derive(Clone, Debug)]
pub struct BinaryMask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>,
}

impl BinaryMask {
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return false;
        }
        self.data[y as usize * self.width + x as usize]
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}

/// Mark every pixel strictly darker than `threshold`.
pub fn binarize_below(img: &GrayImageView<'_>, threshold: u8) -> BinaryMask {
    BinaryMask {
        width: img.width,
        height: img.height,
        data: img.data.iter().map(|&v| v < threshold).collect(),
    }
}

pub fn histogram(samples: impl IntoIterator<Item = u8>) -> ([u32; 256], usize) {
    let mut hist = [0u32; 256];
    let mut n = 0usize;
    for v in samples {
        hist[v as usize] += 1;
        n += 1;
    }
    (hist, n)
}

/// Value at fraction `q` (0..=1) of the sorted samples. `None` for no samples.
pub fn percentile_from_histogram(hist: &[u32; 256], total: usize, q: f32) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let rank = ((q.clamp(0.0, 1.0) * (total - 1) as f32).round() as usize).min(total - 1);
    let mut seen = 0usize;
    for (v, &h) in hist.iter().enumerate() {
        seen += h as usize;
        if seen > rank {
            return Some(v as u8);
        }
    }
    Some(255)
}

pub fn percentile_intensity(img: &GrayImageView<'_>, q: f32) -> Option<u8> {
    let (hist, n) = histogram(img.data.iter().copied());
    percentile_from_histogram(&hist, n, q)
}

pub fn median_intensity(img: &GrayImageView<'_>) -> Option<u8> {
    percentile_intensity(img, 0.5)
}

/// Otsu threshold from a set of sample intensities.
pub fn otsu_threshold(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let (min_v, max_v) = samples
        .iter()
        .fold((255u8, 0u8), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min_v == max_v {
        return min_v;
    }

    let (hist, _) = histogram(samples.iter().copied());
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((min_v as u16 + max_v as u16) / 2) as u8;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }

    best_t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GrayImage;

    #[test]
    fn binarize_marks_dark_pixels() {
        let img = GrayImage::from_raw(4, 1, vec![0, 99, 100, 255]).expect("image");
        let m = binarize_below(&img.view(), 100);
        assert_eq!(m.data, vec![true, true, false, false]);
        assert_eq!(m.count(), 2);
        assert!(!m.get(-1, 0));
    }

    #[test]
    fn median_of_mostly_white_sheet_is_white() {
        let mut data = vec![230u8; 90];
        data.extend(std::iter::repeat(20u8).take(10));
        let img = GrayImage::from_raw(10, 10, data).expect("image");
        assert_eq!(median_intensity(&img.view()), Some(230));
        assert_eq!(percentile_intensity(&img.view(), 0.0), Some(20));
    }

    #[test]
    fn otsu_splits_bimodal_samples() {
        let mut samples = vec![30u8; 50];
        samples.extend(vec![31u8; 10]);
        samples.extend(vec![200u8; 50]);
        samples.extend(vec![205u8; 10]);
        let t = otsu_threshold(&samples);
        assert!(t >= 31 && t < 200, "threshold {t}");
    }
}
