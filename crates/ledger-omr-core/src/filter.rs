//! Denoising and contrast filters applied before anchor detection.

use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{GrayImage, GrayImageView};

/// Normalised 5-tap Gaussian `[1, 4, 6, 4, 1] / 16`.
const GAUSSIAN_5TAP: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// Separable 5-tap Gaussian blur with clamped borders.
pub fn gaussian_blur_5tap(src: &GrayImageView<'_>) -> GrayImage {
    let (w, h) = (src.width, src.height);
    let mut tmp = vec![0f32; w * h];
    for y in 0..h {
        let row = src.row(y);
        for x in 0..w {
            let mut acc = 0f32;
            for (k, &t) in GAUSSIAN_5TAP.iter().enumerate() {
                let sx = clamp_index(x as isize + k as isize - 2, w);
                acc += t * row[sx] as f32;
            }
            tmp[y * w + x] = acc;
        }
    }

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f32;
            for (k, &t) in GAUSSIAN_5TAP.iter().enumerate() {
                let sy = clamp_index(y as isize + k as isize - 2, h);
                acc += t * tmp[sy * w + x];
            }
            out[y * w + x] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
    GrayImage {
        width: w,
        height: h,
        data: out,
    }
}

/// 3x3 median filter with clamped borders.
pub fn median_3x3(src: &GrayImageView<'_>) -> GrayImage {
    let (w, h) = (src.width, src.height);
    let mut out = vec![0u8; w * h];
    let mut window = [0u8; 9];
    for y in 0..h {
        for x in 0..w {
            let mut n = 0;
            for dy in -1..=1isize {
                let sy = clamp_index(y as isize + dy, h);
                for dx in -1..=1isize {
                    let sx = clamp_index(x as isize + dx, w);
                    window[n] = src.get(sx, sy);
                    n += 1;
                }
            }
            window.sort_unstable();
            out[y * w + x] = window[4];
        }
    }
    GrayImage {
        width: w,
        height: h,
        data: out,
    }
}

/// Contrast-limited adaptive histogram equalization settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaheParams {
    pub tiles_x: usize,
    pub tiles_y: usize,
    /// Histogram bins are clipped at `clip_limit * mean bin height`.
    pub clip_limit: f32,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            tiles_x: 8,
            tiles_y: 8,
            clip_limit: 2.0,
        }
    }
}

fn tile_lut(src: &GrayImageView<'_>, x0: usize, y0: usize, x1: usize, y1: usize, clip: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for &v in &src.row(y)[x0..x1] {
            hist[v as usize] += 1;
        }
    }
    let npix = ((x1 - x0) * (y1 - y0)).max(1) as u32;

    let limit = ((clip * npix as f32 / 256.0).ceil() as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let bonus = excess / 256;
    let mut leftover = (excess % 256) as usize;
    for bin in hist.iter_mut() {
        *bin += bonus;
        if leftover > 0 {
            *bin += 1;
            leftover -= 1;
        }
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u32;
    for (v, &bin) in hist.iter().enumerate() {
        cdf += bin;
        lut[v] = ((cdf as f32 * 255.0 / npix as f32).round()).min(255.0) as u8;
    }
    lut
}

/// Contrast-limited adaptive histogram equalization.
///
/// Each tile gets a clipped-histogram lookup table; pixels blend the tables of
/// the four nearest tile centres bilinearly.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(src)))]
pub fn equalize_adaptive(src: &GrayImageView<'_>, params: &ClaheParams) -> GrayImage {
    let (w, h) = (src.width, src.height);
    let tx = params.tiles_x.clamp(1, w.max(1));
    let ty = params.tiles_y.clamp(1, h.max(1));
    let tw = w.div_ceil(tx);
    let th = h.div_ceil(ty);
    let clip = params.clip_limit.max(1.0);

    let mut luts = Vec::with_capacity(tx * ty);
    for j in 0..ty {
        for i in 0..tx {
            let x0 = (i * tw).min(w);
            let y0 = (j * th).min(h);
            let x1 = ((i + 1) * tw).min(w);
            let y1 = ((j + 1) * th).min(h);
            if x1 <= x0 || y1 <= y0 {
                // empty trailing tile: identity
                let mut id = [0u8; 256];
                for (v, e) in id.iter_mut().enumerate() {
                    *e = v as u8;
                }
                luts.push(id);
            } else {
                luts.push(tile_lut(src, x0, y0, x1, y1, clip));
            }
        }
    }

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        let fy = ((y as f32 + 0.5) / th as f32 - 0.5).clamp(0.0, (ty - 1) as f32);
        let j0 = fy.floor() as usize;
        let j1 = (j0 + 1).min(ty - 1);
        let wy = fy - j0 as f32;
        for x in 0..w {
            let fx = ((x as f32 + 0.5) / tw as f32 - 0.5).clamp(0.0, (tx - 1) as f32);
            let i0 = fx.floor() as usize;
            let i1 = (i0 + 1).min(tx - 1);
            let wx = fx - i0 as f32;

            let v = src.get(x, y) as usize;
            let a = luts[j0 * tx + i0][v] as f32;
            let b = luts[j0 * tx + i1][v] as f32;
            let c = luts[j1 * tx + i0][v] as f32;
            let d = luts[j1 * tx + i1][v] as f32;
            let top = a + wx * (b - a);
            let bot = c + wx * (d - c);
            out[y * w + x] = (top + wy * (bot - top)).round().clamp(0.0, 255.0) as u8;
        }
    }
    GrayImage {
        width: w,
        height: h,
        data: out,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denoise {
    None,
    #[default]
    Gaussian,
    Median,
}

/// Frame conditioning applied before thresholding.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessParams {
    pub denoise: Denoise,
    /// CLAHE for unevenly lit sheets; off by default.
    pub equalize: Option<ClaheParams>,
}

/// Denoise, then optionally equalize.
pub fn preprocess(src: &GrayImageView<'_>, params: &PreprocessParams) -> GrayImage {
    let denoised = match params.denoise {
        Denoise::None => src.to_owned_image(),
        Denoise::Gaussian => gaussian_blur_5tap(src),
        Denoise::Median => median_3x3(src),
    };
    match &params.equalize {
        Some(clahe) => equalize_adaptive(&denoised.view(), clahe),
        None => denoised,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_keeps_flat_images_flat() {
        let img = GrayImage::filled(9, 7, 137);
        let out = gaussian_blur_5tap(&img.view());
        assert!(out.data.iter().all(|&v| v == 137));
    }

    #[test]
    fn blur_spreads_an_impulse() {
        let mut img = GrayImage::filled(9, 9, 0);
        img.put(4, 4, 255);
        let out = gaussian_blur_5tap(&img.view());
        // 255 * 0.375^2
        assert_eq!(out.view().get(4, 4), 36);
        assert!(out.view().get(5, 4) > 0);
        assert_eq!(out.view().get(0, 0), 0);
    }

    #[test]
    fn median_removes_salt_noise() {
        let mut img = GrayImage::filled(5, 5, 200);
        img.put(2, 2, 0);
        img.put(0, 0, 0);
        let out = median_3x3(&img.view());
        assert!(out.data.iter().all(|&v| v == 200));
    }

    #[test]
    fn clahe_stretches_low_contrast() {
        let mut data = Vec::new();
        for _y in 0..32 {
            for x in 0..32 {
                data.push(100 + (x / 4) as u8);
            }
        }
        let img = GrayImage::from_raw(32, 32, data).expect("image");
        let params = ClaheParams {
            tiles_x: 2,
            tiles_y: 2,
            clip_limit: 2.0,
        };
        let out = equalize_adaptive(&img.view(), &params);
        let lo = *out.data.iter().min().expect("pixels");
        let hi = *out.data.iter().max().expect("pixels");
        assert!(hi - lo > 7, "range {lo}..{hi}");
    }

    #[test]
    fn preprocess_defaults_to_gaussian() {
        let params = PreprocessParams::default();
        assert_eq!(params.denoise, Denoise::Gaussian);
        assert!(params.equalize.is_none());
        let img = GrayImage::filled(6, 6, 90);
        assert_eq!(preprocess(&img.view(), &params), img);
        let none = PreprocessParams {
            denoise: Denoise::None,
            equalize: None,
        };
        assert_eq!(preprocess(&img.view(), &none), img);
    }
}
