//! Lightweight grayscale buffers.
//!
//! Coordinates follow the pixel-centre convention: pixel `(i, j)` is centred
//! at the continuous point `(i, j)`.

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl<'a> GrayImageView<'a> {
    /// Build a view, checking that `data` covers `width * height` pixels.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Option<Self> {
        let len = width.checked_mul(height)?;
        if width == 0 || height == 0 || data.len() < len {
            return None;
        }
        Some(Self {
            width,
            height,
            data: &data[..len],
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Pixel value, or `None` outside the image.
    #[inline]
    pub fn get_checked(&self, x: i32, y: i32) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(self.data[y as usize * self.width + x as usize])
    }

    #[inline]
    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    /// Copy the axis-aligned region `[x0, x0 + w) × [y0, y0 + h)`, clipped to the image.
    pub fn crop(&self, x0: usize, y0: usize, w: usize, h: usize) -> GrayImage {
        let x1 = (x0 + w).min(self.width);
        let y1 = (y0 + h).min(self.height);
        let x0 = x0.min(x1);
        let y0 = y0.min(y1);
        let cw = x1 - x0;
        let ch = y1 - y0;
        let mut data = Vec::with_capacity(cw * ch);
        for y in y0..y1 {
            data.extend_from_slice(&self.row(y)[x0..x1]);
        }
        GrayImage {
            width: cw,
            height: ch,
            data,
        }
    }

    pub fn to_owned_image(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// A `width × height` image filled with `value`.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        if width.checked_mul(height)? != data.len() {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn put(&mut self, x: usize, y: usize, v: u8) {
        self.data[y * self.width + x] = v;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[inline]
fn get_gray_or(src: &GrayImageView<'_>, x: i32, y: i32, fill: u8) -> u8 {
    src.get_checked(x, y).unwrap_or(fill)
}

/// Bilinear sample; samples outside the image read as `fill`.
#[inline]
pub fn sample_bilinear_or(src: &GrayImageView<'_>, x: f32, y: f32, fill: u8) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray_or(src, x0, y0, fill) as f32;
    let p10 = get_gray_or(src, x0 + 1, y0, fill) as f32;
    let p01 = get_gray_or(src, x0, y0 + 1, fill) as f32;
    let p11 = get_gray_or(src, x0 + 1, y0 + 1, fill) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    sample_bilinear_or(src, x, y, 0)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32, fill: u8) -> u8 {
    sample_bilinear_or(src, x, y, fill).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_rejects_short_buffers() {
        let data = [0u8; 5];
        assert!(GrayImageView::new(2, 3, &data).is_none());
        assert!(GrayImageView::new(0, 3, &data).is_none());
        assert!(GrayImageView::new(2, 2, &data).is_some());
    }

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let img = GrayImage::from_raw(2, 1, vec![0, 200]).expect("image");
        let v = sample_bilinear(&img.view(), 0.25, 0.0);
        assert!((v - 50.0).abs() < 1e-4);
    }

    #[test]
    fn out_of_bounds_reads_fill() {
        let img = GrayImage::filled(3, 3, 10);
        assert_eq!(sample_bilinear_u8(&img.view(), -5.0, -5.0, 240), 240);
    }

    #[test]
    fn crop_clips_to_image() {
        let img = GrayImage::from_raw(3, 2, vec![1, 2, 3, 4, 5, 6]).expect("image");
        let c = img.view().crop(1, 1, 10, 10);
        assert_eq!((c.width, c.height), (2, 1));
        assert_eq!(c.data, vec![5, 6]);
    }
}
