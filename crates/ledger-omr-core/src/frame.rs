//! Camera frame normalisation: luminance plane extraction and rotation to
//! upright before any geometry runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{GrayImage, GrayImageView};

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameError {
    #[error("unreadable frame: {width}x{height} with {len} bytes")]
    Unreadable {
        width: usize,
        height: usize,
        len: usize,
    },
}

/// Clockwise quarter turn needed to make a frame upright.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalise any angle in degrees. Angles that are not a multiple of 90
    /// snap to the nearest quarter turn.
    pub fn from_degrees(degrees: i32) -> Self {
        let d = degrees.rem_euclid(360);
        if d % 90 != 0 {
            log::warn!("rotation of {degrees} degrees is not a quarter turn, snapping");
        }
        match ((d + 45) / 90) % 4 {
            0 => Rotation::Deg0,
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// True when the rotation exchanges width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// Luminance (Y) plane of a camera frame as delivered by the platform.
#[derive(Clone, Copy, Debug)]
pub struct PlaneFrame<'a> {
    pub data: &'a [u8],
    pub width: usize,
    pub height: usize,
    /// Bytes between consecutive rows; values below `width` are treated as `width`.
    pub row_stride: usize,
    pub rotation: Rotation,
}

impl<'a> PlaneFrame<'a> {
    /// Tightly packed plane.
    pub fn packed(data: &'a [u8], width: usize, height: usize) -> Self {
        Self {
            data,
            width,
            height,
            row_stride: width,
            rotation: Rotation::Deg0,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Copy the luminance plane into a packed buffer and rotate it upright.
///
/// A buffer shorter than `row_stride * height` is copied as far as it goes;
/// missing pixels repeat the last readable row (white when none exists).
/// Zero sizes, a buffer without one complete row, and sizes whose byte
/// count overflows `usize` are [`FrameError::Unreadable`].
pub fn upright_from_plane(frame: &PlaneFrame<'_>) -> Result<GrayImage, FrameError> {
    let (w, h) = (frame.width, frame.height);
    let unreadable = || FrameError::Unreadable {
        width: w,
        height: h,
        len: frame.data.len(),
    };
    if w == 0 || h == 0 || frame.data.len() < w {
        return Err(unreadable());
    }
    let stride = frame.row_stride.max(w);
    let packed_len = w.checked_mul(h).ok_or_else(unreadable)?;
    // offset of the last row start; every `y * stride` below stays under it
    stride.checked_mul(h - 1).ok_or_else(unreadable)?;

    let mut data = vec![255u8; packed_len];
    let mut short = false;
    for y in 0..h {
        let start = y * stride;
        let avail = frame.data.len().saturating_sub(start).min(w);
        let (done, rest) = data.split_at_mut(y * w);
        let row = &mut rest[..w];
        if avail > 0 {
            row[..avail].copy_from_slice(&frame.data[start..start + avail]);
        }
        if avail < w {
            short = true;
            if y > 0 {
                let prev = &done[(y - 1) * w..y * w];
                row[avail..].copy_from_slice(&prev[avail..]);
            }
        }
    }
    if short {
        log::warn!(
            "luminance plane shorter than {}x{} (stride {}): {} bytes, padded",
            w,
            h,
            stride,
            frame.data.len()
        );
    }

    let packed = GrayImage {
        width: w,
        height: h,
        data,
    };
    if frame.rotation == Rotation::Deg0 {
        return Ok(packed);
    }
    Ok(rotate(&packed.view(), frame.rotation))
}

/// Rotate clockwise by a quarter-turn multiple.
pub fn rotate(src: &GrayImageView<'_>, rotation: Rotation) -> GrayImage {
    let (w, h) = (src.width, src.height);
    let (ow, oh) = if rotation.swaps_axes() { (h, w) } else { (w, h) };
    let mut data = Vec::with_capacity(ow * oh);
    for y in 0..oh {
        for x in 0..ow {
            let (sx, sy) = match rotation {
                Rotation::Deg0 => (x, y),
                Rotation::Deg90 => (y, h - 1 - x),
                Rotation::Deg180 => (w - 1 - x, h - 1 - y),
                Rotation::Deg270 => (w - 1 - y, x),
            };
            data.push(src.get(sx, sy));
        }
    }
    GrayImage {
        width: ow,
        height: oh,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GrayImage {
        // 3x2:
        // 1 2 3
        // 4 5 6
        GrayImage::from_raw(3, 2, vec![1, 2, 3, 4, 5, 6]).expect("image")
    }

    #[test]
    fn degrees_normalise() {
        assert_eq!(Rotation::from_degrees(-90), Rotation::Deg270);
        assert_eq!(Rotation::from_degrees(450), Rotation::Deg90);
        assert_eq!(Rotation::from_degrees(180), Rotation::Deg180);
        assert_eq!(Rotation::from_degrees(100), Rotation::Deg90);
        assert_eq!(Rotation::from_degrees(359), Rotation::Deg0);
    }

    #[test]
    fn quarter_turns() {
        let img = sample();
        let cw = rotate(&img.view(), Rotation::Deg90);
        assert_eq!((cw.width, cw.height), (2, 3));
        assert_eq!(cw.data, vec![4, 1, 5, 2, 6, 3]);

        let half = rotate(&img.view(), Rotation::Deg180);
        assert_eq!(half.data, vec![6, 5, 4, 3, 2, 1]);

        let ccw = rotate(&img.view(), Rotation::Deg270);
        assert_eq!(ccw.data, vec![3, 6, 2, 5, 1, 4]);

        let back = rotate(&cw.view(), Rotation::Deg270);
        assert_eq!(back, img);
    }

    #[test]
    fn strided_plane_drops_padding() {
        let data = [1u8, 2, 3, 0, 4, 5, 6, 0];
        let frame = PlaneFrame {
            data: &data,
            width: 3,
            height: 2,
            row_stride: 4,
            rotation: Rotation::Deg0,
        };
        let img = upright_from_plane(&frame).expect("frame");
        assert_eq!(img, sample());
    }

    #[test]
    fn rotation_is_applied_before_returning() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let frame = PlaneFrame::packed(&data, 3, 2).with_rotation(Rotation::Deg90);
        let img = upright_from_plane(&frame).expect("frame");
        assert_eq!((img.width, img.height), (2, 3));
        assert_eq!(img.data[0], 4);
    }

    #[test]
    fn empty_or_zero_sized_frames_are_unreadable() {
        assert!(upright_from_plane(&PlaneFrame::packed(&[], 4, 4)).is_err());
        assert!(upright_from_plane(&PlaneFrame::packed(&[1, 2], 0, 4)).is_err());
    }

    #[test]
    fn oversized_planes_are_unreadable_not_a_panic() {
        let data = [1u8; 16];
        let huge = PlaneFrame {
            data: &data,
            width: usize::MAX / 2,
            height: 4,
            row_stride: usize::MAX / 2,
            rotation: Rotation::Deg0,
        };
        assert!(matches!(
            upright_from_plane(&huge),
            Err(FrameError::Unreadable { len: 16, .. })
        ));

        let wide_stride = PlaneFrame {
            data: &data,
            width: 4,
            height: 4,
            row_stride: usize::MAX / 2,
            rotation: Rotation::Deg0,
        };
        assert!(upright_from_plane(&wide_stride).is_err());

        // less than one full row
        assert!(upright_from_plane(&PlaneFrame::packed(&data, 20, 2)).is_err());
    }

    #[test]
    fn short_buffer_is_padded_from_last_row() {
        let data = [1u8, 2, 3, 4];
        let img = upright_from_plane(&PlaneFrame::packed(&data, 3, 2)).expect("frame");
        assert_eq!(img.data, vec![1, 2, 3, 4, 2, 3]);
    }
}
