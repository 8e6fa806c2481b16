use std::path::Path;

use ::image::{DynamicImage, ImageDecoder, ImageReader};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::core;
use crate::error::ScanError;
use crate::scan::{OmrScanner, SheetScan};

/// Failures of the `image`-backed entry points.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("{width}x{height} frame needs {expected} bytes, buffer holds {got}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },

    #[error("frame size {width}x{height} is empty or too large")]
    FrameSize { width: u32, height: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] ::image::ImageError),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// View an `image::GrayImage` without copying.
pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    let (width, height) = img.dimensions();
    core::GrayImageView {
        data: img.as_raw(),
        width: width as usize,
        height: height as usize,
    }
}

/// Copy a camera plane (one byte per pixel, no row padding) into an
/// `image::GrayImage`.
pub fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::GrayImage, DetectError> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .filter(|&n| n > 0)
        .ok_or(DetectError::FrameSize { width, height })?;
    if pixels.len() != expected {
        return Err(DetectError::BufferSize {
            width,
            height,
            expected,
            got: pixels.len(),
        });
    }
    ::image::GrayImage::from_raw(width, height, pixels.to_vec())
        .ok_or(DetectError::FrameSize { width, height })
}

/// Copy a core buffer into an `image::GrayImage`, e.g. for PNG output.
pub fn to_gray_image(img: &core::GrayImage) -> Result<::image::GrayImage, DetectError> {
    let width = u32::try_from(img.width).unwrap_or(u32::MAX);
    let height = u32::try_from(img.height).unwrap_or(u32::MAX);
    gray_image_from_slice(width, height, &img.data)
}

/// Decode an image file as upright grayscale.
///
/// The EXIF orientation is read from the decoder and applied once here; no
/// other rotation is inferred from the image dimensions.
pub fn load_upright_image(path: impl AsRef<Path>) -> Result<::image::GrayImage, DetectError> {
    let path = path.as_ref();
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    log::debug!(
        "loaded {} as {}x{} ({orientation:?})",
        path.display(),
        img.width(),
        img.height()
    );
    Ok(img.to_luma8())
}

/// Scan an in-memory grayscale image, containing any panic.
pub fn scan_gray_image(
    scanner: &OmrScanner,
    img: &::image::GrayImage,
) -> Result<SheetScan, ScanError> {
    scanner.scan_guarded(&gray_view(img))
}

/// Load, orient and scan one image file.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(scanner, path))
)]
pub fn scan_image_file(
    scanner: &OmrScanner,
    path: impl AsRef<Path>,
) -> Result<SheetScan, DetectError> {
    let img = load_upright_image(path)?;
    Ok(scan_gray_image(scanner, &img)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_length_is_checked() {
        assert!(matches!(
            gray_image_from_slice(4, 4, &[0u8; 15]),
            Err(DetectError::BufferSize {
                expected: 16,
                got: 15,
                ..
            })
        ));
        assert!(matches!(
            gray_image_from_slice(0, 4, &[]),
            Err(DetectError::FrameSize { .. })
        ));
        let img = gray_image_from_slice(3, 2, &[1, 2, 3, 4, 5, 6]).expect("image");
        let view = gray_view(&img);
        assert_eq!((view.width, view.height), (3, 2));
        assert_eq!(view.get(2, 1), 6);
    }

    #[test]
    fn png_round_trip_keeps_pixels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gradient.png");
        let mut src = core::GrayImage::filled(8, 5, 0);
        for y in 0..5 {
            for x in 0..8 {
                src.put(x, y, (x * 30 + y) as u8);
            }
        }
        to_gray_image(&src).expect("convert").save(&path).expect("save");

        let back = load_upright_image(&path).expect("load");
        assert_eq!(back.dimensions(), (8, 5));
        assert_eq!(back.as_raw(), &src.data);
    }

    /// Baseline JPEG of `img` carrying an EXIF APP1 segment with the given
    /// Orientation tag, inserted after the JFIF header.
    fn jpeg_with_orientation(img: &::image::GrayImage, orientation: u16) -> Vec<u8> {
        let mut jpeg = Vec::new();
        ::image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 100)
            .encode_image(img)
            .expect("encode jpeg");

        // big-endian TIFF, one IFD entry: 0x0112 SHORT x1
        let mut exif = b"Exif\0\0MM\0\x2a\0\0\0\x08\0\x01\x01\x12\0\x03\0\0\0\x01".to_vec();
        exif.extend_from_slice(&orientation.to_be_bytes());
        exif.extend_from_slice(&[0; 6]);

        let mut at = 2;
        if jpeg[2..4] == [0xff, 0xe0] {
            at = 4 + usize::from(u16::from_be_bytes([jpeg[4], jpeg[5]]));
        }
        let mut out = jpeg[..at].to_vec();
        out.extend_from_slice(&[0xff, 0xe1]);
        out.extend_from_slice(&((exif.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&exif);
        out.extend_from_slice(&jpeg[at..]);
        out
    }

    #[test]
    fn exif_orientation_is_applied_exactly_once() {
        // 32x16, left half dark
        let img = ::image::GrayImage::from_fn(32, 16, |x, _| {
            ::image::Luma([if x < 16 { 0 } else { 255 }])
        });
        let dir = tempfile::tempdir().expect("tempdir");

        // 6: rotate 90 clockwise, the dark left half ends up on top
        let cw = dir.path().join("rotate_cw.jpg");
        std::fs::write(&cw, jpeg_with_orientation(&img, 6)).expect("write");
        let up = load_upright_image(&cw).expect("load");
        assert_eq!(up.dimensions(), (16, 32));
        assert!(up.get_pixel(8, 4)[0] < 60);
        assert!(up.get_pixel(8, 27)[0] > 200);

        // 8: rotate 90 counter-clockwise, the dark half ends up at the bottom
        let ccw = dir.path().join("rotate_ccw.jpg");
        std::fs::write(&ccw, jpeg_with_orientation(&img, 8)).expect("write");
        let up = load_upright_image(&ccw).expect("load");
        assert_eq!(up.dimensions(), (16, 32));
        assert!(up.get_pixel(8, 4)[0] > 200);
        assert!(up.get_pixel(8, 27)[0] < 60);

        // 1: already upright
        let plain = dir.path().join("upright.jpg");
        std::fs::write(&plain, jpeg_with_orientation(&img, 1)).expect("write");
        let up = load_upright_image(&plain).expect("load");
        assert_eq!(up.dimensions(), (32, 16));
        assert!(up.get_pixel(4, 8)[0] < 60);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("not_an_image.png");
        std::fs::write(&path, b"hello").expect("write");
        assert!(load_upright_image(&path).is_err());
    }
}
