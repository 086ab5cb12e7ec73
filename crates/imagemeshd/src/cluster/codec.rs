//! Compressed payload encoding for work units.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageError, ImageFormat, RgbImage};
use thiserror::Error;

use imagemesh_config::UnitCodec;
use imagemesh_wire::{Image, WireError};

/// Codec settings applied to every unit payload of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UnitEncoding {
    pub(crate) codec: UnitCodec,
    pub(crate) quality: u8,
}

impl UnitEncoding {
    pub(crate) fn new(codec: UnitCodec, quality: u8) -> Self {
        Self {
            codec,
            quality: quality.clamp(1, 100),
        }
    }
}

/// Errors raised while compressing or decompressing unit payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Width or height does not fit the codec's 32-bit range.
    #[error("image of {rows}x{cols} exceeds the codec's dimension range")]
    Dimensions {
        /// Image height.
        rows: usize,
        /// Image width.
        cols: usize,
    },
    /// Compression failed.
    #[error("failed to encode {codec} payload: {source}")]
    Encode {
        /// Codec in use.
        codec: UnitCodec,
        /// Encoder failure.
        #[source]
        source: ImageError,
    },
    /// The payload is not a valid image in the announced codec.
    #[error("failed to decode {codec} payload: {source}")]
    Decode {
        /// Codec the payload claimed.
        codec: UnitCodec,
        /// Decoder failure.
        #[source]
        source: ImageError,
    },
    /// Decoded pixels do not match the decoded dimensions.
    #[error("decoded payload has an inconsistent shape: {0}")]
    Shape(#[source] WireError),
}

/// Compresses an image into a unit payload.
pub(crate) fn encode_image(image: &Image, encoding: UnitEncoding) -> Result<Vec<u8>, CodecError> {
    let dimensions = CodecError::Dimensions {
        rows: image.rows(),
        cols: image.cols(),
    };
    let (Ok(width), Ok(height)) = (u32::try_from(image.cols()), u32::try_from(image.rows()))
    else {
        return Err(dimensions);
    };
    encode_rgb(image.pixels(), width, height, encoding)
}

/// Compresses an already-decoded image, converting it to RGB first.
pub(crate) fn encode_dynamic(
    image: &DynamicImage,
    encoding: UnitEncoding,
) -> Result<Vec<u8>, CodecError> {
    let rgb = image.to_rgb8();
    encode_rgb(rgb.as_raw(), rgb.width(), rgb.height(), encoding)
}

fn encode_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    encoding: UnitEncoding,
) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::new();
    let result = match encoding.codec {
        UnitCodec::Jpeg => JpegEncoder::new_with_quality(&mut bytes, encoding.quality).write_image(
            pixels,
            width,
            height,
            ExtendedColorType::Rgb8,
        ),
        UnitCodec::Png => PngEncoder::new(&mut bytes).write_image(
            pixels,
            width,
            height,
            ExtendedColorType::Rgb8,
        ),
    };
    result.map_err(|source| CodecError::Encode {
        codec: encoding.codec,
        source,
    })?;
    Ok(bytes)
}

/// Decompresses a unit payload into a generic image.
pub(crate) fn decode_dynamic(payload: &[u8], codec: UnitCodec) -> Result<DynamicImage, CodecError> {
    let format = match codec {
        UnitCodec::Jpeg => ImageFormat::Jpeg,
        UnitCodec::Png => ImageFormat::Png,
    };
    image::load(Cursor::new(payload), format).map_err(|source| CodecError::Decode { codec, source })
}

/// Decompresses a unit payload into a three-channel pixel buffer.
///
/// The result carries whatever dimensions the payload declares, which may
/// differ from the image that was originally sent.
pub(crate) fn decode_payload(payload: &[u8], codec: UnitCodec) -> Result<Image, CodecError> {
    let rgb = decode_dynamic(payload, codec)?.to_rgb8();
    from_rgb(rgb)
}

/// Converts an `image` buffer into the wire representation.
pub(crate) fn from_rgb(rgb: RgbImage) -> Result<Image, CodecError> {
    let (width, height) = rgb.dimensions();
    let dimensions = CodecError::Dimensions {
        rows: usize::MAX,
        cols: usize::MAX,
    };
    let (Ok(cols), Ok(rows)) = (usize::try_from(width), usize::try_from(height)) else {
        return Err(dimensions);
    };
    Image::new(rows, cols, rgb.into_raw()).map_err(CodecError::Shape)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn checkerboard(rows: usize, cols: usize) -> Image {
        let mut pixels = Vec::with_capacity(rows * cols * 3);
        for row in 0..rows {
            for col in 0..cols {
                let value = if ((row >> 2) + (col >> 2)) & 1 == 0 { 230 } else { 20 };
                pixels.extend_from_slice(&[value, value >> 1, 255 - value]);
            }
        }
        Image::new(rows, cols, pixels).expect("valid checkerboard")
    }

    #[test]
    fn png_payloads_are_lossless() {
        let image = checkerboard(9, 13);
        let encoding = UnitEncoding::new(UnitCodec::Png, 95);
        let payload = encode_image(&image, encoding).expect("encode png");
        let decoded = decode_payload(&payload, UnitCodec::Png).expect("decode png");
        assert_eq!(decoded, image);
    }

    #[test]
    fn jpeg_payloads_keep_their_shape() {
        let image = checkerboard(17, 11);
        let encoding = UnitEncoding::new(UnitCodec::Jpeg, 95);
        let payload = encode_image(&image, encoding).expect("encode jpeg");
        let decoded = decode_payload(&payload, UnitCodec::Jpeg).expect("decode jpeg");
        assert_eq!((decoded.rows(), decoded.cols()), (17, 11));
    }

    #[rstest]
    #[case(UnitCodec::Jpeg)]
    #[case(UnitCodec::Png)]
    fn garbage_payloads_fail_to_decode(#[case] codec: UnitCodec) {
        let error = decode_payload(b"not an image", codec).expect_err("garbage");
        assert!(matches!(error, CodecError::Decode { .. }));
    }

    #[rstest]
    #[case(0, 1)]
    #[case(250, 100)]
    fn quality_is_clamped(#[case] requested: u8, #[case] expected: u8) {
        assert_eq!(UnitEncoding::new(UnitCodec::Jpeg, requested).quality, expected);
    }
}
