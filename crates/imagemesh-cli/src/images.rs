//! Loading input files and saving processed results.

use camino::{Utf8Path, Utf8PathBuf};
use image::{ImageFormat, RgbImage};

use imagemesh_wire::Image;

use crate::errors::AppError;

/// Reads `path` and converts it to packed 3-channel RGB.
pub(crate) fn load(path: &Utf8Path) -> Result<Image, AppError> {
    if !path.is_file() {
        return Err(AppError::FileNotFound {
            path: path.to_owned(),
        });
    }
    let rgb = image::open(path)
        .map_err(|source| AppError::LoadImage {
            path: path.to_owned(),
            source,
        })?
        .to_rgb8();
    let too_large = || AppError::ImageTooLarge {
        path: path.to_owned(),
    };
    let rows = usize::try_from(rgb.height()).map_err(|_| too_large())?;
    let cols = usize::try_from(rgb.width()).map_err(|_| too_large())?;
    Image::new(rows, cols, rgb.into_raw()).map_err(AppError::InvalidRequest)
}

/// Result file name for `source` processed by `operation`.
pub(crate) fn result_path(output_dir: &Utf8Path, source: &Utf8Path, operation: &str) -> Utf8PathBuf {
    let stem = source.file_stem().unwrap_or("image");
    output_dir.join(format!("{stem}.{operation}.png"))
}

/// Writes `image` as a PNG at `path`.
pub(crate) fn save(image: &Image, path: &Utf8Path) -> Result<(), AppError> {
    let too_large = || AppError::ImageTooLarge {
        path: path.to_owned(),
    };
    let width = u32::try_from(image.cols()).map_err(|_| too_large())?;
    let height = u32::try_from(image.rows()).map_err(|_| too_large())?;
    let buffer = RgbImage::from_raw(width, height, image.pixels().to_vec()).ok_or_else(too_large)?;
    buffer
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| AppError::WriteResult {
            path: path.to_owned(),
            source,
        })
}
