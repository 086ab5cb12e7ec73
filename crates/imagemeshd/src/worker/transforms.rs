//! Transform catalog run by workers.
//!
//! Every transform is a pure function of its input image. Names outside the
//! catalog are not errors: the input is handed back untouched and the caller
//! learns about it through [`TransformOutcome::PassThrough`].

use image::{DynamicImage, GrayImage, Luma, RgbImage, imageops};
use strum::{AsRefStr, Display, EnumIter, EnumString};

const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];
const MILD_SHARPEN_KERNEL: [f32; 9] = [0.0, -0.5, 0.0, -0.5, 3.0, -0.5, 0.0, -0.5, 0.0];
const SOBEL_X: [i32; 9] = [-1, 0, 1, -2, 0, 2, -1, 0, 1];
const SOBEL_Y: [i32; 9] = [-1, -2, -1, 0, 0, 0, 1, 2, 1];

/// Sigma matching a 5x5 Gaussian kernel.
const BLUR_SIGMA: f32 = 1.1;
/// Sigma matching an 11x11 Gaussian neighbourhood.
const THRESHOLD_SIGMA: f32 = 2.0;
const THRESHOLD_OFFSET: i16 = 2;
const EDGE_LOW: u32 = 100;
const EDGE_HIGH: u32 = 200;
/// Half-width of the 21x21 structuring element.
const MORPH_RADIUS: usize = 10;
/// Share of pixels clipped at each end of the contrast stretch, in percent.
const STRETCH_CLIP_PERCENT: u64 = 1;

/// Operations known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    /// Sobel edges with hysteresis, as a binary luma image.
    EdgeDetection,
    /// Every channel mapped to `255 - value`.
    ColorInversion,
    /// 5x5 Gaussian smoothing.
    GaussianBlur,
    /// 3x3 Laplacian sharpening.
    Sharpen,
    /// Luma histogram equalization that keeps chroma.
    HistogramEqualization,
    /// Binary threshold against a Gaussian-weighted local mean.
    AdaptiveThreshold,
    /// 21x21 rectangular max filter.
    Dilation,
    /// 21x21 rectangular min filter.
    Erosion,
    /// Contrast stretch followed by a mild sharpen.
    Enhance,
}

/// Result of looking an operation up and running it.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutcome {
    /// The named transform ran.
    Transformed(DynamicImage),
    /// The name is not in the catalog; the input is returned as-is.
    PassThrough(DynamicImage),
}

impl TransformOutcome {
    /// The image to send back, whichever way it was produced.
    #[must_use]
    pub fn into_image(self) -> DynamicImage {
        match self {
            Self::Transformed(image) | Self::PassThrough(image) => image,
        }
    }
}

/// Runs the operation called `name` on `image`.
#[must_use]
pub fn apply(name: &str, image: DynamicImage) -> TransformOutcome {
    match name.parse::<Operation>() {
        Ok(operation) => TransformOutcome::Transformed(operation.run(&image)),
        Err(_) => TransformOutcome::PassThrough(image),
    }
}

impl Operation {
    /// Applies the transform.
    #[must_use]
    pub fn run(self, image: &DynamicImage) -> DynamicImage {
        match self {
            Self::EdgeDetection => DynamicImage::ImageLuma8(edge_map(&image.to_luma8())),
            Self::ColorInversion => {
                let mut inverted = image.clone();
                inverted.invert();
                inverted
            }
            Self::GaussianBlur => image.blur(BLUR_SIGMA),
            Self::Sharpen => image.filter3x3(&SHARPEN_KERNEL),
            Self::HistogramEqualization => {
                DynamicImage::ImageRgb8(equalize_luma(&image.to_rgb8()))
            }
            Self::AdaptiveThreshold => {
                DynamicImage::ImageLuma8(adaptive_threshold(&image.to_luma8()))
            }
            Self::Dilation => DynamicImage::ImageRgb8(morph(&image.to_rgb8(), Extremum::Max)),
            Self::Erosion => DynamicImage::ImageRgb8(morph(&image.to_rgb8(), Extremum::Min)),
            Self::Enhance => DynamicImage::ImageRgb8(stretch_contrast(&image.to_rgb8()))
                .filter3x3(&MILD_SHARPEN_KERNEL),
        }
    }
}

fn luma_of(pixel: [u8; 3]) -> u8 {
    let [r, g, b] = pixel.map(u32::from);
    let weighted = 299 * r + 587 * g + 114 * b + 500;
    weighted
        .checked_div(1000)
        .and_then(|luma| u8::try_from(luma).ok())
        .unwrap_or(u8::MAX)
}

fn clamp_u8(value: i32) -> u8 {
    u8::try_from(value.clamp(0, 255)).unwrap_or(u8::MAX)
}

/// Shifts every channel by the change a lookup table makes to the pixel's
/// luma, keeping its chroma.
fn remap_luma(image: &RgbImage, table: &[u8; 256]) -> RgbImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        let luma = luma_of(pixel.0);
        let mapped = table.get(usize::from(luma)).copied().unwrap_or(luma);
        let delta = i32::from(mapped) - i32::from(luma);
        pixel.0 = pixel.0.map(|channel| clamp_u8(i32::from(channel) + delta));
    }
    output
}

fn luma_histogram(image: &RgbImage) -> [u64; 256] {
    let mut histogram = [0_u64; 256];
    for pixel in image.pixels() {
        if let Some(count) = histogram.get_mut(usize::from(luma_of(pixel.0))) {
            *count += 1;
        }
    }
    histogram
}

fn equalize_luma(image: &RgbImage) -> RgbImage {
    let histogram = luma_histogram(image);
    let total: u64 = histogram.iter().sum();
    let first = histogram.iter().copied().find(|count| *count > 0).unwrap_or(0);
    let mut table = [0_u8; 256];
    if total > first {
        let mut cumulative = 0_u64;
        for (slot, count) in table.iter_mut().zip(histogram) {
            cumulative += count;
            let scaled = (cumulative.saturating_sub(first) * 255).checked_div(total - first);
            *slot = scaled
                .and_then(|value| u8::try_from(value).ok())
                .unwrap_or(u8::MAX);
        }
    } else {
        for (slot, value) in table.iter_mut().zip(0_u8..=255) {
            *slot = value;
        }
    }
    remap_luma(image, &table)
}

fn stretch_contrast(image: &RgbImage) -> RgbImage {
    let histogram = luma_histogram(image);
    let total: u64 = histogram.iter().sum();
    let clip = (total * STRETCH_CLIP_PERCENT).checked_div(100).unwrap_or(0);
    let low = percentile(&histogram, clip);
    let high = percentile(&histogram, total.saturating_sub(clip + 1));
    let mut table = [0_u8; 256];
    for (slot, value) in table.iter_mut().zip(0_i32..) {
        let stretched = ((value - low) * 255).checked_div(high - low);
        *slot = clamp_u8(if high > low {
            stretched.unwrap_or(value)
        } else {
            value
        });
    }
    remap_luma(image, &table)
}

/// Luma value below which `rank` pixels fall.
fn percentile(histogram: &[u64; 256], rank: u64) -> i32 {
    let mut cumulative = 0_u64;
    for (value, count) in (0_i32..).zip(histogram) {
        cumulative += count;
        if cumulative > rank {
            return value;
        }
    }
    255
}

fn adaptive_threshold(luma: &GrayImage) -> GrayImage {
    let local = imageops::blur(luma, THRESHOLD_SIGMA);
    let mut output = GrayImage::new(luma.width(), luma.height());
    for ((out, source), mean) in output.pixels_mut().zip(luma.pixels()).zip(local.pixels()) {
        let (Luma([average]), Luma([value])) = (mean, source);
        let limit = i16::from(*average) - THRESHOLD_OFFSET;
        *out = Luma([if i16::from(*value) > limit { 255 } else { 0 }]);
    }
    output
}

/// Sobel gradient with double thresholding: strong edges are kept, weak
/// edges only next to a strong one.
fn edge_map(luma: &GrayImage) -> GrayImage {
    let (width, height) = luma.dimensions();
    let at = |column: i64, row: i64| -> i32 {
        let x = u32::try_from(column.clamp(0, i64::from(width) - 1)).unwrap_or(0);
        let y = u32::try_from(row.clamp(0, i64::from(height) - 1)).unwrap_or(0);
        let Luma([value]) = *luma.get_pixel(x, y);
        i32::from(value)
    };
    let magnitude = GradientMap::from_fn(width, height, |x, y| {
        let (mut gx, mut gy) = (0_i32, 0_i32);
        let neighbourhood = (-1_i64..=1).flat_map(|dy| (-1_i64..=1).map(move |dx| (dx, dy)));
        for ((kx, ky), (dx, dy)) in SOBEL_X.iter().zip(SOBEL_Y).zip(neighbourhood) {
            let sample = at(i64::from(x) + dx, i64::from(y) + dy);
            gx += kx * sample;
            gy += ky * sample;
        }
        gx.unsigned_abs() + gy.unsigned_abs()
    });
    GrayImage::from_fn(width, height, |x, y| {
        let value = magnitude.get(i64::from(x), i64::from(y));
        let keep = value >= EDGE_HIGH
            || (value >= EDGE_LOW && magnitude.has_strong_neighbour(i64::from(x), i64::from(y)));
        Luma([if keep { 255 } else { 0 }])
    })
}

struct GradientMap {
    width: i64,
    height: i64,
    values: Vec<u32>,
}

impl GradientMap {
    fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u32) -> Self {
        let mut values = Vec::new();
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self {
            width: i64::from(width),
            height: i64::from(height),
            values,
        }
    }

    fn get(&self, x: i64, y: i64) -> u32 {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return 0;
        }
        usize::try_from(y * self.width + x)
            .ok()
            .and_then(|index| self.values.get(index).copied())
            .unwrap_or(0)
    }

    fn has_strong_neighbour(&self, x: i64, y: i64) -> bool {
        (-1..=1).any(|dy| (-1..=1).any(|dx| self.get(x + dx, y + dy) >= EDGE_HIGH))
    }
}

#[derive(Clone, Copy)]
enum Extremum {
    Max,
    Min,
}

impl Extremum {
    fn pick(self, a: u8, b: u8) -> u8 {
        match self {
            Self::Max => a.max(b),
            Self::Min => a.min(b),
        }
    }
}

/// Rectangular morphology, applied as a horizontal then a vertical pass.
fn morph(image: &RgbImage, extremum: Extremum) -> RgbImage {
    let horizontal = morph_pass(image, extremum, |x, y, offset| (x + offset, y));
    morph_pass(&horizontal, extremum, |x, y, offset| (x, y + offset))
}

fn morph_pass(
    image: &RgbImage,
    extremum: Extremum,
    step: impl Fn(i64, i64, i64) -> (i64, i64),
) -> RgbImage {
    let (width, height) = image.dimensions();
    let radius = i64::try_from(MORPH_RADIUS).unwrap_or(0);
    RgbImage::from_fn(width, height, |x, y| {
        let mut pixel = image.get_pixel(x, y).0;
        for offset in -radius..=radius {
            let (nx, ny) = step(i64::from(x), i64::from(y), offset);
            let (Ok(nx), Ok(ny)) = (u32::try_from(nx), u32::try_from(ny)) else {
                continue;
            };
            if nx >= width || ny >= height {
                continue;
            }
            let neighbour = image.get_pixel(nx, ny).0;
            for (channel, other) in pixel.iter_mut().zip(neighbour) {
                *channel = extremum.pick(*channel, other);
            }
        }
        image::Rgb(pixel)
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    fn ramp(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            let value = u8::try_from((x * 16 + y * 4) & 0xff).unwrap_or(0);
            image::Rgb([value, value >> 1, 255 - value])
        }))
    }

    fn single_bright_pixel(size: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if x == size >> 1 && y == size >> 1 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn unknown_operations_pass_the_input_through() {
        let input = ramp(5, 4);
        assert_eq!(
            apply("posterize", input.clone()),
            TransformOutcome::PassThrough(input)
        );
    }

    #[test]
    fn catalog_names_are_snake_case() {
        let names: Vec<String> = Operation::iter().map(|op| op.to_string()).collect();
        assert!(names.contains(&"histogram_equalization".to_owned()));
        assert!(names.contains(&"edge_detection".to_owned()));
        assert_eq!(names.len(), 9);
    }

    #[rstest]
    fn every_operation_keeps_the_image_size(
        #[values(
            Operation::EdgeDetection,
            Operation::ColorInversion,
            Operation::GaussianBlur,
            Operation::Sharpen,
            Operation::HistogramEqualization,
            Operation::AdaptiveThreshold,
            Operation::Dilation,
            Operation::Erosion,
            Operation::Enhance
        )]
        operation: Operation,
    ) {
        let output = operation.run(&ramp(13, 7));
        assert_eq!((output.width(), output.height()), (13, 7));
    }

    #[test]
    fn color_inversion_flips_every_channel() {
        let output = apply("color_inversion", ramp(3, 3)).into_image().to_rgb8();
        let input = ramp(3, 3).to_rgb8();
        for (out, source) in output.pixels().zip(input.pixels()) {
            assert_eq!(out.0, source.0.map(|channel| 255 - channel));
        }
    }

    #[test]
    fn dilation_spreads_a_bright_pixel_over_the_structuring_element() {
        let dilated = morph(&single_bright_pixel(31), Extremum::Max);
        assert_eq!(dilated.get_pixel(15 + 10, 15 - 10).0, [255, 255, 255]);
        assert_eq!(dilated.get_pixel(15 + 11, 15).0, [0, 0, 0]);
    }

    #[test]
    fn erosion_removes_isolated_bright_pixels() {
        let eroded = morph(&single_bright_pixel(9), Extremum::Min);
        assert!(eroded.pixels().all(|pixel| pixel.0 == [0, 0, 0]));
    }

    #[test]
    fn histogram_equalization_spreads_a_narrow_range() {
        let narrow = RgbImage::from_fn(16, 1, |x, _| {
            let value = 100 + u8::try_from(x).unwrap_or(0);
            image::Rgb([value, value, value])
        });
        let equalized = equalize_luma(&narrow);
        let first = equalized.get_pixel(0, 0).0[0];
        let last = equalized.get_pixel(15, 0).0[0];
        assert!(first < 20, "darkest pixel should move towards black: {first}");
        assert_eq!(last, 255);
    }

    #[test]
    fn adaptive_threshold_is_binary() {
        let output = Operation::AdaptiveThreshold.run(&ramp(20, 20)).to_luma8();
        assert!(output.pixels().all(|pixel| matches!(pixel.0[0], 0 | 255)));
    }

    #[test]
    fn edge_detection_marks_a_sharp_boundary() {
        let split = DynamicImage::ImageRgb8(RgbImage::from_fn(10, 6, |x, _| {
            if x < 5 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        }));
        let edges = Operation::EdgeDetection.run(&split).to_luma8();
        assert_eq!(edges.get_pixel(4, 3).0[0], 255);
        assert_eq!(edges.get_pixel(0, 3).0[0], 0);
        assert_eq!(edges.get_pixel(9, 3).0[0], 0);
    }
}
