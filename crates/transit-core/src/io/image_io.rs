use std::path::Path;

use image::{ColorType, DynamicImage, Luma};
use ndarray::Array2;

use crate::error::{Result, TransitError};
use crate::frame::Frame;

/// Save a frame as 16-bit grayscale TIFF, clamping to the u16 ADU range.
pub fn save_tiff(frame: &Frame, path: &Path) -> Result<()> {
    let h = frame.height();
    let w = frame.width();

    let mut pixels: Vec<u16> = Vec::with_capacity(h * w);
    for row in 0..h {
        for col in 0..w {
            let val = frame.data[[row, col]].round().clamp(0.0, 65535.0) as u16;
            pixels.push(val);
        }
    }

    let img = image::ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .ok_or_else(|| {
            TransitError::Io(std::io::Error::other(format!(
                "pixel buffer does not match {w}x{h}"
            )))
        })?;
    img.save(path)?;
    Ok(())
}

/// Load a grayscale (or luminance of a colour) image file into a Frame.
///
/// Pixel values keep their native scale: 8-bit files give 0..255, 16-bit
/// files give 0..65535 and float files pass through unchanged.
pub fn load_image(path: &Path) -> Result<Frame> {
    let img = image::open(path)?;
    let data = to_adu_array(&img);
    let mut frame = Frame::new(data);
    frame.metadata.name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    Ok(frame)
}

fn to_adu_array(img: &DynamicImage) -> Array2<f32> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut data = Array2::<f32>::zeros((h, w));

    match img.color() {
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => {
            let gray = img.to_luma8();
            for (col, row, pixel) in gray.enumerate_pixels() {
                data[[row as usize, col as usize]] = pixel.0[0] as f32;
            }
        }
        ColorType::Rgb32F | ColorType::Rgba32F => {
            let gray = img.to_luma32f();
            for (col, row, pixel) in gray.enumerate_pixels() {
                data[[row as usize, col as usize]] = pixel.0[0];
            }
        }
        _ => {
            let gray = img.to_luma16();
            for (col, row, pixel) in gray.enumerate_pixels() {
                data[[row as usize, col as usize]] = pixel.0[0] as f32;
            }
        }
    }

    data
}
