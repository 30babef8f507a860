use std::path::{Path, PathBuf};

use base64::Engine as _;
use image::error::{ParameterError, ParameterErrorKind};
use image::{imageops, ImageError, ImageFormat, RgbImage};

use crate::bbox::BoundingBox;
use crate::error::VisionError;

/// Order of the three colour channels in an [`Image`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// In-memory 8-bit, three-channel image.
///
/// Buffers coming from BGR sources keep their byte layout and are tagged
/// [`ChannelOrder::Bgr`] until [`Image::into_rgb`] is called.
#[derive(Debug, Clone)]
pub struct Image {
    pixels: RgbImage,
    order: ChannelOrder,
}

impl Image {
    pub fn new(pixels: RgbImage, order: ChannelOrder) -> Self {
        Self { pixels, order }
    }

    /// Decode an image file and tag its stored channels with `order`.
    ///
    /// Files written from BGR buffers decode with red and blue swapped;
    /// opening them as [`ChannelOrder::Bgr`] lets [`Image::into_rgb`] undo it.
    pub fn open(path: &Path, order: ChannelOrder) -> Result<Self, VisionError> {
        let bytes = std::fs::read(path).map_err(|e| VisionError::io(path, e))?;
        let decoded = image::load_from_memory(&bytes)?.to_rgb8();
        let (width, height) = decoded.dimensions();
        Self::from_raw(width, height, decoded.into_raw(), order)
    }

    /// Wrap a raw interleaved buffer of `width * height * 3` bytes.
    pub fn from_raw(
        width: u32,
        height: u32,
        data: Vec<u8>,
        order: ChannelOrder,
    ) -> Result<Self, VisionError> {
        let pixels = RgbImage::from_raw(width, height, data).ok_or_else(|| {
            ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            ))
        })?;
        Ok(Self::new(pixels, order))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    #[cfg(test)]
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Reorder channels so the buffer is RGB. No-op for RGB images.
    pub fn into_rgb(mut self) -> Self {
        if self.order == ChannelOrder::Bgr {
            for pixel in self.pixels.pixels_mut() {
                pixel.0.swap(0, 2);
            }
            self.order = ChannelOrder::Rgb;
        }
        self
    }

    /// Copy out the region covered by `bbox`.
    ///
    /// The box must be non-empty and lie inside the image; nothing is clamped.
    pub fn crop(&self, bbox: &BoundingBox) -> Result<Self, VisionError> {
        let (width, height) = (i64::from(self.width()), i64::from(self.height()));

        if bbox.x1 < 0 || bbox.y1 < 0 {
            return Err(VisionError::InvalidBoundingBox(format!(
                "{} has negative coordinates",
                bbox
            )));
        }
        if bbox.x1 >= bbox.x2 || bbox.y1 >= bbox.y2 {
            return Err(VisionError::InvalidBoundingBox(format!(
                "{} is empty or inverted",
                bbox
            )));
        }
        if bbox.x2 > width || bbox.y2 > height {
            return Err(VisionError::InvalidBoundingBox(format!(
                "{} exceeds image bounds {}x{}",
                bbox, width, height
            )));
        }

        // Bounds were checked above, so every value fits in u32.
        let cropped = imageops::crop_imm(
            &self.pixels,
            bbox.x1 as u32,
            bbox.y1 as u32,
            bbox.width() as u32,
            bbox.height() as u32,
        )
        .to_image();

        Ok(Self::new(cropped, self.order))
    }

    /// Write the buffer as a JPEG file with a unique name inside `dir`.
    ///
    /// Pixels are written as stored, so BGR images should be converted with
    /// [`Image::into_rgb`] first.
    pub fn to_path(&self, dir: &Path) -> Result<PathBuf, VisionError> {
        std::fs::create_dir_all(dir).map_err(|e| VisionError::io(dir, e))?;

        let path = dir.join(format!("image_{}.jpg", uuid::Uuid::new_v4()));
        self.pixels.save_with_format(&path, ImageFormat::Jpeg)?;

        log::debug!(
            "Image {}x{} written to {}",
            self.width(),
            self.height(),
            path.display()
        );
        Ok(path)
    }
}

/// Base64 of a file's raw bytes.
pub fn encode_image_file(path: &Path) -> Result<String, VisionError> {
    let bytes = std::fs::read(path).map_err(|e| VisionError::io(path, e))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Materialise `image` as a temporary JPEG inside `temp_dir` and encode it.
pub fn encode_image(image: &Image, temp_dir: &Path) -> Result<String, VisionError> {
    let path = image.to_path(temp_dir)?;
    let encoded = encode_image_file(&path);

    if let Err(e) = std::fs::remove_file(&path) {
        log::warn!("Failed to remove temporary image {}: {}", path.display(), e);
    }

    encoded
}
