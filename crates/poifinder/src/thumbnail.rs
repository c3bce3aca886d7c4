//! Raster thumbnails and the decode capability used by the image stage.

use std::fmt;

use bytes::Bytes;
use image::RgbaImage;
use poifinder_transport::TransportError;
use thiserror::Error;

/// Edge length of the placeholder substituted when the image stage fails.
pub const PLACEHOLDER_SIZE: u32 = 75;
/// Opaque white.
const PLACEHOLDER_PIXEL: [u8; 4] = [255, 255, 255, 255];
const BYTES_PER_PIXEL: usize = 4;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image fetch failed: {0}")]
    Fetch(#[from] TransportError),
    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Decode task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Pixel buffer of {len} bytes does not match a {width}x{height} RGBA image")]
    InvalidLength { width: u32, height: u32, len: usize },
}

/// An RGBA8 raster, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct Thumbnail {
    width: u32,
    height: u32,
    pixels: Bytes,
    placeholder: bool,
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

impl Thumbnail {
    pub fn from_rgba(width: u32, height: u32, pixels: impl Into<Bytes>) -> Result<Self, ImageError> {
        let pixels = pixels.into();
        if pixels.len() != width as usize * height as usize * BYTES_PER_PIXEL {
            return Err(ImageError::InvalidLength {
                width,
                height,
                len: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
            placeholder: false,
        })
    }

    /// A `size`x`size` opaque blank image.
    pub fn placeholder(size: u32) -> Self {
        let count = size as usize * size as usize;
        Self {
            width: size,
            height: size,
            pixels: Bytes::from(PLACEHOLDER_PIXEL.repeat(count)),
            placeholder: true,
        }
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub const fn pixels(&self) -> &Bytes {
        &self.pixels
    }

    pub const fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.to_vec())
    }
}

impl From<RgbaImage> for Thumbnail {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: Bytes::from(image.into_raw()),
            placeholder: false,
        }
    }
}

/// Turns fetched image bytes into a [`Thumbnail`].
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Thumbnail, ImageError>;
}

/// Decodes any format the `image` crate was built with, sniffing it from the bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterDecoder;

impl ImageDecoder for RasterDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Thumbnail, ImageError> {
        Ok(image::load_from_memory(bytes)?.into_rgba8().into())
    }
}
