use image::{GenericImageView, RgbaImage};
use thiserror::Error;

use crate::asset::Asset;

/// Edge length of node preview thumbnails in pixels.
pub const THUMBNAIL_SIZE: u32 = 80;

#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub average_color: [u8; 3],
}

impl Thumbnail {
    /// Average color formatted as `rgb(r,g,b)`.
    pub fn css_color(&self) -> String {
        css_rgb(self.average_color)
    }
}

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("remote assets are not decoded locally")]
    RemoteAsset,
    #[error("failed to decode texture: {0}")]
    Decode(#[from] image::ImageError),
}

pub fn thumbnail_for_asset(asset: &Asset) -> Result<Thumbnail, ThumbnailError> {
    match asset {
        Asset::File(file) => make_thumbnail(&file.bytes),
        Asset::Url(_) => Err(ThumbnailError::RemoteAsset),
    }
}

pub fn make_thumbnail(bytes: &[u8]) -> Result<Thumbnail, ThumbnailError> {
    let image = image::load_from_memory(bytes)?;
    let average_color = average_color(&image.to_rgba8());
    let small = image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);
    let (width, height) = small.dimensions();
    Ok(Thumbnail {
        width,
        height,
        rgba: small.to_rgba8().into_raw(),
        average_color,
    })
}

/// Mean of the RGB channels, floored, ignoring alpha.
pub fn average_color(image: &RgbaImage) -> [u8; 3] {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return [0, 0, 0];
    }

    let mut sum = [0u64; 3];
    for pixel in image.pixels() {
        sum[0] += u64::from(pixel[0]);
        sum[1] += u64::from(pixel[1]);
        sum[2] += u64::from(pixel[2]);
    }
    [
        (sum[0] / count) as u8,
        (sum[1] / count) as u8,
        (sum[2] / count) as u8,
    ]
}

pub fn css_rgb(color: [u8; 3]) -> String {
    format!("rgb({},{},{})", color[0], color[1], color[2])
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb(color));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}
