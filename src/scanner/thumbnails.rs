use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};

use crate::db::thumbnail_relative_path;

/// A display-sized JPEG copy of an image.
#[derive(Debug, Clone)]
pub struct Rendition {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Dimensions of the source after orientation correction.
    pub source_width: u32,
    pub source_height: u32,
}

/// Target size for a `width` x `height` image: the long side becomes `size`
/// and the other side keeps the aspect ratio. Square images take the
/// height-fixed branch.
pub fn target_dimensions(width: u32, height: u32, size: u32) -> (u32, u32) {
    let scale = |side: u32, long: u32| -> u32 {
        let scaled = (side as f64 * size as f64 / long as f64).round() as u32;
        scaled.max(1)
    };

    if width > height {
        (size, scale(height, width))
    } else {
        (scale(width, height), size)
    }
}

/// Decode `bytes`, apply the EXIF orientation, scale so the long side is
/// `size` pixels and re-encode as JPEG at `quality`.
pub fn generate(bytes: &[u8], orientation: Option<u8>, size: u32, quality: u8) -> Result<Rendition> {
    let mut img = image::load_from_memory(bytes).context("Failed to decode image")?;

    if let Some(orientation) = orientation.and_then(Orientation::from_exif) {
        img.apply_orientation(orientation);
    }

    let (source_width, source_height) = (img.width(), img.height());
    let (target_width, target_height) = target_dimensions(source_width, source_height, size);
    let resized = img.resize_exact(target_width, target_height, FilterType::CatmullRom);

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .context("Failed to encode thumbnail")?;

    Ok(Rendition {
        bytes: encoded,
        width: rgb.width(),
        height: rgb.height(),
        source_width,
        source_height,
    })
}

/// Sharded directory of thumbnails addressed by content digest.
pub struct ThumbnailStore {
    root: PathBuf,
}

impl ThumbnailStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where the thumbnail for `digest` lives, whether or not it exists yet.
    pub fn path_for(&self, digest: &str) -> PathBuf {
        self.root.join(thumbnail_relative_path(digest))
    }

    /// Write thumbnail bytes for `digest`, creating the shard directory on
    /// demand. An existing file for the same digest is overwritten.
    pub fn write(&self, digest: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(digest);
        if let Some(shard) = path.parent() {
            fs::create_dir_all(shard)
                .with_context(|| format!("Failed to create thumbnail directory {:?}", shard))?;
        }
        fs::write(&path, bytes).with_context(|| format!("Failed to write thumbnail {:?}", path))?;
        Ok(path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
