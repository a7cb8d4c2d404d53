use std::path::Path;

use anyhow::{Context, Result};

/// A decoded heightmap in tightly packed RGBA8.
#[derive(Debug, Clone)]
pub struct LoadedHeightmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Decodes an image file into RGBA8, whatever its on-disk pixel format.
pub fn load(path: &Path) -> Result<LoadedHeightmap> {
    let img = image::open(path).with_context(|| format!("failed to load heightmap {}", path.display()))?;
    Ok(from_image(img))
}

/// Same as [`load`] for an in-memory encoded image.
#[cfg(test)]
fn load_from_memory(bytes: &[u8]) -> Result<LoadedHeightmap> {
    let img = image::load_from_memory(bytes).context("failed to decode heightmap")?;
    Ok(from_image(img))
}

fn from_image(img: image::DynamicImage) -> LoadedHeightmap {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    LoadedHeightmap {
        width,
        height,
        pixels: rgba.into_raw(),
    }
}
