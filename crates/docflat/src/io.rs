use std::fs;
use std::path::Path;

use image::RgbImage;
use tracing::debug;

use crate::{
    config::InputConfig,
    error::{DocflatError, Result},
};

/// Load an 8-bit RGB raster, enforcing the allowed extensions and size limit.
pub fn load_image<P: AsRef<Path>>(path: P, input: &InputConfig) -> Result<RgbImage> {
    let path = path.as_ref();
    if !input.is_allowed(path) {
        return Err(DocflatError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let size = fs::metadata(path)
        .map_err(|e| DocflatError::UnreadableInput {
            path: path.to_path_buf(),
            source: image::ImageError::IoError(e),
        })?
        .len();
    if size > input.max_input_bytes {
        return Err(DocflatError::InputTooLarge {
            path: path.to_path_buf(),
            size,
            limit: input.max_input_bytes,
        });
    }

    let image = image::open(path)
        .map_err(|source| DocflatError::UnreadableInput {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    debug!(path = %path.display(), size = ?image.dimensions(), "Loaded image");
    Ok(image)
}

/// Write `image`, creating parent directories. Format follows the extension.
pub fn save_image<P: AsRef<Path>>(path: P, image: &RgbImage) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    image.save(path)?;
    debug!(path = %path.display(), "Saved image");
    Ok(())
}
