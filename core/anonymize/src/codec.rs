//! Image-file collaborator: decode to and encode from the canonical image.

use std::path::Path;

use crate::canonical::CanonicalImage;
use crate::error::Error;

/// Decode an image file into a canonical image.
///
/// Any decode failure, whatever its cause, collapses to
/// [`Error::LoadImage`].
pub fn load_image(path: &Path) -> Result<CanonicalImage<'static>, Error> {
    let decoded = image::open(path).map_err(|e| Error::LoadImage(e.to_string()))?;
    let rgb = decoded.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(Error::LoadImage(format!(
            "{}: image has zero dimensions",
            path.display()
        )));
    }
    Ok(CanonicalImage::from_rgb_image(&rgb))
}

/// Encode a canonical image to a file; the format follows the extension.
pub fn save_image(path: &Path, canonical: &CanonicalImage<'_>) -> Result<(), Error> {
    canonical
        .to_rgb_image()
        .save(path)
        .map_err(|e| Error::SaveImage(e.to_string()))
}
