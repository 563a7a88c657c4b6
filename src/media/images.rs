use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use serde::Serialize;

use crate::config::UploadConfig;
use crate::error::{Error, Result};

/// Public path prefix the upload directory is served under.
pub const UPLOAD_URL_PREFIX: &str = "/uploads/characters";

/// Derivative name and its bounding box in pixels.
const IMAGE_SIZES: [(&str, u32); 3] = [("small", 64), ("medium", 256), ("large", 512)];

/// A file received from a multipart form.
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileImages {
    pub small: String,
    pub medium: String,
    pub large: String,
}

/// Writes resized profile images for characters into one directory.
pub struct ImageStore {
    dir: PathBuf,
    allowed_extensions: Vec<String>,
    max_file_size: usize,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, config: &UploadConfig) -> Self {
        Self {
            dir: dir.into(),
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim().to_lowercase())
                .collect(),
            max_file_size: config.max_file_size,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validates the upload, replaces any previous derivatives and writes the
    /// small/medium/large variants as `<character_id>-<size>.<ext>`.
    pub fn store_profile_images(
        &self,
        character_id: &str,
        upload: &ImageUpload,
    ) -> Result<ProfileImages> {
        let extension = self.validate(upload)?;
        let format = ImageFormat::from_extension(&extension)
            .ok_or_else(|| Error::BadRequest(self.invalid_type_message()))?;

        let image = image::load_from_memory(&upload.bytes)
            .map_err(|_| Error::BadRequest("File is not a readable image".to_string()))?;

        self.delete_profile_images(character_id);
        std::fs::create_dir_all(&self.dir)?;

        let mut urls = Vec::with_capacity(IMAGE_SIZES.len());
        for (size, dimension) in IMAGE_SIZES {
            let filename = format!("{character_id}-{size}.{extension}");
            let resized = encodable(image.thumbnail(dimension, dimension), format);
            resized.save_with_format(self.dir.join(&filename), format)?;
            urls.push(format!("{UPLOAD_URL_PREFIX}/{filename}"));
        }

        tracing::info!("Stored profile images for character {}", character_id);

        let [small, medium, large]: [String; 3] = urls
            .try_into()
            .map_err(|_| Error::Internal("unexpected number of image sizes".to_string()))?;
        Ok(ProfileImages {
            small,
            medium,
            large,
        })
    }

    /// Removes every derivative for the character. Missing files are ignored.
    pub fn delete_profile_images(&self, character_id: &str) {
        for (size, _) in IMAGE_SIZES {
            for extension in &self.allowed_extensions {
                let path = self.dir.join(format!("{character_id}-{size}.{extension}"));
                match std::fs::remove_file(&path) {
                    Ok(()) => tracing::debug!("Removed {}", path.display()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
                }
            }
        }
    }

    fn validate(&self, upload: &ImageUpload) -> Result<String> {
        if upload.bytes.is_empty() {
            return Err(Error::BadRequest("File is empty".to_string()));
        }

        if upload.bytes.len() > self.max_file_size {
            return Err(Error::BadRequest(format!(
                "File size exceeds maximum limit of {}MB",
                self.max_file_size / (1024 * 1024)
            )));
        }

        let filename = upload
            .filename
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::BadRequest("Invalid filename".to_string()))?;

        let extension = file_extension(filename);
        if !self.allowed_extensions.contains(&extension) {
            return Err(Error::BadRequest(self.invalid_type_message()));
        }

        let is_image = upload
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(Error::BadRequest("File must be an image".to_string()));
        }

        Ok(extension)
    }

    fn invalid_type_message(&self) -> String {
        format!(
            "Invalid file type. Allowed types: {}",
            self.allowed_extensions.join(",")
        )
    }
}

fn file_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// JPEG has no alpha channel.
fn encodable(image: DynamicImage, format: ImageFormat) -> DynamicImage {
    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    }
}
