mod images;

pub use images::{ImageStore, ImageUpload, ProfileImages, UPLOAD_URL_PREFIX};
