use std::{future::Future, path::{Path, PathBuf}};

use time::OffsetDateTime;

/// A shelf photograph registered in the catalog
#[derive(Debug, Clone)]
pub struct ShelfImage {
    pub id: i64,
    pub filename: String,
    pub file_path: PathBuf,
    pub uploaded_at: OffsetDateTime,
    pub(super) _guard: (),
}

pub trait ImageRepository {
    /// Register an existing image file by reference; the file is not copied
    fn add_image(&self, path: &Path) -> impl Future<Output = anyhow::Result<ShelfImage>>;
    fn get_image(&self, id: i64) -> impl Future<Output = anyhow::Result<Option<ShelfImage>>>;
    fn get_image_path(&self, id: i64) -> impl Future<Output = anyhow::Result<Option<PathBuf>>>;
    fn get_images(&self) -> impl Future<Output = anyhow::Result<Vec<ShelfImage>>>;
}
