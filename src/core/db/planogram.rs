use std::{future::Future, path::{Path, PathBuf}};

use time::OffsetDateTime;

/// A reference planogram image registered in the catalog
#[derive(Debug, Clone)]
pub struct Planogram {
    pub id: i64,
    pub file_name: String,
    pub file_path: PathBuf,
    pub uploaded_at: OffsetDateTime,
    pub(super) _guard: (),
}

pub trait PlanogramRepository {
    fn add_planogram(&self, path: &Path) -> impl Future<Output = anyhow::Result<Planogram>>;
    fn get_planogram(&self, id: i64) -> impl Future<Output = anyhow::Result<Option<Planogram>>>;
    fn get_planogram_path(&self, id: i64)
        -> impl Future<Output = anyhow::Result<Option<PathBuf>>>;
    fn get_planograms(&self) -> impl Future<Output = anyhow::Result<Vec<Planogram>>>;
}
