use std::future::Future;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::adherence::ComparisonResult;

/// A stored comparison between one planogram and one shelf image
#[derive(Debug, Clone)]
pub struct ComparisonRecord {
    pub id: Uuid,
    pub planogram_id: i64,
    pub image_id: i64,
    pub result: ComparisonResult,
    pub created_at: OffsetDateTime,
    pub(super) _guard: (),
}

pub trait ComparisonRepository {
    /// Both ids must exist in the catalog
    fn record_comparison(
        &self,
        planogram_id: i64,
        image_id: i64,
        result: &ComparisonResult,
    ) -> impl Future<Output = anyhow::Result<ComparisonRecord>>;
    fn get_comparison(&self, id: Uuid)
        -> impl Future<Output = anyhow::Result<Option<ComparisonRecord>>>;
    /// Newest first
    fn get_comparisons(
        &self,
        planogram_id: i64,
        image_id: i64,
    ) -> impl Future<Output = anyhow::Result<Vec<ComparisonRecord>>>;
}
