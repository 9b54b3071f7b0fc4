mod comparison;
mod shelf_image;
mod planogram;
mod state;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use sqlx::{Row, sqlite::SqliteRow};
use state::CatalogState;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::info;
use uuid::Uuid;

use crate::adherence::ComparisonResult;

pub use comparison::{ComparisonRecord, ComparisonRepository};
pub use shelf_image::{ImageRepository, ShelfImage};
pub use planogram::{Planogram, PlanogramRepository};

/// SQLite catalog of planograms, shelf images and comparison results
#[derive(Debug, Clone)]
pub struct CatalogDb {
    state: Arc<CatalogState>,
}

impl CatalogDb {
    /// Open the catalog, creating the database file and schema if needed
    pub async fn open<P: AsRef<Path>>(database_path: P) -> anyhow::Result<Self> {
        Ok(Self {
            state: Arc::new(CatalogState::new(database_path).await?),
        })
    }

    pub fn database_path(&self) -> &Path {
        self.state.database_path()
    }

    /// Flush the write-ahead log and release the database file
    pub async fn close(&self) -> anyhow::Result<()> {
        self.state.close().await
    }
}

/// File name and canonical path of a file being registered
fn resolve_upload(path: &Path) -> anyhow::Result<(String, PathBuf)> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("Image file not found: {:?}", path))?;
    if !canonical.is_file() {
        anyhow::bail!("Not a file: {:?}", canonical);
    }
    let name = canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((name, canonical))
}

fn now_timestamp() -> anyhow::Result<(OffsetDateTime, String)> {
    let now = OffsetDateTime::now_utc();
    let text = now.format(&Rfc3339)?;
    Ok((now, text))
}

fn parse_timestamp(value: &str) -> anyhow::Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339)
        .with_context(|| format!("Invalid timestamp in catalog: {}", value))
}

fn image_from_row(row: &SqliteRow) -> anyhow::Result<ShelfImage> {
    Ok(ShelfImage {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        file_path: PathBuf::from(row.try_get::<String, _>("file_path")?),
        uploaded_at: parse_timestamp(&row.try_get::<String, _>("uploaded_at")?)?,
        _guard: (),
    })
}

fn planogram_from_row(row: &SqliteRow) -> anyhow::Result<Planogram> {
    Ok(Planogram {
        id: row.try_get("id")?,
        file_name: row.try_get("file_name")?,
        file_path: PathBuf::from(row.try_get::<String, _>("file_path")?),
        uploaded_at: parse_timestamp(&row.try_get::<String, _>("uploaded_at")?)?,
        _guard: (),
    })
}

fn comparison_from_row(row: &SqliteRow) -> anyhow::Result<ComparisonRecord> {
    let id: String = row.try_get("id")?;
    let result_json: String = row.try_get("result_json")?;
    Ok(ComparisonRecord {
        id: Uuid::parse_str(&id)?,
        planogram_id: row.try_get("planogram_id")?,
        image_id: row.try_get("image_id")?,
        result: serde_json::from_str(&result_json)
            .with_context(|| format!("Corrupt comparison result {}", id))?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        _guard: (),
    })
}

impl ImageRepository for CatalogDb {
    async fn add_image(&self, path: &Path) -> anyhow::Result<ShelfImage> {
        let (filename, file_path) = resolve_upload(path)?;
        let (uploaded_at, uploaded_at_text) = now_timestamp()?;
        let mut conn = self.state.conn().await?;

        let id: i64 = sqlx::query(
            "INSERT INTO images (filename, file_path, uploaded_at) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&filename)
        .bind(file_path.to_string_lossy().into_owned())
        .bind(&uploaded_at_text)
        .fetch_one(&mut *conn)
        .await?
        .try_get("id")?;

        info!(id, path = %file_path.display(), "image registered");
        Ok(ShelfImage {
            id,
            filename,
            file_path,
            uploaded_at,
            _guard: (),
        })
    }

    async fn get_image(&self, id: i64) -> anyhow::Result<Option<ShelfImage>> {
        let mut conn = self.state.conn().await?;
        sqlx::query("SELECT id, filename, file_path, uploaded_at FROM images WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(|row| image_from_row(&row))
            .transpose()
    }

    async fn get_image_path(&self, id: i64) -> anyhow::Result<Option<PathBuf>> {
        Ok(self.get_image(id).await?.map(|image| image.file_path))
    }

    async fn get_images(&self) -> anyhow::Result<Vec<ShelfImage>> {
        let mut conn = self.state.conn().await?;
        sqlx::query("SELECT id, filename, file_path, uploaded_at FROM images ORDER BY id ASC")
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(image_from_row)
            .collect()
    }
}

impl PlanogramRepository for CatalogDb {
    async fn add_planogram(&self, path: &Path) -> anyhow::Result<Planogram> {
        let (file_name, file_path) = resolve_upload(path)?;
        let (uploaded_at, uploaded_at_text) = now_timestamp()?;
        let mut conn = self.state.conn().await?;

        let id: i64 = sqlx::query(
            "INSERT INTO planogram (file_name, file_path, uploaded_at) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&file_name)
        .bind(file_path.to_string_lossy().into_owned())
        .bind(&uploaded_at_text)
        .fetch_one(&mut *conn)
        .await?
        .try_get("id")?;

        info!(id, path = %file_path.display(), "planogram registered");
        Ok(Planogram {
            id,
            file_name,
            file_path,
            uploaded_at,
            _guard: (),
        })
    }

    async fn get_planogram(&self, id: i64) -> anyhow::Result<Option<Planogram>> {
        let mut conn = self.state.conn().await?;
        sqlx::query("SELECT id, file_name, file_path, uploaded_at FROM planogram WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(|row| planogram_from_row(&row))
            .transpose()
    }

    async fn get_planogram_path(&self, id: i64) -> anyhow::Result<Option<PathBuf>> {
        Ok(self.get_planogram(id).await?.map(|planogram| planogram.file_path))
    }

    async fn get_planograms(&self) -> anyhow::Result<Vec<Planogram>> {
        let mut conn = self.state.conn().await?;
        sqlx::query("SELECT id, file_name, file_path, uploaded_at FROM planogram ORDER BY id ASC")
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(planogram_from_row)
            .collect()
    }
}

impl ComparisonRepository for CatalogDb {
    async fn record_comparison(
        &self,
        planogram_id: i64,
        image_id: i64,
        result: &ComparisonResult,
    ) -> anyhow::Result<ComparisonRecord> {
        let id = Uuid::new_v4();
        let (created_at, created_at_text) = now_timestamp()?;
        let result_json = serde_json::to_string(result)?;
        let mut conn = self.state.conn().await?;

        sqlx::query(
            r#"INSERT INTO comparison
                (id, planogram_id, image_id, adherence_score, total_expected, total_matched, result_json, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(id.to_string())
        .bind(planogram_id)
        .bind(image_id)
        .bind(result.adherence_score)
        .bind(result.total_expected as i64)
        .bind(result.total_matched as i64)
        .bind(&result_json)
        .bind(&created_at_text)
        .execute(&mut *conn)
        .await?;

        info!(%id, planogram_id, image_id, score = result.adherence_score, "comparison recorded");
        Ok(ComparisonRecord {
            id,
            planogram_id,
            image_id,
            result: result.clone(),
            created_at,
            _guard: (),
        })
    }

    async fn get_comparison(&self, id: Uuid) -> anyhow::Result<Option<ComparisonRecord>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            r#"SELECT id, planogram_id, image_id, result_json, created_at
            FROM comparison WHERE id = $1"#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| comparison_from_row(&row))
        .transpose()
    }

    async fn get_comparisons(
        &self,
        planogram_id: i64,
        image_id: i64,
    ) -> anyhow::Result<Vec<ComparisonRecord>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            r#"SELECT id, planogram_id, image_id, result_json, created_at
            FROM comparison
            WHERE planogram_id = $1 AND image_id = $2
            ORDER BY rowid DESC"#,
        )
        .bind(planogram_id)
        .bind(image_id)
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(comparison_from_row)
        .collect()
    }
}
