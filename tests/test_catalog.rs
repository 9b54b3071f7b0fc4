//! Integration tests for the planogram/image catalog.
//!
//! Tests cover:
//! - Registering and listing images and planograms
//! - Path lookup by id, including unknown ids
//! - Recording and reading back comparison results

mod common;

use shelfcheck::compare;
use shelfcheck::core::db::{ComparisonRepository, ImageRepository, PlanogramRepository};

use common::*;

#[tokio::test]
async fn test_empty_catalog() -> anyhow::Result<()> {
    let (catalog, _dir) = create_test_catalog().await;

    assert!(catalog.get_images().await?.is_empty());
    assert!(catalog.get_planograms().await?.is_empty());
    assert!(catalog.get_image_path(1).await?.is_none());
    assert!(catalog.get_planogram_path(1).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_add_and_lookup_images() -> anyhow::Result<()> {
    let (catalog, _dir) = create_test_catalog().await;
    let first = create_test_image(10, 10);
    let second = create_test_image(20, 20);

    let a = catalog.add_image(first.path()).await?;
    let b = catalog.add_image(second.path()).await?;
    assert!(b.id > a.id);
    assert_eq!(
        a.filename,
        first.path().file_name().unwrap().to_string_lossy()
    );

    let path = catalog.get_image_path(a.id).await?.expect("image should exist");
    assert_eq!(path, first.path().canonicalize()?);

    let images = catalog.get_images().await?;
    let ids: Vec<i64> = images.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);

    Ok(())
}

#[tokio::test]
async fn test_add_and_lookup_planograms() -> anyhow::Result<()> {
    let (catalog, _dir) = create_test_catalog().await;
    let file = create_test_image(10, 10);

    let planogram = catalog.add_planogram(file.path()).await?;
    let fetched = catalog
        .get_planogram(planogram.id)
        .await?
        .expect("planogram should exist");

    assert_eq!(fetched.file_path, planogram.file_path);
    assert_eq!(fetched.file_name, planogram.file_name);
    assert_eq!(catalog.get_planograms().await?.len(), 1);
    // Planogram and image ids are independent
    assert!(catalog.get_image(planogram.id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_missing_file_is_rejected() -> anyhow::Result<()> {
    let (catalog, dir) = create_test_catalog().await;

    let result = catalog.add_image(&dir.path().join("absent.png")).await;
    assert!(result.is_err());
    assert!(catalog.get_images().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_record_and_read_comparisons() -> anyhow::Result<()> {
    let (catalog, _dir) = create_test_catalog().await;
    let planogram_file = create_test_image(10, 10);
    let image_file = create_test_image(10, 10);
    let planogram = catalog.add_planogram(planogram_file.path()).await?;
    let image = catalog.add_image(image_file.path()).await?;

    let first = compare(&multiset(&[("soda", 3), ("chips", 2)]), &multiset(&[("soda", 1)]));
    let second = compare(&multiset(&[("soda", 2)]), &multiset(&[("soda", 2), ("juice", 1)]));

    let older = catalog.record_comparison(planogram.id, image.id, &first).await?;
    let newer = catalog.record_comparison(planogram.id, image.id, &second).await?;

    let history = catalog.get_comparisons(planogram.id, image.id).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, newer.id);
    assert_eq!(history[1].id, older.id);
    assert_eq!(history[1].result, first);

    let fetched = catalog
        .get_comparison(newer.id)
        .await?
        .expect("comparison should exist");
    assert_eq!(fetched.result.extra_items.get("juice"), Some(&1));
    assert_eq!(fetched.planogram_id, planogram.id);

    assert!(catalog.get_comparison(uuid::Uuid::new_v4()).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_comparison_requires_known_ids() -> anyhow::Result<()> {
    let (catalog, _dir) = create_test_catalog().await;
    let result = compare(&multiset(&[("soda", 1)]), &multiset(&[]));

    let outcome = catalog.record_comparison(41, 42, &result).await;

    assert!(outcome.is_err(), "Should fail without matching catalog rows");
    let error_msg = outcome.unwrap_err().to_string();
    assert!(
        error_msg.contains("FOREIGN KEY") || error_msg.contains("foreign key"),
        "Error should mention foreign key constraint, got: {}",
        error_msg
    );

    Ok(())
}

#[tokio::test]
async fn test_catalog_persists_across_reopen() -> anyhow::Result<()> {
    let (catalog, dir) = create_test_catalog().await;
    let file = create_test_image(10, 10);
    let image = catalog.add_image(file.path()).await?;
    catalog.close().await?;

    let reopened = shelfcheck::core::db::CatalogDb::open(dir.path().join("catalog.db")).await?;
    let path = reopened.get_image_path(image.id).await?;
    assert_eq!(path, Some(image.file_path));

    Ok(())
}
