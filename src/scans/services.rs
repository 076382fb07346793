use tracing::{error, info, warn};

use crate::foods::repo::FoodUpsert;
use crate::scans::repo::{PackageScan, ScanStatus};
use crate::state::AppState;
use crate::vision::LabelExtraction;

pub const MISSING_PATHS_MESSAGE: &str = "Missing image paths";
const FALLBACK_MESSAGE: &str = "label extraction failed";

/// Runs the full scan pipeline for a newly created scan record. Every failure
/// past the precondition check is caught here and recorded on the record as
/// `status = error`; the platform never sees it, so nothing is retried.
pub async fn process_scan(state: &AppState, scan_id: &str) -> anyhow::Result<()> {
    let Some(scan) = state.scans.get(scan_id).await? else {
        warn!(scan_id, "scan record not found, nothing to process");
        return Ok(());
    };

    let front = scan.front_path.as_deref().filter(|p| !p.is_empty());
    let back = scan.back_path.as_deref().filter(|p| !p.is_empty());
    let (front, back) = match (front, back) {
        (Some(f), Some(b)) => (f.to_string(), b.to_string()),
        _ => {
            error!(scan_id, "missing image paths");
            state
                .scans
                .set_status(scan_id, ScanStatus::Error, Some(MISSING_PATHS_MESSAGE))
                .await?;
            return Ok(());
        }
    };

    info!(scan_id, barcode = %scan.barcode, "new package scan");
    state
        .scans
        .set_status(scan_id, ScanStatus::Processing, None)
        .await?;

    match extract_and_store(state, &scan, &front, &back).await {
        Ok(()) => {
            state
                .scans
                .set_status(scan_id, ScanStatus::Done, None)
                .await?;
        }
        Err(err) => {
            error!(scan_id, error = %err, "scan processing failed");
            let mut message = err.to_string();
            if message.is_empty() {
                message = FALLBACK_MESSAGE.to_string();
            }
            state
                .scans
                .set_status(scan_id, ScanStatus::Error, Some(&message))
                .await?;
        }
    }
    Ok(())
}

async fn extract_and_store(
    state: &AppState,
    scan: &PackageScan,
    front: &str,
    back: &str,
) -> anyhow::Result<()> {
    let bucket = &state.config.storage.bucket;
    let front_uri = format!("gs://{bucket}/{front}");
    let back_uri = format!("gs://{bucket}/{back}");

    let raw = state.vision.extract_label(&front_uri, &back_uri).await?;
    let parsed = LabelExtraction::parse(&raw)?;
    info!(
        scan_id = %scan.id,
        product = %parsed.product_name,
        brand = %parsed.brand_name,
        "label extracted"
    );

    // Stored exactly as the model reported it; calorie normalization is the
    // prompt's job, not ours.
    state
        .foods
        .upsert(FoodUpsert {
            barcode: scan.barcode.clone(),
            product_name: parsed.product_name,
            brand_name: parsed.brand_name,
            guaranteed_analysis: parsed.guaranteed_analysis,
            calories_per_100g: parsed.calories,
            missing: parsed.missing,
            front_image: front.to_string(),
        })
        .await?;

    // The back photo is transient; losing this delete is not worth failing
    // the whole scan over.
    if let Err(err) = state.storage.delete_object(back).await {
        warn!(key = back, error = %err, "could not delete back image");
    }
    Ok(())
}

#[cfg(test)]
mod scan_tests {
    use super::*;
    use crate::testing::{scan, TestEnv};

    const GOOD_RESPONSE: &str = r#"{"productName":"Salmon Feast","brandName":"Acme",
        "guaranteedAnalysis":{"Crude Protein":32.5,"Crude Fat":14.0,"Calcium":1.2,"Moisture":10.0},
        "Calories":398.6,"missing":["Calcium"]}"#;

    #[tokio::test]
    async fn missing_path_settles_as_error_without_inference() {
        let env = TestEnv::new();
        env.scans.insert(scan("s1", Some("package-scans/s1/front.jpg"), None, "123"));

        process_scan(&env.state(), "s1").await.expect("process");

        let record = env.scans.get_sync("s1").unwrap();
        assert_eq!(record.status, ScanStatus::Error);
        assert_eq!(record.message.as_deref(), Some(MISSING_PATHS_MESSAGE));
        assert_eq!(env.vision.call_count(), 0);
        assert!(env.foods.get_sync("123").is_none());
    }

    #[tokio::test]
    async fn empty_path_counts_as_missing() {
        let env = TestEnv::new();
        env.scans.insert(scan("s1", Some(""), Some("package-scans/s1/back.jpg"), "123"));

        process_scan(&env.state(), "s1").await.expect("process");

        let record = env.scans.get_sync("s1").unwrap();
        assert_eq!(record.status, ScanStatus::Error);
        assert_eq!(env.vision.call_count(), 0);
    }

    #[tokio::test]
    async fn successful_scan_upserts_food_and_cleans_up() {
        let env = TestEnv::new();
        env.scans.insert(scan(
            "s1",
            Some("package-scans/s1/front.jpg"),
            Some("package-scans/s1/back.jpg"),
            "0123456789",
        ));
        env.storage.put("package-scans/s1/front.jpg");
        env.storage.put("package-scans/s1/back.jpg");
        env.vision.respond_with(GOOD_RESPONSE);

        process_scan(&env.state(), "s1").await.expect("process");

        let food = env.foods.get_sync("0123456789").expect("food upserted");
        assert_eq!(food.product_name, "Salmon Feast");
        assert_eq!(food.brand_name, "Acme");
        assert_eq!(food.guaranteed_analysis.crude_protein, 32.5);
        assert_eq!(food.guaranteed_analysis.crude_fat, 14.0);
        assert_eq!(food.guaranteed_analysis.calcium, 1.2);
        assert_eq!(food.guaranteed_analysis.moisture, 10.0);
        // Whatever the model answered is what gets stored.
        assert_eq!(food.calories_per_100g, 398.6);
        assert_eq!(food.missing, vec!["Calcium"]);
        assert_eq!(food.front_image, "package-scans/s1/front.jpg");

        assert!(!env.storage.contains("package-scans/s1/back.jpg"));
        assert!(env.storage.contains("package-scans/s1/front.jpg"));
        assert_eq!(env.scans.get_sync("s1").unwrap().status, ScanStatus::Done);
    }

    #[tokio::test]
    async fn inference_failure_is_recorded_not_propagated() {
        let env = TestEnv::new();
        env.scans.insert(scan(
            "s1",
            Some("package-scans/s1/front.jpg"),
            Some("package-scans/s1/back.jpg"),
            "123",
        ));
        env.vision.fail_with("model timed out");

        process_scan(&env.state(), "s1").await.expect("process");

        let record = env.scans.get_sync("s1").unwrap();
        assert_eq!(record.status, ScanStatus::Error);
        assert_eq!(record.message.as_deref(), Some("model timed out"));
        assert!(env.foods.get_sync("123").is_none());
    }

    #[tokio::test]
    async fn non_json_response_is_recorded_as_error() {
        let env = TestEnv::new();
        env.scans.insert(scan(
            "s1",
            Some("package-scans/s1/front.jpg"),
            Some("package-scans/s1/back.jpg"),
            "123",
        ));
        env.vision.respond_with("Sure! Here is the analysis you asked for:");

        process_scan(&env.state(), "s1").await.expect("process");

        let record = env.scans.get_sync("s1").unwrap();
        assert_eq!(record.status, ScanStatus::Error);
        assert!(record.message.is_some());
    }

    #[tokio::test]
    async fn back_image_delete_failure_is_not_fatal() {
        let env = TestEnv::new();
        env.scans.insert(scan(
            "s1",
            Some("package-scans/s1/front.jpg"),
            Some("package-scans/s1/back.jpg"),
            "123",
        ));
        env.vision.respond_with(GOOD_RESPONSE);
        env.storage
            .fail_deletes
            .store(true, std::sync::atomic::Ordering::SeqCst);

        process_scan(&env.state(), "s1").await.expect("process");

        assert_eq!(env.scans.get_sync("s1").unwrap().status, ScanStatus::Done);
        assert!(env.foods.get_sync("123").is_some());
    }

    #[tokio::test]
    async fn unknown_scan_id_is_a_no_op() {
        let env = TestEnv::new();
        process_scan(&env.state(), "ghost").await.expect("process");
        assert_eq!(env.vision.call_count(), 0);
    }
}
