use std::collections::{BTreeSet, HashSet};

use tracing::info;

use crate::batch::WriteBatch;
use crate::state::AppState;

const FRONT_IMAGE_SUFFIX: &str = "/front.jpg";

/// Folder ids under `prefix` whose front image no food record references.
/// `prefix` must end with '/'.
pub fn orphan_folders(
    prefix: &str,
    referenced: &HashSet<String>,
    keys: &[String],
) -> Vec<String> {
    let mut orphans = BTreeSet::new();
    for key in keys {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        let Some(folder) = rest.strip_suffix(FRONT_IMAGE_SUFFIX) else {
            continue;
        };
        if folder.is_empty() || referenced.contains(key) {
            continue;
        }
        orphans.insert(folder.to_string());
    }
    orphans.into_iter().collect()
}

/// Weekly reconciliation of scan image folders against food records. Orphans
/// lose their storage objects and their scan record. There is no progress
/// tracking: a partial run just leaves orphans for the next invocation to
/// recompute from scratch.
pub async fn run(state: &AppState) -> anyhow::Result<()> {
    let prefix = format!("{}/", state.config.scan_prefix);

    let referenced: HashSet<String> = state
        .foods
        .front_image_paths()
        .await?
        .into_iter()
        .collect();
    let keys = state.storage.list_keys(&prefix).await?;
    let orphans = orphan_folders(&prefix, &referenced, &keys);

    if orphans.is_empty() {
        info!("no orphan scan folders");
        return Ok(());
    }
    info!(count = orphans.len(), "removing orphan scan folders");

    let mut batch = WriteBatch::new();
    for id in orphans {
        let storage = state.storage.clone();
        let scans = state.scans.clone();
        let folder = format!("{prefix}{id}/");
        batch.push(async move {
            storage.delete_prefix(&folder).await?;
            scans.delete(&id).await
        });
    }
    batch.flush().await?;
    Ok(())
}

#[cfg(test)]
mod cleanup_tests {
    use super::*;
    use crate::foods::repo::{FoodStore, FoodUpsert};
    use crate::scans::repo::ScanStatus;
    use crate::testing::{scan, TestEnv};
    use crate::vision::GuaranteedAnalysis;

    fn food(barcode: &str, front_image: &str) -> FoodUpsert {
        FoodUpsert {
            barcode: barcode.into(),
            product_name: "Salmon Feast".into(),
            brand_name: "Acme".into(),
            guaranteed_analysis: GuaranteedAnalysis {
                crude_protein: 30.0,
                crude_fat: 12.0,
                calcium: 1.0,
                moisture: 10.0,
            },
            calories_per_100g: 400.0,
            missing: vec![],
            front_image: front_image.into(),
        }
    }

    #[test]
    fn only_unreferenced_front_images_mark_orphans() {
        let referenced: HashSet<String> =
            ["package-scans/x1/front.jpg".to_string()].into_iter().collect();
        let keys = vec![
            "package-scans/x1/front.jpg".to_string(),
            "package-scans/x1/back.jpg".to_string(),
            "package-scans/x2/front.jpg".to_string(),
            "package-scans/x2/back.jpg".to_string(),
            "package-scans/x3/notes.txt".to_string(),
            "other-prefix/x4/front.jpg".to_string(),
        ];
        let orphans = orphan_folders("package-scans/", &referenced, &keys);
        // x3 never had a front image and other-prefix is out of scope.
        assert_eq!(orphans, vec!["x2"]);
    }

    #[tokio::test]
    async fn removes_orphan_objects_and_records_leaves_referenced_alone() {
        let env = TestEnv::new();
        env.foods
            .upsert(food("111", "package-scans/x1/front.jpg"))
            .await
            .unwrap();
        env.storage.put("package-scans/x1/front.jpg");
        env.storage.put("package-scans/x2/front.jpg");
        env.storage.put("package-scans/x2/back.jpg");
        env.scans
            .insert(scan("x1", Some("f"), Some("b"), "111"));
        env.scans
            .insert(scan("x2", Some("f"), Some("b"), "222"));

        run(&env.state()).await.expect("run");

        assert!(env.storage.contains("package-scans/x1/front.jpg"));
        assert!(!env.storage.contains("package-scans/x2/front.jpg"));
        assert!(!env.storage.contains("package-scans/x2/back.jpg"));
        assert!(env.scans.get_sync("x1").is_some());
        assert!(env.scans.get_sync("x2").is_none());
    }

    #[tokio::test]
    async fn missing_scan_record_is_tolerated() {
        let env = TestEnv::new();
        env.storage.put("package-scans/x9/front.jpg");

        run(&env.state()).await.expect("run");

        assert!(!env.storage.contains("package-scans/x9/front.jpg"));
    }

    #[tokio::test]
    async fn second_run_finds_nothing_left() {
        let env = TestEnv::new();
        env.storage.put("package-scans/x2/front.jpg");
        env.scans.insert(scan("x2", Some("f"), Some("b"), "222"));
        let state = env.state();

        run(&state).await.expect("first run");
        run(&state).await.expect("second run");

        assert!(env.scans.get_sync("x2").is_none());
        assert_eq!(env.storage.objects.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn scan_status_does_not_shield_an_orphan() {
        let env = TestEnv::new();
        env.storage.put("package-scans/x5/front.jpg");
        let mut record = scan("x5", Some("f"), Some("b"), "555");
        record.status = ScanStatus::Done;
        env.scans.insert(record);

        run(&env.state()).await.expect("run");
        assert!(env.scans.get_sync("x5").is_none());
    }
}
