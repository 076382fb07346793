use tracing::info;

use crate::batch::WriteBatch;
use crate::state::AppState;

/// Account-deletion handler. Removes the profile record, then unlinks the uid
/// from every co-owned pet; a pet left with no owners is deleted outright.
/// Errors propagate so the platform's at-least-once delivery retries the
/// whole event, which is safe: removing an absent uid and deleting an absent
/// pet are both no-ops.
pub async fn cleanup_user(state: &AppState, uid: &str) -> anyhow::Result<()> {
    state.users.delete_profile(uid).await?;

    let pets = state.pets.list_owned_by(uid).await?;
    let mut unlinked = 0usize;
    let mut deleted = 0usize;

    let mut batch = WriteBatch::new();
    for pet in pets {
        let remaining: Vec<String> = pet
            .owner_uids
            .iter()
            .filter(|o| o.as_str() != uid)
            .cloned()
            .collect();
        let pets_store = state.pets.clone();
        if remaining.is_empty() {
            deleted += 1;
            batch.push(async move { pets_store.delete(&pet.id).await });
        } else {
            unlinked += 1;
            batch.push(async move { pets_store.set_owners(&pet.id, remaining).await });
        }
    }
    batch.flush().await?;

    info!(uid, unlinked, deleted, "user cleanup finished");
    Ok(())
}
