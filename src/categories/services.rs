use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::slug::{normalize_category_names, CategoryInput};
use crate::store::{repo_types::Category, CredentialStore, StoreResult};

/// Replaces the user's categories with `names`. An empty list clears them.
#[instrument(skip(store, names))]
pub async fn sync_user_categories(
    store: &dyn CredentialStore,
    user_id: Uuid,
    names: CategoryInput,
) -> StoreResult<Vec<Category>> {
    let normalized = normalize_category_names(names);
    if normalized.is_empty() {
        store.clear_user_categories(user_id).await?;
        debug!("user categories cleared");
        return Ok(Vec::new());
    }
    let linked = store.replace_user_categories(user_id, &normalized).await?;
    debug!(count = linked.len(), "user categories replaced");
    Ok(linked)
}

pub async fn fetch_user_categories(
    store: &dyn CredentialStore,
    user_id: Uuid,
) -> StoreResult<Vec<Category>> {
    store.user_categories(user_id).await
}

/// Display variant of [`fetch_user_categories`]: a failure yields an empty list.
pub async fn fetch_user_categories_or_empty(
    store: &dyn CredentialStore,
    user_id: Uuid,
) -> Vec<Category> {
    match fetch_user_categories(store, user_id).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, %user_id, "category fetch failed; showing none");
            Vec::new()
        }
    }
}
