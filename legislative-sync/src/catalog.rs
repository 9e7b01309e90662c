use interfaces::defs::ClassificationKind;
use interfaces::services::{CatalogEntry, LegislativeSource};
use tracing::info;

use crate::store::Store;
use crate::types::Result;

/// Upstream catalog entries that no curated classification row matches, so
/// items carrying them fall back to the default row.
pub async fn unmapped_codes(
    source: &dyn LegislativeSource,
    store: &dyn Store,
    kind: ClassificationKind,
) -> Result<Vec<CatalogEntry>> {
    let catalog = source.types_catalog(kind).await?;
    let total = catalog.len();

    let mut unmapped = Vec::new();
    for entry in catalog {
        if store.classification(kind, Some(&entry.code)).await?.is_default {
            unmapped.push(entry);
        }
    }

    info!("{} of {} upstream {} codes fall back to the default", unmapped.len(), total, kind);
    Ok(unmapped)
}
