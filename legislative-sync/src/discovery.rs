use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use interfaces::defs::ItemKind;
use interfaces::services::LegislativeSource;
use interfaces::Code;
use tracing::{debug, info, warn};

use crate::store::Store;
use crate::types::Result;

/// Pages through the upstream listing of recent items.
pub struct CodeDiscovery {
    source: Arc<dyn LegislativeSource>,
    page_size: u32,
}

impl CodeDiscovery {
    pub fn new(source: Arc<dyn LegislativeSource>, page_size: u32) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
        }
    }

    /// Codes of every `kind` item dated on or after `since`, in listing
    /// order and without repeats. Stops at the first short page.
    pub async fn list_recent_codes(&self, kind: ItemKind, since: NaiveDate) -> Result<Vec<Code>> {
        let mut seen = HashSet::new();
        let mut codes = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.source.list_recent(kind, since, page, self.page_size).await?;
            let full_page = batch.len() >= self.page_size as usize;

            let before = codes.len();
            for code in batch {
                if seen.insert(code.clone()) {
                    codes.push(code);
                }
            }

            if !full_page {
                break;
            }
            if codes.len() == before {
                warn!("Page {} of {} listing repeated earlier codes, stopping", page, kind);
                break;
            }
            debug!("Page {} of {} listing was full, fetching the next one", page, kind);
            page += 1;
        }

        info!("Discovered {} {} codes since {}", codes.len(), kind, since);
        Ok(codes)
    }
}

/// `discovered` minus `registered`, deduplicated, in discovery order.
pub fn diff(discovered: &[Code], registered: &HashSet<Code>) -> Vec<Code> {
    let mut seen = HashSet::with_capacity(discovered.len());
    discovered
        .iter()
        .filter(|code| !registered.contains(*code) && seen.insert(*code))
        .cloned()
        .collect()
}

/// Decides which discovered codes still need to be registered.
pub struct ReconciliationEngine {
    store: Arc<dyn Store>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn new_codes(&self, kind: ItemKind, discovered: &[Code]) -> Result<Vec<Code>> {
        if discovered.is_empty() {
            return Ok(Vec::new());
        }
        let registered = self.store.registered_codes(kind, discovered).await?;
        let new = diff(discovered, &registered);
        info!(
            "{} {} codes discovered, {} already registered, {} new",
            discovered.len(),
            kind,
            registered.len(),
            new.len()
        );
        Ok(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(raw: &[i64]) -> Vec<Code> {
        raw.iter().copied().map(Code::from).collect()
    }

    #[test]
    fn diff_keeps_first_occurrence_order() {
        let registered: HashSet<Code> = codes(&[2]).into_iter().collect();
        assert_eq!(diff(&codes(&[3, 1, 2, 3, 1]), &registered), codes(&[3, 1]));
    }

    #[test]
    fn diff_of_nothing_is_empty() {
        assert!(diff(&[], &HashSet::new()).is_empty());
    }
}
