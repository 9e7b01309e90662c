use std::fmt;

use thiserror::Error;

/// Where a single item sits in the enrichment state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichmentStage {
    Discovered,
    ContentFetched,
    Summarized,
    Titled,
    Illustrated,
    Persisted,
}

impl EnrichmentStage {
    /// Illustration is optional, so `Titled` may go straight to `Persisted`.
    pub fn can_advance_to(self, next: EnrichmentStage) -> bool {
        use EnrichmentStage::*;
        matches!(
            (self, next),
            (Discovered, ContentFetched)
                | (ContentFetched, Summarized)
                | (Summarized, Titled)
                | (Titled, Illustrated)
                | (Titled, Persisted)
                | (Illustrated, Persisted)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentStage::Discovered => "discovered",
            EnrichmentStage::ContentFetched => "content_fetched",
            EnrichmentStage::Summarized => "summarized",
            EnrichmentStage::Titled => "titled",
            EnrichmentStage::Illustrated => "illustrated",
            EnrichmentStage::Persisted => "persisted",
        }
    }
}

impl fmt::Display for EnrichmentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move from {from} to {to}")]
pub struct StageTransitionError {
    pub from: EnrichmentStage,
    pub to: EnrichmentStage,
}

/// Tracks one item's stage across attempts. A failed attempt restarts from
/// `Discovered`; nothing from the failed attempt is kept.
#[derive(Debug, Clone)]
pub struct EnrichmentProgress {
    stage: EnrichmentStage,
    attempts: u32,
}

impl Default for EnrichmentProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl EnrichmentProgress {
    pub fn new() -> Self {
        Self {
            stage: EnrichmentStage::Discovered,
            attempts: 1,
        }
    }

    pub fn stage(&self) -> EnrichmentStage {
        self.stage
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn advance(&mut self, to: EnrichmentStage) -> Result<(), StageTransitionError> {
        if !self.stage.can_advance_to(to) {
            return Err(StageTransitionError {
                from: self.stage,
                to,
            });
        }
        self.stage = to;
        Ok(())
    }

    pub fn restart(&mut self) {
        self.stage = EnrichmentStage::Discovered;
        self.attempts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illustration_is_optional() {
        let mut progress = EnrichmentProgress::new();
        progress.advance(EnrichmentStage::ContentFetched).unwrap();
        progress.advance(EnrichmentStage::Summarized).unwrap();
        progress.advance(EnrichmentStage::Titled).unwrap();
        progress.advance(EnrichmentStage::Persisted).unwrap();
        assert_eq!(progress.stage(), EnrichmentStage::Persisted);
    }

    #[test]
    fn stages_cannot_be_skipped() {
        let mut progress = EnrichmentProgress::new();
        let err = progress.advance(EnrichmentStage::Titled).unwrap_err();
        assert_eq!(err.from, EnrichmentStage::Discovered);
        assert_eq!(progress.stage(), EnrichmentStage::Discovered);
    }

    #[test]
    fn restart_discards_partial_progress() {
        let mut progress = EnrichmentProgress::new();
        progress.advance(EnrichmentStage::ContentFetched).unwrap();
        progress.restart();
        assert_eq!(progress.stage(), EnrichmentStage::Discovered);
        assert_eq!(progress.attempts(), 2);
    }
}
