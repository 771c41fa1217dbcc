//! Parse + normalize for a whole batch.

use driftlog_core::{CanonicalEvent, RawRecord};

use crate::normalizer::Normalizer;
use crate::parser::ParserRegistry;

pub struct Preprocessor {
    registry: ParserRegistry,
    normalizer: Normalizer,
}

impl Preprocessor {
    pub fn new(registry: ParserRegistry) -> Self {
        Self {
            registry,
            normalizer: Normalizer::new(),
        }
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// One canonical event per raw record, in input order.
    pub fn run(&self, records: &[RawRecord]) -> Vec<CanonicalEvent> {
        records
            .iter()
            .map(|r| self.normalizer.normalize(self.registry.parse(r)))
            .collect()
    }
}
