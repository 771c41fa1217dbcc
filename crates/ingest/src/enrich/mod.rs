//! Entity enrichment: upgrade missing or placeholder identity and network
//! fields from the free-text message.
//!
//! Sub-modules:
//! - [`username`]: blacklist filtering plus the auth-log fallback
//! - [`select`]: host and process preference rules
//! - [`network`]: labeled then positional source/destination assignment

pub mod network;
pub mod select;
pub mod username;

use tracing::debug;

use driftlog_core::{CanonicalEvent, UNKNOWN_USER};

use crate::patterns;

#[derive(Debug, Clone, Copy, Default)]
pub struct EntityEnricher;

impl EntityEnricher {
    pub fn new() -> Self {
        Self
    }

    /// Enrich one event. Events with an empty message only get their presence
    /// flags recomputed.
    pub fn enrich(&self, mut event: CanonicalEvent) -> CanonicalEvent {
        if !event.message.is_empty() {
            let found = patterns::extract(&event.message);

            if event.user == UNKNOWN_USER {
                if let Some(user) =
                    username::choose(&found.users).or_else(|| username::fallback(&event.message))
                {
                    event.user = user;
                }
            }

            if select::needs_upgrade(&event.host) {
                if let Some(host) = select::choose_host(&found.hosts) {
                    event.host = host;
                }
            }

            if select::needs_upgrade(&event.process) {
                if let Some(process) = select::choose_process(&found.processes) {
                    event.process = process;
                }
            }

            let (src, dst) = network::src_dst(&event.message, &found.ips);
            if event.src_ip.is_none() {
                event.src_ip = src;
            }
            if event.dest_ip.is_none() {
                event.dest_ip = dst;
            }
        }

        event.refresh_flags();
        event
    }

    pub fn enrich_batch(&self, events: Vec<CanonicalEvent>) -> Vec<CanonicalEvent> {
        let enriched: Vec<_> = events.into_iter().map(|e| self.enrich(e)).collect();
        debug!(events = enriched.len(), "entity enrichment complete");
        enriched
    }
}
