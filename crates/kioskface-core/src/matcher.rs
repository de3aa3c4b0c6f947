//! Nearest-identity search with recency weighting and confidence tiers.

use crate::config::KioskConfig;
use crate::embedding::NormalizedEmbedding;
use crate::store::{DescriptorStore, MemberDescriptor};
use serde::Serialize;
use std::sync::Arc;

/// How far a match can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    /// Safe to check the member in without asking.
    High,
    /// Plausible; a human should confirm.
    Low,
    /// No identity within acceptable distance.
    None,
}

/// Distance cut-offs and the per-step recency discount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    pub high_confidence: f32,
    pub low_confidence: f32,
    pub recency_bonus: f32,
}

impl MatchThresholds {
    /// Tier for an adjusted distance. Acceptance is exclusive at both
    /// boundaries: exactly `low_confidence` is rejected, exactly
    /// `high_confidence` is only `Low`.
    pub fn classify(&self, adjusted_distance: f32) -> ConfidenceTier {
        if !(adjusted_distance < self.low_confidence) {
            ConfidenceTier::None
        } else if adjusted_distance < self.high_confidence {
            ConfidenceTier::High
        } else {
            ConfidenceTier::Low
        }
    }
}

impl From<&KioskConfig> for MatchThresholds {
    fn from(config: &KioskConfig) -> Self {
        Self {
            high_confidence: config.high_confidence_threshold,
            low_confidence: config.low_confidence_threshold,
            recency_bonus: config.recency_bonus,
        }
    }
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self::from(&KioskConfig::default())
    }
}

/// Verdict for one query embedding.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    /// Set only when `tier` is `High` or `Low`.
    pub identity: Option<Arc<MemberDescriptor>>,
    /// Best raw distance minus its recency discount; infinite when nothing
    /// comparable was found.
    pub adjusted_distance: f32,
    pub raw_distance: f32,
    /// Position of the winning sample within the member's embeddings.
    pub embedding_index: Option<usize>,
    pub tier: ConfidenceTier,
    /// Stored embeddings skipped because their length differs from the query.
    pub dimension_mismatches: usize,
    pub store_generation: u64,
}

impl MatchOutcome {
    /// Outcome for a query that was never compared against anything.
    pub fn no_match(store_generation: u64) -> Self {
        Self {
            identity: None,
            adjusted_distance: f32::INFINITY,
            raw_distance: f32::INFINITY,
            embedding_index: None,
            tier: ConfidenceTier::None,
            dimension_mismatches: 0,
            store_generation,
        }
    }

    pub fn is_match(&self) -> bool {
        self.tier != ConfidenceTier::None
    }
}

/// Strategy for resolving a query embedding against the descriptor store.
pub trait Matcher {
    fn find_best_match(&self, query: &NormalizedEmbedding, store: &DescriptorStore) -> MatchOutcome;
}

/// Exhaustive Euclidean nearest-neighbour search.
///
/// Visits every embedding of every member. Rosters are small (hundreds of
/// identities, a handful of samples each) and queries run a few times per
/// second, so no index is kept. The i-th sample of a member (oldest first)
/// has `i * recency_bonus` subtracted from its distance; ties on adjusted
/// distance keep the first one seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecencyWeightedMatcher {
    thresholds: MatchThresholds,
}

struct Candidate {
    member: usize,
    embedding: usize,
    adjusted: f32,
    raw: f32,
}

impl RecencyWeightedMatcher {
    pub fn new(thresholds: MatchThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &MatchThresholds {
        &self.thresholds
    }
}

impl Matcher for RecencyWeightedMatcher {
    fn find_best_match(&self, query: &NormalizedEmbedding, store: &DescriptorStore) -> MatchOutcome {
        if store.is_empty() || query.is_null() {
            return MatchOutcome::no_match(store.generation());
        }

        let mut best: Option<Candidate> = None;
        let mut dimension_mismatches = 0usize;

        for (m, member) in store.members().iter().enumerate() {
            for (e, stored) in member.embeddings.iter().enumerate() {
                let raw = query.distance(stored);
                if raw.is_infinite() {
                    dimension_mismatches += 1;
                    continue;
                }

                let adjusted = raw - e as f32 * self.thresholds.recency_bonus;
                if best.as_ref().map_or(true, |b| adjusted < b.adjusted) {
                    best = Some(Candidate {
                        member: m,
                        embedding: e,
                        adjusted,
                        raw,
                    });
                }
            }
        }

        if dimension_mismatches > 0 {
            tracing::warn!(
                query_dim = query.dimension(),
                skipped = dimension_mismatches,
                generation = store.generation(),
                "embedding dimension mismatch; affected members need re-enrollment"
            );
        }

        let Some(best) = best else {
            return MatchOutcome {
                dimension_mismatches,
                ..MatchOutcome::no_match(store.generation())
            };
        };

        let tier = self.thresholds.classify(best.adjusted);
        let member = &store.members()[best.member];

        tracing::debug!(
            identity = %member.identity_id,
            adjusted = best.adjusted,
            raw = best.raw,
            ?tier,
            "best match"
        );

        let accepted = tier != ConfidenceTier::None;
        MatchOutcome {
            identity: accepted.then(|| Arc::clone(member)),
            adjusted_distance: best.adjusted,
            raw_distance: best.raw,
            embedding_index: accepted.then_some(best.embedding),
            tier,
            dimension_mismatches,
            store_generation: store.generation(),
        }
    }
}
