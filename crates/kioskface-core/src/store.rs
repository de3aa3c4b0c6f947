//! In-memory descriptor store for one kiosk session.
//!
//! The store is built once from the member roster and then only read. A
//! roster refresh builds a new store and swaps it in through
//! [`StoreHandle`]; readers holding a snapshot keep the generation they
//! started with.

use crate::embedding::NormalizedEmbedding;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// One roster row as supplied by the member directory API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub identity_id: String,
    pub display_name: String,
    /// Raw embeddings, oldest enrollment first.
    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// A known identity with at least one usable embedding.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDescriptor {
    pub identity_id: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    /// Index 0 is the oldest sample, the last index the most recent.
    #[serde(skip)]
    pub embeddings: Vec<NormalizedEmbedding>,
}

impl MemberDescriptor {
    /// Normalize the entry's embeddings, dropping null ones. Returns `None`
    /// when nothing usable is left.
    fn from_roster(entry: RosterEntry) -> Option<Self> {
        let embeddings: Vec<NormalizedEmbedding> = entry
            .embeddings
            .iter()
            .map(|raw| NormalizedEmbedding::from_raw(raw))
            .filter(|e| !e.is_null())
            .collect();

        if embeddings.is_empty() {
            return None;
        }

        Some(Self {
            identity_id: entry.identity_id,
            display_name: entry.display_name,
            photo_url: entry.photo_url,
            embeddings,
        })
    }
}

/// Immutable set of matchable identities for one roster generation.
#[derive(Debug, Default)]
pub struct DescriptorStore {
    generation: u64,
    members: Vec<Arc<MemberDescriptor>>,
    by_id: HashMap<String, usize>,
}

impl DescriptorStore {
    /// Build a store from roster rows.
    ///
    /// Null embeddings are filtered out and members left with none are
    /// excluded. A repeated `identity_id` replaces the earlier row.
    pub fn load(roster: impl IntoIterator<Item = RosterEntry>) -> Self {
        let mut members: Vec<Arc<MemberDescriptor>> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();
        let mut excluded = 0usize;

        for entry in roster {
            let identity_id = entry.identity_id.clone();
            let Some(member) = MemberDescriptor::from_roster(entry) else {
                tracing::debug!(identity = %identity_id, "member has no usable embeddings, excluded");
                excluded += 1;
                continue;
            };

            match by_id.get(&identity_id) {
                Some(&idx) => {
                    tracing::debug!(identity = %identity_id, "duplicate roster entry replaces earlier one");
                    members[idx] = Arc::new(member);
                }
                None => {
                    by_id.insert(identity_id, members.len());
                    members.push(Arc::new(member));
                }
            }
        }

        let store = Self {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            members,
            by_id,
        };

        let dimensions = store.dimensions();
        if dimensions.len() > 1 {
            tracing::warn!(
                ?dimensions,
                "roster mixes embedding dimensions; mismatched samples will never match"
            );
        }

        tracing::info!(
            generation = store.generation,
            count = store.len(),
            excluded,
            "descriptor store loaded"
        );

        store
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of matchable identities.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Arc<MemberDescriptor>] {
        &self.members
    }

    pub fn get(&self, identity_id: &str) -> Option<&Arc<MemberDescriptor>> {
        self.by_id.get(identity_id).map(|&idx| &self.members[idx])
    }

    /// Distinct embedding lengths present in the store.
    pub fn dimensions(&self) -> BTreeSet<usize> {
        self.members
            .iter()
            .flat_map(|m| m.embeddings.iter().map(NormalizedEmbedding::dimension))
            .collect()
    }
}

/// Shared, swappable reference to the current [`DescriptorStore`].
///
/// Cloning the handle shares the same slot. [`snapshot`](Self::snapshot)
/// hands out the store current at call time; a later [`replace`](Self::replace)
/// never alters a snapshot already taken.
#[derive(Debug, Clone, Default)]
pub struct StoreHandle {
    current: Arc<RwLock<Arc<DescriptorStore>>>,
}

impl StoreHandle {
    pub fn new(store: DescriptorStore) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(store))),
        }
    }

    pub fn snapshot(&self) -> Arc<DescriptorStore> {
        Arc::clone(&self.current.read())
    }

    /// Swap in a new store, returning the one it replaced.
    pub fn replace(&self, store: DescriptorStore) -> Arc<DescriptorStore> {
        let next = Arc::new(store);
        std::mem::replace(&mut *self.current.write(), next)
    }

    /// Build a store from `roster` and swap it in.
    pub fn reload(&self, roster: impl IntoIterator<Item = RosterEntry>) -> Arc<DescriptorStore> {
        let next = Arc::new(DescriptorStore::load(roster));
        *self.current.write() = Arc::clone(&next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, embeddings: Vec<Vec<f32>>) -> RosterEntry {
        RosterEntry {
            identity_id: id.into(),
            display_name: format!("Member {id}"),
            embeddings,
            photo_url: None,
        }
    }

    #[test]
    fn test_load_normalizes_embeddings() {
        let store = DescriptorStore::load(vec![entry("a", vec![vec![3.0, 4.0]])]);
        let member = store.get("a").unwrap();
        assert_eq!(member.embeddings.len(), 1);
        assert!((member.embeddings[0].values()[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_load_filters_null_embeddings() {
        let store = DescriptorStore::load(vec![entry(
            "a",
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![], vec![0.0, 2.0]],
        )]);
        let member = store.get("a").unwrap();
        assert_eq!(member.embeddings.len(), 2);
        assert_eq!(member.embeddings[0].values(), &[1.0, 0.0]);
        assert_eq!(member.embeddings[1].values(), &[0.0, 1.0]);
    }

    #[test]
    fn test_load_excludes_members_without_usable_embeddings() {
        let store = DescriptorStore::load(vec![
            entry("empty", vec![]),
            entry("zeros", vec![vec![0.0, 0.0, 0.0]]),
            entry("ok", vec![vec![1.0, 1.0, 0.0]]),
        ]);
        assert_eq!(store.len(), 1);
        assert!(store.get("empty").is_none());
        assert!(store.get("zeros").is_none());
        assert!(store.get("ok").is_some());
    }

    #[test]
    fn test_duplicate_identity_replaced() {
        let store = DescriptorStore::load(vec![
            entry("a", vec![vec![1.0, 0.0]]),
            entry("a", vec![vec![0.0, 1.0], vec![1.0, 1.0]]),
        ]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().embeddings.len(), 2);
    }

    #[test]
    fn test_dimensions_reports_mixed_lengths() {
        let store = DescriptorStore::load(vec![
            entry("a", vec![vec![1.0, 0.0]]),
            entry("b", vec![vec![1.0, 0.0, 0.0]]),
        ]);
        assert_eq!(store.dimensions().into_iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_generations_increase() {
        let first = DescriptorStore::load(Vec::new());
        let second = DescriptorStore::load(Vec::new());
        assert!(second.generation() > first.generation());
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let handle = StoreHandle::new(DescriptorStore::load(vec![entry("old", vec![vec![1.0]])]));
        let before = handle.snapshot();

        let previous = handle.replace(DescriptorStore::load(vec![entry("new", vec![vec![1.0]])]));
        let after = handle.snapshot();

        assert_eq!(previous.generation(), before.generation());
        assert_ne!(before.generation(), after.generation());
        assert!(before.get("old").is_some());
        assert!(before.get("new").is_none());
        assert!(after.get("new").is_some());
        assert!(after.get("old").is_none());
    }

    #[test]
    fn test_cloned_handles_share_slot() {
        let handle = StoreHandle::default();
        let other = handle.clone();
        assert!(handle.snapshot().is_empty());

        let reloaded = other.reload(vec![entry("a", vec![vec![0.5, 0.5]])]);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(handle.snapshot().generation(), reloaded.generation());
    }

    #[test]
    fn test_roster_json_camel_case() {
        let json = r#"[{"identityId":"m1","displayName":"Ada","embeddings":[[1,2,3]],"photoUrl":"https://x/y.jpg"}]"#;
        let roster: Vec<RosterEntry> = serde_json::from_str(json).unwrap();
        let store = DescriptorStore::load(roster);
        let member = store.get("m1").unwrap();
        assert_eq!(member.display_name, "Ada");
        assert_eq!(member.photo_url.as_deref(), Some("https://x/y.jpg"));
    }
}
