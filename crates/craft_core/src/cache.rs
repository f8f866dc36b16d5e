//! Per-turn inventory snapshot so repeated requirement queries within one
//! turn do not rescan the pool.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::pool::{ComponentFilter, PooledItem, ResourcePool, SourceScope, Stock};
use crate::ItemTypeId;

/// Snapshot validity: any change of turn, position, or remaining moves
/// forces a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub turn: u64,
    pub position: (i32, i32, i32),
    pub moves: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tally {
    carried: bool,
    rotten: bool,
    favorite: bool,
    quantity: u32,
    charges: u32,
}

#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    tallies: AHashMap<ItemTypeId, SmallVec<[Tally; 4]>>,
}

impl InventorySnapshot {
    pub fn from_pool(pool: &ResourcePool) -> Self {
        let mut snapshot = Self::default();
        for pooled in pool.items() {
            snapshot.record(pooled);
        }
        snapshot
    }

    fn record(&mut self, pooled: &PooledItem) {
        let item = &pooled.item;
        let carried = pooled.location.is_carried();
        let tallies = self.tallies.entry(item.type_id.clone()).or_default();
        if let Some(existing) = tallies.iter_mut().find(|t| {
            t.carried == carried && t.rotten == item.rotten && t.favorite == item.favorite
        }) {
            existing.quantity += item.quantity();
            existing.charges += item.charges;
            return;
        }
        tallies.push(Tally {
            carried,
            rotten: item.rotten,
            favorite: item.favorite,
            quantity: item.quantity(),
            charges: item.charges,
        });
    }

    fn matching(&self, type_id: &ItemTypeId, scope: SourceScope) -> impl Iterator<Item = &Tally> {
        self.tallies
            .get(type_id)
            .into_iter()
            .flatten()
            .filter(move |t| match scope {
                SourceScope::Carried => t.carried,
                SourceScope::Nearby => !t.carried,
                SourceScope::Both => true,
            })
    }
}

impl Stock for InventorySnapshot {
    fn amount_of(&self, type_id: &ItemTypeId, scope: SourceScope, filter: ComponentFilter) -> u32 {
        self.matching(type_id, scope)
            .filter(|t| !(filter.exclude_rotten && t.rotten))
            .filter(|t| !(filter.exclude_favorite && t.favorite))
            .map(|t| t.quantity)
            .sum()
    }

    fn tool_charges(&self, type_id: &ItemTypeId, scope: SourceScope) -> u32 {
        self.matching(type_id, scope).map(|t| t.charges).sum()
    }

    fn has_tool(&self, type_id: &ItemTypeId, scope: SourceScope) -> bool {
        self.matching(type_id, scope).next().is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InventoryCache {
    key: Option<CacheKey>,
    snapshot: InventorySnapshot,
}

impl InventoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the snapshot when `key` differs from the cached one.
    /// Returns whether a rebuild happened.
    pub fn refresh_if_stale(&mut self, key: CacheKey, pool: &ResourcePool) -> bool {
        if self.key == Some(key) {
            return false;
        }
        self.snapshot = InventorySnapshot::from_pool(pool);
        self.key = Some(key);
        tracing::trace!(turn = key.turn, "inventory cache rebuilt");
        true
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }

    pub fn snapshot(&self) -> &InventorySnapshot {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Location;
    use crate::{Item, ItemId};

    fn key(turn: u64) -> CacheKey {
        CacheKey {
            turn,
            position: (0, 0, 0),
            moves: 100,
        }
    }

    #[test]
    fn snapshot_answers_like_the_pool() {
        let mut pool = ResourcePool::new();
        let thread = ItemTypeId("thread".to_string());
        pool.add(Location::Carried, Item::stack(ItemId("a".into()), thread.clone(), 10));
        let mut fav = Item::stack(ItemId("b".into()), thread.clone(), 5);
        fav.favorite = true;
        pool.add(Location::Ground, fav);

        let snapshot = InventorySnapshot::from_pool(&pool);
        for scope in [SourceScope::Carried, SourceScope::Nearby, SourceScope::Both] {
            for filter in [ComponentFilter::ANY, ComponentFilter::STRICT] {
                assert_eq!(
                    snapshot.amount_of(&thread, scope, filter),
                    pool.amount_of(&thread, scope, filter)
                );
            }
        }
    }

    #[test]
    fn refresh_only_when_key_changes() {
        let pool = ResourcePool::new();
        let mut cache = InventoryCache::new();
        assert!(cache.refresh_if_stale(key(1), &pool));
        assert!(!cache.refresh_if_stale(key(1), &pool));
        assert!(cache.refresh_if_stale(key(2), &pool));
        cache.invalidate();
        assert!(cache.refresh_if_stale(key(2), &pool));
    }
}
