//! Resource pool: the items an actor can reach, split into what they carry
//! and what lies nearby (ground, vehicle cargo, containers).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CraftError, Result};
use crate::id::generate_item_id;
use crate::{Item, ItemId, ItemTypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    Carried,
    Ground,
    Vehicle,
    Container,
}

impl Location {
    pub fn is_carried(self) -> bool {
        matches!(self, Location::Carried)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceScope {
    Carried,
    Nearby,
    Both,
}

impl SourceScope {
    pub fn includes(self, location: Location) -> bool {
        match self {
            SourceScope::Carried => location.is_carried(),
            SourceScope::Nearby => !location.is_carried(),
            SourceScope::Both => true,
        }
    }
}

/// Which items are acceptable as components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentFilter {
    pub exclude_rotten: bool,
    pub exclude_favorite: bool,
}

impl ComponentFilter {
    pub const ANY: ComponentFilter = ComponentFilter {
        exclude_rotten: false,
        exclude_favorite: false,
    };

    /// Default for new crafts: no rotten food, no favorites.
    pub const STRICT: ComponentFilter = ComponentFilter {
        exclude_rotten: true,
        exclude_favorite: true,
    };

    pub fn accepts(&self, item: &Item) -> bool {
        !(self.exclude_rotten && item.rotten) && !(self.exclude_favorite && item.favorite)
    }

    pub fn allowing_rotten(self) -> Self {
        Self {
            exclude_rotten: false,
            ..self
        }
    }
}

/// Read-only inventory queries used by the matcher.
pub trait Stock {
    /// Total quantity of `type_id` reachable in `scope` that passes `filter`.
    fn amount_of(&self, type_id: &ItemTypeId, scope: SourceScope, filter: ComponentFilter) -> u32;
    /// Total charges held by tools of `type_id` in `scope`.
    fn tool_charges(&self, type_id: &ItemTypeId, scope: SourceScope) -> u32;
    fn has_tool(&self, type_id: &ItemTypeId, scope: SourceScope) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledItem {
    pub location: Location,
    pub item: Item,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    items: Vec<PooledItem>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, location: Location, item: Item) {
        self.items.push(PooledItem { location, item });
    }

    pub fn items(&self) -> &[PooledItem] {
        &self.items
    }

    pub fn find(&self, id: &ItemId) -> Option<&PooledItem> {
        self.items.iter().find(|p| &p.item.id == id)
    }

    pub fn take_item(&mut self, id: &ItemId) -> Option<PooledItem> {
        let index = self.items.iter().position(|p| &p.item.id == id)?;
        Some(self.items.remove(index))
    }

    /// Candidate indices for `scope`, nearby items first.
    fn ordered_indices(&self, scope: SourceScope) -> Vec<usize> {
        let nearby = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, p)| scope.includes(p.location) && !p.location.is_carried());
        let carried = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, p)| scope.includes(p.location) && p.location.is_carried());
        nearby.chain(carried).map(|(i, _)| i).collect()
    }

    /// Remove `amount` of `type_id` from `scope`, nearby sources first.
    /// Partial charge stacks are split, taking their share of recorded
    /// components with them, and the drawn pieces come back merged.
    /// Nothing is removed on failure.
    pub fn consume(
        &mut self,
        type_id: &ItemTypeId,
        amount: u32,
        scope: SourceScope,
        filter: ComponentFilter,
        rng: &mut impl Rng,
    ) -> Result<Vec<Item>> {
        let available = self.amount_of(type_id, scope, filter);
        if available < amount {
            return Err(CraftError::InsufficientQuantity {
                type_id: type_id.clone(),
                required: amount,
                available,
            });
        }

        let mut remaining = amount;
        let mut whole: Vec<usize> = Vec::new();
        let mut taken = Vec::new();
        for index in self.ordered_indices(scope) {
            if remaining == 0 {
                break;
            }
            let pooled = &mut self.items[index];
            if &pooled.item.type_id != type_id || !filter.accepts(&pooled.item) {
                continue;
            }
            let quantity = pooled.item.quantity();
            if quantity == 0 {
                continue;
            }
            if quantity <= remaining {
                remaining -= quantity;
                whole.push(index);
            } else {
                taken.push(split_piece(&mut pooled.item, remaining, rng));
                remaining = 0;
            }
        }

        // Remove back to front so earlier indices stay valid.
        whole.sort_unstable();
        for index in whole.into_iter().rev() {
            taken.push(self.items.remove(index).item);
        }
        merge_stacks(&mut taken);
        Ok(taken)
    }

    /// Split `charges` off the charge stack `id`, leaving the rest in place.
    /// `None` unless the stack holds more than `charges`.
    pub fn split_stack(&mut self, id: &ItemId, charges: u32, rng: &mut impl Rng) -> Option<Item> {
        let stack = &mut self.items.iter_mut().find(|p| &p.item.id == id)?.item;
        if !stack.count_by_charges || stack.charges <= charges {
            return None;
        }
        Some(split_piece(stack, charges, rng))
    }

    /// Draw `charges` from tools of `type_id` in `scope`. Spent charge-counted
    /// stacks are removed; tools with an empty battery stay.
    pub fn consume_tool_charges(
        &mut self,
        type_id: &ItemTypeId,
        charges: u32,
        scope: SourceScope,
    ) -> Result<()> {
        let available = self.tool_charges(type_id, scope);
        if available < charges {
            return Err(CraftError::InsufficientQuantity {
                type_id: type_id.clone(),
                required: charges,
                available,
            });
        }
        let mut remaining = charges;
        for index in self.ordered_indices(scope) {
            if remaining == 0 {
                break;
            }
            let item = &mut self.items[index].item;
            if &item.type_id != type_id {
                continue;
            }
            let drawn = item.charges.min(remaining);
            item.charges -= drawn;
            remaining -= drawn;
        }
        self.items
            .retain(|p| !(p.item.count_by_charges && p.item.charges == 0));
        Ok(())
    }
}

impl Stock for ResourcePool {
    fn amount_of(&self, type_id: &ItemTypeId, scope: SourceScope, filter: ComponentFilter) -> u32 {
        self.items
            .iter()
            .filter(|p| scope.includes(p.location))
            .filter(|p| &p.item.type_id == type_id && filter.accepts(&p.item))
            .map(|p| p.item.quantity())
            .sum()
    }

    fn tool_charges(&self, type_id: &ItemTypeId, scope: SourceScope) -> u32 {
        self.items
            .iter()
            .filter(|p| scope.includes(p.location) && &p.item.type_id == type_id)
            .map(|p| p.item.charges)
            .sum()
    }

    fn has_tool(&self, type_id: &ItemTypeId, scope: SourceScope) -> bool {
        self.items
            .iter()
            .any(|p| scope.includes(p.location) && &p.item.type_id == type_id)
    }
}

/// Merge charge-counted stacks of the same type into one entry each.
pub fn merge_stacks(items: &mut Vec<Item>) {
    let mut merged: Vec<Item> = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        if item.count_by_charges {
            if let Some(existing) = merged.iter_mut().find(|m| {
                m.count_by_charges && m.type_id == item.type_id && m.rotten == item.rotten
            }) {
                existing.charges += item.charges;
                existing.components.extend(item.components);
                continue;
            }
        }
        merged.push(item);
    }
    *items = merged;
}

/// Cut a `charges`-sized piece with its own id off `stack`.
fn split_piece(stack: &mut Item, charges: u32, rng: &mut impl Rng) -> Item {
    let components = split_provenance(stack, charges, rng);
    stack.charges -= charges;
    let mut piece = stack.clone();
    piece.id = generate_item_id(rng);
    piece.charges = charges;
    piece.components = components;
    piece
}

/// Move the part of `stack`'s recorded components that belongs to `taken` of
/// its charges. Charge-counted parts are divided, unit parts dealt out, and
/// rounding leaves the remainder with the stack.
fn split_provenance(stack: &mut Item, taken: u32, rng: &mut impl Rng) -> Vec<Item> {
    let total = u64::from(stack.charges.max(1));
    let share = |n: u32| (u64::from(n) * u64::from(taken) / total) as u32;
    let units = stack.components.iter().filter(|c| !c.count_by_charges).count();
    let mut units_to_move = share(u32::try_from(units).unwrap_or(u32::MAX));

    let mut moved = Vec::new();
    let mut kept = Vec::with_capacity(stack.components.len());
    for mut part in std::mem::take(&mut stack.components) {
        if part.count_by_charges {
            let portion = share(part.charges);
            if portion > 0 {
                part.charges -= portion;
                let mut piece = part.clone();
                piece.id = generate_item_id(rng);
                piece.charges = portion;
                moved.push(piece);
            }
            if part.charges > 0 {
                kept.push(part);
            }
        } else if units_to_move > 0 {
            units_to_move -= 1;
            moved.push(part);
        } else {
            kept.push(part);
        }
    }
    stack.components = kept;
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn id(s: &str) -> ItemId {
        ItemId(s.to_string())
    }

    fn ty(s: &str) -> ItemTypeId {
        ItemTypeId(s.to_string())
    }

    fn pool() -> ResourcePool {
        let mut pool = ResourcePool::new();
        pool.add(Location::Carried, Item::stack(id("t1"), ty("thread"), 30));
        pool.add(Location::Ground, Item::stack(id("t2"), ty("thread"), 20));
        pool.add(Location::Carried, Item::unit(id("r1"), ty("rag")));
        let mut rotten = Item::unit(id("r2"), ty("rag"));
        rotten.rotten = true;
        pool.add(Location::Ground, rotten);
        pool
    }

    #[test]
    fn amounts_respect_scope_and_filter() {
        let pool = pool();
        assert_eq!(pool.amount_of(&ty("thread"), SourceScope::Both, ComponentFilter::ANY), 50);
        assert_eq!(pool.amount_of(&ty("thread"), SourceScope::Carried, ComponentFilter::ANY), 30);
        assert_eq!(pool.amount_of(&ty("rag"), SourceScope::Both, ComponentFilter::STRICT), 1);
        assert_eq!(pool.amount_of(&ty("rag"), SourceScope::Nearby, ComponentFilter::ANY), 1);
    }

    #[test]
    fn consume_takes_nearby_first_and_splits_stacks() {
        let mut pool = pool();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let taken = pool
            .consume(&ty("thread"), 25, SourceScope::Both, ComponentFilter::ANY, &mut rng)
            .unwrap();
        let total: u32 = taken.iter().map(Item::quantity).sum();
        assert_eq!(total, 25);
        assert!(pool.find(&id("t2")).is_none(), "ground stack used up first");
        assert_eq!(pool.find(&id("t1")).unwrap().item.charges, 25);
    }

    #[test]
    fn consume_returns_one_merged_stack() {
        let mut pool = pool();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let taken = pool
            .consume(&ty("thread"), 45, SourceScope::Both, ComponentFilter::ANY, &mut rng)
            .unwrap();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].charges, 45);
    }

    #[test]
    fn split_stack_takes_its_share_of_components() {
        let mut pool = ResourcePool::new();
        let mut rope = Item::stack(id("rope"), ty("rope"), 8);
        rope.components = vec![
            Item::stack(id("fiber"), ty("fiber"), 10),
            Item::unit(id("knot_a"), ty("knot")),
            Item::unit(id("knot_b"), ty("knot")),
        ];
        pool.add(Location::Carried, rope);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let taken = pool
            .consume(&ty("rope"), 4, SourceScope::Both, ComponentFilter::ANY, &mut rng)
            .unwrap();
        let left = &pool.find(&id("rope")).unwrap().item;
        let fiber = |items: &[Item]| -> u32 {
            items.iter().filter(|c| c.type_id == ty("fiber")).map(|c| c.charges).sum()
        };
        assert_eq!(fiber(&taken[0].components), 5);
        assert_eq!(fiber(&left.components), 5);
        assert_eq!(taken[0].components.len() + left.components.len(), 4);
        assert_eq!(left.charges, 4);
    }

    #[test]
    fn consume_is_all_or_nothing() {
        let mut pool = pool();
        let before = pool.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = pool.consume(&ty("rag"), 2, SourceScope::Both, ComponentFilter::STRICT, &mut rng);
        assert!(matches!(
            err,
            Err(CraftError::InsufficientQuantity { required: 2, available: 1, .. })
        ));
        assert_eq!(pool, before);
    }

    #[test]
    fn tool_charges_keep_the_tool() {
        let mut pool = ResourcePool::new();
        pool.add(Location::Carried, Item::tool(id("w"), ty("welder"), 10));
        pool.consume_tool_charges(&ty("welder"), 10, SourceScope::Both).unwrap();
        assert_eq!(pool.find(&id("w")).unwrap().item.charges, 0);
        assert!(pool.has_tool(&ty("welder"), SourceScope::Carried));
    }

    #[test]
    fn merge_combines_charge_stacks_only() {
        let mut items = vec![
            Item::stack(id("a"), ty("thread"), 5),
            Item::unit(id("b"), ty("rag")),
            Item::stack(id("c"), ty("thread"), 7),
            Item::unit(id("d"), ty("rag")),
        ];
        merge_stacks(&mut items);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].charges, 12);
    }
}
