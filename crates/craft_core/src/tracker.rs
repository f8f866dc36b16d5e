//! Craft progress tracker: the persisted state of one in-progress craft.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::matcher::CompSelection;
use crate::pool::{merge_stacks, ComponentFilter};
use crate::{AlternativeGroup, Item, ItemComp, RecipeId, ToolComp};

/// Fixed-point progress scale: 100% == 10,000,000.
pub const PROGRESS_MAX: u32 = 10_000_000;
/// One tick: 5% of `PROGRESS_MAX`.
pub const PROGRESS_STEP: u32 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CraftStatus {
    NotStarted,
    InProgress,
    Completed,
    Destroyed,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CraftTracker {
    pub recipe_id: RecipeId,
    pub batch: u32,
    progress: u32,
    next_failure_point: Option<u32>,
    pub status: CraftStatus,
    /// Consumed materials. Owned here until completion, destruction, or
    /// abandonment.
    components: Vec<Item>,
    /// What was consumed at start, as batch totals per type.
    comps_used: Vec<ItemComp>,
    pub tool_selections: Vec<CompSelection<ToolComp>>,
    /// False once a tool ran dry; tools are re-selected before progressing.
    pub tools_to_continue: bool,
    pub filter: ComponentFilter,
    pub repeat: bool,
}

impl CraftTracker {
    pub fn new(
        recipe_id: RecipeId,
        batch: u32,
        mut components: Vec<Item>,
        comps_used: Vec<ItemComp>,
        tool_selections: Vec<CompSelection<ToolComp>>,
        filter: ComponentFilter,
    ) -> Self {
        merge_stacks(&mut components);
        let mut merged: Vec<ItemComp> = Vec::with_capacity(comps_used.len());
        for comp in comps_used {
            match merged.iter_mut().find(|m| m.type_id == comp.type_id) {
                Some(existing) => existing.count += comp.count,
                None => merged.push(comp),
            }
        }
        Self {
            recipe_id,
            batch,
            progress: 0,
            next_failure_point: None,
            status: CraftStatus::NotStarted,
            components,
            comps_used: merged,
            tool_selections,
            tools_to_continue: true,
            filter,
            repeat: false,
        }
    }

    pub fn progress(&self) -> u32 {
        self.progress
    }

    /// Progress in whole percent.
    pub fn percent(&self) -> u32 {
        self.progress / (PROGRESS_MAX / 100)
    }

    pub fn next_failure_point(&self) -> Option<u32> {
        self.next_failure_point
    }

    pub fn components(&self) -> &[Item] {
        &self.components
    }

    pub fn comps_used(&self) -> &[ItemComp] {
        &self.comps_used
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= PROGRESS_MAX
    }

    /// Move progress forward to `new_progress` (clamped to the maximum) and
    /// return how many 5% boundaries were crossed.
    pub fn advance_to(&mut self, new_progress: u32) -> u32 {
        debug_assert!(new_progress >= self.progress, "progress went backwards");
        let new_progress = new_progress.min(PROGRESS_MAX);
        let steps = new_progress / PROGRESS_STEP - self.progress / PROGRESS_STEP;
        self.progress = new_progress;
        steps
    }

    /// First checkpoint of an activity: a full-craft span scaled by `ratio`.
    pub fn roll_initial_checkpoint(&mut self, ratio: f64) {
        self.next_failure_point = Some(checkpoint(self.progress, PROGRESS_MAX, ratio));
    }

    /// Later checkpoints span only the remaining progress.
    pub fn reroll_checkpoint(&mut self, ratio: f64) {
        let left = PROGRESS_MAX - self.progress;
        self.next_failure_point = Some(checkpoint(self.progress, left, ratio));
    }

    pub fn failure_due(&self) -> bool {
        self.next_failure_point
            .is_some_and(|point| self.progress >= point)
    }

    /// Step back to just below the last 5% boundary so the tick that could
    /// not be paid for is crossed again.
    pub fn rollback_before_boundary(&mut self) {
        let back = self.progress % PROGRESS_STEP + 1;
        self.progress = self.progress.saturating_sub(back);
    }

    pub fn lose_progress(&mut self, amount: u32) -> u32 {
        let lost = amount.min(self.progress);
        self.progress -= lost;
        lost
    }

    pub fn add_components(&mut self, items: Vec<Item>) {
        self.components.extend(items);
        merge_stacks(&mut self.components);
    }

    /// Remove one consumed component chosen uniformly at random.
    pub fn remove_random_component(&mut self, rng: &mut impl Rng) -> Option<Item> {
        if self.components.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.components.len());
        Some(self.components.swap_remove(index))
    }

    /// Components owed because failures destroyed them, as single-choice
    /// groups of batch totals.
    pub fn continue_requirements(&self) -> Vec<AlternativeGroup<ItemComp>> {
        self.comps_used
            .iter()
            .filter_map(|used| {
                let on_hand: u32 = self
                    .components
                    .iter()
                    .filter(|c| c.type_id == used.type_id)
                    .map(Item::quantity)
                    .sum();
                let owed = used.count.unsigned_abs().saturating_sub(on_hand);
                (owed > 0).then(|| {
                    let count = i32::try_from(owed).unwrap_or(i32::MAX);
                    AlternativeGroup::from_elem(ItemComp { count, ..used.clone() }, 1)
                })
            })
            .collect()
    }

    /// Hand the consumed components back and retire the tracker.
    pub fn release_components(&mut self, status: CraftStatus) -> Vec<Item> {
        self.status = status;
        std::mem::take(&mut self.components)
    }
}

fn checkpoint(progress: u32, span: u32, ratio: f64) -> u32 {
    let offset = (f64::from(span) * ratio.max(0.0)).min(f64::from(u32::MAX));
    progress.saturating_add(offset as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ItemId, ItemTypeId};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn tracker(components: Vec<Item>, used: Vec<ItemComp>) -> CraftTracker {
        CraftTracker::new(
            RecipeId("r".to_string()),
            1,
            components,
            used,
            Vec::new(),
            ComponentFilter::STRICT,
        )
    }

    fn nail(id: &str) -> Item {
        Item::unit(ItemId(id.to_string()), ItemTypeId("nail".to_string()))
    }

    #[test]
    fn advance_counts_crossed_boundaries() {
        let mut t = tracker(vec![], vec![]);
        assert_eq!(t.advance_to(499_999), 0);
        assert_eq!(t.advance_to(500_000), 1);
        assert_eq!(t.advance_to(1_600_000), 2);
        assert_eq!(t.advance_to(PROGRESS_MAX + 5), 17);
        assert_eq!(t.progress(), PROGRESS_MAX);
        assert!(t.is_complete());
    }

    #[test]
    fn rollback_lands_below_last_boundary() {
        let mut t = tracker(vec![], vec![]);
        t.advance_to(1_200_000);
        t.rollback_before_boundary();
        assert_eq!(t.progress(), 999_999);
        let mut fresh = tracker(vec![], vec![]);
        fresh.rollback_before_boundary();
        assert_eq!(fresh.progress(), 0);
    }

    #[test]
    fn checkpoints_scale_with_ratio_and_remaining_span() {
        let mut t = tracker(vec![], vec![]);
        t.roll_initial_checkpoint(0.5);
        assert_eq!(t.next_failure_point(), Some(5_000_000));
        t.advance_to(6_000_000);
        assert!(t.failure_due());
        t.reroll_checkpoint(0.5);
        assert_eq!(t.next_failure_point(), Some(8_000_000));
        assert!(!t.failure_due());
    }

    #[test]
    fn continue_requirements_report_destroyed_components() {
        let mut t = tracker(
            vec![nail("a"), nail("b"), nail("c")],
            vec![ItemComp::new("nail", 2), ItemComp::new("nail", 1)],
        );
        assert!(t.continue_requirements().is_empty());
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        t.remove_random_component(&mut rng);
        t.remove_random_component(&mut rng);
        let owed = t.continue_requirements();
        assert_eq!(owed.len(), 1);
        assert_eq!(owed[0][0], ItemComp::new("nail", 2));
    }

    #[test]
    fn release_empties_the_arena() {
        let mut t = tracker(vec![nail("a")], vec![ItemComp::new("nail", 1)]);
        let items = t.release_components(CraftStatus::Abandoned);
        assert_eq!(items.len(), 1);
        assert!(t.components().is_empty());
        assert_eq!(t.status, CraftStatus::Abandoned);
    }
}
