//! Planning and committing a craft: requirement checks, selections, and the
//! up-front consumption that creates a tracker.

use rand::Rng;

use crate::batch::{tool_charges, CostMode};
use crate::error::{CraftError, Result};
use crate::matcher::{
    item_selection_available, missing_requirements, select_item_component,
    select_tool_component, tool_selection_available, ChoiceSource, CompSelection, Confirmation,
    Selection,
};
use crate::pool::{ComponentFilter, Stock};
use crate::tracker::CraftTracker;
use crate::{
    emit, emit_all, CraftContent, CraftId, Event, EventEnvelope, Item, ItemComp, Recipe, RecipeId,
    ToolComp, WorkshopState,
};

#[derive(Debug, Clone, PartialEq)]
pub enum StartCheck {
    Ready,
    /// Only rotten components would complete the recipe.
    NeedsRottenConfirmation,
    /// Tools can pay for the first tick but not the whole craft.
    NeedsChargeConfirmation,
    Missing(crate::error::MissingReport),
}

/// Can `batch` of `recipe` be started from `stock`?
pub fn check_start<S: Stock + ?Sized>(recipe: &Recipe, batch: u32, stock: &S) -> StartCheck {
    let reqs = &recipe.requirements;
    let strict = missing_requirements(reqs, batch, stock, ComponentFilter::STRICT, CostMode::Complete);
    if strict.is_empty() {
        return StartCheck::Ready;
    }
    let relaxed = ComponentFilter::STRICT.allowing_rotten();
    let rotten = missing_requirements(reqs, batch, stock, relaxed, CostMode::Complete);
    if rotten.is_empty() {
        return StartCheck::NeedsRottenConfirmation;
    }
    let partial = missing_requirements(reqs, batch, stock, ComponentFilter::STRICT, CostMode::Start);
    if partial.is_empty() {
        return StartCheck::NeedsChargeConfirmation;
    }
    StartCheck::Missing(strict)
}

/// Selections for one craft, ready to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct CraftPlan {
    pub recipe_id: RecipeId,
    pub batch: u32,
    pub repeat: bool,
    pub filter: ComponentFilter,
    pub components: Vec<CompSelection<ItemComp>>,
    pub tools: Vec<CompSelection<ToolComp>>,
}

/// Settle a component group, asking `choices` when the matcher cannot.
pub(crate) fn resolve_component<S: Stock + ?Sized>(
    group: &[ItemComp],
    batch: u32,
    stock: &S,
    filter: ComponentFilter,
    is_npc: bool,
    choices: &mut (impl ChoiceSource + ?Sized),
) -> Option<CompSelection<ItemComp>> {
    match select_item_component(group, batch, stock, filter, is_npc) {
        Selection::Chosen(selection) => Some(selection),
        Selection::AwaitingChoice(pending) => choices
            .choose_component(&pending)
            .and_then(|index| pending.resolve(index)),
        Selection::Cancel => None,
    }
}

pub(crate) fn resolve_tool<S: Stock + ?Sized>(
    group: &[ToolComp],
    batch: u32,
    stock: &S,
    mode: CostMode,
    is_npc: bool,
    choices: &mut (impl ChoiceSource + ?Sized),
) -> Option<CompSelection<ToolComp>> {
    match select_tool_component(group, batch, stock, mode, is_npc) {
        Selection::Chosen(selection) => Some(selection),
        Selection::AwaitingChoice(pending) => {
            choices.choose_tool(&pending).and_then(|index| pending.resolve(index))
        }
        Selection::Cancel => None,
    }
}

impl CraftPlan {
    /// Check availability and settle every requirement group.
    pub fn build<S: Stock + ?Sized>(
        content: &CraftContent,
        recipe_id: &RecipeId,
        batch: u32,
        stock: &S,
        is_npc: bool,
        choices: &mut (impl ChoiceSource + ?Sized),
    ) -> Result<Self> {
        let recipe = content
            .recipe(recipe_id)
            .ok_or_else(|| CraftError::UnknownRecipe(recipe_id.clone()))?;
        let batch = batch.max(1);

        let mut filter = ComponentFilter::STRICT;
        match check_start(recipe, batch, stock) {
            StartCheck::Ready => {}
            StartCheck::NeedsRottenConfirmation => {
                if !choices.confirm(Confirmation::UseRottenComponents) {
                    return Err(CraftError::Declined);
                }
                filter = filter.allowing_rotten();
            }
            StartCheck::NeedsChargeConfirmation => {
                if !choices.confirm(Confirmation::StartWithoutFullCharges) {
                    return Err(CraftError::Declined);
                }
            }
            StartCheck::Missing(report) => return Err(CraftError::MissingRequirements(report)),
        }

        let mut components = Vec::with_capacity(recipe.requirements.components.len());
        for group in &recipe.requirements.components {
            let selection = resolve_component(group, batch, stock, filter, is_npc, choices)
                .ok_or(CraftError::Declined)?;
            components.push(selection);
        }
        let mut tools = Vec::with_capacity(recipe.requirements.tools.len());
        for group in &recipe.requirements.tools {
            let selection = resolve_tool(group, batch, stock, CostMode::Start, is_npc, choices)
                .ok_or(CraftError::Declined)?;
            tools.push(selection);
        }

        Ok(Self {
            recipe_id: recipe_id.clone(),
            batch,
            repeat: false,
            filter,
            components,
            tools,
        })
    }

    pub fn repeating(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    /// Consume the selected components and the first slice of tool charges,
    /// then register a tracker. Nothing is consumed if any selection no
    /// longer holds.
    pub fn execute(
        &self,
        state: &mut WorkshopState,
        content: &CraftContent,
        rng: &mut impl Rng,
        events: &mut Vec<EventEnvelope>,
    ) -> Result<CraftId> {
        let recipe = content
            .recipe(&self.recipe_id)
            .ok_or_else(|| CraftError::UnknownRecipe(self.recipe_id.clone()))?;

        let stale_components = self
            .components
            .iter()
            .any(|s| !item_selection_available(s, self.batch, &state.pool, self.filter));
        let stale_tools = self
            .tools
            .iter()
            .any(|s| !tool_selection_available(s, self.batch, &state.pool, CostMode::Start, 1));
        if stale_components || stale_tools {
            let report = missing_requirements(
                &recipe.requirements,
                self.batch,
                &state.pool,
                self.filter,
                CostMode::Start,
            );
            return Err(CraftError::MissingRequirements(report));
        }

        let craft_id = state.next_craft_id();
        let before = state.pool.clone();
        let mut pending = Vec::new();
        let (consumed, comps_used) = match self.consume(state, &craft_id, rng, &mut pending) {
            Ok(taken) => taken,
            Err(err) => {
                state.pool = before;
                return Err(err);
            }
        };
        events.extend(emit_all(state, pending));

        let mut tracker = CraftTracker::new(
            self.recipe_id.clone(),
            self.batch,
            consumed,
            comps_used,
            self.tools.clone(),
            self.filter,
        );
        tracker.repeat = self.repeat;
        state.crafts.insert(craft_id.clone(), tracker);

        tracing::info!(craft = %craft_id, recipe = %self.recipe_id, batch = self.batch, "craft started");
        events.push(emit(
            &mut state.counters,
            state.meta.turn,
            Event::CraftStarted {
                craft_id: craft_id.clone(),
                recipe_id: self.recipe_id.clone(),
                batch: self.batch,
            },
        ));
        Ok(craft_id)
    }

    fn consume(
        &self,
        state: &mut WorkshopState,
        craft_id: &CraftId,
        rng: &mut impl Rng,
        events: &mut Vec<Event>,
    ) -> Result<(Vec<Item>, Vec<ItemComp>)> {
        let mut consumed = Vec::new();
        let mut comps_used = Vec::with_capacity(self.components.len());
        for selection in &self.components {
            let Some(scope) = selection.use_from.scope() else {
                return Err(CraftError::SelectionPending);
            };
            let required = selection.comp.required(self.batch);
            let items = state.pool.consume(
                &selection.comp.type_id,
                required,
                scope,
                self.filter,
                rng,
            )?;
            consumed.extend(items);
            comps_used.push(ItemComp {
                count: i32::try_from(required).unwrap_or(i32::MAX),
                ..selection.comp.clone()
            });
            events.push(Event::ComponentsConsumed {
                craft_id: Some(craft_id.clone()),
                type_id: selection.comp.type_id.clone(),
                quantity: required,
                from: selection.use_from,
            });
        }
        consume_tools(state, &self.tools, self.batch, CostMode::Start, 1, events)?;
        Ok((consumed, comps_used))
    }
}

/// Draw `mode × multiplier` charges from each selected tool. Every selection
/// is checked before any charge is taken.
pub(crate) fn consume_tools(
    state: &mut WorkshopState,
    tools: &[CompSelection<ToolComp>],
    batch: u32,
    mode: CostMode,
    multiplier: u32,
    events: &mut Vec<Event>,
) -> Result<()> {
    if let Some(missing) = tools
        .iter()
        .find(|s| !tool_selection_available(s, batch, &state.pool, mode, multiplier))
    {
        let scope = missing.use_from.scope().unwrap_or(crate::pool::SourceScope::Both);
        return Err(CraftError::InsufficientQuantity {
            type_id: missing.comp.type_id.clone(),
            required: tool_charges(&missing.comp, batch, mode) * multiplier,
            available: state.pool.tool_charges(&missing.comp.type_id, scope),
        });
    }

    for selection in tools {
        let charges = tool_charges(&selection.comp, batch, mode) * multiplier;
        let Some(scope) = selection.use_from.scope() else {
            continue;
        };
        if charges == 0 {
            continue;
        }
        state
            .pool
            .consume_tool_charges(&selection.comp.type_id, charges, scope)?;
        events.push(Event::ToolChargesConsumed {
            type_id: selection.comp.type_id.clone(),
            charges,
            from: selection.use_from,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Location, ResourcePool};
    use crate::test_fixtures::{base_content, base_state, make_rng, recipe, AlwaysFirst};
    use crate::{ItemId, ItemTypeId};

    #[test]
    fn rotten_only_needs_confirmation() {
        let content = base_content();
        let r = recipe(&content, "jerky");
        let mut pool = ResourcePool::new();
        let mut meat = Item::unit(ItemId("m".into()), ItemTypeId("meat".into()));
        meat.rotten = true;
        pool.add(Location::Carried, meat);
        pool.add(
            Location::Carried,
            Item::tool(ItemId("d".into()), ItemTypeId("dehydrator".into()), 100),
        );
        assert_eq!(check_start(r, 1, &pool), StartCheck::NeedsRottenConfirmation);
    }

    #[test]
    fn low_charges_need_confirmation() {
        let content = base_content();
        let r = recipe(&content, "jerky");
        let mut pool = ResourcePool::new();
        pool.add(Location::Carried, Item::unit(ItemId("m".into()), ItemTypeId("meat".into())));
        // 5 per unit: batch 4 costs 20 to complete but 1 to start
        pool.add(
            Location::Carried,
            Item::tool(ItemId("d".into()), ItemTypeId("dehydrator".into()), 19),
        );
        for i in 0..3 {
            pool.add(
                Location::Carried,
                Item::unit(ItemId(format!("m{i}")), ItemTypeId("meat".into())),
            );
        }
        assert_eq!(check_start(r, 4, &pool), StartCheck::NeedsChargeConfirmation);
    }

    #[test]
    fn unknown_recipe_is_an_error() {
        let content = base_content();
        let state = base_state(&content);
        let err = CraftPlan::build(
            &content,
            &RecipeId("nope".into()),
            1,
            &state.pool,
            false,
            &mut AlwaysFirst,
        );
        assert!(matches!(err, Err(CraftError::UnknownRecipe(_))));
    }

    #[test]
    fn execute_consumes_and_registers_tracker() {
        let content = base_content();
        let mut state = base_state(&content);
        let plan = CraftPlan::build(
            &content,
            &RecipeId("welded_frame".into()),
            1,
            &state.pool,
            false,
            &mut AlwaysFirst,
        )
        .unwrap();
        let charges_before = state
            .pool
            .tool_charges(&ItemTypeId("welder".into()), crate::pool::SourceScope::Both);
        let mut events = Vec::new();
        let id = plan
            .execute(&mut state, &content, &mut make_rng(), &mut events)
            .unwrap();
        let tracker = &state.crafts[&id];
        assert_eq!(tracker.components().iter().map(Item::quantity).sum::<u32>(), 4 + 2);
        let charges_after = state
            .pool
            .tool_charges(&ItemTypeId("welder".into()), crate::pool::SourceScope::Both);
        assert_eq!(charges_before - charges_after, 10 / 20 + 10 % 20);
        assert!(events
            .iter()
            .any(|e| matches!(e.event, Event::CraftStarted { .. })));
    }

    #[test]
    fn execute_refuses_stale_plan_without_consuming() {
        let content = base_content();
        let mut state = base_state(&content);
        let plan = CraftPlan::build(
            &content,
            &RecipeId("nail_board".into()),
            1,
            &state.pool,
            false,
            &mut AlwaysFirst,
        )
        .unwrap();
        let nail = ItemTypeId("nail".into());
        let nails: Vec<ItemId> = state
            .pool
            .items()
            .iter()
            .filter(|p| p.item.type_id == nail)
            .map(|p| p.item.id.clone())
            .collect();
        for id in &nails {
            state.pool.take_item(id);
        }
        let before = state.pool.clone();
        let err = plan.execute(&mut state, &content, &mut make_rng(), &mut Vec::new());
        assert!(matches!(err, Err(CraftError::MissingRequirements(_))));
        assert_eq!(state.pool, before);
        assert!(state.crafts.is_empty());
    }
}
