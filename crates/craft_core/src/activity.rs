//! Craft activity controller: the `start` / `tick` / `finish` driver.
//!
//! The activity only holds a `CraftId`; every resumable value lives in the
//! tracker inside `WorkshopState`, so parking a craft is just not ticking it.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::actor::{Crafter, Crew};
use crate::batch::{batch_time, CostMode};
use crate::command::{check_start, consume_tools, resolve_component, resolve_tool, StartCheck};
use crate::error::{CraftError, Result};
use crate::failure::{handle_craft_failure, FailureOutcome};
use crate::matcher::{missing_requirements, ChoiceSource};
use crate::pool::Location;
use crate::practice::{craft_skill_gain, skill_cap};
use crate::results::complete_craft;
use crate::roll::{crafting_dice, crafting_success_roll};
use crate::tracker::{CraftStatus, PROGRESS_MAX};
use crate::{
    emit_all, CancelReason, CraftContent, CraftId, Event, EventEnvelope, ItemId, Recipe,
    RecipeFlag, RecipeId, Requirements, WorkshopState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityStatus {
    Running,
    /// Progress is at 100%; `finish` must be called next.
    ReadyToFinish,
    Finished,
    Cancelled(CancelReason),
    Destroyed,
}

impl ActivityStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ActivityStatus::Running | ActivityStatus::ReadyToFinish)
    }
}

/// Per-turn environment supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkConditions {
    pub light: f32,
    /// Crafting speed multiplier; 1.0 is full speed.
    pub speed: f32,
    /// Moves the crafter spends this turn.
    pub moves: u32,
}

pub(crate) fn too_dark(recipe: &Recipe, conditions: &WorkConditions, content: &CraftContent) -> bool {
    if recipe.has_flag(RecipeFlag::BlindEasy) {
        return false;
    }
    conditions.light < content.constants.min_craft_light
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinishOutcome {
    Completed {
        results: Vec<ItemId>,
    },
    /// The craft was marked to repeat and another batch can start now.
    RepeatReady {
        results: Vec<ItemId>,
        recipe_id: RecipeId,
        batch: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CraftActivity {
    craft_id: CraftId,
    status: ActivityStatus,
}

impl CraftActivity {
    pub fn craft_id(&self) -> &CraftId {
        &self.craft_id
    }

    pub fn status(&self) -> ActivityStatus {
        self.status
    }

    /// Begin (or resume) work on a tracked craft and roll its first
    /// failure checkpoint.
    pub fn start<A: Crafter>(
        craft_id: CraftId,
        state: &mut WorkshopState,
        content: &CraftContent,
        crew: &Crew<A>,
        rng: &mut impl Rng,
    ) -> (Self, Vec<EventEnvelope>) {
        let mut activity = Self {
            craft_id,
            status: ActivityStatus::Running,
        };
        let Some(tracker) = state.crafts.get_mut(&activity.craft_id) else {
            let events = activity.cancel(state, CancelReason::TargetLost);
            return (activity, events);
        };
        let recipe = content.recipe(&tracker.recipe_id);
        let (Some(recipe), CraftStatus::NotStarted | CraftStatus::InProgress) =
            (recipe, tracker.status)
        else {
            let events = activity.cancel(state, CancelReason::InvalidTarget);
            return (activity, events);
        };

        let mut events = Vec::new();
        if let Some(skill) = &recipe.skill_used {
            if crew.crafter.skill_level(skill) > skill_cap(recipe.difficulty, &content.constants) {
                events.push(Event::SkillCapped {
                    skill: skill.clone(),
                });
            }
        }
        let dice = crafting_dice(recipe, &crew.crafter, &crew.assistants, content);
        if let Some(assistant) = &dice.assisted_by {
            events.push(Event::AssistantHelped {
                assistant: assistant.clone(),
            });
        }
        tracker.roll_initial_checkpoint(dice.roll(rng));
        tracker.status = CraftStatus::InProgress;
        tracing::info!(
            craft = %activity.craft_id,
            progress = tracker.progress(),
            checkpoint = ?tracker.next_failure_point(),
            "craft activity started"
        );
        (activity, emit_all(state, events))
    }

    /// Advance one turn.
    pub fn tick<A: Crafter>(
        &mut self,
        state: &mut WorkshopState,
        content: &CraftContent,
        crew: &mut Crew<A>,
        conditions: WorkConditions,
        choices: &mut (impl ChoiceSource + ?Sized),
        rng: &mut impl Rng,
    ) -> Vec<EventEnvelope> {
        if self.status != ActivityStatus::Running {
            return Vec::new();
        }
        let Some(tracker) = state.crafts.get(&self.craft_id) else {
            return self.cancel(state, CancelReason::TargetLost);
        };
        let Some(recipe) = content.recipe(&tracker.recipe_id) else {
            return self.cancel(state, CancelReason::InvalidTarget);
        };
        if too_dark(recipe, &conditions, content) {
            return self.cancel(state, CancelReason::TooDark);
        }

        let mut events = Vec::new();
        if let Err(reason) =
            self.continue_craft(state, recipe, crew.crafter.is_npc(), choices, rng, &mut events)
        {
            return self.cancel_with(state, reason, events);
        }

        let steps = match self.advance(state, content, recipe, crew, conditions, rng, &mut events) {
            Ok(steps) => steps,
            Err(reason) => return self.cancel_with(state, reason, events),
        };
        tracing::debug!(craft = %self.craft_id, steps, "craft tick");

        let Some(tracker) = state.crafts.get(&self.craft_id) else {
            return emit_all(state, events);
        };
        if tracker.is_complete() {
            self.status = ActivityStatus::ReadyToFinish;
        } else if tracker.failure_due() {
            if let Err(reason) = self.checkpoint(state, content, recipe, crew, rng, &mut events) {
                return self.cancel_with(state, reason, events);
            }
        }
        emit_all(state, events)
    }

    /// Replace destroyed components and re-select tools that ran dry.
    fn continue_craft(
        &self,
        state: &mut WorkshopState,
        recipe: &Recipe,
        is_npc: bool,
        choices: &mut (impl ChoiceSource + ?Sized),
        rng: &mut impl Rng,
        events: &mut Vec<Event>,
    ) -> std::result::Result<(), CancelReason> {
        let Some(tracker) = state.crafts.get(&self.craft_id) else {
            return Err(CancelReason::TargetLost);
        };
        let owed = tracker.continue_requirements();
        let filter = tracker.filter;
        let batch = tracker.batch;
        let tools_ready = tracker.tools_to_continue;

        for group in &owed {
            let selection = resolve_component(group, 1, &state.pool, filter, is_npc, choices)
                .ok_or(CancelReason::MissingComponents)?;
            let scope = selection
                .use_from
                .scope()
                .ok_or(CancelReason::MissingComponents)?;
            let amount = selection.comp.required(1);
            let items = state
                .pool
                .consume(&selection.comp.type_id, amount, scope, filter, rng)
                .map_err(|_| CancelReason::MissingComponents)?;
            events.push(Event::ComponentsConsumed {
                craft_id: Some(self.craft_id.clone()),
                type_id: selection.comp.type_id.clone(),
                quantity: amount,
                from: selection.use_from,
            });
            if let Some(tracker) = state.crafts.get_mut(&self.craft_id) {
                tracker.add_components(items);
            }
        }

        if !tools_ready {
            let mut selections = Vec::with_capacity(recipe.requirements.tools.len());
            for group in &recipe.requirements.tools {
                let selection =
                    resolve_tool(group, batch, &state.pool, CostMode::Continue, is_npc, choices)
                        .ok_or(CancelReason::MissingTools)?;
                selections.push(selection);
            }
            if let Some(tracker) = state.crafts.get_mut(&self.craft_id) {
                tracker.tool_selections = selections;
                tracker.tools_to_continue = true;
            }
        }
        Ok(())
    }

    /// Convert this turn's moves into progress, then pay for crossed ticks
    /// with practice and tool charges.
    #[allow(clippy::too_many_arguments)]
    fn advance<A: Crafter>(
        &self,
        state: &mut WorkshopState,
        content: &CraftContent,
        recipe: &Recipe,
        crew: &mut Crew<A>,
        conditions: WorkConditions,
        rng: &mut impl Rng,
        events: &mut Vec<Event>,
    ) -> std::result::Result<u32, CancelReason> {
        let constants = &content.constants;
        let Some(tracker) = state.crafts.get_mut(&self.craft_id) else {
            return Err(CancelReason::TargetLost);
        };
        let batch = tracker.batch;
        let base_total = batch_time(recipe, batch, 1.0, 0, constants).max(1) as f64;
        let current_total = batch_time(
            recipe,
            batch,
            conditions.speed,
            crew.assistants.len(),
            constants,
        )
        .max(1) as f64;
        let scale = f64::from(PROGRESS_MAX);
        let delta = f64::from(conditions.moves) * base_total / current_total;
        let moves_done = f64::from(tracker.progress()) * base_total / scale + delta;
        let target = (moves_done / base_total * scale).round().min(scale) as u32;
        let steps = tracker.advance_to(target.max(tracker.progress()));
        events.push(Event::ProgressTick {
            craft_id: self.craft_id.clone(),
            progress: tracker.progress(),
            steps,
        });
        if steps == 0 {
            return Ok(0);
        }

        events.extend(craft_skill_gain(
            recipe,
            batch,
            steps,
            &mut crew.crafter,
            &mut crew.assistants,
            constants,
            rng,
        ));

        // The tick that reaches 100% was paid for up front.
        let paid = if tracker.is_complete() { steps - 1 } else { steps };
        if paid == 0 {
            return Ok(steps);
        }
        let selections = tracker.tool_selections.clone();
        if consume_tools(state, &selections, batch, CostMode::Continue, paid, events).is_err() {
            if let Some(tracker) = state.crafts.get_mut(&self.craft_id) {
                tracker.tools_to_continue = false;
                tracker.rollback_before_boundary();
            }
            return Err(CancelReason::MissingTools);
        }
        Ok(steps)
    }

    /// Evaluate a reached failure checkpoint as a fresh roll.
    fn checkpoint<A: Crafter>(
        &mut self,
        state: &mut WorkshopState,
        content: &CraftContent,
        recipe: &Recipe,
        crew: &Crew<A>,
        rng: &mut impl Rng,
        events: &mut Vec<Event>,
    ) -> std::result::Result<(), CancelReason> {
        let ratio = crafting_success_roll(recipe, &crew.crafter, &crew.assistants, content, rng);
        let Some(tracker) = state.crafts.get_mut(&self.craft_id) else {
            return Err(CancelReason::TargetLost);
        };

        if ratio >= 1.0 {
            events.push(Event::CheckpointPassed {
                craft_id: self.craft_id.clone(),
                ratio,
            });
        } else {
            match handle_craft_failure(tracker, ratio, &content.constants, rng) {
                FailureOutcome::Destroyed { destroyed } => {
                    events.extend(destroyed.into_iter().map(|item| Event::ComponentDestroyed {
                        craft_id: self.craft_id.clone(),
                        type_id: item.type_id,
                    }));
                    if let Some(mut tracker) = state.crafts.remove(&self.craft_id) {
                        tracker.release_components(CraftStatus::Destroyed);
                    }
                    events.push(Event::CraftDestroyed {
                        craft_id: self.craft_id.clone(),
                    });
                    tracing::info!(craft = %self.craft_id, ratio, "craft destroyed");
                    self.status = ActivityStatus::Destroyed;
                    return Ok(());
                }
                FailureOutcome::Survived {
                    destroyed,
                    progress_lost,
                } => {
                    events.extend(destroyed.into_iter().map(|item| Event::ComponentDestroyed {
                        craft_id: self.craft_id.clone(),
                        type_id: item.type_id,
                    }));
                    events.push(Event::ProgressLost {
                        craft_id: self.craft_id.clone(),
                        percent: progress_lost / (PROGRESS_MAX / 100),
                    });
                }
            }
        }

        let next = crafting_success_roll(recipe, &crew.crafter, &crew.assistants, content, rng);
        tracker.reroll_checkpoint(next);

        let owed = Requirements {
            components: tracker.continue_requirements(),
            tools: Vec::new(),
        };
        let missing = missing_requirements(&owed, 1, &state.pool, tracker.filter, CostMode::Continue);
        if !missing.is_empty() {
            return Err(CancelReason::MissingComponents);
        }
        Ok(())
    }

    /// Produce the results of a completed craft. Never runs on a partial
    /// craft.
    pub fn finish(
        &mut self,
        state: &mut WorkshopState,
        content: &CraftContent,
        rng: &mut impl Rng,
    ) -> Result<(FinishOutcome, Vec<EventEnvelope>)> {
        if self.status != ActivityStatus::ReadyToFinish {
            return Err(CraftError::NoActiveCraft(self.craft_id.clone()));
        }
        let recipe = state
            .crafts
            .get(&self.craft_id)
            .filter(|t| t.is_complete())
            .ok_or_else(|| CraftError::NoActiveCraft(self.craft_id.clone()))
            .and_then(|t| {
                content
                    .recipe(&t.recipe_id)
                    .ok_or_else(|| CraftError::UnknownRecipe(t.recipe_id.clone()))
            })?;
        let Some(mut tracker) = state.crafts.remove(&self.craft_id) else {
            return Err(CraftError::NoActiveCraft(self.craft_id.clone()));
        };

        let components = tracker.release_components(CraftStatus::Completed);
        let output = complete_craft(recipe, tracker.batch, components, rng);
        let results: Vec<ItemId> = output.results.iter().map(|i| i.id.clone()).collect();
        let byproducts: Vec<ItemId> = output.byproducts.iter().map(|i| i.id.clone()).collect();
        for item in output.results.into_iter().chain(output.byproducts) {
            state.pool.add(Location::Carried, item);
        }
        self.status = ActivityStatus::Finished;
        tracing::info!(craft = %self.craft_id, recipe = %recipe.id, results = results.len(), "craft completed");

        let events = emit_all(
            state,
            vec![Event::CraftCompleted {
                craft_id: self.craft_id.clone(),
                recipe_id: recipe.id.clone(),
                results: results.clone(),
                byproducts,
            }],
        );
        let outcome = if tracker.repeat && check_start(recipe, tracker.batch, &state.pool) == StartCheck::Ready {
            FinishOutcome::RepeatReady {
                results,
                recipe_id: recipe.id.clone(),
                batch: tracker.batch,
            }
        } else {
            FinishOutcome::Completed { results }
        };
        Ok((outcome, events))
    }

    /// Stop the activity. The tracker and its components stay in place for
    /// a later `start`.
    pub fn cancel(&mut self, state: &mut WorkshopState, reason: CancelReason) -> Vec<EventEnvelope> {
        self.cancel_with(state, reason, Vec::new())
    }

    fn cancel_with(
        &mut self,
        state: &mut WorkshopState,
        reason: CancelReason,
        mut events: Vec<Event>,
    ) -> Vec<EventEnvelope> {
        if self.status.is_terminal() {
            return emit_all(state, events);
        }
        self.status = ActivityStatus::Cancelled(reason);
        tracing::warn!(craft = %self.craft_id, ?reason, "craft activity cancelled");
        events.push(Event::CraftCancelled {
            craft_id: self.craft_id.clone(),
            reason,
        });
        emit_all(state, events)
    }
}

/// Give up on a craft for good: its components go back to the ground.
pub fn abandon_craft(state: &mut WorkshopState, craft_id: &CraftId) -> Result<Vec<ItemId>> {
    let mut tracker = state
        .crafts
        .remove(craft_id)
        .ok_or_else(|| CraftError::NoActiveCraft(craft_id.clone()))?;
    let items = tracker.release_components(CraftStatus::Abandoned);
    let ids = items.iter().map(|i| i.id.clone()).collect();
    for item in items {
        state.pool.add(Location::Ground, item);
    }
    tracing::info!(craft = %craft_id, "craft abandoned");
    Ok(ids)
}
