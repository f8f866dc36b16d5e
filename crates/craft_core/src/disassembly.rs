//! Disassembly: take a finished item apart and roll for each component.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activity::{too_dark, ActivityStatus, WorkConditions};
use crate::actor::Crafter;
use crate::batch::{effective_speed, CostMode};
use crate::command::{consume_tools, resolve_tool};
use crate::error::{CraftError, Result};
use crate::id::generate_item_id;
use crate::matcher::{missing_requirements, ChoiceSource, CompSelection};
use crate::pool::{ComponentFilter, Location};
use crate::roll::disassembly_dice;
use crate::{
    emit_all, CancelReason, CraftContent, Event, EventEnvelope, Item, ItemId, ItemTypeId, Recipe,
    RecipeId, RecoveryFailure, Requirements, ToolComp, WorkshopState,
};

/// The reversible recipe for `item_id`, if the item may be taken apart now.
pub fn can_disassemble<'c>(
    item_id: &ItemId,
    state: &WorkshopState,
    content: &'c CraftContent,
) -> Result<&'c Recipe> {
    let item = &state
        .pool
        .find(item_id)
        .ok_or_else(|| CraftError::InvalidTarget(item_id.clone()))?
        .item;
    let recipe = content
        .uncraft_recipe(&item.type_id)
        .ok_or_else(|| CraftError::InvalidTarget(item_id.clone()))?;
    let Some(def) = recipe.disassembly.as_ref() else {
        return Err(CraftError::InvalidTarget(item_id.clone()));
    };
    if item.rotten || item.contained_creature.is_some() {
        return Err(CraftError::InvalidTarget(item_id.clone()));
    }
    if item.count_by_charges && item.charges < def.batch_size {
        return Err(CraftError::InsufficientQuantity {
            type_id: item.type_id.clone(),
            required: def.batch_size,
            available: item.charges,
        });
    }
    let tools = Requirements {
        components: Vec::new(),
        tools: def.tools.clone(),
    };
    let missing = missing_requirements(&tools, 1, &state.pool, ComponentFilter::ANY, CostMode::Complete);
    if !missing.is_empty() {
        return Err(CraftError::MissingRequirements(missing));
    }
    Ok(recipe)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisassemblyOutput {
    pub recovered: Vec<Item>,
    pub lost: Vec<(ItemTypeId, RecoveryFailure)>,
}

/// Chance that a component survives coming out of an item this damaged.
pub fn component_success_chance(damage_level: u8, content: &CraftContent) -> f64 {
    content
        .constants
        .disassembly_damage_recovery_base
        .powi(i32::from(damage_level))
        .min(1.0)
}

/// Roll recovery for every component of `item`.
///
/// Recorded provenance is used when present; otherwise the first alternative
/// of each component group is assumed.
pub fn complete_disassemble<A: Crafter>(
    item: &Item,
    recipe: &Recipe,
    actor: &A,
    content: &CraftContent,
    rng: &mut impl Rng,
) -> DisassemblyOutput {
    let candidates: Vec<Item> = if item.components.is_empty() {
        let mut assumed = Vec::new();
        for comp in recipe.requirements.components.iter().filter_map(|group| group.first()) {
            let count = comp.required(1);
            if comp.by_charges {
                assumed.push(Item::stack(generate_item_id(rng), comp.type_id.clone(), count));
            } else {
                assumed.extend(
                    (0..count).map(|_| Item::unit(generate_item_id(rng), comp.type_id.clone())),
                );
            }
        }
        assumed
    } else {
        item.components.clone()
    };

    let dice = disassembly_dice(recipe, actor, content);
    let chance = component_success_chance(item.damage_level, content);
    let mut output = DisassemblyOutput::default();
    for mut candidate in candidates {
        if recipe.difficulty != 0 {
            let (skill, diff) = dice.contest(rng);
            if diff > skill {
                output.lost.push((candidate.type_id, RecoveryFailure::Skill));
                continue;
            }
        }
        if rng.gen::<f64>() >= chance {
            output.lost.push((candidate.type_id, RecoveryFailure::Damage));
            continue;
        }
        candidate.favorite = false;
        output.recovered.push(candidate);
    }
    output
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisassemblyActivity {
    item_id: ItemId,
    recipe_id: RecipeId,
    status: ActivityStatus,
    moves_left: u32,
    tools: Vec<CompSelection<ToolComp>>,
}

impl DisassemblyActivity {
    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    pub fn status(&self) -> ActivityStatus {
        self.status
    }

    pub fn moves_left(&self) -> u32 {
        self.moves_left
    }

    pub fn start(
        item_id: ItemId,
        state: &mut WorkshopState,
        content: &CraftContent,
        is_npc: bool,
        choices: &mut (impl ChoiceSource + ?Sized),
    ) -> Result<(Self, Vec<EventEnvelope>)> {
        let recipe = can_disassemble(&item_id, state, content)?;
        let Some(def) = recipe.disassembly.as_ref() else {
            return Err(CraftError::InvalidTarget(item_id));
        };
        let mut tools = Vec::with_capacity(def.tools.len());
        for group in &def.tools {
            let selection = resolve_tool(group, 1, &state.pool, CostMode::Complete, is_npc, choices)
                .ok_or(CraftError::Declined)?;
            tools.push(selection);
        }
        tracing::info!(item = %item_id, recipe = %recipe.id, "disassembly started");
        let events = emit_all(
            state,
            vec![Event::DisassemblyStarted {
                item_id: item_id.clone(),
                recipe_id: recipe.id.clone(),
            }],
        );
        let activity = Self {
            item_id,
            recipe_id: recipe.id.clone(),
            status: ActivityStatus::Running,
            moves_left: def.time.max(1),
            tools,
        };
        Ok((activity, events))
    }

    pub fn tick(
        &mut self,
        state: &mut WorkshopState,
        content: &CraftContent,
        conditions: WorkConditions,
    ) -> Vec<EventEnvelope> {
        if self.status != ActivityStatus::Running {
            return Vec::new();
        }
        if state.pool.find(&self.item_id).is_none() {
            return self.cancel(state, CancelReason::TargetLost);
        }
        let Some(recipe) = content.recipe(&self.recipe_id) else {
            return self.cancel(state, CancelReason::InvalidTarget);
        };
        if too_dark(recipe, &conditions, content) {
            return self.cancel(state, CancelReason::TooDark);
        }
        let worked = (f64::from(conditions.moves) * effective_speed(conditions.speed)).round() as u32;
        self.moves_left = self.moves_left.saturating_sub(worked);
        if self.moves_left == 0 {
            self.status = ActivityStatus::ReadyToFinish;
        }
        Vec::new()
    }

    /// Pay for tools, remove the item, and return whatever survives.
    pub fn finish<A: Crafter>(
        &mut self,
        state: &mut WorkshopState,
        content: &CraftContent,
        actor: &mut A,
        rng: &mut impl Rng,
    ) -> Result<Vec<EventEnvelope>> {
        if self.status != ActivityStatus::ReadyToFinish {
            return Err(CraftError::InvalidTarget(self.item_id.clone()));
        }
        let recipe = match can_disassemble(&self.item_id, state, content) {
            Ok(recipe) => recipe,
            Err(err) => {
                let reason = match err {
                    CraftError::MissingRequirements(_) => CancelReason::MissingTools,
                    _ => CancelReason::InvalidTarget,
                };
                self.cancel(state, reason);
                return Err(err);
            }
        };
        let batch_size = recipe.disassembly.as_ref().map_or(1, |d| d.batch_size);

        let mut pending = Vec::new();
        consume_tools(state, &self.tools, 1, CostMode::Complete, 1, &mut pending)?;
        let item = self.take_target(state, batch_size, rng)?;

        let output = complete_disassemble(&item, recipe, actor, content, rng);
        for (type_id, reason) in output.lost {
            pending.push(Event::RecoveryFailed { type_id, reason });
        }
        let recovered = u32::try_from(output.recovered.len()).unwrap_or(u32::MAX);
        for component in output.recovered {
            pending.push(Event::ComponentRecovered {
                type_id: component.type_id.clone(),
                item_id: component.id.clone(),
            });
            state.pool.add(Location::Ground, component);
        }

        if let Some(skill) = &recipe.skill_used {
            let amount = recipe.difficulty * 2;
            if amount > 0 && actor.practice(skill, amount, recipe.difficulty) {
                pending.push(Event::SkillPracticed {
                    actor: actor.id().clone(),
                    skill: skill.clone(),
                    amount,
                });
            }
        }
        pending.push(Event::DisassemblyCompleted {
            item_id: self.item_id.clone(),
            recovered,
        });
        self.status = ActivityStatus::Finished;
        tracing::info!(item = %self.item_id, recovered, "disassembly completed");
        Ok(emit_all(state, pending))
    }

    /// Remove the whole item, or one disassembly batch from a charge stack.
    fn take_target(
        &self,
        state: &mut WorkshopState,
        batch_size: u32,
        rng: &mut impl Rng,
    ) -> Result<Item> {
        if let Some(piece) = state.pool.split_stack(&self.item_id, batch_size, rng) {
            return Ok(piece);
        }
        state
            .pool
            .take_item(&self.item_id)
            .map(|p| p.item)
            .ok_or_else(|| CraftError::InvalidTarget(self.item_id.clone()))
    }

    pub fn cancel(&mut self, state: &mut WorkshopState, reason: CancelReason) -> Vec<EventEnvelope> {
        if self.status.is_terminal() {
            return Vec::new();
        }
        self.status = ActivityStatus::Cancelled(reason);
        tracing::warn!(item = %self.item_id, ?reason, "disassembly cancelled");
        emit_all(
            state,
            vec![Event::DisassemblyCancelled {
                item_id: self.item_id.clone(),
                reason,
            }],
        )
    }
}
