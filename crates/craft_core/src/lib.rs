//! `craft_core`: deterministic crafting and disassembly engine.
//!
//! No IO, no network. All randomness via the passed-in Rng. Callers drive
//! activities with `start`, one `tick` per turn, then `finish`.

mod activity;
mod actor;
mod batch;
mod cache;
mod command;
mod disassembly;
pub mod error;
mod failure;
mod id;
mod matcher;
mod pool;
mod practice;
mod results;
mod roll;
mod tracker;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use activity::{abandon_craft, ActivityStatus, CraftActivity, FinishOutcome, WorkConditions};
pub use actor::{ActorProfile, Crafter, Crew};
pub use batch::{batch_time, charges_for, tool_charges, CostMode, TICKS_PER_CRAFT};
pub use cache::{CacheKey, InventoryCache, InventorySnapshot};
pub use command::{check_start, CraftPlan, StartCheck};
pub use disassembly::{
    can_disassemble, complete_disassemble, component_success_chance, DisassemblyActivity,
    DisassemblyOutput,
};
pub use error::{CraftError, MissingEntry, MissingReport};
pub use failure::{handle_craft_failure, progress_loss_fraction, FailureOutcome};
pub use id::{generate_item_id, generate_uuid};
pub use matcher::{
    item_selection_available, missing_requirements, select_item_component,
    select_tool_component, tool_selection_available, ChoiceOption, ChoiceSource, CompSelection,
    Confirmation, PendingChoice, Selection, UsageFrom,
};
pub use pool::{merge_stacks, ComponentFilter, Location, PooledItem, ResourcePool, SourceScope, Stock};
pub use practice::{craft_skill_gain, roll_remainder, skill_cap};
pub use results::{complete_craft, CraftOutput, ResultTreatment};
pub use roll::{crafting_dice, crafting_success_roll, dice, disassembly_dice, DicePool, AUTOMATIC_SUCCESS};
pub use tracker::{CraftStatus, CraftTracker, PROGRESS_MAX, PROGRESS_STEP};
pub use types::*;

pub(crate) fn emit(counters: &mut Counters, turn: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, turn, event }
}

pub(crate) fn emit_all(state: &mut WorkshopState, events: Vec<Event>) -> Vec<EventEnvelope> {
    let turn = state.meta.turn;
    events
        .into_iter()
        .map(|event| emit(&mut state.counters, turn, event))
        .collect()
}

#[cfg(test)]
mod tests;
