use super::*;
use crate::test_fixtures::{base_content, base_crew, base_state, make_rng, AlwaysFirst};
use rand_chacha::ChaCha8Rng;

mod persistence;

// --- Shared test helpers ------------------------------------------------

fn daylight(moves: u32) -> WorkConditions {
    WorkConditions {
        light: 10.0,
        speed: 1.0,
        moves,
    }
}

/// Plan and commit `recipe` with an always-agreeing chooser.
fn begin(
    state: &mut WorkshopState,
    content: &CraftContent,
    recipe: &str,
    batch: u32,
    rng: &mut ChaCha8Rng,
) -> CraftId {
    let plan = CraftPlan::build(
        content,
        &RecipeId(recipe.to_string()),
        batch,
        &state.pool,
        false,
        &mut AlwaysFirst,
    )
    .unwrap();
    plan.execute(state, content, rng, &mut Vec::new()).unwrap()
}

/// Tick until the activity leaves `Running` or `limit` turns pass.
fn run_until_stopped(
    activity: &mut CraftActivity,
    state: &mut WorkshopState,
    content: &CraftContent,
    crew: &mut Crew<ActorProfile>,
    moves: u32,
    rng: &mut ChaCha8Rng,
    limit: usize,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    for _ in 0..limit {
        if activity.status() != ActivityStatus::Running {
            break;
        }
        state.meta.turn += 1;
        events.extend(activity.tick(state, content, crew, daylight(moves), &mut AlwaysFirst, rng));
    }
    events
}

fn has_event(events: &[EventEnvelope], pred: impl Fn(&Event) -> bool) -> bool {
    events.iter().any(|e| pred(&e.event))
}

fn unit(id: &str, type_id: &str) -> Item {
    Item::unit(ItemId(id.to_string()), ItemTypeId(type_id.to_string()))
}
