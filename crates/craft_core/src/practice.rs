//! Skill practice granted on each 5% tick.

use rand::Rng;

use crate::actor::Crafter;
use crate::batch::batch_time;
use crate::{Constants, Event, Recipe};

/// Round down, then round up with probability equal to the remainder.
pub fn roll_remainder(value: f64, rng: &mut impl Rng) -> u32 {
    let value = value.max(0.0);
    let whole = value.floor();
    let bump = u32::from(rng.gen::<f64>() < value - whole);
    whole as u32 + bump
}

fn per_tick(level: u32, batch_mult: f64, rng: &mut impl Rng) -> u32 {
    roll_remainder(f64::from(level * 15 + 10) * batch_mult / 20.0, rng)
}

/// Learning stops at `difficulty × skill_cap_multiplier`.
pub fn skill_cap(difficulty: u32, constants: &Constants) -> u32 {
    (f64::from(difficulty) * constants.skill_cap_multiplier) as u32
}

/// Practice for `steps` crossed ticks, for the crafter, the recipe's
/// secondary skills, and every assistant.
pub fn craft_skill_gain<A: Crafter>(
    recipe: &Recipe,
    batch: u32,
    steps: u32,
    actor: &mut A,
    assistants: &mut [A],
    constants: &Constants,
    rng: &mut impl Rng,
) -> Vec<Event> {
    let mut events = Vec::new();
    let Some(skill) = recipe.skill_used.as_ref() else {
        return events;
    };
    let time_bonus =
        batch_time(recipe, batch, 1.0, 0, constants) as f64 / constants.practice_time_divisor;
    let batch_mult = f64::from(batch) + time_bonus;

    let base = per_tick(recipe.difficulty, batch_mult, rng) * steps;
    let cap = skill_cap(recipe.difficulty, constants);
    if base > 0 && actor.practice(skill, base, cap) {
        events.push(Event::SkillPracticed {
            actor: actor.id().clone(),
            skill: skill.clone(),
            amount: base,
        });
    }

    for (secondary, &level) in &recipe.required_skills {
        let amount = roll_remainder(f64::from(per_tick(level, batch_mult, rng) * steps) / 2.0, rng);
        if amount > 0 && actor.practice(secondary, amount, skill_cap(level, constants)) {
            events.push(Event::SkillPracticed {
                actor: actor.id().clone(),
                skill: secondary.clone(),
                amount,
            });
        }
    }

    for helper in assistants.iter_mut() {
        // Helpers who understand the work learn more than onlookers.
        let divisor = if helper.skill_level(skill) >= recipe.difficulty {
            2.0
        } else {
            10.0
        };
        let amount = roll_remainder(f64::from(base) / divisor, rng);
        if amount > 0 && helper.practice(skill, amount, cap) {
            events.push(Event::SkillPracticed {
                actor: helper.id().clone(),
                skill: skill.clone(),
                amount,
            });
        }
    }
    events
}
