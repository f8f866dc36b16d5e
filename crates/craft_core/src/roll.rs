//! Success roll model: skill and difficulty as opposed dice pools.

use rand::Rng;

use crate::actor::Crafter;
use crate::{ActorId, CraftContent, Recipe, TraitId};

/// Returned when the difficulty dice sum to zero.
pub const AUTOMATIC_SUCCESS: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DicePool {
    pub skill_dice: u32,
    pub skill_sides: u32,
    pub diff_dice: u32,
    pub diff_sides: u32,
    /// The assistant whose bonus dice were counted, if any.
    pub assisted_by: Option<ActorId>,
}

impl DicePool {
    /// Roll both pools and return `(skill_sum, difficulty_sum)`.
    pub fn contest(&self, rng: &mut impl Rng) -> (u32, u32) {
        let skill = dice(rng, self.skill_dice, self.skill_sides);
        let diff = dice(rng, self.diff_dice, self.diff_sides);
        (skill, diff)
    }

    /// Success ratio of one roll.
    pub fn roll(&self, rng: &mut impl Rng) -> f64 {
        let (skill, diff) = self.contest(rng);
        if diff == 0 {
            return AUTOMATIC_SUCCESS;
        }
        f64::from(skill) / f64::from(diff)
    }
}

/// Sum of `count` dice with `sides` faces each.
pub fn dice(rng: &mut impl Rng, count: u32, sides: u32) -> u32 {
    if sides == 0 {
        return 0;
    }
    (0..count).map(|_| rng.gen_range(1..=sides)).sum()
}

/// Build the pool for crafting `recipe`, with `difficulty_offset` added to the
/// recipe's difficulty.
fn dice_pool<A: Crafter>(
    recipe: &Recipe,
    actor: &A,
    assistants: &[A],
    content: &CraftContent,
    difficulty_offset: u32,
) -> DicePool {
    let c = &content.constants;
    let primary = recipe
        .skill_used
        .as_ref()
        .map_or(0, |skill| actor.skill_level(skill));
    let secondary_dice: u32 = recipe
        .required_skills
        .keys()
        .map(|skill| actor.skill_level(skill))
        .sum();
    let secondary_difficulty: u32 = recipe.required_skills.values().sum();
    let difficulty = recipe.difficulty + difficulty_offset;

    let (mut skill_dice, diff_dice) = if secondary_difficulty > 0 {
        (
            i64::from(primary * c.dice_per_level_with_secondary + secondary_dice),
            difficulty * c.dice_per_level_with_secondary + secondary_difficulty,
        )
    } else {
        (
            i64::from(primary * c.dice_per_level),
            difficulty * c.dice_per_level,
        )
    };

    let mut assisted_by = None;
    if let Some(skill) = &recipe.skill_used {
        if let Some(helper) = assistants
            .iter()
            .find(|a| a.skill_level(skill) >= primary)
        {
            skill_dice += i64::from(c.assistant_dice_bonus);
            assisted_by = Some(helper.id().clone());
        }

        for penalty in &content.sensory_penalties {
            if !actor.has_trait(&penalty.trait_id) {
                continue;
            }
            let neutralized = penalty.neutralized_by.iter().any(|fix| {
                actor.has_correction(fix) || actor.has_trait(&TraitId(fix.0.clone()))
            });
            if neutralized {
                continue;
            }
            let rank = penalty.skill_ranks.get(skill).copied().unwrap_or(0);
            skill_dice -= i64::from(rank * c.penalty_dice_per_rank);
        }

        for trait_id in actor.traits() {
            if let Some(bonus) = content
                .trait_def(trait_id)
                .and_then(|t| t.craft_skill_bonus.get(skill))
            {
                skill_dice += i64::from(*bonus);
            }
        }
    }

    DicePool {
        skill_dice: u32::try_from(skill_dice.max(0)).unwrap_or(0),
        skill_sides: c.skill_die_base_sides + actor.intelligence(),
        diff_dice,
        diff_sides: c.difficulty_die_sides,
        assisted_by,
    }
}

pub fn crafting_dice<A: Crafter>(
    recipe: &Recipe,
    actor: &A,
    assistants: &[A],
    content: &CraftContent,
) -> DicePool {
    dice_pool(recipe, actor, assistants, content, 0)
}

/// Disassembly uses the crafting shape with a harder difficulty and no help.
pub fn disassembly_dice<A: Crafter>(recipe: &Recipe, actor: &A, content: &CraftContent) -> DicePool {
    dice_pool(
        recipe,
        actor,
        &[],
        content,
        content.constants.disassembly_difficulty_offset,
    )
}

/// Non-negative success ratio for one crafting attempt; above 1 is a pass.
pub fn crafting_success_roll<A: Crafter>(
    recipe: &Recipe,
    actor: &A,
    assistants: &[A],
    content: &CraftContent,
    rng: &mut impl Rng,
) -> f64 {
    crafting_dice(recipe, actor, assistants, content).roll(rng)
}
