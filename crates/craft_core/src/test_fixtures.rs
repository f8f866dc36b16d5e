//! Shared test fixtures for craft_core and downstream crates.
//!
//! `base_content()` carries five recipes covering presence tools, charge
//! tools, secondary skills, charge-counted results and byproducts.
//! `base_state()` stocks a workshop able to start `nail_board`,
//! `rag_bandage` and `welded_frame`.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use smallvec::smallvec;

use crate::{
    ActorProfile, ChoiceSource, Confirmation, Constants, CorrectionId, CraftContent, Crew,
    DisassemblyDef, Item, ItemComp, ItemId, ItemTypeId, Location, PendingChoice, Recipe,
    RecipeFlag, RecipeId, Requirements, ResourcePool, SensoryPenalty, SkillId, ToolComp, TraitDef,
    TraitId, WorkshopState,
};

pub fn base_constants() -> Constants {
    Constants {
        skill_die_base_sides: 16,
        difficulty_die_sides: 24,
        dice_per_level: 4,
        dice_per_level_with_secondary: 3,
        assistant_dice_bonus: 2,
        penalty_dice_per_rank: 4,
        failure_destroy_fraction: 0.75,
        failure_loss_min: 0.25,
        failure_loss_mean: 0.35,
        disassembly_difficulty_offset: 2,
        disassembly_damage_recovery_base: 0.8,
        min_craft_light: 2.0,
        one_assistant_time_factor: 0.75,
        many_assistants_time_factor: 0.6,
        skill_cap_multiplier: 1.25,
        practice_time_divisor: 30_000.0,
    }
}

fn skill(id: &str) -> Option<SkillId> {
    Some(SkillId(id.to_string()))
}

fn plain_recipe(id: &str, result: &str, time: u32) -> Recipe {
    Recipe {
        id: RecipeId(id.to_string()),
        result: ItemTypeId(result.to_string()),
        result_charges: None,
        result_mult: 1,
        skill_used: None,
        difficulty: 0,
        required_skills: BTreeMap::new(),
        time,
        batch_time_factors: None,
        requirements: Requirements::default(),
        byproducts: Vec::new(),
        flags: Vec::new(),
        disassembly: None,
    }
}

pub fn base_content() -> CraftContent {
    let nail_board = Recipe {
        skill_used: skill("fabrication"),
        requirements: Requirements {
            components: vec![smallvec![ItemComp::new("nail", 2).in_charges()]],
            tools: vec![smallvec![ToolComp::new("hammer", -1)]],
        },
        disassembly: Some(DisassemblyDef {
            time: 500,
            tools: vec![smallvec![ToolComp::new("hammer", -1)]],
            batch_size: 1,
        }),
        ..plain_recipe("nail_board", "nailed_board", 1_000)
    };
    let rag_bandage = Recipe {
        skill_used: skill("firstaid"),
        difficulty: 1,
        requirements: Requirements {
            components: vec![smallvec![ItemComp::new("rag", 3)]],
            tools: Vec::new(),
        },
        flags: vec![RecipeFlag::BlindEasy],
        ..plain_recipe("rag_bandage", "bandage", 3_000)
    };
    let welded_frame = Recipe {
        skill_used: skill("fabrication"),
        difficulty: 3,
        required_skills: BTreeMap::from([(SkillId("mechanics".to_string()), 1)]),
        requirements: Requirements {
            components: vec![
                smallvec![ItemComp::new("steel_chunk", 4)],
                smallvec![ItemComp::new("scrap", 2), ItemComp::new("nail", 10).in_charges()],
            ],
            tools: vec![
                smallvec![ToolComp::new("welder", 10), ToolComp::new("oxy_torch", 5)],
                smallvec![ToolComp::new("hammer", -1)],
            ],
        },
        byproducts: vec![(ItemTypeId("metal_shavings".to_string()), 1)],
        disassembly: Some(DisassemblyDef {
            time: 3_000,
            tools: vec![smallvec![ToolComp::new("hacksaw", -1)]],
            batch_size: 1,
        }),
        ..plain_recipe("welded_frame", "welded_frame", 60_000)
    };
    let jerky = Recipe {
        result_charges: Some(4),
        skill_used: skill("cooking"),
        difficulty: 2,
        requirements: Requirements {
            components: vec![smallvec![ItemComp::new("meat", 1)]],
            tools: vec![smallvec![ToolComp::new("dehydrator", 5)]],
        },
        flags: vec![RecipeFlag::DehydrateResult],
        ..plain_recipe("jerky", "jerky", 6_000)
    };
    let tailored_pouch = Recipe {
        skill_used: skill("tailor"),
        difficulty: 2,
        requirements: Requirements {
            components: vec![
                smallvec![ItemComp::new("rag", 4), ItemComp::new("leather", 2)],
                smallvec![ItemComp::new("thread", 10).in_charges()],
            ],
            tools: vec![smallvec![ToolComp::new("sewing_kit", 5)]],
        },
        ..plain_recipe("tailored_pouch", "pouch", 10_000)
    };

    CraftContent {
        content_version: "test".to_string(),
        recipes: vec![nail_board, rag_bandage, welded_frame, jerky, tailored_pouch],
        traits: vec![TraitDef {
            id: TraitId("STEADY_HANDS".to_string()),
            craft_skill_bonus: BTreeMap::from([(SkillId("fabrication".to_string()), 2)]),
        }],
        sensory_penalties: vec![SensoryPenalty {
            trait_id: TraitId("HYPEROPIC".to_string()),
            neutralized_by: vec![
                CorrectionId("reading_glasses".to_string()),
                CorrectionId("contacts".to_string()),
            ],
            skill_ranks: BTreeMap::from([
                (SkillId("electronics".to_string()), 2),
                (SkillId("tailor".to_string()), 1),
            ]),
        }],
        constants: base_constants(),
    }
}

/// Look up a recipe that the fixture content is known to contain.
pub fn recipe<'c>(content: &'c CraftContent, id: &str) -> &'c Recipe {
    content
        .recipe(&RecipeId(id.to_string()))
        .unwrap_or_else(|| panic!("fixture recipe {id} missing"))
}

pub fn base_actor() -> ActorProfile {
    ActorProfile::new("crafter", 8)
        .with_skill("fabrication", 3)
        .with_skill("mechanics", 2)
        .with_skill("tailor", 2)
        .with_skill("cooking", 2)
        .with_skill("firstaid", 1)
}

pub fn base_crew() -> Crew<ActorProfile> {
    Crew::solo(base_actor())
}

fn unit(id: &str, type_id: &str) -> Item {
    Item::unit(ItemId(id.to_string()), ItemTypeId(type_id.to_string()))
}

/// Carried: 5 nails, hammer, welder (500), 4 steel chunks, 2 scrap, 3 rags,
/// 20 thread, sewing kit (50). Nearby: hacksaw.
pub fn base_pool() -> ResourcePool {
    let mut pool = ResourcePool::new();
    pool.add(
        Location::Carried,
        Item::stack(ItemId("nails_1".to_string()), ItemTypeId("nail".to_string()), 5),
    );
    pool.add(Location::Carried, unit("hammer_1", "hammer"));
    pool.add(
        Location::Carried,
        Item::tool(ItemId("welder_1".to_string()), ItemTypeId("welder".to_string()), 500),
    );
    for i in 1..=4 {
        pool.add(Location::Carried, unit(&format!("steel_{i}"), "steel_chunk"));
    }
    for i in 1..=2 {
        pool.add(Location::Carried, unit(&format!("scrap_{i}"), "scrap"));
    }
    for i in 1..=3 {
        pool.add(Location::Carried, unit(&format!("rag_{i}"), "rag"));
    }
    pool.add(
        Location::Carried,
        Item::stack(ItemId("thread_1".to_string()), ItemTypeId("thread".to_string()), 20),
    );
    pool.add(
        Location::Carried,
        Item::tool(ItemId("sewing_kit_1".to_string()), ItemTypeId("sewing_kit".to_string()), 50),
    );
    pool.add(Location::Ground, unit("hacksaw_1", "hacksaw"));
    pool
}

pub fn base_state(content: &CraftContent) -> WorkshopState {
    WorkshopState::new(42, &content.content_version, base_pool())
}

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

/// Picks the first option of every pending choice and accepts every
/// confirmation.
pub struct AlwaysFirst;

impl ChoiceSource for AlwaysFirst {
    fn choose_component(&mut self, _pending: &PendingChoice<ItemComp>) -> Option<usize> {
        Some(0)
    }

    fn choose_tool(&mut self, _pending: &PendingChoice<ToolComp>) -> Option<usize> {
        Some(0)
    }

    fn confirm(&mut self, _question: Confirmation) -> bool {
        true
    }
}

/// Declines everything.
pub struct DeclineAll;

impl ChoiceSource for DeclineAll {
    fn choose_component(&mut self, _pending: &PendingChoice<ItemComp>) -> Option<usize> {
        None
    }

    fn choose_tool(&mut self, _pending: &PendingChoice<ToolComp>) -> Option<usize> {
        None
    }

    fn confirm(&mut self, _question: Confirmation) -> bool {
        false
    }
}
