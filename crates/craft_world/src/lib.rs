//! Content loading and demo scenarios shared by craft_cli and the tests.

use anyhow::{bail, Context, Result};
use craft_core::{
    generate_item_id, ActorProfile, Constants, CraftContent, Item, ItemTypeId, Location, Recipe,
    RecipeId, ResourcePool, SensoryPenalty, TraitDef, WorkshopState,
};
use rand::Rng;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Deserialize)]
struct RecipesFile {
    content_version: String,
    recipes: Vec<Recipe>,
}

#[derive(Deserialize)]
struct TraitsFile {
    traits: Vec<TraitDef>,
}

#[derive(Deserialize)]
struct PenaltiesFile {
    sensory_penalties: Vec<SensoryPenalty>,
}

/// Validates loaded content, panicking on any authoring error.
///
/// Catches mistakes like: duplicate recipe ids, an empty alternative group,
/// a zero-time recipe, or a penalty keyed on a trait nobody defines.
pub fn validate_content(content: &CraftContent) {
    let mut recipe_ids: HashSet<&RecipeId> = HashSet::new();
    for recipe in &content.recipes {
        assert!(
            recipe_ids.insert(&recipe.id),
            "recipe '{}' is defined more than once",
            recipe.id,
        );
        validate_recipe(recipe);
    }

    let mut trait_ids = HashSet::new();
    for def in &content.traits {
        assert!(
            trait_ids.insert(&def.id),
            "trait '{}' is defined more than once",
            def.id,
        );
    }
    for penalty in &content.sensory_penalties {
        assert!(
            !penalty.skill_ranks.is_empty(),
            "sensory penalty '{}' penalizes no skills",
            penalty.trait_id,
        );
    }

    let c = &content.constants;
    assert!(c.skill_die_base_sides > 0, "skill_die_base_sides must be positive");
    assert!(c.difficulty_die_sides > 0, "difficulty_die_sides must be positive");
    assert!(
        (0.0..=1.0).contains(&c.failure_destroy_fraction),
        "failure_destroy_fraction must be within 0..=1",
    );
    assert!(
        c.failure_loss_min > 0.0 && c.failure_loss_mean > c.failure_loss_min,
        "failure loss mean must exceed a positive minimum",
    );
    assert!(
        c.practice_time_divisor > 0.0,
        "practice_time_divisor must be positive",
    );
}

fn validate_recipe(recipe: &Recipe) {
    assert!(recipe.time > 0, "recipe '{}' has zero time", recipe.id);
    assert!(recipe.result_mult > 0, "recipe '{}' has zero result_mult", recipe.id);
    assert!(
        recipe.result_charges != Some(0),
        "recipe '{}' produces zero charges",
        recipe.id,
    );
    if let Some(factors) = recipe.batch_time_factors {
        assert!(
            (0.0..1.0).contains(&factors.rscale) && factors.rsize > 0,
            "recipe '{}' has batch time factors out of range",
            recipe.id,
        );
    }
    for group in &recipe.requirements.components {
        assert!(
            !group.is_empty(),
            "recipe '{}' has an empty component group",
            recipe.id,
        );
        for comp in group {
            assert!(
                comp.count != 0,
                "recipe '{}' component '{}' has a zero count",
                recipe.id,
                comp.type_id,
            );
        }
    }
    let disassembly_tools = recipe
        .disassembly
        .iter()
        .flat_map(|def| def.tools.iter());
    for group in recipe.requirements.tools.iter().chain(disassembly_tools) {
        assert!(!group.is_empty(), "recipe '{}' has an empty tool group", recipe.id);
    }
    if let Some(def) = &recipe.disassembly {
        assert!(def.time > 0, "recipe '{}' disassembles in zero time", recipe.id);
        assert!(
            def.batch_size > 0,
            "recipe '{}' has a zero disassembly batch size",
            recipe.id,
        );
    }
}

pub fn load_content(content_dir: &str) -> Result<CraftContent> {
    let dir = Path::new(content_dir);
    let constants: Constants = serde_json::from_str(
        &std::fs::read_to_string(dir.join("constants.json")).context("reading constants.json")?,
    )
    .context("parsing constants.json")?;
    let recipes_file: RecipesFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("recipes.json")).context("reading recipes.json")?,
    )
    .context("parsing recipes.json")?;
    let traits_file: TraitsFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("traits.json")).context("reading traits.json")?,
    )
    .context("parsing traits.json")?;
    let penalties_file: PenaltiesFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("penalties.json")).context("reading penalties.json")?,
    )
    .context("parsing penalties.json")?;
    let content = CraftContent {
        content_version: recipes_file.content_version,
        recipes: recipes_file.recipes,
        traits: traits_file.traits,
        sensory_penalties: penalties_file.sensory_penalties,
        constants,
    };
    validate_content(&content);
    Ok(content)
}

/// Named starting setups for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// A stocked workbench: enough for one of everything in the content pack.
    Basic,
    /// Little to build with, plus worn finished goods to take apart.
    Scrapyard,
}

impl Scenario {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "basic" => Ok(Scenario::Basic),
            "scrapyard" => Ok(Scenario::Scrapyard),
            other => bail!("unknown scenario '{other}' (expected basic or scrapyard)"),
        }
    }
}

fn spawn(rng: &mut impl Rng, type_id: &str) -> Item {
    Item::unit(generate_item_id(rng), ItemTypeId(type_id.to_string()))
}

fn spawn_stack(rng: &mut impl Rng, type_id: &str, charges: u32) -> Item {
    Item::stack(generate_item_id(rng), ItemTypeId(type_id.to_string()), charges)
}

fn spawn_tool(rng: &mut impl Rng, type_id: &str, charges: u32) -> Item {
    Item::tool(generate_item_id(rng), ItemTypeId(type_id.to_string()), charges)
}

fn basic_pool(rng: &mut impl Rng) -> ResourcePool {
    let mut pool = ResourcePool::new();
    let carried = [
        spawn_stack(rng, "nail", 40),
        spawn(rng, "hammer"),
        spawn_tool(rng, "welder", 200),
        spawn_stack(rng, "thread", 50),
        spawn_tool(rng, "sewing_kit", 100),
        spawn_stack(rng, "water", 4),
    ];
    for item in carried {
        pool.add(Location::Carried, item);
    }
    for _ in 0..8 {
        let rag = spawn(rng, "rag");
        pool.add(Location::Carried, rag);
    }
    for _ in 0..4 {
        let meat = spawn(rng, "meat");
        pool.add(Location::Carried, meat);
    }
    for _ in 0..8 {
        let steel = spawn(rng, "steel_chunk");
        pool.add(Location::Ground, steel);
    }
    for _ in 0..6 {
        let scrap = spawn(rng, "scrap");
        pool.add(Location::Ground, scrap);
    }
    let nearby = [
        spawn_stack(rng, "leather", 6),
        spawn_tool(rng, "dehydrator", 60),
        spawn_tool(rng, "hotplate", 40),
        spawn(rng, "hacksaw"),
        spawn_tool(rng, "soldering_iron", 30),
        spawn(rng, "battery_cell"),
    ];
    for item in nearby {
        pool.add(Location::Ground, item);
    }
    pool
}

fn scrapyard_pool(rng: &mut impl Rng) -> ResourcePool {
    let mut pool = ResourcePool::new();
    pool.add(Location::Carried, spawn(rng, "hammer"));
    pool.add(Location::Carried, spawn_stack(rng, "nail", 3));
    pool.add(Location::Ground, spawn(rng, "hacksaw"));
    for damage_level in 0..4u8 {
        let mut frame = spawn(rng, "welded_frame");
        frame.damage_level = damage_level;
        pool.add(Location::Ground, frame);
    }
    let mut knife = spawn(rng, "scrap_knife");
    knife.components = vec![spawn(rng, "scrap"), spawn(rng, "rag")];
    pool.add(Location::Carried, knife);
    pool.add(Location::Ground, spawn(rng, "nailed_board"));
    pool
}

/// The demo crafter. NPCs answer their own choices.
pub fn demo_actor(npc: bool) -> ActorProfile {
    let actor = ActorProfile::new("actor_0001", 9)
        .with_skill("fabrication", 4)
        .with_skill("mechanics", 2)
        .with_skill("tailor", 3)
        .with_skill("cooking", 3)
        .with_skill("firstaid", 2)
        .with_skill("electronics", 1)
        .with_trait("STEADY_HANDS");
    if npc {
        actor.npc()
    } else {
        actor
    }
}

pub fn build_initial_state(
    content: &CraftContent,
    seed: u64,
    scenario: Scenario,
    rng: &mut impl Rng,
) -> WorkshopState {
    let pool = match scenario {
        Scenario::Basic => basic_pool(rng),
        Scenario::Scrapyard => scrapyard_pool(rng),
    };
    WorkshopState::new(seed, &content.content_version, pool)
}
