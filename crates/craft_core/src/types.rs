//! Type definitions for `craft_core`.
//!
//! Content (recipes, traits, penalty tables, constants), item and requirement
//! types, the persisted workshop state, and the event stream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::matcher::UsageFrom;
use crate::pool::ResourcePool;
use crate::tracker::CraftTracker;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(ItemTypeId);
string_id!(RecipeId);
string_id!(SkillId);
string_id!(TraitId);
string_id!(CorrectionId);
string_id!(ActorId);
string_id!(ItemId);
string_id!(CraftId);
string_id!(EventId);

/// Ordered set of interchangeable ways to satisfy one requirement slot.
pub type AlternativeGroup<T> = SmallVec<[T; 4]>;

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub type_id: ItemTypeId,
    /// Stacks counted by charges report `charges` as their quantity.
    #[serde(default)]
    pub count_by_charges: bool,
    /// Stack size for charge-counted items, or charges held by a tool.
    #[serde(default)]
    pub charges: u32,
    /// 0 (pristine) to 4 (nearly destroyed).
    #[serde(default)]
    pub damage_level: u8,
    #[serde(default)]
    pub rotten: bool,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub cooked: bool,
    #[serde(default)]
    pub byproduct: bool,
    #[serde(default)]
    pub contained_creature: Option<String>,
    /// Items this one was crafted from. Disassembly returns these.
    #[serde(default)]
    pub components: Vec<Item>,
}

impl Item {
    pub fn unit(id: ItemId, type_id: ItemTypeId) -> Self {
        Self {
            id,
            type_id,
            count_by_charges: false,
            charges: 0,
            damage_level: 0,
            rotten: false,
            favorite: false,
            cooked: false,
            byproduct: false,
            contained_creature: None,
            components: Vec::new(),
        }
    }

    pub fn stack(id: ItemId, type_id: ItemTypeId, charges: u32) -> Self {
        Self {
            count_by_charges: true,
            charges,
            ..Self::unit(id, type_id)
        }
    }

    pub fn tool(id: ItemId, type_id: ItemTypeId, charges: u32) -> Self {
        Self {
            charges,
            ..Self::unit(id, type_id)
        }
    }

    /// Amount this item contributes toward a component requirement.
    pub fn quantity(&self) -> u32 {
        if self.count_by_charges {
            self.charges
        } else {
            1
        }
    }
}

// ---------------------------------------------------------------------------
// Requirements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemComp {
    pub type_id: ItemTypeId,
    /// Positive counts are per unit and scale with the batch; zero or negative
    /// counts are an absolute amount.
    pub count: i32,
    /// The component comes in charge-counted stacks (nails, thread).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub by_charges: bool,
}

impl ItemComp {
    pub fn new(type_id: &str, count: i32) -> Self {
        Self {
            type_id: ItemTypeId(type_id.to_string()),
            count,
            by_charges: false,
        }
    }

    pub fn in_charges(self) -> Self {
        Self {
            by_charges: true,
            ..self
        }
    }

    pub fn required(&self, batch: u32) -> u32 {
        if self.count > 0 {
            self.count.unsigned_abs() * batch
        } else {
            self.count.unsigned_abs()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolComp {
    pub type_id: ItemTypeId,
    /// Charges drawn per unit of batch. Zero or negative means the tool only
    /// has to be present.
    pub count: i32,
}

impl ToolComp {
    pub fn new(type_id: &str, count: i32) -> Self {
        Self {
            type_id: ItemTypeId(type_id.to_string()),
            count,
        }
    }

    pub fn uses_charges(&self) -> bool {
        self.count > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub components: Vec<AlternativeGroup<ItemComp>>,
    #[serde(default)]
    pub tools: Vec<AlternativeGroup<ToolComp>>,
}

impl Requirements {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.tools.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipeFlag {
    /// Results do not record their components.
    NutrientOverride,
    HotResult,
    DehydrateResult,
    /// Can be worked on without light.
    BlindEasy,
    /// Accepted so content loads; this engine has no magazines, so it has
    /// no effect.
    FullMagazine,
    /// Accepted so content loads; items here carry no fit or size, so it has
    /// no effect.
    NoResize,
}

impl RecipeFlag {
    /// Flags that load and validate but change nothing in crafting or
    /// disassembly.
    pub const INERT: [RecipeFlag; 2] = [RecipeFlag::FullMagazine, RecipeFlag::NoResize];

    pub fn is_inert(self) -> bool {
        Self::INERT.contains(&self)
    }
}

/// Logistic batch discount: at `rsize` units the marginal unit costs
/// `1 - rscale` of a single craft.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchTimeFactors {
    pub rscale: f64,
    pub rsize: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisassemblyDef {
    /// Moves needed to take one unit apart.
    pub time: u32,
    #[serde(default)]
    pub tools: Vec<AlternativeGroup<ToolComp>>,
    /// Charges consumed per disassembly of a charge-counted item.
    #[serde(default = "default_one")]
    pub batch_size: u32,
}

fn default_one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub result: ItemTypeId,
    /// Set for results counted by charges: charges produced per batch unit.
    #[serde(default)]
    pub result_charges: Option<u32>,
    #[serde(default = "default_one")]
    pub result_mult: u32,
    #[serde(default)]
    pub skill_used: Option<SkillId>,
    #[serde(default)]
    pub difficulty: u32,
    /// Secondary skills and their minimum levels.
    #[serde(default)]
    pub required_skills: BTreeMap<SkillId, u32>,
    /// Moves for a batch of one.
    pub time: u32,
    #[serde(default)]
    pub batch_time_factors: Option<BatchTimeFactors>,
    #[serde(default)]
    pub requirements: Requirements,
    #[serde(default)]
    pub byproducts: Vec<(ItemTypeId, u32)>,
    #[serde(default)]
    pub flags: Vec<RecipeFlag>,
    #[serde(default)]
    pub disassembly: Option<DisassemblyDef>,
}

impl Recipe {
    pub fn has_flag(&self, flag: RecipeFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_reversible(&self) -> bool {
        self.disassembly.is_some()
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitDef {
    pub id: TraitId,
    /// Extra success dice when the recipe's primary skill matches.
    #[serde(default)]
    pub craft_skill_bonus: BTreeMap<SkillId, i32>,
}

/// A sensory trait that removes dice from specific skills unless a
/// compensating trait or worn correction is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensoryPenalty {
    pub trait_id: TraitId,
    #[serde(default)]
    pub neutralized_by: Vec<CorrectionId>,
    /// Penalty rank per skill; each rank costs `penalty_dice_per_rank` dice.
    pub skill_ranks: BTreeMap<SkillId, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CraftContent {
    pub content_version: String,
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub traits: Vec<TraitDef>,
    #[serde(default)]
    pub sensory_penalties: Vec<SensoryPenalty>,
    pub constants: Constants,
}

impl CraftContent {
    pub fn recipe(&self, id: &RecipeId) -> Option<&Recipe> {
        self.recipes.iter().find(|r| &r.id == id)
    }

    /// The reversible recipe producing `type_id`, if any.
    pub fn uncraft_recipe(&self, type_id: &ItemTypeId) -> Option<&Recipe> {
        self.recipes
            .iter()
            .find(|r| &r.result == type_id && r.is_reversible())
    }

    pub fn trait_def(&self, id: &TraitId) -> Option<&TraitDef> {
        self.traits.iter().find(|t| &t.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constants {
    /// Skill die sides before intelligence is added.
    pub skill_die_base_sides: u32,
    /// Difficulty dice use a fixed side count (base + average intelligence).
    pub difficulty_die_sides: u32,
    /// Dice per primary skill level when the recipe has no secondary skills.
    pub dice_per_level: u32,
    /// Dice per primary skill level when secondary skills share the pool.
    pub dice_per_level_with_secondary: u32,
    pub assistant_dice_bonus: u32,
    pub penalty_dice_per_rank: u32,
    /// At most this fraction of consumed components is rolled for destruction.
    pub failure_destroy_fraction: f64,
    pub failure_loss_min: f64,
    pub failure_loss_mean: f64,
    /// Added to recipe difficulty for disassembly rolls.
    pub disassembly_difficulty_offset: u32,
    /// Recovery chance is this base raised to the item's damage level.
    pub disassembly_damage_recovery_base: f64,
    pub min_craft_light: f32,
    pub one_assistant_time_factor: f64,
    pub many_assistants_time_factor: f64,
    pub skill_cap_multiplier: f64,
    /// Batch time divisor used when normalizing practice to crafting time.
    pub practice_time_divisor: f64,
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub turn: u64,
    pub seed: u64,
    pub content_version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
    pub next_craft_id: u64,
}

/// Everything a save needs to resume crafting: the reachable items and every
/// in-progress craft. Activities only hold `CraftId` handles into `crafts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkshopState {
    pub meta: MetaState,
    pub pool: ResourcePool,
    pub crafts: BTreeMap<CraftId, CraftTracker>,
    pub counters: Counters,
}

impl WorkshopState {
    pub fn new(seed: u64, content_version: &str, pool: ResourcePool) -> Self {
        Self {
            meta: MetaState {
                turn: 0,
                seed,
                content_version: content_version.to_string(),
            },
            pool,
            crafts: BTreeMap::new(),
            counters: Counters::default(),
        }
    }

    pub(crate) fn next_craft_id(&mut self) -> CraftId {
        let id = CraftId(format!("craft_{:04}", self.counters.next_craft_id));
        self.counters.next_craft_id += 1;
        id
    }
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub turn: u64,
    pub event: Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    ActorRequested,
    TooDark,
    TargetLost,
    InvalidTarget,
    MissingComponents,
    MissingTools,
    ChoiceDeclined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryFailure {
    Skill,
    Damage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CraftStarted {
        craft_id: CraftId,
        recipe_id: RecipeId,
        batch: u32,
    },
    ComponentsConsumed {
        craft_id: Option<CraftId>,
        type_id: ItemTypeId,
        quantity: u32,
        from: UsageFrom,
    },
    ToolChargesConsumed {
        type_id: ItemTypeId,
        charges: u32,
        from: UsageFrom,
    },
    SkillCapped {
        skill: SkillId,
    },
    AssistantHelped {
        assistant: ActorId,
    },
    SkillPracticed {
        actor: ActorId,
        skill: SkillId,
        amount: u32,
    },
    ProgressTick {
        craft_id: CraftId,
        progress: u32,
        steps: u32,
    },
    CheckpointPassed {
        craft_id: CraftId,
        ratio: f64,
    },
    ComponentDestroyed {
        craft_id: CraftId,
        type_id: ItemTypeId,
    },
    ProgressLost {
        craft_id: CraftId,
        /// Whole percentage points of the full craft.
        percent: u32,
    },
    CraftDestroyed {
        craft_id: CraftId,
    },
    CraftCancelled {
        craft_id: CraftId,
        reason: CancelReason,
    },
    CraftCompleted {
        craft_id: CraftId,
        recipe_id: RecipeId,
        results: Vec<ItemId>,
        byproducts: Vec<ItemId>,
    },
    DisassemblyStarted {
        item_id: ItemId,
        recipe_id: RecipeId,
    },
    DisassemblyCancelled {
        item_id: ItemId,
        reason: CancelReason,
    },
    ComponentRecovered {
        type_id: ItemTypeId,
        item_id: ItemId,
    },
    RecoveryFailed {
        type_id: ItemTypeId,
        reason: RecoveryFailure,
    },
    DisassemblyCompleted {
        item_id: ItemId,
        recovered: u32,
    },
}
