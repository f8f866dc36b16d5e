use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ActorId, CorrectionId, SkillId, TraitId};

/// The crafting-relevant view of a character: skills, traits, worn
/// corrections, and the practice sink.
pub trait Crafter {
    fn id(&self) -> &ActorId;
    fn skill_level(&self, skill: &SkillId) -> u32;
    fn intelligence(&self) -> u32;
    fn traits(&self) -> &[TraitId];
    fn has_correction(&self, correction: &CorrectionId) -> bool;
    fn is_npc(&self) -> bool;
    /// Exercise `skill` by `amount`. Returns `false` when the skill is already
    /// at or above `cap` and nothing was learned.
    fn practice(&mut self, skill: &SkillId, amount: u32, cap: u32) -> bool;

    fn has_trait(&self, id: &TraitId) -> bool {
        self.traits().contains(id)
    }
}

/// The crafter and whoever is helping this turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crew<A> {
    pub crafter: A,
    #[serde(default)]
    pub assistants: Vec<A>,
}

impl<A> Crew<A> {
    pub fn solo(crafter: A) -> Self {
        Self {
            crafter,
            assistants: Vec::new(),
        }
    }

    pub fn with_assistant(mut self, assistant: A) -> Self {
        self.assistants.push(assistant);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorProfile {
    pub id: ActorId,
    pub intelligence: u32,
    #[serde(default)]
    pub skills: BTreeMap<SkillId, u32>,
    /// Accumulated practice toward the next level.
    #[serde(default)]
    pub exercise: BTreeMap<SkillId, u32>,
    #[serde(default)]
    pub traits: Vec<TraitId>,
    #[serde(default)]
    pub corrections: Vec<CorrectionId>,
    #[serde(default)]
    pub npc: bool,
}

impl ActorProfile {
    pub fn new(id: &str, intelligence: u32) -> Self {
        Self {
            id: ActorId(id.to_string()),
            intelligence,
            skills: BTreeMap::new(),
            exercise: BTreeMap::new(),
            traits: Vec::new(),
            corrections: Vec::new(),
            npc: false,
        }
    }

    pub fn with_skill(mut self, skill: &str, level: u32) -> Self {
        self.skills.insert(SkillId(skill.to_string()), level);
        self
    }

    pub fn with_trait(mut self, id: &str) -> Self {
        self.traits.push(TraitId(id.to_string()));
        self
    }

    pub fn with_correction(mut self, id: &str) -> Self {
        self.corrections.push(CorrectionId(id.to_string()));
        self
    }

    pub fn npc(mut self) -> Self {
        self.npc = true;
        self
    }
}

/// Practice needed to go from `level` to `level + 1`.
fn exercise_for_level(level: u32) -> u32 {
    (level + 1) * (level + 1) * 100
}

impl Crafter for ActorProfile {
    fn id(&self) -> &ActorId {
        &self.id
    }

    fn skill_level(&self, skill: &SkillId) -> u32 {
        self.skills.get(skill).copied().unwrap_or(0)
    }

    fn intelligence(&self) -> u32 {
        self.intelligence
    }

    fn traits(&self) -> &[TraitId] {
        &self.traits
    }

    fn has_correction(&self, correction: &CorrectionId) -> bool {
        self.corrections.contains(correction)
    }

    fn is_npc(&self) -> bool {
        self.npc
    }

    fn practice(&mut self, skill: &SkillId, amount: u32, cap: u32) -> bool {
        let mut level = self.skill_level(skill);
        if level >= cap {
            return false;
        }
        let exercise = self.exercise.entry(skill.clone()).or_insert(0);
        *exercise += amount;
        while level < cap && *exercise >= exercise_for_level(level) {
            *exercise -= exercise_for_level(level);
            level += 1;
        }
        self.skills.insert(skill.clone(), level);
        true
    }
}
