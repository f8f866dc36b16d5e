use thiserror::Error;

use crate::{CraftId, ItemId, ItemTypeId, RecipeId};

/// What a plan or consumption step could not find. One entry per unmet slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingReport {
    pub components: Vec<MissingEntry>,
    pub tools: Vec<MissingEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingEntry {
    /// Every alternative of the unmet group.
    pub alternatives: Vec<ItemTypeId>,
    pub required: u32,
}

impl MissingReport {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.tools.is_empty()
    }
}

impl std::fmt::Display for MissingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let describe = |entries: &[MissingEntry]| {
            entries
                .iter()
                .map(|e| {
                    let names: Vec<&str> = e.alternatives.iter().map(|t| t.0.as_str()).collect();
                    format!("{} x{}", names.join(" or "), e.required)
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "components [{}], tools [{}]",
            describe(&self.components),
            describe(&self.tools)
        )
    }
}

#[derive(Debug, Error)]
pub enum CraftError {
    #[error("unknown recipe {0}")]
    UnknownRecipe(RecipeId),
    #[error("missing requirements: {0}")]
    MissingRequirements(MissingReport),
    #[error("not enough {type_id}: need {required}, found {available}")]
    InsufficientQuantity {
        type_id: ItemTypeId,
        required: u32,
        available: u32,
    },
    #[error("item {0} cannot be used as a target")]
    InvalidTarget(ItemId),
    #[error("no in-progress craft {0}")]
    NoActiveCraft(CraftId),
    #[error("a component or tool choice is still pending")]
    SelectionPending,
    #[error("craft was declined")]
    Declined,
}

pub type Result<T> = std::result::Result<T, CraftError>;
