//! Requirement matcher: resolves alternative groups against a `Stock` into
//! selections with a source scope.
//!
//! Components may be drawn from carried items, nearby items, or split across
//! both when neither side alone is enough. Tools are never split: a tool
//! alternative is sourced from one side, and presence-only tools win outright.

use serde::{Deserialize, Serialize};

use crate::batch::{tool_charges, CostMode};
use crate::error::{MissingEntry, MissingReport};
use crate::pool::{ComponentFilter, SourceScope, Stock};
use crate::{AlternativeGroup, ItemComp, Requirements, ToolComp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageFrom {
    Carried,
    Nearby,
    /// Split: nearby first, the remainder from carried items.
    Both,
    /// A presence-only tool; nothing is drawn.
    NoCharge,
    Cancel,
}

impl UsageFrom {
    pub fn scope(self) -> Option<SourceScope> {
        match self {
            UsageFrom::Carried => Some(SourceScope::Carried),
            UsageFrom::Nearby => Some(SourceScope::Nearby),
            UsageFrom::Both | UsageFrom::NoCharge => Some(SourceScope::Both),
            UsageFrom::Cancel => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompSelection<T> {
    pub use_from: UsageFrom,
    pub comp: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOption<T> {
    pub selection: CompSelection<T>,
    pub required: u32,
    pub available: u32,
}

/// Several alternatives qualify and the actor is player-controlled.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChoice<T> {
    pub options: Vec<ChoiceOption<T>>,
}

impl<T: Clone> PendingChoice<T> {
    pub fn resolve(&self, index: usize) -> Option<CompSelection<T>> {
        self.options.get(index).map(|o| o.selection.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection<T> {
    Chosen(CompSelection<T>),
    AwaitingChoice(PendingChoice<T>),
    Cancel,
}

/// Questions the engine may put to whoever controls the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    UseRottenComponents,
    StartWithoutFullCharges,
}

/// Answers pending choices on behalf of the actor (a UI, a script, an AI).
pub trait ChoiceSource {
    /// Index into `pending.options`, or `None` to decline.
    fn choose_component(&mut self, pending: &PendingChoice<ItemComp>) -> Option<usize>;
    fn choose_tool(&mut self, pending: &PendingChoice<ToolComp>) -> Option<usize>;
    fn confirm(&mut self, question: Confirmation) -> bool;
}

/// Resolve one component group for `batch` units.
pub fn select_item_component<S: Stock + ?Sized>(
    group: &[ItemComp],
    batch: u32,
    stock: &S,
    filter: ComponentFilter,
    is_npc: bool,
) -> Selection<ItemComp> {
    let mut carried_has: Vec<ChoiceOption<ItemComp>> = Vec::new();
    let mut nearby_has: Vec<ChoiceOption<ItemComp>> = Vec::new();
    let mut mixed: Vec<ChoiceOption<ItemComp>> = Vec::new();
    let mut satisfiable = 0usize;

    for comp in group {
        let required = comp.required(batch);
        let carried = stock.amount_of(&comp.type_id, SourceScope::Carried, filter);
        let nearby = stock.amount_of(&comp.type_id, SourceScope::Nearby, filter);
        let option = |use_from, available| ChoiceOption {
            selection: CompSelection {
                use_from,
                comp: comp.clone(),
            },
            required,
            available,
        };

        let mut found = false;
        if nearby >= required {
            nearby_has.push(option(UsageFrom::Nearby, nearby));
            found = true;
        }
        if carried >= required {
            carried_has.push(option(UsageFrom::Carried, carried));
            found = true;
        }
        if !found && carried + nearby >= required {
            mixed.push(option(UsageFrom::Both, carried + nearby));
            found = true;
        }
        if found {
            satisfiable += 1;
        }
    }

    if satisfiable == 0 {
        return Selection::Cancel;
    }
    // One alternative, or an NPC: carried, then nearby, then split.
    if satisfiable == 1 || is_npc {
        let first = carried_has
            .into_iter()
            .chain(nearby_has)
            .chain(mixed)
            .next();
        return first.map_or(Selection::Cancel, |o| Selection::Chosen(o.selection));
    }
    let options = nearby_has
        .into_iter()
        .chain(carried_has)
        .chain(mixed)
        .collect();
    Selection::AwaitingChoice(PendingChoice { options })
}

/// Resolve one tool group, costing charge tools under `mode`.
pub fn select_tool_component<S: Stock + ?Sized>(
    group: &[ToolComp],
    batch: u32,
    stock: &S,
    mode: CostMode,
    is_npc: bool,
) -> Selection<ToolComp> {
    let mut candidates: Vec<(ChoiceOption<ToolComp>, u32)> = Vec::new();

    for tool in group {
        if !tool.uses_charges() {
            if stock.has_tool(&tool.type_id, SourceScope::Both) {
                return Selection::Chosen(CompSelection {
                    use_from: UsageFrom::NoCharge,
                    comp: tool.clone(),
                });
            }
            continue;
        }
        let required = tool_charges(tool, batch, mode);
        let ideal = tool_charges(tool, batch, CostMode::Complete);
        for (scope, use_from) in [
            (SourceScope::Carried, UsageFrom::Carried),
            (SourceScope::Nearby, UsageFrom::Nearby),
        ] {
            if !stock.has_tool(&tool.type_id, scope) {
                continue;
            }
            let available = stock.tool_charges(&tool.type_id, scope);
            if available >= required {
                let option = ChoiceOption {
                    selection: CompSelection {
                        use_from,
                        comp: tool.clone(),
                    },
                    required,
                    available,
                };
                candidates.push((option, ideal));
            }
        }
    }

    // Full-batch reserves first, then the lowest ideal/available ratio.
    candidates.sort_by(|(a, a_ideal), (b, b_ideal)| {
        let a_full = a.available >= *a_ideal;
        let b_full = b.available >= *b_ideal;
        b_full.cmp(&a_full).then_with(|| {
            let ratio = |o: &ChoiceOption<ToolComp>, ideal: u32| {
                f64::from(ideal) / f64::from(o.available.max(1))
            };
            ratio(a, *a_ideal).total_cmp(&ratio(b, *b_ideal))
        })
    });
    let mut options: Vec<ChoiceOption<ToolComp>> = candidates.into_iter().map(|(o, _)| o).collect();

    match options.len() {
        0 => Selection::Cancel,
        1 => Selection::Chosen(options.remove(0).selection),
        _ if is_npc => {
            let index = options
                .iter()
                .position(|o| o.selection.use_from == UsageFrom::Carried)
                .unwrap_or(0);
            Selection::Chosen(options.remove(index).selection)
        }
        _ => Selection::AwaitingChoice(PendingChoice { options }),
    }
}

/// Whether a previously made component selection still holds.
pub fn item_selection_available<S: Stock + ?Sized>(
    selection: &CompSelection<ItemComp>,
    batch: u32,
    stock: &S,
    filter: ComponentFilter,
) -> bool {
    selection.use_from.scope().is_some_and(|scope| {
        stock.amount_of(&selection.comp.type_id, scope, filter) >= selection.comp.required(batch)
    })
}

/// Whether a previously made tool selection can pay for `mode` × `multiplier`.
pub fn tool_selection_available<S: Stock + ?Sized>(
    selection: &CompSelection<ToolComp>,
    batch: u32,
    stock: &S,
    mode: CostMode,
    multiplier: u32,
) -> bool {
    let Some(scope) = selection.use_from.scope() else {
        return false;
    };
    let type_id = &selection.comp.type_id;
    if !stock.has_tool(type_id, scope) {
        return false;
    }
    selection.use_from == UsageFrom::NoCharge
        || stock.tool_charges(type_id, scope)
            >= tool_charges(&selection.comp, batch, mode) * multiplier
}

fn group_missing<T>(
    group: &AlternativeGroup<T>,
    satisfied: impl Fn(&T) -> bool,
    required: impl Fn(&T) -> u32,
    type_of: impl Fn(&T) -> crate::ItemTypeId,
) -> Option<MissingEntry> {
    if group.iter().any(satisfied) {
        return None;
    }
    Some(MissingEntry {
        alternatives: group.iter().map(type_of).collect(),
        required: group.first().map_or(0, required),
    })
}

/// Every group that no alternative can satisfy, components split across
/// sources and tools costed under `mode`.
pub fn missing_requirements<S: Stock + ?Sized>(
    requirements: &Requirements,
    batch: u32,
    stock: &S,
    filter: ComponentFilter,
    mode: CostMode,
) -> MissingReport {
    let components = requirements
        .components
        .iter()
        .filter_map(|group| {
            group_missing(
                group,
                |c| stock.amount_of(&c.type_id, SourceScope::Both, filter) >= c.required(batch),
                |c| c.required(batch),
                |c| c.type_id.clone(),
            )
        })
        .collect();
    let tools = requirements
        .tools
        .iter()
        .filter_map(|group| {
            group_missing(
                group,
                |t| {
                    !matches!(
                        select_tool_component(std::slice::from_ref(t), batch, stock, mode, true),
                        Selection::Cancel
                    )
                },
                |t| tool_charges(t, batch, mode),
                |t| t.type_id.clone(),
            )
        })
        .collect();
    MissingReport { components, tools }
}
