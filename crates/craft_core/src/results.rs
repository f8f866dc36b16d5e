//! Item production when a craft completes.

use rand::Rng;

use crate::id::generate_item_id;
use crate::{Item, Recipe, RecipeFlag};

/// How consumed components are post-processed, resolved once from the
/// recipe's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTreatment {
    Plain,
    /// Heated or dehydrated: food components count as cooked.
    Cooked,
}

impl ResultTreatment {
    pub fn for_recipe(recipe: &Recipe) -> Self {
        if recipe.has_flag(RecipeFlag::HotResult) || recipe.has_flag(RecipeFlag::DehydrateResult) {
            ResultTreatment::Cooked
        } else {
            ResultTreatment::Plain
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CraftOutput {
    pub results: Vec<Item>,
    pub byproducts: Vec<Item>,
}

/// Produce the results of `batch` crafts of `recipe` from `components`.
pub fn complete_craft(
    recipe: &Recipe,
    batch: u32,
    mut components: Vec<Item>,
    rng: &mut impl Rng,
) -> CraftOutput {
    if ResultTreatment::for_recipe(recipe) == ResultTreatment::Cooked {
        for component in &mut components {
            component.cooked = true;
        }
    }

    let results = if let Some(charges) = recipe.result_charges {
        let mut stack = Item::stack(generate_item_id(rng), recipe.result.clone(), batch * charges);
        if recipe.is_reversible() && !recipe.has_flag(RecipeFlag::NutrientOverride) {
            stack.components = components;
        }
        vec![stack]
    } else {
        let count = batch * recipe.result_mult;
        let mut results: Vec<Item> = (0..count)
            .map(|_| Item::unit(generate_item_id(rng), recipe.result.clone()))
            .collect();
        if recipe.is_reversible() && !recipe.has_flag(RecipeFlag::NutrientOverride) {
            distribute_components(&mut results, components, rng);
        }
        results
    };

    let byproducts = recipe
        .byproducts
        .iter()
        .flat_map(|(type_id, per_unit)| {
            (0..batch * per_unit).map(move |_| type_id.clone())
        })
        .map(|type_id| {
            let mut item = Item::unit(generate_item_id(rng), type_id);
            item.byproduct = true;
            item
        })
        .collect();

    CraftOutput {
        results,
        byproducts,
    }
}

/// Give each result its share: charge stacks are split evenly (remainder to
/// the first result), unit items are dealt round-robin.
fn distribute_components(results: &mut [Item], components: Vec<Item>, rng: &mut impl Rng) {
    let shares = results.len();
    if shares == 0 {
        return;
    }
    let mut next = 0usize;
    for component in components {
        if component.count_by_charges && shares > 1 {
            let per = component.charges / shares as u32;
            let extra = component.charges % shares as u32;
            for (i, result) in results.iter_mut().enumerate() {
                let charges = per + if i == 0 { extra } else { 0 };
                if charges == 0 {
                    continue;
                }
                let mut part = component.clone();
                part.id = generate_item_id(rng);
                part.charges = charges;
                result.components.push(part);
            }
        } else {
            results[next % shares].components.push(component);
            next += 1;
        }
    }
}
