//! Batch arithmetic: per-unit requirement counts to batch totals, and full
//! charge costs to per-tick slices.

use crate::{Constants, Recipe, ToolComp};

/// Progress ticks in a full craft (one per 5%).
pub const TICKS_PER_CRAFT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostMode {
    /// The whole craft's cost, for up-front availability checks.
    Complete,
    /// First slice, carrying the truncation remainder.
    Start,
    /// Each of the remaining 19 slices.
    Continue,
}

/// Cost of `per_unit × batch` under `mode`.
///
/// `start + 19 × continue == complete` for every input.
pub fn charges_for(per_unit: u32, batch: u32, mode: CostMode) -> u32 {
    let full = per_unit * batch;
    match mode {
        CostMode::Complete => full,
        CostMode::Start => full / TICKS_PER_CRAFT + full % TICKS_PER_CRAFT,
        CostMode::Continue => full / TICKS_PER_CRAFT,
    }
}

/// Charges a tool alternative costs under `mode`. Presence-only tools cost 0.
pub fn tool_charges(tool: &ToolComp, batch: u32, mode: CostMode) -> u32 {
    if !tool.uses_charges() {
        return 0;
    }
    charges_for(tool.count.unsigned_abs(), batch.max(1), mode)
}

/// Work-speed multiplier with unset (non-positive) speeds read as full speed.
pub fn effective_speed(speed: f32) -> f64 {
    if speed > 0.0 {
        f64::from(speed)
    } else {
        1.0
    }
}

/// Total moves to craft `batch` units at `speed` with `assistants` helping.
pub fn batch_time(
    recipe: &Recipe,
    batch: u32,
    speed: f32,
    assistants: usize,
    constants: &Constants,
) -> u64 {
    let local_time = f64::from(recipe.time) / effective_speed(speed);
    let rscale = recipe.batch_time_factors.map_or(0.0, |f| f.rscale);

    if rscale == 0.0 && assistants == 0 {
        return local_time as u64 * u64::from(batch);
    }

    let mut total = match recipe.batch_time_factors {
        Some(factors) if rscale != 0.0 => {
            // 99.5% of the discount is reached at rsize units.
            let scale = f64::from(factors.rsize.max(1)) / 6.0;
            (0..batch)
                .map(|x| {
                    let logistic = 2.0 / (1.0 + (-(f64::from(x) / scale)).exp()) - 1.0;
                    local_time * (1.0 - rscale * logistic)
                })
                .sum()
        }
        _ => local_time * f64::from(batch),
    };

    match assistants {
        0 => {}
        1 => total *= constants.one_assistant_time_factor,
        _ => total *= constants.many_assistants_time_factor,
    }
    total.max(local_time) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, recipe};
    use crate::BatchTimeFactors;
    use proptest::prelude::*;

    #[test]
    fn cost_modes_for_small_totals() {
        assert_eq!(charges_for(3, 2, CostMode::Complete), 6);
        assert_eq!(charges_for(3, 2, CostMode::Start), 6);
        assert_eq!(charges_for(3, 2, CostMode::Continue), 0);
        assert_eq!(charges_for(25, 1, CostMode::Start), 6);
        assert_eq!(charges_for(25, 1, CostMode::Continue), 1);
    }

    #[test]
    fn presence_tools_cost_nothing() {
        let hammer = ToolComp::new("hammer", -1);
        assert_eq!(tool_charges(&hammer, 5, CostMode::Complete), 0);
        let welder = ToolComp::new("welder", 10);
        assert_eq!(tool_charges(&welder, 5, CostMode::Complete), 50);
        assert_eq!(tool_charges(&welder, 5, CostMode::Start), 12);
    }

    #[test]
    fn batch_time_without_factors_is_linear() {
        let content = base_content();
        let r = recipe(&content, "rag_bandage");
        let single = batch_time(r, 1, 1.0, 0, &content.constants);
        assert_eq!(batch_time(r, 4, 1.0, 0, &content.constants), single * 4);
        assert_eq!(batch_time(r, 4, 0.0, 0, &content.constants), single * 4);
    }

    #[test]
    fn assistants_shorten_but_never_below_one_unit() {
        let content = base_content();
        let r = recipe(&content, "rag_bandage");
        let alone = batch_time(r, 4, 1.0, 0, &content.constants);
        let one = batch_time(r, 4, 1.0, 1, &content.constants);
        let many = batch_time(r, 4, 1.0, 3, &content.constants);
        assert!(one < alone && many < one);
        let unit = batch_time(r, 1, 1.0, 0, &content.constants);
        assert_eq!(batch_time(r, 1, 1.0, 3, &content.constants), unit);
    }

    #[test]
    fn batch_factors_discount_later_units() {
        let content = base_content();
        let mut r = recipe(&content, "rag_bandage").clone();
        let linear = batch_time(&r, 10, 1.0, 0, &content.constants);
        r.batch_time_factors = Some(BatchTimeFactors {
            rscale: 0.8,
            rsize: 5,
        });
        let batched = batch_time(&r, 10, 1.0, 0, &content.constants);
        assert!(batched < linear);
        assert!(batched >= u64::from(r.time));
    }

    proptest! {
        #[test]
        fn batch_cost_partition(c in 0u32..10_000, b in 1u32..500) {
            let start = charges_for(c, b, CostMode::Start);
            let cont = charges_for(c, b, CostMode::Continue);
            prop_assert_eq!(start + 19 * cont, charges_for(c, b, CostMode::Complete));
        }
    }
}
