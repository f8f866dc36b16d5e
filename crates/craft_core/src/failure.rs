//! Failure handler: what a failed checkpoint costs the craft.

use rand::Rng;

use crate::tracker::CraftTracker;
use crate::{Constants, Item};

#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    Survived {
        destroyed: Vec<Item>,
        progress_lost: u32,
    },
    /// Every consumed component is gone; the craft is over.
    Destroyed { destroyed: Vec<Item> },
}

/// Draw from an exponential distribution shifted to start at `min` with the
/// given `mean`.
pub fn rng_exponential(rng: &mut impl Rng, min: f64, mean: f64) -> f64 {
    let u: f64 = rng.gen();
    min - (1.0 - u).ln() * (mean - min)
}

/// Fraction of the current progress lost after failing with `ratio`.
/// Positive for every `ratio < 1`, zero at or above 1.
pub fn progress_loss_fraction(rng: &mut impl Rng, ratio: f64, constants: &Constants) -> f64 {
    let draw = rng_exponential(rng, constants.failure_loss_min, constants.failure_loss_mean);
    draw.min(1.0) * (1.0 - ratio.clamp(0.0, 1.0))
}

/// Apply a failed checkpoint to `tracker`.
///
/// Up to `failure_destroy_fraction` of the consumed components (at least one)
/// are candidates; each survives with probability `ratio`.
pub fn handle_craft_failure(
    tracker: &mut CraftTracker,
    ratio: f64,
    constants: &Constants,
    rng: &mut impl Rng,
) -> FailureOutcome {
    let starting = tracker.components().len();
    let candidates = ((starting as f64 * constants.failure_destroy_fraction) as usize).max(1);

    let mut destroyed = Vec::new();
    for _ in 0..candidates {
        if rng.gen::<f64>() < ratio {
            continue;
        }
        if let Some(item) = tracker.remove_random_component(rng) {
            destroyed.push(item);
        }
    }

    if starting > 0 && tracker.components().is_empty() {
        let progress = tracker.progress();
        tracker.lose_progress(progress);
        return FailureOutcome::Destroyed { destroyed };
    }

    let fraction = progress_loss_fraction(rng, ratio, constants);
    let loss = (f64::from(tracker.progress()) * fraction).ceil() as u32;
    let progress_lost = tracker.lose_progress(loss);
    FailureOutcome::Survived {
        destroyed,
        progress_lost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ComponentFilter;
    use crate::test_fixtures::{base_content, make_rng};
    use crate::{ItemComp, ItemId, ItemTypeId, RecipeId};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn tracker_with(n: usize, progress: u32) -> CraftTracker {
        let items = (0..n)
            .map(|i| Item::unit(ItemId(format!("p{i}")), ItemTypeId("plank".to_string())))
            .collect();
        let count = i32::try_from(n).unwrap();
        let mut t = CraftTracker::new(
            RecipeId("r".to_string()),
            1,
            items,
            vec![ItemComp::new("plank", count)],
            Vec::new(),
            ComponentFilter::STRICT,
        );
        t.advance_to(progress);
        t
    }

    #[test]
    fn zero_ratio_single_component_is_destroyed() {
        let content = base_content();
        let mut t = tracker_with(1, 4_000_000);
        let outcome = handle_craft_failure(&mut t, 0.0, &content.constants, &mut make_rng());
        assert!(matches!(outcome, FailureOutcome::Destroyed { ref destroyed } if destroyed.len() == 1));
        assert_eq!(t.progress(), 0);
    }

    #[test]
    fn at_most_three_quarters_destroyed() {
        let content = base_content();
        let mut t = tracker_with(8, 4_000_000);
        let outcome = handle_craft_failure(&mut t, 0.0, &content.constants, &mut make_rng());
        let FailureOutcome::Survived { destroyed, progress_lost } = outcome else {
            panic!("eight components cannot all be lost");
        };
        assert_eq!(destroyed.len(), 6);
        assert_eq!(t.components().len(), 2);
        assert!(progress_lost > 0);
    }

    #[test]
    fn single_component_surviving_keeps_the_craft() {
        let content = base_content();
        let mut rng = make_rng();
        for _ in 0..50 {
            let mut t = tracker_with(1, 4_000_000);
            match handle_craft_failure(&mut t, 0.5, &content.constants, &mut rng) {
                FailureOutcome::Destroyed { destroyed } => {
                    assert_eq!(destroyed.len(), 1);
                    assert!(t.components().is_empty());
                }
                FailureOutcome::Survived { destroyed, .. } => {
                    assert!(destroyed.is_empty());
                    assert_eq!(t.components().len(), 1);
                }
            }
        }
    }

    #[test]
    fn early_failure_keeps_most_of_its_progress() {
        let content = base_content();
        let mut rng = make_rng();
        for _ in 0..200 {
            let mut t = tracker_with(4, 1_000_000);
            let FailureOutcome::Survived { progress_lost, .. } =
                handle_craft_failure(&mut t, 0.5, &content.constants, &mut rng)
            else {
                continue;
            };
            assert!(progress_lost > 0);
            assert!(progress_lost < 1_000_000);
            assert_eq!(t.progress(), 1_000_000 - progress_lost);
        }
    }

    proptest! {
        #[test]
        fn loss_is_positive_below_one_and_shrinks_toward_one(seed in any::<u64>(), ratio in 0.0f64..0.999) {
            let content = base_content();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let loss = progress_loss_fraction(&mut rng, ratio, &content.constants);
            prop_assert!(loss > 0.0);
            prop_assert!(loss <= 1.0 - ratio + f64::EPSILON);
        }

        #[test]
        fn no_loss_at_or_above_one(seed in any::<u64>(), ratio in 1.0f64..3.0) {
            let content = base_content();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            prop_assert!(progress_loss_fraction(&mut rng, ratio, &content.constants).abs() < f64::EPSILON);
        }
    }
}
