use std::collections::VecDeque;

use craft_core::{
    ActivityStatus, CacheKey, CraftActivity, CraftContent, CraftError, CraftPlan, Crafter, Crew,
    DisassemblyActivity, EventEnvelope, FinishOutcome, InventoryCache, ItemComp, PendingChoice,
    RecipeId, ToolComp, UsageFrom, WorkConditions, WorkshopState,
};
use rand::Rng;

pub use craft_core::{ChoiceSource, Confirmation};

/// Answers pending choices the way a non-player character would:
/// 1. Prefer items already carried.
/// 2. Then items nearby.
/// 3. Split sources only as a last resort.
///
/// Ties go to the option with the most to spare. Confirmations follow the
/// two policy switches.
#[derive(Debug, Clone, Copy)]
pub struct AutoChooser {
    pub accept_rotten: bool,
    pub accept_partial_charges: bool,
}

impl Default for AutoChooser {
    fn default() -> Self {
        Self {
            accept_rotten: false,
            accept_partial_charges: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn source_rank(use_from: UsageFrom) -> u8 {
    match use_from {
        UsageFrom::Carried | UsageFrom::NoCharge => 0,
        UsageFrom::Nearby => 1,
        UsageFrom::Both => 2,
        UsageFrom::Cancel => 3,
    }
}

/// Index of the best-ranked option, or `None` when there are none.
fn best_option<T>(pending: &PendingChoice<T>) -> Option<usize> {
    pending
        .options
        .iter()
        .enumerate()
        .min_by_key(|(_, option)| {
            let spare = option.available.saturating_sub(option.required);
            (source_rank(option.selection.use_from), std::cmp::Reverse(spare))
        })
        .map(|(index, _)| index)
}

impl ChoiceSource for AutoChooser {
    fn choose_component(&mut self, pending: &PendingChoice<ItemComp>) -> Option<usize> {
        best_option(pending)
    }

    fn choose_tool(&mut self, pending: &PendingChoice<ToolComp>) -> Option<usize> {
        best_option(pending)
    }

    fn confirm(&mut self, question: Confirmation) -> bool {
        match question {
            Confirmation::UseRottenComponents => self.accept_rotten,
            Confirmation::StartWithoutFullCharges => self.accept_partial_charges,
        }
    }
}

/// One recorded answer for a `ScriptedChooser`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Answer {
    Pick(usize),
    Decline,
    Confirm(bool),
}

/// Replays answers in order, for tests and replays. Questions asked after the
/// script runs out are declined.
#[derive(Debug, Clone, Default)]
pub struct ScriptedChooser {
    answers: VecDeque<Answer>,
    /// Answers consumed so far.
    pub asked: usize,
}

impl ScriptedChooser {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self) -> Option<Answer> {
        let answer = self.answers.pop_front();
        if answer.is_some() {
            self.asked += 1;
        }
        answer
    }

    fn pick(&mut self, option_count: usize) -> Option<usize> {
        match self.next() {
            Some(Answer::Pick(index)) if index < option_count => Some(index),
            _ => None,
        }
    }
}

impl ChoiceSource for ScriptedChooser {
    fn choose_component(&mut self, pending: &PendingChoice<ItemComp>) -> Option<usize> {
        self.pick(pending.options.len())
    }

    fn choose_tool(&mut self, pending: &PendingChoice<ToolComp>) -> Option<usize> {
        self.pick(pending.options.len())
    }

    fn confirm(&mut self, _question: Confirmation) -> bool {
        matches!(self.next(), Some(Answer::Confirm(true)))
    }
}

/// How a driven activity ended.
#[derive(Debug, Clone)]
pub struct DriveReport {
    pub status: ActivityStatus,
    pub turns: u64,
    pub events: Vec<EventEnvelope>,
    pub outcome: Option<FinishOutcome>,
}

/// Tick a craft once per turn until it stops, finishing it when it reaches
/// 100%. Gives up (leaving the activity running) after `max_turns`.
#[allow(clippy::too_many_arguments)]
pub fn drive_craft<A: Crafter>(
    activity: &mut CraftActivity,
    state: &mut WorkshopState,
    content: &CraftContent,
    crew: &mut Crew<A>,
    conditions: WorkConditions,
    choices: &mut (impl ChoiceSource + ?Sized),
    rng: &mut impl Rng,
    max_turns: u64,
) -> Result<DriveReport, CraftError> {
    let mut events = Vec::new();
    let mut turns = 0;
    while activity.status() == ActivityStatus::Running && turns < max_turns {
        turns += 1;
        state.meta.turn += 1;
        events.extend(activity.tick(state, content, crew, conditions, choices, rng));
    }
    let mut outcome = None;
    if activity.status() == ActivityStatus::ReadyToFinish {
        let (finished, finish_events) = activity.finish(state, content, rng)?;
        events.extend(finish_events);
        outcome = Some(finished);
    }
    Ok(DriveReport {
        status: activity.status(),
        turns,
        events,
        outcome,
    })
}

/// A recipe to run, possibly several batches back to back.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CraftOrder {
    pub recipe_id: RecipeId,
    pub batch: u32,
    /// Batches to run while stock lasts. Anything above 1 marks the craft
    /// to repeat.
    pub batches: u32,
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub batches: u32,
    pub turns: u64,
    pub status: ActivityStatus,
    pub events: Vec<EventEnvelope>,
}

/// Plans crafts against a per-turn inventory snapshot and runs orders to
/// completion.
#[derive(Debug, Clone, Default)]
pub struct CraftSession {
    cache: InventoryCache,
    /// Where the crafter works. Moving invalidates the snapshot.
    pub position: (i32, i32, i32),
    rebuilds: u32,
}

impl CraftSession {
    pub fn new(position: (i32, i32, i32)) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Snapshot rebuilds so far.
    pub fn rebuilds(&self) -> u32 {
        self.rebuilds
    }

    /// Settle every requirement of `order` from the cached snapshot. The
    /// snapshot is rebuilt only when the turn, position or moves changed.
    pub fn plan(
        &mut self,
        order: &CraftOrder,
        state: &WorkshopState,
        content: &CraftContent,
        is_npc: bool,
        moves: u32,
        choices: &mut (impl ChoiceSource + ?Sized),
    ) -> Result<CraftPlan, CraftError> {
        let key = CacheKey {
            turn: state.meta.turn,
            position: self.position,
            moves: i32::try_from(moves).unwrap_or(i32::MAX),
        };
        if self.cache.refresh_if_stale(key, &state.pool) {
            self.rebuilds += 1;
        }
        let plan = CraftPlan::build(
            content,
            &order.recipe_id,
            order.batch,
            self.cache.snapshot(),
            is_npc,
            choices,
        )?;
        Ok(plan.repeating(order.batches > 1))
    }

    /// Plan, commit and drive `order`. While a finished batch reports it can
    /// repeat, the next batch is planned, up to `order.batches`. `max_turns`
    /// is shared by every batch.
    #[allow(clippy::too_many_arguments)]
    pub fn run<A: Crafter>(
        &mut self,
        order: &CraftOrder,
        state: &mut WorkshopState,
        content: &CraftContent,
        crew: &mut Crew<A>,
        conditions: WorkConditions,
        choices: &mut (impl ChoiceSource + ?Sized),
        rng: &mut impl Rng,
        max_turns: u64,
    ) -> Result<SessionReport, CraftError> {
        let mut report = SessionReport {
            batches: 0,
            turns: 0,
            status: ActivityStatus::Running,
            events: Vec::new(),
        };
        loop {
            let is_npc = crew.crafter.is_npc();
            let plan = self.plan(order, state, content, is_npc, conditions.moves, choices)?;
            let craft_id = plan.execute(state, content, rng, &mut report.events)?;
            self.cache.invalidate();

            let (mut activity, started) = CraftActivity::start(craft_id, state, content, crew, rng);
            report.events.extend(started);
            let drive = drive_craft(
                &mut activity,
                state,
                content,
                crew,
                conditions,
                choices,
                rng,
                max_turns.saturating_sub(report.turns),
            )?;
            report.batches += 1;
            report.turns += drive.turns;
            report.status = drive.status;
            report.events.extend(drive.events);

            match drive.outcome {
                Some(FinishOutcome::RepeatReady { .. }) if report.batches < order.batches => {}
                _ => return Ok(report),
            }
        }
    }
}

/// The disassembly counterpart of `drive_craft`.
pub fn drive_disassembly<A: Crafter>(
    activity: &mut DisassemblyActivity,
    state: &mut WorkshopState,
    content: &CraftContent,
    actor: &mut A,
    conditions: WorkConditions,
    rng: &mut impl Rng,
    max_turns: u64,
) -> Result<DriveReport, CraftError> {
    let mut events = Vec::new();
    let mut turns = 0;
    while activity.status() == ActivityStatus::Running && turns < max_turns {
        turns += 1;
        state.meta.turn += 1;
        events.extend(activity.tick(state, content, conditions));
    }
    if activity.status() == ActivityStatus::ReadyToFinish {
        events.extend(activity.finish(state, content, actor, rng)?);
    }
    Ok(DriveReport {
        status: activity.status(),
        turns,
        events,
        outcome: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use craft_core::{ChoiceOption, CompSelection};

    fn option(use_from: UsageFrom, required: u32, available: u32) -> ChoiceOption<ItemComp> {
        ChoiceOption {
            selection: CompSelection {
                use_from,
                comp: ItemComp::new("rag", 1),
            },
            required,
            available,
        }
    }

    #[test]
    fn auto_prefers_carried_then_surplus() {
        let pending = PendingChoice {
            options: vec![
                option(UsageFrom::Nearby, 2, 50),
                option(UsageFrom::Carried, 2, 3),
                option(UsageFrom::Carried, 2, 9),
            ],
        };
        assert_eq!(AutoChooser::default().choose_component(&pending), Some(2));
    }

    #[test]
    fn auto_declines_empty_choices() {
        let pending: PendingChoice<ItemComp> = PendingChoice { options: vec![] };
        assert_eq!(AutoChooser::default().choose_component(&pending), None);
    }

    #[test]
    fn scripted_rejects_out_of_range_picks() {
        let pending = PendingChoice {
            options: vec![option(UsageFrom::Carried, 1, 1)],
        };
        let mut chooser = ScriptedChooser::new([Answer::Pick(3), Answer::Pick(0)]);
        assert_eq!(chooser.choose_component(&pending), None);
        assert_eq!(chooser.choose_component(&pending), Some(0));
        assert_eq!(chooser.asked, 2);
        assert!(!chooser.confirm(Confirmation::UseRottenComponents));
        assert_eq!(chooser.asked, 2);
    }
}
