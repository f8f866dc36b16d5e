use craft_control::{
    drive_craft, drive_disassembly, Answer, AutoChooser, CraftOrder, CraftSession, ScriptedChooser,
};
use craft_core::test_fixtures::{base_content, base_crew, base_state, make_rng};
use craft_core::{
    ActivityStatus, CancelReason, CraftActivity, CraftError, CraftPlan, DisassemblyActivity,
    Event, FinishOutcome, Item, ItemId, ItemTypeId, Location, RecipeId, UsageFrom,
    WorkConditions,
};

fn daylight(moves: u32) -> WorkConditions {
    WorkConditions {
        light: 10.0,
        speed: 1.0,
        moves,
    }
}

fn dark() -> WorkConditions {
    WorkConditions {
        light: 0.0,
        speed: 1.0,
        moves: 100,
    }
}

#[test]
fn auto_chooser_drives_a_craft_to_completion() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let mut crew = base_crew();
    let mut chooser = AutoChooser::default();

    let plan = CraftPlan::build(
        &content,
        &RecipeId("nail_board".to_string()),
        1,
        &state.pool,
        false,
        &mut chooser,
    )
    .unwrap();
    let craft_id = plan.execute(&mut state, &content, &mut rng, &mut Vec::new()).unwrap();
    let (mut activity, _) = CraftActivity::start(craft_id, &mut state, &content, &crew, &mut rng);
    let report = drive_craft(
        &mut activity,
        &mut state,
        &content,
        &mut crew,
        daylight(100),
        &mut chooser,
        &mut rng,
        50,
    )
    .unwrap();

    assert_eq!(report.status, ActivityStatus::Finished);
    assert_eq!(report.turns, 10);
    assert_eq!(state.meta.turn, 10);
    assert!(matches!(report.outcome, Some(FinishOutcome::Completed { .. })));
}

#[test]
fn darkness_stops_the_drive() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let mut crew = base_crew();
    let mut chooser = AutoChooser::default();
    let plan = CraftPlan::build(
        &content,
        &RecipeId("nail_board".to_string()),
        1,
        &state.pool,
        false,
        &mut chooser,
    )
    .unwrap();
    let craft_id = plan.execute(&mut state, &content, &mut rng, &mut Vec::new()).unwrap();
    let (mut activity, _) = CraftActivity::start(craft_id.clone(), &mut state, &content, &crew, &mut rng);
    let report = drive_craft(
        &mut activity, &mut state, &content, &mut crew, dark(), &mut chooser, &mut rng, 50,
    )
    .unwrap();
    assert_eq!(report.status, ActivityStatus::Cancelled(CancelReason::TooDark));
    assert_eq!(report.turns, 1);
    assert!(report.outcome.is_none());
    assert!(state.crafts.contains_key(&craft_id));
}

#[test]
fn scripted_choice_selects_the_named_alternative() {
    let content = base_content();
    let mut state = base_state(&content);
    // Leather alongside rags makes the pouch's first group a real choice.
    state.pool.add(
        Location::Carried,
        Item::stack(ItemId("leather_1".to_string()), ItemTypeId("leather".to_string()), 2),
    );
    state.pool.add(
        Location::Carried,
        Item::unit(ItemId("rag_4".to_string()), ItemTypeId("rag".to_string())),
    );

    let mut script = ScriptedChooser::new([Answer::Pick(1)]);
    let plan = CraftPlan::build(
        &content,
        &RecipeId("tailored_pouch".to_string()),
        1,
        &state.pool,
        false,
        &mut script,
    )
    .unwrap();
    assert_eq!(script.asked, 1);
    assert_eq!(plan.components[0].comp.type_id, ItemTypeId("leather".to_string()));
    assert_eq!(plan.components[0].use_from, UsageFrom::Carried);
}

#[test]
fn exhausted_script_declines() {
    let content = base_content();
    let mut state = base_state(&content);
    state.pool.add(
        Location::Carried,
        Item::stack(ItemId("leather_1".to_string()), ItemTypeId("leather".to_string()), 2),
    );
    state.pool.add(
        Location::Carried,
        Item::unit(ItemId("rag_4".to_string()), ItemTypeId("rag".to_string())),
    );
    let mut script = ScriptedChooser::new([]);
    let err = CraftPlan::build(
        &content,
        &RecipeId("tailored_pouch".to_string()),
        1,
        &state.pool,
        false,
        &mut script,
    );
    assert!(matches!(err, Err(CraftError::Declined)));
}

#[test]
fn disassembly_drive_returns_components() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let mut crew = base_crew();
    state.pool.add(
        Location::Carried,
        Item::unit(ItemId("frame_1".to_string()), ItemTypeId("welded_frame".to_string())),
    );

    let (mut activity, _) = DisassemblyActivity::start(
        ItemId("frame_1".to_string()),
        &mut state,
        &content,
        false,
        &mut AutoChooser::default(),
    )
    .unwrap();
    let report = drive_disassembly(
        &mut activity,
        &mut state,
        &content,
        &mut crew.crafter,
        daylight(1_000),
        &mut rng,
        10,
    )
    .unwrap();
    assert_eq!(report.status, ActivityStatus::Finished);
    assert_eq!(report.turns, 3);
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e.event, Event::DisassemblyCompleted { .. })));
    assert!(state.pool.find(&ItemId("frame_1".to_string())).is_none());
}

fn nail_boards(batches: u32) -> CraftOrder {
    CraftOrder {
        recipe_id: RecipeId("nail_board".to_string()),
        batch: 1,
        batches,
    }
}

fn boards_carried(state: &craft_core::WorkshopState) -> usize {
    state
        .pool
        .items()
        .iter()
        .filter(|p| p.location == Location::Carried && p.item.type_id.0 == "nailed_board")
        .count()
}

#[test]
fn session_repeats_until_stock_runs_out() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let mut crew = base_crew();
    let mut session = CraftSession::default();

    // five nails cover two boards of two nails each
    let report = session
        .run(
            &nail_boards(5),
            &mut state,
            &content,
            &mut crew,
            daylight(100),
            &mut AutoChooser::default(),
            &mut rng,
            200,
        )
        .unwrap();

    assert_eq!(report.batches, 2);
    assert_eq!(report.turns, 20);
    assert_eq!(report.status, ActivityStatus::Finished);
    assert_eq!(boards_carried(&state), 2);
    assert_eq!(session.rebuilds(), 2);
}

#[test]
fn single_batch_order_stops_after_one_board() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let mut crew = base_crew();
    let mut session = CraftSession::default();

    let report = session
        .run(
            &nail_boards(1),
            &mut state,
            &content,
            &mut crew,
            daylight(100),
            &mut AutoChooser::default(),
            &mut rng,
            200,
        )
        .unwrap();
    assert_eq!(report.batches, 1);
    assert_eq!(boards_carried(&state), 1);
    assert!(report.events.iter().any(|e| matches!(
        e.event,
        Event::CraftCompleted { .. }
    )));
}

#[test]
fn planning_twice_in_one_turn_reuses_the_snapshot() {
    let content = base_content();
    let state = base_state(&content);
    let mut session = CraftSession::default();
    let mut chooser = AutoChooser::default();

    let first = session
        .plan(&nail_boards(1), &state, &content, false, 100, &mut chooser)
        .unwrap();
    let second = session
        .plan(&nail_boards(1), &state, &content, false, 100, &mut chooser)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(session.rebuilds(), 1);

    // spending moves differently is a new cache key
    session
        .plan(&nail_boards(1), &state, &content, false, 50, &mut chooser)
        .unwrap();
    assert_eq!(session.rebuilds(), 2);
}

#[test]
fn planning_from_the_snapshot_reports_missing_stock() {
    let content = base_content();
    let state = base_state(&content);
    let mut session = CraftSession::default();
    let order = CraftOrder {
        recipe_id: RecipeId("jerky".to_string()),
        batch: 1,
        batches: 1,
    };
    let err = session
        .plan(&order, &state, &content, false, 100, &mut AutoChooser::default())
        .unwrap_err();
    assert!(matches!(err, CraftError::MissingRequirements(_)));
}
