use super::*;

fn to_json(state: &WorkshopState) -> String {
    serde_json::to_string(state).unwrap()
}

#[test]
fn workshop_state_round_trips_mid_craft() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let mut crew = base_crew();
    let craft_id = begin(&mut state, &content, "welded_frame", 1, &mut rng);
    let (mut activity, _) = CraftActivity::start(craft_id.clone(), &mut state, &content, &crew, &mut rng);
    activity.tick(&mut state, &content, &mut crew, daylight(6_000), &mut AlwaysFirst, &mut rng);

    let json = to_json(&state);
    let restored: WorkshopState = serde_json::from_str(&json).unwrap();
    assert_eq!(to_json(&restored), json);
    assert_eq!(
        restored.crafts[&craft_id].progress(),
        state.crafts[&craft_id].progress()
    );
    assert_eq!(
        restored.crafts[&craft_id].components().len(),
        state.crafts[&craft_id].components().len()
    );
}

#[test]
fn restored_state_continues_identically() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let mut crew = base_crew();
    let craft_id = begin(&mut state, &content, "rag_bandage", 1, &mut rng);
    let (mut activity, _) = CraftActivity::start(craft_id.clone(), &mut state, &content, &crew, &mut rng);
    activity.tick(&mut state, &content, &mut crew, daylight(600), &mut AlwaysFirst, &mut rng);

    let mut restored: WorkshopState = serde_json::from_str(&to_json(&state)).unwrap();
    let mut restored_activity: CraftActivity =
        serde_json::from_str(&serde_json::to_string(&activity).unwrap()).unwrap();
    let mut restored_crew = crew.clone();
    let mut restored_rng = rng.clone();

    let a = run_until_stopped(&mut activity, &mut state, &content, &mut crew, 600, &mut rng, 20);
    let b = run_until_stopped(
        &mut restored_activity,
        &mut restored,
        &content,
        &mut restored_crew,
        600,
        &mut restored_rng,
        20,
    );
    let ids = |events: &[EventEnvelope]| events.iter().map(|e| e.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&a), ids(&b));
    assert_eq!(activity.status(), restored_activity.status());
    assert_eq!(to_json(&state), to_json(&restored));
}

#[test]
fn resuming_a_parked_craft_rolls_a_new_checkpoint() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let mut crew = base_crew();
    let craft_id = begin(&mut state, &content, "welded_frame", 1, &mut rng);
    let (mut activity, _) = CraftActivity::start(craft_id.clone(), &mut state, &content, &crew, &mut rng);
    activity.tick(&mut state, &content, &mut crew, daylight(6_000), &mut AlwaysFirst, &mut rng);
    let progress = state.crafts[&craft_id].progress();

    // Parking is simply not ticking; nothing else changes.
    activity.cancel(&mut state, CancelReason::ActorRequested);
    assert_eq!(state.crafts[&craft_id].progress(), progress);

    let (resumed, _) = CraftActivity::start(craft_id.clone(), &mut state, &content, &crew, &mut rng);
    assert_eq!(resumed.status(), ActivityStatus::Running);
    let checkpoint = state.crafts[&craft_id].next_failure_point().unwrap();
    assert!(checkpoint >= progress);
}
