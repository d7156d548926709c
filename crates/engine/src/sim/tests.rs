use super::*;
use crate::world::{ConfigError, TileType, Vec2, WorldConfig, WorldSeed};

const DT: f32 = 1.0 / 60.0;

fn small_config() -> WorldConfig {
    WorldConfig {
        width: 10,
        height: 8,
        ..WorldConfig::default()
    }
}

fn session_with(roster: Vec<RosterEntry>) -> Session {
    Session::with_roster(small_config(), WorldSeed(0.42), roster).expect("session")
}

fn center_of(session: &Session, index: usize) -> Vec2 {
    session.tilemap().tile_center_px(index).expect("index in bounds")
}

fn dwarf_at(name: &str, position: Vec2) -> RosterEntry {
    RosterEntry::new(name, 0xffffff).at(position)
}

fn quiet_tuning() -> SimTuning {
    SimTuning {
        wander_chance: 0.0,
        ..SimTuning::default()
    }
}

/// Ticks until `done` holds or `max_ticks` run out; returns whether it held.
fn run_until(session: &mut Session, max_ticks: u32, mut done: impl FnMut(&Session) -> bool) -> bool {
    for _ in 0..max_ticks {
        session.tick(DT);
        if done(session) {
            return true;
        }
    }
    false
}

fn push_state(states: &mut Vec<AgentState>, state: AgentState) {
    if states.last() != Some(&state) {
        states.push(state);
    }
}

#[test]
fn chop_next_to_first_forest_runs_full_cycle() {
    let config = WorldConfig {
        width: 60,
        height: 45,
        ..WorldConfig::default()
    };
    let probe = Session::with_roster(config, WorldSeed(0.42), Vec::new()).expect("probe");
    let forest = probe
        .tilemap()
        .tiles()
        .iter()
        .position(|tile| *tile == TileType::Forest)
        .expect("seed 0.42 has forest");
    let (x, y) = probe.tilemap().coords_of(forest).expect("coords");
    let neighbor = if x > 0 { x - 1 } else { x + 1 };
    let start = probe
        .tilemap()
        .tile_center_px(probe.tilemap().index_of(neighbor, y).expect("neighbor"))
        .expect("center");

    let mut session = Session::with_roster(config, WorldSeed(0.42), vec![dwarf_at("Urist", start)])
        .expect("session")
        .with_tuning(quiet_tuning());
    let wood_before = session.resources().wood;
    session.issue_task(forest, TaskKind::Chop).expect("chop accepted");

    let mut states = vec![session.agents()[0].state];
    let mut terrain_reports = 0;
    for _ in 0..400 {
        let report = session.tick(DT);
        if report.terrain_changed() {
            terrain_reports += 1;
        }
        push_state(&mut states, session.agents()[0].state);
    }

    assert_eq!(
        states,
        vec![
            AgentState::Idle,
            AgentState::Moving,
            AgentState::Working,
            AgentState::Idle
        ]
    );
    assert_eq!(session.effective_tile(forest), Some(TileType::Stump));
    assert_eq!(session.resources().wood, wood_before + 5);
    assert!(session.tasks().task_at(forest).is_none());
    assert!(session.tasks().is_empty());
    assert_eq!(terrain_reports, 1);
}

#[test]
fn three_agents_claim_three_tasks_in_submission_order() {
    let base = Vec2::new(40.0, 40.0);
    let mut session = session_with(vec![
        dwarf_at("Urist", base),
        dwarf_at("Bomrek", base + Vec2::new(20.0, 0.0)),
        dwarf_at("Kadol", base + Vec2::new(40.0, 0.0)),
    ]);
    let indices = [21, 45, 13];
    for index in indices {
        session.overlay_mut().set(index, TileType::Forest);
    }
    let ids = indices
        .iter()
        .map(|index| session.issue_task(*index, TaskKind::Chop).expect("accepted"))
        .collect::<Vec<_>>();

    session.tick(DT);

    for (slot, task_id) in ids.iter().enumerate() {
        let task = session.tasks().get(*task_id).expect("task queued");
        assert_eq!(task.claimed_by, Some(AgentId(slot as u32)));
        let agent = &session.agents()[slot];
        assert_eq!(agent.state, AgentState::Moving);
        assert_eq!(
            agent.target.map(|target| target.purpose),
            Some(TargetPurpose::Task {
                index: indices[slot]
            })
        );
    }
}

#[test]
fn chop_completes_exactly_once_with_two_agents_nearby() {
    let index = 34;
    let session = session_with(Vec::new());
    let center = center_of(&session, index);
    let mut session = session_with(vec![
        dwarf_at("Urist", center + Vec2::new(-20.0, 0.0)),
        dwarf_at("Bomrek", center + Vec2::new(20.0, 0.0)),
    ])
    .with_tuning(quiet_tuning());
    session.overlay_mut().set(index, TileType::Forest);
    let wood_before = session.resources().wood;
    session.issue_task(index, TaskKind::Chop).expect("accepted");

    let mut completed = 0;
    let mut credited = 0;
    for _ in 0..600 {
        let report = session.tick(DT);
        completed += report.counts.task_completed;
        credited += report.counts.resources_credited;
    }

    assert_eq!(completed, 1);
    assert_eq!(credited, 1);
    assert_eq!(session.resources().wood, wood_before + 5);
    assert_eq!(session.effective_tile(index), Some(TileType::Stump));
    assert!(session.tasks().is_empty());
}

#[test]
fn chop_rejected_once_tile_becomes_stump() {
    let index = 12;
    let session = session_with(Vec::new());
    let center = center_of(&session, index);
    let mut session = session_with(vec![dwarf_at("Urist", center)]).with_tuning(quiet_tuning());
    session.overlay_mut().set(index, TileType::Forest);
    session.issue_task(index, TaskKind::Chop).expect("accepted");
    assert!(run_until(&mut session, 400, |session| session.tasks().is_empty()));

    let rejected = session
        .issue_task(index, TaskKind::Chop)
        .expect_err("stump is not choppable");
    assert!(matches!(rejected, TaskRejected::InvalidTile { tile: TileType::Stump, .. }));
}

#[test]
fn mine_credits_stone_and_leaves_floor() {
    let index = 27;
    let session = session_with(Vec::new());
    let center = center_of(&session, index);
    let mut session = session_with(vec![dwarf_at("Urist", center)]).with_tuning(SimTuning {
        mine_bonus_chance: 0.0,
        ..quiet_tuning()
    });
    session.overlay_mut().set(index, TileType::Mountain);
    let before = session.resources();
    session.issue_task(index, TaskKind::Mine).expect("accepted");

    assert!(run_until(&mut session, 400, |session| session.tasks().is_empty()));
    assert_eq!(session.resources().stone, before.stone + 1);
    assert_eq!(session.resources().gold, before.gold);
    assert_eq!(session.effective_tile(index), Some(TileType::Floor));
}

#[test]
fn mine_bonus_credits_gold() {
    let index = 27;
    let session = session_with(Vec::new());
    let center = center_of(&session, index);
    let mut session = session_with(vec![dwarf_at("Urist", center)]).with_tuning(SimTuning {
        mine_bonus_chance: 1.0,
        ..quiet_tuning()
    });
    session.overlay_mut().set(index, TileType::Mountain);
    session.issue_task(index, TaskKind::Mine).expect("accepted");

    assert!(run_until(&mut session, 400, |session| session.tasks().is_empty()));
    assert_eq!(session.resources().gold, 1);
}

#[test]
fn build_debits_at_submission_and_places_wall() {
    let index = 40;
    let session = session_with(Vec::new());
    let center = center_of(&session, index);
    let mut session = session_with(vec![dwarf_at("Urist", center)]).with_tuning(quiet_tuning());
    session.overlay_mut().set(index, TileType::Grass);
    let wood_before = session.resources().wood;

    session.issue_task(index, TaskKind::BuildWood).expect("accepted");
    assert_eq!(session.resources().wood, wood_before - BUILD_WOOD_COST.amount);

    assert!(run_until(&mut session, 400, |session| session.tasks().is_empty()));
    assert_eq!(session.effective_tile(index), Some(TileType::WoodWall));
    assert_eq!(session.resources().wood, wood_before - BUILD_WOOD_COST.amount);
}

#[test]
fn build_without_resources_is_rejected_without_side_effects() {
    let index = 40;
    let mut session = session_with(Vec::new()).with_resources(Resources {
        wood: 4,
        stone: 0,
        food: 0,
        gold: 0,
    });
    session.overlay_mut().set(index, TileType::Grass);

    let rejected = session
        .issue_task(index, TaskKind::BuildWood)
        .expect_err("too little wood");
    assert!(matches!(
        rejected,
        TaskRejected::InsufficientResources {
            resource: ResourceKind::Wood,
            needed: 5,
            available: 4,
            ..
        }
    ));
    assert_eq!(session.resources().wood, 4);
    assert!(session.tasks().is_empty());
}

#[test]
fn out_of_bounds_submission_is_rejected() {
    let mut session = session_with(Vec::new());
    assert_eq!(
        session.issue_task(80, TaskKind::Chop),
        Err(TaskRejected::OutOfBounds { index: 80 })
    );
    assert!(matches!(
        session.issue_task_at(10, 0, TaskKind::Chop),
        Err(TaskRejected::OutOfBounds { .. })
    ));
}

#[test]
fn coincident_agents_separate_while_moving() {
    let start = Vec2::new(100.0, 100.0);
    let mut session = session_with(vec![dwarf_at("Urist", start), dwarf_at("Bomrek", start)])
        .with_tuning(quiet_tuning());
    let far = Vec2::new(300.0, 100.0);
    for agent in session.agents_mut() {
        agent.state = AgentState::Moving;
        agent.target = Some(AgentTarget {
            point: far,
            purpose: TargetPurpose::Base,
        });
    }

    session.tick(DT);

    let first = session.agents()[0].position;
    let second = session.agents()[1].position;
    assert!(first.distance(second) > 1.0, "{first:?} vs {second:?}");
    assert!(first.x < second.x);
}

#[test]
fn low_energy_agent_returns_to_base_sleeps_and_recovers() {
    let session = session_with(Vec::new());
    let start = session
        .tilemap()
        .clamp_to_bounds(session.spawn_point() + Vec2::new(40.0, 30.0));
    let mut session = session_with(vec![dwarf_at("Urist", start)]).with_tuning(quiet_tuning());
    session.agents_mut()[0].energy = 15.0;

    let mut states = vec![AgentState::Idle];
    let mut slept = 0;
    let mut rested = 0;
    for _ in 0..1500 {
        let report = session.tick(DT);
        slept += report.counts.agent_sleeping;
        rested += report.counts.agent_rested;
        push_state(&mut states, session.agents()[0].state);
    }

    assert_eq!(
        states,
        vec![
            AgentState::Idle,
            AgentState::Moving,
            AgentState::Sleeping,
            AgentState::Idle
        ]
    );
    assert_eq!((slept, rested), (1, 1));
    let agent = &session.agents()[0];
    assert!(agent.energy > 90.0);
    assert!(agent.position.distance(session.spawn_point()) < 8.0);
}

#[test]
fn low_energy_agent_leaves_tasks_unclaimed() {
    let index = 12;
    let mut session = session_with(vec![dwarf_at("Urist", Vec2::new(100.0, 100.0))])
        .with_tuning(quiet_tuning());
    session.agents_mut()[0].energy = 5.0;
    session.overlay_mut().set(index, TileType::Forest);
    let task_id = session.issue_task(index, TaskKind::Chop).expect("accepted");

    session.tick(DT);

    assert_eq!(session.tasks().get(task_id).and_then(|task| task.claimed_by), None);
    assert_eq!(
        session.agents()[0].target.map(|target| target.purpose),
        Some(TargetPurpose::Base)
    );
}

#[test]
fn disabled_energy_never_drains() {
    let mut session = session_with(vec![dwarf_at("Urist", Vec2::new(100.0, 100.0))]).with_tuning(
        SimTuning {
            energy_enabled: false,
            ..quiet_tuning()
        },
    );
    for _ in 0..120 {
        session.tick(DT);
    }
    assert_eq!(session.agents()[0].energy, MAX_ENERGY);
}

#[test]
fn worker_whose_task_vanished_returns_to_idle() {
    let index = 3;
    let mut session = session_with(vec![dwarf_at("Urist", Vec2::new(100.0, 100.0))]);
    {
        let agent = &mut session.agents_mut()[0];
        agent.state = AgentState::Working;
        agent.work_timer = 0.001;
        agent.target = Some(AgentTarget {
            point: Vec2::new(100.0, 100.0),
            purpose: TargetPurpose::Task { index },
        });
    }

    let report = session.tick(DT);
    assert!(report.events.contains(&SimEvent::WorkTargetMissing {
        agent_id: AgentId(0),
        index
    }));
    assert_eq!(report.counts.task_completed, 0);

    let agent = &session.agents()[0];
    assert_eq!(agent.state, AgentState::Idle);
    assert_eq!(agent.target, None);
    assert_eq!(session.overlay().get(index), None);
}

#[test]
fn restored_session_finishes_work_in_progress() {
    let index = 34;
    let session = session_with(Vec::new());
    let center = center_of(&session, index);
    let mut session = session_with(vec![dwarf_at("Urist", center + Vec2::new(24.0, 0.0))])
        .with_tuning(quiet_tuning());
    session.overlay_mut().set(index, TileType::Forest);
    let wood_before = session.resources().wood;
    session.issue_task(index, TaskKind::Chop).expect("accepted");
    assert!(run_until(&mut session, 200, |session| {
        session.agents()[0].state == AgentState::Working
    }));

    let snapshot = session.snapshot();
    let mut restored =
        Session::restore(small_config(), *session.tuning(), &snapshot).expect("restore");
    assert_eq!(restored.agents()[0].state, AgentState::Working);
    assert_eq!(
        restored.tasks().task_at(index).and_then(|task| task.claimed_by),
        Some(AgentId(0))
    );

    assert!(run_until(&mut restored, 400, |session| session.tasks().is_empty()));
    assert_eq!(restored.resources().wood, wood_before + 5);
    assert_eq!(restored.effective_tile(index), Some(TileType::Stump));
}

#[test]
fn same_seed_and_orders_replay_identically() {
    let run = || {
        let mut session = Session::new(small_config(), WorldSeed(0.42)).expect("session");
        session.overlay_mut().set(15, TileType::Forest);
        session.overlay_mut().set(33, TileType::Mountain);
        session.issue_task(15, TaskKind::Chop).expect("chop");
        session.issue_task(33, TaskKind::Mine).expect("mine");
        for _ in 0..500 {
            session.tick(DT);
        }
        session.snapshot()
    };

    assert_eq!(run(), run());
}

#[test]
fn submitted_event_is_reported_with_next_tick() {
    let index = 12;
    let mut session = session_with(Vec::new());
    session.overlay_mut().set(index, TileType::Forest);
    let task_id = session.issue_task(index, TaskKind::Chop).expect("accepted");

    let report = session.tick(DT);
    assert_eq!(report.counts.task_submitted, 1);
    assert_eq!(
        report.events[0],
        SimEvent::TaskSubmitted {
            task_id,
            index,
            kind: TaskKind::Chop
        }
    );
    assert_eq!(session.tick(DT).counts.task_submitted, 0);
}

#[test]
fn roster_spacing_comes_from_construction_tuning() {
    let tuning = SimTuning {
        roster_spacing_px: 50.0,
        ..SimTuning::default()
    };
    let roster = vec![RosterEntry::new("Urist", 0xe74c3c), RosterEntry::new("Bomrek", 0x3498db)];
    let session =
        Session::with_tuning_and_roster(small_config(), WorldSeed(0.42), tuning, roster)
            .expect("session");

    let spawn = session.spawn_point();
    let expected = session.tilemap().clamp_to_bounds(spawn + Vec2::new(50.0, 0.0));
    assert_eq!(session.agents()[0].position, session.tilemap().clamp_to_bounds(spawn));
    assert_eq!(session.agents()[1].position, expected);
    assert_eq!(session.tuning().roster_spacing_px, 50.0);
}

#[test]
fn default_tuning_is_valid() {
    assert_eq!(SimTuning::default().validate(), Ok(()));
}

#[test]
fn degenerate_tuning_is_rejected_by_field() {
    let cases = [
        (
            "arrival_threshold_px",
            SimTuning {
                arrival_threshold_px: 0.0,
                ..SimTuning::default()
            },
        ),
        (
            "speed_px_per_second",
            SimTuning {
                speed_px_per_second: f32::NAN,
                ..SimTuning::default()
            },
        ),
        (
            "work_duration_seconds",
            SimTuning {
                work_duration_seconds: -1.0,
                ..SimTuning::default()
            },
        ),
        (
            "repulsion_radius_px",
            SimTuning {
                repulsion_radius_px: -4.0,
                ..SimTuning::default()
            },
        ),
        (
            "mine_bonus_chance",
            SimTuning {
                mine_bonus_chance: 1.5,
                ..SimTuning::default()
            },
        ),
    ];
    for (expected_field, tuning) in cases {
        match tuning.validate() {
            Err(ConfigError::InvalidTuning { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("{expected_field}: unexpected result {other:?}"),
        }
    }
}

#[test]
fn sessions_refuse_zero_arrival_threshold() {
    let stalled = SimTuning {
        arrival_threshold_px: 0.0,
        ..quiet_tuning()
    };
    assert!(matches!(
        Session::new_with_tuning(small_config(), WorldSeed(0.42), stalled),
        Err(ConfigError::InvalidTuning { field: "arrival_threshold_px", .. })
    ));

    let snapshot = session_with(Vec::new()).snapshot();
    assert!(matches!(
        Session::restore(small_config(), stalled, &snapshot),
        Err(crate::save::SnapshotError::Config(ConfigError::InvalidTuning { .. }))
    ));
}
