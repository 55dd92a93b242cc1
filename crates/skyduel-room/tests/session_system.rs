//! Integration tests for the session layer, driven through the controller.

use std::collections::HashSet;
use std::time::Duration;

use skyduel_protocol::{
    GameMode, InputSample, PlayerAddress, PlayerPublicState, RoomCode, SessionStatus, ShipStats,
    Slot, SlotInfo,
};
use skyduel_room::{
    Departure, InputOutcome, MemoryMatchStore, SessionConfig, SessionController, SessionError,
};
use skyduel_sim::Tuning;

// =========================================================================
// Helpers
// =========================================================================

fn addr(s: &str) -> PlayerAddress {
    PlayerAddress::new(s)
}

fn slot(address: &str) -> SlotInfo {
    SlotInfo {
        address: addr(address),
        ship: ShipStats::default(),
    }
}

/// Fixed seed, nothing spawns.
fn quiet_config() -> SessionConfig {
    SessionConfig {
        seed: Some(7),
        tuning: Tuning::default().without_spawns(),
        ..SessionConfig::default()
    }
}

fn controller() -> SessionController<MemoryMatchStore> {
    SessionController::new(quiet_config(), MemoryMatchStore::new())
}

async fn versus_room(ctl: &SessionController<MemoryMatchStore>) -> RoomCode {
    let code = ctl
        .create_session(GameMode::Versus, slot("host"))
        .await
        .unwrap();
    ctl.join_session(&code, slot("guest")).await.unwrap();
    code
}

async fn playing_room(ctl: &SessionController<MemoryMatchStore>) -> RoomCode {
    let code = versus_room(ctl).await;
    ctl.set_ready(&code, addr("host"), true).await.unwrap();
    let room = ctl.set_ready(&code, addr("guest"), true).await.unwrap();
    assert_eq!(room.status, SessionStatus::Playing);
    code
}

fn input(seq: u64) -> InputSample {
    InputSample {
        seq,
        right: true,
        ..Default::default()
    }
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// =========================================================================
// Create and join
// =========================================================================

#[tokio::test]
async fn test_create_session_allocates_unique_codes() {
    let ctl = controller();
    let mut codes = HashSet::new();
    for i in 0..20 {
        let code = ctl
            .create_session(GameMode::Multiplayer, slot(&format!("h{i}")))
            .await
            .unwrap();
        assert_eq!(code.as_str().len(), RoomCode::LEN);
        assert!(codes.insert(code));
    }
    assert_eq!(ctl.session_count().await, 20);
}

#[tokio::test]
async fn test_new_room_is_waiting_with_host_only() {
    let ctl = controller();
    let code = ctl
        .create_session(GameMode::Multiplayer, slot("host"))
        .await
        .unwrap();
    let room = ctl.get_room(&code).await.unwrap();
    assert_eq!(room.status, SessionStatus::Waiting);
    assert_eq!(room.host.address, addr("host"));
    assert!(room.guest.is_none());
    assert_eq!(room.ready, [false, false]);
}

#[tokio::test]
async fn test_join_fills_guest_and_rejoin_is_idempotent() {
    let ctl = controller();
    let code = versus_room(&ctl).await;
    let again = ctl.join_session(&code, slot("guest")).await.unwrap();
    assert_eq!(again.guest.unwrap().address, addr("guest"));
}

#[tokio::test]
async fn test_join_errors() {
    let ctl = controller();
    let code = versus_room(&ctl).await;

    let err = ctl.join_session(&code, slot("third")).await.unwrap_err();
    assert!(matches!(err, SessionError::RoomFull(_)));

    let err = ctl.join_session(&code, slot("host")).await.unwrap_err();
    assert!(matches!(err, SessionError::HostCannotJoin(_)));

    let missing = RoomCode::parse("000000").unwrap();
    let err = ctl.join_session(&missing, slot("x")).await.unwrap_err();
    assert!(matches!(err, SessionError::RoomNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn test_join_solo_room_is_wrong_mode() {
    let ctl = controller();
    let code = ctl.create_session(GameMode::Solo, slot("solo")).await.unwrap();
    let err = ctl.join_session(&code, slot("guest")).await.unwrap_err();
    assert!(matches!(err, SessionError::WrongMode(_, GameMode::Solo)));
}

#[tokio::test(start_paused = true)]
async fn test_join_playing_room_is_already_playing() {
    let ctl = controller();
    let code = ctl
        .create_session(GameMode::Multiplayer, slot("host"))
        .await
        .unwrap();
    ctl.start_simulation(&code, None).await.unwrap();
    let err = ctl.join_session(&code, slot("late")).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyPlaying(_)));
    assert_eq!(err.code(), 409);
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_solo_session_starts_immediately_and_ticks() {
    let ctl = controller();
    let code = ctl.create_session(GameMode::Solo, slot("solo")).await.unwrap();
    assert_eq!(ctl.get_room(&code).await.unwrap().status, SessionStatus::Playing);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let snap = ctl.snapshot(&code).await.unwrap();
    assert!(snap.tick >= 10, "tick {}", snap.tick);
    assert!(snap.player(Slot::Host).is_some());
    assert!(snap.player(Slot::Guest).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_all_ready_starts_simulation() {
    let ctl = controller();
    let code = versus_room(&ctl).await;
    let room = ctl.set_ready(&code, addr("host"), true).await.unwrap();
    assert_eq!(room.status, SessionStatus::Waiting);
    // Setting the same flag again changes nothing.
    ctl.set_ready(&code, addr("host"), true).await.unwrap();
    let room = ctl.set_ready(&code, addr("guest"), true).await.unwrap();
    assert_eq!(room.status, SessionStatus::Playing);
    assert_eq!(room.ready, [true, true]);
}

#[tokio::test]
async fn test_set_ready_requires_membership() {
    let ctl = controller();
    let code = versus_room(&ctl).await;
    let err = ctl.set_ready(&code, addr("stranger"), true).await.unwrap_err();
    assert!(matches!(err, SessionError::NotInRoom(..)));
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent_while_playing() {
    let ctl = controller();
    let code = playing_room(&ctl).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let before = ctl.snapshot(&code).await.unwrap().tick;
    let room = ctl.start_simulation(&code, None).await.unwrap();
    assert_eq!(room.status, SessionStatus::Playing);
    // Restarting would have reset the tick counter.
    assert!(ctl.snapshot(&code).await.unwrap().tick >= before);
}

#[tokio::test]
async fn test_stop_waiting_session_is_not_playing() {
    let ctl = controller();
    let code = versus_room(&ctl).await;
    let err = ctl.stop_simulation(&code, "test").await.unwrap_err();
    assert!(matches!(err, SessionError::NotPlaying(_)));
    assert_eq!(ctl.get_room(&code).await.unwrap().status, SessionStatus::Waiting);
}

#[tokio::test(start_paused = true)]
async fn test_stop_finishes_and_is_terminal() {
    let ctl = controller();
    let code = playing_room(&ctl).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let room = ctl.stop_simulation(&code, "test").await.unwrap();
    assert_eq!(room.status, SessionStatus::Finished);
    let frozen = ctl.snapshot(&code).await.unwrap();
    assert_eq!(frozen.status, SessionStatus::Finished);

    // Second stop is a no-op, start cannot resurrect it.
    ctl.stop_simulation(&code, "again").await.unwrap();
    let err = ctl.start_simulation(&code, None).await.unwrap_err();
    assert!(matches!(err, SessionError::Finished(_)));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ctl.snapshot(&code).await.unwrap().tick, frozen.tick);
}

#[tokio::test(start_paused = true)]
async fn test_finished_session_saves_one_record_per_player() {
    let ctl = controller();
    let code = playing_room(&ctl).await;
    tokio::time::sleep(Duration::from_millis(160)).await;
    ctl.stop_simulation(&code, "test").await.unwrap();
    settle().await;

    let records = ctl.match_store().records();
    assert_eq!(records.len(), 2);
    let addresses: HashSet<_> = records.iter().map(|r| r.address.clone()).collect();
    assert!(addresses.contains(&addr("host")) && addresses.contains(&addr("guest")));
    assert!(records.iter().all(|r| r.room_code == code && r.mode == GameMode::Versus));
    assert!(records.iter().all(|r| r.duration_ms > 0));
}

#[tokio::test(start_paused = true)]
async fn test_finished_session_removed_after_grace() {
    let ctl = controller();
    let code = playing_room(&ctl).await;
    ctl.stop_simulation(&code, "test").await.unwrap();

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert!(ctl.get_room(&code).await.is_ok());

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    let err = ctl.get_room(&code).await.unwrap_err();
    assert!(matches!(err, SessionError::RoomNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn test_idle_waiting_session_expires() {
    let ctl = controller();
    let code = ctl
        .create_session(GameMode::Multiplayer, slot("host"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(601)).await;
    settle().await;
    assert_eq!(ctl.session_count().await, 0);
    assert!(ctl.get_room(&code).await.is_err());
}

#[tokio::test]
async fn test_teardown_removes_session() {
    let ctl = controller();
    let code = versus_room(&ctl).await;
    ctl.teardown(&code).await.unwrap();
    assert!(matches!(
        ctl.get_room(&code).await.unwrap_err(),
        SessionError::RoomNotFound(_)
    ));
    assert!(matches!(
        ctl.teardown(&code).await.unwrap_err(),
        SessionError::RoomNotFound(_)
    ));
}

// =========================================================================
// Leave
// =========================================================================

#[tokio::test]
async fn test_guest_leave_frees_slot() {
    let ctl = controller();
    let code = versus_room(&ctl).await;
    ctl.set_ready(&code, addr("guest"), true).await.unwrap();
    let departure = ctl.leave(&code, addr("guest")).await.unwrap();
    assert_eq!(departure, Departure::Left);

    let room = ctl.get_room(&code).await.unwrap();
    assert!(room.guest.is_none());
    assert_eq!(room.ready, [false, false]);
    ctl.join_session(&code, slot("newcomer")).await.unwrap();
}

#[tokio::test]
async fn test_host_leave_closes_waiting_room() {
    let ctl = controller();
    let code = versus_room(&ctl).await;
    assert_eq!(ctl.leave(&code, addr("host")).await.unwrap(), Departure::Closed);
    assert!(ctl.get_room(&code).await.is_err());
}

// =========================================================================
// Input channel
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_input_applied_once_per_seq() {
    let ctl = controller();
    let code = playing_room(&ctl).await;
    let start_x = ctl.snapshot(&code).await.unwrap().player(Slot::Host).unwrap().x;

    assert_eq!(
        ctl.submit_input(&code, &addr("host"), input(1)).await,
        InputOutcome::Accepted
    );
    assert_eq!(
        ctl.submit_input(&code, &addr("host"), input(1)).await,
        InputOutcome::Stale
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    let snap = ctl.snapshot(&code).await.unwrap();
    let host = snap.player(Slot::Host).unwrap();
    assert_eq!(host.x, start_x + ShipStats::default().speed as f32);
    assert_eq!(host.last_input_seq, 1);
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_inputs_applied_one_per_tick() {
    let ctl = controller();
    let code = playing_room(&ctl).await;
    let start_x = ctl.snapshot(&code).await.unwrap().player(Slot::Host).unwrap().x;

    for seq in 1..=4 {
        assert_eq!(
            ctl.submit_input(&code, &addr("host"), input(seq)).await,
            InputOutcome::Accepted
        );
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let snap = ctl.snapshot(&code).await.unwrap();
    let host = snap.player(Slot::Host).unwrap();
    assert_eq!(host.x, start_x + 4.0 * ShipStats::default().speed as f32);
    assert_eq!(host.last_input_seq, 4);
}

#[tokio::test(start_paused = true)]
async fn test_input_while_waiting_is_stale() {
    let ctl = controller();
    let code = versus_room(&ctl).await;
    assert_eq!(
        ctl.submit_input(&code, &addr("guest"), input(1)).await,
        InputOutcome::Stale
    );

    ctl.set_ready(&code, addr("host"), true).await.unwrap();
    ctl.set_ready(&code, addr("guest"), true).await.unwrap();
    assert_eq!(
        ctl.submit_input(&code, &addr("guest"), input(1)).await,
        InputOutcome::Accepted
    );
}

#[tokio::test(start_paused = true)]
async fn test_input_to_unknown_or_finished_room_is_stale() {
    let ctl = controller();
    let missing = RoomCode::parse("999999").unwrap();
    assert_eq!(
        ctl.submit_input(&missing, &addr("host"), input(1)).await,
        InputOutcome::Stale
    );

    let code = playing_room(&ctl).await;
    assert_eq!(
        ctl.submit_input(&code, &addr("stranger"), input(1)).await,
        InputOutcome::Stale
    );
    ctl.stop_simulation(&code, "test").await.unwrap();
    assert_eq!(
        ctl.submit_input(&code, &addr("host"), input(2)).await,
        InputOutcome::Stale
    );
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_sees_non_decreasing_ticks() {
    let ctl = controller();
    let code = playing_room(&ctl).await;
    let mut rx = ctl.subscribe(&code).await.unwrap();
    let mut last = 0;
    for _ in 0..10 {
        rx.changed().await.unwrap();
        let tick = rx.borrow_and_update().tick;
        assert!(tick >= last);
        last = tick;
    }
    assert!(last > 0);
}

// =========================================================================
// Poll path
// =========================================================================

fn public(slot: Slot, address: &str, tick: u64, x: f32) -> PlayerPublicState {
    PlayerPublicState {
        slot,
        address: addr(address),
        tick,
        timestamp: 0,
        x,
        y: 0.0,
        health: 100,
        score: 0,
        coins: 0,
        alive: true,
        inputs: Vec::new(),
    }
}

#[tokio::test]
async fn test_poll_board_before_start() {
    let ctl = controller();
    let code = versus_room(&ctl).await;
    // The claimed slot is overwritten with the sender's real one.
    ctl.push_self_state(&code, addr("guest"), public(Slot::Host, "spoof", 3, 42.0))
        .await
        .unwrap();

    let others = ctl.other_players(&code, addr("host")).await.unwrap();
    assert_eq!(others.len(), 1);
    assert_eq!(others[0].slot, Slot::Guest);
    assert_eq!(others[0].address, addr("guest"));
    assert_eq!(others[0].x, 42.0);
    assert!(ctl.other_players(&code, addr("guest")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lobby_reports_at_tick_zero_keep_advancing() {
    let ctl = controller();
    let code = versus_room(&ctl).await;
    for (timestamp, x) in [(1_000, 10.0), (1_050, 20.0), (1_100, 30.0)] {
        let mut report = public(Slot::Guest, "guest", 0, x);
        report.timestamp = timestamp;
        ctl.push_self_state(&code, addr("guest"), report).await.unwrap();
    }
    let others = ctl.other_players(&code, addr("host")).await.unwrap();
    assert_eq!(others[0].x, 30.0);
}

#[tokio::test(start_paused = true)]
async fn test_other_players_derived_from_world_while_playing() {
    let ctl = controller();
    let code = playing_room(&ctl).await;
    ctl.push_self_state(&code, addr("guest"), public(Slot::Guest, "guest", 9_999, -50.0))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let others = ctl.other_players(&code, addr("host")).await.unwrap();
    let snap = ctl.snapshot(&code).await.unwrap();
    assert_eq!(others.len(), 1);
    assert_eq!(others[0].x, snap.player(Slot::Guest).unwrap().x);
}

#[tokio::test(start_paused = true)]
async fn test_poll_and_push_inputs_merge() {
    let ctl = controller();
    let code = playing_room(&ctl).await;
    let start_x = ctl.snapshot(&code).await.unwrap().player(Slot::Guest).unwrap().x;

    // A poll report carries every sample since the last accepted report.
    let mut state = public(Slot::Guest, "guest", 1, start_x);
    state.inputs = vec![input(1), input(2), input(3)];
    ctl.push_self_state(&code, addr("guest"), state).await.unwrap();
    assert_eq!(
        ctl.submit_input(&code, &addr("guest"), input(2)).await,
        InputOutcome::Stale
    );
    assert_eq!(
        ctl.submit_input(&code, &addr("guest"), input(4)).await,
        InputOutcome::Accepted
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    let snap = ctl.snapshot(&code).await.unwrap();
    let guest = snap.player(Slot::Guest).unwrap();
    assert_eq!(guest.x, start_x + 4.0 * ShipStats::default().speed as f32);
    assert_eq!(guest.last_input_seq, 4);
    let others = ctl.other_players(&code, addr("host")).await.unwrap();
    assert!(others[0].inputs.is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_all_sessions() {
    let ctl = controller();
    versus_room(&ctl).await;
    versus_room(&ctl).await;
    ctl.shutdown().await;
    assert_eq!(ctl.session_count().await, 0);
}
