//! Arena system tests: real handles, real queues, real timers.

use std::time::Duration;

use riichi_arena::{
    AgentReceiver, Arena, ArenaConfig, ArenaError, ArenaHandle, SharedRegistry, outbound_queue,
};
use riichi_game::{ActionData, BoardEvent, Outcome, Tile, full_tile_set};
use riichi_protocol::{AgentId, ArenaMessage};

// =========================================================================
// Helpers
// =========================================================================

fn config() -> ArenaConfig {
    ArenaConfig {
        reaction_timeout: Duration::from_millis(100),
        ..ArenaConfig::default()
    }
}

fn take(pool: &mut Vec<Tile>, tile: Tile) -> Tile {
    let pos = pool.iter().position(|t| *t == tile).expect("tile left in pool");
    pool.remove(pos)
}

/// Seat 0 deals and draws 5p first; seat 1 holds a pair of 5p and can do
/// nothing with it but pon. Seats 2 and 3 hold no pins past 4p.
fn pon_deck() -> Vec<Tile> {
    let mut pool = full_tile_set(false);
    let seat0 = (1..=9)
        .map(Tile::man)
        .chain([Tile::EAST, Tile::SOUTH, Tile::WEST, Tile::NORTH]);
    let seat1 = [Tile::pin(5), Tile::pin(5)]
        .into_iter()
        .chain((1..=9).map(Tile::sou))
        .chain([Tile::WHITE, Tile::GREEN]);

    let mut deck: Vec<Tile> = Vec::with_capacity(136);
    for tile in seat0.chain(seat1) {
        let taken = take(&mut pool, tile);
        deck.push(taken);
    }
    let first_draw = take(&mut pool, Tile::pin(5));
    let last_five = take(&mut pool, Tile::pin(5));
    deck.extend(pool.drain(..26));
    deck.push(last_five);
    deck.extend(pool.drain(..13));
    deck.push(first_draw);
    deck.extend(pool);
    assert_eq!(deck.len(), 136);
    deck
}

async fn table(handle: &ArenaHandle) -> Vec<AgentReceiver> {
    let mut rxs = Vec::new();
    for n in 1..=4 {
        let (tx, rx) = outbound_queue(256);
        handle.join(AgentId(n), format!("p{n}"), tx).await.unwrap();
        rxs.push(rx);
    }
    rxs
}

/// Receives until `pred` matches a board event, failing after two seconds.
async fn wait_for<F>(rx: &mut AgentReceiver, mut pred: F) -> BoardEvent
where
    F: FnMut(&BoardEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let msg = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("queue closed");
        if let ArenaMessage::ArenaBoardEvent { board_event } = msg {
            if pred(&board_event) {
                return board_event;
            }
        }
    }
}

fn drain(rx: &mut AgentReceiver) -> Vec<ArenaMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn is_draw_by(event: &BoardEvent, seat: usize) -> bool {
    matches!(
        event,
        BoardEvent::PlayerAction { action: ActionData::Draw { .. }, from_player } if *from_player == seat
    )
}

// =========================================================================
// Reactions
// =========================================================================

#[tokio::test]
async fn test_pon_offer_goes_to_holder_only() {
    let handle = ArenaHandle::new(Arena::new("east", config()));
    let mut rxs = table(&handle).await;
    handle.start_game_with(AgentId(1), pon_deck(), [0, 1, 2, 3]).await.unwrap();
    for rx in &mut rxs {
        drain(rx);
    }

    handle
        .player_action(AgentId(1), ActionData::Toss { tile: Tile::pin(5) })
        .await
        .unwrap();

    let offers = drain(&mut rxs[1]);
    assert!(offers.contains(&ArenaMessage::ArenaBoardEvent {
        board_event: BoardEvent::PotentialAction { action: ActionData::Pon { tile: Tile::pin(5) } },
    }));
    for rx in rxs.iter_mut().skip(2) {
        let msgs = drain(rx);
        assert!(!msgs.iter().any(|m| matches!(
            m,
            ArenaMessage::ArenaBoardEvent { board_event: BoardEvent::PotentialAction { .. } }
        )));
    }
}

#[tokio::test]
async fn test_reaction_deadline_skips_for_idle_player() {
    let handle = ArenaHandle::new(Arena::new("east", config()));
    let mut rxs = table(&handle).await;
    handle.start_game_with(AgentId(1), pon_deck(), [0, 1, 2, 3]).await.unwrap();
    handle
        .player_action(AgentId(1), ActionData::Toss { tile: Tile::pin(5) })
        .await
        .unwrap();

    // Seat 1 never answers; after the deadline it draws as if it passed.
    let draw = wait_for(&mut rxs[1], |e| is_draw_by(e, 1)).await;
    let BoardEvent::PlayerAction { action: ActionData::Draw { tile }, .. } = draw else {
        unreachable!();
    };
    assert_ne!(tile, Tile::HIDDEN);

    // Too late to claim.
    let err = handle
        .player_action(AgentId(2), ActionData::Pon { tile: Tile::pin(5) })
        .await
        .unwrap_err();
    assert!(err.is_rule_violation());
}

#[tokio::test]
async fn test_skip_closes_window_without_waiting() {
    let mut slow = config();
    slow.reaction_timeout = Duration::from_secs(60);
    let handle = ArenaHandle::new(Arena::new("east", slow));
    let mut rxs = table(&handle).await;
    handle.start_game_with(AgentId(1), pon_deck(), [0, 1, 2, 3]).await.unwrap();
    handle
        .player_action(AgentId(1), ActionData::Toss { tile: Tile::pin(5) })
        .await
        .unwrap();

    let pon = ActionData::Pon { tile: Tile::pin(5) };
    handle
        .player_action(AgentId(2), ActionData::Skip { action: Box::new(pon) })
        .await
        .unwrap();
    wait_for(&mut rxs[3], |e| is_draw_by(e, 1)).await;
}

#[tokio::test]
async fn test_pon_claim_moves_turn_to_claimant() {
    let mut slow = config();
    slow.reaction_timeout = Duration::from_secs(60);
    let handle = ArenaHandle::new(Arena::new("east", slow));
    let mut rxs = table(&handle).await;
    handle.start_game_with(AgentId(1), pon_deck(), [0, 1, 2, 3]).await.unwrap();
    handle
        .player_action(AgentId(1), ActionData::Toss { tile: Tile::pin(5) })
        .await
        .unwrap();
    for rx in &mut rxs {
        drain(rx);
    }

    handle
        .player_action(AgentId(2), ActionData::Pon { tile: Tile::pin(5) })
        .await
        .unwrap();
    let echoed = drain(&mut rxs[3]);
    assert!(echoed.contains(&ArenaMessage::ArenaBoardEvent {
        board_event: BoardEvent::PlayerAction {
            action: ActionData::Pon { tile: Tile::pin(5) },
            from_player: 1,
        },
    }));

    // The claimant discards next; nobody draws in between.
    assert!(!echoed.iter().any(|m| matches!(
        m,
        ArenaMessage::ArenaBoardEvent { board_event } if matches!(
            board_event,
            BoardEvent::PlayerAction { action: ActionData::Draw { .. }, .. }
        )
    )));
    handle
        .player_action(AgentId(2), ActionData::Toss { tile: Tile::sou(1) })
        .await
        .unwrap();
}

// =========================================================================
// Visibility
// =========================================================================

#[tokio::test]
async fn test_partial_draw_one_full_three_redacted_plus_spectator() {
    let handle = ArenaHandle::new(Arena::new("east", config()));
    let mut rxs = table(&handle).await;
    let (tx, watcher) = outbound_queue(256);
    handle.join(AgentId(9), "watcher", tx).await.unwrap();
    rxs.push(watcher);

    handle.start_game_with(AgentId(1), pon_deck(), [0, 1, 2, 3]).await.unwrap();

    let mut full = 0;
    let mut redacted = 0;
    for rx in &mut rxs {
        for msg in drain(rx) {
            if let ArenaMessage::ArenaBoardEvent {
                board_event: BoardEvent::PlayerAction { action: ActionData::Draw { tile }, .. },
            } = msg
            {
                if tile == Tile::HIDDEN {
                    redacted += 1;
                } else {
                    assert_eq!(tile, Tile::pin(5));
                    full += 1;
                }
            }
        }
    }
    assert_eq!((full, redacted), (1, 4));
}

// =========================================================================
// Registry and lifecycle
// =========================================================================

#[tokio::test]
async fn test_registry_leave_mid_round_aborts_and_returns_to_waiting() {
    let registry = SharedRegistry::new(config());
    let handle = registry.lock().await.create("east").unwrap();
    let mut rxs = Vec::new();
    for n in 1..=4 {
        let (tx, rx) = outbound_queue(256);
        registry.join(AgentId(n), &format!("p{n}"), "east", tx).await.unwrap();
        rxs.push(rx);
    }
    handle.start_game(AgentId(1)).await.unwrap();
    for rx in &mut rxs {
        drain(rx);
    }

    registry.leave(AgentId(4)).await.unwrap();

    let msgs = drain(&mut rxs[0]);
    assert_eq!(msgs[0], ArenaMessage::PlayerQuitEvent { name: "p4".into() });
    assert!(msgs.iter().any(|m| matches!(
        m,
        ArenaMessage::ArenaBoardEvent { board_event: BoardEvent::GameEnd { result } }
            if matches!(result.outcome, Outcome::Aborted { .. })
    )));
    assert!(!handle.snapshot().await.game_started);

    let entry = registry.list().await;
    assert_eq!(entry[0].agents, 3);
    assert!(!entry[0].game_started);
}

#[tokio::test]
async fn test_start_game_twice_rejected() {
    let handle = ArenaHandle::new(Arena::new("east", config()));
    let _rxs = table(&handle).await;
    handle.start_game(AgentId(1)).await.unwrap();
    let err = handle.start_game(AgentId(2)).await.unwrap_err();
    assert!(matches!(err, ArenaError::AlreadyStarted));
    assert!(handle.list_entry().await.game_started);
}
