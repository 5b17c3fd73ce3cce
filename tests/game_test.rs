//! Integration tests for the spin flow against the in-memory store.

use slotkeeper::config::GameConfig;
use slotkeeper::error::GameError;
use slotkeeper::services::{GameService, MemorySink, MemoryStore};
use slotkeeper::types::{Grid, Symbol, WinKind};
use std::sync::Arc;
use std::time::Duration;

// 2024-03-15 10:00:00 UTC. Spins below stay clear of second :14, the
// hourly jackpot second for that hour.
const T0: i64 = 1_710_496_800_000;

fn service_with(config: GameConfig) -> (Arc<GameService<MemoryStore>>, MemorySink) {
    let sink = MemorySink::new();
    let service = GameService::new(Arc::new(MemoryStore::new()), config, Arc::new(sink.clone()));
    (Arc::new(service), sink)
}

fn service() -> (Arc<GameService<MemoryStore>>, MemorySink) {
    service_with(GameConfig {
        starting_balance: 1_000,
        ..GameConfig::default()
    })
}

async fn rig(service: &GameService<MemoryStore>, player: &str, grid: Grid, now: i64) {
    service
        .peek_cache()
        .store_preview(player, grid, now)
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_spins_accept_exactly_one() {
    for round in 0..20 {
        let (svc, _) = service();
        let player = format!("racer{}", round);
        rig(&svc, &player, Grid::new(Symbol::Bell, Symbol::Bell, Symbol::Lemon), T0).await;

        let a = {
            let svc = svc.clone();
            let player = player.clone();
            tokio::spawn(async move { svc.spin_at(&player, "50", T0).await })
        };
        let b = {
            let svc = svc.clone();
            let player = player.clone();
            tokio::spawn(async move { svc.spin_at(&player, "50", T0 + 3).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        let accepted: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(GameError::Duplicate)))
            .count();
        assert_eq!(accepted.len(), 1, "round {}", round);
        assert_eq!(duplicates, 1, "round {}", round);

        let expected = (1_000 + accepted[0].net_delta()) as u64;
        assert_eq!(svc.balance(&player).await, expected);
        assert_eq!(accepted[0].new_balance, expected);
    }
}

#[tokio::test]
async fn test_joined_spins_in_one_task() {
    let (svc, _) = service();
    let (a, b) = tokio::join!(svc.spin_at("joe", "10", T0), svc.spin_at("joe", "10", T0));
    assert!(a.is_ok() ^ b.is_ok());
    assert!(matches!(a.err().or(b.err()), Some(GameError::Duplicate)));
}

#[tokio::test]
async fn test_hot_streak_pays_once() {
    let (svc, sink) = service();
    let mut hot_streaks = Vec::new();
    let mut combos = Vec::new();

    for i in 0..6 {
        let now = T0 + i * 10_000 + 20_000;
        rig(&svc, "ann", Grid::new(Symbol::Cherry, Symbol::Cherry, Symbol::Lemon), now).await;
        let summary = svc.spin_at("ann", "10", now).await.unwrap();
        assert_eq!(summary.win.kind, WinKind::Pair(Symbol::Cherry));
        svc.deferred().drain(Duration::from_secs(1)).await;

        let bonus = |label: &str| {
            summary
                .bonuses
                .iter()
                .find(|(l, _)| l == label)
                .map(|(_, v)| *v)
        };
        hot_streaks.push(bonus("Hot streak"));
        combos.push(bonus("Combo"));
    }

    assert_eq!(hot_streaks, vec![None, None, None, None, Some(250), None]);
    assert_eq!(combos, vec![None, Some(5), Some(10), Some(20), None, None]);
    assert_eq!(sink.reports().len(), 6);
}

#[tokio::test]
async fn test_streak_multiplier_grows_payout() {
    let (svc, _) = service();
    let mut payouts = Vec::new();
    for i in 0..3 {
        let now = T0 + i * 10_000 + 20_000;
        rig(&svc, "ann", Grid::new(Symbol::Grape, Symbol::Grape, Symbol::Grape), now).await;
        payouts.push(svc.spin_at("ann", "10", now).await.unwrap().payout);
        svc.deferred().drain(Duration::from_secs(1)).await;
    }
    // x1.0, x1.1, x1.2 on a 100 payout.
    assert_eq!(payouts, vec![100, 110, 120]);
}

#[tokio::test]
async fn test_balance_clamps_at_max() {
    let (svc, _) = service_with(GameConfig {
        max_balance: 1_000,
        starting_balance: 999,
        ..GameConfig::default()
    });
    rig(&svc, "rich", Grid::new(Symbol::Star, Symbol::Star, Symbol::Star), T0).await;
    let summary = svc.spin_at("rich", "10", T0).await.unwrap();
    assert_eq!(summary.payout, 500);
    assert_eq!(summary.new_balance, 1_000);
    assert_eq!(svc.balance("rich").await, 1_000);
}

#[tokio::test]
async fn test_insufficient_funds_changes_nothing() {
    let (svc, sink) = service_with(GameConfig {
        starting_balance: 40,
        ..GameConfig::default()
    });
    let err = svc.spin_at("poor", "50", T0).await.unwrap_err();
    assert!(matches!(err, GameError::InsufficientFunds { needed: 50, available: 40 }));
    assert_eq!(svc.balance("poor").await, 40);

    // The failed attempt did not start a cooldown.
    assert!(svc.spin_at("poor", "20", T0 + 100).await.is_ok());
    svc.deferred().drain(Duration::from_secs(1)).await;
    assert_eq!(sink.reports().len(), 1);
}

#[tokio::test]
async fn test_rare_single_with_diamond_pair() {
    let (svc, _) = service();
    rig(&svc, "ann", Grid::new(Symbol::Badger, Symbol::Diamond, Symbol::Diamond), T0).await;
    let summary = svc.spin_at("ann", "10", T0).await.unwrap();
    assert_eq!(summary.win.kind, WinKind::RareSingle);
    assert_eq!(summary.payout, 100);
    assert_eq!(summary.free_spins_awarded, 1);
    assert_eq!(svc.free_spins_at("ann", T0).await.total(), 1);
}

#[tokio::test]
async fn test_guaranteed_pair_token_kept_on_paired_grid() {
    use slotkeeper::types::TokenKind;

    let (svc, _) = service();
    svc.buffs()
        .grant_token("ann", TokenKind::GuaranteedPair)
        .await
        .unwrap();

    rig(&svc, "ann", Grid::new(Symbol::Lemon, Symbol::Lemon, Symbol::Cherry), T0).await;
    let summary = svc.spin_at("ann", "10", T0).await.unwrap();
    assert_eq!(summary.final_grid, summary.original_grid);
    assert!(svc.buffs().held_tokens("ann").await.guaranteed_pair);

    rig(&svc, "ann", Grid::new(Symbol::Lemon, Symbol::Cherry, Symbol::Orange), T0 + 10_000).await;
    let summary = svc.spin_at("ann", "10", T0 + 10_000).await.unwrap();
    assert!(summary.final_grid.has_adjacent_pair());
    assert!(!svc.buffs().held_tokens("ann").await.guaranteed_pair);
}
