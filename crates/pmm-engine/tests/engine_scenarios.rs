//! End-to-end tick scenarios against the mock adapter.
//!
//! Each test drives `Executor::tick` with a controlled clock and asserts
//! the externally visible outcome: orders on the venue, positions, status
//! transitions, counters.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use pmm_adapter::{AdapterError, CancelRef, MockAdapter, RemoteOrder, StreamQueue};
use pmm_core::{
    BookTop, EngineStatus, FillEvent, OrderSide, PauseReason, PositionEvent, Price, Qty,
    StreamEvent, Symbol, VenueRole,
};
use pmm_engine::Executor;
use pmm_mm::MmConfig;
use pmm_risk::GuardConfig;

fn sym() -> Symbol {
    Symbol::from("BTC-USD")
}

fn test_config() -> MmConfig {
    MmConfig {
        order_distance_bps: dec!(8),
        cancel_distance_bps: dec!(3),
        rebalance_distance_bps: dec!(20),
        queue_position_limit: 0,
        order_size: dec!(0.01),
        max_position: dec!(0.05),
        hard_stop_position: dec!(0.035),
        resume_position: dec!(0.02),
        hard_stop_cooldown_sec: 30,
        resume_confirm_count: 3,
        volatility_window_sec: 2,
        pause_threshold_bps: dec!(5),
        resume_threshold_bps: dec!(3),
        stable_seconds: 2,
        tick_interval_ms: 100,
        order_throttle_sec: 2,
        disappear_grace_sec: 5,
        event_dedup_ttl_sec: 60,
        book_stale_ms: 1500,
        call_timeout_ms: 2000,
        inventory_skew_enabled: true,
        push_bps: dec!(6),
        pull_bps: dec!(2),
        breakeven_enabled: false,
        ..MmConfig::default()
    }
}

async fn setup() -> (Executor, Arc<MockAdapter>, Arc<StreamQueue>) {
    let mock = Arc::new(MockAdapter::with_defaults("primary"));
    let queue = Arc::new(StreamQueue::new(256));
    let mut executor = Executor::new(
        sym(),
        mock.clone(),
        queue.clone(),
        test_config(),
        GuardConfig::default(),
    );
    executor.initialize(0).await.unwrap();
    (executor, mock, queue)
}

fn fill(order_id: &str, side: OrderSide, price: Decimal, qty: Decimal, ts: u64) -> StreamEvent {
    StreamEvent::Fill(FillEvent {
        order_id: order_id.to_string(),
        client_order_id: None,
        symbol: sym(),
        side,
        price: Price::new(price),
        qty: Qty::new(qty),
        cum_filled: Qty::new(qty),
        fee: dec!(-0.05),
        is_maker: Some(true),
        ts_ms: ts,
    })
}

fn position_event(position: Decimal, margin_ratio: Option<Decimal>) -> StreamEvent {
    StreamEvent::Position(PositionEvent {
        venue: VenueRole::Primary,
        symbol: sym(),
        position,
        mark_price: None,
        margin_ratio,
        liquidation_price: None,
        ts_ms: 0,
    })
}

fn bid_order_id(executor: &Executor) -> String {
    executor
        .state()
        .order(OrderSide::Buy)
        .and_then(|o| o.order_id.clone())
        .expect("bid order with venue id")
}

// --- Scenario: cold start on an empty book -----------------------------

#[tokio::test]
async fn cold_start_places_both_sides() {
    let (mut executor, mock, _queue) = setup().await;

    executor.tick(1_000).await;

    let placed = mock.placed_orders();
    assert_eq!(placed.len(), 2);

    let bid = placed.iter().find(|p| p.side == OrderSide::Buy).unwrap();
    let ask = placed.iter().find(|p| p.side == OrderSide::Sell).unwrap();

    // mid = 100001, 8 bps out, bid floored / ask ceiled to the 0.1 tick
    assert_eq!(bid.price.inner(), dec!(99920.9));
    assert_eq!(ask.price.inner(), dec!(100081.1));
    assert_eq!(bid.qty.inner(), dec!(0.01));
    assert!(bid.post_only && ask.post_only);

    assert!(executor.state().has_active(OrderSide::Buy));
    assert!(executor.state().has_active(OrderSide::Sell));
    assert_eq!(mock.open_orders().len(), 2);
    assert!(executor.status().is_running());
}

#[tokio::test]
async fn second_tick_leaves_orders_in_place() {
    let (mut executor, mock, _queue) = setup().await;

    executor.tick(1_000).await;
    executor.tick(4_000).await;

    // Same book, same targets: nothing to cancel, nothing new to place
    assert_eq!(mock.placed_orders().len(), 2);
    assert_eq!(mock.open_orders().len(), 2);
}

// --- Scenario: fill skews the requote ----------------------------------

#[tokio::test]
async fn bid_fill_moves_position_and_skews_requote() {
    let (mut executor, mock, queue) = setup().await;
    executor.tick(1_000).await;

    let oid = bid_order_id(&executor);
    mock.remove_open_order(&oid);
    queue.push(fill(&oid, OrderSide::Buy, dec!(99920.9), dec!(0.01), 2_000));

    executor.tick(4_000).await;

    assert_eq!(
        executor.state().position(VenueRole::Primary),
        dec!(0.01)
    );
    assert_eq!(executor.state().counters.total_fills, 1);
    assert_eq!(executor.state().counters.orders_filled, 1);

    // The fresh bid is skewed further out: 8 bps base plus 0.2 * 6 bps
    let placed = mock.placed_orders();
    let new_bid = placed
        .iter()
        .filter(|p| p.side == OrderSide::Buy)
        .last()
        .unwrap();
    assert_eq!(new_bid.price.inner(), dec!(99909.0));
    assert!(executor.state().has_active(OrderSide::Buy));
}

// --- Scenario: duplicate fill suppression -------------------------------

#[tokio::test]
async fn duplicate_fill_is_suppressed_until_ttl() {
    let (mut executor, mock, queue) = setup().await;
    executor.tick(1_000).await;

    let oid = bid_order_id(&executor);
    mock.remove_open_order(&oid);
    queue.push(fill(&oid, OrderSide::Buy, dec!(99920.9), dec!(0.01), 2_000));
    queue.push(fill(&oid, OrderSide::Buy, dec!(99920.9), dec!(0.01), 2_001));

    executor.tick(4_000).await;
    // One increment, not two
    assert_eq!(executor.state().position(VenueRole::Primary), dec!(0.01));
    assert_eq!(executor.state().counters.total_fills, 1);

    // After the dedup TTL the same key counts as a fresh event again
    queue.push(fill(&oid, OrderSide::Buy, dec!(99920.9), dec!(0.01), 70_000));
    executor.tick(70_000).await;
    assert_eq!(executor.state().position(VenueRole::Primary), dec!(0.02));
}

// --- Scenario: hard stop entry and resume --------------------------------

#[tokio::test]
async fn hard_stop_entry_cancels_everything() {
    let (mut executor, mock, queue) = setup().await;
    executor.tick(1_000).await;

    queue.push(position_event(dec!(0.034), None));
    executor.tick(1_500).await;
    assert!(executor.status().is_running());

    let oid = bid_order_id(&executor);
    mock.remove_open_order(&oid);
    queue.push(fill(&oid, OrderSide::Buy, dec!(99920.9), dec!(0.01), 1_900));

    executor.tick(2_000).await;

    assert_eq!(
        executor.status(),
        EngineStatus::Paused(PauseReason::HardStop)
    );
    assert_eq!(executor.state().position(VenueRole::Primary), dec!(0.044));
    assert!(!executor.state().has_active(OrderSide::Buy));
    assert!(!executor.state().has_active(OrderSide::Sell));
    assert!(mock.open_orders().is_empty());
    assert_eq!(executor.state().counters.hard_stops, 1);
}

#[tokio::test]
async fn hard_stop_resume_needs_cooldown_and_confirmations() {
    let (mut executor, mock, queue) = setup().await;
    executor.tick(1_000).await;

    let oid = bid_order_id(&executor);
    mock.remove_open_order(&oid);
    queue.push(position_event(dec!(0.034), None));
    executor.tick(1_500).await;
    queue.push(fill(&oid, OrderSide::Buy, dec!(99920.9), dec!(0.01), 1_900));
    executor.tick(2_000).await;
    assert_eq!(
        executor.status(),
        EngineStatus::Paused(PauseReason::HardStop)
    );

    // Position reduced below the resume threshold
    queue.push(position_event(dec!(0.01), None));
    executor.tick(10_000).await; // inside cooldown: still paused
    assert_eq!(
        executor.status(),
        EngineStatus::Paused(PauseReason::HardStop)
    );

    executor.tick(32_100).await; // confirmation 1
    executor.tick(32_200).await; // confirmation 2
    assert_eq!(
        executor.status(),
        EngineStatus::Paused(PauseReason::HardStop)
    );

    executor.tick(32_300).await; // confirmation 3: running again
    assert!(executor.status().is_running());
    // The resuming tick quotes immediately
    assert!(executor.state().has_active(OrderSide::Buy));
    assert!(executor.state().has_active(OrderSide::Sell));
}

// --- Scenario: volatility pause and resume --------------------------------

#[tokio::test]
async fn volatility_spike_pauses_and_stability_resumes() {
    let (mut executor, mock, queue) = setup().await;

    let calm = BookTop::new(Price::new(dec!(100000.0)), Price::new(dec!(100002.0)), 400);
    queue.push(StreamEvent::Depth(calm.clone()));
    executor.tick(500).await;
    assert_eq!(mock.open_orders().len(), 2);

    queue.push(StreamEvent::Depth(BookTop::new(
        Price::new(dec!(100000.0)),
        Price::new(dec!(100002.0)),
        900,
    )));
    executor.tick(1_000).await;

    // Mid jumps ~6 bps within the 2s window
    queue.push(StreamEvent::Depth(BookTop::new(
        Price::new(dec!(100059.0)),
        Price::new(dec!(100061.0)),
        2_400,
    )));
    executor.tick(2_500).await;

    assert_eq!(
        executor.status(),
        EngineStatus::Paused(PauseReason::VolatilityHigh)
    );
    assert!(mock.open_orders().is_empty());
    assert_eq!(executor.state().counters.volatility_pauses, 1);

    // Mid holds within a 2 bps band; resume after 2s of stability
    for now in [3_000u64, 3_500, 4_000, 4_500] {
        queue.push(StreamEvent::Depth(BookTop::new(
            Price::new(dec!(100059.0)),
            Price::new(dec!(100061.0)),
            now - 100,
        )));
        executor.tick(now).await;
        assert_eq!(
            executor.status(),
            EngineStatus::Paused(PauseReason::VolatilityHigh)
        );
    }

    queue.push(StreamEvent::Depth(BookTop::new(
        Price::new(dec!(100059.0)),
        Price::new(dec!(100061.0)),
        4_900,
    )));
    executor.tick(5_000).await;

    assert!(executor.status().is_running());
    assert!(executor.state().has_active(OrderSide::Buy));
    assert!(executor.state().has_active(OrderSide::Sell));
}

// --- Reconciliation ------------------------------------------------------

#[tokio::test]
async fn safe_mode_after_three_rest_failures() {
    let (mut executor, mock, _queue) = setup().await;
    executor.tick(1_000).await;
    assert_eq!(mock.open_orders().len(), 2);

    for _ in 0..3 {
        mock.script_list_open_orders(Err(AdapterError::Transient("503".to_string())));
    }

    executor.tick(3_100).await;
    executor.tick(3_200).await;
    executor.tick(3_300).await;

    // Resting orders were left alone throughout
    assert_eq!(mock.open_orders().len(), 2);
    assert_eq!(executor.state().counters.rest_failures, 3);
    assert_eq!(executor.state().counters.safe_mode_ticks, 1);

    // Recovery resets the failure streak
    executor.tick(3_400).await;
    assert_eq!(executor.state().counters.safe_mode_ticks, 1);
}

#[tokio::test]
async fn rest_failure_blocks_placement_on_empty_book() {
    let (mut executor, mock, _queue) = setup().await;
    mock.script_list_open_orders(Err(AdapterError::Transient("503".to_string())));

    executor.tick(1_000).await;

    // Remote view unknown: nothing may be placed
    assert!(mock.placed_orders().is_empty());

    executor.tick(3_100).await;
    assert_eq!(mock.placed_orders().len(), 2);
}

#[tokio::test]
async fn orphan_orders_are_cancelled_not_adopted() {
    let (mut executor, mock, _queue) = setup().await;
    executor.tick(1_000).await;

    let mut remote = mock.open_orders();
    remote.push(RemoteOrder {
        order_id: "ghost".to_string(),
        client_order_id: None,
        side: OrderSide::Buy,
        price: Price::new(dec!(99900.0)),
        qty: Qty::new(dec!(0.01)),
        cum_filled: Qty::ZERO,
        created_at_ms: 0,
    });
    mock.set_open_orders(remote);

    executor.tick(1_200).await;

    assert!(mock
        .cancel_calls()
        .iter()
        .any(|c| matches!(c, CancelRef::OrderId(id) if id == "ghost")));
    assert_eq!(mock.open_orders().len(), 2);
    assert_eq!(executor.state().counters.orphans_cancelled, 1);
}

#[tokio::test]
async fn disappeared_order_cleared_after_grace() {
    let (mut executor, mock, _queue) = setup().await;
    executor.tick(1_000).await;

    let oid = bid_order_id(&executor);
    // The bid vanishes from the venue with no fill explaining it
    mock.remove_open_order(&oid);

    executor.tick(2_000).await; // first miss: grace running
    assert!(executor.state().has_active(OrderSide::Buy));

    executor.tick(4_000).await; // still inside the 5s grace
    assert!(executor.state().has_active(OrderSide::Buy));

    executor.tick(7_100).await; // grace elapsed: written off and re-placed
    assert_eq!(executor.state().counters.orders_canceled_or_unknown, 1);
    assert!(executor.state().has_active(OrderSide::Buy));
    let bids: Vec<_> = mock
        .placed_orders()
        .into_iter()
        .filter(|p| p.side == OrderSide::Buy)
        .collect();
    assert_eq!(bids.len(), 2);
}

#[tokio::test]
async fn unknown_place_outcome_reconciles_via_grace() {
    let (mut executor, mock, _queue) = setup().await;
    mock.script_place(Err(AdapterError::Unknown("deadline".to_string())));

    executor.tick(1_000).await;

    // Bid outcome unknown: slot stays pending, ask went through
    let bid = executor.state().order(OrderSide::Buy).unwrap();
    assert!(bid.order_id.is_none());
    assert!(executor.state().has_active(OrderSide::Sell));

    // Venue never shows the order; the grace window writes it off and the
    // next eligible tick replaces it
    executor.tick(2_000).await;
    executor.tick(7_100).await;
    assert_eq!(executor.state().counters.orders_canceled_or_unknown, 1);

    let bid = executor.state().order(OrderSide::Buy).unwrap();
    assert!(bid.order_id.is_some());
}

// --- Throttle and rejection ----------------------------------------------

#[tokio::test]
async fn post_only_reject_clears_side_and_respects_throttle() {
    let (mut executor, mock, _queue) = setup().await;
    mock.script_place(Err(AdapterError::PostOnlyRejected));

    executor.tick(1_000).await;

    assert_eq!(executor.state().counters.post_only_rejects, 1);
    assert!(!executor.state().has_active(OrderSide::Buy));
    assert!(executor.state().has_active(OrderSide::Sell));

    // Throttle still cooling down: no immediate retry
    executor.tick(1_200).await;
    assert_eq!(
        mock.placed_orders()
            .iter()
            .filter(|p| p.side == OrderSide::Buy)
            .count(),
        1
    );

    // Cooldown over: the bid returns
    executor.tick(3_100).await;
    assert!(executor.state().has_active(OrderSide::Buy));
}

#[tokio::test]
async fn unhealthy_adapter_pauses_engine() {
    let (mut executor, mock, _queue) = setup().await;
    mock.script_place(Err(AdapterError::InsufficientFunds("margin".to_string())));

    executor.tick(1_000).await;

    assert_eq!(
        executor.status(),
        EngineStatus::Paused(PauseReason::AdapterUnhealthy)
    );
    assert!(!executor.state().has_active(OrderSide::Buy));
    assert!(!executor.state().has_active(OrderSide::Sell));
}

// --- Rebalance ------------------------------------------------------------

#[tokio::test]
async fn drifted_quote_is_rebalanced() {
    let (mut executor, mock, queue) = setup().await;
    executor.tick(1_000).await;
    let first_bid = bid_order_id(&executor);

    // Mid drifts 30 bps up: resting quotes are now too far from target
    queue.push(StreamEvent::Depth(BookTop::new(
        Price::new(dec!(100300.0)),
        Price::new(dec!(100302.0)),
        3_900,
    )));
    executor.tick(4_000).await;

    assert!(mock
        .cancel_calls()
        .iter()
        .any(|c| matches!(c, CancelRef::OrderId(id) if id == &first_bid)));
    assert!(executor.state().counters.bid_rebalances >= 1);
    // Re-placed at the new level
    let new_bid = executor.state().order(OrderSide::Buy).unwrap();
    assert!(new_bid.price.inner() > dec!(100000.0));
}

// --- Cancel distance -------------------------------------------------------

#[tokio::test]
async fn adverse_touch_approach_cancels_resting_order() {
    let (mut executor, mock, queue) = setup().await;
    executor.tick(1_000).await;
    assert!(executor.state().has_active(OrderSide::Buy));

    // Ask touch collapses to within 3 bps of our bid at 99920.9
    queue.push(StreamEvent::Depth(BookTop::new(
        Price::new(dec!(99920.0)),
        Price::new(dec!(99921.1)),
        1_400,
    )));
    executor.tick(1_500).await;

    assert!(executor.state().counters.bid_cancels >= 1);
    assert!(!mock.open_orders().iter().any(|o| o.side == OrderSide::Buy
        && o.price == Price::new(dec!(99920.9))));
}

// --- Liquidation guard -----------------------------------------------------

#[tokio::test]
async fn liquidation_guard_flattens_and_latches() {
    let (mut executor, mock, queue) = setup().await;
    executor.tick(1_000).await;

    queue.push(position_event(dec!(0.02), Some(dec!(0.9))));
    executor.tick(1_500).await;

    assert_eq!(
        executor.status(),
        EngineStatus::Paused(PauseReason::LiquidationGuard)
    );
    assert_eq!(mock.close_all_calls(), 1);
    assert!(mock.open_orders().is_empty());

    // Healthy margin later does not release the latch
    queue.push(position_event(dec!(0), Some(dec!(0.1))));
    executor.tick(5_000).await;
    assert_eq!(
        executor.status(),
        EngineStatus::Paused(PauseReason::LiquidationGuard)
    );

    // Operator clear resumes quoting
    executor.clear_liquidation_halt(6_000);
    assert!(executor.status().is_running());
}

// --- Instant close ----------------------------------------------------------

#[tokio::test]
async fn instant_close_flattens_fill_on_primary() {
    let (mut executor, mock, queue) = setup().await;
    executor.set_instant_close(true);
    executor.tick(1_000).await;

    let oid = bid_order_id(&executor);
    mock.remove_open_order(&oid);
    queue.push(fill(&oid, OrderSide::Buy, dec!(99920.9), dec!(0.01), 2_000));

    executor.tick(4_000).await;

    // The buy fill is flattened by a reduce-only sell on the primary
    let markets = mock.market_calls();
    assert_eq!(markets.len(), 1);
    assert_eq!(markets[0].0, OrderSide::Sell);
    assert_eq!(markets[0].1.inner(), dec!(0.01));
    assert!(markets[0].2);
}

// --- Shutdown ---------------------------------------------------------------

#[tokio::test]
async fn stop_drains_orders_and_halts() {
    let (mut executor, mock, _queue) = setup().await;
    executor.tick(1_000).await;
    assert_eq!(mock.open_orders().len(), 2);

    executor.stop(2_000).await;

    assert_eq!(executor.status(), EngineStatus::Stopped);
    assert!(mock.open_orders().is_empty());
    assert!(!executor.state().has_active(OrderSide::Buy));
    assert!(!executor.state().has_active(OrderSide::Sell));
}

#[tokio::test]
async fn stop_then_start_quotes_again() {
    let (mut executor, mock, _queue) = setup().await;
    executor.tick(1_000).await;
    executor.stop(2_000).await;

    executor.start(3_000).unwrap();
    assert!(executor.status().is_running());

    executor.tick(3_500).await;
    assert_eq!(mock.open_orders().len(), 2);
}

#[tokio::test]
async fn start_refused_while_running() {
    let (mut executor, _mock, _queue) = setup().await;
    executor.tick(1_000).await;
    assert!(executor.start(1_500).is_err());
}
