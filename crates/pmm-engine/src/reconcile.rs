//! REST reconciliation gate.
//!
//! Runs once per tick before any placement. The venue's open-orders reply
//! is authoritative: locally-tracked orders missing from it are given a
//! grace window and then written off; remote orders with no local
//! counterpart are orphans and get cancelled, never adopted. Repeated
//! query failures put the tick into Safe Mode: no placements, resting
//! orders left alone, streams still honoured.

use tracing::{info, warn};

use pmm_adapter::{CancelRef, DynAdapter, RemoteOrder};
use pmm_core::{OrderSide, OrderStatus, Symbol};
use pmm_state::{MmState, OperationKind};

use crate::deadline::with_deadline;

/// Consecutive failures that trigger Safe Mode.
const SAFE_MODE_THRESHOLD: u32 = 3;

/// What the gate concluded this tick.
#[derive(Debug, Clone, Default)]
pub struct GateReport {
    /// True when the open-orders query has failed too many times in a
    /// row; the tick must not place anything.
    pub safe_mode: bool,
    /// A remote order existed on the side at query time (even if it was
    /// cancelled as an orphan this tick).
    pub remote_bid: bool,
    pub remote_ask: bool,
    pub orphans_cancelled: u32,
}

impl GateReport {
    pub fn remote_on(&self, side: OrderSide) -> bool {
        match side {
            OrderSide::Buy => self.remote_bid,
            OrderSide::Sell => self.remote_ask,
        }
    }
}

/// Local/remote order reconciliation.
#[derive(Debug, Default)]
pub struct ReconcileGate {
    consecutive_failures: u32,
}

impl ReconcileGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Reconcile the local view against the venue.
    pub async fn run(
        &mut self,
        adapter: &DynAdapter,
        state: &mut MmState,
        symbol: &Symbol,
        grace_ms: u64,
        call_timeout_ms: u64,
        now_ms: u64,
    ) -> GateReport {
        let remote = match with_deadline(
            call_timeout_ms,
            adapter.list_open_orders(symbol.clone()),
        )
        .await
        {
            Ok(orders) => orders,
            Err(e) => {
                self.consecutive_failures += 1;
                state.counters.rest_failures += 1;
                let safe_mode = self.consecutive_failures >= SAFE_MODE_THRESHOLD;
                if safe_mode {
                    state.counters.safe_mode_ticks += 1;
                }
                warn!(
                    error = %e,
                    consecutive = self.consecutive_failures,
                    safe_mode,
                    "Open-orders query failed"
                );
                return GateReport {
                    safe_mode,
                    // Unknown remote view: assume occupied to block placement
                    remote_bid: true,
                    remote_ask: true,
                    orphans_cancelled: 0,
                };
            }
        };
        self.consecutive_failures = 0;

        let (remote_bids, remote_asks): (Vec<_>, Vec<_>) = remote
            .into_iter()
            .partition(|o| o.side == OrderSide::Buy);

        let mut report = GateReport {
            safe_mode: false,
            remote_bid: !remote_bids.is_empty(),
            remote_ask: !remote_asks.is_empty(),
            orphans_cancelled: 0,
        };

        for (side, remotes) in [
            (OrderSide::Buy, remote_bids),
            (OrderSide::Sell, remote_asks),
        ] {
            report.orphans_cancelled += self
                .reconcile_side(
                    adapter,
                    state,
                    symbol,
                    side,
                    remotes,
                    grace_ms,
                    call_timeout_ms,
                    now_ms,
                )
                .await;
        }

        report
    }

    #[allow(clippy::too_many_arguments)]
    async fn reconcile_side(
        &mut self,
        adapter: &DynAdapter,
        state: &mut MmState,
        symbol: &Symbol,
        side: OrderSide,
        remotes: Vec<RemoteOrder>,
        grace_ms: u64,
        call_timeout_ms: u64,
        now_ms: u64,
    ) -> u32 {
        let mut cancelled = 0u32;

        let local_active = state.has_active(side);
        if !local_active {
            // Orphans: venue knows orders we do not. Restart leftovers or
            // out-of-band placements. Cancel them all; never adopt.
            for orphan in &remotes {
                warn!(%side, order_id = %orphan.order_id, "Cancelling orphan order");
                let _ = with_deadline(
                    call_timeout_ms,
                    adapter.cancel_order(
                        symbol.clone(),
                        CancelRef::OrderId(orphan.order_id.clone()),
                    ),
                )
                .await;
                cancelled += 1;
                state.counters.orphans_cancelled += 1;
                state.ops.record(
                    now_ms,
                    OperationKind::Cancel,
                    Some(side),
                    Some(orphan.price),
                    "orphan",
                );
            }
            return cancelled;
        }

        // Local side is active: find the remote twin
        let (cloid, local_oid) = {
            let local = state.order(side).expect("active side has an order");
            (
                local.client_order_id.clone(),
                local.order_id.clone(),
            )
        };

        let mut matching: Option<&RemoteOrder> = None;
        let mut extras: Vec<&RemoteOrder> = Vec::new();
        for remote in &remotes {
            let is_match = local_oid.as_deref() == Some(remote.order_id.as_str())
                || remote.client_order_id.as_ref() == Some(&cloid);
            if is_match && matching.is_none() {
                matching = Some(remote);
            } else {
                extras.push(remote);
            }
        }

        // Multiple orders on one side: keep the twin, cancel the rest
        for extra in extras {
            warn!(%side, order_id = %extra.order_id, "Cancelling surplus order on side");
            let _ = with_deadline(
                call_timeout_ms,
                adapter.cancel_order(symbol.clone(), CancelRef::OrderId(extra.order_id.clone())),
            )
            .await;
            cancelled += 1;
            state.counters.orphans_cancelled += 1;
        }

        match matching {
            Some(remote) => {
                let order = state.order_mut(side).expect("active side has an order");
                order.note_seen_remote(Some(remote.order_id.clone()), now_ms);
            }
            None => {
                // Missing from the authoritative view. Fills explain most
                // disappearances and clear the slot through the event
                // path; anything else gets the grace window.
                let missing_ms = {
                    let order = state.order_mut(side).expect("active side has an order");
                    order.note_missing_remote(now_ms)
                };
                if missing_ms >= grace_ms {
                    if let Some(mut order) = state.clear_order(side) {
                        order.status = OrderStatus::CanceledOrUnknown;
                        info!(%side, price = %order.price, missing_ms, "Local order gone from venue, clearing");
                        state.counters.orders_canceled_or_unknown += 1;
                        state.ops.record(
                            now_ms,
                            OperationKind::Cancel,
                            Some(side),
                            Some(order.price),
                            "disappeared",
                        );
                    }
                }
            }
        }

        cancelled
    }
}
