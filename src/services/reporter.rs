//! Offline reconciliation report: orders and events that still have no
//! counterpart once the settlement window has passed. Read-only by design:
//! financial remediation needs human sign-off.

use {
    crate::domain::{error::ReconError, event::StoredPaymentEvent, order::Order},
    chrono::{Duration, Utc},
    sqlx::PgPool,
    tokio::sync::watch,
};

#[derive(Debug)]
pub struct UnmatchedReport {
    /// Orders stuck pending past the window: customer started checkout,
    /// gateway never confirmed.
    pub stuck_orders: Vec<Order>,
    /// Events never linked to any order (reconciliation failed mid-flight).
    pub unlinked_events: Vec<StoredPaymentEvent>,
    /// Events linked only via the phone fallback; these need manual verification.
    pub uncertain_events: Vec<StoredPaymentEvent>,
}

impl UnmatchedReport {
    pub fn is_empty(&self) -> bool {
        self.stuck_orders.is_empty()
            && self.unlinked_events.is_empty()
            && self.uncertain_events.is_empty()
    }
}

pub async fn find_unmatched(
    pool: &PgPool,
    window: Duration,
) -> Result<UnmatchedReport, ReconError> {
    let cutoff = Utc::now() - window;

    let stuck_orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE status = 'pending' AND created_at < $1 ORDER BY created_at",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    let unlinked_events = sqlx::query_as::<_, StoredPaymentEvent>(
        "SELECT * FROM payment_events WHERE order_id IS NULL AND received_at < $1 ORDER BY received_at",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    let uncertain_events = sqlx::query_as::<_, StoredPaymentEvent>(
        "SELECT * FROM payment_events WHERE match_uncertain AND received_at < $1 ORDER BY received_at",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(UnmatchedReport {
        stuck_orders,
        unlinked_events,
        uncertain_events,
    })
}

/// Periodic report loop for human follow-up. No automatic remediation.
pub async fn run_reporter(
    pool: PgPool,
    interval: std::time::Duration,
    window: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("reconciliation reporter started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("reconciliation reporter shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        match find_unmatched(&pool, window).await {
            Ok(report) if report.is_empty() => {}
            Ok(report) => {
                for order in &report.stuck_orders {
                    tracing::warn!(
                        order_number = %order.order_number,
                        created_at = %order.created_at,
                        "order stuck pending past window"
                    );
                }
                for event in &report.unlinked_events {
                    tracing::warn!(
                        transaction_id = %event.transaction_id,
                        received_at = %event.received_at,
                        "payment event with no linked order"
                    );
                }
                for event in &report.uncertain_events {
                    tracing::warn!(
                        transaction_id = %event.transaction_id,
                        order_id = ?event.order_id,
                        "uncertain phone-fallback match awaiting verification"
                    );
                }
                tracing::info!(
                    stuck_orders = report.stuck_orders.len(),
                    unlinked_events = report.unlinked_events.len(),
                    uncertain_events = report.uncertain_events.len(),
                    "reconciliation report"
                );
            }
            Err(e) => tracing::error!(error = %e, "reporter query failed"),
        }
    }
}
