//! Order matching: map a durably-stored payment event onto the merchant
//! order book. Exact order-number matches drive status forward; phone-only
//! matches are flagged uncertain and never transition status; anything
//! ambiguous gets a fresh gateway-originated order instead of a guess.

use {
    crate::{
        domain::{
            error::ReconError,
            event::StoredPaymentEvent,
            order::{NewOrder, Order, OrderStatus},
        },
        infra::postgres::{event_repo, order_repo},
    },
    chrono::Duration,
    sqlx::PgPool,
    uuid::Uuid,
};

/// Bound on the phone-fallback lookback. Orders older than this are assumed
/// to belong to an earlier purchase reusing the same number.
pub const FALLBACK_WINDOW_HOURS: i64 = 24;

pub fn fallback_window() -> Duration {
    Duration::hours(FALLBACK_WINDOW_HOURS)
}

const GATEWAY_ORIGIN_NOTE: &str =
    "created from gateway callback - no prior pending order found";
const AMBIGUOUS_NOTE: &str =
    "created from gateway callback - multiple pending orders share this phone, needs manual reconciliation";

#[derive(Debug)]
pub enum MatchOutcome {
    /// Exact order-number match; merge applied, status advanced if forward.
    Matched { order_id: Uuid },
    /// Single phone-fallback candidate; fields merged, status untouched.
    MatchedUncertain { order_id: Uuid },
    /// No counterpart; order created from the event.
    Created { order_id: Uuid },
    /// Multiple candidates; created a separate order rather than guessing.
    CreatedAmbiguous { order_id: Uuid },
}

impl MatchOutcome {
    pub fn order_id(&self) -> Uuid {
        match self {
            Self::Matched { order_id }
            | Self::MatchedUncertain { order_id }
            | Self::Created { order_id }
            | Self::CreatedAmbiguous { order_id } => *order_id,
        }
    }
}

fn raw_field<'a>(event: &'a StoredPaymentEvent, name: &str) -> &'a str {
    event.raw_payload.get(name).and_then(|v| v.as_str()).unwrap_or("")
}

/// Shape the event's fields as an order row. `order_number` falls back to a
/// transaction-id-derived number when the gateway echoed no reference, so
/// reactively-created orders stay unique and traceable.
fn order_from_event(event: &StoredPaymentEvent, status: OrderStatus, notes: &str) -> NewOrder {
    let order_number = if event.order_reference.is_empty() {
        format!("PAYAPP-{}", event.transaction_id)
    } else {
        event.order_reference.clone()
    };

    NewOrder {
        id: Uuid::now_v7(),
        order_number,
        customer_name: event.payer_name.clone(),
        customer_email: event.payer_email.clone(),
        customer_phone: event.payer_phone.clone(),
        business_name: raw_field(event, "goodname").to_string(),
        package_name: raw_field(event, "memo").to_string(),
        package_price: event.amount,
        amount: event.amount,
        status,
        payment_method: event.payment_method.clone(),
        receipt_url: event.receipt_url.clone(),
        notes: notes.to_string(),
    }
}

/// Match the stored event to an order, or create one.
///
/// All writes are single atomic statements; the advisory lock on the
/// transaction id serializes concurrent redeliveries of the same event
/// around the fallback candidate read. An advisory lock works even before
/// any order row exists, so there is no insert race to special-case.
pub async fn reconcile(
    pool: &PgPool,
    event: &StoredPaymentEvent,
) -> Result<MatchOutcome, ReconError> {
    let status = OrderStatus::from(event.payment_status()?);

    let mut tx = pool.begin().await?;

    sqlx::query("SET LOCAL lock_timeout = '5s'")
        .execute(&mut *tx)
        .await?;
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(&event.transaction_id)
        .execute(&mut *tx)
        .await?;

    let outcome = if !event.order_reference.is_empty() {
        // Step 1: exact order-number match (upsert covers both "matched"
        // and "absent, create" in one statement; the pre-read only labels
        // the outcome).
        let existing = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM orders WHERE order_number = $1",
        )
        .bind(&event.order_reference)
        .fetch_optional(&mut *tx)
        .await?;

        let order = order_repo::upsert_by_number(
            &mut tx,
            &order_from_event(event, status, GATEWAY_ORIGIN_NOTE),
        )
        .await?;

        match existing {
            Some(_) => matched(&mut tx, event, order).await?,
            None => created(&mut tx, event, order, false).await?,
        }
    } else if let Some(number) = prior_linked_number(&mut tx, event).await? {
        // Redelivery of an event we already settled against an order:
        // re-apply the merge to that order so a later paid notification can
        // still advance a pending one.
        let mut order = order_from_event(event, status, GATEWAY_ORIGIN_NOTE);
        order.order_number = number;
        let order = order_repo::upsert_by_number(&mut tx, &order).await?;
        matched(&mut tx, event, order).await?
    } else if event.payer_phone.is_empty() {
        // No reference, no phone: nothing to correlate on.
        let order = order_repo::upsert_by_number(
            &mut tx,
            &order_from_event(event, status, GATEWAY_ORIGIN_NOTE),
        )
        .await?;
        created(&mut tx, event, order, false).await?
    } else {
        // Step 2: phone fallback, bounded window, single-candidate only.
        let candidates =
            order_repo::find_pending_by_phone(&mut tx, &event.payer_phone, fallback_window())
                .await?;

        match candidates.as_slice() {
            [candidate] => {
                let merged = order_repo::merge_uncertain_match(
                    &mut tx,
                    candidate.id,
                    &order_from_event(event, status, ""),
                )
                .await?;
                match merged {
                    Some(order) => {
                        event_repo::link_order(&mut tx, event.id, order.id, true).await?;
                        MatchOutcome::MatchedUncertain { order_id: order.id }
                    }
                    // Candidate settled between lookup and update; don't
                    // touch it, record the event against its own order.
                    None => {
                        let order = order_repo::upsert_by_number(
                            &mut tx,
                            &order_from_event(event, status, GATEWAY_ORIGIN_NOTE),
                        )
                        .await?;
                        created(&mut tx, event, order, false).await?
                    }
                }
            }
            [] => {
                let order = order_repo::upsert_by_number(
                    &mut tx,
                    &order_from_event(event, status, GATEWAY_ORIGIN_NOTE),
                )
                .await?;
                created(&mut tx, event, order, false).await?
            }
            _ => {
                tracing::warn!(
                    transaction_id = %event.transaction_id,
                    candidates = candidates.len(),
                    "ambiguous phone match, creating separate order"
                );
                let order = order_repo::upsert_by_number(
                    &mut tx,
                    &order_from_event(event, status, AMBIGUOUS_NOTE),
                )
                .await?;
                created(&mut tx, event, order, true).await?
            }
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Order number a reference-less event settled against in an earlier
/// delivery. Uncertain links don't count: those stay on the no-transition
/// fallback path.
async fn prior_linked_number(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &StoredPaymentEvent,
) -> Result<Option<String>, ReconError> {
    let Some(order_id) = event.order_id else {
        return Ok(None);
    };
    if event.match_uncertain {
        return Ok(None);
    }
    let number = sqlx::query_scalar::<_, String>("SELECT order_number FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(number)
}

async fn matched(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &StoredPaymentEvent,
    order: Order,
) -> Result<MatchOutcome, ReconError> {
    event_repo::link_order(tx, event.id, order.id, false).await?;
    Ok(MatchOutcome::Matched { order_id: order.id })
}

async fn created(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &StoredPaymentEvent,
    order: Order,
    ambiguous: bool,
) -> Result<MatchOutcome, ReconError> {
    event_repo::link_order(tx, event.id, order.id, ambiguous).await?;
    if ambiguous {
        Ok(MatchOutcome::CreatedAmbiguous { order_id: order.id })
    } else {
        Ok(MatchOutcome::Created { order_id: order.id })
    }
}
