use {
    crate::domain::{error::ReconError, event::{NewPaymentEvent, StoredPaymentEvent}},
    sqlx::PgPool,
};

/// Idempotent upsert keyed on the gateway transaction id, expressed as one
/// atomic statement so concurrent redeliveries serialize inside Postgres
/// instead of racing through application-level read-modify-write.
///
/// Merge policy per column: an incoming non-empty value fills a stored
/// empty one, an incoming empty value never clobbers stored data, and
/// status only moves forward (pending → paid/failed). Replaying the same
/// event is a no-op beyond `updated_at`.
pub async fn upsert_event(
    pool: &PgPool,
    event: &NewPaymentEvent,
) -> Result<StoredPaymentEvent, ReconError> {
    let stored = sqlx::query_as::<_, StoredPaymentEvent>(
        r#"
        INSERT INTO payment_events
            (id, transaction_id, order_reference, status, amount,
             payer_name, payer_phone, payer_email, receipt_url,
             payment_method, payment_date, raw_payload)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (transaction_id) DO UPDATE SET
            order_reference = COALESCE(NULLIF(excluded.order_reference, ''), payment_events.order_reference),
            status = CASE
                WHEN (CASE excluded.status WHEN 'pending' THEN 0 ELSE 1 END)
                   > (CASE payment_events.status WHEN 'pending' THEN 0 ELSE 1 END)
                THEN excluded.status
                ELSE payment_events.status
            END,
            amount = CASE WHEN excluded.amount <> 0 THEN excluded.amount ELSE payment_events.amount END,
            payer_name     = COALESCE(NULLIF(excluded.payer_name, ''), payment_events.payer_name),
            payer_phone    = COALESCE(NULLIF(excluded.payer_phone, ''), payment_events.payer_phone),
            payer_email    = COALESCE(NULLIF(excluded.payer_email, ''), payment_events.payer_email),
            receipt_url    = COALESCE(NULLIF(excluded.receipt_url, ''), payment_events.receipt_url),
            payment_method = COALESCE(NULLIF(excluded.payment_method, ''), payment_events.payment_method),
            payment_date   = COALESCE(NULLIF(excluded.payment_date, ''), payment_events.payment_date),
            raw_payload    = payment_events.raw_payload || excluded.raw_payload,
            updated_at     = now()
        RETURNING *
        "#,
    )
    .bind(event.id)
    .bind(event.transaction_id.as_str())
    .bind(&event.order_reference)
    .bind(event.status.as_str())
    .bind(event.amount)
    .bind(&event.payer_name)
    .bind(&event.payer_phone)
    .bind(&event.payer_email)
    .bind(&event.receipt_url)
    .bind(&event.payment_method)
    .bind(&event.payment_date)
    .bind(&event.raw_payload)
    .fetch_one(pool)
    .await?;

    Ok(stored)
}

/// Record which order an event settled against. Single conditional update;
/// an already-linked event keeps its first link.
pub async fn link_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event_id: uuid::Uuid,
    order_id: uuid::Uuid,
    uncertain: bool,
) -> Result<(), ReconError> {
    sqlx::query(
        r#"
        UPDATE payment_events
        SET order_id = COALESCE(order_id, $2),
            match_uncertain = (order_id IS NULL AND $3) OR (order_id IS NOT NULL AND match_uncertain),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(event_id)
    .bind(order_id)
    .bind(uncertain)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
