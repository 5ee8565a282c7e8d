use {
    crate::domain::{
        error::ReconError,
        order::{NewOrder, Order},
    },
    chrono::{Duration, Utc},
    sqlx::{PgPool, Postgres, Transaction},
    uuid::Uuid,
};

/// Upsert keyed on `order_number`, in one atomic statement.
///
/// Merge direction is the opposite of the event store's: the order is the
/// merchant-side record, so stored non-blank fields win and gateway values
/// only fill blanks. Status moves forward only. An amount disagreement is
/// appended to `notes` for manual audit rather than auto-corrected, and the
/// note is appended once even across redeliveries.
pub async fn upsert_by_number(
    tx: &mut Transaction<'_, Postgres>,
    order: &NewOrder,
) -> Result<Order, ReconError> {
    let row = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders
            (id, order_number, customer_name, customer_email, customer_phone,
             business_name, package_name, package_price, amount, status,
             payment_method, receipt_url, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (order_number) DO UPDATE SET
            customer_name  = COALESCE(NULLIF(orders.customer_name, ''), excluded.customer_name),
            customer_email = COALESCE(NULLIF(orders.customer_email, ''), excluded.customer_email),
            customer_phone = COALESCE(NULLIF(orders.customer_phone, ''), excluded.customer_phone),
            business_name  = COALESCE(NULLIF(orders.business_name, ''), excluded.business_name),
            package_name   = COALESCE(NULLIF(orders.package_name, ''), excluded.package_name),
            package_price  = CASE WHEN orders.package_price = 0 THEN excluded.package_price ELSE orders.package_price END,
            amount         = CASE WHEN orders.amount = 0 THEN excluded.amount ELSE orders.amount END,
            payment_method = COALESCE(NULLIF(orders.payment_method, ''), excluded.payment_method),
            receipt_url    = COALESCE(NULLIF(orders.receipt_url, ''), excluded.receipt_url),
            status = CASE
                WHEN (CASE excluded.status WHEN 'pending' THEN 0 ELSE 1 END)
                   > (CASE orders.status WHEN 'pending' THEN 0 ELSE 1 END)
                THEN excluded.status
                ELSE orders.status
            END,
            notes = orders.notes || CASE
                WHEN orders.amount <> 0 AND excluded.amount <> 0
                     AND orders.amount <> excluded.amount
                     AND position('amount mismatch' in orders.notes) = 0
                THEN ' [amount mismatch: order ' || orders.amount::text
                     || ' vs gateway ' || excluded.amount::text || ']'
                ELSE ''
            END,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(&order.customer_phone)
    .bind(&order.business_name)
    .bind(&order.package_name)
    .bind(order.package_price)
    .bind(order.amount)
    .bind(order.status.as_str())
    .bind(&order.payment_method)
    .bind(&order.receipt_url)
    .bind(&order.notes)
    .fetch_one(&mut **tx)
    .await?;

    Ok(row)
}

/// Candidate orders for the phone fallback: still pending, same normalized
/// phone, created within the recent window. Old orders reusing a number
/// must not match.
pub async fn find_pending_by_phone(
    tx: &mut Transaction<'_, Postgres>,
    phone: &str,
    window: Duration,
) -> Result<Vec<Order>, ReconError> {
    let since = Utc::now() - window;
    let rows = sqlx::query_as::<_, Order>(
        r#"
        SELECT * FROM orders
        WHERE status = 'pending' AND customer_phone = $1 AND created_at >= $2
        ORDER BY created_at DESC
        "#,
    )
    .bind(phone)
    .bind(since)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

/// Fill-blank merge into a phone-matched order. Status is deliberately not
/// touched: an uncertain match never drives an automatic transition. The
/// `status = 'pending'` guard makes the update a no-op if the order settled
/// between candidate lookup and here. An amount disagreement gets the same
/// append-once audit note as the exact-match upsert.
pub async fn merge_uncertain_match(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    event: &NewOrder,
) -> Result<Option<Order>, ReconError> {
    let row = sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders SET
            customer_name  = COALESCE(NULLIF(customer_name, ''), $2),
            customer_email = COALESCE(NULLIF(customer_email, ''), $3),
            business_name  = COALESCE(NULLIF(business_name, ''), $4),
            package_name   = COALESCE(NULLIF(package_name, ''), $5),
            amount         = CASE WHEN amount = 0 THEN $6 ELSE amount END,
            payment_method = COALESCE(NULLIF(payment_method, ''), $7),
            receipt_url    = COALESCE(NULLIF(receipt_url, ''), $8),
            notes = notes || CASE
                WHEN position('uncertain phone match' in notes) = 0
                THEN ' [uncertain phone match: gateway txn linked by phone, verify manually]'
                ELSE ''
            END || CASE
                WHEN amount <> 0 AND $6 <> 0 AND amount <> $6
                     AND position('amount mismatch' in notes) = 0
                THEN ' [amount mismatch: order ' || amount::text
                     || ' vs gateway ' || $6::text || ']'
                ELSE ''
            END,
            updated_at = now()
        WHERE id = $1 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(&event.customer_name)
    .bind(&event.customer_email)
    .bind(&event.business_name)
    .bind(&event.package_name)
    .bind(event.amount)
    .bind(&event.payment_method)
    .bind(&event.receipt_url)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row)
}

/// Storefront pre-creation path: a pending order written before the customer
/// is redirected to the gateway.
pub async fn insert_pending(pool: &PgPool, order: &NewOrder) -> Result<Order, ReconError> {
    let row = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders
            (id, order_number, customer_name, customer_email, customer_phone,
             business_name, package_name, package_price, amount, status,
             payment_method, receipt_url, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(&order.customer_phone)
    .bind(&order.business_name)
    .bind(&order.package_name)
    .bind(order.package_price)
    .bind(order.amount)
    .bind(&order.payment_method)
    .bind(&order.receipt_url)
    .bind(&order.notes)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
