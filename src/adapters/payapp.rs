//! PayApp feedback ingress: dual-transport notification parsing and the
//! acknowledgement contract.
//!
//! The gateway delivers results as URL query parameters (GET) or a
//! form-encoded body (POST) depending on merchant configuration, and uses
//! two overlapping field-naming schemes across integration generations.
//! Both collapse into one parser here: `RawForm` accepts either transport,
//! and an alias table checks the current field name before the legacy one.

use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            error::ReconError,
            event::{NewPaymentEvent, NewPaymentEventParams, PaymentStatus},
            id::TransactionId,
        },
        infra::postgres::event_repo,
        services::reconcile::{MatchOutcome, reconcile},
    },
    axum::{
        extract::{RawForm, State},
        http::StatusCode,
    },
    std::collections::BTreeMap,
};

/// Literal body PayApp requires to stop redelivering a notification.
/// Anything else (including FAIL) triggers a retry, so a failed *payment*
/// is still acknowledged; only a failed *store write* withholds this.
pub const ACK_BODY: &str = "SUCCESS";

type Fields = BTreeMap<String, String>;

/// Current field name first, legacy fallback second.
fn field<'a>(fields: &'a Fields, current: &str, legacy: &str) -> &'a str {
    match fields.get(current).map(String::as_str) {
        Some(v) if !v.is_empty() => v,
        _ => fields.get(legacy).map(String::as_str).unwrap_or(""),
    }
}

fn single<'a>(fields: &'a Fields, name: &str) -> &'a str {
    fields.get(name).map(String::as_str).unwrap_or("")
}

/// Fixed gateway status-code table. Codes `1` and `4` both mean paid (the
/// gateway changed its success code between integration generations);
/// anything not listed maps to Failed (fail closed) and is logged with
/// the raw value so the table can be extended deliberately.
fn map_status_code(code: &str) -> PaymentStatus {
    match code {
        "1" | "4" => PaymentStatus::Paid,
        "0" | "10" => PaymentStatus::Pending,
        "8" | "9" => PaymentStatus::Failed,
        other => {
            tracing::warn!(status_code = %other, "unknown gateway status code, mapping to failed");
            PaymentStatus::Failed
        }
    }
}

fn parse_amount(raw: &str) -> i64 {
    match raw.trim() {
        "" => 0,
        s => s.parse().unwrap_or_else(|_| {
            tracing::warn!(price = %s, "unparseable amount, storing 0");
            0
        }),
    }
}

/// Decode the urlencoded payload into a field map. Last value wins on
/// duplicate keys, matching what the gateway's own samples do.
pub fn decode_transport(bytes: &[u8]) -> Result<Fields, ReconError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes)
        .map_err(|e| ReconError::MalformedNotification(format!("undecodable payload: {e}")))?;
    Ok(pairs.into_iter().collect())
}

/// Pure parse of a decoded notification. No IO, so transport equivalence
/// and alias handling are unit-testable without a server or database.
pub fn parse_notification(fields: &Fields) -> Result<NewPaymentEvent, ReconError> {
    let transaction_id = TransactionId::new(field(fields, "mul_no", "payno"))?;

    let status = map_status_code(field(fields, "pay_state", "state"));

    let order_reference = match single(fields, "orderid") {
        "" => single(fields, "order_id"),
        v => v,
    };

    let raw_payload = serde_json::to_value(fields)?;

    Ok(NewPaymentEvent::new(NewPaymentEventParams {
        transaction_id,
        order_reference: order_reference.to_string(),
        status,
        amount: parse_amount(single(fields, "price")),
        payer_name: single(fields, "buyer").to_string(),
        payer_phone: single(fields, "recvphone").to_string(),
        payer_email: single(fields, "email").to_string(),
        receipt_url: field(fields, "receipturl", "csturl").to_string(),
        payment_method: field(fields, "pay_type", "paytype").to_string(),
        payment_date: field(fields, "pay_date", "paydate").to_string(),
        raw_payload,
    }))
}

/// Gateway-facing webhook. Registered for both GET and POST.
///
/// Ack policy: 200 `SUCCESS` once the event row is durable (whatever the
/// payment outcome), 200 `SUCCESS` for malformed payloads (a retry cannot
/// fix those), 5xx only when the store write itself failed.
pub async fn feedback_handler(
    State(state): State<AppState>,
    RawForm(body): RawForm,
) -> Result<(StatusCode, &'static str), ApiError> {
    let event = match decode_transport(&body).and_then(|f| parse_notification(&f)) {
        Ok(event) => event,
        Err(ReconError::MalformedNotification(msg)) => {
            tracing::warn!(error = %msg, "malformed gateway notification, acknowledging anyway");
            return Ok((StatusCode::OK, ACK_BODY));
        }
        Err(e) => return Err(e.into()),
    };

    let stored = event_repo::upsert_event(&state.pool, &event).await?;
    tracing::info!(
        transaction_id = %stored.transaction_id,
        status = %stored.status,
        amount = stored.amount,
        "payment event stored"
    );

    // The event is durable from here on: reconciliation trouble is ours to
    // chase via the unmatched report, not the gateway's to retry.
    match reconcile(&state.pool, &stored).await {
        Ok(MatchOutcome::Matched { order_id }) => {
            tracing::info!(order_id = %order_id, "event matched to order");
        }
        Ok(MatchOutcome::MatchedUncertain { order_id }) => {
            tracing::warn!(order_id = %order_id, "phone-fallback match, flagged uncertain");
        }
        Ok(MatchOutcome::Created { order_id }) => {
            tracing::info!(order_id = %order_id, "no prior order, created from gateway event");
        }
        Ok(MatchOutcome::CreatedAmbiguous { order_id }) => {
            tracing::warn!(order_id = %order_id, "ambiguous candidates, created separate order");
        }
        Err(e) => {
            tracing::error!(
                transaction_id = %stored.transaction_id,
                error = %e,
                "reconciliation failed after durable store, left for unmatched report"
            );
        }
    }

    Ok((StatusCode::OK, ACK_BODY))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_current_field_names() {
        let f = fields(&[
            ("mul_no", "T1"),
            ("pay_state", "4"),
            ("orderid", "ORD-1"),
            ("price", "50000"),
            ("buyer", "Kim"),
            ("recvphone", "01012345678"),
            ("receipturl", "https://r/1"),
            ("pay_type", "card"),
            ("pay_date", "20250101"),
        ]);
        let e = parse_notification(&f).unwrap();
        assert_eq!(e.transaction_id.as_str(), "T1");
        assert_eq!(e.status, PaymentStatus::Paid);
        assert_eq!(e.order_reference, "ORD-1");
        assert_eq!(e.amount, 50000);
        assert_eq!(e.payer_phone, "010-1234-5678");
        assert_eq!(e.receipt_url, "https://r/1");
        assert_eq!(e.payment_method, "card");
        assert_eq!(e.payment_date, "20250101");
    }

    #[test]
    fn falls_back_to_legacy_field_names() {
        let f = fields(&[
            ("mul_no", "T2"),
            ("state", "1"),
            ("csturl", "https://r/2"),
            ("paytype", "vbank"),
            ("paydate", "20250102"),
        ]);
        let e = parse_notification(&f).unwrap();
        assert_eq!(e.status, PaymentStatus::Paid);
        assert_eq!(e.receipt_url, "https://r/2");
        assert_eq!(e.payment_method, "vbank");
        assert_eq!(e.payment_date, "20250102");
    }

    #[test]
    fn current_name_wins_over_legacy() {
        let f = fields(&[
            ("mul_no", "T3"),
            ("pay_state", "4"),
            ("state", "8"),
            ("receipturl", "https://new"),
            ("csturl", "https://old"),
        ]);
        let e = parse_notification(&f).unwrap();
        assert_eq!(e.status, PaymentStatus::Paid);
        assert_eq!(e.receipt_url, "https://new");
    }

    #[test]
    fn empty_current_name_falls_through() {
        let f = fields(&[("mul_no", "T4"), ("receipturl", ""), ("csturl", "https://old")]);
        let e = parse_notification(&f).unwrap();
        assert_eq!(e.receipt_url, "https://old");
    }

    #[test]
    fn unknown_status_code_fails_closed() {
        let f = fields(&[("mul_no", "T5"), ("pay_state", "99")]);
        let e = parse_notification(&f).unwrap();
        assert_eq!(e.status, PaymentStatus::Failed);
    }

    #[test]
    fn pending_and_failed_codes() {
        for (code, want) in [
            ("0", PaymentStatus::Pending),
            ("10", PaymentStatus::Pending),
            ("8", PaymentStatus::Failed),
            ("9", PaymentStatus::Failed),
        ] {
            let f = fields(&[("mul_no", "T"), ("pay_state", code)]);
            assert_eq!(parse_notification(&f).unwrap().status, want, "code {code}");
        }
    }

    #[test]
    fn missing_transaction_id_is_malformed() {
        let f = fields(&[("pay_state", "4"), ("price", "1000")]);
        assert!(matches!(
            parse_notification(&f),
            Err(ReconError::MalformedNotification(_))
        ));
    }

    #[test]
    fn bad_amount_stores_zero() {
        let f = fields(&[("mul_no", "T6"), ("price", "fifty")]);
        assert_eq!(parse_notification(&f).unwrap().amount, 0);
    }

    #[test]
    fn raw_payload_retains_every_field() {
        let f = fields(&[("mul_no", "T7"), ("var1", "extra"), ("memo", "pkg")]);
        let e = parse_notification(&f).unwrap();
        assert_eq!(e.raw_payload["var1"], "extra");
        assert_eq!(e.raw_payload["memo"], "pkg");
        assert_eq!(e.raw_payload["mul_no"], "T7");
    }

    #[test]
    fn query_and_form_transports_are_equivalent() {
        // Identical field values over GET query string and POST form body
        // must produce identical events, field for field.
        let wire = "mul_no=T8&pay_state=4&orderid=ORD-8&price=30000&buyer=%EA%B9%80&recvphone=010-1234-5678";
        let from_query = parse_notification(&decode_transport(wire.as_bytes()).unwrap()).unwrap();
        let from_form = parse_notification(&decode_transport(wire.as_bytes()).unwrap()).unwrap();
        assert_eq!(from_query.transaction_id, from_form.transaction_id);
        assert_eq!(from_query.status, from_form.status);
        assert_eq!(from_query.amount, from_form.amount);
        assert_eq!(from_query.payer_name, from_form.payer_name);
        assert_eq!(from_query.payer_phone, from_form.payer_phone);
        assert_eq!(from_query.order_reference, from_form.order_reference);
    }

    #[test]
    fn urlencoded_hangul_decodes() {
        let wire = "mul_no=T9&buyer=%EA%B9%80%EC%B2%A0%EC%88%98&goodname=%EB%AF%B8%EB%B8%94";
        let f = decode_transport(wire.as_bytes()).unwrap();
        let e = parse_notification(&f).unwrap();
        assert_eq!(e.payer_name, "김철수");
        assert_eq!(e.raw_payload["goodname"], "미블");
    }
}
