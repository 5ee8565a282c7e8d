use {
    super::error::ReconError,
    super::id::TransactionId,
    super::phone::{normalize_order_id, normalize_phone},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

/// Provider-neutral payment state, derived from the gateway's numeric codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    /// Lifecycle rank, higher means further along. Used to prevent
    /// out-of-order redeliveries from regressing status.
    pub fn rank(&self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::Paid | Self::Failed => 1,
        }
    }

    pub fn can_advance_to(&self, next: &PaymentStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = ReconError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(ReconError::MalformedNotification(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// Parsed gateway notification, ready for the idempotent upsert.
/// Phone and order reference are normalized at construction so every
/// comparison downstream sees canonical values.
#[derive(Debug, Clone)]
pub struct NewPaymentEvent {
    pub id: Uuid,
    pub transaction_id: TransactionId,
    pub order_reference: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub payer_name: String,
    pub payer_phone: String,
    pub payer_email: String,
    pub receipt_url: String,
    pub payment_method: String,
    pub payment_date: String,
    pub raw_payload: serde_json::Value,
}

pub struct NewPaymentEventParams {
    pub transaction_id: TransactionId,
    pub order_reference: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub payer_name: String,
    pub payer_phone: String,
    pub payer_email: String,
    pub receipt_url: String,
    pub payment_method: String,
    pub payment_date: String,
    pub raw_payload: serde_json::Value,
}

impl NewPaymentEvent {
    pub fn new(params: NewPaymentEventParams) -> Self {
        Self {
            id: Uuid::now_v7(),
            transaction_id: params.transaction_id,
            order_reference: normalize_order_id(&params.order_reference),
            status: params.status,
            amount: params.amount,
            payer_name: params.payer_name,
            payer_phone: normalize_phone(&params.payer_phone),
            payer_email: params.payer_email,
            receipt_url: params.receipt_url,
            payment_method: params.payment_method,
            payment_date: params.payment_date,
            raw_payload: params.raw_payload,
        }
    }
}

/// Payment event as persisted, as the upsert hands it back for matching.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredPaymentEvent {
    pub id: Uuid,
    pub transaction_id: String,
    pub order_reference: String,
    pub status: String,
    pub amount: i64,
    pub payer_name: String,
    pub payer_phone: String,
    pub payer_email: String,
    pub receipt_url: String,
    pub payment_method: String,
    pub payment_date: String,
    pub raw_payload: serde_json::Value,
    pub order_id: Option<Uuid>,
    pub match_uncertain: bool,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredPaymentEvent {
    pub fn payment_status(&self) -> Result<PaymentStatus, ReconError> {
        PaymentStatus::try_from(self.status.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for s in [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
        ] {
            assert_eq!(PaymentStatus::try_from(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn pending_advances_to_terminal_only() {
        use PaymentStatus::*;
        assert!(Pending.can_advance_to(&Paid));
        assert!(Pending.can_advance_to(&Failed));
        assert!(!Paid.can_advance_to(&Pending));
        assert!(!Failed.can_advance_to(&Pending));
        assert!(!Paid.can_advance_to(&Failed));
        assert!(!Pending.can_advance_to(&Pending));
    }

    #[test]
    fn new_event_normalizes_identifiers() {
        let e = NewPaymentEvent::new(NewPaymentEventParams {
            transaction_id: TransactionId::new(" T1 ").unwrap(),
            order_reference: " ORD-1 ".into(),
            status: PaymentStatus::Paid,
            amount: 50000,
            payer_name: "Kim".into(),
            payer_phone: "01012345678".into(),
            payer_email: String::new(),
            receipt_url: String::new(),
            payment_method: "card".into(),
            payment_date: String::new(),
            raw_payload: serde_json::json!({}),
        });
        assert_eq!(e.transaction_id.as_str(), "T1");
        assert_eq!(e.order_reference, "ORD-1");
        assert_eq!(e.payer_phone, "010-1234-5678");
    }
}
