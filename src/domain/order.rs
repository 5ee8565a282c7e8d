use {
    super::error::ReconError,
    super::event::PaymentStatus,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn rank(&self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::Paid | Self::Failed | Self::Cancelled => 1,
        }
    }

    /// Forward-only: a stale redelivery may never downgrade a settled order.
    pub fn can_advance_to(&self, next: &OrderStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = ReconError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ReconError::MalformedNotification(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

impl From<PaymentStatus> for OrderStatus {
    fn from(s: PaymentStatus) -> Self {
        match s {
            PaymentStatus::Pending => Self::Pending,
            PaymentStatus::Paid => Self::Paid,
            PaymentStatus::Failed => Self::Failed,
        }
    }
}

/// Order row as persisted.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub business_name: String,
    pub package_name: String,
    pub package_price: i64,
    pub amount: i64,
    pub status: String,
    pub payment_method: String,
    pub receipt_url: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn order_status(&self) -> Result<OrderStatus, ReconError> {
        OrderStatus::try_from(self.status.as_str())
    }
}

/// For INSERT/upsert. The id is generated in Rust, phone stored normalized by the
/// caller.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub business_name: String,
    pub package_name: String,
    pub package_price: i64,
    pub amount: i64,
    pub status: OrderStatus,
    pub payment_method: String,
    pub receipt_url: String,
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_orders_never_downgrade() {
        use OrderStatus::*;
        for settled in [Paid, Failed, Cancelled] {
            assert!(!settled.can_advance_to(&Pending));
            assert!(!settled.can_advance_to(&Paid));
        }
        assert!(Pending.can_advance_to(&Paid));
        assert!(Pending.can_advance_to(&Failed));
    }

    #[test]
    fn payment_status_maps_onto_order_status() {
        assert_eq!(OrderStatus::from(PaymentStatus::Paid), OrderStatus::Paid);
        assert_eq!(
            OrderStatus::from(PaymentStatus::Pending),
            OrderStatus::Pending
        );
        assert_eq!(
            OrderStatus::from(PaymentStatus::Failed),
            OrderStatus::Failed
        );
    }
}
