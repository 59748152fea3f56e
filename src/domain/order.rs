use crate::error::AccrualError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reward points credited for an order.
///
/// Always strictly positive: a zero or absent accrual never reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Reward(Decimal);

impl Reward {
    pub fn new(value: Decimal) -> Result<Self, AccrualError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(AccrualError::ValidationError(
                "Reward must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Reward {
    type Error = AccrualError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Reward> for Decimal {
    fn from(reward: Reward) -> Self {
        reward.0
    }
}

impl fmt::Display for Reward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.normalize().fmt(f)
    }
}

/// Processing state of an order.
///
/// Moves forward only: `New -> Processing -> {Processed, Invalid}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    /// Statuses the sweeper keeps picking up.
    pub const PENDING: [OrderStatus; 2] = [OrderStatus::New, OrderStatus::Processing];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Processing => 1,
            Self::Invalid | Self::Processed => 2,
        }
    }

    /// Whether a stored order in `self` may be rewritten to `next`.
    ///
    /// Re-applying the current status is allowed so repeated writes stay idempotent.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return self == next;
        }
        next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchase order awaiting (or done with) reward computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Externally supplied, unique order number.
    pub number: String,
    /// Owner of the order.
    pub user_id: String,
    pub status: OrderStatus,
    /// Set only together with a terminal status.
    pub accrual: Option<Reward>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// A freshly submitted order in `New` status.
    pub fn new(number: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            user_id: user_id.into(),
            status: OrderStatus::New,
            accrual: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reward_validation() {
        assert!(Reward::new(dec!(0.01)).is_ok());
        assert!(matches!(
            Reward::new(dec!(0.0)),
            Err(AccrualError::ValidationError(_))
        ));
        assert!(matches!(
            Reward::new(dec!(-3)),
            Err(AccrualError::ValidationError(_))
        ));
    }

    #[test]
    fn test_status_only_moves_forward() {
        use OrderStatus::*;

        assert!(New.can_advance_to(Processing));
        assert!(New.can_advance_to(Processed));
        assert!(Processing.can_advance_to(Invalid));
        assert!(Processing.can_advance_to(Processing));
        assert!(!Processing.can_advance_to(New));
        assert!(!Processed.can_advance_to(Invalid));
        assert!(!Invalid.can_advance_to(Processing));
        assert!(Processed.can_advance_to(Processed));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");

        let status: OrderStatus = serde_json::from_str("\"INVALID\"").unwrap();
        assert_eq!(status, OrderStatus::Invalid);
    }

    #[test]
    fn test_new_order_has_no_reward() {
        let order = Order::new("12345", "user-1");
        assert_eq!(order.status, OrderStatus::New);
        assert!(order.accrual.is_none());
    }
}
