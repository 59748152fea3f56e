use super::order::{OrderStatus, Reward};
use crate::error::{AccrualError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

/// Body returned by the accrual service for a known order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: String,
    #[serde(default)]
    pub accrual: Option<Decimal>,
}

/// Status vocabulary of the accrual service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl FromStr for ExternalStatus {
    type Err = AccrualError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "REGISTERED" => Ok(Self::Registered),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            other => Err(AccrualError::UnknownStatus(other.to_string())),
        }
    }
}

impl From<ExternalStatus> for OrderStatus {
    fn from(status: ExternalStatus) -> Self {
        match status {
            ExternalStatus::Registered => OrderStatus::New,
            ExternalStatus::Processing => OrderStatus::Processing,
            ExternalStatus::Invalid => OrderStatus::Invalid,
            ExternalStatus::Processed => OrderStatus::Processed,
        }
    }
}

/// Result of a successful round-trip to the accrual service.
#[derive(Debug, Clone, PartialEq)]
pub enum AccrualLookup {
    /// `200 OK` with a decoded body.
    Found(AccrualResponse),
    /// `204 No Content`: the accrual service has never heard of the order.
    Unknown,
}

/// The write a lookup translates into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    /// `None` leaves the stored reward untouched.
    pub reward: Option<Reward>,
}

impl AccrualLookup {
    /// Maps the external answer onto an internal status write.
    ///
    /// A reward is carried only for a terminal status with a positive accrual.
    pub fn status_update(&self) -> Result<StatusUpdate> {
        match self {
            Self::Unknown => Ok(StatusUpdate {
                status: OrderStatus::Invalid,
                reward: None,
            }),
            Self::Found(response) => {
                let status: OrderStatus = response.status.parse::<ExternalStatus>()?.into();
                let reward = match response.accrual {
                    Some(amount) if status.is_terminal() => Reward::new(amount).ok(),
                    _ => None,
                };
                Ok(StatusUpdate { status, reward })
            }
        }
    }
}
