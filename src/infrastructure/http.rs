use crate::domain::accrual::{AccrualLookup, AccrualResponse};
use crate::domain::ports::AccrualClient;
use crate::error::{AccrualError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// Accrual client talking to `GET {base}/api/orders/{number}` over HTTP.
///
/// Cloning is cheap; the underlying `reqwest::Client` pools connections.
#[derive(Clone, Debug)]
pub struct HttpAccrualClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAccrualClient {
    /// Builds a client for `address`. A bare `host:port` is treated as plain HTTP.
    pub fn new(address: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: normalize_base_url(address),
        })
    }

    fn order_url(&self, number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, number)
    }
}

fn normalize_base_url(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    async fn fetch(&self, number: &str) -> Result<AccrualLookup> {
        let response = self.client.get(self.order_url(number)).send().await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await?;
                if body.is_empty() {
                    return Err(AccrualError::Decode(
                        "status is ok, but response is empty".to_string(),
                    ));
                }
                let parsed: AccrualResponse = serde_json::from_slice(&body)
                    .map_err(|e| AccrualError::Decode(e.to_string()))?;
                Ok(AccrualLookup::Found(parsed))
            }
            StatusCode::NO_CONTENT => Ok(AccrualLookup::Unknown),
            other => Err(AccrualError::UnexpectedStatus(other.as_u16())),
        }
    }
}
