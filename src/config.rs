use crate::error::{AccrualError, Result};
use clap::Args;
use std::time::Duration;

/// Tuning knobs of the accrual engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Primary concurrency budget: accrual lookups running on their own task.
    pub max_active_workers: usize,
    /// Overflow events per reporting window.
    pub overload_report_count: usize,
    /// Overflow events per second above which a full window is reported.
    pub overload_report_rps: f64,
    pub polling_interval: Duration,
    /// Upper bound of orders picked up by a single sweep.
    pub polling_count: usize,
    /// Secondary pool size; `0` defers every overflowing order to the next sweep.
    pub overflow_workers: usize,
    pub overflow_queue: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_active_workers: 100,
            overload_report_count: 1000,
            overload_report_rps: 50.0,
            polling_interval: Duration::from_secs(1),
            polling_count: 1000,
            overflow_workers: 2,
            overflow_queue: 64,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_active_workers == 0 {
            return Err(AccrualError::ConfigError(
                "max_active_workers must be at least 1".to_string(),
            ));
        }
        if self.polling_count == 0 {
            return Err(AccrualError::ConfigError(
                "polling_count must be at least 1".to_string(),
            ));
        }
        if self.polling_interval.is_zero() {
            return Err(AccrualError::ConfigError(
                "polling_interval must be positive".to_string(),
            ));
        }
        if self.overload_report_count == 0 {
            return Err(AccrualError::ConfigError(
                "overload_report_count must be at least 1".to_string(),
            ));
        }
        if !(self.overload_report_rps > 0.0) {
            return Err(AccrualError::ConfigError(
                "overload_report_rps must be positive".to_string(),
            ));
        }
        if self.overflow_workers > 0 && self.overflow_queue == 0 {
            return Err(AccrualError::ConfigError(
                "overflow_queue must be at least 1 when overflow workers are enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Command-line and environment surface of the engine.
#[derive(Args, Debug, Clone)]
pub struct AccrualArgs {
    /// Accrual system address (host:port or URL)
    #[arg(short = 'r', long, env = "ACCRUAL_SYSTEM_ADDRESS")]
    pub accrual_address: String,

    /// Request timeout for accrual lookups in milliseconds (transport default when unset)
    #[arg(long, env = "ACCRUAL_TIMEOUT_MS")]
    pub accrual_timeout_ms: Option<u64>,

    #[arg(long, env = "MAX_ACTIVE_WORKERS", default_value_t = 100)]
    pub max_active_workers: usize,

    #[arg(long, env = "OVERLOAD_REPORT_COUNT", default_value_t = 1000)]
    pub overload_report_count: usize,

    #[arg(long, env = "OVERLOAD_REPORT_RPS", default_value_t = 50.0)]
    pub overload_report_rps: f64,

    #[arg(long, env = "POLLING_INTERVAL_MS", default_value_t = 1000)]
    pub polling_interval_ms: u64,

    #[arg(long, env = "POLLING_COUNT", default_value_t = 1000)]
    pub polling_count: usize,

    /// Workers draining the overflow queue (0 defers overflow to the next sweep)
    #[arg(long, env = "OVERFLOW_WORKERS", default_value_t = 2)]
    pub overflow_workers: usize,

    #[arg(long, env = "OVERFLOW_QUEUE", default_value_t = 64)]
    pub overflow_queue: usize,
}

impl AccrualArgs {
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let config = EngineConfig {
            max_active_workers: self.max_active_workers,
            overload_report_count: self.overload_report_count,
            overload_report_rps: self.overload_report_rps,
            polling_interval: Duration::from_millis(self.polling_interval_ms),
            polling_count: self.polling_count,
            overflow_workers: self.overflow_workers,
            overflow_queue: self.overflow_queue,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn accrual_timeout(&self) -> Option<Duration> {
        self.accrual_timeout_ms.map(Duration::from_millis)
    }
}
