#![forbid(unsafe_code)]

//! Scheduler configuration.
//!
//! The only tunable today is the remote budget: how many cross-thread jobs a
//! single [`UiScheduler::run_pending`](crate::UiScheduler::run_pending) call
//! pulls off the remote queue. A bounded budget keeps one busy producer from
//! starving the rest of the UI frame.
//!
//! The value can come from code (builder methods) or from the environment:
//!
//! | Variable | Values | Default |
//! |----------|--------|---------|
//! | `DUPLEX_REMOTE_BUDGET` | positive integer, `0` or `unbounded` | unbounded |

use std::env;

use crate::error::ConfigError;

/// Configuration for a [`UiScheduler`](crate::UiScheduler).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum remote jobs drained per `run_pending` call. `None` drains all.
    pub remote_budget: Option<usize>,
}

impl SchedulerConfig {
    pub const ENV_REMOTE_BUDGET: &'static str = "DUPLEX_REMOTE_BUDGET";

    /// Limit remote jobs drained per `run_pending` call.
    #[must_use]
    pub fn with_remote_budget(mut self, budget: usize) -> Self {
        self.remote_budget = (budget > 0).then_some(budget);
        self
    }

    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRemoteBudget`] when the variable is set
    /// to something that is not a count.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = env::var(Self::ENV_REMOTE_BUDGET).ok();
        Self::from_env_value(raw.as_deref())
    }

    /// Parse configuration from the raw value of `DUPLEX_REMOTE_BUDGET`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRemoteBudget`] for unparseable values.
    pub fn from_env_value(raw: Option<&str>) -> Result<Self, ConfigError> {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Ok(Self::default());
        };
        if raw.eq_ignore_ascii_case("unbounded") {
            return Ok(Self::default());
        }
        raw.parse::<usize>()
            .map(|budget| Self::default().with_remote_budget(budget))
            .map_err(|_| ConfigError::InvalidRemoteBudget {
                var: Self::ENV_REMOTE_BUDGET,
                value: raw.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_is_default() {
        assert_eq!(SchedulerConfig::from_env_value(None), Ok(SchedulerConfig::default()));
        assert_eq!(
            SchedulerConfig::from_env_value(Some("  ")),
            Ok(SchedulerConfig::default())
        );
    }

    #[test]
    fn numeric_budget() {
        let config = SchedulerConfig::from_env_value(Some(" 16 ")).unwrap();
        assert_eq!(config.remote_budget, Some(16));
    }

    #[test]
    fn zero_and_unbounded_mean_no_limit() {
        assert_eq!(
            SchedulerConfig::from_env_value(Some("0")).unwrap().remote_budget,
            None
        );
        assert_eq!(
            SchedulerConfig::from_env_value(Some("Unbounded"))
                .unwrap()
                .remote_budget,
            None
        );
    }

    #[test]
    fn garbage_is_rejected() {
        let err = SchedulerConfig::from_env_value(Some("lots")).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidRemoteBudget {
                var: "DUPLEX_REMOTE_BUDGET",
                value: "lots".to_string(),
            }
        );
        assert!(err.to_string().contains("DUPLEX_REMOTE_BUDGET"));
    }
}
