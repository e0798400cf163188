//! Metrics Probe - One Pass Over Configured Checks
//!
//! Checks each provider's health once, then runs every check's query
//! against its provider. Checks run concurrently; each is a single
//! independent round trip. Values are reported, never retained or
//! combined across checks.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::ports::metrics_provider::MetricsProvider;

/// A named query bound to a named provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
  /// Check name, for reporting.
  pub name: String,
  /// Name of the provider the query runs against.
  pub provider: String,
  /// Backend-specific query string.
  pub query: String,
}

/// What happened to one check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
  /// The query returned a value.
  Value(f64),
  /// The backend answered without a datapoint.
  NoData(String),
  /// The provider failed its health check; the query was skipped.
  ProviderOffline(String),
  /// The query failed.
  Failed(String),
}

impl fmt::Display for CheckOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Value(v) => write!(f, "{v}"),
      Self::NoData(reason) => write!(f, "no data: {reason}"),
      Self::ProviderOffline(reason) => write!(f, "provider offline: {reason}"),
      Self::Failed(reason) => write!(f, "failed: {reason}"),
    }
  }
}

/// Result of one check in a probe pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
  /// Check name.
  pub check: String,
  /// Provider name.
  pub provider: String,
  /// Outcome.
  pub outcome: CheckOutcome,
}

/// Runs configured checks against named providers.
pub struct MetricsProbe {
  providers: HashMap<String, Arc<dyn MetricsProvider>>,
  checks: Vec<Check>,
}

impl MetricsProbe {
  /// Create a probe over `providers` (keyed by name) and `checks`.
  pub fn new(providers: HashMap<String, Arc<dyn MetricsProvider>>, checks: Vec<Check>) -> Self {
    Self { providers, checks }
  }

  /// Health of every provider, keyed by name. `Err` carries the reason
  /// a provider is considered offline.
  #[instrument(skip(self))]
  pub async fn health(&self) -> BTreeMap<String, Result<(), String>> {
    let mut health = BTreeMap::new();

    for (name, provider) in &self.providers {
      let status = match provider.is_online().await {
        Ok(true) => Ok(()),
        Ok(false) => Err("health check reported offline".to_string()),
        Err(e) => Err(e.to_string()),
      };

      match &status {
        Ok(()) => info!(provider = %name, kind = %provider.kind(), "Provider online"),
        Err(reason) => warn!(provider = %name, kind = %provider.kind(), reason = %reason, "Provider offline"),
      }
      health.insert(name.clone(), status);
    }

    health
  }

  /// Run one pass: health checks, then every check's query.
  ///
  /// Reports come back in check order.
  #[instrument(skip(self), fields(checks = self.checks.len()))]
  pub async fn run(&self) -> Vec<CheckReport> {
    let health = self.health().await;

    let mut reports: Vec<Option<CheckReport>> = vec![None; self.checks.len()];
    let mut tasks = JoinSet::new();

    for (index, check) in self.checks.iter().enumerate() {
      let report = |outcome| CheckReport {
        check: check.name.clone(),
        provider: check.provider.clone(),
        outcome,
      };

      let Some(provider) = self.providers.get(&check.provider) else {
        reports[index] = Some(report(CheckOutcome::Failed(format!(
          "unknown provider '{}'",
          check.provider
        ))));
        continue;
      };

      if let Some(Err(reason)) = health.get(&check.provider) {
        reports[index] = Some(report(CheckOutcome::ProviderOffline(reason.clone())));
        continue;
      }

      let provider = Arc::clone(provider);
      let query = check.query.clone();
      tasks.spawn(async move {
        let outcome = match provider.run_query(&query).await {
          Ok(value) => CheckOutcome::Value(value),
          Err(e) if e.is_no_data() => CheckOutcome::NoData(e.to_string()),
          Err(e) => CheckOutcome::Failed(e.to_string()),
        };
        (index, outcome)
      });
    }

    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok((index, outcome)) => {
          let check = &self.checks[index];
          match &outcome {
            CheckOutcome::Value(value) => {
              info!(check = %check.name, provider = %check.provider, value, "Check completed");
            }
            other => {
              warn!(check = %check.name, provider = %check.provider, outcome = %other, "Check without value");
            }
          }
          reports[index] = Some(CheckReport {
            check: check.name.clone(),
            provider: check.provider.clone(),
            outcome,
          });
        }
        Err(e) => error!(error = %e, "Check task aborted"),
      }
    }

    reports
      .into_iter()
      .zip(&self.checks)
      .map(|(report, check)| {
        report.unwrap_or_else(|| CheckReport {
          check: check.name.clone(),
          provider: check.provider.clone(),
          outcome: CheckOutcome::Failed("check task aborted".to_string()),
        })
      })
      .collect()
  }
}
