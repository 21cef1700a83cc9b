//! Affirmation usage tracking
//!
//! Counts which pool items were shown in the current cycle and warns once
//! per threshold when few unseen items remain. A cycle restarts when every
//! item has been shown; the notified thresholds clear with it.
//!
//! Warnings go to a [`UsageNotifier`]. The email relay posts to an
//! EmailJS-compatible endpoint on a spawned task; failures are logged and
//! never retried.

use crate::config::{RelayConfig, LOW_INVENTORY_THRESHOLDS, USAGE_KEY};
use crate::error::Result;
use crate::services::affirmations::AffirmationPool;
use crate::storage::LocalStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Receives low-inventory warnings. Implementations must not block.
pub trait UsageNotifier: Send + Sync {
    fn notify(&self, remaining: usize);
}

/// Notifier used when no relay is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl UsageNotifier for LogNotifier {
    fn notify(&self, remaining: usize) {
        tracing::warn!("Affirmation inventory low: {} unseen item(s) remain", remaining);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateParams {
    pub to_email: String,
    pub remaining_count: usize,
}

/// Body of an EmailJS send request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayPayload {
    pub service_id: String,
    pub template_id: String,
    pub user_id: String,
    pub template_params: TemplateParams,
}

/// Fire-and-forget email relay
#[derive(Clone)]
pub struct EmailRelay {
    client: reqwest::Client,
    config: RelayConfig,
}

impl EmailRelay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Request body for a remaining count, or `None` when the count is not
    /// a threshold
    pub fn payload(&self, remaining: usize) -> Option<RelayPayload> {
        let template_id = self.config.template_for(remaining)?;
        Some(RelayPayload {
            service_id: self.config.service_id.clone(),
            template_id: template_id.to_string(),
            user_id: self.config.public_key.clone(),
            template_params: TemplateParams {
                to_email: self.config.recipient.clone(),
                remaining_count: remaining,
            },
        })
    }

    /// Send one warning and wait for the relay's answer
    pub async fn send(&self, payload: &RelayPayload) -> Result<()> {
        self.client
            .post(&self.config.url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl UsageNotifier for EmailRelay {
    fn notify(&self, remaining: usize) {
        let Some(payload) = self.payload(remaining) else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("No async runtime, dropping usage warning ({} left)", remaining);
            return;
        };

        let relay = self.clone();
        runtime.spawn(async move {
            match relay.send(&payload).await {
                Ok(()) => tracing::info!("Usage warning sent ({} left)", remaining),
                Err(e) => tracing::error!("Failed to send usage warning: {}", e),
            }
        });
    }
}

/// Relay from the environment, or the logging notifier
pub fn notifier_from_env() -> Arc<dyn UsageNotifier> {
    match RelayConfig::from_env() {
        Some(config) => {
            tracing::info!("Usage warnings relayed to {}", config.url);
            Arc::new(EmailRelay::new(config))
        }
        None => Arc::new(LogNotifier),
    }
}

/// Persisted cycle state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UsageState {
    pub used_ids: Vec<u32>,
    pub last_total: usize,
    /// Thresholds already warned about in this cycle
    pub notified: Vec<usize>,
}

/// Records shown items and raises threshold warnings
#[derive(Clone)]
pub struct UsageTracker {
    store: LocalStore,
    notifier: Arc<dyn UsageNotifier>,
}

impl UsageTracker {
    pub fn new(store: LocalStore, notifier: Arc<dyn UsageNotifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn state(&self) -> UsageState {
        self.store.read(USAGE_KEY, UsageState::default()).await
    }

    /// Unseen items left in the current cycle
    pub async fn remaining(&self, pool: &AffirmationPool) -> usize {
        let state = self.state().await;
        let used = state.used_ids.iter().filter(|id| pool.contains(**id)).count();
        pool.len().saturating_sub(used)
    }

    /// Record that `item_id` was shown. Returns the thresholds that fired.
    pub async fn record(&self, item_id: u32, pool: &AffirmationPool) -> Vec<usize> {
        let total = pool.len();

        let fired = self
            .store
            .update(USAGE_KEY, UsageState::default(), |state| {
                // Items removed from the pool no longer count as used.
                state.used_ids.retain(|id| pool.contains(*id));

                if state.used_ids.len() >= total {
                    tracing::info!("All {} affirmations shown, starting a new cycle", total);
                    state.used_ids.clear();
                    state.notified.clear();
                }

                if !state.used_ids.contains(&item_id) {
                    state.used_ids.push(item_id);
                }
                state.last_total = total;

                let remaining = total.saturating_sub(state.used_ids.len());
                let mut fired = Vec::new();
                if LOW_INVENTORY_THRESHOLDS.contains(&remaining) && !state.notified.contains(&remaining) {
                    state.notified.push(remaining);
                    fired.push(remaining);
                }
                fired
            })
            .await;

        for remaining in &fired {
            self.notifier.notify(*remaining);
        }

        fired
    }
}
