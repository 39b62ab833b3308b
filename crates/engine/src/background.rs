use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use pulsar_webhook::WebhookWorker;

use crate::clock::Clock;
use crate::escalation::EscalationEngine;

/// Tick periods for the background workers.
#[derive(Debug, Clone)]
pub struct BackgroundConfig {
    /// Escalation tick period. Must be at most half the smallest
    /// configured rule delay.
    pub escalation_tick: Duration,
    /// Webhook retry tick period.
    pub webhook_tick: Duration,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            escalation_tick: Duration::from_secs(15),
            webhook_tick: Duration::from_secs(10),
        }
    }
}

/// Drives the escalation engine and the webhook delivery worker on
/// independent intervals.
///
/// Ticks are single-flight per worker: the loop processes one tick at a
/// time and a tick running past its period causes the next to be skipped,
/// not queued. Shutdown is cooperative through the cancellation token.
pub struct Workers {
    escalation: Arc<EscalationEngine>,
    webhook: Arc<WebhookWorker>,
    clock: Arc<dyn Clock>,
    config: BackgroundConfig,
}

impl Workers {
    /// Create the worker bundle.
    #[must_use]
    pub fn new(
        escalation: Arc<EscalationEngine>,
        webhook: Arc<WebhookWorker>,
        clock: Arc<dyn Clock>,
        config: BackgroundConfig,
    ) -> Self {
        Self {
            escalation,
            webhook,
            clock,
            config,
        }
    }

    /// Spawn the tick loop; it runs until the token is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: CancellationToken) {
        info!(
            escalation_tick_s = self.config.escalation_tick.as_secs(),
            webhook_tick_s = self.config.webhook_tick.as_secs(),
            "background workers starting"
        );
        let mut escalation_timer = interval(self.config.escalation_tick);
        escalation_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut webhook_timer = interval(self.config.webhook_tick);
        webhook_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("background workers received shutdown signal");
                    break;
                }
                _ = escalation_timer.tick() => {
                    if let Err(err) = self.escalation.tick(self.clock.now()).await {
                        error!(error = %err, "escalation tick failed");
                    }
                }
                _ = webhook_timer.tick() => {
                    if let Err(err) = self.webhook.tick(self.clock.now()).await {
                        error!(error = %err, "webhook tick failed");
                    }
                }
            }
        }
        info!("background workers stopped");
    }
}
