//! Ordered post-change side effects
//!
//! A single worker drains the queue, so a notification always completes
//! before the redeploy enqueued after it starts. Failures are logged and do
//! not affect the request that enqueued them.

use crate::gateway::{NotificationSink, RedeployTrigger};
use crate::state::AppTarget;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Work item for the side-effect worker
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum SideEffect {
    /// Deliver an app event
    Notify {
        app: AppTarget,
        event_type: String,
        payload: Value,
    },
    /// Ask the platform to redeploy the app
    Redeploy { app: AppTarget, reason: String },
}

/// Sender half of the side-effect worker
#[derive(Clone)]
pub struct SideEffectQueue {
    tx: mpsc::UnboundedSender<SideEffect>,
}

impl SideEffectQueue {
    /// Start the worker on the current runtime
    ///
    /// The worker exits once every queue clone has been dropped.
    pub fn spawn(
        notifier: Arc<dyn NotificationSink>,
        redeployer: Arc<dyn RedeployTrigger>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(drain(rx, notifier, redeployer));
        (Self { tx }, handle)
    }

    /// Queue an effect behind everything already queued
    pub fn enqueue(&self, effect: SideEffect) {
        if let Err(err) = self.tx.send(effect) {
            tracing::error!(effect = ?err.0, "Side-effect worker is gone, dropping effect");
        }
    }
}

/// Wait up to `grace` for the worker to drain what is already queued
///
/// Only returns promptly once every queue clone has been dropped. A worker
/// still running after `grace` is aborted and `false` is returned.
pub async fn finish(worker: JoinHandle<()>, grace: Duration) -> bool {
    let abort = worker.abort_handle();
    match tokio::time::timeout(grace, worker).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Side-effect worker failed");
            false
        }
        Err(_) => {
            tracing::warn!(grace_ms = grace.as_millis(), "Side-effect worker did not drain in time");
            abort.abort();
            false
        }
    }
}

async fn drain(
    mut rx: mpsc::UnboundedReceiver<SideEffect>,
    notifier: Arc<dyn NotificationSink>,
    redeployer: Arc<dyn RedeployTrigger>,
) {
    while let Some(effect) = rx.recv().await {
        match effect {
            SideEffect::Notify {
                app,
                event_type,
                payload,
            } => {
                if let Err(e) = notifier.notify(&app, &event_type, payload).await {
                    tracing::warn!(app = %app.key(), event_type = %event_type, error = %e, "Notification failed");
                }
            }
            SideEffect::Redeploy { app, reason } => {
                if let Err(e) = redeployer.schedule_redeploy(&app, &reason).await {
                    tracing::warn!(app = %app.key(), reason = %reason, error = %e, "Redeploy failed");
                }
            }
        }
    }
    tracing::debug!("Side-effect worker stopped");
}
