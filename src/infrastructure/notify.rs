use crate::domain::payment::Receipt;
use crate::domain::ports::Notifier;
use crate::error::{GymError, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Logs receipts instead of sending them anywhere.
///
/// The real notification sender lives outside this core; in the replay
/// binary the log line is the observable effect.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send_receipt(&self, receipt: Receipt) -> Result<()> {
        tracing::info!(
            member = %receipt.member_id,
            amount = %receipt.amount,
            reference = %receipt.reference,
            "receipt scheduled"
        );
        Ok(())
    }
}

/// Captures receipts so tests can assert the exactly-once guarantee.
/// Clones share the captured list.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Receipt>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Receipt> {
        self.sent.lock().expect("notifier poisoned").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_receipt(&self, receipt: Receipt) -> Result<()> {
        self.sent.lock().expect("notifier poisoned").push(receipt);
        Ok(())
    }
}

/// Always fails, for asserting that notification failure never poisons a
/// payment transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_receipt(&self, _receipt: Receipt) -> Result<()> {
        Err(GymError::Internal(Box::new(std::io::Error::other(
            "notification channel down",
        ))))
    }
}
