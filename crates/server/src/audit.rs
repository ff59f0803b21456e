use std::sync::Arc;

use tenderdesk_core::audit::{AuditEvent, AuditSink};
use tenderdesk_db::AuditEventRepository;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Forwards audit events to a background writer so `emit` never blocks a request.
#[derive(Clone)]
pub struct PersistingAuditSink {
    sender: mpsc::UnboundedSender<AuditEvent>,
}

impl PersistingAuditSink {
    /// The writer task ends once every sink clone is dropped and the queue is drained.
    pub fn spawn(repository: Arc<dyn AuditEventRepository>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<AuditEvent>();
        let writer = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let event_type = event.event_type.clone();
                if let Err(err) = repository.append(event).await {
                    error!(
                        event_name = "system.audit.write_failed",
                        audit_event_type = %event_type,
                        error = %err,
                        "failed to persist audit event"
                    );
                }
            }
        });
        (Self { sender }, writer)
    }
}

impl AuditSink for PersistingAuditSink {
    fn emit(&self, event: AuditEvent) {
        if let Err(rejected) = self.sender.send(event) {
            warn!(
                event_name = "system.audit.dropped",
                audit_event_type = %rejected.0.event_type,
                "audit writer stopped; event dropped"
            );
        }
    }
}
