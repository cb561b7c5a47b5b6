use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::instrument;

use gatehouse_core::AuditLogId;

use crate::record::{AuditEntry, NewAuditRecord};
use crate::sink::{AuditErrorReporter, AuditSink, TracingReporter};

/// Writes one audit row per call and swallows write failures after
/// reporting them.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
    reporter: Arc<dyn AuditErrorReporter>,
}

impl core::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn AuditErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Persist the entry. Returns the new row id, or `None` when the write
    /// failed (the failure has been reported).
    #[instrument(skip(self, entry), fields(action = %entry.action()))]
    pub async fn record(&self, entry: AuditEntry) -> Option<AuditLogId> {
        write(self.sink.as_ref(), self.reporter.as_ref(), entry.into_record()).await
    }

    /// Persist the entry on a runtime task, so the write completes even if
    /// the caller is dropped after its mutation committed.
    pub fn record_detached(&self, entry: AuditEntry) -> JoinHandle<Option<AuditLogId>> {
        let sink = Arc::clone(&self.sink);
        let reporter = Arc::clone(&self.reporter);
        let record = entry.into_record();
        tokio::spawn(async move { write(sink.as_ref(), reporter.as_ref(), record).await })
    }
}

async fn write(
    sink: &dyn AuditSink,
    reporter: &dyn AuditErrorReporter,
    record: NewAuditRecord,
) -> Option<AuditLogId> {
    match sink.persist_audit_record(record.clone()).await {
        Ok(id) => Some(id),
        Err(err) => {
            reporter.report(&err, &record);
            None
        }
    }
}
