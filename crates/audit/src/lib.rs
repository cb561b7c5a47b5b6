//! `gatehouse-audit` — the append-only audit trail.
//!
//! Every audited mutation produces exactly one [`AuditRecord`] carrying the
//! actor, the action, the resource and before/after snapshots. Persisting the
//! record is best-effort: a failed write is reported out of band and never
//! fails the mutation it describes.

pub mod diff;
pub mod query;
pub mod record;
pub mod recorder;
pub mod sink;

pub use diff::compute_changed_fields;
pub use query::{AuditLogQuery, AuditLogReader, AuditSort};
pub use record::{AuditAction, AuditEntry, AuditRecord, NewAuditRecord, RequestMeta, as_json_object};
pub use recorder::AuditRecorder;
pub use sink::{AuditErrorReporter, AuditSink, AuditWriteError, TracingReporter};
