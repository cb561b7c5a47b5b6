use async_trait::async_trait;
use chrono::Utc;

use gatehouse_audit::{AuditLogQuery, AuditLogReader, AuditRecord, AuditSink, AuditWriteError, NewAuditRecord};
use gatehouse_core::{AuditLogId, DomainResult, Page, SortOrder};

use super::InMemoryStore;

#[async_trait]
impl AuditSink for InMemoryStore {
    async fn persist_audit_record(&self, record: NewAuditRecord) -> Result<AuditLogId, AuditWriteError> {
        let mut t = self.write()?;
        let id = AuditLogId::new(t.next_id("audit_logs"));
        t.audit_logs.push(AuditRecord::from_new(id, record, Utc::now()));
        Ok(id)
    }
}

#[async_trait]
impl AuditLogReader for InMemoryStore {
    async fn list_audit_logs(&self, query: &AuditLogQuery) -> DomainResult<Page<AuditRecord>> {
        let t = self.read()?;
        let mut matched: Vec<AuditRecord> = t
            .audit_logs
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            let ord = query.sort.compare(a, b);
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        Ok(Page::from_sorted(matched, query.page))
    }

    async fn find_audit_log(&self, id: AuditLogId) -> DomainResult<Option<AuditRecord>> {
        let t = self.read()?;
        Ok(t.audit_logs.iter().find(|r| r.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use gatehouse_audit::{AuditAction, AuditEntry, AuditSort};
    use gatehouse_core::EntityKind;

    use super::*;

    #[tokio::test]
    async fn records_are_appended_and_listed_newest_first() {
        let store = InMemoryStore::new();
        for id in 1..=3i64 {
            let record = AuditEntry::for_entity(AuditAction::Create, EntityKind::Role, id).into_record();
            store.persist_audit_record(record).await.unwrap();
        }

        let page = store
            .list_audit_logs(&AuditLogQuery {
                sort: AuditSort::ResourceId,
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<&str> = page.items.iter().map(|r| r.resource_id.as_str()).collect();
        assert_eq!(ids, ["3", "2", "1"]);

        let found = store.find_audit_log(AuditLogId::new(2)).await.unwrap().unwrap();
        assert_eq!(found.resource_id, "2");
        assert!(store.find_audit_log(AuditLogId::new(9)).await.unwrap().is_none());
    }
}
