use std::collections::HashSet;

use serde::Serialize;

use gatehouse_core::{DomainError, DomainResult};

/// A validated, non-empty list of positive row ids.
///
/// Duplicates are dropped, first occurrence wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BulkIds(Vec<i64>);

impl BulkIds {
    pub fn new<I, T>(ids: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<i64>,
    {
        let mut seen = HashSet::new();
        let mut out: Vec<i64> = Vec::new();
        for id in ids {
            let id = id.into();
            if id <= 0 {
                return Err(DomainError::validation(format!(
                    "ids must be positive integers, got {id}"
                )));
            }
            if seen.insert(id) {
                out.push(id);
            }
        }
        if out.is_empty() {
            return Err(DomainError::validation("ids must be a non-empty array"));
        }
        Ok(Self(out))
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_non_positive() {
        assert!(matches!(
            BulkIds::new(Vec::<i64>::new()),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(BulkIds::new([3, 0]), Err(DomainError::Validation(_))));
        assert!(matches!(BulkIds::new([-4]), Err(DomainError::Validation(_))));
    }

    #[test]
    fn drops_duplicates_keeping_order() {
        let ids = BulkIds::new([5, 2, 5, 9]).unwrap();
        assert_eq!(ids.as_slice(), &[5, 2, 9]);
    }

    #[test]
    fn large_batches_keep_first_occurrence_order() {
        let raw: Vec<i64> = (1..=5_000).rev().chain(1..=5_000).collect();
        let ids = BulkIds::new(raw).unwrap();
        assert_eq!(ids.len(), 5_000);
        assert_eq!(ids.as_slice().first(), Some(&5_000));
        assert_eq!(ids.as_slice().last(), Some(&1));
    }
}
