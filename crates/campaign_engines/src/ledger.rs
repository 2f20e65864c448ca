#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use campaign_kernel_contracts::submission::{
    ContentHash, ListQuery, ReceiptRef, SubmissionId, SubmissionInput, SubmissionPage,
    SubmissionRecord, UniquenessPolicy,
};
use campaign_storage::repo::SubmissionLedgerRepo;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::IntakeError;
use crate::region::normalize_region;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerConfig {
    pub uniqueness: UniquenessPolicy,
}

impl LedgerConfig {
    pub fn mvp_v1() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeOutcome {
    pub record: SubmissionRecord,
    /// Earlier submissions already carried the same receipt bytes.
    pub duplicate_receipt: bool,
}

#[derive(Debug, Clone)]
pub struct SubmissionLedgerRuntime {
    config: LedgerConfig,
}

impl SubmissionLedgerRuntime {
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn create<R: SubmissionLedgerRepo>(
        &self,
        repo: &mut R,
        input: SubmissionInput,
        receipt: ReceiptRef,
        now: DateTime<Utc>,
    ) -> Result<IntakeOutcome, IntakeError> {
        let region = normalize_region(&input.region);
        let duplicate_receipt = !self.receipt_duplicates(repo, &receipt.content_hash).is_empty();

        let record = repo
            .insert_submission_row(
                input,
                region.as_str().to_string(),
                receipt,
                now,
                self.config.uniqueness,
            )
            .map_err(|err| {
                let err = IntakeError::from(err);
                warn!(error = %err, "submission rejected");
                err
            })?;

        if duplicate_receipt {
            warn!(
                submission_id = record.id.0,
                receipt_hash = record.receipt_hash.short_prefix(16),
                "receipt bytes already seen on an earlier submission"
            );
        }
        info!(
            submission_id = record.id.0,
            emirate = %record.emirate,
            "submission accepted"
        );
        Ok(IntakeOutcome {
            record,
            duplicate_receipt,
        })
    }

    pub fn list<R: SubmissionLedgerRepo>(&self, repo: &R, query: &ListQuery) -> SubmissionPage {
        repo.list_submission_rows(query)
    }

    pub fn delete_many<R: SubmissionLedgerRepo>(
        &self,
        repo: &mut R,
        ids: &BTreeSet<SubmissionId>,
    ) -> Result<u64, IntakeError> {
        if ids.is_empty() {
            return Err(IntakeError::PayloadInvalid(
                "ids must list at least one submission".to_string(),
            ));
        }
        let deleted = repo.delete_submission_rows(ids);
        info!(requested = ids.len(), deleted, "submissions deleted");
        Ok(deleted)
    }

    pub fn delete_one<R: SubmissionLedgerRepo>(
        &self,
        repo: &mut R,
        id: SubmissionId,
    ) -> Result<u64, IntakeError> {
        repo.delete_submission_row(id)?;
        info!(submission_id = id.0, "submission deleted");
        Ok(1)
    }

    pub fn receipt_duplicates<R: SubmissionLedgerRepo>(
        &self,
        repo: &R,
        hash: &ContentHash,
    ) -> Vec<SubmissionId> {
        repo.submission_ids_by_receipt_hash(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_kernel_contracts::submission::UniqueField;
    use campaign_storage::IntakeStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 10, 18, 30, 0).unwrap()
    }

    fn receipt(seed: char) -> ReceiptRef {
        let content_hash = ContentHash::new(seed.to_string().repeat(64)).unwrap();
        ReceiptRef {
            public_ref: format!("/uploads/{}-00000000000000aa.jpg", content_hash.short_prefix(16)),
            content_hash,
        }
    }

    fn input(email: &str, mobile: &str, region: &str) -> SubmissionInput {
        SubmissionInput::v1(
            "Sam".to_string(),
            email.to_string(),
            mobile.to_string(),
            "784-1985-7654321-2".to_string(),
            region.to_string(),
        )
        .unwrap()
    }

    fn strict() -> SubmissionLedgerRuntime {
        SubmissionLedgerRuntime::new(LedgerConfig {
            uniqueness: UniquenessPolicy {
                email: true,
                mobile: true,
            },
        })
    }

    #[test]
    fn at_ledger_01_region_is_stored_canonicalized() {
        let mut store = IntakeStore::new_in_memory();
        let out = strict()
            .create(&mut store, input("a@x.com", "0501234567", "دبي"), receipt('a'), now())
            .unwrap();
        assert_eq!(out.record.emirate, "Dubai");
        assert_eq!(out.record.region_raw, "دبي");
        assert!(!out.duplicate_receipt);

        let out = strict()
            .create(&mut store, input("b@x.com", "0507654321", " Al Ain "), receipt('b'), now())
            .unwrap();
        assert_eq!(out.record.emirate, "Al Ain");
    }

    #[test]
    fn at_ledger_02_conflicts_surface_field() {
        let mut store = IntakeStore::new_in_memory();
        let rt = strict();
        rt.create(&mut store, input("a@x.com", "0501234567", "Dubai"), receipt('a'), now())
            .unwrap();
        assert_eq!(
            rt.create(&mut store, input("A@X.COM", "0500000000", "Dubai"), receipt('b'), now())
                .unwrap_err(),
            IntakeError::Conflict {
                field: UniqueField::Email
            }
        );
        assert_eq!(
            rt.create(&mut store, input("z@x.com", "050-123-4567", "Dubai"), receipt('b'), now())
                .unwrap_err(),
            IntakeError::Conflict {
                field: UniqueField::Mobile
            }
        );
        assert_eq!(store.submission_count(), 1);
    }

    #[test]
    fn at_ledger_03_duplicate_receipt_is_reported_not_rejected() {
        let mut store = IntakeStore::new_in_memory();
        let rt = SubmissionLedgerRuntime::new(LedgerConfig::mvp_v1());
        rt.create(&mut store, input("a@x.com", "0501234567", "Dubai"), receipt('c'), now())
            .unwrap();
        let second = rt
            .create(&mut store, input("b@x.com", "0501111111", "Dubai"), receipt('c'), now())
            .unwrap();
        assert!(second.duplicate_receipt);
        assert_eq!(
            rt.receipt_duplicates(&store, &second.record.receipt_hash).len(),
            2
        );
    }

    #[test]
    fn at_ledger_04_delete_semantics() {
        let mut store = IntakeStore::new_in_memory();
        let rt = SubmissionLedgerRuntime::new(LedgerConfig::mvp_v1());
        let a = rt
            .create(&mut store, input("a@x.com", "0501234567", "Dubai"), receipt('a'), now())
            .unwrap();

        assert!(matches!(
            rt.delete_many(&mut store, &BTreeSet::new()),
            Err(IntakeError::PayloadInvalid(_))
        ));
        let unknown: BTreeSet<_> = [SubmissionId(404)].into_iter().collect();
        assert_eq!(rt.delete_many(&mut store, &unknown).unwrap(), 0);

        assert_eq!(rt.delete_one(&mut store, a.record.id).unwrap(), 1);
        assert!(matches!(
            rt.delete_one(&mut store, a.record.id),
            Err(IntakeError::NotFound(_))
        ));
    }

    #[test]
    fn at_ledger_05_list_falls_back_safely_on_unknown_sort() {
        let mut store = IntakeStore::new_in_memory();
        let rt = SubmissionLedgerRuntime::new(LedgerConfig::mvp_v1());
        for (i, email) in ["a@x.com", "b@x.com", "c@x.com"].iter().enumerate() {
            rt.create(
                &mut store,
                input(email, &format!("05012345{i:02}"), "Dubai"),
                receipt('a'),
                now(),
            )
            .unwrap();
        }
        let page = rt.list(
            &store,
            &ListQuery::from_raw(Some(0), Some(2), Some("password; DROP"), Some("desc")),
        );
        let ids: Vec<u64> = page.items.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(page.total, 3);
    }

    #[test]
    fn at_ledger_06_blank_region_is_filed_under_unknown() {
        let mut store = IntakeStore::new_in_memory();
        let out = SubmissionLedgerRuntime::new(LedgerConfig::mvp_v1())
            .create(&mut store, input("a@x.com", "0501234567", "  "), receipt('a'), now())
            .unwrap();
        assert_eq!(out.record.emirate, "Unknown");
        assert_eq!(out.record.region_raw, "");
    }
}
