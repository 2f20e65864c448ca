#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use campaign_kernel_contracts::admin::{AdminAccount, AdminEmail};
use campaign_kernel_contracts::submission::{
    ContentHash, ListQuery, ReceiptRef, SubmissionId, SubmissionInput, SubmissionPage,
    SubmissionRecord, UniquenessPolicy,
};
use chrono::{DateTime, Utc};

use crate::store::{IntakeStore, StorageError};

/// Typed repository interface for the submission ledger.
pub trait SubmissionLedgerRepo {
    /// Insert guarded by the unique indexes selected in `uniqueness`.
    fn insert_submission_row(
        &mut self,
        input: SubmissionInput,
        region_label: String,
        receipt: ReceiptRef,
        now: DateTime<Utc>,
        uniqueness: UniquenessPolicy,
    ) -> Result<SubmissionRecord, StorageError>;
    fn restore_submission_row(&mut self, record: SubmissionRecord) -> Result<(), StorageError>;

    fn submission_row(&self, id: SubmissionId) -> Option<&SubmissionRecord>;
    fn submission_rows(&self) -> Vec<&SubmissionRecord>;
    fn submission_ids(&self) -> Vec<SubmissionId>;
    fn submission_count(&self) -> u64;
    fn list_submission_rows(&self, query: &ListQuery) -> SubmissionPage;
    fn submission_ids_by_receipt_hash(&self, hash: &ContentHash) -> Vec<SubmissionId>;

    fn delete_submission_rows(&mut self, ids: &BTreeSet<SubmissionId>) -> u64;
    fn delete_submission_row(&mut self, id: SubmissionId) -> Result<(), StorageError>;
}

/// Typed repository interface for admin accounts.
pub trait AdminAccountRepo {
    fn insert_admin_row(&mut self, account: AdminAccount) -> Result<(), StorageError>;
    fn admin_row(&self, email: &AdminEmail) -> Option<&AdminAccount>;
    fn admin_rows(&self) -> Vec<&AdminAccount>;
}

impl SubmissionLedgerRepo for IntakeStore {
    fn insert_submission_row(
        &mut self,
        input: SubmissionInput,
        region_label: String,
        receipt: ReceiptRef,
        now: DateTime<Utc>,
        uniqueness: UniquenessPolicy,
    ) -> Result<SubmissionRecord, StorageError> {
        self.insert_submission(input, region_label, receipt, now, uniqueness)
    }

    fn restore_submission_row(&mut self, record: SubmissionRecord) -> Result<(), StorageError> {
        self.restore_submission(record)
    }

    fn submission_row(&self, id: SubmissionId) -> Option<&SubmissionRecord> {
        self.get_submission(id)
    }

    fn submission_rows(&self) -> Vec<&SubmissionRecord> {
        self.submissions()
    }

    fn submission_ids(&self) -> Vec<SubmissionId> {
        IntakeStore::submission_ids(self)
    }

    fn submission_count(&self) -> u64 {
        IntakeStore::submission_count(self)
    }

    fn list_submission_rows(&self, query: &ListQuery) -> SubmissionPage {
        self.list_submissions(query)
    }

    fn submission_ids_by_receipt_hash(&self, hash: &ContentHash) -> Vec<SubmissionId> {
        IntakeStore::submission_ids_by_receipt_hash(self, hash)
    }

    fn delete_submission_rows(&mut self, ids: &BTreeSet<SubmissionId>) -> u64 {
        self.delete_submissions(ids)
    }

    fn delete_submission_row(&mut self, id: SubmissionId) -> Result<(), StorageError> {
        self.delete_submission(id)
    }
}

impl AdminAccountRepo for IntakeStore {
    fn insert_admin_row(&mut self, account: AdminAccount) -> Result<(), StorageError> {
        self.insert_admin(account)
    }

    fn admin_row(&self, email: &AdminEmail) -> Option<&AdminAccount> {
        self.get_admin(email)
    }

    fn admin_rows(&self) -> Vec<&AdminAccount> {
        self.admins()
    }
}
