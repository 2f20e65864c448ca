#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use campaign_kernel_contracts::admin::{AdminAccount, AdminEmail};
use campaign_kernel_contracts::submission::{
    email_unique_key, mobile_unique_key, ContentHash, ListQuery, ReceiptRef, SortField,
    SortOrder, SubmissionId, SubmissionInput, SubmissionPage, SubmissionRecord, UniqueField,
    UniquenessPolicy,
};
use campaign_kernel_contracts::ContractViolation;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("unique constraint violated on {}", .field.as_str())]
    UniqueViolation { field: UniqueField },
    #[error("duplicate key in {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("no row in {table} for key {key}")]
    NotFound { table: &'static str, key: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),
}

type IdIndex<K> = BTreeMap<K, BTreeSet<SubmissionId>>;

/// Id and clock state that the next submission insert advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertCursor {
    next_submission_id: u64,
    last_submitted_at: Option<DateTime<Utc>>,
}

/// In-memory row store for submissions and admin accounts.
///
/// Email and mobile keep unique indexes so a uniqueness check and the insert
/// it guards happen inside one `&mut self` call. Callers sharing the store
/// across threads wrap it in a single mutex.
#[derive(Debug, Default)]
pub struct IntakeStore {
    submissions: BTreeMap<SubmissionId, SubmissionRecord>,
    next_submission_id: u64,
    last_submitted_at: Option<DateTime<Utc>>,
    email_index: IdIndex<String>,
    mobile_index: IdIndex<String>,
    receipt_hash_index: IdIndex<ContentHash>,

    admins: BTreeMap<AdminEmail, AdminAccount>,
}

impl IntakeStore {
    pub fn new_in_memory() -> Self {
        Self {
            next_submission_id: 1,
            ..Self::default()
        }
    }

    // ------------------------
    // Submissions
    // ------------------------

    pub fn insert_submission(
        &mut self,
        input: SubmissionInput,
        region_label: String,
        receipt: ReceiptRef,
        now: DateTime<Utc>,
        uniqueness: UniquenessPolicy,
    ) -> Result<SubmissionRecord, StorageError> {
        let email_key = email_unique_key(&input.email);
        let mobile_key = mobile_unique_key(&input.mobile);
        if uniqueness.email && index_has_rows(&self.email_index, &email_key) {
            return Err(StorageError::UniqueViolation {
                field: UniqueField::Email,
            });
        }
        if uniqueness.mobile && index_has_rows(&self.mobile_index, &mobile_key) {
            return Err(StorageError::UniqueViolation {
                field: UniqueField::Mobile,
            });
        }

        // Creation time never runs backwards relative to insertion order.
        let submitted_at = match self.last_submitted_at {
            Some(last) if last > now => last,
            _ => now,
        };
        let id = SubmissionId(self.next_submission_id.max(1));
        let record = SubmissionRecord::from_input_v1(id, input, region_label, receipt, submitted_at)?;

        self.next_submission_id = id.0.saturating_add(1);
        self.last_submitted_at = Some(submitted_at);
        self.index_record(&record);
        self.submissions.insert(id, record.clone());
        Ok(record)
    }

    pub fn insert_cursor(&self) -> InsertCursor {
        InsertCursor {
            next_submission_id: self.next_submission_id,
            last_submitted_at: self.last_submitted_at,
        }
    }

    /// Undoes the most recent insert: drops row `id` and puts the id counter
    /// and clock back to `cursor`, taken just before that insert.
    pub fn rewind_insert(
        &mut self,
        id: SubmissionId,
        cursor: InsertCursor,
    ) -> Result<(), StorageError> {
        self.delete_submission(id)?;
        self.next_submission_id = cursor.next_submission_id;
        self.last_submitted_at = cursor.last_submitted_at;
        Ok(())
    }

    /// Re-inserts a previously persisted record under its original id.
    /// Uniqueness toggles are not re-applied; they gate intake, not replay.
    pub fn restore_submission(&mut self, record: SubmissionRecord) -> Result<(), StorageError> {
        if self.submissions.contains_key(&record.id) {
            return Err(StorageError::DuplicateKey {
                table: "submissions",
                key: record.id.0.to_string(),
            });
        }
        self.next_submission_id = self.next_submission_id.max(record.id.0.saturating_add(1));
        self.last_submitted_at = Some(match self.last_submitted_at {
            Some(last) if last > record.submitted_at => last,
            _ => record.submitted_at,
        });
        self.index_record(&record);
        self.submissions.insert(record.id, record);
        Ok(())
    }

    pub fn get_submission(&self, id: SubmissionId) -> Option<&SubmissionRecord> {
        self.submissions.get(&id)
    }

    pub fn submission_count(&self) -> u64 {
        self.submissions.len() as u64
    }

    pub fn submission_ids(&self) -> Vec<SubmissionId> {
        self.submissions.keys().copied().collect()
    }

    /// All rows in insertion (id) order.
    pub fn submissions(&self) -> Vec<&SubmissionRecord> {
        self.submissions.values().collect()
    }

    pub fn submission_ids_by_receipt_hash(&self, hash: &ContentHash) -> Vec<SubmissionId> {
        self.receipt_hash_index
            .get(hash)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn list_submissions(&self, query: &ListQuery) -> SubmissionPage {
        let mut rows: Vec<&SubmissionRecord> = self.submissions.values().collect();
        rows.sort_by(|a, b| {
            let ord = compare_by_field(a, b, query.sort_by).then_with(|| a.id.cmp(&b.id));
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        let items = rows
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect();
        SubmissionPage {
            items,
            total: self.submission_count(),
        }
    }

    /// Deletes every listed id that exists; unknown ids are ignored.
    pub fn delete_submissions(&mut self, ids: &BTreeSet<SubmissionId>) -> u64 {
        let mut deleted = 0;
        for id in ids {
            if self.remove_submission(*id) {
                deleted += 1;
            }
        }
        deleted
    }

    pub fn delete_submission(&mut self, id: SubmissionId) -> Result<(), StorageError> {
        if self.remove_submission(id) {
            Ok(())
        } else {
            Err(StorageError::NotFound {
                table: "submissions",
                key: id.0.to_string(),
            })
        }
    }

    fn remove_submission(&mut self, id: SubmissionId) -> bool {
        let Some(record) = self.submissions.remove(&id) else {
            return false;
        };
        unindex(&mut self.email_index, &email_unique_key(&record.email), id);
        unindex(&mut self.mobile_index, &mobile_unique_key(&record.mobile), id);
        unindex(&mut self.receipt_hash_index, &record.receipt_hash, id);
        true
    }

    fn index_record(&mut self, record: &SubmissionRecord) {
        self.email_index
            .entry(email_unique_key(&record.email))
            .or_default()
            .insert(record.id);
        self.mobile_index
            .entry(mobile_unique_key(&record.mobile))
            .or_default()
            .insert(record.id);
        self.receipt_hash_index
            .entry(record.receipt_hash.clone())
            .or_default()
            .insert(record.id);
    }

    // ------------------------
    // Admin accounts
    // ------------------------

    pub fn insert_admin(&mut self, account: AdminAccount) -> Result<(), StorageError> {
        if self.admins.contains_key(&account.email) {
            return Err(StorageError::DuplicateKey {
                table: "admins",
                key: account.email.as_str().to_string(),
            });
        }
        self.admins.insert(account.email.clone(), account);
        Ok(())
    }

    pub fn remove_admin(&mut self, email: &AdminEmail) -> Option<AdminAccount> {
        self.admins.remove(email)
    }

    pub fn get_admin(&self, email: &AdminEmail) -> Option<&AdminAccount> {
        self.admins.get(email)
    }

    pub fn admins(&self) -> Vec<&AdminAccount> {
        self.admins.values().collect()
    }
}

fn index_has_rows<K: Ord>(index: &IdIndex<K>, key: &K) -> bool {
    index.get(key).is_some_and(|ids| !ids.is_empty())
}

fn unindex<K: Ord + Clone>(index: &mut IdIndex<K>, key: &K, id: SubmissionId) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(&id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

fn compare_by_field(a: &SubmissionRecord, b: &SubmissionRecord, field: SortField) -> Ordering {
    match field {
        SortField::Id => a.id.cmp(&b.id),
        SortField::Name => a.name.cmp(&b.name),
        SortField::Email => a.email.cmp(&b.email),
        SortField::Mobile => a.mobile.cmp(&b.mobile),
        SortField::Emirate => a.emirate.cmp(&b.emirate),
        SortField::SubmittedAt => a.submitted_at.cmp(&b.submitted_at),
    }
}
