#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use campaign_engines::access::AdminAccessRuntime;
use campaign_engines::analytics::compute_snapshot;
use campaign_engines::credential::{AccessGrant, CredentialSigner};
use campaign_engines::ledger::{LedgerConfig, SubmissionLedgerRuntime};
use campaign_engines::notify::{CodeNotifier, LogNotifier, SendGridNotifier};
use campaign_engines::otp::{OtpChallengeManager, OtpConfig, PendingCode};
use campaign_engines::receipt::{OpenedReceipt, ReceiptStoreConfig, ReceiptStoreRuntime};
use campaign_engines::winner::pick_winner;
use campaign_engines::IntakeError;
use campaign_kernel_contracts::admin::{AdminAccount, AdminRole};
use campaign_kernel_contracts::analytics::AggregationSnapshot;
use campaign_kernel_contracts::submission::{
    ListQuery, SubmissionId, SubmissionInput, SubmissionRecord,
};
use campaign_storage::blob::{BlobSink, LocalFsBlobSink};
use campaign_storage::challenge_cache::InMemoryChallengeCache;
use campaign_storage::IntakeStore;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub mod config;
pub mod http;
pub mod journal;

use config::IntakeConfig;
use journal::{IntakeJournal, JournalEvent};

/// Multipart intake payload after field extraction.
#[derive(Debug, Clone, Default)]
pub struct SubmissionForm {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub emirates_id: String,
    pub emirate: String,
    pub receipt_filename: String,
    pub receipt_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionView {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub emirates_id: String,
    pub emirate: String,
    pub receipt_url: String,
    pub submitted_at: DateTime<Utc>,
}

impl From<&SubmissionRecord> for SubmissionView {
    fn from(record: &SubmissionRecord) -> Self {
        Self {
            id: record.id.0,
            name: record.name.clone(),
            email: record.email.clone(),
            mobile: record.mobile.clone(),
            emirates_id: record.emirates_id.clone(),
            emirate: record.emirate.clone(),
            receipt_url: record.receipt_url.clone(),
            submitted_at: record.submitted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionAcceptedResponse {
    #[serde(flatten)]
    pub submission: SubmissionView,
    pub duplicate_receipt: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionPageResponse {
    pub items: Vec<SubmissionView>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminView {
    pub email: String,
    pub role: AdminRole,
    pub is_active: bool,
}

impl From<&AdminAccount> for AdminView {
    fn from(account: &AdminAccount) -> Self {
        Self {
            email: account.email.as_str().to_string(),
            role: account.role,
            is_active: account.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterHealthResponse {
    pub status: &'static str,
    pub submissions: u64,
    pub admins: usize,
    pub journal_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteIdsRequest {
    pub ids: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestOtpRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAdminRequest {
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Owns the row store and every engine. Callers serialize access through one
/// mutex so each operation sees and leaves a consistent store.
#[derive(Debug)]
pub struct AdapterRuntime {
    store: IntakeStore,
    ledger: SubmissionLedgerRuntime,
    receipts: ReceiptStoreRuntime,
    access: AdminAccessRuntime,
    journal: Option<IntakeJournal>,
}

impl AdapterRuntime {
    pub fn new(
        config: &IntakeConfig,
        sink: Arc<dyn BlobSink>,
        notifier: Arc<dyn CodeNotifier>,
    ) -> Result<Self, String> {
        let receipts = ReceiptStoreRuntime::new(
            ReceiptStoreConfig::mvp_v1().with_public_prefix(&config.public_upload_prefix),
            sink,
        );
        let otp = OtpChallengeManager::new(
            OtpConfig {
                ttl: Duration::seconds(config.otp_ttl_seconds),
            },
            Arc::new(InMemoryChallengeCache::new()),
            notifier,
        );
        let signer = CredentialSigner::new(&config.token_secret, config.token_ttl_minutes)
            .map_err(|err| err.to_string())?;
        let journal = config
            .store_path
            .as_ref()
            .map(IntakeJournal::open)
            .transpose()?;

        let mut runtime = Self {
            store: IntakeStore::new_in_memory(),
            ledger: SubmissionLedgerRuntime::new(LedgerConfig {
                uniqueness: config.uniqueness,
            }),
            receipts,
            access: AdminAccessRuntime::new(otp, signer),
            journal,
        };
        runtime.replay_journal_into_store()?;
        runtime
            .access
            .bootstrap_global_admin(&mut runtime.store, config.global_admin_email.as_str())
            .map_err(|err| format!("global admin bootstrap failed: {err}"))?;
        Ok(runtime)
    }

    /// Filesystem receipts, plus SendGrid delivery when a key is configured.
    pub fn from_config(config: &IntakeConfig) -> Result<Self, String> {
        let sink = LocalFsBlobSink::new(&config.upload_dir).map_err(|err| err.to_string())?;
        let notifier: Arc<dyn CodeNotifier> = match &config.sendgrid {
            Some(settings) => Arc::new(SendGridNotifier::new(
                settings.api_key.clone(),
                settings.from_address.clone(),
            )),
            None => Arc::new(LogNotifier),
        };
        Self::new(config, Arc::new(sink), notifier)
    }

    pub fn submit(
        &mut self,
        form: SubmissionForm,
        now: DateTime<Utc>,
    ) -> Result<SubmissionAcceptedResponse, IntakeError> {
        let input = SubmissionInput::v1(
            form.name,
            form.email,
            form.mobile,
            form.emirates_id,
            form.emirate,
        )?;
        let stored = self
            .receipts
            .store(&form.receipt_filename, &form.receipt_bytes)?;
        let cursor = self.store.insert_cursor();
        let outcome = self
            .ledger
            .create(&mut self.store, input, stored.receipt_ref(), now)?;

        let event = JournalEvent::SubmissionCreated {
            record: outcome.record.clone(),
        };
        if let Err(reason) = self.append_journal(&event) {
            if let Err(err) = self.store.rewind_insert(outcome.record.id, cursor) {
                error!(submission_id = outcome.record.id.0, error = %err, "insert rollback failed");
            }
            return Err(IntakeError::StoreUnavailable(reason));
        }
        Ok(SubmissionAcceptedResponse {
            submission: SubmissionView::from(&outcome.record),
            duplicate_receipt: outcome.duplicate_receipt,
        })
    }

    pub fn list_submissions(&self, query: &ListQuery) -> SubmissionPageResponse {
        let page = self.ledger.list(&self.store, query);
        SubmissionPageResponse {
            items: page.items.iter().map(SubmissionView::from).collect(),
            total: page.total,
        }
    }

    pub fn delete_submissions(&mut self, ids: &[u64]) -> Result<DeletedResponse, IntakeError> {
        let ids: BTreeSet<SubmissionId> = ids.iter().copied().map(SubmissionId).collect();
        let removed = self.snapshot_rows(&ids);
        let deleted = self.ledger.delete_many(&mut self.store, &ids)?;
        if deleted > 0 {
            let event = JournalEvent::SubmissionsDeleted {
                ids: removed.iter().map(|record| record.id).collect(),
            };
            if let Err(reason) = self.append_journal(&event) {
                self.restore_rows(removed);
                return Err(IntakeError::StoreUnavailable(reason));
            }
        }
        Ok(DeletedResponse { deleted })
    }

    pub fn delete_submission(&mut self, id: u64) -> Result<DeletedResponse, IntakeError> {
        let id = SubmissionId(id);
        let removed = self.snapshot_rows(&BTreeSet::from([id]));
        let deleted = self.ledger.delete_one(&mut self.store, id)?;
        if let Err(reason) = self.append_journal(&JournalEvent::SubmissionsDeleted { ids: vec![id] }) {
            self.restore_rows(removed);
            return Err(IntakeError::StoreUnavailable(reason));
        }
        Ok(DeletedResponse { deleted })
    }

    pub fn open_receipt(&self, id: u64) -> Result<OpenedReceipt, IntakeError> {
        let record = self
            .store
            .get_submission(SubmissionId(id))
            .ok_or_else(|| IntakeError::NotFound(format!("submission {id}")))?;
        self.receipts.open(&record.receipt_url)
    }

    pub fn dashboard_stats(&self) -> AggregationSnapshot {
        compute_snapshot(self.store.submissions())
    }

    pub fn generate_winner<G: Rng + ?Sized>(
        &self,
        rng: &mut G,
    ) -> Result<SubmissionView, IntakeError> {
        pick_winner(&self.store, rng)
            .map(|record| SubmissionView::from(&record))
            .ok_or_else(|| {
                IntakeError::NotFound("no submissions to select a winner from".to_string())
            })
    }

    /// The uniform acknowledgement plus, for an active admin, a code that
    /// still has to be sent. Deliver it after releasing the runtime lock.
    pub fn request_otp(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> (MessageResponse, Option<PendingCode>) {
        let request = self.access.request_code(&self.store, email, now);
        let message = MessageResponse {
            message: request.ack.to_string(),
        };
        (message, request.pending)
    }

    pub fn verify_otp(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessGrant, IntakeError> {
        self.access.verify_code(&self.store, email, code, now)
    }

    pub fn authenticate(&self, bearer: &str, now: DateTime<Utc>) -> Result<AdminAccount, IntakeError> {
        self.access.authenticate(&self.store, bearer, now)
    }

    pub fn create_admin(
        &mut self,
        actor: &AdminAccount,
        email: &str,
        role: Option<&str>,
    ) -> Result<AdminView, IntakeError> {
        let role = match role {
            None => AdminRole::Standard,
            Some(raw) => AdminRole::parse(raw)
                .ok_or_else(|| IntakeError::PayloadInvalid(format!("unknown role '{raw}'")))?,
        };
        let account = self
            .access
            .create_admin(&mut self.store, actor, email, role)?;
        let event = JournalEvent::AdminCreated {
            account: account.clone(),
        };
        if let Err(reason) = self.append_journal(&event) {
            if self.store.remove_admin(&account.email).is_none() {
                error!(admin = account.email.as_str(), "admin rollback found no row");
            }
            return Err(IntakeError::StoreUnavailable(reason));
        }
        Ok(AdminView::from(&account))
    }

    pub fn health_report(&self) -> AdapterHealthResponse {
        AdapterHealthResponse {
            status: "ok",
            submissions: self.store.submission_count(),
            admins: self.store.admins().len(),
            journal_enabled: self.journal.is_some(),
        }
    }

    fn snapshot_rows(&self, ids: &BTreeSet<SubmissionId>) -> Vec<SubmissionRecord> {
        ids.iter()
            .filter_map(|id| self.store.get_submission(*id).cloned())
            .collect()
    }

    /// Puts back rows removed by a mutation whose journal append failed.
    fn restore_rows(&mut self, rows: Vec<SubmissionRecord>) {
        for record in rows {
            let id = record.id;
            if let Err(err) = self.store.restore_submission(record) {
                error!(submission_id = id.0, error = %err, "delete rollback failed");
            }
        }
    }

    fn append_journal(&self, event: &JournalEvent) -> Result<(), String> {
        let Some(journal) = self.journal.as_ref() else {
            return Ok(());
        };
        journal.append(event).map_err(|reason| {
            error!(%reason, "journal append failed");
            reason
        })
    }

    fn replay_journal_into_store(&mut self) -> Result<(), String> {
        let Some(journal) = self.journal.as_ref() else {
            return Ok(());
        };
        let events = journal.read_all()?;
        let replayed = events.len();
        for (index, event) in events.into_iter().enumerate() {
            let applied = match event {
                JournalEvent::SubmissionCreated { record } => {
                    self.store.restore_submission(record).map(|_| ())
                }
                JournalEvent::SubmissionsDeleted { ids } => {
                    self.store
                        .delete_submissions(&ids.into_iter().collect::<BTreeSet<_>>());
                    Ok(())
                }
                JournalEvent::AdminCreated { account } => self.store.insert_admin(account),
            };
            applied
                .map_err(|err| format!("journal replay failed at entry {}: {}", index + 1, err))?;
        }
        info!(
            events = replayed,
            submissions = self.store.submission_count(),
            "journal replayed"
        );
        Ok(())
    }
}
