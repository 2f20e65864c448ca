#![forbid(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use campaign_kernel_contracts::admin::AdminAccount;
use campaign_kernel_contracts::submission::{SubmissionId, SubmissionRecord};
use serde::{Deserialize, Serialize};

const JOURNAL_SCHEMA_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalEvent {
    SubmissionCreated { record: SubmissionRecord },
    SubmissionsDeleted { ids: Vec<SubmissionId> },
    AdminCreated { account: AdminAccount },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalEntry {
    schema_version: u8,
    #[serde(flatten)]
    event: JournalEvent,
}

/// Append-only JSON-lines log of store mutations.
#[derive(Debug, Clone)]
pub struct IntakeJournal {
    path: PathBuf,
}

impl IntakeJournal {
    /// Creates the file and its parent directory when missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, String> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "failed to create journal directory '{}': {}",
                    parent.display(),
                    err
                )
            })?;
        }
        if !path.exists() {
            File::create(&path).map_err(|err| {
                format!("failed to create journal '{}': {}", path.display(), err)
            })?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_all(&self) -> Result<Vec<JournalEvent>, String> {
        let file = File::open(&self.path).map_err(|err| {
            format!("failed to open journal '{}': {}", self.path.display(), err)
        })?;
        let mut events = Vec::new();
        for (line_no, line_result) in BufReader::new(file).lines().enumerate() {
            let line = line_result.map_err(|err| {
                format!(
                    "failed reading journal '{}' at line {}: {}",
                    self.path.display(),
                    line_no + 1,
                    err
                )
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: JournalEntry = serde_json::from_str(&line).map_err(|err| {
                format!(
                    "failed parsing journal '{}' at line {}: {}",
                    self.path.display(),
                    line_no + 1,
                    err
                )
            })?;
            if entry.schema_version != JOURNAL_SCHEMA_VERSION {
                return Err(format!(
                    "unsupported journal schema_version={} at line {}",
                    entry.schema_version,
                    line_no + 1
                ));
            }
            events.push(entry.event);
        }
        Ok(events)
    }

    pub fn append(&self, event: &JournalEvent) -> Result<(), String> {
        let entry = JournalEntry {
            schema_version: JOURNAL_SCHEMA_VERSION,
            event: event.clone(),
        };
        let json = serde_json::to_string(&entry)
            .map_err(|err| format!("failed to encode journal entry: {err}"))?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|err| {
                format!(
                    "failed opening journal '{}' for append: {}",
                    self.path.display(),
                    err
                )
            })?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.sync_data())
            .map_err(|err| format!("failed writing journal '{}': {}", self.path.display(), err))
    }
}
