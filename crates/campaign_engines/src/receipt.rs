#![forbid(unsafe_code)]

use std::sync::Arc;

use campaign_kernel_contracts::submission::{ContentHash, ReceiptRef};
use campaign_storage::blob::{is_safe_object_name, BlobSink};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::IntakeError;

pub const DEFAULT_MAX_RECEIPT_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_PUBLIC_PREFIX: &str = "/uploads";
const HASH_PREFIX_LEN: usize = 16;
const SUFFIX_BYTES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptStoreConfig {
    pub max_bytes: usize,
    pub allowed_extensions: Vec<&'static str>,
    pub public_prefix: String,
}

impl ReceiptStoreConfig {
    pub fn mvp_v1() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_RECEIPT_BYTES,
            allowed_extensions: vec!["jpg", "jpeg", "png", "webp", "pdf"],
            public_prefix: DEFAULT_PUBLIC_PREFIX.to_string(),
        }
    }

    pub fn with_public_prefix(mut self, prefix: &str) -> Self {
        let trimmed = prefix.trim().trim_end_matches('/');
        self.public_prefix = if trimmed.is_empty() {
            DEFAULT_PUBLIC_PREFIX.to_string()
        } else {
            trimmed.to_string()
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReceipt {
    pub public_ref: String,
    pub content_hash: ContentHash,
    pub stored_name: String,
    pub size_bytes: u64,
}

impl StoredReceipt {
    pub fn receipt_ref(&self) -> ReceiptRef {
        ReceiptRef {
            public_ref: self.public_ref.clone(),
            content_hash: self.content_hash.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedReceipt {
    pub stored_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Validates, fingerprints and persists uploaded receipts.
#[derive(Debug, Clone)]
pub struct ReceiptStoreRuntime {
    config: ReceiptStoreConfig,
    sink: Arc<dyn BlobSink>,
}

impl ReceiptStoreRuntime {
    pub fn new(config: ReceiptStoreConfig, sink: Arc<dyn BlobSink>) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &ReceiptStoreConfig {
        &self.config
    }

    /// One write per call. Every validation runs before the sink is touched.
    pub fn store(&self, filename: &str, bytes: &[u8]) -> Result<StoredReceipt, IntakeError> {
        if bytes.is_empty() {
            return Err(IntakeError::PayloadInvalid("receipt is empty".to_string()));
        }
        if bytes.len() > self.config.max_bytes {
            return Err(IntakeError::PayloadInvalid(format!(
                "receipt exceeds {} bytes",
                self.config.max_bytes
            )));
        }
        let ext = self.allowed_extension(filename)?;

        let digest = Sha256::digest(bytes);
        let content_hash = ContentHash::new(hex::encode(digest))?;

        let mut suffix = [0u8; SUFFIX_BYTES];
        OsRng.fill_bytes(&mut suffix);
        let stored_name = format!(
            "{}-{}.{}",
            content_hash.short_prefix(HASH_PREFIX_LEN),
            hex::encode(suffix),
            ext
        );

        self.sink
            .write_once(&stored_name, bytes)
            .map_err(|err| IntakeError::StoreUnavailable(err.to_string()))?;
        info!(
            stored_name = %stored_name,
            size_bytes = bytes.len(),
            "receipt stored"
        );

        Ok(StoredReceipt {
            public_ref: format!("{}/{}", self.config.public_prefix, stored_name),
            content_hash,
            stored_name,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Reads a receipt back by the public ref handed out at intake.
    pub fn open(&self, public_ref: &str) -> Result<OpenedReceipt, IntakeError> {
        let stored_name = self
            .stored_name_from_ref(public_ref)
            .ok_or_else(|| IntakeError::NotFound(format!("receipt {public_ref}")))?;
        let content_type = stored_name
            .rsplit_once('.')
            .map(|(_, ext)| content_type_for(ext))
            .unwrap_or("application/octet-stream");
        let bytes = self.sink.read(&stored_name)?;
        debug!(stored_name = %stored_name, "receipt opened");
        Ok(OpenedReceipt {
            stored_name,
            content_type,
            bytes,
        })
    }

    fn allowed_extension(&self, filename: &str) -> Result<String, IntakeError> {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.trim().to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .ok_or_else(|| IntakeError::UnsupportedType("missing file extension".to_string()))?;
        if self.config.allowed_extensions.iter().any(|a| *a == ext) {
            Ok(ext)
        } else {
            Err(IntakeError::UnsupportedType(format!(".{ext}")))
        }
    }

    fn stored_name_from_ref(&self, public_ref: &str) -> Option<String> {
        let name = public_ref
            .strip_prefix(self.config.public_prefix.as_str())?
            .strip_prefix('/')?;
        let (stem, ext) = name.rsplit_once('.')?;
        let (hash_part, suffix_part) = stem.split_once('-')?;
        let well_formed = is_safe_object_name(name)
            && hash_part.len() == HASH_PREFIX_LEN
            && suffix_part.len() == SUFFIX_BYTES * 2
            && stem
                .chars()
                .all(|c| c == '-' || matches!(c, '0'..='9' | 'a'..='f'))
            && self.config.allowed_extensions.iter().any(|a| *a == ext);
        well_formed.then(|| name.to_string())
    }
}

fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
