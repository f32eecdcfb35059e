//! Persisted record of processed message identifiers.
//!
//! The ledger is written after every poll cycle that processed at least one
//! message. It is a best-effort audit record: eligibility is decided by the
//! provider's unread flag plus the trigger filter, not by ledger membership.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::error;

use crate::error::BridgeError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    processed_emails: Vec<String>,
}

#[derive(Debug)]
pub struct ProcessedLedger {
    path: PathBuf,
    ids: HashSet<String>,
}

impl ProcessedLedger {
    /// Load the ledger from disk. A missing file is an empty ledger; a
    /// corrupt file is logged and treated as empty.
    pub fn load(path: &Path) -> Self {
        let ids = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<LedgerFile>(&content) {
                Ok(file) => file.processed_emails.into_iter().collect(),
                Err(err) => {
                    error!(
                        "corrupt ledger at {}, starting empty: {}",
                        path.display(),
                        err
                    );
                    HashSet::new()
                }
            },
            Err(_) => HashSet::new(),
        };
        Self {
            path: path.to_path_buf(),
            ids,
        }
    }

    pub fn insert(&mut self, message_id: &str) {
        self.ids.insert(message_id.to_string());
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.ids.contains(message_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Idempotent full rewrite of the ledger file.
    pub fn save(&self) -> Result<(), BridgeError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut processed_emails: Vec<String> = self.ids.iter().cloned().collect();
        processed_emails.sort();
        let file = LedgerFile { processed_emails };
        std::fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}
