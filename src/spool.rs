//! Filesystem spool mailbox.
//!
//! A thin [`MailboxProvider`] over a directory of JSON message files, one
//! file per message. An upstream gateway (or a human, for testing) drops
//! payloads into the spool; marking a message read moves its file into the
//! `processed/` subdirectory. Attachment content is base64 in the payload.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::BridgeError;
use crate::mailbox::{MailAttachment, MailMessage, MailboxProvider};

const PROCESSED_DIR: &str = "processed";

#[derive(Debug, Deserialize)]
struct SpoolPayload {
    #[serde(default)]
    from: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    attachments: Vec<SpoolAttachment>,
}

#[derive(Debug, Deserialize)]
struct SpoolAttachment {
    name: String,
    #[serde(default = "default_content_type")]
    content_type: String,
    /// Base64-encoded file content.
    #[serde(default)]
    content: String,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

#[derive(Debug)]
pub struct SpoolMailbox {
    root: PathBuf,
}

impl SpoolMailbox {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, BridgeError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        std::fs::create_dir_all(root.join(PROCESSED_DIR))?;
        Ok(Self { root })
    }

    fn message_path(&self, message_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", message_id))
    }

    fn read_message(&self, path: &Path) -> Option<MailMessage> {
        let id = path.file_stem()?.to_str()?.to_string();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("unreadable spool file {}: {}", path.display(), err);
                return None;
            }
        };
        let payload: SpoolPayload = match serde_json::from_str(&raw) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("malformed spool file {}: {}", path.display(), err);
                return None;
            }
        };

        let received_at = payload
            .received_at
            .or_else(|| file_modified_time(path))
            .unwrap_or_else(Utc::now);

        let attachments = payload
            .attachments
            .into_iter()
            .filter_map(|attachment| {
                match BASE64_STANDARD.decode(attachment.content.as_bytes()) {
                    Ok(data) => Some(MailAttachment {
                        file_name: attachment.name,
                        content_type: attachment.content_type,
                        data,
                    }),
                    Err(err) => {
                        warn!(
                            "dropping attachment '{}' in {}: bad base64: {}",
                            attachment.name,
                            path.display(),
                            err
                        );
                        None
                    }
                }
            })
            .collect();

        Some(MailMessage {
            id,
            sender: payload.from,
            subject: payload.subject,
            body: payload.body,
            received_at,
            unread: true,
            attachments,
        })
    }
}

impl MailboxProvider for SpoolMailbox {
    fn list_unread(&self) -> Result<Vec<MailMessage>, BridgeError> {
        let mut messages = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(message) = self.read_message(&path) {
                messages.push(message);
            }
        }
        Ok(messages)
    }

    fn mark_read(&self, message_id: &str) -> Result<(), BridgeError> {
        let from = self.message_path(message_id);
        let to = self
            .root
            .join(PROCESSED_DIR)
            .join(format!("{}.json", message_id));
        std::fs::rename(&from, &to).map_err(|err| {
            BridgeError::Mailbox(format!(
                "failed to move {} to processed: {}",
                from.display(),
                err
            ))
        })
    }
}

fn file_modified_time(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}
