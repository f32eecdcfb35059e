//! Attachment staging.
//!
//! Attachments that pass the configured policy are copied into a scratch
//! directory unique to the message being processed. The scratch tree lives
//! only for the duration of one issue-creation attempt; [`StagedBatch`]
//! guarantees it is removed exactly once afterwards.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AttachmentConfig;
use crate::error::BridgeError;
use crate::mailbox::MailAttachment;

const SAFE_STEM_MAX_CHARS: usize = 90;

#[derive(Debug, Clone)]
pub struct StagedAttachment {
    pub original_name: String,
    pub safe_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub content_type: String,
}

/// Staged files plus the scratch directory that owns them.
#[derive(Debug, Default)]
pub struct StagedBatch {
    scratch_dir: Option<PathBuf>,
    pub files: Vec<StagedAttachment>,
}

impl StagedBatch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Recursively delete the scratch directory. Safe to call more than
    /// once; only the first call touches the filesystem.
    pub fn cleanup(&mut self) {
        if let Some(dir) = self.scratch_dir.take() {
            self.files.clear();
            if let Err(err) = std::fs::remove_dir_all(&dir) {
                warn!("failed to remove scratch dir {}: {}", dir.display(), err);
            } else {
                debug!("removed scratch dir {}", dir.display());
            }
        }
    }
}

impl Drop for StagedBatch {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[derive(Debug)]
pub struct AttachmentStager {
    config: AttachmentConfig,
}

impl AttachmentStager {
    pub fn new(config: AttachmentConfig) -> Self {
        Self { config }
    }

    /// Stage a message's attachments under a fresh scratch subdirectory.
    ///
    /// Per-file policy violations (extension, size) skip the file and keep
    /// going; only scratch-directory creation errors fail the batch.
    pub fn stage(
        &self,
        message_id: &str,
        attachments: &[MailAttachment],
    ) -> Result<StagedBatch, BridgeError> {
        if !self.config.enabled || attachments.is_empty() {
            return Ok(StagedBatch::empty());
        }

        if attachments.len() > self.config.max_count {
            warn!(
                "message {} has {} attachments, staging only the first {}",
                message_id,
                attachments.len(),
                self.config.max_count
            );
        }

        let scratch_dir = self
            .config
            .temp_dir
            .join(format!("msg_{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&scratch_dir)?;

        let max_bytes = self.config.max_size_mb * 1024 * 1024;
        let mut files = Vec::new();

        for attachment in attachments.iter().take(self.config.max_count) {
            let size = attachment.data.len() as u64;
            if !self.extension_allowed(&attachment.file_name) {
                warn!(
                    "skipping attachment '{}': extension not allowed",
                    attachment.file_name
                );
                continue;
            }
            if size > max_bytes {
                warn!(
                    "skipping attachment '{}': {} bytes exceeds {} MB limit",
                    attachment.file_name, size, self.config.max_size_mb
                );
                continue;
            }

            let base_name = sanitize_file_name(&attachment.file_name);
            let mut safe_name = base_name.clone();
            let mut path = scratch_dir.join(&safe_name);
            let mut attempt = 1u32;
            while path.exists() {
                safe_name = with_counter(&base_name, attempt);
                path = scratch_dir.join(&safe_name);
                attempt += 1;
            }
            if let Err(err) = std::fs::write(&path, &attachment.data) {
                warn!(
                    "skipping attachment '{}': write failed: {}",
                    attachment.file_name, err
                );
                continue;
            }
            if !path.exists() {
                warn!(
                    "skipping attachment '{}': staged file missing after write",
                    attachment.file_name
                );
                continue;
            }

            files.push(StagedAttachment {
                original_name: attachment.file_name.clone(),
                safe_name,
                path,
                size,
                content_type: attachment.content_type.clone(),
            });
        }

        debug!(
            "staged {}/{} attachments for message {} under {}",
            files.len(),
            attachments.len(),
            message_id,
            scratch_dir.display()
        );

        Ok(StagedBatch {
            scratch_dir: Some(scratch_dir),
            files,
        })
    }

    fn extension_allowed(&self, file_name: &str) -> bool {
        let extension = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
                format!(".{}", ext.to_ascii_lowercase())
            }
            _ => return false,
        };
        self.config
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
    }
}

/// Replace unsafe characters, cap the stem length, and append a timestamp
/// suffix so repeated filenames within one batch stay unique.
pub fn sanitize_file_name(name: &str) -> String {
    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            (stem, Some(ext.to_ascii_lowercase()))
        }
        _ => (name, None),
    };

    let safe_stem: String = stem
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, '.' | '-' | '_' | '(' | ')' | '[' | ']') {
                ch
            } else {
                '_'
            }
        })
        .take(SAFE_STEM_MAX_CHARS)
        .collect();
    let safe_stem = if safe_stem.is_empty() {
        "attachment".to_string()
    } else {
        safe_stem
    };

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0);

    match extension {
        Some(ext) => format!("{}_{}.{}", safe_stem, millis, ext),
        None => format!("{}_{}", safe_stem, millis),
    }
}

/// `report_17.pdf` -> `report_17_2.pdf` when the first choice is taken.
fn with_counter(name: &str, counter: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, counter, ext),
        None => format!("{}_{}", name, counter),
    }
}
