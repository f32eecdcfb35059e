//! Abstract mailbox provider.
//!
//! The bridge does not own a mail transport; anything that can list unread
//! messages and flip their read flag can drive the monitor loop.

use chrono::{DateTime, Utc};

use crate::error::BridgeError;

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub unread: bool,
    pub attachments: Vec<MailAttachment>,
}

#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

pub trait MailboxProvider {
    /// List unread messages. Order is provider-defined; the monitor sorts
    /// by received time descending before processing.
    fn list_unread(&self) -> Result<Vec<MailMessage>, BridgeError>;

    /// Mark a message as read so it is not returned by later scans.
    fn mark_read(&self, message_id: &str) -> Result<(), BridgeError>;
}
