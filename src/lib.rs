pub mod attachments;
pub mod config;
pub mod dates;
pub mod error;
pub mod jira;
pub mod ledger;
pub mod mailbox;
pub mod monitor;
pub mod parser;
pub mod spool;
pub mod submitter;

pub use attachments::{AttachmentStager, StagedAttachment, StagedBatch};
pub use config::{resolve_config_path, AttachmentConfig, BridgeConfig, JiraConfig, MonitorConfig};
pub use error::BridgeError;
pub use jira::{IssuePayload, JiraClient};
pub use ledger::ProcessedLedger;
pub use mailbox::{MailAttachment, MailMessage, MailboxProvider};
pub use monitor::MailMonitor;
pub use parser::{ParsedRequest, RequestParser};
pub use submitter::IssueSubmitter;
