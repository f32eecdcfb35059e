//! Issue assembly and submission.
//!
//! Builds the creation payload from a parsed request plus configured
//! defaults, submits it, and on success uploads the staged attachments.
//! Side-effect order is fixed: create issue, then uploads; a failed upload
//! never revokes a created issue.

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::attachments::StagedBatch;
use crate::config::JiraConfig;
use crate::dates::{canonical, normalize_due_date};
use crate::error::BridgeError;
use crate::jira::{IssuePayload, JiraClient};
use crate::parser::{ParsedRequest, EMPTY_CONTENT_PLACEHOLDER};

const DEFAULT_DUE_DAYS: i64 = 7;

#[derive(Debug)]
pub struct IssueSubmitter {
    client: JiraClient,
    config: JiraConfig,
}

impl IssueSubmitter {
    pub fn new(client: JiraClient, config: JiraConfig) -> Self {
        Self { client, config }
    }

    /// Create an issue for one message and return its key.
    pub fn submit(
        &self,
        subject: &str,
        request: &ParsedRequest,
        received_at: DateTime<Utc>,
        staged: &StagedBatch,
    ) -> Result<String, BridgeError> {
        let payload = self.build_payload(subject, request, staged);
        info!(
            "creating issue in {} for message received {} (summary '{}')",
            payload.project_key,
            received_at.format("%Y-%m-%d %H:%M:%S"),
            subject
        );

        let issue_key = self.client.create_issue(&payload)?;
        info!("created issue {}", issue_key);

        if !staged.is_empty() {
            let mut uploaded = 0usize;
            for attachment in &staged.files {
                match self.client.upload_attachment(&issue_key, attachment) {
                    Ok(()) => uploaded += 1,
                    Err(err) => {
                        error!(
                            "upload of '{}' to {} failed: {}",
                            attachment.original_name, issue_key, err
                        );
                    }
                }
            }
            if uploaded == 0 {
                warn!("no attachments uploaded to {}", issue_key);
            } else {
                info!(
                    "uploaded {}/{} attachments to {}",
                    uploaded,
                    staged.files.len(),
                    issue_key
                );
            }
        }

        Ok(issue_key)
    }

    pub(crate) fn build_payload(
        &self,
        subject: &str,
        request: &ParsedRequest,
        staged: &StagedBatch,
    ) -> IssuePayload {
        let project_key = request
            .project
            .clone()
            .unwrap_or_else(|| self.config.project.clone());
        let today = Utc::now().date_naive();

        let due_date = match &request.due_date {
            Some(raw) => normalize_due_date(raw)
                .map(canonical)
                .unwrap_or_else(|| raw.clone()),
            None => canonical(today + Duration::days(DEFAULT_DUE_DAYS)),
        };

        IssuePayload {
            project_key,
            summary: subject.to_string(),
            description: build_description(request, staged),
            // The header's issue-type field is accepted but not mapped to
            // an id; creation always uses the configured default.
            issue_type_id: self.config.issue_type_id.clone(),
            assignee: request.assignee.clone(),
            start_date: canonical(today),
            due_date,
            completion_criteria: self.config.default_completion_criteria.clone(),
            department: self.config.default_department.clone(),
            module: self.config.default_module.clone(),
            category: self.config.default_category.clone(),
        }
    }
}

pub(crate) fn build_description(request: &ParsedRequest, staged: &StagedBatch) -> String {
    let mut description = String::new();

    if let Some(raw) = &request.due_date {
        let display = normalize_due_date(raw)
            .map(canonical)
            .unwrap_or_else(|| raw.clone());
        description.push_str(&format!("📅 完成时间: {}\n\n", display));
    }

    if request.content.trim().is_empty() {
        description.push_str(EMPTY_CONTENT_PLACEHOLDER);
    } else {
        description.push_str(&request.content);
    }

    if !staged.is_empty() {
        description.push_str("\n\n📎 附件列表:\n");
        for attachment in &staged.files {
            description.push_str(&format!(
                "- {} ({})\n",
                attachment.original_name,
                format_size(attachment.size)
            ));
        }
    }

    description
}

pub(crate) fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes < KIB {
        format!("{} B", bytes)
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    }
}
