//! Jira REST client (issue creation, attachment upload, connectivity).

use std::time::Duration;

use reqwest::blocking::multipart;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::attachments::StagedAttachment;
use crate::config::JiraConfig;
use crate::error::BridgeError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Custom field carrying the planned start date.
const FIELD_START_DATE: &str = "customfield_10015";
const FIELD_COMPLETION_CRITERIA: &str = "customfield_10101";
const FIELD_DEPARTMENT: &str = "customfield_10102";
const FIELD_MODULE: &str = "customfield_10103";
const FIELD_CATEGORY: &str = "customfield_10104";

#[derive(Debug, Clone)]
pub struct IssuePayload {
    pub project_key: String,
    pub summary: String,
    pub description: String,
    pub issue_type_id: String,
    pub assignee: Option<String>,
    pub start_date: String,
    pub due_date: String,
    pub completion_criteria: String,
    pub department: String,
    pub module: String,
    pub category: String,
}

impl IssuePayload {
    pub fn to_json(&self) -> Value {
        let mut fields = serde_json::Map::new();
        fields.insert("project".to_string(), json!({ "key": self.project_key }));
        fields.insert("summary".to_string(), json!(self.summary));
        fields.insert("description".to_string(), json!(self.description));
        fields.insert("issuetype".to_string(), json!({ "id": self.issue_type_id }));
        if let Some(assignee) = &self.assignee {
            fields.insert("assignee".to_string(), json!({ "name": assignee }));
        }
        fields.insert("duedate".to_string(), json!(self.due_date));
        fields.insert(FIELD_START_DATE.to_string(), json!(self.start_date));
        fields.insert(
            FIELD_COMPLETION_CRITERIA.to_string(),
            json!(self.completion_criteria),
        );
        fields.insert(FIELD_DEPARTMENT.to_string(), json!(self.department));
        fields.insert(FIELD_MODULE.to_string(), json!(self.module));
        fields.insert(FIELD_CATEGORY.to_string(), json!(self.category));
        json!({ "fields": Value::Object(fields) })
    }
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    base_url: String,
    username: String,
    password: String,
    client: reqwest::blocking::Client,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> Result<Self, BridgeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Startup probe: the account and the default project must both be
    /// reachable before monitoring starts.
    pub fn verify_connection(&self, project_key: &str) -> Result<(), BridgeError> {
        let myself = self
            .client
            .get(self.url("/rest/api/2/myself"))
            .basic_auth(&self.username, Some(&self.password))
            .send()?;
        if !myself.status().is_success() {
            return Err(BridgeError::Connectivity(format!(
                "GET /rest/api/2/myself returned {}",
                myself.status()
            )));
        }

        let project = self
            .client
            .get(self.url(&format!("/rest/api/2/project/{}", project_key)))
            .basic_auth(&self.username, Some(&self.password))
            .send()?;
        if !project.status().is_success() {
            return Err(BridgeError::Connectivity(format!(
                "project '{}' not reachable: {}",
                project_key,
                project.status()
            )));
        }

        info!("jira connection verified for project {}", project_key);
        Ok(())
    }

    /// Create an issue and return its external key (e.g. `PROJ-42`).
    ///
    /// Any non-201 response is logged together with the field-level
    /// validation messages Jira puts under `errors`, then surfaced as
    /// [`BridgeError::IssueRejected`].
    pub fn create_issue(&self, payload: &IssuePayload) -> Result<String, BridgeError> {
        let response = self
            .client
            .post(self.url("/rest/api/2/issue"))
            .basic_auth(&self.username, Some(&self.password))
            .json(&payload.to_json())
            .send()?;

        let status = response.status();
        let body = response.text().unwrap_or_default();

        if status != StatusCode::CREATED {
            error!("issue creation failed with status {}: {}", status, body);
            if let Ok(value) = serde_json::from_str::<Value>(&body) {
                if let Some(errors) = value.get("errors").and_then(Value::as_object) {
                    for (field, message) in errors {
                        error!("jira field error: {}: {}", field, message);
                    }
                }
            }
            return Err(BridgeError::IssueRejected {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = serde_json::from_str(&body)?;
        match value.get("key").and_then(Value::as_str) {
            Some(key) => Ok(key.to_string()),
            None => Err(BridgeError::IssueRejected {
                status: status.as_u16(),
                body,
            }),
        }
    }

    /// Upload one staged file to an existing issue.
    pub fn upload_attachment(
        &self,
        issue_key: &str,
        staged: &StagedAttachment,
    ) -> Result<(), BridgeError> {
        let data = std::fs::read(&staged.path)?;
        let part = multipart::Part::bytes(data)
            .file_name(staged.safe_name.clone())
            .mime_str(&staged.content_type)?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url(&format!("/rest/api/2/issue/{}/attachments", issue_key)))
            .basic_auth(&self.username, Some(&self.password))
            .header("X-Atlassian-Token", "no-check")
            .multipart(form)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(
                "attachment upload for {} ('{}') failed with {}: {}",
                issue_key, staged.original_name, status, body
            );
            return Err(BridgeError::IssueRejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
