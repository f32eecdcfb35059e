use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use mockito::{Matcher, Server, ServerGuard};
use tempfile::TempDir;

use jira_bridge::{
    AttachmentConfig, AttachmentStager, BridgeError, IssueSubmitter, JiraClient, JiraConfig,
    MailAttachment, MailMessage, MailMonitor, MailboxProvider, MonitorConfig, ProcessedLedger,
};

#[derive(Clone, Default)]
struct TestMailbox {
    messages: Arc<Mutex<Vec<MailMessage>>>,
    read: Arc<Mutex<Vec<String>>>,
}

impl TestMailbox {
    fn push(&self, message: MailMessage) {
        self.messages.lock().unwrap().push(message);
    }

    fn read_ids(&self) -> Vec<String> {
        self.read.lock().unwrap().clone()
    }
}

impl MailboxProvider for TestMailbox {
    fn list_unread(&self) -> Result<Vec<MailMessage>, BridgeError> {
        Ok(self.messages.lock().unwrap().clone())
    }

    fn mark_read(&self, message_id: &str) -> Result<(), BridgeError> {
        self.read.lock().unwrap().push(message_id.to_string());
        self.messages
            .lock()
            .unwrap()
            .retain(|message| message.id != message_id);
        Ok(())
    }
}

fn message(id: &str, subject: &str, body: &str) -> MailMessage {
    MailMessage {
        id: id.to_string(),
        sender: "alice@example.com".to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        received_at: Utc.with_ymd_and_hms(2025, 12, 1, 9, 0, 0).unwrap(),
        unread: true,
        attachments: Vec::new(),
    }
}

fn build_monitor(
    server: &ServerGuard,
    mailbox: TestMailbox,
    temp: &TempDir,
    attachments: AttachmentConfig,
) -> MailMonitor<TestMailbox> {
    let jira = JiraConfig {
        base_url: server.url(),
        username: "bot".to_string(),
        password: "secret".to_string(),
        project: "FALLBACK".to_string(),
        issue_type_id: "10004".to_string(),
        default_completion_criteria: "criteria".to_string(),
        default_department: "dept".to_string(),
        default_module: "module".to_string(),
        default_category: "category".to_string(),
    };
    let client = JiraClient::new(&jira).expect("client");
    let submitter = IssueSubmitter::new(client, jira);
    let stager = AttachmentStager::new(attachments);
    let monitor_config = MonitorConfig {
        check_interval: 1,
        mark_as_read: true,
        ledger_path: temp.path().join("ledger.json"),
    };
    let ledger = ProcessedLedger::load(&monitor_config.ledger_path);
    MailMonitor::new(mailbox, submitter, stager, ledger, &monitor_config)
}

fn attachments_config(temp: &TempDir) -> AttachmentConfig {
    AttachmentConfig {
        enabled: true,
        temp_dir: temp.path().join("scratch"),
        max_size_mb: 5,
        max_count: 5,
        allowed_extensions: vec![".txt".to_string(), ".pdf".to_string()],
    }
}

#[test]
fn trigger_message_becomes_issue_with_header_fields() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let create = server
        .mock("POST", "/rest/api/2/issue")
        .match_body(Matcher::AllOf(vec![
            // Project comes from the header, not the configured fallback.
            Matcher::Regex(r#""project":\{"key":"PROJ"\}"#.to_string()),
            Matcher::Regex(r#""name":"alice""#.to_string()),
            Matcher::Regex("完成时间: 2025-12-31".to_string()),
            Matcher::Regex("Server crashes on login".to_string()),
            Matcher::Regex("Login broken".to_string()),
        ]))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"1","key":"PROJ-7"}"#)
        .expect(1)
        .create();

    let temp = TempDir::new()?;
    let mailbox = TestMailbox::default();
    mailbox.push(message(
        "msg-1",
        "Login broken",
        "@jira@PROJ@alice@Bug@2025-12-31\n##Server crashes on login##",
    ));
    mailbox.push(message("msg-2", "chatter", "no trigger here"));

    let mut monitor = build_monitor(&server, mailbox.clone(), &temp, attachments_config(&temp));
    let processed = monitor.poll_once()?;

    assert_eq!(processed, 1);
    assert_eq!(mailbox.read_ids(), vec!["msg-1".to_string()]);

    let ledger_raw = std::fs::read_to_string(temp.path().join("ledger.json"))?;
    let ledger_json: serde_json::Value = serde_json::from_str(&ledger_raw)?;
    assert_eq!(ledger_json["processed_emails"][0], "msg-1");

    create.assert();
    Ok(())
}

#[test]
fn degraded_header_falls_back_to_configured_project() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let create = server
        .mock("POST", "/rest/api/2/issue")
        .match_body(Matcher::Regex(
            r#""project":\{"key":"FALLBACK"\}"#.to_string(),
        ))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"1","key":"FALLBACK-3"}"#)
        .expect(1)
        .create();

    let temp = TempDir::new()?;
    let mailbox = TestMailbox::default();
    mailbox.push(message("msg-1", "quick ask", "@jira please fix the build"));

    let mut monitor = build_monitor(&server, mailbox.clone(), &temp, attachments_config(&temp));
    assert_eq!(monitor.poll_once()?, 1);

    create.assert();
    Ok(())
}

#[test]
fn rejected_creation_leaves_message_unread() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let create = server
        .mock("POST", "/rest/api/2/issue")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"errors":{"summary":"Summary is required"}}"#)
        .expect(1)
        .create();

    let temp = TempDir::new()?;
    let mailbox = TestMailbox::default();
    mailbox.push(message("msg-1", "", "@jira@P@@@\n##text##"));

    let mut monitor = build_monitor(&server, mailbox.clone(), &temp, attachments_config(&temp));
    let processed = monitor.poll_once()?;

    assert_eq!(processed, 0);
    assert!(mailbox.read_ids().is_empty());
    assert!(!temp.path().join("ledger.json").exists());

    create.assert();
    Ok(())
}

#[test]
fn attachments_upload_and_scratch_is_cleaned_up() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let create = server
        .mock("POST", "/rest/api/2/issue")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("附件列表".to_string()),
            Matcher::Regex(r"report\.pdf \(5 B\)".to_string()),
        ]))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"1","key":"PROJ-9"}"#)
        .expect(1)
        .create();
    let upload = server
        .mock("POST", "/rest/api/2/issue/PROJ-9/attachments")
        .match_header("x-atlassian-token", "no-check")
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create();

    let temp = TempDir::new()?;
    let mut msg = message("msg-1", "with file", "@jira@PROJ@@@\n##see attachment##");
    msg.attachments.push(MailAttachment {
        file_name: "report.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        data: b"bytes".to_vec(),
    });
    let mailbox = TestMailbox::default();
    mailbox.push(msg);

    let config = attachments_config(&temp);
    let scratch_root = config.temp_dir.clone();
    let mut monitor = build_monitor(&server, mailbox.clone(), &temp, config);
    assert_eq!(monitor.poll_once()?, 1);

    // The per-message scratch subdirectory is gone after processing.
    let leftovers = std::fs::read_dir(&scratch_root)?.count();
    assert_eq!(leftovers, 0);

    create.assert();
    upload.assert();
    Ok(())
}

#[test]
fn failed_upload_does_not_revoke_created_issue() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let create = server
        .mock("POST", "/rest/api/2/issue")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"1","key":"PROJ-10"}"#)
        .expect(1)
        .create();
    let upload = server
        .mock("POST", "/rest/api/2/issue/PROJ-10/attachments")
        .with_status(500)
        .with_body("boom")
        .expect(1)
        .create();

    let temp = TempDir::new()?;
    let mut msg = message("msg-1", "with file", "@jira@PROJ@@@\n##body##");
    msg.attachments.push(MailAttachment {
        file_name: "a.txt".to_string(),
        content_type: "text/plain".to_string(),
        data: b"x".to_vec(),
    });
    let mailbox = TestMailbox::default();
    mailbox.push(msg);

    let mut monitor = build_monitor(&server, mailbox.clone(), &temp, attachments_config(&temp));

    // The issue was created, so the message still counts as processed and
    // is marked read despite the upload failure.
    assert_eq!(monitor.poll_once()?, 1);
    assert_eq!(mailbox.read_ids(), vec!["msg-1".to_string()]);

    create.assert();
    upload.assert();
    Ok(())
}

#[test]
fn ledger_membership_does_not_block_processing() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let create = server
        .mock("POST", "/rest/api/2/issue")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"1","key":"PROJ-11"}"#)
        .expect(1)
        .create();

    let temp = TempDir::new()?;
    let ledger_path = temp.path().join("ledger.json");
    std::fs::write(&ledger_path, r#"{"processed_emails":["msg-1"]}"#)?;

    let mailbox = TestMailbox::default();
    mailbox.push(message("msg-1", "again", "@jira@PROJ@@@\n##repeat##"));

    let mut monitor = build_monitor(&server, mailbox.clone(), &temp, attachments_config(&temp));

    // Eligibility is the unread flag plus the trigger prefix; the ledger is
    // an audit record, not a gate.
    assert_eq!(monitor.poll_once()?, 1);

    create.assert();
    Ok(())
}
