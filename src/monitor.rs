//! Sequential poll loop over the mailbox.
//!
//! One cycle: list unread messages, newest first; for each trigger message,
//! parse → stage attachments → submit → cleanup; on success mark read and
//! record in the ledger. A stop flag is checked between cycles and between
//! messages; in-flight network calls are never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::attachments::AttachmentStager;
use crate::config::MonitorConfig;
use crate::error::BridgeError;
use crate::ledger::ProcessedLedger;
use crate::mailbox::{MailMessage, MailboxProvider};
use crate::parser::{is_trigger, RequestParser};
use crate::submitter::IssueSubmitter;

const MIN_RECOVERY_DELAY: Duration = Duration::from_secs(60);

pub struct MailMonitor<P: MailboxProvider> {
    provider: P,
    submitter: IssueSubmitter,
    stager: AttachmentStager,
    parser: RequestParser,
    ledger: ProcessedLedger,
    check_interval: Duration,
    mark_as_read: bool,
    stop: Arc<AtomicBool>,
}

impl<P: MailboxProvider> MailMonitor<P> {
    pub fn new(
        provider: P,
        submitter: IssueSubmitter,
        stager: AttachmentStager,
        ledger: ProcessedLedger,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            provider,
            submitter,
            stager,
            parser: RequestParser::new(),
            ledger,
            check_interval: Duration::from_secs(config.check_interval.max(1)),
            mark_as_read: config.mark_as_read,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared stop flag; setting it exits the loop at the next check point.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run one scan over the unread messages. Returns how many messages
    /// were processed end to end.
    pub fn poll_once(&mut self) -> Result<usize, BridgeError> {
        let mut messages = self.provider.list_unread()?;
        messages.sort_by(|a, b| b.received_at.cmp(&a.received_at));

        let mut processed = 0usize;
        for message in &messages {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            if !is_trigger(&message.body) {
                continue;
            }

            match self.process_message(message) {
                Ok(issue_key) => {
                    info!("message {} became issue {}", message.id, issue_key);
                    if self.mark_as_read {
                        if let Err(err) = self.provider.mark_read(&message.id) {
                            warn!("failed to mark {} as read: {}", message.id, err);
                        }
                    }
                    self.ledger.insert(&message.id);
                    processed += 1;
                }
                Err(err) => {
                    error!("processing of message {} failed: {}", message.id, err);
                }
            }
        }

        if processed > 0 {
            if let Err(err) = self.ledger.save() {
                error!("failed to persist ledger: {}", err);
            }
        }
        Ok(processed)
    }

    fn process_message(&self, message: &MailMessage) -> Result<String, BridgeError> {
        let request = self.parser.parse(&message.body);
        let mut staged = self.stager.stage(&message.id, &message.attachments)?;
        let result = self.submitter.submit(
            &message.subject,
            &request,
            message.received_at,
            &staged,
        );
        // Scratch files go away whether creation succeeded or not.
        staged.cleanup();
        result
    }

    /// Poll until the stop flag is raised. Cycle-level failures are logged
    /// and followed by an extended recovery delay; the loop itself never
    /// terminates on them.
    pub fn run_loop(&mut self) {
        info!(
            "mail monitor started, polling every {}s",
            self.check_interval.as_secs()
        );

        while !self.stop.load(Ordering::Relaxed) {
            match self.poll_once() {
                Ok(count) => {
                    if count > 0 {
                        info!("poll cycle processed {} message(s)", count);
                    }
                    self.sleep_unless_stopped(self.check_interval);
                }
                Err(err) => {
                    error!("poll cycle failed: {}", err);
                    self.sleep_unless_stopped(self.recovery_delay());
                }
            }
        }

        info!("mail monitor stopped");
    }

    fn recovery_delay(&self) -> Duration {
        self.check_interval.saturating_mul(5).max(MIN_RECOVERY_DELAY)
    }

    fn sleep_unless_stopped(&self, total: Duration) {
        let mut remaining = total;
        while !remaining.is_zero() {
            if self.stop.load(Ordering::Relaxed) {
                return;
            }
            let slice = remaining.min(Duration::from_secs(1));
            std::thread::sleep(slice);
            remaining -= slice;
        }
    }
}
