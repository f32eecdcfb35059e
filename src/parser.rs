//! Trigger-header parsing and `##...##` content extraction.
//!
//! Messages opt in with a header of the form
//! `@jira@<project>@<assignee>@<issue-type>@<due-date>` on the first line,
//! followed by free text whose useful portion is wrapped in double-`#`
//! markers. Parsing never fails: malformed headers degrade to an unset
//! request so the message still becomes an issue.

use regex::Regex;

/// Literal prefix identifying an eligible message body.
pub const TRIGGER_TOKEN: &str = "@jira";

/// Description body used when a message carries no usable text.
pub const EMPTY_CONTENT_PLACEHOLDER: &str = "(无正文内容)";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRequest {
    pub project: Option<String>,
    pub assignee: Option<String>,
    pub issue_type: Option<String>,
    pub due_date: Option<String>,
    pub content: String,
}

#[derive(Debug)]
pub struct RequestParser {
    header: Regex,
    marker: Regex,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        let header = Regex::new(
            r"(?i)^@jira@([^@\r\n]*)@([^@\r\n]*)@([^@\r\n]*)@([^@\r\n]*)(?:\r?\n|$)",
        )
        .expect("header regex");
        let marker = Regex::new(r"(?s)##(.*?)##").expect("marker regex");
        Self { header, marker }
    }

    /// Parse a raw message body into a [`ParsedRequest`].
    ///
    /// Three outcomes, all of them valid requests:
    /// - well-formed four-field header: fields trimmed, empty fields unset,
    ///   content extracted from the text after the header line;
    /// - body starts with the trigger but the header is malformed: all
    ///   fields unset, first line stripped before extraction;
    /// - anything else: all fields unset, content extracted from the body
    ///   as given.
    pub fn parse(&self, body: &str) -> ParsedRequest {
        let trimmed = body.trim_start();

        if let Some(caps) = self.header.captures(trimmed) {
            let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
            return ParsedRequest {
                project: capture_field(&caps, 1),
                assignee: capture_field(&caps, 2),
                issue_type: capture_field(&caps, 3),
                due_date: capture_field(&caps, 4),
                content: self.extract_content(&trimmed[end..]),
            };
        }

        if is_trigger(trimmed) {
            let remainder = match trimmed.split_once('\n') {
                Some((_, rest)) => rest,
                None => &trimmed[TRIGGER_TOKEN.len()..],
            };
            return ParsedRequest {
                content: self.extract_content(remainder),
                ..ParsedRequest::default()
            };
        }

        ParsedRequest {
            content: self.extract_content(body),
            ..ParsedRequest::default()
        }
    }

    /// Return the valid content portion of `text`.
    ///
    /// All non-greedy `##...##` spans are collected; their trimmed contents
    /// are joined with one blank line, empty captures dropped. Text without
    /// markers passes through unchanged.
    pub fn extract_content(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return EMPTY_CONTENT_PLACEHOLDER.to_string();
        }

        let mut spans: Vec<&str> = Vec::new();
        let mut matched = false;
        for caps in self.marker.captures_iter(text) {
            matched = true;
            if let Some(span) = caps.get(1) {
                let span = span.as_str().trim();
                if !span.is_empty() {
                    spans.push(span);
                }
            }
        }

        if !matched {
            return text.to_string();
        }
        spans.join("\n\n")
    }
}

/// Eligibility check used by the poll loop: trimmed body starts with the
/// trigger token, case-insensitively.
pub fn is_trigger(body: &str) -> bool {
    body.trim_start()
        .get(..TRIGGER_TOKEN.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(TRIGGER_TOKEN))
}

fn capture_field(caps: &regex::Captures<'_>, index: usize) -> Option<String> {
    caps.get(index)
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}
