//! Delegation directives embedded in agent replies
//!
//! An agent asks for a hand-off by starting its reply with
//! `[DELEGATE: ProfileName]`. Everything after the marker on that line,
//! followed by every later line, is the task for the named profile. Agents
//! that support structured replies may instead answer with a JSON
//! [`ReplyEnvelope`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Literal every delegation marker starts with
pub const DELEGATE_PREFIX: &str = "[DELEGATE:";

/// Reply substituted when a marker names no parseable profile
pub const MARKER_PARSE_ERROR: &str = "Delegation parsing error: Could not extract profile name";

static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[DELEGATE:\s*([\w_]+)\]").expect("marker pattern is valid"));

/// What an agent reply asks the engine to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// A final answer, returned as-is
    Answer(String),
    /// Hand the task to another profile; `None` means reuse the original request
    Delegate {
        profile: String,
        task: Option<String>,
    },
    /// Looked like a delegation but named no profile
    Malformed,
}

/// Structured reply for agents that can emit JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyEnvelope {
    FinalAnswer {
        answer: String,
    },
    Delegate {
        profile: String,
        #[serde(default)]
        task: String,
    },
}

impl From<ReplyEnvelope> for Directive {
    fn from(envelope: ReplyEnvelope) -> Self {
        match envelope {
            ReplyEnvelope::FinalAnswer { answer } => Directive::Answer(answer),
            ReplyEnvelope::Delegate { profile, task } => {
                if profile.trim().is_empty() {
                    return Directive::Malformed;
                }
                let task = task.trim();
                Directive::Delegate {
                    profile: profile.trim().to_string(),
                    task: (!task.is_empty()).then(|| task.to_string()),
                }
            }
        }
    }
}

/// Interpret a reply, trying the JSON envelope first when the agent supports it
pub fn interpret(reply: &str, structured: bool) -> Directive {
    if structured {
        if let Ok(envelope) = serde_json::from_str::<ReplyEnvelope>(strip_code_fence(reply)) {
            return envelope.into();
        }
    }
    parse_marker(reply)
}

/// Interpret a reply using only the text marker grammar
///
/// Only a marker at the start of the first line counts. Further markers,
/// on the same line or later ones, are part of the task text.
pub fn parse_marker(reply: &str) -> Directive {
    let trimmed = reply.trim_start();
    if !trimmed.starts_with(DELEGATE_PREFIX) {
        return Directive::Answer(reply.to_string());
    }

    let (first_line, rest) = match trimmed.split_once('\n') {
        Some((first, rest)) => (first, Some(rest)),
        None => (trimmed, None),
    };

    let Some(caps) = MARKER.captures(first_line) else {
        return Directive::Malformed;
    };
    let (Some(marker), Some(name)) = (caps.get(0), caps.get(1)) else {
        return Directive::Malformed;
    };

    let mut task = first_line[marker.end()..].to_string();
    if let Some(rest) = rest {
        task.push('\n');
        task.push_str(rest);
    }
    let task = task.trim();

    Directive::Delegate {
        profile: name.as_str().to_string(),
        task: (!task.is_empty()).then(|| task.to_string()),
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|body| body.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delegate(profile: &str, task: Option<&str>) -> Directive {
        Directive::Delegate {
            profile: profile.to_string(),
            task: task.map(String::from),
        }
    }

    // === Marker Grammar Tests ===

    #[test]
    fn test_plain_reply_is_answer() {
        let reply = "Here is your answer.\n[DELEGATE: Coder] not a prefix";
        assert_eq!(parse_marker(reply), Directive::Answer(reply.to_string()));
    }

    #[test]
    fn test_task_on_following_lines() {
        let reply = "[DELEGATE: Coder]\nWrite a tokenizer.\nKeep it small.";
        assert_eq!(
            parse_marker(reply),
            delegate("Coder", Some("Write a tokenizer.\nKeep it small."))
        );
    }

    #[test]
    fn test_task_on_marker_line_joined_with_rest() {
        let reply = "[DELEGATE: Coder] Write a tokenizer.\nKeep it small.";
        assert_eq!(
            parse_marker(reply),
            delegate("Coder", Some("Write a tokenizer.\nKeep it small."))
        );
    }

    #[test]
    fn test_leading_whitespace_and_tight_marker() {
        assert_eq!(
            parse_marker("  \n[DELEGATE:Code_Writer2] go"),
            delegate("Code_Writer2", Some("go"))
        );
    }

    #[test]
    fn test_empty_task_body() {
        assert_eq!(parse_marker("[DELEGATE: Writer]"), delegate("Writer", None));
        assert_eq!(parse_marker("[DELEGATE: Writer]   \n  \n"), delegate("Writer", None));
    }

    #[test]
    fn test_missing_profile_name() {
        assert_eq!(parse_marker("[DELEGATE: ] do it"), Directive::Malformed);
        assert_eq!(parse_marker("[DELEGATE:"), Directive::Malformed);
        assert_eq!(parse_marker("[DELEGATE: some-one] hi"), Directive::Malformed);
    }

    #[test]
    fn test_multiple_markers_only_first_counts() {
        assert_eq!(
            parse_marker("[DELEGATE: Coder] [DELEGATE: Writer] both\n[DELEGATE: Other]"),
            delegate("Coder", Some("[DELEGATE: Writer] both\n[DELEGATE: Other]"))
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        assert_eq!(
            parse_marker("[DELEGATE: Coder]\r\nfix it\r\n"),
            delegate("Coder", Some("fix it"))
        );
    }

    // === Envelope Tests ===

    #[test]
    fn test_envelope_delegate() {
        let reply = r#"{"type": "delegate", "profile": "Coder", "task": "write tests"}"#;
        assert_eq!(interpret(reply, true), delegate("Coder", Some("write tests")));
    }

    #[test]
    fn test_envelope_final_answer_in_code_fence() {
        let reply = "```json\n{\"type\": \"final_answer\", \"answer\": \"42\"}\n```";
        assert_eq!(interpret(reply, true), Directive::Answer("42".into()));
    }

    #[test]
    fn test_envelope_blank_profile_is_malformed() {
        let reply = r#"{"type": "delegate", "profile": " "}"#;
        assert_eq!(interpret(reply, true), Directive::Malformed);
    }

    #[test]
    fn test_envelope_ignored_without_support() {
        let reply = r#"{"type": "delegate", "profile": "Coder"}"#;
        assert_eq!(interpret(reply, false), Directive::Answer(reply.to_string()));
    }

    #[test]
    fn test_non_envelope_falls_back_to_marker() {
        assert_eq!(
            interpret("[DELEGATE: Writer] polish", true),
            delegate("Writer", Some("polish"))
        );
    }
}
