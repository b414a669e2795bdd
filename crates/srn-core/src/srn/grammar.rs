//! Canonicalization, parsing and serialization of SRN strings.
//!
//! Grammar (after canonicalization):
//!
//! ```text
//! srn        = version "." workspace "." subject_type "." subject_id
//!              [ "." "proj_" project ] [ "." "thr_" thread ] [ "." "top_" topic ]
//! version    = "1"
//! workspace  = 32 * HEXLOWER
//! identifier = 1*63 ( a-z / 0-9 / "_" / "-" )
//! ```
//!
//! The input is split on `.` and each segment is checked on its own, which is
//! what lets a malformed workspace surface as `InvalidWorkspace` rather than a
//! generic format error.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use super::components::{SrnComponents, SubjectType};
use crate::error::{Result, ScopeError};

/// The only version segment accepted by this revision of the grammar.
pub const SRN_VERSION: &str = "1";

pub const PROJECT_PREFIX: &str = "proj_";
pub const THREAD_PREFIX: &str = "thr_";
pub const TOPIC_PREFIX: &str = "top_";

/// Maximum identifier length.
pub const MAX_IDENTIFIER_LEN: usize = 63;

const MIN_SEGMENTS: usize = 4;
const MAX_SEGMENTS: usize = 7;

static WORKSPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{32}$").expect("workspace pattern is valid"));

static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_-]{1,63}$").expect("identifier pattern is valid"));

/// Normalizes a raw SRN: NFC composition, lowercase, surrounding whitespace
/// trimmed.
///
/// `canonicalize(&canonicalize(s)) == canonicalize(s)` for every input.
pub fn canonicalize(raw: &str) -> String {
    let lowered = raw.nfc().collect::<String>().to_lowercase();
    lowered.trim().nfc().collect()
}

/// Parses a raw SRN string into validated components.
///
/// # Errors
///
/// - `InvalidFormat` when the overall shape does not match
/// - `InvalidWorkspace` when the workspace segment is malformed
/// - `InvalidSubjectType` when the subject type is not recognized
/// - `InvalidIdentifier` when any identifier violates charset/length
pub fn parse(raw: &str) -> Result<SrnComponents> {
    let canonical = canonicalize(raw);
    if canonical.is_empty() {
        return Err(ScopeError::invalid_format(
            "SRN string cannot be empty",
            raw.to_string(),
        ));
    }

    let segments: Vec<&str> = canonical.split('.').collect();
    if segments.len() < MIN_SEGMENTS || segments.len() > MAX_SEGMENTS {
        return Err(ScopeError::invalid_format(
            format!(
                "expected 4 to 7 dot-separated segments, found {}",
                segments.len()
            ),
            canonical.clone(),
        ));
    }

    let version = segments[0];
    if version != SRN_VERSION {
        return Err(ScopeError::invalid_format(
            format!("unsupported version '{}'; supported: {}", version, SRN_VERSION),
            version.to_string(),
        ));
    }

    let workspace = segments[1];
    validate_workspace(workspace)?;

    let subject_type = SubjectType::parse(segments[2])?;

    let subject_id = segments[3];
    validate_identifier("subject_id", subject_id)?;

    let mut project = None;
    let mut thread = None;
    let mut topic = None;
    // 0 = nothing matched yet, 1 = project, 2 = thread, 3 = topic
    let mut position = 0;

    for segment in &segments[MIN_SEGMENTS..] {
        let (rank, field, value) = if let Some(value) = segment.strip_prefix(PROJECT_PREFIX) {
            (1, "project", value)
        } else if let Some(value) = segment.strip_prefix(THREAD_PREFIX) {
            (2, "thread", value)
        } else if let Some(value) = segment.strip_prefix(TOPIC_PREFIX) {
            (3, "topic", value)
        } else {
            return Err(ScopeError::invalid_format(
                format!(
                    "unrecognized segment '{}'; expected {}, {} or {} prefix",
                    segment, PROJECT_PREFIX, THREAD_PREFIX, TOPIC_PREFIX
                ),
                segment.to_string(),
            ));
        };

        if rank <= position {
            return Err(ScopeError::invalid_format(
                format!(
                    "segment '{}' is out of order or repeated; order is project, thread, topic",
                    segment
                ),
                segment.to_string(),
            ));
        }
        position = rank;

        validate_identifier(field, value)?;
        let value = Some(value.to_string());
        match rank {
            1 => project = value,
            2 => thread = value,
            _ => topic = value,
        }
    }

    Ok(SrnComponents {
        version: version.to_string(),
        workspace: workspace.to_string(),
        subject_type,
        subject_id: subject_id.to_string(),
        project,
        thread,
        topic,
    })
}

/// Serializes components into their canonical SRN string.
///
/// Exact inverse of [`parse`] for any value the parser could produce.
pub fn serialize(components: &SrnComponents) -> String {
    let mut srn = format!(
        "{}.{}.{}.{}",
        components.version, components.workspace, components.subject_type, components.subject_id
    );
    if let Some(project) = &components.project {
        srn.push('.');
        srn.push_str(PROJECT_PREFIX);
        srn.push_str(project);
    }
    if let Some(thread) = &components.thread {
        srn.push('.');
        srn.push_str(THREAD_PREFIX);
        srn.push_str(thread);
    }
    if let Some(topic) = &components.topic {
        srn.push('.');
        srn.push_str(TOPIC_PREFIX);
        srn.push_str(topic);
    }
    srn
}

/// Validates a raw SRN without keeping the parsed value.
pub fn validate(raw: &str) -> Result<()> {
    parse(raw).map(|_| ())
}

/// Returns true if the raw string parses.
pub fn is_valid(raw: &str) -> bool {
    parse(raw).is_ok()
}

/// Validates a workspace segment (exactly 32 lowercase hex characters).
pub fn validate_workspace(workspace: &str) -> Result<()> {
    if WORKSPACE_PATTERN.is_match(workspace) {
        Ok(())
    } else {
        Err(ScopeError::InvalidWorkspace {
            workspace: workspace.to_string(),
        })
    }
}

/// Validates an identifier (1-63 chars of `[a-z0-9_-]`).
pub fn validate_identifier(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ScopeError::invalid_identifier(
            field,
            value,
            "cannot be empty",
        ));
    }
    if value.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(ScopeError::invalid_identifier(
            field,
            value,
            format!("exceeds maximum length of {} characters", MAX_IDENTIFIER_LEN),
        ));
    }
    if !IDENTIFIER_PATTERN.is_match(value) {
        return Err(ScopeError::invalid_identifier(
            field,
            value,
            "must contain only lowercase letters, numbers, underscore, and hyphen",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    const WS: &str = "abc12345abcd12345abc1234567890ab";

    #[test]
    fn test_parse_project_scope() {
        let srn = format!("1.{}.user.johndoe.proj_research", WS);
        let components = parse(&srn).unwrap();

        assert_eq!(components.version(), "1");
        assert_eq!(components.workspace(), WS);
        assert_eq!(components.subject_type(), SubjectType::User);
        assert_eq!(components.subject_id(), "johndoe");
        assert_eq!(components.project(), Some("research"));
        assert_eq!(components.thread(), None);
        assert_eq!(components.topic(), None);
    }

    #[test]
    fn test_parse_full_scope() {
        let srn = format!("1.{}.agent.bot_7.proj_p-1.thr_t1.top_billing", WS);
        let components = parse(&srn).unwrap();
        assert_eq!(components.project(), Some("p-1"));
        assert_eq!(components.thread(), Some("t1"));
        assert_eq!(components.topic(), Some("billing"));
        assert_eq!(serialize(&components), srn);
    }

    #[test]
    fn test_parse_canonicalizes_case_and_whitespace() {
        let srn = format!("  1.{}.USER.JohnDoe.PROJ_Research \n", WS.to_uppercase());
        let components = parse(&srn).unwrap();
        assert_eq!(components.subject_id(), "johndoe");
        assert_eq!(
            serialize(&components),
            format!("1.{}.user.johndoe.proj_research", WS)
        );
    }

    #[test]
    fn test_short_workspace_is_invalid_workspace() {
        let err = parse("1.abc123.user.john").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidWorkspace);
        assert_eq!(err.segment(), Some("abc123"));
    }

    #[test]
    fn test_non_hex_workspace() {
        let err = parse("1.zzz12345abcd12345abc1234567890ab.user.john").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidWorkspace);
    }

    #[test]
    fn test_unknown_subject_type() {
        let err = parse(&format!("1.{}.customer.john", WS)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSubjectType);
        assert_eq!(err.segment(), Some("customer"));
    }

    #[test]
    fn test_identifier_rules() {
        let long = "a".repeat(64);
        let err = parse(&format!("1.{}.user.{}", WS, long)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);

        let err = parse(&format!("1.{}.user.john.proj_", WS)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);

        let err = parse(&format!("1.{}.user.jo$hn", WS)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);

        let max = "a".repeat(63);
        assert!(parse(&format!("1.{}.user.{}", WS, max)).is_ok());
    }

    #[test]
    fn test_format_errors() {
        let inputs = vec![
            String::new(),
            "   ".to_string(),
            "1.only.three".to_string(),
            format!("2.{}.user.john", WS),
            format!("1.{}.user.john.thr_a.proj_b", WS),
            format!("1.{}.user.john.proj_a.proj_b", WS),
            format!("1.{}.user.john.tag_x", WS),
            format!("1.{}.user.john.proj_a.thr_b.top_c.top_d", WS),
        ];
        for raw in &inputs {
            let err = parse(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidFormat, "input: {:?}", raw);
        }
    }

    #[test]
    fn test_optional_segments_are_independent() {
        let components = parse(&format!("1.{}.user.john.thr_t1", WS)).unwrap();
        assert_eq!(components.project(), None);
        assert_eq!(components.thread(), Some("t1"));

        let components = parse(&format!("1.{}.user.john.proj_p.top_x", WS)).unwrap();
        assert_eq!(components.thread(), None);
        assert_eq!(components.topic(), Some("x"));
    }

    #[test]
    fn test_canonicalize_nfc() {
        // "e" + combining acute composes to U+00E9
        let decomposed = "Cafe\u{0301}";
        assert_eq!(canonicalize(decomposed), "caf\u{00e9}");
        assert_eq!(canonicalize(&canonicalize(decomposed)), canonicalize(decomposed));
    }

    #[test]
    fn test_validate_helpers() {
        assert!(is_valid(&format!("1.{}.system.default", WS)));
        assert!(!is_valid("1.abc.system.default"));
        assert!(validate(&format!("1.{}.contact.c-9", WS)).is_ok());
    }

    fn identifier() -> impl Strategy<Value = String> {
        "[a-z0-9_-]{1,63}"
    }

    fn components() -> impl Strategy<Value = SrnComponents> {
        (
            "[a-f0-9]{32}",
            0usize..6,
            identifier(),
            proptest::option::of(identifier()),
            proptest::option::of(identifier()),
            proptest::option::of(identifier()),
        )
            .prop_map(|(ws, type_index, subject, project, thread, topic)| {
                use strum::IntoEnumIterator;
                let subject_type = SubjectType::iter().nth(type_index).unwrap();
                let mut builder = SrnComponents::builder(ws, subject_type, subject);
                if let Some(project) = project {
                    builder = builder.project(project);
                }
                if let Some(thread) = thread {
                    builder = builder.thread(thread);
                }
                if let Some(topic) = topic {
                    builder = builder.topic(topic);
                }
                builder.build().unwrap()
            })
    }

    proptest! {
        #[test]
        fn prop_parse_serialize_round_trip(c in components()) {
            let parsed = parse(&serialize(&c)).unwrap();
            prop_assert_eq!(parsed, c);
        }

        #[test]
        fn prop_canonicalize_idempotent(s in "\\PC{0,40}") {
            let once = canonicalize(&s);
            prop_assert_eq!(canonicalize(&once), once);
        }
    }
}
