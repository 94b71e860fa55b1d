use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which kind of submission a violation was detected in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Post,
    Comment,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Comment => "comment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "post" => Some(ContentType::Post),
            "comment" => Some(ContentType::Comment),
            _ => None,
        }
    }
}

/// Review state of a detected violation.
///
/// Transitions leave `Pending` for `Reviewed` or `Ignored`, stamping the
/// reviewer and timestamp. Re-review simply overwrites those stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Reviewed,
    Ignored,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Reviewed => "reviewed",
            ReviewStatus::Ignored => "ignored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "reviewed" => Some(ReviewStatus::Reviewed),
            "ignored" => Some(ReviewStatus::Ignored),
            _ => None,
        }
    }
}

/// An active or retired content-filter rule: a literal substring or a regex
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViolationRule {
    pub id: i64,
    pub pattern: String,
    pub is_regex: bool,
    pub is_active: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rule awaiting persistence
#[derive(Debug, Clone, PartialEq)]
pub struct NewViolationRule {
    pub pattern: String,
    pub is_regex: bool,
    pub created_by: i64,
}

/// One rule match found by the detector. No side effects attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViolationMatch {
    pub rule_id: i64,
    pub matched_text: String,
    pub is_regex: bool,
}

/// A persisted violation record with its review state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    pub id: i64,
    pub user_id: i64,
    pub content_type: ContentType,
    /// 0 means the submission was blocked and never persisted
    pub content_id: i64,
    pub rule_id: i64,
    pub matched_text: String,
    pub snippet: String,
    pub detected_at: DateTime<Utc>,
    pub status: ReviewStatus,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Violation awaiting persistence, always created pending
#[derive(Debug, Clone, PartialEq)]
pub struct NewViolation {
    pub user_id: i64,
    pub content_type: ContentType,
    pub content_id: i64,
    pub rule_id: i64,
    pub matched_text: String,
    pub snippet: String,
}
