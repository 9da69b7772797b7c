//! Token usage views: costs, aggregated usage, admission decisions, status
//! tiers, ledger events, and per-student summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::account::AccountId;
use crate::student::StudentId;

/// Token cost reported by a chargeable operation after it completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCost {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenCost {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// A cost where only the total is known.
    pub fn total(total_tokens: u64) -> Self {
        Self {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens,
        }
    }
}

/// An admin's consumption, recomputed from stored counters on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedUsage {
    pub admin_id: AccountId,
    /// The admin's own `used` counter.
    pub admin_direct_usage: u64,
    /// Sum of `used` over the admin's teachers.
    pub teachers_usage: u64,
    /// Ledger total for the admin's students. Never part of `used`.
    pub students_usage: u64,
    pub teacher_count: usize,
    /// `admin_direct_usage + teachers_usage`.
    pub used: u64,
    pub limit: u64,
    /// `limit - used`; negative when over the limit.
    pub remaining: i64,
}

impl AggregatedUsage {
    pub fn new(
        admin_id: AccountId,
        admin_direct_usage: u64,
        teachers_usage: u64,
        students_usage: u64,
        teacher_count: usize,
        limit: u64,
    ) -> Self {
        let used = admin_direct_usage.saturating_add(teachers_usage);
        Self {
            admin_id,
            admin_direct_usage,
            teachers_usage,
            students_usage,
            teacher_count,
            used,
            limit,
            remaining: signed_difference(limit, used),
        }
    }
}

/// `a - b` as a signed value, saturating at the i64 bounds.
pub fn signed_difference(a: u64, b: u64) -> i64 {
    let diff = i128::from(a) - i128::from(b);
    i64::try_from(diff).unwrap_or(if diff < 0 { i64::MIN } else { i64::MAX })
}

/// Why an admission decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allowed,
    LimitExceeded,
    /// Soft fallback when the admin does not exist. Always denied.
    AdminNotFound,
}

/// Advisory allow/deny verdict for a prospective charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub verdict: Verdict,
    pub current_used: u64,
    /// Tokens held by in-flight reservations. Zero for plain checks.
    pub reserved: u64,
    pub limit: u64,
    /// `limit - used - reserved`; negative when over the limit.
    pub remaining: i64,
    pub requested_tokens: u64,
    pub new_total: u64,
    pub excess: u64,
    pub reason: String,
}

impl AdmissionDecision {
    /// Evaluate a request for `requested` tokens on top of `usage` and any
    /// tokens already `reserved` by in-flight operations.
    pub fn evaluate(usage: &AggregatedUsage, requested: u64, reserved: u64) -> Self {
        let new_total = usage
            .used
            .saturating_add(reserved)
            .saturating_add(requested);
        let allowed = new_total <= usage.limit;
        let excess = if allowed { 0 } else { new_total - usage.limit };

        let (verdict, reason) = if allowed {
            (Verdict::Allowed, "allowed".to_string())
        } else {
            (
                Verdict::LimitExceeded,
                format!("would exceed the limit by {excess} tokens"),
            )
        };

        Self {
            allowed,
            verdict,
            current_used: usage.used,
            reserved,
            limit: usage.limit,
            remaining: signed_difference(usage.limit, usage.used.saturating_add(reserved)),
            requested_tokens: requested,
            new_total,
            excess,
            reason,
        }
    }

    /// Fallback decision for an unknown admin.
    pub fn admin_not_found(requested: u64) -> Self {
        Self {
            allowed: false,
            verdict: Verdict::AdminNotFound,
            current_used: 0,
            reserved: 0,
            limit: 0,
            remaining: 0,
            requested_tokens: requested,
            new_total: 0,
            excess: 0,
            reason: "admin not found".to_string(),
        }
    }
}

/// Display tier derived from the percentage of the ceiling consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTier {
    Normal,
    Warning,
    Critical,
    Exhausted,
}

impl StatusTier {
    /// Tier for a percentage. Lower bounds are inclusive; first match wins.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 100.0 {
            StatusTier::Exhausted
        } else if percentage >= 90.0 {
            StatusTier::Critical
        } else if percentage >= 75.0 {
            StatusTier::Warning
        } else {
            StatusTier::Normal
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            StatusTier::Normal => "Tokens available",
            StatusTier::Warning => "Warning: token usage at alert level",
            StatusTier::Critical => "Critical: few tokens remaining",
            StatusTier::Exhausted => "Tokens exhausted: no further analyses can be run",
        }
    }
}

impl fmt::Display for StatusTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusTier::Normal => write!(f, "normal"),
            StatusTier::Warning => write!(f, "warning"),
            StatusTier::Critical => write!(f, "critical"),
            StatusTier::Exhausted => write!(f, "exhausted"),
        }
    }
}

impl FromStr for StatusTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(StatusTier::Normal),
            "warning" => Ok(StatusTier::Warning),
            "critical" => Ok(StatusTier::Critical),
            "exhausted" => Ok(StatusTier::Exhausted),
            other => Err(format!("invalid status tier: '{other}'")),
        }
    }
}

/// Percentage of `limit` consumed by `used`, unrounded.
///
/// A zero ceiling means there is no capacity at all, so it reads as 100%.
pub fn percentage_used(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 100.0;
    }
    used as f64 / limit as f64 * 100.0
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Status report for an admin's budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenStatus {
    pub usage: AggregatedUsage,
    /// Rounded to two decimals.
    pub percentage: f64,
    pub status: StatusTier,
    pub message: String,
    /// Coarse pre-check: enough left for at least one analysis.
    pub can_analyze: bool,
}

/// One committed charge in the usage ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: Uuid,
    /// Charged account. `None` for informational student-only entries.
    pub account_id: Option<AccountId>,
    /// Budget owner the event belongs to.
    pub admin_id: AccountId,
    pub student_id: Option<StudentId>,
    /// Free-form label of the analyzed document.
    pub document: String,
    pub cost: TokenCost,
    pub recorded_at: DateTime<Utc>,
}

impl UsageEvent {
    pub fn new(
        admin_id: AccountId,
        account_id: Option<AccountId>,
        student_id: Option<StudentId>,
        document: impl Into<String>,
        cost: TokenCost,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            account_id,
            admin_id,
            student_id,
            document: document.into(),
            cost,
            recorded_at: Utc::now(),
        }
    }
}

/// Token totals for one student, built from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSummary {
    pub student_id: StudentId,
    pub student_name: String,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_tokens: u64,
    pub request_count: u64,
    pub average_tokens_per_request: u64,
}

impl TokenSummary {
    /// Empty summary for a student with no ledger entries.
    pub fn empty(student_id: StudentId, student_name: impl Into<String>) -> Self {
        Self {
            student_id,
            student_name: student_name.into(),
            total_prompt_tokens: 0,
            total_completion_tokens: 0,
            total_tokens: 0,
            request_count: 0,
            average_tokens_per_request: 0,
        }
    }

    /// Fold one ledger cost into the summary.
    pub fn add(&mut self, cost: &TokenCost) {
        self.total_prompt_tokens += cost.prompt_tokens;
        self.total_completion_tokens += cost.completion_tokens;
        self.total_tokens += cost.total_tokens;
        self.request_count += 1;
        self.average_tokens_per_request = average(self.total_tokens, self.request_count);
    }
}

/// Rounded mean, 0 when there are no requests.
pub fn average(total: u64, count: u64) -> u64 {
    if count == 0 {
        return 0;
    }
    (total as f64 / count as f64).round() as u64
}
