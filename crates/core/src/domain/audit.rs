// Audit Log Domain Model

use super::error::DomainError;
use super::order::OrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default prefix of correlation references (operator group tag)
pub const DEFAULT_REFERENCE_PREFIX: &str = "G1";

/// Number of random hex characters closing a correlation reference
pub const REFERENCE_SUFFIX_LEN: usize = 6;

/// Audit event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEvent {
    /// Written inside the business transaction, before the updates
    Open,
    /// Written in its own transaction, after the business commit
    Close,
}

impl AuditEvent {
    /// Single-character code stored in the audit table
    pub fn code(&self) -> &'static str {
        match self {
            AuditEvent::Open => "O",
            AuditEvent::Close => "C",
        }
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditEvent::Open => write!(f, "OPEN"),
            AuditEvent::Close => write!(f, "CLOSE"),
        }
    }
}

impl FromStr for AuditEvent {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "O" => Ok(AuditEvent::Open),
            "C" => Ok(AuditEvent::Close),
            other => Err(DomainError::UnknownAuditEvent(other.to_string())),
        }
    }
}

/// Correlation reference linking the open and close entries of one edit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationRef(String);

impl CorrelationRef {
    /// Build `<prefix>-<YYYYMMDDHHMMSSffffff>-<suffix>`
    ///
    /// `suffix` is truncated to [`REFERENCE_SUFFIX_LEN`] characters.
    pub fn generate(prefix: &str, now: DateTime<Utc>, suffix: &str) -> Self {
        let suffix: String = suffix.chars().take(REFERENCE_SUFFIX_LEN).collect();
        Self(format!("{}-{}-{}", prefix, now.format("%Y%m%d%H%M%S%6f"), suffix))
    }

    /// Wrap a reference read back from storage
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One audit log row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub event: AuditEvent,
    pub object_id: OrderId,
    /// Timestamp captured by the engine when the entry was staged
    pub payload: DateTime<Utc>,
    pub reference: CorrelationRef,
    /// Assigned by the database on insert; None until read back
    pub created_at: Option<DateTime<Utc>>,
}

impl AuditEntry {
    pub fn new(
        event: AuditEvent,
        object_id: OrderId,
        payload: DateTime<Utc>,
        reference: CorrelationRef,
    ) -> Self {
        Self {
            event,
            object_id,
            payload,
            reference,
            created_at: None,
        }
    }
}

/// Outcome of one edit attempt as seen through the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrailStatus {
    /// Open and close entries both present
    Completed,
    /// Open entry only: in flight, or the close-log write failed
    Incomplete,
}

impl std::fmt::Display for TrailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrailStatus::Completed => write!(f, "COMPLETED"),
            TrailStatus::Incomplete => write!(f, "INCOMPLETE"),
        }
    }
}

/// Audit entries of one correlation reference folded together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditTrail {
    pub reference: CorrelationRef,
    pub object_id: OrderId,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl EditTrail {
    pub fn status(&self) -> TrailStatus {
        if self.opened_at.is_some() && self.closed_at.is_some() {
            TrailStatus::Completed
        } else {
            TrailStatus::Incomplete
        }
    }

    /// Fold audit entries into trails, ordered by first appearance
    pub fn fold(entries: &[AuditEntry]) -> Vec<EditTrail> {
        let mut trails: Vec<EditTrail> = Vec::new();

        for entry in entries {
            let idx = match trails.iter().position(|t| t.reference == entry.reference) {
                Some(idx) => idx,
                None => {
                    trails.push(EditTrail {
                        reference: entry.reference.clone(),
                        object_id: entry.object_id,
                        opened_at: None,
                        closed_at: None,
                    });
                    trails.len() - 1
                }
            };

            let at = Some(entry.created_at.unwrap_or(entry.payload));
            match entry.event {
                AuditEvent::Open => trails[idx].opened_at = at,
                AuditEvent::Close => trails[idx].closed_at = at,
            }
        }

        trails
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_reference_format() {
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 14, 5, 9).unwrap()
            + chrono::Duration::microseconds(123_456);
        let reference = CorrelationRef::generate("G1", now, "a1b2c3d4e5f6");

        assert_eq!(reference.as_str(), "G1-20251103140509123456-a1b2c3");
    }

    #[test]
    fn test_event_codes_round_trip() {
        for event in [AuditEvent::Open, AuditEvent::Close] {
            assert_eq!(event.code().parse::<AuditEvent>().unwrap(), event);
        }
        assert!("X".parse::<AuditEvent>().is_err());
    }

    #[test]
    fn test_fold_trails() {
        let order = OrderId::new(42).unwrap();
        let r1 = CorrelationRef::from_stored("G1-1-aaaaaa");
        let r2 = CorrelationRef::from_stored("G1-2-bbbbbb");

        let entries = vec![
            AuditEntry::new(AuditEvent::Open, order, at(10), r1.clone()),
            AuditEntry::new(AuditEvent::Close, order, at(11), r1.clone()),
            AuditEntry::new(AuditEvent::Open, order, at(20), r2.clone()),
        ];

        let trails = EditTrail::fold(&entries);
        assert_eq!(trails.len(), 2);
        assert_eq!(trails[0].reference, r1);
        assert_eq!(trails[0].status(), TrailStatus::Completed);
        assert_eq!(trails[0].closed_at, Some(at(11)));
        assert_eq!(trails[1].reference, r2);
        assert_eq!(trails[1].status(), TrailStatus::Incomplete);
    }
}
