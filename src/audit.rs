//! Audit aggregate: a scheduled review with a planned date and an optional actual date.
//!
//! ```text
//! PLANNED --start--> IN_PROGRESS --complete--> COMPLETED
//!    |                    |
//!    +------cancel--------+-----> CANCELLED --restore--> PLANNED
//! ```
use super::error::{IllegalStateError, TransitionError, ValidationError};
use super::lifecycle::{Phase, Status};
use super::predicate::Scheduled;
use super::types::{RecordId, TimeStamp};
use super::validation::{
    normalize_optional, require_future, require_min_len, require_not_before, require_present,
    require_storable,
};
use serde::{Deserialize, Serialize};

pub const ID_PREFIX: &str = "audit_";
pub const TITLE_MIN_LEN: usize = 5;
pub const SCOPE_MIN_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl Status for AuditStatus {
    const ALL: &'static [Self] = &[
        AuditStatus::Planned,
        AuditStatus::InProgress,
        AuditStatus::Completed,
        AuditStatus::Cancelled,
    ];

    fn code(self) -> &'static str {
        match self {
            AuditStatus::Planned => "PLANNED",
            AuditStatus::InProgress => "IN_PROGRESS",
            AuditStatus::Completed => "COMPLETED",
            AuditStatus::Cancelled => "CANCELLED",
        }
    }

    fn phase(self) -> Phase {
        match self {
            AuditStatus::Planned => Phase::Initial,
            AuditStatus::InProgress => Phase::Active,
            AuditStatus::Completed => Phase::Completed,
            AuditStatus::Cancelled => Phase::Aborted,
        }
    }

    fn initial() -> Self {
        AuditStatus::Planned
    }
}

/// Creation input, as handed over by the HTTP layer.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditFields {
    pub title: String,
    pub scope: String,
    pub audit_type: String,
    pub auditor: String,
    #[serde(default)]
    pub area: Option<String>,
    pub planned_date: TimeStamp,
}

/// Partial descriptive update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditPatch {
    pub title: Option<String>,
    pub scope: Option<String>,
    pub audit_type: Option<String>,
    pub auditor: Option<String>,
    pub area: Option<String>,
    pub findings: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audit {
    pub(crate) id: RecordId,
    pub(crate) title: String,
    pub(crate) scope: String,
    pub(crate) audit_type: String,
    pub(crate) auditor: String,
    pub(crate) area: Option<String>,
    pub(crate) status: AuditStatus,
    pub(crate) planned_date: TimeStamp,
    pub(crate) actual_date: Option<TimeStamp>,
    pub(crate) findings: Option<String>,
    pub(crate) created_at: TimeStamp,
    pub(crate) updated_at: TimeStamp,
}

impl Audit {
    pub fn create(fields: AuditFields) -> Result<Self, ValidationError> {
        Self::create_at(fields, TimeStamp::new())
    }

    /// Same as [`Audit::create`] with an explicit "now", which also becomes both timestamps.
    pub fn create_at(fields: AuditFields, now: TimeStamp) -> Result<Self, ValidationError> {
        let audit = Self {
            id: RecordId::generate(ID_PREFIX)?,
            title: fields.title.trim().to_owned(),
            scope: fields.scope.trim().to_owned(),
            audit_type: fields.audit_type.trim().to_uppercase(),
            auditor: fields.auditor.trim().to_owned(),
            area: normalize_optional(fields.area),
            status: AuditStatus::initial(),
            planned_date: fields.planned_date,
            actual_date: None,
            findings: None,
            created_at: now,
            updated_at: now,
        };

        audit.validate()?;
        require_future("planned_date", audit.planned_date, now)?;

        Ok(audit)
    }

    /// Full invariant set, re-run by every mutation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_min_len("title", &self.title, TITLE_MIN_LEN)?;
        require_min_len("scope", &self.scope, SCOPE_MIN_LEN)?;
        require_present("audit_type", &self.audit_type)?;
        require_present("auditor", &self.auditor)?;
        require_storable("planned_date", Some(self.planned_date))?;
        require_storable("actual_date", self.actual_date)?;
        require_not_before(
            "actual_date",
            self.actual_date,
            "planned_date",
            self.planned_date,
        )
    }

    pub fn start(&mut self) -> Result<(), IllegalStateError> {
        self.status.require("start", &[AuditStatus::Planned])?;
        self.status = AuditStatus::InProgress;
        self.touch();
        Ok(())
    }

    pub fn complete(
        &mut self,
        actual_date: TimeStamp,
        findings: Option<String>,
    ) -> Result<(), TransitionError> {
        self.status.require("complete", &[AuditStatus::InProgress])?;
        self.apply(|next| {
            next.actual_date = Some(actual_date);
            next.findings = normalize_optional(findings).or(next.findings.take());
            next.status = AuditStatus::Completed;
        })?;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), IllegalStateError> {
        self.status
            .require("cancel", &[AuditStatus::Planned, AuditStatus::InProgress])?;
        self.status = AuditStatus::Cancelled;
        self.touch();
        Ok(())
    }

    pub fn reschedule(&mut self, planned_date: TimeStamp) -> Result<(), TransitionError> {
        self.reschedule_at(planned_date, TimeStamp::new())
    }

    pub fn reschedule_at(
        &mut self,
        planned_date: TimeStamp,
        now: TimeStamp,
    ) -> Result<(), TransitionError> {
        self.status
            .require("reschedule", &[AuditStatus::Planned, AuditStatus::InProgress])?;
        require_future("planned_date", planned_date, now)?;
        self.apply(|next| next.planned_date = planned_date)?;
        Ok(())
    }

    pub fn restore(&mut self) -> Result<(), IllegalStateError> {
        self.status.require("restore", &[AuditStatus::Cancelled])?;
        self.status = AuditStatus::initial();
        self.touch();
        Ok(())
    }

    pub fn update_info(&mut self, patch: AuditPatch) -> Result<(), ValidationError> {
        self.apply(|next| {
            if let Some(title) = patch.title {
                next.title = title.trim().to_owned();
            }
            if let Some(scope) = patch.scope {
                next.scope = scope.trim().to_owned();
            }
            if let Some(audit_type) = patch.audit_type {
                next.audit_type = audit_type.trim().to_uppercase();
            }
            if let Some(auditor) = patch.auditor {
                next.auditor = auditor.trim().to_owned();
            }
            if patch.area.is_some() {
                next.area = normalize_optional(patch.area);
            }
            if patch.findings.is_some() {
                next.findings = normalize_optional(patch.findings);
            }
        })
    }

    // mutate a copy, validate it, and only then commit
    fn apply(&mut self, change: impl FnOnce(&mut Self)) -> Result<(), ValidationError> {
        let mut next = self.clone();
        change(&mut next);
        next.validate()?;
        next.touch();
        *self = next;
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = TimeStamp::new().max(self.updated_at);
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn scope(&self) -> &str {
        &self.scope
    }
    pub fn audit_type(&self) -> &str {
        &self.audit_type
    }
    pub fn auditor(&self) -> &str {
        &self.auditor
    }
    pub fn area(&self) -> Option<&str> {
        self.area.as_deref()
    }
    pub fn planned_date(&self) -> TimeStamp {
        self.planned_date
    }
    pub fn actual_date(&self) -> Option<TimeStamp> {
        self.actual_date
    }
    pub fn findings(&self) -> Option<&str> {
        self.findings.as_deref()
    }
    pub fn created_at(&self) -> TimeStamp {
        self.created_at
    }
    pub fn updated_at(&self) -> TimeStamp {
        self.updated_at
    }
}

impl Scheduled for Audit {
    type Status = AuditStatus;

    fn status(&self) -> AuditStatus {
        self.status
    }

    fn planned_at(&self) -> TimeStamp {
        self.planned_date
    }
}
