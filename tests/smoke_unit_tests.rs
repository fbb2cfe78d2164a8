//! Smoke screen unit tests for the record lifecycle components
//!
//! These tests span the public surface of the crate, exercising each piece in
//! isolation from the store-backed scenarios. They mostly walk the happy path
//! plus the one or two edge cases each piece exists for.

use business_records::{
    audit::{Audit, AuditFields, AuditStatus},
    criteria::{CriteriaBuilder, Page, SortOrder},
    document::{Document, DocumentFields, DocumentStatus},
    error::{ErrorKind, ValidationError},
    lifecycle::{Phase, Status},
    predicate::Scheduled,
    types::{RecordId, TimeStamp},
    utils::new_uuid_to_bech32,
};
use chrono::{Datelike, TimeDelta, Timelike, Utc};

fn fixed_now() -> TimeStamp {
    TimeStamp::new_with(2025, 3, 10, 9, 0, 0).unwrap()
}

fn audit_at(now: TimeStamp, days_ahead: i64) -> Audit {
    Audit::create_at(
        AuditFields {
            title: "Internal audit of purchasing".into(),
            scope: "Supplier selection and purchase orders".into(),
            audit_type: "internal".into(),
            auditor: "a.lopez".into(),
            area: None,
            planned_date: now + TimeDelta::days(days_ahead),
        },
        now,
    )
    .unwrap()
}

fn document_at(now: TimeStamp) -> Document {
    Document::create_at(
        DocumentFields {
            code: "fo-12".into(),
            title: "Nonconformity report form".into(),
            doc_type: "form".into(),
            owner: "quality".into(),
            review_date: now + TimeDelta::days(90),
        },
        now,
    )
    .unwrap()
}

// UTILS MODULE TESTS
#[cfg(test)]
mod utils_tests {
    use super::*;

    /// Generated identifiers carry their prefix as the bech32 human-readable part
    #[test]
    fn generates_valid_bech32_with_hrp() {
        let encoded = new_uuid_to_bech32("audit_").unwrap();

        assert!(encoded.starts_with("audit_1"));
        assert!(encoded.len() > 10);
    }

    #[test]
    fn handles_empty_hrp() {
        assert!(new_uuid_to_bech32("").is_err());
    }

    #[test]
    fn generates_unique_ids() {
        let id1 = RecordId::generate("doc_").unwrap();
        let id2 = RecordId::generate("doc_").unwrap();

        assert_ne!(id1, id2);
        assert!(id1 < id2 || id2 < id1);
    }

    /// Parsing checks the checksum and the prefix
    #[test]
    fn parse_rejects_foreign_and_corrupt_ids() {
        let id = RecordId::generate("audit_").unwrap();

        assert_eq!(RecordId::parse("audit_", id.as_str()).unwrap(), id);
        assert!(RecordId::parse("doc_", id.as_str()).is_err());

        let mut corrupt = id.to_string();
        let last = corrupt.pop().unwrap();
        corrupt.push(if last == 'q' { 'p' } else { 'q' });
        assert!(RecordId::parse("audit_", &corrupt).is_err());
    }
}

// TYPES MODULE TESTS
#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn timestamp_new_creates_current_time() {
        let ts = TimeStamp::new();
        let diff = (Utc::now() - ts.to_datetime_utc()).num_seconds().abs();

        assert!(diff < 1);
    }

    #[test]
    fn timestamp_new_with_creates_specific_time() {
        let dt = fixed_now().to_datetime_utc();

        assert_eq!((dt.year(), dt.month(), dt.day()), (2025, 3, 10));
        assert_eq!((dt.hour(), dt.minute()), (9, 0));
        assert!(TimeStamp::new_with(2025, 2, 30, 0, 0, 0).is_none());
    }

    /// Stored instants keep nanosecond precision through CBOR
    #[test]
    fn timestamp_cbor_roundtrip() {
        let original = TimeStamp::new();

        let encoded = minicbor::to_vec(original).unwrap();
        let decoded: TimeStamp = minicbor::decode(&encoded).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn timestamp_arithmetic() {
        let now = fixed_now();
        let later = now + TimeDelta::days(2);

        assert_eq!(later - now, TimeDelta::days(2));
        assert_eq!(later - TimeDelta::days(2), now);
    }
}

// LIFECYCLE MODULE TESTS
#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for status in AuditStatus::ALL {
            assert_eq!(AuditStatus::from_code(status.code()), Some(*status));
        }
        for status in DocumentStatus::ALL {
            assert_eq!(DocumentStatus::from_code(status.code()), Some(*status));
        }
        assert_eq!(AuditStatus::from_code("planned"), None);
    }

    /// Every status machine has exactly one status per phase
    #[test]
    fn one_status_per_phase() {
        for phase in [Phase::Initial, Phase::Active, Phase::Completed, Phase::Aborted] {
            assert_eq!(AuditStatus::codes_in(&[phase]).len(), 1);
            assert_eq!(DocumentStatus::codes_in(&[phase]).len(), 1);
        }
        assert_eq!(DocumentStatus::codes_in(&[Phase::Aborted]), ["ELIMINADO"]);
    }

    #[test]
    fn require_reports_allowed_statuses() {
        let err = AuditStatus::Completed
            .require("cancel", &[AuditStatus::Planned, AuditStatus::InProgress])
            .unwrap_err();

        assert_eq!(err.actual, "COMPLETED");
        assert_eq!(err.required, ["PLANNED", "IN_PROGRESS"]);
    }
}

// AUDIT MODULE TESTS
#[cfg(test)]
mod audit_tests {
    use super::*;

    #[test]
    fn create_normalizes_and_starts_planned() {
        let audit = audit_at(fixed_now(), 5);

        assert_eq!(audit.status(), AuditStatus::Planned);
        assert_eq!(audit.audit_type(), "INTERNAL");
        assert_eq!(audit.created_at(), audit.updated_at());
        assert!(audit.id().as_str().starts_with("audit_1"));
    }

    #[test]
    fn create_rejects_past_planned_date() {
        let now = fixed_now();
        let err = Audit::create_at(
            AuditFields {
                title: "Internal audit of purchasing".into(),
                scope: "Supplier selection and purchase orders".into(),
                audit_type: "internal".into(),
                auditor: "a.lopez".into(),
                area: None,
                planned_date: now,
            },
            now,
        )
        .unwrap_err();

        assert_eq!(err, ValidationError::NotInFuture { field: "planned_date" });
    }

    #[test]
    fn short_scope_is_reported_with_lengths() {
        let now = fixed_now();
        let err = Audit::create_at(
            AuditFields {
                title: "Internal audit".into(),
                scope: "  tiny  ".into(),
                audit_type: "internal".into(),
                auditor: "a.lopez".into(),
                area: None,
                planned_date: now + TimeDelta::days(1),
            },
            now,
        )
        .unwrap_err();

        assert_eq!(
            err,
            ValidationError::TooShort {
                field: "scope",
                min: 10,
                actual: 4
            }
        );
    }

    #[test]
    fn derived_predicates_follow_the_clock() {
        let now = fixed_now();
        let audit = audit_at(now, 3);

        assert!(audit.is_upcoming_at(TimeDelta::days(7), now));
        assert!(!audit.is_upcoming_at(TimeDelta::days(2), now));
        assert_eq!(audit.days_until_planned_at(now), 3);

        let later = now + TimeDelta::days(4) + TimeDelta::hours(1);
        assert!(audit.is_overdue_at(later));
        assert_eq!(audit.days_overdue_at(later), 2);
        assert_eq!(audit.days_until_planned_at(later), -1);
    }
}

// DOCUMENT MODULE TESTS
#[cfg(test)]
mod document_tests {
    use super::*;

    #[test]
    fn create_uppercases_code_and_type() {
        let doc = document_at(fixed_now());

        assert_eq!(doc.code(), "FO-12");
        assert_eq!(doc.doc_type(), "FORM");
        assert_eq!(doc.revision(), 1);
        assert_eq!(doc.status(), DocumentStatus::Draft);
    }

    #[test]
    fn approval_before_review_date_is_rejected() {
        let mut doc = document_at(fixed_now());
        doc.send_to_review().unwrap();

        let err = doc
            .approve(doc.review_date() - TimeDelta::days(1), "director")
            .unwrap_err();

        assert_eq!(
            business_records::error::DomainError::from(err).kind(),
            ErrorKind::Validation
        );
        assert_eq!(doc.status(), DocumentStatus::InReview);
        assert_eq!(doc.approver(), None);
    }

    #[test]
    fn deleted_documents_are_never_overdue() {
        let now = fixed_now();
        let mut doc = document_at(now);
        doc.soft_delete().unwrap();

        assert!(!doc.is_overdue_at(now + TimeDelta::days(365)));
        assert_eq!(doc.days_overdue_at(now + TimeDelta::days(365)), 0);
    }
}

// CRITERIA MODULE TESTS
#[cfg(test)]
mod criteria_tests {
    use super::*;

    #[test]
    fn builder_accumulates_without_validating() {
        let criteria = CriteriaBuilder::new()
            .by_field("no_such_field", "x")
            .with_sorting("nor_this", SortOrder::Desc)
            .with_pagination(2, 10)
            .build();

        assert_eq!(criteria.exact("no_such_field"), Some("x"));
        assert_eq!(criteria.page(), Page { offset: 10, limit: Some(10) });
    }

    #[test]
    fn error_kinds_map_to_http_statuses() {
        assert_eq!(ErrorKind::Validation.status_code(), 400);
        assert_eq!(ErrorKind::IllegalState.status_code(), 400);
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::Conflict.status_code(), 409);
        assert_eq!(ErrorKind::Persistence.status_code(), 500);
    }
}
