//! Stored layouts of the aggregates and the pure mappings to and from them.
use super::audit::{Audit, AuditStatus};
use super::criteria::{OWNER_FIELD, PLANNED_FIELD, SortOrder, TITLE_FIELD, TYPE_FIELD};
use super::document::{Document, DocumentStatus};
use super::error::RepositoryError;
use super::lifecycle::Status;
use super::store::{FieldValue, Persisted, StoredRecord};
use super::types::{RecordId, TimeStamp};

// Key is the record id, value is this struct encoded into CBOR
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub title: String,
    #[n(2)]
    pub scope: String,
    #[n(3)]
    pub audit_type: String,
    #[n(4)]
    pub auditor: String,
    #[n(5)]
    pub area: Option<String>,
    #[n(6)]
    pub status: String,
    #[n(7)]
    pub planned_date: TimeStamp,
    #[n(8)]
    pub actual_date: Option<TimeStamp>,
    #[n(9)]
    pub findings: Option<String>,
    #[n(10)]
    pub created_at: TimeStamp,
    #[n(11)]
    pub updated_at: TimeStamp,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub code: String,
    #[n(2)]
    pub title: String,
    #[n(3)]
    pub doc_type: String,
    #[n(4)]
    pub owner: String,
    #[n(5)]
    pub status: String,
    #[n(6)]
    pub revision: u32,
    #[n(7)]
    pub review_date: TimeStamp,
    #[n(8)]
    pub approved_at: Option<TimeStamp>,
    #[n(9)]
    pub approver: Option<String>,
    #[n(10)]
    pub created_at: TimeStamp,
    #[n(11)]
    pub updated_at: TimeStamp,
}

fn text(value: &str) -> Option<FieldValue> {
    Some(FieldValue::Text(value.to_owned()))
}

fn unknown_status(key: &str, code: &str) -> RepositoryError {
    RepositoryError::Decode {
        key: key.to_owned(),
        reason: format!("unknown status `{code}`"),
    }
}

impl StoredRecord for AuditRecord {
    fn key(&self) -> &str {
        &self.id
    }
    fn status_code(&self) -> &str {
        &self.status
    }
    fn planned_at(&self) -> TimeStamp {
        self.planned_date
    }
    fn created_at(&self) -> TimeStamp {
        self.created_at
    }
    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => text(&self.id),
            TITLE_FIELD => text(&self.title),
            "scope" => text(&self.scope),
            TYPE_FIELD | "audit_type" => text(&self.audit_type),
            OWNER_FIELD | "auditor" => text(&self.auditor),
            "area" => self.area.as_deref().and_then(text),
            "status" => text(&self.status),
            PLANNED_FIELD => Some(FieldValue::Time(self.planned_date)),
            "actual_date" => self.actual_date.map(FieldValue::Time),
            "findings" => self.findings.as_deref().and_then(text),
            "created_at" => Some(FieldValue::Time(self.created_at)),
            "updated_at" => Some(FieldValue::Time(self.updated_at)),
            _ => None,
        }
    }
}

impl Persisted for Audit {
    type Record = AuditRecord;

    const ENTITY: &'static str = "audit";
    const TREE: &'static str = "audits";
    const EXACT_FIELDS: &'static [&'static str] = &[
        TITLE_FIELD,
        "scope",
        TYPE_FIELD,
        "audit_type",
        OWNER_FIELD,
        "auditor",
        "area",
    ];
    const TEXT_FIELDS: &'static [&'static str] = Self::EXACT_FIELDS;
    const RANGE_FIELDS: &'static [&'static str] =
        &[PLANNED_FIELD, "actual_date", "created_at", "updated_at"];
    const SORT_FIELDS: &'static [&'static str] = &[
        TITLE_FIELD,
        "audit_type",
        "auditor",
        "status",
        PLANNED_FIELD,
        "actual_date",
        "created_at",
        "updated_at",
    ];
    const DEFAULT_SORT: (&'static str, SortOrder) = (PLANNED_FIELD, SortOrder::Asc);
    const TYPE_FIELD: &'static str = TYPE_FIELD;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn to_record(&self) -> AuditRecord {
        AuditRecord {
            id: self.id.to_string(),
            title: self.title.clone(),
            scope: self.scope.clone(),
            audit_type: self.audit_type.clone(),
            auditor: self.auditor.clone(),
            area: self.area.clone(),
            status: self.status.code().to_owned(),
            planned_date: self.planned_date,
            actual_date: self.actual_date,
            findings: self.findings.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn from_record(record: AuditRecord) -> Result<Self, RepositoryError> {
        let status = AuditStatus::from_code(&record.status)
            .ok_or_else(|| unknown_status(&record.id, &record.status))?;

        Ok(Audit {
            id: RecordId::from_stored(record.id),
            title: record.title,
            scope: record.scope,
            audit_type: record.audit_type,
            auditor: record.auditor,
            area: record.area,
            status,
            planned_date: record.planned_date,
            actual_date: record.actual_date,
            findings: record.findings,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

impl StoredRecord for DocumentRecord {
    fn key(&self) -> &str {
        &self.id
    }
    fn status_code(&self) -> &str {
        &self.status
    }
    fn planned_at(&self) -> TimeStamp {
        self.review_date
    }
    fn created_at(&self) -> TimeStamp {
        self.created_at
    }
    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => text(&self.id),
            "code" => text(&self.code),
            TITLE_FIELD => text(&self.title),
            TYPE_FIELD | "doc_type" => text(&self.doc_type),
            OWNER_FIELD => text(&self.owner),
            "status" => text(&self.status),
            "revision" => Some(FieldValue::Number(i64::from(self.revision))),
            PLANNED_FIELD | "review_date" => Some(FieldValue::Time(self.review_date)),
            "approved_at" => self.approved_at.map(FieldValue::Time),
            "approver" => self.approver.as_deref().and_then(text),
            "created_at" => Some(FieldValue::Time(self.created_at)),
            "updated_at" => Some(FieldValue::Time(self.updated_at)),
            _ => None,
        }
    }
    fn unique_key(&self) -> Option<(&'static str, String)> {
        Some(("code", self.code.clone()))
    }
}

impl Persisted for Document {
    type Record = DocumentRecord;

    const ENTITY: &'static str = "document";
    const TREE: &'static str = "documents";
    const EXACT_FIELDS: &'static [&'static str] = &[
        "code",
        TITLE_FIELD,
        TYPE_FIELD,
        "doc_type",
        OWNER_FIELD,
        "revision",
        "approver",
    ];
    const TEXT_FIELDS: &'static [&'static str] = &[
        "code",
        TITLE_FIELD,
        TYPE_FIELD,
        "doc_type",
        OWNER_FIELD,
        "approver",
    ];
    const RANGE_FIELDS: &'static [&'static str] = &[
        PLANNED_FIELD,
        "review_date",
        "approved_at",
        "created_at",
        "updated_at",
    ];
    const SORT_FIELDS: &'static [&'static str] = &[
        "code",
        TITLE_FIELD,
        "doc_type",
        "status",
        "revision",
        "review_date",
        PLANNED_FIELD,
        "approved_at",
        "created_at",
        "updated_at",
    ];
    const DEFAULT_SORT: (&'static str, SortOrder) = ("created_at", SortOrder::Desc);
    const TYPE_FIELD: &'static str = TYPE_FIELD;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn to_record(&self) -> DocumentRecord {
        DocumentRecord {
            id: self.id.to_string(),
            code: self.code.clone(),
            title: self.title.clone(),
            doc_type: self.doc_type.clone(),
            owner: self.owner.clone(),
            status: self.status.code().to_owned(),
            revision: self.revision,
            review_date: self.review_date,
            approved_at: self.approved_at,
            approver: self.approver.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn from_record(record: DocumentRecord) -> Result<Self, RepositoryError> {
        let status = DocumentStatus::from_code(&record.status)
            .ok_or_else(|| unknown_status(&record.id, &record.status))?;

        Ok(Document {
            id: RecordId::from_stored(record.id),
            code: record.code,
            title: record.title,
            doc_type: record.doc_type,
            owner: record.owner,
            status,
            revision: record.revision,
            review_date: record.review_date,
            approved_at: record.approved_at,
            approver: record.approver,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditFields;
    use chrono::TimeDelta;

    #[test]
    fn audit_survives_the_record_mapping() {
        let mut audit = Audit::create(AuditFields {
            title: "Warehouse safety".into(),
            scope: "Forklift operation and storage racks".into(),
            audit_type: "INTERNAL".into(),
            auditor: "l.perez".into(),
            area: Some("Logistics".into()),
            planned_date: TimeStamp::new() + TimeDelta::days(3),
        })
        .unwrap();
        audit.start().unwrap();

        let bytes = minicbor::to_vec(audit.to_record()).unwrap();
        let record: AuditRecord = minicbor::decode(&bytes).unwrap();

        assert_eq!(Audit::from_record(record).unwrap(), audit);
    }

    #[test]
    fn unknown_status_is_a_decode_failure() {
        let mut record = Document::create(crate::document::DocumentFields {
            code: "MAN-01".into(),
            title: "Quality manual".into(),
            doc_type: "MANUAL".into(),
            owner: "quality".into(),
            review_date: TimeStamp::new() + TimeDelta::days(30),
        })
        .unwrap()
        .to_record();
        record.status = "ARCHIVED".into();

        assert!(matches!(
            Document::from_record(record),
            Err(RepositoryError::Decode { .. })
        ));
    }
}
