//! Controlled document aggregate.
//!
//! A document is drafted, sent to review and approved. A review can reject the
//! draft back to `BORRADOR`, which opens a new revision. Deletion is the
//! `ELIMINADO` status, undone by `restore`.
use super::error::{IllegalStateError, TransitionError, ValidationError};
use super::lifecycle::{Phase, Status};
use super::predicate::Scheduled;
use super::types::{RecordId, TimeStamp};
use super::validation::{
    normalize_optional, require_future, require_min_len, require_not_before, require_present,
    require_storable,
};
use serde::{Deserialize, Serialize};

pub const ID_PREFIX: &str = "doc_";
pub const CODE_MIN_LEN: usize = 3;
pub const TITLE_MIN_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    #[serde(rename = "BORRADOR")]
    Draft,
    #[serde(rename = "EN_REVISION")]
    InReview,
    #[serde(rename = "APROBADO")]
    Approved,
    #[serde(rename = "ELIMINADO")]
    Deleted,
}

impl Status for DocumentStatus {
    const ALL: &'static [Self] = &[
        DocumentStatus::Draft,
        DocumentStatus::InReview,
        DocumentStatus::Approved,
        DocumentStatus::Deleted,
    ];

    fn code(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "BORRADOR",
            DocumentStatus::InReview => "EN_REVISION",
            DocumentStatus::Approved => "APROBADO",
            DocumentStatus::Deleted => "ELIMINADO",
        }
    }

    fn phase(self) -> Phase {
        match self {
            DocumentStatus::Draft => Phase::Initial,
            DocumentStatus::InReview => Phase::Active,
            DocumentStatus::Approved => Phase::Completed,
            DocumentStatus::Deleted => Phase::Aborted,
        }
    }

    fn initial() -> Self {
        DocumentStatus::Draft
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentFields {
    pub code: String,
    pub title: String,
    pub doc_type: String,
    pub owner: String,
    pub review_date: TimeStamp,
}

/// The business code is the document's external identity and cannot be patched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub doc_type: Option<String>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub(crate) id: RecordId,
    pub(crate) code: String,
    pub(crate) title: String,
    pub(crate) doc_type: String,
    pub(crate) owner: String,
    pub(crate) status: DocumentStatus,
    pub(crate) revision: u32,
    pub(crate) review_date: TimeStamp,
    pub(crate) approved_at: Option<TimeStamp>,
    pub(crate) approver: Option<String>,
    pub(crate) created_at: TimeStamp,
    pub(crate) updated_at: TimeStamp,
}

impl Document {
    pub fn create(fields: DocumentFields) -> Result<Self, ValidationError> {
        Self::create_at(fields, TimeStamp::new())
    }

    pub fn create_at(fields: DocumentFields, now: TimeStamp) -> Result<Self, ValidationError> {
        let document = Self {
            id: RecordId::generate(ID_PREFIX)?,
            code: fields.code.trim().to_uppercase(),
            title: fields.title.trim().to_owned(),
            doc_type: fields.doc_type.trim().to_uppercase(),
            owner: fields.owner.trim().to_owned(),
            status: DocumentStatus::initial(),
            revision: 1,
            review_date: fields.review_date,
            approved_at: None,
            approver: None,
            created_at: now,
            updated_at: now,
        };

        document.validate()?;
        require_future("review_date", document.review_date, now)?;

        Ok(document)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_min_len("code", &self.code, CODE_MIN_LEN)?;
        require_min_len("title", &self.title, TITLE_MIN_LEN)?;
        require_present("doc_type", &self.doc_type)?;
        require_present("owner", &self.owner)?;
        require_storable("review_date", Some(self.review_date))?;
        require_storable("approved_at", self.approved_at)?;
        require_not_before(
            "approved_at",
            self.approved_at,
            "review_date",
            self.review_date,
        )
    }

    pub fn send_to_review(&mut self) -> Result<(), IllegalStateError> {
        self.status
            .require("send to review", &[DocumentStatus::Draft])?;
        self.status = DocumentStatus::InReview;
        self.touch();
        Ok(())
    }

    pub fn approve(&mut self, approved_at: TimeStamp, approver: &str) -> Result<(), TransitionError> {
        self.status.require("approve", &[DocumentStatus::InReview])?;
        require_present("approver", approver)?;
        self.apply(|next| {
            next.approved_at = Some(approved_at);
            next.approver = Some(approver.trim().to_owned());
            next.status = DocumentStatus::Approved;
        })?;
        Ok(())
    }

    /// Review rejected: back to draft under a new revision number.
    pub fn reject(&mut self) -> Result<(), IllegalStateError> {
        self.status.require("reject", &[DocumentStatus::InReview])?;
        self.status = DocumentStatus::Draft;
        self.revision = self.revision.saturating_add(1);
        self.touch();
        Ok(())
    }

    pub fn soft_delete(&mut self) -> Result<(), IllegalStateError> {
        self.status
            .require("delete", &[DocumentStatus::Draft, DocumentStatus::InReview])?;
        self.status = DocumentStatus::Deleted;
        self.touch();
        Ok(())
    }

    pub fn reschedule(&mut self, review_date: TimeStamp) -> Result<(), TransitionError> {
        self.reschedule_at(review_date, TimeStamp::new())
    }

    pub fn reschedule_at(
        &mut self,
        review_date: TimeStamp,
        now: TimeStamp,
    ) -> Result<(), TransitionError> {
        self.status.require(
            "reschedule",
            &[DocumentStatus::Draft, DocumentStatus::InReview],
        )?;
        require_future("review_date", review_date, now)?;
        self.apply(|next| next.review_date = review_date)?;
        Ok(())
    }

    pub fn restore(&mut self) -> Result<(), IllegalStateError> {
        self.status.require("restore", &[DocumentStatus::Deleted])?;
        self.status = DocumentStatus::initial();
        self.touch();
        Ok(())
    }

    pub fn update_info(&mut self, patch: DocumentPatch) -> Result<(), ValidationError> {
        self.apply(|next| {
            if let Some(title) = patch.title {
                next.title = title.trim().to_owned();
            }
            if let Some(doc_type) = patch.doc_type {
                next.doc_type = doc_type.trim().to_uppercase();
            }
            if let Some(owner) = patch.owner {
                next.owner = owner.trim().to_owned();
            }
        })
    }

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
    pub fn code(&self) -> &str {
        &self.code
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }
    pub fn owner(&self) -> &str {
        &self.owner
    }
    pub fn revision(&self) -> u32 {
        self.revision
    }
    pub fn review_date(&self) -> TimeStamp {
        self.review_date
    }
    pub fn approved_at(&self) -> Option<TimeStamp> {
        self.approved_at
    }
    pub fn approver(&self) -> Option<&str> {
        self.approver.as_deref()
    }
    pub fn created_at(&self) -> TimeStamp {
        self.created_at
    }
    pub fn updated_at(&self) -> TimeStamp {
        self.updated_at
    }
}

impl Scheduled for Document {
    type Status = DocumentStatus;

    fn status(&self) -> DocumentStatus {
        self.status
    }

    fn planned_at(&self) -> TimeStamp {
        self.review_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn draft() -> Document {
        Document::create(DocumentFields {
            code: "pr-001".into(),
            title: "Purchasing procedure".into(),
            doc_type: "procedure".into(),
            owner: "quality".into(),
            review_date: TimeStamp::new() + TimeDelta::days(10),
        })
        .unwrap()
    }

    #[test]
    fn rejection_opens_a_new_revision() {
        let mut doc = draft();
        assert_eq!(doc.code(), "PR-001");

        doc.send_to_review().unwrap();
        doc.reject().unwrap();

        assert_eq!(doc.status(), DocumentStatus::Draft);
        assert_eq!(doc.revision(), 2);
    }

    #[test]
    fn approval_requires_an_approver() {
        let mut doc = draft();
        doc.send_to_review().unwrap();
        let at = doc.review_date() + TimeDelta::hours(1);

        let err = doc.approve(at, "   ").unwrap_err();

        assert_eq!(
            err,
            TransitionError::Validation(ValidationError::Required { field: "approver" })
        );
        assert_eq!(doc.status(), DocumentStatus::InReview);
    }

    #[test]
    fn approved_documents_cannot_be_deleted() {
        let mut doc = draft();
        doc.send_to_review().unwrap();
        doc.approve(doc.review_date(), "director").unwrap();

        let err = doc.soft_delete().unwrap_err();

        assert_eq!(err.actual, "APROBADO");
        assert_eq!(doc.status(), DocumentStatus::Approved);
    }
}
