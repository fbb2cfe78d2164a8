//! Use cases for audits and documents.
//!
//! Services receive plain, already shape-checked data from the HTTP layer,
//! drive the aggregates through their transitions and persist the result.
//! Every failure comes back as a [`DomainError`]; nothing here inspects error
//! messages.
use super::audit::{Audit, AuditFields, AuditPatch, AuditStatus};
use super::config::SearchConfig;
use super::criteria::{CriteriaBuilder, SearchCriteria, SortOrder};
use super::document::{Document, DocumentFields, DocumentPatch, DocumentStatus};
use super::error::{DomainError, ValidationError};
use super::lifecycle::Status;
use super::predicate::Scheduled;
use super::repository::{Repository, SearchPage};
use super::store::Persisted;
use super::types::{RecordId, TimeStamp};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Raw listing parameters, one field per supported query-string key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub title: Option<String>,
    pub code: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub owner: Option<String>,
    pub from: Option<TimeStamp>,
    pub to: Option<TimeStamp>,
    #[serde(default)]
    pub overdue: bool,
    pub upcoming_days: Option<i64>,
    #[serde(default)]
    pub include_deleted: bool,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Turns raw parameters into criteria. Status codes are checked against the
/// entity's status set; blank values are treated as absent.
pub fn criteria_from_params<S: Status>(
    params: &SearchParams,
    config: &SearchConfig,
) -> Result<SearchCriteria, ValidationError> {
    let mut builder = CriteriaBuilder::new();

    if let Some(title) = non_blank(&params.title) {
        builder = builder.by_title(title);
    }
    if let Some(code) = non_blank(&params.code) {
        builder = builder.by_field("code", code.to_uppercase());
    }
    if let Some(status) = non_blank(&params.status) {
        let status = status.to_uppercase();
        if S::from_code(&status).is_none() {
            return Err(ValidationError::InvalidValue {
                field: "status",
                value: status,
            });
        }
        builder = builder.by_status(status);
    }
    if let Some(kind) = non_blank(&params.kind) {
        builder = builder.by_type(kind.to_uppercase());
    }
    if let Some(owner) = non_blank(&params.owner) {
        builder = builder.by_owner(owner);
    }
    if params.from.is_some() || params.to.is_some() {
        builder = builder.by_date_range(params.from, params.to);
    }
    if params.overdue {
        builder = builder.overdue();
    }
    if let Some(days) = params.upcoming_days {
        let window = TimeDelta::try_days(days)
            .filter(|w| *w >= TimeDelta::zero())
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "upcoming_days",
                value: days.to_string(),
            })?;
        builder = builder.upcoming(window);
    }
    if params.include_deleted {
        builder = builder.include_deleted();
    }

    let limit = params
        .limit
        .unwrap_or(config.default_page_size)
        .clamp(1, config.max_page_size.max(1));
    builder = match (params.offset, params.page) {
        (Some(offset), _) => builder.with_offset(offset, limit),
        (None, page) => builder.with_pagination(page.unwrap_or(1), limit),
    };

    if let Some(field) = non_blank(&params.sort_by) {
        let order = match non_blank(&params.sort_order) {
            Some(order) => order.parse::<SortOrder>()?,
            None => SortOrder::Asc,
        };
        builder = builder.with_sorting(field, order);
    }

    Ok(builder.build())
}

/// Aggregate counters for dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub overdue: usize,
}

fn statistics<E: Persisted>(repository: &dyn Repository<E>) -> Result<Statistics, DomainError> {
    Ok(Statistics {
        total: repository.count_total()?,
        by_status: repository.count_by_status()?,
        by_type: repository.count_by_type()?,
        overdue: repository.find_overdue(TimeStamp::new())?.len(),
    })
}

fn load<E: Persisted>(repository: &dyn Repository<E>, id: &RecordId) -> Result<E, DomainError> {
    repository
        .find_by_id(id)?
        .ok_or_else(|| DomainError::NotFound {
            entity: E::ENTITY,
            id: id.to_string(),
        })
}

/// Response record for an audit, derived predicates recomputed at `now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditView {
    pub id: RecordId,
    pub title: String,
    pub scope: String,
    pub audit_type: String,
    pub auditor: String,
    pub area: Option<String>,
    pub status: AuditStatus,
    pub planned_date: TimeStamp,
    pub actual_date: Option<TimeStamp>,
    pub findings: Option<String>,
    pub created_at: TimeStamp,
    pub updated_at: TimeStamp,
    pub is_overdue: bool,
    pub is_upcoming: bool,
    pub days_until_planned: i64,
    pub days_overdue: i64,
}

impl AuditView {
    pub fn at(audit: &Audit, now: TimeStamp, upcoming_window: TimeDelta) -> Self {
        Self {
            id: audit.id().clone(),
            title: audit.title().to_owned(),
            scope: audit.scope().to_owned(),
            audit_type: audit.audit_type().to_owned(),
            auditor: audit.auditor().to_owned(),
            area: audit.area().map(str::to_owned),
            status: audit.status(),
            planned_date: audit.planned_date(),
            actual_date: audit.actual_date(),
            findings: audit.findings().map(str::to_owned),
            created_at: audit.created_at(),
            updated_at: audit.updated_at(),
            is_overdue: audit.is_overdue_at(now),
            is_upcoming: audit.is_upcoming_at(upcoming_window, now),
            days_until_planned: audit.days_until_planned_at(now),
            days_overdue: audit.days_overdue_at(now),
        }
    }
}

pub struct AuditService {
    repository: Arc<dyn Repository<Audit>>,
    search: SearchConfig,
}

impl AuditService {
    pub fn new(repository: Arc<dyn Repository<Audit>>, search: SearchConfig) -> Self {
        Self { repository, search }
    }

    fn view(&self, audit: &Audit) -> AuditView {
        AuditView::at(audit, TimeStamp::new(), self.search.upcoming_window())
    }

    fn parse_id(raw: &str) -> Result<RecordId, DomainError> {
        Ok(RecordId::parse(crate::audit::ID_PREFIX, raw)?)
    }

    /// Load, apply one transition, write back.
    fn transition<T>(
        &self,
        raw_id: &str,
        change: impl FnOnce(&mut Audit) -> Result<(), T>,
    ) -> Result<AuditView, DomainError>
    where
        DomainError: From<T>,
    {
        let id = Self::parse_id(raw_id)?;
        let mut audit = load(self.repository.as_ref(), &id)?;
        change(&mut audit)?;
        self.repository.update(&audit)?;

        info!(id = %id, status = audit.status().code(), "audit updated");
        Ok(self.view(&audit))
    }

    pub fn create_audit(&self, fields: AuditFields) -> Result<AuditView, DomainError> {
        let audit = Audit::create(fields)?;
        self.repository.save(&audit)?;

        info!(id = %audit.id(), planned = %audit.planned_date(), "audit planned");
        Ok(self.view(&audit))
    }

    pub fn get_audit(&self, raw_id: &str) -> Result<AuditView, DomainError> {
        let id = Self::parse_id(raw_id)?;
        load(self.repository.as_ref(), &id).map(|audit| self.view(&audit))
    }

    pub fn search(&self, params: &SearchParams) -> Result<SearchPage<AuditView>, DomainError> {
        let criteria = criteria_from_params::<AuditStatus>(params, &self.search)?;
        self.search_criteria(&criteria)
    }

    pub fn search_criteria(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<SearchPage<AuditView>, DomainError> {
        let now = TimeStamp::new();
        let window = self.search.upcoming_window();
        let page = self.repository.find_by_criteria(criteria)?;
        Ok(page.map(|audit| AuditView::at(&audit, now, window)))
    }

    pub fn start_audit(&self, raw_id: &str) -> Result<AuditView, DomainError> {
        self.transition(raw_id, Audit::start)
    }

    pub fn complete_audit(
        &self,
        raw_id: &str,
        actual_date: TimeStamp,
        findings: Option<String>,
    ) -> Result<AuditView, DomainError> {
        self.transition(raw_id, |audit| audit.complete(actual_date, findings))
    }

    pub fn cancel_audit(&self, raw_id: &str) -> Result<AuditView, DomainError> {
        self.transition(raw_id, Audit::cancel)
    }

    pub fn reschedule_audit(
        &self,
        raw_id: &str,
        planned_date: TimeStamp,
    ) -> Result<AuditView, DomainError> {
        self.transition(raw_id, |audit| audit.reschedule(planned_date))
    }

    pub fn restore_audit(&self, raw_id: &str) -> Result<AuditView, DomainError> {
        self.transition(raw_id, Audit::restore)
    }

    pub fn update_audit(&self, raw_id: &str, patch: AuditPatch) -> Result<AuditView, DomainError> {
        self.transition(raw_id, |audit| audit.update_info(patch))
    }

    pub fn overdue_audits(&self) -> Result<Vec<AuditView>, DomainError> {
        let now = TimeStamp::new();
        let window = self.search.upcoming_window();
        Ok(self
            .repository
            .find_overdue(now)?
            .iter()
            .map(|audit| AuditView::at(audit, now, window))
            .collect())
    }

    pub fn upcoming_audits(&self) -> Result<Vec<AuditView>, DomainError> {
        let now = TimeStamp::new();
        let window = self.search.upcoming_window();
        Ok(self
            .repository
            .find_upcoming(window, now)?
            .iter()
            .map(|audit| AuditView::at(audit, now, window))
            .collect())
    }

    pub fn statistics(&self) -> Result<Statistics, DomainError> {
        statistics(self.repository.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: RecordId,
    pub code: String,
    pub title: String,
    pub doc_type: String,
    pub owner: String,
    pub status: DocumentStatus,
    pub revision: u32,
    pub review_date: TimeStamp,
    pub approved_at: Option<TimeStamp>,
    pub approver: Option<String>,
    pub created_at: TimeStamp,
    pub updated_at: TimeStamp,
    pub is_overdue: bool,
    pub days_until_review: i64,
    pub days_overdue: i64,
}

impl DocumentView {
    pub fn at(document: &Document, now: TimeStamp) -> Self {
        Self {
            id: document.id().clone(),
            code: document.code().to_owned(),
            title: document.title().to_owned(),
            doc_type: document.doc_type().to_owned(),
            owner: document.owner().to_owned(),
            status: document.status(),
            revision: document.revision(),
            review_date: document.review_date(),
            approved_at: document.approved_at(),
            approver: document.approver().map(str::to_owned),
            created_at: document.created_at(),
            updated_at: document.updated_at(),
            is_overdue: document.is_overdue_at(now),
            days_until_review: document.days_until_planned_at(now),
            days_overdue: document.days_overdue_at(now),
        }
    }
}

pub struct DocumentService {
    repository: Arc<dyn Repository<Document>>,
    search: SearchConfig,
}

impl DocumentService {
    pub fn new(repository: Arc<dyn Repository<Document>>, search: SearchConfig) -> Self {
        Self { repository, search }
    }

    fn parse_id(raw: &str) -> Result<RecordId, DomainError> {
        Ok(RecordId::parse(crate::document::ID_PREFIX, raw)?)
    }

    fn transition<T>(
        &self,
        raw_id: &str,
        change: impl FnOnce(&mut Document) -> Result<(), T>,
    ) -> Result<DocumentView, DomainError>
    where
        DomainError: From<T>,
    {
        let id = Self::parse_id(raw_id)?;
        let mut document = load(self.repository.as_ref(), &id)?;
        change(&mut document)?;
        self.repository.update(&document)?;

        info!(id = %id, status = document.status().code(), "document updated");
        Ok(DocumentView::at(&document, TimeStamp::new()))
    }

    /// The store enforces code uniqueness; a taken code surfaces as a conflict.
    pub fn create_document(&self, fields: DocumentFields) -> Result<DocumentView, DomainError> {
        let document = Document::create(fields)?;
        self.repository.save(&document)?;

        info!(id = %document.id(), code = document.code(), "document drafted");
        Ok(DocumentView::at(&document, TimeStamp::new()))
    }

    pub fn get_document(&self, raw_id: &str) -> Result<DocumentView, DomainError> {
        let id = Self::parse_id(raw_id)?;
        load(self.repository.as_ref(), &id).map(|doc| DocumentView::at(&doc, TimeStamp::new()))
    }

    pub fn search(&self, params: &SearchParams) -> Result<SearchPage<DocumentView>, DomainError> {
        let criteria = criteria_from_params::<DocumentStatus>(params, &self.search)?;
        self.search_criteria(&criteria)
    }

    pub fn search_criteria(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<SearchPage<DocumentView>, DomainError> {
        let now = TimeStamp::new();
        let page = self.repository.find_by_criteria(criteria)?;
        Ok(page.map(|doc| DocumentView::at(&doc, now)))
    }

    pub fn send_to_review(&self, raw_id: &str) -> Result<DocumentView, DomainError> {
        self.transition(raw_id, Document::send_to_review)
    }

    pub fn approve_document(
        &self,
        raw_id: &str,
        approved_at: TimeStamp,
        approver: &str,
    ) -> Result<DocumentView, DomainError> {
        self.transition(raw_id, |doc| doc.approve(approved_at, approver))
    }

    pub fn reject_document(&self, raw_id: &str) -> Result<DocumentView, DomainError> {
        self.transition(raw_id, Document::reject)
    }

    pub fn delete_document(&self, raw_id: &str) -> Result<DocumentView, DomainError> {
        self.transition(raw_id, Document::soft_delete)
    }

    pub fn restore_document(&self, raw_id: &str) -> Result<DocumentView, DomainError> {
        self.transition(raw_id, Document::restore)
    }

    pub fn reschedule_review(
        &self,
        raw_id: &str,
        review_date: TimeStamp,
    ) -> Result<DocumentView, DomainError> {
        self.transition(raw_id, |doc| doc.reschedule(review_date))
    }

    pub fn update_document(
        &self,
        raw_id: &str,
        patch: DocumentPatch,
    ) -> Result<DocumentView, DomainError> {
        self.transition(raw_id, |doc| doc.update_info(patch))
    }

    pub fn overdue_reviews(&self) -> Result<Vec<DocumentView>, DomainError> {
        let now = TimeStamp::new();
        Ok(self
            .repository
            .find_overdue(now)?
            .iter()
            .map(|doc| DocumentView::at(doc, now))
            .collect())
    }

    pub fn statistics(&self) -> Result<Statistics, DomainError> {
        statistics(self.repository.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::Page;

    #[test]
    fn params_map_onto_criteria() {
        let params = SearchParams {
            title: Some(" iso ".into()),
            status: Some("planned".into()),
            kind: Some("".into()),
            page: Some(3),
            limit: Some(500),
            sort_by: Some("planned_date".into()),
            sort_order: Some("desc".into()),
            ..SearchParams::default()
        };

        let criteria = criteria_from_params::<AuditStatus>(&params, &SearchConfig::default()).unwrap();

        assert_eq!(criteria.exact("status"), Some("PLANNED"));
        assert_eq!(criteria.exact("type"), None);
        assert_eq!(criteria.text_filters().collect::<Vec<_>>(), vec![("title", "iso")]);
        assert_eq!(criteria.page(), Page { offset: 200, limit: Some(100) });
        assert_eq!(criteria.sort().map(|s| s.order), Some(SortOrder::Desc));
    }

    #[test]
    fn unknown_status_codes_are_rejected_up_front() {
        let params = SearchParams {
            status: Some("BORRADOR".into()),
            ..SearchParams::default()
        };

        let err = criteria_from_params::<AuditStatus>(&params, &SearchConfig::default()).unwrap_err();

        assert!(matches!(err, ValidationError::InvalidValue { field: "status", .. }));
    }
}
