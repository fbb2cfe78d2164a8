//! Criteria translation: turns a [`SearchCriteria`] into a [`Query`] over stored
//! records, and defines the record ⇄ entity contract every persisted aggregate
//! implements.
//!
//! A `Query` is the store-native request. It only ever sees primitive records
//! (strings and instants), never entities, so filtering happens before anything
//! is rehydrated.
use super::criteria::{DateRange, Page, STATUS_FIELD, SearchCriteria, Sort, SortOrder};
use super::error::{RepositoryError, ValidationError};
use super::lifecycle::{Phase, Status};
use super::predicate::{self, Scheduled};
use super::types::{RecordId, TimeStamp};
use chrono::TimeDelta;
use std::cmp::Ordering;

/// Value of a queryable record field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldValue {
    Number(i64),
    Text(String),
    Time(TimeStamp),
}

impl FieldValue {
    fn equals(&self, expected: &str) -> bool {
        match self {
            FieldValue::Text(text) => text == expected,
            FieldValue::Number(n) => expected.trim().parse::<i64>().is_ok_and(|e| e == *n),
            FieldValue::Time(_) => false,
        }
    }

    fn contains(&self, needle_lowercase: &str) -> bool {
        match self {
            FieldValue::Text(text) => text.to_lowercase().contains(needle_lowercase),
            _ => false,
        }
    }
}

/// Primitive record as laid out in the store, CBOR encoded.
pub trait StoredRecord: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()> {
    fn key(&self) -> &str;
    fn status_code(&self) -> &str;
    fn planned_at(&self) -> TimeStamp;
    fn created_at(&self) -> TimeStamp;
    /// `None` for unset optional fields and for names the record does not know.
    fn field(&self, name: &str) -> Option<FieldValue>;
    /// Business key that must be unique across the tree, if any.
    fn unique_key(&self) -> Option<(&'static str, String)> {
        None
    }
}

/// Aggregate that can be written to and rehydrated from a [`StoredRecord`].
pub trait Persisted: Scheduled + Sized {
    type Record: StoredRecord;

    const ENTITY: &'static str;
    const TREE: &'static str;
    /// Fields accepted by exact-match filters, besides `status`.
    const EXACT_FIELDS: &'static [&'static str];
    /// Text fields accepted by substring filters.
    const TEXT_FIELDS: &'static [&'static str];
    /// Instant fields accepted by date ranges.
    const RANGE_FIELDS: &'static [&'static str];
    const SORT_FIELDS: &'static [&'static str];
    const DEFAULT_SORT: (&'static str, SortOrder);
    /// Field grouped by `count_by_type`.
    const TYPE_FIELD: &'static str;

    fn id(&self) -> &RecordId;
    fn to_record(&self) -> Self::Record;
    fn from_record(record: Self::Record) -> Result<Self, RepositoryError>;

    fn phase_of(record: &Self::Record) -> Result<Phase, RepositoryError> {
        Self::Status::from_code(record.status_code())
            .map(Status::phase)
            .ok_or_else(|| RepositoryError::Decode {
                key: record.key().to_owned(),
                reason: format!("unknown status `{}`", record.status_code()),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals { field: String, value: String },
    Contains { field: String, needle: String },
    Within { field: String, range: DateRange },
    PhaseIn(&'static [Phase]),
    NotAborted,
    Overdue { now: TimeStamp },
    Upcoming { now: TimeStamp, window: TimeDelta },
}

impl Condition {
    pub fn matches<R: StoredRecord>(&self, record: &R, phase: Phase) -> bool {
        match self {
            Condition::Equals { field, value } if field == STATUS_FIELD => {
                record.status_code() == value
            }
            Condition::Equals { field, value } => {
                record.field(field).is_some_and(|v| v.equals(value))
            }
            Condition::Contains { field, needle } => {
                record.field(field).is_some_and(|v| v.contains(needle))
            }
            Condition::Within { field, range } => match record.field(field) {
                Some(FieldValue::Time(at)) => range.contains(at),
                _ => false,
            },
            Condition::PhaseIn(phases) => phases.contains(&phase),
            Condition::NotAborted => phase != Phase::Aborted,
            Condition::Overdue { now } => predicate::is_overdue(phase, record.planned_at(), *now),
            Condition::Upcoming { now, window } => {
                predicate::is_upcoming(phase, record.planned_at(), *now, *window)
            }
        }
    }
}

/// Store-native request: a conjunction of conditions, an ordering and a window.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    conditions: Vec<Condition>,
    status: Option<String>,
    order: Sort,
    window: Page,
}

impl Query {
    pub fn translate<E: Persisted>(
        criteria: &SearchCriteria,
        now: TimeStamp,
    ) -> Result<Self, ValidationError> {
        let mut conditions = Vec::new();

        for (field, value) in criteria.exact_filters() {
            if field != STATUS_FIELD {
                allow_filter(E::EXACT_FIELDS, field)?;
            }
            conditions.push(Condition::Equals {
                field: field.to_owned(),
                value: value.to_owned(),
            });
        }
        for (field, needle) in criteria.text_filters() {
            allow_filter(E::TEXT_FIELDS, field)?;
            conditions.push(Condition::Contains {
                field: field.to_owned(),
                needle: needle.trim().to_lowercase(),
            });
        }
        for (field, range) in criteria.date_ranges() {
            allow_filter(E::RANGE_FIELDS, field)?;
            conditions.push(Condition::Within {
                field: field.to_owned(),
                range,
            });
        }

        if let Some(phases) = criteria.implied_phases() {
            conditions.push(Condition::PhaseIn(phases));
        }
        if criteria.overdue_only() {
            conditions.push(Condition::Overdue { now });
        }
        if let Some(window) = criteria.upcoming_window() {
            conditions.push(Condition::Upcoming { now, window });
        }

        // an explicit status filter is an explicit opt-in
        let status = criteria.exact(STATUS_FIELD).map(str::to_owned);
        if !criteria.includes_deleted() && status.is_none() {
            conditions.push(Condition::NotAborted);
        }

        let order = match criteria.sort() {
            Some(sort) if E::SORT_FIELDS.contains(&sort.field.as_str()) => sort.clone(),
            Some(sort) => return Err(ValidationError::UnsupportedSortField(sort.field.clone())),
            None => Sort {
                field: E::DEFAULT_SORT.0.to_owned(),
                order: E::DEFAULT_SORT.1,
            },
        };

        Ok(Self {
            conditions,
            status,
            order,
            window: criteria.page(),
        })
    }

    /// Exact status the query is pinned to; lets the store narrow through its status index.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn window(&self) -> Page {
        self.window
    }

    pub fn order(&self) -> &Sort {
        &self.order
    }

    pub fn matches<R: StoredRecord>(&self, record: &R, phase: Phase) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.matches(record, phase))
    }

    /// Requested order, then creation instant and key so equal values page stably.
    pub fn sort<R: StoredRecord>(&self, records: &mut [R]) {
        let field = self.order.field.as_str();
        records.sort_by(|a, b| {
            compare_fields(a.field(field), b.field(field), self.order.order)
                .then_with(|| a.created_at().cmp(&b.created_at()))
                .then_with(|| a.key().cmp(b.key()))
        });
    }
}

fn allow_filter(allowed: &[&str], field: &str) -> Result<(), ValidationError> {
    if allowed.contains(&field) {
        return Ok(());
    }
    Err(ValidationError::UnsupportedFilterField(field.to_owned()))
}

// unset values sort first ascending, last descending
fn compare_fields(a: Option<FieldValue>, b: Option<FieldValue>, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => a.cmp(&b),
        SortOrder::Desc => b.cmp(&a),
    }
}
