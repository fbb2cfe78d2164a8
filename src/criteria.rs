//! Search criteria value and its fluent builder.
//!
//! The builder only accumulates; it never validates and never talks to a store.
//! Field names are checked against the entity's allow-lists when a repository
//! translates the criteria.
use super::error::ValidationError;
use super::lifecycle::Phase;
use super::types::TimeStamp;
use chrono::TimeDelta;
use std::collections::BTreeMap;
use std::str::FromStr;

pub const STATUS_FIELD: &str = "status";
pub const TITLE_FIELD: &str = "title";
pub const TYPE_FIELD: &str = "type";
pub const OWNER_FIELD: &str = "owner";
pub const PLANNED_FIELD: &str = "planned_date";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            _ => Err(ValidationError::InvalidValue {
                field: "sort_order",
                value: s.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

/// Inclusive bounds; an open side is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<TimeStamp>,
    pub to: Option<TimeStamp>,
}

impl DateRange {
    pub fn contains(&self, at: TimeStamp) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

/// Offset/limit window. `limit: None` returns everything after `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Page {
    /// 1-based page number; page 0 is read as page 1 and a zero limit as 1.
    pub fn from_page(page: usize, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            offset: page.max(1).saturating_sub(1).saturating_mul(limit),
            limit: Some(limit),
        }
    }

    pub fn from_offset(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit.max(1)),
        }
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let rest = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => rest.take(limit).collect(),
            None => rest.collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchCriteria {
    exact: BTreeMap<String, String>,
    text: BTreeMap<String, String>,
    ranges: BTreeMap<String, DateRange>,
    overdue: bool,
    upcoming: Option<TimeDelta>,
    include_deleted: bool,
    as_of: Option<TimeStamp>,
    page: Page,
    sort: Option<Sort>,
}

impl SearchCriteria {
    pub fn exact_filters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.exact.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
    pub fn text_filters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.text.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
    pub fn date_ranges(&self) -> impl Iterator<Item = (&str, DateRange)> {
        self.ranges.iter().map(|(k, v)| (k.as_str(), *v))
    }
    pub fn exact(&self, field: &str) -> Option<&str> {
        self.exact.get(field).map(String::as_str)
    }
    pub fn overdue_only(&self) -> bool {
        self.overdue
    }
    pub fn upcoming_window(&self) -> Option<TimeDelta> {
        self.upcoming
    }
    pub fn includes_deleted(&self) -> bool {
        self.include_deleted
    }
    pub fn as_of(&self) -> Option<TimeStamp> {
        self.as_of
    }
    pub fn page(&self) -> Page {
        self.page
    }
    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    /// Status phases implied by the temporal shorthands.
    pub fn implied_phases(&self) -> Option<&'static [Phase]> {
        if self.upcoming.is_some() {
            Some(Phase::INITIAL_ONLY)
        } else if self.overdue {
            Some(Phase::NON_TERMINAL)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CriteriaBuilder {
    criteria: SearchCriteria,
}

impl CriteriaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact match on an allow-listed field, or `status`.
    pub fn by_field(mut self, field: &str, value: impl Into<String>) -> Self {
        self.criteria.exact.insert(field.to_owned(), value.into());
        self
    }
    /// Case-insensitive substring match on an allow-listed text field.
    pub fn by_text(mut self, field: &str, needle: impl Into<String>) -> Self {
        self.criteria.text.insert(field.to_owned(), needle.into());
        self
    }
    pub fn by_title(self, needle: impl Into<String>) -> Self {
        self.by_text(TITLE_FIELD, needle)
    }
    pub fn by_status(self, code: impl Into<String>) -> Self {
        self.by_field(STATUS_FIELD, code)
    }
    pub fn by_type(self, code: impl Into<String>) -> Self {
        self.by_field(TYPE_FIELD, code)
    }
    pub fn by_owner(self, owner: impl Into<String>) -> Self {
        self.by_field(OWNER_FIELD, owner)
    }
    pub fn by_date_range(self, from: Option<TimeStamp>, to: Option<TimeStamp>) -> Self {
        self.by_date_range_on(PLANNED_FIELD, from, to)
    }
    pub fn by_date_range_on(
        mut self,
        field: &str,
        from: Option<TimeStamp>,
        to: Option<TimeStamp>,
    ) -> Self {
        self.criteria
            .ranges
            .insert(field.to_owned(), DateRange { from, to });
        self
    }
    /// Planned instant passed while the record is still open.
    pub fn overdue(mut self) -> Self {
        self.criteria.overdue = true;
        self
    }
    /// Still in the initial status and planned within `window` from now.
    pub fn upcoming(mut self, window: TimeDelta) -> Self {
        self.criteria.upcoming = Some(window);
        self
    }
    /// Soft-deleted records are hidden unless asked for.
    pub fn include_deleted(mut self) -> Self {
        self.criteria.include_deleted = true;
        self
    }
    /// Evaluation instant for the temporal shorthands, wall clock when unset.
    pub fn as_of(mut self, now: TimeStamp) -> Self {
        self.criteria.as_of = Some(now);
        self
    }
    pub fn with_pagination(mut self, page: usize, limit: usize) -> Self {
        self.criteria.page = Page::from_page(page, limit);
        self
    }
    pub fn with_offset(mut self, offset: usize, limit: usize) -> Self {
        self.criteria.page = Page::from_offset(offset, limit);
        self
    }
    pub fn with_sorting(mut self, field: &str, order: SortOrder) -> Self {
        self.criteria.sort = Some(Sort {
            field: field.to_owned(),
            order,
        });
        self
    }

    pub fn build(&self) -> SearchCriteria {
        self.criteria.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_normalized_to_offset() {
        assert_eq!(Page::from_page(2, 10), Page { offset: 10, limit: Some(10) });
        assert_eq!(Page::from_page(0, 10), Page { offset: 0, limit: Some(10) });
        assert_eq!(Page::from_page(3, 0), Page { offset: 2, limit: Some(1) });
    }

    #[test]
    fn setters_overwrite_their_own_slot() {
        let criteria = CriteriaBuilder::new()
            .by_status("PLANNED")
            .with_pagination(1, 5)
            .by_status("IN_PROGRESS")
            .with_offset(40, 20)
            .build();

        assert_eq!(criteria.exact(STATUS_FIELD), Some("IN_PROGRESS"));
        assert_eq!(criteria.page(), Page { offset: 40, limit: Some(20) });
    }

    #[test]
    fn built_criteria_is_a_snapshot() {
        let builder = CriteriaBuilder::new().by_title("iso");
        let first = builder.build();

        let changed = builder.clone().by_title("safety").overdue().build();

        assert_eq!(first, builder.build());
        assert_ne!(first, changed);
        assert!(!first.overdue_only());
    }

    #[test]
    fn shorthands_imply_phases() {
        let overdue = CriteriaBuilder::new().overdue().build();
        let upcoming = CriteriaBuilder::new().upcoming(TimeDelta::days(7)).build();

        assert_eq!(overdue.implied_phases(), Some(Phase::NON_TERMINAL));
        assert_eq!(upcoming.implied_phases(), Some(Phase::INITIAL_ONLY));
        assert_eq!(CriteriaBuilder::new().build().implied_phases(), None);
    }

    #[test]
    fn sort_order_parses_loosely() {
        assert_eq!("DESC".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
