//! Repository contract and its sled implementation.
//!
//! Each aggregate lives in its own tree (`audits`, `documents`) with two
//! companion trees maintained in the same transaction as the record:
//! `<tree>.status` (`STATUS\0id` → empty) and `<tree>.unique` (business key → id).
use super::criteria::{CriteriaBuilder, Page, SearchCriteria};
use super::error::RepositoryError;
use super::store::{FieldValue, Persisted, Query, StoredRecord};
use super::types::{RecordId, TimeStamp};
use chrono::TimeDelta;
use sled::Tree;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, Transactional,
};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tracing::{debug, warn};

const INDEX_SEPARATOR: u8 = 0;

type TxResult = ConflictableTransactionResult<(), RepositoryError>;

/// One page of results plus the number of records matching before pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage<E> {
    pub items: Vec<E>,
    pub total: usize,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl<E> SearchPage<E> {
    pub fn map<T>(self, f: impl FnMut(E) -> T) -> SearchPage<T> {
        SearchPage {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

pub trait Repository<E: Persisted>: Send + Sync {
    /// Insert a new record; fails with `Duplicate` if the id or business key is taken.
    fn save(&self, entity: &E) -> Result<(), RepositoryError>;

    fn find_by_id(&self, id: &RecordId) -> Result<Option<E>, RepositoryError>;

    fn find_by_criteria(&self, criteria: &SearchCriteria) -> Result<SearchPage<E>, RepositoryError>;

    /// Full overwrite keyed by id; fails with `NotFound` if the id is gone.
    fn update(&self, entity: &E) -> Result<(), RepositoryError>;

    /// Physical removal, for aggregates without a soft-delete status.
    fn delete(&self, id: &RecordId) -> Result<(), RepositoryError>;

    fn count_total(&self) -> Result<usize, RepositoryError>;

    fn count_by_status(&self) -> Result<BTreeMap<String, usize>, RepositoryError>;

    fn count_by_type(&self) -> Result<BTreeMap<String, usize>, RepositoryError>;

    fn find_overdue(&self, now: TimeStamp) -> Result<Vec<E>, RepositoryError> {
        let criteria = CriteriaBuilder::new().overdue().as_of(now).build();
        Ok(self.find_by_criteria(&criteria)?.items)
    }

    fn find_upcoming(&self, window: TimeDelta, now: TimeStamp) -> Result<Vec<E>, RepositoryError> {
        let criteria = CriteriaBuilder::new().upcoming(window).as_of(now).build();
        Ok(self.find_by_criteria(&criteria)?.items)
    }
}

pub struct SledRepository<E> {
    records: Tree,
    statuses: Tree,
    uniques: Tree,
    flush_on_write: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Persisted> SledRepository<E> {
    pub fn open(db: &sled::Db, flush_on_write: bool) -> Result<Self, RepositoryError> {
        Ok(Self {
            records: db.open_tree(E::TREE)?,
            statuses: db.open_tree(format!("{}.status", E::TREE))?,
            uniques: db.open_tree(format!("{}.unique", E::TREE))?,
            flush_on_write,
            _entity: PhantomData,
        })
    }

    fn encode(record: &E::Record) -> Result<Vec<u8>, RepositoryError> {
        minicbor::to_vec(record).map_err(|e| RepositoryError::Encode {
            key: record.key().to_owned(),
            reason: e.to_string(),
        })
    }

    fn decode(key: &[u8], bytes: &[u8]) -> Result<E::Record, RepositoryError> {
        minicbor::decode(bytes).map_err(|e| RepositoryError::Decode {
            key: String::from_utf8_lossy(key).into_owned(),
            reason: e.to_string(),
        })
    }

    fn not_found(id: &str) -> RepositoryError {
        RepositoryError::NotFound {
            entity: E::ENTITY,
            id: id.to_owned(),
        }
    }

    fn flush(&self) -> Result<(), RepositoryError> {
        if self.flush_on_write {
            self.records.flush()?;
        }
        Ok(())
    }

    /// Candidate records for a query, narrowed through the status index when pinned.
    fn candidates(&self, query: &Query) -> Result<Vec<E::Record>, RepositoryError> {
        let mut records = Vec::new();

        match query.status() {
            Some(code) => {
                for entry in self.statuses.scan_prefix(status_prefix(code)) {
                    let (index_key, _) = entry?;
                    let id = &index_key[code.len() + 1..];
                    match self.records.get(id)? {
                        Some(bytes) => records.push(Self::decode(id, &bytes)?),
                        None => warn!(
                            entity = E::ENTITY,
                            id = %String::from_utf8_lossy(id),
                            "status index points at a missing record"
                        ),
                    }
                }
            }
            None => {
                for entry in self.records.iter() {
                    let (key, bytes) = entry?;
                    records.push(Self::decode(&key, &bytes)?);
                }
            }
        }

        Ok(records)
    }
}

fn status_prefix(code: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(code.len() + 1);
    prefix.extend_from_slice(code.as_bytes());
    prefix.push(INDEX_SEPARATOR);
    prefix
}

fn status_key(code: &str, id: &str) -> Vec<u8> {
    let mut key = status_prefix(code);
    key.extend_from_slice(id.as_bytes());
    key
}

fn into_repository_error(err: TransactionError<RepositoryError>) -> RepositoryError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => RepositoryError::Store(e),
    }
}

impl<E: Persisted> Repository<E> for SledRepository<E> {
    fn save(&self, entity: &E) -> Result<(), RepositoryError> {
        let record = entity.to_record();
        let id = record.key().to_owned();
        let bytes = Self::encode(&record)?;
        let index = status_key(record.status_code(), &id);
        let unique = record.unique_key();

        (&self.records, &self.statuses, &self.uniques)
            .transaction(|(records, statuses, uniques)| -> TxResult {
                if records.get(id.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        RepositoryError::Duplicate {
                            entity: E::ENTITY,
                            field: "id",
                            value: id.clone(),
                        },
                    ));
                }
                if let Some((field, value)) = &unique {
                    if uniques.get(value.as_bytes())?.is_some() {
                        return Err(ConflictableTransactionError::Abort(
                            RepositoryError::Duplicate {
                                entity: E::ENTITY,
                                field: *field,
                                value: value.clone(),
                            },
                        ));
                    }
                    uniques.insert(value.as_bytes(), id.as_bytes())?;
                }
                records.insert(id.as_bytes(), bytes.as_slice())?;
                statuses.insert(index.as_slice(), Vec::<u8>::new())?;
                Ok(())
            })
            .map_err(into_repository_error)?;

        self.flush()?;
        debug!(entity = E::ENTITY, id = %id, "record saved");
        Ok(())
    }

    fn find_by_id(&self, id: &RecordId) -> Result<Option<E>, RepositoryError> {
        match self.records.get(id.as_str())? {
            Some(bytes) => {
                let record = Self::decode(id.as_str().as_bytes(), &bytes)?;
                E::from_record(record).map(Some)
            }
            None => Ok(None),
        }
    }

    fn find_by_criteria(&self, criteria: &SearchCriteria) -> Result<SearchPage<E>, RepositoryError> {
        let now = criteria.as_of().unwrap_or_default();
        let query = Query::translate::<E>(criteria, now)?;

        let mut matched = Vec::new();
        for record in self.candidates(&query)? {
            let phase = E::phase_of(&record)?;
            if query.matches(&record, phase) {
                matched.push(record);
            }
        }

        let total = matched.len();
        query.sort(&mut matched);
        let Page { offset, limit } = query.window();

        let items = query
            .window()
            .apply(matched)
            .into_iter()
            .map(E::from_record)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            entity = E::ENTITY,
            total,
            returned = items.len(),
            offset,
            "criteria search executed"
        );

        Ok(SearchPage {
            items,
            total,
            offset,
            limit,
        })
    }

    fn update(&self, entity: &E) -> Result<(), RepositoryError> {
        let record = entity.to_record();
        let id = record.key().to_owned();
        let bytes = Self::encode(&record)?;
        let index = status_key(record.status_code(), &id);

        (&self.records, &self.statuses)
            .transaction(|(records, statuses)| -> TxResult {
                let previous = match records.get(id.as_bytes())? {
                    Some(previous) => previous,
                    None => return Err(ConflictableTransactionError::Abort(Self::not_found(&id))),
                };
                let previous = Self::decode(id.as_bytes(), &previous)
                    .map_err(ConflictableTransactionError::Abort)?;

                statuses.remove(status_key(previous.status_code(), &id))?;
                statuses.insert(index.as_slice(), Vec::<u8>::new())?;
                records.insert(id.as_bytes(), bytes.as_slice())?;
                Ok(())
            })
            .map_err(into_repository_error)?;

        self.flush()?;
        debug!(entity = E::ENTITY, id = %id, status = record.status_code(), "record updated");
        Ok(())
    }

    fn delete(&self, id: &RecordId) -> Result<(), RepositoryError> {
        let id = id.as_str();

        (&self.records, &self.statuses, &self.uniques)
            .transaction(|(records, statuses, uniques)| -> TxResult {
                let previous = match records.remove(id.as_bytes())? {
                    Some(previous) => previous,
                    None => return Err(ConflictableTransactionError::Abort(Self::not_found(id))),
                };
                let previous = Self::decode(id.as_bytes(), &previous)
                    .map_err(ConflictableTransactionError::Abort)?;

                statuses.remove(status_key(previous.status_code(), id))?;
                if let Some((_, value)) = previous.unique_key() {
                    uniques.remove(value.as_bytes())?;
                }
                Ok(())
            })
            .map_err(into_repository_error)?;

        self.flush()?;
        debug!(entity = E::ENTITY, id, "record deleted");
        Ok(())
    }

    fn count_total(&self) -> Result<usize, RepositoryError> {
        Ok(self.records.len())
    }

    fn count_by_status(&self) -> Result<BTreeMap<String, usize>, RepositoryError> {
        let mut counts = BTreeMap::new();

        for entry in self.statuses.iter() {
            let (key, _) = entry?;
            let code = key
                .split(|byte| *byte == INDEX_SEPARATOR)
                .next()
                .unwrap_or_default();
            *counts
                .entry(String::from_utf8_lossy(code).into_owned())
                .or_insert(0) += 1;
        }

        Ok(counts)
    }

    fn count_by_type(&self) -> Result<BTreeMap<String, usize>, RepositoryError> {
        let mut counts = BTreeMap::new();

        for entry in self.records.iter() {
            let (key, bytes) = entry?;
            let record = Self::decode(&key, &bytes)?;
            if let Some(FieldValue::Text(kind)) = record.field(E::TYPE_FIELD) {
                *counts.entry(kind).or_insert(0) += 1;
            }
        }

        Ok(counts)
    }
}
