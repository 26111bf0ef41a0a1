//! Generic versioned collection storage.
//!
//! Every entity kind persists as one JSON document at a fixed key: a version
//! string plus an ordered record list, newest first. Operations are whole
//! document read-modify-write cycles. Reads self-heal: a missing, unreadable,
//! or malformed document is replaced by a fresh empty one and the caller never
//! sees the failure. Writes propagate their errors.
//!
//! Entity-specific behavior is configuration, not subclassing: a store is
//! built with its storage key plus optional validation and pre-insert
//! strategies.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::backend::KvBackend;
use crate::config::STORAGE_VERSION;
use crate::error::{StoreError, StoreResult};
use crate::ids::{generate_id, now_iso};

/// Identity and audit stamps carried by every stored record. The store owns
/// these fields: `id` and `created_at` are assigned once on insert, and
/// `updated_at` is refreshed on every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Contract for records a [`CollectionStore`] can hold: metadata access plus
/// the projections the search filters run against.
pub trait Record: Clone + Serialize + DeserializeOwned {
    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Text fields the keyword filter scans, e.g. name and description.
    fn keyword_fields(&self) -> Vec<&str>;

    /// Kind label for stores whose records are typed; `None` opts the record
    /// out of kind filtering.
    fn kind_label(&self) -> Option<&str> {
        None
    }

    fn author_id(&self) -> Option<&str> {
        None
    }

    fn tags(&self) -> &[String] {
        &[]
    }
}

/// The persisted wrapper around a record list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDoc<T> {
    /// Absent in documents written before version stamping; reads back empty
    /// and routes through migration, keeping the records.
    #[serde(default)]
    pub version: String,
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl<T> CollectionDoc<T> {
    /// Fresh document carrying the current version and no records.
    pub fn empty() -> Self {
        Self {
            version: STORAGE_VERSION.to_string(),
            data: Vec::new(),
            updated_at: None,
        }
    }
}

/// How a requested tag set must relate to a record's tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagMatch {
    /// At least one requested tag present.
    Any,
    /// Every requested tag present.
    #[default]
    All,
}

/// Conjunctive search filters; an empty criteria set matches every record.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    /// Case-insensitive substring matched against the record's keyword fields
    /// and tags. Blank keywords are ignored.
    pub keyword: Option<String>,
    /// Kind to keep; `"all"` (or `None`) disables the filter.
    pub kind: Option<String>,
    /// Exact author id.
    pub author_id: Option<String>,
    /// Tags to match according to `match_mode`.
    pub tags: Vec<String>,
    pub match_mode: TagMatch,
}

/// One tag with the number of records carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Entity validation strategy, run before anything is stamped or written.
pub type Validator<T> = fn(&T) -> Result<(), StoreError>;

/// Pre-insert normalization strategy, e.g. resetting counters.
pub type Prepare<T> = fn(&mut T);

/// Store for one entity kind, generic over the record type.
pub struct CollectionStore<T: Record> {
    backend: Arc<dyn KvBackend>,
    key: &'static str,
    validator: Option<Validator<T>>,
    prepare: Option<Prepare<T>>,
}

impl<T: Record> CollectionStore<T> {
    pub fn new(backend: Arc<dyn KvBackend>, key: &'static str) -> Self {
        Self {
            backend,
            key,
            validator: None,
            prepare: None,
        }
    }

    pub fn with_validator(mut self, validator: Validator<T>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_prepare(mut self, prepare: Prepare<T>) -> Self {
        self.prepare = Some(prepare);
        self
    }

    /// Writes an empty document if the key holds nothing yet. Idempotent.
    pub fn init(&self) -> StoreResult<()> {
        if self.backend.get(self.key)?.is_none() {
            self.save(&mut CollectionDoc::empty())?;
        }
        Ok(())
    }

    /// Reads the backing document. Never fails: missing, unreadable, and
    /// malformed documents come back as a fresh empty one, and version drift
    /// is migrated in memory.
    pub fn get_all(&self) -> CollectionDoc<T> {
        let raw = match self.backend.get(self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return CollectionDoc::empty(),
            Err(e) => {
                warn!("Failed to read {}: {e}", self.key);
                return CollectionDoc::empty();
            }
        };
        match serde_json::from_str::<CollectionDoc<T>>(&raw) {
            Ok(doc) => self.migrate(doc),
            Err(e) => {
                warn!("Malformed document at {}; starting fresh: {e}", self.key);
                CollectionDoc::empty()
            }
        }
    }

    /// Version-drift hook: records carry over unchanged and the document is
    /// stamped with the current version. In memory only; the next save
    /// persists the stamp.
    fn migrate(&self, mut doc: CollectionDoc<T>) -> CollectionDoc<T> {
        if doc.version != STORAGE_VERSION {
            info!(
                "Migrating {} from version {} to {}",
                self.key, doc.version, STORAGE_VERSION
            );
            doc.version = STORAGE_VERSION.to_string();
        }
        doc
    }

    /// Stamps the document and writes it whole. The one place write failures
    /// surface from.
    pub fn save(&self, doc: &mut CollectionDoc<T>) -> StoreResult<()> {
        doc.version = STORAGE_VERSION.to_string();
        doc.updated_at = Some(now_iso());
        let raw = serde_json::to_string_pretty(doc)?;
        self.backend.put(self.key, &raw)
    }

    /// Validates, stamps, prepends, persists. Returns the record as stored.
    pub fn add(&self, mut item: T) -> StoreResult<T> {
        if let Some(validator) = self.validator {
            validator(&item)?;
        }
        if let Some(prepare) = self.prepare {
            prepare(&mut item);
        }

        let stamp = now_iso();
        let meta = item.meta_mut();
        meta.id = generate_id();
        meta.created_at = stamp.clone();
        meta.updated_at = stamp;

        let mut doc = self.get_all();
        doc.data.insert(0, item.clone());
        self.save(&mut doc)?;
        Ok(item)
    }

    /// Applies `mutate` to the record with `id` and persists the result.
    /// Identity is frozen: whatever `mutate` does, the stored record keeps
    /// its `id` and `created_at`, and `updated_at` is refreshed. Returns
    /// `None` without writing when no record matches; never creates one.
    pub fn update(&self, id: &str, mutate: impl FnOnce(&mut T)) -> StoreResult<Option<T>> {
        let mut doc = self.get_all();
        let index = match doc.data.iter().position(|r| r.meta().id == id) {
            Some(index) => index,
            None => return Ok(None),
        };

        let record = &mut doc.data[index];
        let created_at = record.meta().created_at.clone();
        mutate(record);
        let meta = record.meta_mut();
        meta.id = id.to_string();
        meta.created_at = created_at;
        meta.updated_at = now_iso();

        let updated = record.clone();
        self.save(&mut doc)?;
        Ok(Some(updated))
    }

    /// Removes the record with `id`. Removing an absent id is a no-op that
    /// still succeeds.
    pub fn delete(&self, id: &str) -> StoreResult<()> {
        let mut doc = self.get_all();
        doc.data.retain(|r| r.meta().id != id);
        self.save(&mut doc)
    }

    pub fn get_by_id(&self, id: &str) -> Option<T> {
        self.get_all().data.into_iter().find(|r| r.meta().id == id)
    }

    /// Applies the criteria's filters conjunctively. Records keep their
    /// stored order; stored data is never mutated.
    pub fn search(&self, criteria: &SearchCriteria) -> Vec<T> {
        let keyword = criteria
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|kw| !kw.is_empty())
            .map(str::to_lowercase);

        self.get_all()
            .data
            .into_iter()
            .filter(|record| {
                if let Some(kw) = &keyword {
                    let in_fields = record
                        .keyword_fields()
                        .iter()
                        .any(|field| field.to_lowercase().contains(kw));
                    let in_tags = record
                        .tags()
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(kw));
                    if !in_fields && !in_tags {
                        return false;
                    }
                }
                if let Some(kind) = criteria.kind.as_deref() {
                    if kind != "all" && record.kind_label() != Some(kind) {
                        return false;
                    }
                }
                if let Some(author_id) = criteria.author_id.as_deref() {
                    if record.author_id() != Some(author_id) {
                        return false;
                    }
                }
                if !criteria.tags.is_empty() {
                    let tags = record.tags();
                    let matched = match criteria.match_mode {
                        TagMatch::Any => criteria.tags.iter().any(|t| tags.contains(t)),
                        TagMatch::All => criteria.tags.iter().all(|t| tags.contains(t)),
                    };
                    if !matched {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    /// Union of every record's tags, deduplicated and sorted.
    pub fn get_all_tags(&self) -> Vec<String> {
        let mut tags = BTreeSet::new();
        for record in self.get_all().data {
            tags.extend(record.tags().iter().cloned());
        }
        tags.into_iter().collect()
    }

    /// Number of records carrying each tag, most used first. Ties keep
    /// alphabetical order.
    pub fn get_tags_with_count(&self) -> Vec<TagCount> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in self.get_all().data {
            for tag in record.tags() {
                *counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        let mut out: Vec<TagCount> = counts
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count));
        out
    }

    /// Records carrying `tag` exactly, in stored order, at most `limit`.
    pub fn get_by_tag(&self, tag: &str, limit: usize) -> Vec<T> {
        self.get_all()
            .data
            .into_iter()
            .filter(|r| r.tags().iter().any(|t| t == tag))
            .take(limit)
            .collect()
    }

    /// Empties the record list, preserving the document wrapper.
    pub fn clear(&self) -> StoreResult<()> {
        let mut doc = self.get_all();
        doc.data.clear();
        self.save(&mut doc)
    }
}
