// bcctl - CLI for the BigCommerce catalog REST API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Two-phase category import.
//!
//! The API only accepts a `parent_id` that already exists, so a batch with
//! internal parent links is imported in two passes: every category is created
//! without a parent, then one bulk update attaches the parents using the ids
//! the first pass assigned. Rows are matched to created categories by their
//! URL path (the natural key); the CSV's own `category_id` / `parent_id`
//! columns only describe the hierarchy inside the file.

use crate::client::ApiError;
use crate::models::{Category, CategoryUpdate, CategoryUrl, NewCategory};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Parent value of a top-level row.
pub const ROOT_MARKER: &str = "0";

/// Bulk category endpoints the importer drives.
#[async_trait]
pub trait CategoryStore {
    async fn create_categories(&self, batch: &[NewCategory]) -> Result<Vec<Category>, ApiError>;
    async fn update_categories(&self, batch: &[CategoryUpdate])
    -> Result<Vec<Category>, ApiError>;
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("reading CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: `{column}` {reason}")]
    InvalidRow {
        row: usize,
        column: &'static str,
        reason: String,
    },
    #[error("row {row}: url `{url}` is already used by row {first}")]
    DuplicateUrl {
        row: usize,
        first: usize,
        url: String,
    },
    #[error(transparent)]
    Create(ApiError),
}

/// One category to import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    /// `category_id` column: the row's id inside the file.
    pub source_id: String,
    /// `parent_id` column: another row's `source_id`, or [`ROOT_MARKER`].
    pub parent_source_id: String,
    pub payload: NewCategory,
}

impl ImportRow {
    pub fn natural_key(&self) -> &str {
        &self.payload.url.path
    }

    pub fn is_root(&self) -> bool {
        self.parent_source_id == ROOT_MARKER
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    name: String,
    tree_id: String,
    is_visible: String,
    url: String,
    category_id: String,
    parent_id: String,
}

/// Parses the import CSV. Extra columns are ignored; a missing required
/// column, a bad value or a repeated `url` fails the whole file.
pub fn parse_csv(text: &str) -> Result<Vec<ImportRow>, ImportError> {
    let text = text.trim_start_matches('\u{FEFF}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (idx, record) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let row = idx + 2;
        let record = record?;

        let tree_id = record
            .tree_id
            .parse::<u64>()
            .map_err(|e| ImportError::InvalidRow {
                row,
                column: "tree_id",
                reason: format!("is not a number ({e})"),
            })?;
        let is_visible = match record.is_visible.to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            other => {
                return Err(ImportError::InvalidRow {
                    row,
                    column: "is_visible",
                    reason: format!("must be true or false, got `{other}`"),
                });
            }
        };
        if record.url.is_empty() {
            return Err(ImportError::InvalidRow {
                row,
                column: "url",
                reason: "is empty".into(),
            });
        }
        if let Some(first) = seen.insert(record.url.clone(), row) {
            return Err(ImportError::DuplicateUrl {
                row,
                first,
                url: record.url,
            });
        }

        rows.push(ImportRow {
            source_id: record.category_id,
            parent_source_id: record.parent_id,
            payload: NewCategory {
                name: record.name,
                tree_id,
                is_visible,
                url: CategoryUrl {
                    path: record.url,
                    is_customized: false,
                },
            },
        });
    }

    Ok(rows)
}

/// Where an import ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportState {
    /// Every queued parent link was applied (or there was nothing to do).
    Done,
    /// Categories exist but the parent update failed.
    PartiallyLinked { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub created: usize,
    pub linked: usize,
    pub skipped_root: usize,
    pub skipped_missing_parent: usize,
    pub state: ImportState,
}

impl ImportReport {
    /// Report of an import with nothing to do.
    pub fn empty() -> Self {
        Self {
            created: 0,
            linked: 0,
            skipped_root: 0,
            skipped_missing_parent: 0,
            state: ImportState::Done,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_root + self.skipped_missing_parent
    }
}

/// A created category matched back to the row it came from.
#[derive(Debug, Clone)]
pub struct Correlated<'a> {
    pub row: &'a ImportRow,
    pub created: &'a Category,
}

impl Correlated<'_> {
    pub fn assigned_id(&self) -> u64 {
        self.created.category_id
    }
}

/// Natural key → created category.
///
/// Created categories that echo the `url.path` of a row claim that row
/// first. The rest are paired in order with the rows nobody claimed.
pub fn correlate<'a>(
    rows: &'a [ImportRow],
    created: &'a [Category],
) -> HashMap<&'a str, Correlated<'a>> {
    if created.len() != rows.len() {
        tracing::warn!(
            submitted = rows.len(),
            returned = created.len(),
            "create response length differs from the submitted batch"
        );
    }

    let by_key: HashMap<&str, &ImportRow> = rows.iter().map(|r| (r.natural_key(), r)).collect();
    let mut map: HashMap<&str, Correlated<'a>> = HashMap::with_capacity(created.len());
    let mut unmatched = Vec::new();

    for category in created {
        let echoed = category.url.as_ref().map(|u| u.path.as_str());
        match echoed.and_then(|path| by_key.get(path).copied()) {
            Some(row) if !map.contains_key(row.natural_key()) => {
                map.insert(
                    row.natural_key(),
                    Correlated {
                        row,
                        created: category,
                    },
                );
            }
            _ => unmatched.push(category),
        }
    }

    let mut unclaimed = rows.iter().filter(|r| !map.contains_key(r.natural_key()));
    let mut pairs = Vec::with_capacity(unmatched.len());
    for category in unmatched {
        match unclaimed.next() {
            Some(row) => pairs.push((row, category)),
            None => tracing::warn!(
                category_id = category.category_id,
                "created category has no matching row"
            ),
        }
    }

    for (row, category) in pairs {
        if let Some(path) = category.url.as_ref().map(|u| u.path.as_str()) {
            tracing::warn!(
                expected = row.natural_key(),
                returned = path,
                "created category url differs from its row; pairing by position"
            );
        }
        map.insert(
            row.natural_key(),
            Correlated {
                row,
                created: category,
            },
        );
    }

    map
}

/// Parent links to submit in the second pass, plus skip counts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkPlan {
    pub updates: Vec<CategoryUpdate>,
    pub skipped_root: usize,
    pub skipped_missing_parent: usize,
}

pub fn plan_links(rows: &[ImportRow], correlated: &HashMap<&str, Correlated<'_>>) -> LinkPlan {
    let by_source_id: HashMap<&str, &Correlated<'_>> = correlated
        .values()
        .map(|c| (c.row.source_id.as_str(), c))
        .collect();

    let mut plan = LinkPlan::default();
    let mut planned: HashSet<u64> = HashSet::new();

    for row in rows {
        let Some(child) = correlated.get(row.natural_key()) else {
            // Never created, so there is nothing to link.
            continue;
        };

        if row.is_root() {
            plan.skipped_root += 1;
            continue;
        }

        let parent = by_source_id.get(row.parent_source_id.as_str());

        match parent {
            Some(parent) if planned.insert(child.assigned_id()) => {
                plan.updates.push(CategoryUpdate {
                    category_id: child.assigned_id(),
                    parent_id: parent.assigned_id(),
                });
            }
            Some(_) => {}
            None => {
                tracing::warn!(
                    url = row.natural_key(),
                    parent_id = row.parent_source_id.as_str(),
                    "could not find parent category; leaving it at the top level"
                );
                plan.skipped_missing_parent += 1;
            }
        }
    }

    plan
}

/// Runs both passes against `store`.
///
/// A failing create is returned as an error and nothing is linked. A failing
/// update is reported in [`ImportState::PartiallyLinked`]; the categories
/// created by the first pass are left in place.
pub async fn import_categories<S>(store: &S, rows: &[ImportRow]) -> Result<ImportReport, ImportError>
where
    S: CategoryStore + ?Sized,
{
    if rows.is_empty() {
        return Ok(ImportReport::empty());
    }

    let payloads: Vec<NewCategory> = rows.iter().map(|r| r.payload.clone()).collect();
    tracing::info!(count = payloads.len(), "creating categories without parents");
    let created = store
        .create_categories(&payloads)
        .await
        .map_err(ImportError::Create)?;
    tracing::info!(count = created.len(), "created categories");

    let correlated = correlate(rows, &created);
    let plan = plan_links(rows, &correlated);

    let mut report = ImportReport {
        created: created.len(),
        linked: 0,
        skipped_root: plan.skipped_root,
        skipped_missing_parent: plan.skipped_missing_parent,
        state: ImportState::Done,
    };

    if plan.updates.is_empty() {
        tracing::info!("no categories require parent updates");
        return Ok(report);
    }

    tracing::info!(count = plan.updates.len(), "updating parent relationships");
    match store.update_categories(&plan.updates).await {
        Ok(_) => report.linked = plan.updates.len(),
        Err(err) => {
            tracing::error!(error = %err, "parent update failed");
            report.state = ImportState::PartiallyLinked {
                error: err.to_string(),
            };
        }
    }

    Ok(report)
}
