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

//! Resolution of numeric references (brand, parent, tree, category list)
//! against separately fetched collections.

use crate::models::Entity;
use std::collections::HashMap;
use thiserror::Error;

pub const LIST_DELIMITER: &str = ", ";

/// What to do with ids in a list reference that are not in the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolveMode {
    /// Drop them from the joined output.
    #[default]
    Lenient,
    /// Fail with the ids that could not be found.
    Strict,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{kind} reference(s) not found: {}", format_ids(.ids))]
pub struct UnresolvedReferences {
    pub kind: &'static str,
    pub ids: Vec<u64>,
}

fn format_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(LIST_DELIMITER)
}

/// Id → entity lookup over one collection. Built in full before any lookup,
/// so a child listed ahead of its parent still resolves.
#[derive(Debug)]
pub struct ReferenceIndex<'a, T> {
    kind: &'static str,
    by_id: HashMap<u64, &'a T>,
}

impl<'a, T: Entity> ReferenceIndex<'a, T> {
    pub fn build(kind: &'static str, items: &'a [T]) -> Self {
        let by_id = items.iter().map(|item| (item.id(), item)).collect();
        let index = Self { kind, by_id };
        tracing::debug!(kind, entries = index.len(), "built reference index");
        index
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn get(&self, id: u64) -> Option<&'a T> {
        self.by_id.get(&id).copied()
    }

    /// Label of the referenced entity, `None` when the id is not indexed.
    pub fn label(&self, id: u64) -> Option<&'a str> {
        self.get(id).map(Entity::label)
    }

    /// Same as [`label`](Self::label) for an optional foreign key.
    pub fn label_opt(&self, id: Option<u64>) -> Option<&'a str> {
        id.and_then(|id| self.label(id))
    }

    /// Resolves every id and joins the labels with `", "`.
    pub fn labels(&self, ids: &[u64], mode: ResolveMode) -> Result<String, UnresolvedReferences> {
        let mut labels = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();

        for id in ids {
            match self.label(*id) {
                Some(label) => labels.push(label),
                None => missing.push(*id),
            }
        }

        if !missing.is_empty() {
            if mode == ResolveMode::Strict {
                return Err(UnresolvedReferences {
                    kind: self.kind,
                    ids: missing,
                });
            }
            tracing::debug!(kind = self.kind, ?missing, "dropping unresolved references");
        }

        Ok(labels.join(LIST_DELIMITER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Brand, Category};

    fn category(id: u64, parent_id: u64, name: &str) -> Category {
        Category {
            category_id: id,
            parent_id,
            name: name.into(),
            ..Default::default()
        }
    }

    fn brand(id: u64, name: &str) -> Brand {
        Brand {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn resolves_known_ids_and_misses_unknown_ones() {
        let brands = vec![brand(1, "Acme"), brand(2, "Globex")];
        let index = ReferenceIndex::build("brand", &brands);

        assert_eq!(index.len(), 2);
        assert_eq!(index.label(2), Some("Globex"));
        assert_eq!(index.label(99), None);
        assert_eq!(index.label_opt(None), None);
        assert_eq!(index.label_opt(Some(1)), Some("Acme"));
    }

    #[test]
    fn child_before_parent_resolves_parent_name() {
        let categories = vec![category(20, 10, "Boots"), category(10, 0, "Shoes")];
        let index = ReferenceIndex::build("category", &categories);

        let parents: Vec<Option<&str>> = categories
            .iter()
            .map(|c| index.label(c.parent_id))
            .collect();
        assert_eq!(parents, vec![Some("Shoes"), None]);
    }

    #[test]
    fn lenient_list_drops_unresolved_ids() {
        let categories = vec![category(1, 0, "Shoes"), category(2, 0, "Hats")];
        let index = ReferenceIndex::build("category", &categories);

        let joined = index.labels(&[2, 404, 1], ResolveMode::Lenient).unwrap();
        assert_eq!(joined, "Hats, Shoes");
        assert_eq!(index.labels(&[], ResolveMode::Lenient).unwrap(), "");
    }

    #[test]
    fn strict_list_reports_unresolved_ids() {
        let categories = vec![category(1, 0, "Shoes")];
        let index = ReferenceIndex::build("category", &categories);

        let err = index
            .labels(&[1, 7, 8], ResolveMode::Strict)
            .unwrap_err();
        assert_eq!(err.ids, vec![7, 8]);
        assert_eq!(err.to_string(), "category reference(s) not found: 7, 8");
    }
}
