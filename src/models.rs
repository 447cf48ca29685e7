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

//! Typed catalog entities.
//!
//! Each struct names the fields the CLI reads or correlates on. Everything
//! else the API returns is kept in `extra` so exports and `--extra-fields`
//! see the full record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Fields returned by the API that have no named slot on the struct.
pub type Extra = Map<String, Value>;

/// Common view over entities for rendering and exporting.
pub trait Entity: Serialize {
    /// Remote identifier.
    fn id(&self) -> u64;

    /// Human-readable label used for reference resolution and file slugs.
    fn label(&self) -> &str;

    /// Reads any field by name, including ones only present in `extra`.
    fn field(&self, name: &str) -> Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut(name).map(Value::take))
            .unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryUrl {
    pub path: String,
    #[serde(default)]
    pub is_customized: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomUrl {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_customized: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub category_id: u64,
    #[serde(default)]
    pub parent_id: u64,
    #[serde(default)]
    pub tree_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<CategoryUrl>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Entity for Category {
    fn id(&self) -> u64 {
        self.category_id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

/// Payload for the bulk category create call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCategory {
    pub name: String,
    pub tree_id: u64,
    pub is_visible: bool,
    pub url: CategoryUrl,
}

/// Element of the bulk category update call that attaches a parent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryUpdate {
    pub category_id: u64,
    pub parent_id: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryTree {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub channels: Vec<u64>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Entity for CategoryTree {
    fn id(&self) -> u64 {
        self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

/// Node of a single category tree as returned by `trees/{id}/categories`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TreeCategory {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default)]
    pub path: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeCategory>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Entity for TreeCategory {
    fn id(&self) -> u64 {
        self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

impl TreeCategory {
    /// Depth-first walk: every node is yielded before its children.
    /// With `top_level` only the roots are visited.
    pub fn walk<'a>(roots: &'a [TreeCategory], top_level: bool) -> Vec<&'a TreeCategory> {
        let mut out = Vec::new();
        let mut stack: Vec<&TreeCategory> = roots.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            if !top_level {
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// Copy of the node without children, for flattened JSON output.
    pub fn detached(&self, keep_parent_id: bool) -> TreeCategory {
        TreeCategory {
            children: Vec::new(),
            parent_id: if keep_parent_id { self.parent_id } else { None },
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<Number>,
    #[serde(default)]
    pub categories: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_url: Option<CustomUrl>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Entity for Product {
    fn id(&self) -> u64 {
        self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OptionValue {
    #[serde(default)]
    pub option_display_name: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Variant {
    pub id: u64,
    #[serde(default)]
    pub product_id: u64,
    #[serde(default)]
    pub sku: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_level: Option<i64>,
    #[serde(default)]
    pub option_values: Vec<OptionValue>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Entity for Variant {
    fn id(&self) -> u64 {
        self.id
    }

    // Variants carry no name; the SKU is what identifies them to a person.
    fn label(&self) -> &str {
        &self.sku
    }
}

impl Variant {
    /// `Size=L, Color=Red`
    pub fn option_summary(&self) -> String {
        self.option_values
            .iter()
            .map(|o| format!("{}={}", o.option_display_name, o.label))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Brand {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub meta_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_url: Option<CustomUrl>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Entity for Brand {
    fn id(&self) -> u64 {
        self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_listable_from_ui: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Entity for Channel {
    fn id(&self) -> u64 {
        self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}
