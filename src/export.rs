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

//! One JSON file per entity: `<folder>/<id>~<slug>.json`.

use crate::client::{ApiClient, ApiError, Query};
use crate::fanout::{self, FanOutLimits, FanOutReport};
use crate::models::{Entity, Product, Variant};
use crate::output::to_json_string;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Replaces every character that is not an ASCII letter or digit with `-`.
pub fn slug(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

pub fn file_name<T: Entity>(entity: &T) -> String {
    format!("{}~{}.json", entity.id(), slug(entity.label()))
}

/// Writes each entity to its own file under `folder`, creating it if needed.
pub fn write_entities<T: Entity>(folder: &Path, entities: &[T]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(folder).with_context(|| format!("creating {}", folder.display()))?;

    let mut written = Vec::with_capacity(entities.len());
    for entity in entities {
        let path = folder.join(file_name(entity));
        let json = to_json_string(entity)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }
    tracing::info!(count = written.len(), folder = %folder.display(), "exported entities");
    Ok(written)
}

/// Variants of one product go to `<folder>/<product_id>/`.
pub fn write_variants(folder: &Path, product_id: u64, variants: &[Variant]) -> Result<Vec<PathBuf>> {
    write_entities(&folder.join(product_id.to_string()), variants)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub products: usize,
    pub variants: usize,
    /// Products whose variant listing failed.
    pub failed_products: Vec<u64>,
}

/// Fetches every product's variants through a throttled fan-out. One failed
/// product does not stop the others; failures are logged and listed in the
/// summary.
pub async fn export_products(
    client: &ApiClient,
    folder: &Path,
    products: &[Product],
    include_variants: bool,
    limits: FanOutLimits,
) -> Result<ExportSummary> {
    write_entities(folder, products)?;

    let mut summary = ExportSummary {
        products: products.len(),
        ..Default::default()
    };
    if !include_variants {
        return Ok(summary);
    }

    let tasks = products.iter().map(move |product| {
        let id = product.id;
        move || async move { client.variants(id, &[]).await }
    });
    let report = fanout::run_all(tasks, limits).await;
    tracing::info!(
        products = report.len(),
        failed = report.failure_count(),
        "fetched variants"
    );
    summary.variants = write_variant_report(folder, products, &report, &mut summary.failed_products)?;

    Ok(summary)
}

fn write_variant_report(
    folder: &Path,
    products: &[Product],
    report: &FanOutReport<Vec<Variant>, ApiError>,
    failed: &mut Vec<u64>,
) -> Result<usize> {
    for (idx, err) in report.failures() {
        let product_id = products[idx].id;
        tracing::error!(product_id, error = %err, "failed to fetch variants");
        failed.push(product_id);
    }

    let mut written = 0;
    for (idx, variants) in report.successes() {
        written += write_variants(folder, products[idx].id, variants)?.len();
    }
    Ok(written)
}

/// Exports the variants of a single product.
pub async fn export_variants(
    client: &ApiClient,
    folder: &Path,
    product_id: u64,
    query: &Query,
) -> Result<Vec<PathBuf>> {
    let variants = client
        .variants(product_id, query)
        .await
        .context("fetching variants")?;
    write_variants(folder, product_id, &variants)
}
