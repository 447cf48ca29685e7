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

//! Catalog and admin command handlers: fetch, resolve references, render.

use crate::client::{ApiClient, Query};
use crate::export::{self, ExportSummary};
use crate::fanout::FanOutLimits;
use crate::import::{self, ImportReport, ImportState};
use crate::models::{
    Brand, Category, CategoryTree, Channel, Entity, Product, TreeCategory, Variant,
};
use crate::output::{Output, Table, cell, join_ids, value_to_str};
use crate::resolve::{ReferenceIndex, ResolveMode, UnresolvedReferences};
use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;

/// Flags shared by the list commands.
#[derive(Debug, Clone, Default)]
pub struct ListView {
    pub follow_id: bool,
    pub strict_refs: bool,
    pub extra_fields: Vec<String>,
}

impl ListView {
    fn mode(&self) -> ResolveMode {
        if self.strict_refs {
            ResolveMode::Strict
        } else {
            ResolveMode::Lenient
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreeView {
    pub top_level: bool,
    pub flatten: bool,
    pub no_parent_id: bool,
    pub extra_fields: Vec<String>,
}

fn with_extras<T: Entity>(mut row: Vec<String>, entity: &T, extra_fields: &[String]) -> Vec<String> {
    row.extend(extra_fields.iter().map(|f| value_to_str(&entity.field(f))));
    row
}

fn headers(base: &[&str], extra_fields: &[String]) -> Vec<String> {
    base.iter()
        .map(|h| h.to_string())
        .chain(extra_fields.iter().cloned())
        .collect()
}

/// With `trees` present, parent and tree ids are replaced by names.
pub fn category_table(
    categories: &[Category],
    trees: Option<&[CategoryTree]>,
    extra_fields: &[String],
) -> Table {
    let follow = trees.is_some();
    let mut table = Table::new(headers(
        &[
            "category_id",
            if follow { "parent_name" } else { "parent_id" },
            if follow { "tree_name" } else { "tree_id" },
            "name",
            "is_visible",
            "url",
        ],
        extra_fields,
    ));

    let parents = ReferenceIndex::build("category", categories);
    let trees = trees.map(|t| ReferenceIndex::build("category tree", t));

    for category in categories {
        let (parent, tree) = match &trees {
            Some(trees) => (
                cell(parents.label(category.parent_id)),
                cell(trees.label(category.tree_id)),
            ),
            None => (category.parent_id.to_string(), category.tree_id.to_string()),
        };
        let row = vec![
            category.category_id.to_string(),
            parent,
            tree,
            category.name.clone(),
            category.is_visible.to_string(),
            cell(category.url.as_ref().map(|u| u.path.as_str())),
        ];
        table.push(with_extras(row, category, extra_fields));
    }
    table
}

/// Lookups used by `--follow-id` on products.
pub struct ProductRefs<'a> {
    pub categories: ReferenceIndex<'a, Category>,
    pub brands: ReferenceIndex<'a, Brand>,
    pub mode: ResolveMode,
}

impl<'a> ProductRefs<'a> {
    pub fn build(categories: &'a [Category], brands: &'a [Brand], mode: ResolveMode) -> Self {
        Self {
            categories: ReferenceIndex::build("category", categories),
            brands: ReferenceIndex::build("brand", brands),
            mode,
        }
    }
}

/// Row layout of products. `with_description` adds the description column
/// used by the single product view.
pub fn product_table(
    products: &[Product],
    refs: Option<&ProductRefs<'_>>,
    with_description: bool,
    extra_fields: &[String],
) -> Result<Table, UnresolvedReferences> {
    let mut base = vec!["id", "name"];
    if with_description {
        base.push("description");
    }
    base.extend([
        "sku",
        "price",
        "sale_price",
        "categories",
        if refs.is_some() { "brand_name" } else { "brand_id" },
        "url",
    ]);
    let mut table = Table::new(headers(&base, extra_fields));

    for product in products {
        let (categories, brand) = match refs {
            Some(refs) => (
                refs.categories.labels(&product.categories, refs.mode)?,
                cell(refs.brands.label_opt(product.brand_id)),
            ),
            None => (join_ids(&product.categories), cell(product.brand_id)),
        };

        let mut row = vec![product.id.to_string(), product.name.clone()];
        if with_description {
            row.push(cell(product.description.as_deref()));
        }
        row.extend([
            cell(product.sku.as_deref()),
            cell(product.price.as_ref()),
            cell(product.sale_price.as_ref()),
            categories,
            brand,
            cell(product.custom_url.as_ref().map(|u| u.url.as_str())),
        ]);
        table.push(with_extras(row, product, extra_fields));
    }
    Ok(table)
}

pub fn variant_table(variants: &[Variant], extra_fields: &[String]) -> Table {
    let mut table = Table::new(headers(
        &[
            "id",
            "product_id",
            "sku",
            "sku_id",
            "price",
            "sale_price",
            "inventory_level",
            "option_values",
        ],
        extra_fields,
    ));
    for variant in variants {
        let row = vec![
            variant.id.to_string(),
            variant.product_id.to_string(),
            variant.sku.clone(),
            cell(variant.sku_id),
            cell(variant.price.as_ref()),
            cell(variant.sale_price.as_ref()),
            cell(variant.inventory_level),
            variant.option_summary(),
        ];
        table.push(with_extras(row, variant, extra_fields));
    }
    table
}

pub fn brand_table(brands: &[Brand], extra_fields: &[String]) -> Table {
    let mut table = Table::new(headers(
        &["id", "name", "image_url", "meta_keywords", "url"],
        extra_fields,
    ));
    for brand in brands {
        let row = vec![
            brand.id.to_string(),
            brand.name.clone(),
            cell(brand.image_url.as_deref()),
            brand.meta_keywords.join(","),
            cell(brand.custom_url.as_ref().map(|u| u.url.as_str())),
        ];
        table.push(with_extras(row, brand, extra_fields));
    }
    table
}

pub fn channel_table(channels: &[Channel], extra_fields: &[String]) -> Table {
    let mut table = Table::new(headers(
        &[
            "id",
            "name",
            "status",
            "type",
            "platform",
            "date_created",
            "is_listable_from_ui",
            "is_visible",
        ],
        extra_fields,
    ));
    for channel in channels {
        let row = vec![
            channel.id.to_string(),
            channel.name.clone(),
            cell(channel.status.as_deref()),
            cell(channel.channel_type.as_deref()),
            cell(channel.platform.as_deref()),
            cell(channel.date_created.as_deref()),
            cell(channel.is_listable_from_ui),
            cell(channel.is_visible),
        ];
        table.push(with_extras(row, channel, extra_fields));
    }
    table
}

pub fn tree_table(trees: &[CategoryTree]) -> Table {
    let mut table = Table::new(["id", "name", "channels"]);
    for tree in trees {
        let channels: Vec<String> = tree.channels.iter().map(u64::to_string).collect();
        table.push(vec![
            tree.id.to_string(),
            tree.name.clone(),
            channels.join(", "),
        ]);
    }
    table
}

pub fn tree_category_table(nodes: &[&TreeCategory], extra_fields: &[String]) -> Table {
    let mut table = Table::new(headers(
        &["id", "parent_id", "name", "is_visible", "path", "url"],
        extra_fields,
    ));
    for node in nodes {
        let row = vec![
            node.id.to_string(),
            cell(node.parent_id),
            node.name.clone(),
            node.is_visible.to_string(),
            join_ids(&node.path),
            cell(node.url.as_deref()),
        ];
        table.push(with_extras(row, *node, extra_fields));
    }
    table
}

pub async fn categories_get_all(
    client: &ApiClient,
    out: &Output,
    query: &Query,
    view: &ListView,
) -> Result<()> {
    let categories = client.categories(query).await?;
    let trees = if view.follow_id {
        Some(client.category_trees().await?)
    } else {
        None
    };
    let table = category_table(&categories, trees.as_deref(), &view.extra_fields);
    out.render(table, &categories)
}

pub async fn categories_export(client: &ApiClient, folder: &Path, query: &Query) -> Result<()> {
    let categories = client.categories(query).await?;
    let written = export::write_entities(folder, &categories)?;
    println!("Exported {} categories to {}", written.len(), folder.display());
    Ok(())
}

/// Reads the CSV, runs the two-phase import and prints the summary. A
/// failed parent update is reported and then turned into an error.
pub async fn categories_import(client: &ApiClient, file: &Path) -> Result<ImportReport> {
    println!("Reading CSV file: {}", file.display());
    let text =
        fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let rows = import::parse_csv(&text)?;

    if rows.is_empty() {
        tracing::warn!(file = %file.display(), "no data found in CSV file");
        println!("No data found in CSV file");
        return Ok(ImportReport::empty());
    }
    println!("Found {} categories to import", rows.len());

    let report = import::import_categories(client, &rows).await?;

    println!("Created: {} categories", report.created);
    println!("Updated: {} with parent relationships", report.linked);
    println!(
        "Skipped: {} (top-level: {}, missing parent: {})",
        report.skipped(),
        report.skipped_root,
        report.skipped_missing_parent
    );

    if let ImportState::PartiallyLinked { error } = &report.state {
        bail!("categories were created but linking parents failed: {error}");
    }
    Ok(report)
}

pub async fn category_trees_get_all(client: &ApiClient, out: &Output) -> Result<()> {
    let trees = client.category_trees().await?;
    out.render(tree_table(&trees), &trees)
}

pub async fn category_tree_get(
    client: &ApiClient,
    out: &Output,
    tree_id: u64,
    view: &TreeView,
) -> Result<()> {
    let roots = client.tree_categories(tree_id).await?;
    let nodes = TreeCategory::walk(&roots, view.top_level);
    let table = tree_category_table(&nodes, &view.extra_fields);

    if view.flatten {
        let flat: Vec<TreeCategory> = nodes
            .iter()
            .map(|node| node.detached(!view.no_parent_id))
            .collect();
        out.render(table, &flat)
    } else {
        out.render(table, &roots)
    }
}

pub async fn category_trees_export(client: &ApiClient, folder: &Path) -> Result<()> {
    let trees = client.category_trees().await?;
    let written = export::write_entities(folder, &trees)?;
    println!("Exported {} category trees to {}", written.len(), folder.display());
    Ok(())
}

pub async fn products_get_all(
    client: &ApiClient,
    out: &Output,
    query: &Query,
    view: &ListView,
) -> Result<()> {
    let products = client.products(query).await?;
    let table = if view.follow_id {
        let categories = client.categories(&[]).await?;
        let brands = client.brands(&[]).await?;
        let refs = ProductRefs::build(&categories, &brands, view.mode());
        product_table(&products, Some(&refs), false, &view.extra_fields)?
    } else {
        product_table(&products, None, false, &view.extra_fields)?
    };
    out.render(table, &products)
}

pub async fn product_get(
    client: &ApiClient,
    out: &Output,
    product_id: u64,
    view: &ListView,
) -> Result<()> {
    let product = client.product(product_id).await?;
    let products = std::slice::from_ref(&product);
    let table = if view.follow_id {
        let categories = client.categories(&[]).await?;
        let brands = client.brands(&[]).await?;
        let refs = ProductRefs::build(&categories, &brands, view.mode());
        product_table(products, Some(&refs), true, &view.extra_fields)?
    } else {
        product_table(products, None, true, &view.extra_fields)?
    };
    out.render_record(table, &product)
}

pub async fn products_export(
    client: &ApiClient,
    folder: &Path,
    query: &Query,
    include_variants: bool,
    limits: FanOutLimits,
) -> Result<ExportSummary> {
    let products = client.products(query).await?;
    let summary =
        export::export_products(client, folder, &products, include_variants, limits).await?;

    println!("Exported {} products to {}", summary.products, folder.display());
    if include_variants {
        println!("Exported {} variants", summary.variants);
    }
    if !summary.failed_products.is_empty() {
        eprintln!(
            "Failed to fetch variants for {} product(s): {}",
            summary.failed_products.len(),
            join_ids(&summary.failed_products)
        );
    }
    Ok(summary)
}

pub async fn variants_get_all(
    client: &ApiClient,
    out: &Output,
    product_id: u64,
    query: &Query,
    extra_fields: &[String],
) -> Result<()> {
    let variants = client.variants(product_id, query).await?;
    out.render(variant_table(&variants, extra_fields), &variants)
}

pub async fn variants_export(
    client: &ApiClient,
    folder: &Path,
    product_id: u64,
    query: &Query,
) -> Result<()> {
    let written = export::export_variants(client, folder, product_id, query).await?;
    println!(
        "Exported {} variants to {}",
        written.len(),
        folder.join(product_id.to_string()).display()
    );
    Ok(())
}

pub async fn brands_get_all(
    client: &ApiClient,
    out: &Output,
    query: &Query,
    extra_fields: &[String],
) -> Result<()> {
    let brands = client.brands(query).await?;
    out.render(brand_table(&brands, extra_fields), &brands)
}

pub async fn channels_get_all(
    client: &ApiClient,
    out: &Output,
    query: &Query,
    extra_fields: &[String],
) -> Result<()> {
    let channels = client.channels(query).await?;
    out.render(channel_table(&channels, extra_fields), &channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryUrl, CustomUrl};
    use serde_json::json;

    fn category(id: u64, parent_id: u64, name: &str) -> Category {
        Category {
            category_id: id,
            parent_id,
            tree_id: 1,
            name: name.into(),
            is_visible: true,
            url: Some(CategoryUrl {
                path: format!("/{}/", name.to_lowercase()),
                is_customized: false,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn category_rows_follow_ids_including_forward_parents() {
        // Child listed before its parent.
        let categories = vec![category(2, 1, "Boots"), category(1, 0, "Shoes")];
        let trees = vec![CategoryTree {
            id: 1,
            name: "Default".into(),
            ..Default::default()
        }];

        let table = category_table(&categories, Some(&trees), &[]);

        assert_eq!(table.headers[1], "parent_name");
        assert_eq!(table.rows[0][1], "Shoes");
        assert_eq!(table.rows[0][2], "Default");
        assert_eq!(table.rows[1][1], "");
        assert_eq!(table.rows[1][5], "/shoes/");
    }

    #[test]
    fn category_rows_keep_raw_ids_without_follow() {
        let categories = vec![category(2, 1, "Boots")];
        let table = category_table(&categories, None, &["sort_order".to_string()]);
        assert_eq!(table.headers, vec![
            "category_id",
            "parent_id",
            "tree_id",
            "name",
            "is_visible",
            "url",
            "sort_order"
        ]);
        assert_eq!(table.rows[0][..3], ["2", "1", "1"]);
        assert_eq!(table.rows[0][6], "");
    }

    fn product() -> Product {
        Product {
            id: 7,
            name: "Boot".into(),
            sku: Some("B-1".into()),
            price: Some(serde_json::Number::from(20)),
            categories: vec![1, 99, 2],
            brand_id: Some(3),
            custom_url: Some(CustomUrl {
                url: "/boot/".into(),
                is_customized: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn product_rows_resolve_categories_and_brand() {
        let categories = vec![category(1, 0, "Shoes"), category(2, 1, "Boots")];
        let brands = vec![Brand {
            id: 3,
            name: "Acme".into(),
            ..Default::default()
        }];
        let refs = ProductRefs::build(&categories, &brands, ResolveMode::Lenient);

        let table = product_table(&[product()], Some(&refs), false, &[]).unwrap();

        assert_eq!(table.headers[6], "brand_name");
        assert_eq!(table.rows[0][5], "Shoes, Boots");
        assert_eq!(table.rows[0][6], "Acme");
        assert_eq!(table.rows[0][7], "/boot/");
        assert_eq!(table.rows[0][3], "20");
    }

    #[test]
    fn strict_product_rows_fail_on_unknown_category() {
        let categories = vec![category(1, 0, "Shoes"), category(2, 1, "Boots")];
        let refs = ProductRefs::build(&categories, &[], ResolveMode::Strict);

        let err = product_table(&[product()], Some(&refs), false, &[]).unwrap_err();
        assert_eq!(err.ids, vec![99]);
    }

    #[test]
    fn single_product_view_adds_description() {
        let mut p = product();
        p.description = Some("<p>Warm</p>".into());
        let table = product_table(&[p], None, true, &[]).unwrap();
        assert_eq!(table.headers[2], "description");
        assert_eq!(table.rows[0][2], "<p>Warm</p>");
        assert_eq!(table.rows[0][6], "1,99,2");
        assert_eq!(table.rows[0][7], "3");
    }

    #[test]
    fn tree_rows_walk_depth_first() {
        let roots: Vec<TreeCategory> = serde_json::from_value(json!([
            {"id": 1, "name": "A", "path": [1], "children": [
                {"id": 2, "parent_id": 1, "name": "B", "path": [1, 2]}
            ]}
        ]))
        .unwrap();

        let nodes = TreeCategory::walk(&roots, false);
        let table = tree_category_table(&nodes, &[]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][..5], ["2", "1", "B", "false", "1,2"]);
    }

    #[test]
    fn variant_and_channel_rows() {
        let variants: Vec<Variant> = serde_json::from_value(json!([{
            "id": 4, "product_id": 7, "sku": "B-1-L", "inventory_level": 3,
            "option_values": [{"option_display_name": "Size", "label": "L"}]
        }]))
        .unwrap();
        let table = variant_table(&variants, &[]);
        assert_eq!(table.rows[0][6], "3");
        assert_eq!(table.rows[0][7], "Size=L");

        let channels: Vec<Channel> = serde_json::from_value(json!([{
            "id": 1, "name": "Storefront", "type": "storefront", "is_visible": true
        }]))
        .unwrap();
        let table = channel_table(&channels, &[]);
        assert_eq!(table.rows[0][3], "storefront");
        assert_eq!(table.rows[0][7], "true");
    }

    #[tokio::test]
    async fn header_only_import_makes_no_requests() {
        let server = httpmock::MockServer::start_async().await;
        let any = server
            .mock_async(|_, then| {
                then.status(500);
            })
            .await;
        let client = ApiClient::new(
            &server.base_url(),
            &crate::config::Credentials {
                store_hash: "h".into(),
                access_token: "t".into(),
            },
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("empty.csv");
        fs::write(&csv, "category_id,parent_id,name,tree_id,is_visible,url\n").unwrap();

        let report = categories_import(&client, &csv).await.unwrap();

        assert_eq!(report, ImportReport::empty());
        any.assert_hits_async(0).await;
    }
}
