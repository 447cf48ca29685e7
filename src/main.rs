mod catalog;
mod client;
mod config;
mod export;
mod fanout;
mod import;
mod models;
mod output;
mod pagination;
mod resolve;

use crate::catalog::{ListView, TreeView};
use crate::client::{ApiClient, DEFAULT_BASE_URL};
use crate::config::{ConfigError, CredentialOverrides, Environment, mask_token};
use crate::fanout::{DEFAULT_MAX_CONCURRENT, DEFAULT_MIN_SPACING, FanOutLimits};
use crate::output::{Output, OutputFormat, RenderOpts, Table};
use anyhow::{Result, anyhow};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bcctl",
    version,
    about = "CLI for the BigCommerce catalog REST API"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "BC_STORE_HASH",
        help = "Store hash override for this invocation (otherwise read from the environment store)"
    )]
    store_hash: Option<String>,

    #[arg(
        long,
        global = true,
        env = "BC_ACCESS_TOKEN",
        hide_env_values = true,
        help = "Access token override for this invocation"
    )]
    access_token: Option<String>,

    #[arg(
        long = "env",
        global = true,
        value_name = "NAME",
        help = "Use a named environment instead of the default one"
    )]
    environment: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "Base URL for the API (defaults to https://api.bigcommerce.com)"
    )]
    base_url: Option<String>,

    #[arg(
        long,
        short = 'o',
        value_enum,
        default_value_t = OutputFormat::Table,
        global = true,
        help = "Output format (propagates to subcommands)"
    )]
    output: OutputFormat,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Write output to PATH instead of stdout"
    )]
    file: Option<PathBuf>,

    #[arg(
        long,
        value_name = "COLUMN",
        global = true,
        help = "Sort table rows by column (ascending)"
    )]
    sort_by: Option<String>,

    #[arg(
        long,
        value_name = "TEXT",
        global = true,
        help = "Filter rows containing TEXT (case-insensitive)"
    )]
    filter: Option<String>,

    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Log more to stderr (-v info, -vv debug)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage stored store credentials
    #[command(subcommand)]
    Env(EnvCommand),
    /// Catalog operations
    #[command(subcommand)]
    Catalog(CatalogCommand),
    /// Store administration
    #[command(subcommand)]
    Admin(AdminCommand),
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum EnvCommand {
    /// Add or update an environment
    Add {
        name: String,
        #[arg(value_name = "STORE_HASH")]
        hash: String,
        #[arg(value_name = "ACCESS_TOKEN")]
        token: String,
    },
    /// List configured environments
    List,
    /// Remove an environment
    Remove { name: String },
    /// Make an environment the default
    Use { name: String },
}

#[derive(Subcommand)]
enum CatalogCommand {
    /// Categories across all trees
    #[command(subcommand)]
    Categories(CategoriesCommand),
    /// Category trees
    #[command(subcommand)]
    CategoryTrees(CategoryTreesCommand),
    /// Products
    #[command(subcommand)]
    Products(ProductsCommand),
    /// Product variants
    #[command(subcommand)]
    Variants(VariantsCommand),
    /// Brands
    #[command(subcommand)]
    Brands(BrandsCommand),
}

#[derive(Subcommand)]
enum AdminCommand {
    /// Sales channels
    #[command(subcommand)]
    Channels(ChannelsCommand),
}

#[derive(Args, Clone, Default)]
struct QueryArgs {
    #[arg(
        long = "query",
        value_name = "KEY=VALUE",
        value_parser = parse_query_pair,
        help = "Extra query parameter sent with every page request (repeatable)"
    )]
    query: Vec<(String, String)>,
}

#[derive(Args, Clone, Default)]
struct FieldArgs {
    #[arg(
        long,
        value_name = "FIELD",
        value_delimiter = ',',
        help = "Append columns read from each entity by name"
    )]
    extra_fields: Vec<String>,
}

#[derive(Args, Clone, Default)]
struct FollowArgs {
    #[arg(long, help = "Show names instead of referenced ids")]
    follow_id: bool,
    #[arg(
        long,
        requires = "follow_id",
        help = "Fail when a referenced id cannot be resolved"
    )]
    strict_refs: bool,
}

#[derive(Subcommand)]
enum CategoriesCommand {
    /// List all categories
    GetAll {
        #[command(flatten)]
        follow: FollowArgs,
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Write every category to <FOLDER>/<id>~<name>.json
    Export {
        folder: PathBuf,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Create categories from a CSV file and link their parents
    Import {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

#[derive(Subcommand)]
enum CategoryTreesCommand {
    /// List all category trees
    GetAll,
    /// Show the categories of one tree
    Get {
        tree_id: u64,
        #[arg(long, help = "Only top-level categories")]
        top_level: bool,
        #[arg(long, help = "Emit JSON as a flat list without children")]
        flatten: bool,
        #[arg(long, help = "Drop parent_id from flattened JSON entries")]
        no_parent_id: bool,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Write every category tree to <FOLDER>/<id>~<name>.json
    Export { folder: PathBuf },
}

#[derive(Subcommand)]
enum ProductsCommand {
    /// List all products
    GetAll {
        #[command(flatten)]
        follow: FollowArgs,
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Show a single product
    Get {
        product_id: u64,
        #[command(flatten)]
        follow: FollowArgs,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Write every product to <FOLDER>/<id>~<name>.json
    Export {
        folder: PathBuf,
        #[arg(long, help = "Also export each product's variants")]
        include_variants: bool,
        #[arg(
            long,
            value_name = "N",
            default_value_t = DEFAULT_MAX_CONCURRENT,
            help = "Maximum variant requests in flight"
        )]
        concurrency: usize,
        #[arg(
            long,
            value_name = "MS",
            default_value_t = DEFAULT_MIN_SPACING.as_millis() as u64,
            help = "Minimum delay between variant request starts"
        )]
        min_spacing_ms: u64,
        #[command(flatten)]
        query: QueryArgs,
    },
}

#[derive(Subcommand)]
enum VariantsCommand {
    /// List the variants of a product
    GetAll {
        product_id: u64,
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Write a product's variants to <FOLDER>/<product_id>/<id>~<sku>.json
    Export {
        product_id: u64,
        folder: PathBuf,
        #[command(flatten)]
        query: QueryArgs,
    },
}

#[derive(Subcommand)]
enum BrandsCommand {
    /// List all brands
    GetAll {
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        fields: FieldArgs,
    },
}

#[derive(Subcommand)]
enum ChannelsCommand {
    /// List all channels
    GetAll {
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        fields: FieldArgs,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

fn list_view(follow: FollowArgs, fields: FieldArgs) -> ListView {
    ListView {
        follow_id: follow.follow_id,
        strict_refs: follow.strict_refs,
        extra_fields: fields.extra_fields,
    }
}

fn init_tracing(verbose: u8) {
    // -v wins over RUST_LOG; otherwise RUST_LOG or warn.
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let out = Output {
        format: cli.output,
        opts: RenderOpts {
            sort_by: cli.sort_by.clone(),
            filter: cli.filter.clone(),
            file: cli.file.clone(),
        },
    };
    let overrides = CredentialOverrides {
        environment: cli.environment.clone(),
        store_hash: cli.store_hash.clone(),
        access_token: cli.access_token.clone(),
    };

    match cli.command {
        Commands::Env(command) => handle_env(command, &config::config_path()?, &out),
        Commands::Completion { shell } => {
            use clap_complete::{generate, shells};
            let mut cmd = Cli::command();
            let bin = cmd.get_name().to_string();
            match shell {
                CompletionShell::Bash => {
                    generate(shells::Bash, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Zsh => {
                    generate(shells::Zsh, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Fish => {
                    generate(shells::Fish, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::PowerShell => {
                    generate(shells::PowerShell, &mut cmd, bin, &mut std::io::stdout())
                }
            }
            Ok(())
        }
        Commands::Catalog(command) => {
            let client = connect(overrides, cli.base_url.as_deref())?;
            handle_catalog(command, &client, &out).await
        }
        Commands::Admin(AdminCommand::Channels(ChannelsCommand::GetAll { query, fields })) => {
            let client = connect(overrides, cli.base_url.as_deref())?;
            catalog::channels_get_all(&client, &out, &query.query, &fields.extra_fields).await
        }
    }
}

fn connect(overrides: CredentialOverrides, base_url: Option<&str>) -> Result<ApiClient> {
    let credentials = config::resolve(&config::config_path()?, overrides)?;
    tracing::debug!(store_hash = credentials.store_hash.as_str(), "resolved credentials");
    Ok(ApiClient::new(
        base_url.unwrap_or(DEFAULT_BASE_URL),
        &credentials,
    )?)
}

async fn handle_catalog(command: CatalogCommand, client: &ApiClient, out: &Output) -> Result<()> {
    match command {
        CatalogCommand::Categories(command) => match command {
            CategoriesCommand::GetAll {
                follow,
                query,
                fields,
            } => {
                catalog::categories_get_all(client, out, &query.query, &list_view(follow, fields))
                    .await
            }
            CategoriesCommand::Export { folder, query } => {
                catalog::categories_export(client, &folder, &query.query).await
            }
            CategoriesCommand::Import { input } => {
                catalog::categories_import(client, &input).await.map(|_| ())
            }
        },
        CatalogCommand::CategoryTrees(command) => match command {
            CategoryTreesCommand::GetAll => catalog::category_trees_get_all(client, out).await,
            CategoryTreesCommand::Get {
                tree_id,
                top_level,
                flatten,
                no_parent_id,
                fields,
            } => {
                let view = TreeView {
                    top_level,
                    flatten,
                    no_parent_id,
                    extra_fields: fields.extra_fields,
                };
                catalog::category_tree_get(client, out, tree_id, &view).await
            }
            CategoryTreesCommand::Export { folder } => {
                catalog::category_trees_export(client, &folder).await
            }
        },
        CatalogCommand::Products(command) => match command {
            ProductsCommand::GetAll {
                follow,
                query,
                fields,
            } => {
                catalog::products_get_all(client, out, &query.query, &list_view(follow, fields))
                    .await
            }
            ProductsCommand::Get {
                product_id,
                follow,
                fields,
            } => catalog::product_get(client, out, product_id, &list_view(follow, fields)).await,
            ProductsCommand::Export {
                folder,
                include_variants,
                concurrency,
                min_spacing_ms,
                query,
            } => {
                let limits = FanOutLimits {
                    max_concurrent: concurrency,
                    min_spacing: Duration::from_millis(min_spacing_ms),
                };
                catalog::products_export(client, &folder, &query.query, include_variants, limits)
                    .await
                    .map(|_| ())
            }
        },
        CatalogCommand::Variants(command) => match command {
            VariantsCommand::GetAll {
                product_id,
                query,
                fields,
            } => {
                catalog::variants_get_all(client, out, product_id, &query.query, &fields.extra_fields)
                    .await
            }
            VariantsCommand::Export {
                product_id,
                folder,
                query,
            } => catalog::variants_export(client, &folder, product_id, &query.query).await,
        },
        CatalogCommand::Brands(BrandsCommand::GetAll { query, fields }) => {
            catalog::brands_get_all(client, out, &query.query, &fields.extra_fields).await
        }
    }
}

fn handle_env(command: EnvCommand, path: &Path, out: &Output) -> Result<()> {
    let mut store = config::load(path)?;

    match command {
        EnvCommand::Add { name, hash, token } => {
            let existed = store.get(&name).is_some();
            store.add(
                &name,
                Environment {
                    store_hash: hash,
                    access_token: token,
                },
            );
            config::save(path, &store)?;
            if existed {
                println!("Updated environment '{name}'");
            } else {
                println!("Added environment '{name}'");
            }
            if store.default_environment.as_deref() == Some(name.as_str()) {
                println!("'{name}' is the default environment");
            }
        }
        EnvCommand::List => {
            let entries = store.entries();
            if entries.is_empty() {
                println!("No environments configured");
                println!(
                    "Use \"bcctl env add <name> <store-hash> <access-token>\" to add an environment"
                );
                return Ok(());
            }

            let mut table = Table::new(["Environment", "Store Hash", "Access Token", "Default"]);
            let mut listing = Vec::with_capacity(entries.len());
            for entry in &entries {
                let masked = mask_token(&entry.environment.access_token);
                table.push(vec![
                    entry.name.to_string(),
                    entry.environment.store_hash.clone(),
                    masked.clone(),
                    if entry.is_default { "*".into() } else { String::new() },
                ]);
                listing.push(json!({
                    "name": entry.name,
                    "storeHash": entry.environment.store_hash,
                    "accessToken": masked,
                    "default": entry.is_default,
                }));
            }
            out.render(table, &listing)?;
        }
        EnvCommand::Remove { name } => {
            if !store.remove(&name) {
                return Err(anyhow!(ConfigError::UnknownEnvironment(name)));
            }
            config::save(path, &store)?;
            println!("Removed environment '{name}'");
            match store.default_environment.as_deref() {
                Some(next) => println!("Default environment is now '{next}'"),
                None => println!("No environments left"),
            }
        }
        EnvCommand::Use { name } => {
            if !store.set_default(&name) {
                return Err(anyhow!(ConfigError::UnknownEnvironment(name)));
            }
            config::save(path, &store)?;
            println!("Default environment set to '{name}'");
        }
    }

    Ok(())
}
