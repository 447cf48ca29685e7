// Integration tests for bcctl

use assert_cmd::cargo::cargo_bin_cmd;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn bcctl(config_dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("bcctl");
    cmd.env("BCCTL_CONFIG_DIR", config_dir.path())
        .env_remove("BC_STORE_HASH")
        .env_remove("BC_ACCESS_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_command_groups() {
    let dir = TempDir::new().unwrap();
    bcctl(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("env"))
        .stdout(predicate::str::contains("catalog"))
        .stdout(predicate::str::contains("admin"))
        .stdout(predicate::str::contains("--store-hash"));
}

#[test]
fn test_product_export_has_rate_limit_flags() {
    let dir = TempDir::new().unwrap();
    bcctl(&dir)
        .args(["catalog", "products", "export", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--include-variants"))
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--min-spacing-ms"));
}

#[test]
fn test_environment_lifecycle() {
    let dir = TempDir::new().unwrap();

    bcctl(&dir)
        .args(["env", "add", "staging", "hash-s", "tok-staging-0123456789"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added environment 'staging'"))
        .stdout(predicate::str::contains("'staging' is the default environment"));
    bcctl(&dir)
        .args(["env", "add", "prod", "hash-p", "tok-prod-0123456789"])
        .assert()
        .success();

    bcctl(&dir)
        .args(["env", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hash-p"))
        .stdout(predicate::str::contains("tok-stagin...6789"))
        .stdout(predicate::str::contains("tok-staging-0123456789").not());

    let raw = fs::read_to_string(dir.path().join("config.json")).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["defaultEnvironment"], "staging");
    assert_eq!(stored["environments"]["prod"]["storeHash"], "hash-p");

    bcctl(&dir)
        .args(["env", "use", "prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Default environment set to 'prod'"));

    bcctl(&dir)
        .args(["env", "remove", "prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Default environment is now 'staging'"));

    bcctl(&dir)
        .args(["env", "use", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("environment 'ghost' not found"));
}

#[test]
fn test_empty_environment_list_explains_how_to_add() {
    let dir = TempDir::new().unwrap();
    bcctl(&dir)
        .args(["env", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No environments configured"));
}

#[test]
fn test_missing_credentials_fail_before_any_request() {
    let dir = TempDir::new().unwrap();
    bcctl(&dir)
        .args(["catalog", "brands", "get-all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "store hash and access token are required",
        ));
}

#[test]
fn test_brands_csv_from_default_environment() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/stores/hash-s/v3/catalog/brands")
            .header("X-Auth-Token", "tok-staging-0123456789");
        then.status(200).json_body(json!({
            "data": [{"id": 1, "name": "Acme", "meta_keywords": ["a", "b"]}],
            "meta": {"pagination": {"current_page": 1, "total_pages": 1}}
        }));
    });

    let dir = TempDir::new().unwrap();
    bcctl(&dir)
        .args(["env", "add", "staging", "hash-s", "tok-staging-0123456789"])
        .assert()
        .success();

    bcctl(&dir)
        .args(["--base-url", &server.base_url(), "-o", "csv"])
        .args(["catalog", "brands", "get-all"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "\"id\",\"name\",\"image_url\",\"meta_keywords\",\"url\"",
        ))
        .stdout(predicate::str::contains("\"1\",\"Acme\",\"\",\"a,b\",\"\""));

    mock.assert();
}

#[test]
fn test_channels_table_with_flag_credentials() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/stores/abc/v3/channels");
        then.status(200).json_body(json!({
            "data": [
                {"id": 1, "name": "Storefront", "type": "storefront", "status": "active"},
                {"id": 2, "name": "Amazon", "type": "marketplace", "status": "connected"}
            ]
        }));
    });

    let dir = TempDir::new().unwrap();
    bcctl(&dir)
        .args(["--base-url", &server.base_url()])
        .args(["--store-hash", "abc", "--access-token", "t"])
        .args(["admin", "channels", "get-all", "--filter", "amazon"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Amazon"))
        .stdout(predicate::str::contains("Storefront").not());
}

#[test]
fn test_category_import_links_parents() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST).path("/stores/abc/v3/catalog/trees/categories");
        then.status(200).json_body(json!({
            "data": [
                {"category_id": 101, "name": "A", "tree_id": 1,
                 "url": {"path": "/a/", "is_customized": false}},
                {"category_id": 102, "name": "B", "tree_id": 1,
                 "url": {"path": "/a/b/", "is_customized": false}}
            ]
        }));
    });
    let update = server.mock(|when, then| {
        when.method(PUT)
            .path("/stores/abc/v3/catalog/trees/categories")
            .json_body(json!([{"category_id": 102, "parent_id": 101}]));
        then.status(200).json_body(json!({"data": []}));
    });

    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("categories.csv");
    fs::write(
        &csv,
        "category_id,parent_id,name,tree_id,is_visible,url\n\
         1,0,A,1,true,/a/\n\
         2,1,B,1,true,/a/b/\n",
    )
    .unwrap();

    bcctl(&dir)
        .args(["--base-url", &server.base_url()])
        .args(["--store-hash", "abc", "--access-token", "t"])
        .args(["catalog", "categories", "import"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created: 2 categories"))
        .stdout(predicate::str::contains("Updated: 1 with parent relationships"))
        .stdout(predicate::str::contains("Skipped: 1"));

    create.assert();
    update.assert();
}

#[test]
fn test_invalid_import_csv_makes_no_requests() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST);
        then.status(200).json_body(json!({"data": []}));
    });

    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("bad.csv");
    fs::write(
        &csv,
        "category_id,parent_id,name,tree_id,is_visible,url\n1,0,A,one,true,/a/\n",
    )
    .unwrap();

    bcctl(&dir)
        .args(["--base-url", &server.base_url()])
        .args(["--store-hash", "abc", "--access-token", "t"])
        .args(["catalog", "categories", "import"])
        .arg(&csv)
        .assert()
        .failure()
        .stderr(predicate::str::contains("`tree_id` is not a number"));

    create.assert_hits(0);
}
