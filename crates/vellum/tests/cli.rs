//! Command-line behaviour against catalogs written to a temp directory.

use std::path::{Path, PathBuf};

use clap::Parser;
use insta::assert_snapshot;
use serde_json::Value;
use tempfile::TempDir;
use vellum::cli::{run, Cli};
use vellum::{CatalogBuilder, Payload};

// ============================================================================
// Helpers
// ============================================================================

fn write_catalog(dir: &Path) -> PathBuf {
    let mut builder = CatalogBuilder::new();
    builder.add(
        "index.tmp",
        &Payload::new("marker")
            .with_name("Index")
            .with_catalog("Web")
            .with_tag("page")
            .with_attribute("title", "Home")
            .with_body("<h1>$(title)</h1> $(site)")
            .requiring("Footer"),
    );
    builder.add(
        "footer.tmp",
        &Payload::new("text")
            .with_name("Footer")
            .with_body("<footer/>")
            .with_extension("footer"),
    );
    builder.add(
        "about.tmp",
        &Payload::new("text")
            .with_name("About")
            .with_catalog("Web")
            .with_tag("page")
            .with_tag("static")
            .with_body("about"),
    );
    let store = builder.build().unwrap();

    let path = dir.join("catalog.json");
    std::fs::write(&path, serde_json::to_string(&store.to_compiled()).unwrap()).unwrap();
    path
}

fn setup() -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path());
    (dir, catalog.to_str().unwrap().to_string())
}

fn vellum(args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(std::iter::once("vellum").chain(args.iter().copied()))?;
    let mut out = Vec::new();
    run(cli, &mut out)?;
    Ok(String::from_utf8(out)?)
}

// ============================================================================
// inspect
// ============================================================================

#[test]
fn test_inspect_text() {
    let (_dir, catalog) = setup();
    let output = vellum(&["inspect", &catalog]).unwrap();
    assert_snapshot!("inspect_output", output);
}

#[test]
fn test_inspect_json() {
    let (_dir, catalog) = setup();
    let output = vellum(&["inspect", &catalog, "--json"]).unwrap();
    let entries: Value = serde_json::from_str(&output).unwrap();

    assert_eq!(entries.as_array().unwrap().len(), 3);
    assert_eq!(entries[1]["reference"], "footer.tmp");
    assert_eq!(entries[1]["extension"], "footer");
    assert_eq!(entries[2]["tags"], serde_json::json!(["page", "static"]));
}

#[test]
fn test_inspect_reports_corrupt_payload() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = CatalogBuilder::new();
    builder.add_raw("bad.tmp", "not a payload");
    let path = dir.path().join("bad.json");
    let compiled = builder.build().unwrap().to_compiled();
    std::fs::write(&path, serde_json::to_string(&compiled).unwrap()).unwrap();

    let output = vellum(&["inspect", path.to_str().unwrap()]).unwrap();
    assert!(output.contains("#0 bad.tmp (corrupt: "), "{output}");
}

// ============================================================================
// find
// ============================================================================

#[test]
fn test_find_by_tag() {
    let (_dir, catalog) = setup();
    let output = vellum(&["find", &catalog, "tag:page"]).unwrap();
    assert_eq!(output, "index.tmp (Index)\nabout.tmp (About)\n");
}

#[test]
fn test_find_narrows_group_by_tag() {
    let (_dir, catalog) = setup();
    let output = vellum(&["find", &catalog, "catalog:Web", "tag:static"]).unwrap();
    assert_eq!(output, "about.tmp (About)\n");
}

#[test]
fn test_find_first() {
    let (_dir, catalog) = setup();
    let output = vellum(&["find", &catalog, "tag:page", "--first"]).unwrap();
    assert_eq!(output, "index.tmp (Index)\n");
}

#[test]
fn test_find_missing_catalog_fails() {
    let err = vellum(&["find", "/nonexistent/catalog.json", "tag:x"]).unwrap_err();
    assert!(err.to_string().contains("cannot load catalog"));
}

// ============================================================================
// render
// ============================================================================

#[test]
fn test_render_from_catalog() {
    let (_dir, catalog) = setup();
    let output = vellum(&[
        "render",
        "--catalog",
        &catalog,
        "Index",
        "--param",
        "site=example.org",
    ])
    .unwrap();
    assert_eq!(output, "<h1>Home</h1> example.org<footer/>");
}

#[test]
fn test_render_with_info() {
    let (_dir, catalog) = setup();
    let output = vellum(&[
        "render",
        "--catalog",
        &catalog,
        "index.tmp",
        "--info",
        r#"{"title": "Info"}"#,
    ])
    .unwrap();
    assert_eq!(output, "<h1>Info</h1> $(site)<footer/>");
}

#[test]
fn test_render_from_config() {
    let (dir, _catalog) = setup();
    let config = dir.path().join("render.yaml");
    std::fs::write(&config, "catalog: catalog.json\nparameters:\n  site: cfg.org\n").unwrap();

    let output = vellum(&["render", "--config", config.to_str().unwrap(), "Index"]).unwrap();
    assert_eq!(output, "<h1>Home</h1> cfg.org<footer/>");
}

#[test]
fn test_render_unknown_template_fails() {
    let (_dir, catalog) = setup();
    let err = vellum(&["render", "--catalog", &catalog, "Nope"]).unwrap_err();
    assert_eq!(err.to_string(), "cannot render `Nope`");
    assert!(format!("{err:#}").contains("template not found"));
}

#[test]
fn test_render_requires_a_source() {
    assert!(vellum(&["render", "Index"]).is_err());
}
