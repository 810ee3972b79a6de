use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context};
use serde_json::{json, Value};
use vellum_render::{
    CatalogStore, Query, QuerySpec, Render, RenderConfig, RenderInfo, Template, TemplateLookup,
};

use super::{Cli, Command, RenderArgs};

/// Executes a parsed command line, writing results to `out`.
pub fn run(cli: Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    match cli.command {
        Command::Inspect { catalog, json } => inspect(&catalog, json, out),
        Command::Find {
            catalog,
            items,
            first,
        } => find(&catalog, &items, first, out),
        Command::Render(args) => render(&args, out),
    }
}

fn load(path: &Path) -> anyhow::Result<TemplateLookup> {
    let store = CatalogStore::from_path(path)
        .with_context(|| format!("cannot load catalog {}", path.display()))?;
    tracing::debug!(catalog = %path.display(), templates = store.len(), "catalog loaded");
    Ok(TemplateLookup::new(store))
}

// =============================================================================
// inspect
// =============================================================================

fn inspect(path: &Path, as_json: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    let lookup = load(path)?;
    let store = lookup.store();

    if as_json {
        let entries: Vec<Value> = store
            .positions()
            .map(|position| describe(&lookup, position))
            .collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }

    writeln!(
        out,
        "{} templates, {} names, {} groups, {} tags",
        store.len(),
        store.names().count(),
        store.catalogs().count(),
        store.tags().count()
    )?;
    for position in store.positions() {
        let reference = store.reference_at(position).unwrap_or_default();
        match lookup.template_at(position) {
            Ok(Some(template)) => writeln!(
                out,
                "#{} {} name={} catalog={} kind={} tags=[{}]",
                position,
                reference,
                or_dash(template.name()),
                or_dash(template.catalog().unwrap_or_default()),
                template.kind(),
                template.tags().join(", ")
            )?,
            Ok(None) => writeln!(out, "#{} {} (no payload)", position, reference)?,
            Err(err) => writeln!(out, "#{} {} (corrupt: {})", position, reference, err)?,
        }
    }
    Ok(())
}

fn describe(lookup: &TemplateLookup, position: usize) -> Value {
    let reference = lookup.store().reference_at(position).unwrap_or_default();
    match lookup.template_at(position) {
        Ok(Some(template)) => json!({
            "position": position,
            "reference": reference,
            "name": template.name(),
            "catalog": template.catalog(),
            "kind": template.kind(),
            "tags": template.tags(),
            "extension": template.extension_position().map(ToString::to_string),
        }),
        Ok(None) => json!({ "position": position, "reference": reference }),
        Err(err) => json!({
            "position": position,
            "reference": reference,
            "error": err.to_string(),
        }),
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

// =============================================================================
// find
// =============================================================================

fn find(path: &Path, items: &[String], first: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    let lookup = load(path)?;
    let spec = QuerySpec::parse(items);

    if first {
        if let Some(template) = lookup.find_first(&Query::Spec(spec))? {
            print_reference(&template, out)?;
        }
        return Ok(());
    }

    for template in lookup.find_spec(&spec)?.values() {
        print_reference(template, out)?;
    }
    Ok(())
}

fn print_reference(template: &Template, out: &mut dyn Write) -> anyhow::Result<()> {
    if template.name().is_empty() {
        writeln!(out, "{}", template.reference())?;
    } else {
        writeln!(out, "{} ({})", template.reference(), template.name())?;
    }
    Ok(())
}

// =============================================================================
// render
// =============================================================================

fn render(args: &RenderArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let render = match (&args.config, &args.catalog) {
        (Some(path), _) => {
            let config = RenderConfig::from_path(path)
                .with_context(|| format!("cannot load config {}", path.display()))?;
            Render::from_config(&config)?
        }
        (None, Some(catalog)) => {
            let store = CatalogStore::from_path(catalog)
                .with_context(|| format!("cannot load catalog {}", catalog.display()))?;
            Render::from_store(store, RenderConfig::new())
        }
        (None, None) => bail!("either --config or --catalog is required"),
    };

    let mut info = RenderInfo::new(args.template.as_str());
    if let Some(raw) = &args.info {
        let value: Value = serde_json::from_str(raw).context("--info is not valid JSON")?;
        info = info.with_info(value);
    }
    for param in &args.params {
        let (key, value) = parse_param(param)?;
        info = info.with_parameter(key, value);
    }

    render
        .render(&mut info)
        .with_context(|| format!("cannot render `{}`", args.template))?;

    let body = if info.response().is_empty() {
        info.output()
    } else {
        info.response().body()
    };
    write!(out, "{}", body)?;
    Ok(())
}

fn parse_param(param: &str) -> anyhow::Result<(&str, Value)> {
    let Some((key, raw)) = param.split_once('=') else {
        bail!("parameter `{}` is not of the form key=value", param);
    };
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("n=3").unwrap(), ("n", json!(3)));
        assert_eq!(parse_param("site=example.org").unwrap(), ("site", json!("example.org")));
        assert_eq!(parse_param("empty=").unwrap(), ("empty", json!("")));
        assert!(parse_param("novalue").is_err());
    }

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(""), "-");
        assert_eq!(or_dash("x"), "x");
    }
}
