//! Post-processing passes over generated HCL files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use hcl::{Attribute, Block, Body, Expression, Structure};
use serde::Serialize;
use tracing::info;

use super::GenerateError;

/// Remove attributes rendered at their default/empty value from a generated
/// HCL file, deleting any block left empty, and rewrite the file when
/// something was removed.
///
/// `extra_fields_to_remove` maps attribute names to the additional rendered
/// values that should be treated as defaults (e.g. `org_id` -> `"1"`).
///
/// Returns whether the file was rewritten. Applying the pass to its own
/// output is a no-op.
pub fn strip_defaults(
    path: impl AsRef<Path>,
    extra_fields_to_remove: &HashMap<String, Expression>,
) -> Result<bool, GenerateError> {
    let path = path.as_ref();
    let src = std::fs::read_to_string(path)?;
    let body: Body =
        hcl::from_str(&src).map_err(|e| GenerateError::Parse(format!("{}: {}", path.display(), e)))?;

    let (stripped, changed) = strip_body(body, extra_fields_to_remove);
    if changed {
        info!(file = %path.display(), "stripping default attributes");
        std::fs::write(path, hcl::to_string(&stripped).map_err(|e| GenerateError::Parse(e.to_string()))?)?;
    }
    Ok(changed)
}

fn strip_body(body: Body, extra: &HashMap<String, Expression>) -> (Body, bool) {
    let mut changed = false;
    let mut kept = Vec::new();

    for structure in body.into_inner() {
        match structure {
            Structure::Attribute(attr) => {
                if is_default_expr(attr.expr()) || extra.get(attr.key()) == Some(attr.expr()) {
                    changed = true;
                } else {
                    kept.push(Structure::Attribute(attr));
                }
            }
            Structure::Block(block) => {
                let (inner, inner_changed) = strip_body(block.body.clone(), extra);
                let inner = inner.into_inner();
                changed |= inner_changed;
                if inner.is_empty() {
                    // A block with nothing left in it says nothing
                    changed = true;
                } else {
                    let mut builder = Block::builder(block.identifier());
                    for label in block.labels() {
                        builder = builder.add_label(label.clone());
                    }
                    for structure in inner {
                        builder = match structure {
                            Structure::Attribute(attr) => builder.add_attribute(attr),
                            Structure::Block(inner_block) => builder.add_block(inner_block),
                        };
                    }
                    kept.push(Structure::Block(builder.build()));
                }
            }
        }
    }

    (kept.into_iter().collect(), changed)
}

fn is_default_expr(expr: &Expression) -> bool {
    match expr {
        Expression::Null => true,
        Expression::Array(items) => items.is_empty(),
        Expression::Object(entries) => entries.is_empty(),
        _ => false,
    }
}

/// Move inline dashboard JSON out of `grafana_dashboard` resource blocks
/// into `files/{name}.json` next to the config file, rewriting the
/// `config_json` attribute to a `file(...)` call.
///
/// Blocks whose `config_json` is not a string literal are skipped, so a
/// second pass finds nothing to rewrite.
///
/// Returns the JSON files written.
pub fn extract_dashboards(path: impl AsRef<Path>) -> Result<Vec<PathBuf>, GenerateError> {
    let path = path.as_ref();
    let out_dir = path.parent().unwrap_or_else(|| Path::new(".")).join("files");

    let src = std::fs::read_to_string(path)?;
    let body: Body =
        hcl::from_str(&src).map_err(|e| GenerateError::Parse(format!("{}: {}", path.display(), e)))?;

    let mut written = Vec::new();
    let mut dashboards: Vec<(PathBuf, String)> = Vec::new();
    let mut kept = Vec::new();

    for structure in body.into_inner() {
        let block = match structure {
            Structure::Block(block) => block,
            other => {
                kept.push(other);
                continue;
            }
        };
        if block.identifier() != "resource"
            || block.labels().first().map(|l| l.as_str()) != Some("grafana_dashboard")
        {
            kept.push(Structure::Block(block));
            continue;
        }

        let resource_name = block
            .labels()
            .get(1)
            .map(|l| l.as_str().to_string())
            .unwrap_or_default();
        let out_file = out_dir.join(format!("{}.json", resource_name));

        let mut builder = Block::builder(block.identifier());
        for label in block.labels() {
            builder = builder.add_label(label.clone());
        }
        for structure in block.body.clone().into_inner() {
            match structure {
                Structure::Attribute(attr) if attr.key() == "config_json" => {
                    match attr.expr() {
                        Expression::String(json) => {
                            dashboards.push((out_file.clone(), render_dashboard_json(json)?));
                            let call = hcl::expr::FuncCall::builder("file")
                                .arg(out_file.to_string_lossy().into_owned())
                                .build();
                            builder = builder.add_attribute(Attribute::new(
                                "config_json",
                                Expression::from(call),
                            ));
                        }
                        // Already a file() reference or other expression
                        _ => builder = builder.add_attribute(attr),
                    }
                }
                Structure::Attribute(attr) => builder = builder.add_attribute(attr),
                Structure::Block(inner) => builder = builder.add_block(inner),
            }
        }
        kept.push(Structure::Block(builder.build()));
    }

    if dashboards.is_empty() {
        return Ok(written);
    }

    info!(file = %path.display(), count = dashboards.len(), "extracting dashboard JSON");
    std::fs::create_dir_all(&out_dir)?;
    for (out_file, json) in dashboards {
        std::fs::write(&out_file, json)?;
        written.push(out_file);
    }

    let stripped: Body = kept.into_iter().collect();
    std::fs::write(
        path,
        hcl::to_string(&stripped).map_err(|e| GenerateError::Parse(e.to_string()))?,
    )?;
    Ok(written)
}

/// Re-render an embedded dashboard JSON string with stable, tab-indented
/// formatting.
fn render_dashboard_json(json: &str) -> Result<String, GenerateError> {
    let model: serde_json::Value = serde_json::from_str(json)?;
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    model.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
