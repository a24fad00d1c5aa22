//! Check command.

use anyhow::{bail, Result};
use futures::StreamExt;
use htms_core::{HtmsError, Token};
use htms_stream::{file_stream, sequential_id_generator, tokenize, Tokenizer};
use serde::Serialize;

use super::CheckArgs;
use crate::context::Context;

/// A task marker found in the document.
#[derive(Debug, Serialize)]
struct MarkerReport {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    specifier: Option<String>,
    location: String,
}

#[derive(Debug, Default, Serialize)]
struct CheckReport {
    markers: Vec<MarkerReport>,
    scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Run the check command.
pub async fn run(args: CheckArgs, ctx: &Context) -> Result<()> {
    let path = ctx.resolve_path(&args.file);
    if !path.is_file() {
        bail!("Document not found: {}", path.display());
    }

    let tokenizer = Tokenizer::new().with_id_generator(sequential_id_generator("task"));
    let tokens = tokenize(file_stream(&path), tokenizer);
    let report = collect_report(tokens).await;

    if ctx.output.is_json() {
        ctx.output.json(&report);
    } else {
        print_report(&report, ctx);
    }

    if let Some(error) = report.error {
        bail!("{} is not well-formed:\n{}", path.display(), error);
    }
    if report.markers.is_empty() {
        ctx.output.warn(&format!("{}: {}", path.display(), HtmsError::NoTaskFound));
    } else {
        ctx.output.success(&format!("{} is well-formed", path.display()));
    }

    Ok(())
}

async fn collect_report<S>(tokens: S) -> CheckReport
where
    S: futures::Stream<Item = Result<Token, HtmsError>>,
{
    futures::pin_mut!(tokens);
    let mut report = CheckReport::default();

    while let Some(item) = tokens.next().await {
        match item {
            Ok(Token::TaskMarker {
                tag,
                task,
                specifier,
            }) => report.markers.push(MarkerReport {
                name: task.name,
                specifier,
                location: tag.location.to_string(),
            }),
            Ok(Token::ModuleScopeStart { specifier, .. }) => report.scopes.push(specifier),
            Ok(_) => {}
            Err(error) => {
                report.error = Some(error.to_string());
                break;
            }
        }
    }

    report
}

fn print_report(report: &CheckReport, ctx: &Context) {
    ctx.output.header("Tasks");
    for marker in &report.markers {
        let specifier = marker.specifier.as_deref().unwrap_or("-");
        ctx.output
            .list_item(&format!("{} {} ({})", marker.location, marker.name, specifier));
    }

    if !report.scopes.is_empty() {
        ctx.output.header("Module scopes");
        for scope in &report.scopes {
            ctx.output.list_item(scope);
        }
    }
}
