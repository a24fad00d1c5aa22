//! Request command.

use anyhow::{bail, Context as _, Result};
use futures::StreamExt;
use htms_http::{HtmsHandler, HtmsOptions};
use http::header::ACCEPT_ENCODING;
use http::Request;
use tokio::io::AsyncWriteExt;

use super::{fragment_resolver, RequestArgs};
use crate::context::Context;

/// Run the request command.
pub async fn run(args: RequestArgs, ctx: &Context) -> Result<()> {
    let root = match &args.root {
        Some(root) => ctx.resolve_path(root),
        None => ctx.config_dir().join(&ctx.config.server.root),
    };
    let options = HtmsOptions {
        root: root.clone(),
        ..ctx.config.server.clone()
    };

    let resolver = fragment_resolver(ctx, args.fragments.as_deref(), &root);
    let handler = HtmsHandler::new(options, resolver)?;

    let mut request = Request::get(args.path.as_str());
    if let Some(accept) = &args.accept_encoding {
        request = request.header(ACCEPT_ENCODING, accept.as_str());
    }
    let request = request
        .body(())
        .with_context(|| format!("Invalid request path: {}", args.path))?;

    let Some(response) = handler.handle(&request).await else {
        bail!("No document for {} under {}", args.path, root.display());
    };

    let mut stdout = tokio::io::stdout();
    if args.include {
        let mut head = format!("{:?} {}\n", response.version(), response.status());
        for (name, value) in response.headers() {
            head.push_str(&format!("{}: {}\n", name, value.to_str().unwrap_or("<binary>")));
        }
        head.push('\n');
        stdout.write_all(head.as_bytes()).await?;
    }

    let status = response.status();
    let mut body = response.into_body();
    while let Some(chunk) = body.next().await {
        stdout.write_all(&chunk).await?;
        stdout.flush().await?;
    }

    if !status.is_success() {
        bail!("Request failed with status {}", status);
    }

    Ok(())
}
