//! Render command.

use std::time::Instant;

use anyhow::{bail, Context as _, Result};
use htms_stream::{create_pipeline, drive_to_sink, file_stream};
use tokio::io::AsyncWriteExt;

use super::{fragment_resolver, RenderArgs};
use crate::context::Context;
use crate::output::format_bytes;

/// Run the render command.
pub async fn run(args: RenderArgs, ctx: &Context) -> Result<()> {
    let path = ctx.resolve_path(&args.file);
    if !path.is_file() {
        bail!("Document not found: {}", path.display());
    }

    let document_dir = path.parent().unwrap_or(ctx.cwd.as_path());
    let resolver = fragment_resolver(ctx, args.fragments.as_deref(), document_dir);
    let config = ctx.config.render.pipeline_config(args.debug, args.fatal);

    ctx.output.debug(&format!("Rendering {}", path.display()));
    let started = Instant::now();

    let stream = create_pipeline(file_stream(&path), resolver, &config);

    // Each chunk is flushed so the streaming order is visible when piped.
    let stdout = futures::sink::unfold(tokio::io::stdout(), |mut out, chunk: Vec<u8>| async move {
        out.write_all(&chunk).await?;
        out.flush().await?;
        Ok::<_, std::io::Error>(out)
    });
    let mut stdout = Box::pin(stdout);

    let outcome = drive_to_sink(stream, stdout.as_mut())
        .await
        .with_context(|| format!("Failed to render {}", path.display()))?;

    if outcome.aborted {
        ctx.output.debug("Output closed before the document completed");
    }
    if let Some(advisory) = &outcome.advisory {
        ctx.output.warn(&format!("{}: {}", path.display(), advisory));
    }

    ctx.output.debug(&format!(
        "{} chunks, {} in {}ms",
        outcome.chunks,
        format_bytes(outcome.bytes as u64),
        started.elapsed().as_millis()
    ));

    Ok(())
}
