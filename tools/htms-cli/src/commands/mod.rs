//! CLI command implementations.

pub mod check;
pub mod config;
pub mod render;
pub mod request;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use htms_core::Resolver;
use htms_resolvers::FragmentResolver;

use crate::context::Context;

/// Arguments for the render command.
#[derive(Args)]
pub struct RenderArgs {
    /// Document to render.
    pub file: String,

    /// Fragment directory (default: config, then the document's directory).
    #[arg(short, long)]
    pub fragments: Option<String>,

    /// Show error details in failed chunks.
    #[arg(short, long)]
    pub debug: bool,

    /// End the stream when a task cannot be resolved.
    #[arg(long)]
    pub fatal: bool,
}

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Document to check.
    pub file: String,
}

/// Arguments for the request command.
#[derive(Args)]
pub struct RequestArgs {
    /// Request path, e.g. `/blog/`.
    #[arg(default_value = "/")]
    pub path: String,

    /// Document root (default: `[server] root`).
    #[arg(short, long)]
    pub root: Option<String>,

    /// Fragment directory (default: config, then the document root).
    #[arg(short, long)]
    pub fragments: Option<String>,

    /// `Accept-Encoding` header to send.
    #[arg(long)]
    pub accept_encoding: Option<String>,

    /// Print status and headers before the body.
    #[arg(short, long)]
    pub include: bool,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    /// Write a default htms.toml in the working directory.
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing config file.
    #[arg(short, long, requires = "init")]
    pub force: bool,
}

/// Fragment resolver from a flag, the config, or a fallback directory.
pub fn fragment_resolver(ctx: &Context, flag: Option<&str>, fallback: &Path) -> Arc<dyn Resolver> {
    let fragments = &ctx.config.fragments;
    let root: PathBuf = match (flag, &fragments.root) {
        (Some(dir), _) => ctx.resolve_path(dir),
        (None, Some(root)) => ctx.config_dir().join(root),
        (None, None) => fallback.to_path_buf(),
    };

    ctx.output
        .debug(&format!("Resolving fragments from {}", root.display()));

    Arc::new(
        FragmentResolver::new(root)
            .with_extension(fragments.extension.clone())
            .with_cache(fragments.cache),
    )
}
