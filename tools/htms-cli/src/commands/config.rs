//! Configuration command.

use std::fs;

use anyhow::{bail, Result};

use super::ConfigArgs;
use crate::config::generate_default_config;
use crate::context::{Context, CONFIG_NAMES};

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    if args.init {
        init_config(args.force, ctx)
    } else {
        show_config(ctx)
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    let render = &ctx.config.render;
    ctx.output.info("[render]");
    ctx.output.kv("debug", &render.debug.to_string());
    ctx.output.kv("resolution", &format!("{:?}", render.resolution).to_lowercase());

    let fragments = &ctx.config.fragments;
    ctx.output.info("[fragments]");
    match &fragments.root {
        Some(root) => ctx.output.kv("root", &root.display().to_string()),
        None => ctx.output.kv("root", "(document directory)"),
    }
    ctx.output.kv("extension", &fragments.extension);
    ctx.output.kv("cache", &fragments.cache.to_string());

    let server = &ctx.config.server;
    ctx.output.info("[server]");
    ctx.output.kv("root", &server.root.display().to_string());
    ctx.output.kv("index", &server.index);
    ctx.output.kv("patterns", &server.patterns.join(", "));
    ctx.output.kv("compression", &server.compression.to_string());

    Ok(())
}

fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join(CONFIG_NAMES[0]);

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, generate_default_config())?;
    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}
