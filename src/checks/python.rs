//! Label checks specific to the Python base image (`cpu` accelerator).

use super::{Check, CheckContext};
use crate::runner::ImageRunner;
use anyhow::{Result, bail, ensure};
use std::collections::HashMap;

pub const CHECKS: &[Check] = &[
    Check { name: "name_label", run: name_label },
    Check { name: "version_label", run: version_label },
    Check { name: "k8s_display_name_label", run: k8s_display_name_label },
    Check { name: "opencontainers_source_label", run: opencontainers_source_label },
    Check { name: "accelerator_label_cpu", run: accelerator_label_cpu },
    Check { name: "python_version_label", run: python_version_label },
];

fn name_label(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    require_label(&runner.get_labels()?, "name").map(|_| ())
}

fn version_label(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    require_label(&runner.get_labels()?, "version").map(|_| ())
}

fn k8s_display_name_label(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    require_label(&runner.get_labels()?, "io.k8s.display-name").map(|_| ())
}

fn opencontainers_source_label(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let source = require_label(&runner.get_labels()?, "org.opencontainers.image.source")?;
    ensure!(
        source.contains("github.com"),
        "OCI source should point to GitHub, got: {source}"
    );
    Ok(())
}

fn accelerator_label_cpu(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let labels = runner.get_labels()?;
    let accelerator = labels.get("com.opendatahub.accelerator").map(String::as_str);
    ensure!(
        accelerator == Some("cpu"),
        "expected accelerator='cpu', got: {accelerator:?}"
    );
    Ok(())
}

fn python_version_label(runner: &ImageRunner, ctx: &CheckContext) -> Result<()> {
    let version = require_label(&runner.get_labels()?, "com.opendatahub.python")?;
    ensure!(
        version.contains(&ctx.python_version),
        "expected Python version label to contain {}, got: {version}",
        ctx.python_version
    );
    Ok(())
}

fn require_label(labels: &HashMap<String, String>, key: &str) -> Result<String> {
    match labels.get(key) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => bail!("label {key} should be set and non-empty"),
    }
}
