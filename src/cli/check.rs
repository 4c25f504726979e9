use crate::checks::{self, CheckContext, CheckReport, SuiteReport};
use crate::config::{
    CUDA_IMAGE_VAR, CUDA_VERSION_VAR, DEFAULT_PYTHON_VERSION, PYTHON_IMAGE_VAR, PYTHON_VERSION_VAR,
};
use crate::domain::CommandExecutor;
use crate::infra::{HostExecutor, command_available};
use crate::runner::{ImageRunner, RunnerError};
use anyhow::{Result, bail};
use clap::Args;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Args)]
pub struct CheckCommand {
    /// Python base image reference; its suites are skipped when unset
    #[arg(long, env = PYTHON_IMAGE_VAR)]
    python_image: Option<String>,

    /// CUDA base image reference; its suites are skipped when unset
    #[arg(long, env = CUDA_IMAGE_VAR)]
    cuda_image: Option<String>,

    /// Expected Python minor version inside the images
    #[arg(long, env = PYTHON_VERSION_VAR, default_value = DEFAULT_PYTHON_VERSION)]
    python_version: String,

    /// Expected CUDA version prefix; when unset the version check only
    /// requires CUDA_VERSION to be present
    #[arg(long, env = CUDA_VERSION_VAR)]
    cuda_version: Option<String>,

    /// Emit the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

enum Variant {
    Python,
    Cuda,
}

impl Variant {
    fn suite(&self) -> (&'static str, &'static [checks::Check]) {
        match self {
            Self::Python => ("python", checks::python::CHECKS),
            Self::Cuda => ("cuda", checks::cuda::CHECKS),
        }
    }
}

pub fn run(cmd: CheckCommand) -> Result<ExitCode> {
    if cmd.python_image.is_none() && cmd.cuda_image.is_none() {
        warn!("no image configured; set {PYTHON_IMAGE_VAR} and/or {CUDA_IMAGE_VAR}");
        return Ok(ExitCode::from(2));
    }

    if !command_available("podman") {
        bail!("podman not found on PATH");
    }

    let executor: Arc<dyn CommandExecutor> = Arc::new(HostExecutor::new());
    let ctx = CheckContext {
        python_version: cmd.python_version.clone(),
        cuda_version: cmd.cuda_version.clone(),
    };

    let mut reports = Vec::new();
    if let Some(image) = &cmd.python_image {
        reports.extend(run_variant(image, Variant::Python, &ctx, executor.clone()));
    } else {
        info!("{PYTHON_IMAGE_VAR} not set; skipping the python image");
    }
    if let Some(image) = &cmd.cuda_image {
        reports.extend(run_variant(image, Variant::Cuda, &ctx, executor));
    } else {
        info!("{CUDA_IMAGE_VAR} not set; skipping the cuda image");
    }

    let failures: usize = reports.iter().map(SuiteReport::failures).sum();
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_text_report(&reports);
    }

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Starts one container for the variant, runs the common suite plus the
/// variant's own suite against it, then stops it. A start failure is fatal
/// for this variant only: it is recorded as a failed report and the other
/// variant still gets checked.
fn run_variant(
    image: &str,
    variant: Variant,
    ctx: &CheckContext,
    executor: Arc<dyn CommandExecutor>,
) -> Vec<SuiteReport> {
    let mut runner = ImageRunner::new(image, executor);
    if let Err(e) = runner.start() {
        error!(image, error = %e, "failed to set up the session container");
        return vec![start_failure_report(&variant, image, &e)];
    }

    let (name, suite) = variant.suite();
    let reports = vec![
        checks::run_suite("common", checks::common::CHECKS, &runner, ctx),
        checks::run_suite(name, suite, &runner, ctx),
    ];

    runner.stop();
    reports
}

/// Synthetic one-entry report standing in for the suites that could not run.
fn start_failure_report(variant: &Variant, image: &str, error: &RunnerError) -> SuiteReport {
    let (name, _) = variant.suite();
    SuiteReport {
        suite: name.to_string(),
        image: image.to_string(),
        checks: vec![CheckReport {
            name: "session_container_start".to_string(),
            passed: false,
            detail: Some(error.to_string()),
        }],
    }
}

fn print_text_report(reports: &[SuiteReport]) {
    for report in reports {
        let passed = report.checks.len() - report.failures();
        println!(
            "{} ({}): {} passed, {} failed",
            report.suite,
            report.image,
            passed,
            report.failures()
        );
        for check in &report.checks {
            if !check.passed {
                println!(
                    "  FAIL {}: {}",
                    check.name,
                    check.detail.as_deref().unwrap_or("unknown failure")
                );
            }
        }
    }
}
