pub mod common;
pub mod cuda;
pub mod python;

use crate::runner::ImageRunner;
use anyhow::Result;
use serde::Serialize;
use tracing::{error, info};

/// One named probe over a running container.
///
/// Checks are read-only by contract: a suite may run them in any order and
/// every check must leave the container exactly as it found it.
pub struct Check {
    pub name: &'static str,
    pub run: fn(&ImageRunner, &CheckContext) -> Result<()>,
}

/// Expected versions shared by check functions, independent of the variant.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub python_version: String,
    /// When absent, the CUDA version check only requires the variable to be
    /// set at all.
    pub cuda_version: Option<String>,
}

impl Default for CheckContext {
    fn default() -> Self {
        Self {
            python_version: crate::config::DEFAULT_PYTHON_VERSION.to_string(),
            cuda_version: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub image: String,
    pub checks: Vec<CheckReport>,
}

impl SuiteReport {
    pub fn failures(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    pub fn passed(&self) -> bool {
        self.failures() == 0
    }
}

/// Runs every check in `checks` against `runner`, never short-circuiting:
/// one failing check still lets the rest of the suite report.
pub fn run_suite(
    suite: &str,
    checks: &[Check],
    runner: &ImageRunner,
    ctx: &CheckContext,
) -> SuiteReport {
    let mut reports = Vec::with_capacity(checks.len());

    for check in checks {
        match (check.run)(runner, ctx) {
            Ok(()) => {
                info!(suite, check = check.name, "ok");
                reports.push(CheckReport {
                    name: check.name.to_string(),
                    passed: true,
                    detail: None,
                });
            }
            Err(e) => {
                let detail = format!("{e:#}");
                error!(suite, check = check.name, error = %detail, "failed");
                reports.push(CheckReport {
                    name: check.name.to_string(),
                    passed: false,
                    detail: Some(detail),
                });
            }
        }
    }

    SuiteReport {
        suite: suite.to_string(),
        image: runner.image().to_string(),
        checks: reports,
    }
}
