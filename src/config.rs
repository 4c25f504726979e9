use std::env;

// Fixed paths asserted inside the images under test.
pub const APP_ROOT: &str = "/opt/app-root";
pub const WORKDIR: &str = "/opt/app-root/src";
pub const PIP_CONF: &str = "/etc/pip.conf";
pub const UV_TOML: &str = "/etc/uv/uv.toml";

pub const PYTHON_IMAGE_VAR: &str = "PYTHON_IMAGE";
pub const CUDA_IMAGE_VAR: &str = "CUDA_IMAGE";
pub const PYTHON_VERSION_VAR: &str = "PYTHON_VERSION";
pub const CUDA_VERSION_VAR: &str = "EXPECTED_CUDA_VERSION";

pub const DEFAULT_PYTHON_VERSION: &str = "3.12";

/// Harness configuration resolved from the environment.
///
/// Image references are optional: a missing variable skips that variant's
/// suites instead of failing the run. `PYTHON_VERSION` falls back to a
/// default; an absent `EXPECTED_CUDA_VERSION` degrades the CUDA version
/// check to existence-only.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub python_image: Option<String>,
    pub cuda_image: Option<String>,
    pub python_version: String,
    pub cuda_version: Option<String>,
}

impl HarnessConfig {
    pub fn from_env() -> Self {
        Self {
            python_image: non_empty_var(PYTHON_IMAGE_VAR),
            cuda_image: non_empty_var(CUDA_IMAGE_VAR),
            python_version: non_empty_var(PYTHON_VERSION_VAR)
                .unwrap_or_else(|| DEFAULT_PYTHON_VERSION.to_string()),
            cuda_version: non_empty_var(CUDA_VERSION_VAR),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
