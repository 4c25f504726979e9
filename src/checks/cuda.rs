//! Checks specific to the CUDA base image: environment, toolchain,
//! libraries, and labels. All of them run without GPU hardware.

use super::{Check, CheckContext};
use crate::runner::ImageRunner;
use anyhow::{Result, ensure};

const CUDA_HOME: &str = "/usr/local/cuda";

pub const CHECKS: &[Check] = &[
    Check { name: "cuda_version", run: cuda_version },
    Check { name: "nvidia_visible_devices", run: nvidia_visible_devices },
    Check { name: "cuda_in_path", run: cuda_in_path },
    Check { name: "nvcc_exists", run: nvcc_exists },
    Check { name: "cuda_dir_exists", run: cuda_dir_exists },
    Check { name: "libcudart_present", run: libcudart_present },
    Check { name: "libcublas_present", run: libcublas_present },
    Check { name: "libcudnn_present", run: libcudnn_present },
    Check { name: "cuda_version_label", run: cuda_version_label },
    Check { name: "accelerator_label_cuda", run: accelerator_label_cuda },
];

fn cuda_version(runner: &ImageRunner, ctx: &CheckContext) -> Result<()> {
    let version = runner.get_env("CUDA_VERSION")?;
    ensure!(!version.is_empty(), "CUDA_VERSION is not set");

    if let Some(expected) = &ctx.cuda_version {
        ensure!(
            version.starts_with(expected),
            "CUDA_VERSION is {version}, expected {expected}.x"
        );
    }
    Ok(())
}

fn nvidia_visible_devices(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let value = runner.get_env("NVIDIA_VISIBLE_DEVICES")?;
    ensure!(value == "all", "NVIDIA_VISIBLE_DEVICES is {value:?}, expected \"all\"");
    Ok(())
}

fn cuda_in_path(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let path = runner.get_env("PATH")?;
    ensure!(
        path.contains("/usr/local/cuda/bin"),
        "PATH does not include the CUDA bin directory: {path}"
    );
    Ok(())
}

fn nvcc_exists(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let result = runner.run("which nvcc")?;
    ensure!(result.success(), "nvcc compiler not found");
    ensure!(
        result.stdout.contains(CUDA_HOME),
        "nvcc resolved outside {CUDA_HOME}: {}",
        result.stdout.trim()
    );
    Ok(())
}

fn cuda_dir_exists(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    ensure!(runner.dir_exists(CUDA_HOME)?, "CUDA toolkit directory not found");
    Ok(())
}

fn libcudart_present(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    require_library(runner, "libcudart")
}

fn libcublas_present(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    require_library(runner, "libcublas")
}

fn libcudnn_present(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    require_library(runner, "libcudnn")
}

fn cuda_version_label(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let labels = runner.get_labels()?;
    ensure!(
        labels.contains_key("com.nvidia.cuda.version"),
        "com.nvidia.cuda.version label is missing"
    );
    Ok(())
}

fn accelerator_label_cuda(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let labels = runner.get_labels()?;
    let accelerator = labels.get("com.opendatahub.accelerator").map(String::as_str);
    ensure!(
        accelerator == Some("cuda"),
        "expected accelerator='cuda', got: {accelerator:?}"
    );
    Ok(())
}

fn require_library(runner: &ImageRunner, library: &str) -> Result<()> {
    let result = runner.run(&format!("ldconfig -p | grep {library}"))?;
    ensure!(result.success(), "{library} is not present in the linker cache");
    Ok(())
}
