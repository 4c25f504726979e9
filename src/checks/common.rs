//! Checks shared by every image variant: interpreter, package managers,
//! user identity, configuration files, image metadata, environment, and
//! read access to sensitive system files.

use super::{Check, CheckContext};
use crate::config::{APP_ROOT, PIP_CONF, UV_TOML, WORKDIR};
use crate::runner::ImageRunner;
use anyhow::{Result, ensure};
use serde_json::Value;

pub const CHECKS: &[Check] = &[
    Check { name: "python_version", run: python_version },
    Check { name: "pip_available", run: pip_available },
    Check { name: "uv_available", run: uv_available },
    Check { name: "user_id", run: user_id },
    Check { name: "group_id", run: group_id },
    Check { name: "not_root", run: not_root },
    Check { name: "workdir_writable", run: workdir_writable },
    Check { name: "pip_conf_exists", run: pip_conf_exists },
    Check { name: "pip_conf_valid", run: pip_conf_valid },
    Check { name: "uv_toml_exists", run: uv_toml_exists },
    Check { name: "uv_config_file_env", run: uv_config_file_env },
    Check { name: "image_workdir", run: image_workdir },
    Check { name: "image_user", run: image_user },
    Check { name: "home", run: home },
    Check { name: "path_contains_app_root", run: path_contains_app_root },
    Check { name: "pythondontwritebytecode", run: pythondontwritebytecode },
    Check { name: "pythonunbuffered", run: pythonunbuffered },
    Check { name: "pip_no_cache_dir", run: pip_no_cache_dir },
    Check { name: "uv_system_python", run: uv_system_python },
    Check { name: "shadow_not_readable", run: shadow_not_readable },
];

fn python_version(runner: &ImageRunner, ctx: &CheckContext) -> Result<()> {
    let result = runner.run("python --version")?;
    ensure!(result.success(), "python --version exited with {:?}", result.exit_code);

    let expected = format!("Python {}", ctx.python_version);
    ensure!(
        result.stdout.contains(&expected),
        "expected {expected}, got: {}",
        result.stdout.trim()
    );
    Ok(())
}

fn pip_available(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let result = runner.run("pip --version")?;
    ensure!(result.success(), "pip is not installed or not working");
    Ok(())
}

fn uv_available(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let result = runner.run("uv --version")?;
    ensure!(result.success(), "uv is not installed or not working");
    Ok(())
}

/// UID 1001 for OpenShift compatibility.
fn user_id(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let result = runner.run("id -u")?;
    ensure!(result.success(), "id -u exited with {:?}", result.exit_code);
    ensure!(
        result.stdout.trim() == "1001",
        "expected UID 1001, got: {}",
        result.stdout.trim()
    );
    Ok(())
}

/// GID 0 (root group) for OpenShift compatibility.
fn group_id(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let result = runner.run("id -g")?;
    ensure!(result.success(), "id -g exited with {:?}", result.exit_code);
    ensure!(
        result.stdout.trim() == "0",
        "expected GID 0, got: {}",
        result.stdout.trim()
    );
    Ok(())
}

fn not_root(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let result = runner.run("whoami")?;
    ensure!(result.success(), "whoami exited with {:?}", result.exit_code);
    ensure!(result.stdout.trim() != "root", "container runs as root");
    Ok(())
}

// The one probe that writes: it creates a temp file in the workdir and
// removes it again within the same command, leaving no state behind.
fn workdir_writable(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let result = runner.run(&format!(r#"f=$(mktemp {WORKDIR}/.writetest.XXXXXX) && rm "$f""#))?;
    ensure!(result.success(), "{WORKDIR} is not writable by the container user");
    Ok(())
}

fn pip_conf_exists(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    ensure!(runner.file_exists(PIP_CONF)?, "pip configuration file not found");
    Ok(())
}

fn pip_conf_valid(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let result = runner.run(&format!("cat {PIP_CONF}"))?;
    ensure!(
        result.stdout.contains("[global]"),
        "pip.conf missing [global] section"
    );
    Ok(())
}

fn uv_toml_exists(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    ensure!(runner.file_exists(UV_TOML)?, "uv configuration file not found");
    Ok(())
}

fn uv_config_file_env(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let value = runner.get_env("UV_CONFIG_FILE")?;
    ensure!(value == UV_TOML, "UV_CONFIG_FILE is {value:?}, expected {UV_TOML}");
    Ok(())
}

fn image_workdir(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let value = runner.get_config("WorkingDir")?;
    ensure!(
        value.as_ref().and_then(Value::as_str) == Some(WORKDIR),
        "WorkingDir is {value:?}, expected {WORKDIR}"
    );
    Ok(())
}

fn image_user(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let value = runner.get_config("User")?;
    ensure!(
        value.as_ref().and_then(Value::as_str) == Some("1001"),
        "User is {value:?}, expected \"1001\""
    );
    Ok(())
}

fn home(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let value = runner.get_env("HOME")?;
    ensure!(value == WORKDIR, "HOME is {value:?}, expected {WORKDIR}");
    Ok(())
}

fn path_contains_app_root(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let path = runner.get_env("PATH")?;
    let bin = format!("{APP_ROOT}/bin");
    ensure!(path.contains(&bin), "PATH does not include {bin}: {path}");
    Ok(())
}

fn pythondontwritebytecode(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    require_env(runner, "PYTHONDONTWRITEBYTECODE", "1")
}

fn pythonunbuffered(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    require_env(runner, "PYTHONUNBUFFERED", "1")
}

fn pip_no_cache_dir(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    require_env(runner, "PIP_NO_CACHE_DIR", "1")
}

fn uv_system_python(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    require_env(runner, "UV_SYSTEM_PYTHON", "1")
}

fn shadow_not_readable(runner: &ImageRunner, _ctx: &CheckContext) -> Result<()> {
    let result = runner.run("cat /etc/shadow")?;
    ensure!(!result.success(), "/etc/shadow is readable by the container user");
    Ok(())
}

fn require_env(runner: &ImageRunner, name: &str, expected: &str) -> Result<()> {
    let value = runner.get_env(name)?;
    ensure!(value == expected, "{name} is {value:?}, expected {expected:?}");
    Ok(())
}
