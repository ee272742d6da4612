//! Drives one generator run with the command service alongside it.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context as _};
use git_runner::{GitCommand, RetryPolicy};
use tokio::net::TcpListener;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    usecase::{detect_alias, FreezeMap},
};

use super::{context::InstallContext, interactive::InteractiveLock, service::CommandService};

pub const OPTIONS_GYPI: &str = "options.gypi";

/// Generator name for the architecture gypkg was built for.
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "x86" => "ia32",
        "aarch64" => "arm64",
        other => other,
    }
}

/// Arguments for the generator: the project file, include files, depth and
/// the default variables the caller did not set.
pub fn generator_args(config: &Config, cwd: &Path, arch: &str) -> Vec<String> {
    let mut args = vec![config.gyp_file.display().to_string()];
    for include in &config.includes {
        args.push(format!("-I{}", include.display()));
    }
    args.push(format!("--depth={}", cwd.display()));

    let options = config.project_dir.join(OPTIONS_GYPI);
    if options.exists() {
        args.push(format!("-I{}", options.display()));
    }

    let has = |prefix: &str| config.extra.iter().any(|arg| arg.starts_with(prefix));
    if !cfg!(windows) {
        if !config.extra.iter().any(|arg| arg == "-f") {
            args.extend(["-f".to_string(), "make".to_string()]);
        }
        if !config.extra.iter().any(|arg| arg == "ninja") {
            let out = config.project_dir.join("out");
            args.push(format!("-Goutput_dir={}", out.display()));
            args.push(format!("--generator-output={}", out.display()));
        }
    }
    if !has("-Dhost_arch=") {
        args.push(format!("-Dhost_arch={arch}"));
    }
    if !has("-Dtarget_arch=") {
        args.push(format!("-Dtarget_arch={arch}"));
    }
    if !has("-Dlibrary=") {
        args.push("-Dlibrary=static_library".to_string());
    }
    args.extend(config.extra.iter().cloned());
    args
}

/// Starts the command service, runs the generator to completion and writes
/// the freeze file when requested.
///
/// The run fails if the generator fails or if any dependency could not be
/// installed, even when the generator carried on.
#[tracing::instrument(name = "gen", skip_all, fields(gyp = %config.gyp_file.display()))]
pub async fn run(config: Config, interactive: InteractiveLock) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.deps_dir)
        .await
        .with_context(|| format!("failed to create {}", config.deps_dir.display()))?;
    let cwd = std::env::current_dir().context("failed to read the working directory")?;
    if config.freeze {
        report_previous_freeze(&config.freeze_file());
    }

    let git = GitCommand::new(&config.git).with_retry(RetryPolicy {
        max_attempts: config.lock_retry_limit,
        ..Default::default()
    });
    let alias = detect_alias(&config.deps_dir);
    let ctx = InstallContext::new(config, git, alias, interactive);
    let config = &ctx.config;

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to listen on {}:{}", config.host, config.port))?;
    let addr = listener.local_addr().context("failed to read listener address")?;
    info!("command service listening on {}", addr);

    let service = CommandService::new(ctx.clone());
    let server = service.clone().serve(listener);

    let args = generator_args(config, &cwd, host_arch());
    info!("running {} with arguments:\n  {}", config.generator, args.join(" "));
    let status = Command::new(&config.generator)
        .args(&args)
        .env("GYPKG_CMD_HOST", addr.ip().to_string())
        .env("GYPKG_CMD_PORT", addr.port().to_string())
        .env("GYPKG_DEPS", &config.deps_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .with_context(|| format!("failed to spawn `{}`", config.generator))?;
    server.abort();
    debug!("generator exited with {}", status);

    let failures = service.failures();
    if !failures.is_empty() {
        let summary = failures
            .iter()
            .map(|f| format!("  {}: {}", f.descriptor, f.error))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("{} dependencies failed to install:\n{}", failures.len(), summary);
    }
    if !status.success() {
        bail!("{} failed: {}", config.generator, status);
    }

    if ctx.freeze.is_enabled() {
        ctx.freeze.flush(&config.freeze_file())?;
    }
    Ok(())
}

fn report_previous_freeze(path: &Path) {
    if !path.exists() {
        return;
    }
    match FreezeMap::load(path) {
        Ok(previous) => info!(
            "replacing {} frozen dependencies in {}",
            previous.len(),
            path.display()
        ),
        Err(e) => warn!("ignoring unreadable freeze file: {}", e),
    }
}
