use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::debug;

use crate::usecase::FREEZE_FILE;

pub const DEPS_DIR: &str = "gypkg_deps";
pub const KEYRINGS_DIR: &str = ".keyrings";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the generator on a project file, installing dependencies on request
    Gen(GenArgs),
    /// Resolve dependencies through the running generator's command service
    Deps(DepsArgs),
    /// Print the target type for the current directory
    Type(ServiceAddr),
    /// Forward a line to the running service's log
    Log(LogArgs),
}

#[derive(Args, Debug)]
pub struct GenArgs {
    /// Project file to generate
    pub gyp_file: PathBuf,
    /// Record every resolution into `.gypkg-freeze` next to the project file
    #[arg(short, long)]
    pub freeze: bool,
    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
    /// Command service address
    #[arg(long, env = "GYPKG_CMD_HOST", default_value = "127.0.0.1")]
    pub host: String,
    /// Command service port, 0 picks a free one
    #[arg(long, env = "GYPKG_CMD_PORT", default_value_t = 0)]
    pub port: u16,
    #[arg(long, env = "GYPKG_GIT", default_value = "git")]
    pub git: String,
    #[arg(long, env = "GYPKG_GPG", default_value = "gpg")]
    pub gpg: String,
    /// Build graph generator executable
    #[arg(long, env = "GYPKG_GENERATOR", default_value = "gyp")]
    pub generator: String,
    /// Where dependencies are installed, `<project dir>/gypkg_deps` by default
    #[arg(long)]
    pub deps_dir: Option<PathBuf>,
    /// Keyrings for signature checks, `<deps dir>/.keyrings` by default
    #[arg(long)]
    pub keyring_dir: Option<PathBuf>,
    /// Give up on git index.lock contention after this many attempts
    #[arg(long)]
    pub lock_retry_limit: Option<u32>,
    /// Extra `.gypi` files passed to the generator with `-I`
    #[arg(short = 'I', long = "include")]
    pub includes: Vec<PathBuf>,
    /// Passed to the generator as-is
    #[arg(last = true)]
    pub extra: Vec<String>,
}

/// Where the running command service listens, injected into the generator's
/// environment.
#[derive(Args, Debug, Clone)]
pub struct ServiceAddr {
    #[arg(long, env = "GYPKG_CMD_HOST", default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, env = "GYPKG_CMD_PORT")]
    pub port: u16,
}

#[derive(Args, Debug)]
pub struct DepsArgs {
    #[command(flatten)]
    pub addr: ServiceAddr,
    /// Descriptors to resolve
    #[arg(required = true)]
    pub descriptors: Vec<String>,
}

#[derive(Args, Debug)]
pub struct LogArgs {
    #[command(flatten)]
    pub addr: ServiceAddr,
    pub text: Vec<String>,
}

/// Resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub gyp_file: PathBuf,
    pub deps_dir: PathBuf,
    pub keyring_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub git: String,
    pub gpg: String,
    pub generator: String,
    pub freeze: bool,
    pub lock_retry_limit: Option<u32>,
    pub includes: Vec<PathBuf>,
    pub extra: Vec<String>,
}

impl Config {
    pub fn from_args(args: GenArgs, cwd: &Path) -> Self {
        let gyp_file = absolute(cwd, &args.gyp_file);
        let project_dir = gyp_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());
        let deps_dir = args
            .deps_dir
            .map(|dir| absolute(cwd, &dir))
            .unwrap_or_else(|| project_dir.join(DEPS_DIR));
        let keyring_dir = args
            .keyring_dir
            .map(|dir| absolute(cwd, &dir))
            .unwrap_or_else(|| deps_dir.join(KEYRINGS_DIR));

        let config = Self {
            project_dir,
            gyp_file,
            deps_dir,
            keyring_dir,
            host: args.host,
            port: args.port,
            git: args.git,
            gpg: args.gpg,
            generator: args.generator,
            freeze: args.freeze,
            lock_retry_limit: args.lock_retry_limit,
            includes: args.includes.iter().map(|p| absolute(cwd, p)).collect(),
            extra: args.extra,
        };
        debug!("config {:?}", config);
        config
    }

    /// Defaults for a project rooted at `project_dir`.
    pub fn for_project(project_dir: &Path) -> Self {
        let deps_dir = project_dir.join(DEPS_DIR);
        Self {
            project_dir: project_dir.to_path_buf(),
            gyp_file: project_dir.join("project.gyp"),
            keyring_dir: deps_dir.join(KEYRINGS_DIR),
            deps_dir,
            host: "127.0.0.1".to_string(),
            port: 0,
            git: "git".to_string(),
            gpg: "gpg".to_string(),
            generator: "gyp".to_string(),
            freeze: false,
            lock_retry_limit: None,
            includes: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn freeze_file(&self) -> PathBuf {
        self.project_dir.join(FREEZE_FILE)
    }
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    dunce::canonicalize(&path).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_defaults() {
        let cli = Cli::try_parse_from(["gypkg", "gen", "proj/app.gyp", "--", "-Dfoo=1"]).unwrap();
        let Command::Gen(args) = cli.command else {
            panic!("expected gen");
        };
        assert_eq!(args.extra, vec!["-Dfoo=1".to_string()]);

        let config = Config::from_args(args, Path::new("/work"));
        assert_eq!(config.gyp_file, PathBuf::from("/work/proj/app.gyp"));
        assert_eq!(config.project_dir, PathBuf::from("/work/proj"));
        assert_eq!(config.deps_dir, PathBuf::from("/work/proj/gypkg_deps"));
        assert_eq!(
            config.keyring_dir,
            PathBuf::from("/work/proj/gypkg_deps/.keyrings")
        );
        assert_eq!(config.freeze_file(), PathBuf::from("/work/proj/.gypkg-freeze"));
        assert_eq!(config.lock_retry_limit, None);
    }

    #[test]
    fn test_gen_overrides() {
        let cli = Cli::try_parse_from([
            "gypkg",
            "gen",
            "/p/app.gyp",
            "--freeze",
            "--deps-dir",
            "/d",
            "--lock-retry-limit",
            "5",
            "-I",
            "/p/extra.gypi",
        ])
        .unwrap();
        let Command::Gen(args) = cli.command else {
            panic!("expected gen");
        };
        let config = Config::from_args(args, Path::new("/work"));
        assert!(config.freeze);
        assert_eq!(config.deps_dir, PathBuf::from("/d"));
        assert_eq!(config.keyring_dir, PathBuf::from("/d/.keyrings"));
        assert_eq!(config.lock_retry_limit, Some(5));
        assert_eq!(config.includes, vec![PathBuf::from("/p/extra.gypi")]);
    }

    #[test]
    fn test_client_args() {
        let cli = Cli::try_parse_from([
            "gypkg",
            "deps",
            "--port",
            "4000",
            "https://example.com/x:x.gyp:x",
        ])
        .unwrap();
        let Command::Deps(args) = cli.command else {
            panic!("expected deps");
        };
        assert_eq!(args.addr.port, 4000);
        assert_eq!(args.descriptors.len(), 1);
    }
}
