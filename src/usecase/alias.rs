//! Tag aliases for semver installs.
//!
//! Once a range is resolved to a concrete tag, `<base>@<tag>` is made to
//! point at the hash-keyed checkout so every range landing on that tag
//! shares one directory. Where directory symlinks are unavailable a small
//! file holding the target's name stands in for the link.

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

pub trait DirectoryAlias: Send + Sync + Debug {
    /// Makes `alias` redirect to `target`, a sibling of `alias`.
    /// An alias that already exists is left untouched.
    fn create(&self, target: &Path, alias: &Path) -> io::Result<()>;

    /// The directory a caller should use for an existing `alias`.
    fn resolve(&self, alias: &Path) -> io::Result<PathBuf>;
}

/// Relative directory symlink `alias -> basename(target)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymlinkAlias;

impl DirectoryAlias for SymlinkAlias {
    fn create(&self, target: &Path, alias: &Path) -> io::Result<()> {
        let name = file_name(target)?;
        match symlink_dir(Path::new(name), alias) {
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            other => other,
        }
    }

    fn resolve(&self, alias: &Path) -> io::Result<PathBuf> {
        Ok(alias.to_path_buf())
    }
}

/// Plain file whose content is the target directory's name.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndirectionFileAlias;

impl DirectoryAlias for IndirectionFileAlias {
    fn create(&self, target: &Path, alias: &Path) -> io::Result<()> {
        let name = file_name(target)?;
        if alias.symlink_metadata().is_ok() {
            return Ok(());
        }
        //readers must never see a half written file
        static NEXT_TMP: AtomicUsize = AtomicUsize::new(0);
        let mut tmp = alias.as_os_str().to_owned();
        tmp.push(format!(
            ".tmp-{}-{}",
            std::process::id(),
            NEXT_TMP.fetch_add(1, Ordering::Relaxed)
        ));
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, name.as_encoded_bytes())?;
        std::fs::rename(&tmp, alias).inspect_err(|_| {
            let _ = std::fs::remove_file(&tmp);
        })
    }

    fn resolve(&self, alias: &Path) -> io::Result<PathBuf> {
        //a real directory (or a link made by another run) is used as-is
        if alias.is_dir() {
            return Ok(alias.to_path_buf());
        }
        let name = std::fs::read_to_string(alias)?;
        let parent = alias.parent().unwrap_or(Path::new(""));
        Ok(parent.join(name.trim()))
    }
}

/// Picks symlinks when `root` supports them, indirection files otherwise.
pub fn detect(root: &Path) -> Box<dyn DirectoryAlias> {
    let probe = root.join(format!(".gypkg-alias-probe-{}", std::process::id()));
    let _ = std::fs::remove_file(&probe);
    let supported = symlink_dir(Path::new("."), &probe).is_ok();
    let _ = std::fs::remove_file(&probe);
    debug!("directory symlinks supported in {}: {}", root.display(), supported);
    if supported {
        Box::new(SymlinkAlias)
    } else {
        Box::new(IndirectionFileAlias)
    }
}

fn file_name(target: &Path) -> io::Result<&std::ffi::OsStr> {
    target.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no directory name", target.display()),
        )
    })
}

#[cfg(unix)]
fn symlink_dir(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink_dir(original: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(original, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink_dir(_original: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "directory symlinks are not supported",
    ))
}
