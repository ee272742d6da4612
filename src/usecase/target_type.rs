use std::path::Path;

/// Generator expression making a dependency's own target a library.
pub const LIBRARY: &str = "<(library)";
pub const EXECUTABLE: &str = "executable";

/// Target type for a project file evaluated in `cwd`.
///
/// Project files inside the dependency root belong to dependencies and build
/// as libraries; anything else is the top-level project.
pub fn target_type(cwd: &Path, deps_root: &Path) -> &'static str {
    let cwd = dunce::canonicalize(cwd).unwrap_or_else(|_| cwd.to_path_buf());
    let deps_root = dunce::canonicalize(deps_root).unwrap_or_else(|_| deps_root.to_path_buf());
    if cwd.starts_with(&deps_root) {
        LIBRARY
    } else {
        EXECUTABLE
    }
}
