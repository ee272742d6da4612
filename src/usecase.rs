mod alias;
mod freeze;
mod target_type;
mod version_range;

pub use alias::{detect as detect_alias, DirectoryAlias, IndirectionFileAlias, SymlinkAlias};
pub use freeze::{FreezeEntry, FreezeMap, FreezeRecorder, FREEZE_FILE};
pub use target_type::{target_type, EXECUTABLE, LIBRARY};
pub use version_range::VersionRange;
