use std::path::Path;

use bitflags::bitflags;
use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

bitflags! {
    /// What happened to a path. Several bits may be set at once.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangeOp: u8 {
        const CREATE = 1;
        const WRITE = 1 << 1;
        const REMOVE = 1 << 2;
        const RENAME = 1 << 3;
        const CHMOD = 1 << 4;
    }
}

impl ChangeOp {
    /// Map a notify event kind onto change bits.
    pub fn from_kind(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => Self::CREATE,
            EventKind::Remove(_) => Self::REMOVE,
            // The destination of a move shows up as a new file
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Self::CREATE,
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Self::RENAME | Self::CREATE,
            EventKind::Modify(ModifyKind::Name(_)) => Self::RENAME,
            EventKind::Modify(ModifyKind::Metadata(_)) => Self::CHMOD,
            EventKind::Modify(_) => Self::WRITE,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Self::empty(),
        }
    }
}

/// Decide whether a change to `path` should trigger a rebuild.
pub fn should_rebuild(path: &Path, op: ChangeOp) -> bool {
    let base = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

    // Finder metadata
    if base == ".DS_Store" {
        return false;
    }

    // Vim tests directory writability with this file
    if base == "4913" {
        return false;
    }

    // Editor backups
    if base.ends_with('~') {
        return false;
    }

    // chmod does not affect output; a rename is followed by a create for the
    // new name, which is picked up on its own
    op.intersects(ChangeOp::CREATE | ChangeOp::REMOVE | ChangeOp::WRITE)
}
