use std::fs::Metadata;
use std::io;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathKind {
    Directory,
    Regular,
    /// Sockets, devices, fifos.
    Other,
}

/// What a path looked like at the moment it was probed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Probe {
    pub kind: PathKind,
    /// Only meaningful for [`PathKind::Regular`].
    pub size: u64,
}

/// Stat `path`, following symlinks. Nothing is cached between calls.
pub fn probe(path: &Path) -> io::Result<Probe> {
    let meta = std::fs::metadata(path)?;
    Ok(Probe::from_metadata(&meta))
}

impl Probe {
    pub fn from_metadata(meta: &Metadata) -> Self {
        let ft = meta.file_type();
        let kind = if ft.is_dir() {
            PathKind::Directory
        } else if ft.is_file() {
            PathKind::Regular
        } else {
            PathKind::Other
        };
        Self {
            kind,
            size: meta.len(),
        }
    }
}
