#![allow(dead_code)]

use cachectl_core::{PurgeEngine, PurgeError, PurgeStats, Target};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Walk {
        root: PathBuf,
        filter: String,
        /// Address of the compiled matcher, to tell recompilations apart.
        filter_addr: usize,
        rate: u64,
    },
    File {
        path: PathBuf,
        size: u64,
        rate: u64,
    },
}

impl Call {
    pub fn path(&self) -> &Path {
        match self {
            Call::Walk { root, .. } => root,
            Call::File { path, .. } => path,
        }
    }
}

/// Records every call instead of touching the page cache.
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<Call>>,
    fail_paths: HashSet<PathBuf>,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call for a path in `paths` returns an error.
    pub fn failing_for(paths: &[&Path]) -> Arc<Self> {
        Arc::new(Self {
            fail_paths: paths.iter().map(|p| p.to_path_buf()).collect(),
            ..Self::default()
        })
    }

    /// Every call blocks until the returned sender sends or is dropped.
    pub fn gated() -> (Arc<Self>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let engine = Self {
            gate: Mutex::new(Some(rx)),
            ..Self::default()
        };
        (Arc::new(engine), tx)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, path: &Path) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.path() == path).collect()
    }

    fn record(&self, call: Call) -> Result<PurgeStats, PurgeError> {
        let path = call.path().to_path_buf();
        self.calls.lock().unwrap().push(call);

        if let Some(rx) = self.gate.lock().unwrap().as_ref() {
            let _ = rx.recv();
        }

        if self.fail_paths.contains(&path) {
            return Err(PurgeError::Open {
                path,
                source: std::io::Error::other("injected failure"),
            });
        }
        Ok(PurgeStats {
            files: 1,
            bytes: 0,
            failed: 0,
        })
    }
}

impl PurgeEngine for RecordingEngine {
    fn walk_and_purge(
        &self,
        root: &Path,
        filter: &Regex,
        rate: u64,
        _verbose: bool,
    ) -> Result<PurgeStats, PurgeError> {
        self.record(Call::Walk {
            root: root.to_path_buf(),
            filter: filter.as_str().to_string(),
            filter_addr: filter as *const Regex as usize,
            rate,
        })
    }

    fn purge_file(
        &self,
        path: &Path,
        size: u64,
        rate: u64,
        _verbose: bool,
    ) -> Result<PurgeStats, PurgeError> {
        self.record(Call::File {
            path: path.to_path_buf(),
            size,
            rate,
        })
    }
}

pub fn target(path: &Path, filter: &str, interval: u64, rate: u64) -> Target {
    Target {
        path: path.to_path_buf(),
        filter: filter.to_string(),
        purge_interval: interval,
        rate,
    }
}
