//! On-disk project layout: input mirrors, numbered run directories and the
//! per-run manifest.
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Directory created under the caller's output root.
pub const PROJECT_DIR: &str = "ChannelNarrowingProject";
const INPUTS_DIR: &str = "01_Inputs";
const STATE_FILE: &str = "project.json";

/// Create the directory if it doesn't exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Hex sha256 of a file's contents.
pub(crate) fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("open for hash {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1 << 16];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hex sha256 of every file of a dataset, keyed by extension.
pub(crate) fn sha256_files(files: &[PathBuf]) -> Result<BTreeMap<String, String>> {
    files.iter()
        .map(|path| {
            let ext = path.extension().unwrap_or_default().to_string_lossy().to_ascii_lowercase();
            Ok((ext, sha256_file(path)?))
        })
        .collect()
}

/// The caller-supplied datasets, in mirror order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSlot {
    HistoricBankfull,
    ModernBankfull,
    ModernCenterline,
    HistoricCenterline,
    ReachBreaks,
}

impl InputSlot {
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::HistoricBankfull => "01_HistoricBankfull",
            Self::ModernBankfull => "02_ModernBankfull",
            Self::ModernCenterline => "03_ModernCenterline",
            Self::HistoricCenterline => "04_HistoricCenterline",
            Self::ReachBreaks => "05_ReachBreaks",
        }
    }
}

/// Persisted project counters.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ProjectState {
    next_output: u32,
}

/// `<root>/ChannelNarrowingProject`.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    /// Open (creating as needed) the project under `output_root`.
    pub fn open(output_root: &Path) -> Result<Self> {
        let root = output_root.join(PROJECT_DIR);
        ensure_dir_exists(&root.join(INPUTS_DIR))?;
        Ok(Self { root })
    }

    #[inline] pub fn root(&self) -> &Path { &self.root }

    /// Where the mirror of `source` lives for `slot`.
    pub fn input_path(&self, slot: InputSlot, source: &Path) -> PathBuf {
        let file = source.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("input.shp"));
        self.root.join(INPUTS_DIR).join(slot.dir_name()).join(file)
    }

    fn load_state(&self) -> Result<ProjectState> {
        let path = self.root.join(STATE_FILE);
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("Failed to parse {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ProjectState { next_output: 1 }),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn save_state(&self, state: &ProjectState) -> Result<()> {
        let path = self.root.join(STATE_FILE);
        fs::write(&path, serde_json::to_vec_pretty(state)?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Create the next `Output_<k>` directory.  An existing directory is
    /// never reused: its number is skipped and the counter moves past it.
    pub fn allocate_output(&self) -> Result<PathBuf> {
        let mut state = self.load_state()?;
        let mut k = state.next_output.max(1);
        let dir = loop {
            let dir = self.root.join(format!("Output_{k}"));
            match fs::create_dir(&dir) {
                Ok(()) => break dir,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => k += 1,
                Err(e) => return Err(e).with_context(|| format!("Failed to create {}", dir.display())),
            }
        };
        state.next_output = k + 1;
        self.save_state(&state)?;
        Ok(dir)
    }
}

/// Fallback number once two digits are used up.
pub const FALLBACK_SEQUENCE: u32 = 0;

/// A numbered directory name handed out by a [`SequenceCounter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub name: String,
    /// The counter was exhausted and the fallback number was used.
    pub fallback: bool,
}

/// Two-digit sequence (01..=99) owned by one run.
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    next: u32,
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl SequenceCounter {
    /// `NN_<label>` with the next free number.
    pub fn next_name(&mut self, label: &str) -> Sequence {
        let (n, fallback) = if self.next <= 99 {
            self.next += 1;
            (self.next - 1, false)
        } else {
            (FALLBACK_SEQUENCE, true)
        };
        Sequence { name: format!("{n:02}_{label}"), fallback }
    }
}

/// Hashes of one mirrored input, one per sidecar extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHash {
    pub source: PathBuf,
    pub mirror: PathBuf,
    pub sha256: BTreeMap<String, String>,
}

/// `manifest.json` written into every run directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub config: serde_json::Value,
    pub linear_unit: Option<String>,
    pub inputs: BTreeMap<String, FileHash>,
    pub outputs: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl RunManifest {
    pub fn write(&self, run_dir: &Path) -> Result<()> {
        let path = run_dir.join("manifest.json");
        fs::write(&path, serde_json::to_vec_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn read(run_dir: &Path) -> Result<Self> {
        let path = run_dir.join("manifest.json");
        let bytes = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_slice(&bytes).context("Failed to parse manifest.json")
    }
}
