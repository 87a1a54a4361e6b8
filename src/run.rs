//! Run configuration and the orchestrator driving one invocation end to end.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{GeometryEngine, JoinPredicate};
use crate::error::{Error, Result};
use crate::features::FeatureSet;
use crate::hygiene::{join_and_strip, strip_fields};
use crate::messages::MessageSink;
use crate::metrics::{assign_area, assign_length, assign_width};
use crate::project::{sha256_files, FileHash, InputSlot, Project, RunManifest, SequenceCounter};
use crate::reduction::assign_reductions;
use crate::schema::*;
use crate::segment::{buffer_reach_breaks, cutting_lines, segment_bankfull, segment_centerline};
use crate::units::LinearUnit;

/// Interpret a textual boolean: absent or `false` (any case, trimmed) is
/// false, anything else is true.
pub fn parse_flag(raw: Option<&str>) -> bool {
    raw.is_some_and(|s| !s.trim().eq_ignore_ascii_case("false"))
}

/// Everything one run needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub historic_bankfull: PathBuf,
    pub modern_bankfull: PathBuf,
    #[serde(default)]
    pub reach_breaks: Option<PathBuf>,
    pub modern_centerline: PathBuf,
    #[serde(default)]
    pub historic_centerline: Option<PathBuf>,
    pub output_root: PathBuf,
    pub output_name: String,
    /// The bankfull polygons are already cut into reach segments.
    #[serde(default)]
    pub pre_segmented: bool,
    /// Replace input mirrors that differ from the supplied datasets.
    #[serde(default)]
    pub overwrite: bool,
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let config = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Every supplied input with the slot its mirror goes in.
    fn inputs(&self) -> Vec<(InputSlot, &Path)> {
        let mut inputs = vec![
            (InputSlot::HistoricBankfull, self.historic_bankfull.as_path()),
            (InputSlot::ModernBankfull, self.modern_bankfull.as_path()),
            (InputSlot::ModernCenterline, self.modern_centerline.as_path()),
        ];
        if let Some(path) = &self.historic_centerline {
            inputs.push((InputSlot::HistoricCenterline, path.as_path()));
        }
        if let Some(path) = &self.reach_breaks {
            inputs.push((InputSlot::ReachBreaks, path.as_path()));
        }
        inputs
    }
}

/// Pipeline progress; each run walks these in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    NeedsSegmentation,
    Segmented,
    Measured,
    Joined,
    Reduced,
    Cleaned,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_dir: PathBuf,
    pub polygon: PathBuf,
    pub polyline: PathBuf,
    pub state: RunState,
    pub warnings: Vec<String>,
}

/// Forwards to the host sink and remembers warnings for the manifest.
struct Recorder<'a> {
    inner: &'a dyn MessageSink,
    warnings: RefCell<Vec<String>>,
}

impl MessageSink for Recorder<'_> {
    fn info(&self, message: &str) {
        self.inner.info(message);
    }

    fn warn(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
        self.inner.warn(message);
    }
}

/// Segmented, measured bankfulls and centerlines of both eras.
struct Segments {
    historic: FeatureSet,
    modern: FeatureSet,
    historic_centerline: Option<FeatureSet>,
    modern_centerline: FeatureSet,
}

/// Drives one run against a [`GeometryEngine`].
pub struct Orchestrator<'a, E: GeometryEngine + ?Sized> {
    engine: &'a E,
    sink: &'a dyn MessageSink,
    config: RunConfig,
}

impl<'a, E: GeometryEngine + ?Sized> Orchestrator<'a, E> {
    pub fn new(engine: &'a E, sink: &'a dyn MessageSink, config: RunConfig) -> Self {
        Self { engine, sink, config }
    }

    /// Checks made before anything touches the filesystem.  Returns the
    /// linear unit shared by every input.
    fn preflight(&self) -> Result<LinearUnit> {
        let config = &self.config;
        if config.reach_breaks.is_none() {
            return Err(Error::InputConfiguration(if config.pre_segmented {
                "inputs are declared pre-segmented but no reach breaks were supplied to cut the centerlines".into()
            } else {
                "inputs are not segmented and no reach breaks were supplied".into()
            }));
        }
        if config.output_name.trim().is_empty() {
            return Err(Error::InputConfiguration("output name is empty".into()));
        }
        for (slot, path) in config.inputs() {
            if !self.engine.exists(path) {
                return Err(Error::InputConfiguration(format!(
                    "{} dataset not found: {}", slot.dir_name(), path.display()
                )));
            }
        }

        let mut shared: Option<(InputSlot, LinearUnit)> = None;
        for (slot, path) in config.inputs() {
            let unit = self.engine.spatial_reference(path)?.linear_unit()?;
            match shared {
                None => shared = Some((slot, unit)),
                Some((first, expected)) if expected != unit => {
                    return Err(Error::InputConfiguration(format!(
                        "{} is in {} but {} is in {}; every input must share one linear unit",
                        slot.dir_name(), unit.name(), first.dir_name(), expected.name()
                    )));
                }
                Some(_) => {}
            }
        }
        shared.map(|(_, unit)| unit).ok_or_else(|| Error::InputConfiguration("no inputs".into()))
    }

    /// Copy every input into the project, reusing mirrors whose files all
    /// match the source.
    fn mirror_inputs(&self, project: &Project) -> Result<BTreeMap<String, FileHash>> {
        let mut hashes = BTreeMap::new();
        for (slot, source) in self.config.inputs() {
            let mirror = project.input_path(slot, source);
            let source_hash = sha256_files(&self.engine.files(source))?;
            if self.engine.exists(&mirror) {
                if sha256_files(&self.engine.files(&mirror))? == source_hash {
                    info!(mirror = %mirror.display(), "input mirror up to date");
                } else if self.config.overwrite {
                    self.engine.delete(&mirror)?;
                    self.engine.copy(source, &mirror)?;
                } else {
                    return Err(Error::InputConfiguration(format!(
                        "{} differs from {}; pass overwrite to replace it", mirror.display(), source.display()
                    )));
                }
            } else {
                self.engine.copy(source, &mirror)?;
            }
            hashes.insert(
                slot.dir_name().to_string(),
                FileHash { source: source.to_path_buf(), mirror, sha256: source_hash },
            );
        }
        Ok(hashes)
    }

    /// Write `set` to `path`, replacing any stale scratch copy, and hand back
    /// what the engine reads from disk.
    fn persist(&self, set: &FeatureSet, path: &Path) -> Result<FeatureSet> {
        self.engine.delete(path)?;
        self.engine.write(set, path)?;
        Ok(self.engine.read(path)?)
    }

    fn advance(&self, state: &mut RunState, next: RunState) {
        info!(from = %state, to = %next, "run state");
        self.sink.info(&format!("{state} -> {next}"));
        *state = next;
    }

    /// Execute the whole pipeline.  Any error aborts the run; the run
    /// directory is then incomplete.
    pub fn run(&self) -> Result<RunReport> {
        let unit = self.preflight()?;
        let log = Recorder { inner: self.sink, warnings: RefCell::new(Vec::new()) };
        let config = &self.config;
        let engine = self.engine;

        let project = Project::open(&config.output_root)?;
        let hashes = self.mirror_inputs(&project)?;
        let mirror = |slot: InputSlot, source: &Path| project.input_path(slot, source);

        let run_dir = project.allocate_output()?;
        info!(run_dir = %run_dir.display(), "allocated run directory");
        let mut sequence = SequenceCounter::default();
        let mut stage_dir = |label: &str| -> Result<PathBuf> {
            let seq = sequence.next_name(label);
            if seq.fallback {
                log.warn(&format!("sequence numbers exhausted; using {}", seq.name));
            }
            let dir = run_dir.join(&seq.name);
            fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
            Ok(dir)
        };
        let scratch = stage_dir("Intermediates")?;
        let analyses = stage_dir("Analyses")?;

        let historic = engine.read(&mirror(InputSlot::HistoricBankfull, &config.historic_bankfull))?;
        let modern = engine.read(&mirror(InputSlot::ModernBankfull, &config.modern_bankfull))?;
        let modern_cl = engine.read(&mirror(InputSlot::ModernCenterline, &config.modern_centerline))?;
        let historic_cl = config.historic_centerline.as_ref()
            .map(|p| engine.read(&mirror(InputSlot::HistoricCenterline, p)))
            .transpose()?;
        let breaks_path = config.reach_breaks.as_ref()
            .ok_or_else(|| Error::InputConfiguration("no reach breaks".into()))?;
        let breaks = engine.read(&mirror(InputSlot::ReachBreaks, breaks_path))?;

        let mut state = if config.pre_segmented { RunState::Segmented } else { RunState::NeedsSegmentation };
        info!(%state, unit = unit.name(), "starting run");

        // Segment
        let cutting = cutting_lines(engine, &breaks)?;
        let (historic_seg, modern_seg) = if state == RunState::NeedsSegmentation {
            let buffer_path = scratch.join("ReachBreakBuffer.shp");
            let buffered = self.persist(&buffer_reach_breaks(engine, &cutting, unit)?, &buffer_path)?;
            let h = segment_bankfull(engine, &historic, &buffered)?;
            let m = segment_bankfull(engine, &modern, &buffered)?;
            engine.delete(&buffer_path)?;
            self.advance(&mut state, RunState::Segmented);
            (h, m)
        } else {
            (historic, modern)
        };
        let mut segments = Segments {
            historic: self.persist(&historic_seg, &scratch.join("HistoricSegments.shp"))?,
            modern: self.persist(&modern_seg, &scratch.join("ModernSegments.shp"))?,
            historic_centerline: match &historic_cl {
                Some(cl) => Some(self.persist(
                    &segment_centerline(engine, cl, &cutting)?,
                    &scratch.join("HistoricCenterlineSegments.shp"),
                )?),
                None => None,
            },
            modern_centerline: self.persist(
                &segment_centerline(engine, &modern_cl, &cutting)?,
                &scratch.join("ModernCenterlineSegments.shp"),
            )?,
        };
        log.info(&format!(
            "{} historic and {} modern segments", segments.historic.len(), segments.modern.len()
        ));

        // Measure
        assign_area(engine, &mut segments.historic, HIST_AREA)?;
        assign_area(engine, &mut segments.modern, CRNT_AREA)?;
        let mut historic_length = match segments.historic_centerline.take() {
            Some(cl) => cl,
            None => {
                log.info("no historic centerline; measuring historic length on the modern centerline");
                segments.modern_centerline.clone()
            }
        };
        assign_length(engine, &mut historic_length, HIST_LENGTH)?;
        assign_length(engine, &mut segments.modern_centerline, CRNT_LENGTH)?;
        assign_length(engine, &mut segments.modern_centerline, SEG_LENGTH)?;
        self.advance(&mut state, RunState::Measured);

        // Join
        let mut historic_joined = join_and_strip(
            engine, &segments.historic, &historic_length, JoinPredicate::Intersects, &[HIST_AREA, HIST_LENGTH],
        )?;
        assign_width(engine, &mut historic_joined, HIST_AREA, HIST_LENGTH, HIST_WIDTH, &log)?;
        let historic_joined = self.persist(&historic_joined, &scratch.join("HistoricJoined.shp"))?;

        let mut modern_joined = join_and_strip(
            engine, &segments.modern, &segments.modern_centerline, JoinPredicate::Intersects, &[CRNT_AREA, CRNT_LENGTH],
        )?;
        assign_width(engine, &mut modern_joined, CRNT_AREA, CRNT_LENGTH, CRNT_WIDTH, &log)?;
        let modern_joined = self.persist(&modern_joined, &scratch.join("ModernJoined.shp"))?;

        let era_fields: Vec<&str> = HISTORIC_FIELDS.iter().chain(MODERN_FIELDS).copied().collect();
        let mut combined = join_and_strip(
            engine, &historic_joined, &modern_joined, JoinPredicate::Intersects, &era_fields,
        )?;
        self.advance(&mut state, RunState::Joined);

        // Reduce
        assign_reductions(engine, &mut combined, &log)?;
        self.advance(&mut state, RunState::Reduced);

        // Clean
        strip_fields(engine, &mut combined, POLYGON_FIELDS)?;
        let polygon_path = analyses.join(format!("{}_Polygon.shp", config.output_name));
        let polygon = self.persist(&combined, &polygon_path)?;

        let mut centerline = segments.modern_centerline;
        strip_fields(engine, &mut centerline, &[SEG_LENGTH])?;
        let polyline = join_and_strip(engine, &centerline, &polygon, JoinPredicate::Intersects, POLYLINE_FIELDS)?;
        let polyline_path = analyses.join(format!("{}_Polyline.shp", config.output_name));
        self.persist(&polyline, &polyline_path)?;
        self.advance(&mut state, RunState::Cleaned);

        let warnings = log.warnings.into_inner();
        RunManifest {
            config: serde_json::to_value(config).context("Failed to serialize run configuration")?,
            linear_unit: Some(unit.name().to_string()),
            inputs: hashes,
            outputs: vec![polygon_path.clone(), polyline_path.clone()],
            warnings: warnings.clone(),
        }
        .write(&run_dir)?;

        info!(polygon = %polygon_path.display(), polyline = %polyline_path.display(), "run complete");
        Ok(RunReport { run_dir, polygon: polygon_path, polyline: polyline_path, state, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing() {
        assert!(!parse_flag(None));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(Some(" FALSE ")));
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("")));
        assert!(parse_flag(Some("no")));
    }

    #[test]
    fn config_defaults_from_json() {
        let config: RunConfig = serde_json::from_str(r#"{
            "historic_bankfull": "h.shp",
            "modern_bankfull": "m.shp",
            "modern_centerline": "c.shp",
            "output_root": "out",
            "output_name": "Reach"
        }"#).unwrap();
        assert!(config.reach_breaks.is_none());
        assert!(!config.pre_segmented);
        assert!(!config.overwrite);
        assert_eq!(config.inputs().len(), 3);
    }
}
