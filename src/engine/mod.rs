//! The geometry/feature-store capability the pipeline consumes, and its
//! default shapefile + GEOS implementation.
mod convert;
mod geo_engine;
mod index;
mod join;
mod relate;
mod shp;

use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::features::{FeatureSet, FieldDef, FieldDescriptor, SpatialReference};

pub use geo_engine::GeoEngine;

/// Spatial relationship a join record must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPredicate {
    /// Interiors share area or length; touching boundaries alone do not count.
    Intersects,
    /// The target feature lies within the join feature.
    Within,
}

/// Everything the pipeline asks of a GIS backend.
///
/// Datasets live on disk between stages; geometry operations work on
/// in-memory [`FeatureSet`]s and never touch the filesystem.
pub trait GeometryEngine {
    /// Load the dataset at `path`.
    fn read(&self, path: &Path) -> Result<FeatureSet, EngineError>;

    /// Persist `set` as a new dataset; fails if `path` already exists.
    fn write(&self, set: &FeatureSet, path: &Path) -> Result<(), EngineError>;

    fn exists(&self, path: &Path) -> bool;

    /// The coordinate system of the dataset at `path`, without loading its
    /// records.
    fn spatial_reference(&self, path: &Path) -> Result<SpatialReference, EngineError>;

    /// Every file on disk that makes up the dataset at `path`.
    fn files(&self, path: &Path) -> Vec<PathBuf>;

    /// Copy a dataset verbatim, sidecars included; fails if `dst` exists.
    fn copy(&self, src: &Path, dst: &Path) -> Result<(), EngineError>;

    /// Remove a dataset.  Removing a missing dataset succeeds.
    fn delete(&self, path: &Path) -> Result<(), EngineError>;

    /// Node the line-work of every input (polygon boundaries included) and
    /// return each enclosed face as a polygon.
    fn polygonize_from_lines(&self, inputs: &[&FeatureSet]) -> Result<FeatureSet, EngineError>;

    /// Node the line-work of every input and return the maximal chains
    /// between intersections.
    fn line_from_lines(&self, inputs: &[&FeatureSet]) -> Result<FeatureSet, EngineError>;

    /// Grow every feature by `distance` (native units), dissolving overlaps
    /// within a feature.
    fn buffer(&self, set: &FeatureSet, distance: f64) -> Result<FeatureSet, EngineError>;

    /// Merge every feature into one.
    fn dissolve(&self, set: &FeatureSet) -> Result<FeatureSet, EngineError>;

    /// Polygon rings as lines, attributes kept.  Lines pass through.
    fn boundary(&self, set: &FeatureSet) -> Result<FeatureSet, EngineError>;

    /// Candidates lying within some reference feature, or with `invert` the
    /// candidates that do not.
    fn select_by_containment(
        &self,
        candidates: &FeatureSet,
        reference: &FeatureSet,
        invert: bool,
    ) -> Result<FeatureSet, EngineError>;

    /// One record per (target, join) pair satisfying `predicate`; unmatched
    /// targets are kept with null join fields.
    fn spatial_join(
        &self,
        target: &FeatureSet,
        join: &FeatureSet,
        predicate: JoinPredicate,
    ) -> Result<FeatureSet, EngineError>;

    /// Append a null-valued column.
    fn add_field(&self, set: &mut FeatureSet, field: FieldDef) -> Result<(), EngineError>;

    fn delete_fields(&self, set: &mut FeatureSet, names: &[&str]) -> Result<(), EngineError>;

    fn list_fields(&self, set: &FeatureSet) -> Vec<FieldDescriptor>;
}
