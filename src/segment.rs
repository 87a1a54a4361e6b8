//! Cutting bankfull polygons and centerlines into reach segments.
use tracing::info;

use crate::engine::GeometryEngine;
use crate::error::Result;
use crate::features::{FeatureSet, ShapeKind};
use crate::units::{LinearUnit, FOOT_TO_METER};

/// Half-width of the corridor cut along each reach break: one foot.
pub const REACH_BREAK_BUFFER_M: f64 = FOOT_TO_METER;

/// Reach breaks as cutting lines.  Polygons are replaced by their boundary.
pub fn cutting_lines<E: GeometryEngine + ?Sized>(engine: &E, reach_breaks: &FeatureSet) -> Result<FeatureSet> {
    Ok(match reach_breaks.kind {
        ShapeKind::Line => reach_breaks.clone(),
        ShapeKind::Polygon => {
            info!(records = reach_breaks.len(), "converting reach-break polygons to lines");
            engine.boundary(reach_breaks)?
        }
    })
}

/// The cutting lines grown by one foot (in `unit`) and dissolved into a
/// single corridor feature.
pub fn buffer_reach_breaks<E: GeometryEngine + ?Sized>(
    engine: &E,
    cutting: &FeatureSet,
    unit: LinearUnit,
) -> Result<FeatureSet> {
    let distance = unit.from_metric_length(REACH_BREAK_BUFFER_M);
    let buffered = engine.buffer(cutting, distance)?;
    Ok(engine.dissolve(&buffered)?)
}

/// Split `bankfull` along the corridor `buffered`.
///
/// Faces are built from both boundaries; a face survives when it lies within
/// the bankfull extent and not within the corridor itself.
pub fn segment_bankfull<E: GeometryEngine + ?Sized>(
    engine: &E,
    bankfull: &FeatureSet,
    buffered: &FeatureSet,
) -> Result<FeatureSet> {
    let extent = engine.dissolve(bankfull)?;
    let faces = engine.polygonize_from_lines(&[bankfull, buffered])?;
    let inside = engine.select_by_containment(&faces, &extent, false)?;
    let segments = engine.select_by_containment(&inside, buffered, true)?;
    info!(faces = faces.len(), inside = inside.len(), segments = segments.len(), "segmented bankfull");
    Ok(segments)
}

/// Split `centerline` wherever a cutting line crosses it.
///
/// Chains may run across the joint between two records, so they are kept
/// when they lie along the dissolved centerline.
pub fn segment_centerline<E: GeometryEngine + ?Sized>(
    engine: &E,
    centerline: &FeatureSet,
    cutting: &FeatureSet,
) -> Result<FeatureSet> {
    let footprint = engine.dissolve(centerline)?;
    let pieces = engine.line_from_lines(&[centerline, cutting])?;
    let segments = engine.select_by_containment(&pieces, &footprint, false)?;
    info!(pieces = pieces.len(), segments = segments.len(), "segmented centerline");
    Ok(segments)
}
