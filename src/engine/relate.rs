use geos::Geom;

use crate::error::EngineError;
use crate::features::ShapeKind;

use super::convert::{geos_err, GeosShape};

/// Largest share of a candidate's area that may fall outside its reference
/// and still count as "within".
const AREA_TOLERANCE: f64 = 1e-6;

/// Whether `candidate` lies within `reference`, boundary contact allowed.
pub(super) fn is_within(candidate: &GeosShape, reference: &GeosShape, tolerance: f64) -> Result<bool, EngineError> {
    let (c, r) = (&candidate.geom, &reference.geom);
    Ok(match (candidate.kind, reference.kind) {
        (ShapeKind::Polygon, ShapeKind::Polygon) => {
            let area = c.area().map_err(geos_err("area"))?;
            let outside = c.difference(r).and_then(|d| d.area()).map_err(geos_err("difference"))?;
            area > 0.0 && outside <= area * AREA_TOLERANCE
        }
        (ShapeKind::Line, ShapeKind::Polygon) => {
            let length = c.length().map_err(geos_err("length"))?;
            let outside = c.difference(r).and_then(|d| d.length()).map_err(geos_err("difference"))?;
            length > 0.0 && outside <= tolerance
        }
        (ShapeKind::Line, ShapeKind::Line) => {
            let length = c.length().map_err(geos_err("length"))?;
            let outside = r.buffer(tolerance, 2)
                .and_then(|near| c.difference(&near))
                .and_then(|d| d.length())
                .map_err(geos_err("difference"))?;
            length > 0.0 && outside <= tolerance
        }
        (ShapeKind::Polygon, ShapeKind::Line) => false,
    })
}

/// Whether the interiors of `a` and `b` share positive area (or length, when
/// a line is involved).  Bare boundary contact does not count.
pub(super) fn interiors_intersect(a: &GeosShape, b: &GeosShape, tolerance: f64) -> Result<bool, EngineError> {
    Ok(match (a.kind, b.kind) {
        (ShapeKind::Polygon, ShapeKind::Polygon) => {
            let smaller = a.geom.area().map_err(geos_err("area"))?
                .min(b.geom.area().map_err(geos_err("area"))?);
            let shared = a.geom.intersection(&b.geom).and_then(|i| i.area()).map_err(geos_err("intersection"))?;
            shared > smaller * AREA_TOLERANCE
        }
        (ShapeKind::Polygon, ShapeKind::Line) | (ShapeKind::Line, ShapeKind::Polygon) => {
            let (polygon, line) = if a.kind == ShapeKind::Polygon { (a, b) } else { (b, a) };
            // Shrink so a line lying on the boundary stays out.
            let inside = polygon.geom.buffer(-tolerance, 2)
                .and_then(|interior| line.geom.intersection(&interior))
                .and_then(|i| i.length())
                .map_err(geos_err("intersection"))?;
            inside > tolerance
        }
        (ShapeKind::Line, ShapeKind::Line) => {
            let shared = b.geom.buffer(tolerance, 2)
                .and_then(|near| a.geom.intersection(&near))
                .and_then(|i| i.length())
                .map_err(geos_err("intersection"))?;
            shared > tolerance
        }
    })
}
