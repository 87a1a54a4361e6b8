use geo::{Geometry as GeoGeometry, LineString, MultiLineString, MultiPolygon, Polygon};
use geos::Geometry;

use crate::error::EngineError;
use crate::features::{Shape, ShapeKind};

/// Wraps a GEOS failure with the operation that raised it.
pub(super) fn geos_err(op: &'static str) -> impl Fn(geos::Error) -> EngineError {
    move |e| EngineError::Geos(format!("{op}: {e}"))
}

/// A shape handed to GEOS, remembering which kind it came from.
pub(super) struct GeosShape {
    pub(super) kind: ShapeKind,
    pub(super) geom: Geometry,
}

impl GeosShape {
    pub(super) fn new(shape: &Shape) -> Result<Self, EngineError> {
        let geom = match shape {
            Shape::Polygon(mp) => Geometry::try_from(mp),
            Shape::Line(ml) => Geometry::try_from(ml),
        }
        .map_err(geos_err("convert to GEOS"))?;
        Ok(Self { kind: shape.kind(), geom })
    }
}

fn collect_polygons(geom: GeoGeometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geom {
        GeoGeometry::Polygon(p) => out.push(p),
        GeoGeometry::MultiPolygon(mp) => out.extend(mp.0),
        GeoGeometry::GeometryCollection(gc) => gc.0.into_iter().for_each(|g| collect_polygons(g, out)),
        _ => {}
    }
}

fn collect_lines(geom: GeoGeometry<f64>, out: &mut Vec<LineString<f64>>) {
    match geom {
        GeoGeometry::LineString(ls) => out.push(ls),
        GeoGeometry::MultiLineString(ml) => out.extend(ml.0),
        GeoGeometry::GeometryCollection(gc) => gc.0.into_iter().for_each(|g| collect_lines(g, out)),
        _ => {}
    }
}

/// Polygonal parts of a GEOS result; anything of lower dimension is dropped.
pub(super) fn polygons(geom: Geometry) -> Result<Vec<Polygon<f64>>, EngineError> {
    let mut out = Vec::new();
    collect_polygons(GeoGeometry::try_from(geom).map_err(geos_err("convert from GEOS"))?, &mut out);
    Ok(out)
}

/// Linear parts of a GEOS result.
pub(super) fn lines(geom: Geometry) -> Result<Vec<LineString<f64>>, EngineError> {
    let mut out = Vec::new();
    collect_lines(GeoGeometry::try_from(geom).map_err(geos_err("convert from GEOS"))?, &mut out);
    Ok(out)
}

/// A GEOS result as a shape of `kind`.
pub(super) fn to_shape(geom: Geometry, kind: ShapeKind) -> Result<Shape, EngineError> {
    Ok(match kind {
        ShapeKind::Polygon => Shape::Polygon(MultiPolygon::new(polygons(geom)?)),
        ShapeKind::Line => Shape::Line(MultiLineString::new(lines(geom)?)),
    })
}
