use std::path::{Path, PathBuf};

use geo::{MultiLineString, MultiPolygon};
use geos::{BufferParams, CapStyle, Geom, Geometry, JoinStyle};
use tracing::debug;

use crate::error::EngineError;
use crate::features::{
    Feature, FeatureSet, FieldDef, FieldDescriptor, FieldType, Shape, ShapeKind, SpatialReference, Value, FID_FIELD,
    SHAPE_FIELD,
};
use crate::schema::ID_FIELD;

use super::convert::{self, geos_err, GeosShape};
use super::index::FeatureIndex;
use super::relate::is_within;
use super::{join, shp, GeometryEngine, JoinPredicate};

/// Longest attribute name a dBase table accepts.
const MAX_FIELD_NAME: usize = 10;

/// Segments per quarter circle on buffer arcs.
const QUADRANT_SEGMENTS: i32 = 8;

/// Shapefile-backed engine doing its topology with GEOS.
#[derive(Debug, Clone, Copy)]
pub struct GeoEngine {
    /// Containment and intersection tolerance, in dataset units.
    pub tolerance: f64,
}

impl Default for GeoEngine {
    fn default() -> Self {
        Self { tolerance: 1e-6 }
    }
}

impl GeoEngine {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// A fresh set of `kind` carrying only the default `Id` column.
    fn id_set(&self, kind: ShapeKind, like: Option<&FeatureSet>) -> FeatureSet {
        let mut set = FeatureSet::new(kind, like.map(|s| s.spatial_ref.clone()).unwrap_or_default());
        set.fields.push(FieldDef::new(ID_FIELD, FieldType::Integer));
        set
    }

    fn id_feature(shape: Shape) -> Feature {
        Feature::new(shape).with(ID_FIELD, Value::Integer(Some(0)))
    }
}

/// Every feature of every input in one GEOS collection, polygons replaced
/// by their rings when `rings` is set.
fn collect(inputs: &[&FeatureSet], rings: bool) -> Result<Geometry, EngineError> {
    let parts = inputs.iter()
        .flat_map(|set| set.features.iter())
        .map(|f| {
            let shape = GeosShape::new(&f.shape)?;
            match shape.kind {
                ShapeKind::Polygon if rings => shape.geom.boundary().map_err(geos_err("boundary")),
                _ => Ok(shape.geom),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Geometry::create_geometry_collection(parts).map_err(geos_err("collect"))
}

/// The line-work of every input, noded at every crossing.
fn noded_linework(inputs: &[&FeatureSet]) -> Result<Geometry, EngineError> {
    collect(inputs, true)?.unary_union().map_err(geos_err("node line-work"))
}

impl GeometryEngine for GeoEngine {
    fn read(&self, path: &Path) -> Result<FeatureSet, EngineError> {
        let set = shp::read(path)?;
        debug!(path = %path.display(), records = set.len(), "read dataset");
        Ok(set)
    }

    fn write(&self, set: &FeatureSet, path: &Path) -> Result<(), EngineError> {
        if self.exists(path) {
            return Err(EngineError::AlreadyExists(path.to_path_buf()));
        }
        shp::write(set, path)?;
        debug!(path = %path.display(), records = set.len(), "wrote dataset");
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        !self.files(path).is_empty()
    }

    fn spatial_reference(&self, path: &Path) -> Result<SpatialReference, EngineError> {
        if !self.exists(path) {
            return Err(EngineError::NotFound(path.to_path_buf()));
        }
        Ok(shp::read_prj(path))
    }

    fn files(&self, path: &Path) -> Vec<PathBuf> {
        shp::existing_sidecars(path)
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<(), EngineError> {
        shp::copy(src, dst)
    }

    fn delete(&self, path: &Path) -> Result<(), EngineError> {
        shp::delete(path)
    }

    fn polygonize_from_lines(&self, inputs: &[&FeatureSet]) -> Result<FeatureSet, EngineError> {
        let mut out = self.id_set(ShapeKind::Polygon, inputs.first().copied());
        let faces = Geometry::polygonize(&[noded_linework(inputs)?]).map_err(geos_err("polygonize"))?;
        out.features = convert::polygons(faces)?
            .into_iter()
            .map(|p| Self::id_feature(Shape::Polygon(MultiPolygon::new(vec![p]))))
            .collect();
        Ok(out)
    }

    fn line_from_lines(&self, inputs: &[&FeatureSet]) -> Result<FeatureSet, EngineError> {
        let mut out = self.id_set(ShapeKind::Line, inputs.first().copied());
        let chains = noded_linework(inputs)?.line_merge().map_err(geos_err("line merge"))?;
        out.features = convert::lines(chains)?
            .into_iter()
            .map(|ls| Self::id_feature(Shape::Line(MultiLineString::new(vec![ls]))))
            .collect();
        Ok(out)
    }

    fn buffer(&self, set: &FeatureSet, distance: f64) -> Result<FeatureSet, EngineError> {
        if !(distance.is_finite() && distance > 0.0) {
            return Err(EngineError::Unsupported(format!("buffer distance must be positive, got {distance}")));
        }
        let params = BufferParams::builder()
            .end_cap_style(CapStyle::Round)
            .join_style(JoinStyle::Round)
            .quadrant_segments(QUADRANT_SEGMENTS)
            .build()
            .map_err(geos_err("buffer parameters"))?;
        let mut out = set.empty_like();
        out.kind = ShapeKind::Polygon;
        for f in &set.features {
            let grown = GeosShape::new(&f.shape)?.geom
                .buffer_with_params(distance, &params)
                .map_err(geos_err("buffer"))?;
            out.features.push(Feature {
                shape: convert::to_shape(grown, ShapeKind::Polygon)?,
                attributes: f.attributes.clone(),
            });
        }
        Ok(out)
    }

    fn dissolve(&self, set: &FeatureSet) -> Result<FeatureSet, EngineError> {
        let mut out = self.id_set(set.kind, Some(set));
        if set.is_empty() {
            return Ok(out);
        }
        let merged = collect(&[set], false)?.unary_union().map_err(geos_err("dissolve"))?;
        out.features.push(Self::id_feature(convert::to_shape(merged, set.kind)?));
        Ok(out)
    }

    fn boundary(&self, set: &FeatureSet) -> Result<FeatureSet, EngineError> {
        let mut out = set.empty_like();
        out.kind = ShapeKind::Line;
        for f in &set.features {
            let shape = match &f.shape {
                Shape::Polygon(_) => {
                    let rings = GeosShape::new(&f.shape)?.geom.boundary().map_err(geos_err("boundary"))?;
                    convert::to_shape(rings, ShapeKind::Line)?
                }
                Shape::Line(_) => f.shape.clone(),
            };
            out.features.push(Feature { shape, attributes: f.attributes.clone() });
        }
        Ok(out)
    }

    fn select_by_containment(
        &self,
        candidates: &FeatureSet,
        reference: &FeatureSet,
        invert: bool,
    ) -> Result<FeatureSet, EngineError> {
        let index = FeatureIndex::new(reference);
        let references = reference.features.iter()
            .map(|f| GeosShape::new(&f.shape))
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = candidates.empty_like();
        for f in &candidates.features {
            let mut within = false;
            if let Some(rect) = f.shape.bounding_rect() {
                let shape = GeosShape::new(&f.shape)?;
                for r in index.candidates(&rect, self.tolerance) {
                    if is_within(&shape, &references[r], self.tolerance)? {
                        within = true;
                        break;
                    }
                }
            }
            if within != invert {
                out.features.push(f.clone());
            }
        }
        debug!(candidates = candidates.len(), selected = out.len(), invert, "select by containment");
        Ok(out)
    }

    fn spatial_join(
        &self,
        target: &FeatureSet,
        join: &FeatureSet,
        predicate: JoinPredicate,
    ) -> Result<FeatureSet, EngineError> {
        join::spatial_join(target, join, predicate, self.tolerance)
    }

    fn add_field(&self, set: &mut FeatureSet, field: FieldDef) -> Result<(), EngineError> {
        if field.name.is_empty() || field.name.len() > MAX_FIELD_NAME || !field.name.is_ascii() {
            return Err(EngineError::InvalidFieldName(field.name));
        }
        if set.has_field(&field.name)
            || field.name.eq_ignore_ascii_case(FID_FIELD)
            || field.name.eq_ignore_ascii_case(SHAPE_FIELD)
        {
            return Err(EngineError::FieldExists(field.name));
        }
        for feature in &mut set.features {
            feature.attributes.insert(field.name.clone(), Value::null(field.ty));
        }
        set.fields.push(field);
        Ok(())
    }

    fn delete_fields(&self, set: &mut FeatureSet, names: &[&str]) -> Result<(), EngineError> {
        for &name in names {
            if name.eq_ignore_ascii_case(FID_FIELD) || name.eq_ignore_ascii_case(SHAPE_FIELD) {
                return Err(EngineError::RequiredField(name.to_string()));
            }
            let position = set.fields.iter()
                .position(|f| f.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| EngineError::MissingField(name.to_string()))?;
            let removed = set.fields.remove(position);
            for feature in &mut set.features {
                feature.attributes.remove(&removed.name);
            }
        }
        Ok(())
    }

    fn list_fields(&self, set: &FeatureSet) -> Vec<FieldDescriptor> {
        [FID_FIELD, SHAPE_FIELD].iter()
            .map(|name| FieldDescriptor { name: name.to_string(), required: true })
            .chain(set.fields.iter().map(|f| FieldDescriptor { name: f.name.clone(), required: false }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use geo::{line_string, polygon, Area};

    use super::*;

    fn single(shape: Shape) -> FeatureSet {
        let mut set = FeatureSet::new(shape.kind(), SpatialReference::default());
        set.features.push(Feature::new(shape));
        set
    }

    fn square(x0: f64, size: f64) -> Shape {
        Shape::Polygon(MultiPolygon::new(vec![polygon![
            (x: x0, y: 0.0), (x: x0 + size, y: 0.0), (x: x0 + size, y: size), (x: x0, y: size), (x: x0, y: 0.0)
        ]]))
    }

    #[test]
    fn polygonize_cuts_square_with_line() {
        let engine = GeoEngine::default();
        let area = single(square(0.0, 10.0));
        let cut = single(Shape::Line(MultiLineString::new(vec![line_string![(x: 5.0, y: -1.0), (x: 5.0, y: 11.0)]])));
        let faces = engine.polygonize_from_lines(&[&area, &cut]).unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces.field_names(), vec![ID_FIELD]);
        for f in &faces.features {
            assert!((f.shape.area() - 50.0).abs() < 1e-9);
        }
    }

    #[test]
    fn containment_selection_and_inverse() {
        let engine = GeoEngine::default();
        let mut candidates = single(square(0.0, 4.0));
        candidates.features.push(Feature::new(square(8.0, 4.0)));
        let reference = single(square(0.0, 10.0));

        let inside = engine.select_by_containment(&candidates, &reference, false).unwrap();
        let outside = engine.select_by_containment(&candidates, &reference, true).unwrap();
        assert_eq!(inside.len(), 1);
        assert_eq!(outside.len(), 1);
        assert_eq!(outside.features[0].shape, square(8.0, 4.0));
    }

    #[test]
    fn dissolve_merges_overlaps() {
        let engine = GeoEngine::default();
        let mut set = single(square(0.0, 4.0));
        set.features.push(Feature::new(square(2.0, 4.0)));
        let merged = engine.dissolve(&set).unwrap();
        assert_eq!(merged.len(), 1);
        assert!((merged.features[0].shape.as_polygon().unwrap().unsigned_area() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn field_management() {
        let engine = GeoEngine::default();
        let mut set = single(square(0.0, 1.0));
        engine.add_field(&mut set, FieldDef::new("Hist_Area", FieldType::Double)).unwrap();
        assert!(set.features[0].get("Hist_Area").is_some_and(Value::is_null));
        assert!(matches!(
            engine.add_field(&mut set, FieldDef::new("hist_area", FieldType::Double)),
            Err(EngineError::FieldExists(_))
        ));
        assert!(matches!(
            engine.add_field(&mut set, FieldDef::new("Much_Too_Long", FieldType::Double)),
            Err(EngineError::InvalidFieldName(_))
        ));
        assert!(matches!(engine.delete_fields(&mut set, &["Shape"]), Err(EngineError::RequiredField(_))));

        let listed = engine.list_fields(&set);
        assert_eq!(listed.iter().filter(|f| f.required).count(), 2);
        assert_eq!(listed.last().map(|f| f.name.as_str()), Some("Hist_Area"));

        engine.delete_fields(&mut set, &["Hist_Area"]).unwrap();
        assert!(set.fields.is_empty());
        assert!(set.features[0].attributes.is_empty());
    }

    #[test]
    fn buffer_rejects_non_positive_distance() {
        let engine = GeoEngine::default();
        let set = single(Shape::Line(MultiLineString::new(vec![line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]])));
        assert!(engine.buffer(&set, 0.0).is_err());
        assert_eq!(engine.buffer(&set, 0.5).unwrap().kind, ShapeKind::Polygon);
    }

    #[test]
    fn buffered_line_is_a_rounded_capsule() {
        let engine = GeoEngine::default();
        let set = single(Shape::Line(MultiLineString::new(vec![line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]])));
        let grown = engine.buffer(&set, 1.0).unwrap();
        let area = grown.features[0].shape.area();
        // Rectangle plus a circle drawn with straight chords.
        assert!(area < 20.0 + std::f64::consts::PI);
        assert!(area > 20.0 + 3.1);
    }

    #[test]
    fn line_from_lines_splits_at_crossings() {
        let engine = GeoEngine::default();
        let mut centerline = single(Shape::Line(MultiLineString::new(vec![
            line_string![(x: 0.0, y: 5.0), (x: 30.0, y: 5.0)],
        ])));
        centerline.features.push(Feature::new(Shape::Line(MultiLineString::new(vec![
            line_string![(x: 30.0, y: 5.0), (x: 100.0, y: 5.0)],
        ]))));
        let cut = single(Shape::Line(MultiLineString::new(vec![line_string![(x: 50.0, y: 0.0), (x: 50.0, y: 10.0)]])));

        let chains = engine.line_from_lines(&[&centerline, &cut]).unwrap();
        let mut lengths: Vec<f64> = chains.features.iter().map(|f| f.shape.length()).collect();
        lengths.sort_by(f64::total_cmp);
        assert_eq!(lengths.len(), 4);
        assert!((lengths[2] - 50.0).abs() < 1e-9 && (lengths[3] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn boundary_keeps_attributes() {
        let engine = GeoEngine::default();
        let mut set = single(square(0.0, 2.0));
        set.fields.push(FieldDef::new("Reach", FieldType::Integer));
        set.features[0].attributes.insert("Reach".into(), Value::Integer(Some(3)));
        let rings = engine.boundary(&set).unwrap();
        assert_eq!(rings.kind, ShapeKind::Line);
        assert!((rings.features[0].shape.length() - 8.0).abs() < 1e-9);
        assert_eq!(rings.features[0].get_f64("Reach"), Some(3.0));
    }
}
