use std::fs;
use std::path::{Path, PathBuf};

use geo::{Coord, LineString, MultiLineString, MultiPolygon, Polygon};
use shapefile as shp;
use shapefile::dbase::{self, FieldName, FieldValue, Record, TableWriterBuilder};

use crate::error::EngineError;
use crate::features::{Feature, FeatureSet, FieldDef, FieldType, Shape, ShapeKind, SpatialReference, Value};

/// Every file that makes up one shapefile dataset.
const SIDECARS: &[&str] = &["shp", "shx", "dbf", "prj", "cpg", "sbn", "sbx"];

fn shp_error(path: &Path) -> impl FnOnce(shp::Error) -> EngineError + '_ {
    move |source| EngineError::Shapefile { path: path.to_path_buf(), source }
}

/// Paths of the sidecar files of `path` that exist on disk.
pub(crate) fn existing_sidecars(path: &Path) -> Vec<PathBuf> {
    SIDECARS.iter()
        .map(|ext| path.with_extension(ext))
        .filter(|p| p.exists())
        .collect()
}

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>
fn shp_to_polygon(p: &shp::Polygon) -> MultiPolygon<f64> {
    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes: Vec<LineString<f64>> = Vec::new();

    // Shapefile stores each outer ring followed by its holes.
    for ring in p.rings() {
        let mut coords: Vec<Coord<f64>> = ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect();
        if coords.first() != coords.last() {
            if let Some(&first) = coords.first() { coords.push(first); }
        }
        match ring {
            shp::PolygonRing::Outer(_) => {
                if let Some(ext) = exterior.take() {
                    polys.push(Polygon::new(ext, std::mem::take(&mut holes)));
                }
                exterior = Some(LineString::new(coords));
            }
            shp::PolygonRing::Inner(_) => holes.push(LineString::new(coords)),
        }
    }
    if let Some(ext) = exterior {
        polys.push(Polygon::new(ext, holes));
    }
    MultiPolygon::new(polys)
}

/// Convert geo::MultiPolygon<f64> to shapefile::Polygon
fn polygon_to_shp(mp: &MultiPolygon<f64>) -> shp::Polygon {
    /// Closed ring of shapefile::Point, wound clockwise when `clockwise`.
    fn ring_points(ls: &LineString<f64>, clockwise: bool) -> Vec<shp::Point> {
        let mut pts: Vec<shp::Point> = ls.coords().map(|c| shp::Point { x: c.x, y: c.y }).collect();
        if let (Some(first), Some(last)) = (pts.first().copied(), pts.last()) {
            if first.x != last.x || first.y != last.y { pts.push(first); }
        }
        let area: f64 = pts.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum();
        if (area > 0.0) == clockwise { pts.reverse(); }
        pts
    }

    // Shapefile ordering: [outer CW, inner CCW, inner CCW, ..., next outer CW, ...]
    let mut rings: Vec<shp::PolygonRing<shp::Point>> = Vec::new();
    for poly in &mp.0 {
        rings.push(shp::PolygonRing::Outer(ring_points(poly.exterior(), true)));
        for hole in poly.interiors() {
            rings.push(shp::PolygonRing::Inner(ring_points(hole, false)));
        }
    }
    shp::Polygon::with_rings(rings)
}

fn shp_to_lines(p: &shp::Polyline) -> MultiLineString<f64> {
    MultiLineString::new(p.parts().iter()
        .map(|part| LineString::new(part.iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect()))
        .collect())
}

fn lines_to_shp(ml: &MultiLineString<f64>) -> shp::Polyline {
    shp::Polyline::with_parts(ml.0.iter()
        .map(|ls| ls.coords().map(|c| shp::Point { x: c.x, y: c.y }).collect())
        .collect())
}

/// Coerce a generic shape into a polygon or line geometry.
fn to_shape(shape: shp::Shape) -> Result<Shape, EngineError> {
    match shape {
        shp::Shape::Polygon(p) => Ok(Shape::Polygon(shp_to_polygon(&p))),
        shp::Shape::Polyline(p) => Ok(Shape::Line(shp_to_lines(&p))),
        other => Err(EngineError::UnsupportedShape(format!("{:?}", other.shapetype()))),
    }
}

fn to_field_type(ty: dbase::FieldType) -> FieldType {
    match ty {
        dbase::FieldType::Numeric | dbase::FieldType::Float
        | dbase::FieldType::Double | dbase::FieldType::Currency => FieldType::Double,
        dbase::FieldType::Integer => FieldType::Integer,
        _ => FieldType::Text,
    }
}

fn to_value(value: FieldValue) -> Value {
    match value {
        FieldValue::Numeric(v) => Value::Double(v),
        FieldValue::Float(v) => Value::Double(v.map(f64::from)),
        FieldValue::Double(v) | FieldValue::Currency(v) => Value::Double(Some(v)),
        FieldValue::Integer(v) => Value::Integer(Some(v as i64)),
        FieldValue::Character(s) => Value::Text(s.map(|s| s.trim().to_string())),
        FieldValue::Logical(b) => Value::Text(b.map(|b| if b { "T" } else { "F" }.to_string())),
        other => Value::Text(Some(format!("{other:?}"))),
    }
}

/// How an attribute column is laid out in the dBase table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Double,
    /// Every value is present and fits 32 bits.
    Integer,
    /// Integers stored as zero-decimal numerics, which keep nulls and wide values.
    WholeNumber,
    Text,
}

/// A dBase `I` field has no null and holds 32 bits, so it is only used when
/// every value qualifies.
fn column(set: &FeatureSet, field: &FieldDef) -> Column {
    match field.ty {
        FieldType::Double => Column::Double,
        FieldType::Text => Column::Text,
        FieldType::Integer => {
            let fits = set.features.iter().all(|f| match f.get(&field.name) {
                Some(Value::Integer(Some(n))) => i32::try_from(*n).is_ok(),
                _ => false,
            });
            if fits { Column::Integer } else { Column::WholeNumber }
        }
    }
}

fn to_field_value(value: Option<&Value>, column: Column) -> FieldValue {
    match (column, value) {
        (Column::Integer, Some(Value::Integer(Some(n)))) => match i32::try_from(*n) {
            Ok(n) => FieldValue::Integer(n),
            Err(_) => FieldValue::Numeric(Some(*n as f64)),
        },
        (Column::Double | Column::WholeNumber | Column::Integer, v) => FieldValue::Numeric(v.and_then(Value::as_f64)),
        (Column::Text, Some(Value::Text(s))) => FieldValue::Character(s.clone()),
        (Column::Text, v) => FieldValue::Character(v.and_then(Value::as_f64).map(|n| n.to_string())),
    }
}

/// The `.prj` next to `path`; unknown when there is none.
pub(crate) fn read_prj(path: &Path) -> SpatialReference {
    match fs::read_to_string(path.with_extension("prj")) {
        Ok(wkt) => SpatialReference::from_wkt(wkt.trim()),
        Err(_) => SpatialReference::default(),
    }
}

/// Read a shapefile dataset (geometry, attributes and `.prj`) from `path`.
pub(crate) fn read(path: &Path) -> Result<FeatureSet, EngineError> {
    if !path.exists() {
        return Err(EngineError::NotFound(path.to_path_buf()));
    }

    let table = dbase::Reader::from_path(path.with_extension("dbf"))
        .map_err(|e| shp_error(path)(shp::Error::DbaseError(e)))?;
    let fields: Vec<FieldDef> = table.fields().iter()
        .map(|info| FieldDef::new(info.name(), to_field_type(info.field_type())))
        .collect();
    drop(table);

    let mut reader = shp::Reader::from_path(path).map_err(shp_error(path))?;
    let kind = match reader.header().shape_type {
        shp::ShapeType::Polyline => ShapeKind::Line,
        shp::ShapeType::Polygon | shp::ShapeType::NullShape => ShapeKind::Polygon,
        other => return Err(EngineError::UnsupportedShape(format!("{other:?}"))),
    };

    let mut set = FeatureSet::new(kind, read_prj(path));
    set.fields = fields;
    for result in reader.iter_shapes_and_records() {
        let (shape, record): (shp::Shape, Record) = result.map_err(shp_error(path))?;
        let mut feature = Feature::new(to_shape(shape)?);
        for field in &set.fields {
            let value = record.get(&field.name).cloned().map_or(Value::null(field.ty), to_value);
            feature.attributes.insert(field.name.clone(), value);
        }
        set.features.push(feature);
    }
    Ok(set)
}

/// Write `set` as a new shapefile dataset at `path`, with a `.prj` when the
/// spatial reference is known.
pub(crate) fn write(set: &FeatureSet, path: &Path) -> Result<(), EngineError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
    }

    let columns: Vec<Column> = set.fields.iter().map(|field| column(set, field)).collect();
    let mut builder = TableWriterBuilder::new();
    for (field, &column) in set.fields.iter().zip(&columns) {
        let name = FieldName::try_from(field.name.as_str())
            .map_err(|_| EngineError::InvalidFieldName(field.name.clone()))?;
        builder = match column {
            Column::Double => builder.add_numeric_field(name, 24, 8),
            Column::Integer => builder.add_integer_field(name),
            Column::WholeNumber => builder.add_numeric_field(name, 19, 0),
            Column::Text => builder.add_character_field(name, 254),
        };
    }

    let mut writer = shp::Writer::from_path(path, builder).map_err(shp_error(path))?;
    for feature in &set.features {
        let mut record = Record::default();
        for (field, &column) in set.fields.iter().zip(&columns) {
            record.insert(field.name.clone(), to_field_value(feature.get(&field.name), column));
        }
        match &feature.shape {
            Shape::Polygon(mp) => writer.write_shape_and_record(&polygon_to_shp(mp), &record),
            Shape::Line(ml) => writer.write_shape_and_record(&lines_to_shp(ml), &record),
        }.map_err(shp_error(path))?;
    }
    drop(writer);

    if let Some(wkt) = &set.spatial_ref.wkt {
        let prj = path.with_extension("prj");
        fs::write(&prj, wkt).map_err(|e| EngineError::io(prj, e))?;
    }
    Ok(())
}

/// Copy every sidecar of `src` next to `dst`.
pub(crate) fn copy(src: &Path, dst: &Path) -> Result<(), EngineError> {
    if !src.exists() {
        return Err(EngineError::NotFound(src.to_path_buf()));
    }
    if dst.exists() {
        return Err(EngineError::AlreadyExists(dst.to_path_buf()));
    }
    if let Some(dir) = dst.parent() {
        fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
    }
    for file in existing_sidecars(src) {
        let ext = file.extension().unwrap_or_default();
        let target = dst.with_extension(ext);
        fs::copy(&file, &target).map_err(|e| EngineError::io(&target, e))?;
    }
    Ok(())
}

/// Remove every sidecar of `path`.  Deleting a missing dataset is a no-op.
pub(crate) fn delete(path: &Path) -> Result<(), EngineError> {
    for file in existing_sidecars(path) {
        fs::remove_file(&file).map_err(|e| EngineError::io(&file, e))?;
    }
    Ok(())
}
