use std::collections::BTreeMap;
use std::sync::OnceLock;

use geo::{Area, BoundingRect, Euclidean, Length, MultiLineString, MultiPolygon, Rect};
use regex::Regex;

use crate::error::Result;
use crate::units::LinearUnit;

/// Attribute column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Double,
    Integer,
    Text,
}

/// A single attribute value; `None` is a null.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(Option<f64>),
    Integer(Option<i64>),
    Text(Option<String>),
}

impl Value {
    /// The null value of a column type.
    pub fn null(ty: FieldType) -> Self {
        match ty {
            FieldType::Double => Self::Double(None),
            FieldType::Integer => Self::Integer(None),
            FieldType::Text => Self::Text(None),
        }
    }

    /// Numeric view of the value, if it is a non-null number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => *v,
            Self::Integer(v) => v.map(|i| i as f64),
            Self::Text(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Double(None) | Self::Integer(None) | Self::Text(None))
    }
}

/// An attribute column declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self { name: name.into(), ty }
    }
}

/// A field as reported by [`GeometryEngine::list_fields`](crate::engine::GeometryEngine::list_fields).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Structural fields (record id, geometry) that can never be deleted.
    pub required: bool,
}

/// Record id field present on every feature set.
pub const FID_FIELD: &str = "FID";

/// Geometry field present on every feature set.
pub const SHAPE_FIELD: &str = "Shape";

/// Geometry kinds handled by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Polygon,
    Line,
}

/// Feature geometry in projected coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Polygon(MultiPolygon<f64>),
    Line(MultiLineString<f64>),
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Polygon(_) => ShapeKind::Polygon,
            Self::Line(_) => ShapeKind::Line,
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Self::Polygon(mp) => mp.bounding_rect(),
            Self::Line(ml) => ml.bounding_rect(),
        }
    }

    /// Planar area in native units; zero for lines.
    pub fn area(&self) -> f64 {
        match self {
            Self::Polygon(mp) => mp.unsigned_area(),
            Self::Line(_) => 0.0,
        }
    }

    /// Planar length in native units; the perimeter for polygons.
    pub fn length(&self) -> f64 {
        match self {
            Self::Line(ml) => Euclidean.length(ml),
            Self::Polygon(mp) => mp.0.iter()
                .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
                .map(|ring| Euclidean.length(ring))
                .sum(),
        }
    }

    pub fn as_polygon(&self) -> Option<&MultiPolygon<f64>> {
        match self {
            Self::Polygon(mp) => Some(mp),
            Self::Line(_) => None,
        }
    }

    pub fn as_line(&self) -> Option<&MultiLineString<f64>> {
        match self {
            Self::Line(ml) => Some(ml),
            Self::Polygon(_) => None,
        }
    }
}

/// One record: a geometry plus its attribute values.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub shape: Shape,
    pub attributes: BTreeMap<String, Value>,
}

impl Feature {
    pub fn new(shape: Shape) -> Self {
        Self { shape, attributes: BTreeMap::new() }
    }

    /// Return this feature with `name` set to `value`.
    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }
}

/// Coordinate system of a feature set, kept as the `.prj` WKT text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialReference {
    pub wkt: Option<String>,
}

impl SpatialReference {
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self { wkt: Some(wkt.into()) }
    }

    /// A minimal projected WKT in the given unit, for datasets created from scratch.
    pub fn projected(name: &str, unit: LinearUnit) -> Self {
        let (unit_name, factor) = match unit {
            LinearUnit::Foot => ("Foot", 0.3048),
            LinearUnit::Meter => ("Meter", 1.0),
        };
        Self::from_wkt(format!(
            "PROJCS[\"{name}\",GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",\
             SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],PRIMEM[\"Greenwich\",0.0],\
             UNIT[\"Degree\",0.0174532925199433]],PROJECTION[\"Transverse_Mercator\"],\
             UNIT[\"{unit_name}\",{factor}]]"
        ))
    }

    /// Name of the linear unit: the last `UNIT[...]` entry of the WKT, which
    /// belongs to the projected system rather than its geographic base.
    pub fn linear_unit_name(&self) -> Option<String> {
        static UNIT_RE: OnceLock<Regex> = OnceLock::new();
        let re = UNIT_RE.get_or_init(|| Regex::new(r#"UNIT\s*\[\s*"([^"]+)""#).expect("valid unit regex"));
        let wkt = self.wkt.as_deref()?;
        re.captures_iter(wkt).last().map(|c| c[1].to_string())
    }

    /// The linear unit, failing for anything but foot or meter.
    pub fn linear_unit(&self) -> Result<LinearUnit> {
        let name = self.linear_unit_name().unwrap_or_else(|| "<undefined>".to_string());
        LinearUnit::from_name(&name)
    }
}

/// An ordered collection of features sharing one geometry kind and schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub kind: ShapeKind,
    pub fields: Vec<FieldDef>,
    pub features: Vec<Feature>,
    pub spatial_ref: SpatialReference,
}

impl FeatureSet {
    pub fn new(kind: ShapeKind, spatial_ref: SpatialReference) -> Self {
        Self { kind, fields: Vec::new(), features: Vec::new(), spatial_ref }
    }

    #[inline] pub fn len(&self) -> usize { self.features.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.features.is_empty() }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// An empty set with the same kind, schema and spatial reference.
    pub fn empty_like(&self) -> Self {
        Self { kind: self.kind, fields: self.fields.clone(), features: Vec::new(), spatial_ref: self.spatial_ref.clone() }
    }
}
