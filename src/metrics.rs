//! Per-record area, length and width fields in metric units.
use tracing::info;

use crate::engine::GeometryEngine;
use crate::error::{Error, Result};
use crate::features::{Feature, FeatureSet, FieldDef, FieldType, Value};
use crate::messages::MessageSink;
use crate::units::LinearUnit;

/// `feature` with `field` holding its area in square meters.
pub fn with_metric_area(feature: &Feature, unit: LinearUnit, field: &str) -> Feature {
    let area = unit.to_metric_area(feature.shape.area());
    feature.clone().with(field, Value::Double(Some(area)))
}

/// `feature` with `field` holding its length in meters.
pub fn with_metric_length(feature: &Feature, unit: LinearUnit, field: &str) -> Feature {
    let length = unit.to_metric_length(feature.shape.length());
    feature.clone().with(field, Value::Double(Some(length)))
}

/// `feature` with `width_field = area_field / length_field`.
///
/// A null area or length gives a null width; a zero length is an error.
pub fn with_width(
    feature: &Feature,
    record: usize,
    area_field: &str,
    length_field: &str,
    width_field: &str,
) -> Result<Feature> {
    let width = match (feature.get_f64(area_field), feature.get_f64(length_field)) {
        (Some(_), Some(length)) if length == 0.0 => {
            return Err(Error::DivisionByZero { field: length_field.to_string(), record: Some(record) });
        }
        (Some(area), Some(length)) => Some(area / length),
        _ => None,
    };
    Ok(feature.clone().with(width_field, Value::Double(width)))
}

/// Declare `field` unless the set already carries it; existing values are
/// recomputed.
fn add_double<E: GeometryEngine + ?Sized>(engine: &E, set: &mut FeatureSet, field: &str) -> Result<()> {
    if !set.has_field(field) {
        engine.add_field(set, FieldDef::new(field, FieldType::Double))?;
    }
    Ok(())
}

/// Add `field` holding every record's metric area.  The unit is read once
/// from the set's spatial reference.
pub fn assign_area<E: GeometryEngine + ?Sized>(engine: &E, set: &mut FeatureSet, field: &str) -> Result<()> {
    let unit = set.spatial_ref.linear_unit()?;
    add_double(engine, set, field)?;
    set.features = set.features.iter().map(|f| with_metric_area(f, unit, field)).collect();
    info!(field, unit = unit.name(), records = set.len(), "assigned area");
    Ok(())
}

/// Add `field` holding every record's metric length.
pub fn assign_length<E: GeometryEngine + ?Sized>(engine: &E, set: &mut FeatureSet, field: &str) -> Result<()> {
    let unit = set.spatial_ref.linear_unit()?;
    add_double(engine, set, field)?;
    set.features = set.features.iter().map(|f| with_metric_length(f, unit, field)).collect();
    info!(field, unit = unit.name(), records = set.len(), "assigned length");
    Ok(())
}

/// Add `width_field` as `area_field / length_field` on every record.
pub fn assign_width<E: GeometryEngine + ?Sized>(
    engine: &E,
    set: &mut FeatureSet,
    area_field: &str,
    length_field: &str,
    width_field: &str,
    sink: &dyn MessageSink,
) -> Result<()> {
    add_double(engine, set, width_field)?;
    let features = set.features.iter().enumerate()
        .map(|(i, f)| with_width(f, i, area_field, length_field, width_field))
        .collect::<Result<Vec<_>>>()?;
    let nulls = features.iter().filter(|f| f.get_f64(width_field).is_none()).count();
    if nulls > 0 {
        sink.warn(&format!("{nulls} record(s) lack {area_field} or {length_field}; {width_field} left null"));
    }
    set.features = features;
    Ok(())
}
