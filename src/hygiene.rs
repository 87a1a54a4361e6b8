//! Joining feature sets and stripping incidental fields from the result.
use tracing::debug;

use crate::engine::{GeometryEngine, JoinPredicate};
use crate::error::Result;
use crate::features::{FeatureSet, FieldDescriptor};

/// Fields to delete so that only required fields and `keep` remain.
///
/// A dBase table needs at least one attribute column, so when every
/// optional field would go the last candidate is retained.
pub fn fields_to_delete(fields: &[FieldDescriptor], keep: &[&str]) -> Vec<String> {
    let optional = fields.iter().filter(|f| !f.required).count();
    let mut doomed: Vec<String> = fields.iter()
        .filter(|f| !f.required && !keep.iter().any(|k| k.eq_ignore_ascii_case(&f.name)))
        .map(|f| f.name.clone())
        .collect();
    if !doomed.is_empty() && doomed.len() == optional {
        doomed.pop();
    }
    doomed
}

/// Delete every field of `set` that is neither required nor in `keep`.
pub fn strip_fields<E: GeometryEngine + ?Sized>(engine: &E, set: &mut FeatureSet, keep: &[&str]) -> Result<()> {
    let doomed = fields_to_delete(&engine.list_fields(set), keep);
    debug!(deleted = ?doomed, "stripping fields");
    let names: Vec<&str> = doomed.iter().map(String::as_str).collect();
    engine.delete_fields(set, &names)?;
    Ok(())
}

/// Spatially join `join` onto `target` and keep only `keep`.
pub fn join_and_strip<E: GeometryEngine + ?Sized>(
    engine: &E,
    target: &FeatureSet,
    join: &FeatureSet,
    predicate: JoinPredicate,
    keep: &[&str],
) -> Result<FeatureSet> {
    let mut joined = engine.spatial_join(target, join, predicate)?;
    strip_fields(engine, &mut joined, keep)?;
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use geo::{polygon, MultiPolygon};

    use crate::engine::GeoEngine;
    use crate::features::{Feature, FieldDef, FieldType, Shape, ShapeKind, SpatialReference, Value};
    use crate::schema::{HIST_AREA, HIST_LENGTH, HIST_WIDTH};

    use super::*;

    fn descriptors(optional: &[&str]) -> Vec<FieldDescriptor> {
        ["FID", "Shape"].iter()
            .map(|n| FieldDescriptor { name: n.to_string(), required: true })
            .chain(optional.iter().map(|n| FieldDescriptor { name: n.to_string(), required: false }))
            .collect()
    }

    #[test]
    fn strip_leaves_required_and_kept() {
        let engine = GeoEngine::default();
        let keep = [HIST_AREA, HIST_LENGTH, HIST_WIDTH];
        for extra in [vec![], vec!["Id"], vec!["Id", "Id_1", "Join_Count"], vec!["Id", "Id_1", "Join_Count", "TARGET_FID", "JOIN_FID"]] {
            let mut set = FeatureSet::new(ShapeKind::Polygon, SpatialReference::default());
            for name in extra.iter().chain(keep.iter()) {
                set.fields.push(FieldDef::new(*name, FieldType::Double));
            }
            strip_fields(&engine, &mut set, &keep).unwrap();

            let got: BTreeSet<String> = engine.list_fields(&set).into_iter().map(|f| f.name).collect();
            let want: BTreeSet<String> = ["FID", "Shape"].iter().chain(keep.iter()).map(|s| s.to_string()).collect();
            assert_eq!(got, want, "extra fields {extra:?}");
        }
    }

    #[test]
    fn last_optional_field_survives() {
        assert_eq!(fields_to_delete(&descriptors(&["Id", "Other"]), &["Missing"]), vec!["Id".to_string()]);
        assert!(fields_to_delete(&descriptors(&["Id"]), &[]).is_empty());
        assert!(fields_to_delete(&descriptors(&[]), &[]).is_empty());
    }

    #[test]
    fn keep_is_case_insensitive() {
        assert_eq!(fields_to_delete(&descriptors(&["hist_area", "Id"]), &[HIST_AREA]), vec!["Id".to_string()]);
    }

    #[test]
    fn join_then_strip() {
        let engine = GeoEngine::default();
        let shape = Shape::Polygon(MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)
        ]]));
        let mut a = FeatureSet::new(ShapeKind::Polygon, SpatialReference::default());
        a.fields = vec![FieldDef::new("Id", FieldType::Integer), FieldDef::new(HIST_AREA, FieldType::Double)];
        a.features.push(Feature::new(shape.clone()).with("Id", Value::Integer(Some(0))).with(HIST_AREA, Value::Double(Some(0.5))));
        let mut b = a.clone();
        b.fields[1].name = HIST_LENGTH.into();
        b.features[0] = Feature::new(shape).with("Id", Value::Integer(Some(0))).with(HIST_LENGTH, Value::Double(Some(2.0)));

        let out = join_and_strip(&engine, &a, &b, JoinPredicate::Intersects, &[HIST_AREA, HIST_LENGTH]).unwrap();
        assert_eq!(out.field_names(), vec![HIST_AREA, HIST_LENGTH]);
        assert_eq!(out.features[0].get_f64(HIST_LENGTH), Some(2.0));
        assert_eq!(out.features[0].attributes.len(), 2);
    }
}
