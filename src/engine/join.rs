use std::collections::BTreeSet;

use crate::error::EngineError;
use crate::features::{Feature, FeatureSet, FieldDef, FieldType, Value};
use crate::schema::{JOIN_COUNT, JOIN_FID, TARGET_FID};

use super::convert::GeosShape;
use super::index::FeatureIndex;
use super::relate::{interiors_intersect, is_within};
use super::JoinPredicate;

/// dBase field names are limited to ten characters.
const MAX_FIELD_NAME: usize = 10;

/// A name for `name` not yet in `taken`: `name`, else `name_1`, `name_2`, ...
/// truncated to fit the dBase limit.
fn unique_name(name: &str, taken: &BTreeSet<String>) -> String {
    let clash = |n: &str| taken.iter().any(|t| t.eq_ignore_ascii_case(n));
    if !clash(name) {
        return name.to_string();
    }
    (1..)
        .map(|i| {
            let suffix = format!("_{i}");
            let stem: String = name.chars().take(MAX_FIELD_NAME.saturating_sub(suffix.len())).collect();
            stem + &suffix
        })
        .find(|n| !clash(n))
        .unwrap_or_else(|| name.to_string())
}

/// Keep-all, one-to-many spatial join of `join` onto `target`.
pub(super) fn spatial_join(
    target: &FeatureSet,
    join: &FeatureSet,
    predicate: JoinPredicate,
    tolerance: f64,
) -> Result<FeatureSet, EngineError> {
    let mut out = target.empty_like();
    let mut taken: BTreeSet<String> = target.fields.iter().map(|f| f.name.clone()).collect();

    // (source name, output name) for every joined attribute.
    let mut renamed = Vec::with_capacity(join.fields.len());
    for field in &join.fields {
        let name = unique_name(&field.name, &taken);
        taken.insert(name.clone());
        out.fields.push(FieldDef::new(name.clone(), field.ty));
        renamed.push((field.name.clone(), name));
    }
    let transient: Vec<String> = [JOIN_COUNT, TARGET_FID, JOIN_FID].iter()
        .map(|n| {
            let name = unique_name(n, &taken);
            taken.insert(name.clone());
            out.fields.push(FieldDef::new(name.clone(), FieldType::Integer));
            name
        })
        .collect();

    let index = FeatureIndex::new(join);
    let partners = join.features.iter()
        .map(|f| GeosShape::new(&f.shape))
        .collect::<Result<Vec<_>, _>>()?;
    for (t, feature) in target.features.iter().enumerate() {
        let shape = GeosShape::new(&feature.shape)?;
        let mut matches = Vec::new();
        let candidates = feature.shape.bounding_rect()
            .map(|rect| index.candidates(&rect, tolerance))
            .unwrap_or_default();
        for j in candidates {
            let hit = match predicate {
                JoinPredicate::Intersects => interiors_intersect(&shape, &partners[j], tolerance)?,
                JoinPredicate::Within => is_within(&shape, &partners[j], tolerance)?,
            };
            if hit {
                matches.push(j);
            }
        }

        let record = |joined: Option<usize>| -> Feature {
            let mut row = Feature { shape: feature.shape.clone(), attributes: feature.attributes.clone() };
            for ((source, name), field) in renamed.iter().zip(&join.fields) {
                let value = joined
                    .and_then(|j| join.features[j].get(source).cloned())
                    .unwrap_or_else(|| Value::null(field.ty));
                row.attributes.insert(name.clone(), value);
            }
            let fid = |i: Option<usize>| Value::Integer(Some(i.map_or(-1, |i| i as i64)));
            row.attributes.insert(transient[0].clone(), Value::Integer(Some(joined.is_some() as i64)));
            row.attributes.insert(transient[1].clone(), fid(Some(t)));
            row.attributes.insert(transient[2].clone(), fid(joined));
            row
        };

        if matches.is_empty() {
            out.features.push(record(None));
        } else {
            out.features.extend(matches.into_iter().map(|j| record(Some(j))));
        }
    }
    Ok(out)
}
