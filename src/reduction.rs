//! Percent change between historic and modern values.
use tracing::info;

use crate::engine::GeometryEngine;
use crate::error::{Error, Result};
use crate::features::{Feature, FeatureSet, FieldDef, FieldType, Value};
use crate::messages::MessageSink;
use crate::schema::{AREA_RED, CRNT_AREA, CRNT_WIDTH, HIST_AREA, HIST_WIDTH, WIDTH_RED};

/// `|historic - current| / historic * 100`.  Widening and narrowing by the
/// same amount give the same value; a zero `historic` is an error.
pub fn percent_reduction(current: f64, historic: f64) -> Result<f64> {
    if historic == 0.0 {
        return Err(Error::DivisionByZero { field: "historic value".into(), record: None });
    }
    Ok(((historic - current) / historic).abs() * 100.0)
}

/// `feature` with `out_field` set to the reduction from `historic_field` to
/// `current_field`, null when either input is null.
pub fn with_reduction(
    feature: &Feature,
    record: usize,
    current_field: &str,
    historic_field: &str,
    out_field: &str,
) -> Result<Feature> {
    let value = match (feature.get_f64(current_field), feature.get_f64(historic_field)) {
        (Some(current), Some(historic)) => Some(percent_reduction(current, historic).map_err(|_| {
            Error::DivisionByZero { field: historic_field.to_string(), record: Some(record) }
        })?),
        _ => None,
    };
    Ok(feature.clone().with(out_field, Value::Double(value)))
}

/// Add `AreaRed` and `WidthRed` to a joined historic/modern set.
pub fn assign_reductions<E: GeometryEngine + ?Sized>(
    engine: &E,
    set: &mut FeatureSet,
    sink: &dyn MessageSink,
) -> Result<()> {
    for (out, current, historic) in [(AREA_RED, CRNT_AREA, HIST_AREA), (WIDTH_RED, CRNT_WIDTH, HIST_WIDTH)] {
        engine.add_field(set, FieldDef::new(out, FieldType::Double))?;
        set.features = set.features.iter().enumerate()
            .map(|(i, f)| with_reduction(f, i, current, historic, out))
            .collect::<Result<Vec<_>>>()?;
        let nulls = set.features.iter().filter(|f| f.get_f64(out).is_none()).count();
        if nulls > 0 {
            sink.warn(&format!("{nulls} record(s) lack {historic} or {current}; {out} left null"));
        }
    }
    info!(records = set.len(), "assigned reductions");
    Ok(())
}
