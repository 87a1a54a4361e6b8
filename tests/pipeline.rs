use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use geo::{line_string, polygon, LineString, MultiLineString, MultiPolygon};

use channel_narrowing::messages::CollectingSink;
use channel_narrowing::project::{RunManifest, PROJECT_DIR};
use channel_narrowing::schema::*;
use channel_narrowing::{
    Error, Feature, FeatureSet, FieldDef, FieldType, GeoEngine, GeometryEngine, LinearUnit, Orchestrator,
    RunConfig, RunState, Shape, ShapeKind, SpatialReference, Value,
};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Shape {
    Shape::Polygon(MultiPolygon::new(vec![polygon![
        (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)
    ]]))
}

fn line(ls: LineString<f64>) -> Shape {
    Shape::Line(MultiLineString::new(vec![ls]))
}

fn write(dir: &Path, name: &str, unit: LinearUnit, shapes: Vec<Shape>) -> PathBuf {
    let kind = shapes[0].kind();
    let mut set = FeatureSet::new(kind, SpatialReference::projected("test", unit));
    set.fields.push(FieldDef::new(ID_FIELD, FieldType::Integer));
    set.features = shapes.into_iter()
        .map(|s| Feature::new(s).with(ID_FIELD, Value::Integer(Some(0))))
        .collect();
    let path = dir.join(format!("{name}.shp"));
    GeoEngine::default().write(&set, &path).unwrap();
    path
}

/// Historic 100 x 10 channel, modern 100 x 8 inside it, one break at x = 50.
fn scenario(dir: &Path, unit: LinearUnit) -> RunConfig {
    let inputs = dir.join("inputs");
    RunConfig {
        historic_bankfull: write(&inputs, "historic", unit, vec![rect(0.0, 0.0, 100.0, 10.0)]),
        modern_bankfull: write(&inputs, "modern", unit, vec![rect(0.0, 1.0, 100.0, 9.0)]),
        reach_breaks: Some(write(&inputs, "breaks", unit, vec![line(line_string![(x: 50.0, y: -5.0), (x: 50.0, y: 15.0)])])),
        modern_centerline: write(&inputs, "centerline", unit, vec![line(line_string![(x: 0.0, y: 5.0), (x: 100.0, y: 5.0)])]),
        historic_centerline: None,
        output_root: dir.join("out"),
        output_name: "Reach".into(),
        pre_segmented: false,
        overwrite: false,
    }
}

fn field_set(set: &FeatureSet) -> BTreeSet<String> {
    set.fields.iter().map(|f| f.name.clone()).collect()
}

fn names(fields: &[&str]) -> BTreeSet<String> {
    fields.iter().map(|s| s.to_string()).collect()
}

fn approx(a: Option<f64>, b: f64) -> bool {
    a.is_some_and(|a| (a - b).abs() < 1e-3)
}

#[test]
fn meter_channel_narrows_by_twenty_percent() {
    let tmp = tempfile::tempdir().unwrap();
    let config = scenario(tmp.path(), LinearUnit::Meter);
    let engine = GeoEngine::default();
    let sink = CollectingSink::default();

    let report = Orchestrator::new(&engine, &sink, config).run().unwrap();
    assert_eq!(report.state, RunState::Cleaned);
    assert!(report.run_dir.ends_with("Output_1"));
    assert!(report.polygon.ends_with("02_Analyses/Reach_Polygon.shp"));

    let polygons = engine.read(&report.polygon).unwrap();
    assert_eq!(polygons.len(), 2);
    assert_eq!(field_set(&polygons), names(POLYGON_FIELDS));

    let hist_area = (50.0 - 0.3048) * 10.0;
    let crnt_area = (50.0 - 0.3048) * 8.0;
    for f in &polygons.features {
        assert!(approx(f.get_f64(HIST_AREA), hist_area), "{f:?}");
        assert!(approx(f.get_f64(CRNT_AREA), crnt_area), "{f:?}");
        assert!(approx(f.get_f64(HIST_LENGTH), 50.0));
        assert!(approx(f.get_f64(CRNT_LENGTH), 50.0));
        assert!(approx(f.get_f64(HIST_WIDTH), hist_area / 50.0));
        assert!(approx(f.get_f64(AREA_RED), 20.0));
        assert!(approx(f.get_f64(WIDTH_RED), 20.0));
    }

    let polylines = engine.read(&report.polyline).unwrap();
    assert_eq!(polylines.kind, ShapeKind::Line);
    assert_eq!(polylines.len(), 2);
    assert_eq!(field_set(&polylines), names(POLYLINE_FIELDS));
    for f in &polylines.features {
        assert!(approx(f.get_f64(SEG_LENGTH), 50.0));
        assert!(approx(f.get_f64(AREA_RED), 20.0));
    }

    // The reach-break buffer is scratch and does not outlive the run.
    assert!(!engine.exists(&report.run_dir.join("01_Intermediates/ReachBreakBuffer.shp")));

    let manifest = RunManifest::read(&report.run_dir).unwrap();
    assert_eq!(manifest.inputs.len(), 4);
    assert_eq!(manifest.linear_unit.as_deref(), Some("meter"));
    assert_eq!(manifest.outputs, vec![report.polygon.clone(), report.polyline.clone()]);
}

#[test]
fn foot_channel_converts_to_metric() {
    let tmp = tempfile::tempdir().unwrap();
    let config = scenario(tmp.path(), LinearUnit::Foot);
    let engine = GeoEngine::default();

    let report = Orchestrator::new(&engine, &CollectingSink::default(), config).run().unwrap();
    let polygons = engine.read(&report.polygon).unwrap();
    assert_eq!(polygons.len(), 2);
    for f in &polygons.features {
        // One foot either side of the break comes out of each segment.
        assert!(approx(f.get_f64(HIST_AREA), 49.0 * 10.0 * 0.092903));
        assert!(approx(f.get_f64(HIST_LENGTH), 50.0 * 0.3048));
        assert!(approx(f.get_f64(AREA_RED), 20.0));
    }
}

#[test]
fn pre_segmented_without_breaks_fails_before_writing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = scenario(tmp.path(), LinearUnit::Meter);
    config.reach_breaks = None;
    config.pre_segmented = true;
    let output_root = config.output_root.clone();

    let result = Orchestrator::new(&GeoEngine::default(), &CollectingSink::default(), config).run();
    assert!(matches!(result, Err(Error::InputConfiguration(_))));
    assert!(!output_root.join(PROJECT_DIR).exists());
}

#[test]
fn missing_input_is_a_configuration_error() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = scenario(tmp.path(), LinearUnit::Meter);
    config.modern_centerline = tmp.path().join("nowhere.shp");
    let result = Orchestrator::new(&GeoEngine::default(), &CollectingSink::default(), config).run();
    assert!(matches!(result, Err(Error::InputConfiguration(_))));
}

#[test]
fn pre_segmented_bankfulls_are_measured_as_given() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = scenario(tmp.path(), LinearUnit::Meter);
    let inputs = tmp.path().join("segmented");
    config.historic_bankfull = write(&inputs, "historic", LinearUnit::Meter, vec![
        rect(0.0, 0.0, 50.0, 10.0), rect(50.0, 0.0, 100.0, 10.0),
    ]);
    config.modern_bankfull = write(&inputs, "modern", LinearUnit::Meter, vec![
        rect(0.0, 1.0, 50.0, 9.0), rect(50.0, 1.0, 100.0, 9.0),
    ]);
    config.pre_segmented = true;

    let engine = GeoEngine::default();
    let report = Orchestrator::new(&engine, &CollectingSink::default(), config).run().unwrap();
    let polygons = engine.read(&report.polygon).unwrap();
    assert_eq!(polygons.len(), 2);
    for f in &polygons.features {
        assert!(approx(f.get_f64(HIST_AREA), 500.0));
        assert!(approx(f.get_f64(CRNT_AREA), 400.0));
        assert!(approx(f.get_f64(AREA_RED), 20.0));
    }
}

#[test]
fn repeated_runs_get_fresh_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let config = scenario(tmp.path(), LinearUnit::Meter);
    let engine = GeoEngine::default();
    let sink = CollectingSink::default();

    let first = Orchestrator::new(&engine, &sink, config.clone()).run().unwrap();
    let second = Orchestrator::new(&engine, &sink, config).run().unwrap();
    assert!(first.run_dir.ends_with("Output_1"));
    assert!(second.run_dir.ends_with("Output_2"));
    assert!(first.polygon.exists());
}

#[test]
fn changed_input_needs_overwrite() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = scenario(tmp.path(), LinearUnit::Meter);
    let engine = GeoEngine::default();
    let sink = CollectingSink::default();
    Orchestrator::new(&engine, &sink, config.clone()).run().unwrap();

    // Same file name, different contents.
    engine.delete(&config.modern_bankfull).unwrap();
    config.modern_bankfull = write(&tmp.path().join("inputs"), "modern", LinearUnit::Meter, vec![rect(0.0, 2.0, 100.0, 8.0)]);

    let rejected = Orchestrator::new(&engine, &sink, config.clone()).run();
    assert!(matches!(rejected, Err(Error::InputConfiguration(_))));

    config.overwrite = true;
    let report = Orchestrator::new(&engine, &sink, config).run().unwrap();
    let polygons = engine.read(&report.polygon).unwrap();
    for f in &polygons.features {
        assert!(approx(f.get_f64(AREA_RED), 40.0));
    }
}

#[test]
fn changed_projection_alone_needs_overwrite() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = scenario(tmp.path(), LinearUnit::Meter);
    let engine = GeoEngine::default();
    let sink = CollectingSink::default();
    Orchestrator::new(&engine, &sink, config.clone()).run().unwrap();

    // Geometry and attributes untouched; only the `.prj` now says feet.
    let feet = SpatialReference::projected("test", LinearUnit::Foot).wkt.unwrap();
    let inputs = [
        config.historic_bankfull.clone(),
        config.modern_bankfull.clone(),
        config.modern_centerline.clone(),
        config.reach_breaks.clone().unwrap(),
    ];
    for input in &inputs {
        fs::write(input.with_extension("prj"), &feet).unwrap();
    }

    let rejected = Orchestrator::new(&engine, &sink, config.clone()).run();
    assert!(matches!(rejected, Err(Error::InputConfiguration(_))));

    config.overwrite = true;
    let report = Orchestrator::new(&engine, &sink, config).run().unwrap();
    let polygons = engine.read(&report.polygon).unwrap();
    assert_eq!(polygons.len(), 2);
    for f in &polygons.features {
        assert!(approx(f.get_f64(HIST_AREA), 49.0 * 10.0 * 0.092903), "{f:?}");
    }
    let manifest = RunManifest::read(&report.run_dir).unwrap();
    assert_eq!(manifest.linear_unit.as_deref(), Some("foot"));
    assert!(manifest.inputs.values().all(|h| h.sha256.contains_key("prj")));
}

#[test]
fn mixed_units_fail_before_writing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = scenario(tmp.path(), LinearUnit::Meter);
    config.modern_bankfull = write(&tmp.path().join("feet"), "modern", LinearUnit::Foot, vec![rect(0.0, 1.0, 100.0, 9.0)]);
    let output_root = config.output_root.clone();

    let result = Orchestrator::new(&GeoEngine::default(), &CollectingSink::default(), config).run();
    match result {
        Err(Error::InputConfiguration(message)) => assert!(message.contains("linear unit"), "{message}"),
        other => panic!("expected InputConfiguration, got {other:?}"),
    }
    assert!(!output_root.join(PROJECT_DIR).exists());
}
