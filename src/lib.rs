//! Channel narrowing: segment historic and modern bankfull channels by reach and measure the change
pub mod engine;
pub mod error;
pub mod features;
pub mod hygiene;
pub mod messages;
pub mod metrics;
pub mod project;
pub mod reduction;
pub mod run;
pub mod schema;
pub mod segment;
pub mod units;

#[doc(inline)]
pub use engine::{GeoEngine, GeometryEngine, JoinPredicate};

#[doc(inline)]
pub use error::{EngineError, Error, Result};

#[doc(inline)]
pub use features::{Feature, FeatureSet, FieldDef, FieldType, Shape, ShapeKind, SpatialReference, Value};

#[doc(inline)]
pub use messages::{MessageSink, TracingSink};

#[doc(inline)]
pub use reduction::percent_reduction;

#[doc(inline)]
pub use run::{parse_flag, Orchestrator, RunConfig, RunReport, RunState};

#[doc(inline)]
pub use units::{to_metric_area, to_metric_length, LinearUnit};
