use crate::error::{Error, Result};

/// Meters per foot.
pub const FOOT_TO_METER: f64 = 0.3048;

/// Square meters per square foot, as used for every area conversion.
pub const SQ_FOOT_TO_SQ_METER: f64 = 0.092903;

/// Linear unit of a projected coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearUnit {
    Foot,
    Meter,
}

impl LinearUnit {
    /// Look up a unit by name; only "foot" and "meter" (any case) are known.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "foot" => Ok(Self::Foot),
            "meter" => Ok(Self::Meter),
            _ => Err(Error::UnsupportedUnit(name.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Foot => "foot",
            Self::Meter => "meter",
        }
    }

    #[inline]
    pub fn to_metric_length(self, value: f64) -> f64 {
        match self {
            Self::Foot => value * FOOT_TO_METER,
            Self::Meter => value,
        }
    }

    #[inline]
    pub fn to_metric_area(self, value: f64) -> f64 {
        match self {
            Self::Foot => value * SQ_FOOT_TO_SQ_METER,
            Self::Meter => value,
        }
    }

    /// Express a length given in meters in this unit.
    #[inline]
    pub fn from_metric_length(self, meters: f64) -> f64 {
        match self {
            Self::Foot => meters / FOOT_TO_METER,
            Self::Meter => meters,
        }
    }
}

/// Convert a length in the named unit to meters.
pub fn to_metric_length(value: f64, unit_name: &str) -> Result<f64> {
    Ok(LinearUnit::from_name(unit_name)?.to_metric_length(value))
}

/// Convert an area in the named unit to square meters.
pub fn to_metric_area(value: f64, unit_name: &str) -> Result<f64> {
    Ok(LinearUnit::from_name(unit_name)?.to_metric_area(value))
}
