//! Output attribute names.  All fit the ten-character dBase limit.

pub const HIST_AREA: &str = "Hist_Area";
pub const CRNT_AREA: &str = "Crnt_Area";
pub const SEG_LENGTH: &str = "Seg_Length";
pub const HIST_LENGTH: &str = "HistLength";
pub const CRNT_LENGTH: &str = "CrntLength";
pub const HIST_WIDTH: &str = "Hist_Width";
pub const CRNT_WIDTH: &str = "Crnt_Width";
pub const WIDTH_RED: &str = "WidthRed";
pub const AREA_RED: &str = "AreaRed";

/// Fields kept on the historic half after its bankfull/centerline join.
pub const HISTORIC_FIELDS: &[&str] = &[HIST_AREA, HIST_LENGTH, HIST_WIDTH];

/// Fields kept on the modern half after its bankfull/centerline join.
pub const MODERN_FIELDS: &[&str] = &[CRNT_AREA, CRNT_LENGTH, CRNT_WIDTH];

/// The declared schema of the polygon product.
pub const POLYGON_FIELDS: &[&str] = &[
    HIST_AREA, CRNT_AREA, HIST_LENGTH, CRNT_LENGTH, HIST_WIDTH, CRNT_WIDTH, WIDTH_RED, AREA_RED,
];

/// The declared schema of the polyline product.
pub const POLYLINE_FIELDS: &[&str] = &[
    SEG_LENGTH, HIST_AREA, CRNT_AREA, HIST_LENGTH, CRNT_LENGTH, HIST_WIDTH, CRNT_WIDTH, WIDTH_RED, AREA_RED,
];

/// Default attribute that engine-created polygons and lines carry.
pub const ID_FIELD: &str = "Id";

/// Transient fields a spatial join appends.
pub const JOIN_COUNT: &str = "Join_Count";
pub const TARGET_FID: &str = "TARGET_FID";
pub const JOIN_FID: &str = "JOIN_FID";
