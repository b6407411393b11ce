//! Common test fixtures.

/// Radar sites used across the tests.
pub mod sites {
    /// Fort Worth, TX. Collection name "KFWS".
    pub const FWS: &str = "FWS";
    pub const FWS_LATITUDE: f64 = 32.573;
    pub const FWS_LONGITUDE: f64 = -97.303;

    /// Albuquerque, NM. Collection name "KABX".
    pub const ABX: &str = "ABX";
}

/// Volume scan times as Level III (julian day, seconds) pairs.
pub mod times {
    /// 2024-01-15 is day 19738 (day 1 is 1970-01-01).
    pub const JAN_15_2024_DAY: u16 = 19738;
    /// 12:30:00 UTC
    pub const HALF_PAST_NOON: u32 = 45_000;
    /// Unix timestamp of 2024-01-15T12:30:00Z
    pub const JAN_15_2024_1230_UNIX: i64 = 1_705_321_800;
}

/// Product codes and elevation angles the tests exercise.
pub mod products {
    /// Digital base reflectivity, N0Q
    pub const N0Q: (i16, f64) = (94, 0.5);
    /// Digital base velocity, N0U
    pub const N0U: (i16, f64) = (99, 0.5);
    /// Legacy base reflectivity, 16 levels
    pub const N0R: (i16, f64) = (19, 0.5);
    /// Correlation coefficient, N0C
    pub const N0C: (i16, f64) = (161, 0.5);
    /// A combination the catalog does not know
    pub const UNKNOWN: (i16, f64) = (99, 9.9);
}
