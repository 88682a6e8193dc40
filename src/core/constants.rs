//! Engine-wide magic numbers, kept in a single place so they are easy to tweak.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Delay between the first tile completion of a burst and the coalesced repaint.
pub const REPAINT_SCHEDULING_INTERVAL_MS: u64 = 1000;

/// Multiplier applied to the fractional tile level so that a radius sitting exactly
/// on a power-of-two boundary selects the sharper level.
pub const TILE_LEVEL_SNAP_FACTOR: f64 = 1.00001;

/// Default in-memory budget for stacked tiles, in kilobytes (100 MiB).
pub const DEFAULT_VOLATILE_CACHE_LIMIT_KB: u64 = 100 * 1024;

/// Width of the day/night transition band, expressed in haversine units.
pub const TWILIGHT_ZONE: f64 = 0.1;

/// Brightness factor applied to fully unlit pixels.
pub const NIGHT_BRIGHTNESS: f64 = 0.35;

/// Upper bound for the sun shading supporting-point interval.
pub const SHADING_INTERPOLATION_LIMIT: u32 = 30;

/// Number of relief bump levels in the colorizer palette.
pub const RELIEF_LEVELS: usize = 16;

/// Neutral bump level (no relief shading).
pub const RELIEF_NEUTRAL: usize = 8;
