/// Absolute storage level of a control curve given as a fraction of capacity.
///
/// `max_volume` is the total capacity of the storage the curve applies to;
/// for an aggregated storage that is the sum over its members.
#[inline]
pub fn absolute_level(curve_fraction: f64, max_volume: f64) -> f64 {
    curve_fraction * max_volume
}

/// `1` when storage sits below the curve level, else `0`.
#[inline]
pub fn crossing_index(volume: f64, level: f64) -> u32 {
    (volume < level) as u32
}
