/// Parses a vehicle's reported speed in km/h.
///
/// Returns `None` when the value is absent, blank, not a finite number, or
/// negative. Zero is a valid speed. There is no upper bound.
pub fn parse_speed_kmh(raw: Option<&str>) -> Option<f64> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }

    let speed: f64 = trimmed.parse().ok()?;
    if !speed.is_finite() || speed < 0.0 {
        return None;
    }

    // "-0" parses to negative zero
    Some(speed + 0.0)
}
