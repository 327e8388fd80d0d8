//! Zoom level → H3 resolution.

use h3o::Resolution;

/// Zoom breakpoints: `(lower bound, resolution)`, checked from the finest down.
const ZOOM_BREAKPOINTS: [(f64, Resolution); 4] = [
    (11.0, Resolution::Six),
    (9.0, Resolution::Five),
    (7.0, Resolution::Four),
    (5.0, Resolution::Three),
];

/// Resolution used below the first breakpoint.
pub const COARSEST_RESOLUTION: Resolution = Resolution::Two;

/// Pick the tiling resolution for a map zoom level.
///
/// Breakpoints are inclusive on their lower bound, so zoom 5 already uses
/// resolution 3. A NaN zoom fails every `<` comparison and lands on the
/// finest resolution.
pub fn resolution_for_zoom(zoom: f64) -> Resolution {
    if zoom.is_nan() {
        return ZOOM_BREAKPOINTS[0].1;
    }
    ZOOM_BREAKPOINTS
        .iter()
        .find(|(lower, _)| zoom >= *lower)
        .map(|(_, resolution)| *resolution)
        .unwrap_or(COARSEST_RESOLUTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brackets_match_thresholds() {
        assert_eq!(resolution_for_zoom(0.0), Resolution::Two);
        assert_eq!(resolution_for_zoom(4.99), Resolution::Two);
        assert_eq!(resolution_for_zoom(6.0), Resolution::Three);
        assert_eq!(resolution_for_zoom(8.5), Resolution::Four);
        assert_eq!(resolution_for_zoom(10.0), Resolution::Five);
        assert_eq!(resolution_for_zoom(18.0), Resolution::Six);
    }

    #[test]
    fn boundaries_resolve_to_higher_bracket() {
        assert_eq!(resolution_for_zoom(5.0), Resolution::Three);
        assert_eq!(resolution_for_zoom(7.0), Resolution::Four);
        assert_eq!(resolution_for_zoom(9.0), Resolution::Five);
        assert_eq!(resolution_for_zoom(11.0), Resolution::Six);
    }

    #[test]
    fn non_decreasing_in_zoom() {
        let mut previous = resolution_for_zoom(-10.0);
        let mut zoom = -10.0;
        while zoom <= 25.0 {
            let current = resolution_for_zoom(zoom);
            assert!(current >= previous, "zoom {zoom}: {current} < {previous}");
            previous = current;
            zoom += 0.25;
        }
    }

    #[test]
    fn total_over_extreme_values() {
        assert_eq!(resolution_for_zoom(f64::NEG_INFINITY), Resolution::Two);
        assert_eq!(resolution_for_zoom(f64::INFINITY), Resolution::Six);
        assert_eq!(resolution_for_zoom(f64::NAN), Resolution::Six);
    }
}
