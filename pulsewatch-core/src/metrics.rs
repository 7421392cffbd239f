//! Psychrometric relations used for derived telemetry.
//!
//! Inputs arrive in Fahrenheit and percent relative humidity, as the Pulse
//! API reports them. Vapor pressures are in kPa.

/// Magnus coefficient `a` for dew point.
const MAGNUS_A: f64 = 17.27;

/// Magnus coefficient `b` (°C) for dew point.
const MAGNUS_B: f64 = 237.7;

/// Converts °F to °C.
pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

/// Converts °C to °F.
pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// Saturation vapor pressure at `t_c` °C (Buck 1981).
pub fn saturation_vapor_pressure(t_c: f64) -> f64 {
    0.611_21 * ((17.502 * t_c) / (t_c + 240.97)).exp()
}

/// Air vapor-pressure deficit in kPa, rounded to 3 decimals.
pub fn air_vpd(temp_f: f64, rh: f64) -> f64 {
    let t_c = fahrenheit_to_celsius(temp_f);
    round_to(saturation_vapor_pressure(t_c) * (1.0 - rh / 100.0), 3)
}

/// Leaf vapor-pressure deficit in kPa, rounded to 3 decimals.
///
/// `leaf_offset_f` is the leaf temperature minus the air temperature, in °F.
pub fn leaf_vpd(temp_f: f64, rh: f64, leaf_offset_f: f64) -> f64 {
    let air_c = fahrenheit_to_celsius(temp_f);
    let leaf_c = fahrenheit_to_celsius(temp_f + leaf_offset_f);
    round_to(
        saturation_vapor_pressure(leaf_c) - saturation_vapor_pressure(air_c) * rh / 100.0,
        3,
    )
}

/// Dew point in °F, rounded to 2 decimals.
///
/// Returns a non-finite value when `rh` is not positive; callers drop those.
pub fn dew_point_f(temp_f: f64, rh: f64) -> f64 {
    let t_c = fahrenheit_to_celsius(temp_f);
    let alpha = (MAGNUS_A * t_c) / (MAGNUS_B + t_c) + (rh / 100.0).ln();
    let dew_c = (MAGNUS_B * alpha) / (MAGNUS_A - alpha);
    round_to(celsius_to_fahrenheit(dew_c), 2)
}

#[allow(clippy::cast_possible_wrap)]
fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_conversion() {
        assert!((fahrenheit_to_celsius(212.0) - 100.0).abs() < 1e-9);
        assert!((celsius_to_fahrenheit(-40.0) + 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_saturation_at_freezing() {
        assert!((saturation_vapor_pressure(0.0) - 0.611_21).abs() < 1e-9);
    }

    #[test]
    fn test_air_vpd_seedling_tent() {
        assert_eq!(air_vpd(75.2, 64.5), 1.059);
    }

    #[test]
    fn test_air_vpd_saturated_air_is_zero() {
        assert_eq!(air_vpd(80.0, 100.0), 0.0);
    }

    #[test]
    fn test_leaf_vpd_without_offset_matches_air() {
        assert_eq!(leaf_vpd(82.4, 58.1, 0.0), air_vpd(82.4, 58.1));
    }

    #[test]
    fn test_leaf_vpd_cooler_leaf() {
        assert_eq!(leaf_vpd(75.2, 64.5, -2.0), 0.866);
    }

    #[test]
    fn test_dew_point() {
        assert_eq!(dew_point_f(75.2, 64.5), 62.39);
        assert_eq!(dew_point_f(68.0, 50.0), 48.66);
    }

    #[test]
    fn test_dew_point_dry_air_is_not_finite() {
        assert!(!dew_point_f(70.0, 0.0).is_finite());
    }

    #[test]
    fn test_pure_functions_are_repeatable() {
        for _ in 0..3 {
            assert_eq!(air_vpd(68.0, 50.0), 1.169);
            assert_eq!(leaf_vpd(68.0, 50.0, -3.6), 0.894);
            assert_eq!(dew_point_f(82.4, 58.1), 66.16);
        }
    }
}
