//! Comfort scoring.
//!
//! Three factor scores on a 0-100 scale, weighted 40/30/30 for temperature,
//! humidity and wind. Pure functions: no state, no I/O.

use crate::types::{ComfortBreakdown, ComfortLevel, WeatherSnapshot};

const TEMPERATURE_WEIGHT: f64 = 0.4;
const HUMIDITY_WEIGHT: f64 = 0.3;
const WIND_WEIGHT: f64 = 0.3;

/// m/s to km/h
const MS_TO_KMH: f64 = 3.6;

/// Score a temperature in °C. 100 inside [20, 25].
pub fn temperature_score(celsius: f64) -> f64 {
    if celsius.is_nan() {
        return 0.0;
    }
    if (20.0..=25.0).contains(&celsius) {
        100.0
    } else if (15.0..=30.0).contains(&celsius) {
        if celsius < 20.0 {
            50.0 + (celsius - 15.0) / 5.0 * 50.0
        } else {
            100.0 - (celsius - 25.0) / 5.0 * 50.0
        }
    } else {
        let distance = (celsius - 20.0).abs().min((celsius - 25.0).abs());
        (50.0 - 10.0 * distance).max(0.0)
    }
}

/// Score relative humidity in %. 100 inside [40, 60].
pub fn humidity_score(percent: f64) -> f64 {
    if percent.is_nan() {
        return 0.0;
    }
    if (40.0..=60.0).contains(&percent) {
        100.0
    } else if (30.0..=70.0).contains(&percent) {
        if percent < 40.0 {
            50.0 + (percent - 30.0) / 10.0 * 50.0
        } else {
            100.0 - (percent - 60.0) / 10.0 * 50.0
        }
    } else {
        let distance = (percent - 40.0).abs().min((percent - 60.0).abs());
        (50.0 - 5.0 * distance).max(0.0)
    }
}

/// Score a wind speed given in m/s. 100 up to 5 km/h.
pub fn wind_score(meters_per_second: f64) -> f64 {
    if meters_per_second.is_nan() {
        return 0.0;
    }
    let kmh = meters_per_second * MS_TO_KMH;
    if kmh <= 5.0 {
        100.0
    } else if kmh <= 20.0 {
        100.0 - (kmh - 5.0) / 15.0 * 50.0
    } else {
        (50.0 - 2.0 * (kmh - 20.0)).max(0.0)
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Combine the factor scores for raw measurements.
pub fn score(temperature: f64, humidity: f64, wind_speed: f64) -> ComfortBreakdown {
    let temperature_impact = temperature_score(temperature);
    let humidity_impact = humidity_score(humidity);
    let wind_impact = wind_score(wind_speed);

    let weighted = temperature_impact * TEMPERATURE_WEIGHT
        + humidity_impact * HUMIDITY_WEIGHT
        + wind_impact * WIND_WEIGHT;
    let clamped = weighted.clamp(0.0, 100.0);

    // Level comes from the unrounded score; rounding is for display only.
    ComfortBreakdown {
        comfort_score: round_one_decimal(clamped),
        comfort_level: ComfortLevel::from_score(clamped),
        temperature_impact,
        humidity_impact,
        wind_impact,
    }
}

/// Score a snapshot.
pub fn score_snapshot(snapshot: &WeatherSnapshot) -> ComfortBreakdown {
    score(snapshot.temperature, snapshot.humidity, snapshot.wind_speed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_temperature_optimal_band_is_100() {
        for t in [20.0, 21.3, 22.5, 24.99, 25.0] {
            assert_eq!(temperature_score(t), 100.0, "t = {}", t);
        }
    }

    #[test]
    fn test_temperature_ramps() {
        assert!(close(temperature_score(15.0), 50.0));
        assert!(close(temperature_score(17.5), 75.0));
        assert!(close(temperature_score(27.5), 75.0));
        assert!(close(temperature_score(30.0), 50.0));
    }

    #[test]
    fn test_temperature_outside_range() {
        // distance to 25 is 8
        assert!(close(temperature_score(33.0), 0.0));
        assert!(close(temperature_score(31.0), 0.0));
        // distance to 20 is 6
        assert!(close(temperature_score(14.0), 0.0));
        assert!(close(temperature_score(-3.9), 0.0));
    }

    #[test]
    fn test_humidity_bands() {
        assert_eq!(humidity_score(50.0), 100.0);
        assert!(close(humidity_score(35.0), 75.0));
        assert!(close(humidity_score(65.0), 75.0));
        assert!(close(humidity_score(75.0), 0.0));
        assert!(close(humidity_score(28.0), 0.0));
        assert!(close(humidity_score(0.0), 0.0));
    }

    #[test]
    fn test_wind_bands() {
        assert_eq!(wind_score(0.0), 100.0);
        assert_eq!(wind_score(1.0), 100.0);
        assert!(close(wind_score(5.0 / 3.6), 100.0));
        // 12.5 km/h -> 75
        assert!(close(wind_score(12.5 / 3.6), 75.0));
        // 20 km/h -> 50
        assert!(close(wind_score(20.0 / 3.6), 50.0));
        // 30 km/h -> 30
        assert!(close(wind_score(30.0 / 3.6), 30.0));
        assert_eq!(wind_score(50.0), 0.0);
    }

    #[test]
    fn test_ideal_conditions_very_comfortable() {
        let breakdown = score(22.0, 50.0, 1.0);
        assert_eq!(breakdown.comfort_score, 100.0);
        assert_eq!(breakdown.comfort_level, ComfortLevel::VeryComfortable);
    }

    #[test]
    fn test_hot_city_is_dominated_by_temperature() {
        // Colombo at 33°C, comfortable humidity and light wind
        let breakdown = score(33.0, 50.0, 3.0);
        assert_eq!(breakdown.temperature_impact, 0.0);
        assert!(breakdown.comfort_score <= 60.0);
        assert!(breakdown.comfort_level < ComfortLevel::Comfortable);
    }

    #[test]
    fn test_score_rounded_to_one_decimal() {
        let breakdown = score(17.0, 33.0, 4.0);
        let scaled = breakdown.comfort_score * 10.0;
        assert!(close(scaled, scaled.round()));
        assert!((0.0..=100.0).contains(&breakdown.comfort_score));
    }

    #[test]
    fn test_level_uses_unrounded_score() {
        // 40 + 30 + 9.96 = 79.96, displayed as 80.0
        let breakdown = score(22.0, 50.0, 28.4 / 3.6);
        assert_eq!(breakdown.comfort_score, 80.0);
        assert_eq!(breakdown.comfort_level, ComfortLevel::Comfortable);

        let breakdown = score(22.0, 50.0, 1.0);
        assert_eq!(breakdown.comfort_level, ComfortLevel::VeryComfortable);
    }

    #[test]
    fn test_score_is_repeatable() {
        let a = score(18.2, 64.0, 6.1);
        let b = score(18.2, 64.0, 6.1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_nan_inputs_score_zero() {
        let breakdown = score(f64::NAN, f64::NAN, f64::NAN);
        assert_eq!(breakdown.comfort_score, 0.0);
        assert_eq!(breakdown.comfort_level, ComfortLevel::VeryUncomfortable);
    }

    #[test]
    fn test_extreme_inputs_stay_in_range() {
        for (t, h, w) in [(-60.0, 0.0, 80.0), (60.0, 100.0, 0.0), (f64::MAX, f64::MIN, f64::MAX)] {
            let breakdown = score(t, h, w);
            assert!((0.0..=100.0).contains(&breakdown.comfort_score));
        }
    }
}
