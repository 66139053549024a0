//! Last-resort synthetic data. Always succeeds, never counted as real.

use chrono::{Duration as ChronoDuration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;

use super::weatherapi::weekday_name;
use crate::types::{
    round1, AirQuality, Coordinate, CurrentConditions, DailyForecast, ForecastOutlook,
    HourlyForecast, SourceKind,
};

pub const SOURCE_NAME: &str = "Synthetic";

const CONDITIONS: &[&str] = &["Clear sky", "Partly cloudy", "Cloudy", "Light rain"];
const HOURLY_CONDITIONS: &[&str] = &["Clear", "Partly Cloudy", "Cloudy"];
const DAILY_CONDITIONS: &[&str] = &["Clear", "Partly Cloudy", "Cloudy", "Light Rain"];
const WIND_DIRECTIONS: &[&str] = &["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

fn pick(options: &[&'static str], rng: &mut impl Rng) -> &'static str {
    options.choose(rng).copied().unwrap_or("Clear")
}

/// Randomized but plausible weather of a fixed shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticWeather;

impl SyntheticWeather {
    /// Baseline cools with latitude: 25 - |lat| * 0.5, jittered by -5..8.
    pub fn current(&self, coordinate: Coordinate) -> CurrentConditions {
        let mut rng = rand::thread_rng();
        let base = 25.0 - coordinate.latitude().abs() * 0.5;
        let temp = round1(base + rng.gen_range(-5.0..8.0));
        let condition = pick(CONDITIONS, &mut rng);

        let mut current = CurrentConditions::new(
            SOURCE_NAME,
            SourceKind::Synthetic,
            condition,
            temp,
            round1(temp + rng.gen_range(-2.0..2.0)),
            rng.gen_range(40..=85),
            round1(rng.gen_range(5.0..25.0)),
        );
        current.description = Some(format!("Currently {}", condition.to_lowercase()));
        current.wind_direction = Some(pick(WIND_DIRECTIONS, &mut rng).to_string());
        current.pressure_mb = Some(f64::from(rng.gen_range(1005..=1025)));
        current.visibility_km = Some(f64::from(rng.gen_range(8..=20)));
        current.uv_index = Some(f64::from(rng.gen_range(1..=9)));
        current.cloud_cover_percent = Some(rng.gen_range(10..=90));
        current.precipitation_mm = Some(0.0);
        current
    }

    /// 24 hours starting at `start_hour`, coolest at night and warmest at 14:00.
    pub fn hourly(&self, start_hour: u32) -> Vec<HourlyForecast> {
        let mut rng = rand::thread_rng();
        (0..24)
            .map(|i| {
                let hour = (start_hour + i) % 24;
                let variation = -5.0 * (f64::from(hour) - 14.0).abs() / 14.0 + 3.0;
                let temp = 21.0 + variation + rng.gen_range(-1.0..1.0);
                HourlyForecast {
                    hour: format!("{:02}:00", hour),
                    temperature_celsius: round1(temp),
                    precipitation_chance: rng.gen_range(0..=30),
                    condition: pick(HOURLY_CONDITIONS, &mut rng).to_string(),
                    humidity: None,
                    wind_kph: None,
                }
            })
            .collect()
    }

    /// Seven days starting at `today`, with a fixed benign air quality.
    pub fn daily(&self, today: NaiveDate) -> ForecastOutlook {
        let mut rng = rand::thread_rng();
        let forecast = (0..7)
            .map(|i| {
                let date = today + ChronoDuration::days(i);
                DailyForecast {
                    day: weekday_name(date).to_string(),
                    date: date.format("%Y-%m-%d").to_string(),
                    max_temp_c: round1(20.0 + rng.gen_range(-5.0..10.0)),
                    min_temp_c: round1(15.0 + rng.gen_range(-3.0..5.0)),
                    condition: pick(DAILY_CONDITIONS, &mut rng).to_string(),
                    icon: None,
                    rain_chance: rng.gen_range(0..=60),
                    snow_chance: 0,
                    avg_humidity: rng.gen_range(40..=80),
                    max_wind_kph: round1(rng.gen_range(5.0..25.0)),
                }
            })
            .collect();

        ForecastOutlook {
            forecast,
            air_quality: AirQuality {
                us_epa_index: 1,
                gb_defra_index: None,
                pm2_5: 10.0,
                pm10: 15.0,
                co: None,
                no2: None,
                o3: None,
                so2: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_is_plausible_and_not_real() {
        let coord = Coordinate::new(40.0, -74.0).unwrap();
        for _ in 0..50 {
            let current = SyntheticWeather.current(coord);
            // base 5.0, jitter -5..8
            assert!((0.0..=13.0).contains(&current.temperature_celsius));
            assert!((40..=85).contains(&current.humidity_percent));
            assert!(CONDITIONS.contains(&current.condition.as_str()));
            assert!(!current.is_real_data);
            assert_eq!(current.source, SOURCE_NAME);
        }
    }

    #[test]
    fn test_hourly_curve_peaks_mid_afternoon() {
        let hours = SyntheticWeather.hourly(0);
        assert_eq!(hours.len(), 24);
        assert_eq!(hours[0].hour, "00:00");
        assert_eq!(hours[23].hour, "23:00");

        // 14:00 is 24 +/- 1, midnight is 19 +/- 1
        assert!(hours[14].temperature_celsius >= 23.0);
        assert!(hours[0].temperature_celsius <= 20.0);
    }

    #[test]
    fn test_hourly_wraps_around_midnight() {
        let hours = SyntheticWeather.hourly(22);
        assert_eq!(hours[0].hour, "22:00");
        assert_eq!(hours[2].hour, "00:00");
    }

    #[test]
    fn test_daily_has_seven_consecutive_days() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 10).unwrap();
        let outlook = SyntheticWeather.daily(today);

        assert_eq!(outlook.forecast.len(), 7);
        assert_eq!(outlook.forecast[0].date, "2026-06-10");
        assert_eq!(outlook.forecast[0].day, "Wednesday");
        assert_eq!(outlook.forecast[6].date, "2026-06-16");
        assert_eq!(outlook.air_quality.us_epa_index, 1);
        assert_eq!(outlook.air_quality.pm10, 15.0);
        assert!(outlook.forecast.iter().all(|d| d.snow_chance == 0));
    }
}
