//! Assembly of the weather endpoint payload around a single source's result.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::{
    round1, CurrentConditions, ForecastSummary, LocationInfo, SourceKind, SunTimes, WeatherReport,
};

const MOON_PHASES: &[&str] = &["New Moon", "First Quarter", "Full Moon", "Last Quarter"];

/// Advice derived from current conditions. Never empty.
pub fn weather_tips(current: &CurrentConditions) -> Vec<String> {
    let mut tips = Vec::new();
    let temp = current.temperature_celsius;

    if temp >= 35.0 {
        tips.push("Extreme heat! Stay indoors.");
    } else if temp >= 30.0 {
        tips.push("Very hot! Stay hydrated.");
    } else if temp <= 0.0 {
        tips.push("Freezing! Bundle up.");
    } else if temp <= 10.0 {
        tips.push("Cold. Wear warm layers.");
    }

    let condition = current.condition.to_lowercase();
    if condition.contains("rain") {
        tips.push("Rain expected. Bring umbrella!");
    }
    if condition.contains("storm") {
        tips.push("Storm warning! Stay indoors.");
    }
    if condition.contains("snow") {
        tips.push("Snow! Drive carefully.");
    }

    if current.uv_index.is_some_and(|uv| uv >= 6.0) {
        tips.push("High UV! Use sunscreen.");
    }
    if current.wind_speed_kmh >= 40.0 {
        tips.push("Strong winds!");
    }
    if current.humidity_percent >= 80 {
        tips.push("Very humid.");
    }

    if tips.is_empty() {
        tips.push("Weather looks good!");
    }
    tips.into_iter().map(str::to_string).collect()
}

/// First tip of every report, naming where the data came from.
pub fn provenance_tip(kind: SourceKind, source: &str) -> String {
    match kind {
        SourceKind::Ai => "AI-powered from Gemini".to_string(),
        SourceKind::Provider => format!("From {}", source),
        SourceKind::Synthetic => "Simulated data".to_string(),
    }
}

fn forecast_summary(current: &CurrentConditions, rng: &mut impl Rng) -> ForecastSummary {
    let temp = current.temperature_celsius;
    let condition = &current.condition;
    let tomorrow_offset = f64::from(rng.gen_range(-2..=2));

    ForecastSummary {
        today: format!("{}, High: {} C", condition, round1(temp + 2.0)),
        tomorrow: format!("Similar, High: {} C", round1(temp + tomorrow_offset)),
        day_after: format!("Partly {}, High: {} C", condition, temp),
    }
}

/// Wrap one source's current conditions into the full report.
pub fn build_report(
    current: CurrentConditions,
    location: LocationInfo,
    kind: SourceKind,
) -> WeatherReport {
    let mut rng = rand::thread_rng();

    let mut weather_tips = weather_tips(&current);
    weather_tips.insert(0, provenance_tip(kind, &current.source));

    WeatherReport {
        forecast: forecast_summary(&current, &mut rng),
        sun_times: SunTimes {
            sunrise: "06:30 AM".to_string(),
            sunset: "06:45 PM".to_string(),
        },
        moon_phase: MOON_PHASES
            .choose(&mut rng)
            .copied()
            .unwrap_or("Full Moon")
            .to_string(),
        location,
        weather_tips,
        source: current.source.clone(),
        source_kind: kind,
        is_real_data: current.is_real_data,
        current_weather: current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinate;

    fn conditions(temp: f64, condition: &str) -> CurrentConditions {
        CurrentConditions::new("WeatherAPI.com", SourceKind::Provider, condition, temp, temp, 50, 10.0)
    }

    #[test]
    fn test_default_tip_when_nothing_notable() {
        assert_eq!(weather_tips(&conditions(22.0, "Clear")), vec!["Weather looks good!"]);
    }

    #[test]
    fn test_temperature_bands() {
        assert_eq!(weather_tips(&conditions(36.0, "Clear"))[0], "Extreme heat! Stay indoors.");
        assert_eq!(weather_tips(&conditions(31.0, "Clear"))[0], "Very hot! Stay hydrated.");
        assert_eq!(weather_tips(&conditions(-2.0, "Clear"))[0], "Freezing! Bundle up.");
        assert_eq!(weather_tips(&conditions(8.0, "Clear"))[0], "Cold. Wear warm layers.");
    }

    #[test]
    fn test_condition_and_extremes_stack() {
        let mut current = conditions(12.0, "Thunderstorm with heavy rain");
        current.uv_index = Some(7.0);
        current.wind_speed_kmh = 55.0;
        current.humidity_percent = 90;

        let tips = weather_tips(&current);
        assert_eq!(
            tips,
            vec![
                "Rain expected. Bring umbrella!",
                "Storm warning! Stay indoors.",
                "High UV! Use sunscreen.",
                "Strong winds!",
                "Very humid.",
            ]
        );
    }

    #[test]
    fn test_provenance_tips() {
        assert_eq!(provenance_tip(SourceKind::Ai, "Gemini AI"), "AI-powered from Gemini");
        assert_eq!(provenance_tip(SourceKind::Provider, "Open-Meteo"), "From Open-Meteo");
        assert_eq!(provenance_tip(SourceKind::Synthetic, "Synthetic"), "Simulated data");
    }

    #[test]
    fn test_build_report_shape() {
        let coord = Coordinate::new(40.0, -74.0).unwrap();
        let report = build_report(
            conditions(20.0, "Cloudy"),
            LocationInfo::unknown(coord),
            SourceKind::Provider,
        );

        assert_eq!(report.weather_tips[0], "From WeatherAPI.com");
        assert_eq!(report.weather_tips[1], "Weather looks good!");
        assert_eq!(report.forecast.today, "Cloudy, High: 22 C");
        assert_eq!(report.forecast.day_after, "Partly Cloudy, High: 20 C");
        assert!(report.forecast.tomorrow.starts_with("Similar, High: "));
        assert!(MOON_PHASES.contains(&report.moon_phase.as_str()));
        assert_eq!(report.sun_times.sunrise, "06:30 AM");
        assert!(report.is_real_data);
        assert_eq!(report.source, "WeatherAPI.com");
        assert_eq!(report.location.city, "Unknown");
    }
}
