//! Weather context for chat and the local rule-based assistant.
//!
//! The assistant answers when the AI chat source is disabled, over quota, or
//! failing. Replies are routed on keywords in the lowercased message.

use rand::seq::SliceRandom;
use serde_json::Value;

use crate::types::WeatherReport;

pub const EMPTY_MESSAGE_REPLY: &str = "Please ask a question about the weather!";

/// Weather facts a chat reply can draw on.
///
/// Built from whatever weather payload the client echoes back, so every
/// field is optional in the input and defaulted here.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherContext {
    pub city: String,
    pub country: String,
    pub condition: String,
    pub temperature_celsius: f64,
    pub temperature_fahrenheit: f64,
    pub feels_like_celsius: f64,
    pub humidity_percent: f64,
    pub wind_speed_kmh: f64,
    pub uv_index: f64,
    pub forecast_today: String,
    pub forecast_tomorrow: String,
}

impl Default for WeatherContext {
    fn default() -> Self {
        Self {
            city: "your location".to_string(),
            country: String::new(),
            condition: "unknown".to_string(),
            temperature_celsius: 0.0,
            temperature_fahrenheit: 0.0,
            feels_like_celsius: 0.0,
            humidity_percent: 0.0,
            wind_speed_kmh: 0.0,
            uv_index: 0.0,
            forecast_today: "N/A".to_string(),
            forecast_tomorrow: "N/A".to_string(),
        }
    }
}

impl WeatherContext {
    /// Lenient extraction from a weather report shaped JSON value.
    ///
    /// Returns `None` when there is nothing to work with (null, non-object or
    /// empty object).
    pub fn from_json(value: &Value) -> Option<Self> {
        let root = value.as_object().filter(|o| !o.is_empty())?;
        let empty = Value::Null;
        let current = root.get("current_weather").unwrap_or(&empty);
        let location = root.get("location").unwrap_or(&empty);
        let forecast = root.get("forecast").unwrap_or(&empty);

        let defaults = Self::default();
        let temperature_celsius = number(current, "temperature_celsius").unwrap_or(0.0);

        Some(Self {
            city: text(location, "city").unwrap_or(defaults.city),
            country: text(location, "country").unwrap_or(defaults.country),
            condition: text(current, "condition").unwrap_or(defaults.condition),
            temperature_celsius,
            temperature_fahrenheit: number(current, "temperature_fahrenheit").unwrap_or(0.0),
            feels_like_celsius: number(current, "feels_like_celsius")
                .unwrap_or(temperature_celsius),
            humidity_percent: number(current, "humidity_percent").unwrap_or(0.0),
            wind_speed_kmh: number(current, "wind_speed_kmh").unwrap_or(0.0),
            uv_index: number(current, "uv_index").unwrap_or(0.0),
            forecast_today: text(forecast, "today").unwrap_or(defaults.forecast_today),
            forecast_tomorrow: text(forecast, "tomorrow").unwrap_or(defaults.forecast_tomorrow),
        })
    }

    pub fn from_report(report: &WeatherReport) -> Self {
        let current = &report.current_weather;
        Self {
            city: report.location.city.clone(),
            country: report.location.country.clone(),
            condition: current.condition.clone(),
            temperature_celsius: current.temperature_celsius,
            temperature_fahrenheit: current.temperature_fahrenheit.unwrap_or_default(),
            feels_like_celsius: current.feels_like_celsius,
            humidity_percent: f64::from(current.humidity_percent),
            wind_speed_kmh: current.wind_speed_kmh,
            uv_index: current.uv_index.unwrap_or_default(),
            forecast_today: report.forecast.today.clone(),
            forecast_tomorrow: report.forecast.tomorrow.clone(),
        }
    }
}

fn number(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64)
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Cache key for a chat reply: city plus the first 50 chars of the message.
pub fn chat_cache_key(city: &str, message: &str) -> String {
    let prefix: String = message.chars().take(50).collect();
    format!("chat_{}_{}", city, prefix)
}

const AGRICULTURE_WORDS: &[&str] = &[
    "grow", "plant", "crop", "farm", "vegetat", "agricultur", "garden", "cultivat", "harvest",
    "sow", "seed",
];
const IDENTITY_PHRASES: &[&str] = &[
    "who are you",
    "what are you",
    "your name",
    "introduce yourself",
    "what can you do",
];
const TEMPERATURE_WORDS: &[&str] = &["temp", "hot", "cold", "warm", "heat", "degree"];
const RAIN_WORDS: &[&str] = &["rain", "precipitation", "wet", "umbrella", "shower"];
const SUN_WORDS: &[&str] = &["sun", "uv", "sunburn", "sunscreen", "sunny"];
const OUTDOOR_WORDS: &[&str] = &["jogging", "running", "walking", "hiking", "outdoor", "outside"];

fn mentions(haystack: &str, words: &[&str]) -> bool {
    words.iter().any(|w| haystack.contains(w))
}

/// Keyword-routed replies computed from the weather context alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalAssistant;

impl LocalAssistant {
    pub fn reply(&self, message: &str, ctx: &WeatherContext) -> String {
        let message = message.to_lowercase();
        let condition = ctx.condition.to_lowercase();
        let city = ctx.city.as_str();
        let temp = ctx.temperature_celsius;
        let humidity = ctx.humidity_percent;
        let wind = ctx.wind_speed_kmh;
        let uv = ctx.uv_index;

        if mentions(&message, AGRICULTURE_WORDS) {
            agriculture_reply(temp, humidity, city, &condition)
        } else if mentions(&message, IDENTITY_PHRASES) {
            "I'm FlintWeather, your weather assistant. I can help with forecasts, crop \
             recommendations, farming advice and everyday weather questions. How can I help?"
                .to_string()
        } else if message.contains("capital") && message.contains("france") {
            "Paris is the capital and largest city of France, known for the Eiffel Tower and \
             the Louvre."
                .to_string()
        } else if mentions(&message, TEMPERATURE_WORDS) {
            temperature_reply(ctx, &condition)
        } else if mentions(&message, RAIN_WORDS) {
            if condition.contains("rain") || condition.contains("drizzle") {
                format!(
                    "Yes, it's {} in {} right now. Humidity is {}%. Bring an umbrella!",
                    condition, city, humidity
                )
            } else {
                format!(
                    "No rain right now in {}. Current conditions: {}. Humidity is {}%.",
                    city, condition, humidity
                )
            }
        } else if message.contains("wind") {
            let strength = match wind {
                w if w > 40.0 => "very strong",
                w if w > 30.0 => "strong",
                w if w > 15.0 => "moderate",
                _ => "light",
            };
            let advice = if wind > 30.0 {
                "Be careful outdoors!"
            } else {
                "Conditions are manageable."
            };
            format!(
                "Wind speed in {} is {} km/h ({}). {} Current weather: {}.",
                city, wind, strength, advice, condition
            )
        } else if mentions(&message, SUN_WORDS) {
            uv_reply(uv, city)
        } else if message.contains("humid") {
            let feel = match humidity {
                h if h > 85.0 => "extremely humid",
                h if h > 70.0 => "very humid",
                h if h > 50.0 => "moderately humid",
                _ => "comfortable",
            };
            format!(
                "Humidity in {} is {}% ({}). Temperature: {}°C with {}.",
                city, humidity, feel, temp, condition
            )
        } else if mentions(&message, OUTDOOR_WORDS) {
            outdoor_reply(temp, &condition)
        } else {
            summary_reply(ctx, &condition)
        }
    }
}

fn temperature_reply(ctx: &WeatherContext, condition: &str) -> String {
    let temp = ctx.temperature_celsius;
    let feel = match temp {
        t if t > 35.0 => "very hot",
        t if t > 30.0 => "quite warm",
        t if t > 20.0 => "pleasant",
        t if t > 10.0 => "cool",
        _ => "cold",
    };
    let advice = if temp > 35.0 {
        " Stay hydrated and avoid the sun!"
    } else if (20.0..=28.0).contains(&temp) {
        " Great weather!"
    } else if temp < 10.0 {
        " Dress warmly!"
    } else {
        ""
    };
    format!(
        "It's currently {}°C ({}°F) in {}, which feels {}. Conditions: {}.{}",
        temp, ctx.temperature_fahrenheit, ctx.city, feel, condition, advice
    )
}

fn uv_reply(uv: f64, city: &str) -> String {
    if uv >= 8.0 {
        format!(
            "UV index is {} (very high) in {}. Wear SPF 30+ sunscreen, sunglasses and \
             protective clothing!",
            uv, city
        )
    } else if uv >= 6.0 {
        format!(
            "UV index is {} (high) in {}. Use sunscreen and avoid long sun exposure.",
            uv, city
        )
    } else if uv >= 3.0 {
        format!(
            "UV index is {} (moderate) in {}. Consider sunscreen for long outdoor activities.",
            uv, city
        )
    } else {
        format!("UV index is {} (low) in {}. No special protection needed.", uv, city)
    }
}

fn outdoor_reply(temp: f64, condition: &str) -> String {
    if temp > 35.0 {
        format!(
            "It's {}°C, too hot for strenuous outdoor activity. Try early morning or evening \
             and stay hydrated.",
            temp
        )
    } else if condition.contains("rain") || condition.contains("storm") {
        format!(
            "It's {}, not ideal for outdoor activities. Wait for the weather to clear.",
            condition
        )
    } else if (15.0..=28.0).contains(&temp) {
        format!(
            "Perfect weather for outdoor activities! {}°C with {}. Enjoy!",
            temp, condition
        )
    } else if temp < 10.0 {
        format!(
            "It's {}°C, quite cold. Dress in warm layers if going outside.",
            temp
        )
    } else {
        format!(
            "Weather is {}, {}°C. Conditions are acceptable for outdoor activities.",
            condition, temp
        )
    }
}

fn summary_reply(ctx: &WeatherContext, condition: &str) -> String {
    let city = &ctx.city;
    let temp = ctx.temperature_celsius;
    let options = [
        format!(
            "Weather in {}: {}, {}°C. Humidity {}%, wind {} km/h, UV index {}. What would you \
             like to know?",
            city, condition, temp, ctx.humidity_percent, ctx.wind_speed_kmh, ctx.uv_index
        ),
        format!(
            "I can help with weather, agriculture or general questions! Current conditions in \
             {}: {}, {}°C. Ask me anything!",
            city, condition, temp
        ),
        format!(
            "Current conditions: {}, {}°C in {}. Need weather details or crop advice?",
            condition, temp, city
        ),
    ];
    options
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_default()
}

struct ClimateBand {
    climate: &'static str,
    crops: &'static str,
    season: &'static str,
    advice: &'static str,
}

fn climate_band(temp: f64, humidity: f64) -> ClimateBand {
    if temp > 27.0 && humidity > 70.0 {
        ClimateBand {
            climate: "tropical (hot and humid)",
            crops: "rice, sugarcane, bananas, papayas, mangoes, pineapples, coconuts, cassava, yams",
            season: "Year-round with monsoon cycles",
            advice: "Heat and humidity suit tropical crops. Ensure good drainage to prevent \
                     waterlogging and watch for fungal disease.",
        }
    } else if temp > 30.0 && humidity < 40.0 {
        ClimateBand {
            climate: "hot arid/semi-arid",
            crops: "dates, olives, millet, sorghum, okra, eggplant",
            season: "Cooler months for most crops",
            advice: "Favor drought-resistant crops. Drip irrigation and mulching conserve \
                     water; water in the morning.",
        }
    } else if (20.0..=27.0).contains(&temp) {
        ClimateBand {
            climate: "warm temperate (ideal growing conditions)",
            crops: "wheat, corn, soybeans, tomatoes, peppers, cucumbers, beans, squash, sunflowers",
            season: "Late spring through early fall",
            advice: "Good conditions for a wide variety of crops. Rotate crops to keep soil \
                     healthy and water during dry spells.",
        }
    } else if (10.0..20.0).contains(&temp) {
        ClimateBand {
            climate: "cool temperate",
            crops: "barley, oats, potatoes, carrots, lettuce, cabbage, broccoli, peas, spinach",
            season: "Spring and fall (cool season crops)",
            advice: "Suited to cool-season vegetables and grains. Protect young plants from \
                     late frost with row covers.",
        }
    } else if temp < 10.0 {
        ClimateBand {
            climate: "cold (limited growing season)",
            crops: "winter wheat, winter rye, kale, brussels sprouts, garlic",
            season: "Short summer window; focus on cold-hardy varieties",
            advice: "Use greenhouses or cold frames to extend the season and start seeds \
                     indoors.",
        }
    } else {
        ClimateBand {
            climate: "moderate",
            crops: "lettuce, basil, parsley, green beans, zucchini, strawberries",
            season: "Spring-Summer",
            advice: "Good conditions for many vegetables. Adjust watering as temperatures \
                     change.",
        }
    }
}

fn agriculture_reply(temp: f64, humidity: f64, city: &str, condition: &str) -> String {
    let band = climate_band(temp, humidity);
    let watering = if temp > 30.0 {
        "Daily in hot weather"
    } else if temp > 20.0 {
        "Every 2-3 days"
    } else {
        "Weekly or as needed"
    };

    format!(
        "**Agriculture Recommendations for {city}**\n\n\
         **Climate Zone**: {climate}\n\
         **Current Conditions**: {temp}°C, {humidity}% humidity, {condition}\n\n\
         **Recommended Crops**: {crops}\n\n\
         **Best Growing Season**: {season}\n\n\
         **Farming Advice**: {advice}\n\n\
         **Quick Tips**:\n\
         - Soil pH: most vegetables prefer 6.0-7.0\n\
         - Watering: {watering}\n\
         - Fertilizer: organic compost or a balanced NPK fertilizer",
        climate = band.climate,
        crops = band.crops,
        season = band.season,
        advice = band.advice,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(temp: f64, humidity: f64, condition: &str) -> WeatherContext {
        WeatherContext {
            city: "Lyon".to_string(),
            country: "France".to_string(),
            condition: condition.to_string(),
            temperature_celsius: temp,
            temperature_fahrenheit: temp * 9.0 / 5.0 + 32.0,
            feels_like_celsius: temp,
            humidity_percent: humidity,
            wind_speed_kmh: 12.0,
            uv_index: 4.0,
            ..WeatherContext::default()
        }
    }

    #[test]
    fn test_from_json_reads_report_shape() {
        let value = json!({
            "current_weather": {
                "temperature_celsius": 18.5,
                "condition": "Light rain",
                "humidity_percent": 82,
                "wind_speed_kmh": 9.0
            },
            "location": {"city": "Porto", "country": "Portugal"},
            "forecast": {"today": "Rain, High: 20.5 C"}
        });

        let ctx = WeatherContext::from_json(&value).unwrap();
        assert_eq!(ctx.city, "Porto");
        assert_eq!(ctx.condition, "Light rain");
        assert_eq!(ctx.humidity_percent, 82.0);
        assert_eq!(ctx.feels_like_celsius, 18.5);
        assert_eq!(ctx.forecast_today, "Rain, High: 20.5 C");
        assert_eq!(ctx.forecast_tomorrow, "N/A");
    }

    #[test]
    fn test_from_json_rejects_empty() {
        assert!(WeatherContext::from_json(&json!({})).is_none());
        assert!(WeatherContext::from_json(&Value::Null).is_none());
        assert!(WeatherContext::from_json(&json!("weather")).is_none());
    }

    #[test]
    fn test_from_json_defaults_missing_sections() {
        let ctx = WeatherContext::from_json(&json!({"other": 1})).unwrap();
        assert_eq!(ctx.city, "your location");
        assert_eq!(ctx.condition, "unknown");
    }

    #[test]
    fn test_chat_cache_key_truncates_message() {
        let message = "a".repeat(80);
        let key = chat_cache_key("Oslo", &message);
        assert_eq!(key, format!("chat_Oslo_{}", "a".repeat(50)));
    }

    #[test]
    fn test_agriculture_routing_tropical() {
        let reply = LocalAssistant.reply("What should I plant?", &context(31.0, 80.0, "Sunny"));
        assert!(reply.contains("tropical"));
        assert!(reply.contains("rice"));
        assert!(reply.contains("Daily in hot weather"));
    }

    #[test]
    fn test_agriculture_bands() {
        assert_eq!(climate_band(32.0, 30.0).climate, "hot arid/semi-arid");
        assert!(climate_band(24.0, 55.0).climate.starts_with("warm temperate"));
        assert_eq!(climate_band(15.0, 60.0).climate, "cool temperate");
        assert!(climate_band(2.0, 60.0).climate.starts_with("cold"));
        assert_eq!(climate_band(28.0, 50.0).climate, "moderate");
    }

    #[test]
    fn test_identity_question() {
        let reply = LocalAssistant.reply("Who are you?", &context(20.0, 50.0, "Clear"));
        assert!(reply.contains("FlintWeather"));
    }

    #[test]
    fn test_temperature_question() {
        let reply = LocalAssistant.reply("Is it hot today?", &context(36.0, 40.0, "Clear"));
        assert!(reply.contains("very hot"));
        assert!(reply.contains("Lyon"));
        assert!(reply.contains("Stay hydrated"));
    }

    #[test]
    fn test_rain_question_depends_on_condition() {
        let wet = LocalAssistant.reply("umbrella?", &context(15.0, 90.0, "Light Rain"));
        assert!(wet.starts_with("Yes"));

        let dry = LocalAssistant.reply("umbrella?", &context(15.0, 40.0, "Clear"));
        assert!(dry.starts_with("No rain"));
    }

    #[test]
    fn test_wind_and_uv_questions() {
        let mut ctx = context(22.0, 50.0, "Clear");
        ctx.wind_speed_kmh = 45.0;
        assert!(LocalAssistant.reply("how windy", &ctx).contains("very strong"));

        ctx.uv_index = 9.0;
        assert!(LocalAssistant.reply("need sunscreen?", &ctx).contains("very high"));
    }

    #[test]
    fn test_outdoor_question() {
        let reply = LocalAssistant.reply("good for hiking?", &context(22.0, 50.0, "Clear"));
        assert!(reply.starts_with("Perfect weather"));
    }

    #[test]
    fn test_default_summary_mentions_city() {
        let reply = LocalAssistant.reply("hello", &context(22.0, 50.0, "Clear"));
        assert!(reply.contains("Lyon"));
    }
}
