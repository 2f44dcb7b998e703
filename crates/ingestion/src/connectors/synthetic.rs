//! Built-in generator connector
//!
//! Profiles: `user_events`, `sensor_data`, anything else emits `{value}`.
//! Params: `records_per_tick` (default 1), `seed` (fixed RNG seed).

use contracts::{Record, SourceConfig};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use super::RecordShape;

const EVENT_TYPES: &[&str] = &["click", "view", "purchase", "signup"];
const PAGES: &[&str] = &["home", "product", "cart", "checkout"];
const LOCATIONS: &[&str] = &["warehouse_a", "warehouse_b", "office"];

/// Generator profile, picked from the source target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    UserEvents,
    SensorData,
    Generic,
}

impl Profile {
    pub fn from_target(target: &str) -> Self {
        match target {
            "user_events" => Self::UserEvents,
            "sensor_data" => Self::SensorData,
            _ => Self::Generic,
        }
    }
}

#[derive(Debug)]
pub struct SyntheticConnector {
    shape: RecordShape,
    profile: Profile,
    per_tick: usize,
    rng: StdRng,
}

impl SyntheticConnector {
    pub fn new(config: &SourceConfig) -> Self {
        let rng = match config.params.get("seed").and_then(|s| s.parse::<u64>().ok()) {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            shape: RecordShape::new(config),
            profile: Profile::from_target(&config.target),
            per_tick: config.param_or("records_per_tick", 1usize),
            rng,
        }
    }

    pub fn fetch(&mut self) -> Vec<Record> {
        (0..self.per_tick)
            .map(|_| {
                let (key, payload) = self.generate();
                let record = self.shape.record(payload);
                match (record.key(), key) {
                    (None, Some(key)) => record.with_key(key),
                    _ => record,
                }
            })
            .collect()
    }

    fn generate(&mut self) -> (Option<String>, Value) {
        let rng = &mut self.rng;
        match self.profile {
            Profile::UserEvents => {
                let user_id: u32 = rng.random_range(1..=1000);
                let payload = json!({
                    "user_id": user_id,
                    "event_type": pick(rng, EVENT_TYPES),
                    "page": pick(rng, PAGES),
                    "session_id": format!("session_{}", rng.random_range(1..=100u32)),
                    "value": rng.random_range(0.0..100.0),
                });
                (Some(format!("user_{user_id}")), payload)
            }
            Profile::SensorData => {
                let sensor_id = format!("sensor_{}", rng.random_range(1..=10u32));
                let temperature: f64 = rng.random_range(20.0..30.0);
                let payload = json!({
                    "sensor_id": sensor_id,
                    "temperature": temperature,
                    "humidity": rng.random_range(30.0..80.0),
                    "pressure": rng.random_range(1003.0..1023.0),
                    "location": pick(rng, LOCATIONS),
                    "value": temperature,
                });
                (Some(sensor_id), payload)
            }
            Profile::Generic => (None, json!({ "value": rng.random_range(0.0..100.0) })),
        }
    }
}

fn pick(rng: &mut StdRng, options: &[&'static str]) -> &'static str {
    options.choose(rng).copied().unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SourceKind;

    fn connector(profile: &str) -> SyntheticConnector {
        let config = SourceConfig::new("gen", SourceKind::Synthetic, profile)
            .with_param("records_per_tick", "3")
            .with_param("seed", "7");
        SyntheticConnector::new(&config)
    }

    #[test]
    fn test_user_events_shape() {
        let records = connector("user_events").fetch();
        assert_eq!(records.len(), 3);
        for record in &records {
            let payload = record.payload();
            assert!(EVENT_TYPES.contains(&payload["event_type"].as_str().unwrap()));
            let value = payload["value"].as_f64().unwrap();
            assert!((0.0..100.0).contains(&value));
            assert!(record.key().unwrap().starts_with("user_"));
        }
    }

    #[test]
    fn test_sensor_data_value_is_temperature() {
        let records = connector("sensor_data").fetch();
        for record in &records {
            let payload = record.payload();
            assert_eq!(payload["value"], payload["temperature"]);
            assert!(LOCATIONS.contains(&payload["location"].as_str().unwrap()));
        }
    }

    #[test]
    fn test_seed_is_deterministic() {
        let a: Vec<_> = connector("other").fetch().into_iter().map(|r| r.into_payload()).collect();
        let b: Vec<_> = connector("other").fetch().into_iter().map(|r| r.into_payload()).collect();
        assert_eq!(a, b);
    }
}
