//! Common test utilities for integration tests.
//!
//! Every app built here runs on the in-memory backend with a recording
//! notification sink, so no database or network is needed.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tracing_subscriber::fmt::MakeWriter;

use domain::models::{Coordinates, DeviceState, SafeZone, ZoneMembershipStatus};
use domain::repository::memory::InMemoryStore;
use domain::services::MockNotificationSink;
use fleet_ingest::app::{build_pipeline, create_app, Stores};
use fleet_ingest::config::Config;

pub const WEBHOOK_PATH: &str = "/webhooks/device-messages";
pub const TEAM_ID: &str = "test-team";

pub const ZONE_LAT: f64 = 35.68;
pub const ZONE_LON: f64 = 139.77;

/// Degrees of latitude per metre, close enough for test fixtures.
const DEG_PER_METER: f64 = 1.0 / 111_195.0;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub sink: MockNotificationSink,
}

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    Config::load_for_test(overrides).expect("Failed to load test config")
}

pub fn create_test_app(config: Config) -> TestApp {
    create_test_app_with_sink(config, MockNotificationSink::new())
}

pub fn create_test_app_with_sink(config: Config, sink: MockNotificationSink) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = build_pipeline(&config, Stores::memory(store.clone()), Arc::new(sink.clone()));
    let router = create_app(config, Arc::new(pipeline), None);

    TestApp {
        router,
        store,
        sink,
    }
}

pub fn webhook_request(body: Value) -> Request<Body> {
    raw_webhook_request(&serde_json::to_string(&body).unwrap())
}

pub fn raw_webhook_request(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(WEBHOOK_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn parse_response_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

/// Device clock for the fixtures: 2026-02-03T10:30:00Z plus `second`.
pub fn ts(second: i64) -> i64 {
    Utc.with_ymd_and_hms(2026, 2, 3, 10, 30, 0)
        .unwrap()
        .timestamp_millis()
        + second * 1000
}

pub fn device_messages(messages: Vec<Value>) -> Value {
    json!({"type": "device.messages", "messages": messages})
}

pub fn gnss(device_id: &str, second: i64, lat: f64, lon: f64) -> Value {
    json!({
        "deviceId": device_id,
        "receivedAt": "2026-02-03T10:30:30.000Z",
        "message": {"appId": "GNSS", "ts": ts(second), "data": {"pvt": {"lat": lat, "lon": lon, "acc": 5.0}}}
    })
}

/// GNSS fix `meters` due north of the zone centre.
pub fn gnss_north_of_zone(device_id: &str, second: i64, meters: f64) -> Value {
    gnss(device_id, second, ZONE_LAT + meters * DEG_PER_METER, ZONE_LON)
}

pub fn ground_fix(device_id: &str, second: i64) -> Value {
    json!({
        "deviceId": device_id,
        "receivedAt": "2026-02-03T10:30:30.000Z",
        "message": {"appId": "GROUND_FIX", "ts": ts(second), "data": {"lat": 35.70, "lon": 139.80, "uncertainty": 300.0, "fulfilledWith": "SCELL"}}
    })
}

pub fn temp(device_id: &str, second: i64, value: f64) -> Value {
    json!({
        "deviceId": device_id,
        "receivedAt": "2026-02-03T10:30:30.000Z",
        "message": {"appId": "TEMP", "ts": ts(second), "data": value}
    })
}

pub fn home_zone(device_id: &str) -> SafeZone {
    SafeZone {
        device_id: device_id.to_string(),
        zone_id: "home".to_string(),
        name: Some("Home".to_string()),
        center: Coordinates {
            lat: ZONE_LAT,
            lon: ZONE_LON,
        },
        radius_meters: 100.0,
        enabled: true,
    }
}

/// Seeds a stored state that already places the device inside `home`.
pub async fn seed_inside_home(store: &InMemoryStore, device_id: &str) {
    let mut state = DeviceState::new(device_id, Utc::now());
    let mut status = ZoneMembershipStatus::default();
    status.set("home", true);
    state.safe_zone_status = status;
    state.in_safe_zone = true;
    store.put_state(state).await;
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Installs a thread-local subscriber writing INFO and above into `capture`.
pub fn capture_logs(capture: &LogCapture) -> tracing::subscriber::DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_default(subscriber)
}
