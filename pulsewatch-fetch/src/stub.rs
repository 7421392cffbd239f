//! Offline stand-in for the hosted API.
//!
//! [`StubClient`] answers from canned payloads but bills every answer
//! through the same [`UsageCounter::register`] path as the HTTP client, so
//! quota accounting can be exercised without a network.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::client::{ALL_DEVICES_ROUTE, DEFAULT_TIMEOUT_SECS, PulseApi, USERS_ROUTE};
use crate::error::FetchError;
use crate::meter::UsageCounter;
use crate::schema::strip_query;

/// Canned `/users` payload.
pub fn canned_users() -> Value {
    json!([
        { "userId": 1, "userName": "GrowMaster", "role": "Owner" },
        { "userId": 2, "userName": "Viewer-1", "role": "Viewer" }
    ])
}

/// Canned `/all-devices` payload: three devices, one hub and one
/// hub-attached probe reporting three values.
pub fn canned_all_devices() -> Value {
    json!({
        "deviceViewDtos": [
            {
                "id": 10001,
                "deviceType": 0,
                "name": "Seedling Tent",
                "vpdLeafTempOffsetInF": -2.0,
                "mostRecentDataPoint": {
                    "deviceId": 10001,
                    "temperatureF": 75.2,
                    "humidityRh": 64.5,
                    "vpd": 0.97,
                    "lightLux": 12.4,
                    "airPressure": 100_215.0,
                    "pluggedIn": false,
                    "signalStrength": -55,
                    "createdAt": "2025-07-18T06:55:50"
                }
            },
            {
                "id": 20002,
                "deviceType": 1,
                "name": "Flower Room",
                "vpdLeafTempOffsetInF": 0.0,
                "proLightReadingPreviewDto": { "ppfd": 812.0, "dli": 35.1 },
                "mostRecentDataPoint": {
                    "deviceId": 20002,
                    "temperatureF": 82.4,
                    "humidityRh": 58.1,
                    "vpd": 1.32,
                    "lightLux": 95.7,
                    "airPressure": 98_908.5,
                    "co2": 561,
                    "par": 450,
                    "voc": 0.2,
                    "pluggedIn": true,
                    "signalStrength": -61,
                    "createdAt": "2025-07-18T03:38:47"
                }
            },
            {
                "id": 30003,
                "deviceType": 5,
                "name": "Drying Cabinet",
                "mostRecentDataPoint": {
                    "deviceId": 30003,
                    "temperatureF": 68.0,
                    "humidityRh": 50.0,
                    "vpd": 0.82,
                    "lightLux": 0.0,
                    "airPressure": 100_012.0,
                    "pluggedIn": true,
                    "signalStrength": -48,
                    "createdAt": "2025-07-18T07:10:10"
                }
            }
        ],
        "hubViewDtos": [
            {
                "id": 40004,
                "name": "Veg Room Hub",
                "macAddress": "A4:CF:12:00:40:04",
                "mostRecentDataPoint": {
                    "hubId": 40004,
                    "signalStrength": -52,
                    "createdAt": "2025-07-18T07:00:00"
                }
            }
        ],
        "universalSensorViews": [
            {
                "id": 50005,
                "name": "Reservoir Probe",
                "sensorType": 4,
                "hubId": 40004,
                "mostRecentDataPoint": {
                    "sensorId": 50005,
                    "createdAt": "2025-07-18T07:00:00",
                    "dataPointValues": [
                        { "ParamName": "Water Temperature", "ParamValue": "68.5", "MeasuringUnit": "°F" },
                        { "ParamName": "EC", "ParamValue": "1.8", "MeasuringUnit": "mS/cm" },
                        { "ParamName": "pH", "ParamValue": "6.1", "MeasuringUnit": "" }
                    ]
                }
            }
        ]
    })
}

// ============================================================================
// Stub Client
// ============================================================================

/// Canned-response client.
///
/// Lookups try the full route, then the route without its query string,
/// then `/devices/{id}/recent-data` against the canned devices.
pub struct StubClient {
    usage: Arc<UsageCounter>,
    responses: RwLock<HashMap<String, Value>>,
    failing: RwLock<HashSet<String>>,
}

impl std::fmt::Debug for StubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubClient").finish_non_exhaustive()
    }
}

impl StubClient {
    /// Creates a stub with the canned payloads.
    pub fn new(usage: Arc<UsageCounter>) -> Self {
        let mut responses = HashMap::new();
        responses.insert(USERS_ROUTE.to_string(), canned_users());
        responses.insert(ALL_DEVICES_ROUTE.to_string(), canned_all_devices());

        Self {
            usage,
            responses: RwLock::new(responses),
            failing: RwLock::new(HashSet::new()),
        }
    }

    /// Replaces the payload returned for `route`.
    pub async fn set_response(&self, route: impl Into<String>, payload: Value) {
        self.responses.write().await.insert(route.into(), payload);
    }

    /// Makes every call to `route` time out until [`recover`](Self::recover).
    pub async fn fail_route(&self, route: impl Into<String>) {
        self.failing.write().await.insert(route.into());
    }

    /// Undoes [`fail_route`](Self::fail_route).
    pub async fn recover(&self, route: &str) {
        self.failing.write().await.remove(route);
    }

    async fn lookup(&self, route: &str) -> Result<Value, FetchError> {
        let path = strip_query(route);

        if self.failing.read().await.contains(path) {
            return Err(FetchError::Timeout(DEFAULT_TIMEOUT_SECS));
        }

        let responses = self.responses.read().await;
        if let Some(payload) = responses.get(route).or_else(|| responses.get(path)) {
            return Ok(payload.clone());
        }

        if let Some(id) = path
            .strip_prefix("/devices/")
            .and_then(|rest| rest.strip_suffix("/recent-data"))
        {
            return responses
                .get(ALL_DEVICES_ROUTE)
                .and_then(|all| all.get("deviceViewDtos"))
                .and_then(Value::as_array)
                .and_then(|devices| {
                    devices
                        .iter()
                        .find(|d| d.get("id").is_some_and(|v| id_matches(v, id)))
                })
                .and_then(|d| d.get("mostRecentDataPoint").cloned())
                .ok_or_else(|| FetchError::Status {
                    status: 404,
                    route: route.to_string(),
                });
        }

        Err(FetchError::Status {
            status: 404,
            route: route.to_string(),
        })
    }
}

fn id_matches(value: &Value, id: &str) -> bool {
    match value {
        Value::Number(n) => n.to_string() == id,
        Value::String(s) => s == id,
        _ => false,
    }
}

#[async_trait]
impl PulseApi for StubClient {
    async fn get(&self, route: &str) -> Result<Value, FetchError> {
        match self.lookup(route).await {
            Ok(payload) => {
                self.usage.mark_call(true).await;
                let billed = self.usage.register(route, &payload).await;
                debug!(route, billed, "Stub answered");
                Ok(payload)
            }
            Err(e) => {
                self.usage.mark_call(false).await;
                debug!(route, error = %e, "Stub failed");
                Err(e)
            }
        }
    }

    fn usage(&self) -> &Arc<UsageCounter> {
        &self.usage
    }
}
