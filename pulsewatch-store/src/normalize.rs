//! Flattens an `/all-devices` response into a [`PulseSnapshot`].
//!
//! - Devices: latest datapoint merged with a few root fields, plus derived
//!   VPD and dew point.
//! - Hubs: latest datapoint merged with identity fields.
//! - Attached sensors: one record per reported value, keyed
//!   `{sensorId}_{metric slug}`.
//!
//! Nulls and non-finite numbers never make it into a record.

use chrono::{DateTime, Utc};
use pulsewatch_core::metrics::{air_vpd, dew_point_f, leaf_vpd};
use pulsewatch_core::{DeviceType, PulseSnapshot, Record, slugify};
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::error::PollError;

/// Root-level device fields copied into the device record.
pub const DEVICE_ROOT_KEYS: &[&str] = &[
    "name",
    "deviceType",
    "proLightReadingPreviewDto",
    "vpdLeafTempOffsetInF",
];

/// Air temperature key (°F).
pub const TEMPERATURE_KEY: &str = "temperatureF";
/// Relative humidity key (%).
pub const HUMIDITY_KEY: &str = "humidityRh";
/// Leaf minus air temperature key (°F).
pub const LEAF_OFFSET_KEY: &str = "vpdLeafTempOffsetInF";

/// Derived air VPD key.
pub const AIR_VPD_KEY: &str = "avpd_calculated";
/// Derived leaf VPD key.
pub const LEAF_VPD_KEY: &str = "lvpd_calculated";
/// Derived dew point key.
pub const DEW_POINT_KEY: &str = "dpF_calculated";

const DEVICES_KEY: &str = "deviceViewDtos";
const HUBS_KEY: &str = "hubViewDtos";
const SENSORS_KEY: &str = "universalSensorViews";
const LATEST_KEY: &str = "mostRecentDataPoint";

/// Builds a snapshot from a decoded `/all-devices` payload.
///
/// A bare array is read as the device list.
pub fn normalize(payload: &Value, fetched_at: DateTime<Utc>) -> Result<PulseSnapshot, PollError> {
    let (devices, hubs, sensors) = match payload {
        Value::Array(devices) => (devices.as_slice(), &[][..], &[][..]),
        Value::Object(root) => (
            list(root, DEVICES_KEY)?,
            list(root, HUBS_KEY)?,
            list(root, SENSORS_KEY)?,
        ),
        other => {
            return Err(PollError::Normalize(format!(
                "expected an object or array, got {}",
                kind_of(other)
            )));
        }
    };

    let mut snapshot = PulseSnapshot {
        fetched_at,
        ..PulseSnapshot::default()
    };

    for device in devices {
        let Some(id) = id_of(device) else {
            warn!("Skipping device without id");
            continue;
        };
        snapshot.devices.insert(id, device_record(device));
    }

    let mut hub_names = Map::new();
    for hub in hubs {
        let Some(id) = id_of(hub) else {
            warn!("Skipping hub without id");
            continue;
        };
        let record = hub_record(hub, &id);
        if let Some(name) = record.get("name") {
            hub_names.insert(id.clone(), name.clone());
        }
        snapshot.hubs.insert(id, record);
    }

    for sensor in sensors {
        let Some(id) = id_of(sensor) else {
            warn!("Skipping sensor without id");
            continue;
        };
        for (key, record) in sensor_records(sensor, &id, &hub_names) {
            if snapshot.sensors.insert(key.clone(), record).is_some() {
                debug!(sensor_id = %id, key = %key, "Sensor metric key repeated, keeping the later value");
            }
        }
    }

    debug!(
        devices = snapshot.devices.len(),
        hubs = snapshot.hubs.len(),
        sensors = snapshot.sensors.len(),
        "Normalized poll"
    );
    Ok(snapshot)
}

fn list<'a>(root: &'a Map<String, Value>, key: &str) -> Result<&'a [Value], PollError> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(PollError::Normalize(format!(
            "`{key}` should be an array, got {}",
            kind_of(other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Stable string id of an entity. Numbers and non-empty strings qualify.
fn id_of(entity: &Value) -> Option<String> {
    id_value(entity.get("id")?)
}

fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// The latest-datapoint object's fields, if it is an object.
fn latest_fields(entity: &Value) -> Record {
    entity
        .get(LATEST_KEY)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

// ============================================================================
// Devices
// ============================================================================

fn device_record(device: &Value) -> Record {
    let mut record = latest_fields(device);

    for key in DEVICE_ROOT_KEYS {
        match device.get(*key) {
            Some(Value::Object(nested)) => {
                record.extend(nested.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Some(value) => {
                record.insert((*key).to_string(), value.clone());
            }
            None => {}
        }
    }

    add_derived_metrics(&mut record);
    drop_nulls(record)
}

/// Adds VPD and dew point when their inputs are present and numeric.
pub fn add_derived_metrics(record: &mut Record) {
    let number = |key: &str| record.get(key).and_then(Value::as_f64).filter(|v| v.is_finite());

    let (Some(temp_f), Some(rh)) = (number(TEMPERATURE_KEY), number(HUMIDITY_KEY)) else {
        return;
    };
    let offset = number(LEAF_OFFSET_KEY);

    record.insert(AIR_VPD_KEY.to_string(), float(air_vpd(temp_f, rh)));
    record.insert(DEW_POINT_KEY.to_string(), float(dew_point_f(temp_f, rh)));
    if let Some(offset) = offset {
        record.insert(LEAF_VPD_KEY.to_string(), float(leaf_vpd(temp_f, rh, offset)));
    }
}

/// JSON number for finite values, `null` otherwise.
fn float(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn drop_nulls(record: Record) -> Record {
    record.into_iter().filter(|(_, v)| !v.is_null()).collect()
}

// ============================================================================
// Hubs
// ============================================================================

fn hub_record(hub: &Value, id: &str) -> Record {
    let mut record = latest_fields(hub);

    record.insert("id".to_string(), Value::String(id.to_string()));
    if let Some(name) = hub.get("name") {
        record.insert("name".to_string(), name.clone());
    }
    let code = hub
        .get("deviceType")
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| Value::from(DeviceType::Hub.code()));
    record.insert("deviceType".to_string(), code);

    drop_nulls(record)
}

// ============================================================================
// Attached Sensors
// ============================================================================

/// One record per value the sensor reported.
///
/// A sensor reporting nothing still gets a single identity record under its
/// bare id.
fn sensor_records(sensor: &Value, id: &str, hub_names: &Map<String, Value>) -> Vec<(String, Record)> {
    let hub_id = sensor.get("hubId").and_then(id_value);

    let mut identity = Record::new();
    if let Some(hub_id) = &hub_id {
        identity.insert("hubId".to_string(), Value::String(hub_id.clone()));
        if let Some(name) = hub_names.get(hub_id) {
            identity.insert("hubName".to_string(), name.clone());
        }
    }
    identity.insert("sensorId".to_string(), Value::String(id.to_string()));
    if let Some(name) = sensor.get("name") {
        identity.insert("sensorName".to_string(), name.clone());
    }
    if let Some(kind) = sensor.get("sensorType") {
        identity.insert("type".to_string(), kind.clone());
    }
    identity.insert("deviceType".to_string(), Value::from(DeviceType::Sensor.code()));

    let values = sensor
        .get(LATEST_KEY)
        .and_then(|latest| latest.get("dataPointValues"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut records: Vec<(String, Record)> = values
        .iter()
        .filter_map(|entry| {
            let name = field(entry, "ParamName", "paramName").and_then(Value::as_str)?;
            let slug = slugify(name);
            if slug.is_empty() {
                return None;
            }

            let mut record = identity.clone();
            record.insert("valueName".to_string(), Value::String(name.to_string()));
            if let Some(unit) = field(entry, "MeasuringUnit", "measuringUnit") {
                record.insert("measuringUnit".to_string(), unit.clone());
            }
            if let Some(value) = field(entry, "ParamValue", "paramValue") {
                record.insert("value".to_string(), parse_reading(value));
            }
            Some((format!("{id}_{slug}"), drop_nulls(record)))
        })
        .collect();

    if records.is_empty() {
        records.push((id.to_string(), drop_nulls(identity)));
    }
    records
}

fn field<'a>(entry: &'a Value, pascal: &str, camel: &str) -> Option<&'a Value> {
    entry.get(pascal).or_else(|| entry.get(camel)).filter(|v| !v.is_null())
}

/// Sensor values arrive as strings; numeric ones become numbers.
fn parse_reading(value: &Value) -> Value {
    match value {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or_else(|| value.clone(), Value::Number),
        other => other.clone(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pulsewatch_fetch::stub::canned_all_devices;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_canned_payload_is_total() {
        let snapshot = normalize(&canned_all_devices(), now()).unwrap();

        assert_eq!(snapshot.devices.len(), 3);
        assert_eq!(snapshot.hubs.len(), 1);
        assert_eq!(snapshot.sensors.len(), 3);
        assert!(snapshot.sensors.contains_key("50005_water_temperature"));
        assert!(snapshot.sensors.contains_key("50005_ec"));
        assert!(snapshot.sensors.contains_key("50005_ph"));
    }

    #[test]
    fn test_device_record_merges_root_fields() {
        let snapshot = normalize(&canned_all_devices(), now()).unwrap();
        let pro = snapshot.device("20002").unwrap();

        assert_eq!(pro["name"], "Flower Room");
        assert_eq!(pro["deviceType"], 1);
        assert_eq!(pro["ppfd"], 812.0);
        assert_eq!(pro["dli"], 35.1);
        assert!(!pro.contains_key("proLightReadingPreviewDto"));
        assert_eq!(pro["co2"], 561);
    }

    #[test]
    fn test_derived_metrics() {
        let snapshot = normalize(&canned_all_devices(), now()).unwrap();

        let tent = snapshot.device("10001").unwrap();
        assert_eq!(tent[AIR_VPD_KEY], 1.059);
        assert_eq!(tent[LEAF_VPD_KEY], 0.866);
        assert_eq!(tent[DEW_POINT_KEY], 62.39);

        let pro = snapshot.device("20002").unwrap();
        assert_eq!(pro[AIR_VPD_KEY], 1.584);
        assert_eq!(pro[LEAF_VPD_KEY], 1.584);
        assert_eq!(pro[DEW_POINT_KEY], 66.16);

        // No leaf offset on the cabinet.
        let cabinet = snapshot.device("30003").unwrap();
        assert_eq!(cabinet[AIR_VPD_KEY], 1.169);
        assert!(!cabinet.contains_key(LEAF_VPD_KEY));
    }

    #[test]
    fn test_nulls_are_dropped() {
        let payload = json!({
            "deviceViewDtos": [{
                "id": 1,
                "name": "Tent",
                "vpdLeafTempOffsetInF": null,
                "proLightReadingPreviewDto": null,
                "mostRecentDataPoint": { "temperatureF": 70.0, "humidityRh": null, "co2": null }
            }]
        });
        let snapshot = normalize(&payload, now()).unwrap();
        let record = snapshot.device("1").unwrap();

        assert_eq!(record.len(), 2);
        assert_eq!(record["temperatureF"], 70.0);
        assert_eq!(record["name"], "Tent");
        assert!(record.values().all(|v| !v.is_null()));
    }

    #[test]
    fn test_zero_humidity_has_no_dew_point() {
        let payload = json!([{
            "id": 1,
            "mostRecentDataPoint": { "temperatureF": 70.0, "humidityRh": 0.0 }
        }]);
        let snapshot = normalize(&payload, now()).unwrap();
        let record = snapshot.device("1").unwrap();

        assert!(record.contains_key(AIR_VPD_KEY));
        assert!(!record.contains_key(DEW_POINT_KEY));
    }

    #[test]
    fn test_bare_array_and_missing_reading() {
        let payload = json!([{ "id": "abc", "name": "Offline" }, { "id": 2, "mostRecentDataPoint": null }]);
        let snapshot = normalize(&payload, now()).unwrap();

        assert_eq!(snapshot.devices.len(), 2);
        assert_eq!(snapshot.device("abc").unwrap()["name"], "Offline");
        assert!(snapshot.device("2").unwrap().is_empty());
    }

    #[test]
    fn test_hub_record() {
        let snapshot = normalize(&canned_all_devices(), now()).unwrap();
        let hub = snapshot.hub("40004").unwrap();

        assert_eq!(hub["id"], "40004");
        assert_eq!(hub["name"], "Veg Room Hub");
        assert_eq!(hub["deviceType"], 2);
        assert_eq!(hub["signalStrength"], -52);
    }

    #[test]
    fn test_sensor_record_fields() {
        let snapshot = normalize(&canned_all_devices(), now()).unwrap();
        let ec = &snapshot.sensors["50005_ec"];

        assert_eq!(ec["hubId"], "40004");
        assert_eq!(ec["hubName"], "Veg Room Hub");
        assert_eq!(ec["sensorId"], "50005");
        assert_eq!(ec["sensorName"], "Reservoir Probe");
        assert_eq!(ec["type"], 4);
        assert_eq!(ec["deviceType"], 3);
        assert_eq!(ec["valueName"], "EC");
        assert_eq!(ec["measuringUnit"], "mS/cm");
        assert_eq!(ec["value"], 1.8);

        assert_eq!(snapshot.sensors_for_hub("40004").count(), 3);
    }

    #[test]
    fn test_sensor_values_camel_case_and_text() {
        let payload = json!({
            "universalSensorViews": [{
                "id": 7,
                "hubId": 9,
                "mostRecentDataPoint": { "dataPointValues": [
                    { "paramName": "Soil Moisture (VWC)", "paramValue": "41.2" },
                    { "paramName": "Status", "paramValue": "ok" }
                ] }
            }]
        });
        let snapshot = normalize(&payload, now()).unwrap();

        let vwc = &snapshot.sensors["7_soil_moisture_vwc"];
        assert_eq!(vwc["value"], 41.2);
        assert_eq!(vwc["hubId"], "9");
        assert!(!vwc.contains_key("hubName"));
        assert_eq!(snapshot.sensors["7_status"]["value"], "ok");
    }

    #[test]
    fn test_repeated_metric_slug_keeps_later_value() {
        let payload = json!({
            "universalSensorViews": [{
                "id": 7,
                "mostRecentDataPoint": { "dataPointValues": [
                    { "ParamName": "pH", "ParamValue": "6.1" },
                    { "ParamName": "PH", "ParamValue": "6.4" }
                ] }
            }]
        });
        let snapshot = normalize(&payload, now()).unwrap();

        assert_eq!(snapshot.sensors.len(), 1);
        assert_eq!(snapshot.sensors["7_ph"]["valueName"], "PH");
        assert_eq!(snapshot.sensors["7_ph"]["value"], 6.4);
    }

    #[test]
    fn test_sensor_without_values_keeps_identity() {
        let payload = json!({
            "universalSensorViews": [{ "id": 8, "name": "Probe", "hubId": 9, "mostRecentDataPoint": null }]
        });
        let snapshot = normalize(&payload, now()).unwrap();

        assert_eq!(snapshot.sensors.len(), 1);
        assert_eq!(snapshot.sensors["8"]["sensorName"], "Probe");
    }

    #[test]
    fn test_rejects_unusable_shapes() {
        assert!(matches!(normalize(&json!("nope"), now()), Err(PollError::Normalize(_))));
        assert!(matches!(
            normalize(&json!({ "deviceViewDtos": 3 }), now()),
            Err(PollError::Normalize(_))
        ));
    }

    #[test]
    fn test_empty_account() {
        let snapshot = normalize(&json!({}), now()).unwrap();
        assert!(snapshot.is_empty());
    }
}
