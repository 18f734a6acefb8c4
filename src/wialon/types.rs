use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Speed above which a unit counts as moving, km/h
pub const MOVING_SPEED: f64 = 2.0;

/// Session opened by `token/login`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub sid: String,
    pub user_id: i64,
    pub user_name: String,
}

/// Last known position of a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WialonPosition {
    pub latitude: f64,
    pub longitude: f64,
    /// km/h
    pub speed: f64,
    pub course: f64,
    pub altitude: f64,
    pub satellites: i64,
    /// Unix seconds
    pub time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Online,
    Offline,
    Moving,
    Parked,
}

impl UnitStatus {
    pub fn from_position(position: Option<&WialonPosition>) -> Self {
        match position {
            None => UnitStatus::Offline,
            Some(p) if p.speed > MOVING_SPEED => UnitStatus::Moving,
            Some(p) if p.speed > 0.0 => UnitStatus::Online,
            Some(_) => UnitStatus::Parked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WialonSensor {
    pub id: i64,
    pub name: String,
    pub sensor_type: String,
    pub description: String,
    pub measurement: String,
    pub parameter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WialonDriver {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WialonUnit {
    pub id: i64,
    pub name: String,
    pub position: Option<WialonPosition>,
    pub status: UnitStatus,
    pub driver: Option<WialonDriver>,
    pub sensors: Vec<WialonSensor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTemplate {
    pub id: i64,
    pub name: String,
    /// Item type the report runs on, e.g. `avl_unit`
    pub item_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WialonResource {
    pub id: i64,
    pub name: String,
    pub reports: Vec<ReportTemplate>,
}

/// One message from a unit's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitMessage {
    /// Unix seconds
    pub time: i64,
    pub position: Option<WialonPosition>,
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub message: String,
}

// Remote API wire shapes

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub eid: String,
    pub user: LoginUser,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginUser {
    pub id: i64,
    pub nm: String,
}

/// Entry of a `core/update_data_flags` response
#[derive(Debug, Deserialize)]
pub(crate) struct DataFlagsItem {
    #[serde(default)]
    pub d: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPosition {
    pub t: i64,
    pub y: f64,
    pub x: f64,
    #[serde(default)]
    pub s: f64,
    #[serde(default)]
    pub c: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub sc: i64,
}

impl From<RawPosition> for WialonPosition {
    fn from(raw: RawPosition) -> Self {
        Self {
            latitude: raw.y,
            longitude: raw.x,
            speed: raw.s,
            course: raw.c,
            altitude: raw.z,
            satellites: raw.sc,
            time: raw.t,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSensor {
    pub id: i64,
    pub n: String,
    #[serde(default)]
    pub t: String,
    #[serde(default)]
    pub d: String,
    #[serde(default)]
    pub m: String,
    #[serde(default)]
    pub p: String,
}

impl From<RawSensor> for WialonSensor {
    fn from(raw: RawSensor) -> Self {
        Self {
            id: raw.id,
            name: raw.n,
            sensor_type: raw.t,
            description: raw.d,
            measurement: raw.m,
            parameter: raw.p,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUnit {
    pub id: i64,
    pub nm: String,
    #[serde(default)]
    pub pos: Option<RawPosition>,
    #[serde(default)]
    pub sens: Value,
}

impl RawUnit {
    pub fn into_unit(self) -> WialonUnit {
        let position = self.pos.map(WialonPosition::from);
        WialonUnit {
            id: self.id,
            name: self.nm,
            status: UnitStatus::from_position(position.as_ref()),
            position,
            driver: None,
            sensors: collection::<RawSensor>(self.sens)
                .into_iter()
                .map(WialonSensor::from)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDriver {
    pub id: i64,
    pub n: String,
    /// Bound unit id, 0 when unbound
    #[serde(default)]
    pub bu: i64,
    #[serde(default)]
    pub p: Option<String>,
}

impl From<RawDriver> for WialonDriver {
    fn from(raw: RawDriver) -> Self {
        Self {
            id: raw.id,
            name: raw.n,
            phone: raw.p.filter(|p| !p.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawReport {
    pub id: i64,
    pub n: String,
    #[serde(default)]
    pub ct: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawResource {
    pub id: i64,
    pub nm: String,
    #[serde(default)]
    pub rep: Value,
    #[serde(default)]
    pub drvrs: Value,
}

impl RawResource {
    pub fn drivers(&mut self) -> Vec<RawDriver> {
        collection(self.drvrs.take())
    }

    pub fn into_resource(self) -> WialonResource {
        WialonResource {
            id: self.id,
            name: self.nm,
            reports: collection::<RawReport>(self.rep)
                .into_iter()
                .map(|r| ReportTemplate {
                    id: r.id,
                    name: r.n,
                    item_type: r.ct,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMessage {
    pub t: i64,
    #[serde(default)]
    pub pos: Option<RawPosition>,
    #[serde(default)]
    pub p: Map<String, Value>,
}

impl From<RawMessage> for UnitMessage {
    fn from(raw: RawMessage) -> Self {
        Self {
            time: raw.t,
            position: raw.pos.map(WialonPosition::from),
            params: raw.p,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

/// Decode a nested id-keyed object or array, skipping malformed entries.
/// Empty collections arrive as `[]` as often as `{}`.
pub(crate) fn collection<T: DeserializeOwned>(value: Value) -> Vec<T> {
    let items: Vec<Value> = match value {
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        Value::Array(items) => items,
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping malformed Wialon entry: {}", e);
                None
            }
        })
        .collect()
}
