//! Wialon telematics session over the Remote API
//!
//! Every call is a single `GET /wialon/ajax.html?svc=..&params=..&sid=..`.
//! A failed call is reported as-is; a session that expires has to be
//! initialized again by the caller.

mod errors;
mod types;

pub use errors::{error_text, flags};
pub use types::*;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Error;
use crate::fetch::Fetch;
use types::{DataFlagsItem, LoginResponse, MessagesResponse, RawResource, RawUnit};

/// An explicit Wialon session.
///
/// Holds at most one session id; [`initialize`](Self::initialize)
/// replaces it.
pub struct WialonSession {
    base_url: String,
    client: Client,
    session: RwLock<Option<SessionInfo>>,
}

impl WialonSession {
    pub fn new(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            session: RwLock::new(None),
        }
    }

    /// Open a session with an access token
    pub async fn initialize(&self, token: &str) -> Result<SessionInfo, Error> {
        let response = self
            .call("token/login", &json!({ "token": token, "fl": 1 }), None)
            .await?;
        let login: LoginResponse = serde_json::from_value(response)?;
        let info = SessionInfo {
            sid: login.eid,
            user_id: login.user.id,
            user_name: login.user.nm,
        };
        info!("Wialon session opened for {}", info.user_name);
        *self.session.write().await = Some(info.clone());
        Ok(info)
    }

    pub async fn session(&self) -> Option<SessionInfo> {
        self.session.read().await.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Close the session. The local session is dropped even if the
    /// server call fails.
    pub async fn logout(&self) -> Result<(), Error> {
        let Some(info) = self.session.write().await.take() else {
            return Ok(());
        };
        self.call("core/logout", &json!({}), Some(&info.sid))
            .await
            .map(|_| ())
    }

    /// Call any Remote API service within the session
    pub async fn execute(&self, svc: &str, params: Value) -> Result<Value, Error> {
        let sid = self.sid().await?;
        self.call(svc, &params, Some(&sid)).await
    }

    /// Units with their last position, sensors and bound driver
    pub async fn get_units(&self) -> Result<Vec<WialonUnit>, Error> {
        let mut units: Vec<WialonUnit> = self
            .update_data_flags("avl_unit", flags::BASE | flags::UNIT_LAST_POSITION | flags::UNIT_SENSORS)
            .await?
            .into_iter()
            .map(RawUnit::into_unit)
            .collect();

        let mut drivers = HashMap::new();
        for mut resource in self
            .update_data_flags::<RawResource>("avl_resource", flags::BASE | flags::RESOURCE_DRIVERS)
            .await?
        {
            for driver in resource.drivers() {
                if driver.bu != 0 {
                    drivers.insert(driver.bu, WialonDriver::from(driver));
                }
            }
        }
        for unit in &mut units {
            unit.driver = drivers.remove(&unit.id);
        }

        debug!("Loaded {} Wialon units", units.len());
        Ok(units)
    }

    pub async fn get_unit(&self, id: i64) -> Result<Option<WialonUnit>, Error> {
        let flags = flags::BASE | flags::UNIT_LAST_POSITION | flags::UNIT_SENSORS;
        match self.search_item(id, flags).await? {
            Some(item) => Ok(Some(serde_json::from_value::<RawUnit>(item)?.into_unit())),
            None => Ok(None),
        }
    }

    /// Resources with their report templates
    pub async fn get_resources(&self) -> Result<Vec<WialonResource>, Error> {
        Ok(self
            .update_data_flags::<RawResource>("avl_resource", flags::BASE | flags::RESOURCE_REPORTS)
            .await?
            .into_iter()
            .map(RawResource::into_resource)
            .collect())
    }

    /// Messages a unit sent between `from` and `to`
    pub async fn unit_history(
        &self,
        id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<UnitMessage>, Error> {
        let params = json!({
            "itemId": id,
            "timeFrom": from.timestamp(),
            "timeTo": to.timestamp(),
            "flags": flags::MESSAGES_WITH_DATA,
            "flagsMask": flags::MESSAGES_TYPE_MASK,
            "loadCount": u32::MAX,
        });
        let response: MessagesResponse =
            serde_json::from_value(self.execute("messages/load_interval", params).await?)?;
        Ok(response.messages.into_iter().map(UnitMessage::from).collect())
    }

    /// Run a command configured on the unit
    pub async fn execute_command(
        &self,
        unit_id: i64,
        command: &str,
        params: &HashMap<String, String>,
    ) -> Result<CommandResult, Error> {
        if self
            .search_item(unit_id, flags::BASE | flags::UNIT_COMMANDS)
            .await?
            .is_none()
        {
            return Err(Error::session("Unit not found or commands not supported"));
        }

        let param = serde_json::to_string(params)?;
        self.execute(
            "unit/exec_cmd",
            json!({
                "itemId": unit_id,
                "commandName": command,
                "linkType": "",
                "param": param,
                "timeout": 0,
                "flags": 0,
            }),
        )
        .await?;

        info!("Executed '{}' on unit {}", command, unit_id);
        Ok(CommandResult {
            message: "Command executed successfully".to_string(),
        })
    }

    async fn sid(&self) -> Result<String, Error> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|info| info.sid.clone())
            .ok_or_else(|| Error::session("Wialon not initialized"))
    }

    async fn search_item(&self, id: i64, flags: u64) -> Result<Option<Value>, Error> {
        let response = self
            .execute("core/search_item", json!({ "id": id, "flags": flags }))
            .await?;
        Ok(response.get("item").filter(|item| !item.is_null()).cloned())
    }

    async fn update_data_flags<T: serde::de::DeserializeOwned>(
        &self,
        item_type: &str,
        flags: u64,
    ) -> Result<Vec<T>, Error> {
        let params = json!({
            "spec": [{ "type": "type", "data": item_type, "flags": flags, "mode": 0 }]
        });
        let items: Vec<DataFlagsItem> =
            serde_json::from_value(self.execute("core/update_data_flags", params).await?)?;
        // Items without data are ones the session may not read
        items
            .into_iter()
            .filter_map(|item| item.d)
            .map(|data| serde_json::from_value(data).map_err(Error::from))
            .collect()
    }

    async fn call(&self, svc: &str, params: &Value, sid: Option<&str>) -> Result<Value, Error> {
        let url = format!("{}/wialon/ajax.html", self.base_url);
        let mut fetch = Fetch::get(&self.client, &url)
            .query_param("svc", svc)
            .query_param("params", &params.to_string());
        if let Some(sid) = sid {
            fetch = fetch.query_param("sid", sid);
        }

        let response: Value = fetch.execute().await?;
        if let Some(code) = response.get("error").and_then(Value::as_i64) {
            if code != 0 {
                warn!("Wialon {} failed: {} ({})", svc, error_text(code), code);
                return Err(Error::wialon(code));
            }
        }
        Ok(response)
    }
}
