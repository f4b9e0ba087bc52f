// Home, hub and status endpoints plus the work-mode control command.

use serde_json::Value;
use tracing::debug;

use crate::client::HomgarClient;
use crate::error::Error;
use crate::models::{HomeRecord, HubRecord, StatusDocument, WorkModeRequest};

/// Parameters for a `controlWorkMode` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkModeCommand {
    /// Hub credentials: `deviceName` and `productKey`.
    pub device_name: String,
    pub product_key: String,
    /// Hub id the target sub-device lives under.
    pub mid: i64,
    /// Sub-device address on the hub.
    pub addr: u8,
    /// Output port (zone number on multi-zone timers).
    pub port: u8,
    pub mode: u8,
    /// Run time in seconds.
    pub duration: u32,
}

impl HomgarClient {
    /// List the homes visible to the account.
    pub async fn list_homes(&self) -> Result<Vec<HomeRecord>, Error> {
        let url = self.api_url("/app/member/appHome/list")?;
        let homes: Option<Vec<HomeRecord>> = self.get(url).await?;
        Ok(homes.unwrap_or_default())
    }

    /// List the hubs (with nested sub-devices) of one home.
    pub async fn list_hubs(&self, hid: i64) -> Result<Vec<HubRecord>, Error> {
        let mut url = self.api_url("/app/device/getDeviceByHid")?;
        url.query_pairs_mut().append_pair("hid", &hid.to_string());
        let hubs: Option<Vec<HubRecord>> = self.get(url).await?;
        Ok(hubs.unwrap_or_default())
    }

    /// Fetch the status document of one hub.
    pub async fn device_status(&self, mid: i64) -> Result<StatusDocument, Error> {
        let mut url = self.api_url("/app/device/getDeviceStatus")?;
        url.query_pairs_mut().append_pair("mid", &mid.to_string());
        let doc: Option<StatusDocument> = self.get(url).await?;
        Ok(doc.unwrap_or_default())
    }

    /// Issue a work-mode command. Each call consumes a fresh sequence number.
    pub async fn control_work_mode(&self, command: &WorkModeCommand) -> Result<Value, Error> {
        let url = self.api_url("/app/device/controlWorkMode")?;
        let body = WorkModeRequest {
            device_name: command.device_name.clone(),
            product_key: command.product_key.clone(),
            mid: command.mid.to_string(),
            addr: command.addr,
            port: command.port,
            mode: command.mode,
            duration: command.duration,
            param: self.next_command_seq().to_string(),
        };
        debug!(
            mid = command.mid,
            addr = command.addr,
            port = command.port,
            mode = command.mode,
            "sending work-mode command"
        );
        self.post(url, &body).await
    }
}
