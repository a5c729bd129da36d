// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recording fakes shared by the manager unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{ApiError, Error, Result, SetupError};
use crate::event::ConnectionEvent;
use crate::protocol::{WebSocketClient, WebSocketConfig};
use crate::state::DeviceSnapshot;

use super::api::ApiClient;
use super::entity::{BinarySensorEntity, CoverEntity, EntityFactory, SwitchEntity};

/// One recorded entity call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityCall {
    pub device_id: String,
    pub entity: &'static str,
    pub action: &'static str,
}

impl EntityCall {
    pub fn new(device_id: &str, entity: &'static str, action: &'static str) -> Self {
        Self {
            device_id: device_id.to_string(),
            entity,
            action,
        }
    }
}

type CallLog = Arc<Mutex<Vec<EntityCall>>>;

struct Recorder {
    device_id: String,
    entity: &'static str,
    calls: CallLog,
    fail: bool,
}

impl Recorder {
    fn record(&self, action: &'static str) -> Result<()> {
        if self.fail {
            return Err(Error::Setup(SetupError::Entity(format!(
                "{} {action} refused",
                self.entity
            ))));
        }
        self.calls
            .lock()
            .push(EntityCall::new(&self.device_id, self.entity, action));
        Ok(())
    }
}

#[async_trait]
impl CoverEntity for Recorder {
    async fn open(&self) -> Result<()> {
        self.record("open")
    }

    async fn close(&self) -> Result<()> {
        self.record("close")
    }
}

#[async_trait]
impl SwitchEntity for Recorder {
    async fn on(&self) -> Result<()> {
        self.record("on")
    }

    async fn off(&self) -> Result<()> {
        self.record("off")
    }
}

#[async_trait]
impl BinarySensorEntity for Recorder {
    async fn on(&self) -> Result<()> {
        self.record("on")
    }

    async fn off(&self) -> Result<()> {
        self.record("off")
    }
}

/// Entity factory that records every entity call.
#[derive(Clone, Default)]
pub struct RecordingEntities {
    calls: CallLog,
    fail_cover: bool,
    refuse_creation: bool,
}

impl RecordingEntities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Covers created by this factory fail every call.
    pub fn failing_cover() -> Self {
        Self {
            fail_cover: true,
            ..Self::default()
        }
    }

    /// Entity creation fails.
    pub fn refusing() -> Self {
        Self {
            refuse_creation: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<EntityCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn recorder(&self, device_id: &str, entity: &'static str, fail: bool) -> Recorder {
        Recorder {
            device_id: device_id.to_string(),
            entity,
            calls: Arc::clone(&self.calls),
            fail,
        }
    }

    pub fn cover_entity(&self, device_id: &str) -> Box<dyn CoverEntity> {
        Box::new(self.recorder(device_id, "cover", self.fail_cover))
    }

    pub fn switch_entity(&self, device_id: &str) -> Box<dyn SwitchEntity> {
        Box::new(self.recorder(device_id, "light", false))
    }

    pub fn sensor_entity(&self, device_id: &str) -> Box<dyn BinarySensorEntity> {
        Box::new(self.recorder(device_id, "battery", false))
    }

    fn check_creation(&self) -> Result<()> {
        if self.refuse_creation {
            return Err(Error::Setup(SetupError::Entity("bus unavailable".to_string())));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityFactory for RecordingEntities {
    async fn cover(&self, device_id: &str, _device_name: &str) -> Result<Box<dyn CoverEntity>> {
        self.check_creation()?;
        Ok(self.cover_entity(device_id))
    }

    async fn light_switch(
        &self,
        device_id: &str,
        _device_name: &str,
    ) -> Result<Box<dyn SwitchEntity>> {
        self.check_creation()?;
        Ok(self.switch_entity(device_id))
    }

    async fn battery_sensor(
        &self,
        device_id: &str,
        _device_name: &str,
    ) -> Result<Box<dyn BinarySensorEntity>> {
        self.check_creation()?;
        Ok(self.sensor_entity(device_id))
    }
}

/// API client answering from a fixed table of snapshots.
#[derive(Default)]
pub struct FakeApi {
    snapshots: HashMap<String, DeviceSnapshot>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, device_id: &str, snapshot: DeviceSnapshot) -> Self {
        self.snapshots.insert(device_id.to_string(), snapshot);
        self
    }
}

#[async_trait]
impl ApiClient for FakeApi {
    async fn get_module(&self, device_id: &str) -> std::result::Result<u32, ApiError> {
        if self.snapshots.contains_key(device_id) {
            Ok(7)
        } else {
            Err(ApiError::DeviceNotFound(device_id.to_string()))
        }
    }

    async fn get_module_type(&self, device_id: &str) -> std::result::Result<u32, ApiError> {
        if self.snapshots.contains_key(device_id) {
            Ok(5)
        } else {
            Err(ApiError::DeviceNotFound(device_id.to_string()))
        }
    }

    async fn update_device(
        &self,
        device_id: &str,
    ) -> std::result::Result<Option<DeviceSnapshot>, ApiError> {
        Ok(self.snapshots.get(device_id).cloned())
    }
}

/// A push connection that is never started.
pub fn connection(
    device_id: &str,
) -> (WebSocketClient, mpsc::UnboundedReceiver<ConnectionEvent>) {
    let config = WebSocketConfig::builder()
        .username("user@example.com")
        .api_key("api-key")
        .device_id(device_id)
        .build()
        .expect("valid test config");
    WebSocketClient::new(config)
}
