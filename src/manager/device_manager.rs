// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device manager for coordinating garage door openers.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{RwLock, mpsc};

use crate::error::SetupError;
use crate::event::ConnectionEvent;
use crate::protocol::WebSocketClient;
use crate::state::AttributeUpdate;
use crate::telemetry::{notification_device_id, parse_attribute_update};

use super::api::ApiClient;
use super::device::Device;
use super::entity::{BusCommand, EntityFactory};

/// Registry of set up devices.
///
/// The manager fetches each device's initial state through the
/// [`ApiClient`], creates its entities through the [`EntityFactory`], and
/// then routes push notifications and bus commands to the right [`Device`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use ryobi_gdo_lib::manager::{ApiClient, DeviceManager, EntityFactory};
/// use ryobi_gdo_lib::protocol::{WebSocketClient, WebSocketConfig};
///
/// # async fn example(
/// #     api: Arc<dyn ApiClient>,
/// #     entities: Arc<dyn EntityFactory>,
/// # ) -> ryobi_gdo_lib::Result<()> {
/// let config = WebSocketConfig::builder()
///     .username("user@example.com")
///     .api_key("api-key")
///     .device_id("c4be84986d2e")
///     .build()?;
/// let (client, events) = WebSocketClient::new(config);
/// let client = Arc::new(client);
///
/// let manager = Arc::new(DeviceManager::new(api, entities));
/// manager
///     .setup_device("c4be84986d2e", "Garage", Arc::clone(&client))
///     .await?;
///
/// let runner = Arc::clone(&client);
/// tokio::spawn(async move { runner.run().await });
///
/// let router = Arc::clone(&manager);
/// tokio::spawn(async move { router.process_events(events).await });
/// # Ok(())
/// # }
/// ```
pub struct DeviceManager {
    /// Set up devices, keyed by vendor device id.
    devices: Arc<RwLock<HashMap<String, Arc<Device>>>>,
    api: Arc<dyn ApiClient>,
    entities: Arc<dyn EntityFactory>,
}

impl DeviceManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(api: Arc<dyn ApiClient>, entities: Arc<dyn EntityFactory>) -> Self {
        Self {
            devices: Arc::new(RwLock::new(HashMap::new())),
            api,
            entities,
        }
    }

    // =========================================================================
    // Device Management
    // =========================================================================

    /// Sets up a device and registers it.
    ///
    /// Fetches the initial state, resolves module addressing, creates the
    /// three entities and seeds them from the snapshot. An empty
    /// `device_name` falls back to the name reported by the API, then to the
    /// device id. A device registered under the same id is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::InitialStateUnavailable`] if the API has no state
    /// for the device, [`SetupError::Api`] if addressing cannot be resolved,
    /// and [`SetupError::Entity`] if the bus refuses an entity.
    pub async fn setup_device(
        &self,
        device_id: &str,
        device_name: &str,
        connection: Arc<WebSocketClient>,
    ) -> Result<Arc<Device>, SetupError> {
        tracing::debug!(device_id, "Setting up device");

        let Some(snapshot) = self.api.update_device(device_id).await? else {
            tracing::error!(device_id, "API returned no initial state");
            return Err(SetupError::InitialStateUnavailable {
                device_id: device_id.to_string(),
            });
        };

        let module_id = self.api.get_module(device_id).await?;
        let module_type = self.api.get_module_type(device_id).await?;

        let name = if device_name.is_empty() {
            snapshot
                .device_name
                .clone()
                .unwrap_or_else(|| device_id.to_string())
        } else {
            device_name.to_string()
        };

        let cover = self
            .entities
            .cover(device_id, &name)
            .await
            .map_err(|e| SetupError::Entity(e.to_string()))?;
        let light = self
            .entities
            .light_switch(device_id, &name)
            .await
            .map_err(|e| SetupError::Entity(e.to_string()))?;
        let battery = self
            .entities
            .battery_sensor(device_id, &name)
            .await
            .map_err(|e| SetupError::Entity(e.to_string()))?;

        let device = Arc::new(Device::new(
            device_id.to_string(),
            name,
            module_id,
            module_type,
            connection,
            cover,
            light,
            battery,
        ));

        if let Err(e) = device.apply(&AttributeUpdate::from(&snapshot)).await {
            tracing::warn!(device_id, error = %e, "Failed to seed entities from initial state");
        }

        let replaced = self
            .devices
            .write()
            .await
            .insert(device_id.to_string(), Arc::clone(&device));
        if replaced.is_some() {
            tracing::info!(device_id, "Replaced existing device");
        }

        tracing::info!(
            device_id,
            device_name = %device.device_name(),
            module_id,
            module_type,
            "Device set up"
        );

        Ok(device)
    }

    /// Removes a device from the registry.
    ///
    /// Returns `true` if the device was registered.
    pub async fn remove_device(&self, device_id: &str) -> bool {
        let removed = self.devices.write().await.remove(device_id).is_some();
        if removed {
            tracing::debug!(device_id, "Device removed");
        }
        removed
    }

    /// Returns the ids of all registered devices.
    pub async fn device_ids(&self) -> Vec<String> {
        self.devices.read().await.keys().cloned().collect()
    }

    /// Returns the number of registered devices.
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Returns a registered device.
    pub async fn get_device(&self, device_id: &str) -> Option<Arc<Device>> {
        self.devices.read().await.get(device_id).cloned()
    }

    /// Closes every device's push connection and clears the registry.
    pub async fn shutdown(&self) {
        let devices: Vec<Arc<Device>> = self.devices.write().await.drain().map(|(_, d)| d).collect();

        for device in &devices {
            device.connection().close().await;
        }

        tracing::info!(count = devices.len(), "Device manager shut down");
    }

    // =========================================================================
    // Inbound Routing
    // =========================================================================

    /// Applies one push message to a device.
    ///
    /// Unknown devices are logged and ignored.
    pub async fn handle_device_update(&self, device_id: &str, message: &Value) {
        let Some(device) = self.get_device(device_id).await else {
            tracing::warn!(device_id, "Update for unknown device");
            return;
        };

        let update = parse_attribute_update(message);
        if update.is_empty() {
            tracing::trace!(device_id, "Message carried no known attributes");
            return;
        }

        tracing::debug!(device_id, update = ?update, "Applying attribute update");

        if let Err(e) = device.apply(&update).await {
            tracing::warn!(device_id, error = %e, "Failed to apply attribute update");
        }
    }

    /// Routes one connection event.
    ///
    /// Attribute notifications go to the device named in the notification;
    /// state changes are logged.
    pub async fn handle_event(&self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::StateChanged { state, error } => match error {
                Some(error) => tracing::warn!(state = %state, error = %error, "Push connection changed state"),
                None => tracing::info!(state = %state, "Push connection changed state"),
            },
            ConnectionEvent::DataReceived(payload) => match notification_device_id(payload) {
                Some(device_id) => self.handle_device_update(device_id, payload).await,
                None => tracing::trace!(payload = %payload, "Ignoring non-notification frame"),
            },
        }
    }

    /// Routes every event from a connection until its channel closes.
    pub async fn process_events(&self, mut events: mpsc::UnboundedReceiver<ConnectionEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(&event).await;
        }
        tracing::debug!("Connection event channel closed");
    }

    // =========================================================================
    // Outbound Commands
    // =========================================================================

    /// Turns an automation bus command into a device command.
    ///
    /// Understands `door` with `OPEN` / `CLOSE` and `light` with `ON` /
    /// `OFF` (case-insensitive). Returns whether a command was written to the
    /// push connection.
    pub async fn handle_bus_command(&self, command: &BusCommand) -> bool {
        let Some(device) = self.get_device(&command.device_id).await else {
            tracing::warn!(device_id = %command.device_id, "Command for unknown device");
            return false;
        };

        let payload = command.payload.trim().to_ascii_uppercase();
        match (command.entity.as_str(), payload.as_str()) {
            ("door", "OPEN") => device.open_door().await,
            ("door", "CLOSE") => device.close_door().await,
            ("light", "ON") => device.set_light(true).await,
            ("light", "OFF") => device.set_light(false).await,
            _ => {
                tracing::warn!(
                    device_id = %command.device_id,
                    entity = %command.entity,
                    payload = %command.payload,
                    "Unsupported bus command"
                );
                false
            }
        }
    }

    /// Handles every bus command until the channel closes.
    pub async fn process_bus_commands(&self, mut commands: mpsc::Receiver<BusCommand>) {
        while let Some(command) = commands.recv().await {
            self.handle_bus_command(&command).await;
        }
        tracing::debug!("Bus command channel closed");
    }
}

impl std::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager").finish_non_exhaustive()
    }
}
