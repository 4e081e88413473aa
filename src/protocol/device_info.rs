// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identity sent once per connection.

use serde::{Deserialize, Serialize};

/// Body of a `device_info` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Cloud device identifier.
    #[serde(default)]
    pub device_id: String,
    /// User-assigned device name.
    #[serde(default)]
    pub device_name: String,
    /// Machine manufacturer.
    #[serde(default)]
    pub machine_brand: String,
    /// Machine model.
    #[serde(default)]
    pub machine_model: String,
    /// Machine layout, such as `dual_boiler`.
    #[serde(default)]
    pub machine_type: String,
    /// Controller firmware version.
    #[serde(default)]
    pub firmware_version: String,
}

impl DeviceInfo {
    /// Creates device info with the given identifier.
    #[must_use]
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }

    /// Sets the device name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    /// Sets the machine brand and model.
    #[must_use]
    pub fn with_machine(mut self, brand: impl Into<String>, model: impl Into<String>) -> Self {
        self.machine_brand = brand.into();
        self.machine_model = model.into();
        self
    }

    /// Sets the machine layout.
    #[must_use]
    pub fn with_machine_type(mut self, machine_type: impl Into<String>) -> Self {
        self.machine_type = machine_type.into();
        self
    }

    /// Sets the firmware version.
    #[must_use]
    pub fn with_firmware(mut self, version: impl Into<String>) -> Self {
        self.firmware_version = version.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_fields() {
        let info = DeviceInfo::new("BRW-1")
            .with_name("Kitchen")
            .with_machine("ECM", "Synchronika")
            .with_machine_type("dual_boiler")
            .with_firmware("1.4.0");
        let value = serde_json::to_value(&info).unwrap();

        assert_eq!(value["deviceId"], "BRW-1");
        assert_eq!(value["machineModel"], "Synchronika");
        assert_eq!(value["firmwareVersion"], "1.4.0");
    }

    #[test]
    fn missing_fields_default() {
        let info: DeviceInfo = serde_json::from_str(r#"{"deviceId":"x"}"#).unwrap();
        assert_eq!(info, DeviceInfo::new("x"));
    }
}
