// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point-in-time device state record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating state reported by the machine controller.
///
/// Discriminants match the controller's numeric encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineState {
    /// Controller is initializing.
    #[default]
    Init = 0,
    /// Machine is on but not heating.
    Idle = 1,
    /// Actively heating to setpoint.
    Heating = 2,
    /// At temperature, ready to brew.
    Ready = 3,
    /// Brew in progress.
    Brewing = 4,
    /// Fault condition.
    Fault = 5,
    /// Safe state, all outputs off.
    Safe = 6,
    /// Eco mode with reduced temperature.
    Eco = 7,
}

impl MachineState {
    /// Returns the user-facing mode derived from this state.
    #[must_use]
    pub fn mode(self) -> MachineMode {
        match self {
            Self::Heating | Self::Ready | Self::Brewing => MachineMode::On,
            Self::Eco => MachineMode::Eco,
            Self::Init | Self::Idle | Self::Fault | Self::Safe => MachineMode::Standby,
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Idle => "idle",
            Self::Heating => "heating",
            Self::Ready => "ready",
            Self::Brewing => "brewing",
            Self::Fault => "fault",
            Self::Safe => "safe",
            Self::Eco => "eco",
        };
        f.write_str(s)
    }
}

/// User-facing machine mode, derived from [`MachineState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineMode {
    /// Machine is off or idle.
    #[default]
    Standby,
    /// Machine is heating, ready or brewing.
    On,
    /// Machine is in eco mode.
    Eco,
}

/// Boiler heating strategy.
///
/// Serialized as its numeric code on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum HeatingStrategy {
    /// Heat only the brew boiler.
    BrewOnly,
    /// Heat brew boiler first, then steam.
    #[default]
    Sequential,
    /// Heat both boilers at once.
    Parallel,
    /// Staggered heating within the power budget.
    SmartStagger,
}

impl From<HeatingStrategy> for u8 {
    fn from(strategy: HeatingStrategy) -> Self {
        match strategy {
            HeatingStrategy::BrewOnly => 0,
            HeatingStrategy::Sequential => 1,
            HeatingStrategy::Parallel => 2,
            HeatingStrategy::SmartStagger => 3,
        }
    }
}

impl TryFrom<u8> for HeatingStrategy {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::BrewOnly),
            1 => Ok(Self::Sequential),
            2 => Ok(Self::Parallel),
            3 => Ok(Self::SmartStagger),
            other => Err(format!("unknown heating strategy {other}")),
        }
    }
}

/// State of the controller's MQTT integration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MqttStatus {
    /// MQTT is not configured.
    #[default]
    Disabled,
    /// Connecting to the broker.
    Connecting,
    /// Connected to the broker.
    Connected,
    /// Last connection attempt failed.
    Error,
}

/// Complete point-in-time record of observable device state.
///
/// The publisher owns snapshots; once a snapshot is handed to a
/// [`ChangeDetector`](super::ChangeDetector) it is only read.
///
/// Units: temperatures in °C, pressure in bar, power in W, weights in g,
/// flow rate in ml/s, signal strength in dBm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStateSnapshot {
    /// Controller operating state.
    pub machine_state: MachineState,
    /// Active heating strategy.
    pub heating_strategy: HeatingStrategy,
    /// A heater is currently energized.
    pub is_heating: bool,
    /// A brew is in progress.
    pub is_brewing: bool,

    /// Brew boiler temperature.
    pub brew_temp: f32,
    /// Brew boiler setpoint.
    pub brew_setpoint: f32,
    /// Steam boiler temperature.
    pub steam_temp: f32,
    /// Steam boiler setpoint.
    pub steam_setpoint: f32,
    /// Group head temperature.
    pub group_temp: f32,

    /// Brew pressure.
    pub pressure: f32,
    /// Current power draw.
    pub power_watts: u16,

    /// Weight on the scale.
    pub brew_weight: f32,
    /// Flow rate measured by the scale.
    pub flow_rate: f32,
    /// Target weight for brew-by-weight.
    pub target_weight: f32,
    /// Elapsed time of the current brew.
    pub brew_time_ms: u32,

    /// Link to the control board is up.
    pub pico_connected: bool,
    /// Station WiFi is up.
    pub wifi_connected: bool,
    /// MQTT broker connection is up.
    pub mqtt_connected: bool,
    /// Bluetooth scale is paired and connected.
    pub scale_connected: bool,
    /// Cloud relay connection is up.
    pub cloud_connected: bool,

    /// Water reservoir is low.
    pub water_low: bool,
    /// An alarm is active.
    pub alarm_active: bool,
    /// Code of the active alarm, `0` when none.
    pub alarm_code: u8,

    /// Brews since the last cleaning cycle.
    pub brew_count: u16,
    /// Cleaning is due.
    pub cleaning_reminder: bool,

    /// Station IP address.
    pub wifi_ip: String,
    /// Station signal strength.
    pub wifi_rssi: i32,
    /// Controller is running its own access point.
    pub wifi_ap_mode: bool,

    /// MQTT integration status.
    pub mqtt_status: MqttStatus,
}

impl DeviceStateSnapshot {
    /// Creates an all-default snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the user-facing mode derived from the machine state.
    #[must_use]
    pub fn machine_mode(&self) -> MachineMode {
        self.machine_state.mode()
    }
}
