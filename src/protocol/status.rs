// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unified `status` message.
//!
//! A status message carries only the sections whose [`StatusGroup`] changed,
//! or every section on a full sync. Sections and field names follow the
//! controller's JSON layout (camelCase).

use serde::{Deserialize, Serialize};

use crate::state::{
    ChangeMask, DeviceStateSnapshot, HeatingStrategy, MachineMode, MachineState, MqttStatus,
    StatusGroup,
};

/// Machine section. Each field belongs to its own group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSection {
    /// Operating state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<MachineState>,
    /// Mode derived from the state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<MachineMode>,
    /// Heater energized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_heating: Option<bool>,
    /// Brew in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_brewing: Option<bool>,
    /// Heating strategy code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heating_strategy: Option<HeatingStrategy>,
}

/// A boiler reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoilerTemperature {
    /// Measured temperature.
    pub current: f32,
    /// Target temperature.
    pub setpoint: f32,
}

/// Temperature section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSection {
    /// Brew boiler.
    pub brew: BoilerTemperature,
    /// Steam boiler.
    pub steam: BoilerTemperature,
    /// Group head temperature.
    pub group: f32,
}

/// Power section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerSection {
    /// Current draw in watts.
    pub current: u16,
}

/// Scale section. Each field belongs to its own group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleSection {
    /// Scale link is up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    /// Weight in grams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
    /// Flow rate in ml/s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_rate: Option<f32>,
}

/// Brew progress section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrewingSection {
    /// Elapsed brew time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u32>,
    /// Brew-by-weight target in grams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_weight: Option<f32>,
}

/// Link flags section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionsSection {
    /// Control board.
    pub pico: bool,
    /// Station WiFi.
    pub wifi: bool,
    /// MQTT broker.
    pub mqtt: bool,
    /// Bluetooth scale.
    pub scale: bool,
    /// Cloud relay.
    pub cloud: bool,
}

/// Reservoir level as reported on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TankLevel {
    /// Enough water.
    #[default]
    Ok,
    /// Reservoir needs refilling.
    Low,
}

/// Water section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterSection {
    /// Reservoir level.
    pub tank_level: TankLevel,
}

/// Alarm section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmSection {
    /// An alarm is active.
    pub active: bool,
    /// Active alarm code.
    pub code: u8,
}

/// Cleaning section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningSection {
    /// Brews since the last cleaning.
    pub brew_count: u16,
    /// Cleaning is due.
    pub reminder_due: bool,
}

/// WiFi section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiSection {
    /// Station link is up.
    pub connected: bool,
    /// Access point mode.
    pub ap_mode: bool,
    /// Station address.
    pub ip: String,
    /// Signal strength in dBm.
    pub rssi: i32,
}

/// MQTT section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttSection {
    /// Integration status.
    pub status: MqttStatus,
}

/// Body of a `status` message.
///
/// # Examples
///
/// ```
/// use brewlink::protocol::StatusMessage;
/// use brewlink::state::{ChangeMask, DeviceStateSnapshot, StatusGroup};
///
/// let mut snapshot = DeviceStateSnapshot::new();
/// snapshot.pressure = 9.0;
///
/// let mask: ChangeMask = [StatusGroup::Pressure].into_iter().collect();
/// let message = StatusMessage::from_snapshot(&snapshot, mask);
///
/// assert_eq!(message.pressure, Some(9.0));
/// assert!(message.temps.is_none());
/// assert_eq!(message.groups(), mask);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Machine state, mode and flags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<MachineSection>,
    /// Temperatures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temps: Option<TemperatureSection>,
    /// Brew pressure in bar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f32>,
    /// Power draw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerSection>,
    /// Scale readings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleSection>,
    /// Brew progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brewing: Option<BrewingSection>,
    /// Link flags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<ConnectionsSection>,
    /// Water level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water: Option<WaterSection>,
    /// Alarm state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm: Option<AlarmSection>,
    /// Cleaning counters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaning: Option<CleaningSection>,
    /// WiFi link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi: Option<WifiSection>,
    /// MQTT integration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttSection>,
}

impl StatusMessage {
    /// Builds a message carrying the groups set in `mask`.
    #[must_use]
    pub fn from_snapshot(snapshot: &DeviceStateSnapshot, mask: ChangeMask) -> Self {
        use StatusGroup as G;

        let has = |group| mask.contains(group);
        let mut message = Self::default();

        let machine = MachineSection {
            state: has(G::MachineState).then_some(snapshot.machine_state),
            mode: has(G::MachineMode).then(|| snapshot.machine_mode()),
            is_heating: has(G::Heating).then_some(snapshot.is_heating),
            is_brewing: has(G::Brewing).then_some(snapshot.is_brewing),
            heating_strategy: has(G::HeatingStrategy).then_some(snapshot.heating_strategy),
        };
        if machine != MachineSection::default() {
            message.machine = Some(machine);
        }

        if has(G::Temperatures) {
            message.temps = Some(TemperatureSection {
                brew: BoilerTemperature {
                    current: snapshot.brew_temp,
                    setpoint: snapshot.brew_setpoint,
                },
                steam: BoilerTemperature {
                    current: snapshot.steam_temp,
                    setpoint: snapshot.steam_setpoint,
                },
                group: snapshot.group_temp,
            });
        }
        if has(G::Pressure) {
            message.pressure = Some(snapshot.pressure);
        }
        if has(G::Power) {
            message.power = Some(PowerSection {
                current: snapshot.power_watts,
            });
        }

        let scale = ScaleSection {
            connected: has(G::ScaleConnected).then_some(snapshot.scale_connected),
            weight: has(G::ScaleWeight).then_some(snapshot.brew_weight),
            flow_rate: has(G::ScaleFlowRate).then_some(snapshot.flow_rate),
        };
        if scale != ScaleSection::default() {
            message.scale = Some(scale);
        }

        let brewing = BrewingSection {
            elapsed_ms: has(G::BrewTime).then_some(snapshot.brew_time_ms),
            target_weight: has(G::TargetWeight).then_some(snapshot.target_weight),
        };
        if brewing != BrewingSection::default() {
            message.brewing = Some(brewing);
        }

        if has(G::Connections) {
            message.connections = Some(ConnectionsSection {
                pico: snapshot.pico_connected,
                wifi: snapshot.wifi_connected,
                mqtt: snapshot.mqtt_connected,
                scale: snapshot.scale_connected,
                cloud: snapshot.cloud_connected,
            });
        }
        if has(G::WaterLevel) {
            message.water = Some(WaterSection {
                tank_level: if snapshot.water_low {
                    TankLevel::Low
                } else {
                    TankLevel::Ok
                },
            });
        }
        if has(G::Alarm) {
            message.alarm = Some(AlarmSection {
                active: snapshot.alarm_active,
                code: snapshot.alarm_code,
            });
        }
        if has(G::Cleaning) {
            message.cleaning = Some(CleaningSection {
                brew_count: snapshot.brew_count,
                reminder_due: snapshot.cleaning_reminder,
            });
        }
        if has(G::Wifi) {
            message.wifi = Some(WifiSection {
                connected: snapshot.wifi_connected,
                ap_mode: snapshot.wifi_ap_mode,
                ip: snapshot.wifi_ip.clone(),
                rssi: snapshot.wifi_rssi,
            });
        }
        if has(G::Mqtt) {
            message.mqtt = Some(MqttSection {
                status: snapshot.mqtt_status,
            });
        }

        message
    }

    /// Builds a message carrying every group.
    #[must_use]
    pub fn full(snapshot: &DeviceStateSnapshot) -> Self {
        Self::from_snapshot(snapshot, ChangeMask::all())
    }

    /// Returns the groups this message carries.
    #[must_use]
    pub fn groups(&self) -> ChangeMask {
        use StatusGroup as G;

        let mut mask = ChangeMask::empty();
        if let Some(machine) = &self.machine {
            mask.set_if(G::MachineState, machine.state.is_some());
            mask.set_if(G::MachineMode, machine.mode.is_some());
            mask.set_if(G::Heating, machine.is_heating.is_some());
            mask.set_if(G::Brewing, machine.is_brewing.is_some());
            mask.set_if(G::HeatingStrategy, machine.heating_strategy.is_some());
        }
        mask.set_if(G::Temperatures, self.temps.is_some());
        mask.set_if(G::Pressure, self.pressure.is_some());
        mask.set_if(G::Power, self.power.is_some());
        if let Some(scale) = &self.scale {
            mask.set_if(G::ScaleConnected, scale.connected.is_some());
            mask.set_if(G::ScaleWeight, scale.weight.is_some());
            mask.set_if(G::ScaleFlowRate, scale.flow_rate.is_some());
        }
        if let Some(brewing) = &self.brewing {
            mask.set_if(G::BrewTime, brewing.elapsed_ms.is_some());
            mask.set_if(G::TargetWeight, brewing.target_weight.is_some());
        }
        mask.set_if(G::Connections, self.connections.is_some());
        mask.set_if(G::WaterLevel, self.water.is_some());
        mask.set_if(G::Alarm, self.alarm.is_some());
        mask.set_if(G::Cleaning, self.cleaning.is_some());
        mask.set_if(G::Wifi, self.wifi.is_some());
        mask.set_if(G::Mqtt, self.mqtt.is_some());
        mask
    }

    /// Merges the carried sections into `snapshot`.
    ///
    /// The machine mode is derived from the state and is not stored.
    /// Returns `true` if any field of `snapshot` changed.
    pub fn apply_to(&self, snapshot: &mut DeviceStateSnapshot) -> bool {
        let mut changed = false;

        if let Some(machine) = &self.machine {
            changed |= assign_opt(&mut snapshot.machine_state, machine.state);
            changed |= assign_opt(&mut snapshot.is_heating, machine.is_heating);
            changed |= assign_opt(&mut snapshot.is_brewing, machine.is_brewing);
            changed |= assign_opt(&mut snapshot.heating_strategy, machine.heating_strategy);
        }
        if let Some(temps) = &self.temps {
            changed |= assign(&mut snapshot.brew_temp, temps.brew.current);
            changed |= assign(&mut snapshot.brew_setpoint, temps.brew.setpoint);
            changed |= assign(&mut snapshot.steam_temp, temps.steam.current);
            changed |= assign(&mut snapshot.steam_setpoint, temps.steam.setpoint);
            changed |= assign(&mut snapshot.group_temp, temps.group);
        }
        changed |= assign_opt(&mut snapshot.pressure, self.pressure);
        if let Some(power) = &self.power {
            changed |= assign(&mut snapshot.power_watts, power.current);
        }
        if let Some(scale) = &self.scale {
            changed |= assign_opt(&mut snapshot.scale_connected, scale.connected);
            changed |= assign_opt(&mut snapshot.brew_weight, scale.weight);
            changed |= assign_opt(&mut snapshot.flow_rate, scale.flow_rate);
        }
        if let Some(brewing) = &self.brewing {
            changed |= assign_opt(&mut snapshot.brew_time_ms, brewing.elapsed_ms);
            changed |= assign_opt(&mut snapshot.target_weight, brewing.target_weight);
        }
        if let Some(links) = &self.connections {
            changed |= assign(&mut snapshot.pico_connected, links.pico);
            changed |= assign(&mut snapshot.wifi_connected, links.wifi);
            changed |= assign(&mut snapshot.mqtt_connected, links.mqtt);
            changed |= assign(&mut snapshot.scale_connected, links.scale);
            changed |= assign(&mut snapshot.cloud_connected, links.cloud);
        }
        if let Some(water) = &self.water {
            changed |= assign(&mut snapshot.water_low, water.tank_level == TankLevel::Low);
        }
        if let Some(alarm) = &self.alarm {
            changed |= assign(&mut snapshot.alarm_active, alarm.active);
            changed |= assign(&mut snapshot.alarm_code, alarm.code);
        }
        if let Some(cleaning) = &self.cleaning {
            changed |= assign(&mut snapshot.brew_count, cleaning.brew_count);
            changed |= assign(&mut snapshot.cleaning_reminder, cleaning.reminder_due);
        }
        if let Some(wifi) = &self.wifi {
            changed |= assign(&mut snapshot.wifi_connected, wifi.connected);
            changed |= assign(&mut snapshot.wifi_ap_mode, wifi.ap_mode);
            changed |= assign(&mut snapshot.wifi_ip, wifi.ip.clone());
            changed |= assign(&mut snapshot.wifi_rssi, wifi.rssi);
        }
        if let Some(mqtt) = &self.mqtt {
            changed |= assign(&mut snapshot.mqtt_status, mqtt.status);
        }

        changed
    }
}

fn assign<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

fn assign_opt<T: PartialEq>(slot: &mut T, value: Option<T>) -> bool {
    value.is_some_and(|value| assign(slot, value))
}
