// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deterministic machine model.

use std::time::Duration;

use super::SnapshotSource;
use crate::protocol::DeviceInfo;
use crate::state::{DeviceStateSnapshot, MachineState};

/// Heat gained per tick while a boiler is below setpoint.
const HEAT_STEP: f32 = 1.5;
/// Pressure gained per tick while the pump ramps up.
const PRESSURE_STEP: f32 = 1.5;
/// Extraction pressure.
const BREW_PRESSURE: f32 = 9.0;
/// Flow once pressure exceeds the ramp threshold.
const BREW_FLOW_RATE: f32 = 2.0;
/// Pressure at which the scale starts seeing flow.
const FLOW_START_PRESSURE: f32 = 6.0;
/// Brews between cleaning reminders.
const CLEANING_INTERVAL: u16 = 100;

const HEATER_WATTS: u16 = 1400;
const PUMP_WATTS: u16 = 60;
const IDLE_WATTS: u16 = 5;

/// A hardware-free espresso machine.
///
/// Each [`sample`](SnapshotSource::sample) advances the model by one tick:
/// boilers heat toward their setpoints and a running brew ramps pressure,
/// then accumulates weight until the target is reached.
///
/// # Examples
///
/// ```
/// use brewlink::publisher::{SimulatedMachine, SnapshotSource};
/// use brewlink::state::MachineState;
///
/// let mut machine = SimulatedMachine::new();
/// while machine.sample().machine_state != MachineState::Ready {}
///
/// assert!(machine.start_brew(36.0));
/// assert!(machine.sample().is_brewing);
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedMachine {
    state: DeviceStateSnapshot,
    tick: Duration,
    info: DeviceInfo,
}

impl SimulatedMachine {
    /// Default brew setpoint.
    pub const DEFAULT_BREW_SETPOINT: f32 = 93.0;
    /// Default steam setpoint.
    pub const DEFAULT_STEAM_SETPOINT: f32 = 145.0;
    /// Starting boiler temperature.
    pub const AMBIENT_TEMP: f32 = 22.0;

    /// Creates a cold machine with connected links.
    #[must_use]
    pub fn new() -> Self {
        let state = DeviceStateSnapshot {
            machine_state: MachineState::Idle,
            brew_temp: Self::AMBIENT_TEMP,
            brew_setpoint: Self::DEFAULT_BREW_SETPOINT,
            steam_temp: Self::AMBIENT_TEMP,
            steam_setpoint: Self::DEFAULT_STEAM_SETPOINT,
            group_temp: Self::AMBIENT_TEMP,
            power_watts: IDLE_WATTS,
            pico_connected: true,
            wifi_connected: true,
            wifi_ip: "192.168.4.1".to_string(),
            wifi_rssi: -58,
            ..DeviceStateSnapshot::default()
        };

        Self {
            state,
            tick: Duration::from_millis(500),
            info: DeviceInfo::new("SIM-0001")
                .with_name("Simulator")
                .with_machine("Generic", "Dual Boiler")
                .with_machine_type("dual_boiler")
                .with_firmware(env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the simulated time per sample.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Replaces the reported identity.
    #[must_use]
    pub fn with_device_info(mut self, info: DeviceInfo) -> Self {
        self.info = info;
        self
    }

    /// Returns the current state without advancing the model.
    #[must_use]
    pub fn state(&self) -> &DeviceStateSnapshot {
        &self.state
    }

    /// Returns the state for direct manipulation, e.g. to inject alarms.
    pub fn state_mut(&mut self) -> &mut DeviceStateSnapshot {
        &mut self.state
    }

    /// Starts a brew-by-weight shot.
    ///
    /// Returns `false` unless the machine is ready.
    pub fn start_brew(&mut self, target_weight: f32) -> bool {
        if self.state.machine_state != MachineState::Ready {
            return false;
        }
        let s = &mut self.state;
        s.machine_state = MachineState::Brewing;
        s.is_brewing = true;
        s.target_weight = target_weight;
        s.brew_weight = 0.0;
        s.flow_rate = 0.0;
        s.brew_time_ms = 0;
        true
    }

    /// Ends the current brew, if any.
    pub fn stop_brew(&mut self) {
        if !self.state.is_brewing {
            return;
        }
        let s = &mut self.state;
        s.is_brewing = false;
        s.machine_state = MachineState::Ready;
        s.pressure = 0.0;
        s.flow_rate = 0.0;
        s.brew_count = s.brew_count.saturating_add(1);
        s.cleaning_reminder = s.brew_count >= CLEANING_INTERVAL;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn advance(&mut self) {
        let tick_ms = self.tick.as_millis() as u32;
        let tick_secs = self.tick.as_secs_f32();
        let s = &mut self.state;

        let brew_heating = approach(&mut s.brew_temp, s.brew_setpoint, HEAT_STEP);
        let steam_heating = approach(&mut s.steam_temp, s.steam_setpoint, HEAT_STEP);
        approach(&mut s.group_temp, s.brew_temp - 3.0, HEAT_STEP / 2.0);
        s.is_heating = brew_heating || steam_heating;

        if s.is_brewing {
            s.brew_time_ms = s.brew_time_ms.saturating_add(tick_ms);
            s.pressure = (s.pressure + PRESSURE_STEP).min(BREW_PRESSURE);
            if s.pressure >= FLOW_START_PRESSURE {
                s.flow_rate = BREW_FLOW_RATE;
                s.brew_weight += BREW_FLOW_RATE * tick_secs;
            }
            if s.brew_weight >= s.target_weight {
                self.stop_brew();
            }
        } else if matches!(
            s.machine_state,
            MachineState::Idle | MachineState::Heating | MachineState::Ready
        ) {
            s.machine_state = if s.is_heating {
                MachineState::Heating
            } else {
                MachineState::Ready
            };
        }

        let s = &mut self.state;
        let mut watts = if s.is_heating { HEATER_WATTS } else { IDLE_WATTS };
        if s.is_brewing {
            watts += PUMP_WATTS;
        }
        s.power_watts = watts;
    }
}

impl Default for SimulatedMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSource for SimulatedMachine {
    fn sample(&mut self) -> DeviceStateSnapshot {
        self.advance();
        self.state.clone()
    }

    fn device_info(&self) -> DeviceInfo {
        self.info.clone()
    }
}

/// Moves `value` toward `target` by at most `step`; returns `true` if it
/// was still short of the target.
fn approach(value: &mut f32, target: f32, step: f32) -> bool {
    if *value < target {
        *value = (*value + step).min(target);
        true
    } else {
        *value = target;
        false
    }
}
