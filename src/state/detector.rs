// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Publisher-side change detection.
//!
//! The [`ChangeDetector`] decides which subset of a [`DeviceStateSnapshot`]
//! is worth transmitting. Discrete fields change on strict inequality;
//! noisy analog fields change only when they move at least a fixed
//! threshold away from the last *reported* value.
//!
//! # Examples
//!
//! ```
//! use brewlink::state::{ChangeDetector, DeviceStateSnapshot, StatusGroup};
//!
//! let mut detector = ChangeDetector::new();
//! let mut snapshot = DeviceStateSnapshot::new();
//! snapshot.brew_temp = 93.0;
//!
//! // First call is always a full sync
//! let first = detector.detect(&snapshot);
//! assert!(first.changed && first.mask.is_all());
//!
//! // Jitter below the threshold is suppressed
//! snapshot.brew_temp = 93.3;
//! assert!(!detector.detect(&snapshot).changed);
//!
//! snapshot.brew_temp = 93.6;
//! let detection = detector.detect(&snapshot);
//! assert!(detection.changed);
//! assert!(detection.mask.contains(StatusGroup::Temperatures));
//! ```

use super::{ChangeMask, DeviceStateSnapshot, StatusGroup};

/// Minimum temperature movement reported as a change.
pub const TEMPERATURE_THRESHOLD: f32 = 0.5;
/// Minimum pressure movement reported as a change.
pub const PRESSURE_THRESHOLD: f32 = 0.1;
/// Minimum power draw movement reported as a change.
pub const POWER_THRESHOLD_WATTS: i32 = 10;
/// Minimum weight movement reported as a change.
pub const WEIGHT_THRESHOLD: f32 = 0.5;
/// Minimum flow rate movement reported as a change.
pub const FLOW_RATE_THRESHOLD: f32 = 0.1;
/// Minimum WiFi signal movement reported as a change.
pub const RSSI_THRESHOLD_DBM: i32 = 10;

/// Result of one detection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// At least one group changed.
    pub changed: bool,
    /// Groups that changed.
    pub mask: ChangeMask,
}

/// Compares snapshots against the last accepted one.
///
/// The detector owns its comparison baseline. The first call after
/// construction or [`reset`](Self::reset) reports every group and adopts the
/// snapshot unconditionally. Later calls adopt the snapshot only when
/// something changed, so thresholds always measure distance from the last
/// reported value and slow drift cannot creep past a threshold unreported.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    previous: Option<DeviceStateSnapshot>,
}

impl ChangeDetector {
    /// Creates an uninitialized detector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once a baseline has been adopted.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.previous.is_some()
    }

    /// Returns the current comparison baseline.
    #[must_use]
    pub fn baseline(&self) -> Option<&DeviceStateSnapshot> {
        self.previous.as_ref()
    }

    /// Clears the baseline so the next call reports a full snapshot.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Compares `current` against the baseline.
    pub fn detect(&mut self, current: &DeviceStateSnapshot) -> Detection {
        let Some(previous) = self.previous.as_ref() else {
            self.previous = Some(current.clone());
            tracing::debug!("Change detector initialized, reporting full snapshot");
            return Detection {
                changed: true,
                mask: ChangeMask::all(),
            };
        };

        let mask = compare(previous, current);
        let changed = !mask.is_empty();
        if changed {
            tracing::trace!(groups = %mask, "Snapshot change detected");
            self.previous = Some(current.clone());
        }

        Detection { changed, mask }
    }
}

fn moved(current: f32, previous: f32, threshold: f32) -> bool {
    (current - previous).abs() >= threshold
}

fn compare(prev: &DeviceStateSnapshot, cur: &DeviceStateSnapshot) -> ChangeMask {
    use StatusGroup as G;

    let mut mask = ChangeMask::empty();

    if cur.machine_state != prev.machine_state {
        // mode is derived from state
        mask.insert(G::MachineState);
        mask.insert(G::MachineMode);
    }
    mask.set_if(G::HeatingStrategy, cur.heating_strategy != prev.heating_strategy);
    mask.set_if(G::Heating, cur.is_heating != prev.is_heating);
    mask.set_if(G::Brewing, cur.is_brewing != prev.is_brewing);

    mask.set_if(
        G::Temperatures,
        moved(cur.brew_temp, prev.brew_temp, TEMPERATURE_THRESHOLD)
            || moved(cur.brew_setpoint, prev.brew_setpoint, TEMPERATURE_THRESHOLD)
            || moved(cur.steam_temp, prev.steam_temp, TEMPERATURE_THRESHOLD)
            || moved(cur.steam_setpoint, prev.steam_setpoint, TEMPERATURE_THRESHOLD)
            || moved(cur.group_temp, prev.group_temp, TEMPERATURE_THRESHOLD),
    );
    mask.set_if(
        G::Pressure,
        moved(cur.pressure, prev.pressure, PRESSURE_THRESHOLD),
    );
    mask.set_if(
        G::Power,
        (i32::from(cur.power_watts) - i32::from(prev.power_watts)).abs() >= POWER_THRESHOLD_WATTS,
    );

    mask.set_if(
        G::ScaleWeight,
        moved(cur.brew_weight, prev.brew_weight, WEIGHT_THRESHOLD),
    );
    mask.set_if(
        G::ScaleFlowRate,
        moved(cur.flow_rate, prev.flow_rate, FLOW_RATE_THRESHOLD),
    );
    mask.set_if(G::ScaleConnected, cur.scale_connected != prev.scale_connected);
    mask.set_if(
        G::TargetWeight,
        moved(cur.target_weight, prev.target_weight, WEIGHT_THRESHOLD),
    );

    // Ticks every sample during a brew; consumers need each one.
    mask.set_if(
        G::BrewTime,
        cur.is_brewing && cur.brew_time_ms != prev.brew_time_ms,
    );

    mask.set_if(
        G::Connections,
        cur.pico_connected != prev.pico_connected
            || cur.wifi_connected != prev.wifi_connected
            || cur.mqtt_connected != prev.mqtt_connected
            || cur.scale_connected != prev.scale_connected
            || cur.cloud_connected != prev.cloud_connected,
    );

    mask.set_if(G::WaterLevel, cur.water_low != prev.water_low);
    mask.set_if(
        G::Alarm,
        cur.alarm_active != prev.alarm_active || cur.alarm_code != prev.alarm_code,
    );
    mask.set_if(
        G::Cleaning,
        cur.cleaning_reminder != prev.cleaning_reminder || cur.brew_count != prev.brew_count,
    );
    mask.set_if(
        G::Wifi,
        cur.wifi_ap_mode != prev.wifi_ap_mode
            || cur.wifi_ip != prev.wifi_ip
            || cur.wifi_rssi.abs_diff(prev.wifi_rssi) >= RSSI_THRESHOLD_DBM.unsigned_abs(),
    );
    mask.set_if(G::Mqtt, cur.mqtt_status != prev.mqtt_status);

    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MachineState, MqttStatus};

    fn baseline() -> DeviceStateSnapshot {
        DeviceStateSnapshot {
            machine_state: MachineState::Ready,
            brew_temp: 93.0,
            brew_setpoint: 93.5,
            steam_temp: 140.0,
            steam_setpoint: 145.0,
            group_temp: 88.0,
            pressure: 1.0,
            power_watts: 100,
            wifi_connected: true,
            wifi_ip: "192.168.1.20".to_string(),
            wifi_rssi: -60,
            ..DeviceStateSnapshot::default()
        }
    }

    fn primed() -> ChangeDetector {
        let mut detector = ChangeDetector::new();
        detector.detect(&baseline());
        detector
    }

    #[test]
    fn first_call_reports_full_sync() {
        let mut detector = ChangeDetector::new();
        assert!(!detector.is_initialized());

        let detection = detector.detect(&DeviceStateSnapshot::default());

        assert!(detection.changed);
        assert!(detection.mask.is_all());
        assert!(detector.is_initialized());
    }

    #[test]
    fn identical_snapshot_is_unchanged() {
        let mut detector = primed();
        let detection = detector.detect(&baseline());
        assert!(!detection.changed);
        assert!(detection.mask.is_empty());
    }

    #[test]
    fn temperature_jitter_is_suppressed() {
        let mut detector = primed();

        let mut snapshot = baseline();
        snapshot.brew_temp = 93.3;
        assert!(!detector.detect(&snapshot).changed);

        snapshot.brew_temp = 93.6;
        let detection = detector.detect(&snapshot);
        assert!(detection.changed);
        assert_eq!(
            detection.mask.iter().collect::<Vec<_>>(),
            vec![StatusGroup::Temperatures]
        );
    }

    #[test]
    fn accepted_change_moves_baseline() {
        let mut detector = primed();

        let mut snapshot = baseline();
        snapshot.brew_temp = 93.6;
        assert!(detector.detect(&snapshot).changed);

        // 93.3 is 0.3 from the new baseline, although 0.3 past the original.
        snapshot.brew_temp = 93.3;
        assert!(!detector.detect(&snapshot).changed);
        assert!((detector.baseline().unwrap().brew_temp - 93.6).abs() < f32::EPSILON);
    }

    #[test]
    fn unchanged_run_keeps_baseline() {
        let mut detector = primed();

        // Creep up in sub-threshold steps: each is measured against 93.0.
        let mut snapshot = baseline();
        for temp in [93.1, 93.2, 93.3, 93.4] {
            snapshot.brew_temp = temp;
            assert!(!detector.detect(&snapshot).changed);
        }
        snapshot.brew_temp = 93.5;
        assert!(detector.detect(&snapshot).changed);
    }

    #[test]
    fn any_temperature_sets_the_single_group() {
        let mut detector = primed();
        let mut snapshot = baseline();
        snapshot.group_temp = 90.0;
        snapshot.steam_setpoint = 150.0;

        let detection = detector.detect(&snapshot);
        assert_eq!(detection.mask.len(), 1);
        assert!(detection.mask.contains(StatusGroup::Temperatures));
    }

    #[test]
    fn machine_state_also_flags_mode() {
        let mut detector = primed();
        let mut snapshot = baseline();
        snapshot.machine_state = MachineState::Eco;

        let detection = detector.detect(&snapshot);
        assert!(detection.mask.contains(StatusGroup::MachineState));
        assert!(detection.mask.contains(StatusGroup::MachineMode));
        assert_eq!(detection.mask.len(), 2);
    }

    #[test]
    fn pressure_threshold() {
        let mut detector = primed();
        let mut snapshot = baseline();

        snapshot.pressure = 1.05;
        assert!(!detector.detect(&snapshot).changed);

        snapshot.pressure = 1.2;
        assert!(detector.detect(&snapshot).mask.contains(StatusGroup::Pressure));
    }

    #[test]
    fn power_threshold() {
        let mut detector = primed();
        let mut snapshot = baseline();

        snapshot.power_watts = 109;
        assert!(!detector.detect(&snapshot).changed);

        snapshot.power_watts = 90;
        assert!(detector.detect(&snapshot).mask.contains(StatusGroup::Power));
    }

    #[test]
    fn brew_time_only_counts_while_brewing() {
        let mut detector = primed();
        let mut snapshot = baseline();

        snapshot.brew_time_ms = 1500;
        assert!(!detector.detect(&snapshot).changed);

        snapshot.is_brewing = true;
        let detection = detector.detect(&snapshot);
        assert!(detection.mask.contains(StatusGroup::Brewing));
        assert!(detection.mask.contains(StatusGroup::BrewTime));

        // Every tick is reported, with no threshold.
        snapshot.brew_time_ms = 1501;
        let detection = detector.detect(&snapshot);
        assert_eq!(
            detection.mask.iter().collect::<Vec<_>>(),
            vec![StatusGroup::BrewTime]
        );
    }

    #[test]
    fn connection_flags_share_a_group() {
        let mut detector = primed();
        let mut snapshot = baseline();
        snapshot.cloud_connected = true;
        snapshot.mqtt_connected = true;

        let detection = detector.detect(&snapshot);
        assert_eq!(
            detection.mask.iter().collect::<Vec<_>>(),
            vec![StatusGroup::Connections]
        );
    }

    #[test]
    fn scale_connection_sets_both_groups() {
        let mut detector = primed();
        let mut snapshot = baseline();
        snapshot.scale_connected = true;

        let detection = detector.detect(&snapshot);
        assert!(detection.mask.contains(StatusGroup::ScaleConnected));
        assert!(detection.mask.contains(StatusGroup::Connections));
    }

    #[test]
    fn wifi_signal_threshold() {
        let mut detector = primed();
        let mut snapshot = baseline();

        snapshot.wifi_rssi = -66;
        assert!(!detector.detect(&snapshot).changed);

        snapshot.wifi_rssi = -70;
        assert!(detector.detect(&snapshot).mask.contains(StatusGroup::Wifi));

        snapshot.wifi_ip = "192.168.1.21".to_string();
        assert!(detector.detect(&snapshot).mask.contains(StatusGroup::Wifi));
    }

    #[test]
    fn wifi_signal_extremes_do_not_overflow() {
        let mut detector = ChangeDetector::new();
        let mut snapshot = baseline();
        snapshot.wifi_rssi = i32::MIN;
        detector.detect(&snapshot);

        snapshot.wifi_rssi = i32::MAX;
        let detection = detector.detect(&snapshot);
        assert_eq!(detection.mask.iter().collect::<Vec<_>>(), vec![StatusGroup::Wifi]);

        snapshot.wifi_rssi = i32::MIN;
        assert!(detector.detect(&snapshot).mask.contains(StatusGroup::Wifi));
    }

    #[test]
    fn discrete_fields_change_on_inequality() {
        let mut detector = primed();
        let mut snapshot = baseline();
        snapshot.alarm_code = 3;
        snapshot.brew_count = 1;
        snapshot.water_low = true;
        snapshot.mqtt_status = MqttStatus::Connected;

        let detection = detector.detect(&snapshot);
        assert!(detection.mask.contains(StatusGroup::Alarm));
        assert!(detection.mask.contains(StatusGroup::Cleaning));
        assert!(detection.mask.contains(StatusGroup::WaterLevel));
        assert!(detection.mask.contains(StatusGroup::Mqtt));
    }

    #[test]
    fn reset_forces_full_sync() {
        let mut detector = primed();
        detector.reset();
        assert!(!detector.is_initialized());
        assert!(detector.baseline().is_none());

        let detection = detector.detect(&baseline());
        assert!(detection.changed);
        assert!(detection.mask.is_all());
    }
}
