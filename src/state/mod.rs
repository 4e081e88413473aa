// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state types and change detection.
//!
//! The [`DeviceStateSnapshot`] is the publisher's complete view of the
//! machine. A [`ChangeDetector`] compares successive snapshots and reports
//! which [`StatusGroup`]s changed in a [`ChangeMask`], suppressing sensor
//! jitter on analog readings.
//!
//! # Examples
//!
//! ```
//! use brewlink::state::{ChangeDetector, DeviceStateSnapshot, MachineState, StatusGroup};
//!
//! let mut detector = ChangeDetector::new();
//! let mut snapshot = DeviceStateSnapshot::new();
//! detector.detect(&snapshot);
//!
//! snapshot.machine_state = MachineState::Heating;
//! let detection = detector.detect(&snapshot);
//! assert!(detection.mask.contains(StatusGroup::MachineState));
//! ```

mod change_mask;
mod detector;
mod snapshot;

pub use change_mask::{ChangeMask, StatusGroup};
pub use detector::{
    ChangeDetector, Detection, FLOW_RATE_THRESHOLD, POWER_THRESHOLD_WATTS, PRESSURE_THRESHOLD,
    RSSI_THRESHOLD_DBM, TEMPERATURE_THRESHOLD, WEIGHT_THRESHOLD,
};
pub use snapshot::{DeviceStateSnapshot, HeatingStrategy, MachineMode, MachineState, MqttStatus};
