// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::protocol::DeviceInfo;
use crate::state::DeviceStateSnapshot;

/// Something that can be sampled for device state.
///
/// Real controllers and [`SimulatedMachine`](super::SimulatedMachine) both
/// implement this, so a [`StatusPublisher`](super::StatusPublisher) treats
/// them identically.
pub trait SnapshotSource {
    /// Samples the current device state.
    ///
    /// Called once per publish tick. Sources that model time advance it
    /// here.
    fn sample(&mut self) -> DeviceStateSnapshot;

    /// Returns the device identity.
    fn device_info(&self) -> DeviceInfo;
}
