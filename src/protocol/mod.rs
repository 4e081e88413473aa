// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire messages exchanged between publisher and clients.
//!
//! Every message is a whole JSON object with a `type` discriminator. The
//! synchronization-relevant types are:
//!
//! - `status`: a [`StatusMessage`] carrying changed groups, or all groups on
//!   a full sync
//! - `device_info`: a [`DeviceInfo`] identity snapshot, sent once per
//!   connection
//!
//! Any other type decodes to [`WireMessage::Other`] so consumers can handle
//! it without this crate knowing its layout. Commands travel the other way
//! in the same envelope, built with [`encode`].

mod device_info;
mod message;
mod status;

pub use device_info::DeviceInfo;
pub use message::{DEVICE_INFO, KEEPALIVE, REQUEST_STATE, STATUS, WireMessage, encode};
pub use status::{
    AlarmSection, BoilerTemperature, BrewingSection, CleaningSection, ConnectionsSection,
    MachineSection, MqttSection, PowerSection, ScaleSection, StatusMessage, TankLevel,
    TemperatureSection, WaterSection, WifiSection,
};
