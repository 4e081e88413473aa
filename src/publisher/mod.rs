// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Publisher side of the status stream.
//!
//! A [`SnapshotSource`] produces device snapshots; a [`StatusPublisher`]
//! runs them through a [`ChangeDetector`](crate::state::ChangeDetector) and
//! emits wire messages. [`SimulatedMachine`] is a hardware-free source used
//! for demos and for exercising clients against the real publish contract.

mod simulated;
mod source;
mod status_publisher;

pub use simulated::SimulatedMachine;
pub use source::SnapshotSource;
pub use status_publisher::StatusPublisher;
