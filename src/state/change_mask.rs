// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-group change flags.

use std::fmt;

/// A logical group of snapshot fields.
///
/// Change detection reports groups, not raw fields: a change in any member
/// of a group sets that group's bit. This bounds the number of distinct
/// change notifications regardless of how many raw fields exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusGroup {
    /// Controller operating state.
    MachineState,
    /// User-facing mode derived from the state.
    MachineMode,
    /// Heating strategy.
    HeatingStrategy,
    /// Heater energized flag.
    Heating,
    /// Brew in progress flag.
    Brewing,
    /// Brew, steam and group temperatures and setpoints.
    Temperatures,
    /// Brew pressure.
    Pressure,
    /// Power draw.
    Power,
    /// Scale weight.
    ScaleWeight,
    /// Scale flow rate.
    ScaleFlowRate,
    /// Scale connection flag.
    ScaleConnected,
    /// Brew elapsed time.
    BrewTime,
    /// Brew-by-weight target.
    TargetWeight,
    /// Control board, WiFi, MQTT, scale and cloud link flags.
    Connections,
    /// Water reservoir level.
    WaterLevel,
    /// Alarm code and active flag.
    Alarm,
    /// Cleaning counter and reminder.
    Cleaning,
    /// WiFi signal, address and AP mode.
    Wifi,
    /// MQTT integration status.
    Mqtt,
}

impl StatusGroup {
    /// Every group, in wire order.
    pub const ALL: [StatusGroup; 19] = [
        Self::MachineState,
        Self::MachineMode,
        Self::HeatingStrategy,
        Self::Heating,
        Self::Brewing,
        Self::Temperatures,
        Self::Pressure,
        Self::Power,
        Self::ScaleWeight,
        Self::ScaleFlowRate,
        Self::ScaleConnected,
        Self::BrewTime,
        Self::TargetWeight,
        Self::Connections,
        Self::WaterLevel,
        Self::Alarm,
        Self::Cleaning,
        Self::Wifi,
        Self::Mqtt,
    ];

    /// Returns the group's name as used in logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::MachineState => "machine_state",
            Self::MachineMode => "machine_mode",
            Self::HeatingStrategy => "heating_strategy",
            Self::Heating => "heating",
            Self::Brewing => "brewing",
            Self::Temperatures => "temperatures",
            Self::Pressure => "pressure",
            Self::Power => "power",
            Self::ScaleWeight => "scale_weight",
            Self::ScaleFlowRate => "scale_flow_rate",
            Self::ScaleConnected => "scale_connected",
            Self::BrewTime => "brew_time",
            Self::TargetWeight => "target_weight",
            Self::Connections => "connections",
            Self::WaterLevel => "water_level",
            Self::Alarm => "alarm",
            Self::Cleaning => "cleaning",
            Self::Wifi => "wifi",
            Self::Mqtt => "mqtt",
        }
    }

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for StatusGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One flag per [`StatusGroup`].
///
/// # Examples
///
/// ```
/// use brewlink::state::{ChangeMask, StatusGroup};
///
/// let mut mask = ChangeMask::empty();
/// mask.insert(StatusGroup::Pressure);
///
/// assert!(mask.contains(StatusGroup::Pressure));
/// assert!(!mask.contains(StatusGroup::Temperatures));
/// assert_eq!(mask.len(), 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChangeMask(u32);

impl ChangeMask {
    /// A mask with no group set.
    #[must_use]
    pub fn empty() -> Self {
        Self(0)
    }

    /// A mask with every group set.
    #[must_use]
    pub fn all() -> Self {
        StatusGroup::ALL.into_iter().collect()
    }

    /// Sets the flag for a group.
    pub fn insert(&mut self, group: StatusGroup) {
        self.0 |= group.bit();
    }

    /// Sets the flag for a group when `condition` holds.
    pub fn set_if(&mut self, group: StatusGroup, condition: bool) {
        if condition {
            self.insert(group);
        }
    }

    /// Returns `true` if the group's flag is set.
    #[must_use]
    pub fn contains(self, group: StatusGroup) -> bool {
        self.0 & group.bit() != 0
    }

    /// Returns `true` if no flag is set.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every flag is set.
    #[must_use]
    pub fn is_all(self) -> bool {
        self == Self::all()
    }

    /// Returns the number of set flags.
    #[must_use]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates over the set groups in wire order.
    pub fn iter(self) -> impl Iterator<Item = StatusGroup> {
        StatusGroup::ALL
            .into_iter()
            .filter(move |group| self.contains(*group))
    }
}

impl FromIterator<StatusGroup> for ChangeMask {
    fn from_iter<I: IntoIterator<Item = StatusGroup>>(iter: I) -> Self {
        let mut mask = Self::empty();
        for group in iter {
            mask.insert(group);
        }
        mask
    }
}

impl fmt::Display for ChangeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(StatusGroup::name).collect();
        write!(f, "[{}]", names.join(","))
    }
}
