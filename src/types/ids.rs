// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identifier types for devices and resources.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// IEEE extended (64-bit) address of a Zigbee node.
///
/// Displayed in the colon separated form used inside unique ids.
///
/// # Examples
///
/// ```
/// use zhabridge_lib::types::ExtAddress;
///
/// let addr = ExtAddress::new(0x0012_4b00_1234_5678);
/// assert_eq!(addr.to_string(), "00:12:4b:00:12:34:56:78");
/// assert_eq!("00:12:4b:00:12:34:56:78".parse::<ExtAddress>().unwrap(), addr);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExtAddress(u64);

impl ExtAddress {
    /// Creates an address from its numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ExtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtAddress(0x{:016x})", self.0)
    }
}

impl fmt::Display for ExtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        for (i, b) in bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for ExtAddress {
    type Err = std::num::ParseIntError;

    /// Parses `0x`-prefixed hex, plain hex or the colon separated form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s
            .trim_start_matches("0x")
            .chars()
            .filter(|c| *c != ':')
            .collect();
        u64::from_str_radix(&hex, 16).map(Self)
    }
}

impl From<u64> for ExtAddress {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Stable unique id of a resource.
///
/// Built from the extended address, the endpoint and an optional cluster:
/// `aa:bb:cc:dd:ee:ff:00:11-01-0402`. An empty unique id marks an
/// unresolvable addressing pattern and is rejected by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UniqueId(String);

impl UniqueId {
    /// Builds the unique id for an address, endpoint and cluster.
    ///
    /// A zero endpoint or cluster is left out.
    ///
    /// # Examples
    ///
    /// ```
    /// use zhabridge_lib::types::{ExtAddress, UniqueId};
    ///
    /// let addr = ExtAddress::new(0x0012_4b00_1234_5678);
    /// assert_eq!(
    ///     UniqueId::generate(addr, 1, 0x0101).as_str(),
    ///     "00:12:4b:00:12:34:56:78-01-0101"
    /// );
    /// assert_eq!(UniqueId::generate(addr, 2, 0).as_str(), "00:12:4b:00:12:34:56:78-02");
    /// ```
    #[must_use]
    pub fn generate(address: ExtAddress, endpoint: u8, cluster: u16) -> Self {
        let id = if cluster != 0 {
            format!("{address}-{endpoint:02x}-{cluster:04x}")
        } else if endpoint != 0 {
            format!("{address}-{endpoint:02x}")
        } else {
            address.to_string()
        };
        Self(id)
    }

    /// Wraps an existing unique id string.
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty (unresolvable) id.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the address part, if it parses.
    #[must_use]
    pub fn address(&self) -> Option<ExtAddress> {
        self.0.split('-').next()?.parse().ok()
    }

    /// Returns the endpoint part, if present.
    #[must_use]
    pub fn endpoint(&self) -> Option<u8> {
        u8::from_str_radix(self.0.split('-').nth(1)?, 16).ok()
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry-assigned id of a resource, used in REST paths and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(u32);

impl ResourceId {
    /// Creates a resource id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// REST container a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// `/sensors`
    Sensors,
    /// `/lights`
    Lights,
    /// `/devices`
    Devices,
}

impl ResourceKind {
    /// Returns the container name used in paths and push messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensors => "sensors",
            Self::Lights => "lights",
            Self::Devices => "devices",
        }
    }

    /// Resolves a DDF `restapi` path such as `/sensors`.
    #[must_use]
    pub fn from_rest_path(path: &str) -> Option<Self> {
        match path.trim_start_matches('/') {
            "sensors" => Some(Self::Sensors),
            "lights" => Some(Self::Lights),
            "devices" => Some(Self::Devices),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ext_address_display_and_parse() {
        let addr = ExtAddress::new(0x0017_8801_0203_0405);
        assert_eq!(addr.to_string(), "00:17:88:01:02:03:04:05");
        assert_eq!("0x0017880102030405".parse::<ExtAddress>().unwrap(), addr);
        assert!("zz".parse::<ExtAddress>().is_err());
    }

    #[test]
    fn ext_address_debug() {
        let addr = ExtAddress::new(1);
        assert_eq!(format!("{addr:?}"), "ExtAddress(0x0000000000000001)");
    }

    #[test]
    fn unique_id_with_cluster() {
        let id = UniqueId::generate(ExtAddress::new(0x0012_4b00_1234_5678), 1, 0x0402);
        assert_eq!(id.as_str(), "00:12:4b:00:12:34:56:78-01-0402");
        assert_eq!(id.endpoint(), Some(1));
        assert_eq!(id.address(), Some(ExtAddress::new(0x0012_4b00_1234_5678)));
    }

    #[test]
    fn unique_id_without_endpoint() {
        let id = UniqueId::generate(ExtAddress::new(0xff), 0, 0);
        assert_eq!(id.as_str(), "00:00:00:00:00:00:00:ff");
        assert_eq!(id.endpoint(), None);
    }

    #[test]
    fn empty_unique_id() {
        assert!(UniqueId::default().is_empty());
        assert!(!UniqueId::from_string("x").is_empty());
    }

    #[test]
    fn resource_kind_paths() {
        assert_eq!(ResourceKind::from_rest_path("/sensors"), Some(ResourceKind::Sensors));
        assert_eq!(ResourceKind::from_rest_path("lights"), Some(ResourceKind::Lights));
        assert_eq!(ResourceKind::from_rest_path("/groups"), None);
        assert_eq!(ResourceKind::Devices.to_string(), "devices");
    }
}
