/*
 *  Copyright (C) 2025 The avdecc-core Authors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU Affero General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU Affero General Public License for more details.
 *
 *  You should have received a copy of the GNU Affero General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Primitive identifiers shared by the frame codec, the entity model and the
//! controller state layer (spec §3.1).

use serde::{Deserialize, Serialize};
use std::fmt;

/// 64-bit globally unique AVDECC entity identifier.
///
/// The all-zero value is the reserved "null/unknown" sentinel used on the
/// wire whenever a field doesn't apply (e.g. `EntityDiscover`'s target when
/// discovering every entity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityID(pub u64);

impl EntityID {
    pub const NULL: EntityID = EntityID(0);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    /// Derives an ephemeral entity ID from a MAC address and a 16-bit
    /// program ID, for locally-advertised entities that don't have a
    /// factory-assigned EntityID (spec §3.1).
    pub fn from_mac_and_program_id(mac: MacAddress, program_id: u16) -> Self {
        let m = mac.0;
        let bytes = [
            m[0],
            m[1],
            m[2],
            m[3],
            m[4],
            m[5],
            (program_id >> 8) as u8,
            program_id as u8,
        ];
        EntityID(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for EntityID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl From<u64> for EntityID {
    fn from(value: u64) -> Self {
        EntityID(value)
    }
}

/// 6-byte Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);
    /// The AVDECC multicast destination address (IEEE 1722.1 §6.3).
    pub const AVDECC_MULTICAST: MacAddress = MacAddress([0x91, 0xe0, 0xf0, 0x01, 0x00, 0x00]);

    pub fn is_multicast(self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(value: [u8; 6]) -> Self {
        MacAddress(value)
    }
}

/// Descriptor kind tags from the AVDECC Entity Model (spec §3.1, §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum DescriptorType {
    Entity = 0x0000,
    Configuration = 0x0001,
    AudioUnit = 0x0002,
    VideoUnit = 0x0003,
    SensorUnit = 0x0004,
    StreamInput = 0x0005,
    StreamOutput = 0x0006,
    JackInput = 0x0007,
    JackOutput = 0x0008,
    AvbInterface = 0x0009,
    ClockSource = 0x000a,
    MemoryObject = 0x000b,
    Locale = 0x000c,
    Strings = 0x000d,
    StreamPortInput = 0x000e,
    StreamPortOutput = 0x000f,
    ExternalPortInput = 0x0010,
    ExternalPortOutput = 0x0011,
    InternalPortInput = 0x0012,
    InternalPortOutput = 0x0013,
    AudioCluster = 0x0014,
    VideoCluster = 0x0015,
    SensorCluster = 0x0016,
    AudioMap = 0x0017,
    VideoMap = 0x0018,
    SensorMap = 0x0019,
    Control = 0x001a,
    SignalSelector = 0x001b,
    Mixer = 0x001c,
    Matrix = 0x001d,
    MatrixSignal = 0x001e,
    SignalSplitter = 0x001f,
    SignalCombiner = 0x0020,
    SignalDemultiplexer = 0x0021,
    SignalMultiplexer = 0x0022,
    SignalTranscoder = 0x0023,
    ClockDomain = 0x0024,
    ControlBlock = 0x0025,
    Timing = 0x0026,
    PtpInstance = 0x0027,
    PtpPort = 0x0028,
}

impl DescriptorType {
    pub fn from_u16(value: u16) -> Option<Self> {
        use DescriptorType::*;
        Some(match value {
            0x0000 => Entity,
            0x0001 => Configuration,
            0x0002 => AudioUnit,
            0x0003 => VideoUnit,
            0x0004 => SensorUnit,
            0x0005 => StreamInput,
            0x0006 => StreamOutput,
            0x0007 => JackInput,
            0x0008 => JackOutput,
            0x0009 => AvbInterface,
            0x000a => ClockSource,
            0x000b => MemoryObject,
            0x000c => Locale,
            0x000d => Strings,
            0x000e => StreamPortInput,
            0x000f => StreamPortOutput,
            0x0010 => ExternalPortInput,
            0x0011 => ExternalPortOutput,
            0x0012 => InternalPortInput,
            0x0013 => InternalPortOutput,
            0x0014 => AudioCluster,
            0x0015 => VideoCluster,
            0x0016 => SensorCluster,
            0x0017 => AudioMap,
            0x0018 => VideoMap,
            0x0019 => SensorMap,
            0x001a => Control,
            0x001b => SignalSelector,
            0x001c => Mixer,
            0x001d => Matrix,
            0x001e => MatrixSignal,
            0x001f => SignalSplitter,
            0x0020 => SignalCombiner,
            0x0021 => SignalDemultiplexer,
            0x0022 => SignalMultiplexer,
            0x0023 => SignalTranscoder,
            0x0024 => ClockDomain,
            0x0025 => ControlBlock,
            0x0026 => Timing,
            0x0027 => PtpInstance,
            0x0028 => PtpPort,
            _ => return None,
        })
    }
}

/// 16-bit index scoped to a `(configuration, descriptor type)` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptorIndex(pub u16);

impl DescriptorIndex {
    pub const INVALID: DescriptorIndex = DescriptorIndex(0xffff);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl From<u16> for DescriptorIndex {
    fn from(value: u16) -> Self {
        DescriptorIndex(value)
    }
}

impl fmt::Display for DescriptorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a single stream endpoint on a remote entity (spec §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamIdentification {
    pub entity_id: EntityID,
    pub stream_index: DescriptorIndex,
}

impl StreamIdentification {
    pub fn new(entity_id: EntityID, stream_index: DescriptorIndex) -> Self {
        Self {
            entity_id,
            stream_index,
        }
    }
}

/// `(clusterIndex, clusterChannel)` pair identifying one audio channel on a
/// cluster (spec §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterIdentification {
    pub cluster_index: DescriptorIndex,
    pub cluster_channel: u16,
}

impl ClusterIdentification {
    pub fn new(cluster_index: DescriptorIndex, cluster_channel: u16) -> Self {
        Self {
            cluster_index,
            cluster_channel,
        }
    }
}

/// A single static or dynamic audio routing entry: stream channel `N` of
/// `stream_index` is routed to cluster channel `clusterChannel` of the
/// cluster at `clusterOffset` (spec §3.1, §3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioMapping {
    pub stream_index: DescriptorIndex,
    pub stream_channel: u16,
    pub cluster_offset: u16,
    pub cluster_channel: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_from_mac_and_program_id() {
        let mac = MacAddress([0x00, 0x1b, 0x92, 0x11, 0x22, 0x33]);
        let id = EntityID::from_mac_and_program_id(mac, 0xabcd);
        assert_eq!(id.0, 0x001b9211_2233_abcdu64);
    }

    #[test]
    fn null_entity_id_is_zero() {
        assert!(EntityID::NULL.is_null());
        assert!(!EntityID(1).is_null());
    }

    #[test]
    fn descriptor_type_round_trips() {
        for v in [0x0000u16, 0x0005, 0x0024, 0x0026, 0x0028] {
            let ty = DescriptorType::from_u16(v).expect("known descriptor type");
            assert_eq!(ty as u16, v);
        }
        assert!(DescriptorType::from_u16(0xbeef).is_none());
    }

    #[test]
    fn descriptor_index_invalid_sentinel() {
        assert!(!DescriptorIndex::INVALID.is_valid());
        assert!(DescriptorIndex(0).is_valid());
    }
}
