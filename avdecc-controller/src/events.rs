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

//! Client-facing notification trait (spec §3.6, §4.D, §4.F, §4.J.1, §4.J.2).
//!
//! Unlike `AdpObserver`/`AcmpSightingObserver`, which are protocol-level
//! callbacks `ControllerObserver` always has to act on, a `ControllerEventObserver`
//! subscribes to whichever entity-lifecycle or resolver-change events it
//! cares about; every method defaults to doing nothing. `Controller` holds
//! the subscriber list and dispatches every notification on the executor
//! that already runs ADP/ACMP/AECP (spec §4), so implementations must not
//! block.

use avdecc_model::channel::ChannelConnections;
use avdecc_model::clock::MediaClockChain;
use avdecc_model::ids::{DescriptorIndex, EntityID};

/// Subscriber for controller-level events. All methods are no-ops by
/// default so an implementation can pick only the events it needs.
pub trait ControllerEventObserver: Send + Sync {
    /// A previously-unseen entity came online (spec §3.6, §4.D).
    fn on_entity_online(&self, entity_id: EntityID) {
        let _ = entity_id;
    }

    /// An entity left the network, or stopped re-advertising (spec §3.6, §4.D).
    fn on_entity_offline(&self, entity_id: EntityID) {
        let _ = entity_id;
    }

    /// An already-known entity re-advertised with a changed `available_index`
    /// and enumeration finished (spec §4.D).
    fn on_entity_updated(&self, entity_id: EntityID) {
        let _ = entity_id;
    }

    /// Enumeration finished for `entity_id`, successfully or not (spec §4.D,
    /// §4.I). `error` carries a description of the failure, if any.
    fn on_entity_enumerated(&self, entity_id: EntityID, error: Option<&str>) {
        let _ = (entity_id, error);
    }

    /// An ACMP `CONNECT_TX_RESPONSE` was sniffed off the wire between two
    /// other entities (spec §4.F).
    fn on_controller_connect_response_sniffed(&self, talker: EntityID, listener: EntityID) {
        let _ = (talker, listener);
    }

    /// An ACMP `DISCONNECT_TX_RESPONSE` was sniffed off the wire between two
    /// other entities (spec §4.F).
    fn on_controller_disconnect_response_sniffed(&self, talker: EntityID, listener: EntityID) {
        let _ = (talker, listener);
    }

    /// An ACMP `GET_RX_STATE_RESPONSE` was sniffed off the wire (spec §4.F).
    fn on_controller_get_listener_stream_state_response_sniffed(&self, talker: EntityID, listener: EntityID) {
        let _ = (talker, listener);
    }

    /// The resolved channel connections for a listener stream (or redundant
    /// pair) changed (spec §4.J.1).
    fn on_channel_input_connection_changed(
        &self,
        listener_entity_id: EntityID,
        listener_stream_index: DescriptorIndex,
        connections: &ChannelConnections,
    ) {
        let _ = (listener_entity_id, listener_stream_index, connections);
    }

    /// The effective audio mappings on a `StreamPortInput` changed (spec
    /// §4.J.1).
    fn on_stream_port_input_audio_mappings_changed(&self, entity_id: EntityID, stream_port_index: DescriptorIndex) {
        let _ = (entity_id, stream_port_index);
    }

    /// The effective audio mappings on a `StreamPortOutput` changed (spec
    /// §4.J.1).
    fn on_stream_port_output_audio_mappings_changed(&self, entity_id: EntityID, stream_port_index: DescriptorIndex) {
        let _ = (entity_id, stream_port_index);
    }

    /// A clock domain's resolved media clock chain changed, on any entity
    /// the chain passes through (spec §4.J.2).
    fn on_media_clock_chain_changed(&self, entity_id: EntityID, clock_domain_index: DescriptorIndex, chain: &MediaClockChain) {
        let _ = (entity_id, clock_domain_index, chain);
    }
}
