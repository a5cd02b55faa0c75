//! Wire protocol: message catalogue, versioned header and codec
//!
//! Every datagram payload is a fixed four-byte header followed by a
//! `bincode`-encoded [`Packet`] body:
//!
//! ```text
//! [ message type : u8 ][ major : u8 ][ minor : u8 ][ patch : u8 ][ body ... ]
//! ```
//!
//! The header's message type duplicates the enum discriminant so a receiver
//! can dispatch (or drop) before paying for body deserialization, and the
//! semantic-version triple lets mismatched builds be rejected outright:
//! receivers verify version equality and log-and-drop anything else; a
//! version mismatch is a protocol error, never a disconnect.
//!
//! ## Channel policy
//!
//! Lifecycle and combat notifications (`PlayerConnected`,
//! `PlayerDisconnected`, `ObjectCreated`, `ObjectDestroyed`,
//! `BeginAttackResponse`, `DebugGetQuadtreeResponse`) travel on the reliable
//! channel; high-frequency state snapshots and path dumps are unreliable
//! and simply superseded by the next tick's broadcast.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;
use crate::object::{AttackType, ObjectData, ObjectId, ProjectileType};

/// Protocol semantic version; bumped on any wire-visible change
pub const PROTOCOL_VERSION: Version = Version {
    major: 0,
    minor: 9,
    patch: 0,
};

/// Bytes of the fixed header preceding every body
pub const HEADER_LEN: usize = 4;

/// Semantic-version triple carried in every message header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// One-byte message discriminator, the first byte of every datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> server
    ObjectStateUpdate = 0,
    BeginAttackRequest = 1,
    CancelAttack = 2,
    DebugGetQuadtreeRequest = 3,
    DebugGetObjectPathRequest = 4,
    // Server -> client
    PlayerConnected = 5,
    PlayerDisconnected = 6,
    ObjectCreated = 7,
    ObjectDestroyed = 8,
    BeginAttackResponse = 9,
    DebugGetQuadtreeResponse = 10,
    DebugGetObjectPathResponse = 11,
}

impl MessageType {
    fn from_byte(byte: u8) -> Option<MessageType> {
        match byte {
            0 => Some(MessageType::ObjectStateUpdate),
            1 => Some(MessageType::BeginAttackRequest),
            2 => Some(MessageType::CancelAttack),
            3 => Some(MessageType::DebugGetQuadtreeRequest),
            4 => Some(MessageType::DebugGetObjectPathRequest),
            5 => Some(MessageType::PlayerConnected),
            6 => Some(MessageType::PlayerDisconnected),
            7 => Some(MessageType::ObjectCreated),
            8 => Some(MessageType::ObjectDestroyed),
            9 => Some(MessageType::BeginAttackResponse),
            10 => Some(MessageType::DebugGetQuadtreeResponse),
            11 => Some(MessageType::DebugGetObjectPathResponse),
            _ => None,
        }
    }
}

/// Complete message catalogue for client/server communication
///
/// Variant order must match [`MessageType`]; `message_type` keeps the two in
/// lockstep and is checked against the header byte on decode.
///
/// ## Authority model
///
/// The server is authoritative for every object. The one exception is each
/// peer's own player object, whose kinematic state the client reports via
/// `ObjectStateUpdate`; the server verifies the sender owns the reported
/// object and otherwise drops the message without disconnecting the peer.
///
/// ## Loss tolerance
///
/// The unreliable messages are all idempotent or superseded within 25 ms:
/// a lost snapshot is replaced by the next tick's, a lost path dump by the
/// next request. Everything whose loss would desynchronize the client's
/// view of the world (object lifecycle, connection lifecycle, attack
/// acknowledgments, debug quadtree layouts) travels reliably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    // === Client -> server ===
    /// Self-reported kinematic state for the peer's own player object
    ///
    /// Sent unreliably at the client's input rate. The server overwrites
    /// its record wholesale, so the client must always send the complete
    /// object, not a delta. Also reused server -> client as the per-tick
    /// snapshot, one message per live object.
    ///
    /// # Fields
    /// - `object`: the full object record; `object_id` must be the
    ///   sender's own player object
    ObjectStateUpdate { object: ObjectData },

    /// Intent to start an attack
    ///
    /// The server answers with [`Packet::BeginAttackResponse`] and, for
    /// allowed melee attacks, commits a deferred spawn for the hit volume:
    /// the attack object materializes at the facing-specific offset once
    /// the wind-up elapses, and lives for the slash duration after that.
    ///
    /// # Fields
    /// - `attacker_id`: object performing the attack
    /// - `attack_type`: requested delivery mode; only melee is accepted
    /// - `projectile_type`: flavor for projectile attacks, `None` otherwise
    BeginAttackRequest {
        attacker_id: ObjectId,
        attack_type: AttackType,
        projectile_type: ProjectileType,
    },

    /// Aborts attacks still winding up
    ///
    /// Drops every pending spawn parented to the attacker together with
    /// its pre-registered lifetime. Attacks that already materialized are
    /// unaffected and expire on their own.
    CancelAttack { attacker_id: ObjectId },

    /// Asks for the layout of the requesting player's current-map quadtree
    ///
    /// Purely diagnostic; clients draw the returned rectangles over the
    /// world to visualize the server's spatial index.
    DebugGetQuadtreeRequest,

    /// Asks for the server-side path of one object
    ///
    /// # Fields
    /// - `object_id`: any object id; objects without a path yield an empty
    ///   waypoint list rather than an error
    DebugGetObjectPathRequest { object_id: ObjectId },

    // === Server -> client ===
    /// Tells the newly connected peer which object is theirs
    ///
    /// First reliable message a fresh peer receives; everything the client
    /// does afterwards (state reports, attack requests) references this id.
    PlayerConnected { object_id: ObjectId },

    /// Another player's object left the world
    PlayerDisconnected { object_id: ObjectId },

    /// Reliable notification that an object entered the world
    ///
    /// Sent for players on connect and for attack objects when their
    /// wind-up elapses. Carries the full record so clients can render the
    /// object before the first snapshot mentioning it arrives.
    ObjectCreated { object: ObjectData },

    /// Reliable notification that an object left the world
    ///
    /// Clients must drop all state for the id; the server has already
    /// cascaded paths and NPC target entries by the time this is sent.
    ObjectDestroyed { object_id: ObjectId },

    /// Answer to [`Packet::BeginAttackRequest`]
    ///
    /// # Fields
    /// - `allowed`: false when the requested attack type is unsupported;
    ///   no object will spawn in that case
    /// - `charge_secs`: wind-up before the attack object materializes,
    ///   echoed so the client can time its animation
    BeginAttackResponse {
        allowed: bool,
        attack_type: AttackType,
        attacker_id: ObjectId,
        charge_secs: f32,
        projectile_type: ProjectileType,
    },

    /// Every node rectangle of the requested quadtree as (center, size)
    DebugGetQuadtreeResponse { rects: Vec<(Vec3, Vec3)> },

    /// Copy of one object's waypoint queue; empty when it has no path
    DebugGetObjectPathResponse {
        object_id: ObjectId,
        waypoints: Vec<Vec3>,
    },
}

impl Packet {
    pub fn message_type(&self) -> MessageType {
        match self {
            Packet::ObjectStateUpdate { .. } => MessageType::ObjectStateUpdate,
            Packet::BeginAttackRequest { .. } => MessageType::BeginAttackRequest,
            Packet::CancelAttack { .. } => MessageType::CancelAttack,
            Packet::DebugGetQuadtreeRequest => MessageType::DebugGetQuadtreeRequest,
            Packet::DebugGetObjectPathRequest { .. } => MessageType::DebugGetObjectPathRequest,
            Packet::PlayerConnected { .. } => MessageType::PlayerConnected,
            Packet::PlayerDisconnected { .. } => MessageType::PlayerDisconnected,
            Packet::ObjectCreated { .. } => MessageType::ObjectCreated,
            Packet::ObjectDestroyed { .. } => MessageType::ObjectDestroyed,
            Packet::BeginAttackResponse { .. } => MessageType::BeginAttackResponse,
            Packet::DebugGetQuadtreeResponse { .. } => MessageType::DebugGetQuadtreeResponse,
            Packet::DebugGetObjectPathResponse { .. } => MessageType::DebugGetObjectPathResponse,
        }
    }
}

/// Decode-side failures; every variant is a log-and-drop condition
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("datagram shorter than the {HEADER_LEN}-byte header")]
    Truncated,

    #[error("unknown message type byte {0}")]
    UnknownMessageType(u8),

    #[error("version mismatch: got {got}, want {want}")]
    VersionMismatch { got: Version, want: Version },

    #[error("header claims {header:?} but body decoded as {body:?}")]
    TypeMismatch {
        header: MessageType,
        body: MessageType,
    },

    #[error("body failed to decode: {0}")]
    Body(#[from] bincode::Error),
}

/// Serializes a packet with the current protocol version header
pub fn encode(packet: &Packet) -> Result<Vec<u8>, WireError> {
    let body = bincode::serialize(packet)?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.push(packet.message_type() as u8);
    out.push(PROTOCOL_VERSION.major);
    out.push(PROTOCOL_VERSION.minor);
    out.push(PROTOCOL_VERSION.patch);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parses and validates a datagram produced by [`encode`]
///
/// Checks, in order: header length, known message type, exact version
/// equality, body decode, and header/body type agreement.
pub fn decode(data: &[u8]) -> Result<Packet, WireError> {
    if data.len() < HEADER_LEN {
        return Err(WireError::Truncated);
    }

    let header_type =
        MessageType::from_byte(data[0]).ok_or(WireError::UnknownMessageType(data[0]))?;
    let got = Version {
        major: data[1],
        minor: data[2],
        patch: data[3],
    };
    if got != PROTOCOL_VERSION {
        return Err(WireError::VersionMismatch {
            got,
            want: PROTOCOL_VERSION,
        });
    }

    let packet: Packet = bincode::deserialize(&data[HEADER_LEN..])?;
    if packet.message_type() != header_type {
        return Err(WireError::TypeMismatch {
            header: header_type,
            body: packet.message_type(),
        });
    }
    Ok(packet)
}
