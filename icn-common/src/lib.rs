use serde::{Deserialize, Serialize};

pub mod clock;
pub mod number_set;

pub use clock::{Clock, ManualClock, SystemClock, Ticks, MICROS_PER_TICK};
pub use number_set::NumberSet;

/// Identifier of a transport connection (face) attached to the forwarder
pub type ConnectionId = u32;

/// Maximum number of name components accepted by the parser
pub const MAX_NAME_COMPONENTS: usize = 32;

/// Interest lifetime applied when an Interest carries none (milliseconds)
pub const DEFAULT_INTEREST_LIFETIME_MS: u64 = 4_000;

/// Upper bound on any Interest lifetime (milliseconds)
pub const MAX_INTEREST_LIFETIME_MS: u64 = 60_000;

/// Default Content Store capacity in objects
pub const DEFAULT_CONTENT_STORE_CAPACITY: usize = 65_536;

/// Hop limit stamped on locally generated Interests
pub const DEFAULT_HOP_LIMIT: u8 = 255;

/// Message types understood by the forwarder
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    /// Interest packet requesting content
    Interest = 0x01,
    /// Content object answering an Interest
    ContentObject = 0x02,
    /// Control packet for forwarder management
    Control = 0xa4,
}

impl PacketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketType::Interest => "interest",
            PacketType::ContentObject => "content-object",
            PacketType::Control => "control",
        }
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
