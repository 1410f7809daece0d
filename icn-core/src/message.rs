use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use icn_common::{ConnectionId, PacketType, Ticks, DEFAULT_HOP_LIMIT};

use crate::error::{Error, Result};
use crate::name::Name;

/// Identifier of the key that signed a content object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyId(Vec<u8>);

impl KeyId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

/// SHA-256 digest identifying one exact content object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHash([u8; 32]);

impl ObjectHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for byte in bytes {
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}

/// One parsed packet as seen by the forwarder.
///
/// For an Interest, `key_id` and `object_hash` are restrictions on the
/// objects that may satisfy it. For a content object they describe the
/// object itself; the hash is computed on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    packet_type: PacketType,
    name: Option<Name>,
    key_id: Option<KeyId>,
    object_hash: Option<ObjectHash>,
    hop_limit: Option<u8>,
    /// Interest lifetime in milliseconds
    interest_lifetime_ms: Option<u64>,
    /// Absolute tick after which a content object must not be served
    expiry_time: Option<Ticks>,
    /// Absolute tick after which a content object should not be cached
    recommended_cache_time: Option<Ticks>,
    key_id_verified: bool,
    ingress: ConnectionId,
    receive_time: Ticks,
    payload: Vec<u8>,
}

impl Message {
    fn empty(packet_type: PacketType, name: Option<Name>) -> Self {
        Self {
            packet_type,
            name,
            key_id: None,
            object_hash: None,
            hop_limit: None,
            interest_lifetime_ms: None,
            expiry_time: None,
            recommended_cache_time: None,
            key_id_verified: false,
            ingress: 0,
            receive_time: 0,
            payload: Vec::new(),
        }
    }

    /// Interest for `name` with the default hop limit and lifetime
    pub fn interest(name: Name) -> Self {
        let mut message = Self::empty(PacketType::Interest, Some(name));
        message.hop_limit = Some(DEFAULT_HOP_LIMIT);
        message
    }

    /// Content object carrying `payload` under `name`
    pub fn content_object(name: Name, payload: impl Into<Vec<u8>>) -> Self {
        let mut message = Self::empty(PacketType::ContentObject, Some(name));
        message.payload = payload.into();
        message.refresh_object_hash();
        message
    }

    /// Control message carrying an opaque command body
    pub fn control(payload: impl Into<Vec<u8>>) -> Self {
        let mut message = Self::empty(PacketType::Control, None);
        message.payload = payload.into();
        message
    }

    /// Interest restriction, or the signing key of a content object
    pub fn with_key_id(mut self, key_id: KeyId) -> Self {
        self.key_id = Some(key_id);
        self.refresh_object_hash();
        self
    }

    /// Restrict an Interest to one exact object
    pub fn with_object_hash(mut self, hash: ObjectHash) -> Self {
        if self.packet_type == PacketType::Interest {
            self.object_hash = Some(hash);
        }
        self
    }

    pub fn with_hop_limit(mut self, hop_limit: Option<u8>) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    pub fn with_interest_lifetime_ms(mut self, lifetime_ms: u64) -> Self {
        self.interest_lifetime_ms = Some(lifetime_ms);
        self
    }

    pub fn with_expiry_time(mut self, expiry_time: Ticks) -> Self {
        self.expiry_time = Some(expiry_time);
        self
    }

    pub fn with_recommended_cache_time(mut self, rct: Ticks) -> Self {
        self.recommended_cache_time = Some(rct);
        self
    }

    pub fn with_key_id_verified(mut self, verified: bool) -> Self {
        self.key_id_verified = verified;
        self
    }

    /// Stamp the connection and tick a message arrived on
    pub fn received_on(mut self, ingress: ConnectionId, receive_time: Ticks) -> Self {
        self.ingress = ingress;
        self.receive_time = receive_time;
        self
    }

    fn refresh_object_hash(&mut self) {
        if self.packet_type != PacketType::ContentObject {
            return;
        }
        let mut hasher = Sha256::new();
        if let Some(name) = &self.name {
            for component in name.components() {
                hasher.update((component.len() as u32).to_be_bytes());
                hasher.update(component.value());
            }
        }
        if let Some(key_id) = &self.key_id {
            hasher.update(key_id.as_bytes());
        }
        hasher.update(&self.payload);
        self.object_hash = Some(ObjectHash(hasher.finalize().into()));
    }

    /// Reject messages the forwarder cannot index
    pub fn validate(&self) -> Result<()> {
        match self.packet_type {
            PacketType::Interest if self.name.is_none() => Err(Error::Malformed {
                kind: self.packet_type,
                reason: "interest without a name",
            }),
            PacketType::ContentObject if self.name.is_none() => Err(Error::Malformed {
                kind: self.packet_type,
                reason: "content object without a name",
            }),
            PacketType::ContentObject if self.object_hash.is_none() => Err(Error::Malformed {
                kind: self.packet_type,
                reason: "content object without a hash",
            }),
            _ => Ok(()),
        }
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn is_interest(&self) -> bool {
        self.packet_type == PacketType::Interest
    }

    pub fn is_content_object(&self) -> bool {
        self.packet_type == PacketType::ContentObject
    }

    pub fn name(&self) -> Option<&Name> {
        self.name.as_ref()
    }

    pub fn key_id(&self) -> Option<&KeyId> {
        self.key_id.as_ref()
    }

    pub fn object_hash(&self) -> Option<&ObjectHash> {
        self.object_hash.as_ref()
    }

    pub fn hop_limit(&self) -> Option<u8> {
        self.hop_limit
    }

    /// Decrement the hop limit, saturating at zero
    pub fn decrement_hop_limit(&mut self) {
        if let Some(hops) = self.hop_limit.as_mut() {
            *hops = hops.saturating_sub(1);
        }
    }

    pub fn interest_lifetime_ms(&self) -> Option<u64> {
        self.interest_lifetime_ms
    }

    pub fn expiry_time(&self) -> Option<Ticks> {
        self.expiry_time
    }

    pub fn recommended_cache_time(&self) -> Option<Ticks> {
        self.recommended_cache_time
    }

    pub fn has_expired(&self, now: Ticks) -> bool {
        self.expiry_time.is_some_and(|expiry| expiry <= now)
    }

    pub fn past_recommended_cache_time(&self, now: Ticks) -> bool {
        self.recommended_cache_time.is_some_and(|rct| rct <= now)
    }

    pub fn key_id_verified(&self) -> bool {
        self.key_id_verified
    }

    pub fn ingress(&self) -> ConnectionId {
        self.ingress
    }

    pub fn receive_time(&self) -> Ticks {
        self.receive_time
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Approximate encoded size, used for byte accounting
    pub fn wire_length(&self) -> usize {
        let name_len: usize = self
            .name
            .as_ref()
            .map(|name| name.components().iter().map(|c| c.len() + 4).sum())
            .unwrap_or(0);
        8 + name_len + self.key_id.as_ref().map_or(0, |k| k.as_bytes().len() + 4) + self.payload.len()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} {} from {}", self.packet_type, name, self.ingress),
            None => write!(f, "{} from {}", self.packet_type, self.ingress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::parse(uri).unwrap()
    }

    #[test]
    fn test_interest_defaults() {
        let interest = Message::interest(name("/a/b")).received_on(5, 100);
        assert!(interest.is_interest());
        assert_eq!(interest.hop_limit(), Some(DEFAULT_HOP_LIMIT));
        assert_eq!(interest.ingress(), 5);
        assert_eq!(interest.receive_time(), 100);
        assert!(interest.object_hash().is_none());
        assert!(interest.validate().is_ok());
    }

    #[test]
    fn test_object_hash_covers_key_and_payload() {
        let plain = Message::content_object(name("/a/b"), b"hello".to_vec());
        let same = Message::content_object(name("/a/b"), b"hello".to_vec());
        let other_payload = Message::content_object(name("/a/b"), b"world".to_vec());
        let keyed = Message::content_object(name("/a/b"), b"hello".to_vec())
            .with_key_id(KeyId::new(vec![1, 2, 3]));

        assert_eq!(plain.object_hash(), same.object_hash());
        assert_ne!(plain.object_hash(), other_payload.object_hash());
        assert_ne!(plain.object_hash(), keyed.object_hash());
    }

    #[test]
    fn test_object_hash_ignored_on_objects() {
        let hash = ObjectHash::from_bytes([7; 32]);
        let object = Message::content_object(name("/a"), vec![]).with_object_hash(hash);
        assert_ne!(object.object_hash(), Some(&hash));
    }

    #[test]
    fn test_hop_limit_saturates() {
        let mut interest = Message::interest(name("/a")).with_hop_limit(Some(1));
        interest.decrement_hop_limit();
        assert_eq!(interest.hop_limit(), Some(0));
        interest.decrement_hop_limit();
        assert_eq!(interest.hop_limit(), Some(0));
    }

    #[test]
    fn test_expiry_checks() {
        let object = Message::content_object(name("/a"), vec![1])
            .with_expiry_time(50)
            .with_recommended_cache_time(20);
        assert!(!object.has_expired(49));
        assert!(object.has_expired(50));
        assert!(!object.past_recommended_cache_time(19));
        assert!(object.past_recommended_cache_time(20));
    }

    #[test]
    fn test_control_messages_validate() {
        let control = Message::control(b"add route".to_vec());
        assert_eq!(control.packet_type(), PacketType::Control);
        assert!(control.name().is_none());
        assert!(control.validate().is_ok());
    }
}
