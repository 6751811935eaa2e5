//! Room code generation.

use codeshare_core::{Room, RoomRegistry};
use std::sync::Arc;
use uuid::Uuid;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub const ROOM_CODE_LEN: usize = 6;

/// Give up after this many collisions in a row.
const MAX_ATTEMPTS: usize = 32;

/// Bytes at or above this would favour the start of the alphabet.
const SAMPLE_LIMIT: usize = 256 - 256 % ALPHABET.len();

/// Leading bytes of a v4 UUID that carry no version or variant bits.
const RANDOM_PREFIX: usize = 6;

/// Map random bytes onto the alphabet, skipping the ones that would bias it.
fn sample_chars(bytes: &[u8]) -> impl Iterator<Item = char> + '_ {
    bytes
        .iter()
        .map(|b| *b as usize)
        .filter(|b| *b < SAMPLE_LIMIT)
        .map(|b| ALPHABET[b % ALPHABET.len()] as char)
}

/// A random 6-character code over `[a-z0-9]`.
pub fn generate_room_code() -> String {
    let mut code = String::with_capacity(ROOM_CODE_LEN);
    while code.len() < ROOM_CODE_LEN {
        let entropy = Uuid::new_v4();
        let missing = ROOM_CODE_LEN - code.len();
        code.extend(sample_chars(&entropy.as_bytes()[..RANDOM_PREFIX]).take(missing));
    }
    code
}

/// Create a room under a fresh code with `host` as its host.
pub fn create_room(registry: &RoomRegistry, host: &str) -> Option<Arc<Room>> {
    (0..MAX_ATTEMPTS).find_map(|_| registry.try_create(&generate_room_code(), host))
}
