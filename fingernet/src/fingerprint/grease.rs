//! GREASE (RFC 8701) values.
//!
//! Reserved values that keep TLS implementations tolerant of unknown
//! parameters. Their presence and positions are part of a fingerprint, so
//! the profile model treats them as first-class placeholder slots.

use rand::RngCore;

/// Sentinel placeholder inside a profile. Rewritten to a fresh GREASE value
/// at emission time; every placeholder slot within one ClientHello draws
/// independently.
pub const GREASE_PLACEHOLDER: u16 = 0x0a0a;

/// The sixteen GREASE values: `0x?a?a` with matching nibbles.
pub const GREASE_VALUES: [u16; 16] = [
    0x0a0a, 0x1a1a, 0x2a2a, 0x3a3a, 0x4a4a, 0x5a5a, 0x6a6a, 0x7a7a, 0x8a8a, 0x9a9a, 0xaaaa,
    0xbaba, 0xcaca, 0xdada, 0xeaea, 0xfafa,
];

/// True if `value` follows the GREASE pattern.
pub fn is_grease(value: u16) -> bool {
    value & 0x0f0f == 0x0a0a && (value >> 12) == (value >> 4) & 0x0f
}

/// Per-hello GREASE bookkeeping.
///
/// Each call to [`GreaseAllocator::value`] draws an independent value;
/// [`GreaseAllocator::extension_type`] additionally guarantees distinctness,
/// since duplicate extension types would make the hello invalid.
#[derive(Debug, Default)]
pub struct GreaseAllocator {
    used_extension_types: Vec<u16>,
}

impl GreaseAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An independent GREASE value for a cipher, curve, or version slot.
    pub fn value(&mut self, rng: &mut dyn RngCore) -> u16 {
        GREASE_VALUES[(rng.next_u32() as usize) % GREASE_VALUES.len()]
    }

    /// A GREASE extension type distinct from any previously drawn one.
    pub fn extension_type(&mut self, rng: &mut dyn RngCore) -> u16 {
        let start = (rng.next_u32() as usize) % GREASE_VALUES.len();
        for offset in 0..GREASE_VALUES.len() {
            let candidate = GREASE_VALUES[(start + offset) % GREASE_VALUES.len()];
            if !self.used_extension_types.contains(&candidate) {
                self.used_extension_types.push(candidate);
                return candidate;
            }
        }
        // 16 distinct extension slots exhausted; no real profile gets here.
        GREASE_VALUES[start]
    }
}
