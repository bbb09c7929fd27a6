//! Clock and randomness seams, injected so tests can pin them down.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub trait Entropy: Send + Sync {
    fn next_u32(&self) -> u32;

    /// Uniform-ish index in `0..len`; `len` must be non-zero.
    fn pick(&self, len: usize) -> usize {
        self.next_u32() as usize % len
    }

    /// Opaque identifier such as `msg-3f9a0c1d2e4b`.
    fn new_id(&self, prefix: &str) -> String {
        let high = self.next_u32();
        let low = self.next_u32() & 0xffff;
        format!("{prefix}-{high:08x}{low:04x}")
    }
}

/// Operating-system randomness.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEntropy;

impl Entropy for SystemEntropy {
    fn next_u32(&self) -> u32 {
        let mut bytes = [0_u8; 4];
        if getrandom::fill(&mut bytes).is_err() {
            // Clock jitter; callers only need distinct values.
            let nanos = Utc::now().timestamp_subsec_nanos();
            return nanos.rotate_left(13) ^ 0x9e37_79b9;
        }
        u32::from_le_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_helpers::ScriptedEntropy;

    #[test]
    fn pick_stays_in_range() {
        let entropy = SystemEntropy;
        for len in 1..20 {
            assert!(entropy.pick(len) < len);
        }
    }

    #[test]
    fn ids_carry_the_prefix_and_fixed_width() {
        let entropy = ScriptedEntropy::new(&[0xdead_beef, 0x1234_abcd]);
        assert_eq!(entropy.new_id("msg"), "msg-deadbeefabcd");

        let id = SystemEntropy.new_id("chat");
        assert!(id.starts_with("chat-"));
        assert_eq!(id.len(), "chat-".len() + 12);
    }
}
