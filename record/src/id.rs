use std::sync::Mutex;

use rand::Rng;

// Crockford's base32 alphabet, excludes I L O U to avoid visual ambiguity.
const ENCODING: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

struct Cursor {
    last_ms: u64,
    counter: u64,
}

static CURSOR: Mutex<Cursor> = Mutex::new(Cursor {
    last_ms: 0,
    counter: 0,
});

/// Generates a lexicographically sortable 26-char id: 48 bits of
/// millisecond timestamp followed by 80 bits that are monotonic within
/// the same millisecond and random across milliseconds, so ids created
/// later in the same process always sort later.
pub fn new_id(now_ms: u64) -> String {
    let entropy = {
        let mut cursor = CURSOR.lock().unwrap();
        if now_ms == cursor.last_ms {
            cursor.counter += 1;
        } else {
            cursor.last_ms = now_ms;
            cursor.counter = rand::rng().random::<u64>() & ((1 << 40) - 1);
        }
        cursor.counter
    };

    encode(now_ms, entropy)
}

fn encode(time_ms: u64, entropy: u64) -> String {
    let mut bytes = [0u8; 16];
    bytes[0] = (time_ms >> 40) as u8;
    bytes[1] = (time_ms >> 32) as u8;
    bytes[2] = (time_ms >> 24) as u8;
    bytes[3] = (time_ms >> 16) as u8;
    bytes[4] = (time_ms >> 8) as u8;
    bytes[5] = time_ms as u8;
    // entropy only ever carries 64 significant bits; the two leading
    // bytes of the 80-bit region stay zero.
    for i in 0..8 {
        bytes[8 + i] = (entropy >> (8 * (7 - i))) as u8;
    }

    let mut out = String::with_capacity(26);
    let mut acc: u128 = 0;
    for b in bytes {
        acc = (acc << 8) | b as u128;
    }
    // 128 bits packed 5 at a time = 26 symbols (130 bits, top 2 are padding zeros)
    for i in (0..26).rev() {
        let shift = i * 5;
        let idx = ((acc >> shift) & 0x1f) as usize;
        out.push(ENCODING[idx] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_26_chars() {
        let id = new_id(1_700_000_000_000);
        assert_eq!(id.len(), 26);
    }

    #[test]
    fn monotonic_within_same_ms() {
        let a = new_id(1_700_000_000_000);
        let b = new_id(1_700_000_000_000);
        assert!(b > a);
    }

    #[test]
    fn monotonic_across_ms() {
        let a = new_id(1_700_000_000_000);
        let b = new_id(1_700_000_000_001);
        assert!(b > a);
    }

    #[test]
    fn no_collisions_in_batch() {
        let mut ids = Vec::new();
        for _ in 0..1000 {
            ids.push(new_id(1_700_000_000_000));
        }
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }
}
