//! Identifier and timestamp generation.

use chrono::{SecondsFormat, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

/// Generates an opaque record identifier: epoch milliseconds in base 36
/// followed by a random base-36 component. Collision-resistant enough for a
/// single client; not a cryptographic token.
pub fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u128;
    let random = OsRng.next_u64() as u128;
    format!("{}{}", to_base36(millis), to_base36(random))
}

/// Current UTC time as an ISO-8601 string with millisecond precision,
/// e.g. `2024-01-15T10:30:00.000Z`. Lexicographic order on these strings is
/// chronological order, which the recency ranking relies on.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current epoch time in milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn to_base36(mut value: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = String::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    out.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_encodes_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(36 * 36 + 1), "101");
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate_id()));
        }
    }

    #[test]
    fn iso_timestamps_are_utc_with_millis() {
        let stamp = now_iso();
        assert!(stamp.ends_with('Z'));
        assert!(stamp.contains('T'));
        // 2024-01-15T10:30:00.000Z
        assert_eq!(stamp.len(), 24);
    }

    #[test]
    fn iso_timestamps_sort_chronologically() {
        let earlier = now_iso();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let later = now_iso();
        assert!(earlier < later);
    }
}
