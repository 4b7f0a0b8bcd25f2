//! Chronologically ordered push keys
//!
//! A key is 8 characters of millisecond timestamp followed by 12 random
//! characters, all drawn from a 64-character alphabet whose ASCII order
//! matches its numeric order. Keys generated within the same millisecond
//! increment the random part, so they still sort in creation order.

use rand::Rng;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Stateful push key generator
#[derive(Debug, Default)]
pub struct PushIdGenerator {
    last_push_time: i64,
    last_random: [u8; 12],
}

impl PushIdGenerator {
    /// Create a generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Next key for the current wall-clock time
    pub fn generate(&mut self) -> String {
        self.next_at(chrono::Utc::now().timestamp_millis())
    }

    /// Next key for `now_ms` milliseconds since the epoch
    pub fn next_at(&mut self, now_ms: i64) -> String {
        let duplicate_time = now_ms == self.last_push_time;
        self.last_push_time = now_ms;

        let mut id = String::with_capacity(20);
        let mut timestamp = [0u8; 8];
        let mut remaining = now_ms.max(0);
        for slot in timestamp.iter_mut().rev() {
            *slot = PUSH_CHARS[(remaining % 64) as usize];
            remaining /= 64;
        }
        id.extend(timestamp.iter().map(|&c| c as char));

        if duplicate_time {
            for digit in self.last_random.iter_mut().rev() {
                if *digit == 63 {
                    *digit = 0;
                } else {
                    *digit += 1;
                    break;
                }
            }
        } else {
            let mut rng = rand::thread_rng();
            for digit in self.last_random.iter_mut() {
                *digit = rng.gen_range(0..64);
            }
        }
        id.extend(self.last_random.iter().map(|&d| PUSH_CHARS[d as usize] as char));
        id
    }
}
