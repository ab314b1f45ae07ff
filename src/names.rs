//! Random username generator for bootstrap accounts.

use std::sync::LazyLock;

static ADJECTIVES: &[&str] = &[
    "Amber", "Ashen", "Bold", "Brisk", "Clever", "Dusky", "Early", "Fleet", "Glossy", "Keen",
    "Lively", "Mottled", "Nimble", "Pale", "Quick", "Quiet", "Russet", "Sable", "Sharp", "Silent",
    "Sleek", "Slate", "Sly", "Spry", "Stark", "Swift", "Tawny", "Vivid", "Wary", "Wild",
];

static CORVIDS: &[&str] = &[
    "Chough", "Crow", "Jackdaw", "Jay", "Magpie", "Nutcracker", "Raven", "Rook", "Treepie",
];

static RNG: LazyLock<std::sync::Mutex<SimpleRng>> = LazyLock::new(|| {
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    std::sync::Mutex::new(SimpleRng::new(seed))
});

/// Xorshift64. Usernames only need variety, not unpredictability.
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

/// Generate a username like "SlateRook" or "CleverMagpie".
pub fn generate_name() -> String {
    let mut rng = RNG.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let adjective = ADJECTIVES[rng.next() as usize % ADJECTIVES.len()];
    let corvid = CORVIDS[rng.next() as usize % CORVIDS.len()];
    format!("{}{}", adjective, corvid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_name_format() {
        let name = generate_name();
        assert!(!name.is_empty());
        assert!(name.chars().all(|c| c.is_alphanumeric()));
    }

    #[test]
    fn test_generate_name_variety() {
        let names: Vec<String> = (0..10).map(|_| generate_name()).collect();
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert!(unique.len() > 1, "Should generate varied names");
    }
}
