//! Identifier and label generation for bots. Ids must be DNS-1123-safe since
//! they double as pod and service names; labels are only for humans.

use rand::Rng;

/// Adjective half of the generated human labels.
const ADJECTIVES: &[&str] = &[
    "amber", "ancient", "bold", "brave", "bright", "calm", "clever", "coral", "crimson", "daring",
    "deep", "eager", "fearless", "gentle", "golden", "hidden", "humble", "ivory", "jolly", "keen",
    "lively", "lucky", "mellow", "mighty", "nimble", "noble", "patient", "proud", "quiet", "rapid",
    "scarlet", "silent", "silver", "steady", "stoic", "swift", "tidy", "vivid", "wise", "zesty",
];

/// Noun half of the generated human labels.
const NOUNS: &[&str] = &[
    "badger", "beacon", "bison", "breeze", "cedar", "comet", "condor", "coyote", "crane", "dune",
    "falcon", "fjord", "gazelle", "glacier", "harbor", "heron", "ibis", "jaguar", "kestrel",
    "lagoon", "lynx", "maple", "meadow", "meteor", "orchid", "osprey", "otter", "panther",
    "pebble", "pelican", "prairie", "raven", "reef", "sparrow", "summit", "thicket", "tundra",
    "walnut", "willow", "wren",
];

/// Draws a `bot-<hex>` identifier; 16 random bytes, lowercased hex.
pub fn random_bot_id(rng: &mut impl Rng) -> String {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes[..]);
    format!("bot-{}", hex::encode(bytes))
}

/// Draws a human-friendly "Adjective Noun" label.
pub fn random_bot_name(rng: &mut impl Rng) -> String {
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    format!("{} {}", title_case(adjective), title_case(noun))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn bot_ids_are_dns_safe_and_prefixed() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let id = random_bot_id(&mut rng);
            assert!(id.starts_with("bot-"));
            assert_eq!(id.len(), 4 + 32);
            assert!(
                id.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            );
        }
    }

    #[test]
    fn seeded_rng_is_deterministic() {
        let a = random_bot_id(&mut StdRng::seed_from_u64(1));
        let b = random_bot_id(&mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn names_are_two_title_cased_words() {
        let mut rng = StdRng::seed_from_u64(3);
        let name = random_bot_name(&mut rng);
        let words: Vec<&str> = name.split(' ').collect();
        assert_eq!(words.len(), 2);
        for word in words {
            assert!(word.chars().next().is_some_and(|c| c.is_uppercase()));
        }
    }
}
