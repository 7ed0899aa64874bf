//! Human-memorable key derivation.
//!
//! A mnemonic is a space-separated phrase of unique words drawn from
//! [`WORDS`]. The private scalar is `SHA-256(phrase) mod n`, so the same phrase
//! always regenerates the same key pair.

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::ops::Reduce;
use k256::{FieldBytes, NonZeroScalar, Scalar, U256};
use rand::seq::SliceRandom;

use crate::crypto::Sha256Hash;
use crate::error::{CoreError, Result};

/// Delimiter placed between mnemonic words.
pub const MNEMONIC_DELIMITER: &str = " ";

/// Default number of words in a generated mnemonic.
pub const DEFAULT_WORD_COUNT: usize = 12;

/// The fixed mnemonic dictionary (256 words, sorted).
pub const WORDS: &[&str] = &[
    "acorn", "almond", "amber", "anchor", "anvil", "apple", "arrow", "aspen", "atlas",
    "autumn", "badge", "bagel", "ballad", "bamboo", "banner", "barrel", "basil", "basket",
    "beacon", "beetle", "berry", "birch", "bishop", "bison", "blanket", "blossom", "bonfire",
    "border", "bottle", "breeze", "bridge", "bronze", "brook", "bucket", "buffalo", "cabin",
    "cactus", "camera", "candle", "canoe", "canyon", "carbon", "cargo", "carpet", "cashew",
    "castle", "cedar", "cellar", "cello", "chalk", "cherry", "cinder", "circle", "citrus",
    "cliff", "clock", "cloud", "clover", "cobalt", "cobra", "comet", "compass", "cookie",
    "copper", "coral", "cotton", "cradle", "crane", "cricket", "crystal", "cypress", "dagger",
    "dancer", "delta", "desert", "diamond", "dolphin", "dragon", "drift", "dune", "eagle",
    "echo", "ember", "engine", "falcon", "feather", "ferry", "fiber", "fiddle", "fig", "flute",
    "forest", "fossil", "fountain", "fox", "galaxy", "garden", "garnet", "geyser", "ginger",
    "glacier", "glider", "globe", "goose", "granite", "gravel", "hammock", "harbor", "harvest",
    "hazel", "helmet", "heron", "hollow", "honey", "horizon", "hornet", "igloo", "iris",
    "island", "ivory", "jacket", "jaguar", "jasmine", "jewel", "jungle", "juniper", "kayak",
    "kernel", "kettle", "kitten", "koala", "ladder", "lagoon", "lantern", "lark", "lava",
    "lemon", "lily", "linen", "lizard", "lotus", "lynx", "magnet", "mango", "maple", "marble",
    "meadow", "melon", "meteor", "mint", "mirror", "monsoon", "mosaic", "moss", "mountain",
    "nectar", "needle", "nickel", "nomad", "nutmeg", "oak", "oasis", "ocean", "olive", "onyx",
    "opal", "orbit", "orchid", "otter", "oyster", "paddle", "palace", "panther", "paper",
    "parrot", "peach", "pearl", "pebble", "pepper", "pillow", "pilot", "pine", "planet",
    "plume", "pocket", "poppy", "prairie", "prism", "pulse", "puma", "quail", "quartz",
    "quill", "rabbit", "radar", "raisin", "ranch", "raven", "reef", "ribbon", "river", "robin",
    "rocket", "saddle", "saffron", "sage", "salmon", "sapphire", "satin", "scarlet", "shadow",
    "shell", "shelter", "signal", "silver", "sketch", "sloth", "sonnet", "sparrow", "spiral",
    "spruce", "squirrel", "stable", "summit", "sunset", "tablet", "tango", "temple", "thistle",
    "thunder", "tide", "tiger", "timber", "tofu", "topaz", "torch", "trout", "tuba", "tulip",
    "tundra", "tunnel", "turtle", "umbrella", "valley", "vapor", "velvet", "violet", "viper",
    "voyage", "walnut", "walrus", "willow", "window", "winter", "wizard", "yacht",
];

/// Pick `count` unique random words and join them into a phrase.
pub fn generate_mnemonic(count: usize) -> Result<String> {
    if count == 0 || count > WORDS.len() {
        return Err(CoreError::EncodingError(format!(
            "mnemonic word count must be within 1..={}",
            WORDS.len()
        )));
    }
    let mut rng = rand::thread_rng();
    let words: Vec<&str> = WORDS.choose_multiple(&mut rng, count).copied().collect();
    Ok(words.join(MNEMONIC_DELIMITER))
}

/// Derive the signing key for a phrase.
pub fn signing_key_from_mnemonic(phrase: &str) -> Result<SigningKey> {
    let digest = Sha256Hash::hash(phrase.as_bytes());
    let scalar = <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(digest.0));
    let scalar: Option<NonZeroScalar> = NonZeroScalar::new(scalar).into();
    scalar
        .map(SigningKey::from)
        .ok_or_else(|| CoreError::KeyDecode("mnemonic reduces to the zero scalar".into()))
}
