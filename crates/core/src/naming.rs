// Human-readable instance names ("adjective-noun")

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "amber", "ancient", "bold", "brave", "bright", "calm", "clever", "cosmic", "crimson", "daring",
    "eager", "electric", "fancy", "fearless", "gentle", "golden", "happy", "hidden", "humble",
    "icy", "jolly", "keen", "lively", "lucky", "mellow", "mighty", "misty", "noble", "patient",
    "proud", "quiet", "rapid", "rustic", "silent", "silver", "steady", "sunny", "swift", "tidy",
    "vivid", "wandering", "wise", "witty", "young", "zesty",
];

const NOUNS: &[&str] = &[
    "albatross", "badger", "beacon", "bison", "canyon", "comet", "coyote", "falcon", "fjord",
    "gazelle", "glacier", "harbor", "heron", "ibis", "jaguar", "kestrel", "lagoon", "lynx",
    "meadow", "meteor", "narwhal", "nebula", "ocelot", "orchid", "otter", "panther", "pelican",
    "quasar", "raven", "reef", "salmon", "sparrow", "summit", "tern", "thunder", "tiger", "tundra",
    "vortex", "walrus", "willow", "wolf", "yak", "zephyr",
];

/// Generate a random display name using the thread-local RNG
pub fn random_name() -> String {
    random_name_with(&mut rand::thread_rng())
}

/// Generate a display name from the given RNG
pub fn random_name_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("nameless");
    let noun = NOUNS.choose(rng).copied().unwrap_or("instance");
    format!("{}-{}", adjective, noun)
}
