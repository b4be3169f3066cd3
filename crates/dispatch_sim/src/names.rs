use rand::seq::SliceRandom;
use rand::Rng;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Claude", "Dennis", "Edsger", "Frances", "Grace", "Hedy", "Ivan",
    "Jean", "Ken", "Linus", "Margaret", "Niklaus", "Ole", "Radia", "Shafi", "Tim", "Vint",
];

const LAST_NAMES: &[&str] = &[
    "Allen", "Backus", "Cerf", "Dijkstra", "Engelbart", "Floyd", "Gray", "Hopper", "Iverson",
    "Knuth", "Lamport", "Liskov", "McCarthy", "Perlman", "Ritchie", "Stroustrup", "Thompson",
    "Wirth",
];

/// A random "First Last" name.
pub fn random_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Anon");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Ymous");
    format!("{first} {last}")
}
