//! Reputation ranks.

/// A named reputation band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rank {
    pub name: &'static str,
    pub min_rep: i64,
}

pub const RANKS: [Rank; 24] = [
    Rank { name: "Crackhead", min_rep: -1400 },
    Rank { name: "Street Trash", min_rep: -400 },
    Rank { name: "Disrespectable Punk", min_rep: -100 },
    Rank { name: "Nobody", min_rep: 0 },
    Rank { name: "Wannabe", min_rep: 100 },
    Rank { name: "Slacker", min_rep: 400 },
    Rank { name: "Street Punk", min_rep: 1400 },
    Rank { name: "Thug Wannabe", min_rep: 3400 },
    Rank { name: "Thug", min_rep: 7000 },
    Rank { name: "Hustler", min_rep: 12500 },
    Rank { name: "Wanskta", min_rep: 20500 },
    Rank { name: "Gangster", min_rep: 31700 },
    Rank { name: "Soldier", min_rep: 46600 },
    Rank { name: "Playa", min_rep: 65900 },
    Rank { name: "Pimp", min_rep: 90500 },
    Rank { name: "Pusher", min_rep: 120900 },
    Rank { name: "Smuggler", min_rep: 158100 },
    Rank { name: "Gun Runner", min_rep: 203000 },
    Rank { name: "Mobster", min_rep: 256500 },
    Rank { name: "Drug Lord", min_rep: 319400 },
    Rank { name: "Capo", min_rep: 393000 },
    Rank { name: "Underboss", min_rep: 478200 },
    Rank { name: "Don", min_rep: 576100 },
    Rank { name: "Kingpin", min_rep: 688000 },
];

/// Minimum reputation of the rank at `index` in [`RANKS`]
pub const fn rank_rep(index: usize) -> i64 {
    RANKS[index].min_rep
}

/// Index of the highest rank whose threshold is at or below `rep`.
/// Reputation below the lowest threshold still maps to the lowest rank.
pub fn rank_index(rep: i64) -> usize {
    RANKS
        .iter()
        .rposition(|r| r.min_rep <= rep)
        .unwrap_or(0)
}

pub fn rank_for(rep: i64) -> Rank {
    RANKS[rank_index(rep)]
}

/// Reputation still needed to reach the next rank, 0 at the top
pub fn rep_to_next_rank(rep: i64) -> i64 {
    let index = rank_index(rep);
    match RANKS.get(index + 1) {
        Some(next) => (next.min_rep - rep).max(0),
        None => 0,
    }
}
