//! Three-valued match logic.
//!
//! Every condition dimension answers `Match`, `NoMatch`, or `Unknown` (the
//! answer depends on a signal the scenario left unspecified). Combination
//! follows strong Kleene logic:
//!
//! - AND: `NoMatch` dominates, then `Unknown`, then `Match`.
//! - OR:  `Match` dominates, then `Unknown`, then `NoMatch`.
//! - NOT: swaps `Match` and `NoMatch`, keeps `Unknown`.

use std::ops::{BitAnd, BitOr, Not};

use serde::{Deserialize, Serialize};

/// The outcome of matching one constraint against one scenario value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tri {
    Match,
    NoMatch,
    Unknown,
}

impl Tri {
    /// `Match` for true, `NoMatch` for false.
    pub fn from_bool(b: bool) -> Self {
        if b {
            Tri::Match
        } else {
            Tri::NoMatch
        }
    }

    /// Three-valued AND.
    pub fn and(self, other: Tri) -> Tri {
        match (self, other) {
            (Tri::NoMatch, _) | (_, Tri::NoMatch) => Tri::NoMatch,
            (Tri::Unknown, _) | (_, Tri::Unknown) => Tri::Unknown,
            (Tri::Match, Tri::Match) => Tri::Match,
        }
    }

    /// Three-valued OR.
    pub fn or(self, other: Tri) -> Tri {
        match (self, other) {
            (Tri::Match, _) | (_, Tri::Match) => Tri::Match,
            (Tri::Unknown, _) | (_, Tri::Unknown) => Tri::Unknown,
            (Tri::NoMatch, Tri::NoMatch) => Tri::NoMatch,
        }
    }

    /// AND over any number of values. The empty conjunction is `Match`.
    pub fn all<I: IntoIterator<Item = Tri>>(values: I) -> Tri {
        values.into_iter().fold(Tri::Match, Tri::and)
    }

    /// OR over any number of values. The empty disjunction is `NoMatch`.
    pub fn any<I: IntoIterator<Item = Tri>>(values: I) -> Tri {
        values.into_iter().fold(Tri::NoMatch, Tri::or)
    }

    pub fn is_match(self) -> bool {
        self == Tri::Match
    }

    pub fn is_no_match(self) -> bool {
        self == Tri::NoMatch
    }

    pub fn is_unknown(self) -> bool {
        self == Tri::Unknown
    }
}

impl BitAnd for Tri {
    type Output = Tri;

    fn bitand(self, rhs: Tri) -> Tri {
        self.and(rhs)
    }
}

impl BitOr for Tri {
    type Output = Tri;

    fn bitor(self, rhs: Tri) -> Tri {
        self.or(rhs)
    }
}

impl Not for Tri {
    type Output = Tri;

    fn not(self) -> Tri {
        match self {
            Tri::Match => Tri::NoMatch,
            Tri::NoMatch => Tri::Match,
            Tri::Unknown => Tri::Unknown,
        }
    }
}
