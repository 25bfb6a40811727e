use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::LockError;

/// Lock modes of the multigranularity protocol.
///
/// The relations between modes are fixed tables indexed by the two
/// variants, see [`LockType::compatible`], [`LockType::substitutable`] and
/// [`LockType::can_be_parent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockType {
    /// No lock held.
    NL = 0,
    /// Intention shared.
    IS = 1,
    /// Intention exclusive.
    IX = 2,
    /// Shared.
    S = 3,
    /// Shared + intention exclusive.
    SIX = 4,
    /// Exclusive.
    X = 5,
}

const T: bool = true;
const F: bool = false;

// Rows and columns ordered NL, IS, IX, S, SIX, X.
const COMPATIBLE: [[bool; 6]; 6] = [
    [T, T, T, T, T, T],
    [T, T, T, T, T, F],
    [T, T, T, F, F, F],
    [T, T, F, T, F, F],
    [T, T, F, F, F, F],
    [T, F, F, F, F, F],
];

// SUBSTITUTABLE[have][need]
const SUBSTITUTABLE: [[bool; 6]; 6] = [
    [T, F, F, F, F, F],
    [T, T, F, F, F, F],
    [T, T, T, F, F, F],
    [T, T, F, T, F, F],
    [T, T, T, T, T, F],
    [T, T, T, T, T, T],
];

// CAN_BE_PARENT[parent][child]
const CAN_BE_PARENT: [[bool; 6]; 6] = [
    [T, F, F, F, F, F],
    [T, T, F, T, F, F],
    [T, T, T, T, T, T],
    [T, F, F, F, F, F],
    [T, F, T, F, F, T],
    [T, F, F, F, F, F],
];

impl LockType {
    pub const ALL: [LockType; 6] = [
        LockType::NL,
        LockType::IS,
        LockType::IX,
        LockType::S,
        LockType::SIX,
        LockType::X,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Whether one transaction holding `a` and another holding `b` on the
    /// same resource can coexist. Symmetric.
    pub fn compatible(a: LockType, b: LockType) -> bool {
        COMPATIBLE[a.index()][b.index()]
    }

    /// Whether holding `have` satisfies a requirement for `need`.
    pub fn substitutable(have: LockType, need: LockType) -> bool {
        SUBSTITUTABLE[have.index()][need.index()]
    }

    /// Whether a parent holding `parent` admits `child` on one of its children.
    pub fn can_be_parent(parent: LockType, child: LockType) -> bool {
        CAN_BE_PARENT[parent.index()][child.index()]
    }

    /// The weakest mode the parent must hold before `self` can be requested.
    pub fn parent_lock(self) -> LockType {
        match self {
            LockType::S | LockType::IS => LockType::IS,
            LockType::X | LockType::IX | LockType::SIX => LockType::IX,
            LockType::NL => LockType::NL,
        }
    }

    /// True for `IS`, `IX` and `SIX`.
    pub fn is_intent(self) -> bool {
        matches!(self, LockType::IS | LockType::IX | LockType::SIX)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LockType::NL => "NL",
            LockType::IS => "IS",
            LockType::IX => "IX",
            LockType::S => "S",
            LockType::SIX => "SIX",
            LockType::X => "X",
        }
    }
}

impl Default for LockType {
    fn default() -> Self {
        LockType::NL
    }
}

impl fmt::Display for LockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockType {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LockType::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| LockError::InvalidLock(format!("unknown lock type {:?}", s)))
    }
}
