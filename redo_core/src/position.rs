//! Position records (spec §3.1): one node of the exploration tree.

use crate::branch::BranchId;

/// A stable handle to a position within a [`crate::Session`]. Handles
/// from different sessions must never be mixed; nothing in this crate
/// checks for that, the same way an index into the wrong `Vec` is a
/// caller bug rather than a detectable one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionId(pub(crate) u32);

/// An established solution at or below a position: `end` is the
/// signed endpoint value reported to [`crate::Session::add_position`],
/// `size` is the move count from the position to that endpoint.
/// Ordering between two established solutions prefers the larger
/// `end`, then the smaller `size` (spec §6.1); "no solution yet" is
/// the absence of this pair, not a sentinel value within it, since a
/// genuine endpoint can be negative.
pub(crate) type Solution = (i64, u32);

pub(crate) struct Position {
    pub(crate) parent: Option<PositionId>,
    pub(crate) first_child: Option<BranchId>,
    pub(crate) child_count: u32,

    /// The representative this position has been found equivalent to
    /// and shorter than, if any. `better` chains are walked to their
    /// end to find the canonical representative of a state.
    pub(crate) better: Option<PositionId>,

    /// Moves from the session root to this position.
    pub(crate) movecount: u32,

    /// The best solution known to be reachable from this position,
    /// i.e. the best among `self` (if it is itself an endpoint) and
    /// all of `self`'s children's solutions.
    pub(crate) solution: Option<Solution>,

    /// The endpoint value this position was created with, if the
    /// caller's `end` argument to `add_position` was nonzero. Kept
    /// separate from `solution` because recomputation needs to weigh
    /// "this position is itself an endpoint" as one candidate among
    /// its children's solutions, not just read off the cached result.
    pub(crate) own_endpoint: Option<i64>,

    pub(crate) hash: u16,
    pub(crate) state: Box<[u8]>,

    /// Set while this position's equivalence is mid-resolution, to
    /// keep `find_equivalent` from matching a position against itself
    /// or against another position whose own match is still pending
    /// (see the `setbetter` ordering note in the design ledger).
    pub(crate) pending_equivalence: bool,
}

impl Position {
    pub(crate) fn new(parent: Option<PositionId>, movecount: u32, hash: u16, state: Box<[u8]>) -> Self {
        Self {
            parent,
            first_child: None,
            child_count: 0,
            better: None,
            movecount,
            solution: None,
            own_endpoint: None,
            hash,
            state,
            pending_equivalence: false,
        }
    }
}
