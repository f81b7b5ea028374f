//! Branch records (spec §3.2): the labeled edge from a position to one
//! of its children, stored in its own arena rather than inline in
//! [`crate::position::Position`] so that a position with many children
//! doesn't force every position to reserve room for them.

use crate::position::PositionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BranchId(pub(crate) u32);

pub(crate) struct Branch {
    pub(crate) mv: u64,
    pub(crate) child: PositionId,
    /// Singly-linked list of a position's children, most-recently-used
    /// first (see `Session::get_next`'s promotion-on-hit behavior).
    pub(crate) next_sibling: Option<BranchId>,
}

impl Branch {
    pub(crate) fn new(mv: u64, child: PositionId, next_sibling: Option<BranchId>) -> Self {
        Self { mv, child, next_sibling }
    }
}
