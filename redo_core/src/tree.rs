//! Tree operations (spec §4.4): linking and unlinking branches under a
//! position, and the MRU-promoting child lookup.

use crate::arena::Arena;
use crate::branch::{Branch, BranchId};
use crate::position::{Position, PositionId};

/// Finds the branch under `from` labeled `mv`, if any, without
/// promoting it. Used by `add_branch` to check for an existing
/// (parent, move) pair before allocating.
pub(crate) fn find_branch(positions: &Arena<Position>, branches: &Arena<Branch>, from: PositionId, mv: u64) -> Option<BranchId> {
    let mut cursor = positions.get(from.0).first_child;
    while let Some(id) = cursor {
        let branch = branches.get(id.0);
        if branch.mv == mv {
            return Some(id);
        }
        cursor = branch.next_sibling;
    }
    None
}

/// `add-branch(from, to, move)` (spec §4.4): returns the existing
/// branch unchanged if `(from, move)` is already linked; otherwise
/// allocates a new one at the head of `from`'s child list.
pub(crate) fn add_branch(
    positions: &mut Arena<Position>,
    branches: &mut Arena<Branch>,
    from: PositionId,
    to: PositionId,
    mv: u64,
) -> Option<BranchId> {
    if let Some(existing) = find_branch(positions, branches, from, mv) {
        return Some(existing);
    }
    let head = positions.get(from.0).first_child;
    let new_id = branches.alloc(Branch::new(mv, to, head))?;
    let parent = positions.get_mut(from.0);
    parent.first_child = Some(BranchId(new_id));
    parent.child_count += 1;
    Some(BranchId(new_id))
}

/// `drop-branch(from, to)` (spec §4.4): unlinks and frees the branch
/// under `from` whose child is `to`. No-op if absent. Does not touch
/// the child position itself.
pub(crate) fn drop_branch(positions: &mut Arena<Position>, branches: &mut Arena<Branch>, from: PositionId, to: PositionId) {
    let mut prev: Option<BranchId> = None;
    let mut cursor = positions.get(from.0).first_child;
    while let Some(id) = cursor {
        let branch = branches.get(id.0);
        let next = branch.next_sibling;
        if branch.child == to {
            match prev {
                Some(p) => branches.get_mut(p.0).next_sibling = next,
                None => positions.get_mut(from.0).first_child = next,
            }
            branches.free(id.0);
            positions.get_mut(from.0).child_count -= 1;
            return;
        }
        prev = Some(id);
        cursor = next;
    }
}

/// `get_next(p, move)` (spec §4.9): looks up the child reached by
/// `move` and, on a hit, promotes that branch to the head of the
/// child list (the MRU contract, spec §4.4).
pub(crate) fn get_next(positions: &mut Arena<Position>, branches: &mut Arena<Branch>, from: PositionId, mv: u64) -> Option<PositionId> {
    let mut prev: Option<BranchId> = None;
    let mut cursor = positions.get(from.0).first_child;
    while let Some(id) = cursor {
        let branch = branches.get(id.0);
        let next = branch.next_sibling;
        if branch.mv == mv {
            let child = branch.child;
            if let Some(p) = prev {
                branches.get_mut(p.0).next_sibling = next;
                let head = positions.get(from.0).first_child;
                branches.get_mut(id.0).next_sibling = head;
                positions.get_mut(from.0).first_child = Some(id);
            }
            return Some(child);
        }
        prev = Some(id);
        cursor = next;
    }
    None
}

/// Creates (or finds) the child of `parent` reached by `mv`, holding
/// `state` and precomputed `hash`. Returns the child along with
/// whether it was freshly created — callers use this to decide
/// whether to run endpoint/equivalence bookkeeping, which must only
/// happen once per position (spec's round-trip law: re-adding an
/// existing `(parent, move)` pair is a pure no-op).
///
/// On branch-allocation failure after the position was already
/// created, the position is freed again so no half-linked node is
/// published (spec §4.3, §7).
pub(crate) fn create_child(
    positions: &mut Arena<Position>,
    branches: &mut Arena<Branch>,
    parent: PositionId,
    mv: u64,
    state: Box<[u8]>,
    hash: u16,
) -> Option<(PositionId, bool)> {
    if let Some(existing) = find_branch(positions, branches, parent, mv) {
        return Some((branches.get(existing.0).child, false));
    }
    let movecount = positions.get(parent.0).movecount + 1;
    let child_id = positions.alloc(Position::new(Some(parent), movecount, hash, state))?;
    let child = PositionId(child_id);
    if add_branch(positions, branches, parent, child, mv).is_none() {
        positions.free(child_id);
        return None;
    }
    Some((child, true))
}

/// Iterates the direct children of `from` in current MRU order,
/// yielding `(branch, child)` pairs. Does not itself promote anything.
pub(crate) fn children(positions: &Arena<Position>, branches: &Arena<Branch>, from: PositionId) -> Vec<(BranchId, PositionId)> {
    let mut out = Vec::new();
    let mut cursor = positions.get(from.0).first_child;
    while let Some(id) = cursor {
        let branch = branches.get(id.0);
        out.push((id, branch.child));
        cursor = branch.next_sibling;
    }
    out
}
