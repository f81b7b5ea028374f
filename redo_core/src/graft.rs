//! The grafting engine (spec §4.6): what happens when a newly
//! discovered position turns out to be both equivalent to, and
//! shorter than, an already-known position.

use log::debug;

use crate::arena::Arena;
use crate::branch::Branch;
use crate::position::{Position, PositionId, Solution};
use crate::session::GraftPolicy;
use crate::solution::recalc_solutions_to_root;
use crate::tree;

/// Applies the grafting policy currently in effect once `e.better =
/// n` has already been decided by the caller. `n` is the new,
/// shorter position; `e` is the old canonical it displaces.
pub(crate) fn apply_policy(
    positions: &mut Arena<Position>,
    branches: &mut Arena<Branch>,
    policy: GraftPolicy,
    n: PositionId,
    e: PositionId,
) {
    match policy {
        GraftPolicy::NoGraft => {}
        GraftPolicy::Graft => {
            graft(positions, branches, n, e);
            recalc_solutions_to_root(positions, branches, e);
        }
        GraftPolicy::CopyPath => {
            duplicate_path(positions, branches, n, e);
        }
        GraftPolicy::GraftAndCopy => {
            graft(positions, branches, n, e);
            recalc_solutions_to_root(positions, branches, e);
            duplicate_path(positions, branches, e, n);
        }
    }
}

/// Walks the subtree rooted at `position` (already reparented under
/// `dest`), adding `delta` to each descendant's `movecount` and, when
/// it has one, the size half of its `solution`. Inverts any `better`
/// link found to now point the wrong way (spec §4.6 step 4, preserved
/// unconditionally per the design notes' open question on this).
fn adjust_subtree(positions: &mut Arena<Position>, branches: &Arena<Branch>, position: PositionId, delta: i64) {
    let new_movecount = (i64::from(positions.get(position.0).movecount) + delta) as u32;
    positions.get_mut(position.0).movecount = new_movecount;
    if let Some((end, size)) = positions.get(position.0).solution {
        positions.get_mut(position.0).solution = Some((end, (i64::from(size) + delta) as u32));
    }

    if let Some(better) = positions.get(position.0).better {
        if positions.get(better.0).movecount > new_movecount {
            positions.get_mut(better.0).better = Some(position);
            positions.get_mut(position.0).better = None;
        }
    }

    for (_, child) in tree::children(positions, branches, position) {
        adjust_subtree(positions, branches, child, delta);
    }
}

/// `graft(dest, src)` (spec §4.6): moves `src`'s entire child subtree
/// to `dest`, leaving `src` a leaf. Does not touch `src`'s own
/// solution bookkeeping — the caller recomputes that afterward via
/// [`recalc_solutions_to_root`], since `src` may still be an endpoint
/// in its own right.
fn graft(positions: &mut Arena<Position>, branches: &mut Arena<Branch>, dest: PositionId, src: PositionId) {
    let src_children = positions.get(src.0).first_child;
    let src_child_count = positions.get(src.0).child_count;
    positions.get_mut(dest.0).first_child = src_children;
    positions.get_mut(dest.0).child_count = src_child_count;
    positions.get_mut(src.0).first_child = None;
    positions.get_mut(src.0).child_count = 0;

    for (_, child) in tree::children(positions, branches, dest) {
        positions.get_mut(child.0).parent = Some(dest);
    }

    let delta = i64::from(positions.get(dest.0).movecount) - i64::from(positions.get(src.0).movecount);
    let src_solution: Option<Solution> = positions.get(src.0).solution;
    let dest_solution: Option<Solution> = src_solution.map(|(end, size)| (end, (i64::from(size) + delta) as u32));
    positions.get_mut(dest.0).solution = dest_solution;

    for (_, child) in tree::children(positions, branches, dest) {
        adjust_subtree(positions, branches, child, delta);
    }

    debug!("grafted subtree, movecount delta {delta}");

    if let Some((_, new_size)) = dest_solution {
        let mut cursor = positions.get(dest.0).parent;
        while let Some(a) = cursor {
            let replace = match positions.get(a.0).solution {
                None => true,
                Some((_, cur_size)) => cur_size > new_size,
            };
            if !replace {
                break;
            }
            positions.get_mut(a.0).solution = dest_solution;
            cursor = positions.get(a.0).parent;
        }
    }
}

/// `duplicate_path(dest, src)` (spec §4.6): while `src` has a known
/// solution, mirrors the next step of that solution path as a new
/// child under `dest` (added with no-check: these nodes are
/// deliberately not indexed as fresh equivalents). Returns `false`
/// only when `src` had no solution to begin with, or an allocation
/// failed partway through a longer duplication.
pub(crate) fn duplicate_path(positions: &mut Arena<Position>, branches: &mut Arena<Branch>, mut dest: PositionId, mut src: PositionId) -> bool {
    if positions.get(src.0).solution.is_none() {
        return false;
    }

    loop {
        let Some((_, src_size)) = positions.get(src.0).solution else { break };

        let mut chosen = None;
        for (branch_id, child) in tree::children(positions, branches, src) {
            if positions.get(child.0).solution.is_some_and(|(_, size)| size == src_size) {
                chosen = Some((branches.get(branch_id.0).mv, child));
                break;
            }
        }
        let Some((mv, src_child)) = chosen else { break };

        let end = positions.get(src_child.0).own_endpoint.unwrap_or(0);
        let hash = positions.get(src_child.0).hash;
        let state = positions.get(src_child.0).state.clone();

        let Some((new_node, is_new)) = tree::create_child(positions, branches, dest, mv, state, hash) else {
            return false;
        };
        if is_new && end != 0 {
            crate::solution::establish_endpoint(positions, new_node, end);
        }

        // Only mark once the step has actually been duplicated, and
        // only on the position that leads it — not on the terminal
        // duplicated node, which is left with no `better` of its own.
        if positions.get(dest.0).better.is_none() && positions.get(dest.0).movecount >= positions.get(src.0).movecount {
            let target = positions.get(src.0).better.unwrap_or(src);
            positions.get_mut(dest.0).better = Some(target);
        }

        src = src_child;
        dest = new_node;
    }
    true
}
