//! The solution tracker (spec §4.7): propagating the best known
//! solution size/endpoint pair from a position up toward the root.

use log::trace;

use crate::arena::Arena;
use crate::branch::Branch;
use crate::position::{Position, PositionId, Solution};
use crate::tree;

/// Solution ordering (spec §4.7): higher `end` beats lower `end`;
/// among equal `end`, smaller `size` beats larger `size`. Any
/// established solution beats "no solution" (`None`), including one
/// with a negative `end` — the absence of a solution is not itself a
/// comparable candidate under this ordering, it is ranked below every
/// candidate unconditionally.
fn beats(candidate: Solution, current: Option<Solution>) -> bool {
    match current {
        None => true,
        Some((cur_end, cur_size)) => {
            let (end, size) = candidate;
            end > cur_end || (end == cur_end && size < cur_size)
        }
    }
}

/// Endpoint establishment (spec §4.7): `p` was just created with a
/// nonzero `end`. Records `p`'s own solution and walks ancestors
/// toward the root, adopting the new solution at each ancestor that
/// doesn't already have one at least as good. Stops at the first
/// ancestor that keeps its existing solution.
pub(crate) fn establish_endpoint(positions: &mut Arena<Position>, p: PositionId, end: i64) {
    let size = positions.get(p.0).movecount;
    let candidate: Solution = (end, size);
    positions.get_mut(p.0).own_endpoint = Some(end);
    positions.get_mut(p.0).solution = Some(candidate);

    let mut cursor = positions.get(p.0).parent;
    while let Some(a) = cursor {
        let current = positions.get(a.0).solution;
        if !beats(candidate, current) {
            break;
        }
        positions.get_mut(a.0).solution = Some(candidate);
        trace!("solution (end={end}, size={size}) propagated to an ancestor");
        cursor = positions.get(a.0).parent;
    }
}

/// `recalc_solutions_to_root(p)` (spec §4.7): from `p` upward,
/// recompute each node's solution as the best (by `beats`) among its
/// own endpoint value (if any) and all of its children's current
/// solutions. Used after drop and after graft, since both can either
/// improve or invalidate a cached solution.
pub(crate) fn recalc_solutions_to_root(positions: &mut Arena<Position>, branches: &Arena<Branch>, p: PositionId) {
    let mut cursor = Some(p);
    while let Some(id) = cursor {
        let mut best: Option<Solution> = None;
        if let Some(end) = positions.get(id.0).own_endpoint {
            let size = positions.get(id.0).movecount;
            best = Some((end, size));
        }
        for (_, child) in tree::children(positions, branches, id) {
            if let Some(child_solution) = positions.get(child.0).solution {
                if beats(child_solution, best) {
                    best = Some(child_solution);
                }
            }
        }
        positions.get_mut(id.0).solution = best;
        cursor = positions.get(id.0).parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::add_branch;

    fn mk(positions: &mut Arena<Position>, parent: Option<PositionId>, movecount: u32) -> PositionId {
        PositionId(positions.alloc(Position::new(parent, movecount, 0, Box::new([]))).unwrap())
    }

    #[test]
    fn higher_end_beats_lower_end_even_if_longer() {
        assert!(beats((2, 10), Some((1, 1))));
        assert!(!beats((1, 1), Some((2, 10))));
    }

    #[test]
    fn equal_end_prefers_smaller_size() {
        assert!(beats((1, 3), Some((1, 5))));
        assert!(!beats((1, 5), Some((1, 3))));
    }

    #[test]
    fn any_established_solution_beats_none() {
        assert!(beats((-5, 9), None));
    }

    #[test]
    fn establish_endpoint_propagates_to_root() {
        let mut positions: Arena<Position> = Arena::new();
        let root = mk(&mut positions, None, 0);
        let a = mk(&mut positions, Some(root), 1);
        establish_endpoint(&mut positions, a, 1);
        assert_eq!(positions.get(root.0).solution, Some((1, 1)));
    }

    #[test]
    fn establish_endpoint_stops_when_root_already_better() {
        let mut positions: Arena<Position> = Arena::new();
        let root = mk(&mut positions, None, 0);
        let a = mk(&mut positions, Some(root), 1);
        let b = mk(&mut positions, Some(root), 1);
        establish_endpoint(&mut positions, a, 5);
        establish_endpoint(&mut positions, b, 1);
        assert_eq!(positions.get(root.0).solution, Some((5, 1)), "lower end must not override higher end");
    }

    #[test]
    fn recalc_picks_best_child_solution() {
        let mut positions: Arena<Position> = Arena::new();
        let mut branches: Arena<Branch> = Arena::new();
        let root = mk(&mut positions, None, 0);
        let a = mk(&mut positions, Some(root), 1);
        let b = mk(&mut positions, Some(root), 1);
        add_branch(&mut positions, &mut branches, root, a, 1).unwrap();
        add_branch(&mut positions, &mut branches, root, b, 2).unwrap();
        positions.get_mut(a.0).solution = Some((1, 4));
        positions.get_mut(b.0).solution = Some((3, 9));
        recalc_solutions_to_root(&mut positions, &branches, root);
        assert_eq!(positions.get(root.0).solution, Some((3, 9)));
    }
}
