//! The equivalence engine (spec §4.5): finding the canonical position
//! equivalent to a candidate state, and the bulk `setbetter_sweep`
//! used after a deferred ("check-later") reload.

use log::{debug, trace};

use crate::arena::Arena;
use crate::hash::hash_bytes;
use crate::position::{Position, PositionId};
use crate::presence_filter::PresenceFilter;

/// `find_equivalent(state)` (spec §4.5): hashes the first `compare_size`
/// bytes of `state`, consults the presence filter, then scans live
/// positions for a byte-identical match among those not currently
/// mid-resolution, and chases the result's `better` chain to its
/// canonical end.
pub(crate) fn find_equivalent(
    positions: &Arena<Position>,
    filter: Option<&PresenceFilter>,
    state: &[u8],
    compare_size: usize,
) -> Option<PositionId> {
    let comparable = &state[..compare_size];
    let h = hash_bytes(comparable);

    if let Some(filter) = filter {
        if filter.probably_absent(h) {
            return None;
        }
    }

    let mut found = None;
    for (index, p) in positions.iter() {
        if p.pending_equivalence || p.hash != h {
            continue;
        }
        if p.state[..compare_size] == *comparable {
            found = Some(PositionId(index));
            break;
        }
    }

    let mut q = found?;
    while let Some(better) = positions.get(q.0).better {
        q = better;
    }
    Some(q)
}

/// `setbetter_sweep()` (spec §4.5): resolves every position still
/// carrying a pending (deferred) equivalence flag. Returns the number
/// of positions for which a non-nil `better` assignment was made.
///
/// The flag is cleared only *after* a position's own equivalence has
/// been resolved, not before (see the design ledger's note on this):
/// clearing it first would let a position match against itself, or
/// let two still-pending positions match each other in an order-
/// dependent way, during a single sweep.
pub(crate) fn setbetter_sweep(
    positions: &mut Arena<Position>,
    filter: Option<&PresenceFilter>,
    compare_size: usize,
) -> u32 {
    let pending: Vec<PositionId> = positions
        .iter()
        .filter(|(_, p)| p.pending_equivalence)
        .map(|(i, _)| PositionId(i))
        .collect();
    let pending_count = pending.len();

    let mut assigned = 0;
    for p_id in pending {
        let p_movecount = positions.get(p_id.0).movecount;
        let p_state = positions.get(p_id.0).state.clone();

        let q = {
            // Temporarily mark p as pending-excluded-from-itself is
            // already true (the flag is still set), so the scan below
            // cannot return p_id itself.
            find_equivalent(positions, filter, &p_state, compare_size)
        };

        match q {
            Some(q_id) if q_id != p_id => {
                let q_movecount = positions.get(q_id.0).movecount;
                if q_movecount <= p_movecount {
                    positions.get_mut(p_id.0).better = Some(q_id);
                    assigned += 1;
                    trace!("setbetter_sweep: position resolved as non-canonical");
                } else {
                    positions.get_mut(p_id.0).better = None;
                    if positions.get(q_id.0).better.is_none() {
                        positions.get_mut(q_id.0).better = Some(p_id);
                        positions.get_mut(q_id.0).pending_equivalence = false;
                        assigned += 1;
                        trace!("setbetter_sweep: promoted position to canonical over its former match");
                    }
                }
            }
            _ => {
                positions.get_mut(p_id.0).better = None;
            }
        }
        positions.get_mut(p_id.0).pending_equivalence = false;
    }
    debug!("setbetter_sweep resolved {pending_count} pending position(s), {assigned} assignment(s)");
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk(positions: &mut Arena<Position>, state: &[u8], movecount: u32) -> PositionId {
        let hash = hash_bytes(state);
        PositionId(positions.alloc(Position::new(None, movecount, hash, state.into())).unwrap())
    }

    #[test]
    fn finds_equivalent_and_chases_better() {
        let mut positions: Arena<Position> = Arena::new();
        let a = mk(&mut positions, b"AAAA", 0);
        let b = mk(&mut positions, b"AAAA", 1);
        positions.get_mut(b.0).better = Some(a);

        let found = find_equivalent(&positions, None, b"AAAA", 4).unwrap();
        assert_eq!(found, a);
    }

    #[test]
    fn pending_positions_are_excluded() {
        let mut positions: Arena<Position> = Arena::new();
        let a = mk(&mut positions, b"AAAA", 0);
        positions.get_mut(a.0).pending_equivalence = true;

        assert!(find_equivalent(&positions, None, b"AAAA", 4).is_none());
    }

    #[test]
    fn presence_filter_short_circuits() {
        let mut positions: Arena<Position> = Arena::new();
        mk(&mut positions, b"AAAA", 0);
        let filter = PresenceFilter::try_new().unwrap();
        assert!(find_equivalent(&positions, Some(&filter), b"AAAA", 4).is_none());
    }

    #[test]
    fn sweep_resolves_pending_and_is_idempotent() {
        let mut positions: Arena<Position> = Arena::new();
        let a = mk(&mut positions, b"AAAA", 0);
        let b = mk(&mut positions, b"AAAA", 3);
        positions.get_mut(a.0).pending_equivalence = true;
        positions.get_mut(b.0).pending_equivalence = true;

        let assigned = setbetter_sweep(&mut positions, None, 4);
        assert_eq!(assigned, 1);
        assert_eq!(positions.get(b.0).better, Some(a));
        assert!(!positions.get(a.0).pending_equivalence);
        assert!(!positions.get(b.0).pending_equivalence);

        let second = setbetter_sweep(&mut positions, None, 4);
        assert_eq!(second, 0);
    }
}
