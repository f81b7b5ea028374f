//! The session facade (spec §4.9): the single entry point a
//! collaborator holds onto, tying together the arenas, the tree
//! operations, the equivalence engine, the grafting engine, the
//! solution tracker and the cycle suppressor.

use log::{debug, warn};

use crate::arena::Arena;
use crate::branch::Branch;
use crate::equivalence::{find_equivalent, setbetter_sweep};
use crate::error::BeginError;
use crate::graft::{apply_policy, duplicate_path};
use crate::hash::hash_bytes;
use crate::position::{Position, PositionId};
use crate::presence_filter::PresenceFilter;
use crate::solution::{establish_endpoint, recalc_solutions_to_root};
use crate::tree;

/// What happens when `add_position` discovers that a new position is
/// equivalent to, and shorter than, an already-known position (spec
/// §4.6). `Graft` is the default, matching the reference
/// implementation's default behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraftPolicy {
    /// Leave the previously known position's subtree where it is.
    NoGraft,
    /// Move the previously known position's entire subtree onto the
    /// new, shorter position.
    #[default]
    Graft,
    /// Leave the subtree in place, but duplicate its shortest
    /// solution path under the new position.
    CopyPath,
    /// Graft, then duplicate the resulting solution path back onto
    /// the old site.
    GraftAndCopy,
}

/// How `add_position` should resolve equivalence for a new position
/// (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Skip the equivalence search entirely.
    NoCheck,
    /// Resolve equivalence synchronously, possibly triggering a
    /// graft.
    Check,
    /// Defer resolution to the next [`Session::setbetter_sweep`]
    /// call.
    CheckLater,
}

/// An exploration-tree history session (spec §3, §4.9).
///
/// Owns both arenas and the optional presence filter; no position or
/// branch handle is valid outside the session that produced it.
pub struct Session {
    positions: Arena<Position>,
    branches: Arena<Branch>,
    filter: Option<PresenceFilter>,
    root: PositionId,
    state_size: usize,
    compare_size: usize,
    policy: GraftPolicy,
    changed: bool,
}

/// Rough header cost assumed for the slot-size contract check (spec
/// §6): real storage is a `Box<[u8]>` per position, not a fixed
/// inline slot, but the 16-bit bound on "header + state, padded" is
/// kept as an input-validation contract collaborators can still rely
/// on when sizing their state buffers.
const ASSUMED_HEADER_BYTES: usize = 64;

fn padded_slot_size(state_size: usize) -> usize {
    let n = ASSUMED_HEADER_BYTES + state_size + 7;
    n - n % 8
}

impl Session {
    /// `begin(init_state, S, C)` (spec §4.9). `C == 0` means "compare
    /// all `S` bytes". Returns `None` on invalid arguments or
    /// allocation failure; the reason is logged at `warn` level
    /// before being discarded, per the library's no-panic contract.
    #[must_use]
    pub fn begin(init_state: &[u8], state_size: usize, compare_size: usize) -> Option<Self> {
        match Self::try_begin(init_state, state_size, compare_size) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Session::begin rejected: {e}");
                None
            }
        }
    }

    fn try_begin(init_state: &[u8], state_size: usize, compare_size: usize) -> Result<Self, BeginError> {
        if state_size == 0 {
            return Err(BeginError::StateSizeZero(state_size));
        }
        if compare_size > state_size {
            return Err(BeginError::CompareSizeTooLarge { compare_size, state_size });
        }
        if init_state.len() != state_size {
            return Err(BeginError::InitialStateWrongLength { expected: state_size, actual: init_state.len() });
        }
        if padded_slot_size(state_size) > usize::from(u16::MAX) {
            return Err(BeginError::SlotSizeOverflow);
        }
        let compare_size = if compare_size == 0 { state_size } else { compare_size };

        let mut positions: Arena<Position> = Arena::new();
        let hash = hash_bytes(&init_state[..compare_size]);
        let root_id = positions.alloc(Position::new(None, 0, hash, init_state.into())).ok_or(BeginError::OutOfMemory)?;

        let mut filter = PresenceFilter::try_new();
        if let Some(filter) = filter.as_mut() {
            filter.set(hash);
        } else {
            debug!("presence filter allocation failed; session proceeding without one");
        }

        Ok(Self {
            positions,
            branches: Arena::new(),
            filter,
            root: PositionId(root_id),
            state_size,
            compare_size,
            policy: GraftPolicy::default(),
            changed: false,
        })
    }

    /// `end(session)` (spec §4.9). Dropping the session does the
    /// same; this exists only so collaborators can pair it visibly
    /// with `begin`.
    pub fn end(self) {}

    /// `set_graft_policy(new)` (spec §4.9): installs `new`, returning
    /// the previous policy.
    pub fn set_graft_policy(&mut self, new: GraftPolicy) -> GraftPolicy {
        std::mem::replace(&mut self.policy, new)
    }

    /// `first_position` (spec §4.9): the session's root.
    #[must_use]
    pub fn first_position(&self) -> PositionId {
        self.root
    }

    /// `session_size` (spec §4.9): live position count, including the
    /// root.
    #[must_use]
    pub fn session_size(&self) -> usize {
        self.positions.len()
    }

    /// `get_saved_state(p)` (spec §4.9): the full `S`-byte state
    /// buffer stored at `p`.
    #[must_use]
    pub fn get_saved_state(&self, p: PositionId) -> &[u8] {
        &self.positions.get(p.0).state
    }

    /// `update_saved_state(p, bytes)` (spec §4.9): overwrites only the
    /// extra-state region (`compare_size..state_size`); the
    /// comparable prefix is left untouched. Matches the reference
    /// implementation's lack of length checking on `bytes` beyond
    /// never reading or writing past either buffer's end.
    pub fn update_saved_state(&mut self, p: PositionId, bytes: &[u8]) {
        let extra_len = self.state_size - self.compare_size;
        if extra_len == 0 || bytes.len() <= self.compare_size {
            return;
        }
        let n = (bytes.len() - self.compare_size).min(extra_len);
        let state = &mut self.positions.get_mut(p.0).state;
        state[self.compare_size..self.compare_size + n].copy_from_slice(&bytes[self.compare_size..self.compare_size + n]);
    }

    /// `get_next(p, move)` (spec §4.9, §4.4): MRU-promoting child
    /// lookup.
    pub fn get_next(&mut self, p: PositionId, mv: u64) -> Option<PositionId> {
        tree::get_next(&mut self.positions, &mut self.branches, p, mv)
    }

    /// The position that `p` was reached from, or `None` for the root
    /// (spec §3's `prev` field). `redo.h` exposes this as a public
    /// struct member (`redo_position.prev`); since [`PositionId`] is
    /// opaque here, a read accessor stands in for that field access.
    #[must_use]
    pub fn parent(&self, p: PositionId) -> Option<PositionId> {
        self.positions.get(p.0).parent
    }

    /// The equivalent, strictly-shorter position `p` has been found to
    /// resolve to, if any (spec §3's `better` field).
    #[must_use]
    pub fn better(&self, p: PositionId) -> Option<PositionId> {
        self.positions.get(p.0).better
    }

    /// Moves from the session root to `p` (spec §3's `movecount`).
    #[must_use]
    pub fn movecount(&self, p: PositionId) -> u32 {
        self.positions.get(p.0).movecount
    }

    /// The `(end, size)` pair describing the best solution reachable
    /// from `p`'s subtree, or `None` if no endpoint is reachable (spec
    /// §3's `solution_size`/`solution_end`, §4.7).
    #[must_use]
    pub fn solution(&self, p: PositionId) -> Option<(i64, u32)> {
        self.positions.get(p.0).solution
    }

    /// Whether `p` was itself created with a nonzero `endpoint` value
    /// (spec §3's `endpoint` flag).
    #[must_use]
    pub fn is_endpoint(&self, p: PositionId) -> bool {
        self.positions.get(p.0).own_endpoint.is_some()
    }

    /// Number of direct children of `p` (spec §3's `nextcount`).
    #[must_use]
    pub fn child_count(&self, p: PositionId) -> u32 {
        self.positions.get(p.0).child_count
    }

    /// The direct children of `p`, as `(move, child)` pairs, in
    /// current MRU order (spec §4.4). Does not itself promote
    /// anything; only [`Session::get_next`] does that.
    #[must_use]
    pub fn children(&self, p: PositionId) -> Vec<(u64, PositionId)> {
        tree::children(&self.positions, &self.branches, p)
            .into_iter()
            .map(|(b, c)| (self.branches.get(b.0).mv, c))
            .collect()
    }

    /// `add_position(prev, move, state, endpoint, check)` (spec
    /// §4.4-4.6, §4.9).
    ///
    /// `state` must be exactly `S` bytes; `endpoint == 0` means "not
    /// an endpoint". Re-issuing an existing `(prev, move)` pair
    /// returns the existing child unchanged, performing no further
    /// work (the round-trip law in spec §8).
    ///
    /// One reference-implementation detail not spelled out by the
    /// operation's prose: under `Check`, a newly created position
    /// that is itself an endpoint never triggers the equivalence
    /// search at all (see the design ledger). `CheckLater` has no
    /// such exception — deferral always happens regardless of
    /// endpoint.
    pub fn add_position(&mut self, prev: PositionId, mv: u64, state: &[u8], endpoint: i64, check: CheckMode) -> Option<PositionId> {
        if let Some(existing) = tree::find_branch(&self.positions, &self.branches, prev, mv) {
            return Some(self.branches.get(existing.0).child);
        }

        let hash = hash_bytes(&state[..self.compare_size]);

        // The equivalence search must run before the new position is
        // allocated: arena slots are reused LIFO (see `arena.rs`), so a
        // freed low index can be handed to the new position ahead of a
        // genuinely pre-existing equivalent at a higher index, and
        // `find_equivalent`'s index-order scan would then return the
        // new position itself instead of that equivalent.
        let equiv = if check == CheckMode::Check && endpoint == 0 {
            find_equivalent(&self.positions, self.filter.as_ref(), state, self.compare_size)
        } else {
            None
        };

        let (n, is_new) = tree::create_child(&mut self.positions, &mut self.branches, prev, mv, state.into(), hash)?;
        debug_assert!(is_new, "branch existence was already checked above");

        if endpoint != 0 {
            establish_endpoint(&mut self.positions, n, endpoint);
        }

        match check {
            CheckMode::NoCheck | CheckMode::Check => {}
            CheckMode::CheckLater => {
                self.positions.get_mut(n.0).pending_equivalence = true;
            }
        }
        if let Some(e) = equiv {
            self.apply_equivalence(n, e);
        }

        if let Some(filter) = self.filter.as_mut() {
            filter.set(hash);
        }
        self.changed = true;
        Some(n)
    }

    fn apply_equivalence(&mut self, n: PositionId, e: PositionId) {
        let n_movecount = self.positions.get(n.0).movecount;
        let e_movecount = self.positions.get(e.0).movecount;
        if n_movecount >= e_movecount {
            self.positions.get_mut(n.0).better = Some(e);
        } else {
            self.positions.get_mut(e.0).better = Some(n);
            apply_policy(&mut self.positions, &mut self.branches, self.policy, n, e);
        }
    }

    /// `drop_position(p)` (spec §4.9, §4.7): removes a childless,
    /// non-root position, returning its parent. Returns `p` unchanged
    /// if it has children or is the root — these are normal non-error
    /// outcomes, not failures.
    pub fn drop_position(&mut self, p: PositionId) -> PositionId {
        let pos = self.positions.get(p.0);
        let Some(parent) = pos.parent else { return p };
        if pos.child_count != 0 {
            return p;
        }

        tree::drop_branch(&mut self.positions, &mut self.branches, parent, p);
        let better = self.positions.get(p.0).better;
        for (_, pos) in self.positions.iter_mut() {
            if pos.better == Some(p) {
                pos.better = better;
            }
        }
        self.positions.free(p.0);

        recalc_solutions_to_root(&mut self.positions, &self.branches, parent);
        self.rebuild_presence_filter();
        self.changed = true;
        parent
    }

    fn rebuild_presence_filter(&mut self) {
        let Some(filter) = self.filter.as_mut() else { return };
        filter.clear();
        for (_, p) in self.positions.iter() {
            filter.set(p.hash);
        }
    }

    /// `suppress_cycle(&p, state, prunelimit)` (spec §4.8): walks from
    /// `*cursor` toward the root looking for a stored position whose
    /// comparable bytes match `state`'s. On a match, `*cursor` is set
    /// to that position; if the match was within `prunelimit` steps,
    /// the dead-end tail is pruned. Returns `false` (no change) if the
    /// root is passed without a match.
    pub fn suppress_cycle(&mut self, cursor: &mut PositionId, state: &[u8], prunelimit: u32) -> bool {
        let comparable = &state[..self.compare_size];
        let former_cursor = *cursor;
        let mut p = *cursor;
        let mut n = 0u32;
        loop {
            if self.positions.get(p.0).state[..self.compare_size] == *comparable {
                *cursor = p;
                if n < prunelimit {
                    self.prune_chain(former_cursor, p);
                }
                return true;
            }
            match self.positions.get(p.0).parent {
                Some(parent) => {
                    p = parent;
                    n += 1;
                }
                None => return false,
            }
        }
    }

    /// `prune_chain(leaf, stop)` (spec §4.8): deletes nodes from
    /// `leaf` toward `stop`, one at a time, stopping immediately (and
    /// leaving whatever remains) upon reaching a node with any
    /// remaining child once the chain child below it has already been
    /// unlinked — i.e. another branch escapes the chain. Rebuilds the
    /// presence filter only if at least one node was actually freed —
    /// deliberately asymmetric with `drop_position`'s unconditional
    /// rebuild (see the design ledger).
    fn prune_chain(&mut self, leaf: PositionId, stop: PositionId) {
        let mut pos = Some(leaf);
        let mut freed_any = false;
        let mut current_leaf = leaf;

        while let Some(id) = pos {
            if id == stop {
                break;
            }
            if self.positions.get(id.0).child_count >= 1 {
                break;
            }
            let parent = self.positions.get(id.0).parent;
            let Some(parent) = parent else { break };
            current_leaf = id;
            tree::drop_branch(&mut self.positions, &mut self.branches, parent, current_leaf);
            self.positions.free(current_leaf.0);
            freed_any = true;
            self.changed = true;
            pos = Some(parent);
        }

        if freed_any {
            self.rebuild_presence_filter();
        }
    }

    /// `duplicate_path(dest, src) -> bool` (spec §4.6).
    pub fn duplicate_path(&mut self, dest: PositionId, src: PositionId) -> bool {
        let ok = duplicate_path(&mut self.positions, &mut self.branches, dest, src);
        if ok {
            self.changed = true;
        }
        ok
    }

    /// `setbetter_sweep` (spec §4.5): resolves every position still
    /// carrying a deferred equivalence flag. Returns the number of
    /// non-nil `better` assignments made.
    pub fn setbetter_sweep(&mut self) -> u32 {
        let n = setbetter_sweep(&mut self.positions, self.filter.as_ref(), self.compare_size);
        if n > 0 {
            self.changed = true;
        }
        n
    }

    /// `has_changed` (spec §4.9, §5): reads the change flag without
    /// clearing it.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.changed
    }

    /// `clear_changed` (spec §4.9, §5): reads and clears the change
    /// flag in one step.
    pub fn clear_changed(&mut self) -> bool {
        std::mem::replace(&mut self.changed, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(byte1: u8) -> [u8; 33] {
        let mut s = [b'.'; 33];
        s[1] = byte1;
        s
    }

    #[test]
    fn begin_rejects_zero_size() {
        assert!(Session::begin(&[], 0, 0).is_none());
    }

    #[test]
    fn begin_rejects_compare_size_too_large() {
        assert!(Session::begin(&[0; 4], 4, 5).is_none());
    }

    #[test]
    fn begin_rejects_wrong_length_initial_state() {
        assert!(Session::begin(&[0; 3], 4, 0).is_none());
    }

    #[test]
    fn seed_scenario_one_add_and_session_size() {
        let root_state = [0u8; 33];
        let mut session = Session::begin(&root_state, 33, 32).unwrap();
        let root = session.first_position();
        let a = session.add_position(root, b'a' as u64, &state(b'a'), 0, CheckMode::Check).unwrap();
        assert_eq!(session.positions.get(root.0).child_count, 1);
        assert_eq!(session.session_size(), 2);
        assert!(session.clear_changed());
        assert!(session.positions.get(a.0).solution.is_none());
    }

    #[test]
    fn add_position_is_idempotent_for_same_move() {
        let root_state = [0u8; 33];
        let mut session = Session::begin(&root_state, 33, 32).unwrap();
        let root = session.first_position();
        let a1 = session.add_position(root, 1, &state(b'a'), 0, CheckMode::Check).unwrap();
        let size_after_first = session.session_size();
        let a2 = session.add_position(root, 1, &state(b'a'), 0, CheckMode::Check).unwrap();
        assert_eq!(a1, a2);
        assert_eq!(session.session_size(), size_after_first);
    }

    #[test]
    fn drop_position_round_trips_session_size() {
        let root_state = [0u8; 33];
        let mut session = Session::begin(&root_state, 33, 32).unwrap();
        let root = session.first_position();
        let before = session.session_size();
        let a = session.add_position(root, 1, &state(b'a'), 0, CheckMode::NoCheck).unwrap();
        let parent = session.drop_position(a);
        assert_eq!(parent, root);
        assert_eq!(session.session_size(), before);
    }

    #[test]
    fn suppress_cycle_collapses_and_prunes() {
        let root_state = [0u8; 33];
        let mut session = Session::begin(&root_state, 33, 32).unwrap();
        let root = session.first_position();
        let a1 = session.add_position(root, 1, &state(b'x'), 0, CheckMode::NoCheck).unwrap();
        let a2 = session.add_position(a1, 2, &state(b'y'), 0, CheckMode::NoCheck).unwrap();
        let a3 = session.add_position(a2, 3, &state(b'z'), 0, CheckMode::NoCheck).unwrap();
        let mut cursor = a3;
        let found = session.suppress_cycle(&mut cursor, &root_state, 3);
        assert!(found);
        assert_eq!(cursor, root);
        assert_eq!(session.session_size(), 1);
    }

    #[test]
    fn add_position_finds_equivalent_even_when_new_node_reuses_a_lower_index() {
        let root_state = [0u8; 33];
        let mut session = Session::begin(&root_state, 33, 32).unwrap();
        let root = session.first_position();

        let q = session.add_position(root, 1, &state(b'q'), 0, CheckMode::NoCheck).unwrap();
        let e = session.add_position(root, 2, &state(b'e'), 0, CheckMode::NoCheck).unwrap();
        session.drop_position(q);

        // n's freshly allocated slot reuses q's freed (lower-index) slot;
        // that must not make the equivalence scan return n itself
        // instead of the genuinely pre-existing e.
        let n = session.add_position(root, 3, &state(b'e'), 0, CheckMode::Check).unwrap();
        assert_eq!(session.better(n), Some(e));
    }

    #[test]
    fn prune_chain_stops_at_a_node_with_an_escaping_sibling() {
        let root_state = [0u8; 33];
        let mut session = Session::begin(&root_state, 33, 32).unwrap();
        let root = session.first_position();
        let a = session.add_position(root, 1, &state(b'a'), 0, CheckMode::NoCheck).unwrap();
        let b = session.add_position(a, 2, &state(b'b'), 0, CheckMode::NoCheck).unwrap();
        let c = session.add_position(a, 3, &state(b'c'), 0, CheckMode::NoCheck).unwrap();

        let mut cursor = b;
        let found = session.suppress_cycle(&mut cursor, &root_state, 3);

        assert!(found);
        assert_eq!(cursor, root);
        assert_eq!(session.child_count(a), 1, "a survives, still holding its other child");
        assert_eq!(session.parent(c), Some(a), "c's subtree is not orphaned");
        assert_eq!(session.session_size(), 3, "root, a and c remain; only b is pruned");
    }

    #[test]
    fn endpoint_propagates_solution_size_to_root() {
        let root_state = [0u8; 33];
        let mut session = Session::begin(&root_state, 33, 32).unwrap();
        let root = session.first_position();
        let a = session.add_position(root, 1, &state(b'a'), 0, CheckMode::NoCheck).unwrap();
        let b = session.add_position(a, 2, &state(b'b'), 0, CheckMode::NoCheck).unwrap();
        session.add_position(b, 3, &state(b'c'), 1, CheckMode::NoCheck).unwrap();
        assert_eq!(session.positions.get(root.0).solution, Some((1, 3)));
    }
}
