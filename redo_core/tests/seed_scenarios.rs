//! The seed scenarios from `spec.md` §8, exercised through the public
//! `Session` facade rather than any internal module. `S = 33`,
//! `C = 32`, root state all-zeros, as specified.

use redo_core::{CheckMode, Session};

const S: usize = 33;
const C: usize = 32;

fn root_state() -> [u8; S] {
    [0u8; S]
}

/// A comparable state: 32 bytes of `.` with `byte[1]` overridden, plus
/// one extra (uncompared) byte.
fn state(tag: u8) -> [u8; S] {
    let mut s = [b'.'; S];
    s[1] = tag;
    s
}

#[test_log::test]
fn scenario_1_add_single_child() {
    let mut session = Session::begin(&root_state(), S, C).unwrap();
    let root = session.first_position();

    let a = session.add_position(root, b'a'.into(), &state(b'a'), 0, CheckMode::Check).unwrap();

    assert_eq!(session.child_count(root), 1);
    assert_eq!(session.session_size(), 2);
    assert!(session.clear_changed());
    assert_eq!(session.solution(root), None);
    assert_eq!(session.solution(a), None);
}

#[test_log::test]
fn scenario_2_equivalent_shorter_sibling_grafts_deeper_descendant() {
    let mut session = Session::begin(&root_state(), S, C).unwrap();
    let root = session.first_position();

    // Four siblings at depth 1, added before the branch that will
    // collide with one of them.
    let a = session.add_position(root, b'a'.into(), &state(b'a'), 0, CheckMode::Check).unwrap();
    session.add_position(root, b'b'.into(), &state(b'b'), 0, CheckMode::Check).unwrap();
    session.add_position(root, b'd'.into(), &state(b'd'), 0, CheckMode::Check).unwrap();

    // Three moves down the 'a' branch, with its own child/subtree and
    // an endpoint, so there is something concrete to graft.
    let a2 = session.add_position(a, 1, &state(b'x'), 0, CheckMode::Check).unwrap();
    let a3 = session.add_position(a2, 2, &state(b'y'), 0, CheckMode::Check).unwrap();
    let a3_child = session.add_position(a3, 3, &state(b'z'), 1, CheckMode::Check).unwrap();
    assert_eq!(session.movecount(a3), 3);
    assert_eq!(session.solution(root), Some((1, 4)));

    // 'c', added last, happens to hold the same comparable state as
    // a3 (depth 1 vs. depth 3) -- a3 is the equivalent, longer path.
    let c = session.add_position(root, b'c'.into(), &state(b'y'), 0, CheckMode::Check).unwrap();

    assert_eq!(session.better(a3), Some(c));
    assert_eq!(session.better(c), None);
    assert_eq!(session.child_count(a3), 0, "a3 becomes a leaf once its subtree is grafted away");
    assert_eq!(session.child_count(c), 1, "c inherits a3's former child");
    assert_eq!(session.parent(a3_child), Some(c));
    // delta = movecount(c) - movecount(a3) = 1 - 3 = -2
    assert_eq!(session.movecount(a3_child), 2);
    assert_eq!(session.solution(root), Some((1, 3)), "root's best solution now runs through c, not a3");
}

#[test_log::test]
fn scenario_3_higher_movecount_endpoint_of_same_size_does_not_override() {
    let mut session = Session::begin(&root_state(), S, C).unwrap();
    let root = session.first_position();

    let mut cursor = root;
    for i in 0..5u8 {
        cursor = session.add_position(cursor, u64::from(i), &state(b'0' + i), if i == 4 { 1 } else { 0 }, CheckMode::NoCheck).unwrap();
    }
    assert_eq!(session.solution(root), Some((1, 5)));

    // A second 5-move branch reaching an endpoint elsewhere: root's
    // solution is already as good, so it is untouched.
    let mut other = root;
    for i in 0..5u8 {
        other = session.add_position(other, 100 + u64::from(i), &state(b'A' + i), if i == 4 { 1 } else { 0 }, CheckMode::NoCheck).unwrap();
    }
    assert_eq!(session.solution(root), Some((1, 5)));

    // A shorter, 4-move branch does improve it.
    let mut shorter = root;
    for i in 0..4u8 {
        shorter = session.add_position(shorter, 200 + u64::from(i), &state(b'M' + i), if i == 3 { 1 } else { 0 }, CheckMode::NoCheck).unwrap();
    }
    let _ = shorter;
    assert_eq!(session.solution(root), Some((1, 4)));
}

#[test_log::test]
fn scenario_4_suppress_cycle_collapses_and_prunes_dead_tail() {
    let mut session = Session::begin(&root_state(), S, C).unwrap();
    let root = session.first_position();

    let a1 = session.add_position(root, 1, &state(b'p'), 0, CheckMode::NoCheck).unwrap();
    let a2 = session.add_position(a1, 1, &state(b'q'), 0, CheckMode::NoCheck).unwrap();
    let a3 = session.add_position(a2, 1, &state(b'r'), 0, CheckMode::NoCheck).unwrap();
    assert_eq!(session.session_size(), 4);

    let mut tail = a3;
    let found = session.suppress_cycle(&mut tail, &root_state(), 3);

    assert!(found);
    assert_eq!(tail, root);
    assert_eq!(session.session_size(), 1, "the three intermediate positions are freed");
}

#[test_log::test]
fn scenario_5_solution_end_tracks_the_highest_endpoint_value() {
    let mut session = Session::begin(&root_state(), S, C).unwrap();
    let root = session.first_position();

    // A long (5-move) branch ending in the highest-value endpoint.
    let mut best = root;
    for i in 0..5u8 {
        best = session.add_position(best, u64::from(i), &state(b'a' + i), if i == 4 { 3 } else { 0 }, CheckMode::NoCheck).unwrap();
    }
    // A much shorter (2-move) branch ending in a lower-value endpoint.
    let mut shorter = root;
    for i in 0..2u8 {
        shorter = session.add_position(shorter, 50 + u64::from(i), &state(b'A' + i), if i == 1 { 1 } else { 0 }, CheckMode::NoCheck).unwrap();
    }
    let _ = shorter;

    assert_eq!(session.solution(root), Some((3, 5)), "higher endpoint value wins even though it is the longer path");
}

#[test_log::test]
fn scenario_6_second_setbetter_sweep_is_a_no_op() {
    let mut session = Session::begin(&root_state(), S, C).unwrap();
    let root = session.first_position();
    session.add_position(root, 1, &state(b'a'), 0, CheckMode::CheckLater).unwrap();
    session.add_position(root, 2, &state(b'a'), 0, CheckMode::CheckLater).unwrap();

    let first = session.setbetter_sweep();
    assert_eq!(first, 1);

    let second = session.setbetter_sweep();
    assert_eq!(second, 0);
}
