//! Saving and reloading a session's tree to a file, mirroring
//! `sokoban-example.c`'s `savesession`/`loadsession` (see
//! `examples/original_source/sokoban-example.c`). `redo_core` itself
//! defines no file format (spec.md §1, §6); this module is entirely
//! this collaborator's responsibility, matching the original's
//! comment that its own `savesession` "could be used with almost any
//! implementation that has move values in the range 0 to 125".
//!
//! A run of single-child positions is written as a plain sequence of
//! move bytes. A position with more than one child is preceded by a
//! start marker, with each subsequent sibling introduced by a
//! separator, and the whole group closed by a close-branch marker.
//! The high bit of a move byte records whether that position's
//! `better` field was non-nil, so the reload can replay every
//! position with [`CheckMode::CheckLater`] and recover the same
//! better-pointers in one [`Session::setbetter_sweep`] call instead of
//! re-running `Check` resolution (and its potential grafting) a
//! second time.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use color_eyre::eyre::{Result, eyre};
use log::info;
use redo_core::{CheckMode, PositionId, Session};

use crate::level::{Level, Move, State};

const CMD_START_BRANCH: u8 = 0x7E;
const CMD_MARK_SIBLING: u8 = 0x7F;
const CMD_CLOSE_BRANCH: u8 = 0xFE;
const BETTER_FLAG: u8 = 0x80;

fn move_byte(session: &Session, mv: Move, child: PositionId) -> u8 {
    let flag = if session.better(child).is_some() { BETTER_FLAG } else { 0 };
    (mv.label() as u8) | flag
}

fn save_recurse(session: &Session, writer: &mut impl Write, position: PositionId) -> Result<()> {
    let children = session.children(position);
    match children.as_slice() {
        [] => Ok(()),
        [(mv, child)] => {
            let mv = Move::from_label(*mv).ok_or_else(|| eyre!("unrecognized move label in tree"))?;
            writer.write_all(&[move_byte(session, mv, *child)])?;
            save_recurse(session, writer, *child)
        }
        many => {
            for (i, &(mv, child)) in many.iter().enumerate() {
                let mv = Move::from_label(mv).ok_or_else(|| eyre!("unrecognized move label in tree"))?;
                writer.write_all(&[if i == 0 { CMD_START_BRANCH } else { CMD_MARK_SIBLING }])?;
                writer.write_all(&[move_byte(session, mv, child)])?;
                save_recurse(session, writer, child)?;
            }
            writer.write_all(&[CMD_CLOSE_BRANCH])?;
            Ok(())
        }
    }
}

/// Writes the session's entire tree to `path`.
pub fn save(session: &Session, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    save_recurse(session, &mut writer, session.first_position())?;
    Ok(())
}

fn read_byte(reader: &mut impl Read) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    match reader.read(&mut byte)? {
        0 => Ok(None),
        _ => Ok(Some(byte[0])),
    }
}

/// Reads one subtree's worth of moves from `reader`, replaying them
/// under `position` (whose reconstructed game state is `state`).
/// Returns `true` if a sibling separator was hit (the caller should
/// loop and parse another branch), `false` on a close marker or EOF.
fn load_recurse(session: &mut Session, level: &Level, reader: &mut impl Read, position: PositionId, state: &State) -> Result<bool> {
    let mut position = position;
    let mut state = state.clone();
    loop {
        let Some(byte) = read_byte(reader)? else { return Ok(false) };
        match byte {
            CMD_CLOSE_BRANCH => return Ok(false),
            CMD_MARK_SIBLING => return Ok(true),
            CMD_START_BRANCH => {
                while load_recurse(session, level, reader, position, &state)? {}
                // A branch group is the last thing `save_recurse` ever
                // writes for a given position (see its match arms):
                // once the group's closing marker has been consumed,
                // this position's own sequence is finished too.
                return Ok(false);
            }
            _ => {
                let mv = Move::from_label(u64::from(byte & !BETTER_FLAG))
                    .ok_or_else(|| eyre!("corrupt session file: unrecognized move byte {byte:#x}"))?;
                let next_state = level
                    .apply_move(&state, mv)
                    .ok_or_else(|| eyre!("corrupt session file: saved move {mv:?} is illegal from the reconstructed state"))?;
                let bytes = level.encode(&next_state);
                let endpoint = i64::from(level.is_solved(&next_state));
                let check = if byte & BETTER_FLAG != 0 { CheckMode::CheckLater } else { CheckMode::NoCheck };
                position = session
                    .add_position(position, mv.label(), &bytes, endpoint, check)
                    .ok_or_else(|| eyre!("redo_core ran out of memory while reloading the session"))?;
                state = next_state;
            }
        }
    }
}

/// Rebuilds `session`'s tree from a file written by [`save`]. Every
/// reloaded position is added with [`CheckMode::NoCheck`] or
/// [`CheckMode::CheckLater`] (never `Check`) — equivalence is resolved
/// in bulk afterward by the caller's [`Session::setbetter_sweep`]
/// call, exactly as `sokoban-example.c`'s `loadsession` follows its
/// replay with `redo_setbetterfields`.
pub fn load(session: &mut Session, level: &Level, path: &Path) -> Result<()> {
    let mut reader = BufReader::new(File::open(path)?);
    let root = session.first_position();
    let root_state = level.decode(session.get_saved_state(root));
    load_recurse(session, level, &mut reader, root, &root_state)?;
    Ok(())
}

/// Builds a small exploration tree, saves it, reloads it into a fresh
/// session via deferred equivalence checking, and confirms the two
/// agree on size.
pub fn roundtrip(level: &Level, session: &mut Session, path: &Path) -> Result<()> {
    crate::explore(level, session, 2_000)?;
    info!("built a tree of {} position(s) to round-trip", session.session_size());

    save(session, path)?;
    info!("saved session to {}", path.display());

    let mut reloaded = Session::begin(&level.encode(level.start()), level.state_size(), 0)
        .ok_or_else(|| eyre!("redo_core rejected the puzzle's initial state"))?;
    load(&mut reloaded, level, path)?;
    let assigned = reloaded.setbetter_sweep();
    info!("setbetter_sweep resolved {assigned} deferred position(s)");

    if reloaded.session_size() != session.session_size() {
        return Err(eyre!(
            "reloaded session has {} position(s), original had {}",
            reloaded.session_size(),
            session.session_size()
        ));
    }

    println!("round-trip OK: {} position(s) reloaded from {}", reloaded.session_size(), path.display());
    Ok(())
}
