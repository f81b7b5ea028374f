//! A tiny sokoban-style puzzle: the example collaborator this crate
//! uses to drive `redo_core`.
//!
//! The state representation follows `sokoban-example.c` (see
//! `examples/original_source/sokoban-example.c`): a position is the
//! pawn's cell followed by every box's cell, with the boxes kept in a
//! canonical sorted order so that two states differing only in which
//! physical box sits where are still byte-identical. `redo_core` never
//! sees any of this; it only ever receives the encoded bytes.

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Move {
    Left,
    Down,
    Up,
    Right,
}

impl Move {
    pub const ALL: [Move; 4] = [Move::Left, Move::Down, Move::Up, Move::Right];

    /// Matches `sokoban-example.c`'s `cmd_left`..`cmd_right` constants,
    /// so a persisted move label stays meaningful to a human reading a
    /// hex dump of a saved session the way the original's would.
    #[must_use]
    pub fn label(self) -> u64 {
        match self {
            Move::Left => 1,
            Move::Down => 2,
            Move::Up => 3,
            Move::Right => 4,
        }
    }

    #[must_use]
    pub fn from_label(label: u64) -> Option<Move> {
        Some(match label {
            1 => Move::Left,
            2 => Move::Down,
            3 => Move::Up,
            4 => Move::Right,
            _ => return None,
        })
    }
}

/// A game position: the pawn's cell, and every box's cell in
/// ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub pawn: usize,
    pub boxes: Vec<usize>,
}

/// The static part of the puzzle (walls and goals) plus the starting
/// position. Deliberately small: this crate exists to demonstrate
/// `redo_core`, not to be a serious sokoban implementation.
pub struct Level {
    width: usize,
    walls: Vec<bool>,
    goals: Vec<bool>,
    start: State,
}

fn checked_offset(pos: usize, delta: isize, len: usize) -> Option<usize> {
    let next = pos as isize + delta;
    if next < 0 || next as usize >= len {
        None
    } else {
        Some(next as usize)
    }
}

impl Level {
    /// A small fully-enclosed two-box level: push the box above each
    /// goal down onto it.
    ///
    /// ```text
    /// #######
    /// #  @  #
    /// # $ $ #
    /// #     #
    /// # . . #
    /// #     #
    /// #######
    /// ```
    #[must_use]
    pub fn demo() -> Level {
        let rows = ["#######", "#  @  #", "# $ $ #", "#     #", "# . . #", "#     #", "#######"];
        let width = rows[0].len();
        let mut walls = Vec::new();
        let mut goals = Vec::new();
        let mut pawn = 0;
        let mut boxes = Vec::new();
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let pos = y * width + x;
                walls.push(ch == '#');
                goals.push(ch == '.');
                match ch {
                    '@' => pawn = pos,
                    '$' => boxes.push(pos),
                    _ => {}
                }
            }
        }
        boxes.sort_unstable();
        Level { width, walls, goals, start: State { pawn, boxes } }
    }

    #[must_use]
    pub fn start(&self) -> &State {
        &self.start
    }

    /// `(box_count + 1) * 2` bytes: a little-endian `u16` per cell.
    #[must_use]
    pub fn state_size(&self) -> usize {
        (self.start.boxes.len() + 1) * 2
    }

    #[must_use]
    pub fn encode(&self, state: &State) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.state_size());
        out.extend_from_slice(&u16::try_from(state.pawn).unwrap_or(u16::MAX).to_le_bytes());
        for &b in &state.boxes {
            out.extend_from_slice(&u16::try_from(b).unwrap_or(u16::MAX).to_le_bytes());
        }
        out
    }

    #[must_use]
    pub fn decode(&self, bytes: &[u8]) -> State {
        let pawn = usize::from(u16::from_le_bytes([bytes[0], bytes[1]]));
        let boxes = bytes[2..].chunks_exact(2).map(|c| usize::from(u16::from_le_bytes([c[0], c[1]]))).collect();
        State { pawn, boxes }
    }

    #[must_use]
    pub fn is_solved(&self, state: &State) -> bool {
        state.boxes.iter().all(|&b| self.goals[b])
    }

    fn delta(&self, mv: Move) -> isize {
        match mv {
            Move::Left => -1,
            Move::Right => 1,
            Move::Up => -(self.width as isize),
            Move::Down => self.width as isize,
        }
    }

    /// Applies `mv` to `state`, returning the resulting state, or
    /// `None` if the move is illegal (into a wall, or pushing a box
    /// into a wall or another box). Pure: `state` is never mutated in
    /// place, unlike `sokoban-example.c`'s global `game` struct.
    #[must_use]
    pub fn apply_move(&self, state: &State, mv: Move) -> Option<State> {
        if matches!(mv, Move::Left) && state.pawn % self.width == 0 {
            return None;
        }
        if matches!(mv, Move::Right) && state.pawn % self.width == self.width - 1 {
            return None;
        }
        let delta = self.delta(mv);
        let dest = checked_offset(state.pawn, delta, self.walls.len())?;
        if self.walls[dest] {
            return None;
        }

        let mut boxes = state.boxes.clone();
        if let Some(box_idx) = boxes.iter().position(|&b| b == dest) {
            if matches!(mv, Move::Left) && dest % self.width == 0 {
                return None;
            }
            if matches!(mv, Move::Right) && dest % self.width == self.width - 1 {
                return None;
            }
            let box_dest = checked_offset(dest, delta, self.walls.len())?;
            if self.walls[box_dest] || boxes.contains(&box_dest) {
                return None;
            }
            boxes[box_idx] = box_dest;
            boxes.sort_unstable();
        }

        Some(State { pawn: dest, boxes })
    }
}
