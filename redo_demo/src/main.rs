#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]

//! A small command-line collaborator for `redo_core`, grounded in
//! `examples/original_source/sokoban-example.c`. It owns all sokoban
//! rule knowledge; `redo_core` only ever sees opaque state bytes and
//! move labels (spec.md §1). Its absence would not change anything
//! `redo_core` promises — it exists purely to show the library's
//! operations being driven by a real (if tiny) caller.

mod level;
mod persist;

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use log::info;
use redo_core::{CheckMode, Session};

use crate::level::{Level, Move};

/// Explores a tiny sokoban puzzle through `redo_core`'s exploration
/// tree, demonstrating undo/redo history, cycle suppression, and
/// equivalence-driven grafting.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a sequence of moves and print the resulting history at
    /// each step.
    Play {
        #[arg(value_enum, num_args = 1.., required = true)]
        moves: Vec<Move>,
    },
    /// Explore the puzzle breadth-first, recording every position
    /// visited as history, and report the shortest solution found.
    Solve {
        /// Stop expanding new positions after visiting this many.
        #[arg(long, default_value_t = 50_000)]
        node_limit: usize,
    },
    /// Solve the puzzle, save the resulting tree to a file, reload it
    /// with deferred equivalence checking, and confirm the reload
    /// agrees with the original.
    Roundtrip {
        #[arg(long, default_value = "./session")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();

    let cli = Cli::parse();
    let level = Level::demo();
    let mut session = Session::begin(&level.encode(level.start()), level.state_size(), 0)
        .ok_or_else(|| eyre!("redo_core rejected the puzzle's initial state"))?;

    match cli.command {
        Command::Play { moves } => play(&level, &mut session, &moves),
        Command::Solve { node_limit } => {
            explore(&level, &mut session, node_limit)?;
            report_solution(&session);
            Ok(())
        }
        Command::Roundtrip { path } => persist::roundtrip(&level, &mut session, &path),
    }
}

/// Applies `moves` one at a time from the session's root, printing
/// the move count and tree size after each legal move. A move that
/// would revisit an earlier state on the current path is collapsed
/// via [`Session::suppress_cycle`] instead of being recorded again.
fn play(level: &Level, session: &mut Session, moves: &[Move]) -> Result<()> {
    let mut cursor = session.first_position();
    for &mv in moves {
        let state = level.decode(session.get_saved_state(cursor));
        let Some(next) = level.apply_move(&state, mv) else {
            info!("{mv:?} is illegal from the current position; skipping");
            continue;
        };
        let bytes = level.encode(&next);

        if session.suppress_cycle(&mut cursor, &bytes, 4) {
            info!("{mv:?} revisits an earlier state on this path; cursor rewound instead");
            continue;
        }

        let endpoint = i64::from(level.is_solved(&next));
        cursor = session
            .add_position(cursor, mv.label(), &bytes, endpoint, CheckMode::Check)
            .ok_or_else(|| eyre!("redo_core ran out of memory while adding a position"))?;
        println!(
            "{mv:?}: movecount={}, session_size={}{}",
            session.movecount(cursor),
            session.session_size(),
            session.better(cursor).map_or(String::new(), |b| format!(", better at movecount {}", session.movecount(b)))
        );
    }
    report_solution(session);
    Ok(())
}

/// Breadth-first exploration of the puzzle's state graph. Every state
/// reached is recorded via [`Session::add_position`] regardless of
/// whether it has been seen before, so `redo_core`'s equivalence
/// engine and grafting policy run exactly as they would for a human
/// wandering into a previously visited room by a different route.
/// `visited` exists purely to bound how many *distinct* states this
/// function goes on to expand — it has nothing to do with `redo_core`,
/// which tracks the full (possibly redundant) history regardless.
pub(crate) fn explore(level: &Level, session: &mut Session, node_limit: usize) -> Result<()> {
    let root = session.first_position();
    let mut visited: HashSet<Vec<u8>> = HashSet::new();
    visited.insert(session.get_saved_state(root).to_vec());

    let mut queue = VecDeque::new();
    queue.push_back(root);
    let mut explored = 0usize;

    while let Some(p) = queue.pop_front() {
        if explored >= node_limit {
            info!("node limit of {node_limit} reached; reporting the best solution found so far");
            break;
        }
        explored += 1;

        let state = level.decode(session.get_saved_state(p));
        for mv in Move::ALL {
            let Some(next) = level.apply_move(&state, mv) else { continue };
            let bytes = level.encode(&next);

            let mut cursor = p;
            if session.suppress_cycle(&mut cursor, &bytes, 4) {
                continue;
            }

            let endpoint = i64::from(level.is_solved(&next));
            let child = session
                .add_position(p, mv.label(), &bytes, endpoint, CheckMode::Check)
                .ok_or_else(|| eyre!("redo_core ran out of memory while exploring the puzzle"))?;

            if visited.insert(bytes) {
                queue.push_back(child);
            }
        }
    }

    info!("explored {explored} position(s); tree holds {}", session.session_size());
    Ok(())
}

fn report_solution(session: &Session) {
    match session.solution(session.first_position()) {
        Some((end, size)) => println!("shortest known solution: {size} move(s) (endpoint {end})"),
        None => println!("no solution known yet"),
    }
}
