use std::io::Read;
use std::process::exit;
use std::rc::Rc;

use minewise::util::AsciiBoard;
use minewise::{BoardView, Geometry, Solver, SolverConfig};

/// Read an ASCII board from stdin and print the recommended moves, e.g.:
///
/// ```text
/// echo '12x
/// xxxx' | minewise 3
/// ```
fn main() {
    let mines: usize = match std::env::args().nth(1).map(|arg| arg.parse()) {
        Some(Ok(mines)) => mines,
        _ => {
            eprintln!("usage: minewise <total-mines> < board.txt");
            exit(2);
        },
    };
    let mut encoded = String::new();
    if std::io::stdin().read_to_string(&mut encoded).is_err() {
        eprintln!("could not read the board from stdin");
        exit(2);
    }
    let board = match AsciiBoard::parse(&encoded, mines) {
        Ok(board) => board,
        Err(reason) => {
            eprintln!("bad board: {reason}");
            exit(2);
        },
    };

    let geometry = Geometry::new(board.width(), board.height());
    let mut solver = Solver::new(Rc::clone(&geometry), mines, SolverConfig::default());
    match solver.process(&board) {
        Ok(actions) => {
            for action in &actions {
                let coord = geometry.coord(action.cell);
                println!(
                    "{:?} {coord} ({}, p={:.4})",
                    action.kind, action.method, action.probability
                );
            }
            if actions.is_empty() {
                println!("nothing to do");
            }
        },
        Err(err) => {
            eprintln!("solver failed: {err}");
            exit(1);
        },
    }
}
