//! End-to-end runs of the solver against small scripted boards.

use std::collections::HashSet;
use std::rc::Rc;

use minewise::util::AsciiBoard;
use minewise::{
    solve,
    BoardView,
    CellId,
    CellState,
    Coord,
    Geometry,
    MethodTag,
    PlayKind,
    Solver,
    SolverConfig,
};
use pretty_assertions::assert_eq;

#[test]
fn no_mines_left_clears_the_rest_of_the_board() {
    // The lone witness pins the last mine; everything else is free.
    let board = AsciiBoard::parse("1xx", 1).unwrap();
    let geometry = Geometry::new(3, 1);
    let actions = solve(&board, 1).unwrap();

    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0].kind, PlayKind::Flag);
    assert_eq!(actions[0].method, MethodTag::Trivial);
    assert_eq!(actions[0].cell, geometry.index(Coord::new(0, 1)));
    assert_eq!(actions[1].kind, PlayKind::Clear);
    assert_eq!(actions[1].method, MethodTag::NoMinesLeft);
    assert_eq!(actions[1].cell, geometry.index(Coord::new(0, 2)));
    assert!((actions[1].probability - 1.0).abs() < f64::EPSILON);
}

#[test]
fn conflicting_witnesses_degrade_to_no_moves() {
    // The top and bottom centre witnesses constrain the same three hidden
    // cells to different mine counts. No single placement satisfies both,
    // so the turn yields nothing rather than an error or a bogus move.
    let board = AsciiBoard::parse(
        "111
         xxx
         121",
        2,
    )
    .unwrap();
    let actions = solve(&board, 2).unwrap();
    assert_eq!(actions, vec![]);
}

#[test]
fn contradictory_board_still_reports_proven_flags() {
    // The "2" proves both hidden cells before the "1" turns out to disagree
    // with them. The proven flags are reported; the turn stops there.
    let board = AsciiBoard::parse("12\nxx", 2).unwrap();
    let geometry = Geometry::new(2, 2);
    let actions = solve(&board, 2).unwrap();

    assert_eq!(actions.len(), 2);
    assert!(actions.iter().all(|a| a.kind == PlayKind::Flag));
    let cells: HashSet<CellId> = actions.iter().map(|a| a.cell).collect();
    let expected: HashSet<CellId> = [(1, 0), (1, 1)]
        .iter()
        .map(|&(r, c)| geometry.index(Coord::new(r, c)))
        .collect();
    assert_eq!(cells, expected);
}

#[test]
fn coin_flip_pairs_are_played_head_on() {
    // A sealed two-cell pair under two 1-witnesses: no information can
    // distinguish the cells, so the recommendation is to take the flip now.
    let board = AsciiBoard::parse("xx\n11", 1).unwrap();
    let geometry = Geometry::new(2, 2);
    let actions = solve(&board, 1).unwrap();

    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].kind, PlayKind::Clear);
    assert_eq!(actions[0].method, MethodTag::FiftyFifty);
    assert_eq!(actions[0].cell, geometry.index(Coord::new(0, 0)));
    assert!((actions[0].probability - 0.5).abs() < 1e-12);
}

#[test]
fn guesses_prefer_the_safer_off_frontier_region() {
    // One mine sits among the witness's three neighbours (safety 2/3); the
    // other is somewhere in the four unseen cells (safety 3/4). With the
    // game-tree walk disabled, the heuristic ranker should land off the
    // frontier.
    let board = AsciiBoard::parse("1xxx\nxxxx", 2).unwrap();
    let geometry = Geometry::new(4, 2);
    let config = SolverConfig {
        max_analysis_nodes: 0,
        ..SolverConfig::default()
    };
    let mut solver = Solver::new(Rc::clone(&geometry), 2, config);
    let actions = solver.process(&board).unwrap();

    assert_eq!(actions.len(), 1);
    let action = &actions[0];
    assert_eq!(action.kind, PlayKind::Clear);
    assert_eq!(action.method, MethodTag::Guess);
    let frontier: HashSet<CellId> = [(0, 1), (1, 0), (1, 1)]
        .iter()
        .map(|&(r, c)| geometry.index(Coord::new(r, c)))
        .collect();
    assert!(!frontier.contains(&action.cell));
    assert!((action.probability - 0.75).abs() < 1e-12);
}

#[test]
fn flag_free_mode_keeps_proven_mines_internal() {
    let board = AsciiBoard::parse("1x", 1).unwrap();
    let geometry = Geometry::new(2, 1);
    let config = SolverConfig {
        flag_free: true,
        ..SolverConfig::default()
    };
    let mut solver = Solver::new(Rc::clone(&geometry), 1, config);

    // The mine is confirmed internally without a flag action, which in turn
    // exhausts the mine budget; nothing is left to recommend.
    let actions = solver.process(&board).unwrap();
    assert_eq!(actions, vec![]);
}

#[test]
fn turn_counter_and_confirmed_flags_persist() {
    let board = AsciiBoard::parse("1x", 1).unwrap();
    let geometry = Geometry::new(2, 1);
    let mut solver = Solver::new(Rc::clone(&geometry), 1, SolverConfig::default());

    let first = solver.process(&board).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].kind, PlayKind::Flag);
    assert_eq!(first[0].turn, 1);

    // Same snapshot again: the flag is already confirmed, so the second
    // turn has nothing left to say, but the turn counter still advances.
    let second = solver.process(&board).unwrap();
    assert_eq!(second, vec![]);
    assert_eq!(solver.turn(), 2);
}

/// Drive a whole game from a scripted ground truth, revealing exactly what
/// the solver asks for, and require that it finishes without ever touching
/// a mine or resorting to a guess.
#[test]
fn plays_a_deterministic_game_to_completion() {
    let geometry = Geometry::new(4, 3);
    let mines: HashSet<CellId> = [Coord::new(0, 0), Coord::new(2, 3)]
        .iter()
        .map(|&c| geometry.index(c))
        .collect();
    let mut board = AsciiBoard::parse(
        "xxxx
         111x
         0011",
        2,
    )
    .unwrap();
    let mut solver = Solver::new(Rc::clone(&geometry), 2, SolverConfig::default());
    let mut flagged: HashSet<CellId> = HashSet::new();

    let reveal = |board: &mut AsciiBoard, cell: CellId| {
        assert!(
            !mines.contains(&cell),
            "solver cleared a mine at {:?}",
            geometry.coord(cell)
        );
        let value = geometry
            .neighbours(cell)
            .iter()
            .filter(|&&n| mines.contains(&n))
            .count() as u8;
        board.set(geometry.coord(cell), CellState::Revealed(value));
    };

    let mut won = false;
    for _ in 0..8 {
        let finished = geometry.cells().all(|cell| {
            mines.contains(&cell)
                || matches!(board.query(geometry.coord(cell)), CellState::Revealed(_))
        });
        if finished {
            won = true;
            break;
        }

        let actions = solver.process(&board).unwrap();
        assert!(!actions.is_empty(), "solver stalled mid-game");
        for action in &actions {
            assert_ne!(
                action.method,
                MethodTag::Guess,
                "this board is solvable without guessing"
            );
            match action.kind {
                PlayKind::Clear => reveal(&mut board, action.cell),
                PlayKind::ClearAll => {
                    for &n in geometry.neighbours(action.cell) {
                        let hidden =
                            matches!(board.query(geometry.coord(n)), CellState::Hidden);
                        if hidden && !flagged.contains(&n) {
                            reveal(&mut board, n);
                        }
                    }
                },
                PlayKind::Flag => {
                    assert!(
                        mines.contains(&action.cell),
                        "solver flagged a safe cell at {:?}",
                        geometry.coord(action.cell)
                    );
                    flagged.insert(action.cell);
                },
                PlayKind::FlagRemoval => unreachable!("no player flags in this game"),
            }
        }
    }
    assert!(won, "game did not finish within the expected turns");
    assert_eq!(flagged, mines);
}
