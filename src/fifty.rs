use std::collections::{HashMap, HashSet};

use log::debug;

use crate::board::BoardMirror;
use crate::config::SolverConfig;
use crate::engine::EngineResult;
use crate::geometry::{CellId, Coord};
use crate::web::WitnessWeb;

/// A structurally forced guess: no matter how the rest of the board
/// resolves, nothing can disambiguate these cells.
#[derive(Debug, Clone, PartialEq)]
pub struct ForcedGuess {
    pub cells: Vec<CellId>,
    pub kind: ShapeKind,
    /// Mine probability of each member cell, fixed by the shape alone.
    pub mine_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Pair,
    Chain,
    Box2x2,
}

/// Output of the 50/50 and long-term risk detectors.
#[derive(Debug, Default)]
pub struct RiskAnalysis {
    pub forced: Vec<ForcedGuess>,
    /// Estimated chance, per cell, that a potential 50/50 it belongs to
    /// survives into a forced coin flip. Guess ranking uses this to prefer
    /// breaking such shapes up early.
    pub influence: HashMap<CellId, f64>,
}

impl RiskAnalysis {
    pub fn is_forced(&self, cell: CellId) -> bool {
        self.forced
            .iter()
            .any(|shape| shape.cells.contains(&cell))
    }

    pub fn influence(&self, cell: CellId) -> f64 {
        self.influence.get(&cell).copied().unwrap_or(0.0)
    }
}

/// Pattern-match unavoidable guesses and estimate long-term risk.
pub fn detect(
    web: &WitnessWeb,
    mirror: &BoardMirror,
    engine: Option<&EngineResult>,
    config: &SolverConfig,
) -> RiskAnalysis {
    let mut analysis = RiskAnalysis::default();
    detect_chains(web, mirror, &mut analysis);
    detect_boxes(web, mirror, &mut analysis);
    if config.consider_long_term_safety {
        if let Some(engine) = engine {
            estimate_influence(mirror, engine, &mut analysis);
        }
    }
    if !analysis.forced.is_empty() {
        debug!("forced guesses detected: {:?}", analysis.forced);
    }
    analysis
}

/// A cell through which information could still flow: on the board, and
/// hidden without a confirmed flag. Off-board or resolved cells seal a
/// shape's end.
fn open_at(mirror: &BoardMirror, row: isize, col: isize) -> bool {
    let geometry = mirror.geometry();
    if row < 0 || col < 0 || row >= geometry.height() as isize || col >= geometry.width() as isize {
        return false;
    }
    mirror.is_hidden_unconfirmed(geometry.index(Coord::new(row as usize, col as usize)))
}

/// Straight even-length runs of hidden cells (the adjacent pair is the
/// length-2 case), where every bordering witness demands exactly one more
/// mine among exactly two neighbouring run cells and both extensions of
/// the line are sealed. Such a run holds one mine per link and every cell
/// is a mine with probability exactly 1/2.
fn detect_chains(web: &WitnessWeb, mirror: &BoardMirror, analysis: &mut RiskAnalysis) {
    let geometry = mirror.geometry();
    for (dr, dc) in [(0_isize, 1_isize), (1, 0)] {
        for start_row in 0..geometry.height() {
            for start_col in 0..geometry.width() {
                // Only start at the head of a maximal run.
                if open_at(
                    mirror,
                    start_row as isize - dr,
                    start_col as isize - dc,
                ) {
                    continue;
                }
                let mut run = Vec::new();
                let (mut row, mut col) = (start_row as isize, start_col as isize);
                while open_at(mirror, row, col) {
                    run.push(geometry.index(Coord::new(row as usize, col as usize)));
                    row += dr;
                    col += dc;
                }
                if run.len() < 2 || run.len() % 2 != 0 {
                    continue;
                }
                if qualifies(web, &run) {
                    analysis.forced.push(ForcedGuess {
                        kind: if run.len() == 2 {
                            ShapeKind::Pair
                        } else {
                            ShapeKind::Chain
                        },
                        cells: run,
                        mine_probability: 0.5,
                    });
                }
            }
        }
    }
}

/// 2x2 blocks of hidden cells sealed on all sides, each bordering witness
/// requiring one more mine among exactly two of the block's cells. The two
/// mines fall on one of the diagonals, leaving each cell at exactly 1/2.
fn detect_boxes(web: &WitnessWeb, mirror: &BoardMirror, analysis: &mut RiskAnalysis) {
    let geometry = mirror.geometry();
    for row in 0..geometry.height().saturating_sub(1) {
        for col in 0..geometry.width().saturating_sub(1) {
            let block: Vec<CellId> = [(0, 0), (0, 1), (1, 0), (1, 1)]
                .iter()
                .map(|&(dr, dc)| geometry.index(Coord::new(row + dr, col + dc)))
                .collect();
            if !block.iter().all(|&c| mirror.is_hidden_unconfirmed(c)) {
                continue;
            }
            let sealed = (row as isize - 1..=row as isize + 2).all(|r| {
                (col as isize - 1..=col as isize + 2).all(|c| {
                    let inside = (row as isize..=row as isize + 1).contains(&r)
                        && (col as isize..=col as isize + 1).contains(&c);
                    inside || !open_at(mirror, r, c)
                })
            });
            if sealed && qualifies(web, &block) {
                analysis.forced.push(ForcedGuess {
                    cells: block,
                    kind: ShapeKind::Box2x2,
                    mine_probability: 0.5,
                });
            }
        }
    }
}

/// Every cell of the shape is witnessed, and every witness touching any of
/// them requires exactly one more mine among exactly two of the shape's
/// cells.
fn qualifies(web: &WitnessWeb, shape: &[CellId]) -> bool {
    let members: HashSet<CellId> = shape.iter().copied().collect();
    let mut witnesses = HashSet::new();
    for &cell in shape {
        let Some(sq) = web.square_for_cell(cell) else {
            return false;
        };
        witnesses.extend(web.squares[sq].witnesses.iter().copied());
    }
    witnesses.into_iter().all(|wid| {
        let witness = &web.witnesses[wid];
        witness.required == 1
            && witness.squares.len() == 2
            && witness
                .squares
                .iter()
                .all(|&sq| members.contains(&web.squares[sq].cell))
    })
}

/// Score potential coin flips: adjacent hidden pairs whose line extensions
/// are already sealed and whose cells are genuinely uncertain. The shape
/// becomes a forced guess when exactly one of the two is a mine and the
/// surrounding area resolves without touching it; `2p(1-p)` estimates the
/// former and a flat 1/2 the latter.
fn estimate_influence(mirror: &BoardMirror, engine: &EngineResult, analysis: &mut RiskAnalysis) {
    let geometry = mirror.geometry();
    for (dr, dc) in [(0_isize, 1_isize), (1, 0)] {
        for row in 0..geometry.height() {
            for col in 0..geometry.width() {
                let (row, col) = (row as isize, col as isize);
                if !open_at(mirror, row, col) || !open_at(mirror, row + dr, col + dc) {
                    continue;
                }
                if open_at(mirror, row - dr, col - dc)
                    || open_at(mirror, row + 2 * dr, col + 2 * dc)
                {
                    continue;
                }
                let a = geometry.index(Coord::new(row as usize, col as usize));
                let b = geometry.index(Coord::new((row + dr) as usize, (col + dc) as usize));
                let (Some(sa), Some(sb)) = (engine.safety(a), engine.safety(b)) else {
                    continue;
                };
                if sa == 0.0 || sa == 1.0 || sb == 0.0 || sb == 1.0 {
                    continue;
                }
                let mine = 1.0 - (sa + sb) / 2.0;
                let risk = 2.0 * mine * (1.0 - mine) * 0.5;
                for cell in [a, b] {
                    let entry = analysis.influence.entry(cell).or_insert(0.0);
                    *entry = entry.max(risk);
                }
            }
        }
    }
}
