#![allow(clippy::too_many_lines)]
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};

pub mod analysis;
pub mod board;
pub mod brute;
pub mod config;
pub mod dead;
pub mod engine;
pub mod error;
pub mod fifty;
pub mod geometry;
mod internal_util;
pub mod select;
pub mod util;
pub mod web;

pub use analysis::{AnalysisOutcome, DeepResult};
pub use board::{BoardView, CellState};
pub use brute::BruteForceResult;
pub use config::SolverConfig;
pub use engine::EngineResult;
pub use error::SolverError;
pub use geometry::{CellId, Coord, Geometry};
pub use select::{Action, MethodTag, PlayKind};

use board::BoardMirror;
use select::GuessContext;
use web::WitnessWeb;

/// A source of exact per-cell mine probabilities.
pub trait MineProbabilityModel {
    /// Probability that `cell` is clear, if this model covers it.
    fn safety(&self, cell: CellId) -> Option<f64>;
    fn certain_clears(&self) -> Vec<CellId>;
    fn certain_mines(&self) -> Vec<CellId>;
}

impl MineProbabilityModel for EngineResult {
    fn safety(&self, cell: CellId) -> Option<f64> {
        EngineResult::safety(self, cell)
    }

    fn certain_clears(&self) -> Vec<CellId> {
        self.certain_clear_cells.clone()
    }

    fn certain_mines(&self) -> Vec<CellId> {
        self.certain_mine_cells.clone()
    }
}

impl MineProbabilityModel for BruteForceResult {
    fn safety(&self, cell: CellId) -> Option<f64> {
        BruteForceResult::safety(self, cell)
    }

    fn certain_clears(&self) -> Vec<CellId> {
        BruteForceResult::certain_clears(self)
    }

    fn certain_mines(&self) -> Vec<CellId> {
        BruteForceResult::certain_mines(self)
    }
}

/// Strategy seam for the game-tree search: the full tree walk, or a stub
/// that always declines.
pub trait DeepAnalysisModel {
    fn run(&self, brute: &BruteForceResult, config: &SolverConfig) -> AnalysisOutcome;
}

/// The real game-tree walk over a complete census.
pub struct TreeSearchAnalysis;

impl DeepAnalysisModel for TreeSearchAnalysis {
    fn run(&self, brute: &BruteForceResult, config: &SolverConfig) -> AnalysisOutcome {
        analysis::analyse(brute, config)
    }
}

/// Deep analysis disabled: every request comes back incomplete.
pub struct NoDeepAnalysis;

impl DeepAnalysisModel for NoDeepAnalysis {
    fn run(&self, _brute: &BruteForceResult, _config: &SolverConfig) -> AnalysisOutcome {
        AnalysisOutcome::Incomplete
    }
}

/// The solver: feeds board snapshots through the full pipeline and emits
/// recommended actions.
///
/// Holds its own [`BoardMirror`]; proven flags accumulate across turns.
pub struct Solver {
    mirror: BoardMirror,
    config: SolverConfig,
    deep_model: Box<dyn DeepAnalysisModel>,
    probabilities: HashMap<CellId, f64>,
    turn: u64,
}

impl Solver {
    pub fn new(geometry: Rc<Geometry>, total_mines: usize, config: SolverConfig) -> Self {
        let deep_model: Box<dyn DeepAnalysisModel> = if config.max_analysis_nodes == 0 {
            Box::new(NoDeepAnalysis)
        } else {
            Box::new(TreeSearchAnalysis)
        };
        Self {
            mirror: BoardMirror::new(geometry, total_mines),
            config,
            deep_model,
            probabilities: HashMap::new(),
            turn: 0,
        }
    }

    /// Number of snapshots processed so far.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// Probability that `cell` is clear, from the latest processed
    /// snapshot. `None` until the cell has been analysed.
    pub fn probability(&self, cell: CellId) -> Option<f64> {
        self.probabilities.get(&cell).copied()
    }

    /// Analyse one board snapshot and recommend the next moves.
    ///
    /// Certain moves are returned exhaustively; when none exist, exactly
    /// one guess is appended. An invalid web degrades to whatever certain
    /// moves were already found instead of failing the turn.
    pub fn process(&mut self, view: &impl BoardView) -> Result<Vec<Action>, SolverError> {
        self.turn += 1;
        let turn = self.turn;
        self.mirror.sync(view)?;
        self.probabilities.clear();

        let sweep = select::trivial_actions(&mut self.mirror, &self.config, turn)?;
        let mut actions = sweep.actions;
        for action in &actions {
            if matches!(action.kind, PlayKind::Clear | PlayKind::Flag) {
                self.probabilities.insert(action.cell, action.probability);
            }
        }
        if let Some(reason) = sweep.contradiction {
            warn!("contradictory board: {reason}");
            return Ok(actions);
        }

        if self.mirror.mines_left()? == 0 {
            for cell in self.mirror.hidden_unconfirmed() {
                self.probabilities.insert(cell, 1.0);
            }
            actions.extend(select::no_mines_left_actions(&self.mirror, turn));
            return Ok(actions);
        }

        let web = match WitnessWeb::build(&self.mirror) {
            Ok(web) => web,
            Err(SolverError::InvalidBoard(reason)) => {
                warn!("invalid witness web: {reason}");
                return Ok(actions);
            },
            Err(err) => return Err(err),
        };

        let mines_left = self.mirror.mines_left()?;
        let hidden = self.mirror.hidden_unconfirmed().count();
        if hidden == 0 {
            return Ok(actions);
        }
        let off_frontier = hidden - web.squares.len();

        let engine = if web.is_empty() {
            None
        } else {
            match engine::ProbabilityEngine::run(&web, mines_left, off_frontier) {
                Ok(result) => Some(result),
                Err(SolverError::InvalidBoard(reason)) => {
                    warn!("counting engine rejected the board: {reason}");
                    return Ok(actions);
                },
                Err(err) => return Err(err),
            }
        };

        let brute = match brute::run(&self.mirror, &web, &self.config) {
            Ok(result) => result,
            Err(SolverError::InvalidBoard(reason)) => {
                warn!("brute force rejected the board: {reason}");
                return Ok(actions);
            },
            Err(err) => return Err(err),
        };

        // Record probabilities, preferring the literal census.
        for cell in self.mirror.hidden_unconfirmed() {
            let safety = brute
                .as_ref()
                .and_then(|b| b.safety(cell))
                .or_else(|| engine.as_ref().and_then(|e| e.safety(cell)))
                .or_else(|| engine.as_ref().map(|e| e.off_frontier_safety))
                .unwrap_or_else(|| 1.0 - mines_left as f64 / hidden as f64);
            self.probabilities.insert(cell, safety);
        }

        // Proven moves from whichever model is sharpest.
        let certainties: Option<(Vec<CellId>, Vec<CellId>)> = brute
            .as_ref()
            .map(|b| (b.certain_clears(), b.certain_mines()))
            .or_else(|| {
                engine
                    .as_ref()
                    .map(|e| (e.certain_clear_cells.clone(), e.certain_mine_cells.clone()))
            });
        if let Some((clears, mines)) = certainties {
            let method = if brute.is_some() {
                MethodTag::BruteForce
            } else {
                MethodTag::CountingEngine
            };
            actions.extend(select::certainty_actions(
                &mut self.mirror,
                &clears,
                &mines,
                method,
                &self.config,
                turn,
            ));
        }
        if !actions.is_empty() {
            return Ok(actions);
        }

        // No certainty anywhere: guess.
        let deep = brute.as_ref().filter(|b| !b.too_many).and_then(|b| {
            match self.deep_model.run(b, &self.config) {
                AnalysisOutcome::Complete(result) => Some(result),
                AnalysisOutcome::Incomplete => None,
            }
        });
        let dead = dead::analyse(&web, &self.mirror, mines_left, &self.config);
        let risk = fifty::detect(&web, &self.mirror, engine.as_ref(), &self.config);
        let ctx = GuessContext {
            mirror: &self.mirror,
            web: &web,
            engine: engine.as_ref(),
            brute: brute.as_ref(),
            deep: deep.as_ref(),
            dead: &dead,
            risk: &risk,
            config: &self.config,
            turn,
        };
        match select::best_guess(&ctx).or_else(|| select::fallback_guess(&self.mirror, &web, turn))
        {
            Some(action) => {
                debug!("turn {turn}: guessing {} via {}", action.cell, action.method);
                actions.push(action);
            },
            None => debug!("turn {turn}: board fully resolved, nothing to do"),
        }
        Ok(actions)
    }
}

/// One-shot convenience: analyse a single snapshot with default settings.
pub fn solve(view: &impl BoardView, total_mines: usize) -> Result<Vec<Action>, SolverError> {
    let geometry = Geometry::new(view.width(), view.height());
    let mut solver = Solver::new(geometry, total_mines, SolverConfig::default());
    solver.process(view)
}
