use std::collections::{HashMap, HashSet};
use std::fmt;

use itertools::Itertools;
use log::debug;

use crate::analysis::DeepResult;
use crate::board::BoardMirror;
use crate::brute::{BruteForceResult, MINE};
use crate::config::SolverConfig;
use crate::dead::DeadCellAnalysis;
use crate::engine::EngineResult;
use crate::error::SolverError;
use crate::fifty::RiskAnalysis;
use crate::geometry::CellId;
use crate::web::WitnessWeb;

/// What to do with a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlayKind {
    Clear,
    Flag,
    /// Chord: clear every hidden neighbour of a satisfied witness at once.
    ClearAll,
    /// Remove a player flag that blocks a clear we are about to make.
    FlagRemoval,
}

/// How a recommendation was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MethodTag {
    Trivial,
    NoMinesLeft,
    CountingEngine,
    BruteForce,
    DeepAnalysis,
    FiftyFifty,
    Guess,
    Fallback,
}

impl fmt::Display for MethodTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Trivial => "trivial",
            Self::NoMinesLeft => "no mines left",
            Self::CountingEngine => "counting engine",
            Self::BruteForce => "brute force",
            Self::DeepAnalysis => "deep analysis",
            Self::FiftyFifty => "50/50",
            Self::Guess => "guess",
            Self::Fallback => "fallback",
        })
    }
}

/// One recommended move.
///
/// `probability` is the chance the cell is clear: 1.0 for proven clears,
/// 0.0 for proven mines, in between for guesses.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Action {
    pub cell: CellId,
    pub kind: PlayKind,
    pub method: MethodTag,
    pub probability: f64,
    pub turn: u64,
}

impl Action {
    fn new(cell: CellId, kind: PlayKind, method: MethodTag, probability: f64, turn: u64) -> Self {
        Self {
            cell,
            kind,
            method,
            probability,
            turn,
        }
    }
}

/// Outcome of the deterministic counting sweep. A contradiction ends the
/// sweep early but keeps every move proven before it surfaced.
#[derive(Debug)]
pub struct TrivialSweep {
    pub actions: Vec<Action>,
    pub contradiction: Option<&'static str>,
}

/// Flag every mine forced by simple counting, to a fixpoint, then collect
/// the clears (and chords) of satisfied witnesses. Mutates the mirror by
/// confirming the flags it proves.
pub fn trivial_actions(
    mirror: &mut BoardMirror,
    config: &SolverConfig,
    turn: u64,
) -> Result<TrivialSweep, SolverError> {
    let geometry = mirror.geometry().clone();
    let mut actions = Vec::new();
    let mut contradiction = None;

    // Flags first: each confirmation can satisfy further witnesses.
    'fixpoint: loop {
        let mut changed = false;
        for id in geometry.cells() {
            if !mirror.is_revealed(id) || mirror.adjacent_unrevealed(id) == 0 {
                continue;
            }
            let value = mirror.value(id)?;
            let flagged = mirror.adjacent_confirmed_flags(id);
            if value < flagged {
                contradiction =
                    Some("a witness shows fewer mines than are proven around it");
                break 'fixpoint;
            }
            let need = value - flagged;
            if need != mirror.adjacent_unrevealed(id) {
                continue;
            }
            let mines: Vec<CellId> = geometry
                .neighbours(id)
                .iter()
                .copied()
                .filter(|&n| mirror.is_hidden_unconfirmed(n))
                .collect();
            for mine in mines {
                mirror.confirm_flag(mine);
                changed = true;
                if !config.flag_free {
                    actions.push(Action::new(mine, PlayKind::Flag, MethodTag::Trivial, 0.0, turn));
                }
            }
        }
        if !changed {
            break;
        }
    }

    // Then the clears of satisfied witnesses, chording where it pays. A
    // contradiction makes every remaining witness suspect, so only the
    // flags proven before it was noticed survive.
    let mut handled: HashSet<CellId> = HashSet::new();
    for id in geometry.cells() {
        if contradiction.is_some() {
            break;
        }
        if !mirror.is_revealed(id) || mirror.adjacent_unrevealed(id) == 0 {
            continue;
        }
        let need = mirror.value(id)? - mirror.adjacent_confirmed_flags(id);
        if need != 0 {
            continue;
        }
        let clears: Vec<CellId> = geometry
            .neighbours(id)
            .iter()
            .copied()
            .filter(|&n| mirror.is_hidden_unconfirmed(n) && !handled.contains(&n))
            .collect();
        if clears.is_empty() {
            continue;
        }
        // One chord replaces `clears.len()` individual moves.
        if clears.len() >= 1 + config.chord_benefit_threshold {
            for &cell in &clears {
                push_flag_removal(mirror, cell, turn, &mut actions);
            }
            actions.push(Action::new(id, PlayKind::ClearAll, MethodTag::Trivial, 1.0, turn));
        } else {
            for &cell in &clears {
                push_flag_removal(mirror, cell, turn, &mut actions);
                actions.push(Action::new(cell, PlayKind::Clear, MethodTag::Trivial, 1.0, turn));
            }
        }
        handled.extend(clears);
    }
    Ok(TrivialSweep { actions, contradiction })
}

/// Every confirmed flag accounts for a mine: whatever is still hidden is
/// clear, no counting required.
pub fn no_mines_left_actions(mirror: &BoardMirror, turn: u64) -> Vec<Action> {
    let mut actions = Vec::new();
    for cell in mirror.hidden_unconfirmed() {
        push_flag_removal(mirror, cell, turn, &mut actions);
        actions.push(Action::new(
            cell,
            PlayKind::Clear,
            MethodTag::NoMinesLeft,
            1.0,
            turn,
        ));
    }
    actions
}

/// Turn proven clears and mines from the counting engine or the census
/// into actions. Confirms the mines on the mirror.
pub fn certainty_actions(
    mirror: &mut BoardMirror,
    clears: &[CellId],
    mines: &[CellId],
    method: MethodTag,
    config: &SolverConfig,
    turn: u64,
) -> Vec<Action> {
    let mut actions = Vec::new();
    for &mine in mines {
        mirror.confirm_flag(mine);
        if !config.flag_free {
            actions.push(Action::new(mine, PlayKind::Flag, method, 0.0, turn));
        }
    }
    for &cell in clears {
        push_flag_removal(mirror, cell, turn, &mut actions);
        actions.push(Action::new(cell, PlayKind::Clear, method, 1.0, turn));
    }
    actions
}

fn push_flag_removal(mirror: &BoardMirror, cell: CellId, turn: u64, actions: &mut Vec<Action>) {
    if mirror.has_board_flag(cell) {
        actions.push(Action::new(
            cell,
            PlayKind::FlagRemoval,
            MethodTag::Trivial,
            1.0,
            turn,
        ));
    }
}

/// Everything the guess ranking can draw on.
pub struct GuessContext<'a> {
    pub mirror: &'a BoardMirror,
    pub web: &'a WitnessWeb,
    pub engine: Option<&'a EngineResult>,
    pub brute: Option<&'a BruteForceResult>,
    pub deep: Option<&'a DeepResult>,
    pub dead: &'a DeadCellAnalysis,
    pub risk: &'a RiskAnalysis,
    pub config: &'a SolverConfig,
    pub turn: u64,
}

/// How many of the safest candidates get the expensive lookahead scoring.
const LOOKAHEAD_CANDIDATES: usize = 8;

/// Pick the statistically best guess, or `None` when there is nothing to
/// guess at (no hidden cells).
pub fn best_guess(ctx: &GuessContext<'_>) -> Option<Action> {
    // A completed game-tree walk beats every heuristic below.
    if let Some(deep) = ctx.deep {
        if let Some(cell) = deep.best_cell {
            let probability = ctx
                .brute
                .and_then(|brute| brute.safety(cell))
                .unwrap_or(deep.win_probability);
            return Some(Action::new(
                cell,
                PlayKind::Clear,
                MethodTag::DeepAnalysis,
                probability,
                ctx.turn,
            ));
        }
    }

    let mut candidates: Vec<(CellId, f64)> = ctx
        .mirror
        .hidden_unconfirmed()
        .map(|cell| (cell, base_safety(ctx, cell)))
        .filter(|&(_, safety)| safety > 0.0)
        .collect();
    if candidates.is_empty() {
        return None;
    }
    // A dead cell can never reveal anything new, so it is only worth
    // clearing when it is provably safe or nothing living remains.
    let living = candidates
        .iter()
        .copied()
        .filter(|&(cell, safety)| safety >= 1.0 || !ctx.dead.is_dead(cell))
        .collect_vec();
    if !living.is_empty() {
        candidates = living;
    }
    candidates.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    candidates.truncate(LOOKAHEAD_CANDIDATES);

    let mut best: Option<(f64, bool, bool, CellId, f64)> = None;
    let mut memo = LookaheadMemo::new();
    for &(cell, safety) in &candidates {
        let score = composite_score(ctx, cell, safety, &mut memo);
        let alive = !ctx.dead.is_dead(cell);
        let frontier = ctx.web.square_for_cell(cell).is_some();
        // Ties prefer live cells, then frontier cells, then the smallest id.
        let better = match best {
            None => true,
            Some((best_score, best_alive, best_frontier, best_cell, _)) => {
                (score, alive, frontier, std::cmp::Reverse(cell))
                    > (best_score, best_alive, best_frontier, std::cmp::Reverse(best_cell))
            },
        };
        if better {
            best = Some((score, alive, frontier, cell, safety));
        }
    }
    let (score, _, _, cell, safety) = best?;
    debug!("guess: cell {cell} safety {safety:.4} score {score:.4}");

    // A structurally forced coin flip is at least as good as any guess that
    // cannot beat its odds, and resolving it now never loses value.
    if safety <= 0.5 + f64::EPSILON {
        if let Some(shape) = ctx.risk.forced.first() {
            if let Some(&cell) = shape.cells.iter().min() {
                return Some(Action::new(
                    cell,
                    PlayKind::Clear,
                    MethodTag::FiftyFifty,
                    1.0 - shape.mine_probability,
                    ctx.turn,
                ));
            }
        }
    }

    Some(Action::new(cell, PlayKind::Clear, MethodTag::Guess, safety, ctx.turn))
}

/// When nothing else produced a move, fall back to the first hidden cell,
/// preferring unseen territory over the frontier.
pub fn fallback_guess(mirror: &BoardMirror, web: &WitnessWeb, turn: u64) -> Option<Action> {
    let hidden = mirror.hidden_unconfirmed().collect_vec();
    let cell = hidden
        .iter()
        .copied()
        .find(|&c| web.square_for_cell(c).is_none())
        .or_else(|| hidden.first().copied())?;
    let mines = mirror.mines_left().ok()?;
    let prior = if hidden.is_empty() {
        1.0
    } else {
        1.0 - mines as f64 / hidden.len() as f64
    };
    Some(Action::new(
        cell,
        PlayKind::Clear,
        MethodTag::Fallback,
        prior,
        turn,
    ))
}

fn base_safety(ctx: &GuessContext<'_>, cell: CellId) -> f64 {
    if let Some(brute) = ctx.brute {
        if let Some(safety) = brute.safety(cell) {
            return safety;
        }
    }
    if let Some(engine) = ctx.engine {
        return engine
            .safety(cell)
            .unwrap_or(engine.off_frontier_safety);
    }
    let hidden = ctx.mirror.hidden_unconfirmed().count();
    let mines = ctx.mirror.mines_left().unwrap_or(0);
    if hidden == 0 {
        1.0
    } else {
        1.0 - mines as f64 / hidden as f64
    }
}

/// Memo for [`lookahead`], keyed by the evaluated position and the
/// canonically ordered `(position, value)` constraints that selected the
/// surviving solutions. Shared across a turn's candidates, so symmetric
/// two-step evaluations reached in either order resolve once.
type LookaheadMemo = HashMap<(usize, Vec<(usize, u8)>), f64>;

fn composite_score(
    ctx: &GuessContext<'_>,
    cell: CellId,
    safety: f64,
    memo: &mut LookaheadMemo,
) -> f64 {
    let mut score = match lookahead_safety(ctx, cell, memo) {
        Some(next) => safety * (0.5 + 0.5 * next),
        None => safety,
    };
    score += 0.01 * linked_share(ctx, cell) * progress_potential(ctx, cell);
    // Dissolving a likely future coin flip is worth a nudge.
    score += 0.05 * ctx.risk.influence(cell);
    if ctx.web.square_for_cell(cell).is_none() {
        score += break_in_bonus(ctx, cell);
    }
    score
}

/// Expected best safety available after this cell resolves, from the
/// census: weight each possible revealed value by its likelihood and take
/// the safest follow-up within that reduced solution set.
fn lookahead_safety(
    ctx: &GuessContext<'_>,
    cell: CellId,
    memo: &mut LookaheadMemo,
) -> Option<f64> {
    if ctx.config.recursive_safety_depth == 0 {
        return None;
    }
    let brute = ctx.brute?;
    if brute.too_many {
        return None;
    }
    let p = brute.cells.iter().position(|&c| c == cell)?;
    let all = (0..brute.solutions.len()).collect_vec();
    Some(lookahead(
        brute,
        &all,
        p,
        ctx.config.recursive_safety_depth,
        &mut Vec::new(),
        memo,
    ))
}

fn lookahead(
    brute: &BruteForceResult,
    solutions: &[usize],
    p: usize,
    depth: usize,
    constraints: &mut Vec<(usize, u8)>,
    memo: &mut LookaheadMemo,
) -> f64 {
    let key = {
        let mut ordered = constraints.clone();
        ordered.sort_unstable();
        (p, ordered)
    };
    if let Some(&cached) = memo.get(&key) {
        return cached;
    }
    let n = solutions.len() as f64;
    let mut by_value: Vec<(u8, Vec<usize>)> = Vec::new();
    for &s in solutions {
        let value = brute.solutions[s][p];
        if value == MINE {
            continue;
        }
        match by_value.iter_mut().find(|(v, _)| *v == value) {
            Some((_, group)) => group.push(s),
            None => by_value.push((value, vec![s])),
        }
    }
    let mut expected = 0.0;
    for (value, group) in by_value {
        let weight = group.len() as f64 / n;
        let mut best = 0.0_f64;
        for q in 0..brute.cells.len() {
            if q == p {
                continue;
            }
            let mines = group
                .iter()
                .filter(|&&s| brute.solutions[s][q] == MINE)
                .count();
            let safety = 1.0 - mines as f64 / group.len() as f64;
            let follow_up = if depth > 1 && safety < 1.0 && group.len() > 1 {
                constraints.push((p, value));
                let next = lookahead(brute, &group, q, depth - 1, constraints, memo);
                constraints.pop();
                safety * (0.5 + 0.5 * next)
            } else {
                safety
            };
            best = best.max(follow_up);
        }
        expected += weight * best;
    }
    memo.insert(key, expected);
    expected
}

/// Cells in a linked pair clear (or blow up) together, so whatever one of
/// them teaches us the other repeats. Splitting the progress credit stops
/// the pair from counting the same expected clears twice.
fn linked_share(ctx: &GuessContext<'_>, cell: CellId) -> f64 {
    let Some(engine) = ctx.engine else {
        return 1.0;
    };
    let Some(sq) = ctx.web.square_for_cell(cell) else {
        return 1.0;
    };
    let own = ctx.web.squares[sq].box_id;
    if engine
        .linked_pairs
        .iter()
        .any(|&(a, b)| a == own || b == own)
    {
        0.5
    } else {
        1.0
    }
}

/// How much a clear here is likely to teach us: the spread of values the
/// census says this cell can show.
fn progress_potential(ctx: &GuessContext<'_>, cell: CellId) -> f64 {
    let Some(brute) = ctx.brute else {
        return 0.0;
    };
    let Some(p) = brute.cells.iter().position(|&c| c == cell) else {
        return 0.0;
    };
    let mut seen = [false; 9];
    let mut distinct = 0_usize;
    for solution in &brute.solutions {
        let value = solution[p];
        if value != MINE && !seen[value as usize] {
            seen[value as usize] = true;
            distinct += 1;
        }
    }
    distinct.saturating_sub(1) as f64 / 8.0
}

/// Geometric preference for off-frontier break-ins: corners see the fewest
/// cells and resolve fastest, edges next.
fn break_in_bonus(ctx: &GuessContext<'_>, cell: CellId) -> f64 {
    match ctx.mirror.geometry().neighbours(cell).len() {
        3 => 0.002,
        5 => 0.001,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::geometry::{Coord, Geometry};
    use crate::util::AsciiBoard;

    fn mirror_for(encoded: &str, width: usize, height: usize, mines: usize) -> (Rc<Geometry>, BoardMirror) {
        let board = AsciiBoard::parse(encoded, mines).unwrap();
        let geometry = Geometry::new(width, height);
        let mut mirror = BoardMirror::new(Rc::clone(&geometry), mines);
        mirror.sync(&board).unwrap();
        (geometry, mirror)
    }

    #[test]
    fn lone_hidden_neighbour_of_a_one_is_flagged() {
        let (geometry, mut mirror) = mirror_for("1x", 2, 1, 1);
        let actions = trivial_actions(&mut mirror, &SolverConfig::default(), 1).unwrap().actions;
        let mine = geometry.index(Coord::new(0, 1));
        assert_eq!(
            actions,
            vec![Action::new(mine, PlayKind::Flag, MethodTag::Trivial, 0.0, 1)]
        );
        assert!(mirror.is_confirmed_flag(mine));
    }

    #[test]
    fn flag_free_mode_suppresses_flag_actions() {
        let (geometry, mut mirror) = mirror_for("1x", 2, 1, 1);
        let config = SolverConfig {
            flag_free: true,
            ..SolverConfig::default()
        };
        let actions = trivial_actions(&mut mirror, &config, 1).unwrap().actions;
        assert!(actions.is_empty());
        // The proof still lands in the mirror.
        assert!(mirror.is_confirmed_flag(geometry.index(Coord::new(0, 1))));
    }

    #[test]
    fn satisfied_witness_chords_when_it_saves_enough() {
        let (geometry, mut mirror) = mirror_for("x2x\nxxx", 3, 2, 2);
        // Two mines proven elsewhere satisfy the witness entirely.
        mirror.confirm_flag(geometry.index(Coord::new(0, 0)));
        mirror.confirm_flag(geometry.index(Coord::new(0, 2)));
        let actions = trivial_actions(&mut mirror, &SolverConfig::default(), 3).unwrap().actions;
        let witness = geometry.index(Coord::new(0, 1));
        assert_eq!(
            actions,
            vec![Action::new(
                witness,
                PlayKind::ClearAll,
                MethodTag::Trivial,
                1.0,
                3
            )]
        );
    }

    #[test]
    fn blocked_clear_gets_a_flag_removal_first() {
        let (geometry, mut mirror) = mirror_for(".*", 2, 1, 0);
        let actions = trivial_actions(&mut mirror, &SolverConfig::default(), 1).unwrap().actions;
        let flagged = geometry.index(Coord::new(0, 1));
        assert_eq!(
            actions,
            vec![
                Action::new(flagged, PlayKind::FlagRemoval, MethodTag::Trivial, 1.0, 1),
                Action::new(flagged, PlayKind::Clear, MethodTag::Trivial, 1.0, 1),
            ]
        );
    }

    #[test]
    fn no_mines_left_clears_everything_without_analysis() {
        let (geometry, mut mirror) = mirror_for("1x\nxx", 2, 2, 1);
        mirror.confirm_flag(geometry.index(Coord::new(1, 1)));
        assert_eq!(mirror.mines_left().unwrap(), 0);
        let actions = no_mines_left_actions(&mirror, 2);
        assert_eq!(
            actions,
            vec![
                Action::new(
                    geometry.index(Coord::new(0, 1)),
                    PlayKind::Clear,
                    MethodTag::NoMinesLeft,
                    1.0,
                    2
                ),
                Action::new(
                    geometry.index(Coord::new(1, 0)),
                    PlayKind::Clear,
                    MethodTag::NoMinesLeft,
                    1.0,
                    2
                ),
            ]
        );
    }

    fn full_context(
        encoded: &str,
        width: usize,
        height: usize,
        mines: usize,
    ) -> (
        Rc<Geometry>,
        BoardMirror,
        WitnessWeb,
        EngineResult,
        BruteForceResult,
        DeadCellAnalysis,
        RiskAnalysis,
    ) {
        let (geometry, mirror) = mirror_for(encoded, width, height, mines);
        let web = WitnessWeb::build(&mirror).unwrap();
        let hidden = mirror.hidden_unconfirmed().count();
        let off = hidden - web.squares.len();
        let config = SolverConfig {
            single_threaded: true,
            ..SolverConfig::default()
        };
        let engine = crate::engine::ProbabilityEngine::run(&web, mines, off).unwrap();
        let brute = crate::brute::run(&mirror, &web, &config).unwrap().unwrap();
        let dead = crate::dead::analyse(&web, &mirror, mines, &config);
        let risk = crate::fifty::detect(&web, &mirror, Some(&engine), &config);
        (geometry, mirror, web, engine, brute, dead, risk)
    }

    #[test]
    fn equal_guesses_break_ties_lexicographically() {
        let (geometry, mirror, web, engine, brute, dead, risk) =
            full_context("1x\nxx", 2, 2, 1);
        let config = SolverConfig::default();
        let ctx = GuessContext {
            mirror: &mirror,
            web: &web,
            engine: Some(&engine),
            brute: Some(&brute),
            deep: None,
            dead: &dead,
            risk: &risk,
            config: &config,
            turn: 1,
        };
        let action = best_guess(&ctx).unwrap();
        assert_eq!(action.cell, geometry.index(Coord::new(0, 1)));
        assert_eq!(action.kind, PlayKind::Clear);
        assert_eq!(action.method, MethodTag::Guess);
        assert!((action.probability - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn forced_coin_flip_overrides_an_even_guess() {
        let (geometry, mirror, web, engine, brute, dead, risk) =
            full_context("xx\n11", 2, 2, 1);
        let config = SolverConfig::default();
        let ctx = GuessContext {
            mirror: &mirror,
            web: &web,
            engine: Some(&engine),
            brute: Some(&brute),
            deep: None,
            dead: &dead,
            risk: &risk,
            config: &config,
            turn: 1,
        };
        let action = best_guess(&ctx).unwrap();
        assert_eq!(action.cell, geometry.index(Coord::new(0, 0)));
        assert_eq!(action.method, MethodTag::FiftyFifty);
        assert_eq!(action.probability, 0.5);
    }

    #[test]
    fn completed_deep_analysis_dictates_the_move() {
        let (geometry, mirror, web, engine, brute, dead, risk) =
            full_context("1x\nxx", 2, 2, 1);
        let config = SolverConfig::default();
        let target = geometry.index(Coord::new(1, 1));
        let deep = DeepResult {
            win_probability: 2.0 / 3.0,
            best_cell: Some(target),
        };
        let ctx = GuessContext {
            mirror: &mirror,
            web: &web,
            engine: Some(&engine),
            brute: Some(&brute),
            deep: Some(&deep),
            dead: &dead,
            risk: &risk,
            config: &config,
            turn: 1,
        };
        let action = best_guess(&ctx).unwrap();
        assert_eq!(action.cell, target);
        assert_eq!(action.method, MethodTag::DeepAnalysis);
    }

    #[test]
    fn contradiction_keeps_the_flags_already_proven() {
        // The "2" proves both hidden cells, after which the "1" disagrees
        // with what surrounds it. The flags survive the aborted sweep.
        let (geometry, mut mirror) = mirror_for("12\nxx", 2, 2, 2);
        let sweep = trivial_actions(&mut mirror, &SolverConfig::default(), 1).unwrap();
        assert!(sweep.contradiction.is_some());
        assert_eq!(
            sweep.actions,
            vec![
                Action::new(
                    geometry.index(Coord::new(1, 0)),
                    PlayKind::Flag,
                    MethodTag::Trivial,
                    0.0,
                    1
                ),
                Action::new(
                    geometry.index(Coord::new(1, 1)),
                    PlayKind::Flag,
                    MethodTag::Trivial,
                    0.0,
                    1
                ),
            ]
        );
    }

    #[test]
    fn dead_cells_lose_to_living_candidates() {
        let (geometry, mirror, web, engine, brute, _dead, mut risk) =
            full_context("1x\nxx", 2, 2, 1);
        let dead_cell = geometry.index(Coord::new(0, 1));
        let dead = DeadCellAnalysis::with_dead([dead_cell]);
        // An influence nudge that would otherwise put the dead cell on top
        // of the ranking.
        risk.influence.insert(dead_cell, 1.0);
        let config = SolverConfig::default();
        let ctx = GuessContext {
            mirror: &mirror,
            web: &web,
            engine: Some(&engine),
            brute: Some(&brute),
            deep: None,
            dead: &dead,
            risk: &risk,
            config: &config,
            turn: 1,
        };
        let action = best_guess(&ctx).unwrap();
        assert_ne!(action.cell, dead_cell);
        assert_eq!(action.method, MethodTag::Guess);
    }

    #[test]
    fn all_dead_candidates_still_produce_a_guess() {
        let (geometry, mirror, web, engine, brute, _dead, risk) =
            full_context("1x\nxx", 2, 2, 1);
        let dead = DeadCellAnalysis::with_dead([
            geometry.index(Coord::new(0, 1)),
            geometry.index(Coord::new(1, 0)),
            geometry.index(Coord::new(1, 1)),
        ]);
        let config = SolverConfig::default();
        let ctx = GuessContext {
            mirror: &mirror,
            web: &web,
            engine: Some(&engine),
            brute: Some(&brute),
            deep: None,
            dead: &dead,
            risk: &risk,
            config: &config,
            turn: 1,
        };
        assert!(best_guess(&ctx).is_some());
    }

    #[test]
    fn linked_cells_split_their_progress_credit() {
        let (geometry, mirror, web, engine, brute, dead, risk) =
            full_context("x1x1xxx", 7, 1, 2);
        let config = SolverConfig::default();
        let ctx = GuessContext {
            mirror: &mirror,
            web: &web,
            engine: Some(&engine),
            brute: Some(&brute),
            deep: None,
            dead: &dead,
            risk: &risk,
            config: &config,
            turn: 1,
        };
        // (0, 0) and (0, 4) clear together or not at all; (0, 2) does not.
        assert_eq!(linked_share(&ctx, geometry.index(Coord::new(0, 0))), 0.5);
        assert_eq!(linked_share(&ctx, geometry.index(Coord::new(0, 2))), 1.0);
        // Off the frontier nothing is linked.
        assert_eq!(linked_share(&ctx, geometry.index(Coord::new(0, 6))), 1.0);
    }

    #[test]
    fn lookahead_memo_is_reused_across_evaluations() {
        let (_geometry, _mirror, _web, _engine, brute, _dead, _risk) =
            full_context("1xxx\nxxxx", 4, 2, 2);
        let all = (0..brute.solutions.len()).collect_vec();
        let mut memo = LookaheadMemo::new();
        let first = lookahead(&brute, &all, 0, 2, &mut Vec::new(), &mut memo);
        assert!(!memo.is_empty());
        // A repeat evaluation resolves from the memo, bit for bit.
        let again = lookahead(&brute, &all, 0, 2, &mut Vec::new(), &mut memo);
        assert_eq!(first, again);
    }
}
