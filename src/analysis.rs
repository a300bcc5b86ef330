use std::collections::HashMap;

use log::debug;
use typed_arena::Arena;

use crate::brute::{BruteForceResult, MINE};
use crate::config::SolverConfig;
use crate::geometry::CellId;

/// Sentinel in a position key: this cell has not been played yet.
const WILDCARD: u8 = 0xFE;

/// Result of walking the full game tree over a complete census.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// The tree was explored exhaustively.
    Complete(DeepResult),
    /// The node budget ran out before the tree was finished; nothing from
    /// the partial walk is safe to act on.
    Incomplete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeepResult {
    /// Probability of clearing the rest of the board under perfect play.
    pub win_probability: f64,
    /// The move that attains it, when any information-bearing move exists.
    pub best_cell: Option<CellId>,
}

/// One evaluated information state.
struct Node {
    win: f64,
    best_square: Option<usize>,
}

struct Exhausted;

struct Analyser<'a> {
    solutions: &'a [Box<[u8]>],
    num_cells: usize,
    arena: &'a Arena<Node>,
    cache: HashMap<Box<[u8]>, &'a Node>,
    nodes: u64,
    budget: u64,
}

/// Compute the exact win probability from a complete census.
///
/// Solutions are grouped by the value a played square would reveal; each
/// group is a smaller situation evaluated recursively, and identical
/// information states reached along different play orders share one cached
/// node. Squares are tried in (fewest mines, most distinct values) order so
/// that the running best prunes hopeless squares early.
pub fn analyse(brute: &BruteForceResult, config: &SolverConfig) -> AnalysisOutcome {
    debug_assert!(!brute.too_many);
    let arena = Arena::new();
    let mut analyser = Analyser {
        solutions: &brute.solutions,
        num_cells: brute.cells.len(),
        arena: &arena,
        cache: HashMap::new(),
        nodes: 0,
        budget: config.max_analysis_nodes,
    };
    let all: Vec<usize> = (0..brute.solutions.len()).collect();
    let position: Box<[u8]> = vec![WILDCARD; brute.cells.len()].into();
    match analyser.evaluate(position, all) {
        Ok(node) => {
            debug!(
                "deep analysis: {} nodes, win probability {:.4}",
                analyser.nodes, node.win
            );
            AnalysisOutcome::Complete(DeepResult {
                win_probability: node.win,
                best_cell: node.best_square.map(|p| brute.cells[p]),
            })
        },
        Err(Exhausted) => {
            debug!("deep analysis: node budget exhausted");
            AnalysisOutcome::Incomplete
        },
    }
}

impl<'a> Analyser<'a> {
    fn evaluate(
        &mut self,
        position: Box<[u8]>,
        solutions: Vec<usize>,
    ) -> Result<&'a Node, Exhausted> {
        if let Some(&node) = self.cache.get(&position) {
            return Ok(node);
        }
        self.nodes += 1;
        if self.nodes > self.budget {
            return Err(Exhausted);
        }

        let n = solutions.len();
        debug_assert!(n > 0);
        let node = if n == 1 {
            Node {
                win: 1.0,
                best_square: None,
            }
        } else {
            match self.living_squares(&position, &solutions) {
                candidates if candidates.is_empty() => Node {
                    // Every unplayed square reads the same in all remaining
                    // placements; only a blind pick is left.
                    win: 1.0 / n as f64,
                    best_square: None,
                },
                candidates => self.pick_best(&position, &solutions, candidates)?,
            }
        };
        let node = &*self.arena.alloc(node);
        self.cache.insert(position, node);
        Ok(node)
    }

    /// Unplayed squares worth probing: more than one distinct clear value
    /// among the remaining placements. Ordered by mine count ascending then
    /// value spread descending.
    fn living_squares(&self, position: &[u8], solutions: &[usize]) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for p in 0..self.num_cells {
            if position[p] != WILDCARD {
                continue;
            }
            let mut seen = [false; 9];
            let mut distinct = 0_usize;
            let mut mines = 0_usize;
            for &s in solutions {
                let value = self.solutions[s][p];
                if value == MINE {
                    mines += 1;
                } else if !seen[value as usize] {
                    seen[value as usize] = true;
                    distinct += 1;
                }
            }
            if distinct > 1 {
                out.push((p, mines, distinct));
            }
        }
        out.sort_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)).then(a.0.cmp(&b.0)));
        out.into_iter().map(|(p, mines, _)| (p, mines)).collect()
    }

    fn pick_best(
        &mut self,
        position: &[u8],
        solutions: &[usize],
        candidates: Vec<(usize, usize)>,
    ) -> Result<Node, Exhausted> {
        let n = solutions.len() as f64;
        let mut best = 0.0_f64;
        let mut best_square = None;
        for (p, mines) in candidates {
            let survivors = solutions.len() - mines;
            // Candidates come sorted by mine count: once even a perfect
            // continuation cannot beat the incumbent, none of the rest can.
            if survivors as f64 / n <= best {
                break;
            }
            let mut groups: HashMap<u8, Vec<usize>> = HashMap::new();
            for &s in solutions {
                let value = self.solutions[s][p];
                if value != MINE {
                    groups.entry(value).or_default().push(s);
                }
            }
            let mut prob = 0.0_f64;
            let mut remaining = survivors as f64;
            for (value, group) in groups {
                if prob + remaining / n <= best {
                    break;
                }
                remaining -= group.len() as f64;
                let mut child = position.to_vec().into_boxed_slice();
                child[p] = value;
                let weight = group.len() as f64 / n;
                let node = self.evaluate(child, group)?;
                prob += weight * node.win;
            }
            if prob > best {
                best = prob;
                best_square = Some(p);
            }
        }
        Ok(Node {
            win: best,
            best_square,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn census(cells: Vec<CellId>, solutions: Vec<Vec<u8>>) -> BruteForceResult {
        let total = solutions.len() as u64;
        let mut mine_counts = vec![0_u64; cells.len()];
        for solution in &solutions {
            for (count, &value) in mine_counts.iter_mut().zip(solution) {
                if value == MINE {
                    *count += 1;
                }
            }
        }
        BruteForceResult {
            cells,
            solutions: solutions.into_iter().map(Vec::into_boxed_slice).collect(),
            mine_counts,
            total,
            too_many: false,
        }
    }

    #[test]
    fn pure_coin_flip_wins_half_the_time() {
        // Neither square can reveal anything: both show "1" when clear.
        let brute = census(vec![0, 1], vec![vec![MINE, 1], vec![1, MINE]]);
        let outcome = analyse(&brute, &SolverConfig::default());
        assert_eq!(
            outcome,
            AnalysisOutcome::Complete(DeepResult {
                win_probability: 0.5,
                best_cell: None,
            })
        );
    }

    #[test]
    fn discriminating_square_is_played_first() {
        // Square 0 shows a different number in each of its clear
        // placements, so playing it first wins whenever it is not a mine.
        let brute = census(
            vec![7, 9],
            vec![vec![1, MINE], vec![2, MINE], vec![MINE, 1]],
        );
        let outcome = analyse(&brute, &SolverConfig::default());
        let AnalysisOutcome::Complete(result) = outcome else {
            panic!("analysis should complete");
        };
        assert!((result.win_probability - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(result.best_cell, Some(7));
    }

    #[test]
    fn single_placement_is_a_won_game() {
        let brute = census(vec![3, 4], vec![vec![MINE, 2]]);
        let outcome = analyse(&brute, &SolverConfig::default());
        assert_eq!(
            outcome,
            AnalysisOutcome::Complete(DeepResult {
                win_probability: 1.0,
                best_cell: None,
            })
        );
    }

    #[test]
    fn node_budget_exhaustion_is_reported() {
        let brute = census(
            vec![7, 9],
            vec![vec![1, MINE], vec![2, MINE], vec![MINE, 1]],
        );
        let config = SolverConfig {
            max_analysis_nodes: 1,
            ..SolverConfig::default()
        };
        assert_eq!(analyse(&brute, &config), AnalysisOutcome::Incomplete);
    }
}
