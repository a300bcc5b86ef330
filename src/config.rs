/// Tuning knobs recognised by the solver.
///
/// An external collaborator is responsible for loading these from wherever
/// preferences live; the engine only consumes the finished struct.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverConfig {
    /// Upper bound on the estimated placement count before the brute-force
    /// enumerator is considered at all.
    pub max_brute_force_iterations: u64,
    /// Budget for the uncompressed per-component enumeration used by the
    /// dead-cell detector. Exhausting it defers detection for that zone.
    pub max_zone_iterations: u64,
    /// Maximum number of raw solutions retained for deep analysis. Exceeding
    /// it sets the `too_many` flag and skips deep analysis for the turn.
    pub max_solutions: usize,
    /// Maximum number of decision-tree nodes explored by deep analysis
    /// before the search is abandoned as incomplete.
    pub max_analysis_nodes: u64,
    /// How many plies of hypothetical clearing the secondary-safety
    /// evaluator may recurse through. Zero disables it.
    pub recursive_safety_depth: usize,
    /// Run brute-force partitions sequentially instead of on the worker
    /// pool.
    pub single_threaded: bool,
    /// Weigh likely future forced guesses into guess ranking.
    pub consider_long_term_safety: bool,
    /// Suppress flag-placement actions; mines are still inferred and
    /// tracked internally.
    pub flag_free: bool,
    /// Minimum number of actions a chord must save before a `ClearAll` is
    /// emitted in place of individual clears.
    pub chord_benefit_threshold: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_brute_force_iterations: 250_000,
            max_zone_iterations: 50_000,
            max_solutions: 4_000,
            max_analysis_nodes: 200_000,
            recursive_safety_depth: 1,
            single_threaded: false,
            consider_long_term_safety: true,
            flag_free: false,
            chord_benefit_threshold: 2,
        }
    }
}
