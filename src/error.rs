use thiserror::Error;

/// Failures surfaced by the solving engine.
///
/// Budget exhaustion (iteration, node or solution caps) is deliberately *not*
/// an error: it is signalled in-band and degrades to a cheaper strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    /// The observed board state is logically inconsistent: witness counts
    /// contradict each other or exceed what is physically possible.
    #[error("invalid board: {0}")]
    InvalidBoard(&'static str),

    /// A modelling invariant was violated. This indicates a bug in the
    /// caller or the engine, not a property of the board, and aborts the
    /// current turn's computation.
    #[error("internal solver error: {0}")]
    Internal(&'static str),
}
