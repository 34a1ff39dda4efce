use std::time::Duration;

use serde::Deserialize;

/// Budget used when the configured one is too large to represent.
const LONGEST_TIME_LIMIT: Duration = Duration::from_secs(86_400 * 365);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GreedyStrategy {
    /// Lowest, then leftmost free rectangle first.
    #[default]
    BottomLeft,
    /// Free rectangle whose centre is nearest the container centre first.
    CenterOut,
}

impl std::fmt::Display for GreedyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GreedyStrategy::BottomLeft => write!(f, "bottom-left"),
            GreedyStrategy::CenterOut => write!(f, "center-out"),
        }
    }
}

/// Solver-wide settings. Immutable once built; every solver receives its
/// own copy, so independent solves never share state.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Wall-clock budget for one top-level solve, in seconds.
    pub time_limit_secs: f64,
    pub max_solutions: usize,
    /// Efficiency (percent) at which the orchestrator stops escalating.
    pub early_stop_efficiency: f64,
    /// Weight of the centring penalty in the ILP objective, in `[0, 1]`.
    pub compactness_weight: f64,
    pub greedy_strategy: GreedyStrategy,
    /// Reject symmetric duplicates while enumerating.
    pub symmetry_breaking: bool,
    /// Largest ILP model (candidate placements) handed to the backend.
    pub ilp_max_candidates: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 60.0,
            max_solutions: 10,
            early_stop_efficiency: 95.0,
            compactness_weight: 0.1,
            greedy_strategy: GreedyStrategy::BottomLeft,
            symmetry_breaking: true,
            ilp_max_candidates: 20_000,
        }
    }
}

impl SolverConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit_secs.max(0.0)).unwrap_or(LONGEST_TIME_LIMIT)
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit_secs = time_limit.as_secs_f64();
        self
    }

    pub fn with_max_solutions(mut self, max_solutions: usize) -> Self {
        self.max_solutions = max_solutions;
        self
    }

    pub fn with_early_stop_efficiency(mut self, percent: f64) -> Self {
        self.early_stop_efficiency = percent;
        self
    }

    pub fn with_compactness_weight(mut self, weight: f64) -> Self {
        self.compactness_weight = weight.clamp(0.0, 1.0);
        self
    }

    pub fn with_greedy_strategy(mut self, strategy: GreedyStrategy) -> Self {
        self.greedy_strategy = strategy;
        self
    }

    pub fn with_symmetry_breaking(mut self, enabled: bool) -> Self {
        self.symmetry_breaking = enabled;
        self
    }

    pub fn with_ilp_max_candidates(mut self, max: usize) -> Self {
        self.ilp_max_candidates = max;
        self
    }
}
