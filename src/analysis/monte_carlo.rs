//! Monte Carlo analysis
//!
//! Runs many independent budget passes against the same tree, sampling every
//! distributed parameter once per pass, and reduces the per-pass totals to
//! summary statistics. Passes run sequentially; the tree is never mutated,
//! so a single run needs no copies.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::core::config::DEFAULT_ITERATIONS;
use crate::core::error::ModelError;
use crate::core::param::EvalMode;
use crate::model::tree::PowerTree;

/// Monte Carlo run configuration
#[derive(Debug, Clone, Copy)]
pub struct MonteCarlo {
    iterations: u32,
    seed: Option<u64>,
}

impl MonteCarlo {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations,
            seed: None,
        }
    }

    /// Fixed seed for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Run the analysis for one source.
    ///
    /// Every pass that fails to solve fails the whole run; an overloaded
    /// pass is not a failure and is counted in the rating statistics.
    pub fn run(
        &self,
        tree: &PowerTree,
        source_id: u32,
    ) -> Result<MonteCarloSummary, ModelError> {
        match self.seed {
            Some(seed) => self.run_with(tree, source_id, &mut StdRng::seed_from_u64(seed)),
            None => self.run_with(tree, source_id, &mut rand::rng()),
        }
    }

    fn run_with<R: Rng>(
        &self,
        tree: &PowerTree,
        source_id: u32,
        rng: &mut R,
    ) -> Result<MonteCarloSummary, ModelError> {
        if self.iterations == 0 {
            return Err(ModelError::validation(
                "monte carlo",
                "at least one iteration is required",
            ));
        }
        let mut totals: Vec<f64> = Vec::with_capacity(self.iterations as usize);
        let mut dissipations: Vec<f64> = Vec::with_capacity(self.iterations as usize);
        let mut within_rating = 0_u32;
        let mut source_name = String::new();

        for _ in 0..self.iterations {
            let budget = tree.budget(source_id, EvalMode::MonteCarlo, rng)?;
            totals.push(budget.total_current);
            dissipations.push(budget.power_dissipation);
            if budget.overload.is_none() {
                within_rating += 1;
            }
            source_name = budget.source_name;
        }

        Ok(MonteCarloSummary {
            source_id,
            source_name,
            iterations: self.iterations,
            total_current: SampleStats::from_samples(totals),
            power_dissipation: SampleStats::from_samples(dissipations),
            within_rating_percent: (within_rating as f64 / self.iterations as f64) * 100.0,
            generated: Utc::now(),
        })
    }
}

impl Default for MonteCarlo {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

/// Reduced statistics over one sampled quantity
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SampleStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Lower percentile (2.5% for 95% CI)
    pub percentile_2_5: f64,
    /// Upper percentile (97.5% for 95% CI)
    pub percentile_97_5: f64,
}

impl SampleStats {
    fn from_samples(mut samples: Vec<f64>) -> Self {
        samples.sort_by(f64::total_cmp);

        let n = samples.len() as f64;
        let mean: f64 = samples.iter().sum::<f64>() / n;
        let variance: f64 = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        let min = samples.first().copied().unwrap_or(0.0);
        let max = samples.last().copied().unwrap_or(0.0);

        let p2_5_idx = (n * 0.025) as usize;
        let p97_5_idx = (n * 0.975) as usize;
        let percentile_2_5 = samples.get(p2_5_idx).copied().unwrap_or(min);
        let percentile_97_5 = samples.get(p97_5_idx).copied().unwrap_or(max);

        Self {
            mean,
            std_dev,
            min,
            max,
            percentile_2_5,
            percentile_97_5,
        }
    }
}

/// Result of a Monte Carlo run for one source
#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloSummary {
    pub source_id: u32,
    pub source_name: String,
    pub iterations: u32,
    pub total_current: SampleStats,
    pub power_dissipation: SampleStats,
    /// Percentage of passes whose total current stayed within the rating
    pub within_rating_percent: f64,
    pub generated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::param::{BoundKind, Distribution, StatParam};
    use crate::model::efficiency::EfficiencyModel;
    use crate::model::load::{Load, LoadKind};
    use crate::model::source::Source;

    fn rail(rating: f64) -> Source {
        Source::smps(
            1,
            "rail",
            StatParam::new("vin", "V", 12.0).unwrap(),
            StatParam::new("vout", "V", 5.0).unwrap(),
            StatParam::new("max_current", "A", rating).unwrap(),
            EfficiencyModel::fixed(0.9).unwrap(),
        )
        .unwrap()
    }

    fn uniform_load(id: u32, nominal: f64, low: f64, high: f64) -> Load {
        let value = StatParam::with_distribution(
            "load_current",
            "A",
            nominal,
            BoundKind::Value,
            Distribution::Uniform,
            low,
            high,
        )
        .unwrap();
        Load::new(id, "load", LoadKind::ConstantCurrent, value).unwrap()
    }

    #[test]
    fn test_stats_track_the_sampled_range() {
        let mut tree = PowerTree::new();
        tree.add_source(rail(1.0)).unwrap();
        tree.add_load(1, uniform_load(2, 0.5, 0.4, 0.6)).unwrap();

        let summary = MonteCarlo::new(500)
            .with_seed(7)
            .run(&tree, 1)
            .unwrap();
        let stats = summary.total_current;
        assert!(stats.min >= 0.4 - 1e-12);
        assert!(stats.max <= 0.6 + 1e-12);
        assert!(stats.mean > 0.47 && stats.mean < 0.53);
        assert!(stats.percentile_2_5 <= stats.percentile_97_5);
        assert!(stats.std_dev > 0.0);
        assert_eq!(summary.iterations, 500);
        assert_eq!(summary.within_rating_percent, 100.0);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let mut tree = PowerTree::new();
        tree.add_source(rail(1.0)).unwrap();
        tree.add_load(1, uniform_load(2, 0.5, 0.4, 0.6)).unwrap();

        let mc = MonteCarlo::new(200).with_seed(42);
        let first = mc.run(&tree, 1).unwrap();
        let second = mc.run(&tree, 1).unwrap();
        assert_eq!(first.total_current.mean, second.total_current.mean);
        assert_eq!(first.total_current.min, second.total_current.min);
        assert_eq!(first.total_current.max, second.total_current.max);
    }

    #[test]
    fn test_rating_margin_is_counted_per_pass() {
        // Demand straddles the 1.0 A rating, so a fraction of passes overload
        let mut tree = PowerTree::new();
        tree.add_source(rail(1.0)).unwrap();
        tree.add_load(1, uniform_load(2, 1.0, 0.9, 1.1)).unwrap();

        let summary = MonteCarlo::new(400)
            .with_seed(11)
            .run(&tree, 1)
            .unwrap();
        assert!(summary.within_rating_percent > 25.0);
        assert!(summary.within_rating_percent < 75.0);
    }

    #[test]
    fn test_undistributed_tree_collapses_to_nominal() {
        let mut tree = PowerTree::new();
        tree.add_source(rail(1.0)).unwrap();
        tree.add_load(1, Load::constant_current(2, "camera", 0.25).unwrap())
            .unwrap();

        let summary = MonteCarlo::new(50).run(&tree, 1).unwrap();
        let stats = summary.total_current;
        assert_eq!(stats.mean, 0.25);
        assert_eq!(stats.min, 0.25);
        assert_eq!(stats.max, 0.25);
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut tree = PowerTree::new();
        tree.add_source(rail(1.0)).unwrap();
        let result = MonteCarlo::new(0).run(&tree, 1);
        assert!(matches!(result, Err(ModelError::Validation { .. })));
    }
}
