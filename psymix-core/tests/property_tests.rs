//! Property-based tests using proptest.
//!
//! These tests verify invariants that must hold for all valid inputs,
//! rather than checking specific numerical values:
//!   - Mixing proportions stay on the simplex after every M-step
//!   - EM never decreases the log-likelihood
//!   - Posterior rows are probability vectors
//!   - Constraint pipeline output structure

use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use psymix_core::mixture::constraints::ModelConstraints;
use psymix_core::mixture::model::MixtureModel;
use psymix_core::mixture::options::EmOptions;
use psymix_linalg::DenseMatrix;

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

/// Two noisy clusters in `dim` dimensions, centers `gap` apart.
fn synthetic(n: usize, dim: usize, gap: f64, seed: u64) -> DenseMatrix {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut values = Vec::with_capacity(n * dim);
    for i in 0..n {
        let shift = if i % 2 == 0 { 0.0 } else { gap };
        for _ in 0..dim {
            let z: f64 = rng.sample(StandardNormal);
            values.push(shift + z);
        }
    }
    DenseMatrix::from_row_major(n, dim, &values)
}

fn prepared(data: &DenseMatrix, groups: usize, constraints: ModelConstraints, seed: u64) -> MixtureModel {
    let mut model = MixtureModel::new(data, groups).unwrap();
    model.set_model_constraints(constraints);
    model
        .set_em_options(EmOptions {
            number_of_starts: 3,
            seed,
            ..Default::default()
        })
        .unwrap();
    model.multiple_random_starts();
    model
}

fn any_constraints() -> impl Strategy<Value = ModelConstraints> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(a, b, c, d)| {
        ModelConstraints {
            same_variance_within: a,
            same_covariance_within: b,
            local_independence: c,
            same_covariance_between: d,
        }
    })
}

// ---------------------------------------------------------------------------
// 1. Mixing proportions lie on the simplex after every M-step
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_proportions_on_simplex(
        n in 20usize..80,
        dim in 1usize..4,
        groups in 1usize..5,
        seed in 0u64..1000,
        constraints in any_constraints(),
    ) {
        let data = synthetic(n, dim, 4.0, seed);
        let mut model = prepared(&data, groups, constraints, seed);
        for _ in 0..8 {
            model.m_step();
            let p = model.mixing_proportions();
            prop_assert!(p.iter().all(|&v| (0.0..=1.0).contains(&v)), "p = {:?}", p);
            prop_assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9, "p = {:?}", p);
        }
    }
}

// ---------------------------------------------------------------------------
// 2. EM log-likelihood is non-decreasing without singular events
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_loglikelihood_non_decreasing(
        n in 40usize..120,
        groups in 1usize..4,
        seed in 0u64..1000,
    ) {
        let data = synthetic(n, 2, 5.0, seed);
        let mut model = prepared(&data, groups, ModelConstraints::default(), seed);
        let mut previous = model.loglikelihood();
        for _ in 0..15 {
            let current = model.m_step();
            if model.status().is_singular() || !current.is_finite() {
                return Ok(());
            }
            let slack = 1e-8 * (1.0 + previous.abs());
            prop_assert!(
                current >= previous - slack,
                "loglik decreased: {} -> {}",
                previous,
                current
            );
            previous = current;
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Posterior rows are probability vectors
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_posterior_rows_sum_to_one(
        n in 10usize..60,
        groups in 1usize..4,
        seed in 0u64..1000,
    ) {
        let data = synthetic(n, 2, 3.0, seed);
        let mut model = prepared(&data, groups, ModelConstraints::default(), seed);
        model.m_step();
        for row in model.posterior_probabilities() {
            if row.iter().any(|r| r.is_nan()) {
                prop_assert!(row.iter().all(|r| r.is_nan()));
                continue;
            }
            prop_assert!(row.iter().all(|&r| (0.0..=1.0).contains(&r)));
            prop_assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }
}

// ---------------------------------------------------------------------------
// 4. Constraint structure holds after an M-step
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_constraint_structure(
        n in 30usize..80,
        dim in 2usize..4,
        groups in 2usize..4,
        seed in 0u64..1000,
        constraints in any_constraints(),
    ) {
        let data = synthetic(n, dim, 4.0, seed);
        let mut model = prepared(&data, groups, constraints, seed);
        model.m_step();
        for g in 0..groups {
            let cov = model.covariance(g);
            for i in 0..dim {
                for j in 0..dim {
                    if i == j {
                        if constraints.same_variance_within {
                            prop_assert_eq!(cov.get(i, i), cov.get(0, 0));
                        }
                    } else if constraints.local_independence {
                        prop_assert_eq!(cov.get(i, j), 0.0);
                    } else if constraints.same_covariance_within {
                        prop_assert_eq!(cov.get(i, j), cov.get(0, 1));
                    }
                }
            }
            if constraints.same_covariance_between {
                prop_assert_eq!(cov, model.covariance(0));
            }
        }
        prop_assert_eq!(model.free_parameters(), constraints.free_parameters(dim, groups));
    }
}
