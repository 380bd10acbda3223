//! Named posterior summaries and convergence checks for sampler output.

use num_traits::ToPrimitive;

use super::sampler::Chain;
use super::{InferenceError, SummaryOptions};
use crate::utils::usize_to_f64;

/// Posterior summary for one named parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSummary {
    pub name: String,
    pub mean: f64,
    pub std_dev: f64,
    /// 2.5%, 50% and 97.5% quantiles of the retained draws.
    pub q025: f64,
    pub q50: f64,
    pub q975: f64,
    pub effective_sample_size: f64,
}

/// Retained-draw summary of a single chain, one entry per parameter.
#[derive(Debug, Clone, Default)]
pub struct ChainSummary {
    pub draw_count: usize,
    pub acceptance_rate: f64,
    pub parameters: Vec<ParameterSummary>,
}

impl ChainSummary {
    /// Summary of the parameter called `name`.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSummary> {
        self.parameters.iter().find(|summary| summary.name == name)
    }
}

/// Streaming mean and sum of squared deviations.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    count: usize,
    mean: f64,
    m2: f64,
}

impl Moments {
    fn from_values(values: &[f64]) -> Self {
        let mut moments = Self::default();
        for &value in values {
            moments.push(value);
        }
        moments
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / usize_to_f64(self.count);
        self.m2 += delta * (value - self.mean);
    }

    /// Unbiased variance; zero below two values.
    fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / usize_to_f64(self.count - 1)
        }
    }
}

/// Biased lag-`lag` autocovariance around `mean`.
fn autocovariance(series: &[f64], mean: f64, lag: usize) -> f64 {
    let sum = series
        .iter()
        .zip(&series[lag..])
        .map(|(a, b)| (a - mean) * (b - mean))
        .sum::<f64>();
    sum / usize_to_f64(series.len())
}

/// Lag-`lag` autocorrelation of a scalar trace.
///
/// Returns `0` for an empty or constant trace and for lags past its end.
#[must_use]
pub fn autocorrelation(series: &[f64], lag: usize) -> f64 {
    if lag >= series.len() {
        return 0.0;
    }
    let mean = Moments::from_values(series).mean;
    let variance = autocovariance(series, mean, 0);
    if variance <= 0.0 {
        return 0.0;
    }
    autocovariance(series, mean, lag) / variance
}

/// Effective sample size from Geyer's initial monotone sequence.
///
/// Autocorrelations are summed in adjacent pairs until a pair turns
/// non-positive, with each pair capped by the one before it. The
/// integrated autocorrelation time is floored at `1 / log10(n)`, so
/// antithetic traces report at most `n log10(n)`. Constant traces and
/// traces shorter than four draws report their length.
#[must_use]
pub fn effective_sample_size(series: &[f64]) -> f64 {
    let n = series.len();
    let n_f64 = usize_to_f64(n);
    if n < 4 {
        return n_f64;
    }
    let mean = Moments::from_values(series).mean;
    let variance = autocovariance(series, mean, 0);
    if variance <= 0.0 {
        return n_f64;
    }

    let rho = |lag: usize| autocovariance(series, mean, lag) / variance;
    let mut tau = -1.0;
    let mut cap = f64::INFINITY;
    let mut lag = 0;
    while lag + 1 < n {
        let pair = rho(lag) + rho(lag + 1);
        if pair <= 0.0 {
            break;
        }
        cap = pair.min(cap);
        tau += 2.0 * cap;
        lag += 2;
    }

    n_f64 / tau.max(n_f64.log10().recip())
}

/// Summarize every parameter of `chain` after burn-in and thinning.
///
/// `names[k]` labels column `k`; pass `PARAMETER_NAMES` for chains over a
/// `PhyloObjective`.
///
/// # Errors
///
/// Returns `InferenceError` if `options` discards the whole chain or
/// `names` does not label every column.
pub fn summarize_chain(
    chain: &Chain,
    names: &[&str],
    options: SummaryOptions,
) -> Result<ChainSummary, InferenceError> {
    if names.len() != chain.dimension() {
        return Err(InferenceError::NameCount {
            expected: chain.dimension(),
            found: names.len(),
        });
    }
    options.validate(chain.iterations())?;

    let parameters = names
        .iter()
        .enumerate()
        .map(|(index, name)| summarize_trace(name, &chain.retained_trace(index, options)))
        .collect();

    Ok(ChainSummary {
        draw_count: options.retained(chain.iterations()).count(),
        acceptance_rate: chain.acceptance_rate(),
        parameters,
    })
}

fn summarize_trace(name: &str, values: &[f64]) -> ParameterSummary {
    let moments = Moments::from_values(values);
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    ParameterSummary {
        name: name.to_string(),
        mean: moments.mean,
        std_dev: moments.variance().sqrt(),
        q025: quantile(&sorted, 0.025),
        q50: quantile(&sorted, 0.5),
        q975: quantile(&sorted, 0.975),
        effective_sample_size: effective_sample_size(values),
    }
}

/// Linear-interpolation quantile of an ascending slice; `NaN` when empty.
fn quantile(sorted: &[f64], probability: f64) -> f64 {
    let Some(&last) = sorted.last() else {
        return f64::NAN;
    };
    let position = probability.clamp(0.0, 1.0) * usize_to_f64(sorted.len() - 1);
    let floor = position.floor();
    let index = floor.to_usize().unwrap_or(0);
    match sorted.get(index + 1) {
        Some(&next) => (position - floor).mul_add(next - sorted[index], sorted[index]),
        None => last,
    }
}

/// Split-R-hat per parameter across chains.
///
/// Each chain's retained draws are cut to the shortest chain's even count
/// and halved. The halves are compared as separate sequences. Values near
/// `1` indicate mixing. Halves that are all constant give `1` when they
/// agree and `inf` when they do not.
///
/// # Errors
///
/// Returns `InferenceError` for fewer than two chains, fewer than four
/// retained draws, or chains of differing dimension.
pub fn split_rhat(chains: &[Chain], options: SummaryOptions) -> Result<Vec<f64>, InferenceError> {
    if chains.len() < 2 {
        return Err(InferenceError::InvalidChainCount {
            min: 2,
            found: chains.len(),
        });
    }
    let dimension = chains[0].dimension();
    if chains.iter().any(|chain| chain.dimension() != dimension) {
        return Err(InferenceError::InconsistentChainDimensions);
    }
    let mut shortest = usize::MAX;
    for chain in chains {
        options.validate(chain.iterations())?;
        shortest = shortest.min(options.retained(chain.iterations()).count());
    }
    let used = shortest - shortest % 2;
    if used < 4 {
        return Err(InferenceError::InsufficientChainDraws {
            minimum: 4,
            found: used,
        });
    }

    let half = used / 2;
    Ok((0..dimension)
        .map(|index| {
            let halves: Vec<Moments> = chains
                .iter()
                .flat_map(|chain| {
                    let trace = chain.retained_trace(index, options);
                    [
                        Moments::from_values(&trace[..half]),
                        Moments::from_values(&trace[half..used]),
                    ]
                })
                .collect();
            potential_scale_reduction(&halves, half)
        })
        .collect())
}

fn potential_scale_reduction(sequences: &[Moments], length: usize) -> f64 {
    let n = usize_to_f64(length);
    let means: Vec<f64> = sequences.iter().map(|moments| moments.mean).collect();
    let between = n * Moments::from_values(&means).variance();
    let within = sequences.iter().map(Moments::variance).sum::<f64>()
        / usize_to_f64(sequences.len());

    if within <= 0.0 {
        return if between <= 0.0 { 1.0 } else { f64::INFINITY };
    }
    let pooled = ((n - 1.0) / n).mul_add(within, between / n);
    (pooled / within).sqrt()
}
