use crate::engines::generation::chromosome::Genotype;
use crate::error::{GlyphKnnError, Result};
use crate::types::GaMode;
use rand::Rng;
use serde::{Deserialize, Serialize};

fn config_err(msg: impl Into<String>) -> GlyphKnnError {
    GlyphKnnError::Configuration(msg.into())
}

fn check_rate(name: &str, rate: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&rate) {
        return Err(config_err(format!("{} must be in [0, 1], got {}", name, rate)));
    }
    Ok(())
}

/// Parent-selection strategy. Exactly one is active per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectionOp {
    /// Probability proportional to raw fitness.
    Roulette,
    /// Roulette over linearly scaled fitness; `pressure` in [0, 2] sets how
    /// strongly the best individual is favored over the average one.
    RouletteScaled { pressure: f64 },
    /// Stochastic universal sampling: one spin, equally spaced pointers.
    StochasticUniversal,
    /// Roulette over rank-derived weights rather than raw fitness.
    Rank { pressure: f64, exponent: f64 },
    Tournament { size: usize },
    Random,
}

impl SelectionOp {
    pub fn validate(&self) -> Result<()> {
        match self {
            SelectionOp::RouletteScaled { pressure } | SelectionOp::Rank { pressure, .. } => {
                if !(0.0..=2.0).contains(pressure) {
                    return Err(config_err(format!(
                        "selection pressure must be in [0, 2], got {}",
                        pressure
                    )));
                }
                if let SelectionOp::Rank { exponent, .. } = self {
                    if *exponent <= 0.0 {
                        return Err(config_err(format!(
                            "rank exponent must be positive, got {}",
                            exponent
                        )));
                    }
                }
                Ok(())
            }
            SelectionOp::Tournament { size } => {
                if *size < 2 {
                    return Err(config_err(format!(
                        "tournament size must be at least 2, got {}",
                        size
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Draw `count` parent indices for one generation. SUS draws them in a
    /// single spaced-pointer sweep; the other strategies draw one at a time.
    pub fn plan<R: Rng>(&self, fitness: &[f64], count: usize, rng: &mut R) -> Vec<usize> {
        match self {
            SelectionOp::StochasticUniversal => sus_plan(fitness, count, rng),
            _ => (0..count).map(|_| self.select_one(fitness, rng)).collect(),
        }
    }

    fn select_one<R: Rng>(&self, fitness: &[f64], rng: &mut R) -> usize {
        match self {
            SelectionOp::Roulette => spin_wheel(fitness, rng),
            SelectionOp::RouletteScaled { pressure } => {
                spin_wheel(&scale_linear(fitness, *pressure), rng)
            }
            SelectionOp::Rank { pressure, exponent } => {
                spin_wheel(&rank_weights(fitness, *pressure, *exponent), rng)
            }
            SelectionOp::Tournament { size } => {
                let mut best = rng.gen_range(0..fitness.len());
                for _ in 1..*size {
                    let candidate = rng.gen_range(0..fitness.len());
                    if fitness[candidate] > fitness[best] {
                        best = candidate;
                    }
                }
                best
            }
            SelectionOp::Random => rng.gen_range(0..fitness.len()),
            SelectionOp::StochasticUniversal => spin_wheel(fitness, rng),
        }
    }
}

/// Roulette spin over non-negative weights; uniform fallback when the
/// wheel has no mass.
fn spin_wheel<R: Rng>(weights: &[f64], rng: &mut R) -> usize {
    let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    if total <= 0.0 {
        return rng.gen_range(0..weights.len());
    }
    let mut spin = rng.gen::<f64>() * total;
    for (i, w) in weights.iter().enumerate() {
        spin -= w.max(0.0);
        if spin <= 0.0 {
            return i;
        }
    }
    weights.len() - 1
}

fn sus_plan<R: Rng>(fitness: &[f64], count: usize, rng: &mut R) -> Vec<usize> {
    let total: f64 = fitness.iter().map(|f| f.max(0.0)).sum();
    if total <= 0.0 || count == 0 {
        return (0..count).map(|_| rng.gen_range(0..fitness.len())).collect();
    }
    let step = total / count as f64;
    let mut pointer = rng.gen::<f64>() * step;
    let mut winners = Vec::with_capacity(count);
    let mut cumulative = 0.0;
    let mut index = 0;
    while winners.len() < count {
        while index < fitness.len() && cumulative + fitness[index].max(0.0) < pointer {
            cumulative += fitness[index].max(0.0);
            index += 1;
        }
        winners.push(index.min(fitness.len() - 1));
        pointer += step;
    }
    winners
}

/// Linear fitness scaling: the mean keeps its weight, the best is pulled
/// toward `pressure` times the mean's share.
fn scale_linear(fitness: &[f64], pressure: f64) -> Vec<f64> {
    let n = fitness.len() as f64;
    let avg: f64 = fitness.iter().sum::<f64>() / n;
    let max = fitness.iter().cloned().fold(f64::MIN, f64::max);
    if max <= avg {
        return vec![1.0; fitness.len()];
    }
    fitness
        .iter()
        .map(|f| (1.0 + (pressure - 1.0) * (f - avg) / (max - avg)).max(0.0))
        .collect()
}

/// Rank-based weights: worst rank gets `2 - pressure`, best gets
/// `pressure`, linear in between, then raised to `exponent`.
fn rank_weights(fitness: &[f64], pressure: f64, exponent: f64) -> Vec<f64> {
    let n = fitness.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        fitness[a]
            .partial_cmp(&fitness[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut weights = vec![0.0; n];
    for (rank, &index) in order.iter().enumerate() {
        let t = if n > 1 { rank as f64 / (n - 1) as f64 } else { 1.0 };
        let w = (2.0 - pressure) + (2.0 * pressure - 2.0) * t;
        weights[index] = w.max(0.0).powf(exponent);
    }
    weights
}

/// Recombination strategy. The last three operate on real genes only and
/// are valid solely in weighting mode; recombined reals clamp to [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CrossoverOp {
    NPoint { points: usize },
    /// Per-gene swap with probability `preference`.
    Uniform { preference: f64 },
    /// Simulated binary crossover with distribution index `eta`.
    Sbx { eta: f64 },
    /// Whole-vector blend: one interpolation factor drawn from
    /// [-alpha, 1 + alpha] shared by all genes.
    SegmentAlpha { alpha: f64 },
    /// Per-gene blend: an independent interpolation factor per gene.
    HypercubeAlpha { alpha: f64 },
}

impl CrossoverOp {
    pub fn is_real_only(&self) -> bool {
        matches!(
            self,
            CrossoverOp::Sbx { .. }
                | CrossoverOp::SegmentAlpha { .. }
                | CrossoverOp::HypercubeAlpha { .. }
        )
    }

    pub fn validate(&self, mode: GaMode, dimensions: usize) -> Result<()> {
        if self.is_real_only() && mode != GaMode::Weighting {
            return Err(config_err(format!(
                "{:?} operates on real genes and requires weighting mode",
                self
            )));
        }
        match self {
            CrossoverOp::NPoint { points } => {
                if *points == 0 || *points >= dimensions {
                    return Err(config_err(format!(
                        "n-point crossover needs 1 <= points < {} dimensions, got {}",
                        dimensions, points
                    )));
                }
                Ok(())
            }
            CrossoverOp::Uniform { preference } => check_rate("uniform preference", *preference),
            CrossoverOp::Sbx { eta } => {
                if *eta <= 0.0 {
                    return Err(config_err(format!("SBX eta must be positive, got {}", eta)));
                }
                Ok(())
            }
            CrossoverOp::SegmentAlpha { alpha } | CrossoverOp::HypercubeAlpha { alpha } => {
                if *alpha < 0.0 {
                    return Err(config_err(format!(
                        "blend alpha must be non-negative, got {}",
                        alpha
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn cross<R: Rng>(&self, a: &Genotype, b: &Genotype, rng: &mut R) -> (Genotype, Genotype) {
        match self {
            CrossoverOp::NPoint { points } => n_point(a, b, *points, rng),
            CrossoverOp::Uniform { preference } => uniform(a, b, *preference, rng),
            CrossoverOp::Sbx { eta } => match (a, b) {
                (Genotype::Reals(x), Genotype::Reals(y)) => {
                    let (c1, c2) = sbx(x, y, *eta, rng);
                    (Genotype::Reals(c1), Genotype::Reals(c2))
                }
                _ => (a.clone(), b.clone()),
            },
            CrossoverOp::SegmentAlpha { alpha } => match (a, b) {
                (Genotype::Reals(x), Genotype::Reals(y)) => {
                    let t = rng.gen::<f64>() * (1.0 + 2.0 * alpha) - alpha;
                    let blend = |p: &[f64], q: &[f64]| {
                        Genotype::Reals(
                            p.iter()
                                .zip(q)
                                .map(|(&u, &v)| (u + t * (v - u)).clamp(0.0, 1.0))
                                .collect(),
                        )
                    };
                    (blend(x, y), blend(y, x))
                }
                _ => (a.clone(), b.clone()),
            },
            CrossoverOp::HypercubeAlpha { alpha } => match (a, b) {
                (Genotype::Reals(x), Genotype::Reals(y)) => {
                    let mut c1 = Vec::with_capacity(x.len());
                    let mut c2 = Vec::with_capacity(x.len());
                    for (&u, &v) in x.iter().zip(y) {
                        let t1 = rng.gen::<f64>() * (1.0 + 2.0 * alpha) - alpha;
                        let t2 = rng.gen::<f64>() * (1.0 + 2.0 * alpha) - alpha;
                        c1.push((u + t1 * (v - u)).clamp(0.0, 1.0));
                        c2.push((v + t2 * (u - v)).clamp(0.0, 1.0));
                    }
                    (Genotype::Reals(c1), Genotype::Reals(c2))
                }
                _ => (a.clone(), b.clone()),
            },
        }
    }
}

fn n_point<R: Rng>(a: &Genotype, b: &Genotype, points: usize, rng: &mut R) -> (Genotype, Genotype) {
    let len = a.len();
    if len <= 1 {
        return (a.clone(), b.clone());
    }
    let mut cuts: Vec<usize> = Vec::with_capacity(points);
    while cuts.len() < points.min(len - 1) {
        let cut = rng.gen_range(1..len);
        if !cuts.contains(&cut) {
            cuts.push(cut);
        }
    }
    cuts.sort_unstable();

    // Alternate which parent supplies each segment.
    let take_from_b = |i: usize| cuts.iter().filter(|&&c| c <= i).count() % 2 == 1;
    match (a, b) {
        (Genotype::Bits(x), Genotype::Bits(y)) => {
            let mut c1 = x.clone();
            let mut c2 = y.clone();
            for i in 0..len {
                if take_from_b(i) {
                    c1[i] = y[i];
                    c2[i] = x[i];
                }
            }
            (Genotype::Bits(c1), Genotype::Bits(c2))
        }
        (Genotype::Reals(x), Genotype::Reals(y)) => {
            let mut c1 = x.clone();
            let mut c2 = y.clone();
            for i in 0..len {
                if take_from_b(i) {
                    c1[i] = y[i];
                    c2[i] = x[i];
                }
            }
            (Genotype::Reals(c1), Genotype::Reals(c2))
        }
        _ => (a.clone(), b.clone()),
    }
}

fn uniform<R: Rng>(a: &Genotype, b: &Genotype, preference: f64, rng: &mut R) -> (Genotype, Genotype) {
    match (a, b) {
        (Genotype::Bits(x), Genotype::Bits(y)) => {
            let mut c1 = x.clone();
            let mut c2 = y.clone();
            for i in 0..x.len() {
                if rng.gen::<f64>() < preference {
                    c1[i] = y[i];
                    c2[i] = x[i];
                }
            }
            (Genotype::Bits(c1), Genotype::Bits(c2))
        }
        (Genotype::Reals(x), Genotype::Reals(y)) => {
            let mut c1 = x.clone();
            let mut c2 = y.clone();
            for i in 0..x.len() {
                if rng.gen::<f64>() < preference {
                    c1[i] = y[i];
                    c2[i] = x[i];
                }
            }
            (Genotype::Reals(c1), Genotype::Reals(c2))
        }
        _ => (a.clone(), b.clone()),
    }
}

fn sbx<R: Rng>(x: &[f64], y: &[f64], eta: f64, rng: &mut R) -> (Vec<f64>, Vec<f64>) {
    let mut c1 = Vec::with_capacity(x.len());
    let mut c2 = Vec::with_capacity(x.len());
    for (&p1, &p2) in x.iter().zip(y) {
        let u: f64 = rng.gen();
        let beta = if u <= 0.5 {
            (2.0 * u).powf(1.0 / (eta + 1.0))
        } else {
            (1.0 / (2.0 * (1.0 - u))).powf(1.0 / (eta + 1.0))
        };
        c1.push((0.5 * ((1.0 + beta) * p1 + (1.0 - beta) * p2)).clamp(0.0, 1.0));
        c2.push((0.5 * ((1.0 - beta) * p1 + (1.0 + beta) * p2)).clamp(0.0, 1.0));
    }
    (c1, c2)
}

/// Mutation strategy. Shift/swap/inversion work on any encoding; bit-flip
/// is selection-mode only, Gaussian perturbation weighting-mode only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationOp {
    /// Move one gene to a new random position.
    Shift,
    /// Exchange two genes.
    Swap,
    /// Reverse a random sub-sequence.
    Inversion,
    BitFlip { rate: f64 },
    Gaussian { sigma: f64, rate: f64 },
}

impl MutationOp {
    pub fn validate(&self, mode: GaMode) -> Result<()> {
        match self {
            MutationOp::BitFlip { rate } => {
                if mode != GaMode::Selection {
                    return Err(config_err(
                        "bit-flip mutation requires selection mode".to_string(),
                    ));
                }
                check_rate("bit-flip rate", *rate)
            }
            MutationOp::Gaussian { sigma, rate } => {
                if mode != GaMode::Weighting {
                    return Err(config_err(
                        "Gaussian mutation requires weighting mode".to_string(),
                    ));
                }
                if *sigma <= 0.0 {
                    return Err(config_err(format!(
                        "Gaussian sigma must be positive, got {}",
                        sigma
                    )));
                }
                check_rate("Gaussian per-gene rate", *rate)
            }
            _ => Ok(()),
        }
    }

    pub fn mutate<R: Rng>(&self, genotype: &mut Genotype, rng: &mut R) {
        let len = genotype.len();
        if len < 2 {
            return;
        }
        match self {
            MutationOp::Shift => {
                let from = rng.gen_range(0..len);
                let to = rng.gen_range(0..len);
                match genotype {
                    Genotype::Bits(b) => {
                        let gene = b.remove(from);
                        b.insert(to, gene);
                    }
                    Genotype::Reals(r) => {
                        let gene = r.remove(from);
                        r.insert(to, gene);
                    }
                }
            }
            MutationOp::Swap => {
                let i = rng.gen_range(0..len);
                let j = rng.gen_range(0..len);
                match genotype {
                    Genotype::Bits(b) => b.swap(i, j),
                    Genotype::Reals(r) => r.swap(i, j),
                }
            }
            MutationOp::Inversion => {
                let i = rng.gen_range(0..len);
                let j = rng.gen_range(0..len);
                let (lo, hi) = (i.min(j), i.max(j));
                match genotype {
                    Genotype::Bits(b) => b[lo..=hi].reverse(),
                    Genotype::Reals(r) => r[lo..=hi].reverse(),
                }
            }
            MutationOp::BitFlip { rate } => {
                if let Genotype::Bits(bits) = genotype {
                    for bit in bits.iter_mut() {
                        if rng.gen::<f64>() < *rate {
                            *bit = !*bit;
                        }
                    }
                }
            }
            MutationOp::Gaussian { sigma, rate } => {
                if let Genotype::Reals(reals) = genotype {
                    for gene in reals.iter_mut() {
                        if rng.gen::<f64>() < *rate {
                            *gene = (*gene + gaussian_sample(*sigma, rng)).clamp(0.0, 1.0);
                        }
                    }
                }
            }
        }
    }
}

/// Box-Muller draw from N(0, sigma).
fn gaussian_sample<R: Rng>(sigma: f64, rng: &mut R) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen::<f64>();
    sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn draw_except<R: Rng>(len: usize, skip: Option<usize>, rng: &mut R) -> usize {
    loop {
        let index = rng.gen_range(0..len);
        if Some(index) != skip {
            return index;
        }
    }
}

/// Replacement strategy. Exactly one is active per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplacementOp {
    /// The whole population is replaced each generation.
    Generational,
    /// Each offspring replaces the single worst current individual.
    SteadyStateWorst,
    /// Each offspring replaces the loser of a random tournament.
    SteadyStateTournament { size: usize },
}

impl ReplacementOp {
    pub fn validate(&self) -> Result<()> {
        if let ReplacementOp::SteadyStateTournament { size } = self {
            if *size < 2 {
                return Err(config_err(format!(
                    "replacement tournament size must be at least 2, got {}",
                    size
                )));
            }
        }
        Ok(())
    }

    pub fn is_generational(&self) -> bool {
        matches!(self, ReplacementOp::Generational)
    }

    /// Index of the individual an offspring should replace. `skip` shields
    /// one index, so a just-placed sibling cannot be picked as the victim
    /// for the second offspring of the same step.
    pub fn victim<R: Rng>(&self, fitness: &[f64], skip: Option<usize>, rng: &mut R) -> usize {
        match self {
            ReplacementOp::Generational => unreachable!("generational replacement has no victim"),
            ReplacementOp::SteadyStateWorst => {
                let mut worst: Option<(usize, f64)> = None;
                for (i, &f) in fitness.iter().enumerate() {
                    if Some(i) == skip {
                        continue;
                    }
                    match worst {
                        Some((_, w)) if f >= w => {}
                        _ => worst = Some((i, f)),
                    }
                }
                worst.map(|(i, _)| i).unwrap_or(0)
            }
            ReplacementOp::SteadyStateTournament { size } => {
                let mut loser = draw_except(fitness.len(), skip, rng);
                for _ in 1..*size {
                    let candidate = draw_except(fitness.len(), skip, rng);
                    if fitness[candidate] < fitness[loser] {
                        loser = candidate;
                    }
                }
                loser
            }
        }
    }
}
