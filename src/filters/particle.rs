/// 粒子滤波核心
///
/// 自举式粒子滤波：转移先验作为重要性密度，权重更新只乘测量似然；
/// 正则化变体在重采样后按最优核带宽对粒子做抖动，抑制样本贫化。
///
/// 权重以对数形式存储，归一化用 log-sum-exp，避免下溢；
/// 似然全部退化（权重和为零）时回退到均匀权重而不是传播 NaN。

use crate::filters::anchor::Anchor;
use crate::filters::config::{FilterConfiguration, ParticleKind};
use crate::filters::error::FilterError;
use crate::filters::kalman::{cv_control, cv_noise_shaping, cv_transition};
use crate::filters::linalg;
use crate::filters::measurement;
use crate::filters::multilateration;
use crate::filters::results::PositionEstimate;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::f64::consts::TAU;

/// 状态维数 [x, y, vx, vy]
const STATE_DIM: usize = 4;

/// 单个粒子：一个状态假设及其对数重要性权重
#[derive(Clone, Debug)]
pub struct Particle {
    /// 状态向量 [x, y, vx, vy]
    pub state: DVector<f64>,
    /// 对数权重（归一化后 exp 求和为 1）
    pub log_weight: f64,
}

/// 粒子滤波器
pub struct ParticleFilter {
    particles: Vec<Particle>,
    kind: ParticleKind,
    transition: DMatrix<f64>,
    control: DMatrix<f64>,
    noise_shaping: DMatrix<f64>,
    process_std: f64,
    distance_uncertainty: f64,
    resample_threshold: f64,
    rng: StdRng,
}

impl ParticleFilter {
    /// 从锚点和初始测距构造；至少需要 1 个活跃锚点
    ///
    /// 在多点定位种子周围按测距不确定度高斯散布 `particle_count`
    /// 个粒子，初始权重均匀（log_weight = −ln N）。
    pub fn new(
        anchors: &[Anchor],
        distances: &[f64],
        config: &FilterConfiguration,
    ) -> Result<Self, FilterError> {
        if anchors.is_empty() {
            return Err(FilterError::InsufficientAnchors { available: 0 });
        }

        let mut rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let seed = multilateration::seed_position(anchors, distances, &mut rng)?;

        let n = config.particle_count;
        let scatter_std = config.distance_uncertainty.sqrt();
        let uniform_log_weight = -(n as f64).ln();
        let mut particles = Vec::with_capacity(n);
        for _ in 0..n {
            let zx: f64 = rng.sample(StandardNormal);
            let zy: f64 = rng.sample(StandardNormal);
            particles.push(Particle {
                state: DVector::from_vec(vec![
                    seed.x + scatter_std * zx,
                    seed.y + scatter_std * zy,
                    0.0,
                    0.0,
                ]),
                log_weight: uniform_log_weight,
            });
        }

        let dt = config.update_interval_s;
        Ok(ParticleFilter {
            particles,
            kind: config.particle_kind,
            transition: cv_transition(dt),
            control: cv_control(dt),
            noise_shaping: cv_noise_shaping(dt),
            process_std: config.process_uncertainty.sqrt(),
            distance_uncertainty: config.distance_uncertainty,
            resample_threshold: config.resample_threshold,
            rng,
        })
    }

    /// 预测步：每个粒子从转移先验重新采样
    ///
    /// 均值 F·state + B·u，再叠加协方差为 G·Gᵗ·process_uncertainty
    /// 的过程噪声（直接用 G 的已知因子化采样：w = G·z·σ）。
    pub fn predict(&mut self, acceleration: (f64, f64)) {
        let u = DVector::from_vec(vec![acceleration.0, acceleration.1]);
        let drift = &self.control * u;
        for particle in &mut self.particles {
            let zx: f64 = self.rng.sample(StandardNormal);
            let zy: f64 = self.rng.sample(StandardNormal);
            let z = DVector::from_vec(vec![zx, zy]) * self.process_std;
            particle.state = &self.transition * &particle.state + &drift + &self.noise_shaping * z;
        }
    }

    /// 修正步：自举权重更新 + 条件重采样
    ///
    /// 对每个粒子，在 h(particle.state) 处以对角协方差 R 求测量的
    /// 高斯对数似然并累加到 log_weight；log-sum-exp 归一化后检查
    /// 有效样本数，低于阈值则重采样（正则化变体随后做核抖动）。
    pub fn update(&mut self, anchors: &[Anchor], distances: &[f64]) -> Result<(), FilterError> {
        let n = anchors.len();
        let r_var = self.distance_uncertainty;
        let log_norm = -0.5 * (TAU * r_var).ln();

        for particle in &mut self.particles {
            let h = measurement::predicted_ranges(&particle.state, anchors);
            let mut log_likelihood = 0.0;
            for i in 0..n {
                let residual = distances[i] - h[i];
                log_likelihood += log_norm - 0.5 * residual * residual / r_var;
            }
            particle.log_weight += log_likelihood;
        }

        self.normalize_weights();

        if self.effective_sample_size() < self.resample_threshold {
            self.resample();
            if self.kind == ParticleKind::Regularized {
                self.regularize();
            }
        }

        Ok(())
    }

    /// log-sum-exp 归一化；全退化权重集回退为均匀
    fn normalize_weights(&mut self) {
        let max = self
            .particles
            .iter()
            .map(|p| p.log_weight)
            .fold(f64::NEG_INFINITY, f64::max);

        if !max.is_finite() {
            // 所有似然为零（或 NaN 污染）：均匀重置，保持实时环路存活
            let uniform = -(self.particles.len() as f64).ln();
            for particle in &mut self.particles {
                particle.log_weight = uniform;
            }
            return;
        }

        let sum: f64 = self
            .particles
            .iter()
            .map(|p| (p.log_weight - max).exp())
            .sum();
        let log_sum = max + sum.ln();
        for particle in &mut self.particles {
            particle.log_weight -= log_sum;
        }
    }

    /// 有效样本数 N_eff = 1 / Σ wᵢ²（权重须已归一化）
    pub fn effective_sample_size(&self) -> f64 {
        let sum_sq: f64 = self
            .particles
            .iter()
            .map(|p| {
                let w = p.log_weight.exp();
                w * w
            })
            .sum();
        if sum_sq > 0.0 { 1.0 / sum_sq } else { 0.0 }
    }

    /// 系统重采样：按权重有放回抽取新一代粒子，权重重置为均匀
    ///
    /// 等距分层抽样，无偏且方差低于多项式重采样。
    fn resample(&mut self) {
        let n = self.particles.len();
        let weights: Vec<f64> = self.particles.iter().map(|p| p.log_weight.exp()).collect();

        let step = 1.0 / n as f64;
        let mut u = self.rng.gen_range(0.0..step);
        let mut cumulative = weights[0];
        let mut i = 0;

        let uniform_log_weight = -(n as f64).ln();
        let mut next_generation = Vec::with_capacity(n);
        for _ in 0..n {
            while u > cumulative && i + 1 < n {
                i += 1;
                cumulative += weights[i];
            }
            next_generation.push(Particle {
                state: self.particles[i].state.clone(),
                log_weight: uniform_log_weight,
            });
            u += step;
        }

        self.particles = next_generation;
    }

    /// 正则化抖动：重采样后按最优核带宽恢复状态空间多样性
    ///
    /// 对重采样后的粒子群求加权样本协方差，取其 Cholesky 因子 D
    /// （必要时经正定修复），每个粒子叠加 h_opt·D·z。
    /// h_opt 为 Silverman 规则带宽，随粒子数和状态维数变化。
    fn regularize(&mut self) {
        let covariance = self.weighted_state_covariance();
        let d = linalg::cholesky_factor(&covariance);
        let h_opt = silverman_bandwidth(self.particles.len(), STATE_DIM);

        for particle in &mut self.particles {
            let z = DVector::from_fn(STATE_DIM, |_, _| self.rng.sample(StandardNormal));
            particle.state += &d * z * h_opt;
        }
    }

    /// 粒子群的加权样本协方差（完整状态维度）
    fn weighted_state_covariance(&self) -> DMatrix<f64> {
        let mean = self.weighted_state_mean();
        let mut covariance = DMatrix::zeros(STATE_DIM, STATE_DIM);
        for particle in &self.particles {
            let w = particle.log_weight.exp();
            let delta = &particle.state - &mean;
            covariance += &delta * delta.transpose() * w;
        }
        covariance
    }

    /// 粒子群的加权状态均值
    fn weighted_state_mean(&self) -> DVector<f64> {
        let mut mean = DVector::zeros(STATE_DIM);
        for particle in &self.particles {
            mean += &particle.state * particle.log_weight.exp();
        }
        mean
    }

    /// 加权平均位置
    pub fn position(&self) -> (f64, f64) {
        let mean = self.weighted_state_mean();
        (mean[0], mean[1])
    }

    /// 粒子位置列表（用于可视化）
    pub fn particle_positions(&self) -> Vec<(f64, f64)> {
        self.particles
            .iter()
            .map(|p| (p.state[0], p.state[1]))
            .collect()
    }

    /// 粒子数量
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// 当前估计快照（含粒子云）
    pub fn estimate(&self, anchor_count: usize) -> PositionEstimate {
        let covariance = self.weighted_state_covariance();
        let (x, y) = self.position();
        PositionEstimate::new(
            x,
            y,
            covariance[(0, 0)],
            covariance[(1, 1)],
            match self.kind {
                ParticleKind::Bootstrap => "particle_bootstrap".to_string(),
                ParticleKind::Regularized => "particle_regularized".to_string(),
            },
            anchor_count,
        )
        .with_particles(self.particle_positions())
    }
}

/// Silverman 规则的最优核带宽：(4 / (N·(d+2)))^(1/(d+4))
fn silverman_bandwidth(particle_count: usize, state_dim: usize) -> f64 {
    let n = particle_count as f64;
    let d = state_dim as f64;
    (4.0 / (n * (d + 2.0))).powf(1.0 / (d + 4.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::config::FilterKind;

    fn test_config(kind: ParticleKind) -> FilterConfiguration {
        FilterConfiguration {
            filter_kind: FilterKind::Particle,
            particle_kind: kind,
            particle_count: 300,
            resample_threshold: 150.0,
            rng_seed: Some(11),
            ..FilterConfiguration::default()
        }
    }

    fn square_anchors() -> Vec<Anchor> {
        vec![
            Anchor::new(1, 0.0, 0.0),
            Anchor::new(2, 1000.0, 0.0),
            Anchor::new(3, 0.0, 1000.0),
        ]
    }

    fn exact_distances(anchors: &[Anchor], x: f64, y: f64) -> Vec<f64> {
        anchors.iter().map(|a| a.distance_to(x, y)).collect()
    }

    #[test]
    fn test_construction_scatters_around_seed() {
        let anchors = square_anchors();
        let distances = exact_distances(&anchors, 300.0, 400.0);
        let pf = ParticleFilter::new(&anchors, &distances, &test_config(ParticleKind::Bootstrap))
            .unwrap();

        assert_eq!(pf.particle_count(), 300);
        let (x, y) = pf.position();
        // 均匀初始权重下的均值应落在种子附近
        assert!((x - 300.0).abs() < 10.0);
        assert!((y - 400.0).abs() < 10.0);
        // 初始 N_eff 等于粒子数
        assert!((pf.effective_sample_size() - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_construction_requires_anchors() {
        let result = ParticleFilter::new(&[], &[], &test_config(ParticleKind::Bootstrap));
        assert!(matches!(
            result,
            Err(FilterError::InsufficientAnchors { available: 0 })
        ));
    }

    #[test]
    fn test_update_concentrates_on_informative_measurements() {
        let anchors = square_anchors();
        let distances = exact_distances(&anchors, 300.0, 400.0);
        let mut pf =
            ParticleFilter::new(&anchors, &distances, &test_config(ParticleKind::Bootstrap))
                .unwrap();

        for _ in 0..15 {
            pf.predict((0.0, 0.0));
            pf.update(&anchors, &distances).unwrap();
        }

        let (x, y) = pf.position();
        let error = ((x - 300.0).powi(2) + (y - 400.0).powi(2)).sqrt();
        assert!(error < 50.0, "估计偏差过大: {}", error);
        assert_eq!(pf.particle_count(), 300);
    }

    #[test]
    fn test_resampling_resets_weights_uniform() {
        let anchors = square_anchors();
        let distances = exact_distances(&anchors, 300.0, 400.0);
        let mut config = test_config(ParticleKind::Bootstrap);
        // 阈值设为粒子数上限，强制每次更新后都重采样
        config.resample_threshold = config.particle_count as f64;
        let mut pf = ParticleFilter::new(&anchors, &distances, &config).unwrap();

        pf.predict((0.0, 0.0));
        pf.update(&anchors, &distances).unwrap();

        assert_eq!(pf.particle_count(), 300);
        let uniform = -(300.0_f64).ln();
        for particle in &pf.particles {
            assert!((particle.log_weight - uniform).abs() < 1e-12);
        }
        assert!((pf.effective_sample_size() - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_weights_fall_back_to_uniform() {
        let anchors = square_anchors();
        let distances = exact_distances(&anchors, 300.0, 400.0);
        let mut pf =
            ParticleFilter::new(&anchors, &distances, &test_config(ParticleKind::Bootstrap))
                .unwrap();

        // 离谱的测量让所有似然下溢为零
        let absurd = vec![1.0e9, 1.0e9, 1.0e9];
        for particle in &mut pf.particles {
            particle.log_weight = f64::NEG_INFINITY;
        }
        pf.update(&anchors, &absurd).unwrap();

        for particle in &pf.particles {
            assert!(particle.log_weight.is_finite());
        }
        let total: f64 = pf.particles.iter().map(|p| p.log_weight.exp()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_regularized_jitter_preserves_population() {
        let anchors = square_anchors();
        let distances = exact_distances(&anchors, 300.0, 400.0);
        let mut config = test_config(ParticleKind::Regularized);
        config.resample_threshold = config.particle_count as f64;
        let mut pf = ParticleFilter::new(&anchors, &distances, &config).unwrap();

        pf.predict((0.0, 0.0));
        pf.update(&anchors, &distances).unwrap();

        assert_eq!(pf.particle_count(), 300);
        // 抖动后粒子不应坍缩到同一点
        let positions = pf.particle_positions();
        let distinct = positions
            .iter()
            .any(|&(x, y)| (x - positions[0].0).abs() > 1e-9 || (y - positions[0].1).abs() > 1e-9);
        assert!(distinct);
    }

    #[test]
    fn test_deterministic_under_fixed_seed() {
        let anchors = square_anchors();
        let distances = exact_distances(&anchors, 300.0, 400.0);
        let config = test_config(ParticleKind::Bootstrap);

        let run = |config: &FilterConfiguration| {
            let mut pf = ParticleFilter::new(&anchors, &distances, config).unwrap();
            for _ in 0..5 {
                pf.predict((0.0, 0.0));
                pf.update(&anchors, &distances).unwrap();
            }
            pf.position()
        };

        assert_eq!(run(&config), run(&config));
    }

    #[test]
    fn test_silverman_bandwidth_shrinks_with_population() {
        assert!(silverman_bandwidth(1000, 4) < silverman_bandwidth(100, 4));
        assert!(silverman_bandwidth(100, 4) > 0.0);
    }
}
