/// 卡尔曼滤波核心
///
/// 两个状态空间滤波器变体：
/// - [`KalmanFilter`]：线性变体，恒加速度模型，状态 6 维
///   [x, y, vx, vy, ax_bias, ay_bias]，测量向量 = 各锚点测距 + 两个加速度读数
/// - [`ExtendedKalmanFilter`]：恒速度模型，状态 4 维 [x, y, vx, vy]，
///   加速度作为控制输入进入预测步，测距模型在当前估计处线性化
///
/// 状态机：构造成功即 Ready，之后每周期 predict → update 自环；
/// 配置变更时整个实例作废重建，没有终止态。

use crate::filters::anchor::Anchor;
use crate::filters::config::FilterConfiguration;
use crate::filters::error::FilterError;
use crate::filters::measurement;
use crate::filters::multilateration;
use crate::filters::results::PositionEstimate;
use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// 恒速度状态转移矩阵（4 维状态）
pub(crate) fn cv_transition(dt: f64) -> DMatrix<f64> {
    DMatrix::from_row_slice(
        4,
        4,
        &[
            1.0, 0.0, dt, 0.0, //
            0.0, 1.0, 0.0, dt, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    )
}

/// 加速度控制输入映射矩阵（4 维状态）
pub(crate) fn cv_control(dt: f64) -> DMatrix<f64> {
    let half_dt2 = 0.5 * dt * dt;
    DMatrix::from_row_slice(
        4,
        2,
        &[
            half_dt2, 0.0, //
            0.0, half_dt2, //
            dt, 0.0, //
            0.0, dt,
        ],
    )
}

/// 过程噪声整形矩阵 G（4 维状态）；Q = G·Gᵗ·process_uncertainty
pub(crate) fn cv_noise_shaping(dt: f64) -> DMatrix<f64> {
    cv_control(dt)
}

/// 恒加速度状态转移矩阵（6 维状态，加速度偏置驱动速度与位置）
fn ca_transition(dt: f64) -> DMatrix<f64> {
    let half_dt2 = 0.5 * dt * dt;
    DMatrix::from_row_slice(
        6,
        6,
        &[
            1.0, 0.0, dt, 0.0, half_dt2, 0.0, //
            0.0, 1.0, 0.0, dt, 0.0, half_dt2, //
            0.0, 0.0, 1.0, 0.0, dt, 0.0, //
            0.0, 0.0, 0.0, 1.0, 0.0, dt, //
            0.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ],
    )
}

/// 过程噪声整形矩阵 G（6 维状态）
fn ca_noise_shaping(dt: f64) -> DMatrix<f64> {
    let half_dt2 = 0.5 * dt * dt;
    DMatrix::from_row_slice(
        6,
        2,
        &[
            half_dt2, 0.0, //
            0.0, half_dt2, //
            dt, 0.0, //
            0.0, dt, //
            1.0, 0.0, //
            0.0, 1.0,
        ],
    )
}

/// 从配置派生随机数发生器（定位种子的单锚点分支需要随机方向）
fn rng_from_config(config: &FilterConfiguration) -> StdRng {
    match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// 通用的卡尔曼修正步
///
/// S = H·P·Hᵗ + R，K = P·Hᵗ·S⁻¹，state += K·(z − h)，P −= K·H·P。
/// S 奇异时返回错误且不改动任何状态，调用方跳过本周期即可。
fn correct(
    state: &mut DVector<f64>,
    covariance: &mut DMatrix<f64>,
    h: &DVector<f64>,
    jacobian: &DMatrix<f64>,
    noise_diag: &DVector<f64>,
    measurements: &DVector<f64>,
) -> Result<(), FilterError> {
    let r = DMatrix::from_diagonal(noise_diag);
    let s = jacobian * &*covariance * jacobian.transpose() + r;
    let s_inv = crate::filters::linalg::invert(&s)?;

    let gain = &*covariance * jacobian.transpose() * s_inv;
    let innovation = measurements - h;

    *state += &gain * innovation;
    let correction = &gain * jacobian * &*covariance;
    *covariance -= correction;
    // 消除减法带来的不对称舍入
    let symmetrized = (&*covariance + covariance.transpose()) * 0.5;
    covariance.copy_from(&symmetrized);

    Ok(())
}

/// 线性卡尔曼滤波器（恒加速度模型）
pub struct KalmanFilter {
    state: DVector<f64>,
    covariance: DMatrix<f64>,
    transition: DMatrix<f64>,
    process_noise: DMatrix<f64>,
    distance_uncertainty: f64,
    acceleration_uncertainty: f64,
}

impl KalmanFilter {
    /// 从锚点和一帧完整初始测量（测距 + 加速度）构造
    ///
    /// 位置种子来自多点定位，速度置零，加速度偏置用初始读数，
    /// 协方差初始化为单位阵。
    pub fn new(
        anchors: &[Anchor],
        distances: &[f64],
        acceleration: (f64, f64),
        config: &FilterConfiguration,
    ) -> Result<Self, FilterError> {
        if anchors.is_empty() {
            return Err(FilterError::InsufficientAnchors { available: 0 });
        }

        let mut rng = rng_from_config(config);
        let seed = multilateration::seed_position(anchors, distances, &mut rng)?;

        let state = DVector::from_vec(vec![
            seed.x,
            seed.y,
            0.0,
            0.0,
            acceleration.0,
            acceleration.1,
        ]);
        let dt = config.update_interval_s;
        let g = ca_noise_shaping(dt);
        let process_noise = &g * g.transpose() * config.process_uncertainty;

        Ok(KalmanFilter {
            state,
            covariance: DMatrix::identity(6, 6),
            transition: ca_transition(dt),
            process_noise,
            distance_uncertainty: config.distance_uncertainty,
            acceleration_uncertainty: config.acceleration_uncertainty,
        })
    }

    /// 预测步
    ///
    /// 加速度在本变体中经测量向量进入（偏置状态），控制项为零，
    /// 状态里的偏置分量通过恒加速度转移矩阵驱动速度和位置。
    pub fn predict(&mut self, _acceleration: (f64, f64)) {
        self.state = &self.transition * &self.state;
        self.covariance =
            &self.transition * &self.covariance * self.transition.transpose() + &self.process_noise;
    }

    /// 修正步：测量向量 = 各活跃锚点测距 + 两个加速度读数
    ///
    /// 活跃锚点集与上周期不同也无需额外处理，雅可比每周期
    /// 按传入的锚点子序列重建维度。
    pub fn update(
        &mut self,
        anchors: &[Anchor],
        distances: &[f64],
        acceleration: (f64, f64),
    ) -> Result<(), FilterError> {
        let n = anchors.len();
        let h = measurement::predicted_measurement_with_bias(&self.state, anchors);
        let jacobian = measurement::jacobian_with_bias(&self.state, anchors);

        let mut noise_diag = DVector::zeros(n + 2);
        for i in 0..n {
            noise_diag[i] = self.distance_uncertainty;
        }
        noise_diag[n] = self.acceleration_uncertainty;
        noise_diag[n + 1] = self.acceleration_uncertainty;

        let mut z = DVector::zeros(n + 2);
        for (i, &d) in distances.iter().take(n).enumerate() {
            z[i] = d;
        }
        z[n] = acceleration.0;
        z[n + 1] = acceleration.1;

        correct(
            &mut self.state,
            &mut self.covariance,
            &h,
            &jacobian,
            &noise_diag,
            &z,
        )
    }

    /// 当前位置
    pub fn position(&self) -> (f64, f64) {
        (self.state[0], self.state[1])
    }

    /// 当前协方差矩阵（完整 6×6）
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// 当前估计快照
    pub fn estimate(&self, anchor_count: usize) -> PositionEstimate {
        PositionEstimate::new(
            self.state[0],
            self.state[1],
            self.covariance[(0, 0)],
            self.covariance[(1, 1)],
            "kalman".to_string(),
            anchor_count,
        )
    }
}

/// 扩展卡尔曼滤波器（恒速度模型）
pub struct ExtendedKalmanFilter {
    state: DVector<f64>,
    covariance: DMatrix<f64>,
    transition: DMatrix<f64>,
    control: DMatrix<f64>,
    process_noise: DMatrix<f64>,
    distance_uncertainty: f64,
}

impl ExtendedKalmanFilter {
    /// 从锚点和初始测距构造；至少需要 1 个活跃锚点
    ///
    /// 位置种子来自多点定位，速度置零，
    /// 协方差初始化为按测距不确定度缩放的对角阵。
    pub fn new(
        anchors: &[Anchor],
        distances: &[f64],
        config: &FilterConfiguration,
    ) -> Result<Self, FilterError> {
        if anchors.is_empty() {
            return Err(FilterError::InsufficientAnchors { available: 0 });
        }

        let mut rng = rng_from_config(config);
        let seed = multilateration::seed_position(anchors, distances, &mut rng)?;

        let dt = config.update_interval_s;
        let g = cv_noise_shaping(dt);
        let process_noise = &g * g.transpose() * config.process_uncertainty;

        Ok(ExtendedKalmanFilter {
            state: DVector::from_vec(vec![seed.x, seed.y, 0.0, 0.0]),
            covariance: DMatrix::identity(4, 4) * config.distance_uncertainty,
            transition: cv_transition(dt),
            control: cv_control(dt),
            process_noise,
            distance_uncertainty: config.distance_uncertainty,
        })
    }

    /// 预测步：加速度读数作为控制输入
    pub fn predict(&mut self, acceleration: (f64, f64)) {
        let u = DVector::from_vec(vec![acceleration.0, acceleration.1]);
        self.state = &self.transition * &self.state + &self.control * u;
        self.covariance =
            &self.transition * &self.covariance * self.transition.transpose() + &self.process_noise;
    }

    /// 修正步：在当前估计处线性化测距模型
    pub fn update(&mut self, anchors: &[Anchor], distances: &[f64]) -> Result<(), FilterError> {
        let n = anchors.len();
        let h = measurement::predicted_ranges(&self.state, anchors);
        let jacobian = measurement::range_jacobian(&self.state, anchors, 4);

        let noise_diag = DVector::from_element(n, self.distance_uncertainty);
        let z = DVector::from_column_slice(&distances[..n]);

        correct(
            &mut self.state,
            &mut self.covariance,
            &h,
            &jacobian,
            &noise_diag,
            &z,
        )
    }

    /// 当前位置
    pub fn position(&self) -> (f64, f64) {
        (self.state[0], self.state[1])
    }

    /// 当前速度
    pub fn velocity(&self) -> (f64, f64) {
        (self.state[2], self.state[3])
    }

    /// 当前协方差矩阵（完整 4×4）
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// 当前估计快照
    pub fn estimate(&self, anchor_count: usize) -> PositionEstimate {
        PositionEstimate::new(
            self.state[0],
            self.state[1],
            self.covariance[(0, 0)],
            self.covariance[(1, 1)],
            "ekf".to_string(),
            anchor_count,
        )
    }
}
