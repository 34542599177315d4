/// 贝叶斯滤波器统一契约
///
/// 定位环路每个测量帧驱动一次 predict → update。三种滤波器实现
/// 同一契约，具体变体在配置时选定，以带标签的枚举承载，
/// 避免继承层次，按变体单独测试。

use crate::filters::anchor::Anchor;
use crate::filters::config::{FilterConfiguration, FilterKind};
use crate::filters::error::FilterError;
use crate::filters::kalman::{ExtendedKalmanFilter, KalmanFilter};
use crate::filters::particle::ParticleFilter;
use crate::filters::results::PositionEstimate;

/// 单周期测量帧
///
/// 由外部测距模块产生：距离序列与活跃锚点子序列一一对应，
/// 外加一对加速度计读数。滤波器消费后即丢弃。
#[derive(Clone, Debug)]
pub struct MeasurementFrame {
    /// 各活跃锚点的距离测量（顺序与活跃锚点序列一致）
    pub distances: Vec<f64>,
    /// 加速度计读数 (ax, ay)
    pub acceleration: (f64, f64),
}

impl MeasurementFrame {
    /// 创建测量帧
    pub fn new(distances: Vec<f64>, acceleration: (f64, f64)) -> Self {
        MeasurementFrame {
            distances,
            acceleration,
        }
    }
}

/// 贝叶斯滤波器契约：每帧严格先 predict 后 update
pub trait BayesianFilter {
    /// 预测步；加速度读数作为控制输入（线性卡尔曼变体忽略之）
    fn predict(&mut self, acceleration: (f64, f64));

    /// 修正步；矩阵奇异时返回错误且不得破坏已有状态
    fn update(&mut self, anchors: &[Anchor], frame: &MeasurementFrame) -> Result<(), FilterError>;

    /// 当前估计快照
    fn estimate(&self, anchor_count: usize) -> PositionEstimate;
}

impl BayesianFilter for KalmanFilter {
    fn predict(&mut self, acceleration: (f64, f64)) {
        KalmanFilter::predict(self, acceleration);
    }

    fn update(&mut self, anchors: &[Anchor], frame: &MeasurementFrame) -> Result<(), FilterError> {
        KalmanFilter::update(self, anchors, &frame.distances, frame.acceleration)
    }

    fn estimate(&self, anchor_count: usize) -> PositionEstimate {
        KalmanFilter::estimate(self, anchor_count)
    }
}

impl BayesianFilter for ExtendedKalmanFilter {
    fn predict(&mut self, acceleration: (f64, f64)) {
        ExtendedKalmanFilter::predict(self, acceleration);
    }

    fn update(&mut self, anchors: &[Anchor], frame: &MeasurementFrame) -> Result<(), FilterError> {
        ExtendedKalmanFilter::update(self, anchors, &frame.distances)
    }

    fn estimate(&self, anchor_count: usize) -> PositionEstimate {
        ExtendedKalmanFilter::estimate(self, anchor_count)
    }
}

impl BayesianFilter for ParticleFilter {
    fn predict(&mut self, acceleration: (f64, f64)) {
        ParticleFilter::predict(self, acceleration);
    }

    fn update(&mut self, anchors: &[Anchor], frame: &MeasurementFrame) -> Result<(), FilterError> {
        ParticleFilter::update(self, anchors, &frame.distances)
    }

    fn estimate(&self, anchor_count: usize) -> PositionEstimate {
        ParticleFilter::estimate(self, anchor_count)
    }
}

/// 配置时选定的滤波器变体
pub enum PositionFilter {
    /// 线性卡尔曼（恒加速度）
    Kalman(KalmanFilter),
    /// 扩展卡尔曼（恒速度）
    Extended(ExtendedKalmanFilter),
    /// 粒子滤波
    Particle(ParticleFilter),
}

impl PositionFilter {
    /// 按配置从首帧测量构造滤波器
    ///
    /// `FilterKind::None` 返回 `Ok(None)`：不建滤波器，
    /// 定位环路改为逐帧输出原始多点定位解。
    pub fn from_configuration(
        config: &FilterConfiguration,
        anchors: &[Anchor],
        frame: &MeasurementFrame,
    ) -> Result<Option<Self>, FilterError> {
        let filter = match config.filter_kind {
            FilterKind::None => return Ok(None),
            FilterKind::Kalman => PositionFilter::Kalman(KalmanFilter::new(
                anchors,
                &frame.distances,
                frame.acceleration,
                config,
            )?),
            FilterKind::ExtendedKalman => PositionFilter::Extended(ExtendedKalmanFilter::new(
                anchors,
                &frame.distances,
                config,
            )?),
            FilterKind::Particle => {
                PositionFilter::Particle(ParticleFilter::new(anchors, &frame.distances, config)?)
            }
        };
        Ok(Some(filter))
    }

    /// 粒子位置列表；非粒子滤波变体返回 None
    pub fn particles(&self) -> Option<Vec<(f64, f64)>> {
        match self {
            PositionFilter::Particle(pf) => Some(pf.particle_positions()),
            _ => None,
        }
    }
}

impl BayesianFilter for PositionFilter {
    fn predict(&mut self, acceleration: (f64, f64)) {
        match self {
            PositionFilter::Kalman(f) => f.predict(acceleration),
            PositionFilter::Extended(f) => f.predict(acceleration),
            PositionFilter::Particle(f) => f.predict(acceleration),
        }
    }

    fn update(&mut self, anchors: &[Anchor], frame: &MeasurementFrame) -> Result<(), FilterError> {
        match self {
            PositionFilter::Kalman(f) => BayesianFilter::update(f, anchors, frame),
            PositionFilter::Extended(f) => BayesianFilter::update(f, anchors, frame),
            PositionFilter::Particle(f) => BayesianFilter::update(f, anchors, frame),
        }
    }

    fn estimate(&self, anchor_count: usize) -> PositionEstimate {
        match self {
            PositionFilter::Kalman(f) => f.estimate(anchor_count),
            PositionFilter::Extended(f) => f.estimate(anchor_count),
            PositionFilter::Particle(f) => f.estimate(anchor_count),
        }
    }
}
