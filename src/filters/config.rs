/// 滤波器配置
///
/// 由外部设置界面提供。配置一旦变更，当前滤波器实例立即作废，
/// 下一个测量周期前用新配置重建（原子替换，不做原地修改）。

use serde::{Deserialize, Serialize};

/// 滤波器种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// 不滤波，每周期直接输出多点定位解
    None,
    /// 线性卡尔曼滤波（恒加速度模型，测量向量含加速度读数）
    Kalman,
    /// 扩展卡尔曼滤波（恒速度模型，非线性测距模型）
    ExtendedKalman,
    /// 粒子滤波
    Particle,
}

/// 粒子滤波变体
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleKind {
    /// 自举式（转移先验作为重要性密度）
    Bootstrap,
    /// 正则化（重采样后做核带宽抖动，抑制样本贫化）
    Regularized,
}

/// 滤波器配置参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfiguration {
    /// 滤波器种类
    pub filter_kind: FilterKind,
    /// 粒子滤波变体（仅 `FilterKind::Particle` 时生效）
    pub particle_kind: ParticleKind,
    /// 加速度计测量不确定度（方差，进入测量噪声矩阵 R 的对角）
    pub acceleration_uncertainty: f64,
    /// 测距不确定度（方差，测距行的 R 对角项，同时用于初始协方差）
    pub distance_uncertainty: f64,
    /// 过程噪声不确定度（方差，Q = G·Gᵗ·process_uncertainty）
    pub process_uncertainty: f64,
    /// 粒子数量
    pub particle_count: usize,
    /// 有效样本数阈值，低于该值触发重采样；取值范围 (0, particle_count]
    pub resample_threshold: f64,
    /// 测量周期 dt（秒），状态转移矩阵按该固定间隔构造
    pub update_interval_s: f64,
    /// 随机数种子；None 表示从系统熵源取种（测试时注入固定种子以复现轨迹）
    pub rng_seed: Option<u64>,
}

impl FilterConfiguration {
    /// 校验配置参数的取值范围
    pub fn is_valid(&self) -> bool {
        self.acceleration_uncertainty > 0.0
            && self.distance_uncertainty > 0.0
            && self.process_uncertainty > 0.0
            && self.particle_count > 0
            && self.resample_threshold > 0.0
            && self.resample_threshold <= self.particle_count as f64
            && self.update_interval_s > 0.0
    }
}

impl Default for FilterConfiguration {
    fn default() -> Self {
        FilterConfiguration {
            filter_kind: FilterKind::ExtendedKalman,
            particle_kind: ParticleKind::Bootstrap,
            acceleration_uncertainty: 10.0,
            distance_uncertainty: 30.0,
            process_uncertainty: 25.0,
            particle_count: 500,
            resample_threshold: 250.0,
            update_interval_s: 0.5,
            rng_seed: None,
        }
    }
}
