/// 定位输出数据结构
///
/// 每个测量周期结束后由滤波器发布的不可变快照，
/// 供渲染层等并发读者消费，读者不得触碰滤波器内部状态。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 单周期定位估计快照
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PositionEstimate {
    /// X 坐标
    pub x: f64,
    /// Y 坐标
    pub y: f64,
    /// X 方向方差（协方差矩阵对角元）
    pub var_x: f64,
    /// Y 方向方差
    pub var_y: f64,
    /// 产生该估计的滤波器标签
    pub filter: String,
    /// 本周期参与测量的活跃锚点数量
    pub anchor_count: usize,
    /// 粒子位置列表（仅粒子滤波输出，用于可视化）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub particles: Option<Vec<(f64, f64)>>,
    /// 时间戳
    pub timestamp: DateTime<Utc>,
}

impl PositionEstimate {
    /// 创建新的估计快照
    pub fn new(x: f64, y: f64, var_x: f64, var_y: f64, filter: String, anchor_count: usize) -> Self {
        PositionEstimate {
            x,
            y,
            var_x,
            var_y,
            filter,
            anchor_count,
            particles: None,
            timestamp: Utc::now(),
        }
    }

    /// 附带粒子云的快照
    pub fn with_particles(mut self, particles: Vec<(f64, f64)>) -> Self {
        self.particles = Some(particles);
        self
    }

    /// 获取 2D 坐标
    pub fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// 位置标准差的合成值（不确定度概要）
    pub fn uncertainty_radius(&self) -> f64 {
        (self.var_x.max(0.0) + self.var_y.max(0.0)).sqrt()
    }

    /// 与另一估计的 2D 距离
    pub fn distance_to(&self, other: &PositionEstimate) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for PositionEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.2}, {:.2}) ±{:.2} [{}]",
            self.x,
            self.y,
            self.uncertainty_radius(),
            self.filter
        )
    }
}

/// 估计序列（用于时间序列处理和展示平滑）
#[derive(Clone, Debug, Default)]
pub struct EstimateHistory {
    estimates: Vec<PositionEstimate>,
}

impl EstimateHistory {
    /// 创建空序列
    pub fn new() -> Self {
        EstimateHistory {
            estimates: Vec::new(),
        }
    }

    /// 添加估计
    pub fn push(&mut self, estimate: PositionEstimate) {
        self.estimates.push(estimate);
    }

    /// 获取最后一个估计
    pub fn last(&self) -> Option<&PositionEstimate> {
        self.estimates.last()
    }

    /// 获取所有估计
    pub fn all(&self) -> &[PositionEstimate] {
        &self.estimates
    }

    /// 估计数量
    pub fn len(&self) -> usize {
        self.estimates.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }

    /// 最近 N 个估计的平均位置
    pub fn average_last_n(&self, n: usize) -> Option<(f64, f64)> {
        if self.estimates.is_empty() || n == 0 {
            return None;
        }
        let start = self.estimates.len().saturating_sub(n);
        let slice = &self.estimates[start..];
        let count = slice.len() as f64;
        let x = slice.iter().map(|e| e.x).sum::<f64>() / count;
        let y = slice.iter().map(|e| e.y).sum::<f64>() / count;
        Some((x, y))
    }

    /// 清空序列
    pub fn clear(&mut self) {
        self.estimates.clear();
    }
}
