/// 测距测量模型
///
/// 对活跃锚点集求期望测量 h(state) 及其雅可比 H。
/// EKF 与粒子滤波只用测距行；线性卡尔曼变体在测量向量末尾
/// 追加两个加速度读数，对应状态中的加速度偏置分量。

use crate::filters::anchor::Anchor;
use nalgebra::{DMatrix, DVector};

/// 与锚点的距离低于该值时视为重合，雅可比行置零避免除零
const SINGULARITY_EPSILON: f64 = 1e-9;

/// 期望测距向量：状态位置到各活跃锚点的欧几里得距离
///
/// 状态向量的前两个分量约定为 (x, y)。
pub fn predicted_ranges(state: &DVector<f64>, anchors: &[Anchor]) -> DVector<f64> {
    let mut ranges = DVector::zeros(anchors.len());
    for (i, anchor) in anchors.iter().enumerate() {
        ranges[i] = anchor.distance_to(state[0], state[1]);
    }
    ranges
}

/// 测距雅可比：每个活跃锚点一行，列数 = 状态维数
///
/// 位置列为 (state.pos − anchor.pos) / distance，其余列（速度、
/// 加速度偏置）为零。状态位置与锚点完全重合时该行整体置零。
pub fn range_jacobian(state: &DVector<f64>, anchors: &[Anchor], state_dim: usize) -> DMatrix<f64> {
    let mut jacobian = DMatrix::zeros(anchors.len(), state_dim);
    for (i, anchor) in anchors.iter().enumerate() {
        let dx = state[0] - anchor.x;
        let dy = state[1] - anchor.y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance > SINGULARITY_EPSILON {
            jacobian[(i, 0)] = dx / distance;
            jacobian[(i, 1)] = dy / distance;
        }
    }
    jacobian
}

/// 线性卡尔曼变体的期望测量：测距 + 两个加速度偏置分量
///
/// 状态布局约定为 [x, y, vx, vy, ax_bias, ay_bias]。
pub fn predicted_measurement_with_bias(
    state: &DVector<f64>,
    anchors: &[Anchor],
) -> DVector<f64> {
    let n = anchors.len();
    let mut h = DVector::zeros(n + 2);
    for (i, anchor) in anchors.iter().enumerate() {
        h[i] = anchor.distance_to(state[0], state[1]);
    }
    h[n] = state[4];
    h[n + 1] = state[5];
    h
}

/// 线性卡尔曼变体的雅可比：测距行 + 加速度行的单位块
pub fn jacobian_with_bias(state: &DVector<f64>, anchors: &[Anchor]) -> DMatrix<f64> {
    let n = anchors.len();
    let mut jacobian = DMatrix::zeros(n + 2, 6);
    jacobian
        .view_mut((0, 0), (n, 6))
        .copy_from(&range_jacobian(state, anchors, 6));
    jacobian[(n, 4)] = 1.0;
    jacobian[(n + 1, 5)] = 1.0;
    jacobian
}
