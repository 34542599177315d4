/// 多点定位初始化器
///
/// 用一帧锚点距离测量产生初始位置估计，供各滤波器播种。
/// 按可用锚点数量选择算法：
/// - 1 个锚点：测距圆上取随机一点（没有更多信息）
/// - 2 个锚点：圆-圆解析求交
/// - 3 个及以上：线性化最小二乘

use crate::filters::anchor::Anchor;
use crate::filters::error::FilterError;
use crate::filters::linalg;
use nalgebra::{DMatrix, DVector, Vector2};
use rand::Rng;
use std::f64::consts::TAU;

/// 两锚点中心距低于该值视为重合
const COINCIDENT_EPSILON: f64 = 1e-9;

/// 从锚点和对应的初始距离产生种子位置
///
/// `anchors` 与 `distances` 顺序一一对应，长度必须一致。
/// 锚点为空返回 [`FilterError::InsufficientAnchors`]；
/// 三点及以上共线返回 [`FilterError::UnderdeterminedGeometry`]。
pub fn seed_position<R: Rng>(
    anchors: &[Anchor],
    distances: &[f64],
    rng: &mut R,
) -> Result<Vector2<f64>, FilterError> {
    if anchors.is_empty() || distances.len() < anchors.len() {
        return Err(FilterError::InsufficientAnchors {
            available: anchors.len().min(distances.len()),
        });
    }

    match anchors.len() {
        1 => Ok(seed_from_single(&anchors[0], distances[0], rng)),
        2 => Ok(seed_from_pair(
            &anchors[0],
            &anchors[1],
            distances[0],
            distances[1],
        )),
        _ => seed_from_least_squares(anchors, distances),
    }
}

/// 单锚点：在测距圆上均匀取一个随机点
fn seed_from_single<R: Rng>(anchor: &Anchor, radius: f64, rng: &mut R) -> Vector2<f64> {
    let theta: f64 = rng.gen_range(0.0..TAU);
    Vector2::new(
        anchor.x + radius * theta.cos(),
        anchor.y + radius * theta.sin(),
    )
}

/// 双锚点：解析求两个测距圆的交点
///
/// 退化情形按优先级处理：
/// 1. 两圆相离（r0+r1 < d）：取连线上距锚点 0 为 r0 的点
/// 2. 一圆包含另一圆（|r0−r1| > d，含圆心重合）：取锚点 0 沿固定 +x
///    参考方向距离 r0 的点（尽力而为的默认值，无更优的原则性解）
/// 3. 正常相交：确定性地取垂直偏移为 +h 的那个交点
fn seed_from_pair(a0: &Anchor, a1: &Anchor, r0: f64, r1: f64) -> Vector2<f64> {
    let dx = a1.x - a0.x;
    let dy = a1.y - a0.y;
    let d = (dx * dx + dy * dy).sqrt();

    if d < COINCIDENT_EPSILON {
        // 圆心重合，等价于包含情形
        return Vector2::new(a0.x + r0, a0.y);
    }

    let ux = dx / d;
    let uy = dy / d;

    if r0 + r1 < d {
        // 两圆够不着对方，落在连线上
        return Vector2::new(a0.x + ux * r0, a0.y + uy * r0);
    }
    if (r0 - r1).abs() > d {
        // 一圆完全包住另一圆
        return Vector2::new(a0.x + r0, a0.y);
    }

    let a = (r0 * r0 - r1 * r1 + d * d) / (2.0 * d);
    // 相切时舍入可能让参数略为负
    let h = (r0 * r0 - a * a).max(0.0).sqrt();

    let base_x = a0.x + ux * a;
    let base_y = a0.y + uy * a;
    Vector2::new(base_x - uy * h, base_y + ux * h)
}

/// 三锚点及以上：线性化最小二乘
///
/// 每个锚点的测距方程减去最后一个锚点的方程，消去位置的二次项，
/// 得到 (n−1)×2 的线性系统 A·pos = b，解 pos = (AᵗA)⁻¹·Aᵗ·b。
fn seed_from_least_squares(
    anchors: &[Anchor],
    distances: &[f64],
) -> Result<Vector2<f64>, FilterError> {
    let n = anchors.len();
    let last = &anchors[n - 1];
    let r_last = distances[n - 1];

    let mut a = DMatrix::zeros(n - 1, 2);
    let mut b = DVector::zeros(n - 1);
    for i in 0..(n - 1) {
        let anchor = &anchors[i];
        let r = distances[i];
        a[(i, 0)] = 2.0 * (last.x - anchor.x);
        a[(i, 1)] = 2.0 * (last.y - anchor.y);
        b[i] = r * r - r_last * r_last - anchor.x * anchor.x + last.x * last.x
            - anchor.y * anchor.y
            + last.y * last.y;
    }

    let at = a.transpose();
    let normal = &at * &a;
    let normal_inv = linalg::invert(&normal).map_err(|_| FilterError::UnderdeterminedGeometry)?;
    let pos = normal_inv * at * b;

    Ok(Vector2::new(pos[0], pos[1]))
}
