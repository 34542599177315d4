/// 滤波器错误类型定义
///
/// 错误分类原则：
/// - 构造阶段错误（锚点不足、几何退化）向上传播，滤波器保持未初始化
/// - 更新周期错误（矩阵奇异）向上传播，调用方应跳过本周期并保留旧状态
/// - 数值退化（协方差失去正定性、粒子权重全零）在内部修复，不对外暴露

use thiserror::Error;

/// 滤波器核心错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// 活跃锚点数量不足，无法构造滤波器或初始化位置
    #[error("活跃锚点不足: 当前 {available} 个, 至少需要 1 个")]
    InsufficientAnchors {
        /// 当前可用的活跃锚点数量
        available: usize,
    },

    /// 矩阵（近似）奇异，LU 分解或新息协方差求逆失败
    #[error("矩阵奇异, 无法求逆")]
    SingularMatrix,

    /// 锚点几何退化（共线等），多点定位最小二乘无解
    #[error("锚点几何退化, 定位方程欠定")]
    UnderdeterminedGeometry,
}
