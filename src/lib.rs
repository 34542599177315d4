/// 室内测距定位滤波库
///
/// 从一组固定锚点的噪声测距和加速度计读数估计移动标签的
/// 2D 位置（部分滤波变体同时估计速度）。
///
/// 模块组织：
/// - `filters`: 贝叶斯滤波器组（线性卡尔曼 / EKF / 粒子滤波）
///   及其共用的线性代数原语、多点定位初始化和测量模型
/// - `positioning`: 定位会话层，驱动滤波周期并发布估计快照

pub mod filters;
pub mod positioning;
