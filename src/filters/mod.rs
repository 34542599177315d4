/// 滤波器核心模块
///
/// 该模块提供室内定位的贝叶斯滤波器组，支持：
/// - 多点定位初始化（1 / 2 / 3+ 锚点分支）
/// - 线性卡尔曼、扩展卡尔曼和粒子滤波三种变体
/// - 带正定修复的矩阵分解等数值原语
/// - 统一的 predict/update 契约和不可变估计快照

pub mod anchor;
pub mod bayes;
pub mod config;
pub mod error;
pub mod kalman;
pub mod linalg;
pub mod measurement;
pub mod multilateration;
pub mod particle;
pub mod results;

pub use anchor::*;
pub use bayes::*;
pub use config::*;
pub use error::*;
pub use kalman::*;
pub use particle::*;
pub use results::*;
