/// 🎯 定位会话
///
/// 功能：
/// - 持有锚点集、滤波器配置与当前滤波器实例（显式状态，无全局单例）
/// - 每个测量帧严格先 predict 后 update，单逻辑写者，无周期重叠
/// - 每次成功更新后发布不可变估计快照，渲染等并发读者经
///   watch 通道订阅，绝不直接读滤波器内部可变状态
/// - 配置变更以原子替换方式生效：作废当前滤波器，下一帧重建
///
/// 滤波器实例本身不做并发防护；背压由上游测量源保证，
/// 本层不提供取消或超时语义。

use crate::filters::anchor::AnchorSet;
use crate::filters::bayes::{BayesianFilter, MeasurementFrame, PositionFilter};
use crate::filters::config::{FilterConfiguration, FilterKind};
use crate::filters::error::FilterError;
use crate::filters::multilateration;
use crate::filters::results::{EstimateHistory, PositionEstimate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;

/// 定位会话：由调用方构造和销毁，生命周期内驱动一个滤波器实例
pub struct PositioningSession {
    anchors: AnchorSet,
    config: FilterConfiguration,
    filter: Option<PositionFilter>,
    history: EstimateHistory,
    rng: StdRng,
    snapshot_tx: watch::Sender<Option<PositionEstimate>>,
}

impl PositioningSession {
    /// 创建新会话
    pub fn new(anchors: AnchorSet, config: FilterConfiguration) -> Self {
        let (snapshot_tx, _) = watch::channel(None);
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        PositioningSession {
            anchors,
            config,
            filter: None,
            history: EstimateHistory::new(),
            rng,
            snapshot_tx,
        }
    }

    /// 订阅估计快照；可在其他任务上并发读取
    pub fn subscribe(&self) -> watch::Receiver<Option<PositionEstimate>> {
        self.snapshot_tx.subscribe()
    }

    /// 应用新配置：当前滤波器立即作废，下一帧用新配置重建
    pub fn set_configuration(&mut self, config: FilterConfiguration) {
        log::info!(
            "滤波器配置变更: {:?} -> {:?}",
            self.config.filter_kind,
            config.filter_kind
        );
        self.rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.config = config;
        self.filter = None;
    }

    /// 当前配置
    pub fn configuration(&self) -> &FilterConfiguration {
        &self.config
    }

    /// 翻转某个锚点的活跃状态；滤波器无需重建，
    /// 测量模型维度在下一次更新时自动随活跃子序列调整
    pub fn set_anchor_active(&mut self, id: u32, active: bool) -> bool {
        self.anchors.set_active(id, active)
    }

    /// 锚点集（只读）
    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    /// 历史估计序列
    pub fn history(&self) -> &EstimateHistory {
        &self.history
    }

    /// 处理一个测量帧，返回本周期的估计快照
    ///
    /// 首帧用于构造滤波器（多点定位播种），直接输出种子估计；
    /// 之后每帧先 predict 后 update。更新因矩阵奇异失败时
    /// 返回错误并保留上一周期状态，调用方跳过本周期即可。
    pub fn process_frame(
        &mut self,
        frame: &MeasurementFrame,
    ) -> Result<PositionEstimate, FilterError> {
        let active = self.anchors.active();
        if active.is_empty() {
            return Err(FilterError::InsufficientAnchors { available: 0 });
        }
        if frame.distances.len() < active.len() {
            // 距离序列必须覆盖全部活跃锚点
            return Err(FilterError::InsufficientAnchors {
                available: frame.distances.len(),
            });
        }

        if self.config.filter_kind == FilterKind::None {
            // 不滤波：逐帧输出原始多点定位解
            let pos = multilateration::seed_position(&active, &frame.distances, &mut self.rng)?;
            let estimate = PositionEstimate::new(
                pos.x,
                pos.y,
                self.config.distance_uncertainty,
                self.config.distance_uncertainty,
                "multilateration".to_string(),
                active.len(),
            );
            self.publish(estimate.clone());
            return Ok(estimate);
        }

        let estimate = match self.filter.as_mut() {
            None => {
                // 首帧：构造滤波器并输出种子估计
                // （FilterKind::None 已在上面提前返回，这里必然产出实例）
                match PositionFilter::from_configuration(&self.config, &active, frame)? {
                    Some(filter) => {
                        let estimate = filter.estimate(active.len());
                        self.filter = Some(filter);
                        estimate
                    }
                    None => {
                        return Err(FilterError::InsufficientAnchors {
                            available: active.len(),
                        });
                    }
                }
            }
            Some(filter) => {
                filter.predict(frame.acceleration);
                if let Err(err) = filter.update(&active, frame) {
                    log::warn!("更新周期失败, 跳过本帧并保留旧状态: {}", err);
                    return Err(err);
                }
                filter.estimate(active.len())
            }
        };

        self.publish(estimate.clone());
        Ok(estimate)
    }

    /// 记录历史并发布不可变快照；没有订阅者时发送失败是正常情况
    fn publish(&mut self, estimate: PositionEstimate) {
        self.history.push(estimate.clone());
        let _ = self.snapshot_tx.send(Some(estimate));
    }
}
