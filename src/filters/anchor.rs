/// 测距锚点定义和相关数据结构

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 单个固定锚点
///
/// 位置由外部标定子系统给出，滤波周期内只读；
/// 只有 `is_active` 会随锚点进出量程而翻转。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Anchor {
    /// 锚点唯一标识符
    pub id: u32,
    /// X 坐标（单位可配置，默认厘米）
    pub x: f64,
    /// Y 坐标（单位可配置，默认厘米）
    pub y: f64,
    /// 当前是否在量程内（参与测量）
    pub is_active: bool,
}

impl Anchor {
    /// 创建新的锚点（默认活跃）
    pub fn new(id: u32, x: f64, y: f64) -> Self {
        Anchor {
            id,
            x,
            y,
            is_active: true,
        }
    }

    /// 获取锚点的 2D 坐标
    pub fn coordinates(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// 计算与某个位置的欧几里得距离
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// 锚点集合管理器
///
/// 保持插入顺序；活跃锚点子序列的顺序决定测量向量各分量的顺序，
/// 必须与外部测距模块给出的距离序列一致。
pub struct AnchorSet {
    /// 按插入顺序保存的锚点
    anchors: Vec<Anchor>,
    /// 锚点 ID -> 下标 的映射
    index: HashMap<u32, usize>,
}

impl AnchorSet {
    /// 创建空的锚点集合
    pub fn new() -> Self {
        AnchorSet {
            anchors: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// 从锚点向量创建集合（重复 ID 以后出现者覆盖）
    pub fn from_vec(anchors: Vec<Anchor>) -> Self {
        let mut set = AnchorSet::new();
        for anchor in anchors {
            set.add_anchor(anchor);
        }
        set
    }

    /// 添加锚点；同 ID 锚点被替换（位置重标定）
    pub fn add_anchor(&mut self, anchor: Anchor) {
        if let Some(&i) = self.index.get(&anchor.id) {
            self.anchors[i] = anchor;
        } else {
            self.index.insert(anchor.id, self.anchors.len());
            self.anchors.push(anchor);
        }
    }

    /// 获取锚点
    pub fn get(&self, id: u32) -> Option<&Anchor> {
        self.index.get(&id).map(|&i| &self.anchors[i])
    }

    /// 翻转锚点的活跃状态；返回是否找到该锚点
    pub fn set_active(&mut self, id: u32, active: bool) -> bool {
        match self.index.get(&id) {
            Some(&i) => {
                self.anchors[i].is_active = active;
                true
            }
            None => false,
        }
    }

    /// 获取所有锚点（按插入顺序）
    pub fn all(&self) -> &[Anchor] {
        &self.anchors
    }

    /// 获取活跃锚点子序列（保持顺序）
    pub fn active(&self) -> Vec<Anchor> {
        self.anchors
            .iter()
            .filter(|a| a.is_active)
            .cloned()
            .collect()
    }

    /// 活跃锚点数量
    pub fn active_count(&self) -> usize {
        self.anchors.iter().filter(|a| a.is_active).count()
    }

    /// 锚点总数
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// 清空所有锚点
    pub fn clear(&mut self) {
        self.anchors.clear();
        self.index.clear();
    }
}

impl Default for AnchorSet {
    fn default() -> Self {
        Self::new()
    }
}
