//! VM桥接层：会话对外发布的事件、订阅机制，以及给UI层的行快照
//!
//! UI层只通过订阅回调获知变化，再回头读取会话状态；回调里拿不到会话的可变借用，
//! 因此事件不会在会话内部引起递归更新。

use std::fmt;

use serde::Serialize;

use crate::model::document::ParseError;
use crate::model::shadow_tree::{JsonTreeNode, NodeId, NodeKind};

// === 常量定义（消除魔法值） ===
pub const STATUS_READY: &str = "就绪";
pub const STATUS_LOADED: &str = "文件加载完成";
pub const STATUS_SAVED: &str = "保存成功";
pub const STATUS_VALID: &str = "JSON 有效";
pub const STATUS_INVALID_PREFIX: &str = "JSON 无效: ";

/// 会话对外事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// 新的文本与新的树可用（整树重建或叶子编辑提交之后）
    DocumentChanged,
    /// 某个节点的值被写回
    NodeUpdated(NodeId),
    SelectionChanged(Option<NodeId>),
    /// 新的 `当前/总数` 文本
    SearchStatusChanged(String),
    /// 是否有未保存修改
    DirtyStateChanged(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&SessionEvent)>;

/// 单线程发布/订阅
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&SessionEvent) + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn publish(&mut self, event: SessionEvent) {
        tracing::debug!("发布事件: {:?}", event);
        for (_, callback) in &mut self.subscribers {
            callback(&event);
        }
    }
}

/// 树控件的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRow {
    #[serde(skip)]
    pub id: NodeId,
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
    pub display_value: String,
    pub depth: u32,
    pub expanded: bool,
    pub selected: bool,
    pub has_children: bool,
    pub line: Option<usize>,
}

impl NodeRow {
    pub fn new(id: NodeId, node: &JsonTreeNode, display_value: String) -> Self {
        Self {
            id,
            name: node.name.clone(),
            path: node.path.clone(),
            kind: node.kind,
            display_value,
            depth: node.depth,
            expanded: node.expanded,
            selected: node.selected,
            has_children: !node.children().is_empty(),
            line: node.line,
        }
    }

    /// 缩进后的一行文本，供无界面模式输出
    pub fn outline(&self) -> String {
        let marker = match (self.has_children, self.expanded) {
            (false, _) => ' ',
            (true, true) => '-',
            (true, false) => '+',
        };
        let line = self.line.map(|l| format!("{:>5} ", l)).unwrap_or_else(|| "      ".to_string());
        format!(
            "{}{}{} {}: {}",
            line,
            "  ".repeat(self.depth as usize),
            marker,
            self.name,
            self.display_value
        )
    }
}

/// 校验结果提示文本
pub fn validation_message(result: &Result<(), ParseError>) -> String {
    match result {
        Ok(()) => STATUS_VALID.to_string(),
        Err(e) => format!("{}{}", STATUS_INVALID_PREFIX, e),
    }
}
