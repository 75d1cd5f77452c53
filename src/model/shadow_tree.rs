//! 影子树（Shadow Tree）：文档模型的节点投影，只存结构、路径与界面状态，不复制值
//!
//! 节点按先序存放在一个 arena 中，`NodeId` 带有构建代数，文档重建后旧句柄全部失效。
//! 节点通过子索引路径引用文档中的值，展示文本随用随算，因此叶子编辑后无需重建。

use serde::Serialize;

use crate::model::data_core::AppError;
use crate::model::document::{JsonData, JsonValue, Scalar};

/// 对象预览时优先展示的标识键（按优先级，比较时忽略大小写）
pub const IDENTIFIER_KEYS: [&str; 5] = ["name", "id", "alias", "title", "key"];

/// 对象预览最多列出的属性名个数
pub const PREVIEW_PROPERTY_LIMIT: usize = 3;

/// 标量根节点的显示名
pub const ROOT_NODE_NAME: &str = "root";

/// JSON 节点类型（与 UI 展示解耦）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Object,
    Array,
    String,
    Number,
    Bool,
    Null,
}

impl NodeKind {
    pub fn of(value: &JsonValue) -> Self {
        match &value.data {
            JsonData::Object(_) => NodeKind::Object,
            JsonData::Array(_) => NodeKind::Array,
            JsonData::Scalar(Scalar::String(_)) => NodeKind::String,
            JsonData::Scalar(Scalar::Number(_)) => NodeKind::Number,
            JsonData::Scalar(Scalar::Bool(_)) => NodeKind::Bool,
            JsonData::Scalar(Scalar::Null) => NodeKind::Null,
        }
    }
}

/// 节点句柄：arena 下标 + 构建代数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    generation: u32,
    index: usize,
}

#[derive(Debug, Clone)]
pub struct JsonTreeNode {
    /// 节点在父级中的键名或 `[索引]`
    pub name: String,
    /// RFC 9535 JSONPath（用于路径展示与日志）
    pub path: String,
    /// 节点类型（构建时的类型，叶子编辑不改变类型）
    pub kind: NodeKind,
    /// 节点深度（用于UI缩进显示）
    pub depth: u32,
    /// 是否展开（用于折叠/展开功能）
    pub expanded: bool,
    /// 是否选中
    pub selected: bool,
    /// 值在源文本中的起始行
    pub line: Option<usize>,
    /// 在文档模型中的子索引路径
    location: Vec<usize>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl JsonTreeNode {
    pub fn location(&self) -> &[usize] {
        &self.location
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// 一次完整投影的结果；只能整体替换，不做增量修补
#[derive(Debug, Clone, Default)]
pub struct ShadowTree {
    generation: u32,
    nodes: Vec<JsonTreeNode>,
    roots: Vec<NodeId>,
}

/// 从根值构建全树投影
pub fn build_shadow_tree(root: &JsonValue, generation: u32) -> ShadowTree {
    let mut tree = ShadowTree {
        generation,
        nodes: Vec::with_capacity(1024),
        roots: Vec::new(),
    };
    let roots = match &root.data {
        JsonData::Object(_) | JsonData::Array(_) => tree.walk_children(root, "$", &[], None, 0),
        JsonData::Scalar(_) => {
            vec![tree.walk(root, ROOT_NODE_NAME.to_string(), "$".to_string(), Vec::new(), None, 0)]
        }
    };
    tree.roots = roots;
    tree
}

impl ShadowTree {
    fn walk(
        &mut self,
        value: &JsonValue,
        name: String,
        path: String,
        location: Vec<usize>,
        parent: Option<NodeId>,
        depth: u32,
    ) -> NodeId {
        let id = NodeId {
            generation: self.generation,
            index: self.nodes.len(),
        };
        self.nodes.push(JsonTreeNode {
            name,
            kind: NodeKind::of(value),
            depth,
            expanded: false, // 默认折叠
            selected: false,
            line: value.line,
            children: Vec::new(),
            path: path.clone(),
            location: location.clone(),
            parent,
        });
        // 子节点整体生成后一次性挂上
        let children = self.walk_children(value, &path, &location, Some(id), depth + 1);
        self.nodes[id.index].children = children;
        id
    }

    fn walk_children(
        &mut self,
        value: &JsonValue,
        path: &str,
        location: &[usize],
        parent: Option<NodeId>,
        depth: u32,
    ) -> Vec<NodeId> {
        let child_location = |idx: usize| {
            let mut loc = location.to_vec();
            loc.push(idx);
            loc
        };
        match &value.data {
            JsonData::Object(members) => members
                .iter()
                .enumerate()
                .map(|(idx, (k, child))| {
                    self.walk(child, k.clone(), field_path(path, k), child_location(idx), parent, depth)
                })
                .collect(),
            JsonData::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, child)| {
                    let item_path = format!("{}[{}]", path, idx);
                    self.walk(child, format!("[{}]", idx), item_path, child_location(idx), parent, depth)
                })
                .collect(),
            JsonData::Scalar(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// 句柄属于当前这次投影时返回节点
    pub fn get(&self, id: NodeId) -> Option<&JsonTreeNode> {
        if id.generation != self.generation {
            return None;
        }
        self.nodes.get(id.index)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut JsonTreeNode> {
        if id.generation != self.generation {
            return None;
        }
        self.nodes.get_mut(id.index)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// 先序遍历（根节点按集合顺序，逐个深入子节点）；arena 本身即先序
    pub fn flatten(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(move |index| NodeId {
            generation: self.generation,
            index,
        })
    }

    /// 子树中除自身外的全部节点（先序）
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.get(id) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.get(next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// 从父节点一直到根节点
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.get(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            out.push(parent);
            current = self.get(parent).and_then(|n| n.parent);
        }
        out
    }

    /// 节点对应的文档值
    pub fn value<'d>(&self, id: NodeId, doc: &'d JsonValue) -> Option<&'d JsonValue> {
        doc.get(&self.get(id)?.location)
    }

    fn value_mut<'d>(&self, id: NodeId, doc: &'d mut JsonValue) -> Result<&'d mut JsonValue, AppError> {
        let node = self
            .get(id)
            .ok_or_else(|| AppError::State("节点句柄已失效".into()))?;
        doc.get_mut(&node.location)
            .ok_or_else(|| AppError::State(format!("节点路径不存在: {}", node.path)))
    }

    pub fn display_value(&self, id: NodeId, doc: &JsonValue) -> Option<String> {
        self.value(id, doc).map(display_value_of)
    }

    /// 编辑框中的文本：字符串 / 数字的原样文本，其余为空
    pub fn editable_value(&self, id: NodeId, doc: &JsonValue) -> Option<String> {
        let value = self.value(id, doc)?;
        Some(match value.as_scalar() {
            Some(Scalar::String(s)) => s.clone(),
            Some(Scalar::Number(n)) => n.to_string(),
            Some(Scalar::Bool(b)) => b.to_string(),
            _ => String::new(),
        })
    }

    /// 三态布尔：只有布尔节点才有值
    pub fn boolean_value(&self, id: NodeId, doc: &JsonValue) -> Option<bool> {
        match self.value(id, doc)?.as_scalar() {
            Some(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// 写回字符串 / 数字节点；数字按宽松浮点规则解析，失败即拒绝且不修改
    pub fn set_editable_value(&self, id: NodeId, doc: &mut JsonValue, text: &str) -> Result<(), AppError> {
        let slot = self.value_mut(id, doc)?;
        match &mut slot.data {
            JsonData::Scalar(Scalar::String(s)) => {
                *s = text.to_string();
                Ok(())
            }
            JsonData::Scalar(Scalar::Number(n)) => {
                *n = parse_number(text)
                    .ok_or_else(|| AppError::InvalidEdit(format!("不是有效数字: {}", text)))?;
                Ok(())
            }
            _ => Err(AppError::InvalidEdit("该节点不支持文本编辑".into())),
        }
    }

    pub fn set_boolean_value(&self, id: NodeId, doc: &mut JsonValue, value: Option<bool>) -> Result<(), AppError> {
        let slot = self.value_mut(id, doc)?;
        match (&mut slot.data, value) {
            (JsonData::Scalar(Scalar::Bool(b)), Some(v)) => {
                *b = v;
                Ok(())
            }
            (JsonData::Scalar(Scalar::Bool(_)), None) => Err(AppError::InvalidEdit("布尔值为空".into())),
            _ => Err(AppError::InvalidEdit("该节点不是布尔值".into())),
        }
    }

    /// 对字符串节点做子串替换；有变化时返回 true
    pub fn replace_in_value<F>(&self, id: NodeId, doc: &mut JsonValue, replace: F) -> bool
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let Ok(slot) = self.value_mut(id, doc) else {
            return false;
        };
        let JsonData::Scalar(Scalar::String(s)) = &mut slot.data else {
            return false;
        };
        match replace(s) {
            Some(updated) => {
                *s = updated;
                true
            }
            None => false,
        }
    }

    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.expanded = expanded;
                true
            }
            None => false,
        }
    }

    pub fn set_all_expanded(&mut self, expanded: bool) {
        for node in &mut self.nodes {
            node.expanded = expanded;
        }
    }

    /// 祖先全部展开的节点（先序），即树控件实际显示的行
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        // 父节点总在子节点之前，单趟即可
        let mut shown = vec![false; self.nodes.len()];
        let mut out = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let visible = match node.parent {
                None => true,
                Some(p) => shown[p.index] && self.nodes[p.index].expanded,
            };
            shown[index] = visible;
            if visible {
                out.push(NodeId {
                    generation: self.generation,
                    index,
                });
            }
        }
        out
    }
}

/// JSONPath 字段含特殊字符时使用 bracket-notation
fn field_path(parent: &str, key: &str) -> String {
    if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!("{}.{}", parent, key)
    } else {
        format!("{}['{}']", parent, key.replace('\'', "\\'"))
    }
}

/// 宽松数字解析：整数优先保持整数，其次按有限浮点数
pub fn parse_number(text: &str) -> Option<serde_json::Number> {
    let trimmed = text.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(i.into());
    }
    if let Ok(u) = trimmed.parse::<u64>() {
        return Some(u.into());
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
}

/// 节点展示文本
pub fn display_value_of(value: &JsonValue) -> String {
    match &value.data {
        JsonData::Scalar(Scalar::String(s)) => s.clone(),
        JsonData::Scalar(Scalar::Number(n)) => n.to_string(),
        JsonData::Scalar(Scalar::Bool(b)) => b.to_string(),
        JsonData::Scalar(Scalar::Null) => "null".to_string(),
        JsonData::Array(items) => format!("[{}]", items.len()),
        JsonData::Object(members) => object_preview(members),
    }
}

fn object_preview(members: &[(String, JsonValue)]) -> String {
    for preferred in IDENTIFIER_KEYS {
        let Some((key, value)) = members.iter().find(|(k, _)| k.to_lowercase() == preferred) else {
            continue;
        };
        let formatted = match value.as_scalar() {
            // 空字符串不算标识，继续看下一个候选
            Some(Scalar::String(s)) if s.is_empty() => None,
            Some(Scalar::String(s)) => Some(format!("\"{}\"", s)),
            Some(Scalar::Bool(b)) => Some(b.to_string()),
            Some(Scalar::Null) => Some("null".to_string()),
            Some(Scalar::Number(n)) => Some(n.to_string()),
            None => None,
        };
        if let Some(formatted) = formatted {
            return format!("{{ {}: {} }}", key, formatted);
        }
    }

    if members.is_empty() {
        return "{ }".to_string();
    }
    let names: Vec<&str> = members
        .iter()
        .take(PREVIEW_PROPERTY_LIMIT)
        .map(|(k, _)| k.as_str())
        .collect();
    let more = if members.len() > PREVIEW_PROPERTY_LIMIT { "..." } else { "" };
    format!("{{ {}{} }}", names.join(", "), more)
}
