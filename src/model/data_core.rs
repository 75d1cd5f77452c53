//! DocumentSession：原始文本、文档模型与影子树的同步控制器
//!
//! 两条更新路径：
//! - 整树重建（加载 / 格式化 / 校验）：解析 → 替换根 → 重新投影 → 重建搜索索引，
//!   任何一步失败都不替换任何状态；
//! - 叶子编辑（节点写回）：就地修改文档 → 重新序列化为规范文本 → 标记未保存 → 重建搜索索引。

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use thiserror::Error;

use crate::model::document::{parse, serialize, JsonValue, ParseError};
use crate::model::search::SearchIndex;
use crate::model::shadow_tree::{build_shadow_tree, NodeId, ShadowTree};
use crate::utils::fs::{read_text_file, write_text_file};
use crate::vm::bridge::{EventBus, NodeRow, SessionEvent, SubscriptionId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON解析失败: {0}")]
    Parse(#[from] ParseError),
    #[error("无效编辑: {0}")]
    InvalidEdit(String),
    #[error("状态错误: {0}")]
    State(String),
}

/// 会话状态机：Clean ⇄ Dirty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Clean,
    Dirty,
}

#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// 窗口标题中的应用名
    pub app_name: String,
    /// 有未保存修改时追加在标题末尾的标记
    pub unsaved_marker: String,
    /// 新会话的初始文档
    pub initial_text: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            app_name: "JsonSyncEditor".to_string(),
            unsaved_marker: "*".to_string(),
            initial_text: "{}".to_string(),
        }
    }
}

/// 单线程递归栅栏：持有期间，写回通知不再触发提交
#[derive(Debug, Default)]
struct SyncFence {
    active: Rc<Cell<bool>>,
}

struct FenceGuard {
    active: Rc<Cell<bool>>,
}

impl SyncFence {
    /// 已被持有时返回 None
    fn enter(&self) -> Option<FenceGuard> {
        if self.active.replace(true) {
            return None;
        }
        Some(FenceGuard {
            active: self.active.clone(),
        })
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }
}

impl Drop for FenceGuard {
    fn drop(&mut self) {
        self.active.set(false);
    }
}

#[derive(Debug)]
pub struct DocumentSession {
    config: EditorConfig,
    raw_text: String,
    root: JsonValue,
    tree: ShadowTree,
    generation: u32,
    search: SearchIndex,
    replacement: String,
    last_status: String,
    selected: Option<NodeId>,
    state: SessionState,
    source_path: Option<PathBuf>,
    fence: SyncFence,
    events: EventBus,
}

impl Default for DocumentSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl DocumentSession {
    /// 以默认空文档启动，状态为 Clean
    pub fn new(config: EditorConfig) -> Self {
        let root = parse(&config.initial_text).unwrap_or_else(|e| {
            tracing::warn!("初始文档无效，改用空对象: {}", e);
            JsonValue::default()
        });
        let mut session = Self {
            raw_text: serialize(&root),
            tree: build_shadow_tree(&root, 1),
            generation: 1,
            root,
            config,
            search: SearchIndex::default(),
            replacement: String::new(),
            last_status: String::new(),
            selected: None,
            state: SessionState::Clean,
            source_path: None,
            fence: SyncFence::default(),
            events: EventBus::default(),
        };
        session.last_status = session.search.status();
        session
    }

    // === 查询 ===

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn root(&self) -> &JsonValue {
        &self.root
    }

    pub fn tree(&self) -> &ShadowTree {
        &self.tree
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.state == SessionState::Dirty
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn search(&self) -> &SearchIndex {
        &self.search
    }

    pub fn search_status(&self) -> String {
        self.search.status()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    pub fn display_value(&self, id: NodeId) -> Option<String> {
        self.tree.display_value(id, &self.root)
    }

    pub fn editable_value(&self, id: NodeId) -> Option<String> {
        self.tree.editable_value(id, &self.root)
    }

    pub fn boolean_value(&self, id: NodeId) -> Option<bool> {
        self.tree.boolean_value(id, &self.root)
    }

    /// 按 JSONPath 查找当前投影中的节点
    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        self.tree
            .flatten()
            .find(|id| self.tree.get(*id).is_some_and(|n| n.path == path))
    }

    /// `路径 - 应用名`，有未保存修改时追加标记
    pub fn window_title(&self) -> String {
        let mut title = match &self.source_path {
            Some(p) => format!("{} - {}", p.display(), self.config.app_name),
            None => self.config.app_name.clone(),
        };
        if self.has_unsaved_changes() {
            title.push_str(&self.config.unsaved_marker);
        }
        title
    }

    /// 树控件当前应显示的行
    pub fn visible_rows(&self) -> Vec<NodeRow> {
        self.tree
            .visible_nodes()
            .into_iter()
            .filter_map(|id| {
                let node = self.tree.get(id)?;
                let display = self.tree.display_value(id, &self.root).unwrap_or_default();
                Some(NodeRow::new(id, node, display))
            })
            .collect()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&SessionEvent) + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // === 整树重建路径 ===

    /// 加载文本；成功后状态为 Clean，失败时保持原状
    pub fn load_text(&mut self, text: &str) -> Result<(), ParseError> {
        let path = self.source_path.clone();
        self.replace_document(text, path)?;
        self.mark_unsaved(false);
        Ok(())
    }

    /// 读取文件后走文本加载路径；IO 或解析失败都不改变会话
    pub fn load_from_path(&mut self, path: &Path) -> Result<(), AppError> {
        let text = read_text_file(path)?;
        self.replace_document(&text, Some(path.to_path_buf()))?;
        self.mark_unsaved(false);
        tracing::info!("文件已加载: {}", path.display());
        Ok(())
    }

    /// 有未保存修改时先征求确认；拒绝时返回 Ok(false) 且不做任何事
    pub fn open_with_confirmation<F>(&mut self, path: &Path, confirm: F) -> Result<bool, AppError>
    where
        F: FnOnce() -> bool,
    {
        if !self.confirm_discard(confirm) {
            tracing::info!("用户取消打开: {}", path.display());
            return Ok(false);
        }
        self.load_from_path(path)?;
        Ok(true)
    }

    /// 重新解析当前原始文本并规范化
    pub fn apply_format(&mut self) -> Result<(), ParseError> {
        let text = self.raw_text.clone();
        let path = self.source_path.clone();
        self.replace_document(&text, path)?;
        self.mark_unsaved(true);
        Ok(())
    }

    /// 与格式化相同的重建，额外记录校验结论供界面提示
    pub fn validate(&mut self) -> Result<(), ParseError> {
        match self.apply_format() {
            Ok(()) => {
                tracing::info!("JSON 校验通过");
                Ok(())
            }
            Err(e) => {
                tracing::warn!("JSON 校验失败: {}", e);
                Err(e)
            }
        }
    }

    /// 原始文本编辑器中的用户输入；只替换文本缓冲，直到格式化/校验才重建。
    /// 提交叶子编辑期间的赋值是程序行为，这里忽略并返回 false。
    pub fn set_raw_text(&mut self, text: &str) -> bool {
        if self.fence.is_active() {
            tracing::debug!("同步进行中，忽略原始文本赋值");
            return false;
        }
        self.raw_text = text.to_string();
        true
    }

    fn replace_document(&mut self, text: &str, source_path: Option<PathBuf>) -> Result<(), ParseError> {
        let started = Instant::now();
        let root = parse(text).map_err(|e| {
            tracing::error!("JSON 解析失败，保留之前的文档: {}", e);
            e
        })?;
        let canonical = serialize(&root);
        let generation = self.generation.wrapping_add(1);
        let tree = build_shadow_tree(&root, generation);

        // 以下赋值一起完成，不会出现半更新状态
        self.root = root;
        self.tree = tree;
        self.generation = generation;
        self.raw_text = canonical;
        self.source_path = source_path;
        let had_selection = self.selected.take().is_some();
        self.search.reset_cursor();

        tracing::info!(
            "文档重建完成: {} 个节点，耗时: {}ms",
            self.tree.len(),
            started.elapsed().as_millis()
        );
        self.events.publish(SessionEvent::DocumentChanged);
        if had_selection {
            self.events.publish(SessionEvent::SelectionChanged(None));
        }
        self.rebuild_search();
        Ok(())
    }

    // === 保存 ===

    /// 保存到当前路径；没有路径时报状态错误
    pub fn save(&mut self) -> Result<(), AppError> {
        let path = self
            .source_path
            .clone()
            .ok_or_else(|| AppError::State("文件路径未设置".into()))?;
        self.save_as(&path)
    }

    /// 先规范化再写出；解析或写入失败时会话保持原状
    pub fn save_as(&mut self, path: &Path) -> Result<(), AppError> {
        let root = parse(&self.raw_text).map_err(|e| {
            tracing::error!("JSON 解析失败，未保存: {}", e);
            e
        })?;
        let canonical = serialize(&root);
        write_text_file(path, &canonical)?;
        // 写入成功后才提交重建
        self.replace_document(&canonical, Some(path.to_path_buf()))?;
        self.mark_unsaved(false);
        tracing::info!("JSON文件已保存到: {}", path.display());
        Ok(())
    }

    /// Clean 时直接放行，否则交给确认回调
    pub fn confirm_discard<F>(&self, confirm: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        !self.has_unsaved_changes() || confirm()
    }

    // === 叶子编辑路径 ===

    /// 编辑字符串 / 数字节点；无效编辑静默拒绝并返回 Ok(false)
    pub fn edit_scalar(&mut self, id: NodeId, text: &str) -> Result<bool, AppError> {
        self.ensure_live(id)?;
        match self.tree.set_editable_value(id, &mut self.root, text) {
            Ok(()) => {
                self.node_updated(id);
                Ok(true)
            }
            Err(AppError::InvalidEdit(reason)) => {
                tracing::debug!("忽略无效编辑: {}", reason);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// 编辑布尔节点；值为空或节点不是布尔时静默拒绝
    pub fn edit_boolean(&mut self, id: NodeId, value: Option<bool>) -> Result<bool, AppError> {
        self.ensure_live(id)?;
        match self.tree.set_boolean_value(id, &mut self.root, value) {
            Ok(()) => {
                self.node_updated(id);
                Ok(true)
            }
            Err(AppError::InvalidEdit(reason)) => {
                tracing::debug!("忽略无效编辑: {}", reason);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// 节点写回通知：单次写回恰好一次；批量替换期间既不通知也不提交，
    /// 由批量结束后的一次提交统一发布 DocumentChanged
    fn node_updated(&mut self, id: NodeId) {
        if self.fence.is_active() {
            return;
        }
        self.events.publish(SessionEvent::NodeUpdated(id));
        self.commit_leaf_edit();
    }

    fn commit_leaf_edit(&mut self) {
        let Some(_guard) = self.fence.enter() else {
            return;
        };
        self.raw_text = serialize(&self.root);
        self.mark_unsaved(true);
        self.rebuild_search();
        self.events.publish(SessionEvent::DocumentChanged);
        tracing::info!("叶子编辑已提交，文本长度: {} 字符", self.raw_text.len());
    }

    fn ensure_live(&self, id: NodeId) -> Result<(), AppError> {
        if self.tree.contains(id) {
            Ok(())
        } else {
            Err(AppError::State("节点句柄已失效".into()))
        }
    }

    fn mark_unsaved(&mut self, dirty: bool) {
        let next = if dirty { SessionState::Dirty } else { SessionState::Clean };
        if self.state != next {
            self.state = next;
            self.events.publish(SessionEvent::DirtyStateChanged(dirty));
        }
    }

    // === 选择与展开 ===

    /// 选中节点：取消之前的选中，并展开到根的每一个祖先
    pub fn select_node(&mut self, id: NodeId) -> Result<(), AppError> {
        self.ensure_live(id)?;
        // 重复选中也要保证可见
        for ancestor in self.tree.ancestors(id) {
            self.tree.set_expanded(ancestor, true);
        }
        if self.selected == Some(id) {
            return Ok(());
        }
        if let Some(previous) = self.selected.take() {
            if let Some(node) = self.tree.get_mut(previous) {
                node.selected = false;
            }
        }
        if let Some(node) = self.tree.get_mut(id) {
            node.selected = true;
        }
        self.selected = Some(id);
        self.events.publish(SessionEvent::SelectionChanged(Some(id)));
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if let Some(previous) = self.selected.take() {
            if let Some(node) = self.tree.get_mut(previous) {
                node.selected = false;
            }
            self.events.publish(SessionEvent::SelectionChanged(None));
        }
    }

    pub fn expand_all(&mut self) {
        self.tree.set_all_expanded(true);
    }

    pub fn collapse_all(&mut self) {
        self.tree.set_all_expanded(false);
    }

    /// 展开节点本身及全部后代
    pub fn expand_subtree(&mut self, id: NodeId) -> Result<(), AppError> {
        self.ensure_live(id)?;
        self.tree.set_expanded(id, true);
        for child in self.tree.descendants(id) {
            self.tree.set_expanded(child, true);
        }
        Ok(())
    }

    /// 折叠全部后代，节点本身保持原状
    pub fn collapse_subtree(&mut self, id: NodeId) -> Result<(), AppError> {
        self.ensure_live(id)?;
        for child in self.tree.descendants(id) {
            self.tree.set_expanded(child, false);
        }
        Ok(())
    }

    pub fn expand_selected(&mut self) -> Result<(), AppError> {
        let id = self
            .selected
            .ok_or_else(|| AppError::State("未选中节点".into()))?;
        self.expand_subtree(id)
    }

    pub fn collapse_selected(&mut self) -> Result<(), AppError> {
        let id = self
            .selected
            .ok_or_else(|| AppError::State("未选中节点".into()))?;
        self.collapse_subtree(id)
    }

    // === 搜索 / 替换 ===

    pub fn set_search_term(&mut self, term: &str) {
        if self.search.set_term(term) {
            self.rebuild_search();
        }
    }

    pub fn set_case_sensitive(&mut self, case_sensitive: bool) {
        if self.search.set_case_sensitive(case_sensitive) {
            self.rebuild_search();
        }
    }

    pub fn set_replacement_text(&mut self, text: &str) {
        self.replacement = text.to_string();
    }

    pub fn find_next(&mut self) -> Option<NodeId> {
        let id = self.search.find_next()?;
        self.after_navigation(id);
        Some(id)
    }

    pub fn find_previous(&mut self) -> Option<NodeId> {
        let id = self.search.find_previous()?;
        self.after_navigation(id);
        Some(id)
    }

    fn after_navigation(&mut self, id: NodeId) {
        if let Err(e) = self.select_node(id) {
            tracing::warn!("搜索结果无法选中: {}", e);
        }
        self.publish_search_status();
    }

    /// 替换当前匹配的字符串值；游标数值保持不变
    pub fn replace_current(&mut self) -> bool {
        let Some(id) = self.search.current() else {
            return false;
        };
        let Some(matcher) = self.search.matcher() else {
            return false;
        };
        let replacement = self.replacement.clone();
        let changed = self
            .tree
            .replace_in_value(id, &mut self.root, |s| matcher.replace_all(s, &replacement));
        if changed {
            self.node_updated(id);
        }
        changed
    }

    /// 对当前全部匹配的字符串值做替换，最后只提交一次
    pub fn replace_all(&mut self) -> bool {
        let Some(matcher) = self.search.matcher() else {
            return false;
        };
        let targets = self.search.matches().to_vec();
        let replacement = self.replacement.clone();
        let mut changed = 0usize;
        {
            let _batch = self.fence.enter();
            for id in targets {
                if self
                    .tree
                    .replace_in_value(id, &mut self.root, |s| matcher.replace_all(s, &replacement))
                {
                    self.node_updated(id);
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.commit_leaf_edit();
            tracing::info!("全部替换完成: {} 个节点", changed);
        }
        changed > 0
    }

    fn rebuild_search(&mut self) {
        self.search.rebuild(&self.tree, &self.root);
        tracing::debug!("搜索索引重建: {} 个匹配", self.search.matches().len());
        self.publish_search_status();
    }

    fn publish_search_status(&mut self) {
        let status = self.search.status();
        if status != self.last_status {
            self.last_status = status.clone();
            self.events.publish(SessionEvent::SearchStatusChanged(status));
        }
    }
}
