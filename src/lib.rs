//! JSON 文档/树双向同步引擎
//! 
//! 提供JSON文本解析、影子树投影、叶子编辑回写与搜索替换索引
//! 遵循MVVM架构模式，UI层通过事件订阅观察会话状态

pub mod model;
pub mod utils;
pub mod vm;

// 重新导出主要类型
pub use model::data_core::{AppError, DocumentSession, EditorConfig, SessionState};
pub use model::document::{parse, serialize, JsonValue, ParseError};
pub use model::shadow_tree::{JsonTreeNode, NodeId, NodeKind, ShadowTree, build_shadow_tree};
pub use vm::bridge::{NodeRow, SessionEvent};
