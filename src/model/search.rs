//! 搜索/替换索引：在影子树先序序列上做字面量子串匹配，带循环游标

use regex::{NoExpand, Regex, RegexBuilder};

use crate::model::document::JsonValue;
use crate::model::shadow_tree::{NodeId, ShadowTree};

/// 字面量子串匹配器（大小写可选），不解释任何正则语法
#[derive(Debug, Clone)]
pub struct TermMatcher {
    re: Regex,
}

impl TermMatcher {
    /// 空白搜索词不产生匹配器
    pub fn new(term: &str, case_sensitive: bool) -> Option<Self> {
        if term.trim().is_empty() {
            return None;
        }
        RegexBuilder::new(&regex::escape(term))
            .case_insensitive(!case_sensitive)
            .build()
            .ok()
            .map(|re| Self { re })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.re.is_match(text)
    }

    /// 替换全部出现；没有出现时返回 None
    pub fn replace_all(&self, text: &str, replacement: &str) -> Option<String> {
        if !self.re.is_match(text) {
            return None;
        }
        Some(self.re.replace_all(text, NoExpand(replacement)).into_owned())
    }
}

/// 节点名包含搜索词，或节点是包含搜索词的字符串标量
pub fn node_matches(tree: &ShadowTree, id: NodeId, doc: &JsonValue, matcher: &TermMatcher) -> bool {
    let Some(node) = tree.get(id) else {
        return false;
    };
    if matcher.is_match(&node.name) {
        return true;
    }
    tree.value(id, doc)
        .and_then(JsonValue::as_str)
        .is_some_and(|s| matcher.is_match(s))
}

#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    term: String,
    case_sensitive: bool,
    matches: Vec<NodeId>,
    cursor: Option<usize>,
}

impl SearchIndex {
    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// 返回搜索词是否变化；变化时游标复位，需要随后 rebuild
    pub fn set_term(&mut self, term: &str) -> bool {
        if self.term == term {
            return false;
        }
        self.term = term.to_string();
        self.cursor = None;
        true
    }

    pub fn set_case_sensitive(&mut self, case_sensitive: bool) -> bool {
        if self.case_sensitive == case_sensitive {
            return false;
        }
        self.case_sensitive = case_sensitive;
        self.cursor = None;
        true
    }

    pub fn matcher(&self) -> Option<TermMatcher> {
        TermMatcher::new(&self.term, self.case_sensitive)
    }

    /// 重新计算匹配集合；游标在范围内时保持数值不变
    pub fn rebuild(&mut self, tree: &ShadowTree, doc: &JsonValue) {
        self.matches = match self.matcher() {
            Some(matcher) => tree
                .flatten()
                .filter(|id| node_matches(tree, *id, doc, &matcher))
                .collect(),
            None => Vec::new(),
        };
        if self.cursor.is_some_and(|c| c >= self.matches.len()) {
            self.cursor = None;
        }
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    pub fn matches(&self) -> &[NodeId] {
        &self.matches
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<NodeId> {
        self.cursor.and_then(|c| self.matches.get(c).copied())
    }

    pub fn find_next(&mut self) -> Option<NodeId> {
        let total = self.matches.len();
        if total == 0 {
            return None;
        }
        let next = match self.cursor {
            None => 0,
            Some(c) => (c + 1) % total,
        };
        self.cursor = Some(next);
        self.current()
    }

    pub fn find_previous(&mut self) -> Option<NodeId> {
        let total = self.matches.len();
        if total == 0 {
            return None;
        }
        let prev = match self.cursor {
            None => total - 1,
            Some(c) => (c + total - 1) % total,
        };
        self.cursor = Some(prev);
        self.current()
    }

    /// `当前/总数`；尚未定位时当前为 0
    pub fn status(&self) -> String {
        if self.matches.is_empty() {
            return "0/0".to_string();
        }
        let current = self.cursor.map_or(0, |c| c + 1);
        format!("{}/{}", current, self.matches.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::parse;
    use crate::model::shadow_tree::build_shadow_tree;

    fn index_for(text: &str, term: &str, case_sensitive: bool) -> (JsonValue, ShadowTree, SearchIndex) {
        let doc = parse(text).expect("解析失败");
        let tree = build_shadow_tree(&doc, 1);
        let mut index = SearchIndex::default();
        index.set_term(term);
        index.set_case_sensitive(case_sensitive);
        index.rebuild(&tree, &doc);
        (doc, tree, index)
    }

    fn names(tree: &ShadowTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().filter_map(|id| tree.get(*id).map(|n| n.name.clone())).collect()
    }

    #[test]
    fn test_matches_names_and_string_values_in_preorder() {
        let (_, tree, index) = index_for(
            r#"{"name": "Widget", "tags": ["a", "bag"], "qty": 3, "flag": "ag"}"#,
            "ag",
            false,
        );
        assert_eq!(names(&tree, index.matches()), vec!["tags", "[1]", "flag"]);
        assert_eq!(index.status(), "0/3", "尚未定位时当前为 0");
    }

    #[test]
    fn test_numbers_and_booleans_match_only_by_name() {
        let (_, tree, index) = index_for(r#"{"a": 33, "b": true, "c": "33"}"#, "3", false);
        assert_eq!(names(&tree, index.matches()), vec!["c"]);
    }

    #[test]
    fn test_case_sensitivity() {
        let text = r#"{"Name": "WIDGET", "other": "widget"}"#;
        let (_, tree, insensitive) = index_for(text, "widget", false);
        assert_eq!(names(&tree, insensitive.matches()), vec!["Name", "other"]);

        let (_, tree, sensitive) = index_for(text, "widget", true);
        assert_eq!(names(&tree, sensitive.matches()), vec!["other"]);
    }

    #[test]
    fn test_term_is_literal_not_regex() {
        let (_, tree, index) = index_for(r#"{"a": "x.y", "b": "xzy", "c": "(1)"}"#, ".", true);
        assert_eq!(names(&tree, index.matches()), vec!["a"]);
        let (_, tree, index) = index_for(r#"{"a": "x.y", "b": "xzy", "c": "(1)"}"#, "(1", true);
        assert_eq!(names(&tree, index.matches()), vec!["c"]);
    }

    #[test]
    fn test_blank_term_has_no_matches() {
        let (_, _, index) = index_for(r#"{"a b": "c d"}"#, "   ", false);
        assert!(index.matches().is_empty());
        assert_eq!(index.status(), "0/0");
    }

    #[test]
    fn test_find_next_and_previous_wrap_around() {
        let (_, _, mut index) = index_for(r#"{"x1": 1, "x2": 2, "x3": 3}"#, "x", false);

        let first = index.find_next().expect("应有匹配");
        assert_eq!(index.status(), "1/3");
        index.find_next();
        index.find_next();
        assert_eq!(index.status(), "3/3");
        assert_eq!(index.find_next(), Some(first), "末尾之后回到第一个");

        assert_eq!(index.find_previous(), index.matches().last().copied());
        assert_eq!(index.status(), "3/3");
    }

    #[test]
    fn test_find_previous_without_cursor_starts_at_last() {
        let (_, _, mut index) = index_for(r#"{"x1": 1, "x2": 2}"#, "x", false);
        index.find_previous();
        assert_eq!(index.status(), "2/2");
    }

    #[test]
    fn test_find_next_len_times_is_cyclic() {
        let (_, _, mut index) = index_for(r#"{"k": ["k", "k", {"k": "k"}]}"#, "k", false);
        let total = index.matches().len();
        assert!(total > 1);
        index.find_next();
        index.find_next();
        let start = index.current();
        for _ in 0..total {
            index.find_next();
        }
        assert_eq!(index.current(), start);
    }

    #[test]
    fn test_navigation_on_empty_index_is_noop() {
        let (_, _, mut index) = index_for(r#"{"a": 1}"#, "zzz", false);
        assert_eq!(index.find_next(), None);
        assert_eq!(index.find_previous(), None);
        assert_eq!(index.cursor(), None);
    }

    #[test]
    fn test_rebuild_keeps_cursor_in_range_and_term_change_resets() {
        let (doc, tree, mut index) = index_for(r#"{"x1": 1, "x2": 2}"#, "x", false);
        index.find_next();
        index.find_next();
        index.rebuild(&tree, &doc);
        assert_eq!(index.cursor(), Some(1), "文档变更后的重建保持游标");

        index.set_term("x2");
        index.rebuild(&tree, &doc);
        assert_eq!(index.cursor(), None);
        assert_eq!(index.status(), "0/1");
    }

    #[test]
    fn test_matcher_replace_all() {
        let matcher = TermMatcher::new("ab", false).expect("应构建匹配器");
        assert_eq!(matcher.replace_all("xAByab", "$1-").as_deref(), Some("x$1-y$1-"));
        assert_eq!(matcher.replace_all("none", "z"), None);
    }
}
