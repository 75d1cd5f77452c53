//! 文档模型：带行号元数据的 JSON 值树，严格解析与规范化（缩进）序列化
//!
//! 解析分两步：先交给 `serde_json` 做严格校验与转义解码，再用一个只认
//! 已校验文本的轻量扫描器补上每个值起始的行号（1 起）。行号只用于展示，
//! 不参与结构相等判断。

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// 标量值
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

/// 值的结构部分（对象成员保持声明顺序）
#[derive(Debug, Clone, PartialEq)]
pub enum JsonData {
    Object(Vec<(String, JsonValue)>),
    Array(Vec<JsonValue>),
    Scalar(Scalar),
}

/// 文档树中的一个值
#[derive(Debug, Clone)]
pub struct JsonValue {
    pub data: JsonData,
    /// 该值在源文本中起始的行号（1 起），程序构造的值为 None
    pub line: Option<usize>,
}

impl PartialEq for JsonValue {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Default for JsonValue {
    fn default() -> Self {
        Self::new(JsonData::Object(Vec::new()))
    }
}

/// 解析错误：消息 + 可选行列（1 起）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}{}", location_suffix(.line, .column))]
pub struct ParseError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

fn location_suffix(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(l), Some(c)) => format!(" (行 {}, 列 {})", l, c),
        (Some(l), None) => format!(" (行 {})", l),
        _ => String::new(),
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        // serde_json 的行列为 0 表示未知
        let line = (e.line() > 0).then_some(e.line());
        let column = (e.column() > 0).then_some(e.column());
        let full = e.to_string();
        let message = match line {
            Some(l) => full
                .strip_suffix(&format!(" at line {} column {}", l, e.column()))
                .unwrap_or(&full)
                .to_string(),
            None => full,
        };
        Self { message, line, column }
    }
}

impl JsonValue {
    pub fn new(data: JsonData) -> Self {
        Self { data, line: None }
    }

    pub fn object(members: Vec<(String, JsonValue)>) -> Self {
        Self::new(JsonData::Object(members))
    }

    pub fn array(items: Vec<JsonValue>) -> Self {
        Self::new(JsonData::Array(items))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::new(JsonData::Scalar(Scalar::String(s.into())))
    }

    pub fn number(n: impl Into<Number>) -> Self {
        Self::new(JsonData::Scalar(Scalar::Number(n.into())))
    }

    pub fn bool(b: bool) -> Self {
        Self::new(JsonData::Scalar(Scalar::Bool(b)))
    }

    pub fn null() -> Self {
        Self::new(JsonData::Scalar(Scalar::Null))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.data {
            JsonData::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.data {
            JsonData::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// 对象按键取成员（键唯一）
    pub fn member(&self, key: &str) -> Option<&JsonValue> {
        match &self.data {
            JsonData::Object(members) => members.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// 直接子值个数（对象成员数 / 数组长度，标量为 0）
    pub fn len(&self) -> usize {
        match &self.data {
            JsonData::Object(m) => m.len(),
            JsonData::Array(a) => a.len(),
            JsonData::Scalar(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按子索引路径定位（对象为成员序号，数组为元素下标）
    pub fn get(&self, location: &[usize]) -> Option<&JsonValue> {
        let mut current = self;
        for &idx in location {
            current = match &current.data {
                JsonData::Object(members) => &members.get(idx)?.1,
                JsonData::Array(items) => items.get(idx)?,
                JsonData::Scalar(_) => return None,
            };
        }
        Some(current)
    }

    pub fn get_mut(&mut self, location: &[usize]) -> Option<&mut JsonValue> {
        let mut current = self;
        for &idx in location {
            current = match &mut current.data {
                JsonData::Object(members) => &mut members.get_mut(idx)?.1,
                JsonData::Array(items) => items.get_mut(idx)?,
                JsonData::Scalar(_) => return None,
            };
        }
        Some(current)
    }

    /// 转换为 serde_json 值（丢弃行号）
    pub fn to_serde(&self) -> Value {
        match &self.data {
            JsonData::Object(members) => {
                let mut map = Map::with_capacity(members.len());
                for (k, v) in members {
                    map.insert(k.clone(), v.to_serde());
                }
                Value::Object(map)
            }
            JsonData::Array(items) => Value::Array(items.iter().map(JsonValue::to_serde).collect()),
            JsonData::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            JsonData::Scalar(Scalar::Number(n)) => Value::Number(n.clone()),
            JsonData::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            JsonData::Scalar(Scalar::Null) => Value::Null,
        }
    }
}

impl fmt::Display for JsonValue {
    /// `{:#}` 输出规范的两空格缩进格式，`{}` 输出紧凑格式
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{:#}", self.to_serde())
        } else {
            write!(f, "{}", self.to_serde())
        }
    }
}

/// 严格解析 JSON 文本，并记录每个值起始的行号
pub fn parse(text: &str) -> Result<JsonValue, ParseError> {
    let value: Value = serde_json::from_str(text)?;
    let skeleton = LineLocator::new(text).value();
    Ok(attach_lines(value, Some(&skeleton)))
}

/// 规范化输出：两空格缩进、无结尾换行；加载、格式化、保存共用同一风格
pub fn serialize(value: &JsonValue) -> String {
    format!("{:#}", value)
}

/// 与解析结果平行的行号骨架
#[derive(Debug)]
enum Skeleton {
    Leaf(usize),
    Object(usize, Vec<(String, Skeleton)>),
    Array(usize, Vec<Skeleton>),
}

impl Skeleton {
    fn line(&self) -> usize {
        match self {
            Skeleton::Leaf(l) | Skeleton::Object(l, _) | Skeleton::Array(l, _) => *l,
        }
    }
}

/// 仅用于已通过 serde_json 校验的文本：跳过字面量，记录每个值的起始行
struct LineLocator<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> LineLocator<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, bytes: text.as_bytes(), pos: 0, line: 1 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    fn value(&mut self) -> Skeleton {
        self.skip_ws();
        let line = self.line;
        match self.peek() {
            Some(b'{') => {
                self.pos += 1;
                let mut members = Vec::new();
                loop {
                    self.skip_ws();
                    match self.peek() {
                        Some(b'}') | None => {
                            self.pos += 1;
                            break;
                        }
                        Some(b',') => self.pos += 1,
                        Some(b'"') => {
                            let key = self.key();
                            self.skip_ws();
                            // ':'
                            self.pos += 1;
                            members.push((key, self.value()));
                        }
                        Some(_) => break,
                    }
                }
                Skeleton::Object(line, members)
            }
            Some(b'[') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_ws();
                    match self.peek() {
                        Some(b']') | None => {
                            self.pos += 1;
                            break;
                        }
                        Some(b',') => self.pos += 1,
                        Some(_) => {
                            let before = self.pos;
                            items.push(self.value());
                            if self.pos == before {
                                break;
                            }
                        }
                    }
                }
                Skeleton::Array(line, items)
            }
            Some(b'"') => {
                self.string_span();
                Skeleton::Leaf(line)
            }
            _ => {
                while let Some(b) = self.peek() {
                    if matches!(b, b',' | b'}' | b']' | b' ' | b'\t' | b'\r' | b'\n') {
                        break;
                    }
                    self.pos += 1;
                }
                Skeleton::Leaf(line)
            }
        }
    }

    /// 返回包含引号的字符串字面量区间；合法 JSON 字符串内不含裸换行
    fn string_span(&mut self) -> (usize, usize) {
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'\\' => self.pos += 1,
                b'"' => break,
                _ => {}
            }
        }
        (start, self.pos.min(self.bytes.len()))
    }

    fn key(&mut self) -> String {
        let (start, end) = self.string_span();
        self.text
            .get(start..end)
            .and_then(|raw| serde_json::from_str::<String>(raw).ok())
            .unwrap_or_default()
    }
}

fn attach_lines(value: Value, skeleton: Option<&Skeleton>) -> JsonValue {
    let line = skeleton.map(Skeleton::line);
    let data = match value {
        Value::Object(map) => {
            // 重复键：serde_json 保留首次出现的位置、取最后一次的值，行号同样取最后一次
            let lines: HashMap<&str, &Skeleton> = match skeleton {
                Some(Skeleton::Object(_, members)) => {
                    members.iter().map(|(k, s)| (k.as_str(), s)).collect()
                }
                _ => HashMap::new(),
            };
            JsonData::Object(
                map.into_iter()
                    .map(|(k, v)| {
                        let child = attach_lines(v, lines.get(k.as_str()).copied());
                        (k, child)
                    })
                    .collect(),
            )
        }
        Value::Array(items) => {
            let lines: &[Skeleton] = match skeleton {
                Some(Skeleton::Array(_, items)) => items,
                _ => &[],
            };
            JsonData::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| attach_lines(v, lines.get(i)))
                    .collect(),
            )
        }
        Value::String(s) => JsonData::Scalar(Scalar::String(s)),
        Value::Number(n) => JsonData::Scalar(Scalar::Number(n)),
        Value::Bool(b) => JsonData::Scalar(Scalar::Bool(b)),
        Value::Null => JsonData::Scalar(Scalar::Null),
    };
    JsonValue { data, line }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_member_order() {
        let doc = parse(r#"{"z": 1, "a": 2, "m": 3}"#).expect("解析失败");
        let JsonData::Object(members) = &doc.data else {
            panic!("根应为对象");
        };
        let keys: Vec<&str> = members.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"], "成员应保持声明顺序");
    }

    #[test]
    fn test_parse_records_line_numbers() {
        let text = "{\n  \"name\": \"Widget\",\n  \"tags\": [\n    \"a\",\n    \"b\"\n  ],\n  \"qty\": 3\n}";
        let doc = parse(text).expect("解析失败");

        assert_eq!(doc.line, Some(1));
        assert_eq!(doc.member("name").and_then(|v| v.line), Some(2));
        let tags = doc.member("tags").expect("缺少 tags");
        assert_eq!(tags.line, Some(3));
        assert_eq!(tags.get(&[1]).and_then(|v| v.line), Some(5));
        assert_eq!(doc.member("qty").and_then(|v| v.line), Some(7));
    }

    #[test]
    fn test_line_numbers_with_escaped_keys_and_strings() {
        let text = "{\"a\\\"b\": \"x}]\\\"\",\n\"c\": [\n{}]}";
        let doc = parse(text).expect("解析失败");
        assert_eq!(doc.member("a\"b").and_then(|v| v.line), Some(1));
        let c = doc.member("c").expect("缺少 c");
        assert_eq!(c.line, Some(2));
        assert_eq!(c.get(&[0]).and_then(|v| v.line), Some(3));
    }

    #[test]
    fn test_duplicate_keys_last_value_wins() {
        let doc = parse("{\"a\": 1,\n\"b\": 2,\n\"a\": 3}").expect("解析失败");
        assert_eq!(doc.len(), 2, "重复键只保留一个成员");
        let a = doc.member("a").expect("缺少 a");
        assert_eq!(a.as_scalar(), Some(&Scalar::Number(3.into())));
        assert_eq!(a.line, Some(3));
    }

    #[test]
    fn test_parse_error_carries_position() {
        let err = parse("{\"a\": }").expect_err("非法 JSON 应失败");
        assert_eq!(err.line, Some(1));
        assert!(err.column.is_some());
        assert!(!err.message.contains(" at line "), "消息不应重复位置: {}", err.message);
        assert!(err.to_string().contains("行 1"));
    }

    #[test]
    fn test_rejects_comments_and_trailing_commas() {
        assert!(parse("{\"a\": 1,}").is_err());
        assert!(parse("[1, 2,]").is_err());
        assert!(parse("// c\n{}").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_serialize_is_two_space_indented() {
        let doc = parse(r#"{"name":"Widget","tags":["a","b"],"qty":3}"#).expect("解析失败");
        let text = serialize(&doc);
        assert_eq!(
            text,
            "{\n  \"name\": \"Widget\",\n  \"tags\": [\n    \"a\",\n    \"b\"\n  ],\n  \"qty\": 3\n}"
        );
    }

    #[test]
    fn test_serialize_round_trip_is_structurally_equal() {
        let samples = [
            r#"{"a": {"b": [1, 2.5, -3e2, true, null, "s\n\"q\""]}, "": {}, "e": []}"#,
            r#"[[], [[]], {"k": "é中"}]"#,
            r#""plain""#,
            "42",
            "null",
        ];
        for text in samples {
            let first = parse(text).expect("解析失败");
            let again = parse(&serialize(&first)).expect("规范输出应可再解析");
            assert_eq!(first, again, "往返后结构应一致: {}", text);
        }
    }

    #[test]
    fn test_get_mut_writes_in_place() {
        let mut doc = parse(r#"{"list": [1, {"x": "old"}]}"#).expect("解析失败");
        let slot = doc.get_mut(&[0, 1, 0]).expect("路径应存在");
        *slot = JsonValue::string("new");
        assert_eq!(doc.get(&[0, 1, 0]).and_then(JsonValue::as_str), Some("new"));
        assert!(doc.get(&[0, 5]).is_none());
        assert!(doc.get(&[0, 0, 0]).is_none(), "标量没有子值");
    }

    #[test]
    fn test_equality_ignores_line_metadata() {
        let parsed = parse("[\n1\n]").expect("解析失败");
        let built = JsonValue::array(vec![JsonValue::number(1)]);
        assert_eq!(parsed, built);
    }
}
