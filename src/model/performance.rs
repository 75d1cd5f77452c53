//! 性能基准测试模块
//!
//! 用于测试大文档的解析、影子树投影、搜索索引重建与叶子编辑提交的耗时

use std::time::Instant;
use serde_json::{json, Value};
use crate::model::{data_core::DocumentSession, document::{parse, serialize}, shadow_tree::build_shadow_tree};

/// 性能测试结果
#[derive(Debug)]
pub struct PerformanceResult {
    pub operation: String,
    pub duration_ms: u128,
    pub success: bool,
    pub details: String,
}

impl PerformanceResult {
    pub fn new(operation: &str, duration_ms: u128, success: bool, details: &str) -> Self {
        Self {
            operation: operation.to_string(),
            duration_ms,
            success,
            details: details.to_string(),
        }
    }
}

/// 生成大型测试JSON文本（规范化格式）
pub fn generate_large_json(depth: usize, width: usize) -> String {
    fn create_nested_object(current_depth: usize, max_depth: usize, width: usize) -> Value {
        if current_depth >= max_depth {
            return json!("leaf value");
        }

        let mut obj = serde_json::Map::new();

        // 添加各种类型的字段
        for i in 0..width {
            let key = format!("field_{}", i);
            let value = match i % 5 {
                0 => json!(format!("string value {}", i)),
                1 => json!(i as i64),
                2 => json!(i % 2 == 0),
                3 => json!([1, 2, 3, i]),
                _ => create_nested_object(current_depth + 1, max_depth, width / 2),
            };
            obj.insert(key, value);
        }

        Value::Object(obj)
    }

    let large_array: Vec<Value> = (0..width * 10)
        .map(|i| json!({
            "id": i,
            "name": format!("item_{}", i),
            "value": i * 2,
            "active": i % 3 == 0
        }))
        .collect();

    let root = json!({
        "metadata": {
            "depth": depth,
            "width": width,
            "description": "synthetic document for timing"
        },
        "data": create_nested_object(0, depth, width),
        "items": large_array,
    });
    format!("{:#}", root)
}

/// 测试JSON解析（含行号定位）性能
pub fn benchmark_parse(text: &str) -> PerformanceResult {
    let start = Instant::now();
    let parse_result = parse(text);
    let duration = start.elapsed();

    match parse_result {
        Ok(_) => PerformanceResult::new(
            "JSON解析",
            duration.as_millis(),
            true,
            &format!("解析了 {} 字节的JSON", text.len())
        ),
        Err(e) => PerformanceResult::new(
            "JSON解析",
            duration.as_millis(),
            false,
            &format!("解析失败: {}", e)
        )
    }
}

/// 测试影子树投影与规范化序列化性能
pub fn benchmark_projection(text: &str) -> Vec<PerformanceResult> {
    let Ok(root) = parse(text) else {
        return vec![PerformanceResult::new("影子树构建", 0, false, "输入无法解析")];
    };

    let start = Instant::now();
    let tree = build_shadow_tree(&root, 1);
    let build = PerformanceResult::new(
        "影子树构建",
        start.elapsed().as_millis(),
        !tree.is_empty(),
        &format!("构建了 {} 个节点", tree.len())
    );

    let start = Instant::now();
    let canonical = serialize(&root);
    let ser = PerformanceResult::new(
        "规范化序列化",
        start.elapsed().as_millis(),
        !canonical.is_empty(),
        &format!("输出 {} 字节", canonical.len())
    );
    vec![build, ser]
}

/// 测试会话级搜索与全部替换（一次提交）的性能
pub fn benchmark_session(text: &str, term: &str) -> Vec<PerformanceResult> {
    let mut results = Vec::new();
    let mut session = DocumentSession::default();

    let start = Instant::now();
    let loaded = session.load_text(text).is_ok();
    results.push(PerformanceResult::new(
        "会话加载",
        start.elapsed().as_millis(),
        loaded,
        &format!("{} 个节点", session.tree().len())
    ));

    let start = Instant::now();
    session.set_search_term(term);
    results.push(PerformanceResult::new(
        &format!("搜索: {}", term),
        start.elapsed().as_millis(),
        true,
        &format!("{} 个匹配", session.search().matches().len())
    ));

    let start = Instant::now();
    session.set_replacement_text(&term.to_uppercase());
    let changed = session.replace_all();
    results.push(PerformanceResult::new(
        "全部替换",
        start.elapsed().as_millis(),
        true,
        &format!("有变化: {}，文本长度 {}", changed, session.raw_text().len())
    ));

    results
}

/// 运行综合性能测试
pub fn run_performance_suite() -> Vec<PerformanceResult> {
    let mut results = Vec::new();

    // 测试不同规模的数据
    let test_cases = [
        (3, 10),   // 小型：深度3，宽度10
        (4, 20),   // 中型：深度4，宽度20
        (5, 30),   // 大型：深度5，宽度30
    ];

    for (depth, width) in test_cases {
        tracing::info!("测试规模：深度{}，宽度{}", depth, width);

        let start = Instant::now();
        let text = generate_large_json(depth, width);
        results.push(PerformanceResult::new(
            &format!("数据生成({}x{})", depth, width),
            start.elapsed().as_millis(),
            true,
            &format!("生成了 {} 字节", text.len())
        ));

        results.push(benchmark_parse(&text));
        results.extend(benchmark_projection(&text));
        results.extend(benchmark_session(&text, "item"));
    }

    results
}
