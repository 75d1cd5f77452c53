//! 程序入口：初始化日志，以无界面模式驱动同步会话（加载 → 搜索/替换 → 保存）

use std::{cell::RefCell, path::PathBuf, rc::Rc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::fmt::SubscriberBuilder;

use json_sync_editor::model::performance::run_performance_suite;
use json_sync_editor::utils::recent::RecentFileStore;
use json_sync_editor::vm::bridge::{validation_message, STATUS_LOADED, STATUS_READY, STATUS_SAVED};
use json_sync_editor::{DocumentSession, EditorConfig, SessionEvent};

#[derive(Parser, Debug)]
#[command(name = "json_sync_editor", about = "JSON 文档/树同步编辑器（无界面模式）")]
struct Cli {
    /// 要打开的 JSON 文件；省略时使用最近打开的文件
    path: Option<PathBuf>,

    /// 搜索词（节点名或字符串值的子串）
    #[arg(long)]
    search: Option<String>,

    /// 区分大小写
    #[arg(long)]
    match_case: bool,

    /// 用该文本替换全部匹配的字符串值
    #[arg(long, requires = "search")]
    replace: Option<String>,

    /// 修改后写回文件
    #[arg(long)]
    save: bool,

    /// 只校验，不输出树
    #[arg(long)]
    validate: bool,

    /// 以 JSON 输出可见行，替代缩进文本
    #[arg(long)]
    json: bool,

    /// 运行性能基准测试
    #[arg(long)]
    perf: bool,
}

fn main() -> Result<()> {
    // 初始化日志输出
    let _ = SubscriberBuilder::default()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let cli = Cli::parse();

    if cli.perf {
        for r in run_performance_suite() {
            println!("{:<24} {:>6}ms  {}  {}", r.operation, r.duration_ms, if r.success { "ok" } else { "FAIL" }, r.details);
        }
        return Ok(());
    }

    let config = EditorConfig::default();
    let recent = RecentFileStore::for_app(&config.app_name);
    let mut session = DocumentSession::new(config);

    let status = Rc::new(RefCell::new(STATUS_READY.to_string()));
    {
        let status = status.clone();
        session.subscribe(move |event| match event {
            SessionEvent::SearchStatusChanged(s) => tracing::info!("搜索状态: {}", s),
            SessionEvent::DirtyStateChanged(dirty) => {
                tracing::info!("未保存修改: {}", dirty);
            }
            SessionEvent::DocumentChanged => *status.borrow_mut() = STATUS_LOADED.to_string(),
            _ => {}
        });
    }

    let path = cli
        .path
        .clone()
        .or_else(|| recent.as_ref().and_then(RecentFileStore::load));
    if let Some(path) = &path {
        session
            .load_from_path(path)
            .with_context(|| format!("无法打开 {}", path.display()))?;
        if let Some(store) = &recent {
            if let Err(e) = store.save(path) {
                tracing::warn!("最近文件记录保存失败: {}", e);
            }
        }
    }

    if cli.validate {
        let result = session.validate();
        println!("{}", validation_message(&result));
        return Ok(());
    }

    if let Some(term) = &cli.search {
        session.set_case_sensitive(cli.match_case);
        session.set_search_term(term);
        if let Some(replacement) = &cli.replace {
            session.set_replacement_text(replacement);
            session.replace_all();
        }
        if let Some(first) = session.find_next() {
            tracing::info!("第一个匹配: {}", session.tree().get(first).map(|n| n.path.as_str()).unwrap_or("?"));
        }
        println!("匹配: {}", session.search_status());
    } else {
        session.expand_all();
    }

    let rows = session.visible_rows();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&rows).context("行快照序列化失败")?);
    } else {
        println!("{}", session.window_title());
        for row in rows {
            println!("{}", row.outline());
        }
    }

    if cli.save && session.has_unsaved_changes() {
        session.save().context("保存失败")?;
        *status.borrow_mut() = STATUS_SAVED.to_string();
    }

    tracing::info!("{}", status.borrow());
    Ok(())
}
