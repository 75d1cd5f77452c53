//! 最近打开文件记录：应用私有配置目录下的一个纯文本文件
//!
//! 记录缺失、不可读或指向已删除的文件都不算错误，调用方回退到默认空文档。

use std::fs::{create_dir_all, read_to_string, remove_file, write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::model::data_core::AppError;

const RECORD_FILE_NAME: &str = ".last_opened";

#[derive(Debug, Clone)]
pub struct RecentFileStore {
    record: PathBuf,
}

impl RecentFileStore {
    /// 平台配置目录（如 `~/.config/JsonSyncEditor`）；无法确定主目录时返回 None
    pub fn for_app(app_name: &str) -> Option<Self> {
        let dirs = ProjectDirs::from("", "", app_name)?;
        Some(Self::in_dir(dirs.config_dir()))
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            record: dir.join(RECORD_FILE_NAME),
        }
    }

    pub fn record_path(&self) -> &Path {
        &self.record
    }

    pub fn save(&self, file_path: &Path) -> Result<(), AppError> {
        if let Some(dir) = self.record.parent() {
            create_dir_all(dir)?;
        }
        write(&self.record, file_path.to_string_lossy().as_bytes())?;
        Ok(())
    }

    pub fn load(&self) -> Option<PathBuf> {
        let content = match read_to_string(&self.record) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!("没有可用的最近文件记录: {}", e);
                return None;
            }
        };
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return None;
        }
        let path = PathBuf::from(trimmed);
        if !path.exists() {
            tracing::warn!("最近打开的文件已不存在: {}", path.display());
            return None;
        }
        Some(path)
    }

    pub fn clear(&self) -> Result<(), AppError> {
        if self.record.exists() {
            remove_file(&self.record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let doc = dir.path().join("config.json");
        std::fs::write(&doc, "{}").expect("写入失败");

        let store = RecentFileStore::in_dir(&dir.path().join("nested"));
        store.save(&doc).expect("保存记录失败");
        assert_eq!(store.load(), Some(doc));
    }

    #[test]
    fn test_missing_or_stale_record_is_none() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let store = RecentFileStore::in_dir(dir.path());
        assert_eq!(store.load(), None, "没有记录时返回 None");

        store.save(&dir.path().join("gone.json")).expect("保存记录失败");
        assert_eq!(store.load(), None, "文件已不存在时返回 None");

        std::fs::write(store.record_path(), "   \n").expect("写入失败");
        assert_eq!(store.load(), None, "空白记录返回 None");
    }

    #[test]
    fn test_clear_removes_record() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let store = RecentFileStore::in_dir(dir.path());
        store.clear().expect("没有记录时清除也应成功");

        store.save(Path::new("/tmp/whatever.json")).expect("保存记录失败");
        assert!(store.record_path().exists());
        store.clear().expect("清除失败");
        assert!(!store.record_path().exists());
    }
}
