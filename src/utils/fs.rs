//! IO helper: UTF-8 text read/write for JSON documents

use std::{fs::File, io::{BufReader, Read, Write}, path::Path};

use crate::model::data_core::AppError;

/// 读取整个文件为 UTF-8 文本，去掉开头的 BOM
pub fn read_text_file(p: &Path) -> Result<String, AppError> {
    let f = File::open(p)?;
    let mut rdr = BufReader::new(f);
    let mut text = String::new();
    rdr.read_to_string(&mut text)?;
    match text.strip_prefix('\u{feff}') {
        Some(rest) => Ok(rest.to_string()),
        None => Ok(text),
    }
}

/// 写出文本（调用方负责先规范化）
pub fn write_text_file(p: &Path, text: &str) -> Result<(), AppError> {
    let mut f = File::create(p)?;
    f.write_all(text.as_bytes())?;
    f.flush()?;
    Ok(())
}
