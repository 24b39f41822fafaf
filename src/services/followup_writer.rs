//! 人工处理记录 - 业务能力层
//!
//! 只负责把需要人工处理的订单追加写入记录文件，不关心流程

use crate::error::{ScrapeError, ScrapeResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 人工处理记录
///
/// 职责：
/// - 记录需要手动打印、找不到发票或下载失败的订单
/// - 每次只写一条
pub struct FollowupWriter {
    path: PathBuf,
}

impl FollowupWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条记录
    pub fn write(&self, order_id: &str, reason: &str, locator: Option<&str>) -> ScrapeResult<()> {
        debug!("写入人工处理记录: 订单 {} | {}", order_id, reason);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ScrapeError::io(&self.path, e))?;

        let line = format!(
            "订单 {} | {} | {}\n",
            order_id,
            reason,
            locator.unwrap_or("-")
        );
        file.write_all(line.as_bytes())
            .map_err(|e| ScrapeError::io(&self.path, e))
    }
}
