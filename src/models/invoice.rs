use crate::error::{ScrapeError, ScrapeResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 发票内容分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceContent {
    /// PDF，直接保存
    Pdf(Vec<u8>),
    /// HTML 页面，需要人工打印为 PDF
    Html(String),
    /// 未能取得
    Unresolved(String),
}

/// 发票资源
#[derive(Debug, Clone)]
pub struct InvoiceResource {
    /// 发票地址（绝对 URL）
    pub locator: String,
    pub content: InvoiceContent,
}

impl InvoiceResource {
    pub fn new(locator: impl Into<String>, content: InvoiceContent) -> Self {
        Self {
            locator: locator.into(),
            content,
        }
    }

    /// 是否需要人工打印
    pub fn requires_manual_print(&self) -> bool {
        matches!(self.content, InvoiceContent::Html(_))
    }

    /// 保存到目录，返回写入的文件路径；未取得的发票不写文件
    pub fn save(&self, dir: &Path, file_stem: &str) -> ScrapeResult<Option<PathBuf>> {
        let (path, bytes) = match &self.content {
            InvoiceContent::Pdf(bytes) => (dir.join(format!("Invoice_{}.pdf", file_stem)), bytes.as_slice()),
            InvoiceContent::Html(html) => (dir.join(format!("Invoice_{}.html", file_stem)), html.as_bytes()),
            InvoiceContent::Unresolved(_) => return Ok(None),
        };

        debug!("写入发票文件: {} ({} 字节)", path.display(), bytes.len());
        std::fs::write(&path, bytes).map_err(|e| ScrapeError::io(&path, e))?;
        Ok(Some(path))
    }
}
