//! 订单处理流程 - 流程层
//!
//! 核心职责：定义"一个订单"的完整处理流程
//!
//! 流程顺序：
//! 1. 检查发票链接
//! 2. 获取发票（必要时经过可打印摘要页）
//! 3. 保存 PDF / HTML
//! 4. 需要人工处理的写入记录文件（兜底）

use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::infrastructure::Transport;
use crate::models::{AuthenticatedContext, InvoiceContent, OrderRecord};
use crate::services::{FollowupWriter, InvoiceFetcher};
use crate::workflow::order_ctx::OrderCtx;

/// 订单处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessResult {
    /// 已保存 PDF
    Downloaded(PathBuf),
    /// 已保存 HTML，需要人工打印为 PDF
    SavedHtml(PathBuf),
    /// 跳过（没有发票链接或未能取得发票）
    Skipped,
}

/// 订单处理流程
///
/// - 编排单个订单的发票下载流程
/// - 不持有请求通道，由调用方传入已认证上下文
pub struct OrderFlow {
    fetcher: InvoiceFetcher,
    followup: FollowupWriter,
    download_dir: PathBuf,
}

impl OrderFlow {
    pub fn new(download_dir: impl Into<PathBuf>, followup: FollowupWriter) -> Self {
        Self {
            fetcher: InvoiceFetcher::new(),
            followup,
            download_dir: download_dir.into(),
        }
    }

    pub async fn run<T: Transport>(
        &self,
        ctx: &AuthenticatedContext<T>,
        order: &OrderRecord,
        order_ctx: &OrderCtx,
    ) -> Result<ProcessResult> {
        info!("{} 🔍 处理订单", order_ctx);

        // ========== 1. 发票链接 ==========
        let Some(locator) = order.invoice_url.as_deref() else {
            warn!("{} ⚠️ 找不到发票链接，跳过", order_ctx);
            self.followup.write(&order_ctx.order_id, "找不到发票链接", order.details_url.as_deref())?;
            return Ok(ProcessResult::Skipped);
        };
        info!("{} 📄 找到发票链接", order_ctx);

        // ========== 2. 获取发票 ==========
        let resource = match self.fetcher.resolve(ctx, locator).await {
            Ok(resource) => resource,
            Err(e) => {
                warn!("{} ⚠️ 发票获取失败: {}", order_ctx, e);
                self.followup.write(&order_ctx.order_id, &format!("发票获取失败: {}", e), Some(locator))?;
                return Ok(ProcessResult::Skipped);
            }
        };

        // ========== 3. 保存 ==========
        let saved = resource.save(&self.download_dir, &order_ctx.file_stem())?;

        match (&resource.content, saved) {
            (InvoiceContent::Pdf(_), Some(path)) => {
                info!("{} ✅ 发票已下载: {}", order_ctx, path.display());
                Ok(ProcessResult::Downloaded(path))
            }
            (InvoiceContent::Html(_), Some(path)) => {
                info!("{} 📄 已保存 HTML，需要手动打印为 PDF: {}", order_ctx, path.display());
                self.followup.write(&order_ctx.order_id, "需要手动打印为 PDF", Some(&resource.locator))?;
                Ok(ProcessResult::SavedHtml(path))
            }
            (content, _) => {
                let reason = reason_of(content);
                warn!("{} ⚠️ 未能取得发票: {}", order_ctx, reason);
                self.followup.write(&order_ctx.order_id, &reason, Some(&resource.locator))?;
                Ok(ProcessResult::Skipped)
            }
        }
    }
}

fn reason_of(content: &InvoiceContent) -> String {
    match content {
        InvoiceContent::Unresolved(reason) => reason.clone(),
        _ => "发票未保存".to_string(),
    }
}
