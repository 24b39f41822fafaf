use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs;
use std::io::Write;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化 tracing 订阅者
///
/// `RUST_LOG` 优先；没有设置时默认 info，详细模式下为 debug。
/// 重复初始化不会报错。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n订单发票下载日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 向日志文件追加一行摘要
pub fn append_summary(log_file_path: &str, line: &str) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    writeln!(file, "[{}] {}", chrono::Local::now().format("%H:%M:%S"), line)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 订单与发票下载");
    info!("🌐 站点: {}", config.base_url);
    info!("🔌 请求通道: {:?}", config.transport);
    info!("📁 保存目录: {}", config.download_dir.display());
    info!("📊 订单上限: {} / 发票上限: {}", config.max_orders, config.max_invoice_orders);
    info!("{}", "=".repeat(60));
}

/// 记录订单加载信息
///
/// # 参数
/// - `total`: 提取到的订单数
/// - `invoice_limit`: 将要下载发票的订单数
pub fn log_orders_loaded(total: usize, invoice_limit: usize) {
    info!("✓ 提取到 {} 个订单", total);
    info!("📋 将为前 {} 个订单下载发票\n", total.min(invoice_limit));
}

/// 打印最终统计信息
///
/// # 参数
/// - `downloaded`: 已下载 PDF 数量
/// - `saved_html`: 已保存 HTML 数量
/// - `skipped`: 跳过数量
/// - `config`: 配置（日志与记录文件路径）
pub fn print_final_stats(downloaded: usize, saved_html: usize, skipped: usize, config: &Config) {
    let total = downloaded + saved_html + skipped;
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ PDF 已下载: {}/{}", downloaded, total);
    info!("📄 HTML 待打印: {}", saved_html);
    info!("⏭️ 跳过: {}", skipped);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", config.output_log_file);
    if saved_html + skipped > 0 {
        info!("需要人工处理的订单见: {}", config.followup_file);
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("订单发票下载", 2), "订单...");
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn test_log_file_header_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let path = path.to_str().unwrap();
        init_log_file(path).unwrap();
        append_summary(path, "订单 111 已下载").unwrap();

        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("订单发票下载日志"));
        assert!(text.trim_end().ends_with("订单 111 已下载"));
    }
}
