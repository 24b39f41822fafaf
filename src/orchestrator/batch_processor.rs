//! 订单批量处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责资源管理和整体流程调度。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：日志文件、保存目录、HTTP 通道
//! 2. **登录**：HTTP 通道直接协商；浏览器通道在页面内协商，再把 Cookie 交给 HTTP 通道
//! 3. **订单提取**：校验登录状态、读取订单页、提取订单（必要时跟随详情页）
//! 4. **导出**：CSV / JSON
//! 5. **逐个下载发票**：委托 `OrderFlow`，按顺序处理，不并发
//! 6. **全局统计**
//!
//! 只有本模块持有 Browser 和请求通道。

use crate::browser;
use crate::config::{Config, TransportKind};
use crate::error::ScrapeError;
use crate::infrastructure::{BrowserTransport, HttpTransport, Transport};
use crate::models::{AuthSession, AuthenticatedContext, Credentials, OrderRecord};
use crate::services::exporter::{export_orders, ExportFormats};
use crate::services::{verify_login, AuthNegotiator, FollowupWriter, LoginCheck, OrderExtractor};
use crate::utils::logging;
use crate::workflow::{OrderCtx, OrderFlow, ProcessResult};
use anyhow::{bail, Context, Result};
use chromiumoxide::Browser;
use reqwest::Url;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    base_url: Url,
    orders_url: Url,
    download_dir: PathBuf,
    negotiator: AuthNegotiator,
    http: HttpTransport,
    /// 浏览器通道登录时才存在
    browser: Option<BrowserSession>,
}

/// 浏览器及其页面通道
struct BrowserSession {
    _browser: Browser,
    transport: BrowserTransport,
}

/// 处理统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub extracted: usize,
    pub downloaded: usize,
    pub saved_html: usize,
    pub skipped: usize,
    pub exported: Vec<PathBuf>,
}

impl RunStats {
    fn record(&mut self, result: &ProcessResult) {
        match result {
            ProcessResult::Downloaded(_) => self.downloaded += 1,
            ProcessResult::SavedHtml(_) => self.saved_html += 1,
            ProcessResult::Skipped => self.skipped += 1,
        }
    }
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        logging::init_log_file(&config.output_log_file)
            .with_context(|| format!("无法创建日志文件: {}", config.output_log_file))?;
        logging::log_startup(&config);

        let base_url = Url::parse(&config.base_url).with_context(|| format!("无效的站点地址: {}", config.base_url))?;
        let orders_url =
            Url::parse(&config.orders_url).with_context(|| format!("无效的订单页地址: {}", config.orders_url))?;
        let negotiator = AuthNegotiator::from_config(&config)?;
        let http = HttpTransport::new(&config)?;
        let download_dir = prepare_download_dir(&config.download_dir)?;

        Ok(Self {
            config,
            base_url,
            orders_url,
            download_dir,
            negotiator,
            http,
            browser: None,
        })
    }

    /// 实际使用的保存目录（可能是临时目录）
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// 登录
    ///
    /// 返回 `AwaitingSecondFactor` 时，拿到验证码后调用 [`App::resume`]。
    pub async fn login(&mut self, credentials: &Credentials) -> Result<AuthSession> {
        let session = match self.config.transport {
            TransportKind::Http => self.negotiator.negotiate(&self.http, credentials).await?,
            TransportKind::Browser => {
                self.ensure_browser().await?;
                let Some(browser) = &self.browser else {
                    bail!("浏览器未初始化");
                };
                let session = self.negotiator.negotiate(&browser.transport, credentials).await?;
                self.share_browser_cookies(&session);
                session
            }
        };
        Ok(session)
    }

    /// 用验证码继续暂停的登录
    pub async fn resume(&mut self, session: AuthSession, code: &str) -> Result<AuthSession> {
        let session = match &self.browser {
            Some(browser) => {
                let session = self.negotiator.resume(&browser.transport, session, code).await?;
                self.share_browser_cookies(&session);
                session
            }
            None => self.negotiator.resume(&self.http, session, code).await?,
        };
        Ok(session)
    }

    /// 运行主流程：提取订单 → 导出 → 下载发票
    pub async fn run(&self, session: AuthSession) -> Result<RunStats> {
        let ctx = session.authorize(&self.http, self.base_url.clone())?;

        // 登录校验
        if let LoginCheck::Rejected(reason) = verify_login(ctx.transport(), &self.orders_url).await? {
            bail!("登录状态校验失败: {}", reason);
        }

        // 订单提取
        let orders = self.load_orders(&ctx).await?;
        let mut stats = RunStats {
            extracted: orders.len(),
            ..Default::default()
        };
        if orders.is_empty() {
            warn!("⚠️ 没有提取到任何订单，程序结束");
            logging::print_final_stats(0, 0, 0, &self.config);
            return Ok(stats);
        }
        logging::log_orders_loaded(orders.len(), self.config.max_invoice_orders);

        // 导出
        let formats = ExportFormats {
            csv: self.config.export_csv,
            json: self.config.export_json,
        };
        match export_orders(&self.download_dir, &orders, formats, chrono::Local::now()) {
            Ok(paths) => stats.exported = paths,
            Err(e) => error!("❌ 导出订单失败: {}", e),
        }

        // 逐个下载发票
        let flow = OrderFlow::new(&self.download_dir, FollowupWriter::new(&self.config.followup_file));
        for (index, order) in orders.iter().take(self.config.max_invoice_orders).enumerate() {
            let order_ctx = OrderCtx::new(index + 1, order);
            match flow.run(&ctx, order, &order_ctx).await {
                Ok(result) => {
                    if let Err(e) = logging::append_summary(
                        &self.config.output_log_file,
                        &format!("{} {:?}", order_ctx, result),
                    ) {
                        warn!("写入日志文件失败: {}", e);
                    }
                    stats.record(&result);
                }
                Err(e) => {
                    error!("{} ❌ 处理过程中发生错误: {}", order_ctx, e);
                    stats.skipped += 1;
                }
            }
        }

        logging::print_final_stats(stats.downloaded, stats.saved_html, stats.skipped, &self.config);
        Ok(stats)
    }

    /// 读取订单页并提取订单
    async fn load_orders<T: Transport>(&self, ctx: &AuthenticatedContext<T>) -> Result<Vec<OrderRecord>> {
        info!("\n📦 正在读取订单页: {}", self.orders_url);
        let page = ctx.transport().get(&self.orders_url).await?.ensure_success()?;

        let extractor = OrderExtractor::new(self.base_url.clone(), self.config.max_orders);
        let extraction = extractor.extract_and_follow(ctx, &page.text()).await;
        for diagnostic in &extraction.diagnostics {
            warn!("⚠️ {}", diagnostic);
        }
        if !extraction.layout_recognized() {
            let dump = self.download_dir.join("orders_page_unrecognized.html");
            match fs::write(&dump, &page.body) {
                Ok(()) => info!("已保存订单页用于排查: {}", dump.display()),
                Err(e) => warn!("保存订单页失败: {}", e),
            }
            return Err(ScrapeError::LayoutNotRecognized.into());
        }

        Ok(extraction.orders)
    }

    /// 启动或连接浏览器（只做一次）
    async fn ensure_browser(&mut self) -> Result<()> {
        if self.browser.is_none() {
            let (browser, page) = if self.config.browser_debug_port == 0 {
                browser::launch_headless_browser(&self.config.base_url, self.config.chrome_executable.as_deref())
                    .await?
            } else {
                browser::connect_to_browser_and_page(self.config.browser_debug_port, &self.config.base_url).await?
            };
            let transport = BrowserTransport::new(page, Duration::from_millis(self.config.settle_delay_ms));
            self.browser = Some(BrowserSession {
                _browser: browser,
                transport,
            });
        }
        Ok(())
    }

    /// 浏览器登录得到的 Cookie 交给 HTTP 通道
    fn share_browser_cookies(&self, session: &AuthSession) {
        if !session.cookies.is_empty() {
            self.http.import_cookies(&session.cookies, &self.base_url);
        }
    }
}

/// 创建保存目录；无法创建时退回到临时目录
fn prepare_download_dir(dir: &Path) -> Result<PathBuf> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(dir.to_path_buf()),
        Err(e) => {
            warn!("⚠️ 无法创建保存目录 {}: {}，改用临时目录", dir.display(), e);
            let scratch = tempfile::Builder::new()
                .prefix("amazon_invoices_")
                .tempdir()
                .context("无法创建临时目录")?;
            let path = scratch.keep();
            info!("📁 临时保存目录: {}", path.display());
            Ok(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_download_dir_creates_nested() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        assert_eq!(prepare_download_dir(&nested).unwrap(), nested);
        assert!(nested.is_dir());
    }

    #[test]
    fn test_prepare_download_dir_falls_back_when_blocked() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let dir = prepare_download_dir(&blocker.join("sub")).unwrap();
        assert!(dir.is_dir());
        assert_ne!(dir, blocker.join("sub"));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_stats_record() {
        let mut stats = RunStats::default();
        stats.record(&ProcessResult::Downloaded(PathBuf::from("a.pdf")));
        stats.record(&ProcessResult::SavedHtml(PathBuf::from("b.html")));
        stats.record(&ProcessResult::Skipped);
        assert_eq!((stats.downloaded, stats.saved_html, stats.skipped), (1, 1, 1));
    }
}
