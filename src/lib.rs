//! # Invoice Fetcher
//!
//! 登录购物站点账户，提取最近的订单，并下载每个订单的发票
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有 Cookie 和连接，只暴露"取页面 / 提交表单"的能力
//! - `HttpTransport` - reqwest + Cookie 存储
//! - `BrowserTransport` - 在浏览器页面内执行 `fetch`，由 `JsExecutor` 持有 page
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `AuthNegotiator` - 账号 → 密码 → 验证码的多步登录
//! - `OrderExtractor` - 订单页解析，必要时跟随一层详情页
//! - `InvoiceFetcher` - 发票落地页 → 可打印摘要 → PDF / HTML
//! - `exporter` / `FollowupWriter` - 导出订单、记录需要人工处理的订单
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个订单"的完整处理流程
//! - `OrderCtx` - 上下文封装（序号 + 订单号）
//! - `OrderFlow` - 流程编排（发票链接 → 获取 → 保存 → 记录）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 登录、提取、导出、逐个下载，管理资源
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, TransportKind};
pub use error::{AuthStep, ScrapeError, ScrapeResult};
pub use infrastructure::{BrowserTransport, HttpTransport, PageResponse, Transport};
pub use models::{AuthSession, AuthStatus, AuthenticatedContext, Credentials, InvoiceContent, InvoiceResource, OrderRecord};
pub use orchestrator::{App, RunStats};
pub use services::{AuthNegotiator, InvoiceFetcher, OrderExtractor};
pub use workflow::{OrderCtx, OrderFlow, ProcessResult};
