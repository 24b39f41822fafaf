use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 请求通道
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// 直接 HTTP 请求 + 抓取的表单
    Http,
    /// 通过浏览器页面登录，再把 Cookie 交给 HTTP 通道
    Browser,
}

impl TransportKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Some(TransportKind::Http),
            "browser" => Some(TransportKind::Browser),
            _ => None,
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 站点根地址，所有相对链接都基于它解析
    pub base_url: String,
    /// 登录页地址
    pub signin_url: String,
    /// 订单列表地址
    pub orders_url: String,
    /// 发票保存目录
    pub download_dir: PathBuf,
    /// 订单提取上限
    pub max_orders: usize,
    /// 下载发票的订单上限
    pub max_invoice_orders: usize,
    /// 请求通道
    pub transport: TransportKind,
    /// 浏览器调试端口（为 0 时启动无头浏览器）
    pub browser_debug_port: u16,
    /// 无头浏览器可执行文件路径
    pub chrome_executable: Option<PathBuf>,
    /// 提交表单和页面跳转后的等待时间（仅浏览器通道）
    pub settle_delay_ms: u64,
    /// 单次请求超时
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// 是否导出 CSV
    pub export_csv: bool,
    /// 是否导出 JSON
    pub export_json: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 需要人工处理的订单记录文件
    pub followup_file: String,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        Self {
            base_url: "https://www.amazon.com".to_string(),
            signin_url: "https://www.amazon.com/ap/signin?openid.pape.max_auth_age=0&openid.return_to=https%3A%2F%2Fwww.amazon.com%2F%3Fref_%3Dnav_signin&openid.identity=http%3A%2F%2Fspecs.openid.net%2Fauth%2F2.0%2Fidentifier_select&openid.assoc_handle=usflex&openid.mode=checkid_setup&openid.claimed_id=http%3A%2F%2Fspecs.openid.net%2Fauth%2F2.0%2Fidentifier_select&openid.ns=http%3A%2F%2Fspecs.openid.net%2Fauth%2F2.0".to_string(),
            orders_url: "https://www.amazon.com/gp/your-account/order-history".to_string(),
            download_dir: home.join("amazon_invoices"),
            max_orders: crate::services::order_extractor::DEFAULT_MAX_ORDERS,
            max_invoice_orders: 5,
            transport: TransportKind::Http,
            browser_debug_port: 0,
            chrome_executable: None,
            settle_delay_ms: 3000,
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            export_csv: true,
            export_json: true,
            verbose_logging: false,
            output_log_file: "invoice_fetcher.log".to_string(),
            followup_file: "manual_followup.txt".to_string(),
        }
    }
}

impl Config {
    /// 读取配置：先读 `INVOICE_FETCHER_CONFIG` 指向的 TOML 文件（如有），再用环境变量覆盖
    pub fn load() -> Result<Self> {
        let base = match std::env::var("INVOICE_FETCHER_CONFIG") {
            Ok(path) => Self::from_toml_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    /// 只用默认值 + 环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件读取，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// 用查找函数覆盖字段，无法解析的值保留原值
    fn with_overrides(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = |name: &str| lookup(name);
        let flag = |name: &str| env(name).and_then(|v| parse_flag(&v));

        Self {
            base_url: env("BASE_URL").unwrap_or(self.base_url),
            signin_url: env("SIGNIN_URL").unwrap_or(self.signin_url),
            orders_url: env("ORDERS_URL").unwrap_or(self.orders_url),
            download_dir: env("DOWNLOAD_DIR").map(PathBuf::from).unwrap_or(self.download_dir),
            max_orders: parsed(env("MAX_ORDERS")).unwrap_or(self.max_orders),
            max_invoice_orders: parsed(env("MAX_INVOICE_ORDERS")).unwrap_or(self.max_invoice_orders),
            transport: env("TRANSPORT").and_then(|v| TransportKind::parse(&v)).unwrap_or(self.transport),
            browser_debug_port: parsed(env("BROWSER_DEBUG_PORT")).unwrap_or(self.browser_debug_port),
            chrome_executable: env("CHROME_EXECUTABLE").map(PathBuf::from).or(self.chrome_executable),
            settle_delay_ms: parsed(env("SETTLE_DELAY_MS")).unwrap_or(self.settle_delay_ms),
            request_timeout_secs: parsed(env("REQUEST_TIMEOUT_SECS")).unwrap_or(self.request_timeout_secs),
            user_agent: env("USER_AGENT").unwrap_or(self.user_agent),
            export_csv: flag("EXPORT_CSV").unwrap_or(self.export_csv),
            export_json: flag("EXPORT_JSON").unwrap_or(self.export_json),
            verbose_logging: flag("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            output_log_file: env("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
            followup_file: env("FOLLOWUP_FILE").unwrap_or(self.followup_file),
        }
    }
}

fn parsed<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// 布尔开关：接受 true/false、1/0、yes/no
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
