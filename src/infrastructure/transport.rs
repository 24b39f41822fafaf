//! 请求通道 - 基础设施层
//!
//! 持有 Cookie 和连接，只暴露"取页面 / 提交表单"的能力，不认识订单和发票。

use crate::config::Config;
use crate::error::{ScrapeError, ScrapeResult};
use crate::models::SessionCookie;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 一次请求的响应
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// 跟随重定向后的最终地址
    pub url: Url,
    pub status: u16,
    /// Content-Type（小写）
    pub content_type: String,
    pub body: Vec<u8>,
}

impl PageResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type.contains("pdf")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 非 2xx 状态转换为错误
    pub fn ensure_success(self) -> ScrapeResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ScrapeError::BadStatus {
                url: self.url.to_string(),
                status: self.status,
            })
        }
    }
}

/// 请求通道
///
/// 所有请求按顺序执行；Cookie 状态由实现自己持有。
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// GET 页面
    async fn get(&self, url: &Url) -> ScrapeResult<PageResponse>;

    /// 以 `application/x-www-form-urlencoded` 提交表单，字段可重名
    async fn post_form(&self, url: &Url, fields: &[(String, String)]) -> ScrapeResult<PageResponse>;

    /// 当前对该地址可见的 Cookie
    async fn session_cookies(&self, url: &Url) -> ScrapeResult<Vec<SessionCookie>>;

    /// 提交表单或跳转后等待页面稳定
    async fn settle(&self) {}
}

impl<T: Transport + ?Sized> Transport for &T {
    async fn get(&self, url: &Url) -> ScrapeResult<PageResponse> {
        (**self).get(url).await
    }

    async fn post_form(&self, url: &Url, fields: &[(String, String)]) -> ScrapeResult<PageResponse> {
        (**self).post_form(url, fields).await
    }

    async fn session_cookies(&self, url: &Url) -> ScrapeResult<Vec<SessionCookie>> {
        (**self).session_cookies(url).await
    }

    async fn settle(&self) {
        (**self).settle().await
    }
}

/// 基于 reqwest 的 HTTP 通道
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    jar: Arc<Jar>,
}

impl HttpTransport {
    /// 按配置创建（浏览器 UA、超时、Cookie 存储）
    pub fn new(config: &Config) -> ScrapeResult<Self> {
        Self::with_settings(&config.user_agent, Duration::from_secs(config.request_timeout_secs))
    }

    pub fn with_settings(user_agent: &str, timeout: Duration) -> ScrapeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
            ),
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .cookie_provider(jar.clone())
            .timeout(timeout)
            .build()
            .map_err(|e| ScrapeError::fetch_failed("http client", e))?;

        Ok(Self { client, jar })
    }

    /// 导入外部取得的 Cookie（例如浏览器登录后）
    pub fn import_cookies(&self, cookies: &[SessionCookie], url: &Url) {
        // IP 地址不能带 Domain 属性
        let domain = url.domain().map(|d| d.trim_start_matches("www."));
        for cookie in cookies {
            let line = match domain {
                Some(domain) => format!("{}={}; Domain=.{}; Path=/", cookie.name, cookie.value, domain),
                None => format!("{}={}; Path=/", cookie.name, cookie.value),
            };
            self.jar.add_cookie_str(&line, url);
        }
        debug!("导入 {} 个 Cookie 到 {}", cookies.len(), url);
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> ScrapeResult<PageResponse> {
        let response = request
            .send()
            .await
            .map_err(|e| ScrapeError::fetch_failed(url.as_str(), e))?;

        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = response
            .bytes()
            .await
            .map_err(|e| ScrapeError::fetch_failed(url.as_str(), e))?
            .to_vec();

        debug!("{} -> {} [{}] {} 字节", url, status, content_type, body.len());

        Ok(PageResponse {
            url: final_url,
            status,
            content_type,
            body,
        })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> ScrapeResult<PageResponse> {
        self.send(self.client.get(url.clone()), url).await
    }

    async fn post_form(&self, url: &Url, fields: &[(String, String)]) -> ScrapeResult<PageResponse> {
        self.send(self.client.post(url.clone()).form(fields), url).await
    }

    async fn session_cookies(&self, url: &Url) -> ScrapeResult<Vec<SessionCookie>> {
        let Some(header) = self.jar.cookies(url) else {
            return Ok(Vec::new());
        };
        let raw = header.to_str().unwrap_or_default();
        Ok(parse_cookie_header(raw))
    }
}

/// 解析 `Cookie` 请求头，例如 `a=1; b=2`
pub fn parse_cookie_header(raw: &str) -> Vec<SessionCookie> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| SessionCookie::new(name, value.trim()))
        })
        .collect()
}
