//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力；`BrowserTransport` 在它之上
//! 用页面内的 `fetch`（带 Cookie）实现请求通道。

use crate::error::{ScrapeError, ScrapeResult};
use crate::infrastructure::transport::{PageResponse, Transport};
use crate::models::SessionCookie;
use chromiumoxide::Page;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval() 能力
/// - 不认识订单 / 发票
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> ScrapeResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        result.into_value().map_err(|e| ScrapeError::Browser {
            source: Box::new(e),
        })
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> ScrapeResult<T> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value).map_err(|e| ScrapeError::Browser {
            source: Box::new(e),
        })
    }
}

/// 页面内 fetch 的返回值
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FetchOutcome {
    #[serde(rename_all = "camelCase")]
    Done {
        url: String,
        status: u16,
        content_type: String,
        body: Vec<u8>,
    },
    Failed {
        error: String,
    },
}

/// 浏览器通道
///
/// 页面需先停在站点域名下，`fetch` 才会带上该站点的 Cookie。
pub struct BrowserTransport {
    executor: JsExecutor,
    settle_delay: Duration,
}

impl BrowserTransport {
    pub fn new(page: Page, settle_delay: Duration) -> Self {
        Self {
            executor: JsExecutor::new(page),
            settle_delay,
        }
    }

    async fn fetch(&self, url: &Url, method: &str, fields: Option<&[(String, String)]>) -> ScrapeResult<PageResponse> {
        let body = match fields {
            Some(fields) => format!(
                "new URLSearchParams({})",
                serde_json::to_string(fields).map_err(|e| ScrapeError::Browser { source: Box::new(e) })?
            ),
            None => "undefined".to_string(),
        };

        let js_code = format!(
            r#"
            (async () => {{
                try {{
                    const res = await fetch({url}, {{
                        method: {method},
                        credentials: "include", // 带上站点 Cookie
                        redirect: "follow",
                        body: {body}
                    }});
                    const buf = new Uint8Array(await res.arrayBuffer());
                    return {{
                        url: res.url,
                        status: res.status,
                        contentType: res.headers.get("content-type") || "",
                        body: Array.from(buf)
                    }};
                }} catch (error) {{
                    return {{ error: error.message }};
                }}
            }})()
            "#,
            url = serde_json::to_string(url.as_str()).map_err(|e| ScrapeError::Browser { source: Box::new(e) })?,
            method = serde_json::to_string(method).map_err(|e| ScrapeError::Browser { source: Box::new(e) })?,
            body = body,
        );

        debug!("浏览器 {} {}", method, url);

        match self.executor.eval_as::<FetchOutcome>(js_code).await? {
            FetchOutcome::Done {
                url: final_url,
                status,
                content_type,
                body,
            } => Ok(PageResponse {
                url: Url::parse(&final_url).unwrap_or_else(|_| url.clone()),
                status,
                content_type: content_type.to_ascii_lowercase(),
                body,
            }),
            FetchOutcome::Failed { error } => Err(ScrapeError::FetchFailed {
                url: url.to_string(),
                source: error.into(),
            }),
        }
    }
}

impl Transport for BrowserTransport {
    async fn get(&self, url: &Url) -> ScrapeResult<PageResponse> {
        self.fetch(url, "GET", None).await
    }

    async fn post_form(&self, url: &Url, fields: &[(String, String)]) -> ScrapeResult<PageResponse> {
        self.fetch(url, "POST", Some(fields)).await
    }

    async fn session_cookies(&self, _url: &Url) -> ScrapeResult<Vec<SessionCookie>> {
        let cookies = self.executor.page().get_cookies().await?;
        Ok(cookies
            .into_iter()
            .map(|c| SessionCookie::new(c.name, c.value))
            .collect())
    }

    async fn settle(&self) {
        sleep(self.settle_delay).await;
    }
}
