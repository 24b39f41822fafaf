//! 测试用的脚本化请求通道
#![allow(dead_code)]

use invoice_fetcher::models::SessionCookie;
use invoice_fetcher::{PageResponse, ScrapeError, ScrapeResult, Transport};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Mutex;

pub const BASE: &str = "https://www.amazon.com";

/// 记录下来的一次请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub method: &'static str,
    pub url: String,
    pub fields: Vec<(String, String)>,
}

impl Recorded {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// 按 (方法, 地址) 返回预设响应；没有预设的地址返回请求失败
#[derive(Default)]
pub struct ScriptedTransport {
    routes: HashMap<(&'static str, String), PageResponse>,
    cookies: Vec<SessionCookie>,
    requests: Mutex<Vec<Recorded>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_get(mut self, url: &str, response: PageResponse) -> Self {
        self.routes.insert(("GET", url.to_string()), response);
        self
    }

    pub fn on_post(mut self, url: &str, response: PageResponse) -> Self {
        self.routes.insert(("POST", url.to_string()), response);
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push(SessionCookie::new(name, value));
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, method: &'static str, url: &Url, fields: &[(String, String)]) -> ScrapeResult<PageResponse> {
        self.requests.lock().unwrap().push(Recorded {
            method,
            url: url.to_string(),
            fields: fields.to_vec(),
        });
        self.routes
            .get(&(method, url.to_string()))
            .cloned()
            .ok_or_else(|| ScrapeError::FetchFailed {
                url: url.to_string(),
                source: format!("no scripted response for {} {}", method, url).into(),
            })
    }
}

impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> ScrapeResult<PageResponse> {
        self.respond("GET", url, &[])
    }

    async fn post_form(&self, url: &Url, fields: &[(String, String)]) -> ScrapeResult<PageResponse> {
        self.respond("POST", url, fields)
    }

    async fn session_cookies(&self, _url: &Url) -> ScrapeResult<Vec<SessionCookie>> {
        Ok(self.cookies.clone())
    }
}

pub fn base() -> Url {
    Url::parse(BASE).unwrap()
}

pub fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

/// HTML 响应，`final_url` 为跟随重定向后的地址
pub fn html(final_url: &str, body: &str) -> PageResponse {
    PageResponse {
        url: Url::parse(final_url).unwrap(),
        status: 200,
        content_type: "text/html; charset=utf-8".to_string(),
        body: body.as_bytes().to_vec(),
    }
}

pub fn pdf(final_url: &str, bytes: &[u8]) -> PageResponse {
    PageResponse {
        url: Url::parse(final_url).unwrap(),
        status: 200,
        content_type: "application/pdf".to_string(),
        body: bytes.to_vec(),
    }
}
