//! 登录状态校验
//!
//! 访问订单页：被重定向到登录页即未登录；能看到账户导航并带有问候语即已登录。

use crate::error::ScrapeResult;
use crate::infrastructure::{PageResponse, Transport};
use crate::services::html::{element_text, select_first_list, select_first_text};
use crate::utils::logging::truncate_text;
use reqwest::Url;
use scraper::Html;
use tracing::{debug, info, warn};

/// 账户导航区域
const ACCOUNT_NAV_SELECTORS: &[&str] = &["#nav-link-accountList", "#nav-tools"];

/// 问候语中的用户名
const ACCOUNT_NAME_SELECTORS: &[&str] = &["#nav-link-accountList-nav-line-1", ".nav-line-1"];

/// 校验结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginCheck {
    Verified { display_name: String },
    Rejected(String),
}

impl LoginCheck {
    pub fn is_verified(&self) -> bool {
        matches!(self, LoginCheck::Verified { .. })
    }
}

/// 访问地址并判断登录状态
pub async fn verify_login<T: Transport>(transport: &T, url: &Url) -> ScrapeResult<LoginCheck> {
    let response = transport.get(url).await?;
    let check = inspect_account_page(&response);
    match &check {
        LoginCheck::Verified { display_name } => info!("✓ 已登录: {}", display_name),
        LoginCheck::Rejected(reason) => warn!("⚠️ 登录校验失败: {}", reason),
    }
    Ok(check)
}

/// 登录页路径（只看路径，不看查询串）
const SIGNIN_PATHS: &[&str] = &["/ap/signin", "/ap/mfa", "/ap/cvf"];

pub(crate) fn is_signin_path(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    SIGNIN_PATHS.iter().any(|p| path.starts_with(p))
}

/// 根据页面判断登录状态
pub fn inspect_account_page(response: &PageResponse) -> LoginCheck {
    if is_signin_path(&response.url) {
        return LoginCheck::Rejected("未登录，站点要求重新认证".to_string());
    }

    let html = response.text();
    let doc = Html::parse_document(&html);
    let nav = select_first_list(doc.root_element(), ACCOUNT_NAV_SELECTORS);
    let nav_text = nav.first().map(|el| element_text(*el).to_lowercase()).unwrap_or_default();
    debug!("账户导航文本: {}", truncate_text(&nav_text, 80));

    let lowered = html.to_lowercase();
    if !nav.is_empty() && (lowered.contains("account") || lowered.contains("hello")) {
        let display_name = select_first_text(doc.root_element(), ACCOUNT_NAME_SELECTORS)
            .unwrap_or_else(|| "User".to_string());
        return LoginCheck::Verified { display_name };
    }

    LoginCheck::Rejected("登录校验失败，Cookie 可能已过期".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, html: &str) -> PageResponse {
        PageResponse {
            url: Url::parse(url).unwrap(),
            status: 200,
            content_type: "text/html".to_string(),
            body: html.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_redirect_to_signin_is_rejected() {
        let check = inspect_account_page(&page("https://www.amazon.com/ap/signin?x=1", "<html></html>"));
        assert!(!check.is_verified());
    }

    #[test]
    fn test_account_nav_with_greeting() {
        let html = r#"<div id="nav-tools"><a id="nav-link-accountList">
            <span id="nav-link-accountList-nav-line-1">Hello, Sam</span>
            <span>Account &amp; Lists</span></a></div>"#;
        let check = inspect_account_page(&page("https://www.amazon.com/gp/your-account/order-history", html));
        assert_eq!(
            check,
            LoginCheck::Verified {
                display_name: "Hello, Sam".to_string()
            }
        );
    }

    #[test]
    fn test_signin_in_query_string_is_not_a_redirect() {
        let html = r#"<a id="nav-link-accountList"><span class="nav-line-1">Hello, Sam</span></a>"#;
        let check = inspect_account_page(&page("https://www.amazon.com/?ref_=nav_signin", html));
        assert!(check.is_verified());
    }

    #[test]
    fn test_no_account_nav_is_rejected() {
        let check = inspect_account_page(&page("https://www.amazon.com/gp/your-account/order-history", "<p>hello</p>"));
        assert!(matches!(check, LoginCheck::Rejected(_)));
    }
}
