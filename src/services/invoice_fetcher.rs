//! 发票获取 - 业务能力层
//!
//! 访问发票链接；如果拿到的是订单/发票落地页，再找"可打印摘要"链接。
//! PDF 直接保存，HTML 原样保存并标记为需要人工打印。不做重试。

use crate::error::{ScrapeError, ScrapeResult};
use crate::infrastructure::Transport;
use crate::models::{AuthenticatedContext, InvoiceContent, InvoiceResource};
use crate::services::html::{closest, element_text, resolve_link, selector};
use reqwest::Url;
use scraper::Html;
use tracing::{debug, info, warn};

/// 弹出层中的链接
const POPOVER_LINK_SELECTORS: &[&str] = &[".a-popover-content a", "[data-action=\"a-popover\"] a"];

type LinkStrategy = fn(&Html, &Url) -> Option<Url>;

/// 可打印摘要链接的查找策略，按顺序尝试
const PRINTABLE_STRATEGIES: [LinkStrategy; 3] = [popover_link, print_form_action, print_anchor];

/// (a) 弹出层中提到 print / summary / invoice 的链接
fn popover_link(doc: &Html, base: &Url) -> Option<Url> {
    POPOVER_LINK_SELECTORS.iter().find_map(|css| {
        let sel = selector(css)?;
        doc.select(&sel).find_map(|a| {
            let text = element_text(a).to_lowercase();
            if ["print", "summary", "invoice"].iter().any(|k| text.contains(k)) {
                resolve_link(base, a.value().attr("href")?)
            } else {
                None
            }
        })
    })
}

/// (b) 提交按钮文字包含 "print" 的表单的 action
fn print_form_action(doc: &Html, base: &Url) -> Option<Url> {
    let sel = selector("input[type=\"submit\"], button")?;
    doc.select(&sel)
        .filter(|control| {
            let label = match control.value().name() {
                "input" => control.value().attr("value").unwrap_or_default().to_string(),
                _ => element_text(*control),
            };
            label.to_lowercase().contains("print")
        })
        .find_map(|control| {
            let form = closest(control, "form")?;
            resolve_link(base, form.value().attr("action")?)
        })
}

/// (c) 文字同时包含 print 和 summary/invoice，或地址包含 print-summary 的链接
fn print_anchor(doc: &Html, base: &Url) -> Option<Url> {
    let sel = selector("a[href]")?;
    doc.select(&sel).find_map(|a| {
        let href = a.value().attr("href")?;
        let text = element_text(a).to_lowercase();
        let by_text = text.contains("print") && (text.contains("summary") || text.contains("invoice"));
        if by_text || href.to_lowercase().contains("print-summary") {
            resolve_link(base, href)
        } else {
            None
        }
    })
}

/// 在落地页上查找可打印摘要链接
pub fn find_printable_link(html: &str, base: &Url) -> Option<Url> {
    let doc = Html::parse_document(html);
    PRINTABLE_STRATEGIES.iter().find_map(|strategy| strategy(&doc, base))
}

/// 发票获取服务
#[derive(Debug, Default)]
pub struct InvoiceFetcher;

impl InvoiceFetcher {
    pub fn new() -> Self {
        Self
    }

    /// 把发票链接解析为发票资源
    pub async fn resolve<T: Transport>(
        &self,
        ctx: &AuthenticatedContext<T>,
        locator: &str,
    ) -> ScrapeResult<InvoiceResource> {
        let url = resolve_link(ctx.base_url(), locator).ok_or_else(|| ScrapeError::InvalidUrl {
            url: locator.to_string(),
        })?;

        let landing = ctx.transport().get(&url).await?.ensure_success()?;
        if landing.is_pdf() {
            debug!("发票链接直接返回 PDF: {}", url);
            return Ok(InvoiceResource::new(url, InvoiceContent::Pdf(landing.body)));
        }

        let landing_html = landing.text();
        match find_printable_link(&landing_html, ctx.base_url()) {
            Some(printable) if printable != url => {
                info!("📄 找到可打印摘要: {}", printable);
                let document = ctx.transport().get(&printable).await?.ensure_success()?;
                let content = if document.is_pdf() {
                    InvoiceContent::Pdf(document.body)
                } else {
                    InvoiceContent::Html(document.text())
                };
                Ok(InvoiceResource::new(printable, content))
            }
            _ if is_print_page(&url) => {
                debug!("发票链接本身就是打印页面: {}", url);
                Ok(InvoiceResource::new(url, InvoiceContent::Html(landing_html)))
            }
            _ => {
                let reason = ScrapeError::link_not_found("可打印摘要").to_string();
                warn!("⚠️ {}: {}", reason, url);
                Ok(InvoiceResource::new(url, InvoiceContent::Unresolved(reason)))
            }
        }
    }
}

fn is_print_page(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    path.contains("print") || url.query().is_some_and(|q| q.to_lowercase().contains("print"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.amazon.com").unwrap()
    }

    #[test]
    fn test_popover_link_has_priority() {
        let html = r#"
            <a href="/gp/print-summary?id=3">Print summary</a>
            <div class="a-popover-content">
                <a href="/gp/help/contact">Help</a>
                <a href="/gp/css/summary/print.html?orderID=1">Printable Order Summary</a>
            </div>"#;
        assert_eq!(
            find_printable_link(html, &base()).unwrap().as_str(),
            "https://www.amazon.com/gp/css/summary/print.html?orderID=1"
        );
    }

    #[test]
    fn test_print_button_form_action() {
        let html = r#"
            <form action="/gp/css/summary/print.html" method="get">
                <input type="hidden" name="orderID" value="1">
                <input type="submit" value="Print this page for your records">
            </form>"#;
        assert_eq!(
            find_printable_link(html, &base()).unwrap().as_str(),
            "https://www.amazon.com/gp/css/summary/print.html"
        );

        let html = r#"<form action="/invoice/print"><button type="submit"><span>Print</span></button></form>"#;
        assert_eq!(
            find_printable_link(html, &base()).unwrap().as_str(),
            "https://www.amazon.com/invoice/print"
        );
    }

    #[test]
    fn test_anchor_rules() {
        let html = r#"<a href="/x">Print</a><a href="/y">Print invoice</a>"#;
        assert_eq!(find_printable_link(html, &base()).unwrap().as_str(), "https://www.amazon.com/y");

        let html = r#"<a href="/orders/print-summary/1">Download</a>"#;
        assert_eq!(
            find_printable_link(html, &base()).unwrap().as_str(),
            "https://www.amazon.com/orders/print-summary/1"
        );

        assert!(find_printable_link(r#"<a href="/x">Print</a>"#, &base()).is_none());
    }

    #[test]
    fn test_is_print_page() {
        assert!(is_print_page(&Url::parse("https://www.amazon.com/gp/css/summary/print.html").unwrap()));
        assert!(is_print_page(&Url::parse("https://www.amazon.com/x?view=print").unwrap()));
        assert!(!is_print_page(&Url::parse("https://www.amazon.com/gp/your-account/order-details").unwrap()));
    }
}
