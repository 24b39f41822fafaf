//! 订单提取 - 业务能力层
//!
//! 从订单列表页提取订单记录和发票链接。每个字段有自己的选择器优先级列表，
//! 某个容器解析失败只记录诊断信息，不影响其他容器。

use crate::error::ScrapeError;
use crate::infrastructure::{PageResponse, Transport};
use crate::models::{AuthenticatedContext, OrderRecord, UNKNOWN};
use crate::services::login_verifier::is_signin_path;
use crate::services::html::{element_text, resolve_link, select_all_texts, select_first_list, select_first_text, selector};
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// 默认提取上限
pub const DEFAULT_MAX_ORDERS: usize = 10;

/// 订单容器
const CONTAINER_SELECTORS: &[&str] = &[".order", ".js-order-card", ".order-card", "[data-test-id=\"order-card\"]"];

/// 订单号
const ORDER_ID_SELECTORS: &[&str] = &[
    ".yohtmlc-order-id .value",
    ".order-id",
    ".yo-orderid",
    "[data-test-id=\"order-id-container\"]",
    ".order-info .value",
];

/// 下单日期
const ORDER_DATE_SELECTORS: &[&str] = &[
    ".order-date",
    "[data-test-id=\"order-date\"]",
    ".order-info .a-span3 .value",
    ".order-header .a-span3 .value",
];

/// 订单金额
const ORDER_TOTAL_SELECTORS: &[&str] = &[
    ".order-total",
    "[data-test-id=\"order-total\"]",
    ".yohtmlc-order-total .value",
    ".order-info .a-span2 .value",
    ".order-header .a-span2 .value",
];

/// 商品名称
const ITEM_SELECTORS: &[&str] = &[
    ".yohtmlc-product-title",
    ".product-title",
    ".yohtmlc-item a.a-link-normal",
    ".item-name",
];

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static ORDER_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)order\s*#").expect("valid regex"));
static ORDER_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{3}-\d{7}-\d{7}\b").expect("valid regex"));

/// 提取诊断信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractDiagnostic {
    /// 没有任何容器选择器匹配
    LayoutNotRecognized,
    /// 某个容器被跳过
    ContainerSkipped { index: usize, reason: String },
    /// 订单详情页获取失败
    DetailsFetchFailed { order_id: String, reason: String },
}

impl std::fmt::Display for ExtractDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractDiagnostic::LayoutNotRecognized => {
                write!(f, "页面布局无法识别，找不到任何订单（页面结构可能已变化）")
            }
            ExtractDiagnostic::ContainerSkipped { index, reason } => {
                write!(f, "跳过第 {} 个订单容器: {}", index + 1, reason)
            }
            ExtractDiagnostic::DetailsFetchFailed { order_id, reason } => {
                write!(f, "订单 {} 的详情页获取失败: {}", order_id, reason)
            }
        }
    }
}

/// 提取结果
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub orders: Vec<OrderRecord>,
    pub diagnostics: Vec<ExtractDiagnostic>,
}

impl Extraction {
    /// 页面布局是否被识别
    pub fn layout_recognized(&self) -> bool {
        !self.diagnostics.contains(&ExtractDiagnostic::LayoutNotRecognized)
    }
}

/// 单个容器的扫描结果，详情页跳转完成后才生成 `OrderRecord`
#[derive(Debug)]
struct ContainerScan {
    id: Option<String>,
    date: Option<String>,
    total: Option<String>,
    items: Vec<String>,
    details_url: Option<Url>,
    invoice_url: Option<Url>,
}

impl ContainerScan {
    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.date.is_none()
            && self.total.is_none()
            && self.items.is_empty()
            && self.details_url.is_none()
            && self.invoice_url.is_none()
    }

    fn into_record(self) -> OrderRecord {
        let or_unknown = |v: Option<String>| v.unwrap_or_else(|| UNKNOWN.to_string());
        OrderRecord {
            id: or_unknown(self.id),
            date: or_unknown(self.date),
            total: or_unknown(self.total),
            items: if self.items.is_empty() {
                vec![UNKNOWN.to_string()]
            } else {
                self.items
            },
            details_url: self.details_url.map(String::from),
            invoice_url: self.invoice_url.map(String::from),
        }
    }
}

/// 订单提取器
pub struct OrderExtractor {
    base_url: Url,
    max_orders: usize,
}

impl OrderExtractor {
    pub fn new(base_url: Url, max_orders: usize) -> Self {
        Self { base_url, max_orders }
    }

    /// 只解析页面，不做任何请求
    pub fn extract(&self, html: &str) -> Extraction {
        let (scans, diagnostics) = self.scan(html);
        Extraction {
            orders: scans.into_iter().map(ContainerScan::into_record).collect(),
            diagnostics,
        }
    }

    /// 解析页面；没有直接发票链接但有详情链接的订单，再访问一次详情页查找
    ///
    /// 只跳一层，详情页上的详情链接不再跟随。
    pub async fn extract_and_follow<T: Transport>(
        &self,
        ctx: &AuthenticatedContext<T>,
        html: &str,
    ) -> Extraction {
        let (mut scans, mut diagnostics) = self.scan(html);

        for scan in scans.iter_mut().filter(|s| s.invoice_url.is_none()) {
            let Some(details_url) = scan.details_url.clone() else { continue };
            let order_id = scan.id.clone().unwrap_or_else(|| UNKNOWN.to_string());
            debug!("订单 {} 无直接发票链接，访问详情页 {}", order_id, details_url);

            let fetched = ctx
                .transport()
                .get(&details_url)
                .await
                .and_then(PageResponse::ensure_success)
                .and_then(|page| {
                    if is_signin_path(&page.url) {
                        Err(ScrapeError::AuthenticationFailed {
                            reason: format!("详情页被重定向到登录页: {}", page.url),
                        })
                    } else {
                        Ok(page)
                    }
                });

            match fetched {
                Ok(page) => {
                    let doc = Html::parse_document(&page.text());
                    scan.invoice_url = find_invoice_link(doc.root_element(), &self.base_url);
                    if scan.invoice_url.is_none() {
                        debug!("订单 {} 的详情页上也没有发票链接", order_id);
                    }
                }
                Err(e) => {
                    warn!("订单 {} 详情页获取失败: {}", order_id, e);
                    diagnostics.push(ExtractDiagnostic::DetailsFetchFailed {
                        order_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Extraction {
            orders: scans.into_iter().map(ContainerScan::into_record).collect(),
            diagnostics,
        }
    }

    fn scan(&self, html: &str) -> (Vec<ContainerScan>, Vec<ExtractDiagnostic>) {
        let doc = Html::parse_document(html);
        let containers = select_first_list(doc.root_element(), CONTAINER_SELECTORS);
        let mut diagnostics = Vec::new();

        if containers.is_empty() {
            warn!("⚠️ 页面上找不到任何订单容器，页面布局可能已变化");
            diagnostics.push(ExtractDiagnostic::LayoutNotRecognized);
            return (Vec::new(), diagnostics);
        }

        info!(
            "找到 {} 个订单容器，处理前 {} 个",
            containers.len(),
            containers.len().min(self.max_orders)
        );

        let mut scans = Vec::new();
        for (index, container) in containers.into_iter().take(self.max_orders).enumerate() {
            let scan = self.scan_container(container);
            if scan.is_empty() {
                let diagnostic = ExtractDiagnostic::ContainerSkipped {
                    index,
                    reason: "容器中没有可识别的内容".to_string(),
                };
                warn!("{}", diagnostic);
                diagnostics.push(diagnostic);
                continue;
            }
            scans.push(scan);
        }

        (scans, diagnostics)
    }

    fn scan_container(&self, container: ElementRef<'_>) -> ContainerScan {
        ContainerScan {
            id: order_id_of(container),
            date: select_first_text(container, ORDER_DATE_SELECTORS),
            total: select_first_text(container, ORDER_TOTAL_SELECTORS),
            items: select_all_texts(container, ITEM_SELECTORS),
            details_url: find_details_link(container, &self.base_url),
            invoice_url: find_invoice_link(container, &self.base_url),
        }
    }
}

/// 订单号：先按选择器，再在容器文本中找标准格式的订单号
fn order_id_of(container: ElementRef<'_>) -> Option<String> {
    let strategies: [fn(ElementRef<'_>) -> Option<String>; 2] = [
        |c| select_first_text(c, ORDER_ID_SELECTORS),
        |c| ORDER_NUMBER.find(&element_text(c)).map(|m| m.as_str().to_string()),
    ];
    strategies
        .iter()
        .find_map(|strategy| strategy(container))
        .map(|raw| normalize_order_id(&raw))
        .filter(|id| !id.is_empty())
}

/// 规范化订单号：去掉 "Order #" 前缀，空白折叠为单个连字符，去掉文件名中不安全的字符
pub fn normalize_order_id(raw: &str) -> String {
    let stripped = ORDER_PREFIX.replace_all(raw, "");
    let hyphenated = WHITESPACE.replace_all(stripped.trim(), "-");
    hyphenated
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect()
}

fn anchors<'a>(root: ElementRef<'a>) -> impl Iterator<Item = (ElementRef<'a>, &'a str)> {
    let sel = selector("a[href]");
    sel.into_iter()
        .flat_map(move |sel| root.select(&sel).collect::<Vec<_>>())
        .filter_map(|a| a.value().attr("href").map(|href| (a, href)))
}

/// 发票/收据链接：文字或地址包含 "invoice" 或 "receipt"
pub fn find_invoice_link(root: ElementRef<'_>, base: &Url) -> Option<Url> {
    anchors(root)
        .filter(|(a, href)| {
            let text = element_text(*a).to_lowercase();
            let href = href.to_lowercase();
            ["invoice", "receipt"]
                .iter()
                .any(|k| text.contains(k) || href.contains(k))
        })
        .find_map(|(_, href)| resolve_link(base, href))
}

/// 订单详情链接
pub fn find_details_link(root: ElementRef<'_>, base: &Url) -> Option<Url> {
    anchors(root)
        .filter(|(a, href)| {
            let text = element_text(*a).to_lowercase();
            href.to_lowercase().contains("order-details")
                || text.contains("order details")
                || text.contains("view order")
        })
        .find_map(|(_, href)| resolve_link(base, href))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(max: usize) -> OrderExtractor {
        OrderExtractor::new(Url::parse("https://www.amazon.com").unwrap(), max)
    }

    fn order_card(id: &str) -> String {
        format!(
            r#"<div class="order">
                <div class="order-info">
                    <span class="order-date">March 3, 2024</span>
                    <span class="order-total">$42.10</span>
                    <span class="yohtmlc-order-id"><span class="value">Order # {id}</span></span>
                </div>
                <a class="yohtmlc-product-title" href="/dp/B01">USB cable</a>
                <a class="yohtmlc-product-title" href="/dp/B02">Desk lamp</a>
                <a href="/gp/your-account/order-details?orderID={id}">View order details</a>
                <a href="/gp/css/summary/print.html?orderID={id}">Invoice</a>
            </div>"#
        )
    }

    #[test]
    fn test_normalize_order_id() {
        assert_eq!(normalize_order_id("Order # 123 456"), "123-456");
        assert_eq!(normalize_order_id("  ORDER #  111-2223334-5556667 "), "111-2223334-5556667");
        assert_eq!(normalize_order_id("a/b  c"), "a-b-c");
    }

    #[test]
    fn test_no_containers_is_layout_diagnostic_not_error() {
        let extraction = extractor(10).extract("<html><body><div class='nothing'>Hi</div></body></html>");
        assert!(extraction.orders.is_empty());
        assert_eq!(extraction.diagnostics, vec![ExtractDiagnostic::LayoutNotRecognized]);
        assert!(!extraction.layout_recognized());
    }

    #[test]
    fn test_cap_limits_processed_containers() {
        let html: String = (0..12).map(|i| order_card(&format!("111-{:07}-0000000", i))).collect();
        assert_eq!(extractor(10).extract(&html).orders.len(), 10);
        assert_eq!(extractor(5).extract(&html).orders.len(), 5);
        assert_eq!(extractor(20).extract(&html).orders.len(), 12);
    }

    #[test]
    fn test_fields_and_links() {
        let extraction = extractor(10).extract(&order_card("111-2223334-5556667"));
        assert!(extraction.layout_recognized());
        let order = &extraction.orders[0];
        assert_eq!(order.id, "111-2223334-5556667");
        assert_eq!(order.date, "March 3, 2024");
        assert_eq!(order.total, "$42.10");
        assert_eq!(order.items, vec!["USB cable", "Desk lamp"]);
        assert_eq!(
            order.details_url.as_deref(),
            Some("https://www.amazon.com/gp/your-account/order-details?orderID=111-2223334-5556667")
        );
        assert_eq!(
            order.invoice_url.as_deref(),
            Some("https://www.amazon.com/gp/css/summary/print.html?orderID=111-2223334-5556667")
        );
    }

    #[test]
    fn test_missing_fields_become_unknown() {
        let html = r#"<div class="order-card"><a href="/gp/help/receipt?id=9">Get receipt</a></div>"#;
        let order = &extractor(10).extract(html).orders[0];
        assert_eq!(order.id, UNKNOWN);
        assert_eq!(order.date, UNKNOWN);
        assert_eq!(order.total, UNKNOWN);
        assert_eq!(order.items, vec![UNKNOWN]);
        assert_eq!(order.invoice_url.as_deref(), Some("https://www.amazon.com/gp/help/receipt?id=9"));
    }

    #[test]
    fn test_empty_container_skipped_others_kept() {
        let html = format!(
            r#"<div class="order"></div>{}"#,
            order_card("111-0000000-0000001")
        );
        let extraction = extractor(10).extract(&html);
        assert_eq!(extraction.orders.len(), 1);
        assert_eq!(extraction.orders[0].id, "111-0000000-0000001");
        assert!(matches!(
            extraction.diagnostics.as_slice(),
            [ExtractDiagnostic::ContainerSkipped { index: 0, .. }]
        ));
    }

    #[test]
    fn test_order_number_found_in_text_without_selector() {
        let html = r#"<div class="js-order-card"><span>ORDER # 114-1234567-7654321</span></div>"#;
        let order = &extractor(10).extract(html).orders[0];
        assert_eq!(order.id, "114-1234567-7654321");
    }
}
