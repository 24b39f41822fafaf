//! HTML 选择辅助函数
//!
//! 所有"按优先级依次尝试选择器"的逻辑都基于这里的函数：按顺序尝试，第一个
//! 有结果的选择器胜出，不合并多个选择器的结果。

use reqwest::Url;
use scraper::{ElementRef, Selector};
use tracing::debug;

/// 解析 CSS 选择器，非法选择器记录日志并返回 None
pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!("非法选择器 '{}': {:?}", css, e);
            None
        }
    }
}

/// 元素可见文本，空白折叠为单个空格
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 依次尝试选择器列表，返回第一个有匹配的选择器的全部匹配元素
pub fn select_first_list<'a>(root: ElementRef<'a>, selectors: &[&str]) -> Vec<ElementRef<'a>> {
    for css in selectors {
        let Some(sel) = selector(css) else { continue };
        let found: Vec<_> = root.select(&sel).collect();
        if !found.is_empty() {
            debug!("选择器 '{}' 匹配 {} 个元素", css, found.len());
            return found;
        }
    }
    Vec::new()
}

/// 依次尝试选择器列表，返回第一个非空文本
pub fn select_first_text(root: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let sel = selector(css)?;
        root.select(&sel)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

/// 依次尝试选择器列表，返回第一个能产出非空文本的选择器的全部文本
pub fn select_all_texts(root: ElementRef<'_>, selectors: &[&str]) -> Vec<String> {
    for css in selectors {
        let Some(sel) = selector(css) else { continue };
        let texts: Vec<String> = root
            .select(&sel)
            .map(element_text)
            .filter(|text| !text.is_empty())
            .collect();
        if !texts.is_empty() {
            return texts;
        }
    }
    Vec::new()
}

/// 把链接解析为绝对地址；锚点和 javascript: 链接不算链接
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    base.join(href).ok()
}

/// 最近的祖先元素中第一个指定标签
pub fn closest<'a>(el: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == tag)
}
