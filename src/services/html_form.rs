//! 表单发现与填写
//!
//! 发现顺序：已知的表单 id/name → 含有指定类型输入框的第一个表单 → 页面上第一个表单。
//! 第一个命中即停止。

use crate::services::html::{element_text, selector};
use reqwest::Url;
use scraper::{ElementRef, Html};

/// 表单字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
    /// 输入框类型（小写），textarea 和 select 记为标签名
    pub kind: String,
    pub id: Option<String>,
}

/// 解析出的表单
#[derive(Debug, Clone)]
pub struct HtmlForm {
    pub id: Option<String>,
    pub name: Option<String>,
    pub action: Option<String>,
    pub method: String,
    pub fields: Vec<FormField>,
}

/// 表单发现条件
#[derive(Debug, Clone, Copy)]
pub struct FormQuery {
    /// 已知的表单 id 或 name，按优先级排列
    pub known_ids: &'static [&'static str],
    /// 能说明表单用途的输入框类型
    pub field_kinds: &'static [&'static str],
    /// 能说明表单用途的输入框 name
    pub field_names: &'static [&'static str],
}

impl HtmlForm {
    fn from_element(form: ElementRef<'_>) -> Self {
        let attr = |name: &str| form.value().attr(name).map(str::to_string);
        let mut fields = Vec::new();

        if let Some(sel) = selector("input, textarea, select") {
            for control in form.select(&sel) {
                let Some(name) = control.value().attr("name") else { continue };
                // 浏览器不会提交禁用的控件
                if control.value().attr("disabled").is_some() {
                    continue;
                }

                let tag = control.value().name();
                let kind = match tag {
                    "textarea" | "select" => tag.to_string(),
                    _ => control.value().attr("type").unwrap_or("text").to_ascii_lowercase(),
                };

                if matches!(kind.as_str(), "submit" | "button" | "image" | "reset" | "file") {
                    continue;
                }
                if matches!(kind.as_str(), "checkbox" | "radio") && control.value().attr("checked").is_none() {
                    continue;
                }

                let value = match kind.as_str() {
                    "textarea" => element_text(control),
                    "select" => {
                        let Some(value) = selected_option(control) else { continue };
                        value
                    }
                    _ => control.value().attr("value").unwrap_or_default().to_string(),
                };

                fields.push(FormField {
                    name: name.to_string(),
                    value,
                    kind,
                    id: control.value().attr("id").map(str::to_string),
                });
            }
        }

        Self {
            id: attr("id"),
            name: attr("name"),
            action: attr("action"),
            method: attr("method").unwrap_or_else(|| "get".to_string()).to_ascii_lowercase(),
            fields,
        }
    }

    /// 第一个指定类型字段的 name
    pub fn field_name_by_kind(&self, kind: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.kind == kind)
            .map(|f| f.name.as_str())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// 覆盖同名字段的值，没有则追加
    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.value = value.to_string(),
            None => self.fields.push(FormField {
                name: name.to_string(),
                value: value.to_string(),
                kind: "text".to_string(),
                id: None,
            }),
        }
    }

    /// 提交用的键值对，保持页面上的顺序
    pub fn submission(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect()
    }

    /// 提交地址：相对地址基于站点根地址解析，缺省时提交回当前页面
    pub fn action_url(&self, base: &Url, page_url: &Url) -> Option<Url> {
        match self.action.as_deref().map(str::trim) {
            None | Some("") => Some(page_url.clone()),
            Some(action) => base.join(action).ok(),
        }
    }

    fn matches_query(&self, query: &FormQuery) -> bool {
        self.fields.iter().any(|f| {
            query.field_kinds.contains(&f.kind.as_str()) || query.field_names.contains(&f.name.as_str())
        })
    }
}

/// 下拉框的提交值：带 selected 的选项，否则第一个选项；没有选项时不提交
fn selected_option(select: ElementRef<'_>) -> Option<String> {
    let sel = selector("option")?;
    let options: Vec<_> = select.select(&sel).collect();
    let option = options
        .iter()
        .find(|o| o.value().attr("selected").is_some())
        .or_else(|| options.first())?;
    Some(
        option
            .value()
            .attr("value")
            .map(str::to_string)
            .unwrap_or_else(|| element_text(*option)),
    )
}

type FormStrategy = fn(&[HtmlForm], &FormQuery) -> Option<usize>;

/// 发现策略，按顺序尝试
const FORM_STRATEGIES: [FormStrategy; 3] = [by_known_id, by_field_kind, first_form];

fn by_known_id(forms: &[HtmlForm], query: &FormQuery) -> Option<usize> {
    query.known_ids.iter().find_map(|known| {
        forms.iter().position(|f| {
            f.id.as_deref() == Some(*known) || f.name.as_deref() == Some(*known)
        })
    })
}

fn by_field_kind(forms: &[HtmlForm], query: &FormQuery) -> Option<usize> {
    forms.iter().position(|f| f.matches_query(query))
}

fn first_form(forms: &[HtmlForm], _query: &FormQuery) -> Option<usize> {
    (!forms.is_empty()).then_some(0)
}

/// 解析页面上的全部表单
pub fn parse_forms(html: &str) -> Vec<HtmlForm> {
    let doc = Html::parse_document(html);
    let Some(sel) = selector("form") else {
        return Vec::new();
    };
    doc.select(&sel).map(HtmlForm::from_element).collect()
}

/// 按发现策略找到表单
pub fn discover_form(html: &str, query: &FormQuery) -> Option<HtmlForm> {
    let mut forms = parse_forms(html);
    let index = FORM_STRATEGIES.iter().find_map(|strategy| strategy(&forms, query))?;
    Some(forms.swap_remove(index))
}
