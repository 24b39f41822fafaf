use serde::{Deserialize, Serialize};

/// 字段缺失时的占位值
pub const UNKNOWN: &str = "Unknown";

/// 订单记录
///
/// 每个订单容器生成一条，创建后不再修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// 订单号（已规范化，可直接用于文件名）
    pub id: String,
    /// 下单日期，保留站点原格式
    pub date: String,
    /// 订单金额，保留站点原格式
    pub total: String,
    /// 商品名称
    pub items: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub invoice_url: Option<String>,
}

impl OrderRecord {
    /// 订单号是否有效
    pub fn has_known_id(&self) -> bool {
        self.id != UNKNOWN
    }
}
