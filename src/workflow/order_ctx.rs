//! 订单处理上下文
//!
//! 封装"我正在处理第几个订单、订单号是什么"这一信息

use crate::models::OrderRecord;
use std::fmt::Display;

/// 订单处理上下文
#[derive(Debug, Clone)]
pub struct OrderCtx {
    /// 订单序号（从 1 开始，仅用于日志和兜底文件名）
    pub order_index: usize,

    /// 订单号
    pub order_id: String,

    known_id: bool,
}

impl OrderCtx {
    pub fn new(order_index: usize, order: &OrderRecord) -> Self {
        Self {
            order_index,
            order_id: order.id.clone(),
            known_id: order.has_known_id(),
        }
    }

    /// 发票文件名主体；订单号未知时用序号
    pub fn file_stem(&self) -> String {
        if self.known_id {
            self.order_id.clone()
        } else {
            format!("Order-{}", self.order_index)
        }
    }
}

impl Display for OrderCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[订单 {} #{}]", self.order_index, self.order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNKNOWN;

    fn order(id: &str) -> OrderRecord {
        OrderRecord {
            id: id.to_string(),
            date: UNKNOWN.to_string(),
            total: UNKNOWN.to_string(),
            items: vec![UNKNOWN.to_string()],
            details_url: None,
            invoice_url: None,
        }
    }

    #[test]
    fn test_file_stem_falls_back_to_index() {
        assert_eq!(OrderCtx::new(3, &order("111-222")).file_stem(), "111-222");
        assert_eq!(OrderCtx::new(3, &order(UNKNOWN)).file_stem(), "Order-3");
    }
}
