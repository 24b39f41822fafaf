//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责资源管理和流程调度，是整个系统的"指挥中心"。
//!
//! ### `batch_processor` - 订单批量处理器
//! - 管理应用生命周期（初始化、登录、运行）
//! - 管理请求通道和浏览器资源
//! - 导出订单，逐个委托 `OrderFlow` 下载发票
//! - 输出全局统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<OrderRecord>)
//!     ↓
//! workflow::OrderFlow (处理单个订单)
//!     ↓
//! services (能力层：认证 / 提取 / 发票 / 导出)
//!     ↓
//! infrastructure (基础设施：Transport)
//! ```

pub mod batch_processor;

pub use batch_processor::{App, RunStats};
