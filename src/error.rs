//! 错误类型
//!
//! 每个错误都说明是哪一步失败，并区分三类用户可见的情况：
//! 页面结构变了（找不到表单/链接）、认证被拒绝、需要二次验证。

use std::path::PathBuf;
use thiserror::Error;

/// 抓取流程的错误分类
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// 找不到表单
    #[error("[{step}] 找不到表单，页面结构可能已变化")]
    FormNotFound { step: AuthStep },

    /// 表单中找不到字段
    #[error("[{step}] 表单中找不到字段 '{field}'，页面结构可能已变化")]
    FieldNotFound { step: AuthStep, field: String },

    /// 认证被拒绝
    #[error("认证被拒绝，请检查账号和密码: {reason}")]
    AuthenticationFailed { reason: String },

    /// 需要二次验证码
    #[error("需要二次验证码，请提供设备上收到的验证码")]
    SecondFactorRequired,

    /// 订单列表页面无法识别
    #[error("无法识别订单页面布局，页面结构可能已变化")]
    LayoutNotRecognized,

    /// 找不到链接
    #[error("找不到{what}链接，页面结构可能已变化")]
    LinkNotFound { what: String },

    /// 请求失败
    #[error("请求 {url} 失败: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 响应状态码异常
    #[error("请求 {url} 返回状态码 {status}")]
    BadStatus { url: String, status: u16 },

    /// 文件读写失败
    #[error("文件操作失败 ({path:?}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 浏览器驱动错误
    #[error("浏览器错误: {source}")]
    Browser {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 无法解析的 URL
    #[error("无法解析 URL: {url}")]
    InvalidUrl { url: String },
}

/// 认证流程中的步骤，用于错误和日志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    /// 提交账号
    Identifier,
    /// 提交密码
    Secret,
    /// 提交验证码
    SecondFactor,
}

impl std::fmt::Display for AuthStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthStep::Identifier => write!(f, "账号提交"),
            AuthStep::Secret => write!(f, "密码提交"),
            AuthStep::SecondFactor => write!(f, "验证码提交"),
        }
    }
}

// ========== 便捷构造函数 ==========

impl ScrapeError {
    /// 创建请求失败错误
    pub fn fetch_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ScrapeError::FetchFailed {
            url: url.into(),
            source: Box::new(source),
        }
    }

    /// 创建文件操作错误
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScrapeError::Io {
            path: path.into(),
            source,
        }
    }

    /// 创建链接缺失错误
    pub fn link_not_found(what: impl Into<String>) -> Self {
        ScrapeError::LinkNotFound { what: what.into() }
    }
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ScrapeError::Browser {
            source: Box::new(err),
        }
    }
}

/// 抓取流程结果类型
pub type ScrapeResult<T> = Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_distinguish_failure_kinds() {
        let layout = ScrapeError::FormNotFound {
            step: AuthStep::Secret,
        }
        .to_string();
        assert!(layout.contains("密码提交"));
        assert!(layout.contains("页面结构可能已变化"));

        let rejected = ScrapeError::AuthenticationFailed {
            reason: "your password is incorrect".to_string(),
        }
        .to_string();
        assert!(rejected.contains("请检查账号和密码"));

        assert!(ScrapeError::SecondFactorRequired
            .to_string()
            .contains("二次验证码"));
    }
}
