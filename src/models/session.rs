//! 认证会话
//!
//! `AuthSession` 是协商的结果；二次验证暂停时，`PendingChallenge` 就是可恢复的
//! 协商状态，由调用方带回 `AuthNegotiator::resume`。

use crate::error::{ScrapeError, ScrapeResult};
use crate::infrastructure::Transport;
use reqwest::Url;

/// 能识别的会话 Cookie 名称（美国站和各地区站）
static SESSION_COOKIE_NAMES: phf::Set<&'static str> = phf::phf_set! {
    "session-id",
    "session-token",
    "ubid-main",
    "at-main",
    "sess-at-main",
    "x-main",
    "ubid-acbuk",
    "at-acbuk",
    "sess-at-acbuk",
    "x-acbuk",
    "ubid-acbde",
    "at-acbde",
    "sess-at-acbde",
    "x-acbde",
    "ubid-acbca",
    "at-acbca",
    "sess-at-acbca",
    "x-acbca",
    "ubid-acbjp",
    "at-acbjp",
    "sess-at-acbjp",
    "x-acbjp",
};

/// 会话 Cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// 是否是已知的会话 Cookie
    pub fn is_session_cookie(&self) -> bool {
        SESSION_COOKIE_NAMES.contains(self.name.as_str())
    }
}

/// 认证状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Unauthenticated,
    AwaitingSecondFactor,
    Authenticated,
    Failed(String),
}

/// 等待验证码时保留的协商进度
#[derive(Debug, Clone)]
pub struct PendingChallenge {
    /// 验证码页面的地址
    pub page_url: Url,
    /// 验证码页面的 HTML
    pub page_html: String,
    /// 已提交的账号
    pub identifier: String,
}

/// 认证会话
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub status: AuthStatus,
    pub cookies: Vec<SessionCookie>,
    pub pending: Option<PendingChallenge>,
}

impl AuthSession {
    pub fn unauthenticated() -> Self {
        Self {
            status: AuthStatus::Unauthenticated,
            cookies: Vec::new(),
            pending: None,
        }
    }

    pub fn authenticated(cookies: Vec<SessionCookie>) -> Self {
        Self {
            status: AuthStatus::Authenticated,
            cookies,
            pending: None,
        }
    }

    pub fn failed(reason: impl Into<String>, cookies: Vec<SessionCookie>) -> Self {
        Self {
            status: AuthStatus::Failed(reason.into()),
            cookies,
            pending: None,
        }
    }

    pub fn awaiting_second_factor(pending: PendingChallenge, cookies: Vec<SessionCookie>) -> Self {
        Self {
            status: AuthStatus::AwaitingSecondFactor,
            cookies,
            pending: Some(pending),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }

    /// 是否持有任意一个已知的会话 Cookie
    pub fn has_session_cookie(&self) -> bool {
        self.cookies.iter().any(SessionCookie::is_session_cookie)
    }

    /// 转换为已认证上下文；只有 Authenticated 状态可以转换
    pub fn authorize<T: Transport>(
        self,
        transport: T,
        base_url: Url,
    ) -> ScrapeResult<AuthenticatedContext<T>> {
        match &self.status {
            AuthStatus::Authenticated => Ok(AuthenticatedContext {
                transport,
                session: self,
                base_url,
            }),
            AuthStatus::AwaitingSecondFactor => Err(ScrapeError::SecondFactorRequired),
            AuthStatus::Failed(reason) => Err(ScrapeError::AuthenticationFailed {
                reason: reason.clone(),
            }),
            AuthStatus::Unauthenticated => Err(ScrapeError::AuthenticationFailed {
                reason: "尚未登录".to_string(),
            }),
        }
    }
}

/// 已认证的请求上下文
///
/// 订单提取（网络部分）、发票获取和订单流程只接受这个类型。
pub struct AuthenticatedContext<T: Transport> {
    transport: T,
    session: AuthSession,
    base_url: Url,
}

impl<T: Transport> AuthenticatedContext<T> {
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// 站点根地址
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}
