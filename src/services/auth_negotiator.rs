//! 认证协商 - 业务能力层
//!
//! 账号 → 密码 → （可选）一次性验证码，逐步提交抓取到的表单。
//! 不做任何自动重试：每次失败都是终态，由调用方修正输入后重新调用。

use crate::config::Config;
use crate::error::{AuthStep, ScrapeError, ScrapeResult};
use crate::infrastructure::{PageResponse, Transport};
use crate::models::{AuthSession, AuthStatus, Credentials, PendingChallenge};
use crate::services::html_form::{discover_form, FormQuery, HtmlForm};
use reqwest::Url;
use tracing::{debug, info, warn};

/// 账号表单
const IDENTIFIER_FORM: FormQuery = FormQuery {
    known_ids: &["signIn", "ap_login_form", "ap-signin-form", "login-form"],
    field_kinds: &["email", "password"],
    field_names: &["email", "ap_email", "username", "login"],
};

/// 密码表单
const SECRET_FORM: FormQuery = FormQuery {
    known_ids: &["signIn", "ap_login_form", "ap-signin-form", "login-form"],
    field_kinds: &["password"],
    field_names: &["password", "ap_password"],
};

/// 验证码表单
const SECOND_FACTOR_FORM: FormQuery = FormQuery {
    known_ids: &["auth-mfa-form", "verification-code-form", "cvf-form", "auth-cvf-form"],
    field_kinds: &["tel", "number"],
    field_names: &["otpCode", "code", "cvf_verification_code"],
};

/// 验证码可能使用的字段名，全部提交一遍
const SECOND_FACTOR_FIELD_NAMES: &[&str] = &["otpCode", "code", "cvf_verification_code"];

/// 账号字段的候选 name
const IDENTIFIER_FIELD_NAMES: &[&str] = &["email", "ap_email", "username", "login"];

/// 登录失败的页面标记（小写匹配）
const ERROR_MARKERS: &[&str] = &[
    "auth-error-message-box",
    "your password is incorrect",
    "we cannot find an account with that email address",
    "there was a problem",
];

/// 需要一次性验证码的页面标记（小写匹配）
const SECOND_FACTOR_MARKERS: &[&str] = &[
    "auth-mfa-otpcode",
    "cvf-input-code",
    "two-step verification",
    "two-factor",
    "verification code",
    "one-time password",
];

/// 认证协商器
pub struct AuthNegotiator {
    base_url: Url,
    signin_url: Url,
}

impl AuthNegotiator {
    pub fn new(base_url: Url, signin_url: Url) -> Self {
        Self {
            base_url,
            signin_url,
        }
    }

    pub fn from_config(config: &Config) -> ScrapeResult<Self> {
        let parse = |url: &str| {
            Url::parse(url).map_err(|_| ScrapeError::InvalidUrl {
                url: url.to_string(),
            })
        };
        Ok(Self::new(parse(&config.base_url)?, parse(&config.signin_url)?))
    }

    /// 完整协商：账号 → 密码 → 验证码
    ///
    /// 需要验证码但没有提供时返回 `AwaitingSecondFactor`，调用方保留同一个
    /// 请求通道，拿到验证码后调用 [`AuthNegotiator::resume`]。
    pub async fn negotiate<T: Transport>(
        &self,
        transport: &T,
        credentials: &Credentials,
    ) -> ScrapeResult<AuthSession> {
        info!("🔐 开始登录: {}", credentials.identifier);

        // ========== 步骤 1: 提交账号 ==========
        let signin_page = transport.get(&self.signin_url).await?;
        let mut form = discover_form(&signin_page.text(), &IDENTIFIER_FORM)
            .ok_or(ScrapeError::FormNotFound {
                step: AuthStep::Identifier,
            })?;

        let identifier_field = identifier_field_name(&form).ok_or_else(|| ScrapeError::FieldNotFound {
            step: AuthStep::Identifier,
            field: "email".to_string(),
        })?;
        form.set(&identifier_field, &credentials.identifier);

        // 账号和密码在同一个表单时一次提交
        let combined = form.field_name_by_kind("password").map(str::to_string);
        if let Some(secret_field) = &combined {
            debug!("账号和密码在同一表单中，合并提交");
            form.set(secret_field, &credentials.secret);
        }

        let response = self.submit(transport, &form, &signin_page, AuthStep::Identifier).await?;
        if let Some(marker) = find_marker(&response, ERROR_MARKERS) {
            return Ok(self.rejected(transport, marker).await);
        }

        // ========== 步骤 2: 提交密码 ==========
        let response = if combined.is_some() {
            response
        } else {
            let mut form = discover_form(&response.text(), &SECRET_FORM).ok_or(ScrapeError::FormNotFound {
                step: AuthStep::Secret,
            })?;
            let secret_field = secret_field_name(&form).ok_or_else(|| ScrapeError::FieldNotFound {
                step: AuthStep::Secret,
                field: "password".to_string(),
            })?;
            form.set(&secret_field, &credentials.secret);

            let response = self.submit(transport, &form, &response, AuthStep::Secret).await?;
            if let Some(marker) = find_marker(&response, ERROR_MARKERS) {
                return Ok(self.rejected(transport, marker).await);
            }
            response
        };

        // ========== 步骤 3: 二次验证 ==========
        if find_marker(&response, SECOND_FACTOR_MARKERS).is_some() {
            let Some(code) = credentials.one_time_code.as_deref() else {
                info!("📱 需要一次性验证码，等待输入");
                let pending = PendingChallenge {
                    page_url: response.url.clone(),
                    page_html: response.text(),
                    identifier: credentials.identifier.clone(),
                };
                let cookies = transport.session_cookies(&self.base_url).await?;
                return Ok(AuthSession::awaiting_second_factor(pending, cookies));
            };
            return self.submit_second_factor(transport, &response, code).await;
        }

        self.judge(transport, &response).await
    }

    /// 用验证码继续一个暂停的协商，不重复账号和密码步骤
    pub async fn resume<T: Transport>(
        &self,
        transport: &T,
        session: AuthSession,
        code: &str,
    ) -> ScrapeResult<AuthSession> {
        if session.status != AuthStatus::AwaitingSecondFactor {
            debug!("会话不在等待验证码状态: {:?}", session.status);
            return Ok(session);
        }
        let Some(pending) = session.pending else {
            return Err(ScrapeError::SecondFactorRequired);
        };

        info!("🔐 继续登录: {}", pending.identifier);
        let challenge = PageResponse {
            url: pending.page_url,
            status: 200,
            content_type: "text/html".to_string(),
            body: pending.page_html.into_bytes(),
        };
        self.submit_second_factor(transport, &challenge, code).await
    }

    async fn submit_second_factor<T: Transport>(
        &self,
        transport: &T,
        challenge: &PageResponse,
        code: &str,
    ) -> ScrapeResult<AuthSession> {
        let mut form = discover_form(&challenge.text(), &SECOND_FACTOR_FORM).ok_or(ScrapeError::FormNotFound {
            step: AuthStep::SecondFactor,
        })?;

        // 真实字段名无法静态确定，所有候选字段都填写验证码
        let mut names: Vec<String> = form
            .fields
            .iter()
            .filter(|f| matches!(f.kind.as_str(), "tel" | "number"))
            .map(|f| f.name.clone())
            .collect();
        names.extend(SECOND_FACTOR_FIELD_NAMES.iter().map(|n| n.to_string()));
        for name in &names {
            form.set(name, code);
        }

        let response = self.submit(transport, &form, challenge, AuthStep::SecondFactor).await?;
        if let Some(marker) = find_marker(&response, ERROR_MARKERS) {
            return Ok(self.rejected(transport, marker).await);
        }
        if find_marker(&response, SECOND_FACTOR_MARKERS).is_some() {
            return Ok(self.rejected(transport, "验证码被拒绝").await);
        }

        self.judge(transport, &response).await
    }

    async fn submit<T: Transport>(
        &self,
        transport: &T,
        form: &HtmlForm,
        page: &PageResponse,
        step: AuthStep,
    ) -> ScrapeResult<PageResponse> {
        let action = form
            .action_url(&self.base_url, &page.url)
            .ok_or(ScrapeError::FormNotFound { step })?;
        debug!("[{}] 提交 {} 个字段到 {}", step, form.fields.len(), action);

        let response = transport.post_form(&action, &form.submission()).await?;
        transport.settle().await;
        Ok(response)
    }

    /// 最终判定：没有错误标记且没有被送回登录页即为已登录
    async fn judge<T: Transport>(&self, transport: &T, response: &PageResponse) -> ScrapeResult<AuthSession> {
        if let Some(marker) = find_marker(response, ERROR_MARKERS) {
            return Ok(self.rejected(transport, marker).await);
        }
        if self.is_signin_url(&response.url) {
            return Ok(self.rejected(transport, "仍停留在登录页").await);
        }

        let cookies = transport.session_cookies(&self.base_url).await?;
        let session = AuthSession::authenticated(cookies);
        if !session.has_session_cookie() {
            warn!("⚠️ 登录成功但未发现已知的会话 Cookie");
        }
        info!("✓ 登录成功");
        Ok(session)
    }

    async fn rejected<T: Transport>(&self, transport: &T, reason: &str) -> AuthSession {
        warn!("❌ 认证被拒绝: {}", reason);
        let cookies = transport.session_cookies(&self.base_url).await.unwrap_or_default();
        AuthSession::failed(reason, cookies)
    }

    /// 只比较路径；登录成功后的回跳地址的查询串里也可能带有 signin
    fn is_signin_url(&self, url: &Url) -> bool {
        same_path(url, &self.signin_url)
    }
}

fn identifier_field_name(form: &HtmlForm) -> Option<String> {
    form.field_name_by_kind("email")
        .or_else(|| IDENTIFIER_FIELD_NAMES.iter().copied().find(|n| form.has_field(n)))
        .or_else(|| form.field_name_by_kind("text"))
        .map(str::to_string)
}

fn secret_field_name(form: &HtmlForm) -> Option<String> {
    form.field_name_by_kind("password")
        .or_else(|| SECRET_FORM.field_names.iter().copied().find(|n| form.has_field(n)))
        .map(str::to_string)
}

fn same_path(a: &Url, b: &Url) -> bool {
    let normalize = |url: &Url| url.path().trim_end_matches('/').to_ascii_lowercase();
    normalize(a) == normalize(b)
}

/// 响应中出现的第一个标记
fn find_marker(response: &PageResponse, markers: &[&'static str]) -> Option<&'static str> {
    let body = response.text().to_ascii_lowercase();
    markers.iter().copied().find(|m| body.contains(m))
}
