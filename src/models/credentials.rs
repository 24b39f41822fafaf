use std::fmt;

/// 登录凭据
///
/// 只在一次认证过程中存在，不写盘，`Debug` 输出不包含密码和验证码。
#[derive(Clone)]
pub struct Credentials {
    /// 邮箱或用户名
    pub identifier: String,
    /// 密码
    pub secret: String,
    /// 一次性验证码
    pub one_time_code: Option<String>,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
            one_time_code: None,
        }
    }

    pub fn with_one_time_code(mut self, code: impl Into<String>) -> Self {
        self.one_time_code = Some(code.into());
        self
    }

    /// 从环境变量读取凭据，缺少账号或密码时返回 None
    pub fn from_env() -> Option<Self> {
        let identifier = std::env::var("INVOICE_EMAIL").ok()?;
        let secret = std::env::var("INVOICE_PASSWORD").ok()?;
        if identifier.trim().is_empty() || secret.is_empty() {
            return None;
        }

        let one_time_code = std::env::var("INVOICE_OTP")
            .ok()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Some(Self {
            identifier: identifier.trim().to_string(),
            secret,
            one_time_code,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"***")
            .field("one_time_code", &self.one_time_code.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new("me@example.com", "hunter2").with_one_time_code("123456");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("me@example.com"));
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("123456"));
    }
}
