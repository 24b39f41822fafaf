use anyhow::{bail, Result};
use invoice_fetcher::utils::logging;
use invoice_fetcher::{App, AuthStatus, Config, Credentials};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(config.verbose_logging);

    let Some(credentials) = Credentials::from_env() else {
        bail!("缺少登录凭据，请设置环境变量 INVOICE_EMAIL 和 INVOICE_PASSWORD");
    };

    // 初始化应用并登录
    let mut app = App::initialize(config)?;
    let mut session = app.login(&credentials).await?;

    if session.status == AuthStatus::AwaitingSecondFactor {
        let code = prompt_one_time_code().await?;
        session = app.resume(session, &code).await?;
    }

    if let AuthStatus::Failed(reason) = &session.status {
        error!("❌ 登录失败: {}", reason);
        bail!("登录失败: {}", reason);
    }

    let stats = app.run(session).await?;
    info!(
        "完成: 提取 {} 个订单，下载 {} 个 PDF，保存 {} 个 HTML，跳过 {} 个",
        stats.extracted, stats.downloaded, stats.saved_html, stats.skipped
    );
    info!("📁 发票保存在: {}", app.download_dir().display());

    Ok(())
}

/// 从标准输入读取一次性验证码
async fn prompt_one_time_code() -> Result<String> {
    info!("📱 请输入设备上收到的验证码:");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let code = line.trim().to_string();
    if code.is_empty() {
        bail!("没有输入验证码");
    }
    Ok(code)
}
