use async_trait::async_trait;
use lettre::{
    Message, SmtpTransport, Transport,
    message::header::{ContentType, Header, HeaderName, HeaderValue},
};
use lettre::transport::smtp::authentication::Credentials;

use crate::config::EmailConfig;
use crate::error::{AppError, Result};
use crate::repositories::Event;
use crate::services::email_templates;

/// イベントIDを運ぶカスタムヘッダー（配信ログとの突き合わせ用メタデータ）
#[derive(Debug, Clone)]
struct XLearnLockEvent(String);

impl Header for XLearnLockEvent {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-LearnLock-Event")
    }

    fn parse(s: &str) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// メール種別（reminder / memo）を運ぶカスタムヘッダー
#[derive(Debug, Clone)]
struct XLearnLockKind(String);

impl Header for XLearnLockKind {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-LearnLock-Kind")
    }

    fn parse(s: &str) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// 通知メールの送信口。テストでは記録用のフェイクに差し替える
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_event_reminder(&self, to_email: &str, event: &Event) -> Result<()>;
    async fn send_memo_ready(&self, to_email: &str, event: &Event, memo_content: &str)
        -> Result<()>;
}

pub struct EmailService {
    smtp_transport: SmtpTransport,
    from_email: String,
    from_name: String,
    base_url: String,
}

impl EmailService {
    /// Configから初期化
    pub fn from_config(config: &EmailConfig, base_url: &str) -> Result<Self> {
        let credentials = Credentials::new(
            config.smtp_username.to_string(),
            config.smtp_password.to_string(),
        );

        let smtp_transport = SmtpTransport::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::ConfigError(format!("SMTP接続エラー: {}", e)))?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            smtp_transport,
            from_email: config.from_email.to_string(),
            from_name: config.from_name.to_string(),
            base_url: base_url.to_string(),
        })
    }

    /// メール送信（内部メソッド）
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        event_id: &str,
        kind: &str,
    ) -> Result<()> {
        let email = Message::builder()
            .from(
                format!("{} <{}>", self.from_name, self.from_email)
                    .parse()
                    .map_err(|e| AppError::ValidationError(format!("送信元アドレスが無効: {}", e)))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| AppError::ValidationError(format!("送信先アドレスが無効: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .header(XLearnLockEvent(event_id.to_string()))
            .header(XLearnLockKind(kind.to_string()))
            .body(html_body.to_string())
            .map_err(|e| AppError::ValidationError(format!("メール作成エラー: {}", e)))?;

        // 同期トランスポートなので別スレッドで送信する
        let transport = self.smtp_transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("メール送信タスクエラー: {}", e)))?
            .map_err(|e| AppError::ExternalServiceError(format!("メール送信エラー: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl EmailSender for EmailService {
    /// イベントリマインダーを送信
    async fn send_event_reminder(&self, to_email: &str, event: &Event) -> Result<()> {
        let subject = format!("Upcoming Event: {}", event.title);
        let body = email_templates::event_reminder_template(event, &self.base_url);

        self.send_email(to_email, &subject, &body, &event.id, "reminder")
            .await
    }

    /// 生成済みメモを送信
    async fn send_memo_ready(
        &self,
        to_email: &str,
        event: &Event,
        memo_content: &str,
    ) -> Result<()> {
        let subject = format!("Your Memo is Ready: {}", event.title);
        let body = email_templates::memo_ready_template(event, memo_content);

        self.send_email(to_email, &subject, &body, &event.id, "memo")
            .await
    }
}
