use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::config::MailConfig;

pub const CODE_EMAIL_SUBJECT: &str = "Your access code - UserApp";

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;

    /// Sends the access-code email to `to`.
    async fn send_code(&self, to: &str, code: &str) -> anyhow::Result<()> {
        self.send(to, CODE_EMAIL_SUBJECT, &render_code_email(code))
            .await
    }
}

/// Builds the mailer matching the configuration: Resend when a key is set,
/// console otherwise.
pub fn from_config(cfg: &MailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    Ok(match &cfg.api_key {
        Some(key) => Arc::new(ResendMailer::new(&cfg.api_url, key, &cfg.from)?),
        None => Arc::new(ConsoleMailer),
    })
}

#[derive(Debug, Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

pub struct ResendMailer {
    client: Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(endpoint: &str, api_key: &str, from: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        let body = ResendEmail {
            from: &self.from,
            to: [to],
            subject,
            html,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("send request to resend")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("resend api error: status {}, response: {}", status, text);
        }
        info!(to, "email delivered");
        Ok(())
    }
}

/// Development stand-in that only logs what would have been sent.
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> anyhow::Result<()> {
        info!(to, subject, "simulated email (RESEND_API_KEY not set)");
        Ok(())
    }

    async fn send_code(&self, to: &str, code: &str) -> anyhow::Result<()> {
        info!(
            to,
            subject = CODE_EMAIL_SUBJECT,
            code,
            "simulated email (RESEND_API_KEY not set)"
        );
        Ok(())
    }
}

pub fn render_code_email(code: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Access code</title>
  <style>
    body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px; background-color: #f8f9fa; }}
    .card {{ background: white; border-radius: 12px; padding: 40px; box-shadow: 0 4px 6px rgba(0,0,0,0.1); text-align: center; }}
    .code {{ font-size: 36px; font-weight: 700; letter-spacing: 3px; color: white; padding: 30px; margin: 30px 0; border-radius: 12px; background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); }}
    .footer {{ color: #999; font-size: 12px; margin-top: 40px; border-top: 1px solid #eee; padding-top: 20px; }}
  </style>
</head>
<body>
  <div class="card">
    <h1 style="color: #667eea;">UserApp</h1>
    <h2>Welcome!</h2>
    <p>We received your registration. Here is your unique access code:</p>
    <div class="code">{code}</div>
    <p>Copy the code exactly, open the login page and paste it in the code field.</p>
    <p>This code is unique to your account. Do not share it with anyone.</p>
    <div class="footer">This is an automated message, please do not reply.</div>
  </div>
</body>
</html>
"#,
        code = escape_html(code),
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
