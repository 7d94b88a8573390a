use anyhow::Context;
use futures_util::future::{BoxFuture, FutureExt};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

pub const RESET_SUBJECT: &str = "Seams Password Reset";

/// Delivers password reset codes.
pub trait Mailer: Send + Sync {
    fn send_reset_code(&self, to: &str, name: &str, code: &str) -> BoxFuture<'static, anyhow::Result<()>>;
}

pub fn reset_body(name: &str, code: &str) -> String {
    format!(
        "Dear {name}, We received a request from you to reset your password to the Seams platform. \
         You may reset your password by entering the following security code: {code}"
    )
}

/// SMTP over TLS, e.g. a mail provider's submission relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, user: &str, password: &str, from: &str) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .with_context(|| format!("invalid SMTP relay {host}"))?
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .build();
        let from = from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid sender address {from}"))?;
        Ok(Self { transport, from })
    }
}

impl Mailer for SmtpMailer {
    fn send_reset_code(&self, to: &str, name: &str, code: &str) -> BoxFuture<'static, anyhow::Result<()>> {
        let message = to
            .parse::<Mailbox>()
            .context("invalid recipient address")
            .and_then(|to| {
                Message::builder()
                    .from(self.from.clone())
                    .to(to)
                    .subject(RESET_SUBJECT)
                    .header(ContentType::TEXT_PLAIN)
                    .body(reset_body(name, code))
                    .context("failed to build reset email")
            });
        let transport = self.transport.clone();

        async move {
            transport.send(message?).await.context("SMTP send failed")?;
            Ok(())
        }
        .boxed()
    }
}

/// Used when no SMTP relay is configured: the code only reaches the log.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_reset_code(&self, to: &str, _name: &str, code: &str) -> BoxFuture<'static, anyhow::Result<()>> {
        warn!("No SMTP relay configured");
        info!("Password reset code for {}: {}", to, code);
        futures_util::future::ready(Ok(())).boxed()
    }
}
