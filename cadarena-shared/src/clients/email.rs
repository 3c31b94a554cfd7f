use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Outbound email backends. The set is closed and chosen once at
/// construction from configuration; `Console` logs the message instead of
/// sending and is the backend behind disabled-email environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    Resend,
    Console,
}

impl std::str::FromStr for EmailProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "resend" => Ok(EmailProvider::Resend),
            "console" => Ok(EmailProvider::Console),
            _ => Err(format!("unknown email provider: {s}")),
        }
    }
}

#[derive(Clone)]
pub struct EmailClient {
    provider: EmailProvider,
    client: Client,
    api_key: String,
    from_email: String,
    from_name: String,
    frontend_url: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

impl EmailClient {
    pub fn new(
        provider: EmailProvider,
        api_key: &str,
        from_email: &str,
        from_name: &str,
        frontend_url: &str,
    ) -> Self {
        Self {
            provider,
            client: Client::new(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), String> {
        match self.provider {
            EmailProvider::Console => {
                tracing::info!(to = %to, subject = %subject, "email delivery disabled, logging instead");
                tracing::debug!(body = %html, "email body");
                Ok(())
            }
            EmailProvider::Resend => {
                let request = ResendRequest {
                    from: format!("{} <{}>", self.from_name, self.from_email),
                    to: vec![to.to_string()],
                    subject: subject.to_string(),
                    html: html.to_string(),
                };

                let response = self.client
                    .post("https://api.resend.com/emails")
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| format!("email send failed: {e}"))?;

                if !response.status().is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(format!("email API error: {body}"));
                }

                tracing::debug!(to = %to, subject = %subject, "email sent");
                Ok(())
            }
        }
    }

    pub async fn send_verification_email(
        &self,
        to: &str,
        username: &str,
        token: &str,
    ) -> Result<(), String> {
        let link = format!("{}/verify-email?token={token}", self.frontend_url);
        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
            <h2 style="color: #2563eb;">CadArena - Verify your email</h2>
            <p>Hi {username}, welcome to CadArena. Confirm your email address to activate your account:</p>
            <p style="text-align: center; margin: 24px 0;"><a href="{link}" style="background: #2563eb; color: #ffffff; padding: 12px 24px; border-radius: 8px; text-decoration: none; font-weight: bold;">Verify email</a></p>
            <p style="color: #666;">Or paste this link into your browser:<br>{link}</p>
            <p style="color: #666; margin-top: 20px;">This link expires in 24 hours. If you did not sign up, please ignore this email.</p>
            </div>"#
        );

        self.send_email(to, "CadArena - Verify your email", &html).await
    }

    pub async fn send_password_reset_email(
        &self,
        to: &str,
        username: &str,
        token: &str,
    ) -> Result<(), String> {
        let link = format!("{}/reset-password?token={token}", self.frontend_url);
        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
            <h2 style="color: #2563eb;">CadArena - Password reset</h2>
            <p>Hi {username}, a password reset was requested for your account:</p>
            <p style="text-align: center; margin: 24px 0;"><a href="{link}" style="background: #2563eb; color: #ffffff; padding: 12px 24px; border-radius: 8px; text-decoration: none; font-weight: bold;">Reset password</a></p>
            <p style="color: #666;">Or paste this link into your browser:<br>{link}</p>
            <p style="color: #666; margin-top: 20px;">This link expires in 1 hour. If you did not request this, please ignore this email.</p>
            </div>"#
        );

        self.send_email(to, "CadArena - Reset your password", &html).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_from_config_strings() {
        assert_eq!("resend".parse::<EmailProvider>().unwrap(), EmailProvider::Resend);
        assert_eq!("Console".parse::<EmailProvider>().unwrap(), EmailProvider::Console);
        assert!("smtp".parse::<EmailProvider>().is_err());
    }

    #[tokio::test]
    async fn console_provider_never_fails() {
        let client = EmailClient::new(
            EmailProvider::Console,
            "",
            "noreply@cadarena.com",
            "CadArena",
            "http://localhost:3000/",
        );
        client
            .send_verification_email("alice@example.com", "alice", "tok123")
            .await
            .unwrap();
        client
            .send_password_reset_email("alice@example.com", "alice", "tok456")
            .await
            .unwrap();
    }
}
