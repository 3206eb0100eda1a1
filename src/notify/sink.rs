use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use crate::listings::Listing;
use crate::notify::render;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn notify_new(&self, listings: &[Listing]) -> Result<()>;
    async fn notify_error(&self, message: &str) -> Result<()>;
}

pub struct StdoutSink;

#[async_trait]
impl NotifySink for StdoutSink {
    async fn notify_new(&self, listings: &[Listing]) -> Result<()> {
        println!("{}", render::new_listings_subject(listings));
        for listing in listings {
            println!(
                "  {} - ${} ({})",
                listing.address,
                render::format_price(listing.price),
                listing.zipcode
            );
        }
        Ok(())
    }

    async fn notify_error(&self, message: &str) -> Result<()> {
        println!("[error] {message}");
        Ok(())
    }
}

/// Email delivery through the Resend REST API.
pub struct ResendSink {
    client: Client,
    api_key: String,
    from_email: String,
    to_email: String,
}

impl ResendSink {
    pub fn new(
        api_key: impl Into<String>,
        from_email: impl Into<String>,
        to_email: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .user_agent("listing-radar/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build email HTTP client");
        Self {
            client,
            api_key: api_key.into(),
            from_email: from_email.into(),
            to_email: to_email.into(),
        }
    }

    async fn send_email(&self, subject: &str, html: &str) -> Result<()> {
        self.client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from_email,
                "to": [self.to_email],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?
            .error_for_status()?;
        info!("email sent to {}: {subject}", self.to_email);
        Ok(())
    }
}

#[async_trait]
impl NotifySink for ResendSink {
    async fn notify_new(&self, listings: &[Listing]) -> Result<()> {
        if listings.is_empty() {
            return Ok(());
        }
        let subject = render::new_listings_subject(listings);
        let html = render::new_listings_html(listings);
        self.send_email(&subject, &html).await
    }

    async fn notify_error(&self, message: &str) -> Result<()> {
        self.send_email(&render::error_subject(), &render::error_html(message))
            .await
    }
}
