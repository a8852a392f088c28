//! Telegram Bot API transport.
//!
//! Plain HTTPS calls through reqwest: `sendMessage` for text, `sendPhoto` for
//! a single image and `sendMediaGroup` for albums of 2 to 10 images. A
//! `429 Too Many Requests` answer is honoured once by sleeping for the
//! advertised `retry_after`.

use super::{ChatId, Messenger};
use crate::error::{Error, Result};
use crate::utils::truncate_for_log;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
    result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

pub struct TelegramBot {
    client: reqwest::Client,
    /// `{api_url}/bot{token}`; never logged.
    base_url: String,
}

impl TelegramBot {
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(Error::Config("TELEGRAM_BOT_TOKEN is empty".into()));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token.trim()),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    /// Check the credential with `getMe` and return the bot's username.
    #[instrument(level = "info", skip(self))]
    pub async fn verify(&self) -> Result<String> {
        let result = self
            .call("getMe", || Ok(self.client.get(self.method_url("getMe"))))
            .await
            .map_err(|e| Error::Config(format!("Telegram credential rejected: {e}")))?;
        Ok(result
            .get("username")
            .and_then(|u| u.as_str())
            .unwrap_or_default()
            .to_string())
    }

    /// Send a request built by `build`, retrying once on rate limiting.
    async fn call<F>(&self, method: &str, build: F) -> Result<serde_json::Value>
    where
        F: Fn() -> Result<reqwest::RequestBuilder>,
    {
        let mut retried = false;
        loop {
            let resp = build()?
                .send()
                .await
                .map_err(|e| Error::Delivery(format!("{method}: {}", e.without_url())))?;
            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(|e| Error::Delivery(format!("{method}: {}", e.without_url())))?;
            let parsed: ApiResponse = serde_json::from_str(&body).map_err(|e| {
                Error::Delivery(format!(
                    "{method}: unreadable response ({status}): {e}: {}",
                    truncate_for_log(&body, 200)
                ))
            })?;

            if parsed.ok {
                debug!(method, "Telegram call succeeded");
                return Ok(parsed.result.unwrap_or_default());
            }

            let retry_after = parsed.parameters.and_then(|p| p.retry_after);
            if let (Some(secs), false) = (retry_after, retried) {
                warn!(method, retry_after = secs, "Rate limited by Telegram; waiting");
                sleep(Duration::from_secs(secs)).await;
                retried = true;
                continue;
            }

            return Err(Error::Delivery(format!(
                "{method} ({status}): {}",
                parsed.description.unwrap_or_else(|| "no description".into())
            )));
        }
    }
}

async fn read_photos(photos: &[PathBuf]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut out = Vec::with_capacity(photos.len());
    for path in photos {
        let bytes = fs::read(path).await.map_err(|e| Error::io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo.png".to_string());
        out.push((name, bytes));
    }
    Ok(out)
}

fn media_group_payload(count: usize) -> serde_json::Value {
    let items: Vec<_> = (0..count)
        .map(|i| json!({ "type": "photo", "media": format!("attach://photo{i}") }))
        .collect();
    serde_json::Value::Array(items)
}

impl Messenger for TelegramBot {
    #[instrument(level = "info", skip(self, text), fields(chars = text.chars().count()))]
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let payload = json!({ "chat_id": chat_id, "text": text });
        self.call("sendMessage", || {
            Ok(self.client.post(self.method_url("sendMessage")).json(&payload))
        })
        .await?;
        Ok(())
    }

    #[instrument(level = "info", skip(self, photos), fields(count = photos.len()))]
    async fn send_photos(&self, chat_id: ChatId, photos: &[PathBuf]) -> Result<()> {
        let files = read_photos(photos).await?;
        match files.len() {
            0 => Ok(()),
            1 => {
                self.call("sendPhoto", || {
                    let (name, bytes) = &files[0];
                    let form = Form::new()
                        .text("chat_id", chat_id.to_string())
                        .part("photo", Part::bytes(bytes.clone()).file_name(name.clone()));
                    Ok(self.client.post(self.method_url("sendPhoto")).multipart(form))
                })
                .await?;
                Ok(())
            }
            n => {
                let media = media_group_payload(n).to_string();
                self.call("sendMediaGroup", || {
                    let mut form = Form::new()
                        .text("chat_id", chat_id.to_string())
                        .text("media", media.clone());
                    for (i, (name, bytes)) in files.iter().enumerate() {
                        form = form.part(
                            format!("photo{i}"),
                            Part::bytes(bytes.clone()).file_name(name.clone()),
                        );
                    }
                    Ok(self
                        .client
                        .post(self.method_url("sendMediaGroup"))
                        .multipart(form))
                })
                .await?;
                Ok(())
            }
        }
    }
}
