use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::repositories::{Book, Event, MemoFormat};

/// ホスト型LLMの呼び出し口。プロンプト1つを渡してテキスト1つを受け取る
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(AppError::ConfigError("GEMINI_API_KEY is not set".to_string()));
        }

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "contents": [{
                    "parts": [{ "text": prompt }]
                }]
            }))
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("Failed to send request: {}", e)))?;

        // ステータスコードチェック
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalServiceError(format!(
                "Gemini API error in memo generation: status={}, body={}",
                status, error_text
            )));
        }

        // レスポンス解析
        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("Failed to parse response: {}", e)))?;

        let content = response_json["candidates"]
            .get(0)
            .and_then(|c| c["content"]["parts"].get(0))
            .and_then(|p| p["text"].as_str())
            .map(|s| s.trim().to_string());

        content.ok_or_else(|| {
            AppError::ExternalServiceError("Gemini API returned no candidates".to_string())
        })
    }
}

/// イベント文脈と参照書籍のノートを埋め込んだメモ生成プロンプトを構築する
pub fn build_memo_prompt(event: &Event, books: &[Book], format: MemoFormat) -> String {
    let mut event_context = format!(
        "Event: {}\nType: {}\nGoals: {}",
        event.title,
        event.event_type.as_str(),
        event.context.goals
    );
    if let Some(attendees) = &event.context.attendees {
        event_context.push_str(&format!("\nAttendees: {}", attendees.join(", ")));
    }
    if let Some(location) = &event.context.location {
        event_context.push_str(&format!("\nLocation: {}", location));
    }

    let book_notes: Vec<String> = books
        .iter()
        .map(|book| {
            format!(
                "Book: {} by {}\nNotes: {}",
                book.title, book.author, book.user_notes
            )
        })
        .collect();

    let format_hint = match format {
        MemoFormat::Bullet => "\n4. Use clear bullet points for easy scanning",
        MemoFormat::Framework => "\n4. Structure the response using a clear framework or model",
        MemoFormat::Narrative => "",
    };

    format!(
        "As an AI assistant, help create a memo for an upcoming event using insights from books.\n\n\
        Event Context:\n{}\n\n\
        Relevant Book Notes:\n{}\n\n\
        Please create a {} format memo that:\n\
        1. Identifies key principles from the books that are relevant to the event\n\
        2. Provides actionable insights for the specific context\n\
        3. Includes specific examples or quotes where relevant{}\n\n\
        Keep the memo concise and focused on practical application.",
        event_context,
        book_notes.join("\n\n"),
        format.as_str(),
        format_hint
    )
}
