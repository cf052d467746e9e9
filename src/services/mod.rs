pub mod ai_service;
pub mod auth_service;
pub mod book_service;
pub mod email_service;
pub mod email_templates;
pub mod event_service;
pub mod memo_service;
pub mod preferences_service;
pub mod push_service;
pub mod rate_limiter;
pub mod reminder_service;
pub mod share_service;

#[cfg(test)]
pub mod test_support;

pub use ai_service::{AiClient, GeminiClient};
pub use auth_service::AuthService;
pub use book_service::BookService;
pub use email_service::{EmailSender, EmailService};
pub use event_service::EventService;
pub use memo_service::{MemoService, MemoWithStatus};
pub use preferences_service::{PreferencesService, PreferencesUpdateRequest};
pub use push_service::{FcmPushService, PushSender};
pub use rate_limiter::GenerationRateLimiter;
pub use reminder_service::{ReminderService, spawn_sweep_task};
pub use share_service::{PublicSharedMemo, ShareOptions, ShareResponse, ShareService};
