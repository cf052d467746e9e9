use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// メモ生成（LLM呼び出し）用のレートリミッター設定
pub struct GenerationRateLimiter {
    // ユーザーごとのレート制限（1時間に10回まで）
    per_user: Arc<RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>>,
}

impl GenerationRateLimiter {
    pub fn new() -> Self {
        // LLMのクォータ消費を抑えるための制限
        let user_quota = Quota::per_hour(NonZeroU32::new(10).unwrap());
        let per_user = Arc::new(RateLimiter::dashmap(user_quota));

        Self { per_user }
    }

    /// Check user-based rate limit for memo generation
    pub fn check_user_limit(&self, user_id: &str) -> Result<(), String> {
        match self.per_user.check_key(&user_id.to_string()) {
            Ok(_) => Ok(()),
            Err(negative) => {
                let wait_time = negative.wait_time_from(DefaultClock::default().now());
                let minutes = wait_time.as_secs() / 60;
                let seconds = wait_time.as_secs() % 60;

                let time_msg = if minutes > 0 {
                    format!("{}m {}s", minutes, seconds)
                } else {
                    format!("{}s", seconds)
                };

                Err(format!(
                    "Memo generation limit reached. Please try again in {}.",
                    time_msg
                ))
            }
        }
    }
}

impl Default for GenerationRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
