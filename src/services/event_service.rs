use std::sync::Arc;

use crate::clock::{Clock, IdGenerator};
use crate::error::{AppError, Result};
use crate::repositories::{Event, EventCreateRequest, EventRepository, EventUpdateRequest};

const MAX_TITLE_LENGTH: usize = 100;
const MAX_GOALS_LENGTH: usize = 500;
const MIN_SEND_TIME_HOURS: i64 = 1;
const MAX_SEND_TIME_HOURS: i64 = 48;

pub struct EventService {
    event_repo: Arc<dyn EventRepository>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl EventService {
    pub fn new(
        event_repo: Arc<dyn EventRepository>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            event_repo,
            clock,
            ids,
        }
    }

    /// 今後のイベントを開催日順で返す
    pub async fn find_upcoming(&self, user_id: &str) -> Result<Vec<Event>> {
        self.event_repo
            .find_upcoming_by_user(user_id, self.clock.now())
            .await
    }

    pub async fn find_by_id(&self, user_id: &str, event_id: &str) -> Result<Event> {
        self.event_repo
            .find_by_id(user_id, event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))
    }

    pub async fn create(&self, user_id: &str, req: EventCreateRequest) -> Result<Event> {
        let now = self.clock.now();

        validate_title(&req.title)?;
        validate_goals(&req.context.goals)?;
        // 開催日は未来でなければならない
        if req.date <= now {
            return Err(AppError::ValidationError(
                "Event date must be in the future".to_string(),
            ));
        }
        if req.book_ids.is_empty() {
            return Err(AppError::ValidationError(
                "Select at least one book".to_string(),
            ));
        }
        validate_send_time(req.memo_preferences.send_time)?;

        let event = Event {
            id: self.ids.document_id(),
            user_id: user_id.to_string(),
            title: req.title,
            event_type: req.event_type,
            date: req.date,
            book_ids: req.book_ids,
            context: req.context,
            memo_preferences: req.memo_preferences,
            notification_sent: false,
            notification_sent_at: None,
            created_at: now,
            updated_at: now,
        };

        self.event_repo.create(event).await
    }

    pub async fn update(
        &self,
        user_id: &str,
        event_id: &str,
        req: EventUpdateRequest,
    ) -> Result<Event> {
        let mut event = self.find_by_id(user_id, event_id).await?;

        if let Some(title) = req.title {
            validate_title(&title)?;
            event.title = title;
        }
        if let Some(event_type) = req.event_type {
            event.event_type = event_type;
        }
        if let Some(date) = req.date {
            if date <= self.clock.now() {
                return Err(AppError::ValidationError(
                    "Event date must be in the future".to_string(),
                ));
            }
            event.date = date;
        }
        if let Some(book_ids) = req.book_ids {
            if book_ids.is_empty() {
                return Err(AppError::ValidationError(
                    "Select at least one book".to_string(),
                ));
            }
            event.book_ids = book_ids;
        }
        if let Some(context) = req.context {
            validate_goals(&context.goals)?;
            event.context = context;
        }
        if let Some(memo_preferences) = req.memo_preferences {
            validate_send_time(memo_preferences.send_time)?;
            event.memo_preferences = memo_preferences;
        }
        event.updated_at = self.clock.now();

        self.event_repo.update(event).await
    }

    pub async fn delete(&self, user_id: &str, event_id: &str) -> Result<()> {
        // 存在確認
        self.find_by_id(user_id, event_id).await?;
        self.event_repo.delete(user_id, event_id).await
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::ValidationError("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(AppError::ValidationError(format!(
            "Title must be less than {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

fn validate_goals(goals: &str) -> Result<()> {
    if goals.trim().is_empty() {
        return Err(AppError::ValidationError("Goals are required".to_string()));
    }
    if goals.chars().count() > MAX_GOALS_LENGTH {
        return Err(AppError::ValidationError(format!(
            "Goals must be less than {} characters",
            MAX_GOALS_LENGTH
        )));
    }
    Ok(())
}

fn validate_send_time(send_time: i64) -> Result<()> {
    if !(MIN_SEND_TIME_HOURS..=MAX_SEND_TIME_HOURS).contains(&send_time) {
        return Err(AppError::ValidationError(format!(
            "Send time must be between {} and {} hours before the event",
            MIN_SEND_TIME_HOURS, MAX_SEND_TIME_HOURS
        )));
    }
    Ok(())
}
