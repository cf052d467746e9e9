use crate::repositories::Event;

/// イベントリマインダーメールのHTML本文
pub fn event_reminder_template(event: &Event, base_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>Event Reminder: {title}</title>
    <style>
      body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
      .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
      .header {{ background: #f8f9fa; padding: 20px; border-radius: 5px; }}
      .content {{ margin: 20px 0; }}
      .button {{
        display: inline-block;
        padding: 10px 20px;
        background: #007bff;
        color: white;
        text-decoration: none;
        border-radius: 5px;
      }}
    </style>
  </head>
  <body>
    <div class="container">
      <div class="header">
        <h1>Event Reminder</h1>
        <p>Your event is coming up soon!</p>
      </div>
      <div class="content">
        <h2>{title}</h2>
        <p>Date: {date}</p>
        <h3>Event Goals:</h3>
        <p>{goals}</p>
        <p>Your memo will be generated {send_time} hours before the event.</p>
      </div>
      <div>
        <a href="{base_url}/events/{event_id}" class="button">
          View Event Details
        </a>
      </div>
    </div>
  </body>
</html>"#,
        title = event.title,
        date = event.date.format("%Y-%m-%d %H:%M UTC"),
        goals = event.context.goals,
        send_time = event.memo_preferences.send_time,
        base_url = base_url,
        event_id = event.id,
    )
}

/// メモ完成メールのHTML本文
pub fn memo_ready_template(event: &Event, memo_content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>Your Memo is Ready: {title}</title>
    <style>
      body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
      .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
      .header {{ background: #f8f9fa; padding: 20px; border-radius: 5px; }}
      .content {{ margin: 20px 0; }}
      .memo {{ background: #fff; padding: 20px; border: 1px solid #ddd; border-radius: 5px; }}
    </style>
  </head>
  <body>
    <div class="container">
      <div class="header">
        <h1>Your Memo is Ready</h1>
        <p>We've prepared your memo for the upcoming event.</p>
      </div>
      <div class="content">
        <h2>{title}</h2>
        <p>Date: {date}</p>
        <div class="memo">
          {memo_content}
        </div>
      </div>
    </div>
  </body>
</html>"#,
        title = event.title,
        date = event.date.format("%Y-%m-%d %H:%M UTC"),
        memo_content = memo_content,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{EventContext, EventType, MemoFormat, MemoPreferences};
    use chrono::Utc;

    fn sample_event() -> Event {
        Event {
            id: "event-1".to_string(),
            user_id: "user-1".to_string(),
            title: "Board presentation".to_string(),
            event_type: EventType::Presentation,
            date: Utc::now(),
            book_ids: vec!["book-1".to_string()],
            context: EventContext {
                goals: "Tell the growth story".to_string(),
                attendees: None,
                location: None,
            },
            memo_preferences: MemoPreferences {
                format: MemoFormat::Narrative,
                send_time: 12,
            },
            notification_sent: false,
            notification_sent_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn reminder_template_links_to_event() {
        let html = event_reminder_template(&sample_event(), "https://learnlock.app");
        assert!(html.contains("Board presentation"));
        assert!(html.contains("Tell the growth story"));
        assert!(html.contains("12 hours before"));
        assert!(html.contains("https://learnlock.app/events/event-1"));
    }

    #[test]
    fn memo_ready_template_embeds_content() {
        let html = memo_ready_template(&sample_event(), "<ul><li>Lead with numbers</li></ul>");
        assert!(html.contains("Your Memo is Ready"));
        assert!(html.contains("<li>Lead with numbers</li>"));
    }
}
