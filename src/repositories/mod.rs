pub mod book;
pub mod event;
pub mod memo;
pub mod preferences;
pub mod share;
pub mod user;

pub use book::{Book, BookCreateRequest, BookRepository, BookUpdateRequest, MongoBookRepository};
pub use event::{
    Event, EventContext, EventCreateRequest, EventRepository, EventType, EventUpdateRequest,
    MemoPreferences, MongoEventRepository,
};
pub use memo::{Memo, MemoFormat, MemoRepository, MemoStatus, MongoMemoRepository};
pub use preferences::{
    MongoPreferencesRepository, PreferencesRepository, ReminderTypes, UserPreferences,
};
pub use share::{MongoShareRepository, ShareMethod, ShareRepository, SharedMemo};
pub use user::{
    AuthRepository, RevocationHandler, UserCreateRequest, UserHandler, UserLoginRequest,
    UserResponse, UserUpdateRequest,
};

/// Option<DateTime<Utc>> をBSON datetimeとして読み書きするためのヘルパー
/// （bsonのchrono_datetime_as_bson_datetimeにはOption版がないため）
pub(crate) mod optional_chrono_datetime_as_bson_datetime {
    use bson::DateTime as BsonDateTime;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(BsonDateTime::from_chrono).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<BsonDateTime>::deserialize(deserializer)?.map(|dt| dt.to_chrono()))
    }
}
