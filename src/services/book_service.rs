use std::sync::Arc;

use crate::clock::{Clock, IdGenerator};
use crate::error::{AppError, Result};
use crate::repositories::{
    Book, BookCreateRequest, BookRepository, BookUpdateRequest, UserHandler,
};

const MAX_TAGS: usize = 5;
const MAX_TAG_LENGTH: usize = 20;
const MAX_TITLE_LENGTH: usize = 100;
const MAX_NOTES_LENGTH: usize = 2000;

/// 契約プランごとの登録可能冊数。Noneは無制限
fn book_limit(tier: &str) -> Option<u64> {
    match tier {
        "premium" => None,
        _ => Some(1), // free
    }
}

pub struct BookService {
    book_repo: Arc<dyn BookRepository>,
    users: Arc<dyn UserHandler>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl BookService {
    pub fn new(
        book_repo: Arc<dyn BookRepository>,
        users: Arc<dyn UserHandler>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            book_repo,
            users,
            clock,
            ids,
        }
    }

    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<Book>> {
        self.book_repo.find_by_user_id(user_id).await
    }

    pub async fn find_by_id(&self, user_id: &str, book_id: &str) -> Result<Book> {
        self.book_repo
            .find_by_id(user_id, book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))
    }

    pub async fn create(&self, user_id: &str, req: BookCreateRequest) -> Result<Book> {
        validate_title(&req.title, "Title")?;
        validate_title(&req.author, "Author")?;
        validate_notes(&req.user_notes)?;
        let tags = validate_tags(req.tags)?;

        // プランごとの冊数制限
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        if let Some(limit) = book_limit(&user.subscription_tier) {
            let count = self.book_repo.count_by_user(user_id).await?;
            if count >= limit {
                return Err(AppError::ValidationError(format!(
                    "The free plan allows up to {} book. Upgrade to premium for unlimited books",
                    limit
                )));
            }
        }

        let now = self.clock.now();
        let book = Book {
            id: self.ids.document_id(),
            user_id: user_id.to_string(),
            title: req.title,
            author: req.author,
            tags,
            user_notes: req.user_notes,
            date_added: now,
            last_updated: now,
        };

        self.book_repo.create(book).await
    }

    pub async fn update(
        &self,
        user_id: &str,
        book_id: &str,
        req: BookUpdateRequest,
    ) -> Result<Book> {
        let mut book = self.find_by_id(user_id, book_id).await?;

        if let Some(title) = req.title {
            validate_title(&title, "Title")?;
            book.title = title;
        }
        if let Some(author) = req.author {
            validate_title(&author, "Author")?;
            book.author = author;
        }
        if let Some(tags) = req.tags {
            book.tags = validate_tags(tags)?;
        }
        if let Some(notes) = req.user_notes {
            validate_notes(&notes)?;
            book.user_notes = notes;
        }
        book.last_updated = self.clock.now();

        self.book_repo.update(book).await
    }

    pub async fn delete(&self, user_id: &str, book_id: &str) -> Result<()> {
        self.book_repo.delete(user_id, book_id).await
    }
}

fn validate_title(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{} is required", field)));
    }
    if value.chars().count() > MAX_TITLE_LENGTH {
        return Err(AppError::ValidationError(format!(
            "{} must be less than {} characters",
            field, MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

fn validate_notes(notes: &str) -> Result<()> {
    if notes.chars().count() > MAX_NOTES_LENGTH {
        return Err(AppError::ValidationError(format!(
            "Notes must be less than {} characters",
            MAX_NOTES_LENGTH
        )));
    }
    Ok(())
}

/// タグを正規化して検証する。空タグは除去、重複は拒否、最大5件
fn validate_tags(tags: Vec<String>) -> Result<Vec<String>> {
    let tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    if tags.len() > MAX_TAGS {
        return Err(AppError::ValidationError(format!(
            "A book can have at most {} tags",
            MAX_TAGS
        )));
    }

    for (i, tag) in tags.iter().enumerate() {
        if tag.chars().count() > MAX_TAG_LENGTH {
            return Err(AppError::ValidationError(format!(
                "Tag '{}' must be less than {} characters",
                tag, MAX_TAG_LENGTH
            )));
        }
        if tags[..i]
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(tag))
        {
            return Err(AppError::ValidationError(format!(
                "Duplicate tag '{}'",
                tag
            )));
        }
    }

    Ok(tags)
}
