use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{BlogError, BlogResult};
use crate::models::GuestbookEntry;

pub const MAX_NICKNAME_CHARS: usize = 20;
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Entries held in memory only; a restart brings back the sample entries.
pub struct Guestbook {
    entries: RwLock<Vec<GuestbookEntry>>,
}

impl Guestbook {
    pub fn new(entries: Vec<GuestbookEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn with_samples() -> Self {
        Self::new(sample_entries())
    }

    /// Newest first.
    pub async fn entries(&self) -> Vec<GuestbookEntry> {
        self.entries.read().await.clone()
    }

    pub async fn sign(&self, nickname: &str, message: &str, now: DateTime<Utc>) -> BlogResult<GuestbookEntry> {
        let nickname = nickname.trim();
        let message = message.trim();
        if nickname.is_empty() || message.is_empty() {
            return Err(BlogError::Validation(
                "닉네임과 메시지를 모두 입력해주세요.".to_string(),
            ));
        }
        if nickname.chars().count() > MAX_NICKNAME_CHARS {
            return Err(BlogError::Validation(format!(
                "닉네임은 {}자 이내로 입력해주세요.",
                MAX_NICKNAME_CHARS
            )));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(BlogError::Validation(format!(
                "메시지는 {}자 이내로 입력해주세요.",
                MAX_MESSAGE_CHARS
            )));
        }

        let entry = GuestbookEntry {
            id: now.timestamp_millis().to_string(),
            nickname: nickname.to_string(),
            message: message.to_string(),
            created_at: now,
        };
        info!(id = %entry.id, nickname = %entry.nickname, "Guestbook signed");
        self.entries.write().await.insert(0, entry.clone());
        Ok(entry)
    }
}

pub fn initials(nickname: &str) -> String {
    nickname.chars().take(2).collect::<String>().to_uppercase()
}

/// Korean long form in KST, e.g. `2024년 1월 15일 오후 07:30`.
pub fn format_created_at(at: DateTime<Utc>) -> String {
    let local = at.naive_utc() + TimeDelta::hours(9);
    let (is_pm, hour) = local.hour12();
    format!(
        "{}년 {}월 {}일 {} {:02}:{:02}",
        local.year(),
        local.month(),
        local.day(),
        if is_pm { "오후" } else { "오전" },
        hour,
        local.minute()
    )
}

fn sample(id: &str, nickname: &str, message: &str, created_at: &str) -> Option<GuestbookEntry> {
    let created_at = DateTime::parse_from_rfc3339(created_at).ok()?.with_timezone(&Utc);
    Some(GuestbookEntry {
        id: id.to_string(),
        nickname: nickname.to_string(),
        message: message.to_string(),
        created_at,
    })
}

pub fn sample_entries() -> Vec<GuestbookEntry> {
    [
        sample(
            "1",
            "개발자A",
            "블로그 정말 잘 보고 있습니다! 특히 React 관련 글들이 도움이 많이 되네요. 앞으로도 좋은 글 부탁드려요!",
            "2024-01-15T10:30:00Z",
        ),
        sample(
            "2",
            "주니어개발자",
            "같은 주니어 개발자로서 많은 공감이 되는 글들이에요. 회고록 글 보고 많은 동기부여 받았습니다. 감사합니다!",
            "2024-01-14T15:20:00Z",
        ),
        sample(
            "3",
            "프론트엔드러버",
            "TypeScript 관련 글이 정말 유용했어요. 실무에서 바로 적용해볼 수 있는 내용들이라 좋았습니다!",
            "2024-01-13T09:15:00Z",
        ),
        sample(
            "4",
            "코딩초보",
            "설명이 정말 쉽고 이해하기 좋게 되어있어요. 초보자도 따라할 수 있게 써주셔서 감사합니다!",
            "2024-01-12T14:45:00Z",
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_prepends_trimmed_entry() {
        let book = Guestbook::with_samples();
        let now = Utc::now();
        let entry = book.sign("  방문자 ", " 안녕하세요 ", now).await.unwrap();

        assert_eq!(entry.nickname, "방문자");
        assert_eq!(entry.message, "안녕하세요");
        assert_eq!(entry.id, now.timestamp_millis().to_string());

        let entries = book.entries().await;
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0], entry);
    }

    #[tokio::test]
    async fn sign_rejects_blank_and_oversized_fields() {
        let book = Guestbook::new(Vec::new());
        let now = Utc::now();

        assert!(matches!(book.sign("", "hi", now).await, Err(BlogError::Validation(_))));
        assert!(matches!(book.sign("me", "   ", now).await, Err(BlogError::Validation(_))));
        assert!(book.sign(&"가".repeat(21), "hi", now).await.is_err());
        assert!(book.sign("me", &"x".repeat(501), now).await.is_err());
        assert!(book.sign(&"가".repeat(20), &"x".repeat(500), now).await.is_ok());
        assert_eq!(book.entries().await.len(), 1);
    }

    #[test]
    fn samples_are_all_parsed() {
        assert_eq!(sample_entries().len(), 4);
    }

    #[test]
    fn initials_take_two_chars_uppercased() {
        assert_eq!(initials("dev"), "DE");
        assert_eq!(initials("개발자A"), "개발");
        assert_eq!(initials("x"), "X");
    }

    #[test]
    fn created_at_formats_in_kst() {
        let at = DateTime::parse_from_rfc3339("2024-01-15T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_created_at(at), "2024년 1월 15일 오후 07:30");
    }
}
