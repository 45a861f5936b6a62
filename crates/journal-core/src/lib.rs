#![deny(warnings)]

//! Core domain models and invariants for the weekly journal novel engine.
//!
//! This crate defines the serializable types shared by the calendar, ledger,
//! gate and runtime crates, with validation helpers for the invariants that can
//! be checked on a single value.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Number of calendar days in a journaling week.
pub const DAYS_PER_WEEK: u32 = 7;

/// Highest week number a month can carry (months hold four or five Sundays).
pub const MAX_WEEKS_PER_MONTH: u32 = 5;

/// Opaque account identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque story record identifier assigned by the store.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoryId(pub String);

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed six-member genre catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    /// 로맨스
    Romance,
    /// 추리
    Mystery,
    /// 역사
    Historical,
    /// 동화
    Fairytale,
    /// 판타지
    Fantasy,
    /// 공포
    Horror,
}

impl Genre {
    /// Every genre in catalog display order.
    pub const ALL: [Genre; 6] = [
        Genre::Romance,
        Genre::Mystery,
        Genre::Historical,
        Genre::Fairytale,
        Genre::Fantasy,
        Genre::Horror,
    ];

    /// Stable ASCII key used in slugs and balances.
    pub fn key(self) -> &'static str {
        match self {
            Genre::Romance => "romance",
            Genre::Mystery => "mystery",
            Genre::Historical => "historical",
            Genre::Fairytale => "fairytale",
            Genre::Fantasy => "fantasy",
            Genre::Horror => "horror",
        }
    }

    /// Korean display label.
    pub fn label(self) -> &'static str {
        match self {
            Genre::Romance => "로맨스",
            Genre::Mystery => "추리",
            Genre::Historical => "역사",
            Genre::Fairytale => "동화",
            Genre::Fantasy => "판타지",
            Genre::Horror => "공포",
        }
    }

    pub fn from_key(key: &str) -> Option<Genre> {
        Genre::ALL.into_iter().find(|g| g.key() == key)
    }

    pub fn from_label(label: &str) -> Option<Genre> {
        Genre::ALL.into_iter().find(|g| g.label() == label)
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Account tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    /// One story per week at most.
    #[default]
    Free,
    /// Monthly subscription.
    MonthlyPremium,
    /// Yearly subscription.
    YearlyPremium,
}

impl Tier {
    pub fn is_premium(self) -> bool {
        !matches!(self, Tier::Free)
    }
}

/// A single day's journal entry as read from the journal store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Author of the entry.
    pub user_id: UserId,
    /// Calendar date the entry is written for.
    pub date: NaiveDate,
    /// Attached images, in upload order.
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl JournalEntry {
    pub fn has_image(&self) -> bool {
        !self.image_urls.is_empty()
    }
}

/// A Monday-start, Sunday-end week numbered within the month that owns its Sunday.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Week {
    /// 1-based position among the month's weeks.
    pub week_num: u32,
    /// Monday.
    pub start: NaiveDate,
    /// Sunday, always `start + 6 days`.
    pub end: NaiveDate,
}

impl Week {
    /// Builds the week starting on `start`; the caller guarantees `start` is a Monday.
    pub fn starting(week_num: u32, start: NaiveDate) -> Week {
        Week {
            week_num,
            start,
            end: start + Duration::days(i64::from(DAYS_PER_WEEK) - 1),
        }
    }

    /// True when `date` lies within `[start, end]`.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The seven dates of the week, Monday first.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..i64::from(DAYS_PER_WEEK)).map(move |offset| start + Duration::days(offset))
    }
}

/// Structured bucket key for story records: `(year, month, week_num)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekKey {
    pub year: i32,
    /// 1..=12
    pub month: u32,
    /// 1..=5
    pub week_num: u32,
}

impl WeekKey {
    pub fn new(year: i32, month: u32, week_num: u32) -> Result<WeekKey, ValidationError> {
        validate_year(year)?;
        validate_month(month)?;
        if !(1..=MAX_WEEKS_PER_MONTH).contains(&week_num) {
            return Err(ValidationError::WeekNumOutOfRange(week_num));
        }
        Ok(WeekKey {
            year,
            month,
            week_num,
        })
    }

    /// Key for `week` displayed under `(year, month)`.
    pub fn for_week(year: i32, month: u32, week: &Week) -> Result<WeekKey, ValidationError> {
        WeekKey::new(year, month, week.week_num)
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02} week {}", self.year, self.month, self.week_num)
    }
}

/// A generated story as stored by the story collaborator.
///
/// Bucketing fields are optional because legacy records may lack them; such
/// records are never bucketed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub id: StoryId,
    /// Exclusive owner.
    pub user_id: UserId,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub week_num: Option<u32>,
    /// Unknown genre strings are read as `None`.
    #[serde(default, deserialize_with = "lenient_genre")]
    pub genre: Option<Genre>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_public")]
    pub is_public: bool,
    /// Logical deletion flag; deleted records stay readable for buyers.
    #[serde(default)]
    pub deleted: bool,
    /// Number of times other users bought this story.
    #[serde(default)]
    pub purchase_count: u32,
}

fn default_public() -> bool {
    true
}

fn lenient_genre<'de, D>(deserializer: D) -> Result<Option<Genre>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| Genre::from_key(&s).or_else(|| Genre::from_label(&s))))
}

impl StoryRecord {
    /// Bucket key, or `None` when any bucketing field is missing or out of range.
    pub fn week_key(&self) -> Option<WeekKey> {
        let (year, month, week_num) = (self.year?, self.month?, self.week_num?);
        WeekKey::new(year, month, week_num).ok()
    }
}

/// Input handed to the story store once generation is granted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryDraft {
    pub user_id: UserId,
    pub key: WeekKey,
    pub genre: Genre,
    pub title: String,
    /// Cover image reference.
    pub cover_image: String,
    /// Monday of the source week.
    pub week_start: NaiveDate,
    /// Sunday of the source week.
    pub week_end: NaiveDate,
}

/// Tier and currency balances of one account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub tier: Tier,
    /// Per-genre potion counts; a missing genre means zero.
    #[serde(default)]
    pub potions: BTreeMap<Genre, u32>,
    /// Premium free generation credits left in the current period.
    #[serde(default)]
    pub premium_credits: u32,
    /// Next renewal date; credits expire on this date.
    #[serde(default)]
    pub premium_renewal: Option<NaiveDate>,
    /// Subscription cancelled, benefits kept until the renewal date.
    #[serde(default)]
    pub premium_cancelled: bool,
    /// Reward points balance.
    #[serde(default)]
    pub points: u32,
}

impl Entitlement {
    pub fn potion_count(&self, genre: Genre) -> u32 {
        self.potions.get(&genre).copied().unwrap_or(0)
    }
}

/// Engine configuration parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Points granted for a fully written week (default: 10).
    pub weekly_bonus_points: u32,
    /// Free credits granted at each premium renewal (default: 1).
    pub monthly_premium_credits: u32,
    /// Cover used when no entry in the week carries an image.
    pub default_cover_image: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            weekly_bonus_points: 10,
            monthly_premium_credits: 1,
            default_cover_image: "/novel_banner/romance.png".to_string(),
        }
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Year outside supported range [1970, 2100].
    #[error("year {0} is out of supported range [1970, 2100]")]
    YearOutOfRange(i32),
    /// Month must be within [1, 12].
    #[error("month {0} is out of range [1, 12]")]
    MonthOutOfRange(u32),
    /// Week number must be within [1, 5].
    #[error("week number {0} is out of range [1, 5]")]
    WeekNumOutOfRange(u32),
    /// Slug does not match `year-month-week[-genre]`.
    #[error("malformed novel slug: {0}")]
    MalformedSlug(String),
}

pub fn validate_year(year: i32) -> Result<(), ValidationError> {
    if !(1970..=2100).contains(&year) {
        return Err(ValidationError::YearOutOfRange(year));
    }
    Ok(())
}

pub fn validate_month(month: u32) -> Result<(), ValidationError> {
    if !(1..=12).contains(&month) {
        return Err(ValidationError::MonthOutOfRange(month));
    }
    Ok(())
}

/// Parsed form of a novel slug.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NovelSlug {
    pub key: WeekKey,
    /// `None` for legacy three-part slugs or unknown genre keys.
    pub genre: Option<Genre>,
}

/// Render `year-month-week-genre`, or `year-month-week` without a genre.
pub fn novel_slug(key: &WeekKey, genre: Option<Genre>) -> String {
    match genre {
        Some(g) => format!("{}-{}-{}-{}", key.year, key.month, key.week_num, g.key()),
        None => format!("{}-{}-{}", key.year, key.month, key.week_num),
    }
}

/// Parse a slug produced by [`novel_slug`].
pub fn parse_novel_slug(slug: &str) -> Result<NovelSlug, ValidationError> {
    let malformed = || ValidationError::MalformedSlug(slug.to_string());
    let parts: Vec<&str> = slug.split('-').collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(malformed());
    }
    let year: i32 = parts[0].parse().map_err(|_| malformed())?;
    let month: u32 = parts[1].parse().map_err(|_| malformed())?;
    let week_num: u32 = parts[2].parse().map_err(|_| malformed())?;
    let key = WeekKey::new(year, month, week_num)?;
    let genre = parts.get(3).and_then(|k| Genre::from_key(k));
    Ok(NovelSlug { key, genre })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(genre: &str) -> String {
        format!(
            r#"{{"id":"n1","user_id":"u1","year":2024,"month":2,"week_num":1,
                "genre":"{genre}","created_at":"2024-02-05T10:00:00Z"}}"#
        )
    }

    #[test]
    fn genre_keys_and_labels_are_bijective() {
        for g in Genre::ALL {
            assert_eq!(Genre::from_key(g.key()), Some(g));
            assert_eq!(Genre::from_label(g.label()), Some(g));
        }
        assert_eq!(Genre::from_key("western"), None);
        assert_eq!(Genre::from_label("서부"), None);
    }

    #[test]
    fn record_genre_accepts_key_or_label() {
        let a: StoryRecord = serde_json::from_str(&record("mystery")).unwrap();
        let b: StoryRecord = serde_json::from_str(&record("추리")).unwrap();
        assert_eq!(a.genre, Some(Genre::Mystery));
        assert_eq!(b.genre, Some(Genre::Mystery));
        assert!(a.is_public);
        assert!(!a.deleted);
    }

    #[test]
    fn unknown_genre_is_not_fatal() {
        let r: StoryRecord = serde_json::from_str(&record("western")).unwrap();
        assert_eq!(r.genre, None);
        assert!(r.week_key().is_some());
    }

    #[test]
    fn week_key_requires_all_fields_in_range() {
        let mut r: StoryRecord = serde_json::from_str(&record("romance")).unwrap();
        assert_eq!(r.week_key(), Some(WeekKey::new(2024, 2, 1).unwrap()));
        r.week_num = Some(6);
        assert_eq!(r.week_key(), None);
        r.week_num = None;
        assert_eq!(r.week_key(), None);
        r.week_num = Some(1);
        r.month = Some(13);
        assert_eq!(r.week_key(), None);
    }

    #[test]
    fn week_spans_seven_days() {
        let w = Week::starting(1, NaiveDate::from_ymd_opt(2024, 1, 29).unwrap());
        assert_eq!(w.end, NaiveDate::from_ymd_opt(2024, 2, 4).unwrap());
        assert_eq!(w.days().count(), 7);
        assert!(w.contains(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
        assert!(!w.contains(NaiveDate::from_ymd_opt(2024, 2, 5).unwrap()));
    }

    #[test]
    fn slug_forms() {
        let key = WeekKey::new(2024, 2, 3).unwrap();
        assert_eq!(novel_slug(&key, Some(Genre::Horror)), "2024-2-3-horror");
        assert_eq!(novel_slug(&key, None), "2024-2-3");
        let parsed = parse_novel_slug("2024-2-3").unwrap();
        assert_eq!(parsed, NovelSlug { key, genre: None });
        let parsed = parse_novel_slug("2024-2-3-fairytale").unwrap();
        assert_eq!(parsed.genre, Some(Genre::Fairytale));
        assert_eq!(parse_novel_slug("2024-2-3-unknown").unwrap().genre, None);
        assert!(parse_novel_slug("2024-2").is_err());
        assert!(parse_novel_slug("2024-x-3").is_err());
        assert!(parse_novel_slug("2024-2-3-horror-extra").is_err());
        assert_eq!(
            parse_novel_slug("2024-13-1"),
            Err(ValidationError::MonthOutOfRange(13))
        );
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg: EngineConfig = serde_yaml::from_str("weekly_bonus_points: 20\n").unwrap();
        assert_eq!(cfg.weekly_bonus_points, 20);
        assert_eq!(cfg.monthly_premium_credits, 1);
        assert_eq!(cfg.default_cover_image, "/novel_banner/romance.png");
    }

    #[test]
    fn entitlement_snapshot_roundtrip() {
        let mut ent = Entitlement {
            tier: Tier::MonthlyPremium,
            premium_credits: 1,
            premium_renewal: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..Entitlement::default()
        };
        ent.potions.insert(Genre::Fantasy, 2);
        let s = serde_json::to_string(&ent).unwrap();
        let back: Entitlement = serde_json::from_str(&s).unwrap();
        assert_eq!(back, ent);
        assert_eq!(back.potion_count(Genre::Fantasy), 2);
        assert_eq!(back.potion_count(Genre::Horror), 0);
        assert!(back.tier.is_premium());
    }

    proptest! {
        #[test]
        fn slug_parse_inverts_render(year in 1970i32..=2100, month in 1u32..=12,
                                     week in 1u32..=5, g in 0usize..7) {
            let key = WeekKey::new(year, month, week).unwrap();
            let genre = Genre::ALL.get(g).copied();
            let parsed = parse_novel_slug(&novel_slug(&key, genre)).unwrap();
            prop_assert_eq!(parsed.key, key);
            prop_assert_eq!(parsed.genre, genre);
        }
    }
}
