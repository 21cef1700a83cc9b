//! Daily affirmation selection
//!
//! Each calendar day has one card. The first read of a day derives the card
//! from the day alone (see [`day_index`]), so every process picks the same
//! item without coordinating. An explicit re-roll picks at random, preferring
//! a different category than the card it replaces.

use crate::config::TODAY_KEY;
use crate::error::{AppError, Result};
use crate::services::usage::UsageTracker;
use crate::storage::LocalStore;
use chrono::{Datelike, Local, NaiveDate};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Park–Miller modulus (2^31 - 1)
const LCG_MODULUS: u64 = 2_147_483_647;
const LCG_MULTIPLIER: u64 = 48_271;

/// One item of the affirmation pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffirmationItem {
    pub id: u32,
    pub category: String,
    pub affirmation: String,
    pub challenge: String,
}

/// Non-empty list of affirmation items
#[derive(Debug, Clone)]
pub struct AffirmationPool {
    items: Vec<AffirmationItem>,
}

impl AffirmationPool {
    pub fn new(items: Vec<AffirmationItem>) -> Result<Self> {
        if items.is_empty() {
            return Err(AppError::EmptyPool);
        }
        Ok(Self { items })
    }

    /// Load a pool from a JSON array of items
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let items: Vec<AffirmationItem> = serde_json::from_str(&content)?;
        tracing::info!("Loaded {} affirmations from {:?}", items.len(), path);
        Self::new(items)
    }

    pub fn builtin() -> Self {
        Self {
            items: builtin_items(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[AffirmationItem] {
        &self.items
    }

    pub fn contains(&self, id: u32) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    /// Item at `index`, or the first item when the index is out of range
    pub fn get_or_first(&self, index: usize) -> &AffirmationItem {
        self.items.get(index).unwrap_or(&self.items[0])
    }
}

impl Default for AffirmationPool {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Today's card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affirmation {
    /// `day-YYYY-MM-DD`
    pub id: String,
    pub date: NaiveDate,
    pub text: String,
    pub challenge: String,
    pub category: String,
}

/// What is stored under the today key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TodayRecord {
    pub ymd: String,
    pub item_id: Option<u32>,
    pub text: String,
    pub challenge: String,
    pub category: String,
    pub regenerated: bool,
}

impl TodayRecord {
    fn is_complete_for(&self, ymd: &str) -> bool {
        self.ymd == ymd && !self.text.is_empty() && !self.challenge.is_empty()
    }

    fn to_card(&self, day: NaiveDate) -> Affirmation {
        Affirmation {
            id: card_id(day),
            date: day,
            text: self.text.clone(),
            challenge: self.challenge.clone(),
            category: self.category.clone(),
        }
    }
}

/// `YYYY-MM-DD`
pub fn ymd(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn card_id(day: NaiveDate) -> String {
    format!("day-{}", ymd(day))
}

/// `YYYYMMDD` as a number
pub fn day_key(day: NaiveDate) -> u32 {
    day.year().max(0) as u32 * 10_000 + day.month() * 100 + day.day()
}

/// Pool index for a day: one Park–Miller step seeded by the day key.
///
/// `len` must be non-zero.
pub fn day_index(day_key: u32, len: usize) -> usize {
    let x = (day_key as u64 % LCG_MODULUS) * LCG_MULTIPLIER % LCG_MODULUS;
    (x % len as u64) as usize
}

/// Text inside the first `[...]`, or the whole text when there is none
pub fn clean_text(raw: &str) -> &str {
    raw.find('[')
        .and_then(|open| {
            let rest = &raw[open + 1..];
            rest.find(']').map(|close| &rest[..close])
        })
        .filter(|inner| !inner.trim().is_empty())
        .unwrap_or(raw)
        .trim()
}

/// Service selecting and persisting the daily card
#[derive(Clone)]
pub struct AffirmationService {
    store: LocalStore,
    pool: Arc<AffirmationPool>,
    usage: UsageTracker,
}

impl AffirmationService {
    pub fn new(store: LocalStore, pool: AffirmationPool, usage: UsageTracker) -> Self {
        Self {
            store,
            pool: Arc::new(pool),
            usage,
        }
    }

    pub fn pool(&self) -> &AffirmationPool {
        &self.pool
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Today's card, creating it on the first call of the day
    pub async fn ensure_today(&self) -> Affirmation {
        self.ensure_today_on(Local::now().date_naive()).await
    }

    /// Card for `day`, creating it when the stored one belongs to another day
    pub async fn ensure_today_on(&self, day: NaiveDate) -> Affirmation {
        let key = ymd(day);
        let _guard = self.store.lock_key(TODAY_KEY).await;

        if let Some(saved) = self.stored().await {
            if saved.is_complete_for(&key) {
                return saved.to_card(day);
            }
        }

        let item = self
            .pool
            .get_or_first(day_index(day_key(day), self.pool.len()))
            .clone();

        tracing::info!("Selected affirmation {} for {}", item.id, key);
        self.persist(day, &item, false).await
    }

    /// Replace today's card with a random one
    pub async fn regenerate(&self) -> Affirmation {
        self.regenerate_on(Local::now().date_naive()).await
    }

    /// Replace the card for `day` with a random one
    pub async fn regenerate_on(&self, day: NaiveDate) -> Affirmation {
        let _guard = self.store.lock_key(TODAY_KEY).await;
        let current = self
            .stored()
            .await
            .filter(|saved| saved.is_complete_for(&ymd(day)));

        let item = pick_other(&self.pool, current.as_ref()).clone();

        tracing::info!("Regenerated affirmation for {}: {}", ymd(day), item.id);
        self.persist(day, &item, true).await
    }

    async fn stored(&self) -> Option<TodayRecord> {
        self.store.read(TODAY_KEY, None).await
    }

    async fn persist(&self, day: NaiveDate, item: &AffirmationItem, regenerated: bool) -> Affirmation {
        let record = TodayRecord {
            ymd: ymd(day),
            item_id: Some(item.id),
            text: clean_text(&item.affirmation).to_string(),
            challenge: clean_text(&item.challenge).to_string(),
            category: item.category.clone(),
            regenerated,
        };

        self.store.write(TODAY_KEY, &record).await;
        self.usage.record(item.id, &self.pool).await;

        record.to_card(day)
    }
}

/// Random item other than `current`, preferring another category
fn pick_other<'a>(pool: &'a AffirmationPool, current: Option<&TodayRecord>) -> &'a AffirmationItem {
    let items = pool.items();
    let current_id = current.and_then(|c| c.item_id);
    let current_category = current.map(|c| c.category.as_str());

    let others: Vec<&AffirmationItem> = items
        .iter()
        .filter(|item| Some(item.id) != current_id)
        .collect();
    let diverse: Vec<&AffirmationItem> = others
        .iter()
        .copied()
        .filter(|item| Some(item.category.as_str()) != current_category)
        .collect();

    let mut rng = rand::thread_rng();
    let candidates = if !diverse.is_empty() { &diverse } else { &others };

    candidates
        .choose(&mut rng)
        .copied()
        .unwrap_or_else(|| pool.get_or_first(0))
}

fn item(id: u32, category: &str, affirmation: &str, challenge: &str) -> AffirmationItem {
    AffirmationItem {
        id,
        category: category.to_string(),
        affirmation: affirmation.to_string(),
        challenge: challenge.to_string(),
    }
}

fn builtin_items() -> Vec<AffirmationItem> {
    vec![
        item(1, "Growth", "I honor my progress, no matter the pace.", "Write down one thing you did better this month than last."),
        item(2, "Self-Compassion", "I choose compassion for myself today.", "Take 5 slow breaths and write one thing you're grateful for."),
        item(3, "Courage", "I am allowed to take up space and dream boldly.", "Write one dream you have never said out loud."),
        item(4, "Growth", "I am safe to grow at my own rhythm.", "List three small steps toward something you want."),
        item(5, "Courage", "My voice matters, gentle and strong.", "Share one honest opinion with someone you trust."),
        item(6, "Calm", "I create calm through small, loving actions.", "Set a 10-minute timer and tidy a tiny corner."),
        item(7, "Courage", "I show up for myself with courage.", "Do one thing you have been putting off for a week."),
        item(8, "Growth", "Little by little, I rewrite my story.", "Celebrate a tiny win in three sentences."),
        item(9, "Self-Compassion", "I treat my body with kindness.", "Drink a full glass of water and write how your body feels."),
        item(10, "Connection", "I am worthy of love and belonging.", "Message someone \"thinking of you\" and jot their reply."),
        item(11, "Calm", "I can pause before I respond.", "Step outside for 2 minutes; describe one detail you notice."),
        item(12, "Boundaries", "Saying no is a form of self-respect.", "Say \"no\" to one non-essential thing today; reflect on it."),
        item(13, "Boundaries", "My needs are valid.", "Write one boundary you kept this week."),
        item(14, "Gratitude", "There is good in my life right now.", "List five ordinary things you are thankful for."),
        item(15, "Gratitude", "I notice the small gifts of each day.", "Photograph something beautiful you usually walk past."),
        item(16, "Joy", "I make room for play.", "Spend ten minutes on something purely for fun."),
        item(17, "Joy", "I deserve moments of delight.", "Put on a song you love and let yourself move."),
        item(18, "Connection", "I let people see the real me.", "Tell someone one thing you appreciate about them."),
        item(19, "Self-Compassion", "Rest is productive too.", "Take a guilt-free 15-minute break and describe how it felt."),
        item(20, "Calm", "I release what I cannot control.", "Write a worry on paper, then write what is in your control."),
        item(21, "Growth", "Mistakes are how I learn.", "Write about a recent mistake and one thing it taught you."),
        item(22, "Courage", "I trust myself to handle what comes.", "Recall a hard moment you got through and name the strength it took."),
        item(23, "Boundaries", "I protect my energy without apology.", "Mute one notification that drains you."),
        item(24, "Gratitude", "My past self would be proud of me.", "Write a short thank-you note to your past self."),
        item(25, "Joy", "Laughter is welcome here.", "Find something that makes you laugh and share it."),
        item(26, "Connection", "I am never as alone as I feel.", "Reach out to one person you have not spoken to in a while."),
        item(27, "Calm", "My breath is an anchor I carry everywhere.", "Breathe in for four, hold for four, out for six, five times."),
        item(28, "Self-Compassion", "I speak to myself like a dear friend.", "Rewrite one harsh thought in kinder words."),
        item(29, "Boundaries", "I can change my mind.", "Revisit one commitment and decide if it still fits."),
        item(30, "Joy", "Today holds something to look forward to.", "Plan one small treat for this evening."),
    ]
}
