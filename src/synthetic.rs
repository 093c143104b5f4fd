//! Deterministic synthetic transactions for demos and load tests
//!
//! Three demo shoppers with distinct habits, plus a handful of fraud
//! patterns that break those habits. The same seed and anchor always
//! produce the same stream.

use crate::TransactionRequest;
use chrono::{DateTime, Duration, Timelike, Utc};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Demo users and their usual behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoUser {
    /// Daytime shopper on an iPhone
    Sarah,
    /// Evening shopper on a Windows PC
    John,
    /// Midday shopper on a MacBook
    Emma,
}

struct Habits {
    user_id: &'static str,
    normal_hours: (u32, u32),
    avg_amount: f64,
    device: &'static str,
    merchants: &'static [&'static str],
}

impl DemoUser {
    pub const ALL: [DemoUser; 3] = [DemoUser::Sarah, DemoUser::John, DemoUser::Emma];

    pub fn user_id(&self) -> &'static str {
        self.habits().user_id
    }

    pub fn avg_amount(&self) -> f64 {
        self.habits().avg_amount
    }

    fn habits(&self) -> Habits {
        match self {
            DemoUser::Sarah => Habits {
                user_id: "sarah123",
                normal_hours: (9, 21),
                avg_amount: 85.0,
                device: "iPhone",
                merchants: &["Amazon", "Starbucks", "Walmart", "Whole Foods", "Netflix"],
            },
            DemoUser::John => Habits {
                user_id: "john_doe",
                normal_hours: (18, 23),
                avg_amount: 120.0,
                device: "Windows_PC",
                merchants: &["Steam", "Best Buy", "Uber Eats", "Apple Store", "Spotify"],
            },
            DemoUser::Emma => Habits {
                user_id: "emma_w",
                normal_hours: (10, 16),
                avg_amount: 65.0,
                device: "MacBook",
                merchants: &["Etsy", "Trader Joe's", "Target", "Doordash", "Hulu"],
            },
        }
    }
}

const OTHER_MERCHANTS: &[&str] = &[
    "Target", "Best Buy", "McDonald's", "Uber", "Lyft", "Airbnb", "Gas Station", "Hulu",
];

const SUSPICIOUS_DEVICES: &[&str] = &["Unknown_Device", "Emulator", "Virtual_Machine", "Tor_Browser"];

#[derive(Debug, Clone, Copy)]
enum FraudPattern {
    GiftCardSpree,
    ElectronicsOverseas,
    MidnightShopping,
}

impl FraudPattern {
    const ALL: [FraudPattern; 3] = [
        FraudPattern::GiftCardSpree,
        FraudPattern::ElectronicsOverseas,
        FraudPattern::MidnightShopping,
    ];

    fn amount_multiplier(&self) -> f64 {
        match self {
            FraudPattern::GiftCardSpree => 3.0,
            FraudPattern::ElectronicsOverseas => 5.0,
            FraudPattern::MidnightShopping => 2.5,
        }
    }

    fn merchants(&self) -> &'static [&'static str] {
        match self {
            FraudPattern::GiftCardSpree => &["GiftCardMall", "GameStop", "Target"],
            FraudPattern::ElectronicsOverseas => &["Apple Store", "Best Buy", "Newegg"],
            FraudPattern::MidnightShopping => &["Walmart", "Gas Station", "Online Casino"],
        }
    }
}

/// Seeded transaction generator
pub struct SyntheticGenerator {
    rng: Pcg64Mcg,
    anchor: DateTime<Utc>,
}

impl SyntheticGenerator {
    /// Generator whose timestamps are laid out relative to `anchor`
    pub fn new(seed: u64, anchor: DateTime<Utc>) -> Self {
        Self {
            rng: Pcg64Mcg::seed_from_u64(seed),
            anchor,
        }
    }

    /// A transaction matching the user's habits, `days_ago` days before the anchor
    pub fn legitimate(&mut self, user: DemoUser, days_ago: i64) -> TransactionRequest {
        let habits = user.habits();
        let hour = self.rng.gen_range(habits.normal_hours.0..habits.normal_hours.1);
        let amount = round_cents(habits.avg_amount * self.rng.gen_range(0.7..1.3));

        let merchant = if self.rng.gen_bool(0.8) {
            self.pick(habits.merchants)
        } else {
            self.pick(OTHER_MERCHANTS)
        };

        TransactionRequest {
            user_id: habits.user_id.to_string(),
            amount,
            device: habits.device.to_string(),
            typing_speed: self.rng.gen_range(40..=120),
            timestamp: self.at(days_ago, hour),
            merchant: Some(merchant.to_string()),
        }
    }

    /// A transaction breaking the user's habits on amount, time, device and cadence
    pub fn fraudulent(&mut self, user: DemoUser) -> TransactionRequest {
        let habits = user.habits();
        let pattern = FraudPattern::ALL[self.rng.gen_range(0..FraudPattern::ALL.len())];

        let after_hours = habits.normal_hours.1 + 1;
        let hour = match pattern {
            FraudPattern::MidnightShopping => self.rng.gen_range(0..=5),
            _ if after_hours <= 23 => self.rng.gen_range(after_hours..=23),
            _ => self.rng.gen_range(0..=5),
        };

        let amount = round_cents(
            habits.avg_amount * pattern.amount_multiplier() * self.rng.gen_range(0.9..1.1),
        );
        let typing_speed = if self.rng.gen_bool(0.5) {
            self.rng.gen_range(180..=250)
        } else {
            self.rng.gen_range(10..=30)
        };

        TransactionRequest {
            user_id: habits.user_id.to_string(),
            amount,
            device: self.pick(SUSPICIOUS_DEVICES).to_string(),
            typing_speed,
            timestamp: self.at(0, hour),
            merchant: Some(self.pick(pattern.merchants()).to_string()),
        }
    }

    /// A mixed history for one user, oldest first.
    ///
    /// Legitimate transactions are spread over the previous 30 days; the
    /// fraudulent share lands on the anchor day.
    pub fn history(&mut self, user: DemoUser, count: usize, fraud_share: f64) -> Vec<TransactionRequest> {
        let fraud_count = (count as f64 * fraud_share.clamp(0.0, 1.0)) as usize;

        let mut history: Vec<TransactionRequest> = (0..count - fraud_count)
            .map(|_| {
                let days_ago = self.rng.gen_range(1..=30);
                self.legitimate(user, days_ago)
            })
            .collect();
        history.extend((0..fraud_count).map(|_| self.fraudulent(user)));
        history.sort_by_key(|tx| tx.timestamp);
        history
    }

    fn at(&mut self, days_ago: i64, hour: u32) -> DateTime<Utc> {
        let day = self.anchor - Duration::days(days_ago);
        let minute = self.rng.gen_range(0..60);
        let second = self.rng.gen_range(0..60);
        day.with_hour(hour)
            .and_then(|t| t.with_minute(minute))
            .and_then(|t| t.with_second(second))
            .unwrap_or(day)
    }

    fn pick(&mut self, options: &'static [&'static str]) -> &'static str {
        options.choose(&mut self.rng).copied().unwrap_or("Unknown")
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
