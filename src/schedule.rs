//! Recalculation scheduling: when is a fresh risk calculation due?
//!
//! This is a decision function, not a daemon. The store keeps one
//! `ScheduleEntry` per entity; the engine consults it (together with any
//! reported trigger events) before recalculating.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::types::{EntityId, RiskLevel};

/// Ten years; anything longer is a configuration mistake.
pub const MAX_REVIEW_DAYS: i64 = 3_650;
pub const MAX_TRIGGER_HOURS: i64 = MAX_REVIEW_DAYS * 24;

/// Days until the next review, per risk level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewCadence {
    pub critical_days: i64,
    pub high_days: i64,
    pub medium_days: i64,
    pub low_days: i64,
}

impl Default for ReviewCadence {
    fn default() -> Self {
        ReviewCadence { critical_days: 1, high_days: 3, medium_days: 7, low_days: 30 }
    }
}

impl ReviewCadence {
    pub fn interval_days(&self, level: RiskLevel) -> i64 {
        match level {
            RiskLevel::Critical => self.critical_days,
            RiskLevel::High => self.high_days,
            RiskLevel::Medium => self.medium_days,
            RiskLevel::Low => self.low_days,
        }
    }

    /// Saturates at the latest representable instant rather than overflowing.
    pub fn next_review_date(&self, level: RiskLevel, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_days(self.interval_days(level))
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Intervals lie in `1..=MAX_REVIEW_DAYS` and never lengthen as risk rises.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let days = [self.critical_days, self.high_days, self.medium_days, self.low_days];
        if let Some(d) = days.iter().find(|d| !(1..=MAX_REVIEW_DAYS).contains(*d)) {
            return Err(ConfigError::InvalidCadence(format!("{d} days outside 1..={MAX_REVIEW_DAYS}")));
        }
        if !days.is_sorted() {
            return Err(ConfigError::InvalidCadence(format!(
                "{self:?}: critical <= high <= medium <= low must hold"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    WeatherAlert,
    CreditAlert,
    PolicyAlert,
}

/// An externally reported event that forces recalculation while it is recent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    pub reported_at: DateTime<Utc>,
}

/// How long each kind of trigger stays relevant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerWindows {
    pub weather_hours: i64,
    pub credit_hours: i64,
    pub policy_hours: i64,
}

impl Default for TriggerWindows {
    fn default() -> Self {
        TriggerWindows { weather_hours: 24, credit_hours: 7 * 24, policy_hours: 30 * 24 }
    }
}

impl TriggerWindows {
    pub fn window(&self, kind: TriggerKind) -> Duration {
        hours(match kind {
            TriggerKind::WeatherAlert => self.weather_hours,
            TriggerKind::CreditAlert => self.credit_hours,
            TriggerKind::PolicyAlert => self.policy_hours,
        })
    }

    /// The widest window; events older than `now - longest()` never matter.
    pub fn longest(&self) -> Duration {
        hours(self.weather_hours.max(self.credit_hours).max(self.policy_hours))
    }

    /// Earliest report time that can still be active at `now`.
    pub fn earliest_active(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.longest()).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [self.weather_hours, self.credit_hours, self.policy_hours];
        if all.iter().all(|h| (1..=MAX_TRIGGER_HOURS).contains(h)) {
            Ok(())
        } else {
            Err(ConfigError::InvalidTriggerWindows(format!("{self:?}: hours must lie in 1..={MAX_TRIGGER_HOURS}")))
        }
    }

    pub fn is_active(&self, event: &TriggerEvent, now: DateTime<Utc>) -> bool {
        event.reported_at <= now && now - event.reported_at <= self.window(event.kind)
    }
}

fn hours(h: i64) -> Duration {
    Duration::try_hours(h).unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl From<RiskLevel> for Priority {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => Priority::Low,
            RiskLevel::Medium => Priority::Normal,
            RiskLevel::High => Priority::High,
            RiskLevel::Critical => Priority::Urgent,
        }
    }
}

/// Per-entity scheduling metadata kept by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub entity_id: EntityId,
    pub next_due: DateTime<Utc>,
    pub frequency_days: i64,
    pub priority: Priority,
}

impl ScheduleEntry {
    pub fn for_level(entity_id: EntityId, level: RiskLevel, cadence: &ReviewCadence, now: DateTime<Utc>) -> Self {
        ScheduleEntry {
            entity_id,
            next_due: cadence.next_review_date(level, now),
            frequency_days: cadence.interval_days(level),
            priority: level.into(),
        }
    }
}

/// Why a calculation is (or is not) due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Due {
    NeverCalculated,
    ReviewDate,
    Trigger(TriggerKind),
    NotDue,
}

impl Due {
    pub fn is_due(&self) -> bool {
        !matches!(self, Due::NotDue)
    }
}

/// Decide whether an entity needs recalculation.
///
/// `next_review` is the next-review date of the latest calculation, or
/// `None` when the entity was never calculated.
pub fn calculation_due(
    next_review: Option<DateTime<Utc>>,
    triggers: &[TriggerEvent],
    windows: &TriggerWindows,
    now: DateTime<Utc>,
) -> Due {
    let Some(next_review) = next_review else {
        return Due::NeverCalculated;
    };
    if now >= next_review {
        return Due::ReviewDate;
    }
    triggers
        .iter()
        .find(|t| windows.is_active(t, now))
        .map(|t| Due::Trigger(t.kind))
        .unwrap_or(Due::NotDue)
}

pub fn is_calculation_needed(
    next_review: Option<DateTime<Utc>>,
    triggers: &[TriggerEvent],
    windows: &TriggerWindows,
    now: DateTime<Utc>,
) -> bool {
    calculation_due(next_review, triggers, windows, now).is_due()
}
