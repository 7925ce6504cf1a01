use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{EnumIter, IntoEnumIterator};
use validator::Validate;

use super::Entity;
use crate::store::Collection;

/// Value of the `kind` field identifying the company settings document
pub const COMPANY_SETTINGS_KIND: &str = "company";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl std::str::FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase()))
            .map_err(|_| format!("unknown weekday '{}'", s))
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|e| D::Error::custom(format!("invalid time '{}': {}", raw, e)))
    }
}

/// Working interval within a day, serialized as `"HH:MM"` pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn hm(start: (u32, u32), end: (u32, u32)) -> Option<Self> {
        Some(Self {
            start: NaiveTime::from_hms_opt(start.0, start.1, 0)?,
            end: NaiveTime::from_hms_opt(end.0, end.1, 0)?,
        })
    }

    /// Zero for inverted ranges.
    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes().max(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub enabled: bool,
    #[serde(default)]
    pub ranges: Vec<TimeRange>,
}

/// Weekly working calendar.
///
/// Ranges are expected to be chronological and non-overlapping but are
/// stored exactly as entered; `irregular_ranges` reports violations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyCalendar {
    pub days: BTreeMap<Weekday, DaySchedule>,
}

impl Default for CompanyCalendar {
    fn default() -> Self {
        let office_hours: Vec<TimeRange> = [((8, 0), (12, 0)), ((13, 0), (17, 0))]
            .into_iter()
            .filter_map(|(s, e)| TimeRange::hm(s, e))
            .collect();
        let days = Weekday::iter()
            .map(|day| {
                let weekend = matches!(day, Weekday::Saturday | Weekday::Sunday);
                let schedule = DaySchedule {
                    enabled: !weekend,
                    ranges: if weekend {
                        Vec::new()
                    } else {
                        office_hours.clone()
                    },
                };
                (day, schedule)
            })
            .collect();
        Self { days }
    }
}

impl CompanyCalendar {
    pub fn day(&self, day: Weekday) -> DaySchedule {
        self.days.get(&day).cloned().unwrap_or_default()
    }

    /// Flips a day's enabled flag, leaving its ranges untouched. Returns the new flag.
    pub fn toggle_day(&mut self, day: Weekday) -> bool {
        let schedule = self.days.entry(day).or_default();
        schedule.enabled = !schedule.enabled;
        schedule.enabled
    }

    pub fn set_ranges(&mut self, day: Weekday, ranges: Vec<TimeRange>) {
        self.days.entry(day).or_default().ranges = ranges;
    }

    /// Minutes of work on an enabled day, zero when disabled.
    pub fn working_minutes(&self, day: Weekday) -> i64 {
        let schedule = self.day(day);
        if !schedule.enabled {
            return 0;
        }
        schedule.ranges.iter().map(TimeRange::minutes).sum()
    }

    /// Ranges that are inverted, out of order or overlapping their predecessor.
    pub fn irregular_ranges(&self) -> Vec<(Weekday, TimeRange)> {
        let mut found = Vec::new();
        for (day, schedule) in &self.days {
            let mut previous_end: Option<NaiveTime> = None;
            for range in &schedule.ranges {
                let inverted = range.end <= range.start;
                let overlaps = previous_end.map(|end| range.start < end).unwrap_or(false);
                if inverted || overlaps {
                    found.push((*day, *range));
                }
                previous_end = Some(previous_end.map_or(range.end, |end| end.max(range.end)));
            }
        }
        found
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    #[validate(length(max = 120))]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub vat_number: Option<String>,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    /// `data:<mime>;base64,...` URL
    #[serde(default)]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySettings {
    #[serde(default)]
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub profile: CompanyProfile,
    #[serde(default)]
    pub calendar: CompanyCalendar,
    #[serde(default)]
    pub production_stages: Vec<String>,
    pub currency: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CompanySettings {
    pub fn with_defaults(currency: impl Into<String>, production_stages: Vec<String>) -> Self {
        Self {
            id: String::new(),
            kind: COMPANY_SETTINGS_KIND.to_string(),
            profile: CompanyProfile::default(),
            calendar: CompanyCalendar::default(),
            production_stages,
            currency: currency.into(),
            updated_at: None,
        }
    }
}

impl Entity for CompanySettings {
    const COLLECTION: Collection = Collection::Settings;

    fn id(&self) -> &str {
        &self.id
    }
}
