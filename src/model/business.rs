use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One weekly opening window. Times travel as "HH:mm".
///
/// Deserialization applies the same checks as [`WorkingTimeEntry::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WorkingTimeFields")]
pub struct WorkingTimeEntry {
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u8,
    #[serde(with = "hh_mm")]
    pub start_time: NaiveTime,
    #[serde(with = "hh_mm")]
    pub end_time: NaiveTime,
}

#[derive(Deserialize)]
struct WorkingTimeFields {
    day_of_week: u8,
    #[serde(with = "hh_mm")]
    start_time: NaiveTime,
    #[serde(with = "hh_mm")]
    end_time: NaiveTime,
}

impl WorkingTimeEntry {
    pub fn new(day_of_week: u8, start: &str, end: &str) -> anyhow::Result<Self> {
        Self::checked(day_of_week, hh_mm::parse(start)?, hh_mm::parse(end)?)
    }

    fn checked(day_of_week: u8, start_time: NaiveTime, end_time: NaiveTime) -> anyhow::Result<Self> {
        if day_of_week > 6 {
            anyhow::bail!("day_of_week must be 0..=6, got {}", day_of_week);
        }
        if end_time <= start_time {
            anyhow::bail!(
                "working time ends ({}) before it starts ({})",
                end_time.format("%H:%M"),
                start_time.format("%H:%M")
            );
        }
        Ok(Self {
            day_of_week,
            start_time,
            end_time,
        })
    }
}

impl TryFrom<WorkingTimeFields> for WorkingTimeEntry {
    type Error = anyhow::Error;

    fn try_from(fields: WorkingTimeFields) -> anyhow::Result<Self> {
        Self::checked(fields.day_of_week, fields.start_time, fields.end_time)
    }
}

/// Serde adapter for "HH:mm" times. Also reads the "HH:mm:ss" form Postgres emits.
pub mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn parse(value: &str) -> anyhow::Result<NaiveTime> {
        NaiveTime::parse_from_str(value, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
            .map_err(|e| anyhow::anyhow!("invalid time '{}': {}", value, e))
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Attribute bundle collected by the business setup flow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessDetails {
    pub name: String,
    pub category_id: Option<Uuid>,
    pub description: Option<String>,
    pub bg_colour: Option<String>,
    pub default_currency: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub county: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub is_active_provider: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default)]
    pub twitter_url: Option<String>,
    #[serde(default)]
    pub instagram_url: Option<String>,
    #[serde(default)]
    pub facebook_url: Option<String>,
    #[serde(default)]
    pub other_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessCategory {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRole {
    pub id: Uuid,
    pub role: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_working_time_wire_format() {
        let entry = WorkingTimeEntry::new(1, "09:00", "17:30").unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"day_of_week": 1, "start_time": "09:00", "end_time": "17:30"})
        );

        let from_db: WorkingTimeEntry = serde_json::from_value(serde_json::json!({
            "day_of_week": 2, "start_time": "08:15:00", "end_time": "12:00:00"
        }))
        .unwrap();
        assert_eq!(from_db.start_time, NaiveTime::from_hms_opt(8, 15, 0).unwrap());
    }

    #[test]
    fn test_working_time_rejects_bad_input() {
        assert!(WorkingTimeEntry::new(7, "09:00", "10:00").is_err());
        assert!(WorkingTimeEntry::new(1, "9am", "10:00").is_err());
        assert!(WorkingTimeEntry::new(1, "10:00", "09:00").is_err());
    }

    #[test]
    fn test_deserialize_applies_the_same_checks() {
        let bad_day = serde_json::json!({"day_of_week": 9, "start_time": "09:00", "end_time": "10:00"});
        let err = serde_json::from_value::<WorkingTimeEntry>(bad_day).unwrap_err();
        assert!(err.to_string().contains("day_of_week"));

        let backwards = serde_json::json!({"day_of_week": 3, "start_time": "18:00", "end_time": "09:00"});
        assert!(serde_json::from_value::<WorkingTimeEntry>(backwards).is_err());
    }
}
