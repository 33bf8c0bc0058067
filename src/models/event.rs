//! Calendar event model as returned by Graph.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Online meeting provider that supports breakouts.
pub const TEAMS_PROVIDER: &str = "teamsForBusiness";

/// Graph `dateTimeTimeZone` value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeTimeZone {
    pub date_time: String,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

impl DateTimeTimeZone {
    /// Interpret the value as a UTC instant.
    ///
    /// Graph returns calendar times in UTC unless asked otherwise, as a naive
    /// timestamp with seven fractional digits.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.date_time) {
            return Some(dt.with_timezone(&Utc));
        }
        if !self.time_zone.eq_ignore_ascii_case("UTC") {
            tracing::warn!(
                time_zone = %self.time_zone,
                "Non-UTC event time, interpreting as UTC"
            );
        }
        NaiveDateTime::parse_from_str(&self.date_time, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Join information of an event's online meeting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnlineMeetingInfo {
    pub join_url: String,
}

/// A calendar event of the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_preview: Option<String>,
    pub start: DateTimeTimeZone,
    pub end: DateTimeTimeZone,
    #[serde(default)]
    pub is_online_meeting: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_meeting_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_meeting: Option<OnlineMeetingInfo>,
}

impl CalendarEvent {
    /// Breakouts are only offered for Teams online meetings.
    pub fn is_teams_meeting(&self) -> bool {
        self.is_online_meeting
            && self.online_meeting_provider.as_deref() == Some(TEAMS_PROVIDER)
            && self.join_url().is_some()
    }

    pub fn join_url(&self) -> Option<&str> {
        self.online_meeting
            .as_ref()
            .map(|m| m.join_url.as_str())
            .filter(|url| !url.is_empty())
    }

    /// Name of the team backing this event's breakouts.
    pub fn breakout_team_name(&self) -> String {
        format!("{} Breakouts", self.subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event() -> CalendarEvent {
        serde_json::from_value(serde_json::json!({
            "id": "evt-1",
            "subject": "Weekly sync",
            "start": { "dateTime": "2026-10-19T15:00:00.0000000", "timeZone": "UTC" },
            "end": { "dateTime": "2026-10-19T16:00:00.0000000", "timeZone": "UTC" },
            "isOnlineMeeting": true,
            "onlineMeetingProvider": "teamsForBusiness",
            "onlineMeeting": { "joinUrl": "https://teams.microsoft.com/l/meetup-join/19%3ameeting_x%40thread.v2/0" }
        }))
        .unwrap()
    }

    #[test]
    fn test_graph_time_parses_as_utc() {
        let e = event();
        assert_eq!(
            e.start.to_utc().unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 19, 15, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_rfc3339_time_is_accepted() {
        let t = DateTimeTimeZone {
            date_time: "2026-10-19T17:00:00+02:00".to_string(),
            time_zone: "UTC".to_string(),
        };
        assert_eq!(
            t.to_utc().unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 19, 15, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_teams_meeting_detection() {
        let mut e = event();
        assert!(e.is_teams_meeting());
        assert_eq!(e.breakout_team_name(), "Weekly sync Breakouts");

        e.online_meeting_provider = Some("skypeForBusiness".to_string());
        assert!(!e.is_teams_meeting());

        let mut e = event();
        e.online_meeting = None;
        assert!(!e.is_teams_meeting());
    }
}
