// ABOUTME: Common data models for credentials, tasks, locations, and snapshots
// ABOUTME: Stored rows keep token fields as envelopes; plaintext never touches these types
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common data models shared across the service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// External services a credential can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Google Calendar (currently the only provider)
    GoogleCalendar,
}

impl Provider {
    /// Stable identifier used as the database key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GoogleCalendar => "google_calendar",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google_calendar" => Ok(Self::GoogleCalendar),
            other => Err(AppError::invalid_input(format!("unknown provider: {other}"))),
        }
    }
}

/// Stored OAuth credential, one row per (user, provider).
///
/// Token fields hold envelopes produced by the crypto module, never
/// plaintext. Decryption happens at the refresh engine, not here.
#[derive(Debug, Clone)]
pub struct OAuthCredential {
    /// Row identifier
    pub id: String,
    /// Owner of the credential
    pub user_id: Uuid,
    /// External service the credential belongs to
    pub provider: Provider,
    /// Envelope-encoded access token, always present while the row exists
    pub access_token: String,
    /// Envelope-encoded refresh token; not all grants reissue one
    pub refresh_token: Option<String>,
    /// Instant after which the access token is stale; `None` means unknown
    pub expires_at: Option<DateTime<Utc>>,
    /// Space-delimited granted scopes, informational
    pub scope: Option<String>,
    /// Set by the store on insert
    pub created_at: DateTime<Utc>,
    /// Set by the store on every write
    pub updated_at: DateTime<Utc>,
}

/// Field-wise partial update for the credential vault.
///
/// Presence (`Some`) decides what gets written; providers frequently omit
/// the refresh token on refresh responses and the vault must never erase a
/// previously granted one.
#[derive(Debug, Clone, Default)]
pub struct CredentialUpdate {
    /// New plaintext access token, encrypted by the vault on write
    pub access_token: Option<String>,
    /// New plaintext refresh token, only when the provider reissued one
    pub refresh_token: Option<String>,
    /// New expiry instant
    pub expires_at: Option<DateTime<Utc>>,
    /// Newly granted scopes
    pub scope: Option<String>,
}

/// Task importance levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskImportance {
    /// Low priority
    Low,
    /// Medium priority (the default)
    #[default]
    Medium,
    /// High priority
    High,
}

impl TaskImportance {
    /// Stable identifier used as the database value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for TaskImportance {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(AppError::invalid_input(format!(
                "unknown task importance: {other}"
            ))),
        }
    }
}

/// A task owned by a single user
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    /// Task identifier
    pub id: Uuid,
    /// Owner of the task
    pub user_id: Uuid,
    /// Short title
    pub title: String,
    /// Longer free-form description
    pub description: Option<String>,
    /// When the task is due
    pub due_date: Option<DateTime<Utc>>,
    /// Whether the task has been completed
    pub is_complete: bool,
    /// Importance level
    pub importance: TaskImportance,
    /// Set by the store on insert
    pub created_at: DateTime<Utc>,
    /// Set by the store on every write
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a task
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    /// Short title, required and non-empty
    pub title: String,
    /// Longer free-form description
    pub description: Option<String>,
    /// When the task is due
    pub due_date: Option<DateTime<Utc>>,
    /// Importance level; defaults to medium when omitted
    pub importance: Option<TaskImportance>,
}

/// Latest known location for one user.
///
/// Held only in the process-wide cache; overwritten on each update and
/// lost on restart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Reported accuracy in meters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// Time section of a context snapshot
#[derive(Debug, Clone, Serialize)]
pub struct TimeContext {
    /// Wall-clock time in the configured timezone, `HH:MM:SS`
    pub current_time: String,
    /// Date in the configured timezone, `YYYY-MM-DD`
    pub current_date: String,
    /// IANA timezone name the fields were rendered in
    pub timezone: String,
}

/// Calendar event normalized to the fixed snapshot shape.
///
/// Missing upstream fields map to `None` rather than propagating
/// provider-specific structures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    /// Event start; RFC 3339 for timed events, `YYYY-MM-DD` for all-day
    pub start_time: Option<String>,
    /// Event end, same encoding as the start
    pub end_time: Option<String>,
    /// Event title
    pub summary: Option<String>,
    /// Free-form location text
    pub location: Option<String>,
}

/// Calendar section of a context snapshot
#[derive(Debug, Clone, Serialize)]
pub struct CalendarContext {
    /// Upcoming events ordered by start time
    pub upcoming_events: Vec<CalendarEvent>,
}

/// Point-in-time context snapshot assembled per request.
///
/// Each section's absence is a valid, expected outcome; one source's
/// failure never affects another's inclusion.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnapshot {
    /// Owner the snapshot was built for
    pub user_id: Uuid,
    /// When the snapshot was assembled
    pub timestamp: DateTime<Utc>,
    /// Current time in the configured timezone
    pub time: Option<TimeContext>,
    /// Latest cached location, if any was recorded
    pub location: Option<LocationSample>,
    /// Upcoming calendar events, absent when the lookup failed
    pub calendar: Option<CalendarContext>,
    /// The user's tasks; empty when the lookup failed
    pub tasks: Vec<Task>,
}
