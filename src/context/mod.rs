// ABOUTME: Context snapshot aggregation across independent data sources
// ABOUTME: Partial failure degrades sections; a snapshot is always produced
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Context Aggregation
//!
//! [`ContextService`] assembles a point-in-time snapshot from four
//! sources: the wall clock, the location cache, the calendar provider,
//! and the task store. The two I/O lookups run concurrently; any source's
//! failure is logged and degrades that section alone, so a disconnected
//! calendar never hides the user's tasks.

pub mod location;

pub use location::LocationCache;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{error, info};
use uuid::Uuid;

use crate::calendar::CalendarService;
use crate::database::Database;
use crate::models::{CalendarContext, CalendarEvent, ContextSnapshot, Task, TimeContext};
use crate::oauth::EventResource;

/// Assembles context snapshots for assistant requests
pub struct ContextService {
    calendar: Arc<CalendarService>,
    database: Database,
    locations: Arc<LocationCache>,
    timezone: Tz,
}

impl ContextService {
    /// Create a service rendering time fields in the given timezone
    #[must_use]
    pub fn new(
        calendar: Arc<CalendarService>,
        database: Database,
        locations: Arc<LocationCache>,
        timezone: Tz,
    ) -> Self {
        Self {
            calendar,
            database,
            locations,
            timezone,
        }
    }

    /// The shared location cache, for recording incoming samples
    #[must_use]
    pub fn locations(&self) -> &Arc<LocationCache> {
        &self.locations
    }

    /// Build a snapshot for a user. Never fails: each source's failure
    /// degrades its own section and is logged with its error class.
    pub async fn build_snapshot(&self, user_id: Uuid) -> ContextSnapshot {
        let timestamp = Utc::now();

        let (calendar_result, tasks_result) = tokio::join!(
            self.calendar.list_upcoming_events(user_id, None),
            self.database.list_tasks(user_id)
        );

        let calendar = match calendar_result {
            Ok(events) => Some(CalendarContext {
                upcoming_events: events.iter().map(normalize_event).collect(),
            }),
            Err(e) if e.is_unauthenticated() => {
                // Expected for users who never connected a calendar.
                info!(%user_id, error = %e, "calendar unavailable, user not authenticated");
                None
            }
            Err(e) => {
                error!(%user_id, error = %e, "calendar lookup failed");
                None
            }
        };

        let tasks: Vec<Task> = match tasks_result {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(%user_id, error = %e, "task lookup failed");
                Vec::new()
            }
        };

        ContextSnapshot {
            user_id,
            timestamp,
            time: Some(self.time_context(timestamp)),
            location: self.locations.latest(user_id),
            calendar,
            tasks,
        }
    }

    fn time_context(&self, timestamp: DateTime<Utc>) -> TimeContext {
        let local = timestamp.with_timezone(&self.timezone);
        TimeContext {
            current_time: local.format("%H:%M:%S").to_string(),
            current_date: local.format("%Y-%m-%d").to_string(),
            timezone: self.timezone.name().to_owned(),
        }
    }
}

/// Normalize a provider event to the fixed snapshot shape, falling back
/// from the precise instant to the all-day date on either boundary.
fn normalize_event(event: &EventResource) -> CalendarEvent {
    let instant = |time: Option<&crate::oauth::EventTime>| {
        time.and_then(|t| t.as_instant()).map(str::to_owned)
    };

    CalendarEvent {
        start_time: instant(event.start.as_ref()),
        end_time: instant(event.end.as_ref()),
        summary: event.summary.clone(),
        location: event.location.clone(),
    }
}
