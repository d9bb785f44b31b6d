// ABOUTME: Process-wide cache of the latest reported location per user
// ABOUTME: Last write wins; contents do not survive a restart
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::models::LocationSample;

/// Latest-value location store, keyed by user
#[derive(Default)]
pub struct LocationCache {
    samples: DashMap<Uuid, LocationSample>,
}

impl LocationCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user's location, replacing any previous sample
    pub fn record(&self, user_id: Uuid, sample: LocationSample) {
        debug!(%user_id, latitude = sample.latitude, longitude = sample.longitude, "recorded location");
        self.samples.insert(user_id, sample);
    }

    /// The most recently recorded location for a user, if any
    #[must_use]
    pub fn latest(&self, user_id: Uuid) -> Option<LocationSample> {
        self.samples.get(&user_id).map(|entry| *entry.value())
    }
}
