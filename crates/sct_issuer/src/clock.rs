// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

use crate::UnixTimestamp;
use chrono::Utc;

/// Source of SCT timestamps.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> UnixTimestamp;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_millis(&self) -> UnixTimestamp {
        (**self).now_millis()
    }
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> UnixTimestamp {
        // Clamp pre-epoch clocks to zero; timestamps are unsigned.
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
    }
}

/// A clock stopped at a fixed instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedClock(pub UnixTimestamp);

impl Clock for FixedClock {
    fn now_millis(&self) -> UnixTimestamp {
        self.0
    }
}
