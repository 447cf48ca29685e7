// bcctl - CLI for the BigCommerce catalog REST API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Rate-limited fan-out over independent requests.
//!
//! A [`Throttle`] admits a task once it holds one of `max_concurrent`
//! permits *and* at least `min_spacing` has passed since the previous
//! admission. The spacing is global across all tasks, so it bounds the
//! aggregate request rate whatever the concurrency width.

use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::{self, Instant};

pub const DEFAULT_MAX_CONCURRENT: usize = 40;
pub const DEFAULT_MIN_SPACING: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutLimits {
    pub max_concurrent: usize,
    pub min_spacing: Duration,
}

impl Default for FanOutLimits {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            min_spacing: DEFAULT_MIN_SPACING,
        }
    }
}

#[derive(Debug)]
pub struct Throttle {
    permits: Semaphore,
    min_spacing: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(limits: FanOutLimits) -> Self {
        Self {
            // A zero ceiling would never admit anything.
            permits: Semaphore::new(limits.max_concurrent.max(1)),
            min_spacing: limits.min_spacing,
            last_start: Mutex::new(None),
        }
    }

    /// Waits for a free slot and for the spacing window, then records the
    /// start. The slot is released when the returned permit is dropped.
    pub async fn admit(&self) -> Option<SemaphorePermit<'_>> {
        // The semaphore is never closed, so acquiring only fails on misuse.
        let permit = self.permits.acquire().await.ok();

        let mut last_start = self.last_start.lock().await;
        if let Some(previous) = *last_start {
            time::sleep_until(previous + self.min_spacing).await;
        }
        *last_start = Some(Instant::now());

        permit
    }
}

/// Settled results of a fan-out, index-aligned with the submitted tasks.
#[derive(Debug)]
pub struct FanOutReport<T, E> {
    pub outcomes: Vec<Result<T, E>>,
}

impl<T, E> FanOutReport<T, E> {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &E)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(idx, outcome)| outcome.as_ref().err().map(|e| (idx, e)))
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn successes(&self) -> impl Iterator<Item = (usize, &T)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(idx, outcome)| outcome.as_ref().ok().map(|v| (idx, v)))
    }
}

/// Runs every task under `limits` and waits for all of them to settle.
///
/// Tasks are started lazily, so a task's request is only built once it is
/// admitted. A failing task does not cancel the others; its error is kept
/// at its own index.
pub async fn run_all<T, E, F, Fut, I>(tasks: I, limits: FanOutLimits) -> FanOutReport<T, E>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let throttle = Throttle::new(limits);
    let throttle = &throttle;

    let outcomes = join_all(tasks.into_iter().map(|task| async move {
        let _permit = throttle.admit().await;
        task().await
    }))
    .await;

    FanOutReport { outcomes }
}
