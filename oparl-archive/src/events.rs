// Copyright 2024-2026 The oparl-archive authors.
// This file is part of oparl-archive.

// oparl-archive is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// oparl-archive is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with oparl-archive.  If not, see <http://www.gnu.org/licenses/>.

//! Lifecycle events and the clock, both injected collaborators.
//!
//! Event emission is fire-and-forget: implementations must swallow their own
//! failures. A broken event sink never aborts a sync.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Details of a freshly mirrored meeting, for downstream notification.
#[derive(Debug, Clone)]
pub struct NewMeeting<'a> {
	pub external_id: &'a str,
	pub name: Option<&'a str>,
	pub body_name: Option<&'a str>,
	pub start: Option<DateTime<Utc>>,
}

/// Details of a freshly mirrored paper.
#[derive(Debug, Clone)]
pub struct NewPaper<'a> {
	pub external_id: &'a str,
	pub name: Option<&'a str>,
	pub body_name: Option<&'a str>,
	pub paper_type: Option<&'a str>,
}

#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
	async fn sync_started(&self, source_url: &str, source_name: &str, full_sync: bool);

	async fn sync_completed(
		&self,
		source_url: &str,
		source_name: &str,
		duration: Duration,
		entities_synced: u64,
		errors: usize,
	);

	async fn sync_failed(&self, source_url: &str, source_name: &str, error: &str, duration: Duration);

	async fn new_meeting(&self, meeting: NewMeeting<'_>);

	async fn new_paper(&self, paper: NewPaper<'_>);
}

/// Default sink: events go to the log.
pub struct LogEventSink;

#[async_trait::async_trait]
impl EventSink for LogEventSink {
	async fn sync_started(&self, source_url: &str, source_name: &str, full_sync: bool) {
		let mode = if full_sync { "full" } else { "incremental" };
		log::info!("sync started: {source_name} ({source_url}), {mode}");
	}

	async fn sync_completed(
		&self,
		_source_url: &str,
		source_name: &str,
		duration: Duration,
		entities_synced: u64,
		errors: usize,
	) {
		log::info!("sync completed: {source_name}, {entities_synced} entities in {duration:.1?}, {errors} errors");
	}

	async fn sync_failed(&self, _source_url: &str, source_name: &str, error: &str, duration: Duration) {
		log::error!("sync failed: {source_name} after {duration:.1?}: {error}");
	}

	async fn new_meeting(&self, meeting: NewMeeting<'_>) {
		log::debug!("new meeting {} ({:?})", meeting.external_id, meeting.name);
	}

	async fn new_paper(&self, paper: NewPaper<'_>) {
		log::debug!("new paper {} ({:?})", paper.external_id, paper.name);
	}
}

/// Sink that drops everything. Used by tests and one-shot commands.
pub struct NullEventSink;

#[async_trait::async_trait]
impl EventSink for NullEventSink {
	async fn sync_started(&self, _: &str, _: &str, _: bool) {}
	async fn sync_completed(&self, _: &str, _: &str, _: Duration, _: u64, _: usize) {}
	async fn sync_failed(&self, _: &str, _: &str, _: &str, _: Duration) {}
	async fn new_meeting(&self, _: NewMeeting<'_>) {}
	async fn new_paper(&self, _: NewPaper<'_>) {}
}

/// Broadcasts every event to a set of sinks. Deployments typically combine
/// the log sink with an external notification channel.
pub struct FanoutEventSink {
	sinks: Vec<std::sync::Arc<dyn EventSink>>,
}

impl FanoutEventSink {
	pub fn new(sinks: Vec<std::sync::Arc<dyn EventSink>>) -> Self {
		Self { sinks }
	}
}

#[async_trait::async_trait]
impl EventSink for FanoutEventSink {
	async fn sync_started(&self, source_url: &str, source_name: &str, full_sync: bool) {
		for sink in &self.sinks {
			sink.sync_started(source_url, source_name, full_sync).await;
		}
	}

	async fn sync_completed(
		&self,
		source_url: &str,
		source_name: &str,
		duration: Duration,
		entities_synced: u64,
		errors: usize,
	) {
		for sink in &self.sinks {
			sink.sync_completed(source_url, source_name, duration, entities_synced, errors).await;
		}
	}

	async fn sync_failed(&self, source_url: &str, source_name: &str, error: &str, duration: Duration) {
		for sink in &self.sinks {
			sink.sync_failed(source_url, source_name, error, duration).await;
		}
	}

	async fn new_meeting(&self, meeting: NewMeeting<'_>) {
		for sink in &self.sinks {
			sink.new_meeting(meeting.clone()).await;
		}
	}

	async fn new_paper(&self, paper: NewPaper<'_>) {
		for sink in &self.sinks {
			sink.new_paper(paper.clone()).await;
		}
	}
}

/// Wall-clock source, mockable for tests.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock pinned to one instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		self.0
	}
}
