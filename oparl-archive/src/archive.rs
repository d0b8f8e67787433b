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

//! Entry point: build an [`Archive`] and run sync jobs against it.

use std::{env, sync::Arc};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
	cache::IdentityCache,
	database::{Database, Store},
	error::Result,
	events::{Clock, EventSink, LogEventSink, SystemClock},
	fetcher::{Fetch, FetcherConfig, HttpFetcher},
	metrics::{Metrics, NullMetrics},
	sync::{self, SyncOptions, SyncResult},
};

const POSTGRES_VAR: &str = "DATABASE_URL";
const MAX_CONCURRENT_VAR: &str = "OPARL_MAX_CONCURRENT";

pub struct ArchiveBuilder {
	/// url to the Postgres database
	pg_url: Option<String>,
	fetcher_config: FetcherConfig,
	tuning: sync::pipeline::PipelineTuning,
	events: Arc<dyn EventSink>,
	metrics: Arc<dyn Metrics>,
	clock: Arc<dyn Clock>,
}

impl Default for ArchiveBuilder {
	fn default() -> Self {
		Self {
			pg_url: None,
			fetcher_config: FetcherConfig::default(),
			tuning: Default::default(),
			events: Arc::new(LogEventSink),
			metrics: Arc::new(NullMetrics),
			clock: Arc::new(SystemClock),
		}
	}
}

impl ArchiveBuilder {
	/// Set the url to the Postgres database.
	///
	/// # Default
	/// defaults to the value of the environment variable `DATABASE_URL`
	pub fn pg_url<S: Into<String>>(mut self, url: Option<S>) -> Self {
		self.pg_url = url.map(Into::into);
		self
	}

	/// Set the per-host ceiling for concurrent upstream requests.
	///
	/// # Default
	/// 8, or the environment variable `OPARL_MAX_CONCURRENT`
	pub fn max_concurrent(mut self, max: Option<usize>) -> Self {
		if let Some(max) = max {
			self.fetcher_config.max_concurrent = max;
		}
		self
	}

	/// Set the per-request timeout in seconds.
	///
	/// # Default
	/// 30 seconds
	pub fn request_timeout(mut self, secs: Option<u64>) -> Self {
		if let Some(secs) = secs {
			self.fetcher_config.request_timeout = secs;
		}
		self
	}

	/// Replace the event sink (defaults to logging).
	pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
		self.events = events;
		self
	}

	/// Replace the metrics recorder (defaults to a no-op).
	pub fn metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
		self.metrics = metrics;
		self
	}

	/// Replace the clock (tests pin it).
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// Override the early-stop window. The defaults are part of the sync
	/// contract; integration tests shrink them.
	pub fn tuning(mut self, tuning: sync::pipeline::PipelineTuning) -> Self {
		self.tuning = tuning;
		self
	}

	/// Connect to the database and verify the schema sentinel. Fails before
	/// any job can start when the migration tool has not run.
	pub async fn build(mut self) -> Result<Archive> {
		let pg_url = match self.pg_url.take() {
			Some(url) => url,
			None => env::var(POSTGRES_VAR)?,
		};
		if let Ok(max) = env::var(MAX_CONCURRENT_VAR) {
			if let Ok(max) = max.parse::<usize>() {
				self.fetcher_config.max_concurrent = max;
			}
		}
		let db = Database::new(&pg_url).await?;
		db.ensure_schema().await?;
		Ok(Archive {
			db,
			fetcher_config: self.fetcher_config,
			tuning: self.tuning,
			events: self.events,
			metrics: self.metrics,
			clock: self.clock,
			cancel: CancellationToken::new(),
		})
	}
}

/// A connected sync engine. One instance drives any number of source jobs;
/// each job gets its own fetcher and identity cache.
pub struct Archive {
	db: Database,
	fetcher_config: FetcherConfig,
	tuning: sync::pipeline::PipelineTuning,
	events: Arc<dyn EventSink>,
	metrics: Arc<dyn Metrics>,
	clock: Arc<dyn Clock>,
	cancel: CancellationToken,
}

impl Archive {
	pub fn builder() -> ArchiveBuilder {
		ArchiveBuilder::default()
	}

	/// Token observed by every in-flight job. Cancelling drains current
	/// upserts and returns partial results.
	pub fn cancel_token(&self) -> CancellationToken {
		self.cancel.clone()
	}

	/// One store per job: the identity cache must not leak claims across
	/// source jobs.
	fn job_store(&self) -> Store {
		Store::new(self.db.clone(), IdentityCache::new(), self.clock.clone())
	}

	fn http_fetcher(&self) -> Result<Arc<dyn Fetch>> {
		Ok(Arc::new(HttpFetcher::new(self.fetcher_config.clone(), self.cancel.child_token())?))
	}

	/// Register a new source: fetch its endpoint, store URL, name and the
	/// raw system document.
	pub async fn add_source(&self, url: &str, name: Option<&str>) -> Result<(Uuid, String)> {
		let fetcher = self.http_fetcher()?;
		let system = fetcher.fetch_object_uncached(url).await?;
		let name = name
			.map(str::to_owned)
			.or_else(|| system.get("name").and_then(Value::as_str).map(str::to_owned))
			.unwrap_or_else(|| "Unknown Source".to_owned());
		let id = self.job_store().upsert_source(url, &name, &system).await?;
		log::info!("registered source {name} ({url})");
		Ok((id, name))
	}

	/// Run one source job against the production fetcher.
	pub async fn sync_source(&self, url: &str, opts: &SyncOptions) -> Result<SyncResult> {
		let fetcher = self.http_fetcher()?;
		Ok(self.sync_source_with(fetcher, url, opts).await)
	}

	/// Run one source job against an injected fetch capability. This is the
	/// seam scripted fetchers plug into.
	pub async fn sync_source_with(&self, fetcher: Arc<dyn Fetch>, url: &str, opts: &SyncOptions) -> SyncResult {
		sync::sync_source(
			self.job_store(),
			fetcher,
			self.events.clone(),
			self.metrics.clone(),
			self.cancel.child_token(),
			self.tuning,
			url,
			opts,
		)
		.await
	}

	/// Sync every registered source, in parallel unless `sequential`.
	pub async fn sync_all(&self, opts: &SyncOptions, sequential: bool) -> Result<Vec<SyncResult>> {
		let sources = self.job_store().get_all_sources().await?;
		if sources.is_empty() {
			log::warn!("no sources registered; use add-source first");
			return Ok(Vec::new());
		}

		let mut results = Vec::with_capacity(sources.len());
		if sequential {
			for source in &sources {
				results.push(self.sync_source(&source.url, opts).await?);
			}
		} else {
			let jobs = sources.iter().map(|source| self.sync_source(&source.url, opts));
			for result in futures::future::join_all(jobs).await {
				results.push(result?);
			}
		}
		Ok(results)
	}

	/// Per-kind row counts.
	pub async fn status(&self) -> Result<Vec<(&'static str, i64)>> {
		self.job_store().stats().await
	}
}
