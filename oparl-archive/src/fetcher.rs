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

//! HTTP access to OParl endpoints.
//!
//! The [`Fetch`] trait is the capability boundary: nothing outside this
//! module makes a network call. [`HttpFetcher`] is the production
//! implementation with a per-host concurrency budget, bounded retries with
//! exponential backoff and a `Retry-After`-respecting 429 path.

use std::{
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
	time::{Duration, Instant},
};

use async_stream::try_stream;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{BoxStream, TryStreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{ArchiveError, Result};

const RETRY_BASE: Duration = Duration::from_millis(500);

/// One page of an OParl list endpoint.
#[derive(Debug, Clone, Default)]
pub struct Page {
	pub items: Vec<Value>,
	pub next: Option<String>,
	pub total_pages: Option<u32>,
}

impl Page {
	/// Parse an OParl list envelope (`data` + `links` + `pagination`).
	/// Bare arrays are tolerated; some servers return them for short lists.
	pub fn from_envelope(value: Value) -> Result<Self> {
		match value {
			Value::Array(items) => Ok(Page { items, next: None, total_pages: None }),
			Value::Object(mut map) => {
				let items = match map.remove("data") {
					Some(Value::Array(items)) => items,
					_ => return Err(ArchiveError::MissingField { kind: "list", field: "data" }),
				};
				let next = map
					.get("links")
					.and_then(|links| links.get("next"))
					.and_then(Value::as_str)
					.map(str::to_owned);
				let total_pages = map
					.get("pagination")
					.and_then(|p| p.get("totalPages"))
					.and_then(Value::as_u64)
					.and_then(|n| u32::try_from(n).ok());
				Ok(Page { items, next, total_pages })
			}
			other => Err(ArchiveError::NotOParl(format!("list endpoint returned {}", json_kind(&other)))),
		}
	}
}

fn json_kind(v: &Value) -> &'static str {
	match v {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

/// Request counters, snapshotted by the orchestrator at job end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
	pub http_requests: u64,
	pub cache_hits: u64,
	pub retries: u64,
	pub http_time: Duration,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FetcherConfig {
	/// Maximum concurrent requests per upstream host.
	#[serde(default = "default_max_concurrent")]
	pub max_concurrent: usize,
	/// Timeout for a single HTTP request, in seconds.
	#[serde(default = "default_request_timeout")]
	pub request_timeout: u64,
	/// Attempts per request before a transient failure becomes permanent.
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
}

impl Default for FetcherConfig {
	fn default() -> Self {
		Self {
			max_concurrent: default_max_concurrent(),
			request_timeout: default_request_timeout(),
			max_attempts: default_max_attempts(),
		}
	}
}

const fn default_max_concurrent() -> usize {
	8
}

const fn default_request_timeout() -> u64 {
	30
}

const fn default_max_attempts() -> u32 {
	3
}

/// The fetch capability consumed by the sync engine.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
	/// Single GET of one OParl object, served from the in-memory cache when
	/// possible.
	async fn fetch_object(&self, url: &str) -> Result<Value>;

	/// Single GET bypassing the cache (URL auto-detection must see live
	/// data).
	async fn fetch_object_uncached(&self, url: &str) -> Result<Value>;

	/// Lazily fetch the pages of a list endpoint in upstream order.
	/// `modified_since` is appended as a query parameter when given.
	fn fetch_list<'a>(&'a self, url: &str, modified_since: Option<DateTime<Utc>>) -> BoxStream<'a, Result<Page>>;

	/// Eagerly collect all items of a list.
	async fn fetch_list_all(&self, url: &str, modified_since: Option<DateTime<Utc>>) -> Result<Vec<Value>> {
		self.fetch_list(url, modified_since)
			.try_fold(Vec::new(), |mut acc, page| async move {
				acc.extend(page.items);
				Ok(acc)
			})
			.await
	}

	fn stats(&self) -> FetchStats;
}

#[derive(Default)]
struct Counters {
	http_requests: AtomicU64,
	cache_hits: AtomicU64,
	retries: AtomicU64,
	http_time_ms: AtomicU64,
}

/// Production [`Fetch`] implementation over reqwest.
pub struct HttpFetcher {
	client: reqwest::Client,
	config: FetcherConfig,
	hosts: Mutex<hashbrown::HashMap<String, Arc<Semaphore>>>,
	cache: Mutex<hashbrown::HashMap<String, Value>>,
	counters: Counters,
	cancel: CancellationToken,
}

impl HttpFetcher {
	pub fn new(config: FetcherConfig, cancel: CancellationToken) -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(config.request_timeout))
			.user_agent(concat!("oparl-archive/", env!("CARGO_PKG_VERSION")))
			.build()?;
		Ok(Self {
			client,
			config,
			hosts: Mutex::new(hashbrown::HashMap::new()),
			cache: Mutex::new(hashbrown::HashMap::new()),
			counters: Counters::default(),
			cancel,
		})
	}

	fn host_semaphore(&self, url: &str) -> Arc<Semaphore> {
		let key = url::Url::parse(url)
			.ok()
			.and_then(|u| u.host_str().map(str::to_owned))
			.unwrap_or_else(|| url.to_owned());
		self.hosts
			.lock()
			.entry(key)
			.or_insert_with(|| Arc::new(Semaphore::new(self.config.max_concurrent)))
			.clone()
	}

	/// GET `url` as JSON with bounded retries. Transient failures (5xx, 429,
	/// timeout, connect) back off exponentially; everything else surfaces
	/// immediately.
	async fn get_json(&self, url: &str) -> Result<Value> {
		let semaphore = self.host_semaphore(url);
		for attempt in 1..=self.config.max_attempts {
			if self.cancel.is_cancelled() {
				return Err(ArchiveError::Cancelled);
			}
			let permit = semaphore.acquire().await.map_err(|_| ArchiveError::Cancelled)?;
			let started = Instant::now();
			let response = self.client.get(url).send().await;
			self.counters.http_requests.fetch_add(1, Ordering::Relaxed);
			self.counters.http_time_ms.fetch_add(started.elapsed().as_millis() as u64, Ordering::Relaxed);
			drop(permit);

			let delay = match response {
				Ok(resp) => {
					let status = resp.status();
					if status.is_success() {
						return resp.json::<Value>().await.map_err(Into::into);
					}
					if status.as_u16() == 429 {
						parse_retry_after(resp.headers()).unwrap_or_else(|| backoff(attempt))
					} else if status.is_server_error() {
						backoff(attempt)
					} else {
						return Err(ArchiveError::Status { code: status.as_u16(), url: url.to_owned() });
					}
				}
				Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => backoff(attempt),
				Err(e) => return Err(e.into()),
			};

			if attempt == self.config.max_attempts {
				break;
			}
			self.counters.retries.fetch_add(1, Ordering::Relaxed);
			log::debug!("retrying {url} in {delay:?} (attempt {attempt})");
			tokio::select! {
				_ = tokio::time::sleep(delay) => {}
				_ = self.cancel.cancelled() => return Err(ArchiveError::Cancelled),
			}
		}
		Err(ArchiveError::RetriesExhausted { url: url.to_owned(), attempts: self.config.max_attempts })
	}
}

fn backoff(attempt: u32) -> Duration {
	RETRY_BASE * 2u32.saturating_pow(attempt.saturating_sub(1))
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
	headers
		.get(reqwest::header::RETRY_AFTER)
		.and_then(|v| v.to_str().ok())
		.and_then(|s| s.trim().parse::<u64>().ok())
		.map(Duration::from_secs)
}

/// Append `modified_since` to a list URL, preserving any query the server
/// put into its own pagination links.
fn build_list_url(url: &str, modified_since: Option<DateTime<Utc>>) -> Result<String> {
	match modified_since {
		None => Ok(url.to_owned()),
		Some(since) => {
			let mut parsed = url::Url::parse(url)?;
			parsed
				.query_pairs_mut()
				.append_pair("modified_since", &since.to_rfc3339_opts(SecondsFormat::Secs, true));
			Ok(parsed.into())
		}
	}
}

#[async_trait::async_trait]
impl Fetch for HttpFetcher {
	async fn fetch_object(&self, url: &str) -> Result<Value> {
		if let Some(hit) = self.cache.lock().get(url).cloned() {
			self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
			return Ok(hit);
		}
		let value = self.get_json(url).await?;
		self.cache.lock().insert(url.to_owned(), value.clone());
		Ok(value)
	}

	async fn fetch_object_uncached(&self, url: &str) -> Result<Value> {
		self.get_json(url).await
	}

	fn fetch_list<'a>(&'a self, url: &str, modified_since: Option<DateTime<Utc>>) -> BoxStream<'a, Result<Page>> {
		let first = build_list_url(url, modified_since);
		Box::pin(try_stream! {
			let mut next = Some(first?);
			while let Some(url) = next.take() {
				if self.cancel.is_cancelled() {
					Err::<(), _>(ArchiveError::Cancelled)?;
				}
				let value = self.get_json(&url).await?;
				let page = Page::from_envelope(value)?;
				next = page.next.clone();
				yield page;
			}
		})
	}

	fn stats(&self) -> FetchStats {
		FetchStats {
			http_requests: self.counters.http_requests.load(Ordering::Relaxed),
			cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
			retries: self.counters.retries.load(Ordering::Relaxed),
			http_time: Duration::from_millis(self.counters.http_time_ms.load(Ordering::Relaxed)),
		}
	}
}

#[cfg(any(test, feature = "test-util"))]
pub use self::mock::MockFetcher;

#[cfg(any(test, feature = "test-util"))]
mod mock {
	//! A scripted fetcher for tests: pages and objects are registered per
	//! URL, requests are recorded, and `modified_since` handling can be
	//! toggled to emulate servers that silently ignore the filter.

	use super::*;
	use crate::processor::parse_datetime;

	#[derive(Default)]
	pub struct MockFetcher {
		objects: Mutex<hashbrown::HashMap<String, Value>>,
		lists: Mutex<hashbrown::HashMap<String, Vec<Vec<Value>>>>,
		failing: Mutex<hashbrown::HashMap<String, u16>>,
		honors_filter: bool,
		requests: Mutex<Vec<String>>,
		counters: Counters,
	}

	impl MockFetcher {
		pub fn new() -> Self {
			Self::default()
		}

		/// Register a single-object response.
		pub fn object(self, url: &str, value: Value) -> Self {
			self.objects.lock().insert(url.to_owned(), value);
			self
		}

		/// Register the pages served by a list endpoint.
		pub fn pages(self, url: &str, pages: Vec<Vec<Value>>) -> Self {
			self.lists.lock().insert(url.to_owned(), pages);
			self
		}

		/// Serve `status` for every request against `url`.
		pub fn failing(self, url: &str, status: u16) -> Self {
			self.failing.lock().insert(url.to_owned(), status);
			self
		}

		/// Make list endpoints actually apply `modified_since`. Off by
		/// default, which emulates the servers that ignore the parameter.
		pub fn honoring_modified_since(mut self) -> Self {
			self.honors_filter = true;
			self
		}

		/// URLs requested so far, in order.
		pub fn requested(&self) -> Vec<String> {
			self.requests.lock().clone()
		}

		fn record(&self, url: &str) -> Result<()> {
			self.requests.lock().push(url.to_owned());
			self.counters.http_requests.fetch_add(1, Ordering::Relaxed);
			if let Some(status) = self.failing.lock().get(url) {
				return Err(ArchiveError::Status { code: *status, url: url.to_owned() });
			}
			Ok(())
		}

		fn list_pages(&self, url: &str) -> Result<Vec<Vec<Value>>> {
			self.record(url)?;
			self.lists
				.lock()
				.get(url)
				.cloned()
				.ok_or_else(|| ArchiveError::Status { code: 404, url: url.to_owned() })
		}
	}

	#[async_trait::async_trait]
	impl Fetch for MockFetcher {
		async fn fetch_object(&self, url: &str) -> Result<Value> {
			self.fetch_object_uncached(url).await
		}

		async fn fetch_object_uncached(&self, url: &str) -> Result<Value> {
			self.record(url)?;
			self.objects
				.lock()
				.get(url)
				.cloned()
				.ok_or_else(|| ArchiveError::Status { code: 404, url: url.to_owned() })
		}

		fn fetch_list<'a>(&'a self, url: &str, modified_since: Option<DateTime<Utc>>) -> BoxStream<'a, Result<Page>> {
			let url = url.to_owned();
			let filter = self.honors_filter.then_some(modified_since).flatten();
			Box::pin(try_stream! {
				let pages = self.list_pages(&url)?;
				let total = u32::try_from(pages.len()).ok();
				for (index, items) in pages.into_iter().enumerate() {
					if index > 0 {
						self.record(&format!("{url}?page={}", index + 1))?;
					}
					let items = match filter {
						// a well-behaved server keeps tombstones and items
						// without a modified timestamp in the result
						Some(since) => items
							.into_iter()
							.filter(|item| {
								item.get("modified")
									.and_then(Value::as_str)
									.and_then(parse_datetime)
									.map_or(true, |modified| modified >= since)
							})
							.collect(),
						None => items,
					};
					yield Page { items, next: None, total_pages: total };
				}
			})
		}

		fn stats(&self) -> FetchStats {
			FetchStats {
				http_requests: self.counters.http_requests.load(Ordering::Relaxed),
				cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
				retries: self.counters.retries.load(Ordering::Relaxed),
				http_time: Duration::default(),
			}
		}
	}
}
