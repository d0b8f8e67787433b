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

//! Mirrors OParl council-information endpoints into a PostgreSQL database.
//!
//! One registered *source* points at an upstream System, Body or Body-list
//! URL. A sync job turns that URL into a consistent local copy: bodies in
//! parallel, entity kinds in dependency order, incremental where the
//! upstream allows it, tolerant of the partial failures municipal servers
//! are fond of.

#![forbid(unsafe_code)]

pub mod archive;
mod cache;
pub mod database;
mod error;
pub mod events;
pub mod fetcher;
mod logger;
pub mod metrics;
pub mod processor;
pub mod sync;
mod types;

pub use self::archive::{Archive, ArchiveBuilder};
pub use self::cache::IdentityCache;
pub use self::database::{Database, DatabaseConfig, Store};
pub use self::error::{ArchiveError, Result};
pub use self::events::{Clock, EventSink, FanoutEventSink, FixedClock, LogEventSink, NullEventSink, SystemClock};
pub use self::fetcher::{Fetch, FetchStats, FetcherConfig, HttpFetcher, Page};
pub use self::logger::{default_dir, init as init_logger};
pub use self::metrics::{CountingMetrics, Metrics, NullMetrics};
pub use self::sync::pipeline::{PipelineStats, PipelineTuning, SyncMode, MIN_PAGES, STALE_PAGES};
pub use self::sync::{SyncOptions, SyncResult};
pub use self::types::*;

#[cfg(any(test, feature = "test-util"))]
pub use self::fetcher::MockFetcher;
