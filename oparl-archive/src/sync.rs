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

//! The orchestrator: URL auto-detection, source jobs and the per-body
//! dependency DAG.
//!
//! One source job fans out into parallel body jobs. Inside a body, entity
//! pipelines run in dependency order: organizations and persons first (their
//! rows anchor membership FKs), then memberships, then meetings and papers,
//! and finally the four kinds that resolve back-references to them. A
//! failing pipeline or body is isolated; its error lands in the source-level
//! result and every sibling keeps running.

pub mod pipeline;

use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use futures::future::join_all;
use itertools::Itertools;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use self::pipeline::{PipelineStats, PipelineTuning, SyncMode};
use crate::{
	database::Store,
	error::{ArchiveError, Result},
	events::EventSink,
	fetcher::{Fetch, FetchStats},
	metrics::Metrics,
	processor,
	types::{EntityKind, ProcessedBody},
};

/// Options for one source job.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
	/// Ignore the stored high-water mark and scan every page.
	pub full: bool,
	/// Only sync bodies whose name or external id contains this string.
	pub body_filter: Option<String>,
}

/// Aggregated outcome of one source job.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
	pub source_url: String,
	pub source_name: String,
	pub success: bool,
	pub bodies_synced: u64,
	pub organizations_synced: u64,
	pub persons_synced: u64,
	pub memberships_synced: u64,
	pub meetings_synced: u64,
	pub papers_synced: u64,
	pub locations_synced: u64,
	pub agenda_items_synced: u64,
	pub files_synced: u64,
	pub consultations_synced: u64,
	/// Tombstones applied; not counted as synced entities.
	pub tombstones_deleted: u64,
	/// Items skipped over unresolved mandatory references.
	pub items_skipped: u64,
	pub errors: Vec<String>,
	pub duration: Duration,
	pub http_stats: Option<FetchStats>,
}

impl SyncResult {
	fn new(source_url: &str) -> Self {
		Self { source_url: source_url.to_owned(), ..Default::default() }
	}

	/// Entities synced across all kinds (bodies not included).
	pub fn total_synced(&self) -> u64 {
		self.organizations_synced
			+ self.persons_synced
			+ self.memberships_synced
			+ self.meetings_synced
			+ self.papers_synced
			+ self.locations_synced
			+ self.agenda_items_synced
			+ self.files_synced
			+ self.consultations_synced
	}
}

/// Shared context of one source job, passed down to body jobs and pipelines.
pub(crate) struct JobContext {
	pub(crate) store: Store,
	pub(crate) fetcher: Arc<dyn Fetch>,
	pub(crate) events: Arc<dyn EventSink>,
	pub(crate) metrics: Arc<dyn Metrics>,
	pub(crate) cancel: CancellationToken,
	pub(crate) tuning: PipelineTuning,
	pub(crate) source_name: String,
}

/// Identity of the body a pipeline is working for.
pub(crate) struct BodyRef {
	pub(crate) id: Uuid,
	pub(crate) external_id: String,
	pub(crate) name: Option<String>,
}

/// What the configured URL turned out to point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedEndpoint {
	/// A `System` document; its `body` list was followed.
	System,
	/// A single `Body` object.
	Body,
	/// A list envelope of `Body` objects.
	BodyList,
}

/// Fetch `url` once and classify its shape. Upstream systems disagree on
/// what a configured URL points at; all three variants observed in the wild
/// are handled, everything else is an explicit error.
pub(crate) async fn auto_detect(fetcher: &dyn Fetch, url: &str) -> Result<(DetectedEndpoint, Vec<Value>)> {
	let response = fetcher.fetch_object_uncached(url).await?;
	let type_url = response.get("type").and_then(Value::as_str).unwrap_or_default();

	// a System document: follow its body list
	if type_url.ends_with("/System") {
		let bodies = match response.get("body") {
			Some(Value::String(list_url)) => fetcher.fetch_list_all(list_url, None).await?,
			// some systems inline the body URLs as an array
			Some(Value::Array(urls)) => {
				let mut bodies = Vec::with_capacity(urls.len());
				for body_url in urls.iter().filter_map(Value::as_str) {
					bodies.push(fetcher.fetch_object(body_url).await?);
				}
				bodies
			}
			_ => return Err(ArchiveError::NotOParl(format!("System at {url} has no body list"))),
		};
		return Ok((DetectedEndpoint::System, bodies));
	}

	// a single Body object, served without a list envelope
	if type_url.ends_with("/Body") {
		return Ok((DetectedEndpoint::Body, vec![response]));
	}

	// a Body list envelope
	if let Some(Value::Array(items)) = response.get("data") {
		let first_type =
			items.first().and_then(|i| i.get("type")).and_then(Value::as_str).unwrap_or_default();
		if first_type.ends_with("/Body") {
			return Ok((DetectedEndpoint::BodyList, items.clone()));
		}
	}

	Err(ArchiveError::NotOParl(format!(
		"{url} is neither Body, Body-List nor System (type: {})",
		if type_url.is_empty() { "unknown" } else { type_url }
	)))
}

/// Run one source job end to end. Per-body and per-pipeline failures are
/// collected, never propagated; the `Err` path is reserved for failures
/// before any body job starts (unreachable endpoint, no bodies).
pub(crate) async fn sync_source(
	store: Store,
	fetcher: Arc<dyn Fetch>,
	events: Arc<dyn EventSink>,
	metrics: Arc<dyn Metrics>,
	cancel: CancellationToken,
	tuning: PipelineTuning,
	url: &str,
	opts: &SyncOptions,
) -> SyncResult {
	let started = Instant::now();
	let mut result = SyncResult::new(url);

	if let Err(e) =
		drive_source(&store, &fetcher, &events, &metrics, &cancel, tuning, url, opts, started, &mut result).await
	{
		let message = e.to_string();
		events.sync_failed(url, &result.source_name, &message, started.elapsed()).await;
		result.errors.push(message);
	}

	if cancel.is_cancelled() {
		result.errors.push(ArchiveError::Cancelled.to_string());
	}
	result.duration = started.elapsed();
	result.success = result.errors.is_empty();
	result
}

#[allow(clippy::too_many_arguments)]
async fn drive_source(
	store: &Store,
	fetcher: &Arc<dyn Fetch>,
	events: &Arc<dyn EventSink>,
	metrics: &Arc<dyn Metrics>,
	cancel: &CancellationToken,
	tuning: PipelineTuning,
	url: &str,
	opts: &SyncOptions,
	started: Instant,
	result: &mut SyncResult,
) -> Result<()> {
	log::info!("connecting to {url}");
	let (endpoint, mut bodies) = auto_detect(fetcher.as_ref(), url).await?;
	if bodies.is_empty() {
		return Err(ArchiveError::NotOParl(format!("no bodies found at {url}")));
	}

	if let Some(filter) = opts.body_filter.as_deref() {
		let needle = filter.to_lowercase();
		bodies.retain(|body| {
			let name = body.get("name").and_then(Value::as_str).unwrap_or_default();
			let id = body.get("id").and_then(Value::as_str).unwrap_or_default();
			name.to_lowercase().contains(&needle) || id.contains(filter)
		});
		log::info!("body filter {filter:?} matched {} bodies", bodies.len());
		if bodies.is_empty() {
			return Err(ArchiveError::General(format!("body filter {filter:?} matched no bodies at {url}")));
		}
	}

	result.source_name =
		bodies[0].get("name").and_then(Value::as_str).unwrap_or("Unknown").to_owned();
	log::info!("source: {} ({endpoint:?}, {} bodies)", result.source_name, bodies.len());

	events.sync_started(url, &result.source_name, opts.full).await;

	let source_raw = if bodies.len() == 1 { bodies[0].clone() } else { json!({ "bodies_count": bodies.len() }) };
	let source_id = store.upsert_source(url, &result.source_name, &source_raw).await?;

	let ctx = JobContext {
		store: store.clone(),
		fetcher: fetcher.clone(),
		events: events.clone(),
		metrics: metrics.clone(),
		cancel: cancel.clone(),
		tuning,
		source_name: result.source_name.clone(),
	};

	// body jobs run in parallel; each shields its own failures
	let outcomes = join_all(bodies.iter().map(|body| sync_body_guard(&ctx, body, source_id, opts.full))).await;

	for outcome in outcomes {
		result.bodies_synced += 1;
		result.organizations_synced += outcome.organizations;
		result.persons_synced += outcome.persons;
		result.memberships_synced += outcome.memberships;
		result.meetings_synced += outcome.meetings;
		result.papers_synced += outcome.papers;
		result.locations_synced += outcome.locations;
		result.agenda_items_synced += outcome.agenda_items;
		result.files_synced += outcome.files;
		result.consultations_synced += outcome.consultations;
		result.tombstones_deleted += outcome.tombstones;
		result.items_skipped += outcome.skipped;
		result.errors.extend(outcome.errors);
	}

	// a cancelled run keeps what it committed but must not advance the
	// high-water mark past pages it never saw
	if !cancel.is_cancelled() {
		store.update_source_sync_time(source_id, opts.full).await?;
	}
	result.http_stats = Some(fetcher.stats());

	let total = result.total_synced();
	events
		.sync_completed(url, &result.source_name, started.elapsed(), total, result.errors.len())
		.await;
	metrics.record_entities_batch(&result.source_name, total);
	Ok(())
}

/// Per-body statistics folded into the source result.
#[derive(Debug, Default)]
struct BodyOutcome {
	organizations: u64,
	persons: u64,
	memberships: u64,
	meetings: u64,
	papers: u64,
	locations: u64,
	agenda_items: u64,
	files: u64,
	consultations: u64,
	tombstones: u64,
	skipped: u64,
	errors: Vec<String>,
}

impl BodyOutcome {
	/// Fold one pipeline's result in and return the count synced from the
	/// list itself. Embedded children land directly on their kind's total.
	fn absorb(&mut self, label: &str, result: Result<PipelineStats>) -> u64 {
		match result {
			Ok(stats) => {
				let synced = stats.synced();
				self.tombstones += stats.deleted;
				self.skipped += stats.skipped;
				for (kind, n) in &stats.nested {
					self.add_kind(*kind, *n);
				}
				self.errors.extend(stats.errors);
				synced
			}
			Err(e) => {
				self.errors.push(format!("{label}: {e}"));
				0
			}
		}
	}

	fn add_kind(&mut self, kind: EntityKind, n: u64) {
		match kind {
			EntityKind::Organization => self.organizations += n,
			EntityKind::Person => self.persons += n,
			EntityKind::Membership => self.memberships += n,
			EntityKind::Meeting => self.meetings += n,
			EntityKind::Paper => self.papers += n,
			EntityKind::Location => self.locations += n,
			EntityKind::AgendaItem => self.agenda_items += n,
			EntityKind::File => self.files += n,
			EntityKind::Consultation => self.consultations += n,
			// bodies and their terms are the orchestrator's business
			EntityKind::Body | EntityKind::LegislativeTerm => {}
		}
	}
}

async fn sync_body_guard(ctx: &JobContext, body_raw: &Value, source_id: Uuid, full: bool) -> BodyOutcome {
	let body_name = body_raw.get("name").and_then(Value::as_str).unwrap_or("Unknown").to_owned();
	match sync_body(ctx, body_raw, source_id, full).await {
		Ok(outcome) => outcome,
		Err(e) => {
			log::error!("error syncing body {body_name}: {e}");
			BodyOutcome { errors: vec![format!("{body_name}: {e}")], ..Default::default() }
		}
	}
}

/// Sync one body: upsert the body row, classify the sync mode, then run the
/// entity pipelines through the dependency DAG.
async fn sync_body(ctx: &JobContext, body_raw: &Value, source_id: Uuid, full: bool) -> Result<BodyOutcome> {
	let mut outcome = BodyOutcome::default();
	let body = processor::process_body(body_raw)
		.ok_or(ArchiveError::MissingField { kind: "body", field: "id" })?;
	let body_id = ctx.store.upsert_body(&body, source_id).await?;

	let mode = determine_mode(ctx, &body, full).await?;
	log::info!("syncing body {} ({mode:?})", body.name.as_deref().unwrap_or(&body.external_id));

	let body_ref = BodyRef { id: body_id, external_id: body.external_id.clone(), name: body.name.clone() };
	let run = |kind: EntityKind, list_url: &Option<String>| {
		let list_url = list_url.clone();
		let body_ref = &body_ref;
		async move { pipeline::sync_entity_type(ctx, body_ref, kind, list_url.as_deref(), mode).await }
	};

	// organizations and persons anchor the membership FKs
	let (organizations, persons) = futures::join!(
		run(EntityKind::Organization, &body.organization_list_url),
		run(EntityKind::Person, &body.person_list_url),
	);
	let n = outcome.absorb("organizations", organizations);
	outcome.organizations += n;
	let n = outcome.absorb("persons", persons);
	outcome.persons += n;

	let memberships = run(EntityKind::Membership, &body.membership_list_url).await;
	let n = outcome.absorb("memberships", memberships);
	outcome.memberships += n;

	// meetings and papers anchor agenda items, files and consultations
	let (meetings, papers) = futures::join!(
		run(EntityKind::Meeting, &body.meeting_list_url),
		run(EntityKind::Paper, &body.paper_list_url),
	);
	let n = outcome.absorb("meetings", meetings);
	outcome.meetings += n;
	let n = outcome.absorb("papers", papers);
	outcome.papers += n;

	let (locations, agenda_items, files, consultations) = futures::join!(
		run(EntityKind::Location, &body.location_list_url),
		run(EntityKind::AgendaItem, &body.agenda_item_list_url),
		run(EntityKind::File, &body.file_list_url),
		run(EntityKind::Consultation, &body.consultation_list_url),
	);
	let n = outcome.absorb("locations", locations);
	outcome.locations += n;
	let n = outcome.absorb("agenda items", agenda_items);
	outcome.agenda_items += n;
	let n = outcome.absorb("files", files);
	outcome.files += n;
	let n = outcome.absorb("consultations", consultations);
	outcome.consultations += n;

	if !ctx.cancel.is_cancelled() {
		ctx.store.update_body_sync_time(body_id).await?;
	}

	log::info!(
		"body {} complete: {} organizations, {} persons, {} memberships, {} meetings, {} papers, \
		 {} locations, {} agenda items, {} files, {} consultations",
		body.name.as_deref().unwrap_or(&body.external_id),
		outcome.organizations,
		outcome.persons,
		outcome.memberships,
		outcome.meetings,
		outcome.papers,
		outcome.locations,
		outcome.agenda_items,
		outcome.files,
		outcome.consultations,
	);
	if !outcome.errors.is_empty() {
		log::warn!(
			"body {} finished with {} errors: {}",
			body.external_id,
			outcome.errors.len(),
			outcome.errors.iter().take(5).join("; ")
		);
	}
	Ok(outcome)
}

/// Pick the sync mode for one body: full scan on the flag or a missing
/// high-water mark, otherwise probe whether the server filters for us.
async fn determine_mode(ctx: &JobContext, body: &ProcessedBody, full: bool) -> Result<SyncMode> {
	if full {
		return Ok(SyncMode::Full);
	}
	let last_sync = ctx.store.get_body_by_external_id(&body.external_id).await?.and_then(|b| b.last_sync);
	let Some(since) = last_sync else {
		// never synced before: incremental has no baseline
		return Ok(SyncMode::Full);
	};
	if pipeline::probe_filter_support(ctx, body, since).await {
		Ok(SyncMode::ServerFiltered(since))
	} else {
		Ok(SyncMode::ClientFiltered)
	}
}
