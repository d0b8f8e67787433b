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

//! The per-(body, kind) pipeline: consume list pages, classify each item as
//! new / changed / unchanged / tombstoned, and dispatch to the store.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use hashbrown::HashMap;
use serde_json::Value;

use super::{BodyRef, JobContext};
use crate::{
	error::Result,
	events::{NewMeeting, NewPaper},
	processor::{self, parse_datetime},
	types::{EntityKind, ProcessedEntity},
};

/// Minimum pages fetched before the early-stop heuristic may fire.
pub const MIN_PAGES: usize = 10;
/// Consecutive all-stale pages that end a client-filtered scan.
pub const STALE_PAGES: usize = 5;

/// Early-stop knobs. The defaults are part of the sync contract; tests
/// shrink them to keep fixtures small.
#[derive(Debug, Clone, Copy)]
pub struct PipelineTuning {
	pub min_pages: usize,
	pub stale_pages: usize,
}

impl Default for PipelineTuning {
	fn default() -> Self {
		Self { min_pages: MIN_PAGES, stale_pages: STALE_PAGES }
	}
}

/// How a body job reads its lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
	/// Scan everything: the full-sync flag, or a body never synced before.
	Full,
	/// The server honours `modified_since`; every returned item is
	/// interesting.
	ServerFiltered(DateTime<Utc>),
	/// The server ignores the filter; compare against stored timestamps and
	/// stop early on stale pages.
	ClientFiltered,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
	pub new: u64,
	pub updated: u64,
	pub deleted: u64,
	pub unchanged: u64,
	/// Items skipped over unresolved mandatory references.
	pub skipped: u64,
	/// Embedded children fanned out by the store, per kind. A meeting list
	/// is also the source of agenda items and files; those belong in the
	/// body totals even though no agenda-item page produced them.
	pub nested: HashMap<EntityKind, u64>,
	pub errors: Vec<String>,
}

impl PipelineStats {
	/// Entities synced from this list itself: tombstones count separately,
	/// unchanged items not at all, embedded children via [`Self::nested`].
	pub fn synced(&self) -> u64 {
		self.new + self.updated
	}
}

/// Counts consecutive stale pages. Counting starts only once `min_pages`
/// pages have been fetched, so a list that is stale from the first page is
/// still sampled `min_pages + stale_pages` deep before the scan stops.
struct StalenessTracker {
	tuning: PipelineTuning,
	pages: usize,
	stale_run: usize,
}

impl StalenessTracker {
	fn new(tuning: PipelineTuning) -> Self {
		Self { tuning, pages: 0, stale_run: 0 }
	}

	/// Record a finished page; returns `true` when the scan should stop.
	fn record_page(&mut self, had_changes: bool) -> bool {
		self.pages += 1;
		if had_changes {
			self.stale_run = 0;
			return false;
		}
		if self.pages > self.tuning.min_pages {
			self.stale_run += 1;
		}
		self.stale_run >= self.tuning.stale_pages
	}
}

fn is_tombstone(item: &Value) -> bool {
	item.get("deleted").and_then(Value::as_bool).unwrap_or(false)
}

fn item_id(item: &Value) -> Option<&str> {
	item.get("id").and_then(Value::as_str)
}

/// Sync one entity list of one body. Pages are consumed in upstream order;
/// the store sees upserts and tombstone deletes in fetch order per external
/// id.
pub(crate) async fn sync_entity_type(
	ctx: &JobContext,
	body: &BodyRef,
	kind: EntityKind,
	list_url: Option<&str>,
	mode: SyncMode,
) -> Result<PipelineStats> {
	let mut stats = PipelineStats::default();
	let Some(list_url) = list_url else {
		return Ok(stats);
	};

	let since = match mode {
		SyncMode::ServerFiltered(since) => Some(since),
		_ => None,
	};
	let mut pages = ctx.fetcher.fetch_list(list_url, since);
	let mut tracker = StalenessTracker::new(ctx.tuning);

	while let Some(page) = pages.next().await {
		if ctx.cancel.is_cancelled() {
			break;
		}
		let page = page?;
		let mut new_on_page = 0u64;
		let mut updated_on_page = 0u64;
		let mut deleted_on_page = 0u64;

		match mode {
			SyncMode::Full | SyncMode::ServerFiltered(_) => {
				for item in &page.items {
					if ctx.cancel.is_cancelled() {
						break;
					}
					if is_tombstone(item) {
						if let Some(external_id) = item_id(item) {
							if ctx.store.delete(kind, external_id).await? {
								deleted_on_page += 1;
							}
						}
						continue;
					}
					match store_item(ctx, body, item, &mut stats).await? {
						Outcome::Stored => new_on_page += 1,
						Outcome::Skipped => stats.skipped += 1,
						Outcome::Unprocessable => {
							stats.errors.push(format!("{kind}: unprocessable item on page"));
						}
					}
				}
			}
			SyncMode::ClientFiltered => {
				let ids: Vec<String> =
					page.items.iter().filter_map(item_id).map(str::to_owned).collect();
				let existing = ctx.store.batch_exists(kind, &ids).await?;

				for item in &page.items {
					if ctx.cancel.is_cancelled() {
						break;
					}
					let Some(external_id) = item_id(item) else { continue };
					if is_tombstone(item) {
						if ctx.store.delete(kind, external_id).await? {
							deleted_on_page += 1;
						}
						continue;
					}

					match existing.get(external_id) {
						// absent from the store: new item
						None => match store_item(ctx, body, item, &mut stats).await? {
							Outcome::Stored => new_on_page += 1,
							Outcome::Skipped => stats.skipped += 1,
							Outcome::Unprocessable => {
								stats.errors.push(format!("{kind}: unprocessable item on page"));
							}
						},
						Some(db_modified) => {
							let item_modified =
								item.get("modified").and_then(Value::as_str).and_then(parse_datetime);
							match (item_modified, db_modified) {
								(Some(item_m), Some(db_m)) if item_m > *db_m => {
									match store_item(ctx, body, item, &mut stats).await? {
										Outcome::Stored => updated_on_page += 1,
										Outcome::Skipped => stats.skipped += 1,
										Outcome::Unprocessable => {
											stats.errors.push(format!("{kind}: unprocessable item on page"));
										}
									}
								}
								_ => stats.unchanged += 1,
							}
						}
					}
				}
			}
		}

		stats.new += new_on_page;
		stats.updated += updated_on_page;
		stats.deleted += deleted_on_page;

		if mode == SyncMode::ClientFiltered {
			let had_changes = new_on_page > 0 || updated_on_page > 0 || deleted_on_page > 0;
			if tracker.record_page(had_changes) {
				log::info!(
					"stopping {} scan for {}: {} consecutive pages without changes",
					kind,
					body.external_id,
					tracker.stale_run
				);
				break;
			}
		}
	}

	if stats.deleted > 0 || stats.skipped > 0 || stats.unchanged > 0 {
		log::debug!(
			"{} summary for {}: {} new, {} updated, {} deleted, {} unchanged, {} skipped",
			kind,
			body.external_id,
			stats.new,
			stats.updated,
			stats.deleted,
			stats.unchanged,
			stats.skipped
		);
	}
	Ok(stats)
}

enum Outcome {
	Stored,
	Skipped,
	Unprocessable,
}

/// Process and upsert one raw item, firing metrics and high-priority events
/// for the kinds downstream consumers watch. Embedded children that the
/// store fanned out are tallied into `stats.nested`.
async fn store_item(ctx: &JobContext, body: &BodyRef, item: &Value, stats: &mut PipelineStats) -> Result<Outcome> {
	let Some(entity) = processor::process(item, &body.external_id) else {
		return Ok(Outcome::Unprocessable);
	};
	let kind = entity.kind();
	let Some(_id) = ctx.store.upsert_entity(&entity, body.id).await? else {
		return Ok(Outcome::Skipped);
	};
	ctx.metrics.record_entity_synced(kind, &ctx.source_name);
	record_nested(ctx, &entity, &mut stats.nested);
	match &entity {
		ProcessedEntity::Meeting(meeting) => {
			ctx.events
				.new_meeting(NewMeeting {
					external_id: &meeting.external_id,
					name: meeting.name.as_deref(),
					body_name: body.name.as_deref(),
					start: meeting.start,
				})
				.await;
		}
		ProcessedEntity::Paper(paper) => {
			ctx.events
				.new_paper(NewPaper {
					external_id: &paper.external_id,
					name: paper.name.as_deref(),
					body_name: body.name.as_deref(),
					paper_type: paper.paper_type.as_deref(),
				})
				.await;
		}
		_ => {}
	}
	Ok(Outcome::Stored)
}

/// Tally the embedded children the store upserted alongside `entity`.
/// Memberships cascade only when both FKs resolved; the identity cache
/// records exactly the ones that were written.
fn record_nested(ctx: &JobContext, entity: &ProcessedEntity, counts: &mut HashMap<EntityKind, u64>) {
	let children = match entity {
		ProcessedEntity::Body(body) => &body.nested,
		ProcessedEntity::Person(person) => &person.nested,
		ProcessedEntity::Meeting(meeting) => &meeting.nested,
		ProcessedEntity::Paper(paper) => &paper.nested,
		_ => return,
	};
	for child in children {
		let kind = child.kind();
		if kind == EntityKind::Membership && ctx.store.cache().get(kind, child.external_id()).is_none() {
			continue;
		}
		*counts.entry(kind).or_default() += 1;
		ctx.metrics.record_entity_synced(kind, &ctx.source_name);
		record_nested(ctx, child, counts);
	}
}

/// Test whether the upstream honours `?modified_since=`.
///
/// Fetches a single probe page (papers preferred, meetings as fallback) with
/// the filter applied. Servers that silently ignore the parameter return
/// their regular first page, which contains items older than `since` — that
/// fails the probe. An empty page passes. Probe errors degrade to
/// client-side filtering, they never fail the body job.
pub(crate) async fn probe_filter_support(
	ctx: &JobContext,
	body: &crate::types::ProcessedBody,
	since: DateTime<Utc>,
) -> bool {
	let Some(probe_url) = body.paper_list_url.as_deref().or(body.meeting_list_url.as_deref()) else {
		log::debug!("no endpoint to probe modified_since support on {}", body.external_id);
		return false;
	};

	let mut pages = ctx.fetcher.fetch_list(probe_url, Some(since));
	match pages.next().await {
		None => true,
		Some(Ok(page)) => {
			let passed = evaluate_probe(&page.items, since);
			if passed {
				log::info!(
					"filter probe passed for {} ({} items, all within window)",
					body.external_id,
					page.items.len()
				);
			} else {
				log::info!(
					"filter probe failed for {}: server returned items older than {}; \
					 falling back to client-side filtering",
					body.external_id,
					since
				);
			}
			passed
		}
		Some(Err(e)) => {
			log::warn!("filter probe errored for {}: {e}; using client-side filtering", body.external_id);
			false
		}
	}
}

/// The probe passes iff no returned item has a parseable `modified` strictly
/// before `since`. Unparseable or missing timestamps are inconclusive and do
/// not fail the probe.
fn evaluate_probe(items: &[Value], since: DateTime<Utc>) -> bool {
	items.iter().all(|item| {
		item.get("modified")
			.and_then(Value::as_str)
			.and_then(parse_datetime)
			.map_or(true, |modified| modified >= since)
	})
}
