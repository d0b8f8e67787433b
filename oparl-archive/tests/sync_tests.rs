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

//! End-to-end sync scenarios: a scripted fetcher on the upstream side, a
//! real PostgreSQL on the mirror side.
//!
//! The schema fixture stands in for the external migration tool. Every test
//! uses its own URL namespace so the suite can run against a shared
//! database; tests skip themselves when `DATABASE_URL` is not set.

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::{json, Value};
use sqlx::{postgres::PgPool, Row};
use uuid::Uuid;

use oparl_archive::{Archive, CountingMetrics, EntityKind, MockFetcher, SyncOptions};

static DB_GUARD: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

struct TestContext {
	archive: Archive,
	pool: PgPool,
	metrics: Arc<CountingMetrics>,
	/// Unique URL namespace of this test run.
	ns: String,
}

impl TestContext {
	fn url(&self, path: &str) -> String {
		format!("{}/{path}", self.ns)
	}

	async fn count(&self, table: &str) -> i64 {
		let sql = format!("SELECT COUNT(*) FROM {table} WHERE external_id LIKE $1");
		sqlx::query_scalar(&sql).bind(format!("{}%", self.ns)).fetch_one(&self.pool).await.unwrap()
	}

	async fn row(&self, table: &str, external_id: &str) -> Option<sqlx::postgres::PgRow> {
		let sql = format!("SELECT * FROM {table} WHERE external_id = $1");
		sqlx::query(&sql).bind(external_id).fetch_optional(&self.pool).await.unwrap()
	}
}

async fn setup() -> Option<TestContext> {
	let Ok(url) = std::env::var("DATABASE_URL") else {
		eprintln!("skipping: DATABASE_URL not set");
		return None;
	};
	let _ = pretty_env_logger::try_init();
	let pool = PgPool::connect(&url).await.expect("could not connect to DATABASE_URL");
	sqlx::raw_sql(include_str!("fixtures/schema.sql")).execute(&pool).await.expect("could not apply schema fixture");

	let metrics = Arc::new(CountingMetrics::new());
	let archive = Archive::builder()
		.pg_url(Some(url.as_str()))
		.metrics(metrics.clone())
		.build()
		.await
		.expect("could not build archive");
	let ns = format!("https://test-{}.example.org", Uuid::new_v4().simple());
	Some(TestContext { archive, pool, metrics, ns })
}

fn oparl_type(kind: &str) -> String {
	format!("https://schema.oparl.org/1.1/{kind}")
}

/// A body document pointing at the given list endpoints.
fn body_doc(ctx: &TestContext, lists: &[(&str, &str)]) -> Value {
	let mut doc = json!({
		"id": ctx.url("body/1"),
		"type": oparl_type("Body"),
		"name": "Teststadt",
		"shortName": "TS",
	});
	for (property, path) in lists {
		doc[property] = Value::String(ctx.url(path));
	}
	doc
}

// spec scenario: a full sync of one body mirrors a meeting and its embedded
// agenda item and file, wiring the file to the meeting's surrogate id
#[tokio::test]
async fn full_sync_mirrors_embedded_children() {
	let _guard = DB_GUARD.lock().await;
	let Some(ctx) = setup().await else { return };

	let meeting = json!({
		"id": ctx.url("meeting/1"),
		"type": oparl_type("Meeting"),
		"name": "Ratssitzung",
		"start": "2024-05-01T18:00:00Z",
		"modified": "2024-04-20T10:00:00Z",
		"agendaItem": [{
			"id": ctx.url("agendaitem/1"),
			"type": oparl_type("AgendaItem"),
			"number": "1",
			"name": "Haushalt",
		}],
		"invitation": {
			"id": ctx.url("file/1"),
			"type": oparl_type("File"),
			"fileName": "einladung.pdf",
			"mimeType": "application/pdf",
		},
	});
	let source_url = ctx.url("body/1");
	let fetcher = Arc::new(
		MockFetcher::new()
			.object(&source_url, body_doc(&ctx, &[("meeting", "meetings")]))
			.pages(&ctx.url("meetings"), vec![vec![meeting]]),
	);

	let result = ctx
		.archive
		.sync_source_with(fetcher, &source_url, &SyncOptions { full: true, ..Default::default() })
		.await;

	assert!(result.success, "errors: {:?}", result.errors);
	assert!(result.errors.is_empty());
	assert_eq!(result.bodies_synced, 1);
	assert_eq!(result.meetings_synced, 1);
	assert_eq!(result.agenda_items_synced, 1);
	assert_eq!(result.files_synced, 1);

	// the file is wired to the meeting's surrogate id
	let meeting_row = ctx.row("oparl_meetings", &ctx.url("meeting/1")).await.expect("meeting mirrored");
	let meeting_id: Uuid = meeting_row.get("id");
	let file_row = ctx.row("oparl_files", &ctx.url("file/1")).await.expect("file mirrored");
	assert_eq!(file_row.get::<Option<Uuid>, _>("meeting_id"), Some(meeting_id));
	assert_eq!(file_row.get::<Option<String>, _>("text_extraction_status").as_deref(), Some("pending"));

	let item_row = ctx.row("oparl_agenda_items", &ctx.url("agendaitem/1")).await.expect("agenda item mirrored");
	assert_eq!(item_row.get::<Uuid, _>("meeting_id"), meeting_id);

	// raw_json is retained verbatim on the mirrored row
	let raw: Value = meeting_row.get("raw_json");
	assert_eq!(raw["name"], "Ratssitzung");
	assert_eq!(raw["agendaItem"][0]["number"], "1");

	assert_eq!(ctx.metrics.entity_count(EntityKind::Meeting), 1);
	assert_eq!(ctx.metrics.entity_count(EntityKind::File), 1);
	assert_eq!(ctx.metrics.batches().len(), 1);
}

// spec invariant: two identical full syncs leave the same rowset
#[tokio::test]
async fn full_sync_is_idempotent() {
	let _guard = DB_GUARD.lock().await;
	let Some(ctx) = setup().await else { return };

	let meeting = json!({
		"id": ctx.url("meeting/1"),
		"type": oparl_type("Meeting"),
		"name": "Sitzung",
		"modified": "2024-01-01T00:00:00Z",
	});
	let source_url = ctx.url("body/1");
	let pages = vec![vec![meeting]];
	let make_fetcher = |pages: Vec<Vec<Value>>| {
		Arc::new(
			MockFetcher::new()
				.object(&source_url, body_doc(&ctx, &[("meeting", "meetings")]))
				.pages(&ctx.url("meetings"), pages),
		)
	};
	let full = SyncOptions { full: true, ..Default::default() };

	let first = ctx.archive.sync_source_with(make_fetcher(pages.clone()), &source_url, &full).await;
	let raw_after_first: Value =
		ctx.row("oparl_meetings", &ctx.url("meeting/1")).await.unwrap().get("raw_json");

	let second = ctx.archive.sync_source_with(make_fetcher(pages), &source_url, &full).await;
	let raw_after_second: Value =
		ctx.row("oparl_meetings", &ctx.url("meeting/1")).await.unwrap().get("raw_json");

	assert!(first.success && second.success);
	assert_eq!(first.meetings_synced, 1);
	assert_eq!(second.meetings_synced, 1);
	assert_eq!(ctx.count("oparl_meetings").await, 1);
	assert_eq!(raw_after_first, raw_after_second);
}

// spec scenario: client-filtered incremental picks up an item whose upstream
// modified advanced, and only that item
#[tokio::test]
async fn incremental_client_mode_updates_changed_rows() {
	let _guard = DB_GUARD.lock().await;
	let Some(ctx) = setup().await else { return };

	let source_url = ctx.url("body/1");
	let lists = [("meeting", "meetings"), ("paper", "papers")];
	let meeting_v1 = json!({
		"id": ctx.url("meeting/1"),
		"type": oparl_type("Meeting"),
		"name": "Original",
		"modified": "2024-01-01T00:00:00Z",
	});
	// this stale paper makes the filter probe fail, forcing client mode
	let old_paper = json!({
		"id": ctx.url("paper/1"),
		"type": oparl_type("Paper"),
		"name": "Altvorlage",
		"modified": "2023-06-01T00:00:00Z",
	});

	let fetcher = Arc::new(
		MockFetcher::new()
			.object(&source_url, body_doc(&ctx, &lists))
			.pages(&ctx.url("meetings"), vec![vec![meeting_v1]])
			.pages(&ctx.url("papers"), vec![vec![old_paper.clone()]]),
	);
	let first = ctx
		.archive
		.sync_source_with(fetcher, &source_url, &SyncOptions { full: true, ..Default::default() })
		.await;
	assert!(first.success, "errors: {:?}", first.errors);

	let meeting_v2 = json!({
		"id": ctx.url("meeting/1"),
		"type": oparl_type("Meeting"),
		"name": "Updated",
		"modified": "2024-01-02T00:00:00Z",
	});
	let fetcher = Arc::new(
		MockFetcher::new()
			.object(&source_url, body_doc(&ctx, &lists))
			.pages(&ctx.url("meetings"), vec![vec![meeting_v2]])
			.pages(&ctx.url("papers"), vec![vec![old_paper]]),
	);
	let second = ctx.archive.sync_source_with(fetcher, &source_url, &SyncOptions::default()).await;

	assert!(second.success, "errors: {:?}", second.errors);
	assert_eq!(second.meetings_synced, 1);
	// the unchanged paper is not re-synced
	assert_eq!(second.papers_synced, 0);
	assert_eq!(ctx.count("oparl_meetings").await, 1);
	let row = ctx.row("oparl_meetings", &ctx.url("meeting/1")).await.unwrap();
	assert_eq!(row.get::<Option<String>, _>("name").as_deref(), Some("Updated"));
}

// spec scenario: a tombstone removes the row, counts separately from synced
// entities, and a tombstone for an unknown row is a silent no-op
#[tokio::test]
async fn tombstones_delete_and_unknown_tombstones_are_noops() {
	let _guard = DB_GUARD.lock().await;
	let Some(ctx) = setup().await else { return };

	let source_url = ctx.url("body/1");
	let lists = [("paper", "papers")];
	let paper = json!({
		"id": ctx.url("paper/1"),
		"type": oparl_type("Paper"),
		"name": "Vorlage",
		"modified": "2024-01-01T00:00:00Z",
	});
	let fetcher = Arc::new(
		MockFetcher::new()
			.object(&source_url, body_doc(&ctx, &lists))
			.pages(&ctx.url("papers"), vec![vec![paper]]),
	);
	let first = ctx
		.archive
		.sync_source_with(fetcher, &source_url, &SyncOptions { full: true, ..Default::default() })
		.await;
	assert!(first.success);
	assert_eq!(ctx.count("oparl_papers").await, 1);

	let tombstones = vec![vec![
		json!({"id": ctx.url("paper/1"), "type": oparl_type("Paper"), "deleted": true}),
		json!({"id": ctx.url("paper/never-existed"), "type": oparl_type("Paper"), "deleted": true}),
	]];
	let fetcher = Arc::new(
		MockFetcher::new()
			.object(&source_url, body_doc(&ctx, &lists))
			.pages(&ctx.url("papers"), tombstones),
	);
	let second = ctx.archive.sync_source_with(fetcher, &source_url, &SyncOptions::default()).await;

	assert!(second.success, "errors: {:?}", second.errors);
	assert_eq!(second.papers_synced, 0);
	assert_eq!(second.tombstones_deleted, 1);
	assert_eq!(ctx.count("oparl_papers").await, 0);
}

// spec scenario: a membership referencing a person outside the body's
// person list is skipped, not stored with NULL, and the sync still succeeds
#[tokio::test]
async fn membership_with_unresolved_person_is_skipped() {
	let _guard = DB_GUARD.lock().await;
	let Some(ctx) = setup().await else { return };

	let source_url = ctx.url("body/1");
	let organization = json!({
		"id": ctx.url("organization/1"),
		"type": oparl_type("Organization"),
		"name": "Rat",
	});
	let person = json!({
		"id": ctx.url("person/1"),
		"type": oparl_type("Person"),
		"familyName": "Musterfrau",
	});
	let memberships = vec![vec![
		// resolvable: both sides are in this body's lists
		json!({
			"id": ctx.url("membership/1"),
			"type": oparl_type("Membership"),
			"person": ctx.url("person/1"),
			"organization": ctx.url("organization/1"),
			"role": "Mitglied",
		}),
		// person is not part of this body's person list
		json!({
			"id": ctx.url("membership/2"),
			"type": oparl_type("Membership"),
			"person": ctx.url("person/unknown"),
			"organization": ctx.url("organization/1"),
		}),
	]];
	let fetcher = Arc::new(
		MockFetcher::new()
			.object(
				&source_url,
				body_doc(
					&ctx,
					&[("organization", "organizations"), ("person", "persons"), ("membership", "memberships")],
				),
			)
			.pages(&ctx.url("organizations"), vec![vec![organization]])
			.pages(&ctx.url("persons"), vec![vec![person]])
			.pages(&ctx.url("memberships"), memberships),
	);

	let result = ctx
		.archive
		.sync_source_with(fetcher, &source_url, &SyncOptions { full: true, ..Default::default() })
		.await;

	assert!(result.success, "errors: {:?}", result.errors);
	assert_eq!(result.memberships_synced, 1);
	assert_eq!(result.items_skipped, 1);
	assert_eq!(ctx.count("oparl_memberships").await, 1);
	assert!(ctx.row("oparl_memberships", &ctx.url("membership/2")).await.is_none());
}

// spec scenario: a client-filtered scan over a fully stale list halts after
// MIN_PAGES + STALE_PAGES pages with no error
#[tokio::test]
async fn early_stop_abandons_a_fully_stale_scan() {
	let _guard = DB_GUARD.lock().await;
	let Some(ctx) = setup().await else { return };

	let source_url = ctx.url("body/1");
	let lists = [("meeting", "meetings"), ("paper", "papers")];
	let meeting = json!({
		"id": ctx.url("meeting/1"),
		"type": oparl_type("Meeting"),
		"name": "Sitzung",
		"modified": "2023-01-01T00:00:00Z",
	});
	let old_paper = json!({
		"id": ctx.url("paper/1"),
		"type": oparl_type("Paper"),
		"modified": "2023-01-01T00:00:00Z",
	});

	let fetcher = Arc::new(
		MockFetcher::new()
			.object(&source_url, body_doc(&ctx, &lists))
			.pages(&ctx.url("meetings"), vec![vec![meeting.clone()]])
			.pages(&ctx.url("papers"), vec![vec![old_paper.clone()]]),
	);
	let first = ctx
		.archive
		.sync_source_with(fetcher, &source_url, &SyncOptions { full: true, ..Default::default() })
		.await;
	assert!(first.success);

	// 50 pages, every item already mirrored and unchanged
	let stale_pages: Vec<Vec<Value>> = (0..50).map(|_| vec![meeting.clone()]).collect();
	let fetcher = Arc::new(
		MockFetcher::new()
			.object(&source_url, body_doc(&ctx, &lists))
			.pages(&ctx.url("meetings"), stale_pages)
			.pages(&ctx.url("papers"), vec![vec![old_paper]]),
	);
	let second =
		ctx.archive.sync_source_with(fetcher.clone(), &source_url, &SyncOptions::default()).await;

	assert!(second.success, "errors: {:?}", second.errors);
	assert_eq!(second.meetings_synced, 0);

	let meeting_list = ctx.url("meetings");
	let meeting_page_requests =
		fetcher.requested().iter().filter(|url| url.starts_with(&meeting_list)).count();
	assert_eq!(
		meeting_page_requests,
		oparl_archive::MIN_PAGES + oparl_archive::STALE_PAGES,
		"scan should stop after the early-stop window"
	);
}

// spec scenario: a probe page mixing items newer and older than last_sync
// proves the server ignores modified_since; the body falls back to
// client-side filtering
#[tokio::test]
async fn broken_server_filter_falls_back_to_client_mode() {
	let _guard = DB_GUARD.lock().await;
	let Some(ctx) = setup().await else { return };

	let source_url = ctx.url("body/1");
	let lists = [("paper", "papers")];
	let paper_a = json!({
		"id": ctx.url("paper/a"),
		"type": oparl_type("Paper"),
		"name": "A",
		"modified": "2023-01-01T00:00:00Z",
	});
	let paper_b = json!({
		"id": ctx.url("paper/b"),
		"type": oparl_type("Paper"),
		"name": "B",
		"modified": "2023-06-01T00:00:00Z",
	});
	let fetcher = Arc::new(
		MockFetcher::new()
			.object(&source_url, body_doc(&ctx, &lists))
			.pages(&ctx.url("papers"), vec![vec![paper_a.clone(), paper_b]]),
	);
	let first = ctx
		.archive
		.sync_source_with(fetcher, &source_url, &SyncOptions { full: true, ..Default::default() })
		.await;
	assert!(first.success);

	// paper B changed upstream; paper A is older than last_sync, so the
	// probe page contains both newer and older items
	let paper_b_v2 = json!({
		"id": ctx.url("paper/b"),
		"type": oparl_type("Paper"),
		"name": "B2",
		"modified": "2030-01-01T00:00:00Z",
	});
	let fetcher = Arc::new(
		MockFetcher::new()
			.object(&source_url, body_doc(&ctx, &lists))
			.pages(&ctx.url("papers"), vec![vec![paper_a, paper_b_v2]]),
	);
	let second = ctx.archive.sync_source_with(fetcher, &source_url, &SyncOptions::default()).await;

	assert!(second.success, "errors: {:?}", second.errors);
	// a server-filtered pass would have re-upserted both returned items;
	// client mode syncs only the genuinely changed one
	assert_eq!(second.papers_synced, 1);
	let row = ctx.row("oparl_papers", &ctx.url("paper/b")).await.unwrap();
	assert_eq!(row.get::<Option<String>, _>("name").as_deref(), Some("B2"));
}

// spec invariant: a standalone file observation without back-references must
// not clobber the parent links an embedded observation established
#[tokio::test]
async fn standalone_file_does_not_clobber_embedded_links() {
	let _guard = DB_GUARD.lock().await;
	let Some(ctx) = setup().await else { return };

	let source_url = ctx.url("body/1");
	let meeting = json!({
		"id": ctx.url("meeting/1"),
		"type": oparl_type("Meeting"),
		"name": "Sitzung",
		"invitation": {
			"id": ctx.url("file/1"),
			"type": oparl_type("File"),
			"fileName": "einladung.pdf",
		},
	});
	// the same file, surfaced standalone without any back-references
	let standalone_file = json!({
		"id": ctx.url("file/1"),
		"type": oparl_type("File"),
		"fileName": "einladung.pdf",
	});
	let fetcher = Arc::new(
		MockFetcher::new()
			.object(&source_url, body_doc(&ctx, &[("meeting", "meetings"), ("file", "files")]))
			.pages(&ctx.url("meetings"), vec![vec![meeting]])
			// the file pipeline runs after the meeting pipeline per the DAG,
			// so the standalone write is the later one
			.pages(&ctx.url("files"), vec![vec![standalone_file]]),
	);

	let result = ctx
		.archive
		.sync_source_with(fetcher, &source_url, &SyncOptions { full: true, ..Default::default() })
		.await;
	assert!(result.success, "errors: {:?}", result.errors);

	let file_row = ctx.row("oparl_files", &ctx.url("file/1")).await.unwrap();
	assert!(file_row.get::<Option<Uuid>, _>("meeting_id").is_some(), "standalone write clobbered meeting_id");
}

// spec invariant: one failing body leaves its siblings' counts untouched and
// still reported
#[tokio::test]
async fn failing_body_is_isolated_from_siblings() {
	let _guard = DB_GUARD.lock().await;
	let Some(ctx) = setup().await else { return };

	let source_url = ctx.url("system");
	let body = |n: u32, meetings: &str| {
		json!({
			"id": ctx.url(&format!("body/{n}")),
			"type": oparl_type("Body"),
			"name": format!("Body {n}"),
			"meeting": ctx.url(meetings),
		})
	};
	let meeting = json!({
		"id": ctx.url("meeting/b2"),
		"type": oparl_type("Meeting"),
		"name": "Sitzung",
	});
	let fetcher = Arc::new(
		MockFetcher::new()
			.object(
				&source_url,
				json!({
					"id": source_url,
					"type": oparl_type("System"),
					"body": ctx.url("bodies"),
				}),
			)
			.pages(&ctx.url("bodies"), vec![vec![body(1, "broken-meetings"), body(2, "meetings")]])
			.failing(&ctx.url("broken-meetings"), 500)
			.pages(&ctx.url("meetings"), vec![vec![meeting]]),
	);

	let result = ctx
		.archive
		.sync_source_with(fetcher, &source_url, &SyncOptions { full: true, ..Default::default() })
		.await;

	assert!(!result.success);
	assert_eq!(result.bodies_synced, 2);
	assert_eq!(result.meetings_synced, 1, "body 2's meeting must be mirrored");
	assert!(
		result.errors.iter().any(|e| e.contains("meetings")),
		"body 1's pipeline failure must be reported: {:?}",
		result.errors
	);
	assert!(ctx.row("oparl_meetings", &ctx.url("meeting/b2")).await.is_some());
}

// --body-filter restricts a source job to matching bodies
#[tokio::test]
async fn body_filter_selects_matching_bodies() {
	let _guard = DB_GUARD.lock().await;
	let Some(ctx) = setup().await else { return };

	let source_url = ctx.url("bodies");
	let body = |n: u32, name: &str| {
		json!({
			"id": ctx.url(&format!("body/{n}")),
			"type": oparl_type("Body"),
			"name": name,
		})
	};
	let fetcher = Arc::new(MockFetcher::new().object(
		&source_url,
		json!({"data": [body(1, "Stadt Adorf"), body(2, "Stadt Bedorf")], "links": {}}),
	));

	let result = ctx
		.archive
		.sync_source_with(
			fetcher,
			&source_url,
			&SyncOptions { full: true, body_filter: Some("bedorf".into()) },
		)
		.await;

	assert!(result.success, "errors: {:?}", result.errors);
	assert_eq!(result.bodies_synced, 1);
	assert!(ctx.row("oparl_bodies", &ctx.url("body/2")).await.is_some());
	assert!(ctx.row("oparl_bodies", &ctx.url("body/1")).await.is_none());
}

// consultations reconcile their paper link on a later sync without a NULL
// ever overwriting a resolved link
#[tokio::test]
async fn consultation_paper_link_reconciles_later() {
	let _guard = DB_GUARD.lock().await;
	let Some(ctx) = setup().await else { return };

	let source_url = ctx.url("body/1");
	let lists = [("paper", "papers"), ("consultation", "consultations")];
	let consultation = json!({
		"id": ctx.url("consultation/1"),
		"type": oparl_type("Consultation"),
		"paper": ctx.url("paper/1"),
		"role": "Beratung",
	});

	// first sync: the consultation arrives before its paper exists anywhere
	let fetcher = Arc::new(
		MockFetcher::new()
			.object(&source_url, body_doc(&ctx, &lists))
			.pages(&ctx.url("papers"), vec![])
			.pages(&ctx.url("consultations"), vec![vec![consultation.clone()]]),
	);
	let first = ctx
		.archive
		.sync_source_with(fetcher, &source_url, &SyncOptions { full: true, ..Default::default() })
		.await;
	assert!(first.success, "errors: {:?}", first.errors);
	let row = ctx.row("oparl_consultations", &ctx.url("consultation/1")).await.unwrap();
	assert!(row.get::<Option<Uuid>, _>("paper_id").is_none());

	// second sync: the paper appears, the consultation link reconciles
	let paper = json!({
		"id": ctx.url("paper/1"),
		"type": oparl_type("Paper"),
		"name": "Vorlage",
	});
	let fetcher = Arc::new(
		MockFetcher::new()
			.object(&source_url, body_doc(&ctx, &lists))
			.pages(&ctx.url("papers"), vec![vec![paper]])
			.pages(&ctx.url("consultations"), vec![vec![consultation]]),
	);
	let second = ctx
		.archive
		.sync_source_with(fetcher, &source_url, &SyncOptions { full: true, ..Default::default() })
		.await;
	assert!(second.success, "errors: {:?}", second.errors);

	let paper_row = ctx.row("oparl_papers", &ctx.url("paper/1")).await.unwrap();
	let paper_id: Uuid = paper_row.get("id");
	let row = ctx.row("oparl_consultations", &ctx.url("consultation/1")).await.unwrap();
	assert_eq!(row.get::<Option<Uuid>, _>("paper_id"), Some(paper_id));
}
