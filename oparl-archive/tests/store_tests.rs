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

//! Store contract tests against a live PostgreSQL. Like the sync scenarios,
//! these skip themselves when `DATABASE_URL` is unset.

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::json;
use sqlx::{postgres::PgPool, Row};
use uuid::Uuid;

use oparl_archive::{
	processor, Database, EntityKind, IdentityCache, ProcessedEntity, Store, SystemClock,
};

static DB_GUARD: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

struct TestStore {
	store: Store,
	pool: PgPool,
	ns: String,
}

impl TestStore {
	fn url(&self, path: &str) -> String {
		format!("{}/{path}", self.ns)
	}

	/// A fresh store over the same database with an empty identity cache.
	fn fresh(&self) -> Store {
		Store::new(self.store.database().clone(), IdentityCache::new(), Arc::new(SystemClock))
	}

	/// Mirror a minimal source + body pair and return the body's surrogate id.
	async fn seed_body(&self) -> (Uuid, Uuid) {
		let source_id = self
			.store
			.upsert_source(&self.url("system"), "Teststadt", &json!({"name": "Teststadt"}))
			.await
			.unwrap();
		let body = processor::process_body(&json!({
			"id": self.url("body/1"),
			"type": "https://schema.oparl.org/1.1/Body",
			"name": "Teststadt",
		}))
		.unwrap();
		let body_id = self.store.upsert_body(&body, source_id).await.unwrap();
		(source_id, body_id)
	}
}

async fn setup() -> Option<TestStore> {
	let Ok(url) = std::env::var("DATABASE_URL") else {
		eprintln!("skipping: DATABASE_URL not set");
		return None;
	};
	let pool = PgPool::connect(&url).await.expect("could not connect to DATABASE_URL");
	sqlx::raw_sql(include_str!("fixtures/schema.sql")).execute(&pool).await.expect("could not apply schema fixture");

	let db = Database::new(&url).await.expect("could not open database");
	db.ensure_schema().await.expect("schema sentinel missing");
	let store = Store::new(db, IdentityCache::new(), Arc::new(SystemClock));
	let ns = format!("https://store-{}.example.org", Uuid::new_v4().simple());
	Some(TestStore { store, pool, ns })
}

fn processed(raw: serde_json::Value) -> ProcessedEntity {
	processor::process(&raw, "https://test/body").expect("fixture must process")
}

#[tokio::test]
async fn source_upsert_is_keyed_on_url() {
	let _guard = DB_GUARD.lock().await;
	let Some(t) = setup().await else { return };

	let url = t.url("system");
	let first = t.store.upsert_source(&url, "Old Name", &json!({})).await.unwrap();
	let second = t.store.upsert_source(&url, "New Name", &json!({"v": 2})).await.unwrap();
	assert_eq!(first, second, "conflicting upserts must return the same surrogate id");

	let row = sqlx::query("SELECT name FROM oparl_sources WHERE url = $1")
		.bind(&url)
		.fetch_one(&t.pool)
		.await
		.unwrap();
	assert_eq!(row.get::<String, _>("name"), "New Name");
}

#[tokio::test]
async fn upsert_returns_row_keyed_on_external_id() {
	let _guard = DB_GUARD.lock().await;
	let Some(t) = setup().await else { return };
	let (_, body_id) = t.seed_body().await;

	let raw = json!({
		"id": t.url("paper/1"),
		"type": "https://schema.oparl.org/1.1/Paper",
		"name": "Vorlage",
		"reference": "V/1",
		"modified": "2024-02-01T00:00:00Z",
	});
	let ProcessedEntity::Paper(paper) = processed(raw.clone()) else { panic!() };

	let id_a = t.store.upsert_paper(&paper, body_id).await.unwrap();
	let id_b = t.store.upsert_paper(&paper, body_id).await.unwrap();
	assert_eq!(id_a, id_b);

	// round trip: the mirrored row carries the upstream id and raw document
	let row = sqlx::query("SELECT external_id, raw_json FROM oparl_papers WHERE id = $1")
		.bind(id_a)
		.fetch_one(&t.pool)
		.await
		.unwrap();
	assert_eq!(row.get::<String, _>("external_id"), t.url("paper/1"));
	assert_eq!(row.get::<serde_json::Value, _>("raw_json"), raw);
}

#[tokio::test]
async fn file_upsert_never_clobbers_parent_links_with_null() {
	let _guard = DB_GUARD.lock().await;
	let Some(t) = setup().await else { return };
	let (_, body_id) = t.seed_body().await;

	let ProcessedEntity::Meeting(meeting) = processed(json!({
		"id": t.url("meeting/1"),
		"type": "https://schema.oparl.org/1.1/Meeting",
		"name": "Sitzung",
	})) else {
		panic!()
	};
	let meeting_id = t.store.upsert_meeting(&meeting, body_id).await.unwrap();

	let ProcessedEntity::File(file) = processed(json!({
		"id": t.url("file/1"),
		"type": "https://schema.oparl.org/1.1/File",
		"fileName": "einladung.pdf",
	})) else {
		panic!()
	};

	// embedded observation: parent known
	t.store.upsert_file(&file, body_id, None, Some(meeting_id)).await.unwrap();
	// standalone observation: no parent information at all
	t.store.upsert_file(&file, body_id, None, None).await.unwrap();

	let row = sqlx::query("SELECT meeting_id, paper_id FROM oparl_files WHERE external_id = $1")
		.bind(t.url("file/1"))
		.fetch_one(&t.pool)
		.await
		.unwrap();
	assert_eq!(row.get::<Option<Uuid>, _>("meeting_id"), Some(meeting_id));
	assert_eq!(row.get::<Option<Uuid>, _>("paper_id"), None);
}

#[tokio::test]
async fn membership_requires_both_cached_references() {
	let _guard = DB_GUARD.lock().await;
	let Some(t) = setup().await else { return };
	let (_, body_id) = t.seed_body().await;

	let ProcessedEntity::Person(person) = processed(json!({
		"id": t.url("person/1"),
		"type": "https://schema.oparl.org/1.1/Person",
		"familyName": "Musterfrau",
	})) else {
		panic!()
	};
	let ProcessedEntity::Organization(org) = processed(json!({
		"id": t.url("organization/1"),
		"type": "https://schema.oparl.org/1.1/Organization",
		"name": "Rat",
	})) else {
		panic!()
	};
	t.store.upsert_person(&person, body_id).await.unwrap();
	t.store.upsert_organization(&org, body_id).await.unwrap();

	let membership = |n: u32, person: String| {
		let ProcessedEntity::Membership(m) = processed(json!({
			"id": t.url(&format!("membership/{n}")),
			"type": "https://schema.oparl.org/1.1/Membership",
			"person": person,
			"organization": t.url("organization/1"),
		})) else {
			panic!()
		};
		m
	};

	let stored = t.store.upsert_membership(&membership(1, t.url("person/1"))).await.unwrap();
	assert!(stored.is_some());

	let skipped = t.store.upsert_membership(&membership(2, t.url("person/unknown"))).await.unwrap();
	assert!(skipped.is_none(), "an unresolved person reference must skip the row");

	// the cache is job-scoped: a fresh job cannot resolve the person either,
	// even though the row exists, so the membership is skipped again
	let fresh = t.fresh();
	let skipped = fresh.upsert_membership(&membership(3, t.url("person/1"))).await.unwrap();
	assert!(skipped.is_none());
}

#[tokio::test]
async fn batch_exists_reports_only_mirrored_ids() {
	let _guard = DB_GUARD.lock().await;
	let Some(t) = setup().await else { return };
	let (_, body_id) = t.seed_body().await;

	let ProcessedEntity::Paper(paper) = processed(json!({
		"id": t.url("paper/1"),
		"type": "https://schema.oparl.org/1.1/Paper",
		"modified": "2024-02-01T00:00:00Z",
	})) else {
		panic!()
	};
	t.store.upsert_paper(&paper, body_id).await.unwrap();

	let ids = vec![t.url("paper/1"), t.url("paper/ghost")];
	let existing = t.store.batch_exists(EntityKind::Paper, &ids).await.unwrap();

	assert_eq!(existing.len(), 1);
	let modified = existing.get(&t.url("paper/1")).expect("mirrored id must be reported");
	assert_eq!(modified.map(|m| m.to_rfc3339()), Some("2024-02-01T00:00:00+00:00".to_owned()));
	assert!(!existing.contains_key(&t.url("paper/ghost")));

	assert!(t.store.batch_exists(EntityKind::Paper, &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_reports_whether_a_row_was_removed() {
	let _guard = DB_GUARD.lock().await;
	let Some(t) = setup().await else { return };
	let (_, body_id) = t.seed_body().await;

	let ProcessedEntity::Location(location) = processed(json!({
		"id": t.url("location/1"),
		"type": "https://schema.oparl.org/1.1/Location",
		"description": "Rathaus",
	})) else {
		panic!()
	};
	t.store.upsert_location(&location, body_id).await.unwrap();

	assert!(t.store.delete(EntityKind::Location, &t.url("location/1")).await.unwrap());
	assert!(!t.store.delete(EntityKind::Location, &t.url("location/1")).await.unwrap());
	assert!(!t.store.delete(EntityKind::Location, &t.url("location/never")).await.unwrap());
	// the deleted row's cache claim is gone as well
	assert!(t.store.cache().get(EntityKind::Location, &t.url("location/1")).is_none());
}

#[tokio::test]
async fn resolve_backfills_the_cache_from_the_store() {
	let _guard = DB_GUARD.lock().await;
	let Some(t) = setup().await else { return };
	let (_, body_id) = t.seed_body().await;

	let ProcessedEntity::Meeting(meeting) = processed(json!({
		"id": t.url("meeting/1"),
		"type": "https://schema.oparl.org/1.1/Meeting",
	})) else {
		panic!()
	};
	let meeting_id = t.store.upsert_meeting(&meeting, body_id).await.unwrap();

	let fresh = t.fresh();
	assert!(fresh.cache().get(EntityKind::Meeting, &t.url("meeting/1")).is_none());
	let resolved = fresh.resolve(EntityKind::Meeting, &t.url("meeting/1")).await.unwrap();
	assert_eq!(resolved, Some(meeting_id));
	assert_eq!(fresh.cache().get(EntityKind::Meeting, &t.url("meeting/1")), Some(meeting_id));

	assert_eq!(fresh.resolve(EntityKind::Meeting, &t.url("meeting/void")).await.unwrap(), None);
}

#[tokio::test]
async fn stats_cover_every_kind() {
	let _guard = DB_GUARD.lock().await;
	let Some(t) = setup().await else { return };

	let stats = t.store.stats().await.unwrap();
	let names: Vec<&str> = stats.iter().map(|(name, _)| *name).collect();
	assert!(names.contains(&"sources"));
	assert!(names.contains(&"meetings"));
	assert!(names.contains(&"legislative_terms"));
	assert_eq!(names.len(), 12);
}
