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

//! Translates processed entities into idempotent database writes.
//!
//! Every upsert is a single `INSERT .. ON CONFLICT (external_id) DO UPDATE
//! .. RETURNING id` statement. Concurrent body jobs can race on the same
//! external id (entities are shared between bodies on some servers); the
//! single-statement form makes the race benign. Read-then-write upserts are
//! forbidden here for that reason.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde_json::Value;
use sqlx::postgres::PgQueryResult;
use uuid::Uuid;

use super::{queries, Database};
use crate::{
	cache::IdentityCache,
	database::models::{BodyModel, SourceModel},
	error::Result,
	events::Clock,
	types::*,
};

#[derive(Clone)]
pub struct Store {
	db: Database,
	cache: IdentityCache,
	clock: Arc<dyn Clock>,
}

impl Store {
	pub fn new(db: Database, cache: IdentityCache, clock: Arc<dyn Clock>) -> Self {
		Self { db, cache, clock }
	}

	pub fn cache(&self) -> &IdentityCache {
		&self.cache
	}

	pub fn database(&self) -> &Database {
		&self.db
	}

	// ---- sources ----

	pub async fn upsert_source(&self, url: &str, name: &str, raw_json: &Value) -> Result<Uuid> {
		let mut conn = self.db.conn().await?;
		let id: Uuid = sqlx::query_scalar(
			r#"
			INSERT INTO oparl_sources (id, url, name, raw_json, is_active, created_at, updated_at)
			VALUES ($1, $2, $3, $4, TRUE, NOW(), NOW())
			ON CONFLICT (url) DO UPDATE SET
				name = EXCLUDED.name,
				raw_json = EXCLUDED.raw_json,
				is_active = TRUE,
				updated_at = NOW()
			RETURNING id
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(url)
		.bind(name)
		.bind(raw_json)
		.fetch_one(&mut *conn)
		.await?;
		Ok(id)
	}

	pub async fn get_source_by_url(&self, url: &str) -> Result<Option<SourceModel>> {
		let mut conn = self.db.conn().await?;
		queries::get_source_by_url(&mut conn, url).await
	}

	pub async fn get_all_sources(&self) -> Result<Vec<SourceModel>> {
		let mut conn = self.db.conn().await?;
		queries::get_all_sources(&mut conn, true).await
	}

	/// Record the incremental high-water mark after a source job.
	pub async fn update_source_sync_time(&self, source_id: Uuid, full_sync: bool) -> Result<()> {
		let now = self.clock.now();
		let mut conn = self.db.conn().await?;
		sqlx::query(
			r#"
			UPDATE oparl_sources
			SET last_sync = $2, last_full_sync = COALESCE($3, last_full_sync), updated_at = NOW()
			WHERE id = $1
			"#,
		)
		.bind(source_id)
		.bind(now)
		.bind(full_sync.then_some(now))
		.execute(&mut *conn)
		.await?;
		Ok(())
	}

	// ---- bodies ----

	pub async fn upsert_body(&self, body: &ProcessedBody, source_id: Uuid) -> Result<Uuid> {
		let mut conn = self.db.conn().await?;
		let id: Uuid = sqlx::query_scalar(
			r#"
			INSERT INTO oparl_bodies (
				id, external_id, source_id, name, short_name, website, license, classification,
				organization_list_url, person_list_url, meeting_list_url, paper_list_url,
				membership_list_url, agenda_item_list_url, file_list_url, location_list_url,
				consultation_list_url, legislative_term_list_url,
				oparl_created, oparl_modified, raw_json, created_at, updated_at
			) VALUES (
				$1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
				$19, $20, $21, NOW(), NOW()
			)
			ON CONFLICT (external_id) DO UPDATE SET
				name = EXCLUDED.name,
				short_name = EXCLUDED.short_name,
				website = EXCLUDED.website,
				license = EXCLUDED.license,
				classification = EXCLUDED.classification,
				organization_list_url = EXCLUDED.organization_list_url,
				person_list_url = EXCLUDED.person_list_url,
				meeting_list_url = EXCLUDED.meeting_list_url,
				paper_list_url = EXCLUDED.paper_list_url,
				membership_list_url = EXCLUDED.membership_list_url,
				agenda_item_list_url = EXCLUDED.agenda_item_list_url,
				file_list_url = EXCLUDED.file_list_url,
				location_list_url = EXCLUDED.location_list_url,
				consultation_list_url = EXCLUDED.consultation_list_url,
				legislative_term_list_url = EXCLUDED.legislative_term_list_url,
				oparl_created = EXCLUDED.oparl_created,
				oparl_modified = EXCLUDED.oparl_modified,
				raw_json = EXCLUDED.raw_json,
				updated_at = NOW()
			RETURNING id
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(&body.external_id)
		.bind(source_id)
		.bind(&body.name)
		.bind(&body.short_name)
		.bind(&body.website)
		.bind(&body.license)
		.bind(&body.classification)
		.bind(&body.organization_list_url)
		.bind(&body.person_list_url)
		.bind(&body.meeting_list_url)
		.bind(&body.paper_list_url)
		.bind(&body.membership_list_url)
		.bind(&body.agenda_item_list_url)
		.bind(&body.file_list_url)
		.bind(&body.location_list_url)
		.bind(&body.consultation_list_url)
		.bind(&body.legislative_term_list_url)
		.bind(body.oparl_created)
		.bind(body.oparl_modified)
		.bind(&body.raw_json)
		.fetch_one(&mut *conn)
		.await?;
		drop(conn);
		self.cache.insert(EntityKind::Body, &body.external_id, id);

		for nested in &body.nested {
			if let ProcessedEntity::LegislativeTerm(term) = nested {
				self.upsert_legislative_term(term, id).await?;
			}
		}
		Ok(id)
	}

	pub async fn get_body_by_external_id(&self, external_id: &str) -> Result<Option<BodyModel>> {
		let mut conn = self.db.conn().await?;
		queries::get_body_by_external_id(&mut conn, external_id).await
	}

	pub async fn update_body_sync_time(&self, body_id: Uuid) -> Result<()> {
		let mut conn = self.db.conn().await?;
		sqlx::query("UPDATE oparl_bodies SET last_sync = $2, updated_at = NOW() WHERE id = $1")
			.bind(body_id)
			.bind(self.clock.now())
			.execute(&mut *conn)
			.await?;
		Ok(())
	}

	// ---- entity dispatch ----

	/// Upsert a standalone entity, resolving foreign keys per kind policy.
	/// `Ok(None)` means the item was skipped (unresolvable mandatory FK, or
	/// a kind the pipelines never store standalone).
	pub async fn upsert_entity(&self, entity: &ProcessedEntity, body_id: Uuid) -> Result<Option<Uuid>> {
		match entity {
			// bodies are driven by the orchestrator, never by a pipeline
			ProcessedEntity::Body(_) => Ok(None),
			ProcessedEntity::Organization(org) => self.upsert_organization(org, body_id).await.map(Some),
			ProcessedEntity::Person(person) => self.upsert_person(person, body_id).await.map(Some),
			ProcessedEntity::Membership(membership) => self.upsert_membership(membership).await,
			ProcessedEntity::Meeting(meeting) => self.upsert_meeting(meeting, body_id).await.map(Some),
			ProcessedEntity::Paper(paper) => self.upsert_paper(paper, body_id).await.map(Some),
			ProcessedEntity::AgendaItem(item) => {
				let Some(meeting_external_id) = item.meeting_external_id.as_deref() else {
					log::debug!("skipping agenda item {} without meeting reference", item.external_id);
					return Ok(None);
				};
				match self.resolve(EntityKind::Meeting, meeting_external_id).await? {
					Some(meeting_id) => self.upsert_agenda_item(item, meeting_id).await.map(Some),
					None => {
						log::debug!(
							"skipping agenda item {}: meeting {} not mirrored yet",
							item.external_id,
							meeting_external_id
						);
						Ok(None)
					}
				}
			}
			ProcessedEntity::File(file) => {
				let paper_id = match file.paper_external_ids.first() {
					Some(eid) => self.resolve(EntityKind::Paper, eid).await?,
					None => None,
				};
				let meeting_id = match file.meeting_external_ids.first() {
					Some(eid) => self.resolve(EntityKind::Meeting, eid).await?,
					None => None,
				};
				self.upsert_file(file, body_id, paper_id, meeting_id).await.map(Some)
			}
			ProcessedEntity::Location(location) => self.upsert_location(location, body_id).await.map(Some),
			ProcessedEntity::Consultation(consultation) => {
				let paper_id = match consultation.paper_external_id.as_deref() {
					Some(eid) => self.resolve(EntityKind::Paper, eid).await?,
					None => None,
				};
				self.upsert_consultation(consultation, body_id, paper_id).await.map(Some)
			}
			ProcessedEntity::LegislativeTerm(term) => self.upsert_legislative_term(term, body_id).await.map(Some),
		}
	}

	// ---- per-kind upserts ----

	pub async fn upsert_organization(&self, org: &ProcessedOrganization, body_id: Uuid) -> Result<Uuid> {
		let mut conn = self.db.conn().await?;
		let id: Uuid = sqlx::query_scalar(
			r#"
			INSERT INTO oparl_organizations (
				id, external_id, body_id, name, short_name, organization_type, classification,
				website, start_date, end_date, oparl_created, oparl_modified, raw_json,
				created_at, updated_at
			) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW(), NOW())
			ON CONFLICT (external_id) DO UPDATE SET
				name = EXCLUDED.name,
				short_name = EXCLUDED.short_name,
				organization_type = EXCLUDED.organization_type,
				classification = EXCLUDED.classification,
				website = EXCLUDED.website,
				start_date = EXCLUDED.start_date,
				end_date = EXCLUDED.end_date,
				oparl_created = EXCLUDED.oparl_created,
				oparl_modified = EXCLUDED.oparl_modified,
				raw_json = EXCLUDED.raw_json,
				updated_at = NOW()
			RETURNING id
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(&org.external_id)
		.bind(body_id)
		.bind(&org.name)
		.bind(&org.short_name)
		.bind(&org.organization_type)
		.bind(&org.classification)
		.bind(&org.website)
		.bind(org.start_date)
		.bind(org.end_date)
		.bind(org.oparl_created)
		.bind(org.oparl_modified)
		.bind(&org.raw_json)
		.fetch_one(&mut *conn)
		.await?;
		self.cache.insert(EntityKind::Organization, &org.external_id, id);
		Ok(id)
	}

	/// Upsert a person, then fan out any memberships embedded in the
	/// document.
	pub async fn upsert_person(&self, person: &ProcessedPerson, body_id: Uuid) -> Result<Uuid> {
		let mut conn = self.db.conn().await?;
		let id: Uuid = sqlx::query_scalar(
			r#"
			INSERT INTO oparl_persons (
				id, external_id, body_id, name, family_name, given_name, title, gender, email,
				phone, oparl_created, oparl_modified, raw_json, created_at, updated_at
			) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW(), NOW())
			ON CONFLICT (external_id) DO UPDATE SET
				name = EXCLUDED.name,
				family_name = EXCLUDED.family_name,
				given_name = EXCLUDED.given_name,
				title = EXCLUDED.title,
				gender = EXCLUDED.gender,
				email = EXCLUDED.email,
				phone = EXCLUDED.phone,
				oparl_created = EXCLUDED.oparl_created,
				oparl_modified = EXCLUDED.oparl_modified,
				raw_json = EXCLUDED.raw_json,
				updated_at = NOW()
			RETURNING id
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(&person.external_id)
		.bind(body_id)
		.bind(&person.name)
		.bind(&person.family_name)
		.bind(&person.given_name)
		.bind(&person.title)
		.bind(&person.gender)
		.bind(&person.email)
		.bind(&person.phone)
		.bind(person.oparl_created)
		.bind(person.oparl_modified)
		.bind(&person.raw_json)
		.fetch_one(&mut *conn)
		.await?;
		drop(conn);
		self.cache.insert(EntityKind::Person, &person.external_id, id);

		for nested in &person.nested {
			if let ProcessedEntity::Membership(membership) = nested {
				self.upsert_membership(membership).await?;
			}
		}
		Ok(id)
	}

	/// Upsert a membership. Both foreign keys are mandatory; if either is
	/// missing from the identity cache the row is skipped, never stored with
	/// a NULL.
	pub async fn upsert_membership(&self, membership: &ProcessedMembership) -> Result<Option<Uuid>> {
		let person_id =
			membership.person_external_id.as_deref().and_then(|eid| self.cache.get(EntityKind::Person, eid));
		let organization_id = membership
			.organization_external_id
			.as_deref()
			.and_then(|eid| self.cache.get(EntityKind::Organization, eid));
		let (Some(person_id), Some(organization_id)) = (person_id, organization_id) else {
			log::debug!(
				"skipping membership {}: unresolved person or organization reference",
				membership.external_id
			);
			return Ok(None);
		};

		let mut conn = self.db.conn().await?;
		let id: Uuid = sqlx::query_scalar(
			r#"
			INSERT INTO oparl_memberships (
				id, external_id, person_id, organization_id, role, voting_right, start_date,
				end_date, oparl_created, oparl_modified, raw_json, created_at, updated_at
			) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())
			ON CONFLICT (external_id) DO UPDATE SET
				person_id = EXCLUDED.person_id,
				organization_id = EXCLUDED.organization_id,
				role = EXCLUDED.role,
				voting_right = EXCLUDED.voting_right,
				start_date = EXCLUDED.start_date,
				end_date = EXCLUDED.end_date,
				oparl_created = EXCLUDED.oparl_created,
				oparl_modified = EXCLUDED.oparl_modified,
				raw_json = EXCLUDED.raw_json,
				updated_at = NOW()
			RETURNING id
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(&membership.external_id)
		.bind(person_id)
		.bind(organization_id)
		.bind(&membership.role)
		.bind(membership.voting_right)
		.bind(membership.start_date)
		.bind(membership.end_date)
		.bind(membership.oparl_created)
		.bind(membership.oparl_modified)
		.bind(&membership.raw_json)
		.fetch_one(&mut *conn)
		.await?;
		self.cache.insert(EntityKind::Membership, &membership.external_id, id);
		Ok(Some(id))
	}

	/// Upsert a meeting, then fan out embedded agenda items, files and the
	/// location.
	pub async fn upsert_meeting(&self, meeting: &ProcessedMeeting, body_id: Uuid) -> Result<Uuid> {
		let mut conn = self.db.conn().await?;
		let id: Uuid = sqlx::query_scalar(
			r#"
			INSERT INTO oparl_meetings (
				id, external_id, body_id, name, meeting_state, cancelled, "start", "end",
				location_name, location_address, oparl_created, oparl_modified, raw_json,
				created_at, updated_at
			) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW(), NOW())
			ON CONFLICT (external_id) DO UPDATE SET
				name = EXCLUDED.name,
				meeting_state = EXCLUDED.meeting_state,
				cancelled = EXCLUDED.cancelled,
				"start" = EXCLUDED."start",
				"end" = EXCLUDED."end",
				location_name = EXCLUDED.location_name,
				location_address = EXCLUDED.location_address,
				oparl_created = EXCLUDED.oparl_created,
				oparl_modified = EXCLUDED.oparl_modified,
				raw_json = EXCLUDED.raw_json,
				updated_at = NOW()
			RETURNING id
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(&meeting.external_id)
		.bind(body_id)
		.bind(&meeting.name)
		.bind(&meeting.meeting_state)
		.bind(meeting.cancelled)
		.bind(meeting.start)
		.bind(meeting.end)
		.bind(&meeting.location_name)
		.bind(&meeting.location_address)
		.bind(meeting.oparl_created)
		.bind(meeting.oparl_modified)
		.bind(&meeting.raw_json)
		.fetch_one(&mut *conn)
		.await?;
		drop(conn);
		self.cache.insert(EntityKind::Meeting, &meeting.external_id, id);

		for nested in &meeting.nested {
			match nested {
				ProcessedEntity::AgendaItem(item) => {
					self.upsert_agenda_item(item, id).await?;
				}
				ProcessedEntity::File(file) => {
					self.upsert_file(file, body_id, None, Some(id)).await?;
				}
				ProcessedEntity::Location(location) => {
					self.upsert_location(location, body_id).await?;
				}
				_ => {}
			}
		}
		Ok(id)
	}

	/// Upsert a paper, then fan out embedded files and consultations.
	pub async fn upsert_paper(&self, paper: &ProcessedPaper, body_id: Uuid) -> Result<Uuid> {
		let mut conn = self.db.conn().await?;
		let id: Uuid = sqlx::query_scalar(
			r#"
			INSERT INTO oparl_papers (
				id, external_id, body_id, name, reference, paper_type, "date", oparl_created,
				oparl_modified, raw_json, created_at, updated_at
			) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
			ON CONFLICT (external_id) DO UPDATE SET
				name = EXCLUDED.name,
				reference = EXCLUDED.reference,
				paper_type = EXCLUDED.paper_type,
				"date" = EXCLUDED."date",
				oparl_created = EXCLUDED.oparl_created,
				oparl_modified = EXCLUDED.oparl_modified,
				raw_json = EXCLUDED.raw_json,
				updated_at = NOW()
			RETURNING id
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(&paper.external_id)
		.bind(body_id)
		.bind(&paper.name)
		.bind(&paper.reference)
		.bind(&paper.paper_type)
		.bind(paper.date)
		.bind(paper.oparl_created)
		.bind(paper.oparl_modified)
		.bind(&paper.raw_json)
		.fetch_one(&mut *conn)
		.await?;
		drop(conn);
		self.cache.insert(EntityKind::Paper, &paper.external_id, id);

		for nested in &paper.nested {
			match nested {
				ProcessedEntity::File(file) => {
					self.upsert_file(file, body_id, Some(id), None).await?;
				}
				ProcessedEntity::Consultation(consultation) => {
					self.upsert_consultation(consultation, body_id, Some(id)).await?;
				}
				_ => {}
			}
		}
		Ok(id)
	}

	pub async fn upsert_agenda_item(&self, item: &ProcessedAgendaItem, meeting_id: Uuid) -> Result<Uuid> {
		let mut conn = self.db.conn().await?;
		let id: Uuid = sqlx::query_scalar(
			r#"
			INSERT INTO oparl_agenda_items (
				id, external_id, meeting_id, number, "order", name, public, result,
				resolution_text, oparl_created, oparl_modified, raw_json, created_at, updated_at
			) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
			ON CONFLICT (external_id) DO UPDATE SET
				meeting_id = EXCLUDED.meeting_id,
				number = EXCLUDED.number,
				"order" = EXCLUDED."order",
				name = EXCLUDED.name,
				public = EXCLUDED.public,
				result = EXCLUDED.result,
				resolution_text = EXCLUDED.resolution_text,
				oparl_created = EXCLUDED.oparl_created,
				oparl_modified = EXCLUDED.oparl_modified,
				raw_json = EXCLUDED.raw_json,
				updated_at = NOW()
			RETURNING id
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(&item.external_id)
		.bind(meeting_id)
		.bind(&item.number)
		.bind(item.order)
		.bind(&item.name)
		.bind(item.public)
		.bind(&item.result)
		.bind(&item.resolution_text)
		.bind(item.oparl_created)
		.bind(item.oparl_modified)
		.bind(&item.raw_json)
		.fetch_one(&mut *conn)
		.await?;
		self.cache.insert(EntityKind::AgendaItem, &item.external_id, id);
		Ok(id)
	}

	/// Upsert a file. A file surfaces both embedded (paper/meeting known)
	/// and standalone (back-references only); the COALESCE keeps an existing
	/// parent link when the new observation carries none.
	pub async fn upsert_file(
		&self,
		file: &ProcessedFile,
		body_id: Uuid,
		paper_id: Option<Uuid>,
		meeting_id: Option<Uuid>,
	) -> Result<Uuid> {
		let mut conn = self.db.conn().await?;
		let id: Uuid = sqlx::query_scalar(
			r#"
			INSERT INTO oparl_files (
				id, external_id, body_id, paper_id, meeting_id, name, file_name, mime_type,
				size, access_url, download_url, file_date, oparl_created, oparl_modified,
				raw_json, text_extraction_status, created_at, updated_at
			) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 'pending', NOW(), NOW())
			ON CONFLICT (external_id) DO UPDATE SET
				paper_id = COALESCE(EXCLUDED.paper_id, oparl_files.paper_id),
				meeting_id = COALESCE(EXCLUDED.meeting_id, oparl_files.meeting_id),
				name = EXCLUDED.name,
				file_name = EXCLUDED.file_name,
				mime_type = EXCLUDED.mime_type,
				size = EXCLUDED.size,
				access_url = EXCLUDED.access_url,
				download_url = EXCLUDED.download_url,
				file_date = EXCLUDED.file_date,
				oparl_created = EXCLUDED.oparl_created,
				oparl_modified = EXCLUDED.oparl_modified,
				raw_json = EXCLUDED.raw_json,
				updated_at = NOW()
			RETURNING id
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(&file.external_id)
		.bind(body_id)
		.bind(paper_id)
		.bind(meeting_id)
		.bind(&file.name)
		.bind(&file.file_name)
		.bind(&file.mime_type)
		.bind(file.size)
		.bind(&file.access_url)
		.bind(&file.download_url)
		.bind(file.date)
		.bind(file.oparl_created)
		.bind(file.oparl_modified)
		.bind(&file.raw_json)
		.fetch_one(&mut *conn)
		.await?;
		self.cache.insert(EntityKind::File, &file.external_id, id);
		Ok(id)
	}

	pub async fn upsert_location(&self, location: &ProcessedLocation, body_id: Uuid) -> Result<Uuid> {
		let mut conn = self.db.conn().await?;
		let id: Uuid = sqlx::query_scalar(
			r#"
			INSERT INTO oparl_locations (
				id, external_id, body_id, description, street_address, room, postal_code,
				locality, geojson, oparl_created, oparl_modified, raw_json, created_at, updated_at
			) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
			ON CONFLICT (external_id) DO UPDATE SET
				description = EXCLUDED.description,
				street_address = EXCLUDED.street_address,
				room = EXCLUDED.room,
				postal_code = EXCLUDED.postal_code,
				locality = EXCLUDED.locality,
				geojson = EXCLUDED.geojson,
				oparl_created = EXCLUDED.oparl_created,
				oparl_modified = EXCLUDED.oparl_modified,
				raw_json = EXCLUDED.raw_json,
				updated_at = NOW()
			RETURNING id
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(&location.external_id)
		.bind(body_id)
		.bind(&location.description)
		.bind(&location.street_address)
		.bind(&location.room)
		.bind(&location.postal_code)
		.bind(&location.locality)
		.bind(&location.geojson)
		.bind(location.oparl_created)
		.bind(location.oparl_modified)
		.bind(&location.raw_json)
		.fetch_one(&mut *conn)
		.await?;
		self.cache.insert(EntityKind::Location, &location.external_id, id);
		Ok(id)
	}

	/// Upsert a consultation. The paper link is best-effort; like files, an
	/// already-resolved link is never overwritten with NULL, so a later sync
	/// can reconcile a consultation whose paper appeared after it did.
	pub async fn upsert_consultation(
		&self,
		consultation: &ProcessedConsultation,
		body_id: Uuid,
		paper_id: Option<Uuid>,
	) -> Result<Uuid> {
		let mut conn = self.db.conn().await?;
		let id: Uuid = sqlx::query_scalar(
			r#"
			INSERT INTO oparl_consultations (
				id, external_id, body_id, paper_id, paper_external_id, meeting_external_id,
				agenda_item_external_id, role, authoritative, oparl_created, oparl_modified,
				raw_json, created_at, updated_at
			) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
			ON CONFLICT (external_id) DO UPDATE SET
				paper_id = COALESCE(EXCLUDED.paper_id, oparl_consultations.paper_id),
				paper_external_id = EXCLUDED.paper_external_id,
				meeting_external_id = EXCLUDED.meeting_external_id,
				agenda_item_external_id = EXCLUDED.agenda_item_external_id,
				role = EXCLUDED.role,
				authoritative = EXCLUDED.authoritative,
				oparl_created = EXCLUDED.oparl_created,
				oparl_modified = EXCLUDED.oparl_modified,
				raw_json = EXCLUDED.raw_json,
				updated_at = NOW()
			RETURNING id
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(&consultation.external_id)
		.bind(body_id)
		.bind(paper_id)
		.bind(&consultation.paper_external_id)
		.bind(&consultation.meeting_external_id)
		.bind(&consultation.agenda_item_external_id)
		.bind(&consultation.role)
		.bind(consultation.authoritative)
		.bind(consultation.oparl_created)
		.bind(consultation.oparl_modified)
		.bind(&consultation.raw_json)
		.fetch_one(&mut *conn)
		.await?;
		self.cache.insert(EntityKind::Consultation, &consultation.external_id, id);
		Ok(id)
	}

	pub async fn upsert_legislative_term(&self, term: &ProcessedLegislativeTerm, body_id: Uuid) -> Result<Uuid> {
		let mut conn = self.db.conn().await?;
		let id: Uuid = sqlx::query_scalar(
			r#"
			INSERT INTO oparl_legislative_terms (
				id, external_id, body_id, name, start_date, end_date, oparl_created,
				oparl_modified, raw_json, created_at, updated_at
			) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())
			ON CONFLICT (external_id) DO UPDATE SET
				name = EXCLUDED.name,
				start_date = EXCLUDED.start_date,
				end_date = EXCLUDED.end_date,
				oparl_created = EXCLUDED.oparl_created,
				oparl_modified = EXCLUDED.oparl_modified,
				raw_json = EXCLUDED.raw_json,
				updated_at = NOW()
			RETURNING id
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(&term.external_id)
		.bind(body_id)
		.bind(&term.name)
		.bind(term.start_date)
		.bind(term.end_date)
		.bind(term.oparl_created)
		.bind(term.oparl_modified)
		.bind(&term.raw_json)
		.fetch_one(&mut *conn)
		.await?;
		self.cache.insert(EntityKind::LegislativeTerm, &term.external_id, id);
		Ok(id)
	}

	// ---- tombstones & existence ----

	/// Delete a tombstoned entity. Returns whether a row was removed; a
	/// tombstone for an unknown row is a no-op, not an error.
	pub async fn delete(&self, kind: EntityKind, external_id: &str) -> Result<bool> {
		let mut conn = self.db.conn().await?;
		let sql = format!("DELETE FROM {} WHERE external_id = $1", kind.table());
		let result: PgQueryResult = sqlx::query(&sql).bind(external_id).execute(&mut *conn).await?;
		drop(conn);
		self.cache.remove(kind, external_id);
		Ok(result.rows_affected() > 0)
	}

	/// Batch existence probe for one page of external ids: maps every id to
	/// its stored `oparl_modified` (`None` = present without timestamp);
	/// ids missing from the map are absent from the store.
	pub async fn batch_exists(
		&self,
		kind: EntityKind,
		external_ids: &[String],
	) -> Result<HashMap<String, Option<DateTime<Utc>>>> {
		if external_ids.is_empty() {
			return Ok(HashMap::new());
		}
		let mut conn = self.db.conn().await?;
		let rows = queries::modified_for_ids(&mut conn, kind, external_ids).await?;
		Ok(rows.into_iter().collect())
	}

	/// Look up a surrogate id: identity cache first, then the store. A store
	/// hit back-fills the cache.
	pub async fn resolve(&self, kind: EntityKind, external_id: &str) -> Result<Option<Uuid>> {
		if let Some(id) = self.cache.get(kind, external_id) {
			return Ok(Some(id));
		}
		let mut conn = self.db.conn().await?;
		let found = queries::surrogate_id(&mut conn, kind, external_id).await?;
		if let Some(id) = found {
			self.cache.insert(kind, external_id, id);
		}
		Ok(found)
	}

	// ---- statistics ----

	/// Per-kind row counts for the CLI `status` command.
	pub async fn stats(&self) -> Result<Vec<(&'static str, i64)>> {
		let mut conn = self.db.conn().await?;
		let mut stats = vec![("sources", queries::row_count(&mut conn, "oparl_sources").await?)];
		for kind in EntityKind::ALL {
			stats.push((kind.table().trim_start_matches("oparl_"), queries::row_count(&mut conn, kind.table()).await?));
		}
		Ok(stats)
	}
}
