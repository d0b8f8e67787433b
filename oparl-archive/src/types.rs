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

//! Value types shared between the processor, the store and the sync pipelines.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

/// Every OParl entity kind the engine mirrors.
///
/// `Source` is not part of this enum: sources are engine-local records keyed
/// by URL, not OParl documents flowing through the pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
	Body,
	Organization,
	Person,
	Membership,
	Meeting,
	Paper,
	AgendaItem,
	File,
	Location,
	Consultation,
	LegislativeTerm,
}

impl EntityKind {
	pub const ALL: [EntityKind; 11] = [
		EntityKind::Body,
		EntityKind::Organization,
		EntityKind::Person,
		EntityKind::Membership,
		EntityKind::Meeting,
		EntityKind::Paper,
		EntityKind::AgendaItem,
		EntityKind::File,
		EntityKind::Location,
		EntityKind::Consultation,
		EntityKind::LegislativeTerm,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			EntityKind::Body => "body",
			EntityKind::Organization => "organization",
			EntityKind::Person => "person",
			EntityKind::Membership => "membership",
			EntityKind::Meeting => "meeting",
			EntityKind::Paper => "paper",
			EntityKind::AgendaItem => "agendaitem",
			EntityKind::File => "file",
			EntityKind::Location => "location",
			EntityKind::Consultation => "consultation",
			EntityKind::LegislativeTerm => "legislativeterm",
		}
	}

	/// Postgres table the kind is mirrored into. The schema is owned by the
	/// external migration tool; these names are part of that contract.
	pub fn table(&self) -> &'static str {
		match self {
			EntityKind::Body => "oparl_bodies",
			EntityKind::Organization => "oparl_organizations",
			EntityKind::Person => "oparl_persons",
			EntityKind::Membership => "oparl_memberships",
			EntityKind::Meeting => "oparl_meetings",
			EntityKind::Paper => "oparl_papers",
			EntityKind::AgendaItem => "oparl_agenda_items",
			EntityKind::File => "oparl_files",
			EntityKind::Location => "oparl_locations",
			EntityKind::Consultation => "oparl_consultations",
			EntityKind::LegislativeTerm => "oparl_legislative_terms",
		}
	}

	/// Determine the kind from an OParl `type` URL, e.g.
	/// `https://schema.oparl.org/1.1/Meeting` => `Meeting`.
	///
	/// The match is case-insensitive on the last path segment; unknown
	/// suffixes yield `None`.
	pub fn from_type_url(type_url: &str) -> Option<Self> {
		let segment = type_url.trim_end_matches('/').rsplit('/').next()?;
		match segment.to_ascii_lowercase().as_str() {
			"body" => Some(EntityKind::Body),
			"organization" => Some(EntityKind::Organization),
			"person" => Some(EntityKind::Person),
			"membership" => Some(EntityKind::Membership),
			"meeting" => Some(EntityKind::Meeting),
			"paper" => Some(EntityKind::Paper),
			"agendaitem" => Some(EntityKind::AgendaItem),
			"file" => Some(EntityKind::File),
			"location" => Some(EntityKind::Location),
			"consultation" => Some(EntityKind::Consultation),
			"legislativeterm" => Some(EntityKind::LegislativeTerm),
			_ => None,
		}
	}
}

impl fmt::Display for EntityKind {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A raw OParl document after normalization by the processor.
///
/// One variant per kind; the processor returns `None` for unknown types, so
/// there is no catch-all variant here.
#[derive(Debug, Clone)]
pub enum ProcessedEntity {
	Body(ProcessedBody),
	Organization(ProcessedOrganization),
	Person(ProcessedPerson),
	Membership(ProcessedMembership),
	Meeting(ProcessedMeeting),
	Paper(ProcessedPaper),
	AgendaItem(ProcessedAgendaItem),
	File(ProcessedFile),
	Location(ProcessedLocation),
	Consultation(ProcessedConsultation),
	LegislativeTerm(ProcessedLegislativeTerm),
}

impl ProcessedEntity {
	pub fn kind(&self) -> EntityKind {
		match self {
			ProcessedEntity::Body(_) => EntityKind::Body,
			ProcessedEntity::Organization(_) => EntityKind::Organization,
			ProcessedEntity::Person(_) => EntityKind::Person,
			ProcessedEntity::Membership(_) => EntityKind::Membership,
			ProcessedEntity::Meeting(_) => EntityKind::Meeting,
			ProcessedEntity::Paper(_) => EntityKind::Paper,
			ProcessedEntity::AgendaItem(_) => EntityKind::AgendaItem,
			ProcessedEntity::File(_) => EntityKind::File,
			ProcessedEntity::Location(_) => EntityKind::Location,
			ProcessedEntity::Consultation(_) => EntityKind::Consultation,
			ProcessedEntity::LegislativeTerm(_) => EntityKind::LegislativeTerm,
		}
	}

	pub fn external_id(&self) -> &str {
		match self {
			ProcessedEntity::Body(e) => &e.external_id,
			ProcessedEntity::Organization(e) => &e.external_id,
			ProcessedEntity::Person(e) => &e.external_id,
			ProcessedEntity::Membership(e) => &e.external_id,
			ProcessedEntity::Meeting(e) => &e.external_id,
			ProcessedEntity::Paper(e) => &e.external_id,
			ProcessedEntity::AgendaItem(e) => &e.external_id,
			ProcessedEntity::File(e) => &e.external_id,
			ProcessedEntity::Location(e) => &e.external_id,
			ProcessedEntity::Consultation(e) => &e.external_id,
			ProcessedEntity::LegislativeTerm(e) => &e.external_id,
		}
	}

	pub fn raw_json(&self) -> &Value {
		match self {
			ProcessedEntity::Body(e) => &e.raw_json,
			ProcessedEntity::Organization(e) => &e.raw_json,
			ProcessedEntity::Person(e) => &e.raw_json,
			ProcessedEntity::Membership(e) => &e.raw_json,
			ProcessedEntity::Meeting(e) => &e.raw_json,
			ProcessedEntity::Paper(e) => &e.raw_json,
			ProcessedEntity::AgendaItem(e) => &e.raw_json,
			ProcessedEntity::File(e) => &e.raw_json,
			ProcessedEntity::Location(e) => &e.raw_json,
			ProcessedEntity::Consultation(e) => &e.raw_json,
			ProcessedEntity::LegislativeTerm(e) => &e.raw_json,
		}
	}
}

#[derive(Debug, Clone)]
pub struct ProcessedBody {
	pub external_id: String,
	pub name: Option<String>,
	pub short_name: Option<String>,
	pub website: Option<String>,
	pub license: Option<String>,
	pub classification: Option<String>,
	pub organization_list_url: Option<String>,
	pub person_list_url: Option<String>,
	pub meeting_list_url: Option<String>,
	pub paper_list_url: Option<String>,
	pub membership_list_url: Option<String>,
	pub agenda_item_list_url: Option<String>,
	pub file_list_url: Option<String>,
	pub location_list_url: Option<String>,
	pub consultation_list_url: Option<String>,
	pub legislative_term_list_url: Option<String>,
	pub oparl_created: Option<DateTime<Utc>>,
	pub oparl_modified: Option<DateTime<Utc>>,
	pub raw_json: Value,
	/// Legislative terms embedded in the body document.
	pub nested: Vec<ProcessedEntity>,
}

#[derive(Debug, Clone)]
pub struct ProcessedOrganization {
	pub external_id: String,
	pub name: Option<String>,
	pub short_name: Option<String>,
	pub organization_type: Option<String>,
	pub classification: Option<String>,
	pub website: Option<String>,
	pub start_date: Option<NaiveDate>,
	pub end_date: Option<NaiveDate>,
	pub oparl_created: Option<DateTime<Utc>>,
	pub oparl_modified: Option<DateTime<Utc>>,
	pub raw_json: Value,
}

#[derive(Debug, Clone)]
pub struct ProcessedPerson {
	pub external_id: String,
	pub name: Option<String>,
	pub family_name: Option<String>,
	pub given_name: Option<String>,
	pub title: Option<String>,
	pub gender: Option<String>,
	pub email: Option<String>,
	pub phone: Option<String>,
	pub oparl_created: Option<DateTime<Utc>>,
	pub oparl_modified: Option<DateTime<Utc>>,
	pub raw_json: Value,
	/// Memberships embedded in the person document (OParl 1.0 style).
	pub nested: Vec<ProcessedEntity>,
}

#[derive(Debug, Clone)]
pub struct ProcessedMembership {
	pub external_id: String,
	pub person_external_id: Option<String>,
	pub organization_external_id: Option<String>,
	pub role: Option<String>,
	pub voting_right: Option<bool>,
	pub start_date: Option<NaiveDate>,
	pub end_date: Option<NaiveDate>,
	pub oparl_created: Option<DateTime<Utc>>,
	pub oparl_modified: Option<DateTime<Utc>>,
	pub raw_json: Value,
}

#[derive(Debug, Clone)]
pub struct ProcessedMeeting {
	pub external_id: String,
	pub name: Option<String>,
	pub meeting_state: Option<String>,
	pub cancelled: bool,
	pub start: Option<DateTime<Utc>>,
	pub end: Option<DateTime<Utc>>,
	pub location_name: Option<String>,
	pub location_address: Option<String>,
	pub oparl_created: Option<DateTime<Utc>>,
	pub oparl_modified: Option<DateTime<Utc>>,
	pub raw_json: Value,
	/// Embedded agenda items, files and the meeting location.
	pub nested: Vec<ProcessedEntity>,
}

#[derive(Debug, Clone)]
pub struct ProcessedPaper {
	pub external_id: String,
	pub name: Option<String>,
	pub reference: Option<String>,
	pub paper_type: Option<String>,
	pub date: Option<NaiveDate>,
	pub oparl_created: Option<DateTime<Utc>>,
	pub oparl_modified: Option<DateTime<Utc>>,
	pub raw_json: Value,
	/// Embedded files and consultations.
	pub nested: Vec<ProcessedEntity>,
}

#[derive(Debug, Clone)]
pub struct ProcessedAgendaItem {
	pub external_id: String,
	pub meeting_external_id: Option<String>,
	pub number: Option<String>,
	pub order: Option<i32>,
	pub name: Option<String>,
	pub public: Option<bool>,
	pub result: Option<String>,
	pub resolution_text: Option<String>,
	pub oparl_created: Option<DateTime<Utc>>,
	pub oparl_modified: Option<DateTime<Utc>>,
	pub raw_json: Value,
}

#[derive(Debug, Clone)]
pub struct ProcessedFile {
	pub external_id: String,
	pub name: Option<String>,
	pub file_name: Option<String>,
	pub mime_type: Option<String>,
	pub size: Option<i64>,
	pub access_url: Option<String>,
	pub download_url: Option<String>,
	pub date: Option<NaiveDate>,
	/// Back-references carried by standalone file documents.
	pub paper_external_ids: Vec<String>,
	pub meeting_external_ids: Vec<String>,
	pub oparl_created: Option<DateTime<Utc>>,
	pub oparl_modified: Option<DateTime<Utc>>,
	pub raw_json: Value,
}

#[derive(Debug, Clone)]
pub struct ProcessedLocation {
	pub external_id: String,
	pub description: Option<String>,
	pub street_address: Option<String>,
	pub room: Option<String>,
	pub postal_code: Option<String>,
	pub locality: Option<String>,
	pub geojson: Option<Value>,
	pub oparl_created: Option<DateTime<Utc>>,
	pub oparl_modified: Option<DateTime<Utc>>,
	pub raw_json: Value,
}

#[derive(Debug, Clone)]
pub struct ProcessedConsultation {
	pub external_id: String,
	pub paper_external_id: Option<String>,
	pub meeting_external_id: Option<String>,
	pub agenda_item_external_id: Option<String>,
	pub role: Option<String>,
	pub authoritative: Option<bool>,
	pub oparl_created: Option<DateTime<Utc>>,
	pub oparl_modified: Option<DateTime<Utc>>,
	pub raw_json: Value,
}

#[derive(Debug, Clone)]
pub struct ProcessedLegislativeTerm {
	pub external_id: String,
	pub name: Option<String>,
	pub start_date: Option<NaiveDate>,
	pub end_date: Option<NaiveDate>,
	pub oparl_created: Option<DateTime<Utc>>,
	pub oparl_modified: Option<DateTime<Utc>>,
	pub raw_json: Value,
}
