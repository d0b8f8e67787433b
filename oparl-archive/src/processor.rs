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

//! Turns raw OParl JSON documents into typed [`ProcessedEntity`] values.
//!
//! The processor is a set of pure functions: it never touches the network or
//! the database. Embedded children (agenda items inside meetings, files
//! inside papers, memberships inside persons, legislative terms inside
//! bodies) are recursively processed and attached to the parent's `nested`
//! list; the store fans them out into first-class rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::types::*;

/// Normalize an ISO-8601 string into a UTC instant.
///
/// Upstream systems disagree on offsets and fractional seconds; anything
/// unparseable yields `None` instead of an error, since a malformed
/// timestamp alone must never sink an item.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
	if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
		return Some(dt.with_timezone(&Utc));
	}
	// naive timestamps without an offset are taken as UTC
	for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
		if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
			return Some(Utc.from_utc_datetime(&naive));
		}
	}
	None
}

/// Parse a date-only field (e.g. `Paper.date`, `Organization.startDate`).
/// Falls back to the datetime parser for servers that send full timestamps.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
	if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
		return Some(d);
	}
	parse_datetime(s).map(|dt| dt.date_naive())
}

/// Process one raw OParl document. The kind is determined by the `type`
/// field; unknown types and documents without an `id` yield `None`.
pub fn process(raw: &Value, body_external_id: &str) -> Option<ProcessedEntity> {
	let kind = match raw.get("type").and_then(Value::as_str).and_then(EntityKind::from_type_url) {
		Some(kind) => kind,
		None => {
			log::debug!(
				"skipping document with unknown type {:?} (body {})",
				raw.get("type").and_then(Value::as_str).unwrap_or("<missing>"),
				body_external_id
			);
			return None;
		}
	};
	let external_id = match string(raw, "id") {
		Some(id) => id,
		None => {
			log::warn!("skipping {} without id (body {})", kind, body_external_id);
			return None;
		}
	};

	Some(match kind {
		EntityKind::Body => ProcessedEntity::Body(body(raw, external_id)),
		EntityKind::Organization => ProcessedEntity::Organization(organization(raw, external_id)),
		EntityKind::Person => ProcessedEntity::Person(person(raw, external_id)),
		EntityKind::Membership => ProcessedEntity::Membership(membership(raw, external_id)),
		EntityKind::Meeting => ProcessedEntity::Meeting(meeting(raw, external_id, body_external_id)),
		EntityKind::Paper => ProcessedEntity::Paper(paper(raw, external_id, body_external_id)),
		EntityKind::AgendaItem => ProcessedEntity::AgendaItem(agenda_item(raw, external_id)),
		EntityKind::File => ProcessedEntity::File(file(raw, external_id)),
		EntityKind::Location => ProcessedEntity::Location(location(raw, external_id)),
		EntityKind::Consultation => ProcessedEntity::Consultation(consultation(raw, external_id)),
		EntityKind::LegislativeTerm => ProcessedEntity::LegislativeTerm(legislative_term(raw, external_id)),
	})
}

/// Process a `Body` document, including its ten list URLs and any embedded
/// legislative terms.
pub fn process_body(raw: &Value) -> Option<ProcessedBody> {
	let external_id = string(raw, "id")?;
	Some(body(raw, external_id))
}

fn body(raw: &Value, external_id: String) -> ProcessedBody {
	let mut nested = Vec::new();
	for term in objects(raw, "legislativeTerm") {
		if let Some(entity) = process(term, &external_id) {
			nested.push(entity);
		}
	}

	ProcessedBody {
		name: string(raw, "name"),
		short_name: string(raw, "shortName"),
		website: string(raw, "website"),
		license: string(raw, "license"),
		classification: string(raw, "classification"),
		organization_list_url: string(raw, "organization"),
		person_list_url: string(raw, "person"),
		meeting_list_url: string(raw, "meeting"),
		paper_list_url: string(raw, "paper"),
		membership_list_url: string(raw, "membership"),
		agenda_item_list_url: string(raw, "agendaItem"),
		file_list_url: string(raw, "file"),
		location_list_url: string(raw, "locationList"),
		consultation_list_url: string(raw, "consultation"),
		legislative_term_list_url: string(raw, "legislativeTermList"),
		oparl_created: datetime(raw, "created"),
		oparl_modified: datetime(raw, "modified"),
		raw_json: raw.clone(),
		nested,
		external_id,
	}
}

fn organization(raw: &Value, external_id: String) -> ProcessedOrganization {
	ProcessedOrganization {
		name: string(raw, "name"),
		short_name: string(raw, "shortName"),
		organization_type: string(raw, "organizationType"),
		classification: string(raw, "classification"),
		website: string(raw, "website"),
		start_date: date(raw, "startDate"),
		end_date: date(raw, "endDate"),
		oparl_created: datetime(raw, "created"),
		oparl_modified: datetime(raw, "modified"),
		raw_json: raw.clone(),
		external_id,
	}
}

fn person(raw: &Value, external_id: String) -> ProcessedPerson {
	let mut nested = Vec::new();
	for item in objects(raw, "membership") {
		if let Some(ProcessedEntity::Membership(mut m)) = process(item, &external_id) {
			// OParl 1.0 embeds memberships without a back-reference; the
			// surrounding person is the implied subject.
			if m.person_external_id.is_none() {
				m.person_external_id = Some(external_id.clone());
			}
			nested.push(ProcessedEntity::Membership(m));
		}
	}

	ProcessedPerson {
		name: string(raw, "name"),
		family_name: string(raw, "familyName"),
		given_name: string(raw, "givenName"),
		// `title` is a list of honorifics in OParl 1.1, a plain string on
		// some older servers
		title: string_or_joined(raw, "title"),
		gender: string(raw, "gender"),
		email: first_string(raw, "email"),
		phone: first_string(raw, "phone"),
		oparl_created: datetime(raw, "created"),
		oparl_modified: datetime(raw, "modified"),
		raw_json: raw.clone(),
		nested,
		external_id,
	}
}

fn membership(raw: &Value, external_id: String) -> ProcessedMembership {
	ProcessedMembership {
		person_external_id: reference(raw, "person"),
		organization_external_id: reference(raw, "organization"),
		role: string(raw, "role"),
		voting_right: raw.get("votingRight").and_then(Value::as_bool),
		start_date: date(raw, "startDate"),
		end_date: date(raw, "endDate"),
		oparl_created: datetime(raw, "created"),
		oparl_modified: datetime(raw, "modified"),
		raw_json: raw.clone(),
		external_id,
	}
}

fn meeting(raw: &Value, external_id: String, body_external_id: &str) -> ProcessedMeeting {
	let mut nested = Vec::new();
	for item in objects(raw, "agendaItem") {
		if let Some(ProcessedEntity::AgendaItem(mut a)) = process(item, body_external_id) {
			if a.meeting_external_id.is_none() {
				a.meeting_external_id = Some(external_id.clone());
			}
			nested.push(ProcessedEntity::AgendaItem(a));
		}
	}
	for key in ["invitation", "resultsProtocol", "verbatimProtocol"] {
		if let Some(doc) = raw.get(key).filter(|v| v.is_object()) {
			nested.extend(process(doc, body_external_id));
		}
	}
	for item in objects(raw, "auxiliaryFile") {
		nested.extend(process(item, body_external_id));
	}

	let mut location_name = None;
	let mut location_address = None;
	if let Some(loc) = raw.get("location").filter(|v| v.is_object()) {
		location_name = string(loc, "description").or_else(|| string(loc, "name"));
		location_address = string(loc, "streetAddress");
		nested.extend(process(loc, body_external_id));
	}

	ProcessedMeeting {
		name: string(raw, "name"),
		meeting_state: string(raw, "meetingState"),
		cancelled: raw.get("cancelled").and_then(Value::as_bool).unwrap_or(false),
		start: datetime(raw, "start"),
		end: datetime(raw, "end"),
		location_name,
		location_address,
		oparl_created: datetime(raw, "created"),
		oparl_modified: datetime(raw, "modified"),
		raw_json: raw.clone(),
		nested,
		external_id,
	}
}

fn paper(raw: &Value, external_id: String, body_external_id: &str) -> ProcessedPaper {
	let mut nested = Vec::new();
	if let Some(doc) = raw.get("mainFile").filter(|v| v.is_object()) {
		nested.extend(process(doc, body_external_id));
	}
	for item in objects(raw, "auxiliaryFile") {
		nested.extend(process(item, body_external_id));
	}
	for item in objects(raw, "consultation") {
		if let Some(ProcessedEntity::Consultation(mut c)) = process(item, body_external_id) {
			if c.paper_external_id.is_none() {
				c.paper_external_id = Some(external_id.clone());
			}
			nested.push(ProcessedEntity::Consultation(c));
		}
	}

	ProcessedPaper {
		name: string(raw, "name"),
		reference: string(raw, "reference"),
		paper_type: string(raw, "paperType"),
		date: date(raw, "date"),
		oparl_created: datetime(raw, "created"),
		oparl_modified: datetime(raw, "modified"),
		raw_json: raw.clone(),
		nested,
		external_id,
	}
}

fn agenda_item(raw: &Value, external_id: String) -> ProcessedAgendaItem {
	ProcessedAgendaItem {
		meeting_external_id: reference(raw, "meeting"),
		number: string(raw, "number"),
		order: raw.get("order").and_then(Value::as_i64).and_then(|n| i32::try_from(n).ok()),
		name: string(raw, "name"),
		public: raw.get("public").and_then(Value::as_bool),
		result: string(raw, "result"),
		resolution_text: string(raw, "resolutionText"),
		oparl_created: datetime(raw, "created"),
		oparl_modified: datetime(raw, "modified"),
		raw_json: raw.clone(),
		external_id,
	}
}

fn file(raw: &Value, external_id: String) -> ProcessedFile {
	ProcessedFile {
		name: string(raw, "name"),
		file_name: string(raw, "fileName"),
		mime_type: string(raw, "mimeType"),
		size: raw.get("size").and_then(Value::as_i64),
		access_url: string(raw, "accessUrl"),
		download_url: string(raw, "downloadUrl"),
		date: date(raw, "date"),
		paper_external_ids: references(raw, "paper"),
		meeting_external_ids: references(raw, "meeting"),
		oparl_created: datetime(raw, "created"),
		oparl_modified: datetime(raw, "modified"),
		raw_json: raw.clone(),
		external_id,
	}
}

fn location(raw: &Value, external_id: String) -> ProcessedLocation {
	ProcessedLocation {
		description: string(raw, "description"),
		street_address: string(raw, "streetAddress"),
		room: string(raw, "room"),
		postal_code: string(raw, "postalCode"),
		locality: string(raw, "locality"),
		geojson: raw.get("geojson").filter(|v| v.is_object()).cloned(),
		oparl_created: datetime(raw, "created"),
		oparl_modified: datetime(raw, "modified"),
		raw_json: raw.clone(),
		external_id,
	}
}

fn consultation(raw: &Value, external_id: String) -> ProcessedConsultation {
	ProcessedConsultation {
		paper_external_id: reference(raw, "paper"),
		meeting_external_id: reference(raw, "meeting"),
		agenda_item_external_id: reference(raw, "agendaItem"),
		role: string(raw, "role"),
		authoritative: raw.get("authoritative").and_then(Value::as_bool),
		oparl_created: datetime(raw, "created"),
		oparl_modified: datetime(raw, "modified"),
		raw_json: raw.clone(),
		external_id,
	}
}

fn legislative_term(raw: &Value, external_id: String) -> ProcessedLegislativeTerm {
	ProcessedLegislativeTerm {
		name: string(raw, "name"),
		start_date: date(raw, "startDate"),
		end_date: date(raw, "endDate"),
		oparl_created: datetime(raw, "created"),
		oparl_modified: datetime(raw, "modified"),
		raw_json: raw.clone(),
		external_id,
	}
}

// field accessors

fn string(raw: &Value, key: &str) -> Option<String> {
	raw.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// A field that is either a plain string or a list of strings; lists are
/// joined with spaces (person titles).
fn string_or_joined(raw: &Value, key: &str) -> Option<String> {
	match raw.get(key) {
		Some(Value::String(s)) => Some(s.clone()),
		Some(Value::Array(items)) => {
			let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
			if parts.is_empty() {
				None
			} else {
				Some(parts.join(" "))
			}
		}
		_ => None,
	}
}

/// A field that is either a plain string or a list of strings; lists yield
/// their first element (emails, phone numbers).
fn first_string(raw: &Value, key: &str) -> Option<String> {
	match raw.get(key) {
		Some(Value::String(s)) => Some(s.clone()),
		Some(Value::Array(items)) => items.iter().find_map(Value::as_str).map(str::to_owned),
		_ => None,
	}
}

/// An entity reference: a URL string, or an embedded object whose `id` is
/// taken as the reference. Anything else is `None`.
fn reference(raw: &Value, key: &str) -> Option<String> {
	match raw.get(key) {
		Some(Value::String(s)) => Some(s.clone()),
		Some(Value::Object(map)) => map.get("id").and_then(Value::as_str).map(str::to_owned),
		_ => None,
	}
}

/// A reference field that may be a single URL or a list of URLs.
fn references(raw: &Value, key: &str) -> Vec<String> {
	match raw.get(key) {
		Some(Value::String(s)) => vec![s.clone()],
		Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_owned).collect(),
		_ => Vec::new(),
	}
}

/// Embedded child objects under `key`; URL strings in the same position are
/// plain references and are skipped here.
fn objects<'a>(raw: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
	raw.get(key).and_then(Value::as_array).into_iter().flatten().filter(|v| v.is_object())
}

fn datetime(raw: &Value, key: &str) -> Option<DateTime<Utc>> {
	raw.get(key).and_then(Value::as_str).and_then(parse_datetime)
}

fn date(raw: &Value, key: &str) -> Option<NaiveDate> {
	raw.get(key).and_then(Value::as_str).and_then(parse_date)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	const BODY: &str = "https://oparl.example.org/body/1";

	#[test]
	fn parses_timestamps_with_and_without_offsets() {
		assert_eq!(
			parse_datetime("2024-01-02T03:04:05+01:00").map(|dt| dt.to_rfc3339()),
			Some("2024-01-02T02:04:05+00:00".into())
		);
		assert!(parse_datetime("2024-01-02T03:04:05Z").is_some());
		assert!(parse_datetime("2024-01-02T03:04:05").is_some());
		assert!(parse_datetime("2024-01-02T03:04:05.123").is_some());
		assert_eq!(parse_datetime("yesterday"), None);
		assert_eq!(parse_datetime(""), None);
	}

	#[test]
	fn parses_dates_and_full_timestamps_as_dates() {
		assert_eq!(parse_date("2024-03-01"), NaiveDate::from_ymd_opt(2024, 3, 1));
		assert_eq!(parse_date("2024-03-01T10:00:00Z"), NaiveDate::from_ymd_opt(2024, 3, 1));
		assert_eq!(parse_date("not a date"), None);
	}

	#[test]
	fn unknown_type_yields_none() {
		let raw = json!({"id": "https://x/1", "type": "https://schema.oparl.org/1.1/Widget"});
		assert!(process(&raw, BODY).is_none());
	}

	#[test]
	fn missing_id_yields_none() {
		let raw = json!({"type": "https://schema.oparl.org/1.1/Meeting", "name": "anon"});
		assert!(process(&raw, BODY).is_none());
	}

	#[test]
	fn raw_json_is_retained_verbatim() {
		let raw = json!({
			"id": "https://x/meeting/1",
			"type": "https://schema.oparl.org/1.1/Meeting",
			"name": "Ratssitzung",
			"someVendorExtension": {"a": [1, 2, 3]},
		});
		let entity = process(&raw, BODY).unwrap();
		assert_eq!(entity.raw_json(), &raw);
	}

	#[test]
	fn meeting_surfaces_embedded_children() {
		let raw = json!({
			"id": "https://x/meeting/1",
			"type": "https://schema.oparl.org/1.1/Meeting",
			"name": "Ratssitzung",
			"start": "2024-05-01T18:00:00Z",
			"cancelled": false,
			"agendaItem": [
				{"id": "https://x/agendaitem/1", "type": "https://schema.oparl.org/1.1/AgendaItem", "number": "1"},
				"https://x/agendaitem/2"
			],
			"invitation": {"id": "https://x/file/7", "type": "https://schema.oparl.org/1.1/File"},
			"auxiliaryFile": [
				{"id": "https://x/file/8", "type": "https://schema.oparl.org/1.1/File"}
			],
			"location": {
				"id": "https://x/location/3",
				"type": "https://schema.oparl.org/1.1/Location",
				"description": "Rathaus, Saal A",
				"streetAddress": "Markt 1"
			}
		});
		let ProcessedEntity::Meeting(meeting) = process(&raw, BODY).unwrap() else { panic!("expected meeting") };
		assert_eq!(meeting.location_name.as_deref(), Some("Rathaus, Saal A"));
		assert_eq!(meeting.location_address.as_deref(), Some("Markt 1"));

		let kinds: Vec<_> = meeting.nested.iter().map(|n| n.kind()).collect();
		assert_eq!(kinds, vec![EntityKind::AgendaItem, EntityKind::File, EntityKind::File, EntityKind::Location]);
		// the URL-only agenda item reference is not an embedded child
		let ProcessedEntity::AgendaItem(item) = &meeting.nested[0] else { panic!() };
		assert_eq!(item.meeting_external_id.as_deref(), Some("https://x/meeting/1"));
	}

	#[test]
	fn paper_surfaces_files_and_consultations() {
		let raw = json!({
			"id": "https://x/paper/1",
			"type": "https://schema.oparl.org/1.1/Paper",
			"reference": "V/2024/123",
			"date": "2024-04-30",
			"mainFile": {"id": "https://x/file/1", "type": "https://schema.oparl.org/1.1/File", "size": 4096},
			"consultation": [
				{"id": "https://x/consultation/1", "type": "https://schema.oparl.org/1.1/Consultation", "role": "Beratung"}
			]
		});
		let ProcessedEntity::Paper(paper) = process(&raw, BODY).unwrap() else { panic!("expected paper") };
		assert_eq!(paper.date, NaiveDate::from_ymd_opt(2024, 4, 30));
		assert_eq!(paper.nested.len(), 2);
		let ProcessedEntity::Consultation(cons) = &paper.nested[1] else { panic!() };
		assert_eq!(cons.paper_external_id.as_deref(), Some("https://x/paper/1"));
	}

	#[test]
	fn person_inherits_into_embedded_memberships() {
		let raw = json!({
			"id": "https://x/person/9",
			"type": "https://schema.oparl.org/1.1/Person",
			"familyName": "Musterfrau",
			"title": ["Dr.", "rer. nat."],
			"email": ["a@example.org", "b@example.org"],
			"membership": [{
				"id": "https://x/membership/1",
				"type": "https://schema.oparl.org/1.1/Membership",
				"organization": "https://x/organization/2",
				"votingRight": true
			}]
		});
		let ProcessedEntity::Person(person) = process(&raw, BODY).unwrap() else { panic!("expected person") };
		assert_eq!(person.title.as_deref(), Some("Dr. rer. nat."));
		assert_eq!(person.email.as_deref(), Some("a@example.org"));
		let ProcessedEntity::Membership(m) = &person.nested[0] else { panic!() };
		assert_eq!(m.person_external_id.as_deref(), Some("https://x/person/9"));
		assert_eq!(m.organization_external_id.as_deref(), Some("https://x/organization/2"));
		assert_eq!(m.voting_right, Some(true));
	}

	#[test]
	fn body_extracts_list_urls_and_terms() {
		let raw = json!({
			"id": BODY,
			"type": "https://schema.oparl.org/1.1/Body",
			"name": "Stadt Beispiel",
			"shortName": "Beispiel",
			"organization": "https://x/body/1/organizations",
			"person": "https://x/body/1/persons",
			"meeting": "https://x/body/1/meetings",
			"paper": "https://x/body/1/papers",
			"membership": "https://x/body/1/memberships",
			"agendaItem": "https://x/body/1/agendaitems",
			"file": "https://x/body/1/files",
			"locationList": "https://x/body/1/locations",
			"consultation": "https://x/body/1/consultations",
			"legislativeTermList": "https://x/body/1/terms",
			"legislativeTerm": [
				{"id": "https://x/term/1", "type": "https://schema.oparl.org/1.1/LegislativeTerm", "name": "2020-2025"}
			]
		});
		let body = process_body(&raw).unwrap();
		assert_eq!(body.meeting_list_url.as_deref(), Some("https://x/body/1/meetings"));
		assert_eq!(body.location_list_url.as_deref(), Some("https://x/body/1/locations"));
		assert_eq!(body.legislative_term_list_url.as_deref(), Some("https://x/body/1/terms"));
		assert_eq!(body.nested.len(), 1);
		assert_eq!(body.nested[0].kind(), EntityKind::LegislativeTerm);
	}

	#[test]
	fn standalone_file_collects_back_references() {
		let raw = json!({
			"id": "https://x/file/1",
			"type": "https://schema.oparl.org/1.1/File",
			"fileName": "beschluss.pdf",
			"mimeType": "application/pdf",
			"paper": ["https://x/paper/1", "https://x/paper/2"],
			"meeting": "https://x/meeting/1"
		});
		let ProcessedEntity::File(file) = process(&raw, BODY).unwrap() else { panic!("expected file") };
		assert_eq!(file.paper_external_ids, vec!["https://x/paper/1", "https://x/paper/2"]);
		assert_eq!(file.meeting_external_ids, vec!["https://x/meeting/1"]);
	}
}
