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

//! Common SQL queries on the mirror database abstracted into rust functions.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use super::models::{BodyModel, SourceModel};
use crate::{error::Result, types::EntityKind};

/// Return type of queries that `SELECT external_id, oparl_modified`
#[derive(FromRow)]
struct ExternalModified {
	external_id: String,
	oparl_modified: Option<DateTime<Utc>>,
}

/// Return type of queries that `SELECT id`
#[derive(FromRow)]
struct SurrogateId {
	id: Uuid,
}

/// Check for the sentinel table created by the migration tool.
pub(crate) async fn schema_exists(conn: &mut PgConnection) -> Result<bool> {
	let exists: Option<bool> = sqlx::query_scalar(
		"SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = 'oparl_bodies')",
	)
	.fetch_one(&mut *conn)
	.await?;
	Ok(exists.unwrap_or(false))
}

pub(crate) async fn get_source_by_url(conn: &mut PgConnection, url: &str) -> Result<Option<SourceModel>> {
	sqlx::query_as::<_, SourceModel>(
		"SELECT id, url, name, is_active, last_sync, last_full_sync FROM oparl_sources WHERE url = $1",
	)
	.bind(url)
	.fetch_optional(&mut *conn)
	.await
	.map_err(Into::into)
}

pub(crate) async fn get_all_sources(conn: &mut PgConnection, active_only: bool) -> Result<Vec<SourceModel>> {
	let mut sql =
		String::from("SELECT id, url, name, is_active, last_sync, last_full_sync FROM oparl_sources");
	if active_only {
		sql.push_str(" WHERE is_active");
	}
	sql.push_str(" ORDER BY name");
	sqlx::query_as::<_, SourceModel>(&sql).fetch_all(&mut *conn).await.map_err(Into::into)
}

pub(crate) async fn get_body_by_external_id(
	conn: &mut PgConnection,
	external_id: &str,
) -> Result<Option<BodyModel>> {
	sqlx::query_as::<_, BodyModel>(
		"SELECT id, external_id, name, last_sync FROM oparl_bodies WHERE external_id = $1",
	)
	.bind(external_id)
	.fetch_optional(&mut *conn)
	.await
	.map_err(Into::into)
}

/// Look up the surrogate id for one external id. Used to resolve foreign
/// keys when the identity cache has no claim.
pub(crate) async fn surrogate_id(
	conn: &mut PgConnection,
	kind: EntityKind,
	external_id: &str,
) -> Result<Option<Uuid>> {
	let sql = format!("SELECT id FROM {} WHERE external_id = $1", kind.table());
	Ok(sqlx::query_as::<_, SurrogateId>(&sql)
		.bind(external_id)
		.fetch_optional(&mut *conn)
		.await?
		.map(|row| row.id))
}

/// Upstream-modified timestamps for a whole page of external ids in one
/// round-trip. Ids absent from the result set are not stored.
pub(crate) async fn modified_for_ids(
	conn: &mut PgConnection,
	kind: EntityKind,
	external_ids: &[String],
) -> Result<Vec<(String, Option<DateTime<Utc>>)>> {
	let sql = format!("SELECT external_id, oparl_modified FROM {} WHERE external_id = ANY($1)", kind.table());
	Ok(sqlx::query_as::<_, ExternalModified>(&sql)
		.bind(external_ids)
		.fetch_all(&mut *conn)
		.await?
		.into_iter()
		.map(|row| (row.external_id, row.oparl_modified))
		.collect())
}

/// Number of mirrored rows in one kind's table.
pub(crate) async fn row_count(conn: &mut PgConnection, table: &str) -> Result<i64> {
	let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}")).fetch_one(&mut *conn).await?;
	Ok(count)
}
