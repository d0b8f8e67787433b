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

//! IO for the PostgreSQL database holding the OParl mirror.
//!
//! The schema is owned by the external migration tool; this module only
//! reads and writes it. On startup [`Database::ensure_schema`] probes a
//! sentinel table and refuses to run against an unmigrated database.

pub mod models;
pub mod queries;
mod store;

use std::{fmt, time::Duration};

use serde::Deserialize;
use sqlx::{
	pool::PoolConnection,
	postgres::{PgPool, PgPoolOptions, Postgres},
};

pub use self::store::Store;
use crate::error::{ArchiveError, Result};

pub type DbConn = PoolConnection<Postgres>;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DatabaseConfig {
	/// PostgreSQL url.
	pub url: String,
}

impl fmt::Display for DatabaseConfig {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.url)
	}
}

#[derive(Clone)]
pub struct Database {
	/// pool of database connections
	pool: PgPool,
}

impl Database {
	/// Connect to the database.
	pub async fn new(url: &str) -> Result<Self> {
		let pool = PgPoolOptions::new()
			.min_connections(4)
			.max_connections(28)
			.idle_timeout(Duration::from_secs(60))
			.connect(url)
			.await?;
		Ok(Self { pool })
	}

	/// Start the database with a pre-defined pool.
	pub fn with_pool(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn conn(&self) -> Result<DbConn> {
		self.pool.acquire().await.map_err(Into::into)
	}

	pub fn pool(&self) -> &PgPool {
		&self.pool
	}

	/// Verify the migration tool has created the schema. Probes a sentinel
	/// table; a missing sentinel is fatal before any job starts.
	pub async fn ensure_schema(&self) -> Result<()> {
		let mut conn = self.conn().await?;
		if queries::schema_exists(&mut conn).await? {
			Ok(())
		} else {
			Err(ArchiveError::SchemaMissing)
		}
	}
}
