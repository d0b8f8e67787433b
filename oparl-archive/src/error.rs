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

use std::{env, io};

use thiserror::Error;

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

/// OParl Archive Error Enum
#[derive(Debug, Error)]
pub enum ArchiveError {
	#[error(transparent)]
	Io(#[from] io::Error),
	#[error("environment variable for `DATABASE_URL` not found")]
	Env(#[from] env::VarError),
	#[error(transparent)]
	Serialization(#[from] serde_json::Error),

	// database errors
	#[error("sqlx error: {0}")]
	Sql(#[from] sqlx::Error),
	#[error(
		"database schema not found; the migration tool owns the schema. \
		 Run the schema migrations before starting a sync"
	)]
	SchemaMissing,

	// http errors
	#[error("http error: {0}")]
	Http(#[from] reqwest::Error),
	#[error("request to {url} failed with status {code}")]
	Status { code: u16, url: String },
	#[error("gave up on {url} after {attempts} attempts")]
	RetriesExhausted { url: String, attempts: u32 },
	#[error("invalid url: {0}")]
	UrlParse(#[from] url::ParseError),

	// protocol errors
	#[error("not an OParl endpoint: {0}")]
	NotOParl(String),
	#[error("{kind} document is missing mandatory field `{field}`")]
	MissingField { kind: &'static str, field: &'static str },

	#[error("sync cancelled")]
	Cancelled,

	#[error("{0}")]
	General(String),
}

impl From<&str> for ArchiveError {
	fn from(e: &str) -> Self {
		Self::General(e.to_string())
	}
}

impl From<String> for ArchiveError {
	fn from(e: String) -> Self {
		Self::General(e)
	}
}
