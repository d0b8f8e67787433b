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

//! Row models for the handful of tables the engine reads back. Writes go
//! through [`super::Store`] and do not need models.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered OParl source.
#[derive(Debug, Clone, FromRow)]
pub struct SourceModel {
	pub id: Uuid,
	pub url: String,
	pub name: String,
	pub is_active: bool,
	pub last_sync: Option<DateTime<Utc>>,
	pub last_full_sync: Option<DateTime<Utc>>,
}

/// The slice of a body row the sync engine needs: identity plus the
/// incremental high-water mark.
#[derive(Debug, Clone, FromRow)]
pub struct BodyModel {
	pub id: Uuid,
	pub external_id: String,
	pub name: Option<String>,
	pub last_sync: Option<DateTime<Utc>>,
}
