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

//! Per-job memoisation of `(kind, external_id) -> surrogate id` writes.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::EntityKind;

/// Shared map of external ids to surrogate ids, populated as rows are
/// upserted and consulted to resolve foreign keys of downstream kinds.
///
/// The cache is authoritative only as a positive claim: an entry means "this
/// process upserted that row". Absence means nothing; the store's existence
/// queries are the only authoritative absence check.
#[derive(Clone, Default)]
pub struct IdentityCache {
	inner: Arc<RwLock<HashMap<(EntityKind, String), Uuid>>>,
}

impl IdentityCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, kind: EntityKind, external_id: &str, id: Uuid) {
		self.inner.write().insert((kind, external_id.to_owned()), id);
	}

	pub fn get(&self, kind: EntityKind, external_id: &str) -> Option<Uuid> {
		self.inner.read().get(&(kind, external_id.to_owned())).copied()
	}

	pub fn remove(&self, kind: EntityKind, external_id: &str) {
		self.inner.write().remove(&(kind, external_id.to_owned()));
	}

	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.read().is_empty()
	}
}
