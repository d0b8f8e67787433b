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

//! Metrics collaborator. The engine only reports; the actual exporter lives
//! outside the sync core.

use parking_lot::Mutex;

use crate::types::EntityKind;

pub trait Metrics: Send + Sync {
	/// One entity of `kind` was mirrored for `source_name`.
	fn record_entity_synced(&self, kind: EntityKind, source_name: &str);

	/// A whole source job finished with `n` synced entities.
	fn record_entities_batch(&self, source_name: &str, n: u64);
}

/// Drops all measurements.
pub struct NullMetrics;

impl Metrics for NullMetrics {
	fn record_entity_synced(&self, _: EntityKind, _: &str) {}
	fn record_entities_batch(&self, _: &str, _: u64) {}
}

/// In-memory recorder, used by tests to assert on reported counts.
#[derive(Default)]
pub struct CountingMetrics {
	entities: Mutex<Vec<(EntityKind, String)>>,
	batches: Mutex<Vec<(String, u64)>>,
}

impl CountingMetrics {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn entity_count(&self, kind: EntityKind) -> usize {
		self.entities.lock().iter().filter(|(k, _)| *k == kind).count()
	}

	pub fn batches(&self) -> Vec<(String, u64)> {
		self.batches.lock().clone()
	}
}

impl Metrics for CountingMetrics {
	fn record_entity_synced(&self, kind: EntityKind, source_name: &str) {
		self.entities.lock().push((kind, source_name.to_owned()));
	}

	fn record_entities_batch(&self, source_name: &str, n: u64) {
		self.batches.lock().push((source_name.to_owned(), n));
	}
}
