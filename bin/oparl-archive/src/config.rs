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

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli_opts::CliOpts;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
	database_url: Option<String>,
	oparl_max_concurrent: Option<usize>,
	request_timeout_secs: Option<u64>,
	// The remaining keys belong to collaborators (text extraction, search
	// indexing). They are accepted and carried so one file can configure the
	// whole deployment; the sync engine itself never reads them.
	text_extraction_enabled: Option<bool>,
	text_extraction_async: Option<bool>,
	meilisearch_auto_index: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
	pub database_url: Option<String>,
	pub max_concurrent: Option<usize>,
	pub request_timeout: Option<u64>,
	pub collaborators: CollaboratorConfig,
}

/// Pass-through settings for the non-sync actors of a deployment.
#[derive(Debug, Clone, Default)]
pub struct CollaboratorConfig {
	pub text_extraction_enabled: bool,
	pub text_extraction_async: bool,
	pub meilisearch_auto_index: bool,
}

impl Config {
	pub fn new(cli: &CliOpts) -> Result<Self> {
		let toml_conf = cli.config.as_deref().map(Self::parse_file).transpose()?.unwrap_or_default();
		log::debug!("{toml_conf:?}");

		Ok(Self {
			database_url: toml_conf.database_url,
			max_concurrent: toml_conf.oparl_max_concurrent,
			request_timeout: toml_conf.request_timeout_secs,
			collaborators: CollaboratorConfig {
				text_extraction_enabled: toml_conf.text_extraction_enabled.unwrap_or(false),
				text_extraction_async: toml_conf.text_extraction_async.unwrap_or(false),
				meilisearch_auto_index: toml_conf.meilisearch_auto_index.unwrap_or(false),
			},
		})
	}

	fn parse_file(path: &Path) -> Result<TomlConfig> {
		let toml_str =
			std::fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))?;
		toml::from_str(&toml_str).with_context(|| format!("could not parse {}", path.display()))
	}
}
