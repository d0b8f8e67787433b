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

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "oparl-archive", version, about = "Mirror OParl council-information endpoints into PostgreSQL")]
pub struct CliOpts {
	/// Path to a TOML configuration file.
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Increase log verbosity (-vvv for debug, -vvvv for trace).
	#[arg(short, long, global = true, action = ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Fetch an OParl system endpoint and register it as a source.
	AddSource {
		/// The OParl endpoint URL.
		url: String,
		/// Override the source name taken from the system document.
		#[arg(long)]
		name: Option<String>,
	},
	/// Run one source job against a URL.
	///
	/// Servers that never emit tombstones cannot signal deletions to an
	/// incremental sync; run with --full periodically to reconcile.
	Sync {
		/// The OParl endpoint URL (System, Body or Body-list).
		url: String,
		/// Ignore the stored high-water mark and scan every page.
		#[arg(long)]
		full: bool,
		/// Only sync bodies whose name or id contains this string.
		#[arg(long)]
		body_filter: Option<String>,
	},
	/// Sync every registered source.
	SyncAll {
		#[arg(long)]
		full: bool,
		/// Sync sources one after another instead of in parallel.
		#[arg(long)]
		sequential: bool,
	},
	/// Print per-kind row counts of the mirror.
	Status,
}

impl CliOpts {
	pub fn log_level(&self) -> log::LevelFilter {
		match self.verbose {
			0..=2 => log::LevelFilter::Info,
			3 => log::LevelFilter::Debug,
			_ => log::LevelFilter::Trace,
		}
	}
}
