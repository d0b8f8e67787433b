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

mod cli_opts;
mod config;

use clap::Parser;
use oparl_archive::{Archive, SyncOptions, SyncResult};

use crate::cli_opts::{CliOpts, Command};

const EXIT_OK: i32 = 0;
const EXIT_SYNC_FAILED: i32 = 1;
const EXIT_CONFIG: i32 = 2;

#[tokio::main]
async fn main() {
	let opts = CliOpts::parse();
	if let Err(e) = oparl_archive::init_logger(opts.log_level(), log::LevelFilter::Debug) {
		eprintln!("could not initialize logging: {e}");
	}
	std::process::exit(run(opts).await);
}

async fn run(opts: CliOpts) -> i32 {
	let config = match config::Config::new(&opts) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("configuration error: {e:#}");
			return EXIT_CONFIG;
		}
	};

	let archive = match Archive::builder()
		.pg_url(config.database_url.as_deref())
		.max_concurrent(config.max_concurrent)
		.request_timeout(config.request_timeout)
		.build()
		.await
	{
		Ok(archive) => archive,
		Err(e) => {
			eprintln!("configuration error: {e}");
			return EXIT_CONFIG;
		}
	};

	// first ctrl-c drains in-flight work and returns partial results
	let cancel = archive.cancel_token();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			eprintln!("\nshutting down, committing in-flight work ...");
			cancel.cancel();
		}
	});

	match opts.command {
		Command::AddSource { url, name } => match archive.add_source(&url, name.as_deref()).await {
			Ok((id, name)) => {
				println!("Registered source: {name} (ID: {id})");
				EXIT_OK
			}
			Err(e) => {
				eprintln!("could not register source: {e}");
				EXIT_SYNC_FAILED
			}
		},
		Command::Sync { url, full, body_filter } => {
			let result = match archive.sync_source(&url, &SyncOptions { full, body_filter }).await {
				Ok(result) => result,
				Err(e) => {
					eprintln!("sync failed: {e}");
					return EXIT_SYNC_FAILED;
				}
			};
			print_result(&result);
			if result.success {
				EXIT_OK
			} else {
				EXIT_SYNC_FAILED
			}
		}
		Command::SyncAll { full, sequential } => {
			let results = match archive.sync_all(&SyncOptions { full, body_filter: None }, sequential).await {
				Ok(results) => results,
				Err(e) => {
					eprintln!("sync failed: {e}");
					return EXIT_SYNC_FAILED;
				}
			};
			for result in &results {
				print_result(result);
			}
			if results.iter().all(|r| r.success) {
				EXIT_OK
			} else {
				EXIT_SYNC_FAILED
			}
		}
		Command::Status => match archive.status().await {
			Ok(stats) => {
				println!("{:<20} {:>10}", "kind", "rows");
				for (kind, count) in stats {
					println!("{kind:<20} {count:>10}");
				}
				EXIT_OK
			}
			Err(e) => {
				eprintln!("could not read status: {e}");
				EXIT_SYNC_FAILED
			}
		},
	}
}

fn print_result(result: &SyncResult) {
	println!("\n{}", "=".repeat(60));
	println!("Sync result: {}", result.source_name);
	println!("{}", "=".repeat(60));
	println!("Status:   {}", if result.success { "SUCCESS" } else { "FAILED" });
	println!("Duration: {:.1}s", result.duration.as_secs_f64());

	println!("\nEntities synced:");
	println!("  Bodies:        {}", result.bodies_synced);
	println!("  Organizations: {}", result.organizations_synced);
	println!("  Persons:       {}", result.persons_synced);
	println!("  Memberships:   {}", result.memberships_synced);
	println!("  Meetings:      {}", result.meetings_synced);
	println!("  Papers:        {}", result.papers_synced);
	println!("  Locations:     {}", result.locations_synced);
	println!("  AgendaItems:   {}", result.agenda_items_synced);
	println!("  Files:         {}", result.files_synced);
	println!("  Consultations: {}", result.consultations_synced);
	if result.tombstones_deleted > 0 {
		println!("  Tombstones:    {}", result.tombstones_deleted);
	}
	if result.items_skipped > 0 {
		println!("  Skipped:       {}", result.items_skipped);
	}

	if let Some(stats) = &result.http_stats {
		println!("\nHTTP statistics:");
		println!("  Requests:   {}", stats.http_requests);
		println!("  Cache hits: {}", stats.cache_hits);
		println!("  Retries:    {}", stats.retries);
		println!("  HTTP time:  {:.1}s", stats.http_time.as_secs_f64());
		if stats.http_requests > 0 {
			let avg = stats.http_time.as_secs_f64() / stats.http_requests as f64;
			println!("  Avg/request: {:.0}ms", avg * 1000.0);
		}
	}

	if !result.errors.is_empty() {
		println!("\nErrors ({}):", result.errors.len());
		for error in result.errors.iter().take(10) {
			println!("  - {error}");
		}
		if result.errors.len() > 10 {
			println!("  ... and {} more", result.errors.len() - 10);
		}
	}
}
