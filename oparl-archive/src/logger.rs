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

//! logging

use std::{fs, io, path::PathBuf};

use fern::colors::{Color, ColoredLevelConfig};

/// Directory for engine-local state (log files).
pub fn default_dir() -> io::Result<PathBuf> {
	let base = dirs::BaseDirs::new()
		.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "invalid home directory path"))?;
	let mut path = base.data_local_dir().to_path_buf();
	path.push("oparl_archive");
	Ok(path)
}

pub fn init(std: log::LevelFilter, file: log::LevelFilter) -> io::Result<()> {
	let colors = ColoredLevelConfig::new()
		.info(Color::Green)
		.warn(Color::Yellow)
		.error(Color::Red)
		.debug(Color::Blue)
		.trace(Color::Magenta);

	let mut log_dir = default_dir()?;
	fs::create_dir_all(log_dir.as_path())?;
	log_dir.push("archive.logs");

	let stdout_dispatcher = fern::Dispatch::new()
		.level_for("oparl_archive", std)
		.level_for("sqlx", log::LevelFilter::Error)
		.level_for("hyper", log::LevelFilter::Warn)
		.level_for("reqwest", log::LevelFilter::Warn)
		.format(move |out, message, record| {
			out.finish(format_args!(
				"{} {} {}",
				chrono::Local::now().format("[%H:%M]"),
				colors.color(record.level()),
				message,
			))
		})
		.chain(fern::Dispatch::new().level(std).chain(std::io::stdout()));

	let file_dispatcher = fern::Dispatch::new()
		.level(file)
		.level_for("oparl_archive", file)
		.level_for("sqlx", log::LevelFilter::Warn)
		.level_for("hyper", log::LevelFilter::Warn)
		.level_for("reqwest", log::LevelFilter::Warn)
		.format(move |out, message, record| {
			out.finish(format_args!(
				"{} [{}][{}] {}",
				chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
				record.target(),
				record.level(),
				message,
			))
		})
		.chain(fern::log_file(log_dir)?);

	fern::Dispatch::new()
		.chain(stdout_dispatcher)
		.chain(file_dispatcher)
		.apply()
		.expect("could not init logging");
	Ok(())
}
