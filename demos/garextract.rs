// SPDX-License-Identifier: GPL-3.0-or-later

/*
 *  garextract.rs - Member extraction demo for PAT tester archive containers.
 *  Copyright (C) 2026  Forest Crossman <cyrozap@gmail.com>
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use patdecode::Error;
use patdecode::decoder::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Only list the members of each container.
    #[arg(short, long)]
    list: bool,

    /// Directory to extract into. Defaults to "<file stem>.d" beside each
    /// input file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// The files to read.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// Turns a raw member name into a relative path that stays inside the output
/// directory.
fn safe_relative_name(raw: &[u8], index: usize) -> PathBuf {
    let name = String::from_utf8_lossy(raw);
    let parts: Vec<String> = name
        .split(['/', '\\'])
        .filter(|p| !p.is_empty() && *p != "." && *p != "..")
        .map(|p| {
            p.chars()
                .map(|c| if c.is_whitespace() || c == ':' { '_' } else { c })
                .collect()
        })
        .collect();

    if parts.is_empty() {
        return PathBuf::from(format!("member{}", index));
    }
    parts.iter().collect()
}

fn list(file: &Path) -> Result<(), Error> {
    let reader = BufReader::new(File::open(file)?);
    let mut container = decode_container(reader)?;
    while let Some(raw) = container.next_raw() {
        let raw = raw?;
        println!(
            "{:?} ({} characters): {} bytes",
            String::from_utf8_lossy(&raw.name),
            raw.name.len(),
            raw.payload.len()
        );
    }
    Ok(())
}

fn extract(file: &Path, output_dir: &Path) -> Result<(), Error> {
    let reader = BufReader::new(File::open(file)?);
    for (index, member) in decode_container(reader)?.enumerate() {
        let member = member?;
        let path = output_dir.join(safe_relative_name(&member.name, index));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &member.content)?;
        println!("{} ({} bytes)", path.display(), member.content.len());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut status = ExitCode::SUCCESS;

    for file in &args.files {
        println!("Container {:?}", file);

        let result = if args.list {
            list(file)
        } else {
            let output_dir = match &args.output {
                Some(dir) => dir.clone(),
                None => {
                    let stem = file.file_stem().unwrap_or_default().to_string_lossy();
                    file.parent()
                        .unwrap_or_else(|| Path::new("."))
                        .join(format!("{}.d", stem))
                }
            };
            extract(file, &output_dir)
        };

        if let Err(error) = result {
            match error.offset() {
                Some(offset) => eprintln!("Error in {:?} at byte {}: {}", file, offset, error),
                None => eprintln!("Error in {:?}: {}", file, error),
            }
            status = ExitCode::from(error.exit_code() as u8);
        }
    }

    status
}
