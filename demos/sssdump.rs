// SPDX-License-Identifier: GPL-3.0-or-later

/*
 *  sssdump.rs - Result stream dump demo for PAT tester files.
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

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use patdecode::Error;
use patdecode::export::write_csv;
use patdecode::interpreter::SubRecordKind;
use patdecode::parser::*;
use patdecode::schema::Fields;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Write CSV to standard output instead of a readable dump. Takes a
    /// single file.
    #[arg(long)]
    csv: bool,

    /// The files to read.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// CSV output is one table, so it only takes one input file.
fn check_args(args: &Args) -> Result<(), clap::Error> {
    if args.csv && args.files.len() > 1 {
        return Err(Args::command().error(
            ErrorKind::TooManyValues,
            "--csv writes one table and takes a single file",
        ));
    }
    Ok(())
}

fn inspection_time(fields: &Fields) -> Option<String> {
    let date = NaiveDate::from_ymd_opt(
        fields.unsigned("year")? as i32,
        fields.unsigned("month")?,
        fields.unsigned("day")?,
    )?;
    let time = date.and_hms_opt(fields.unsigned("hour")?, fields.unsigned("minute")?, 0)?;
    Some(time.format("%Y-%m-%d %H:%M").to_string())
}

fn dump(file: &Path) -> Result<(), Error> {
    let reader = BufReader::new(File::open(file)?);
    for record in decode_telemetry(reader) {
        let record = record?;
        println!("New Record {:?}", record.header);
        for sub in &record.sub_records {
            match sub.repeat {
                Some(count) => println!("  {} x{}", sub.label, count),
                None => println!("  {}", sub.label),
            }
            if matches!(sub.kind, SubRecordKind::VisualPass | SubRecordKind::VisualFail) {
                if let Some(time) = inspection_time(&sub.fields) {
                    println!("    tested: {}", time);
                }
            }
            for (name, value) in sub.fields.iter() {
                println!("    {}: {}", name, value);
            }
        }
        println!();
    }
    Ok(())
}

fn dump_csv(file: &Path) -> Result<(), Error> {
    let reader = BufReader::new(File::open(file)?);
    let records = decode_telemetry(reader).collect::<Result<Vec<_>, _>>()?;
    write_csv(std::io::stdout().lock(), &records)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(error) = check_args(&args) {
        error.exit();
    }

    let mut status = ExitCode::SUCCESS;

    for file in &args.files {
        let result = if args.csv {
            dump_csv(file)
        } else {
            println!("trying {:?}", file);
            dump(file)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_takes_one_file() {
        let args = Args::try_parse_from(["sssdump", "--csv", "a.sss"]).unwrap();
        assert!(check_args(&args).is_ok());

        let args = Args::try_parse_from(["sssdump", "--csv", "a.sss", "b.sss"]).unwrap();
        let error = check_args(&args).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TooManyValues);

        let args = Args::try_parse_from(["sssdump", "a.sss", "b.sss"]).unwrap();
        assert!(check_args(&args).is_ok());
    }
}
