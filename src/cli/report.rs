use std::{fmt::Display, path::Path};

use anyhow::Result;
use chrono::{Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    daemon::storage::{
        classifications::ClassificationStore,
        usage_store::{JsonUsageStore, UsageStore},
    },
    utils::percentage::Percentage,
};

use super::{
    output::{analysis::analyze_usage, print_report},
    Args,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct ReportCommand {
    #[arg(
        long = "start",
        short,
        help = "First day of the report. Examples are \"yesterday\", \"last monday\", \"15/03/2025\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "Last day of the report, inclusive. Examples are \"today\", \"15/03/2025\""
    )]
    end_date: Option<String>,
    #[arg(
        long,
        default_value_t = DateStyle::Uk,
        help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year"
    )]
    date_style: DateStyle,
    #[arg(
        short = 'p',
        long = "percentage",
        help = "Hide sites below the specified percentage of total time",
        default_value_t = Percentage::ZERO
    )]
    min_percentage: Percentage,
    #[arg(long, help = "Print the report as json")]
    json: bool,
}

/// Command to process `report` command. Shows the time spent per site from `start_date` to
/// `end_date`, split by the user's classifications.
pub async fn process_report_command(
    dir: &Path,
    ReportCommand {
        start_date,
        end_date,
        date_style,
        min_percentage,
        json,
    }: ReportCommand,
) -> Result<()> {
    let (start, end) = parse_range(start_date, end_date, date_style)?;

    let usage = JsonUsageStore::new(dir.to_path_buf())?.load().await?;
    let classifications = ClassificationStore::in_dir(dir).load().await?;

    let report = analyze_usage(&usage, start, end, &classifications, min_percentage);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Resolves both ends of the range into local days. Missing ends default to today.
fn parse_range(
    start_date: Option<String>,
    end_date: Option<String>,
    date_style: DateStyle,
) -> Result<(NaiveDate, NaiveDate)> {
    let now = Local::now();
    let dialect: chrono_english::Dialect = date_style.into();
    let parse = |value: Option<String>, name: &str| -> Result<NaiveDate> {
        match value.map(|s| parse_date_string(&s, now, dialect)) {
            Some(Ok(v)) => Ok(v.date_naive()),
            Some(Err(e)) => Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate {name} date {e}"),
                )
                .into()),
            None => Ok(now.date_naive()),
        }
    };
    let start = parse(start_date, "start")?;
    let end = parse(end_date, "end")?;
    if start > end {
        return Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Start date {start} is after end date {end}"),
            )
            .into());
    }
    Ok((start, end))
}
