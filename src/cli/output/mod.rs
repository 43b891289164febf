pub mod analysis;

use std::io::{stdout, IsTerminal};

use ansi_term::Style;
use analysis::{SiteUsage, UsageReport};

use crate::utils::{percentage::seconds_percentage, time::format_seconds};

pub fn print_report(report: &UsageReport) {
    let header = if stdout().is_terminal() {
        Style::new().bold()
    } else {
        Style::new()
    };

    if report.start == report.end {
        println!("{}", header.paint(format!("Usage for {}", report.start)));
    } else {
        println!(
            "{}",
            header.paint(format!("Usage from {} to {}", report.start, report.end))
        );
    }
    println!(
        "Total\t{}\tProductive\t{}%\tUnproductive\t{}%",
        format_seconds(report.total_seconds),
        *seconds_percentage(report.productive_seconds, report.total_seconds) as i32,
        *seconds_percentage(report.unproductive_seconds, report.total_seconds) as i32,
    );
    println!();

    print_category(
        header,
        "Productive",
        report.productive_seconds,
        &report.productive,
        report.total_seconds,
    );
    print_category(
        header,
        "Unproductive",
        report.unproductive_seconds,
        &report.unproductive,
        report.total_seconds,
    );
}

fn print_category(header: Style, name: &str, seconds: u64, sites: &[SiteUsage], total: u64) {
    println!(
        "{}",
        header.paint(format!("{name}\t{}", format_seconds(seconds)))
    );
    if sites.is_empty() {
        println!("No sites");
    }
    for site in sites {
        println!(
            "{}%\t{}\t{}",
            *seconds_percentage(site.seconds, total) as i32,
            format_seconds(site.seconds),
            site.hostname
        );
    }
    println!();
}
