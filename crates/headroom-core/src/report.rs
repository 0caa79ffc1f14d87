//! Text rendering of the per-tick scheduler table

use headroom_api::TickReport;

const HEADERS: [&str; 9] = [
    "Tier", "Load", "Rated W", "Status", "Time Run", "Rem Mins", "Watts", "Catch-up", "Action",
];

fn watts(value: Option<i64>) -> String {
    value.map(|w| format!("{}W", w)).unwrap_or_else(|| "n/a".into())
}

fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let mut line = String::new();
    line.push(left);
    for (i, w) in widths.iter().enumerate() {
        line.push_str(&"─".repeat(w + 2));
        line.push(if i + 1 == widths.len() { right } else { mid });
    }
    line
}

fn row_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("│");
    for (cell, w) in cells.iter().zip(widths) {
        let pad = w.saturating_sub(cell.chars().count());
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(pad + 1));
        line.push('│');
    }
    line
}

/// Render a report as a box-drawn table with a one-line summary on top
pub fn render_table(report: &TickReport) -> String {
    let rows: Vec<Vec<String>> = report
        .rows
        .iter()
        .map(|r| {
            vec![
                r.tier.to_string(),
                r.label.clone(),
                r.rated_watts.to_string(),
                r.status.label().to_string(),
                format!("{}m", r.runtime_mins),
                r.remaining_mins.to_string(),
                r.needed_watts.to_string(),
                r.catchup.to_string(),
                r.action.to_string(),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let headers: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    let mut lines = vec![
        format!(
            "Scheduler {}: headroom {}, after pass {}, running {}/{}",
            report.at.format("%Y-%m-%d %H:%M"),
            watts(report.headroom_w),
            watts(report.final_headroom_w),
            report.running,
            report.max_concurrent
        ),
        border(&widths, '┌', '┬', '┐'),
        row_line(&headers, &widths),
        border(&widths, '├', '┼', '┤'),
    ];
    lines.extend(rows.iter().map(|row| row_line(row, &widths)));
    lines.push(border(&widths, '└', '┴', '┘'));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use headroom_api::{CatchupStatus, LoadStatus, ReportRow, SkipReason, TickAction};
    use headroom_util::LoadId;

    fn report() -> TickReport {
        TickReport {
            at: Local.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            headroom_w: Some(1500),
            final_headroom_w: Some(500),
            running: 1,
            max_concurrent: 2,
            rows: vec![
                ReportRow {
                    tier: 1,
                    load_id: LoadId::new("pool-pump"),
                    label: "Pool pump".into(),
                    rated_watts: 1000,
                    status: LoadStatus::Running,
                    runtime_mins: 0,
                    remaining_mins: 60,
                    needed_watts: 1440,
                    catchup: CatchupStatus::Off,
                    action: TickAction::Start,
                },
                ReportRow {
                    tier: 3,
                    load_id: LoadId::new("heater"),
                    label: "Heater".into(),
                    rated_watts: 2000,
                    status: LoadStatus::Off,
                    runtime_mins: 15,
                    remaining_mins: 45,
                    needed_watts: 2880,
                    catchup: CatchupStatus::Needed { remaining_mins: 30 },
                    action: TickAction::Skip(SkipReason::Cap),
                },
            ],
        }
    }

    #[test]
    fn table_has_header_rows_and_borders() {
        let text = render_table(&report());
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].contains("headroom 1500W"));
        assert!(lines[0].contains("running 1/2"));
        assert!(lines[1].starts_with('┌'));
        assert!(lines[2].contains("Rated W"));
        assert!(lines[4].contains("Pool pump") && lines[4].contains("START"));
        assert!(lines[5].contains("SKIP (cap)") && lines[5].contains("Need 30m"));
        assert!(lines[6].starts_with('└'));
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn columns_are_aligned() {
        let text = render_table(&report());
        let widths: Vec<usize> = text.lines().skip(1).map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn missing_reading_renders_as_na() {
        let mut r = report();
        r.headroom_w = None;
        r.final_headroom_w = None;
        assert!(render_table(&r).lines().next().unwrap().contains("headroom n/a"));
    }
}
