//! Human-readable tables for cluster results.

use gearadm_protocol::{ClusterResult, Reply};
use unicode_width::UnicodeWidthStr;

use super::TableRecord;

const INDENT: &str = "  ";
const COLUMN_GAP: usize = 2;

/// Renders every endpoint of `result` as a titled block.
///
/// Failed endpoints show their error in place of the table, and rejected
/// reply lines follow the table as warnings.
#[must_use]
pub fn render_cluster<T>(result: &ClusterResult<T>) -> String
where
    T: TableRecord,
{
    let mut lines: Vec<String> = Vec::new();
    for (endpoint, outcome) in result.iter() {
        lines.push(endpoint.to_string());
        match outcome {
            Ok(reply) => render_reply(&mut lines, reply),
            Err(error) => lines.push(format!("{INDENT}error: {error}")),
        }
    }

    let mut output = lines.join("\n");
    output.push('\n');
    output
}

fn render_reply<T>(lines: &mut Vec<String>, reply: &Reply<T>)
where
    T: TableRecord,
{
    if reply.records.is_empty() {
        lines.push(format!("{INDENT}{}", T::EMPTY));
    } else {
        let header: Vec<String> = T::COLUMNS.iter().map(|column| (*column).to_owned()).collect();
        let rows: Vec<Vec<String>> = reply.records.iter().map(TableRecord::cells).collect();
        let widths = column_widths(&header, &rows);
        lines.push(format_row(&header, &widths));
        lines.extend(rows.iter().map(|row| format_row(row, &widths)));
    }
    lines.extend(
        reply
            .errors
            .iter()
            .map(|error| format!("{INDENT}warning: {error}")),
    );
}

fn column_widths(header: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = header.iter().map(|cell| cell.width()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }
    widths
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from(INDENT);
    let last = cells.len().saturating_sub(1);
    for (index, (cell, width)) in cells.iter().zip(widths).enumerate() {
        line.push_str(cell);
        if index < last {
            let padding = width.saturating_sub(cell.width()) + COLUMN_GAP;
            line.push_str(&" ".repeat(padding));
        }
    }
    line
}
