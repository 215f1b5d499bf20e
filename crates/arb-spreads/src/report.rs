//! Summary tables for publication.
//!
//! Tables are emitted as LaTeX (booktabs), Markdown and HTML sources. Typesetting
//! them is left to the document toolchain.

use crate::{
    Result, Settings,
    frame::{ColumnStats, days_since_epoch, describe},
    measures::Measure,
};
use chrono::NaiveDate;
use derive_more::Display;
use polars::prelude::*;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Output format of a rendered table.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFormat {
    /// LaTeX `tabular` using booktabs rules
    #[display("latex")]
    Latex,
    /// GitHub-flavoured Markdown
    #[display("markdown")]
    Markdown,
    /// HTML `<table>`
    #[display("html")]
    Html,
}

impl TableFormat {
    /// All formats.
    pub const ALL: [Self; 3] = [Self::Latex, Self::Markdown, Self::Html];

    /// File extension.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Latex => "tex",
            Self::Markdown => "md",
            Self::Html => "html",
        }
    }
}

/// Descriptive statistics of a set of series over a sample window.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    /// First date of the window
    pub start: NaiveDate,
    /// Last date of the window
    pub end: NaiveDate,
    /// Rows in the window
    pub observations: usize,
    /// One entry per summarised column
    pub rows: Vec<ColumnStats>,
}

const HEADER: [&str; 7] = ["Series", "N", "Mean", "Std", "Min", "Median", "Max"];

/// Summarise `columns` of `df` over `[start, end]`.
pub fn summary_table(
    df: &DataFrame,
    columns: &[&str],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<SummaryTable> {
    let window = df
        .clone()
        .lazy()
        .filter(
            col("date")
                .cast(DataType::Int32)
                .gt_eq(lit(days_since_epoch(start)))
                .and(col("date").cast(DataType::Int32).lt_eq(lit(days_since_epoch(end)))),
        )
        .collect()?;

    Ok(SummaryTable {
        start,
        end,
        observations: window.height(),
        rows: describe(&window, columns)?,
    })
}

fn cells(stats: &ColumnStats) -> [String; 6] {
    let fmt = |v: Option<f64>| v.map_or_else(String::new, |v| format!("{v:.4}"));
    [
        stats.count.to_string(),
        fmt(stats.mean),
        fmt(stats.std),
        fmt(stats.min),
        fmt(stats.median),
        fmt(stats.max),
    ]
}

fn latex_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '_' | '%' | '&' | '#' | '$' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl SummaryTable {
    /// Render the table in `format`.
    pub fn render(&self, format: TableFormat) -> String {
        match format {
            TableFormat::Latex => self.to_latex(),
            TableFormat::Markdown => self.to_markdown(),
            TableFormat::Html => self.to_html(),
        }
    }

    fn caption(&self) -> String {
        format!("{} to {}, {} observations", self.start, self.end, self.observations)
    }

    fn to_latex(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "% {}", self.caption());
        let _ = writeln!(out, "\\begin{{tabular}}{{l{}}}", "r".repeat(HEADER.len() - 1));
        let _ = writeln!(out, "\\toprule");
        let _ = writeln!(out, "{} \\\\", HEADER.join(" & "));
        let _ = writeln!(out, "\\midrule");
        for stats in &self.rows {
            let _ = writeln!(
                out,
                "{} & {} \\\\",
                latex_escape(&stats.name),
                cells(stats).join(" & ")
            );
        }
        let _ = writeln!(out, "\\bottomrule");
        let _ = writeln!(out, "\\end{{tabular}}");
        out
    }

    fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "| {} |", HEADER.join(" | "));
        let _ = writeln!(out, "|---|{}", "---:|".repeat(HEADER.len() - 1));
        for stats in &self.rows {
            let _ = writeln!(out, "| {} | {} |", stats.name, cells(stats).join(" | "));
        }
        let _ = writeln!(out, "\n_{}_", self.caption());
        out
    }

    fn to_html(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "<table>");
        let _ = writeln!(out, "<caption>{}</caption>", html_escape(&self.caption()));
        let _ = writeln!(out, "<thead><tr>");
        for title in HEADER {
            let _ = writeln!(out, "<th>{title}</th>");
        }
        let _ = writeln!(out, "</tr></thead>");
        let _ = writeln!(out, "<tbody>");
        for stats in &self.rows {
            let _ = write!(out, "<tr><td>{}</td>", html_escape(&stats.name));
            for cell in cells(stats) {
                let _ = write!(out, "<td>{cell}</td>");
            }
            let _ = writeln!(out, "</tr>");
        }
        let _ = writeln!(out, "</tbody>");
        let _ = writeln!(out, "</table>");
        out
    }
}

/// Write `table` to `dir/{stem}.{ext}`.
pub fn write_table(table: &SummaryTable, format: TableFormat, dir: &Path, stem: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}.{}", format.extension()));
    fs::write(&path, table.render(format))?;
    Ok(path)
}

/// Stem of the summary table files for `measure`.
pub fn table_stem(measure: &dyn Measure) -> String {
    format!("{}_summary", measure.name())
}

/// Paths [`publish_summary`] writes for `measure`.
pub fn table_paths(measure: &dyn Measure, settings: &Settings, formats: &[TableFormat]) -> Vec<PathBuf> {
    let stem = table_stem(measure);
    formats
        .iter()
        .map(|f| settings.tables_dir.join(format!("{stem}.{}", f.extension())))
        .collect()
}

/// Summarise a measure's stored output over the configured sample window.
pub fn publish_summary(
    measure: &dyn Measure,
    settings: &Settings,
    formats: &[TableFormat],
) -> Result<Vec<PathBuf>> {
    let df = measure.load_output(settings)?;
    let columns = measure.summary_columns();
    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
    let table = summary_table(&df, &columns, settings.start_date, settings.end_date)?;

    let stem = table_stem(measure);
    let paths = formats
        .iter()
        .map(|format| write_table(&table, *format, &settings.tables_dir, &stem))
        .collect::<Result<Vec<_>>>()?;
    info!(measure = measure.name(), tables = paths.len(), "wrote summary tables");
    Ok(paths)
}
