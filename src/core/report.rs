//! Report rendering - plain-text views of summaries and dashboards.
//!
//! All functions are pure and return strings; the binary decides where they go.

use crate::core::{
    dashboard::DashboardStats,
    summary::{DetailedSummary, ProjectSummary, Summary},
};
use std::fmt::Write;

/// Currency prefix used on every money amount
pub const CURRENCY: &str = "Rp";

/// Formats a number with two decimals and comma thousands separators.
///
/// # Examples
/// `1234567.891` becomes `"1,234,567.89"`, `-50.0` becomes `"-50.00"`.
#[must_use]
pub fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{fraction}")
}

/// Formats a money amount, e.g. `Rp 1,500.00`.
#[must_use]
pub fn format_currency(amount: f64) -> String {
    format!("{CURRENCY} {}", format_amount(amount))
}

/// One summary row as a single line:
/// `MATERIAL | Cement | 10.00 kg | Rp 1,000.00`
#[must_use]
pub fn format_summary_line(summary: &Summary) -> String {
    let quantity = if summary.unit.is_empty() {
        format_amount(summary.total_quantity)
    } else {
        format!("{} {}", format_amount(summary.total_quantity), summary.unit)
    };
    format!(
        "{} | {} | {quantity} | {}",
        summary.kind,
        summary.item_name,
        format_currency(summary.total_cost)
    )
}

/// Renders summary rows under a title, followed by a grand total.
#[must_use]
pub fn render_summary_table(title: &str, rows: &[&Summary]) -> String {
    let mut out = format!("{title}\n");
    if rows.is_empty() {
        out.push_str("  (no cost line items)\n");
    }
    for row in rows {
        let _ = writeln!(out, "  {}", format_summary_line(row));
    }
    let total: f64 = rows.iter().map(|row| row.total_cost).sum();
    let _ = writeln!(out, "  Total: {}", format_currency(total));
    out
}

/// Renders detailed rows with each work item's contribution indented underneath.
#[must_use]
pub fn render_detailed_summary(title: &str, rows: &[DetailedSummary]) -> String {
    let mut out = format!("{title}\n");
    for row in rows {
        let _ = writeln!(out, "  {}", format_summary_line(&row.summary));
        for part in &row.breakdown {
            let _ = writeln!(
                out,
                "      #{} {}: {} x {} = {} ({})",
                part.work_item_id,
                part.work_item_description,
                format_amount(part.volume),
                format_amount(part.coefficient),
                format_amount(part.quantity),
                format_currency(part.cost)
            );
        }
    }
    let total: f64 = rows.iter().map(|row| row.summary.total_cost).sum();
    let _ = writeln!(out, "  Total: {}", format_currency(total));
    out
}

/// Renders a project summary in whichever form it was produced.
#[must_use]
pub fn render_project_summary(project_name: &str, summary: &ProjectSummary) -> String {
    match summary {
        ProjectSummary::Detailed(rows) => render_detailed_summary(project_name, rows),
        ProjectSummary::Plain(_) => {
            let mut out = render_summary_table(project_name, &summary.rows());
            out.push_str("  (breakdown unavailable)\n");
            out
        }
    }
}

/// Renders dashboard statistics.
#[must_use]
pub fn render_dashboard(stats: &DashboardStats) -> String {
    let mut out = format!(
        "Projects: {}\nPortfolio total: {}\n",
        stats.project_count,
        format_currency(stats.total_cost)
    );
    if !stats.recent_projects.is_empty() {
        out.push_str("Recent projects:\n");
        for project in &stats.recent_projects {
            let _ = writeln!(out, "  #{} {} ({})", project.id, project.name, project.location);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::summary::WorkItemBreakdown, entities::ItemKind};

    fn cement() -> Summary {
        Summary {
            item_id: 1,
            item_name: "Cement".to_string(),
            total_quantity: 10.0,
            unit: "kg".to_string(),
            kind: ItemKind::Material,
            total_cost: 1_000.0,
        }
    }

    fn mason() -> Summary {
        Summary {
            item_id: 1,
            item_name: "Mason".to_string(),
            total_quantity: 2.5,
            unit: String::new(),
            kind: ItemKind::Labor,
            total_cost: 375.0,
        }
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(999.5), "999.50");
        assert_eq!(format_amount(1_000.0), "1,000.00");
        assert_eq!(format_amount(1_234_567.891), "1,234,567.89");
        assert_eq!(format_amount(-50.0), "-50.00");
        assert_eq!(format_amount(-0.001), "0.00");
        assert_eq!(format_amount(123_456.0), "123,456.00");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1_500.0), "Rp 1,500.00");
    }

    #[test]
    fn test_format_summary_line() {
        assert_eq!(
            format_summary_line(&cement()),
            "MATERIAL | Cement | 10.00 kg | Rp 1,000.00"
        );
        assert_eq!(
            format_summary_line(&mason()),
            "LABOR | Mason | 2.50 | Rp 375.00"
        );
    }

    #[test]
    fn test_render_summary_table() {
        let cement = cement();
        let mason = mason();
        let out = render_summary_table("All projects", &[&cement, &mason]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "All projects");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "  Total: Rp 1,375.00");

        let empty = render_summary_table("Nothing", &[]);
        assert!(empty.contains("(no cost line items)"));
        assert!(empty.contains("Total: Rp 0.00"));
    }

    #[test]
    fn test_render_project_summary_forms() {
        let detailed = ProjectSummary::Detailed(vec![DetailedSummary {
            summary: cement(),
            breakdown: vec![WorkItemBreakdown {
                work_item_id: 4,
                work_item_description: "Footing".to_string(),
                quantity: 10.0,
                cost: 1_000.0,
                volume: 5.0,
                coefficient: 2.0,
            }],
        }]);
        let out = render_project_summary("House", &detailed);
        assert!(out.contains("#4 Footing: 5.00 x 2.00 = 10.00 (Rp 1,000.00)"));
        assert!(!out.contains("breakdown unavailable"));

        let plain = ProjectSummary::Plain(vec![cement()]);
        let out = render_project_summary("House", &plain);
        assert!(out.contains("breakdown unavailable"));
        assert!(out.contains("Total: Rp 1,000.00"));
    }

    #[test]
    fn test_render_dashboard() {
        let stats = DashboardStats {
            project_count: 0,
            total_cost: 0.0,
            recent_projects: Vec::new(),
        };
        assert_eq!(render_dashboard(&stats), "Projects: 0\nPortfolio total: Rp 0.00\n");
    }
}
