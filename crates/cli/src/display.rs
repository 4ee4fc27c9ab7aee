// Table rendering for orders, edit outcomes and audit trails

use colored::Colorize;
use order_edit_core::application::EditOutcome;
use order_edit_core::domain::{EditTrail, Order, TrailStatus};
use tabled::{Table, Tabled};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Tabled)]
struct LineRow {
    product: i64,
    designation: String,
    unit_price: String,
    quantity: i64,
}

#[derive(Tabled)]
struct LineResultRow {
    product: i64,
    quantity: i64,
    rows: u64,
}

#[derive(Tabled)]
struct TrailRow {
    reference: String,
    opened: String,
    closed: String,
    status: String,
}

pub fn print_order(order: &Order) {
    println!(
        "{} {}",
        "Order".cyan().bold(),
        order.header.order_id.to_string().cyan().bold()
    );
    println!("  Customer: {}", order.header.customer_name);
    println!("  Address:  {}", order.header.address);
    println!();

    if order.lines.is_empty() {
        println!("{}", "No lines".yellow());
        return;
    }

    let rows: Vec<LineRow> = order
        .lines
        .iter()
        .map(|l| LineRow {
            product: l.product_id,
            designation: l.designation.clone(),
            unit_price: format!("{:.2}", l.unit_price),
            quantity: l.quantity,
        })
        .collect();
    println!("{}", Table::new(rows));
}

pub fn print_outcome(outcome: &EditOutcome) {
    println!("{}", "✓ Order edit committed".green().bold());
    println!("  Reference: {}", outcome.reference);
    println!("  Header rows updated: {}", outcome.header_rows);

    if !outcome.line_results.is_empty() {
        let rows: Vec<LineResultRow> = outcome
            .line_results
            .iter()
            .map(|r| LineResultRow {
                product: r.product_id,
                quantity: r.quantity,
                rows: r.rows,
            })
            .collect();
        println!();
        println!("{}", Table::new(rows));
    }

    let unmatched = outcome.unmatched_products();
    if !unmatched.is_empty() {
        println!(
            "{}",
            format!("⚠ No order line matched product(s) {:?}", unmatched).yellow()
        );
    }
}

pub fn print_trails(trails: &[EditTrail]) {
    if trails.is_empty() {
        println!("{}", "No edits recorded".yellow());
        return;
    }

    let rows: Vec<TrailRow> = trails
        .iter()
        .map(|t| TrailRow {
            reference: t.reference.to_string(),
            opened: format_timestamp(t.opened_at),
            closed: format_timestamp(t.closed_at),
            status: match t.status() {
                TrailStatus::Completed => t.status().to_string().green().to_string(),
                TrailStatus::Incomplete => t.status().to_string().red().to_string(),
            },
        })
        .collect();
    println!("{}", Table::new(rows));
}

fn format_timestamp(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}
