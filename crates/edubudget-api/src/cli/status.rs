//! Token status display.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use edubudget_types::account::AccountId;
use edubudget_types::usage::{StatusTier, TokenStatus};

use super::account::format_tokens;
use crate::state::AppState;

fn tier_color(tier: StatusTier) -> Color {
    match tier {
        StatusTier::Normal => Color::Green,
        StatusTier::Warning => Color::Yellow,
        StatusTier::Critical => Color::Red,
        StatusTier::Exhausted => Color::DarkRed,
    }
}

fn styled_tier(tier: StatusTier) -> console::StyledObject<String> {
    let label = tier.to_string();
    match tier {
        StatusTier::Normal => style(label).green(),
        StatusTier::Warning => style(label).yellow(),
        StatusTier::Critical => style(label).red(),
        StatusTier::Exhausted => style(label).red().bold(),
    }
}

/// Status of the admin `account_id` draws from.
pub async fn account_status(state: &AppState, account_id: &AccountId, json: bool) -> Result<()> {
    let status = state
        .budget_service
        .status()
        .report_status_for(account_id)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    print_status(&status);
    Ok(())
}

fn print_status(status: &TokenStatus) {
    println!();
    println!(
        "  {}  {:.2}%  {}",
        style("Status:").bold(),
        status.percentage,
        styled_tier(status.status)
    );
    println!("  {}", style(&status.message).dim());
    println!();
    println!(
        "  {}  {} / {}",
        style("Used:").bold(),
        format_tokens(status.usage.used),
        format_tokens(status.usage.limit)
    );
    println!("  {}  {}", style("Remaining:").bold(), status.usage.remaining);
    println!(
        "  {}  {}",
        style("Can analyze:").bold(),
        if status.can_analyze {
            style("yes").green()
        } else {
            style("no").red()
        }
    );
    println!();
}

/// Dashboard over every admin.
pub async fn dashboard(state: &AppState, json: bool) -> Result<()> {
    let admins = state.account_service.list_admins().await?;
    let mut rows = Vec::with_capacity(admins.len());
    for admin in &admins {
        let status = state.budget_service.status().report_status(&admin.id).await?;
        rows.push((admin, status));
    }

    if json {
        let report = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "config": &*state.config,
            "admins": rows
                .iter()
                .map(|(admin, status)| serde_json::json!({
                    "id": admin.id,
                    "name": admin.name,
                    "status": status,
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} edubudget v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(
        "  {}  {}",
        style("Data:").bold(),
        style(state.data_dir.display()).dim()
    );
    println!(
        "  {}  {} tokens per analysis, default limit {}",
        style("Config:").bold(),
        format_tokens(state.config.estimated_analysis_tokens),
        format_tokens(state.config.default_admin_limit)
    );
    println!();

    if rows.is_empty() {
        println!("  {}", style("No admins yet.").dim());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Admin").fg(Color::White),
        Cell::new("Teachers").fg(Color::White),
        Cell::new("Used").fg(Color::White),
        Cell::new("Limit").fg(Color::White),
        Cell::new("%").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);
    for (admin, status) in &rows {
        table.add_row(vec![
            Cell::new(&admin.name).fg(Color::Cyan),
            Cell::new(status.usage.teacher_count),
            Cell::new(format_tokens(status.usage.used)),
            Cell::new(format_tokens(status.usage.limit)),
            Cell::new(format!("{:.2}", status.percentage)),
            Cell::new(status.status).fg(tier_color(status.status)),
        ]);
    }
    println!("{table}");
    println!();
    Ok(())
}
