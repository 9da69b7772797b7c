//! Usage CLI commands: record charges, show aggregation, check admission.

use anyhow::Result;
use console::style;

use edubudget_core::budget::ChargeContext;
use edubudget_core::budget::guard::ChargeError;
use edubudget_types::account::AccountId;
use edubudget_types::student::StudentId;
use edubudget_types::usage::{AdmissionDecision, TokenCost, Verdict};

use super::account::format_tokens;
use crate::state::AppState;

fn cost_from_flags(tokens: Option<u64>, prompt: Option<u64>, completion: Option<u64>) -> Result<TokenCost> {
    match (tokens, prompt, completion) {
        (Some(total), None, None) => Ok(TokenCost::total(total)),
        (None, None, None) => anyhow::bail!("pass --tokens or --prompt/--completion"),
        (None, prompt, completion) => Ok(TokenCost::new(prompt.unwrap_or(0), completion.unwrap_or(0))),
        _ => anyhow::bail!("--tokens cannot be combined with --prompt/--completion"),
    }
}

fn print_decision(decision: &AdmissionDecision) {
    println!();
    if decision.allowed {
        println!(
            "  {} Allowed: {} tokens fit within the limit",
            style("✓").green().bold(),
            format_tokens(decision.requested_tokens)
        );
    } else if decision.verdict == Verdict::AdminNotFound {
        println!("  {} Denied: owning admin not found", style("✗").red().bold());
    } else {
        println!(
            "  {} Denied: {}",
            style("✗").red().bold(),
            style(&decision.reason).red()
        );
    }
    println!();
    println!(
        "  {}  {} / {}",
        style("Used:").bold(),
        format_tokens(decision.current_used),
        format_tokens(decision.limit)
    );
    println!("  {}  {}", style("Remaining:").bold(), decision.remaining);
    if decision.excess > 0 {
        println!(
            "  {}  {}",
            style("Excess:").bold(),
            style(format_tokens(decision.excess)).red()
        );
    }
    println!();
}

/// Charge tokens to an admin or teacher.
///
/// # Examples
///
/// ```bash
/// edb usage record <ACCOUNT_ID> --prompt 1200 --completion 300 --document ensayo.pdf
/// edb usage record <ACCOUNT_ID> --tokens 2000 --enforce
/// ```
#[allow(clippy::too_many_arguments)]
pub async fn record(
    state: &AppState,
    account_id: &AccountId,
    tokens: Option<u64>,
    prompt: Option<u64>,
    completion: Option<u64>,
    student: Option<StudentId>,
    document: String,
    enforce: bool,
    json: bool,
) -> Result<()> {
    let cost = cost_from_flags(tokens, prompt, completion)?;
    let ctx = match student {
        Some(student_id) => ChargeContext::for_student(student_id, document),
        None => ChargeContext::document(document),
    };

    let usage = if enforce {
        let guard = state.budget_service.guard();
        let reservation = match guard.reserve(account_id, cost.total_tokens).await {
            Ok(reservation) => reservation,
            Err(ChargeError::Denied(decision)) => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&decision)?);
                } else {
                    print_decision(&decision);
                }
                anyhow::bail!("charge refused: {}", decision.reason);
            }
            Err(e) => return Err(e.into()),
        };
        guard.commit(reservation, cost, &ctx).await?
    } else {
        state
            .budget_service
            .recorder()
            .record_charge(account_id, cost, &ctx)
            .await?
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "account_id": account_id,
                "cost": cost,
                "usage": usage,
            }))?
        );
        return Ok(());
    }

    println!();
    println!(
        "  {} Recorded {} tokens",
        style("✓").green().bold(),
        format_tokens(cost.total_tokens)
    );
    println!(
        "  {}  {}",
        style("Account used:").bold(),
        format_tokens(usage.used)
    );
    println!();
    Ok(())
}

pub async fn record_student(
    state: &AppState,
    student_id: &StudentId,
    prompt: u64,
    completion: u64,
    document: &str,
    json: bool,
) -> Result<()> {
    let event = state
        .budget_service
        .recorder()
        .record_student_usage(student_id, TokenCost::new(prompt, completion), document)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&event)?);
        return Ok(());
    }
    println!();
    println!(
        "  {} Logged {} tokens for the student {}",
        style("✓").green().bold(),
        format_tokens(event.cost.total_tokens),
        style("(not charged to the budget)").dim()
    );
    println!();
    Ok(())
}

/// Show the aggregated usage of an admin and its teachers.
pub async fn show(state: &AppState, admin_id: &AccountId, json: bool) -> Result<()> {
    let usage = state.budget_service.aggregator().compute(admin_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&usage)?);
        return Ok(());
    }

    println!();
    println!("  {}", style("Token usage").bold().underlined());
    println!();
    println!(
        "  {}  {}",
        style("Admin direct:").bold(),
        format_tokens(usage.admin_direct_usage)
    );
    println!(
        "  {}  {} ({} teachers)",
        style("Teachers:").bold(),
        format_tokens(usage.teachers_usage),
        usage.teacher_count
    );
    println!(
        "  {}  {} / {}",
        style("Used:").bold(),
        style(format_tokens(usage.used)).cyan(),
        format_tokens(usage.limit)
    );
    println!("  {}  {}", style("Remaining:").bold(), usage.remaining);
    println!(
        "  {}  {} {}",
        style("Students:").bold(),
        format_tokens(usage.students_usage),
        style("(reported only)").dim()
    );
    println!();
    Ok(())
}

/// Check admission for an admin or teacher.
///
/// Without `--tokens` this is the per-analysis preflight. Exits with an
/// error when denied so scripts can branch on the status code.
pub async fn check(state: &AppState, account_id: &AccountId, tokens: Option<u64>, json: bool) -> Result<()> {
    let admission = state.budget_service.admission();
    let decision = match tokens {
        None => admission.preflight(account_id).await?,
        Some(tokens) => {
            let owner = state.account_service.resolve_budget_owner(account_id).await?;
            admission.can_allow(&owner, tokens).await?
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        print_decision(&decision);
    }

    if !decision.allowed {
        anyhow::bail!("admission denied: {}", decision.reason);
    }
    Ok(())
}
