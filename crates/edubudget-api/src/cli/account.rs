//! Account CLI commands: admins, teachers and student records.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use edubudget_types::account::{Account, AccountId, CreateAdminRequest, CreateTeacherRequest};
use edubudget_types::student::{CreateStudentRequest, StudentId};

use crate::state::AppState;

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).fg(Color::White))
            .collect::<Vec<_>>(),
    );
    table
}

fn print_account(account: &Account, headline: &str) {
    println!();
    println!("  {} {headline}", style("✓").green().bold());
    println!();
    println!("  {}  {}", style("Name:").bold(), style(&account.name).cyan());
    println!("  {}  {}", style("Role:").bold(), account.role);
    if let Some(email) = &account.email {
        println!("  {}  {email}", style("Email:").bold());
    }
    if account.is_admin() {
        println!(
            "  {}  {}",
            style("Limit:").bold(),
            format_tokens(account.token_usage.limit)
        );
    }
    println!("  {}  {}", style("ID:").bold(), style(account.id.to_string()).dim());
    println!();
}

/// Format a token count with thousands separators.
pub fn format_tokens(tokens: u64) -> String {
    let digits = tokens.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Create an admin.
///
/// # Examples
///
/// ```bash
/// edb admin create --name "Colegio Norte" --limit 500000
/// ```
pub async fn create_admin(
    state: &AppState,
    name: String,
    email: Option<String>,
    limit: Option<u64>,
    json: bool,
) -> Result<()> {
    let admin = state
        .account_service
        .create_admin(CreateAdminRequest {
            name,
            email,
            token_limit: limit,
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&admin)?);
        return Ok(());
    }
    print_account(&admin, "Admin created");
    Ok(())
}

pub async fn list_admins(state: &AppState, json: bool) -> Result<()> {
    let admins = state.account_service.list_admins().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&admins)?);
        return Ok(());
    }

    if admins.is_empty() {
        println!();
        println!("  {}", style("No admins yet.").dim());
        println!(
            "  Create one with: {}",
            style("edb admin create --name <NAME>").cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = new_table(&["Name", "Email", "Direct Used", "Limit", "ID"]);
    for admin in &admins {
        table.add_row(vec![
            Cell::new(&admin.name).fg(Color::Cyan),
            Cell::new(admin.email.as_deref().unwrap_or("-")),
            Cell::new(format_tokens(admin.token_usage.used)),
            Cell::new(format_tokens(admin.token_usage.limit)),
            Cell::new(admin.id.to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

pub async fn set_limit(state: &AppState, admin_id: &AccountId, limit: u64, json: bool) -> Result<()> {
    let admin = state.account_service.set_admin_limit(admin_id, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&admin)?);
        return Ok(());
    }
    print_account(&admin, "Limit updated");
    Ok(())
}

pub async fn delete_admin(state: &AppState, admin_id: &AccountId, json: bool) -> Result<()> {
    let admin = state.account_service.get_account(admin_id).await?;
    if !admin.is_admin() {
        anyhow::bail!("'{admin_id}' is a {}, not an admin", admin.role);
    }
    state.account_service.delete_account(admin_id).await?;

    if json {
        println!("{}", serde_json::json!({ "deleted": admin_id.to_string() }));
        return Ok(());
    }
    println!();
    println!(
        "  {} Deleted admin {} with its teachers and students",
        style("✓").green().bold(),
        style(&admin.name).cyan()
    );
    println!();
    Ok(())
}

pub async fn create_teacher(
    state: &AppState,
    admin_id: &AccountId,
    name: String,
    email: Option<String>,
    json: bool,
) -> Result<()> {
    let teacher = state
        .account_service
        .create_teacher(admin_id, CreateTeacherRequest { name, email })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&teacher)?);
        return Ok(());
    }
    print_account(&teacher, "Teacher created");
    Ok(())
}

pub async fn list_teachers(state: &AppState, admin_id: &AccountId, json: bool) -> Result<()> {
    let teachers = state.account_service.list_teachers(admin_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&teachers)?);
        return Ok(());
    }

    if teachers.is_empty() {
        println!();
        println!("  {}", style("No teachers for this admin.").dim());
        println!();
        return Ok(());
    }

    let mut table = new_table(&["Name", "Email", "Used", "ID"]);
    for teacher in &teachers {
        table.add_row(vec![
            Cell::new(&teacher.name).fg(Color::Cyan),
            Cell::new(teacher.email.as_deref().unwrap_or("-")),
            Cell::new(format_tokens(teacher.token_usage.used)),
            Cell::new(teacher.id.to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

pub async fn add_student(
    state: &AppState,
    admin_id: &AccountId,
    name: String,
    course: String,
    json: bool,
) -> Result<()> {
    let student = state
        .account_service
        .add_student(admin_id, CreateStudentRequest { name, course })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&student)?);
        return Ok(());
    }

    println!();
    println!("  {} Student added", style("✓").green().bold());
    println!();
    println!("  {}  {}", style("Name:").bold(), style(&student.name).cyan());
    if !student.course.is_empty() {
        println!("  {}  {}", style("Course:").bold(), student.course);
    }
    println!("  {}  {}", style("ID:").bold(), style(student.id.to_string()).dim());
    println!();
    Ok(())
}

/// List students with their token totals, heaviest first.
pub async fn list_students(state: &AppState, admin_id: &AccountId, json: bool) -> Result<()> {
    let students = state.account_service.list_students(admin_id).await?;
    let summaries = state
        .budget_service
        .summaries()
        .student_summaries(admin_id)
        .await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "students": students,
                "summaries": summaries,
            }))?
        );
        return Ok(());
    }

    if summaries.is_empty() {
        println!();
        println!("  {}", style("No students for this admin.").dim());
        println!();
        return Ok(());
    }

    let mut table = new_table(&["Name", "Course", "Requests", "Total", "Avg/Request", "ID"]);
    for summary in &summaries {
        let course = students
            .iter()
            .find(|s| s.id == summary.student_id)
            .map(|s| s.course.as_str())
            .unwrap_or("");
        table.add_row(vec![
            Cell::new(&summary.student_name).fg(Color::Cyan),
            Cell::new(course),
            Cell::new(summary.request_count),
            Cell::new(format_tokens(summary.total_tokens)),
            Cell::new(format_tokens(summary.average_tokens_per_request)),
            Cell::new(summary.student_id.to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

pub async fn delete_student(state: &AppState, student_id: &StudentId, json: bool) -> Result<()> {
    state.account_service.delete_student(student_id).await?;

    if json {
        println!("{}", serde_json::json!({ "deleted": student_id.to_string() }));
        return Ok(());
    }
    println!();
    println!("  {} Student record removed", style("✓").green().bold());
    println!();
    Ok(())
}
