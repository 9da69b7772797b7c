//! CLI command definitions and dispatch for the `edb` binary.
//!
//! Uses clap derive macros for argument parsing. Commands are grouped by
//! noun (`edb admin create`, `edb usage record`).

pub mod account;
pub mod status;
pub mod usage;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use edubudget_types::account::AccountId;
use edubudget_types::student::StudentId;

/// Token budgets for schools, teachers and students.
#[derive(Parser)]
#[command(name = "edb", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage admin accounts (schools).
    Admin {
        #[command(subcommand)]
        action: AdminCommand,
    },

    /// Manage teacher accounts.
    Teacher {
        #[command(subcommand)]
        action: TeacherCommand,
    },

    /// Manage student records.
    Student {
        #[command(subcommand)]
        action: StudentCommand,
    },

    /// Record and inspect token usage.
    Usage {
        #[command(subcommand)]
        action: UsageCommand,
    },

    /// Check whether an analysis would be admitted.
    Check {
        /// Admin or teacher account id.
        account_id: AccountId,

        /// Tokens to ask for (defaults to the configured per-analysis estimate).
        #[arg(long)]
        tokens: Option<u64>,
    },

    /// Token status for one account, or a dashboard of all admins.
    Status {
        /// Admin or teacher account id.
        account_id: Option<AccountId>,
    },

    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Create an admin with its own token ceiling.
    Create {
        /// Display name.
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: Option<String>,

        /// Token ceiling (defaults to `default_admin_limit` from config.toml).
        #[arg(long)]
        limit: Option<u64>,
    },

    /// List admins.
    #[command(alias = "ls")]
    List,

    /// Replace an admin's token ceiling.
    SetLimit {
        admin_id: AccountId,
        limit: u64,
    },

    /// Delete an admin together with its teachers and students.
    #[command(alias = "rm")]
    Delete { admin_id: AccountId },
}

#[derive(Subcommand)]
pub enum TeacherCommand {
    /// Create a teacher drawing from an admin's budget.
    Create {
        admin_id: AccountId,

        #[arg(long)]
        name: String,

        #[arg(long)]
        email: Option<String>,
    },

    /// List the teachers of an admin.
    #[command(alias = "ls")]
    List { admin_id: AccountId },
}

#[derive(Subcommand)]
pub enum StudentCommand {
    /// Register a student under an admin.
    Add {
        admin_id: AccountId,

        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        course: String,
    },

    /// List an admin's students with their token totals.
    #[command(alias = "ls")]
    List { admin_id: AccountId },

    /// Remove a student record. Usage history is kept.
    #[command(alias = "rm")]
    Delete { student_id: StudentId },
}

#[derive(Subcommand)]
pub enum UsageCommand {
    /// Charge tokens to an admin or teacher.
    Record {
        account_id: AccountId,

        /// Total tokens (use instead of --prompt/--completion).
        #[arg(long, conflicts_with_all = ["prompt", "completion"])]
        tokens: Option<u64>,

        #[arg(long)]
        prompt: Option<u64>,

        #[arg(long)]
        completion: Option<u64>,

        /// Student whose document was analyzed.
        #[arg(long)]
        student: Option<StudentId>,

        /// Document label.
        #[arg(long, default_value = "")]
        document: String,

        /// Refuse the charge if it would exceed the admin's limit.
        #[arg(long)]
        enforce: bool,
    },

    /// Log a student's analysis. Reported only; no budget is charged.
    Student {
        student_id: StudentId,

        #[arg(long, default_value_t = 0)]
        prompt: u64,

        #[arg(long, default_value_t = 0)]
        completion: u64,

        #[arg(long, default_value = "")]
        document: String,
    },

    /// Aggregated usage of an admin and its teachers.
    Show { admin_id: AccountId },
}
