//! edubudget CLI and REST API entry point.
//!
//! Binary name: `edb`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{AdminCommand, Cli, Commands, StudentCommand, TeacherCommand, UsageCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,edubudget_core=debug,edubudget_infra=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "edb", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;
    let json = cli.json;

    match cli.command {
        Commands::Admin { action } => match action {
            AdminCommand::Create { name, email, limit } => {
                cli::account::create_admin(&state, name, email, limit, json).await?;
            }
            AdminCommand::List => cli::account::list_admins(&state, json).await?,
            AdminCommand::SetLimit { admin_id, limit } => {
                cli::account::set_limit(&state, &admin_id, limit, json).await?;
            }
            AdminCommand::Delete { admin_id } => {
                cli::account::delete_admin(&state, &admin_id, json).await?;
            }
        },

        Commands::Teacher { action } => match action {
            TeacherCommand::Create {
                admin_id,
                name,
                email,
            } => {
                cli::account::create_teacher(&state, &admin_id, name, email, json).await?;
            }
            TeacherCommand::List { admin_id } => {
                cli::account::list_teachers(&state, &admin_id, json).await?;
            }
        },

        Commands::Student { action } => match action {
            StudentCommand::Add {
                admin_id,
                name,
                course,
            } => {
                cli::account::add_student(&state, &admin_id, name, course, json).await?;
            }
            StudentCommand::List { admin_id } => {
                cli::account::list_students(&state, &admin_id, json).await?;
            }
            StudentCommand::Delete { student_id } => {
                cli::account::delete_student(&state, &student_id, json).await?;
            }
        },

        Commands::Usage { action } => match action {
            UsageCommand::Record {
                account_id,
                tokens,
                prompt,
                completion,
                student,
                document,
                enforce,
            } => {
                cli::usage::record(
                    &state,
                    &account_id,
                    tokens,
                    prompt,
                    completion,
                    student,
                    document,
                    enforce,
                    json,
                )
                .await?;
            }
            UsageCommand::Student {
                student_id,
                prompt,
                completion,
                document,
            } => {
                cli::usage::record_student(&state, &student_id, prompt, completion, &document, json)
                    .await?;
            }
            UsageCommand::Show { admin_id } => cli::usage::show(&state, &admin_id, json).await?,
        },

        Commands::Check { account_id, tokens } => {
            cli::usage::check(&state, &account_id, tokens, json).await?;
        }

        Commands::Status { account_id } => match account_id {
            Some(account_id) => cli::status::account_status(&state, &account_id, json).await?,
            None => cli::status::dashboard(&state, json).await?,
        },

        Commands::Serve { port, host } => {
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                println!(
                    "  {} edubudget API listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }
            tracing::info!(%addr, "serving REST API");

            let router = http::router::build_router(state.clone());

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    state.db_pool.close().await;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
