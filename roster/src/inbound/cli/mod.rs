//! Command-line surface.
//!
//! Arguments select a command and override file paths or the group id taken
//! from the environment. Rendering of run reports lives in [`report`].

pub mod report;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::RosterSettings;

/// `roster` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "roster",
    about = "Reconcile event participants across the directory, its learners group and the participant ledger",
    version
)]
pub struct CliArgs {
    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub json: bool,
    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run every reconciliation phase: ingest, notify, retire and late intake.
    Reconcile(ReconcileArgs),
    /// Merge the group roster into the ledger without side effects elsewhere.
    Ingest(ReconcileArgs),
    /// Create accounts for the rows of the intake file.
    Provision(ProvisionArgs),
    /// Assign the configured licenses to a list of user ids.
    AssignLicenses(AssignLicensesArgs),
}

/// Overrides shared by `reconcile` and `ingest`.
#[derive(Debug, Clone, Default, Args)]
pub struct ReconcileArgs {
    /// Group whose roster is reconciled.
    #[arg(long = "group-id", value_name = "id")]
    pub group_id: Option<String>,
    /// Participant ledger CSV.
    #[arg(long = "ledger", value_name = "path")]
    pub ledger_path: Option<PathBuf>,
    /// Late registrations CSV.
    #[arg(long = "late-registrations", value_name = "path")]
    pub late_registrations_path: Option<PathBuf>,
}

/// Overrides for `provision`.
#[derive(Debug, Clone, Default, Args)]
pub struct ProvisionArgs {
    /// Provisioning intake CSV.
    #[arg(long = "intake", value_name = "path")]
    pub intake_path: Option<PathBuf>,
    /// Learners group the new accounts are enrolled in.
    #[arg(long = "group-id", value_name = "id")]
    pub group_id: Option<String>,
}

/// Input for `assign-licenses`.
#[derive(Debug, Clone, Args)]
pub struct AssignLicensesArgs {
    /// File with one directory user id per line.
    #[arg(long = "user-ids", value_name = "path")]
    pub user_ids: PathBuf,
}

impl CliArgs {
    /// Apply command-line overrides on top of environment settings.
    pub fn apply_overrides(&self, settings: &mut RosterSettings) {
        match &self.command {
            Command::Reconcile(args) | Command::Ingest(args) => {
                override_with(&mut settings.learners_group_id, &args.group_id);
                override_with(&mut settings.ledger_path, &args.ledger_path);
                override_with(
                    &mut settings.late_registrations_path,
                    &args.late_registrations_path,
                );
            }
            Command::Provision(args) => {
                override_with(&mut settings.intake_path, &args.intake_path);
                override_with(&mut settings.learners_group_id, &args.group_id);
            }
            Command::AssignLicenses(_) => {}
        }
    }
}

fn override_with<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if let Some(value) = value {
        *slot = Some(value.clone());
    }
}
