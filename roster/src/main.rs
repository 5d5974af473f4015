//! `roster` entry-point: loads settings, wires adapters and runs one command.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use mockable::DefaultClock;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use roster::config::{RosterSettings, Settings};
use roster::domain::{
    LicenseAssignmentService, ProvisioningConfig, ProvisioningPorts, ProvisioningService,
    ReconciliationConfig, ReconciliationPorts, ReconciliationService,
};
use roster::inbound::cli::{CliArgs, Command, report};
use roster::outbound::credentials::OsPasswordGenerator;
use roster::outbound::files::{CsvLedger, CsvRegistrationSource, read_user_ids};
use roster::outbound::graph::GraphDirectoryClient;
use roster::outbound::smtp::ConfiguredNotifier;

fn main() -> Result<()> {
    color_eyre::install()?;
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build Tokio runtime")?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.json);
    if let Err(error) = dotenvy::dotenv() {
        if !error.not_found() {
            warn!(error = %error, ".env file could not be loaded");
        }
    }

    let mut settings = Settings::load()?;
    args.apply_overrides(&mut settings.roster);

    let (graph_settings, credentials) = settings.directory.resolve()?;
    let directory = Arc::new(
        GraphDirectoryClient::new(graph_settings, credentials, Arc::new(DefaultClock))
            .wrap_err("failed to build directory client")?,
    );

    let lines = match &args.command {
        Command::Reconcile(_) => {
            let engine = reconciliation_engine(directory, &settings)?;
            report::reconciliation_lines(&engine.run().await?)
        }
        Command::Ingest(_) => {
            let engine = reconciliation_engine(directory, &settings)?;
            report::ingest_lines(&engine.ingest().await?)
        }
        Command::Provision(_) => {
            let roster = &settings.roster;
            let notifier = notifier(&settings)?;
            let service = ProvisioningService::new(
                ProvisioningPorts {
                    directory,
                    notifier: Arc::new(notifier),
                    registrations: Arc::new(registration_source(roster)),
                    passwords: Arc::new(OsPasswordGenerator),
                },
                ProvisioningConfig {
                    organizational_domain: roster.organizational_domain()?,
                    branding: roster.branding()?,
                    license_skus: roster.license_skus()?,
                    enrollment_groups: roster.enrollment_groups()?,
                },
            );
            report::provisioning_lines(&service.provision().await?)
        }
        Command::AssignLicenses(assign) => {
            let user_ids = read_user_ids(&assign.user_ids)
                .await
                .wrap_err("failed to read user ids")?;
            let service =
                LicenseAssignmentService::new(directory, settings.roster.license_skus()?);
            report::license_lines(&service.assign(&user_ids).await?)
        }
    };

    for line in lines {
        println!("{line}");
    }
    Ok(())
}

type Engine =
    ReconciliationService<GraphDirectoryClient, ConfiguredNotifier, CsvLedger, CsvRegistrationSource>;

fn reconciliation_engine(directory: Arc<GraphDirectoryClient>, settings: &Settings) -> Result<Engine> {
    let roster = &settings.roster;
    let notifier = notifier(settings)?;
    let ports = ReconciliationPorts {
        directory,
        notifier: Arc::new(notifier),
        ledger: Arc::new(CsvLedger::new(roster.ledger_path())),
        registrations: Arc::new(registration_source(roster)),
    };
    let config = ReconciliationConfig {
        group_id: roster.learners_group()?,
        organizational_domain: roster.organizational_domain()?,
        branding: roster.branding()?,
    };
    Ok(ReconciliationService::new(ports, config))
}

fn notifier(settings: &Settings) -> Result<ConfiguredNotifier> {
    let relay = settings.smtp.relay()?;
    let notifier = ConfiguredNotifier::from_settings(relay.as_ref())
        .wrap_err("failed to build SMTP notifier")?;
    if !notifier.is_enabled() {
        info!("smtp settings absent; notifications are disabled");
    }
    Ok(notifier)
}

fn registration_source(roster: &RosterSettings) -> CsvRegistrationSource {
    CsvRegistrationSource::new(roster.late_registrations_path(), roster.intake_path())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = if json {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };
    if let Err(error) = result {
        warn!(error = %error, "tracing init failed");
    }
}
