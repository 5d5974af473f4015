//! Process configuration loaded via OrthoConfig.
//!
//! Three settings sections are layered from the environment (after an
//! optional `.env`) and then validated into typed values. Validation failures
//! surface as [`ConfigError`] before any directory call is made.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;
use zeroize::Zeroizing;

use crate::domain::{EmailAddress, EventBranding, GroupId, OrganizationalDomain, SkuId};
use crate::outbound::graph::{ClientCredentials, GraphClientSettings};
use crate::outbound::smtp::SmtpRelaySettings;

const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/v1.0";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_ORGANIZATIONAL_DOMAIN: &str = "aiskillsfest.net";
const DEFAULT_LEDGER_PATH: &str = "./data/Participants.csv";
const DEFAULT_LATE_REGISTRATIONS_PATH: &str = "./data/subscriberShorts.csv";
const DEFAULT_INTAKE_PATH: &str = "./data/registered.csv";
const DEFAULT_ADMIN_CC: &str = "admins@aiskillsfest.net";
const DEFAULT_EVENT_NAME: &str = "AI Skills Fest";
const DEFAULT_EVENT_URL: &str = "https://aiskillsfest.com";
const DEFAULT_LICENSE_SKUS: &str = "MICROSOFT_COPILOT_STUDIO_VIRAL_TRIAL,MICROSOFT_POWER_APPS_DEV";

/// Configuration failures. All of them are fatal and raised before any phase
/// runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is absent or blank.
    #[error("missing required setting {name}")]
    Missing {
        /// Environment variable name.
        name: &'static str,
    },
    /// A setting is present but unusable.
    #[error("invalid setting {name}: {reason}")]
    Invalid {
        /// Environment variable name.
        name: &'static str,
        /// Why the value was refused.
        reason: String,
    },
    /// Some SMTP settings are present but not all of them.
    #[error("incomplete SMTP settings: missing {missing}")]
    IncompleteSmtp {
        /// Comma-separated names of the absent variables.
        missing: String,
    },
    /// A settings section could not be loaded at all.
    #[error("failed to load {section} settings: {message}")]
    Load {
        /// Section that failed.
        section: &'static str,
        /// Loader error text.
        message: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl ToString) -> Self {
        Self::Invalid {
            name,
            reason: reason.to_string(),
        }
    }
}

/// App registration and Graph endpoints.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "AZURE")]
pub struct DirectorySettings {
    /// Directory tenant id.
    pub tenant_id: Option<String>,
    /// Application (client) id.
    pub client_id: Option<String>,
    /// Application secret.
    pub client_secret: Option<String>,
    /// Identity platform authority host.
    pub authority_host: Option<String>,
    /// Graph API root including the version segment.
    pub graph_endpoint: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
}

impl DirectorySettings {
    /// Validate into adapter settings and credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] for an absent tenant, client id or
    /// secret, and [`ConfigError::Invalid`] for malformed URLs or a zero
    /// timeout.
    pub fn resolve(&self) -> Result<(GraphClientSettings, ClientCredentials), ConfigError> {
        let tenant_id = required(self.tenant_id.as_deref(), "AZURE_TENANT_ID")?;
        let client_id = required(self.client_id.as_deref(), "AZURE_CLIENT_ID")?;
        let client_secret = required(self.client_secret.as_deref(), "AZURE_CLIENT_SECRET")?;

        let timeout_secs = self
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "AZURE_REQUEST_TIMEOUT_SECS",
                "timeout must be at least one second",
            ));
        }

        let settings = GraphClientSettings {
            graph_endpoint: parse_url(
                self.graph_endpoint.as_deref(),
                DEFAULT_GRAPH_ENDPOINT,
                "AZURE_GRAPH_ENDPOINT",
            )?,
            authority_host: parse_url(
                self.authority_host.as_deref(),
                DEFAULT_AUTHORITY_HOST,
                "AZURE_AUTHORITY_HOST",
            )?,
            timeout: Duration::from_secs(timeout_secs),
        };
        let credentials = ClientCredentials {
            tenant_id: tenant_id.to_owned(),
            client_id: client_id.to_owned(),
            client_secret: Zeroizing::new(client_secret.to_owned()),
        };
        Ok((settings, credentials))
    }
}

/// Submission relay used for participant mail.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SMTP")]
pub struct SmtpSettings {
    /// Relay host.
    pub server: Option<String>,
    /// Relay port.
    pub port: Option<u16>,
    /// Sender address and login.
    pub email: Option<String>,
    /// Login password.
    pub password: Option<String>,
}

impl SmtpSettings {
    /// Validate into relay settings. `Ok(None)` means mail is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IncompleteSmtp`] when only some of the server,
    /// email and password are set, and [`ConfigError::Invalid`] for an
    /// unusable sender address.
    pub fn relay(&self) -> Result<Option<SmtpRelaySettings>, ConfigError> {
        let server = present(self.server.as_deref());
        let email = present(self.email.as_deref());
        let password = present(self.password.as_deref());

        let (server, email, password) = match (server, email, password) {
            (None, None, None) if self.port.is_none() => return Ok(None),
            (Some(server), Some(email), Some(password)) => (server, email, password),
            (server, email, password) => {
                let missing = [
                    ("SMTP_SERVER", server.is_none()),
                    ("SMTP_EMAIL", email.is_none()),
                    ("SMTP_PASSWORD", password.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect::<Vec<_>>()
                .join(", ");
                return Err(ConfigError::IncompleteSmtp { missing });
            }
        };

        let sender =
            EmailAddress::parse(email).map_err(|error| ConfigError::invalid("SMTP_EMAIL", error))?;
        Ok(Some(SmtpRelaySettings {
            server: server.to_owned(),
            port: self.port.unwrap_or(DEFAULT_SMTP_PORT),
            sender,
            password: Zeroizing::new(password.to_owned()),
        }))
    }
}

/// Event, group and file settings.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "AISKILLSFEST")]
pub struct RosterSettings {
    /// Group whose roster is reconciled and into which accounts are enrolled.
    pub learners_group_id: Option<String>,
    /// Optional second enrollment group.
    pub sharepoint_group_id: Option<String>,
    /// Domain appended to derived user principal names.
    pub organizational_domain: Option<String>,
    /// Participant ledger CSV.
    pub ledger_path: Option<PathBuf>,
    /// Late registrations CSV.
    pub late_registrations_path: Option<PathBuf>,
    /// Provisioning intake CSV.
    pub intake_path: Option<PathBuf>,
    /// Organiser mailbox copied on every message.
    pub admin_cc: Option<String>,
    /// Event name used in mail subjects.
    pub event_name: Option<String>,
    /// Public event site.
    pub event_url: Option<String>,
    /// Comma-separated license names or SKU GUIDs.
    pub license_skus: Option<String>,
}

impl RosterSettings {
    /// The learners group.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when unset.
    pub fn learners_group(&self) -> Result<GroupId, ConfigError> {
        let raw = required(
            self.learners_group_id.as_deref(),
            "AISKILLSFEST_LEARNERS_GROUP_ID",
        )?;
        GroupId::parse(raw)
            .map_err(|error| ConfigError::invalid("AISKILLSFEST_LEARNERS_GROUP_ID", error))
    }

    /// Every configured enrollment group, learners first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unusable group id.
    pub fn enrollment_groups(&self) -> Result<Vec<GroupId>, ConfigError> {
        [
            (
                self.learners_group_id.as_deref(),
                "AISKILLSFEST_LEARNERS_GROUP_ID",
            ),
            (
                self.sharepoint_group_id.as_deref(),
                "AISKILLSFEST_SHAREPOINT_GROUP_ID",
            ),
        ]
        .into_iter()
        .filter_map(|(raw, name)| present(raw).map(|raw| (raw, name)))
        .map(|(raw, name)| GroupId::parse(raw).map_err(|error| ConfigError::invalid(name, error)))
        .collect()
    }

    /// Domain for derived user principal names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a malformed domain.
    pub fn organizational_domain(&self) -> Result<OrganizationalDomain, ConfigError> {
        let raw = present(self.organizational_domain.as_deref())
            .unwrap_or(DEFAULT_ORGANIZATIONAL_DOMAIN);
        OrganizationalDomain::parse(raw)
            .map_err(|error| ConfigError::invalid("AISKILLSFEST_ORGANIZATIONAL_DOMAIN", error))
    }

    /// Mail branding.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unusable admin address.
    pub fn branding(&self) -> Result<EventBranding, ConfigError> {
        let admin_cc = present(self.admin_cc.as_deref()).unwrap_or(DEFAULT_ADMIN_CC);
        Ok(EventBranding {
            event_name: present(self.event_name.as_deref())
                .unwrap_or(DEFAULT_EVENT_NAME)
                .to_owned(),
            event_url: present(self.event_url.as_deref())
                .unwrap_or(DEFAULT_EVENT_URL)
                .to_owned(),
            admin_cc: EmailAddress::parse(admin_cc)
                .map_err(|error| ConfigError::invalid("AISKILLSFEST_ADMIN_CC", error))?,
        })
    }

    /// License SKUs to assign.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unknown names or an empty list.
    pub fn license_skus(&self) -> Result<Vec<SkuId>, ConfigError> {
        let raw = present(self.license_skus.as_deref()).unwrap_or(DEFAULT_LICENSE_SKUS);
        SkuId::resolve_list(raw)
            .map_err(|error| ConfigError::invalid("AISKILLSFEST_LICENSE_SKUS", error))
    }

    /// Ledger CSV path.
    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_PATH))
    }

    /// Late registrations CSV path.
    pub fn late_registrations_path(&self) -> PathBuf {
        self.late_registrations_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LATE_REGISTRATIONS_PATH))
    }

    /// Intake CSV path.
    pub fn intake_path(&self) -> PathBuf {
        self.intake_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INTAKE_PATH))
    }
}

/// All three settings sections.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Graph access.
    pub directory: DirectorySettings,
    /// Mail relay.
    pub smtp: SmtpSettings,
    /// Event, groups and files.
    pub roster: RosterSettings,
}

impl Settings {
    /// Load every section from the environment.
    ///
    /// Command-line arguments are parsed separately, so each section sees only
    /// the program name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] naming the section that failed.
    pub fn load() -> Result<Self, ConfigError> {
        let program = || [OsString::from("roster")];
        Ok(Self {
            directory: DirectorySettings::load_from_iter(program()).map_err(|error| {
                ConfigError::Load {
                    section: "directory",
                    message: error.to_string(),
                }
            })?,
            smtp: SmtpSettings::load_from_iter(program()).map_err(|error| ConfigError::Load {
                section: "smtp",
                message: error.to_string(),
            })?,
            roster: RosterSettings::load_from_iter(program()).map_err(|error| {
                ConfigError::Load {
                    section: "roster",
                    message: error.to_string(),
                }
            })?,
        })
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

fn required<'a>(raw: Option<&'a str>, name: &'static str) -> Result<&'a str, ConfigError> {
    present(raw).ok_or(ConfigError::Missing { name })
}

fn parse_url(raw: Option<&str>, default: &str, name: &'static str) -> Result<Url, ConfigError> {
    let raw = present(raw).unwrap_or(default);
    Url::parse(raw).map_err(|error| ConfigError::invalid(name, error))
}
