//! Domain primitives, ports and services.
//!
//! Purpose: keep participant, directory and ledger semantics independent of
//! Microsoft Graph, SMTP and the file system. Adapters live under
//! `crate::outbound` and plug in through [`ports`].
//!
//! Public surface:
//! - [`ReconciliationService`]: the six-phase membership reconciliation pass.
//! - [`ProvisioningService`]: intake-driven account creation.
//! - [`LicenseAssignmentService`]: bulk license assignment.
//! - [`ParticipantLedger`]: dedup-aware ledger session.

pub mod directory;
pub mod error;
pub mod license_assignment;
pub mod licenses;
pub mod notifications;
pub mod participant;
pub mod participant_ledger;
pub mod ports;
pub mod provisioning;
pub mod reconciliation;

pub use self::directory::{
    DeleteOutcome, DirectoryAccount, DirectoryMember, DirectoryObjectId, DirectoryObjectKind,
    DirectoryValidationError, GroupId, MembershipSnapshot, NewAccount, TemporaryPassword,
    UserFilter,
};
pub use self::error::{Error, ErrorCode};
pub use self::license_assignment::{LicenseAssignmentReport, LicenseAssignmentService};
pub use self::licenses::{SkuId, SkuResolutionError};
pub use self::notifications::{DEFAULT_SURNAME, EventBranding, SIGN_IN_URL};
pub use self::participant::{
    EmailAddress, OrganizationalDomain, ParticipantRecord, ParticipantValidationError,
    UNKNOWN_DISPLAY_NAME, UserPrincipalName,
};
pub use self::participant_ledger::{AppendOutcome, ParticipantLedger};
pub use self::provisioning::{
    EnrollmentTally, ProvisioningConfig, ProvisioningPorts, ProvisioningReport,
    ProvisioningResult, ProvisioningService, ProvisioningStatus, SkipReason, StepOutcome,
};
pub use self::reconciliation::{
    Phase, ReconciliationConfig, ReconciliationPorts, ReconciliationReport,
    ReconciliationService, RecordFailure,
};
