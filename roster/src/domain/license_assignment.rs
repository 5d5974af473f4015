//! Bulk license assignment for existing accounts.

use std::sync::Arc;

use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use super::Error;
use super::directory::DirectoryObjectId;
use super::licenses::SkuId;
use super::ports::DirectoryClient;

/// Outcome of a bulk assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LicenseAssignmentReport {
    /// Accounts that received every SKU.
    pub succeeded: Vec<DirectoryObjectId>,
    /// Accounts that did not, with reasons.
    pub failed: Vec<(DirectoryObjectId, String)>,
}

/// Assigns a fixed SKU set to accounts one at a time, in order.
pub struct LicenseAssignmentService<D> {
    directory: Arc<D>,
    skus: Vec<SkuId>,
}

impl<D: DirectoryClient> LicenseAssignmentService<D> {
    /// Create the service.
    pub fn new(directory: Arc<D>, skus: Vec<SkuId>) -> Self {
        Self { directory, skus }
    }

    /// Assign the configured SKUs to every account.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidRequest`](super::ErrorCode) when no SKUs
    /// are configured. Per-account failures are reported, not raised.
    pub async fn assign(
        &self,
        user_ids: &[DirectoryObjectId],
    ) -> Result<LicenseAssignmentReport, Error> {
        if self.skus.is_empty() {
            return Err(Error::invalid_request("no license SKUs configured"));
        }
        let span = info_span!("license_assignment", run_id = %Uuid::new_v4(), skus = self.skus.len());
        async move {
            let mut report = LicenseAssignmentReport::default();
            for user_id in user_ids {
                match self.directory.assign_licenses(user_id, &self.skus).await {
                    Ok(()) => {
                        info!(user_id = %user_id, "licenses assigned");
                        report.succeeded.push(user_id.clone());
                    }
                    Err(error) => {
                        warn!(user_id = %user_id, error = %error, "license assignment failed");
                        report.failed.push((user_id.clone(), error.to_string()));
                    }
                }
            }
            Ok(report)
        }
        .instrument(span)
        .await
    }
}
