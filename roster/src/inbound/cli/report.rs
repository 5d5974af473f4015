//! Plain-text rendering of run reports as `key=value` lines.

use crate::domain::{
    LicenseAssignmentReport, ProvisioningReport, ProvisioningStatus, ReconciliationReport,
    StepOutcome,
};

/// Lines describing a reconciliation pass: per-phase counters followed by one
/// line per recorded failure.
pub fn reconciliation_lines(report: &ReconciliationReport) -> Vec<String> {
    let ingest = &report.ingest;
    let notify = &report.notify;
    let group = &report.retire_group;
    let tenant = &report.retire_tenant;
    let sweep = &report.retire_ledger;
    let late = &report.late_registrations;

    let mut lines = vec![
        format!("run_id={}", report.run_id),
        format!(
            "ingest members_seen={} added={} already_known={} skipped_without_email={} failed={}",
            ingest.members_seen,
            ingest.added,
            ingest.already_known,
            ingest.skipped_without_email,
            ingest.failed
        ),
        format!("notify sent={} failed={}", notify.sent, notify.failed),
        format!(
            "retire_group removed={} already_absent={} held_back={} failed={}",
            group.removed, group.already_absent, group.held_back, group.failed
        ),
        format!(
            "retire_tenant deleted={} not_found={} skipped_non_user={} held_back={} failed={}",
            tenant.deleted, tenant.not_found, tenant.skipped_non_user, tenant.held_back, tenant.failed
        ),
        format!(
            "retire_ledger participants_seen={} deleted={} no_match={} failed={}",
            sweep.participants_seen, sweep.deleted, sweep.no_match, sweep.failed
        ),
        format!(
            "late_registrations seen={} added={} already_known={} emailed={} removed_from_group={} removed_from_tenant={} failed={}",
            late.registrations_seen,
            late.added,
            late.already_known,
            late.emailed,
            late.removed_from_group,
            late.removed_from_tenant,
            late.failed
        ),
    ];
    lines.extend(report.failures.iter().map(|failure| {
        format!(
            "failure phase={} subject={} reason={}",
            failure.phase, failure.subject, failure.reason
        )
    }));
    lines
}

/// Lines describing an ingest-only pass.
pub fn ingest_lines(report: &ReconciliationReport) -> Vec<String> {
    reconciliation_lines(report)
        .into_iter()
        .enumerate()
        .filter(|(index, line)| *index < 2 || line.starts_with("failure "))
        .map(|(_, line)| line)
        .collect()
}

/// Lines describing a provisioning run: one per intake row, then enrollment
/// counts per group.
pub fn provisioning_lines(report: &ProvisioningReport) -> Vec<String> {
    let mut lines = vec![
        format!("run_id={}", report.run_id),
        format!(
            "rows={} created={} skipped={} error={}",
            report.results.len(),
            report.count("created"),
            report.count("skipped"),
            report.count("error")
        ),
    ];
    for result in &report.results {
        let email = result.email.as_deref().unwrap_or("-");
        let upn = result
            .user_principal_name
            .as_ref()
            .map_or("-", |upn| upn.as_str());
        let detail = match &result.status {
            ProvisioningStatus::Created {
                user_id,
                licenses,
                welcome_email,
            } => format!(
                "user_id={user_id} licenses={} welcome_email={}",
                step_label(licenses),
                step_label(welcome_email)
            ),
            ProvisioningStatus::Skipped { user_id, .. } => format!(
                "reason=exists user_id={}",
                user_id.as_ref().map_or("-", |id| id.as_str())
            ),
            ProvisioningStatus::Error { message } => format!("reason={message}"),
        };
        lines.push(format!(
            "row={} email={email} upn={upn} status={} {detail}",
            result.row,
            result.status.label()
        ));
    }
    for enrollment in &report.enrollments {
        lines.push(format!(
            "enrollment group_id={} added={} failed={}",
            enrollment.group_id,
            enrollment.added,
            enrollment.failed.len()
        ));
        lines.extend(enrollment.failed.iter().map(|(user_id, reason)| {
            format!(
                "enrollment_failure group_id={} user_id={user_id} reason={reason}",
                enrollment.group_id
            )
        }));
    }
    lines
}

/// Lines describing a license assignment run.
pub fn license_lines(report: &LicenseAssignmentReport) -> Vec<String> {
    let mut lines = vec![format!(
        "succeeded={} failed={}",
        report.succeeded.len(),
        report.failed.len()
    )];
    lines.extend(
        report
            .succeeded
            .iter()
            .map(|user_id| format!("assigned user_id={user_id}")),
    );
    lines.extend(
        report
            .failed
            .iter()
            .map(|(user_id, reason)| format!("failed user_id={user_id} reason={reason}")),
    );
    lines
}

fn step_label(step: &StepOutcome) -> String {
    match step {
        StepOutcome::Done => "done".to_owned(),
        StepOutcome::Skipped => "skipped".to_owned(),
        StepOutcome::Failed(reason) => format!("failed({reason})"),
    }
}
