// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::common::*;
use field_dispatch_engine::{Actor, AssignmentStatus, DispatchError, ProofKind};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_checkout_without_proofs_lists_both_missing() {
        let h = Harness::new();
        let assignment = h.in_progress("job-1", "agent-1").await;

        let err = h
            .service
            .check_out(&Actor::agent("agent-1"), assignment.id, job_location())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::ProofIncomplete {
                missing: vec![ProofKind::Box, ProofKind::Finished]
            }
        );
        assert_eq!(
            h.service.assignment(assignment.id).await.unwrap().status,
            AssignmentStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_checkout_with_one_proof_lists_the_other() {
        let h = Harness::new();
        let assignment = h.in_progress("job-1", "agent-1").await;
        let agent = Actor::agent("agent-1");

        h.service
            .submit_proof(&agent, assignment.id, ProofKind::Box, "https://media.example/before.jpg", None)
            .await
            .unwrap();

        let err = h
            .service
            .check_out(&agent, assignment.id, job_location())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::ProofIncomplete {
                missing: vec![ProofKind::Finished]
            }
        );

        h.service
            .submit_proof(
                &agent,
                assignment.id,
                ProofKind::Finished,
                "https://media.example/after.jpg",
                Some("sealed the grout".to_string()),
            )
            .await
            .unwrap();
        h.service
            .check_out(&agent, assignment.id, job_location())
            .await
            .unwrap();
        assert_eq!(
            h.service.assignment(assignment.id).await.unwrap().status,
            AssignmentStatus::PendingVerification
        );
    }

    #[tokio::test]
    async fn test_reupload_replaces_active_reference() {
        let h = Harness::new();
        let assignment = h.in_progress("job-1", "agent-1").await;
        let agent = Actor::agent("agent-1");

        for url in ["https://media.example/blurry.jpg", "https://media.example/sharp.jpg"] {
            h.service
                .submit_proof(&agent, assignment.id, ProofKind::Box, url, None)
                .await
                .unwrap();
        }

        let proofs = h.service.proofs(assignment.id).await.unwrap();
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].photo_url, "https://media.example/sharp.jpg");
        assert!(!h.service.ledger().proofs().is_complete(assignment.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_proof_before_checkin_is_refused() {
        let h = Harness::new();
        let assignment = h.assigned("job-1", "agent-1").await;

        let err = h
            .service
            .submit_proof(
                &Actor::agent("agent-1"),
                assignment.id,
                ProofKind::Box,
                "https://media.example/before.jpg",
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::InvalidStatus {
                current: AssignmentStatus::Assigned,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_proof_validation_and_ownership() {
        let h = Harness::new();
        let assignment = h.in_progress("job-1", "agent-1").await;

        assert!(matches!(
            h.service
                .submit_proof(&Actor::agent("agent-1"), assignment.id, ProofKind::Box, "  ", None)
                .await,
            Err(DispatchError::InvalidInput(_))
        ));
        assert_eq!(
            h.service
                .submit_proof(
                    &Actor::agent("agent-2"),
                    assignment.id,
                    ProofKind::Box,
                    "https://media.example/x.jpg",
                    None
                )
                .await
                .unwrap_err(),
            DispatchError::NotYourJob
        );
        assert!(h.service.proofs(assignment.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_keeps_proofs_and_allows_fresh_checkout() {
        let h = Harness::new();
        let assignment = h.pending_verification("job-1", "agent-1").await;
        let admin = Actor::admin("admin-1");
        let agent = Actor::agent("agent-1");

        let rejected = h
            .service
            .reject(&admin, assignment.id, Some("finished photo is cropped".to_string()))
            .await
            .unwrap();
        assert_eq!(rejected.status, AssignmentStatus::InProgress);
        assert_eq!(rejected.rejection_count, 1);
        assert_eq!(h.service.proofs(assignment.id).await.unwrap().len(), 2);

        // No re-upload needed
        h.service
            .check_out(&agent, assignment.id, job_location())
            .await
            .unwrap();

        let records = h.service.checkin_records(assignment.id).await.unwrap();
        assert_eq!(records.len(), 3);

        let verified = h.service.verify(&admin, assignment.id, None).await.unwrap();
        assert_eq!(verified.status, AssignmentStatus::Verified);
        assert_eq!(verified.rejection_count, 1);
    }
}
