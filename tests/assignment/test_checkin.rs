// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::common::*;
use field_dispatch_engine::{
    Actor, AssignmentStatus, CheckinKind, DispatchConfig, DispatchError, JobStatus,
};
use std::sync::Arc;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_checkin_at_job_site() {
        let h = Harness::new();
        let assignment = h.assigned("job-1", "agent-1").await;
        let mut rx = h.service.subscribe();

        let result = h
            .service
            .check_in(
                &Actor::agent("agent-1"),
                assignment.id,
                north_of(job_location(), 40.0),
            )
            .await
            .unwrap();
        assert!(result.location_verified);
        let distance = result.distance_meters.unwrap();
        assert!((distance - 40.0).abs() < 0.5, "got {}", distance);

        let row = h.service.assignment(assignment.id).await.unwrap();
        assert_eq!(row.status, AssignmentStatus::InProgress);
        assert_eq!(row.started_at, Some(epoch()));
        assert_eq!(h.bookings.status("job-1").await, Some(JobStatus::InProgress));
        assert_eq!(names(&drain(&mut rx)), vec!["job_started"]);

        let records = h.service.checkin_records(assignment.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, CheckinKind::Checkin);
        assert!(records[0].location_verified);
    }

    #[tokio::test]
    async fn test_checkin_outside_radius_changes_nothing() {
        let h = Harness::new();
        let assignment = h.assigned("job-1", "agent-1").await;

        let err = h
            .service
            .check_in(
                &Actor::agent("agent-1"),
                assignment.id,
                north_of(job_location(), 150.0),
            )
            .await
            .unwrap_err();

        match err {
            DispatchError::TooFarFromJob {
                distance_meters,
                max_distance,
            } => {
                assert!((distance_meters - 150.0).abs() < 0.5, "got {}", distance_meters);
                assert_eq!(max_distance, 100.0);
            }
            other => panic!("expected TooFarFromJob, got {:?}", other),
        }

        assert_eq!(h.service.assignment(assignment.id).await.unwrap(), assignment);
        assert!(h.service.checkin_records(assignment.id).await.unwrap().is_empty());
        assert_eq!(h.bookings.status("job-1").await, Some(JobStatus::Assigned));
    }

    #[tokio::test]
    async fn test_checkin_radius_is_configurable() {
        let config = DispatchConfig {
            checkin_radius_meters: 200.0,
            ..DispatchConfig::default()
        };
        let h = Harness::with_config(config);
        let assignment = h.assigned("job-1", "agent-1").await;

        let result = h
            .service
            .check_in(
                &Actor::agent("agent-1"),
                assignment.id,
                north_of(job_location(), 150.0),
            )
            .await
            .unwrap();
        assert!(result.location_verified);
    }

    #[tokio::test]
    async fn test_checkin_without_job_location_is_trusted() {
        let h = Harness::new();
        let mut unlocated = job("job-1");
        unlocated.location = None;
        h.add_job(unlocated).await;
        h.add_agent(agent("agent-1", 0)).await;
        let assignment = h
            .service
            .claim_job(&Actor::agent("agent-1"), "job-1", "agent-1")
            .await
            .unwrap();

        let result = h
            .service
            .check_in(
                &Actor::agent("agent-1"),
                assignment.id,
                north_of(job_location(), 50_000.0),
            )
            .await
            .unwrap();
        assert!(result.location_verified);
        assert_eq!(result.distance_meters, None);

        let records = h.service.checkin_records(assignment.id).await.unwrap();
        assert_eq!(records[0].distance_meters, None);
    }

    #[tokio::test]
    async fn test_checkin_at_located_job_records_measured_position() {
        let h = Harness::new();
        let assignment = h.assigned("job-1", "agent-1").await;
        let reported = north_of(job_location(), 10.0);

        let result = h
            .service
            .check_in(&Actor::agent("agent-1"), assignment.id, reported)
            .await
            .unwrap();
        assert!(result.location_verified);
        assert!(result.distance_meters.is_some());

        let records = h.service.checkin_records(assignment.id).await.unwrap();
        assert_eq!(records[0].location, reported);
        assert!((records[0].distance_meters.unwrap() - 10.0).abs() < 0.5);
    }

    #[tokio::test]
    async fn test_second_checkin_is_refused() {
        let h = Harness::new();
        let assignment = h.in_progress("job-1", "agent-1").await;

        let err = h
            .service
            .check_in(&Actor::agent("agent-1"), assignment.id, job_location())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::AlreadyCheckedIn);
        assert_eq!(h.service.checkin_records(assignment.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_checkin_by_other_agent_is_refused() {
        let h = Harness::new();
        let assignment = h.assigned("job-1", "agent-1").await;

        let err = h
            .service
            .check_in(&Actor::agent("agent-2"), assignment.id, job_location())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::NotYourJob);

        assert!(matches!(
            h.service
                .check_in(&Actor::admin("admin-1"), assignment.id, job_location())
                .await,
            Err(DispatchError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_checkin_on_cancelled_assignment() {
        let h = Harness::new();
        let assignment = h.assigned("job-1", "agent-1").await;
        h.service
            .cancel(&Actor::admin("admin-1"), assignment.id, "duplicate booking")
            .await
            .unwrap();

        let err = h
            .service
            .check_in(&Actor::agent("agent-1"), assignment.id, job_location())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::InvalidStatus {
                current: AssignmentStatus::Cancelled,
                operation: "check in",
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_checkins_record_once() {
        let h = Arc::new(Harness::new());
        let assignment = h.assigned("job-1", "agent-1").await;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let h = h.clone();
                tokio::spawn(async move {
                    h.service
                        .check_in(&Actor::agent("agent-1"), assignment.id, job_location())
                        .await
                })
            })
            .collect();

        let results: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for err in results.into_iter().filter_map(|r| r.err()) {
            assert!(
                matches!(
                    err,
                    DispatchError::AlreadyCheckedIn | DispatchError::InvalidStatus { .. }
                ),
                "unexpected {:?}",
                err
            );
        }
        assert_eq!(h.service.checkin_records(assignment.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_outside_geofence_is_flagged_not_blocked() {
        let h = Harness::new();
        let assignment = h.in_progress("job-1", "agent-1").await;
        h.upload_both_proofs("agent-1", assignment.id).await;

        let result = h
            .service
            .check_out(
                &Actor::agent("agent-1"),
                assignment.id,
                north_of(job_location(), 2_000.0),
            )
            .await
            .unwrap();
        assert!(!result.location_verified);

        let row = h.service.assignment(assignment.id).await.unwrap();
        assert_eq!(row.status, AssignmentStatus::PendingVerification);
        assert!(row.checked_out_at.is_some());

        let records = h.service.checkin_records(assignment.id).await.unwrap();
        let checkout = records
            .iter()
            .find(|r| r.kind == CheckinKind::Checkout)
            .unwrap();
        assert!(!checkout.location_verified);
        assert!(checkout.distance_meters.unwrap() > 1_900.0);
    }

    #[tokio::test]
    async fn test_checkout_requires_in_progress() {
        let h = Harness::new();
        let assignment = h.assigned("job-1", "agent-1").await;

        let err = h
            .service
            .check_out(&Actor::agent("agent-1"), assignment.id, job_location())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::InvalidStatus {
                current: AssignmentStatus::Assigned,
                operation: "check out",
            }
        );
    }
}
