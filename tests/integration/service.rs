// SPDX-License-Identifier: Apache-2.0 OR MIT
//! The membership service shared by concurrent tasks.

use amt_membership::logging::Logger;
use amt_membership::transform::{IgmpQueryTransform, IgmpReportTransform, MembershipToQuery, Transform};
use amt_membership::{FilterMode, Igmp, MembershipQuery, MembershipService, ServiceError};
use std::net::Ipv4Addr;
use std::time::Duration;

fn group(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(232, 1, 1, last)
}

#[tokio::test]
async fn test_join_leave_from_many_tasks() {
    let (handle, task) = MembershipService::spawn(Logger::discard());

    let mut tasks = Vec::new();
    for i in 1..=10u8 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            handle.join(group(i)).await?;
            if i % 2 == 0 {
                handle.leave(group(i)).await?;
            }
            Ok::<_, ServiceError>(())
        }));
    }
    for t in tasks {
        t.await.unwrap().unwrap();
    }

    let report = handle.current_state().await.unwrap();
    assert_eq!(report.len(), 5);
    for record in report.records() {
        assert_eq!(record.group.octets()[3] % 2, 1);
    }

    drop(handle);
    let table = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(table.len(), 5);
}

#[tokio::test]
async fn test_racing_joins_of_one_group() {
    let (handle, _task) = MembershipService::spawn(Logger::discard());

    let a = tokio::spawn({
        let handle = handle.clone();
        async move { handle.join(group(1)).await }
    });
    let b = tokio::spawn({
        let handle = handle.clone();
        async move { handle.join(group(1)).await }
    });
    let results = [a.await.unwrap(), b.await.unwrap()];

    // exactly one wins; the other sees the state the first one left
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(r, Err(ServiceError::Filter(_)))));

    let filter = handle.filter(group(1)).await.unwrap().unwrap();
    assert_eq!(filter.mode(), FilterMode::Exclude);
}

#[tokio::test]
async fn test_query_answered_through_service() {
    let (handle, _task) = MembershipService::spawn(Logger::discard());
    handle
        .join_source(group(1), Ipv4Addr::new(10, 0, 0, 1))
        .await
        .unwrap();

    let packet = MembershipToQuery::<Igmp>::default()
        .transform(&MembershipQuery::new(group(1), 100))
        .unwrap();
    let query = IgmpQueryTransform::default().transform(&packet).unwrap();

    let answer = handle.respond_to(query).await.unwrap().unwrap();
    let report = IgmpReportTransform::default().transform(&answer).unwrap();
    assert!(report.has_router_alert());

    let unknown = MembershipQuery::new(group(2), 100);
    assert!(handle.respond_to(unknown).await.unwrap().is_none());
}

#[tokio::test]
async fn test_handle_after_shutdown() {
    let (handle, task) = MembershipService::<Ipv4Addr>::spawn(Logger::discard());
    task.abort();
    let _ = task.await;
    assert_eq!(handle.join(group(1)).await, Err(ServiceError::Closed));
}
