//! Concurrent identity resolution against a file-backed database

mod helpers;

use std::collections::HashSet;

use crn_common::reputation::Severity;
use crn_net::db::identities;
use crn_net::services::{IdentityResolver, ReputationAggregator};
use helpers::{count, file_pool};
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolves_create_one_identity() {
    let (pool, _dir) = file_pool().await;
    let resolver = IdentityResolver::new(pool.clone());

    let mut join_set = JoinSet::new();
    for i in 0..8 {
        let resolver = resolver.clone();
        join_set.spawn(async move {
            let business = format!("biz-{}", i % 3);
            resolver
                .resolve_contact(Some("+1 (555) 123-4567"), None, Some(&business))
                .await
        });
    }

    let mut ids = HashSet::new();
    let mut created = 0;
    while let Some(result) = join_set.join_next().await {
        let resolved = result.unwrap().unwrap();
        if resolved.created {
            created += 1;
        }
        ids.insert(resolved.identity_id);
    }

    assert_eq!(ids.len(), 1);
    assert_eq!(created, 1);
    assert_eq!(count(&pool, "network_identities").await, 1);

    let id = ids.into_iter().next().unwrap();
    let identity = identities::find_by_id(&pool, &id).await.unwrap().unwrap();
    assert_eq!(identity.seen_by_business_count, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_events_are_all_counted() {
    let (pool, _dir) = file_pool().await;
    let resolved = IdentityResolver::new(pool.clone())
        .resolve_contact(None, Some("pat@example.com"), None)
        .await
        .unwrap();
    let aggregator = ReputationAggregator::new(pool.clone());
    let severity = Severity::new(3).unwrap();

    let mut join_set = JoinSet::new();
    for _ in 0..6 {
        let aggregator = aggregator.clone();
        let id = resolved.identity_id.clone();
        join_set.spawn(async move { aggregator.apply_event(&id, severity).await });
    }
    while let Some(result) = join_set.join_next().await {
        result.unwrap().unwrap();
    }

    let identity = identities::find_by_id(&pool, &resolved.identity_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(identity.total_incidents, 6);
    assert_eq!(count(&pool, "network_event_ledger").await, 6);

    let rebuilt = aggregator.rebuild(&resolved.identity_id).await.unwrap();
    assert_eq!(rebuilt.weighted_score, identity.weighted_score);
    assert_eq!(rebuilt.total_incidents, 6);
}
