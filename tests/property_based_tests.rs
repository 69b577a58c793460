mod common;

use std::sync::Arc;
use std::time::Duration;

use common::aged_item;
use common::strategies::*;
use proptest::prelude::*;

use citeline_core::dedup::{
    default_resolution, DuplicateDetector, StandardUrlNormalizer, UrlNormalizer,
};
use citeline_core::events::EventPublisher;
use citeline_core::models::TrackedItem;
use citeline_core::orchestration::{retry_delay, ErrorCategory, ErrorClassifier};
use citeline_core::state_machine::{
    can_transition, evaluate, integrity_issues, possible_next_states, ItemAction,
    ProcessingStatus, StatusMachine, TransitionContext,
};
use citeline_core::store::{InMemoryRecordStore, RecordStore};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("current-thread runtime")
}

proptest! {
    /// Property: the machine commits exactly the pairs the table allows,
    /// and a rejected commit writes nothing
    #[test]
    fn machine_commits_exactly_the_table_edges((from, to) in status_pair_strategy()) {
        let rt = runtime();
        let (committed, history_len, final_status) = rt.block_on(async move {
            let mut item = TrackedItem::new("https://example.com/paper");
            item.status = from;
            if from.is_stored() {
                item.external_key = Some("KEY_FROM".to_string());
                item.created_by_core = true;
                item.linked_count = 1;
            }
            let item_id = item.item_id;
            let store = Arc::new(InMemoryRecordStore::with_items(vec![item]));
            let machine = StatusMachine::new(store.clone(), EventPublisher::default());

            let mut context = TransitionContext::triggered_by("operator");
            if to.is_stored() {
                context = context.external_key("KEY_TO");
            }
            let result = machine.transition(item_id, from, to, context).await;
            let history_len = store.history(item_id).await.unwrap().len();
            let final_status = store.get(item_id).await.unwrap().status;
            (result.is_ok(), history_len, final_status)
        });

        let legal = can_transition(from, to);
        prop_assert_eq!(committed, legal);
        if legal {
            prop_assert_eq!(history_len, 1);
            prop_assert_eq!(final_status, to);
        } else {
            prop_assert_eq!(history_len, 0);
            prop_assert_eq!(final_status, from);
        }
    }

    /// Property: walks along legal edges leave the item integrity-clean and
    /// append exactly one history entry per step
    #[test]
    fn legal_walks_stay_integrity_clean(seeds in walk_seed_strategy()) {
        let rt = runtime();
        let steps = seeds.len();
        let (max_issues, history_len) = rt.block_on(async move {
            let item = TrackedItem::new("https://example.com/paper");
            let item_id = item.item_id;
            let store = Arc::new(InMemoryRecordStore::with_items(vec![item]));
            let machine = StatusMachine::new(store.clone(), EventPublisher::default());

            let mut current = ProcessingStatus::NotStarted;
            let mut max_issues = 0usize;
            for (step, seed) in seeds.into_iter().enumerate() {
                let options = possible_next_states(current);
                let next = options[seed % options.len()];
                let mut context = TransitionContext::triggered_by("walk");
                if next.is_stored() {
                    context = context.external_key(format!("WALK-{step}"));
                }
                let updated = machine
                    .transition(item_id, current, next, context)
                    .await
                    .unwrap();
                max_issues = max_issues.max(integrity_issues(&updated).len());
                current = next;
            }
            let history_len = store.history(item_id).await.unwrap().len();
            (max_issues, history_len)
        });

        prop_assert_eq!(max_issues, 0);
        prop_assert_eq!(history_len, steps);
    }

    /// Property: network backoff doubles from two seconds and caps at sixty
    #[test]
    fn network_backoff_doubles_and_caps(attempt in 1u32..=80) {
        let shift = attempt.saturating_sub(1).min(63);
        let expected = u128::min(2_000u128 << shift, 60_000);
        prop_assert_eq!(
            retry_delay(ErrorCategory::Network, attempt),
            Duration::from_millis(expected as u64)
        );
    }

    /// Property: only network failures earn a backoff delay
    #[test]
    fn non_network_failures_never_wait(
        category in non_network_category_strategy(),
        attempt in attempt_strategy(),
    ) {
        prop_assert_eq!(retry_delay(category, attempt), Duration::ZERO);
    }

    /// Property: unrecognized failures are retryable exactly once
    #[test]
    fn unknown_failures_retry_only_once(attempt in attempt_strategy()) {
        let error = anyhow::anyhow!("entirely inexplicable");
        let classification = ErrorClassifier::new().classify(&error, attempt);
        prop_assert_eq!(classification.category, ErrorCategory::Unknown);
        prop_assert_eq!(classification.retryable, attempt <= 1);
        prop_assert_eq!(classification.blocks_cascade(), attempt > 1);
    }

    /// Property: the merge primary is the oldest member, and the adopted key
    /// is never slated for deletion
    #[test]
    fn merge_primary_is_the_oldest_member(profile in member_profile_strategy()) {
        let rt = runtime();
        let member_count = profile.len();
        let (decision, expected_primary, linked_members) = rt.block_on(async move {
            let mut items = Vec::new();
            for (index, (minutes, linked)) in profile.into_iter().enumerate() {
                let key = linked.then(|| format!("KEY-{index}"));
                items.push(aged_item(
                    "https://example.com/shared-resource",
                    minutes,
                    key.as_deref(),
                ));
            }
            let expected_primary = items
                .iter()
                .min_by(|a, b| {
                    a.created_at
                        .cmp(&b.created_at)
                        .then_with(|| a.item_id.cmp(&b.item_id))
                })
                .map(|item| item.item_id)
                .unwrap();
            let linked_members = items.iter().filter(|i| i.external_key.is_some()).count();

            let store = Arc::new(InMemoryRecordStore::with_items(items));
            let detector =
                DuplicateDetector::new(store, Arc::new(StandardUrlNormalizer::new()));
            let groups = detector.detect_duplicates().await.unwrap();
            assert_eq!(groups.len(), 1);
            (default_resolution(&groups[0]), expected_primary, linked_members)
        });

        prop_assert_eq!(decision.primary_item, expected_primary);
        prop_assert_eq!(decision.items_to_delete.len(), member_count - 1);
        prop_assert!(!decision.items_to_delete.contains(&expected_primary));
        match decision.primary_external_key {
            Some(adopted) => {
                prop_assert!(linked_members >= 1);
                prop_assert!(!decision.keys_to_delete.contains(&adopted));
                prop_assert_eq!(decision.keys_to_delete.len(), linked_members - 1);
            }
            None => {
                prop_assert_eq!(linked_members, 0);
                prop_assert!(decision.keys_to_delete.is_empty());
            }
        }
    }

    /// Property: cosmetic rewrites never change the dedup key
    #[test]
    fn cosmetic_variants_share_a_dedup_key(
        (host, path) in url_parts_strategy(),
        decoration in url_decoration_strategy(),
    ) {
        let normalizer = StandardUrlNormalizer::new();
        let canonical = format!("https://{host}/{path}");
        let decorated = decoration.apply(&host, &path);
        prop_assert_eq!(normalizer.normalize(&decorated), canonical.clone());
        prop_assert_eq!(normalizer.normalize(&canonical), canonical);
    }

    /// Property: ignore and unignore are never both available
    #[test]
    fn ignore_and_unignore_are_mutually_exclusive(
        status in processing_status_strategy(),
        intent in user_intent_strategy(),
    ) {
        let mut item = TrackedItem::new("https://example.com/paper");
        item.status = status;
        item.user_intent = intent;
        if status.is_stored() {
            item.external_key = Some("KEY1".to_string());
            item.created_by_core = true;
            item.linked_count = 1;
        }
        let ignore_ok = evaluate(&item, ItemAction::Ignore).is_ok();
        let unignore_ok = evaluate(&item, ItemAction::Unignore).is_ok();
        prop_assert!(!(ignore_ok && unignore_ok));
    }
}

#[cfg(test)]
mod transition_table_invariants {
    use citeline_core::state_machine::{possible_next_states, ProcessingStatus, ALL_STATUSES};

    fn forward_closure(start: ProcessingStatus) -> Vec<ProcessingStatus> {
        let mut seen = vec![start];
        let mut frontier = vec![start];
        while let Some(status) = frontier.pop() {
            for &next in possible_next_states(status) {
                if !seen.contains(&next) {
                    seen.push(next);
                    frontier.push(next);
                }
            }
        }
        seen
    }

    #[test]
    fn every_status_has_an_exit() {
        for status in ALL_STATUSES {
            assert!(
                !possible_next_states(status).is_empty(),
                "{status} is a dead end"
            );
        }
    }

    #[test]
    fn every_status_is_reachable_from_not_started() {
        assert_eq!(
            forward_closure(ProcessingStatus::NotStarted).len(),
            ALL_STATUSES.len()
        );
    }

    #[test]
    fn every_status_can_eventually_reset() {
        for status in ALL_STATUSES {
            assert!(
                forward_closure(status).contains(&ProcessingStatus::NotStarted),
                "{status} cannot reach not_started"
            );
        }
    }
}
