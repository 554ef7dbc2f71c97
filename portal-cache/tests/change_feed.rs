//! Listener lifecycle and feed-driven convergence.

use portal_cache::{ApplyOutcome, ListenerState, PortalCache};
use portal_test_utils::fixtures::{self, application, gateway_aat, notification, pay_plan};
use portal_test_utils::generators::{arb_application_events, arb_blockchain_events};
use portal_test_utils::{
    Action, AppLimit, AppLimitRow, Blockchain, GatewayAatRow, LbApp, LoadBalancer, MockReader,
    Notification, PayPlanType, SourceData, StickyOptions, StickyOptionsRow, SyncCheckOptions,
    SyncCheckOptionsRow, Table,
};
use proptest::prelude::*;
use serde_json::json;
use tokio::sync::mpsc;

fn plans_only() -> SourceData {
    SourceData {
        pay_plans: vec![
            pay_plan(PayPlanType::FreetierV0, 100),
            pay_plan(PayPlanType::PayAsYouGoV0, 1_000),
        ],
        ..Default::default()
    }
}

async fn wait_stopped(cache: &PortalCache<MockReader>) {
    let mut state = cache.subscribe_listener_state();
    state
        .wait_for(|s| *s == ListenerState::Stopped)
        .await
        .unwrap();
}

/// Events that build one application, one blockchain, and one load balancer
/// with all their children, listed parents first.
fn causal_events() -> Vec<Notification> {
    vec![
        notification(
            Table::Applications,
            Action::Insert,
            &application("app-1", "user-1", PayPlanType::FreetierV0),
        ),
        notification(
            Table::Applications,
            Action::Insert,
            &application("app-2", "user-2", PayPlanType::FreetierV0),
        ),
        notification(
            Table::AppLimits,
            Action::Insert,
            &AppLimitRow {
                application_id: "app-1".to_string(),
                limit: AppLimit {
                    pay_plan: pay_plan(PayPlanType::PayAsYouGoV0, 0),
                    custom_limit: 0,
                },
            },
        ),
        notification(
            Table::GatewayAat,
            Action::Insert,
            &GatewayAatRow {
                application_id: "app-1".to_string(),
                aat: gateway_aat("a1b2c3"),
            },
        ),
        notification(
            Table::Blockchains,
            Action::Insert,
            &fixtures::blockchain("0021", "ETH"),
        ),
        notification(
            Table::SyncCheckOptions,
            Action::Insert,
            &SyncCheckOptionsRow {
                blockchain_id: "0021".to_string(),
                options: SyncCheckOptions {
                    body: r#"{"method":"eth_blockNumber"}"#.to_string(),
                    result_key: "result".to_string(),
                    allowance: 2,
                    ..Default::default()
                },
            },
        ),
        notification(
            Table::Redirects,
            Action::Insert,
            &fixtures::redirect("0021", "eth-mainnet"),
        ),
        notification(
            Table::LoadBalancers,
            Action::Insert,
            &fixtures::load_balancer("lb-1", "user-1", &[]),
        ),
        notification(
            Table::StickinessOptions,
            Action::Insert,
            &StickyOptionsRow {
                load_balancer_id: "lb-1".to_string(),
                options: StickyOptions {
                    stickiness: true,
                    ..Default::default()
                },
            },
        ),
        notification(Table::LbApps, Action::Insert, &LbApp::new("lb-1", "app-1")),
        notification(Table::LbApps, Action::Insert, &LbApp::new("lb-1", "app-2")),
    ]
}

/// Snapshot of cache contents comparable across arrival orders.
async fn contents(
    cache: &PortalCache<MockReader>,
) -> (Vec<portal_test_utils::Application>, Vec<Blockchain>, Vec<LoadBalancer>) {
    let mut apps = cache.applications().await;
    apps.sort_by(|a, b| a.id.cmp(&b.id));

    let mut blockchains = cache.blockchains().await;
    blockchains.sort_by(|a, b| a.id.cmp(&b.id));
    for blockchain in &mut blockchains {
        blockchain.redirects.sort_by(|a, b| a.alias.cmp(&b.alias));
    }

    let mut lbs = cache.load_balancers().await;
    lbs.sort_by(|a, b| a.id.cmp(&b.id));
    for lb in &mut lbs {
        lb.applications.sort_by(|a, b| a.id.cmp(&b.id));
    }

    (apps, blockchains, lbs)
}

async fn applied_in_order(events: Vec<Notification>) -> PortalCache<MockReader> {
    let cache = PortalCache::without_feed(MockReader::new(plans_only()));
    cache.reload().await.unwrap();
    for event in events {
        cache.apply(event).await;
    }
    cache
}

#[tokio::test]
async fn test_listener_starts_on_first_successful_reload() {
    let reader = MockReader::new(plans_only());
    let (tx, rx) = mpsc::channel(16);
    let cache = PortalCache::new(reader.clone(), rx);
    assert_eq!(cache.listener_state(), ListenerState::NotStarted);

    reader.fail_on(Some(portal_test_utils::Collection::PayPlans));
    assert!(cache.reload().await.is_err());
    assert_eq!(cache.listener_state(), ListenerState::NotStarted);

    reader.fail_on(None);
    cache.reload().await.unwrap();
    assert_eq!(cache.listener_state(), ListenerState::Listening);

    cache.reload().await.unwrap();
    assert_eq!(cache.listener_state(), ListenerState::Listening);

    tx.send(notification(
        Table::Applications,
        Action::Insert,
        &application("app-1", "user-1", PayPlanType::FreetierV0),
    ))
    .await
    .unwrap();
    drop(tx);

    wait_stopped(&cache).await;
    assert_eq!(cache.application("app-1").await.unwrap().daily_limit(), 100);
}

#[tokio::test]
async fn test_shutdown_stops_listener_and_it_never_restarts() {
    let (_tx, rx) = mpsc::channel::<Notification>(16);
    let cache = PortalCache::new(MockReader::new(plans_only()), rx);
    cache.reload().await.unwrap();
    assert_eq!(cache.listener_state(), ListenerState::Listening);

    cache.shutdown();
    wait_stopped(&cache).await;

    cache.reload().await.unwrap();
    assert_eq!(cache.listener_state(), ListenerState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reverse_ordered_feed_converges() {
    let expected = applied_in_order(causal_events()).await;

    let (tx, rx) = mpsc::unbounded_channel();
    let cache = PortalCache::new(MockReader::new(plans_only()), rx);
    cache.reload().await.unwrap();
    for event in causal_events().into_iter().rev() {
        tx.send(event).unwrap();
    }
    drop(tx);
    wait_stopped(&cache).await;

    assert_eq!(contents(&cache).await, contents(&expected).await);
    assert_eq!(cache.stats().await.pending, 0);

    let app = cache.application("app-1").await.unwrap();
    assert_eq!(app.daily_limit(), 1_000);
    assert_eq!(app.gateway_aat.address, "a1b2c3");
    let lb = cache.load_balancer("lb-1").await.unwrap();
    assert_eq!(lb.applications.len(), 2);
    assert!(lb.sticky_options.stickiness);
}

#[tokio::test]
async fn test_bad_and_unknown_events_leave_state_unchanged() {
    let cache = applied_in_order(causal_events()).await;
    let before = contents(&cache).await;
    let stats = cache.stats().await;

    let malformed = Notification::new(Table::Applications, Action::Insert, json!("not an application"));
    assert_eq!(cache.apply(malformed).await, ApplyOutcome::Dropped);

    let untracked: Notification = serde_json::from_value(json!({
        "table": "audit_log",
        "action": "INSERT",
        "data": { "id": "app-1", "name": "hijacked" }
    }))
    .unwrap();
    assert_eq!(untracked.table, Table::Unknown);
    assert_eq!(cache.apply(untracked).await, ApplyOutcome::Ignored);

    let append_only_update = notification(
        Table::Redirects,
        Action::Update,
        &fixtures::redirect("0021", "eth-archival"),
    );
    assert_eq!(cache.apply(append_only_update).await, ApplyOutcome::Ignored);

    assert_eq!(contents(&cache).await, before);
    assert_eq!(cache.stats().await, stats);
}

#[tokio::test]
async fn test_child_rows_without_parent_key_are_dropped() {
    let cache = applied_in_order(causal_events()).await;
    let before = contents(&cache).await;
    let stats = cache.stats().await;

    let keyless_aat = Notification::new(
        Table::GatewayAat,
        Action::Insert,
        json!({ "address": "a1b2c3", "version": "0.0.1" }),
    );
    assert_eq!(cache.apply(keyless_aat).await, ApplyOutcome::Dropped);

    let keyless_sticky = Notification::new(
        Table::StickinessOptions,
        Action::Update,
        json!({ "stickyMax": 10, "stickiness": true }),
    );
    assert_eq!(cache.apply(keyless_sticky).await, ApplyOutcome::Dropped);

    assert_eq!(contents(&cache).await, before);
    assert_eq!(cache.stats().await, stats);
    assert!(!cache.has_pending("").await);
}

#[tokio::test]
async fn test_update_events_through_apply() {
    let cache = applied_in_order(causal_events()).await;

    let mut moved = application("app-2", "user-1", PayPlanType::FreetierV0);
    moved.name = "moved".to_string();
    cache
        .apply(notification(Table::Applications, Action::Update, &moved))
        .await;

    let mut inactive = fixtures::blockchain("0021", "ETH");
    inactive.active = false;
    cache
        .apply(notification(Table::Blockchains, Action::Update, &inactive))
        .await;

    let mut renamed = fixtures::load_balancer("lb-1", "", &[]);
    renamed.name = "renamed".to_string();
    cache
        .apply(notification(Table::LoadBalancers, Action::Update, &renamed))
        .await;

    assert_eq!(cache.applications_by_owner("user-1").await.len(), 2);
    assert!(cache.applications_by_owner("user-2").await.is_empty());
    assert!(!cache.blockchain("0021").await.unwrap().active);
    assert!(cache.load_balancers_by_owner("user-1").await.is_empty());

    let lb = cache.load_balancer("lb-1").await.unwrap();
    assert_eq!(lb.name, "renamed");
    assert_eq!(lb.applications.len(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: any arrival order of a set of events yields the state of the
    /// causal order.
    #[test]
    fn prop_arrival_order_does_not_matter(
        (causal, shuffled) in (
            arb_application_events("app-p".to_string()),
            arb_blockchain_events("00p1".to_string()),
        )
            .prop_map(|(mut apps, chains)| {
                apps.extend(chains);
                apps
            })
            .prop_flat_map(|events| (Just(events.clone()), Just(events).prop_shuffle()))
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        runtime.block_on(async {
            let expected = applied_in_order(causal).await;
            let actual = applied_in_order(shuffled).await;
            assert_eq!(contents(&actual).await, contents(&expected).await);
            assert_eq!(actual.stats().await.pending, 0);
        });
    }
}
