//! Portal Test Utilities
//!
//! Shared test infrastructure for the portal workspace:
//! - A scriptable mock of the source of truth
//! - Test fixtures for common entities and scenarios
//! - Proptest generators for entities and change notifications

pub use portal_core::{
    Action, AppLimit, AppLimitRow, AppStatus, Application, Blockchain, ChangeFeed, Collection,
    GatewayAat, GatewayAatRow, GatewaySettings, GatewaySettingsRow, LbApp, LoadBalancer,
    Notification, NotificationSettings, NotificationSettingsRow, PayPlan, PayPlanType, Redirect,
    SourceError, SourceReader, StickyOptions, StickyOptionsRow, SyncCheckOptions,
    SyncCheckOptionsRow, Table, Timestamp,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

// ============================================================================
// MOCK SOURCE
// ============================================================================

/// Full contents of the mock source of truth.
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    pub pay_plans: Vec<PayPlan>,
    pub applications: Vec<Application>,
    pub blockchains: Vec<Blockchain>,
    pub redirects: Vec<Redirect>,
    pub load_balancers: Vec<LoadBalancer>,
}

#[derive(Debug, Default)]
struct MockState {
    data: SourceData,
    failing: Option<Collection>,
    reads: HashMap<Collection, usize>,
}

/// In-memory [`SourceReader`] for testing.
///
/// Clones share state, so a test can keep a handle after handing one to the
/// cache and change the data or inject failures between reloads.
#[derive(Debug, Clone, Default)]
pub struct MockReader {
    state: Arc<RwLock<MockState>>,
}

impl MockReader {
    /// Create a mock serving `data`.
    pub fn new(data: SourceData) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState {
                data,
                ..Default::default()
            })),
        }
    }

    /// Replace everything the mock serves.
    pub fn set_data(&self, data: SourceData) {
        self.state.write().unwrap().data = data;
    }

    /// Mutate the served data in place.
    pub fn update_data(&self, f: impl FnOnce(&mut SourceData)) {
        f(&mut self.state.write().unwrap().data);
    }

    /// Make reads of `collection` fail until cleared with `None`.
    pub fn fail_on(&self, collection: Option<Collection>) {
        self.state.write().unwrap().failing = collection;
    }

    /// How many times `collection` has been read.
    pub fn read_count(&self, collection: Collection) -> usize {
        self.state
            .read()
            .unwrap()
            .reads
            .get(&collection)
            .copied()
            .unwrap_or(0)
    }

    fn read<T: Clone>(
        &self,
        collection: Collection,
        select: impl FnOnce(&SourceData) -> &Vec<T>,
    ) -> Result<Vec<T>, SourceError> {
        let mut state = self.state.write().unwrap();
        *state.reads.entry(collection).or_insert(0) += 1;
        if state.failing == Some(collection) {
            return Err(SourceError::ReadFailed {
                collection,
                reason: "injected failure".to_string(),
            });
        }
        Ok(select(&state.data).clone())
    }
}

#[async_trait]
impl SourceReader for MockReader {
    async fn read_pay_plans(&self) -> Result<Vec<PayPlan>, SourceError> {
        self.read(Collection::PayPlans, |d| &d.pay_plans)
    }

    async fn read_applications(&self) -> Result<Vec<Application>, SourceError> {
        self.read(Collection::Applications, |d| &d.applications)
    }

    async fn read_blockchains(&self) -> Result<Vec<Blockchain>, SourceError> {
        self.read(Collection::Blockchains, |d| &d.blockchains)
    }

    async fn read_redirects(&self) -> Result<Vec<Redirect>, SourceError> {
        self.read(Collection::Redirects, |d| &d.redirects)
    }

    async fn read_load_balancers(&self) -> Result<Vec<LoadBalancer>, SourceError> {
        self.read(Collection::LoadBalancers, |d| &d.load_balancers)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built entities and notifications for common test scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};
    use serde::Serialize;

    /// Fixed timestamp so fixtures compare equal across runs.
    pub fn fixed_timestamp() -> Timestamp {
        Utc.with_ymd_and_hms(2022, 7, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn pay_plan(plan_type: PayPlanType, daily_limit: i64) -> PayPlan {
        PayPlan {
            plan_type,
            daily_limit,
        }
    }

    /// Application on `plan_type` with no quota derived yet.
    pub fn application(id: &str, user_id: &str, plan_type: PayPlanType) -> Application {
        Application {
            id: id.to_string(),
            user_id: user_id.to_string(),
            name: format!("app-{}", id),
            status: AppStatus::InService,
            limit: AppLimit {
                pay_plan: pay_plan(plan_type, 0),
                custom_limit: 0,
            },
            created_at: Some(fixed_timestamp()),
            updated_at: Some(fixed_timestamp()),
            ..Default::default()
        }
    }

    pub fn blockchain(id: &str, ticker: &str) -> Blockchain {
        Blockchain {
            id: id.to_string(),
            ticker: ticker.to_string(),
            blockchain: format!("{}-mainnet", ticker.to_lowercase()),
            active: true,
            created_at: Some(fixed_timestamp()),
            ..Default::default()
        }
    }

    pub fn redirect(blockchain_id: &str, alias: &str) -> Redirect {
        Redirect {
            blockchain_id: blockchain_id.to_string(),
            alias: alias.to_string(),
            domain: format!("{}.gateway.example", alias),
            load_balancer_id: String::new(),
            created_at: Some(fixed_timestamp()),
            updated_at: None,
        }
    }

    pub fn load_balancer(id: &str, user_id: &str, application_ids: &[&str]) -> LoadBalancer {
        LoadBalancer {
            id: id.to_string(),
            name: format!("lb-{}", id),
            user_id: user_id.to_string(),
            request_timeout: 5_000,
            application_ids: application_ids.iter().map(|s| s.to_string()).collect(),
            created_at: Some(fixed_timestamp()),
            ..Default::default()
        }
    }

    pub fn gateway_aat(address: &str) -> GatewayAat {
        GatewayAat {
            address: address.to_string(),
            application_public_key: format!("{}-app-pub", address),
            application_signature: format!("{}-sig", address),
            client_public_key: format!("{}-client-pub", address),
            private_key: String::new(),
            version: "0.0.1".to_string(),
        }
    }

    /// Two plans (FREETIER_V0 at 100, PAY_AS_YOU_GO_V0 at 1000), three
    /// applications (two owned by `user-1`, one by `user-2`), one blockchain
    /// with a redirect, and a load balancer over the first two applications.
    pub fn scenario_source() -> SourceData {
        SourceData {
            pay_plans: vec![
                pay_plan(PayPlanType::FreetierV0, 100),
                pay_plan(PayPlanType::PayAsYouGoV0, 1_000),
            ],
            applications: vec![
                application("app-1", "user-1", PayPlanType::FreetierV0),
                application("app-2", "user-1", PayPlanType::PayAsYouGoV0),
                application("app-3", "user-2", PayPlanType::FreetierV0),
            ],
            blockchains: vec![blockchain("0021", "ETH")],
            redirects: vec![redirect("0021", "eth-mainnet")],
            load_balancers: vec![load_balancer("lb-1", "user-1", &["app-1", "app-2"])],
        }
    }

    /// Notification carrying `row` serialized as the table's payload.
    pub fn notification<T: Serialize>(table: Table, action: Action, row: &T) -> Notification {
        Notification::from_row(table, action, row).expect("fixture rows serialize")
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for portal entities and change streams.

    use super::fixtures;
    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    /// Generate a Timestamp within 2020-2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    /// Generate a plan type from the standard set.
    pub fn arb_pay_plan_type() -> impl Strategy<Value = PayPlanType> {
        prop_oneof![
            Just(PayPlanType::FreetierV0),
            Just(PayPlanType::PayAsYouGoV0),
            Just(PayPlanType::Enterprise),
        ]
    }

    /// Generate an owner ID; the empty string means no owner.
    pub fn arb_owner() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            Just("user-1".to_string()),
            Just("user-2".to_string()),
            Just("user-3".to_string()),
        ]
    }

    pub fn arb_gateway_aat() -> impl Strategy<Value = GatewayAat> {
        "[a-f0-9]{8}".prop_map(|address| fixtures::gateway_aat(&address))
    }

    /// Generate an application with ID `id`.
    pub fn arb_application(id: String) -> impl Strategy<Value = Application> {
        (arb_owner(), arb_pay_plan_type(), "[a-z]{3,12}", arb_timestamp()).prop_map(
            move |(owner, plan_type, name, created_at)| {
                let mut app = fixtures::application(&id, &owner, plan_type);
                app.name = name;
                app.created_at = Some(created_at);
                app
            },
        )
    }

    /// Generate the notifications that create one application and its
    /// children, in causal order (parent first).
    pub fn arb_application_events(id: String) -> impl Strategy<Value = Vec<Notification>> {
        (
            arb_application(id.clone()),
            arb_gateway_aat(),
            any::<bool>(),
            0i64..5_000_000,
        )
            .prop_map(move |(app, aat, notify_full, custom_limit)| {
                let mut limit = app.limit.clone();
                limit.custom_limit = custom_limit;
                vec![
                    fixtures::notification(Table::Applications, Action::Insert, &app),
                    fixtures::notification(
                        Table::AppLimits,
                        Action::Insert,
                        &AppLimitRow {
                            application_id: id.clone(),
                            limit,
                        },
                    ),
                    fixtures::notification(
                        Table::GatewayAat,
                        Action::Insert,
                        &GatewayAatRow {
                            application_id: id.clone(),
                            aat,
                        },
                    ),
                    fixtures::notification(
                        Table::NotificationSettings,
                        Action::Insert,
                        &NotificationSettingsRow {
                            application_id: id.clone(),
                            settings: NotificationSettings {
                                full: notify_full,
                                ..Default::default()
                            },
                        },
                    ),
                ]
            })
    }

    /// Generate the notifications that create a blockchain with sync options
    /// and redirects, in causal order.
    pub fn arb_blockchain_events(id: String) -> impl Strategy<Value = Vec<Notification>> {
        (
            proptest::collection::vec("[a-z]{3,10}", 0..3),
            0i64..10,
        )
            .prop_map(move |(aliases, allowance)| {
                let mut events = vec![
                    fixtures::notification(
                        Table::Blockchains,
                        Action::Insert,
                        &fixtures::blockchain(&id, "POKT"),
                    ),
                    fixtures::notification(
                        Table::SyncCheckOptions,
                        Action::Insert,
                        &SyncCheckOptionsRow {
                            blockchain_id: id.clone(),
                            options: SyncCheckOptions {
                                path: "/v1/query/height".to_string(),
                                allowance,
                                ..Default::default()
                            },
                        },
                    ),
                ];
                for alias in aliases {
                    events.push(fixtures::notification(
                        Table::Redirects,
                        Action::Insert,
                        &fixtures::redirect(&id, &alias),
                    ));
                }
                events
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_reader_serves_and_counts() {
        let reader = MockReader::new(fixtures::scenario_source());

        let apps = reader.read_applications().await.unwrap();
        assert_eq!(apps.len(), 3);
        assert_eq!(reader.read_count(Collection::Applications), 1);
        assert_eq!(reader.read_count(Collection::PayPlans), 0);
    }

    #[tokio::test]
    async fn test_mock_reader_injected_failure() {
        let reader = MockReader::new(fixtures::scenario_source());
        let handle = reader.clone();

        handle.fail_on(Some(Collection::Blockchains));
        assert!(matches!(
            reader.read_blockchains().await,
            Err(SourceError::ReadFailed {
                collection: Collection::Blockchains,
                ..
            })
        ));

        handle.fail_on(None);
        assert_eq!(reader.read_blockchains().await.unwrap().len(), 1);
        assert_eq!(reader.read_count(Collection::Blockchains), 2);
    }

    #[test]
    fn test_fixture_notification_decodes() {
        let n = fixtures::notification(
            Table::LbApps,
            Action::Insert,
            &LbApp::new("lb-1", "app-3"),
        );
        assert!(n.decode().unwrap().is_some());
    }
}
