//! Snapshot loader.
//!
//! Reads every collection from the source of truth in dependency order and
//! builds a complete [`EntityStore`] from it. Nothing is installed until all
//! reads have succeeded; the caller swaps the result in.

use crate::applier::derive_quota;
use crate::store::EntityStore;
use portal_core::{
    Application, Blockchain, Collection, LoadBalancer, PayPlan, Redirect, ReloadError,
    SourceError, SourceReader,
};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Raw collections as read from the source.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub pay_plans: Vec<PayPlan>,
    pub applications: Vec<Application>,
    pub blockchains: Vec<Blockchain>,
    pub redirects: Vec<Redirect>,
    pub load_balancers: Vec<LoadBalancer>,
}

fn at_step(step: Collection) -> impl FnOnce(SourceError) -> ReloadError {
    move |source| ReloadError { step, source }
}

impl Snapshot {
    /// Read every collection, stopping at the first failure.
    pub async fn read<R>(reader: &R) -> Result<Self, ReloadError>
    where
        R: SourceReader + ?Sized,
    {
        let pay_plans = reader
            .read_pay_plans()
            .await
            .map_err(at_step(Collection::PayPlans))?;
        let applications = reader
            .read_applications()
            .await
            .map_err(at_step(Collection::Applications))?;
        let blockchains = reader
            .read_blockchains()
            .await
            .map_err(at_step(Collection::Blockchains))?;
        let redirects = reader
            .read_redirects()
            .await
            .map_err(at_step(Collection::Redirects))?;
        let load_balancers = reader
            .read_load_balancers()
            .await
            .map_err(at_step(Collection::LoadBalancers))?;

        Ok(Self {
            pay_plans,
            applications,
            blockchains,
            redirects,
            load_balancers,
        })
    }

    /// Build a store: plans, then applications (quota against the plans),
    /// then blockchains joined with redirects, then load balancers resolved
    /// against the applications.
    pub fn build(self) -> EntityStore {
        let mut store = EntityStore::new();

        for plan in self.pay_plans {
            store.put_pay_plan(plan);
        }

        for mut app in self.applications {
            if !derive_quota(&store, &mut app.limit) {
                debug!(
                    application_id = %app.id,
                    plan_type = %app.limit.pay_plan.plan_type,
                    "Application plan not in pay plan table"
                );
            }
            store.put_application(app);
        }

        let mut redirects_by_chain: HashMap<String, Vec<Redirect>> = HashMap::new();
        for redirect in self.redirects {
            redirects_by_chain
                .entry(redirect.blockchain_id.clone())
                .or_default()
                .push(redirect);
        }
        for mut blockchain in self.blockchains {
            blockchain.redirects = redirects_by_chain.remove(&blockchain.id).unwrap_or_default();
            store.put_blockchain(blockchain);
        }
        if !redirects_by_chain.is_empty() {
            debug!(
                blockchains = redirects_by_chain.len(),
                "Redirects reference blockchains missing from the snapshot"
            );
        }

        // Unknown application IDs are kept and resolve once the application
        // arrives, the same as load balancers inserted through the feed.
        for lb in self.load_balancers {
            let lb_id = lb.id.clone();
            let dangling = store.put_load_balancer(lb, Vec::new());
            if dangling > 0 {
                warn!(
                    load_balancer_id = %lb_id,
                    dangling,
                    "Load balancer references applications not loaded yet"
                );
            }
        }

        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use portal_core::{AppLimit, PayPlanType};

    struct FixedReader {
        snapshot: Snapshot,
        fail_at: Option<Collection>,
    }

    impl FixedReader {
        fn check(&self, collection: Collection) -> Result<(), SourceError> {
            match self.fail_at {
                Some(failing) if failing == collection => Err(SourceError::ReadFailed {
                    collection,
                    reason: "boom".to_string(),
                }),
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl SourceReader for FixedReader {
        async fn read_pay_plans(&self) -> Result<Vec<PayPlan>, SourceError> {
            self.check(Collection::PayPlans)?;
            Ok(self.snapshot.pay_plans.clone())
        }

        async fn read_applications(&self) -> Result<Vec<Application>, SourceError> {
            self.check(Collection::Applications)?;
            Ok(self.snapshot.applications.clone())
        }

        async fn read_blockchains(&self) -> Result<Vec<Blockchain>, SourceError> {
            self.check(Collection::Blockchains)?;
            Ok(self.snapshot.blockchains.clone())
        }

        async fn read_redirects(&self) -> Result<Vec<Redirect>, SourceError> {
            self.check(Collection::Redirects)?;
            Ok(self.snapshot.redirects.clone())
        }

        async fn read_load_balancers(&self) -> Result<Vec<LoadBalancer>, SourceError> {
            self.check(Collection::LoadBalancers)?;
            Ok(self.snapshot.load_balancers.clone())
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            pay_plans: vec![PayPlan {
                plan_type: PayPlanType::FreetierV0,
                daily_limit: 250_000,
            }],
            applications: vec![Application {
                id: "a1".to_string(),
                user_id: "u1".to_string(),
                limit: AppLimit {
                    pay_plan: PayPlan {
                        plan_type: PayPlanType::FreetierV0,
                        daily_limit: 0,
                    },
                    custom_limit: 0,
                },
                ..Default::default()
            }],
            blockchains: vec![Blockchain {
                id: "0021".to_string(),
                ..Default::default()
            }],
            redirects: vec![
                Redirect {
                    blockchain_id: "0021".to_string(),
                    alias: "eth-mainnet".to_string(),
                    ..Default::default()
                },
                Redirect {
                    blockchain_id: "9999".to_string(),
                    alias: "orphan".to_string(),
                    ..Default::default()
                },
            ],
            load_balancers: vec![LoadBalancer {
                id: "lb1".to_string(),
                user_id: "u1".to_string(),
                application_ids: vec!["a1".to_string(), "ghost".to_string()],
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn test_read_and_build_full_snapshot() {
        let reader = FixedReader {
            snapshot: snapshot(),
            fail_at: None,
        };

        let store = Snapshot::read(&reader).await.unwrap().build();

        assert_eq!(store.application("a1").unwrap().daily_limit(), 250_000);
        assert_eq!(store.blockchain("0021").unwrap().redirects.len(), 1);

        let lb = store.load_balancer("lb1").unwrap();
        assert!(lb.application_ids.is_empty());
        assert_eq!(lb.applications.len(), 1);
        assert_eq!(lb.applications[0].id, "a1");
    }

    #[tokio::test]
    async fn test_unknown_lb_application_resolves_once_inserted() {
        let reader = FixedReader {
            snapshot: snapshot(),
            fail_at: None,
        };
        let mut store = Snapshot::read(&reader).await.unwrap().build();

        store.put_application(Application {
            id: "ghost".to_string(),
            user_id: "u2".to_string(),
            ..Default::default()
        });

        let ids: Vec<_> = store
            .load_balancer("lb1")
            .unwrap()
            .applications
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["a1", "ghost"]);
    }

    #[tokio::test]
    async fn test_first_failure_names_step() {
        for step in [
            Collection::PayPlans,
            Collection::Applications,
            Collection::Blockchains,
            Collection::Redirects,
            Collection::LoadBalancers,
        ] {
            let reader = FixedReader {
                snapshot: snapshot(),
                fail_at: Some(step),
            };
            let err = Snapshot::read(&reader).await.unwrap_err();
            assert_eq!(err.step, step);
        }
    }
}
