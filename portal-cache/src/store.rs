//! Entity store: primary maps and owner indices.
//!
//! The store only keeps state consistent with itself. Deciding what to store
//! (quota derivation, pending children, change decoding) lives in the applier
//! and the snapshot loader. The store is not synchronized; [`crate::PortalCache`]
//! guards it, together with the pending buffer, behind a single lock.

use portal_core::{Application, Blockchain, LoadBalancer, PayPlan, PayPlanType};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

// ============================================================================
// ORDERED MAP
// ============================================================================

/// Map that also remembers first-insertion order.
///
/// Re-inserting an existing key replaces the value in place and keeps its
/// original position.
#[derive(Debug, Clone)]
struct OrderedMap<K, V> {
    entries: HashMap<K, V>,
    order: Vec<K>,
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> OrderedMap<K, V> {
    fn upsert(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.entries.insert(key.clone(), value);
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get_mut(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.order.iter().filter_map(move |key| self.entries.get(key))
    }
}

// ============================================================================
// OWNER INDEX
// ============================================================================

/// Multi-valued index from owner (user ID) to entity IDs.
///
/// Entities without an owner are never indexed and empty buckets are dropped.
#[derive(Debug, Clone, Default)]
struct OwnerIndex {
    buckets: HashMap<String, Vec<String>>,
}

impl OwnerIndex {
    fn insert(&mut self, owner: &str, id: &str) {
        if owner.is_empty() {
            return;
        }
        let bucket = self.buckets.entry(owner.to_string()).or_default();
        if !bucket.iter().any(|existing| existing == id) {
            bucket.push(id.to_string());
        }
    }

    fn remove(&mut self, owner: &str, id: &str) {
        if let Some(bucket) = self.buckets.get_mut(owner) {
            bucket.retain(|existing| existing != id);
            if bucket.is_empty() {
                self.buckets.remove(owner);
            }
        }
    }

    /// Move `id` from `old_owner`'s bucket to `new_owner`'s.
    fn reassign(&mut self, id: &str, old_owner: &str, new_owner: &str) {
        if old_owner != new_owner {
            self.remove(old_owner, id);
        }
        self.insert(new_owner, id);
    }

    fn ids(&self, owner: &str) -> &[String] {
        self.buckets.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ============================================================================
// LOAD BALANCER RECORD
// ============================================================================

/// A load balancer as kept in the store.
///
/// `record` never carries application IDs or application copies; the
/// association lives only in `application_refs`, which is turned back into
/// application values on read.
#[derive(Debug, Clone)]
struct StoredLoadBalancer {
    record: LoadBalancer,
    application_refs: Vec<String>,
}

impl StoredLoadBalancer {
    fn attach(&mut self, app_id: String) -> bool {
        if self.application_refs.contains(&app_id) {
            return false;
        }
        self.application_refs.push(app_id);
        true
    }
}

// ============================================================================
// ENTITY STORE
// ============================================================================

/// Per-collection entity counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCounts {
    pub pay_plans: usize,
    pub applications: usize,
    pub blockchains: usize,
    pub load_balancers: usize,
}

/// Current known state of every entity collection.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    pay_plans: OrderedMap<PayPlanType, PayPlan>,
    applications: OrderedMap<String, Application>,
    applications_by_owner: OwnerIndex,
    blockchains: OrderedMap<String, Blockchain>,
    load_balancers: OrderedMap<String, StoredLoadBalancer>,
    load_balancers_by_owner: OwnerIndex,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            pay_plans: self.pay_plans.len(),
            applications: self.applications.len(),
            blockchains: self.blockchains.len(),
            load_balancers: self.load_balancers.len(),
        }
    }

    // === Pay Plans ===

    pub fn put_pay_plan(&mut self, plan: PayPlan) -> Option<PayPlan> {
        self.pay_plans.upsert(plan.plan_type.clone(), plan)
    }

    pub fn pay_plan(&self, plan_type: &PayPlanType) -> Option<&PayPlan> {
        self.pay_plans.get(plan_type)
    }

    pub fn pay_plans(&self) -> impl Iterator<Item = &PayPlan> + '_ {
        self.pay_plans.values()
    }

    // === Applications ===

    /// Insert or overwrite an application, keeping the owner index in step.
    pub fn put_application(&mut self, app: Application) -> Option<Application> {
        let id = app.id.clone();
        let owner = app.user_id.clone();
        let previous = self.applications.upsert(id.clone(), app);
        let old_owner = previous.as_ref().map(|p| p.user_id.as_str()).unwrap_or("");
        self.applications_by_owner.reassign(&id, old_owner, &owner);
        previous
    }

    pub fn application(&self, id: &str) -> Option<&Application> {
        self.applications.get(id)
    }

    pub fn contains_application(&self, id: &str) -> bool {
        self.applications.get(id).is_some()
    }

    /// Mutate an application in place.
    ///
    /// Any owner change made by `f` is reflected in the owner index. Returns
    /// false when no application has this ID.
    pub fn update_application<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Application),
    {
        let Some(app) = self.applications.get_mut(id) else {
            return false;
        };
        let old_owner = app.user_id.clone();
        f(app);
        // The key is not part of the mutable surface.
        app.id = id.to_string();
        let new_owner = app.user_id.clone();
        self.applications_by_owner.reassign(id, &old_owner, &new_owner);
        true
    }

    pub fn applications(&self) -> impl Iterator<Item = &Application> + '_ {
        self.applications.values()
    }

    pub fn applications_by_owner<'a>(
        &'a self,
        owner: &'a str,
    ) -> impl Iterator<Item = &'a Application> + 'a {
        self.applications_by_owner
            .ids(owner)
            .iter()
            .filter_map(move |id| self.applications.get(id.as_str()))
    }

    // === Blockchains ===

    pub fn put_blockchain(&mut self, blockchain: Blockchain) -> Option<Blockchain> {
        self.blockchains.upsert(blockchain.id.clone(), blockchain)
    }

    pub fn blockchain(&self, id: &str) -> Option<&Blockchain> {
        self.blockchains.get(id)
    }

    pub fn blockchain_mut(&mut self, id: &str) -> Option<&mut Blockchain> {
        self.blockchains.get_mut(id)
    }

    pub fn blockchains(&self) -> impl Iterator<Item = &Blockchain> + '_ {
        self.blockchains.values()
    }

    // === Load Balancers ===

    /// Insert or overwrite a load balancer.
    ///
    /// The record's `application_ids` plus `extra_refs` become its application
    /// references (deduplicated, in order); the ID list on the record is
    /// cleared. Returns the number of references that do not name a known
    /// application yet.
    pub fn put_load_balancer(&mut self, mut lb: LoadBalancer, extra_refs: Vec<String>) -> usize {
        let mut stored = StoredLoadBalancer {
            record: LoadBalancer::default(),
            application_refs: Vec::new(),
        };
        for app_id in std::mem::take(&mut lb.application_ids)
            .into_iter()
            .chain(extra_refs)
        {
            stored.attach(app_id);
        }
        lb.applications.clear();

        let dangling = stored
            .application_refs
            .iter()
            .filter(|id| !self.contains_application(id))
            .count();

        let id = lb.id.clone();
        let owner = lb.user_id.clone();
        stored.record = lb;
        let previous = self.load_balancers.upsert(id.clone(), stored);
        let old_owner = previous
            .as_ref()
            .map(|p| p.record.user_id.as_str())
            .unwrap_or("");
        self.load_balancers_by_owner.reassign(&id, old_owner, &owner);
        dangling
    }

    /// Read a load balancer with its application list resolved.
    pub fn load_balancer(&self, id: &str) -> Option<LoadBalancer> {
        self.load_balancers.get(id).map(|stored| self.materialize(stored))
    }

    pub fn contains_load_balancer(&self, id: &str) -> bool {
        self.load_balancers.get(id).is_some()
    }

    /// Mutate a load balancer's own fields in place.
    ///
    /// Owner changes are reflected in the owner index. Application
    /// associations are not editable through `f`.
    pub fn update_load_balancer<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut LoadBalancer),
    {
        let Some(stored) = self.load_balancers.get_mut(id) else {
            return false;
        };
        let old_owner = stored.record.user_id.clone();
        f(&mut stored.record);
        stored.record.id = id.to_string();
        stored.record.application_ids.clear();
        stored.record.applications.clear();
        let new_owner = stored.record.user_id.clone();
        self.load_balancers_by_owner.reassign(id, &old_owner, &new_owner);
        true
    }

    /// Associate an application with a load balancer.
    ///
    /// Returns false when the load balancer is unknown. Attaching the same
    /// application twice keeps one reference.
    pub fn attach_application(&mut self, lb_id: &str, app_id: &str) -> bool {
        match self.load_balancers.get_mut(lb_id) {
            Some(stored) => {
                stored.attach(app_id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn load_balancers(&self) -> Vec<LoadBalancer> {
        self.load_balancers
            .values()
            .map(|stored| self.materialize(stored))
            .collect()
    }

    pub fn load_balancers_by_owner(&self, owner: &str) -> Vec<LoadBalancer> {
        self.load_balancers_by_owner
            .ids(owner)
            .iter()
            .filter_map(|id| self.load_balancer(id))
            .collect()
    }

    fn materialize(&self, stored: &StoredLoadBalancer) -> LoadBalancer {
        let mut lb = stored.record.clone();
        lb.applications = stored
            .application_refs
            .iter()
            .filter_map(|id| self.applications.get(id.as_str()).cloned())
            .collect();
        lb
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[derive(Debug, Clone)]
    enum Op {
        Put { id: u8, owner: u8 },
        SetOwner { id: u8, owner: u8 },
    }

    fn owner_name(owner: u8) -> String {
        // Owner 0 stands for "no owner".
        if owner == 0 {
            String::new()
        } else {
            format!("user-{}", owner)
        }
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6, 0u8..4).prop_map(|(id, owner)| Op::Put { id, owner }),
            (0u8..6, 0u8..4).prop_map(|(id, owner)| Op::SetOwner { id, owner }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: the owner index always equals a scan of the owner field,
        /// and the primary list never holds duplicates.
        #[test]
        fn prop_owner_index_matches_owner_field(ops in proptest::collection::vec(op(), 1..40)) {
            let mut store = EntityStore::new();
            for op in ops {
                match op {
                    Op::Put { id, owner } => {
                        store.put_application(Application {
                            id: format!("app-{}", id),
                            user_id: owner_name(owner),
                            ..Default::default()
                        });
                    }
                    Op::SetOwner { id, owner } => {
                        store.update_application(&format!("app-{}", id), |a| a.user_id = owner_name(owner));
                    }
                }
            }

            let all: Vec<_> = store.applications().map(|a| a.id.clone()).collect();
            let unique: BTreeSet<_> = all.iter().cloned().collect();
            prop_assert_eq!(all.len(), unique.len());

            for owner in 1u8..4 {
                let owner = owner_name(owner);
                let indexed: BTreeSet<_> = store.applications_by_owner(&owner).map(|a| a.id.clone()).collect();
                let scanned: BTreeSet<_> = store
                    .applications()
                    .filter(|a| a.user_id == owner)
                    .map(|a| a.id.clone())
                    .collect();
                prop_assert_eq!(indexed, scanned);
            }
        }
    }
}
