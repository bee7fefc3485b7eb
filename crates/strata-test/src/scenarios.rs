//! End-to-end Scenario Suite
//!
//! Drives the shopping cart fixture through a scripted workload and verifies:
//! - Inventory conservation across cart, shelf and completed orders
//! - Getter projection agrees with the raw state
//! - Every commit reaches subscribers and the inspector exactly once
//! - Strict mode is never tripped by handler-driven writes

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use strata_store::{mutation_subscriber, Host, Store, StoreOptions, StoreResult};
use tracing::{debug, info};

use crate::fixtures::{init_logging, shop_module, RecordingDevtools, ShopApi};

/// Scenario configuration
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Add-to-cart operations
    pub rounds: usize,

    /// Check out after every this many rounds
    pub checkout_every: usize,

    /// Fail every n-th checkout
    pub fail_every: Option<usize>,

    /// Run the store in strict mode
    pub strict: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            rounds: 12,
            checkout_every: 4,
            fail_every: None,
            strict: true,
        }
    }
}

impl ScenarioConfig {
    /// Minimal scenario
    pub fn minimal() -> Self {
        Self {
            rounds: 3,
            checkout_every: 3,
            fail_every: None,
            strict: true,
        }
    }

    /// Standard scenario
    pub fn standard() -> Self {
        Self::default()
    }

    /// Stress scenario: long run, frequent failed checkouts
    pub fn stress() -> Self {
        Self {
            rounds: 200,
            checkout_every: 5,
            fail_every: Some(3),
            strict: true,
        }
    }

    pub fn with_failures(mut self, every: usize) -> Self {
        self.fail_every = Some(every);
        self
    }
}

/// Result of a scenario run
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub commits: usize,
    pub checkouts_succeeded: usize,
    pub checkouts_failed: usize,
    /// Mutation events seen by the inspector
    pub devtools_mutations: usize,
    pub invariants_maintained: bool,
    pub invariant_violations: Vec<String>,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.invariants_maintained && self.devtools_mutations == self.commits
    }
}

/// Scenario harness
pub struct ScenarioHarness {
    config: ScenarioConfig,
    api: Arc<ShopApi>,
    devtools: Arc<RecordingDevtools>,
    store: Store,
    commits: Arc<AtomicUsize>,
    initial_inventory: HashMap<i64, i64>,
    sold: HashMap<i64, i64>,
    violations: Vec<String>,
}

impl ScenarioHarness {
    pub fn new(config: ScenarioConfig) -> StoreResult<Self> {
        init_logging();

        let api = ShopApi::new();
        let devtools = RecordingDevtools::new();
        let store = Store::new(
            StoreOptions::new(shop_module(Arc::clone(&api)))
                .strict(config.strict)
                .host(Host::with_devtools(devtools.clone())),
        )?;

        let commits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&commits);
        // lives as long as the store
        let _ = store.subscribe(mutation_subscriber(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        Ok(Self {
            config,
            api,
            devtools,
            store,
            commits,
            initial_inventory: HashMap::new(),
            sold: HashMap::new(),
            violations: Vec::new(),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run the scenario
    pub async fn run(&mut self) -> ScenarioResult {
        let mut succeeded = 0;
        let mut failed = 0;

        if let Err(err) = self.dispatch("products/getAllProducts", Value::Null).await {
            self.violations.push(format!("loading products failed: {}", err));
        }
        self.initial_inventory = self
            .products()
            .iter()
            .map(|p| (id(p), p["inventory"].as_i64().unwrap_or(0)))
            .collect();

        for round in 0..self.config.rounds {
            let products = self.products();
            if !products.is_empty() {
                let product = products[round % products.len()].clone();
                if let Err(err) = self.dispatch("cart/addProductToCart", product).await {
                    self.violations
                        .push(format!("round {}: add to cart failed: {}", round, err));
                }
            }

            if (round + 1) % self.config.checkout_every == 0 {
                let attempt = succeeded + failed + 1;
                let fail = self.config.fail_every.is_some_and(|n| attempt % n == 0);
                self.api.set_fail_checkout(fail);

                let in_cart = self.cart_quantities();
                match self.dispatch("cart/checkout", Value::Null).await {
                    Ok(_) => {
                        succeeded += 1;
                        for (id, quantity) in in_cart {
                            *self.sold.entry(id).or_default() += quantity;
                        }
                    }
                    Err(err) => {
                        failed += 1;
                        debug!("round {}: checkout failed: {}", round, err);
                    }
                }
                self.check_checkout_status(round, fail);
            }

            self.check_invariants(round);
        }

        let result = ScenarioResult {
            commits: self.commits.load(Ordering::SeqCst),
            checkouts_succeeded: succeeded,
            checkouts_failed: failed,
            devtools_mutations: self.devtools.mutation_types().len(),
            invariants_maintained: self.violations.is_empty(),
            invariant_violations: self.violations.clone(),
        };
        info!(
            "scenario finished: {} commits, {} checkouts ok, {} failed",
            result.commits, result.checkouts_succeeded, result.checkouts_failed
        );
        result
    }

    async fn dispatch(&self, kind: &str, payload: Value) -> StoreResult<Value> {
        match self.store.dispatch(kind, payload) {
            Some(pending) => pending.await,
            None => Err(strata_store::StoreError::UnknownAction(kind.to_string())),
        }
    }

    fn products(&self) -> Vec<Value> {
        self.store.state()["products"]["all"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    fn cart_quantities(&self) -> HashMap<i64, i64> {
        let mut quantities = HashMap::new();
        for item in self.store.state()["cart"]["items"]
            .as_array()
            .cloned()
            .unwrap_or_default()
        {
            *quantities.entry(id(&item)).or_default() += item["quantity"].as_i64().unwrap_or(0);
        }
        quantities
    }

    fn check_checkout_status(&mut self, round: usize, failed: bool) {
        let expected = if failed { json!("failed") } else { json!("successful") };
        let status = self.store.state()["cart"]["checkoutStatus"].clone();
        if status != expected {
            self.violations.push(format!(
                "round {}: checkout status {} (expected {})",
                round, status, expected
            ));
        }
    }

    fn check_invariants(&mut self, round: usize) {
        let in_cart = self.cart_quantities();

        for product in self.products() {
            let id = id(&product);
            let inventory = product["inventory"].as_i64().unwrap_or(0);
            if inventory < 0 {
                self.violations
                    .push(format!("round {}: product {} inventory below zero", round, id));
            }

            let accounted = inventory
                + in_cart.get(&id).copied().unwrap_or(0)
                + self.sold.get(&id).copied().unwrap_or(0);
            let initial = self.initial_inventory.get(&id).copied().unwrap_or(0);
            if accounted != initial {
                self.violations.push(format!(
                    "round {}: product {} accounts for {} of {} units",
                    round, id, accounted, initial
                ));
            }
        }

        let prices: HashMap<i64, i64> = self
            .products()
            .iter()
            .map(|p| (id(p), p["price"].as_i64().unwrap_or(0)))
            .collect();
        let expected: i64 = in_cart
            .iter()
            .map(|(id, quantity)| prices.get(id).copied().unwrap_or(0) * quantity)
            .sum();
        let total = self.store.getters().value("cart/cartTotalPrice");
        if total != json!(expected) {
            self.violations.push(format!(
                "round {}: cart total getter {} but state sums to {}",
                round, total, expected
            ));
        }
    }
}

fn id(value: &Value) -> i64 {
    value["id"].as_i64().unwrap_or(-1)
}

/// Run the minimal checkout flow
pub async fn test_checkout_flow() -> StoreResult<ScenarioResult> {
    let mut harness = ScenarioHarness::new(ScenarioConfig::minimal())?;
    Ok(harness.run().await)
}

/// Run the standard flow with every second checkout failing
pub async fn test_checkout_with_failures() -> StoreResult<ScenarioResult> {
    let mut harness = ScenarioHarness::new(ScenarioConfig::standard().with_failures(2))?;
    Ok(harness.run().await)
}

/// Run the stress flow
pub async fn test_checkout_under_stress() -> StoreResult<ScenarioResult> {
    let mut harness = ScenarioHarness::new(ScenarioConfig::stress())?;
    Ok(harness.run().await)
}
