//! Store Fuzzer - Randomized register/commit/unregister sequences
//!
//! Tests:
//! - Registration bookkeeping (has_module, state slices, getter keys)
//! - Commits reach exactly the registered handlers
//! - Root getters stay consistent with module state across resets
//! - Strict mode never trips on handler-driven writes

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use strata_store::{ModuleDef, Store, StoreOptions, StoreResult};

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    /// Number of distinct dynamic module slots
    pub module_count: usize,
    /// Number of operations to run
    pub op_count: usize,
    /// Probability of a register attempt
    pub register_prob: f64,
    /// Probability of an unregister attempt
    pub unregister_prob: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            module_count: 6,
            op_count: 500,
            register_prob: 0.15,
            unregister_prob: 0.1,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            module_count: 3,
            op_count: 100,
            register_prob: 0.2,
            unregister_prob: 0.1,
            seed: 42,
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzerConfig {
            module_count: 16,
            op_count: 5000,
            register_prob: 0.1,
            unregister_prob: 0.1,
            seed: 42,
        }
    }
}

/// Fuzzing result
#[derive(Clone, Debug, Default)]
pub struct FuzzResult {
    pub registrations: usize,
    pub unregistrations: usize,
    pub commits: usize,
    pub violations: Vec<String>,
}

impl FuzzResult {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Store fuzzer
pub struct StoreFuzzer {
    config: FuzzerConfig,
    rng: StdRng,
    store: Store,
    /// Registered slots and the counter each should hold
    model: BTreeMap<usize, i64>,
}

fn slot_name(slot: usize) -> String {
    format!("m{}", slot)
}

/// Dynamic module registered into a slot
fn slot_module() -> ModuleDef {
    ModuleDef::new()
        .namespaced(true)
        .state(json!({ "n": 0 }))
        .mutation("add", |state, payload| {
            let n = state["n"].as_i64().unwrap_or(0);
            state["n"] = json!(n + payload.as_i64().unwrap_or(0));
        })
        .getter("value", |state, _, _, _| state["n"].clone())
}

/// Root module: sums every slot's counter
fn root_module() -> ModuleDef {
    ModuleDef::new().getter("total", |state, _, _, _| {
        let total: i64 = state
            .as_object()
            .map(|slots| {
                slots
                    .values()
                    .filter_map(|slot| slot["n"].as_i64())
                    .sum()
            })
            .unwrap_or(0);
        json!(total)
    })
}

impl StoreFuzzer {
    /// Create a new fuzzer over a fresh strict store
    pub fn new(config: FuzzerConfig) -> StoreResult<Self> {
        let rng = StdRng::seed_from_u64(config.seed);
        let store = Store::new(StoreOptions::new(root_module()).strict(true))?;
        Ok(StoreFuzzer {
            config,
            rng,
            store,
            model: BTreeMap::new(),
        })
    }

    /// Run the fuzzer
    pub fn run(&mut self) -> FuzzResult {
        let mut result = FuzzResult::default();

        for step in 0..self.config.op_count {
            let slot = self.rng.gen_range(0..self.config.module_count);
            let roll = self.rng.gen::<f64>();

            let outcome = if roll < self.config.register_prob {
                result.registrations += 1;
                self.register(slot)
            } else if roll < self.config.register_prob + self.config.unregister_prob {
                result.unregistrations += 1;
                self.unregister(slot)
            } else {
                result.commits += 1;
                let delta = self.rng.gen_range(-10..=10);
                self.commit(slot, delta)
            };

            if let Err(err) = outcome {
                result
                    .violations
                    .push(format!("step {}: unexpected error: {}", step, err));
            }
            self.check(step, &mut result.violations);
        }

        result
    }

    fn register(&mut self, slot: usize) -> StoreResult<()> {
        if self.model.contains_key(&slot) {
            return Ok(());
        }
        self.store.register_module(slot_name(slot), slot_module())?;
        self.model.insert(slot, 0);
        Ok(())
    }

    fn unregister(&mut self, slot: usize) -> StoreResult<()> {
        self.store.unregister_module(slot_name(slot))?;
        self.model.remove(&slot);
        Ok(())
    }

    fn commit(&mut self, slot: usize, delta: i64) -> StoreResult<()> {
        // unregistered slots: unknown type, reported and ignored
        self.store
            .commit(format!("{}/add", slot_name(slot)), json!(delta))?;
        if let Some(n) = self.model.get_mut(&slot) {
            *n += delta;
        }
        Ok(())
    }

    fn check(&self, step: usize, violations: &mut Vec<String>) {
        let state = self.store.state();
        let getters = self.store.getters();

        for slot in 0..self.config.module_count {
            let name = slot_name(slot);
            let expected = self.model.get(&slot);

            if self.store.has_module(name.as_str()) != expected.is_some() {
                violations.push(format!("step {}: has_module({}) disagrees", step, name));
            }

            let actual = state.get(&name).map(|slot| slot["n"].clone());
            if actual != expected.map(|n| json!(n)) {
                violations.push(format!(
                    "step {}: state of {} is {:?}, expected {:?}",
                    step, name, actual, expected
                ));
            }

            let getter = format!("{}/value", name);
            if getters.contains(&getter) != expected.is_some() {
                violations.push(format!("step {}: getter {} presence disagrees", step, getter));
            } else if let Some(n) = expected {
                if getters.value(&getter) != json!(n) {
                    violations.push(format!("step {}: getter {} is stale", step, getter));
                }
            }
        }

        let total: i64 = self.model.values().sum();
        if getters.value("total") != json!(total) {
            violations.push(format!(
                "step {}: total getter {} but model sums to {}",
                step,
                getters.value("total"),
                total
            ));
        }
    }
}

/// Top-level state keys still present in the store
pub fn residue(store: &Store) -> Vec<String> {
    store
        .state()
        .as_object()
        .map(|slots| slots.keys().cloned().collect())
        .unwrap_or_default()
}

/// Run light fuzzing
pub fn fuzz_light() -> StoreResult<FuzzResult> {
    Ok(StoreFuzzer::new(FuzzerConfig::light())?.run())
}

/// Run default fuzzing
pub fn fuzz_default() -> StoreResult<FuzzResult> {
    Ok(StoreFuzzer::new(FuzzerConfig::default())?.run())
}

/// Run heavy fuzzing
pub fn fuzz_heavy() -> StoreResult<FuzzResult> {
    Ok(StoreFuzzer::new(FuzzerConfig::heavy())?.run())
}
