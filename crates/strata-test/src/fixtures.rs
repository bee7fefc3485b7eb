//! Fixtures - sample module trees and a recording inspector
//!
//! Provides:
//! - A counter store (plain root module)
//! - A shopping cart store (two namespaced modules talking through root state)
//! - A devtools hook that records every event
//! - Test logging setup

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use strata_core::{CommitOptions, StoreError, StoreResult};
use strata_store::{DevtoolsEvent, DevtoolsHook, ModuleDef, TravelHandler};
use tracing_subscriber::EnvFilter;

static LOGGING: Once = Once::new();

/// Route `tracing` output to the test writer; honours `RUST_LOG`
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn int(value: &Value) -> i64 {
    value.as_i64().unwrap_or(0)
}

// ============================================================================
// COUNTER
// ============================================================================

/// Root module with a single counter
pub fn counter_module() -> ModuleDef {
    ModuleDef::new()
        .state(json!({ "count": 0 }))
        .mutation("increment", |state, payload| {
            let by = payload.as_i64().unwrap_or(1);
            state["count"] = json!(int(&state["count"]) + by);
        })
        .mutation("decrement", |state, _| {
            state["count"] = json!(int(&state["count"]) - 1);
        })
        .getter("evenOrOdd", |state, _, _, _| {
            json!(if int(&state["count"]) % 2 == 0 { "even" } else { "odd" })
        })
        .action_sync("incrementIfOdd", |ctx, _| {
            if int(&ctx.state()["count"]) % 2 != 0 {
                ctx.commit("increment", Value::Null)?;
            }
            Ok(Value::Null)
        })
        .action("incrementAsync", |ctx, payload| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            ctx.commit("increment", payload)?;
            Ok::<_, StoreError>(ctx.state()["count"].clone())
        })
}

// ============================================================================
// SHOPPING CART
// ============================================================================

/// Fake backend for the cart fixture
pub struct ShopApi {
    catalogue: Value,
    fail_checkout: AtomicBool,
}

impl ShopApi {
    pub fn new() -> Arc<Self> {
        Arc::new(ShopApi {
            catalogue: json!([
                { "id": 1, "title": "iPad 4 Mini", "price": 500, "inventory": 2 },
                { "id": 2, "title": "H&M T-Shirt White", "price": 10, "inventory": 10 },
                { "id": 3, "title": "Charli XCX - Sucker CD", "price": 19, "inventory": 5 }
            ]),
            fail_checkout: AtomicBool::new(false),
        })
    }

    /// Make the next checkouts fail (or succeed again)
    pub fn set_fail_checkout(&self, fail: bool) {
        self.fail_checkout.store(fail, Ordering::SeqCst);
    }

    pub async fn get_products(&self) -> Value {
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.catalogue.clone()
    }

    pub async fn buy_products(&self, _items: &Value) -> StoreResult<()> {
        tokio::time::sleep(Duration::from_millis(1)).await;
        if self.fail_checkout.load(Ordering::SeqCst) {
            return Err(StoreError::action("checkout rejected by the shop"));
        }
        Ok(())
    }
}

fn products_module(api: Arc<ShopApi>) -> ModuleDef {
    ModuleDef::new()
        .namespaced(true)
        .state(json!({ "all": [] }))
        .mutation("setProducts", |state, payload| {
            state["all"] = payload.clone();
        })
        .mutation("decrementProductInventory", |state, payload| {
            let Some(all) = state["all"].as_array_mut() else {
                return;
            };
            if let Some(product) = all.iter_mut().find(|p| p["id"] == payload["id"]) {
                product["inventory"] = json!(int(&product["inventory"]) - 1);
            }
        })
        .action("getAllProducts", move |ctx, _| {
            let api = Arc::clone(&api);
            async move {
                let products = api.get_products().await;
                ctx.commit("setProducts", products)?;
                Ok::<_, StoreError>(Value::Null)
            }
        })
}

fn cart_module(api: Arc<ShopApi>) -> ModuleDef {
    ModuleDef::new()
        .namespaced(true)
        .state(json!({ "items": [], "checkoutStatus": null }))
        .getter("cartProducts", |state, _, root, _| {
            let catalogue = root["products"]["all"].as_array().cloned().unwrap_or_default();
            let products: Vec<Value> = state["items"]
                .as_array()
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .filter_map(|item| {
                    let product = catalogue.iter().find(|p| p["id"] == item["id"])?;
                    Some(json!({
                        "title": product["title"],
                        "price": product["price"],
                        "quantity": item["quantity"],
                    }))
                })
                .collect();
            Value::Array(products)
        })
        .getter("cartTotalPrice", |_, getters, _, _| {
            let total: i64 = getters
                .value("cartProducts")
                .as_array()
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .map(|p| int(&p["price"]) * int(&p["quantity"]))
                .sum();
            json!(total)
        })
        .mutation("pushProductToCart", |state, payload| {
            if let Some(items) = state["items"].as_array_mut() {
                items.push(json!({ "id": payload["id"], "quantity": 1 }));
            }
        })
        .mutation("incrementItemQuantity", |state, payload| {
            let Some(items) = state["items"].as_array_mut() else {
                return;
            };
            if let Some(item) = items.iter_mut().find(|i| i["id"] == payload["id"]) {
                item["quantity"] = json!(int(&item["quantity"]) + 1);
            }
        })
        .mutation("setCartItems", |state, payload| {
            state["items"] = payload["items"].clone();
        })
        .mutation("setCheckoutStatus", |state, payload| {
            state["checkoutStatus"] = payload.clone();
        })
        .action_sync("addProductToCart", |ctx, product| {
            if int(&product["inventory"]) <= 0 {
                return Ok(Value::Null);
            }
            let in_cart = ctx.state()["items"]
                .as_array()
                .map(|items| items.iter().any(|i| i["id"] == product["id"]))
                .unwrap_or(false);
            let id = json!({ "id": product["id"] });
            if in_cart {
                ctx.commit("incrementItemQuantity", id.clone())?;
            } else {
                ctx.commit("pushProductToCart", id.clone())?;
            }
            ctx.commit_with("products/decrementProductInventory", id, CommitOptions::root())?;
            Ok(Value::Null)
        })
        .action("checkout", move |ctx, _| {
            let api = Arc::clone(&api);
            async move {
                let saved = ctx.state()["items"].clone();
                ctx.commit("setCheckoutStatus", Value::Null)?;
                ctx.commit("setCartItems", json!({ "items": [] }))?;
                match api.buy_products(&saved).await {
                    Ok(()) => {
                        ctx.commit("setCheckoutStatus", json!("successful"))?;
                        Ok::<_, StoreError>(json!("successful"))
                    }
                    Err(err) => {
                        ctx.commit("setCheckoutStatus", json!("failed"))?;
                        ctx.commit("setCartItems", json!({ "items": saved }))?;
                        Err(err)
                    }
                }
            }
        })
}

/// Root module with namespaced `cart` and `products` modules
pub fn shop_module(api: Arc<ShopApi>) -> ModuleDef {
    ModuleDef::new()
        .module("cart", cart_module(Arc::clone(&api)))
        .module("products", products_module(api))
}

// ============================================================================
// DEVTOOLS
// ============================================================================

/// Inspector that records every event it receives
#[derive(Default)]
pub struct RecordingDevtools {
    events: Mutex<Vec<DevtoolsEvent>>,
    travel: Mutex<Option<TravelHandler>>,
}

impl RecordingDevtools {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingDevtools::default())
    }

    pub fn events(&self) -> Vec<DevtoolsEvent> {
        self.events.lock().clone()
    }

    /// Types of the recorded mutation events, in order
    pub fn mutation_types(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                DevtoolsEvent::Mutation { mutation, .. } => Some(mutation.kind.clone()),
                _ => None,
            })
            .collect()
    }

    /// Send a travel-to-state command; false when no store is attached
    pub fn travel_to(&self, state: Value) -> bool {
        match self.travel.lock().as_ref() {
            Some(handler) => {
                handler(state);
                true
            }
            None => false,
        }
    }
}

impl DevtoolsHook for RecordingDevtools {
    fn emit(&self, event: DevtoolsEvent) {
        self.events.lock().push(event);
    }

    fn on_travel(&self, handler: TravelHandler) {
        *self.travel.lock() = Some(handler);
    }
}
