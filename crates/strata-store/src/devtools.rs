//! Devtools bridge
//!
//! Mirrors the store to an external inspector. Outbound: store constructed,
//! every committed mutation, every dispatched action, action failures.
//! Inbound: replace the whole live state with a snapshot ("time travel").

use std::sync::Arc;

use serde_json::Value;
use strata_core::{ActionRecord, MutationRecord};
use tracing::error;

use crate::{mutation_subscriber, ActionSubscriber, Store, SubscribeOptions};

/// Events emitted to the inspector
#[derive(Clone, Debug, PartialEq)]
pub enum DevtoolsEvent {
    Init { state: Value },
    Mutation { mutation: MutationRecord, state: Value },
    Action { action: ActionRecord, state: Value },
    Error { message: String },
}

/// Inbound "travel to state" command handler
pub type TravelHandler = Box<dyn Fn(Value) + Send + Sync>;

/// The inspector side of the bridge
pub trait DevtoolsHook: Send + Sync {
    fn emit(&self, event: DevtoolsEvent);

    /// Register the handler the inspector calls to replace the state
    fn on_travel(&self, handler: TravelHandler);
}

/// Connect a store to an inspector
pub fn attach(store: &Store, hook: Arc<dyn DevtoolsHook>) {
    store.set_devtools_hook(Arc::clone(&hook));

    hook.emit(DevtoolsEvent::Init {
        state: (*store.state()).clone(),
    });

    let weak = store.downgrade();
    hook.on_travel(Box::new(move |target: Value| {
        let Some(store) = weak.upgrade() else {
            return;
        };
        if let Err(err) = store.replace_state(target) {
            error!("devtools travel-to-state failed: {}", err);
        }
    }));

    let mutations = Arc::clone(&hook);
    let _ = store.subscribe_with(
        mutation_subscriber(move |mutation, state| {
            mutations.emit(DevtoolsEvent::Mutation {
                mutation: mutation.clone(),
                state: state.clone(),
            })
        }),
        SubscribeOptions::prepend(),
    );

    let actions = hook;
    let _ = store.subscribe_action_with(
        Arc::new(ActionSubscriber::new().before(move |action, state| {
            actions.emit(DevtoolsEvent::Action {
                action: action.clone(),
                state: state.clone(),
            })
        })),
        SubscribeOptions::prepend(),
    );
}
