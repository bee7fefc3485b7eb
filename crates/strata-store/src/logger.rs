//! Logger plugin
//!
//! Logs every commit (state before, mutation, state after) and every dispatch
//! through `tracing` under the `strata::logger` target.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use strata_core::{ActionRecord, MutationRecord};
use tracing::info;

use crate::{mutation_subscriber, ActionSubscriber, Plugin, Store};

type MutationFilter = Arc<dyn Fn(&MutationRecord, &Value, &Value) -> bool + Send + Sync>;
type ActionFilter = Arc<dyn Fn(&ActionRecord, &Value) -> bool + Send + Sync>;
type StateTransformer = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Logger configuration
#[derive(Clone)]
pub struct LoggerOptions {
    /// `(mutation, state_before, state_after)`; skip the entry when false
    pub filter: Option<MutationFilter>,
    pub action_filter: Option<ActionFilter>,
    /// Applied to each state before it is logged
    pub transformer: Option<StateTransformer>,
    pub log_mutations: bool,
    pub log_actions: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        LoggerOptions {
            filter: None,
            action_filter: None,
            transformer: None,
            log_mutations: true,
            log_actions: true,
        }
    }
}

impl LoggerOptions {
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&MutationRecord, &Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn action_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ActionRecord, &Value) -> bool + Send + Sync + 'static,
    {
        self.action_filter = Some(Arc::new(filter));
        self
    }

    pub fn transformer<F>(mut self, transformer: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.transformer = Some(Arc::new(transformer));
        self
    }
}

/// Build the logger plugin
pub fn logger(options: LoggerOptions) -> Plugin {
    Arc::new(move |store: &Store| install(store, options.clone()))
}

fn install(store: &Store, options: LoggerOptions) {
    let transform = {
        let transformer = options.transformer.clone();
        move |state: &Value| match &transformer {
            Some(transformer) => transformer(state),
            None => state.clone(),
        }
    };

    if options.log_mutations {
        // owned copy: later commits must not alter the logged "before" state
        let previous = Mutex::new((*store.state()).clone());
        let filter = options.filter.clone();
        let transform = transform.clone();
        let _ = store.subscribe(mutation_subscriber(move |mutation, state| {
            let next = state.clone();
            let before = std::mem::replace(&mut *previous.lock(), next);
            if let Some(filter) = &filter {
                if !filter(mutation, &before, state) {
                    return;
                }
            }
            info!(
                target: "strata::logger",
                "mutation {} payload={} prev={} next={}",
                mutation.kind,
                mutation.payload,
                transform(&before),
                transform(state)
            );
        }));
    }

    if options.log_actions {
        let filter = options.action_filter;
        let _ = store.subscribe_action(Arc::new(ActionSubscriber::new().before(
            move |action, state| {
                if let Some(filter) = &filter {
                    if !filter(action, state) {
                        return;
                    }
                }
                info!(
                    target: "strata::logger",
                    "action {} payload={} state={}",
                    action.kind,
                    action.payload,
                    transform(state)
                );
            },
        )));
    }
}
