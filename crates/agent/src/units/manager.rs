//! Answers unit start, stop and status requests
//!
//! The agent does not manage unit processes itself, so every request gets a
//! single "not supported" response on the matching response topic.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info};

use uniter_operation::CancellationToken;

use super::hub::{Hub, Subscription};
use super::{
    START_UNIT_RESPONSE_TOPIC, START_UNIT_TOPIC, STOP_UNIT_RESPONSE_TOPIC, STOP_UNIT_TOPIC,
    UNIT_STATUS_RESPONSE_TOPIC, UNIT_STATUS_TOPIC,
};

pub struct UnitsManager {
    subscriptions: Vec<Subscription>,
}

impl UnitsManager {
    /// Subscribe to the request topics on `hub`
    pub fn start(hub: Arc<dyn Hub>) -> Self {
        let stop = {
            let responder = Arc::clone(&hub);
            hub.subscribe(
                STOP_UNIT_TOPIC,
                Arc::new(move |_: &str, data: &Value| {
                    let units = parse_units(data);
                    responder.publish(
                        STOP_UNIT_RESPONSE_TOPIC,
                        not_supported(&format!("stop units for {}", units)),
                    );
                }),
            )
        };
        let start = {
            let responder = Arc::clone(&hub);
            hub.subscribe(
                START_UNIT_TOPIC,
                Arc::new(move |_: &str, data: &Value| {
                    let units = parse_units(data);
                    responder.publish(
                        START_UNIT_RESPONSE_TOPIC,
                        not_supported(&format!("start units for {}", units)),
                    );
                }),
            )
        };
        let status = {
            let responder = Arc::clone(&hub);
            hub.subscribe(
                UNIT_STATUS_TOPIC,
                Arc::new(move |_: &str, _: &Value| {
                    responder.publish(UNIT_STATUS_RESPONSE_TOPIC, not_supported("units status"));
                }),
            )
        };

        info!("Units manager subscribed");
        Self {
            subscriptions: vec![stop, start, status],
        }
    }

    /// Serve requests until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        shutdown.cancelled().await;
        self.stop();
    }

    pub fn stop(self) {
        for subscription in self.subscriptions {
            subscription.unsubscribe();
        }
        info!("Units manager stopped");
    }
}

/// Unit names from a request, rendered as `[a b]`
fn parse_units(data: &Value) -> String {
    match serde_json::from_value::<Vec<String>>(data.clone()) {
        Ok(units) => format!("[{}]", units.join(" ")),
        Err(_) => {
            error!("Request payload should be a list of unit names, got {}", data);
            "[]".to_string()
        }
    }
}

fn not_supported(what: &str) -> Value {
    json!({ "error": format!("{} not supported", what) })
}
