//! The notification pipeline: audit gate, channel validation, trigger
//! engine, dispatch ledger, read-receipt reconciliation and the scheduled
//! autopilot pass.
//!
//! Components depend on the store contracts in [`store`] and on the
//! provider traits from `courier-events`, never on concrete backends.
//! [`Pipeline::new`] wires the production implementations.

pub mod audit_gate;
pub mod autopilot;
pub mod channel_validator;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod reconciler;
pub mod store;
pub mod trigger_engine;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use courier_core::clock::{Clock, SystemClock};
use courier_db::DbPool;
use courier_events::{HttpChannelSender, MessageSender, MtprotoBridgeConnector, SessionConnector};

pub use audit_gate::AuditGate;
pub use autopilot::{AgentPass, AgentPassOutcome, AutopilotRunner, DispatchCounts, PassReport};
pub use channel_validator::{ChannelReport, ChannelValidator, UsableChannel};
pub use config::PipelineConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{PipelineError, StoreError};
pub use ledger::{Ledger, NewNotification, ReceiptKind, ReceiptOutcome};
pub use reconciler::{ReadReceiptReconciler, ReconcileReport};
pub use store::PgStore;
pub use trigger_engine::TriggerEngine;

/// Every pipeline component, wired to shared stores and providers.
#[derive(Clone)]
pub struct Pipeline {
    pub audit: Arc<AuditGate>,
    pub validator: ChannelValidator,
    pub triggers: TriggerEngine,
    pub ledger: Ledger,
    pub dispatcher: Dispatcher,
    pub autopilot: AutopilotRunner,
    pub reconciler: Arc<ReadReceiptReconciler>,
}

impl Pipeline {
    /// Production wiring: Postgres stores, HTTP senders, the MTProto bridge
    /// (when `MTPROTO_BRIDGE_URL` is set) and the system clock.
    pub fn new(pool: DbPool, config: &PipelineConfig) -> Result<Self, PipelineError> {
        let store = Arc::new(PgStore::new(pool));
        let sender = Arc::new(HttpChannelSender::new(
            config.endpoints.clone(),
            config.provider_timeout,
        )?);
        let connector = match &config.endpoints.mtproto_bridge_url {
            Some(url) => {
                let bridge = MtprotoBridgeConnector::new(url.clone(), config.provider_timeout)?;
                Some(Arc::new(bridge) as Arc<dyn SessionConnector>)
            }
            None => None,
        };
        Ok(Self::from_parts(
            store,
            sender,
            connector,
            Arc::new(SystemClock),
            config,
        ))
    }

    /// Wire the components around any store that implements every contract.
    pub fn from_parts<S>(
        store: Arc<S>,
        sender: Arc<dyn MessageSender>,
        connector: Option<Arc<dyn SessionConnector>>,
        clock: Arc<dyn Clock>,
        config: &PipelineConfig,
    ) -> Self
    where
        S: store::AuditStore
            + store::SettingsStore
            + store::TriggerStore
            + store::LedgerStore
            + 'static,
    {
        let audit = Arc::new(AuditGate::new(
            store.clone(),
            clock.clone(),
            config.audit_cache_ttl,
        ));
        let validator = ChannelValidator::new(store.clone());
        let triggers = TriggerEngine::new(store.clone(), validator.clone());
        let ledger = Ledger::new(store.clone(), clock);
        let dispatcher = Dispatcher::new(ledger.clone(), sender);
        let autopilot = AutopilotRunner::new(
            triggers.clone(),
            ledger.clone(),
            dispatcher.clone(),
            config.autopilot_utc_offset,
        );
        let reconciler = Arc::new(ReadReceiptReconciler::new(
            store,
            ledger.clone(),
            connector,
            config.provider_timeout,
        ));
        Self {
            audit,
            validator,
            triggers,
            ledger,
            dispatcher,
            autopilot,
            reconciler,
        }
    }
}
