use crate::command::{Command, Response};
use crate::engine::LedgerEngine;
use crate::error::LedgerResult;
use crate::storage::LogStorage;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, warn};

/// Turns decoded messages into ledger operations and response frames.
///
/// Clones share one engine. The engine lock is held for the whole of a
/// message, so commands from all connections are applied one at a time.
pub struct CommandProcessor<S> {
    ledger: Arc<Mutex<LedgerEngine<S>>>,
}

impl<S> Clone for CommandProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<S: LogStorage> CommandProcessor<S> {
    pub fn new(engine: LedgerEngine<S>) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(engine)),
        }
    }

    /// Handle one inbound message.
    ///
    /// Yields an optional error frame followed by the balance frame, which is
    /// always present.
    pub fn process(&self, msg: &Value) -> Vec<Response> {
        debug!("Received {msg}");

        let mut engine = self.lock();
        let mut responses = Vec::with_capacity(2);

        match Command::decode(msg) {
            Ok(Command::Deposit { amount }) => {
                if engine.can_deposit(amount) {
                    let result = engine.deposit(amount);
                    responses.extend(Self::failure(result));
                } else {
                    warn!("Deposit of {amount} rejected");
                    responses.push(Response::Rejected);
                }
            }
            Ok(Command::Withdraw { amount }) => {
                if engine.can_withdraw(amount) {
                    let result = engine.withdraw(amount);
                    responses.extend(Self::failure(result));
                } else {
                    warn!("Withdrawal of {amount} rejected, balance {}", engine.balance());
                    responses.push(Response::Rejected);
                }
            }
            Ok(Command::Balance) => {}
            Ok(Command::Unknown(cmd)) => debug!("Ignoring unknown command {cmd:?}"),
            Err(e) => {
                warn!("Rejected malformed command: {e}");
                responses.push(Response::Rejected);
            }
        }

        responses.push(Response::Balance(engine.balance()));

        responses
    }

    /// Current cached balance
    pub fn balance(&self) -> Decimal {
        self.lock().balance()
    }

    /// Run `f` with exclusive access to the engine
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut LedgerEngine<S>) -> T) -> T {
        f(&mut self.lock())
    }

    fn failure(result: LedgerResult<Decimal>) -> Option<Response> {
        match result {
            Ok(_) => None,
            Err(e) if e.is_rejection() => {
                warn!("{e}");
                Some(Response::Rejected)
            }
            Err(e) => {
                error!("Command not applied: {e}");
                Some(Response::Unavailable)
            }
        }
    }

    // The engine only updates its cache after a successful commit, so its
    // state stays consistent even if a holder panicked.
    fn lock(&self) -> MutexGuard<'_, LedgerEngine<S>> {
        self.ledger.lock().unwrap_or_else(|poisoned| {
            error!("Ledger lock poisoned, continuing with last consistent state");
            PoisonError::into_inner(poisoned)
        })
    }
}
