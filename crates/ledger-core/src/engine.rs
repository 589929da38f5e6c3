use crate::command::Command;
use crate::error::{LedgerError, LedgerResult};
use crate::log::TransactionLog;
use crate::record::HashedRecord;
use crate::storage::LogStorage;
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Balance engine over a single transaction log.
///
/// The cached balance always equals the replayed balance of the log: a
/// command is made durable first and only then reflected in the cache.
#[derive(Debug)]
pub struct LedgerEngine<S> {
    log: TransactionLog<S>,
    balance: Decimal,
}

impl<S: LogStorage> LedgerEngine<S> {
    pub fn new(log: TransactionLog<S>) -> LedgerResult<Self> {
        let balance = Self::calculate_balance(log.dump())?;

        info!("Initial balance {balance} from {} records", log.len());

        Ok(Self { log, balance })
    }

    /// Left fold over the records: deposits add, withdrawals subtract,
    /// anything else is skipped
    pub fn calculate_balance(records: &[HashedRecord]) -> LedgerResult<Decimal> {
        records
            .iter()
            .enumerate()
            .try_fold(Decimal::ZERO, |acc, (index, record)| {
                match record.value.balance_delta() {
                    Some(delta) => acc
                        .checked_add(delta)
                        .ok_or(LedgerError::ReplayOverflow { index }),
                    None => Ok(acc),
                }
            })
    }

    /// Cached balance
    pub const fn balance(&self) -> Decimal {
        self.balance
    }

    /// Refresh the cache from the log and return it
    pub fn recalculate_balance(&mut self) -> LedgerResult<Decimal> {
        let replayed = Self::calculate_balance(self.log.dump())?;

        if replayed != self.balance {
            warn!(
                "Cached balance {} drifted from log, replayed {replayed}",
                self.balance
            );
        }
        self.balance = replayed;

        Ok(replayed)
    }

    pub fn get_balance(&mut self, recalculate: bool) -> LedgerResult<Decimal> {
        if recalculate {
            return self.recalculate_balance();
        }

        Ok(self.balance)
    }

    pub fn can_deposit(&self, amount: Decimal) -> bool {
        amount >= Decimal::ZERO
    }

    pub fn can_withdraw(&self, amount: Decimal) -> bool {
        amount <= self.balance
    }

    /// Apply a deposit; returns the new balance
    pub fn deposit(&mut self, amount: Decimal) -> LedgerResult<Decimal> {
        if !self.can_deposit(amount) {
            return Err(LedgerError::Rejected {
                cmd: "deposit",
                amount,
                balance: self.balance,
            });
        }

        let balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow {
                cmd: "deposit",
                amount,
            })?;

        self.commit(Command::Deposit { amount }, balance)
    }

    /// Apply a withdrawal; returns the new balance
    pub fn withdraw(&mut self, amount: Decimal) -> LedgerResult<Decimal> {
        if !self.can_withdraw(amount) {
            return Err(LedgerError::Rejected {
                cmd: "withdraw",
                amount,
                balance: self.balance,
            });
        }

        let balance = self
            .balance
            .checked_sub(amount)
            .ok_or(LedgerError::Overflow {
                cmd: "withdraw",
                amount,
            })?;

        self.commit(Command::Withdraw { amount }, balance)
    }

    fn commit(&mut self, value: Command, balance: Decimal) -> LedgerResult<Decimal> {
        let record = self.log.commit(value)?;
        info!("Logged {} ({})", record.value.to_json(), record.hash);

        self.balance = balance;

        Ok(balance)
    }

    pub const fn log(&self) -> &TransactionLog<S> {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogError;
    use crate::storage::{FileStorage, MemoryStorage};

    fn engine() -> (LedgerEngine<MemoryStorage>, MemoryStorage) {
        let storage = MemoryStorage::new();
        let log = TransactionLog::open(storage.clone(), false).unwrap();

        (LedgerEngine::new(log).unwrap(), storage)
    }

    fn dec(amount: i64) -> Decimal {
        Decimal::from(amount)
    }

    #[test]
    fn test_deposit() {
        let (mut engine, storage) = engine();

        assert_eq!(engine.deposit(dec(100)).unwrap(), dec(100));
        assert_eq!(engine.balance(), dec(100));
        assert_eq!(storage.stored().unwrap().len(), 1);
    }

    #[test]
    fn test_withdrawal() {
        let (mut engine, _) = engine();

        engine.deposit(Decimal::new(100, 1)).unwrap();
        engine.withdraw(Decimal::new(50, 1)).unwrap();

        assert_eq!(engine.balance(), Decimal::new(50, 1));
        assert_eq!(engine.log().len(), 2);
    }

    #[test]
    fn test_insufficient_funds() {
        let (mut engine, storage) = engine();
        engine.deposit(dec(100)).unwrap();

        let result = engine.withdraw(dec(150));

        assert!(matches!(result, Err(LedgerError::Rejected { .. })));
        assert_eq!(engine.balance(), dec(100));
        assert_eq!(storage.stored().unwrap().len(), 1);
    }

    #[test]
    fn test_withdraw_entire_balance() {
        let (mut engine, _) = engine();
        engine.deposit(dec(100)).unwrap();

        engine.withdraw(dec(100)).unwrap();

        assert_eq!(engine.balance(), Decimal::ZERO);
        assert_eq!(engine.log().len(), 2);
        assert!(engine.log().dump()[1].verify());
    }

    #[test]
    fn test_negative_deposit_rejected() {
        let (mut engine, _) = engine();

        assert!(!engine.can_deposit(dec(-1)));
        assert!(engine.can_deposit(Decimal::ZERO));
        assert!(engine.deposit(dec(-1)).unwrap_err().is_rejection());
        assert!(engine.log().is_empty());
    }

    #[test]
    fn test_can_withdraw_reads_current_balance() {
        let (mut engine, _) = engine();

        assert!(!engine.can_withdraw(dec(1)));
        engine.deposit(dec(1)).unwrap();
        assert!(engine.can_withdraw(dec(1)));
        assert!(!engine.can_withdraw(dec(2)));
    }

    #[test]
    fn test_cache_matches_replay_at_every_step() {
        let (mut engine, _) = engine();
        let steps: [(bool, i64); 8] = [
            (true, 100),
            (false, 30),
            (false, 80),
            (true, 5),
            (false, 75),
            (true, 0),
            (false, 0),
            (true, 12),
        ];

        for (is_deposit, amount) in steps {
            let _ = if is_deposit {
                engine.deposit(dec(amount))
            } else {
                engine.withdraw(dec(amount))
            };

            let cached = engine.get_balance(false).unwrap();
            assert_eq!(engine.get_balance(true).unwrap(), cached);
        }

        assert_eq!(engine.balance(), dec(12));
    }

    #[test]
    fn test_replay_ignores_other_commands() {
        let records = vec![
            HashedRecord::new(Command::Deposit { amount: dec(10) }),
            HashedRecord::new(Command::Unknown("transfer".into())),
            HashedRecord::new(Command::Balance),
            HashedRecord::new(Command::Withdraw { amount: dec(3) }),
        ];

        assert_eq!(LedgerEngine::<MemoryStorage>::calculate_balance(&records).unwrap(), dec(7));
    }

    #[test]
    fn test_replay_is_exact() {
        let records: Vec<_> = (0..1000)
            .map(|_| HashedRecord::new(Command::Deposit {
                amount: Decimal::new(1, 1),
            }))
            .collect();

        assert_eq!(LedgerEngine::<MemoryStorage>::calculate_balance(&records).unwrap(), dec(100));
    }

    #[test]
    fn test_balance_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");

        let log = TransactionLog::open(FileStorage::new(&path).unwrap(), false).unwrap();
        let mut engine = LedgerEngine::new(log).unwrap();
        engine.deposit(dec(250)).unwrap();
        engine.withdraw(Decimal::new(1275, 1)).unwrap();
        let before = engine.balance();

        let log = TransactionLog::open(FileStorage::new(&path).unwrap(), false).unwrap();
        let reloaded = LedgerEngine::new(log).unwrap();

        assert_eq!(reloaded.balance(), before);
        assert_eq!(reloaded.balance(), Decimal::new(1225, 1));
    }

    #[test]
    fn test_fractional_balance_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        let wire = [
            serde_json::json!({ "cmd": "deposit", "amount": 39506.295968788996 }),
            serde_json::json!({ "cmd": "deposit", "amount": 0.1 }),
            serde_json::json!({ "cmd": "withdraw", "amount": 1234.567891 }),
        ];

        let log = TransactionLog::open(FileStorage::new(&path).unwrap(), false).unwrap();
        let mut engine = LedgerEngine::new(log).unwrap();
        for msg in &wire {
            match Command::decode(msg).unwrap() {
                Command::Deposit { amount } => engine.deposit(amount).unwrap(),
                Command::Withdraw { amount } => engine.withdraw(amount).unwrap(),
                other => panic!("unexpected {other:?}"),
            };
        }
        let before = engine.balance();

        let log = TransactionLog::open(FileStorage::new(&path).unwrap(), false).unwrap();
        let reloaded = LedgerEngine::new(log).unwrap();

        assert_eq!(before, "38271.828077788996".parse::<Decimal>().unwrap());
        assert_eq!(reloaded.balance(), before);
        assert_eq!(reloaded.log().dump(), engine.log().dump());
    }

    #[test]
    fn test_failed_persist_leaves_balance_unchanged() {
        let (mut engine, storage) = engine();
        engine.deposit(dec(100)).unwrap();

        storage.fail_writes(true);
        let result = engine.withdraw(dec(40));

        assert!(matches!(result, Err(LedgerError::Log(LogError::Unavailable(_)))));
        assert_eq!(engine.balance(), dec(100));
        assert_eq!(engine.log().len(), 1);
        assert_eq!(engine.get_balance(true).unwrap(), dec(100));

        storage.fail_writes(false);
        engine.withdraw(dec(40)).unwrap();
        assert_eq!(engine.balance(), dec(60));
    }

    #[test]
    fn test_overflow_rejected() {
        let (mut engine, _) = engine();
        engine.deposit(Decimal::MAX).unwrap();

        let result = engine.deposit(dec(1));

        assert!(matches!(result, Err(LedgerError::Overflow { .. })));
        assert_eq!(engine.balance(), Decimal::MAX);
    }
}
