//! Economy engine: atomic wallet mutations paired with ledger entries.
//!
//! Every operation re-reads the wallet rows it touches inside a fresh
//! [`UnitOfWork`], validates against that locked state, and then runs the
//! four ledger steps (insert pending entry, mutate balance, complete entry,
//! commit). An error anywhere drops the unit and with it every write.

use uuid::Uuid;

use crate::domain::{
    CurrencyType, EntryDetails, Transaction, TransactionId, TransactionType, UserId, Wallet,
    WalletId,
};
use crate::error::EconomyError;
use crate::persistence::{HistoryFilter, Store, UnitOfWork};

/// Category stamped on the debit leg of a transfer.
pub const TRANSFER_OUT_CATEGORY: &str = "transfer_out";
/// Category stamped on the credit leg of a transfer.
pub const TRANSFER_IN_CATEGORY: &str = "transfer_in";

/// A completed ledger entry and the wallet balance it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerOutcome {
    /// The completed entry.
    pub transaction: Transaction,
    /// Wallet balance in the entry's currency after commit.
    pub new_balance: i64,
}

/// Both legs of a committed transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutcome {
    /// Debit leg on the sender's wallet.
    pub outgoing: Transaction,
    /// Credit leg on the recipient's wallet.
    pub incoming: Transaction,
    /// Sender's balance after commit.
    pub new_balance: i64,
}

/// Orchestration layer for balance-affecting operations.
///
/// Stateless coordinator over a [`Store`]; holds no balances between
/// calls.
#[derive(Debug, Clone)]
pub struct EconomyService {
    store: Store,
}

impl EconomyService {
    /// Creates a new `EconomyService`.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Resolves the user's wallet through their game profile.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::ProfileNotFound`] or
    /// [`EconomyError::WalletNotFound`] when either link is missing.
    pub async fn wallet_for_user(&self, user_id: UserId) -> Result<Wallet, EconomyError> {
        let profile = self
            .store
            .find_profile_by_user(user_id)
            .await?
            .ok_or(EconomyError::ProfileNotFound)?;
        self.store
            .find_wallet_by_profile(profile.id)
            .await?
            .ok_or(EconomyError::WalletNotFound)
    }

    /// Applies one signed `amount` to a wallet together with its ledger
    /// entry, atomically.
    ///
    /// Credits need only an unlocked wallet; debits also need a covering
    /// balance.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidAmount`] for a zero amount,
    /// [`EconomyError::WalletNotFound`], [`EconomyError::WalletLocked`],
    /// [`EconomyError::InsufficientBalance`], or a persistence error. No
    /// write survives a failure.
    pub async fn execute_transaction(
        &self,
        wallet_id: WalletId,
        kind: TransactionType,
        currency: CurrencyType,
        amount: i64,
        details: EntryDetails,
    ) -> Result<LedgerOutcome, EconomyError> {
        if amount == 0 {
            return Err(EconomyError::InvalidAmount(amount));
        }

        let mut unit = self.store.begin().await?;
        let mut wallet = unit
            .wallet_for_update(wallet_id)
            .await?
            .ok_or(EconomyError::WalletNotFound)?;
        validate_entry(&wallet, currency, amount)?;

        let entry = Transaction::pending(&wallet, kind, currency, amount, details);
        let entry = apply_entry(&mut unit, &mut wallet, entry).await?;
        unit.commit().await?;

        let new_balance = wallet.get_balance(currency);
        tracing::info!(
            %wallet_id,
            transaction_id = %entry.id,
            kind = %kind,
            %currency,
            amount,
            new_balance,
            "transaction completed"
        );
        Ok(LedgerOutcome {
            transaction: entry,
            new_balance,
        })
    }

    /// Credits the user's wallet with an `earn` entry.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidAmount`] unless `amount > 0`, a
    /// not-found error for a missing profile or wallet,
    /// [`EconomyError::WalletLocked`], or a persistence error.
    pub async fn add_money(
        &self,
        user_id: UserId,
        currency: CurrencyType,
        amount: i64,
        details: EntryDetails,
    ) -> Result<LedgerOutcome, EconomyError> {
        require_positive(amount)?;
        let wallet = self.wallet_for_user(user_id).await?;
        self.execute_transaction(wallet.id, TransactionType::Earn, currency, amount, details)
            .await
    }

    /// Debits the user's wallet with a `spend` entry.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidAmount`] unless `amount > 0`, a
    /// not-found error for a missing profile or wallet,
    /// [`EconomyError::WalletLocked`] carrying the lock reason,
    /// [`EconomyError::InsufficientBalance`], or a persistence error.
    pub async fn spend_money(
        &self,
        user_id: UserId,
        currency: CurrencyType,
        amount: i64,
        details: EntryDetails,
    ) -> Result<LedgerOutcome, EconomyError> {
        require_positive(amount)?;
        let wallet = self.wallet_for_user(user_id).await?;
        self.execute_transaction(
            wallet.id,
            TransactionType::Spend,
            currency,
            amount.saturating_neg(),
            details,
        )
        .await
    }

    /// Moves `amount` from one user's wallet to another's.
    ///
    /// Both wallet rows are locked in ascending id order. The two legs
    /// share a `transfer:<uuid>` reference and point at each other's
    /// wallet through `to_wallet_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::SelfTransfer`], [`EconomyError::InvalidAmount`],
    /// a not-found error for either side, [`EconomyError::WalletLocked`] or
    /// [`EconomyError::RecipientWalletLocked`],
    /// [`EconomyError::InsufficientBalance`], or a persistence error.
    pub async fn transfer_money(
        &self,
        from_user: UserId,
        to_user: UserId,
        currency: CurrencyType,
        amount: i64,
        description: String,
    ) -> Result<TransferOutcome, EconomyError> {
        if from_user == to_user {
            return Err(EconomyError::SelfTransfer);
        }
        require_positive(amount)?;

        let source = self.wallet_for_user(from_user).await?;
        let destination = self
            .wallet_for_user(to_user)
            .await
            .map_err(|err| match err {
                EconomyError::ProfileNotFound | EconomyError::WalletNotFound => {
                    EconomyError::RecipientWalletNotFound
                }
                other => other,
            })?;

        let mut unit = self.store.begin().await?;
        let (mut from, mut to) = lock_pair(&mut unit, source.id, destination.id).await?;

        let debit = amount.saturating_neg();
        validate_entry(&from, currency, debit)?;
        if to.is_locked {
            tracing::warn!(wallet_id = %to.id, "transfer rejected: destination locked");
            return Err(EconomyError::RecipientWalletLocked);
        }
        ensure_representable(&to, currency, amount)?;

        let reference = format!("transfer:{}", Uuid::new_v4());
        let outgoing = Transaction::pending(
            &from,
            TransactionType::Transfer,
            currency,
            debit,
            EntryDetails {
                description: description.clone(),
                category: TRANSFER_OUT_CATEGORY.to_string(),
                reference: reference.clone(),
                ..EntryDetails::default()
            },
        )
        .with_counterpart(to.id);
        let incoming = Transaction::pending(
            &to,
            TransactionType::Transfer,
            currency,
            amount,
            EntryDetails {
                description,
                category: TRANSFER_IN_CATEGORY.to_string(),
                reference: reference.clone(),
                ..EntryDetails::default()
            },
        )
        .with_counterpart(from.id);

        let outgoing = apply_entry(&mut unit, &mut from, outgoing).await?;
        let incoming = apply_entry(&mut unit, &mut to, incoming).await?;
        unit.commit().await?;

        let new_balance = from.get_balance(currency);
        tracing::info!(
            from_wallet = %from.id,
            to_wallet = %to.id,
            %currency,
            amount,
            %reference,
            "transfer completed"
        );
        Ok(TransferOutcome {
            outgoing,
            incoming,
            new_balance,
        })
    }

    /// Reverses a completed entry in the user's wallet.
    ///
    /// The reversing entry carries the inverse amount (`refund` for a
    /// reversed debit, `penalty` for a reversed credit) and a `reverses`
    /// link; the original becomes `reversed` with `reversed_by` set.
    /// Transfer legs cannot be reversed.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::TransactionNotFound`],
    /// [`EconomyError::NotReversible`], [`EconomyError::WalletLocked`],
    /// [`EconomyError::InsufficientBalance`] when a reversed credit has
    /// already been spent, or a persistence error.
    pub async fn reverse_transaction(
        &self,
        user_id: UserId,
        transaction_id: TransactionId,
    ) -> Result<LedgerOutcome, EconomyError> {
        let wallet = self.wallet_for_user(user_id).await?;

        let mut unit = self.store.begin().await?;
        let mut wallet = unit
            .wallet_for_update(wallet.id)
            .await?
            .ok_or(EconomyError::WalletNotFound)?;
        let mut original = unit
            .transaction_for_update(wallet.id, transaction_id)
            .await?
            .ok_or(EconomyError::TransactionNotFound(transaction_id))?;

        if original.kind == TransactionType::Transfer || !original.can_be_reversed() {
            return Err(EconomyError::NotReversible(transaction_id));
        }

        let inverse = original.amount.saturating_neg();
        let kind = if original.amount < 0 {
            TransactionType::Refund
        } else {
            TransactionType::Penalty
        };
        validate_entry(&wallet, original.currency, inverse)?;

        let reversal = Transaction::pending(
            &wallet,
            kind,
            original.currency,
            inverse,
            EntryDetails {
                description: format!("reversal of {}", original.id),
                category: original.category.clone(),
                reference: original.reference.clone(),
                ..EntryDetails::default()
            },
        )
        .reversing(original.id);
        let reversal = apply_entry(&mut unit, &mut wallet, reversal).await?;
        original.reverse(&reversal)?;
        unit.update_transaction(&original).await?;
        unit.commit().await?;

        let new_balance = wallet.get_balance(original.currency);
        tracing::info!(
            wallet_id = %wallet.id,
            original = %original.id,
            reversal = %reversal.id,
            amount = inverse,
            "transaction reversed"
        );
        Ok(LedgerOutcome {
            transaction: reversal,
            new_balance,
        })
    }

    /// One page of the user's ledger, newest first, plus the total count.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for a missing profile or wallet, or a
    /// persistence error.
    pub async fn history(
        &self,
        user_id: UserId,
        filter: &HistoryFilter,
    ) -> Result<(Vec<Transaction>, u64), EconomyError> {
        let wallet = self.wallet_for_user(user_id).await?;
        self.store.list_transactions(wallet.id, filter).await
    }

    /// Loads one entry from the user's own wallet.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::TransactionNotFound`] if the entry does not
    /// exist or belongs to another wallet.
    pub async fn get_transaction(
        &self,
        user_id: UserId,
        transaction_id: TransactionId,
    ) -> Result<Transaction, EconomyError> {
        let wallet = self.wallet_for_user(user_id).await?;
        self.store
            .find_transaction(wallet.id, transaction_id)
            .await?
            .ok_or(EconomyError::TransactionNotFound(transaction_id))
    }
}

fn require_positive(amount: i64) -> Result<(), EconomyError> {
    if amount <= 0 {
        return Err(EconomyError::InvalidAmount(amount));
    }
    Ok(())
}

/// Checks a signed amount against a wallet read under its row lock.
fn validate_entry(wallet: &Wallet, currency: CurrencyType, amount: i64) -> Result<(), EconomyError> {
    if wallet.is_locked {
        tracing::warn!(wallet_id = %wallet.id, reason = %wallet.lock_reason, "operation rejected: wallet locked");
        return Err(EconomyError::WalletLocked {
            reason: wallet.lock_reason.clone(),
        });
    }
    let requested = amount.saturating_abs();
    if amount < 0 && !wallet.has_sufficient_balance(currency, requested) {
        let available = wallet.get_balance(currency);
        tracing::warn!(wallet_id = %wallet.id, %currency, available, requested, "operation rejected: insufficient balance");
        return Err(EconomyError::InsufficientBalance {
            currency,
            available,
            requested,
        });
    }
    ensure_representable(wallet, currency, amount)
}

/// Rejects a credit whose resulting balance would not fit in an `i64`.
fn ensure_representable(
    wallet: &Wallet,
    currency: CurrencyType,
    amount: i64,
) -> Result<(), EconomyError> {
    if wallet.get_balance(currency).checked_add(amount).is_none() {
        tracing::warn!(wallet_id = %wallet.id, %currency, amount, "operation rejected: balance overflow");
        return Err(EconomyError::InvalidAmount(amount));
    }
    Ok(())
}

/// Runs the ledger steps for one pending entry inside `unit`.
async fn apply_entry(
    unit: &mut UnitOfWork,
    wallet: &mut Wallet,
    mut entry: Transaction,
) -> Result<Transaction, EconomyError> {
    unit.insert_transaction(&entry).await?;
    wallet.add_balance(entry.currency, entry.amount);
    unit.save_wallet(wallet).await?;
    entry.complete()?;
    unit.update_transaction(&entry).await?;
    Ok(entry)
}

/// Locks both wallets in ascending id order, returning them as
/// `(source, destination)`.
async fn lock_pair(
    unit: &mut UnitOfWork,
    source: WalletId,
    destination: WalletId,
) -> Result<(Wallet, Wallet), EconomyError> {
    let (first, second) = if source < destination {
        (source, destination)
    } else {
        (destination, source)
    };
    let first_row = unit.wallet_for_update(first).await?;
    let second_row = unit.wallet_for_update(second).await?;
    let (from, to) = if first == source {
        (first_row, second_row)
    } else {
        (second_row, first_row)
    };
    Ok((
        from.ok_or(EconomyError::WalletNotFound)?,
        to.ok_or(EconomyError::RecipientWalletNotFound)?,
    ))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{GameProfile, TransactionStatus};
    use crate::persistence::MemoryStore;

    async fn seed_user(store: &Store) -> (UserId, WalletId) {
        let user_id = UserId::new();
        let profile = GameProfile::new(user_id);
        let wallet = Wallet::new(profile.id);
        let Ok(()) = store.insert_profile(&profile).await else {
            panic!("profile insert failed");
        };
        let Ok(()) = store.insert_wallet(&wallet).await else {
            panic!("wallet insert failed");
        };
        (user_id, wallet.id)
    }

    fn make_service() -> (EconomyService, MemoryStore) {
        let memory = MemoryStore::new();
        (EconomyService::new(Store::Memory(memory.clone())), memory)
    }

    async fn balance(service: &EconomyService, user: UserId, currency: CurrencyType) -> i64 {
        let Ok(wallet) = service.wallet_for_user(user).await else {
            panic!("wallet missing");
        };
        wallet.get_balance(currency)
    }

    #[tokio::test]
    async fn earn_then_spend_scenario() {
        let (service, _) = make_service();
        let (user, _) = seed_user(&service.store).await;

        let Ok(earned) = service
            .add_money(user, CurrencyType::Coins, 1000, EntryDetails::default())
            .await
        else {
            panic!("earn failed");
        };
        assert_eq!(earned.new_balance, 1000);
        assert_eq!(earned.transaction.status, TransactionStatus::Completed);
        assert_eq!(earned.transaction.balance_before, 0);
        assert_eq!(earned.transaction.balance_after, 1000);

        let Ok(spent) = service
            .spend_money(user, CurrencyType::Coins, 400, EntryDetails::default())
            .await
        else {
            panic!("spend failed");
        };
        assert_eq!(spent.new_balance, 600);
        assert_eq!(spent.transaction.amount, -400);
        assert_eq!(
            spent.transaction.balance_after - spent.transaction.balance_before,
            spent.transaction.amount
        );

        let rejected = service
            .spend_money(user, CurrencyType::Coins, 10_000, EntryDetails::default())
            .await;
        assert!(matches!(
            rejected,
            Err(EconomyError::InsufficientBalance {
                available: 600,
                requested: 10_000,
                ..
            })
        ));
        assert_eq!(balance(&service, user, CurrencyType::Coins).await, 600);

        let Ok((entries, total)) = service.history(user, &HistoryFilter::page(20, 0)).await else {
            panic!("history failed");
        };
        assert_eq!(total, 2);
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let (service, _) = make_service();
        let (user, _) = seed_user(&service.store).await;
        for amount in [0, -5] {
            assert!(matches!(
                service
                    .add_money(user, CurrencyType::Gems, amount, EntryDetails::default())
                    .await,
                Err(EconomyError::InvalidAmount(_))
            ));
        }
    }

    #[tokio::test]
    async fn transfer_moves_balance_and_links_legs() {
        let (service, _) = make_service();
        let (alice, alice_wallet) = seed_user(&service.store).await;
        let (bob, bob_wallet) = seed_user(&service.store).await;
        let Ok(_) = service
            .add_money(alice, CurrencyType::Coins, 500, EntryDetails::default())
            .await
        else {
            panic!("earn failed");
        };

        let Ok(outcome) = service
            .transfer_money(alice, bob, CurrencyType::Coins, 500, "gift".to_string())
            .await
        else {
            panic!("transfer failed");
        };
        assert_eq!(outcome.new_balance, 0);
        assert_eq!(balance(&service, alice, CurrencyType::Coins).await, 0);
        assert_eq!(balance(&service, bob, CurrencyType::Coins).await, 500);

        assert_eq!(outcome.outgoing.amount, -500);
        assert_eq!(outcome.outgoing.to_wallet_id, Some(bob_wallet));
        assert_eq!(outcome.incoming.amount, 500);
        assert_eq!(outcome.incoming.to_wallet_id, Some(alice_wallet));
        assert!(outcome.outgoing.is_transfer() && outcome.incoming.is_transfer());
        assert!(outcome.outgoing.reference.starts_with("transfer:"));
        assert_eq!(outcome.outgoing.reference, outcome.incoming.reference);
        assert_eq!(outcome.outgoing.category, TRANSFER_OUT_CATEGORY);
        assert_eq!(outcome.incoming.category, TRANSFER_IN_CATEGORY);

        let Ok((alice_entries, _)) = service.history(alice, &HistoryFilter::page(20, 0)).await
        else {
            panic!("history failed");
        };
        let Ok((bob_entries, _)) = service.history(bob, &HistoryFilter::page(20, 0)).await else {
            panic!("history failed");
        };
        assert_eq!(bob_entries.len(), 1);
        let legs: Vec<&Transaction> = alice_entries
            .iter()
            .chain(bob_entries.iter())
            .filter(|entry| entry.is_transfer())
            .collect();
        assert_eq!(legs.len(), 2);
        for leg in legs {
            assert_eq!(leg.status, TransactionStatus::Completed);
            assert!(leg.processed_at.is_some());
            assert_eq!(leg.balance_after - leg.balance_before, leg.amount);
        }
    }

    #[tokio::test]
    async fn credit_past_i64_max_is_rejected_before_any_write() {
        let (service, _) = make_service();
        let (user, _) = seed_user(&service.store).await;
        let (peer, _) = seed_user(&service.store).await;
        for owner in [user, peer] {
            let Ok(_) = service
                .add_money(owner, CurrencyType::Coins, i64::MAX, EntryDetails::default())
                .await
            else {
                panic!("earn failed");
            };
        }

        assert!(matches!(
            service
                .add_money(user, CurrencyType::Coins, 5, EntryDetails::default())
                .await,
            Err(EconomyError::InvalidAmount(5))
        ));
        let Ok(_) = service
            .spend_money(peer, CurrencyType::Coins, 5, EntryDetails::default())
            .await
        else {
            panic!("spend failed");
        };
        assert!(matches!(
            service
                .transfer_money(peer, user, CurrencyType::Coins, 5, String::new())
                .await,
            Err(EconomyError::InvalidAmount(5))
        ));

        assert_eq!(balance(&service, user, CurrencyType::Coins).await, i64::MAX);
        assert_eq!(
            balance(&service, peer, CurrencyType::Coins).await,
            i64::MAX - 5
        );
        let Ok((entries, total)) = service.history(user, &HistoryFilter::page(20, 0)).await else {
            panic!("history failed");
        };
        assert_eq!(total, 1);
        assert!(
            entries
                .iter()
                .all(|entry| entry.balance_after - entry.balance_before == entry.amount)
        );
    }

    #[tokio::test]
    async fn self_transfer_is_rejected() {
        let (service, _) = make_service();
        let (user, _) = seed_user(&service.store).await;
        assert!(matches!(
            service
                .transfer_money(user, user, CurrencyType::Coins, 1, String::new())
                .await,
            Err(EconomyError::SelfTransfer)
        ));
    }

    #[tokio::test]
    async fn transfer_to_user_without_wallet_is_not_found() {
        let (service, _) = make_service();
        let (user, _) = seed_user(&service.store).await;
        assert!(matches!(
            service
                .transfer_money(user, UserId::new(), CurrencyType::Coins, 1, String::new())
                .await,
            Err(EconomyError::RecipientWalletNotFound)
        ));
    }

    #[tokio::test]
    async fn locked_wallet_rejects_spend_and_earn_without_mutation() {
        let (service, memory) = make_service();
        let (user, wallet_id) = seed_user(&service.store).await;
        let Ok(_) = service
            .add_money(user, CurrencyType::Coins, 100, EntryDetails::default())
            .await
        else {
            panic!("earn failed");
        };

        let store = Store::Memory(memory);
        let Ok(mut unit) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(Some(mut wallet)) = unit.wallet_for_update(wallet_id).await else {
            panic!("wallet missing");
        };
        wallet.lock("chargeback");
        let Ok(()) = unit.save_wallet(&wallet).await else {
            panic!("save failed");
        };
        let Ok(()) = unit.commit().await else {
            panic!("commit failed");
        };

        let spend = service
            .spend_money(user, CurrencyType::Coins, 10, EntryDetails::default())
            .await;
        let Err(EconomyError::WalletLocked { reason }) = spend else {
            panic!("expected locked wallet");
        };
        assert_eq!(reason, "chargeback");
        assert!(matches!(
            service
                .add_money(user, CurrencyType::Coins, 10, EntryDetails::default())
                .await,
            Err(EconomyError::WalletLocked { .. })
        ));
        assert_eq!(balance(&service, user, CurrencyType::Coins).await, 100);
    }

    #[tokio::test]
    async fn transfer_to_locked_wallet_changes_nothing() {
        let (service, memory) = make_service();
        let (alice, _) = seed_user(&service.store).await;
        let (bob, bob_wallet) = seed_user(&service.store).await;
        let Ok(_) = service
            .add_money(alice, CurrencyType::Gems, 50, EntryDetails::default())
            .await
        else {
            panic!("earn failed");
        };

        let store = Store::Memory(memory);
        let Ok(mut unit) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(Some(mut wallet)) = unit.wallet_for_update(bob_wallet).await else {
            panic!("wallet missing");
        };
        wallet.lock("audit");
        let Ok(()) = unit.save_wallet(&wallet).await else {
            panic!("save failed");
        };
        let Ok(()) = unit.commit().await else {
            panic!("commit failed");
        };

        assert!(matches!(
            service
                .transfer_money(alice, bob, CurrencyType::Gems, 50, String::new())
                .await,
            Err(EconomyError::RecipientWalletLocked)
        ));
        assert_eq!(balance(&service, alice, CurrencyType::Gems).await, 50);
        assert_eq!(balance(&service, bob, CurrencyType::Gems).await, 0);
    }

    #[tokio::test]
    async fn failed_ledger_step_rolls_back_everything() {
        let (service, memory) = make_service();
        let (alice, _) = seed_user(&service.store).await;
        let (bob, _) = seed_user(&service.store).await;
        let Ok(_) = service
            .add_money(alice, CurrencyType::Coins, 300, EntryDetails::default())
            .await
        else {
            panic!("earn failed");
        };

        memory.fail_ledger_updates(true);
        assert!(matches!(
            service
                .spend_money(alice, CurrencyType::Coins, 100, EntryDetails::default())
                .await,
            Err(EconomyError::PersistenceError(_))
        ));
        assert!(
            service
                .transfer_money(alice, bob, CurrencyType::Coins, 100, String::new())
                .await
                .is_err()
        );
        memory.fail_ledger_updates(false);

        assert_eq!(balance(&service, alice, CurrencyType::Coins).await, 300);
        assert_eq!(balance(&service, bob, CurrencyType::Coins).await, 0);
        let Ok((_, total)) = service.history(alice, &HistoryFilter::page(20, 0)).await else {
            panic!("history failed");
        };
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn reversal_succeeds_exactly_once() {
        let (service, _) = make_service();
        let (user, _) = seed_user(&service.store).await;
        let Ok(_) = service
            .add_money(user, CurrencyType::Coins, 100, EntryDetails::default())
            .await
        else {
            panic!("earn failed");
        };
        let Ok(spent) = service
            .spend_money(user, CurrencyType::Coins, 40, EntryDetails::default())
            .await
        else {
            panic!("spend failed");
        };

        let Ok(reversal) = service
            .reverse_transaction(user, spent.transaction.id)
            .await
        else {
            panic!("reversal failed");
        };
        assert_eq!(reversal.transaction.kind, TransactionType::Refund);
        assert_eq!(reversal.transaction.amount, 40);
        assert_eq!(reversal.transaction.reverses, Some(spent.transaction.id));
        assert_eq!(reversal.new_balance, 100);

        let Ok(original) = service.get_transaction(user, spent.transaction.id).await else {
            panic!("original missing");
        };
        assert_eq!(original.status, TransactionStatus::Reversed);
        assert_eq!(original.reversed_by, Some(reversal.transaction.id));

        assert!(matches!(
            service.reverse_transaction(user, spent.transaction.id).await,
            Err(EconomyError::NotReversible(_))
        ));
        assert_eq!(balance(&service, user, CurrencyType::Coins).await, 100);
    }

    #[tokio::test]
    async fn reversing_a_spent_credit_needs_balance() {
        let (service, _) = make_service();
        let (user, _) = seed_user(&service.store).await;
        let Ok(earned) = service
            .add_money(user, CurrencyType::Tokens, 10, EntryDetails::default())
            .await
        else {
            panic!("earn failed");
        };
        let Ok(_) = service
            .spend_money(user, CurrencyType::Tokens, 8, EntryDetails::default())
            .await
        else {
            panic!("spend failed");
        };
        assert!(matches!(
            service.reverse_transaction(user, earned.transaction.id).await,
            Err(EconomyError::InsufficientBalance { .. })
        ));
    }

    #[tokio::test]
    async fn transfer_legs_are_not_reversible() {
        let (service, _) = make_service();
        let (alice, _) = seed_user(&service.store).await;
        let (bob, _) = seed_user(&service.store).await;
        let Ok(_) = service
            .add_money(alice, CurrencyType::Coins, 10, EntryDetails::default())
            .await
        else {
            panic!("earn failed");
        };
        let Ok(outcome) = service
            .transfer_money(alice, bob, CurrencyType::Coins, 10, String::new())
            .await
        else {
            panic!("transfer failed");
        };
        assert!(matches!(
            service.reverse_transaction(alice, outcome.outgoing.id).await,
            Err(EconomyError::NotReversible(_))
        ));
    }

    #[tokio::test]
    async fn transactions_are_scoped_to_owner() {
        let (service, _) = make_service();
        let (alice, _) = seed_user(&service.store).await;
        let (bob, _) = seed_user(&service.store).await;
        let Ok(earned) = service
            .add_money(alice, CurrencyType::Coins, 10, EntryDetails::default())
            .await
        else {
            panic!("earn failed");
        };
        assert!(matches!(
            service.get_transaction(bob, earned.transaction.id).await,
            Err(EconomyError::TransactionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_spends_never_overdraw() {
        let (service, _) = make_service();
        let (user, _) = seed_user(&service.store).await;
        let Ok(_) = service
            .add_money(user, CurrencyType::Coins, 100, EntryDetails::default())
            .await
        else {
            panic!("earn failed");
        };

        let mut handles = Vec::new();
        for _ in 0..10 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .spend_money(user, CurrencyType::Coins, 30, EntryDetails::default())
                    .await
                    .is_ok()
            }));
        }
        let mut succeeded = 0;
        for handle in handles {
            let Ok(ok) = handle.await else {
                panic!("task panicked");
            };
            if ok {
                succeeded += 1;
            }
        }
        assert_eq!(succeeded, 3);
        assert_eq!(balance(&service, user, CurrencyType::Coins).await, 10);
    }
}
