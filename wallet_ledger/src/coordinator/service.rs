//! Transaction coordinator: role checks and ticket bookkeeping around money movement.
//!
//! The monetary operation is authoritative. Once it has committed, a failure to
//! update the ticket is logged and the operation still reports success.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::requests::{
    DepositRequest, PartnerTransferRequest, RejectDepositRequest, RejectWithdrawalRequest,
    WithdrawalHoldRequest, WithdrawalRequest, WithdrawalRequested,
};
use crate::collab::{
    AccountDirectory, AccountRole, ConversationEntry, Ticket, TicketKind, TicketPatch,
    TicketResolution, TicketService, TicketStatus,
};
use crate::hold::{ExecuteHold, HoldManager, HoldOutcome};
use crate::ledger::{
    AccountId, Applied, ApplyRequest, Category, EntryMetadata, HoldMetadata, LedgerError,
    LedgerManager, LedgerResult, StaffMetadata, Transfer, TransferRequest, WalletRef,
};

/// Who is acting on an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Actor {
    Staff,
    Admin,
}

/// Transaction coordinator
#[derive(Clone)]
pub struct TransactionCoordinator {
    ledger: LedgerManager,
    holds: HoldManager,
    accounts: Arc<dyn AccountDirectory>,
    tickets: Arc<dyn TicketService>,
}

impl TransactionCoordinator {
    pub fn new(
        ledger: LedgerManager,
        holds: HoldManager,
        accounts: Arc<dyn AccountDirectory>,
        tickets: Arc<dyn TicketService>,
    ) -> Self {
        Self {
            ledger,
            holds,
            accounts,
            tickets,
        }
    }

    /// Staff deposit into a customer account
    ///
    /// # Errors
    ///
    /// * `LedgerError::OperationNotAllowed` - Target is a partner account
    /// * `LedgerError::InvalidAmount` - Amount is not positive
    pub async fn staff_deposit(&self, request: DepositRequest) -> LedgerResult<Applied> {
        self.deposit(Actor::Staff, request).await
    }

    /// Deposit without the partner restriction
    pub async fn admin_deposit(&self, request: DepositRequest) -> LedgerResult<Applied> {
        self.deposit(Actor::Admin, request).await
    }

    /// Staff confirmation of a withdrawal
    ///
    /// # Errors
    ///
    /// * `LedgerError::OperationNotAllowed` - Target is a partner account
    /// * `LedgerError::HoldNotFound` - Hold missing or released
    pub async fn staff_withdrawal(&self, request: WithdrawalRequest) -> LedgerResult<HoldOutcome> {
        self.withdrawal(Actor::Staff, request).await
    }

    /// Withdrawal without the partner restriction
    pub async fn admin_withdrawal(&self, request: WithdrawalRequest) -> LedgerResult<HoldOutcome> {
        self.withdrawal(Actor::Admin, request).await
    }

    /// Release the hold of a rejected withdrawal, then close its ticket
    pub async fn reject_withdrawal(
        &self,
        request: RejectWithdrawalRequest,
    ) -> LedgerResult<HoldOutcome> {
        let outcome = self
            .holds
            .release_hold(request.hold_id, &request.reason, Some(request.staff_id))
            .await?;

        if let Some(ticket_id) = request.ticket_id {
            let resolution = TicketResolution {
                staff_id: request.staff_id,
                action: "reject_withdrawal".to_string(),
                amount: None,
                transaction_id: Some(request.hold_id),
                note: Some(request.reason.clone()),
                resolved_at: Utc::now(),
            };
            let message = format!("Withdrawal rejected: {}", request.reason);
            self.record_ticket(
                ticket_id,
                TicketStatus::Rejected,
                resolution,
                request.staff_id,
                message,
            )
            .await;
        }

        Ok(outcome)
    }

    /// Reject a deposit request; no money has moved yet
    ///
    /// # Errors
    ///
    /// * `LedgerError::TicketNotFound` - Ticket does not exist
    /// * `LedgerError::OperationNotAllowed` - Ticket is not a deposit ticket
    pub async fn reject_deposit(&self, request: RejectDepositRequest) -> LedgerResult<Ticket> {
        let ticket = self.tickets.get_ticket(request.ticket_id).await?;
        if ticket.kind != TicketKind::Deposit {
            return Err(LedgerError::OperationNotAllowed(format!(
                "ticket {} is not a deposit request",
                ticket.id
            )));
        }

        let patch = TicketPatch {
            status: Some(TicketStatus::Rejected),
            resolution: Some(TicketResolution {
                staff_id: request.staff_id,
                action: "reject_deposit".to_string(),
                amount: None,
                transaction_id: None,
                note: Some(request.reason.clone()),
                resolved_at: Utc::now(),
            }),
        };
        let ticket = self.tickets.update_ticket(ticket.id, patch).await?;
        self.tickets
            .append_conversation(
                ticket.id,
                ConversationEntry {
                    author_id: request.staff_id,
                    message: format!("Deposit rejected: {}", request.reason),
                },
            )
            .await?;

        log::info!("Deposit ticket {} rejected by staff {}", ticket.id, request.staff_id);
        Ok(ticket)
    }

    /// Reserve a customer withdrawal until staff execute or reject it
    ///
    /// Retrying with the same ticket returns the existing hold.
    pub async fn request_withdrawal(
        &self,
        request: WithdrawalHoldRequest,
    ) -> LedgerResult<WithdrawalRequested> {
        let ticket_id = match request.ticket_id {
            Some(id) => self.tickets.get_ticket(id).await?.id,
            None => {
                self.tickets
                    .open_ticket(request.account_id, TicketKind::Withdrawal)
                    .await?
                    .id
            }
        };

        let hold = self
            .holds
            .create_hold(
                request.account_id,
                request.amount,
                Some(format!("withdrawal-request:ticket:{ticket_id}")),
                HoldMetadata {
                    ticket_id: Some(ticket_id),
                    note: request.note,
                },
            )
            .await?;

        Ok(WithdrawalRequested { ticket_id, hold })
    }

    /// Move funds from a partner account to another account in one commit
    pub async fn partner_transfer(
        &self,
        request: PartnerTransferRequest,
    ) -> LedgerResult<Transfer> {
        let from = self.accounts.account(request.from_account_id).await?;
        if from.role != AccountRole::Partner {
            return Err(LedgerError::OperationNotAllowed(format!(
                "account {} is not a partner",
                from.id
            )));
        }
        let to = self.accounts.account(request.to_account_id).await?;

        let from_wallet = self.ledger.get_balance(WalletRef::Account(from.id)).await?;
        let to_wallet = self.ledger.get_balance(WalletRef::Account(to.id)).await?;

        self.ledger
            .transfer(TransferRequest {
                from: from_wallet.id,
                to: to_wallet.id,
                amount: request.amount,
                reference: request.reference,
                staff_id: Some(request.staff_id),
                note: request.note,
            })
            .await
    }

    async fn deposit(&self, actor: Actor, request: DepositRequest) -> LedgerResult<Applied> {
        self.ensure_allowed(actor, request.account_id).await?;
        let wallet = self
            .ledger
            .get_balance(WalletRef::Account(request.account_id))
            .await?;

        if let Some(reference) = &request.reference {
            if let Some(existing) = self.ledger.store().find_by_reference(reference).await? {
                if existing.wallet_id != wallet.id || existing.category != Category::Deposit {
                    return Err(LedgerError::DuplicateReference(reference.clone()));
                }
                return Ok(Applied {
                    balance: wallet.balance,
                    transaction_id: existing.id,
                    transaction: existing,
                    wallet,
                });
            }
        }

        let applied = self
            .ledger
            .apply_transaction(
                ApplyRequest::credit(wallet.id, request.amount, Category::Deposit)
                    .maybe_reference(request.reference.clone())
                    .metadata(EntryMetadata::Staff(StaffMetadata {
                        staff_id: request.staff_id,
                        ticket_id: request.ticket_id,
                        description: request.description.clone(),
                    })),
            )
            .await?;

        log::info!(
            "Deposit {} to account {} by staff {} (balance {})",
            request.amount,
            request.account_id,
            request.staff_id,
            applied.balance
        );

        if let Some(ticket_id) = request.ticket_id {
            let resolution = TicketResolution {
                staff_id: request.staff_id,
                action: "deposit".to_string(),
                amount: Some(request.amount),
                transaction_id: Some(applied.transaction_id),
                note: request.description,
                resolved_at: Utc::now(),
            };
            let message = format!(
                "Deposit of {} credited, transaction {}",
                request.amount, applied.transaction_id
            );
            self.record_ticket(
                ticket_id,
                TicketStatus::Approved,
                resolution,
                request.staff_id,
                message,
            )
            .await;
        }

        Ok(applied)
    }

    async fn withdrawal(
        &self,
        actor: Actor,
        request: WithdrawalRequest,
    ) -> LedgerResult<HoldOutcome> {
        self.ensure_allowed(actor, request.account_id).await?;

        let amount = match (request.hold_id, request.amount) {
            (None, None) => return Err(LedgerError::InvalidAmount(Decimal::ZERO)),
            (_, amount) => amount.unwrap_or(Decimal::ZERO),
        };

        let outcome = self
            .holds
            .execute_hold(ExecuteHold {
                hold_id: request.hold_id,
                account_id: request.account_id,
                amount,
                staff_id: request.staff_id,
                description: request.description.clone(),
                ticket_id: request.ticket_id,
                idempotency_key: request.idempotency_key,
            })
            .await?;

        if let Some(ticket_id) = request.ticket_id {
            let resolution = TicketResolution {
                staff_id: request.staff_id,
                action: "withdrawal".to_string(),
                amount: request.amount,
                transaction_id: Some(outcome.hold_id),
                note: request.description,
                resolved_at: Utc::now(),
            };
            let message = format!("Withdrawal executed, transaction {}", outcome.hold_id);
            self.record_ticket(
                ticket_id,
                TicketStatus::Approved,
                resolution,
                request.staff_id,
                message,
            )
            .await;
        }

        Ok(outcome)
    }

    async fn ensure_allowed(&self, actor: Actor, account_id: AccountId) -> LedgerResult<()> {
        if actor == Actor::Admin {
            return Ok(());
        }
        let account = self.accounts.account(account_id).await?;
        if account.role == AccountRole::Partner {
            return Err(LedgerError::OperationNotAllowed(
                "partner accounts require the admin operation".to_string(),
            ));
        }
        Ok(())
    }

    /// Best-effort ticket update after a committed money movement
    async fn record_ticket(
        &self,
        ticket_id: i64,
        status: TicketStatus,
        resolution: TicketResolution,
        staff_id: i64,
        message: String,
    ) {
        let patch = TicketPatch {
            status: Some(status),
            resolution: Some(resolution),
        };
        if let Err(e) = self.tickets.update_ticket(ticket_id, patch).await {
            log::warn!("Failed to update ticket {}: {}", ticket_id, e);
            return;
        }

        let entry = ConversationEntry {
            author_id: staff_id,
            message,
        };
        if let Err(e) = self.tickets.append_conversation(ticket_id, entry).await {
            log::warn!("Failed to append conversation to ticket {}: {}", ticket_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{AccountRef, MemoryAccountDirectory, MemoryTicketService};
    use crate::ledger::{LedgerStore, MemoryLedgerStore};

    struct Fixture {
        coordinator: TransactionCoordinator,
        ledger: LedgerManager,
        tickets: Arc<MemoryTicketService>,
    }

    async fn fixture() -> Fixture {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let ledger = LedgerManager::new(store.clone());
        let holds = HoldManager::new(store);
        let accounts = Arc::new(
            MemoryAccountDirectory::new()
                .with_account(AccountRef {
                    id: 1,
                    external_player_id: "customer".into(),
                    role: AccountRole::Customer,
                })
                .with_account(AccountRef {
                    id: 2,
                    external_player_id: "partner".into(),
                    role: AccountRole::Partner,
                }),
        );
        let tickets = Arc::new(MemoryTicketService::new());
        ledger.create_wallet(1, "INR").await.unwrap();
        ledger.create_wallet(2, "INR").await.unwrap();

        Fixture {
            coordinator: TransactionCoordinator::new(
                ledger.clone(),
                holds,
                accounts,
                tickets.clone(),
            ),
            ledger,
            tickets,
        }
    }

    fn deposit(account_id: AccountId, amount: i64) -> DepositRequest {
        DepositRequest {
            account_id,
            amount: Decimal::from(amount),
            staff_id: 7,
            description: None,
            reference: None,
            ticket_id: None,
        }
    }

    #[tokio::test]
    async fn test_staff_deposit_rejects_partner() {
        let f = fixture().await;
        let result = f.coordinator.staff_deposit(deposit(2, 100)).await;
        assert!(matches!(result, Err(LedgerError::OperationNotAllowed(_))));

        let applied = f.coordinator.admin_deposit(deposit(2, 100)).await.unwrap();
        assert_eq!(applied.balance, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_deposit_resolves_ticket() {
        let f = fixture().await;
        let ticket = f.tickets.open_ticket(1, TicketKind::Deposit).await.unwrap();

        let mut request = deposit(1, 250);
        request.ticket_id = Some(ticket.id);
        let applied = f.coordinator.staff_deposit(request).await.unwrap();

        let ticket = f.tickets.get_ticket(ticket.id).await.unwrap();
        assert_eq!(ticket.status, TicketStatus::Approved);
        assert_eq!(
            ticket.resolution.and_then(|r| r.transaction_id),
            Some(applied.transaction_id)
        );
        assert_eq!(f.tickets.conversation(ticket.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_ticket_does_not_fail_deposit() {
        let f = fixture().await;
        let mut request = deposit(1, 40);
        request.ticket_id = Some(999);

        let applied = f.coordinator.staff_deposit(request).await.unwrap();
        assert_eq!(applied.balance, Decimal::from(40));
    }

    #[tokio::test]
    async fn test_deposit_reference_replays() {
        let f = fixture().await;
        let mut request = deposit(1, 40);
        request.reference = Some("bank:1".into());

        let first = f.coordinator.staff_deposit(request.clone()).await.unwrap();
        let second = f.coordinator.staff_deposit(request).await.unwrap();
        assert_eq!(first.transaction_id, second.transaction_id);
        assert_eq!(second.balance, Decimal::from(40));
    }

    #[tokio::test]
    async fn test_withdrawal_request_then_reject() {
        let f = fixture().await;
        f.coordinator.staff_deposit(deposit(1, 200)).await.unwrap();

        let requested = f
            .coordinator
            .request_withdrawal(WithdrawalHoldRequest {
                account_id: 1,
                amount: Decimal::from(150),
                ticket_id: None,
                note: None,
            })
            .await
            .unwrap();
        assert_eq!(requested.hold.balance, Decimal::from(50));
        assert_eq!(requested.hold.hold_balance, Decimal::from(150));

        let released = f
            .coordinator
            .reject_withdrawal(RejectWithdrawalRequest {
                hold_id: requested.hold.hold_id,
                staff_id: 7,
                reason: "documents missing".into(),
                ticket_id: Some(requested.ticket_id),
            })
            .await
            .unwrap();
        assert_eq!(released.balance, Decimal::from(200));
        assert_eq!(released.hold_balance, Decimal::ZERO);

        let ticket = f.tickets.get_ticket(requested.ticket_id).await.unwrap();
        assert_eq!(ticket.status, TicketStatus::Rejected);
    }

    #[tokio::test]
    async fn test_withdrawal_executes_hold() {
        let f = fixture().await;
        f.coordinator.staff_deposit(deposit(1, 100)).await.unwrap();
        let requested = f
            .coordinator
            .request_withdrawal(WithdrawalHoldRequest {
                account_id: 1,
                amount: Decimal::from(60),
                ticket_id: None,
                note: None,
            })
            .await
            .unwrap();

        let outcome = f
            .coordinator
            .staff_withdrawal(WithdrawalRequest {
                account_id: 1,
                hold_id: Some(requested.hold.hold_id),
                amount: None,
                staff_id: 7,
                description: Some("bank transfer".into()),
                ticket_id: Some(requested.ticket_id),
                idempotency_key: None,
            })
            .await
            .unwrap();
        assert_eq!(outcome.balance, Decimal::from(40));
        assert_eq!(outcome.hold_balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_withdrawal_hold_must_belong_to_account() {
        let f = fixture().await;
        f.coordinator.admin_deposit(deposit(2, 100)).await.unwrap();
        let partner_hold = f
            .coordinator
            .request_withdrawal(WithdrawalHoldRequest {
                account_id: 2,
                amount: Decimal::from(60),
                ticket_id: None,
                note: None,
            })
            .await
            .unwrap();

        // Naming a customer account does not lift the partner restriction.
        let result = f
            .coordinator
            .staff_withdrawal(WithdrawalRequest {
                account_id: 1,
                hold_id: Some(partner_hold.hold.hold_id),
                amount: None,
                staff_id: 7,
                description: None,
                ticket_id: None,
                idempotency_key: None,
            })
            .await;
        assert!(matches!(result, Err(LedgerError::HoldNotFound(_))));

        let partner = f.ledger.get_balance(WalletRef::Account(2)).await.unwrap();
        assert_eq!(partner.balance, Decimal::from(40));
        assert_eq!(partner.hold_balance, Decimal::from(60));

        let result = f
            .coordinator
            .staff_withdrawal(WithdrawalRequest {
                account_id: 2,
                hold_id: Some(partner_hold.hold.hold_id),
                amount: None,
                staff_id: 7,
                description: None,
                ticket_id: None,
                idempotency_key: None,
            })
            .await;
        assert!(matches!(result, Err(LedgerError::OperationNotAllowed(_))));

        let outcome = f
            .coordinator
            .admin_withdrawal(WithdrawalRequest {
                account_id: 2,
                hold_id: Some(partner_hold.hold.hold_id),
                amount: None,
                staff_id: 7,
                description: None,
                ticket_id: None,
                idempotency_key: None,
            })
            .await
            .unwrap();
        assert_eq!(outcome.hold_balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_reject_deposit_requires_deposit_ticket() {
        let f = fixture().await;
        let withdrawal = f.tickets.open_ticket(1, TicketKind::Withdrawal).await.unwrap();
        let result = f
            .coordinator
            .reject_deposit(RejectDepositRequest {
                ticket_id: withdrawal.id,
                staff_id: 7,
                reason: "no".into(),
            })
            .await;
        assert!(matches!(result, Err(LedgerError::OperationNotAllowed(_))));

        let result = f
            .coordinator
            .reject_deposit(RejectDepositRequest {
                ticket_id: 404,
                staff_id: 7,
                reason: "no".into(),
            })
            .await;
        assert!(matches!(result, Err(LedgerError::TicketNotFound(404))));
    }

    #[tokio::test]
    async fn test_partner_transfer() {
        let f = fixture().await;
        f.coordinator.admin_deposit(deposit(2, 500)).await.unwrap();

        let transfer = f
            .coordinator
            .partner_transfer(PartnerTransferRequest {
                from_account_id: 2,
                to_account_id: 1,
                amount: Decimal::from(120),
                staff_id: 7,
                reference: None,
                note: None,
            })
            .await
            .unwrap();
        assert_eq!(transfer.debit.balance, Decimal::from(380));
        assert_eq!(transfer.credit.balance, Decimal::from(120));

        let customer = f.ledger.get_balance(WalletRef::Account(1)).await.unwrap();
        assert_eq!(customer.balance, Decimal::from(120));

        let reversed = f
            .coordinator
            .partner_transfer(PartnerTransferRequest {
                from_account_id: 1,
                to_account_id: 2,
                amount: Decimal::from(1),
                staff_id: 7,
                reference: None,
                note: None,
            })
            .await;
        assert!(matches!(reversed, Err(LedgerError::OperationNotAllowed(_))));
    }
}
