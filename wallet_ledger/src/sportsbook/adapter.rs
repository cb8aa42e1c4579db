//! Sportsbook and exchange settlement adapter.
//!
//! Every money-moving call carries the provider's `ext_transaction_id`,
//! recorded as reference `sb:<ext_transaction_id>`. A repeated call finds that
//! reference and echoes the recorded result instead of moving money again.
//! Bet order changes commit in the same unit as the money they go with.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use super::errors::SportsbookError;
use super::messages::{
    BonusRequest, ExchangeOutcome, Operation, PlaceBetRequest, RollbackItem, RollbackRequest,
    SettleExchangeRequest, SettleRequest, SportsbookReceipt, SportsbookResponse,
};
use super::money::{from_minor, to_minor};
use crate::bets::state_machine::{self, Outcome};
use crate::bets::{BetLookup, BetOrder, BetSide, BetStatus, NewBetOrder, OrderType, PayoutInfo};
use crate::collab::{AccountDirectory, AccountRef};
use crate::ledger::{
    ApplyRequest, AuditRecord, BetOrderWrite, Category, EntryMetadata, LedgerError, LedgerManager,
    SportsbookMetadata, Wallet, WalletRef,
};

type SbResult<T> = Result<T, SportsbookError>;

/// Caller and wallet a request operates on
struct Context {
    account: AccountRef,
    wallet: Wallet,
    operation: Operation,
    ext_transaction_id: String,
    user_id: String,
    currency: String,
}

impl Context {
    fn reference(&self) -> String {
        format!("sb:{}", self.ext_transaction_id)
    }

    fn metadata(&self, betslip_id: Option<String>, bet_ids: Vec<String>) -> EntryMetadata {
        EntryMetadata::Sportsbook(SportsbookMetadata {
            ext_transaction_id: self.ext_transaction_id.clone(),
            external_player_id: self.user_id.clone(),
            operation: self.operation.as_str().to_string(),
            betslip_id,
            bet_ids,
        })
    }

    fn receipt(
        &self,
        id: String,
        amount: Decimal,
        balance: Decimal,
    ) -> SbResult<SportsbookReceipt> {
        let out_of_range = || SportsbookError::InvalidRequest("amount out of range".to_string());
        Ok(SportsbookReceipt {
            id,
            ext_transaction_id: self.ext_transaction_id.clone(),
            user_id: self.user_id.clone(),
            operation: self.operation,
            amount: to_minor(amount).ok_or_else(out_of_range)?,
            currency: self.currency.clone(),
            balance: to_minor(balance).ok_or_else(out_of_range)?,
        })
    }
}

/// Sportsbook adapter
#[derive(Clone)]
pub struct SportsbookAdapter {
    ledger: LedgerManager,
    accounts: Arc<dyn AccountDirectory>,
    currency: String,
}

impl SportsbookAdapter {
    pub fn new(
        ledger: LedgerManager,
        accounts: Arc<dyn AccountDirectory>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            accounts,
            currency: currency.into(),
        }
    }

    /// Handle a raw request; failures become an unsuccessful envelope
    pub async fn handle(&self, operation: Operation, body: Value) -> SportsbookResponse {
        let result = match operation {
            Operation::PlaceBet => match parse(body) {
                Ok(req) => self.place_bet(req).await,
                Err(e) => Err(e),
            },
            Operation::PlaceExchangeBet => match parse(body) {
                Ok(req) => self.place_exchange_bet(req).await,
                Err(e) => Err(e),
            },
            Operation::SettleWin => match parse(body) {
                Ok(req) => self.settle_win(req).await,
                Err(e) => Err(e),
            },
            Operation::SettleLoss => match parse(body) {
                Ok(req) => self.settle_loss(req).await,
                Err(e) => Err(e),
            },
            Operation::SettleExchange => match parse(body) {
                Ok(req) => self.settle_exchange(req).await,
                Err(e) => Err(e),
            },
            Operation::Rollback => match parse(body) {
                Ok(req) => self.rollback(req).await,
                Err(e) => Err(e),
            },
            Operation::BonusPayout => match parse(body) {
                Ok(req) => self.bonus_payout(req).await,
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(receipt) => SportsbookResponse::ok(receipt),
            Err(e) => {
                if let SportsbookError::Ledger(inner) = &e {
                    log::error!("Sportsbook {} failed: {}", operation, inner);
                } else {
                    log::info!("Sportsbook {} rejected: {}", operation, e);
                }
                SportsbookResponse::failed(e.code(), e.wire_message())
            }
        }
    }

    /// Place a sportsbook bet: debit the stake and open the order
    pub async fn place_bet(&self, req: PlaceBetRequest) -> SbResult<SportsbookReceipt> {
        self.place(req, OrderType::Sportsbook, Operation::PlaceBet).await
    }

    /// Place an exchange bet; lay bets debit their liability
    pub async fn place_exchange_bet(&self, req: PlaceBetRequest) -> SbResult<SportsbookReceipt> {
        self.place(req, OrderType::Exchange, Operation::PlaceExchangeBet)
            .await
    }

    async fn place(
        &self,
        req: PlaceBetRequest,
        order_type: OrderType,
        operation: Operation,
    ) -> SbResult<SportsbookReceipt> {
        if req.amount <= 0 {
            return Err(SportsbookError::InvalidRequest(format!("stake {}", req.amount)));
        }
        let ctx = self
            .context(operation, &req.ext_transaction_id, &req.user_id, &req.currency)
            .await?;
        if let Some(receipt) = self.replay(&ctx).await? {
            return Ok(receipt);
        }

        let stake = from_minor(req.amount);
        let bet_type = match order_type {
            OrderType::Exchange => Some(req.bet_type.unwrap_or(BetSide::Back)),
            _ => None,
        };
        let debit = match (bet_type, req.liability) {
            (Some(BetSide::Lay), Some(liability)) if liability > 0 => from_minor(liability),
            _ => stake,
        };
        let category = match order_type {
            OrderType::Exchange => Category::ExchangeBet,
            _ => Category::Bet,
        };

        let bet = BetOrder::open(
            NewBetOrder {
                account_id: ctx.account.id,
                external_player_id: req.user_id.clone(),
                betslip_id: req.betslip_id.clone(),
                bet_id: req.bet_id.clone(),
                order_type,
                bet_type,
                amount: stake,
                potential_win: from_minor(req.potential_win.unwrap_or(0)),
                odds: req.odds,
                selections: req
                    .selections
                    .into_iter()
                    .map(|s| s.into_selection())
                    .collect(),
            },
            Some(ctx.reference()),
        );

        let apply = ApplyRequest::debit(ctx.wallet.id, debit, category)
            .reference(ctx.reference())
            .metadata(ctx.metadata(Some(req.betslip_id), vec![req.bet_id]))
            .bet(BetOrderWrite::Insert(bet));

        self.apply_or_replay(&ctx, vec![apply], debit).await
    }

    /// Win notification; the first call records the outcome, the payout call credits
    pub async fn settle_win(&self, req: SettleRequest) -> SbResult<SportsbookReceipt> {
        let ctx = self
            .context(Operation::SettleWin, &req.ext_transaction_id, &req.user_id, &req.currency)
            .await?;
        let mut bet = self
            .bet_of(&ctx, BetLookup::ByBet {
                bet_id: req.bet_id.clone(),
                betslip_id: req.betslip_id.clone(),
            })
            .await?;

        if !req.is_payout {
            let audit = state_machine::record_outcome(
                &mut bet,
                Outcome::Win,
                Some(&req.ext_transaction_id),
            )?;
            let bet_id = bet.id.to_string();
            if let Some(record) = audit {
                self.ledger
                    .record_bet_changes(vec![BetOrderWrite::Update(bet)], vec![record])
                    .await?;
            }
            return ctx.receipt(bet_id, Decimal::ZERO, ctx.wallet.balance);
        }

        if let Some(receipt) = self.replay(&ctx).await? {
            return Ok(receipt);
        }
        if let Some(paid) = state_machine::paid_amount(&bet) {
            log::warn!(
                "Bet {} already paid {}; ignoring payout {}",
                bet.id,
                paid,
                req.ext_transaction_id
            );
            return ctx.receipt(bet.id.to_string(), Decimal::ZERO, ctx.wallet.balance);
        }

        let payout = from_minor(req.amount.unwrap_or(0));
        if payout < Decimal::ZERO {
            return Err(SportsbookError::InvalidRequest(format!("payout {payout}")));
        }
        let audit = state_machine::record_payout(
            &mut bet,
            PayoutInfo {
                ext_transaction_id: req.ext_transaction_id.clone(),
                transaction_id: None,
                amount: payout,
                paid_at: Utc::now(),
            },
        )?;

        if payout.is_zero() {
            let bet_id = bet.id.to_string();
            self.ledger
                .record_bet_changes(vec![BetOrderWrite::Update(bet)], audit)
                .await?;
            return ctx.receipt(bet_id, Decimal::ZERO, ctx.wallet.balance);
        }

        let apply = ApplyRequest::credit(ctx.wallet.id, payout, Category::Winnings)
            .reference(ctx.reference())
            .metadata(ctx.metadata(Some(req.betslip_id), vec![req.bet_id]))
            .bet(BetOrderWrite::Update(bet))
            .audit(audit);

        self.apply_or_replay(&ctx, vec![apply], payout).await
    }

    /// Loss notification; the payout call finalizes without moving money
    pub async fn settle_loss(&self, req: SettleRequest) -> SbResult<SportsbookReceipt> {
        let ctx = self
            .context(Operation::SettleLoss, &req.ext_transaction_id, &req.user_id, &req.currency)
            .await?;
        let mut bet = self
            .bet_of(&ctx, BetLookup::ByBet {
                bet_id: req.bet_id.clone(),
                betslip_id: req.betslip_id.clone(),
            })
            .await?;
        let bet_id = bet.id.to_string();

        let audit = if req.is_payout {
            if bet.status == BetStatus::Lost && bet.finalized_at.is_some() {
                return ctx.receipt(bet_id, Decimal::ZERO, ctx.wallet.balance);
            }
            state_machine::finalize_loss(&mut bet, Some(&req.ext_transaction_id))?
        } else {
            state_machine::record_outcome(&mut bet, Outcome::Lost, Some(&req.ext_transaction_id))?
                .into_iter()
                .collect()
        };

        if !audit.is_empty() {
            self.ledger
                .record_bet_changes(vec![BetOrderWrite::Update(bet)], audit)
                .await?;
        }
        ctx.receipt(bet_id, Decimal::ZERO, ctx.wallet.balance)
    }

    /// Batch exchange settlement: each bet settles and pays in this one call
    pub async fn settle_exchange(&self, req: SettleExchangeRequest) -> SbResult<SportsbookReceipt> {
        if req.settlements.is_empty() {
            return Err(SportsbookError::InvalidRequest("no settlements".to_string()));
        }
        // Items are staged against the stored bet, so one bet may appear only once.
        let mut seen = HashSet::new();
        for item in &req.settlements {
            if !seen.insert((item.bet_id.as_str(), item.betslip_id.as_str())) {
                return Err(SportsbookError::InvalidRequest(format!(
                    "bet {} appears twice in the batch",
                    item.bet_id
                )));
            }
        }
        let ctx = self
            .context(
                Operation::SettleExchange,
                &req.ext_transaction_id,
                &req.user_id,
                &req.currency,
            )
            .await?;
        if let Some(receipt) = self.replay(&ctx).await? {
            return Ok(receipt);
        }

        let mut credits: Vec<ApplyRequest> = Vec::new();
        let mut bets: Vec<BetOrderWrite> = Vec::new();
        let mut audit: Vec<AuditRecord> = Vec::new();
        let mut total = Decimal::ZERO;
        let mut first_bet = None;

        for item in req.settlements {
            let mut bet = self
                .bet_of(&ctx, BetLookup::ByBet {
                    bet_id: item.bet_id.clone(),
                    betslip_id: item.betslip_id.clone(),
                })
                .await?;
            first_bet.get_or_insert(bet.id);

            match item.outcome {
                ExchangeOutcome::Win => {
                    if state_machine::paid_amount(&bet).is_some() {
                        continue;
                    }
                    let amount = from_minor(item.amount.unwrap_or(0));
                    if amount < Decimal::ZERO {
                        return Err(SportsbookError::InvalidRequest(format!("payout {amount}")));
                    }
                    let mut records: Vec<AuditRecord> = state_machine::record_outcome(
                        &mut bet,
                        Outcome::Win,
                        Some(&ctx.ext_transaction_id),
                    )?
                    .into_iter()
                    .collect();
                    records.extend(state_machine::record_payout(
                        &mut bet,
                        PayoutInfo {
                            ext_transaction_id: ctx.ext_transaction_id.clone(),
                            transaction_id: None,
                            amount,
                            paid_at: Utc::now(),
                        },
                    )?);

                    if amount.is_zero() {
                        bets.push(BetOrderWrite::Update(bet));
                        audit.extend(records);
                        continue;
                    }
                    // The first credit carries the plain reference so replays find it.
                    let reference = if credits.is_empty() {
                        ctx.reference()
                    } else {
                        format!("{}:{}", ctx.reference(), item.bet_id)
                    };
                    total += amount;
                    credits.push(
                        ApplyRequest::credit(ctx.wallet.id, amount, Category::ExchangeSettlement)
                            .reference(reference)
                            .metadata(ctx.metadata(Some(item.betslip_id), vec![item.bet_id]))
                            .bet(BetOrderWrite::Update(bet))
                            .audit(records),
                    );
                }
                ExchangeOutcome::Lost => {
                    if bet.status == BetStatus::Lost && bet.finalized_at.is_some() {
                        continue;
                    }
                    audit.extend(state_machine::finalize_loss(
                        &mut bet,
                        Some(&ctx.ext_transaction_id),
                    )?);
                    bets.push(BetOrderWrite::Update(bet));
                }
            }
        }

        if let Some(first) = credits.first_mut() {
            first.bets.extend(bets);
            first.audit.extend(audit);
            return self.apply_or_replay(&ctx, credits, total).await;
        }

        self.ledger.record_bet_changes(bets, audit).await?;
        let id = first_bet.map(|id| id.to_string()).unwrap_or_default();
        ctx.receipt(id, Decimal::ZERO, ctx.wallet.balance)
    }

    /// Return bets to OPEN, optionally debiting an adjustment
    pub async fn rollback(&self, req: RollbackRequest) -> SbResult<SportsbookReceipt> {
        if req.bets.is_empty() {
            return Err(SportsbookError::InvalidRequest("no bets".to_string()));
        }
        let ctx = self
            .context(Operation::Rollback, &req.ext_transaction_id, &req.user_id, &req.currency)
            .await?;
        if let Some(receipt) = self.replay(&ctx).await? {
            return Ok(receipt);
        }

        let mut bets = Vec::with_capacity(req.bets.len());
        let mut audit = Vec::new();
        let mut betslip_id = None;
        let mut bet_ids = Vec::new();
        for item in &req.bets {
            let mut bet = self.locate_for_rollback(&ctx, item).await?;
            audit.extend(state_machine::rollback(&mut bet)?);
            betslip_id.get_or_insert_with(|| bet.betslip_id.clone());
            bet_ids.push(bet.bet_id.clone());
            bets.push(bet);
        }
        let first_bet = bets.first().map(|b| b.id.to_string()).unwrap_or_default();
        let writes: Vec<BetOrderWrite> = bets.into_iter().map(BetOrderWrite::Update).collect();

        let adjustment = from_minor(req.amount.unwrap_or(0));
        if adjustment < Decimal::ZERO {
            return Err(SportsbookError::InvalidRequest(format!("adjustment {adjustment}")));
        }
        if adjustment.is_zero() {
            self.ledger.record_bet_changes(writes, audit).await?;
            return ctx.receipt(first_bet, Decimal::ZERO, ctx.wallet.balance);
        }

        let mut apply = ApplyRequest::debit(ctx.wallet.id, adjustment, Category::Rollback)
            .reference(ctx.reference())
            .metadata(ctx.metadata(betslip_id, bet_ids))
            .audit(audit);
        apply.bets = writes;

        self.apply_or_replay(&ctx, vec![apply], adjustment).await
    }

    /// Credit a bonus and record it as a completed BONUS order
    pub async fn bonus_payout(&self, req: BonusRequest) -> SbResult<SportsbookReceipt> {
        if req.amount <= 0 {
            return Err(SportsbookError::InvalidRequest(format!("bonus {}", req.amount)));
        }
        let ctx = self
            .context(Operation::BonusPayout, &req.ext_transaction_id, &req.user_id, &req.currency)
            .await?;
        if let Some(receipt) = self.replay(&ctx).await? {
            return Ok(receipt);
        }

        let amount = from_minor(req.amount);
        let betslip_id = req.betslip_id.unwrap_or_else(|| req.bonus_id.clone());
        let bet_id = req.bet_id.unwrap_or_else(|| req.ext_transaction_id.clone());
        let mut bet = BetOrder::open(
            NewBetOrder {
                account_id: ctx.account.id,
                external_player_id: req.user_id.clone(),
                betslip_id: betslip_id.clone(),
                bet_id: bet_id.clone(),
                order_type: OrderType::Bonus,
                bet_type: None,
                amount,
                potential_win: amount,
                odds: Decimal::ONE,
                selections: Vec::new(),
            },
            Some(ctx.reference()),
        );
        bet.metadata.bonus_id = Some(req.bonus_id);
        let audit = state_machine::complete(&mut bet)?;

        let apply = ApplyRequest::credit(ctx.wallet.id, amount, Category::Bonus)
            .reference(ctx.reference())
            .metadata(ctx.metadata(Some(betslip_id), vec![bet_id]))
            .bet(BetOrderWrite::Insert(bet))
            .audit(audit);

        self.apply_or_replay(&ctx, vec![apply], amount).await
    }

    async fn context(
        &self,
        operation: Operation,
        ext_transaction_id: &str,
        user_id: &str,
        currency: &str,
    ) -> SbResult<Context> {
        if currency != self.currency {
            return Err(SportsbookError::UnsupportedCurrency(currency.to_string()));
        }
        let account = self.accounts.resolve_by_external_player_id(user_id).await?;
        let wallet = self.ledger.get_balance(WalletRef::Account(account.id)).await?;
        Ok(Context {
            account,
            wallet,
            operation,
            ext_transaction_id: ext_transaction_id.to_string(),
            user_id: user_id.to_string(),
            currency: currency.to_string(),
        })
    }

    /// Receipt of an already applied call with this reference
    async fn replay(&self, ctx: &Context) -> SbResult<Option<SportsbookReceipt>> {
        let Some(existing) = self.ledger.store().find_by_reference(&ctx.reference()).await? else {
            return Ok(None);
        };
        if existing.wallet_id != ctx.wallet.id {
            return Err(SportsbookError::TransactionConflict(ctx.ext_transaction_id.clone()));
        }

        let current = self.ledger.get_balance(WalletRef::Wallet(ctx.wallet.id)).await?;
        log::info!(
            "Sportsbook {} replay of {}",
            ctx.operation,
            ctx.ext_transaction_id
        );
        ctx.receipt(existing.id.to_string(), existing.amount, current.balance)
            .map(Some)
    }

    async fn apply_or_replay(
        &self,
        ctx: &Context,
        requests: Vec<ApplyRequest>,
        amount: Decimal,
    ) -> SbResult<SportsbookReceipt> {
        match self.ledger.apply_batch(requests).await {
            Ok(applied) => {
                let (Some(first), Some(last)) = (applied.first(), applied.last()) else {
                    return Err(LedgerError::Decode("commit returned no legs".to_string()).into());
                };
                log::info!(
                    "Sportsbook {} ext={} amount={} balance={}",
                    ctx.operation,
                    ctx.ext_transaction_id,
                    amount,
                    last.balance
                );
                ctx.receipt(first.transaction_id.to_string(), amount, last.balance)
            }
            Err(LedgerError::DuplicateReference(reference)) => match self.replay(ctx).await? {
                Some(receipt) => Ok(receipt),
                None => Err(SportsbookError::TransactionConflict(reference)),
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn bet_of(&self, ctx: &Context, lookup: BetLookup) -> SbResult<BetOrder> {
        match self.ledger.store().bet_order(&lookup).await? {
            Some(bet) if bet.account_id == ctx.account.id => Ok(bet),
            _ => Err(SportsbookError::BetNotFound(lookup.to_string())),
        }
    }

    async fn locate_for_rollback(&self, ctx: &Context, item: &RollbackItem) -> SbResult<BetOrder> {
        let by_event = item.event_id.as_ref().map(|event_id| BetLookup::ByBetslipEvent {
            betslip_id: item.betslip_id.clone(),
            event_id: event_id.clone(),
        });

        match (&item.bet_id, by_event) {
            (Some(bet_id), fallback) => {
                let primary = BetLookup::ByBet {
                    bet_id: bet_id.clone(),
                    betslip_id: item.betslip_id.clone(),
                };
                match (self.bet_of(ctx, primary).await, fallback) {
                    (Ok(bet), _) => Ok(bet),
                    (Err(SportsbookError::BetNotFound(_)), Some(fallback)) => {
                        self.bet_of(ctx, fallback).await
                    }
                    (Err(e), _) => Err(e),
                }
            }
            (None, Some(by_event)) => self.bet_of(ctx, by_event).await,
            (None, None) => Err(SportsbookError::InvalidRequest(
                "rollback needs bet_id or event_id".to_string(),
            )),
        }
    }
}

fn parse<T: DeserializeOwned>(body: Value) -> SbResult<T> {
    serde_json::from_value(body).map_err(|e| SportsbookError::InvalidRequest(e.to_string()))
}
