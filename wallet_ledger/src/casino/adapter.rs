//! Casino one-wallet adapter.
//!
//! Every inbound body is verified before any field is read, and every reply,
//! failures included, is signed. The adapter never returns an error to its
//! caller: failures become signed `{error, balance?}` bodies.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::errors::CasinoError;
use super::messages::{
    BalanceRequest, CasinoRequest, RoundInfoRequest, WalletRequest, balance_body,
    error_body, ok_body, transaction_body,
};
use super::signature::Signer;
use crate::collab::AccountDirectory;
use crate::idempotency::{CANCEL_SUBTYPE, IdempotencyGuard, InboundEvent, Resolution, ensure_funds};
use crate::ledger::{
    ApplyRequest, CasinoActionKey, CasinoMetadata, CasinoRound, Category, EntryMetadata, EntryType,
    LedgerError, LedgerManager, Wallet, WalletRef,
};

/// What happened while handling a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasinoOutcome {
    Ok,
    ExactReplay,
    SemanticReplay,
    Failed(&'static str),
}

/// Signed reply body plus its outcome
#[derive(Debug, Clone)]
pub struct CasinoReply {
    pub request_type: Option<&'static str>,
    pub body: Value,
    pub outcome: CasinoOutcome,
}

struct Failure {
    error: CasinoError,
    balance: Option<Decimal>,
}

impl From<CasinoError> for Failure {
    fn from(error: CasinoError) -> Self {
        Self {
            error,
            balance: None,
        }
    }
}

impl From<LedgerError> for Failure {
    fn from(error: LedgerError) -> Self {
        CasinoError::from(error).into()
    }
}

fn with_balance(wallet: &Wallet) -> impl FnOnce(CasinoError) -> Failure + '_ {
    move |error| Failure {
        error,
        balance: Some(wallet.balance),
    }
}

type Handled = Result<(Map<String, Value>, CasinoOutcome), Failure>;

/// Casino one-wallet adapter
#[derive(Clone)]
pub struct CasinoAdapter {
    ledger: LedgerManager,
    guard: IdempotencyGuard,
    accounts: Arc<dyn AccountDirectory>,
    signer: Signer,
    currency: String,
}

impl CasinoAdapter {
    pub fn new(
        ledger: LedgerManager,
        accounts: Arc<dyn AccountDirectory>,
        signer: Signer,
        currency: impl Into<String>,
    ) -> Self {
        let guard = IdempotencyGuard::new(Arc::clone(ledger.store()));
        Self {
            ledger,
            guard,
            accounts,
            signer,
            currency: currency.into(),
        }
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Handle a raw request body
    pub async fn handle_bytes(&self, raw: &[u8]) -> CasinoReply {
        match serde_json::from_slice::<Value>(raw) {
            Ok(body) => self.handle(&body).await,
            Err(e) => self.reply(
                None,
                Err(CasinoError::InvalidRequest(format!("malformed JSON: {e}")).into()),
            ),
        }
    }

    /// Handle a parsed request body
    pub async fn handle(&self, body: &Value) -> CasinoReply {
        let Some(fields) = body.as_object() else {
            return self.reply(
                None,
                Err(CasinoError::InvalidRequest("body is not an object".into()).into()),
            );
        };

        if let Err(e) = self.signer.verify(fields) {
            log::warn!("Casino request rejected: signature verification failed");
            return self.reply(None, Err(e.into()));
        }

        let request: CasinoRequest = match serde_json::from_value(body.clone()) {
            Ok(request) => request,
            Err(e) => {
                return self.reply(None, Err(CasinoError::InvalidRequest(e.to_string()).into()));
            }
        };

        let name = request.name();
        let result = match request {
            CasinoRequest::Ping => Ok((ok_body(), CasinoOutcome::Ok)),
            CasinoRequest::Balance(req) => self.balance(req).await,
            CasinoRequest::Debit(req) => self.wallet_event(req, EntryType::Debit).await,
            CasinoRequest::Credit(req) => self.wallet_event(req, EntryType::Credit).await,
            CasinoRequest::Roundinfo(req) => Ok((self.round_info(req).await, CasinoOutcome::Ok)),
        };

        self.reply(Some(name), result)
    }

    fn reply(&self, request_type: Option<&'static str>, result: Handled) -> CasinoReply {
        let (body, outcome) = match result {
            Ok((body, outcome)) => (body, outcome),
            Err(failure) => {
                if let CasinoError::Ledger(inner) = &failure.error {
                    log::error!("Casino {} failed: {}", request_type.unwrap_or("request"), inner);
                } else {
                    log::info!(
                        "Casino {} rejected: {}",
                        request_type.unwrap_or("request"),
                        failure.error
                    );
                }
                (
                    error_body(failure.error.wire_message(), failure.balance),
                    CasinoOutcome::Failed(failure.error.kind()),
                )
            }
        };

        CasinoReply {
            request_type,
            body: self.signer.seal(body),
            outcome,
        }
    }

    fn check_currency(&self, currency: &str) -> Result<(), CasinoError> {
        if currency != self.currency {
            return Err(CasinoError::UnsupportedCurrency(currency.to_string()));
        }
        Ok(())
    }

    async fn wallet_of(&self, userid: &str) -> Result<Wallet, Failure> {
        let account = self.accounts.resolve_by_external_player_id(userid).await?;
        Ok(self.ledger.get_balance(WalletRef::Account(account.id)).await?)
    }

    async fn balance(&self, req: BalanceRequest) -> Handled {
        self.check_currency(&req.currency)?;
        let wallet = self.wallet_of(&req.userid).await?;
        Ok((balance_body(wallet.balance), CasinoOutcome::Ok))
    }

    async fn wallet_event(&self, req: WalletRequest, entry_type: EntryType) -> Handled {
        self.check_currency(&req.currency)?;
        if req.amount < Decimal::ZERO {
            return Err(
                CasinoError::InvalidRequest(format!("negative amount {}", req.amount)).into(),
            );
        }

        let wallet = self.wallet_of(&req.userid).await?;
        let event = InboundEvent {
            reference: format!("tid:{}", req.tid),
            key: CasinoActionKey {
                game_id: req.i_gameid.clone(),
                action_id: req.i_actionid.clone(),
                subtype: req.subtype.clone(),
            },
            external_player_id: req.userid.clone(),
            currency: req.currency.clone(),
            amount: req.amount,
            entry_type,
        };

        if let Some(outcome) = self.replayed(&event, &wallet).await? {
            return Ok((transaction_body(&req.tid, wallet.balance), outcome));
        }

        // A zero debit still needs a funded wallet.
        if entry_type == EntryType::Debit {
            ensure_funds(&wallet, req.amount)
                .map_err(CasinoError::from)
                .map_err(with_balance(&wallet))?;
        }

        // Nothing to move; report the balance as is.
        if req.amount.is_zero() {
            return Ok((transaction_body(&req.tid, wallet.balance), CasinoOutcome::Ok));
        }

        let category = match (entry_type, req.subtype.as_deref()) {
            (_, Some(CANCEL_SUBTYPE)) => Category::Rollback,
            (EntryType::Debit, _) => Category::CasinoBet,
            (EntryType::Credit, _) => Category::CasinoWin,
        };
        let apply = ApplyRequest::new(wallet.id, req.amount, entry_type, category)
            .reference(event.reference.clone())
            .metadata(EntryMetadata::Casino(CasinoMetadata {
                game_id: req.i_gameid,
                action_id: req.i_actionid,
                subtype: req.subtype,
                game_desc: req.i_gamedesc,
                external_player_id: req.userid,
                currency: req.currency,
            }));

        match self.ledger.apply_transaction(apply).await {
            Ok(applied) => {
                log::info!(
                    "Casino {} tid={} amount={} balance={}",
                    entry_type,
                    req.tid,
                    req.amount,
                    applied.balance
                );
                Ok((transaction_body(&req.tid, applied.balance), CasinoOutcome::Ok))
            }
            Err(LedgerError::DuplicateReference(_)) => {
                // A concurrent delivery of the same tid committed first.
                let current = self.ledger.get_balance(WalletRef::Wallet(wallet.id)).await?;
                match self.replayed(&event, &current).await? {
                    Some(outcome) => Ok((transaction_body(&req.tid, current.balance), outcome)),
                    None => Err(CasinoError::ParameterMismatch("tid").into()),
                }
            }
            Err(e) => {
                let current = self
                    .ledger
                    .get_balance(WalletRef::Wallet(wallet.id))
                    .await
                    .map(|w| w.balance)
                    .unwrap_or(wallet.balance);
                Err(Failure {
                    error: e.into(),
                    balance: Some(current),
                })
            }
        }
    }

    async fn replayed(
        &self,
        event: &InboundEvent,
        wallet: &Wallet,
    ) -> Result<Option<CasinoOutcome>, Failure> {
        match self.guard.resolve(event).await {
            Ok(Resolution::ExactReplay(_)) => {
                log::info!("Casino replay of {}", event.reference);
                Ok(Some(CasinoOutcome::ExactReplay))
            }
            Ok(Resolution::SemanticReplay(existing)) => {
                log::info!(
                    "Casino semantic replay of {}/{} as {} (recorded {})",
                    event.key.game_id,
                    event.key.action_id,
                    event.reference,
                    existing.id
                );
                Ok(Some(CasinoOutcome::SemanticReplay))
            }
            Ok(Resolution::Fresh) => Ok(None),
            Err(e) => {
                log::warn!("Casino replay of {} rejected: {}", event.reference, e);
                Err(with_balance(wallet)(e.into()))
            }
        }
    }

    /// Persist round details; failures are logged and never reported
    async fn round_info(&self, req: RoundInfoRequest) -> Map<String, Value> {
        let round = CasinoRound {
            game_id: req.gameid,
            user_id: req.userid,
            game_desc: req.i_gamedesc,
            actions: Value::Array(req.actions),
            updated_at: Utc::now(),
        };
        if let Err(e) = self.ledger.store().upsert_round(&round).await {
            log::error!(
                "Failed to store round {} for {}: {}",
                round.game_id,
                round.user_id,
                e
            );
        }
        ok_body()
    }
}
