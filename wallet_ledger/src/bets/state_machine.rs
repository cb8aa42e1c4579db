//! Bet order lifecycle.
//!
//! ```text
//! OPEN --settle--> WIN  --payout--> WIN (paid, finalization metadata)
//! OPEN --settle--> LOST --payout--> LOST (finalized_at set)
//! any  --rollback--> OPEN (settlement timestamps cleared)
//! ```
//!
//! Every status change returns an explicit [`AuditRecord`] that the caller
//! commits together with the updated order. A call that changes nothing
//! returns `None`.

use chrono::Utc;
use rust_decimal::Decimal;

use super::models::{BetOrder, BetStatus, PayoutInfo, SettlementInfo};
use crate::ledger::{AuditEvent, AuditRecord, LedgerError, LedgerResult, TransitionReason};

/// Result of a provider-reported settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Lost,
}

impl Outcome {
    pub fn status(self) -> BetStatus {
        match self {
            Outcome::Win => BetStatus::Win,
            Outcome::Lost => BetStatus::Lost,
        }
    }
}

/// States a bet order may move to from `from`
pub fn valid_transitions(from: BetStatus) -> &'static [BetStatus] {
    match from {
        BetStatus::Open => &[BetStatus::Win, BetStatus::Lost, BetStatus::Completed],
        BetStatus::Win | BetStatus::Lost | BetStatus::Completed | BetStatus::Rejected => {
            &[BetStatus::Open]
        }
    }
}

pub fn can_transition(from: BetStatus, to: BetStatus) -> bool {
    from == to || valid_transitions(from).contains(&to)
}

fn transition(
    bet: &mut BetOrder,
    to: BetStatus,
    reason: TransitionReason,
) -> LedgerResult<Option<AuditRecord>> {
    let from = bet.status;
    if from == to {
        return Ok(None);
    }
    if !can_transition(from, to) {
        return Err(LedgerError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    bet.status = to;
    bet.updated_at = Utc::now();
    Ok(Some(AuditRecord::new(
        bet.id,
        AuditEvent::BetStatusChanged { from, to, reason },
    )))
}

/// First settlement call: record the outcome without moving money
pub fn record_outcome(
    bet: &mut BetOrder,
    outcome: Outcome,
    ext_transaction_id: Option<&str>,
) -> LedgerResult<Option<AuditRecord>> {
    let audit = transition(bet, outcome.status(), TransitionReason::Settlement)?;
    if audit.is_some() {
        let now = Utc::now();
        bet.settled_at = Some(now);
        bet.metadata.settlement = Some(SettlementInfo {
            ext_transaction_id: ext_transaction_id.map(str::to_string),
            recorded_at: now,
        });
    }
    Ok(audit)
}

/// Second settlement call on the win path
///
/// Status stays `WIN`; the payout is recorded in the metadata. An order that
/// skipped the first call is moved to `WIN` here.
pub fn record_payout(bet: &mut BetOrder, payout: PayoutInfo) -> LedgerResult<Vec<AuditRecord>> {
    let mut audit = Vec::new();
    if bet.status == BetStatus::Open {
        audit.extend(record_outcome(
            bet,
            Outcome::Win,
            Some(&payout.ext_transaction_id),
        )?);
    }
    if bet.status != BetStatus::Win {
        return Err(LedgerError::InvalidStateTransition {
            from: bet.status.to_string(),
            to: "WIN (payout)".to_string(),
        });
    }
    bet.metadata.payout = Some(payout);
    bet.updated_at = Utc::now();
    Ok(audit)
}

/// Second settlement call on the loss path
///
/// No money moves; the finalization goes to the audit trail.
pub fn finalize_loss(
    bet: &mut BetOrder,
    ext_transaction_id: Option<&str>,
) -> LedgerResult<Vec<AuditRecord>> {
    let mut audit = Vec::new();
    if bet.status == BetStatus::Open {
        audit.extend(record_outcome(bet, Outcome::Lost, ext_transaction_id)?);
    }
    if bet.status != BetStatus::Lost {
        return Err(LedgerError::InvalidStateTransition {
            from: bet.status.to_string(),
            to: "LOST (finalized)".to_string(),
        });
    }
    let now = Utc::now();
    bet.finalized_at = Some(now);
    bet.updated_at = now;
    audit.push(AuditRecord::new(
        bet.id,
        AuditEvent::LossFinalized {
            ext_transaction_id: ext_transaction_id.map(str::to_string),
            stake: bet.amount,
        },
    ));
    Ok(audit)
}

/// Provider rollback: back to `OPEN` from any state
pub fn rollback(bet: &mut BetOrder) -> LedgerResult<Option<AuditRecord>> {
    let audit = transition(bet, BetStatus::Open, TransitionReason::Rollback)?;
    let now = Utc::now();
    bet.settled_at = None;
    bet.finalized_at = None;
    bet.metadata.settlement = None;
    bet.metadata.payout = None;
    if audit.is_some() {
        bet.rollback_at = Some(now);
        bet.metadata.rollback_count += 1;
    }
    bet.updated_at = now;
    Ok(audit)
}

/// Terminal state for orders that are paid at creation (bonus payouts)
pub fn complete(bet: &mut BetOrder) -> LedgerResult<Option<AuditRecord>> {
    let audit = transition(bet, BetStatus::Completed, TransitionReason::Payout)?;
    let now = Utc::now();
    bet.settled_at.get_or_insert(now);
    bet.finalized_at.get_or_insert(now);
    Ok(audit)
}

/// Payout already recorded on this order, if any
pub fn paid_amount(bet: &BetOrder) -> Option<Decimal> {
    bet.metadata.payout.as_ref().map(|p| p.amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bets::models::{NewBetOrder, OrderType};

    fn open_bet() -> BetOrder {
        BetOrder::open(
            NewBetOrder {
                account_id: 1,
                external_player_id: "player-1".to_string(),
                betslip_id: "slip-1".to_string(),
                bet_id: "bet-1".to_string(),
                order_type: OrderType::Sportsbook,
                bet_type: None,
                amount: Decimal::new(2000, 2),
                potential_win: Decimal::new(6000, 2),
                odds: Decimal::new(300, 2),
                selections: Vec::new(),
            },
            Some("sb:place-1".to_string()),
        )
    }

    fn payout(amount: i64) -> PayoutInfo {
        PayoutInfo {
            ext_transaction_id: "pay-1".to_string(),
            transaction_id: None,
            amount: Decimal::new(amount, 2),
            paid_at: Utc::now(),
        }
    }

    #[test]
    fn test_settle_then_payout_keeps_win() {
        let mut bet = open_bet();
        let audit = record_outcome(&mut bet, Outcome::Win, Some("settle-1")).unwrap();
        assert!(audit.is_some());
        assert_eq!(bet.status, BetStatus::Win);
        assert!(bet.settled_at.is_some());

        let audit = record_payout(&mut bet, payout(6000)).unwrap();
        assert!(audit.is_empty());
        assert_eq!(bet.status, BetStatus::Win);
        assert_eq!(bet.finalized_at, None);
        assert_eq!(paid_amount(&bet), Some(Decimal::new(6000, 2)));
    }

    #[test]
    fn test_repeated_outcome_is_noop() {
        let mut bet = open_bet();
        record_outcome(&mut bet, Outcome::Lost, None).unwrap();
        let settled_at = bet.settled_at;
        assert!(record_outcome(&mut bet, Outcome::Lost, None).unwrap().is_none());
        assert_eq!(bet.settled_at, settled_at);
    }

    #[test]
    fn test_win_cannot_flip_to_lost_without_rollback() {
        let mut bet = open_bet();
        record_outcome(&mut bet, Outcome::Win, None).unwrap();
        let err = record_outcome(&mut bet, Outcome::Lost, None).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_loss_finalization_sets_timestamp_and_audits() {
        let mut bet = open_bet();
        let audit = finalize_loss(&mut bet, Some("loss-2")).unwrap();
        assert_eq!(bet.status, BetStatus::Lost);
        assert!(bet.finalized_at.is_some());
        assert_eq!(audit.len(), 2);
        assert!(matches!(audit[1].event, AuditEvent::LossFinalized { .. }));
    }

    #[test]
    fn test_rollback_clears_settlement() {
        let mut bet = open_bet();
        record_outcome(&mut bet, Outcome::Win, None).unwrap();
        record_payout(&mut bet, payout(6000)).unwrap();

        let audit = rollback(&mut bet).unwrap().expect("status changed");
        assert_eq!(bet.status, BetStatus::Open);
        assert_eq!(bet.settled_at, None);
        assert_eq!(bet.finalized_at, None);
        assert!(bet.rollback_at.is_some());
        assert_eq!(bet.metadata.rollback_count, 1);
        assert_eq!(paid_amount(&bet), None);
        assert!(matches!(
            audit.event,
            AuditEvent::BetStatusChanged {
                from: BetStatus::Win,
                to: BetStatus::Open,
                reason: TransitionReason::Rollback,
            }
        ));

        // A rolled-back bet can be settled again
        record_outcome(&mut bet, Outcome::Lost, None).unwrap();
        assert_eq!(bet.status, BetStatus::Lost);
    }

    #[test]
    fn test_rollback_of_open_bet_is_noop() {
        let mut bet = open_bet();
        assert!(rollback(&mut bet).unwrap().is_none());
        assert_eq!(bet.rollback_at, None);
    }

    #[test]
    fn test_payout_on_lost_bet_is_rejected() {
        let mut bet = open_bet();
        record_outcome(&mut bet, Outcome::Lost, None).unwrap();
        assert!(record_payout(&mut bet, payout(100)).is_err());
    }
}
