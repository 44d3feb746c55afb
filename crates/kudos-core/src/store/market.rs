//! Income spend-down: market purchases and bonus conversion.
//!
//! Purchases and refunds are keyed by the caller's `order_ref` and
//! recorded only in the journal; the entries table is the order log.

use super::{journal, rows, Store};
use crate::account::{AccountKind, OwnerKind};
use crate::error::LedgerError;
use crate::model::{BonusReceipt, PurchaseReceipt};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

impl Store {
    /// Spend income in the org market. `order_ref` is the caller's order
    /// id; repeating it with identical fields returns the stored receipt.
    pub fn purchase(
        &self,
        org_id: &str,
        member_id: &str,
        amount: i64,
        order_ref: &str,
    ) -> Result<PurchaseReceipt, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        self.with_txn(|conn| {
            journal::ensure_org(conn, org_id)?;
            let member = journal::require_member(conn, org_id, member_id)?;
            if !member.active {
                return Err(LedgerError::MemberInactive {
                    member_id: member_id.to_string(),
                });
            }

            if let Some(stored) =
                lookup_order(conn, org_id, journal::ops::MARKET_PURCHASE, order_ref)?
            {
                let conflict = |field: &str| LedgerError::OrderConflict {
                    order_ref: order_ref.to_string(),
                    field: field.to_string(),
                };
                if stored.member_id != member_id {
                    return Err(conflict("member_id"));
                }
                if stored.amount != amount {
                    return Err(conflict("amount"));
                }
                return Ok(PurchaseReceipt {
                    org_id: org_id.to_string(),
                    member_id: member_id.to_string(),
                    order_ref: order_ref.to_string(),
                    amount: stored.amount,
                    recorded_at: rows::parse_ts(&stored.recorded_at)?,
                    was_new: false,
                });
            }

            let now = Utc::now();
            let income = journal::account_id(
                conn,
                org_id,
                OwnerKind::Member,
                member_id,
                AccountKind::Income,
            )?;
            let market =
                journal::account_id(conn, org_id, OwnerKind::Org, org_id, AccountKind::Market)?;
            journal::move_points(
                conn,
                org_id,
                income,
                market,
                amount,
                journal::ops::MARKET_PURCHASE,
                order_ref,
                now,
            )?;

            tracing::info!(org_id, member_id, order_ref, amount, "market purchase");
            Ok(PurchaseReceipt {
                org_id: org_id.to_string(),
                member_id: member_id.to_string(),
                order_ref: order_ref.to_string(),
                amount,
                recorded_at: now,
                was_new: true,
            })
        })
    }

    /// Reverse a purchase exactly. Unknown refs are rejected; refunding
    /// twice returns the stored refund.
    pub fn refund_purchase(
        &self,
        org_id: &str,
        order_ref: &str,
    ) -> Result<PurchaseReceipt, LedgerError> {
        self.with_txn(|conn| {
            journal::ensure_org(conn, org_id)?;
            let purchase = lookup_order(conn, org_id, journal::ops::MARKET_PURCHASE, order_ref)?
                .ok_or_else(|| LedgerError::OrderNotFound {
                    order_ref: order_ref.to_string(),
                })?;

            if let Some(refund) =
                lookup_order(conn, org_id, journal::ops::MARKET_REFUND, order_ref)?
            {
                return Ok(PurchaseReceipt {
                    org_id: org_id.to_string(),
                    member_id: refund.member_id,
                    order_ref: order_ref.to_string(),
                    amount: refund.amount,
                    recorded_at: rows::parse_ts(&refund.recorded_at)?,
                    was_new: false,
                });
            }

            let now = Utc::now();
            let income = journal::account_id(
                conn,
                org_id,
                OwnerKind::Member,
                &purchase.member_id,
                AccountKind::Income,
            )?;
            let market =
                journal::account_id(conn, org_id, OwnerKind::Org, org_id, AccountKind::Market)?;
            journal::move_points(
                conn,
                org_id,
                market,
                income,
                purchase.amount,
                journal::ops::MARKET_REFUND,
                order_ref,
                now,
            )?;

            tracing::info!(org_id, order_ref, amount = purchase.amount, "purchase refunded");
            Ok(PurchaseReceipt {
                org_id: org_id.to_string(),
                member_id: purchase.member_id,
                order_ref: order_ref.to_string(),
                amount: purchase.amount,
                recorded_at: now,
                was_new: true,
            })
        })
    }

    /// Convert income to bonus for payroll-side redemption.
    pub fn convert_to_bonus(
        &self,
        org_id: &str,
        member_id: &str,
        amount: i64,
    ) -> Result<BonusReceipt, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        self.with_txn(|conn| {
            journal::ensure_org(conn, org_id)?;
            let member = journal::require_member(conn, org_id, member_id)?;
            if !member.active {
                return Err(LedgerError::MemberInactive {
                    member_id: member_id.to_string(),
                });
            }

            let income = journal::account_id(
                conn,
                org_id,
                OwnerKind::Member,
                member_id,
                AccountKind::Income,
            )?;
            let bonus = journal::account_id(
                conn,
                org_id,
                OwnerKind::Member,
                member_id,
                AccountKind::Bonus,
            )?;
            let ref_id = Uuid::new_v4().to_string();
            journal::move_points(
                conn,
                org_id,
                income,
                bonus,
                amount,
                journal::ops::BONUS_CONVERT,
                &ref_id,
                Utc::now(),
            )?;

            Ok(BonusReceipt {
                org_id: org_id.to_string(),
                member_id: member_id.to_string(),
                amount,
                bonus_balance: journal::balance_of(conn, bonus)?,
            })
        })
    }
}

struct OrderEntry {
    member_id: String,
    amount: i64,
    recorded_at: String,
}

/// Find the journal entry for an order op. The member side of a purchase
/// is the debit account; of a refund, the credit account.
fn lookup_order(
    conn: &Connection,
    org_id: &str,
    op: &str,
    order_ref: &str,
) -> Result<Option<OrderEntry>, LedgerError> {
    let member_side = if op == journal::ops::MARKET_PURCHASE {
        "e.debit_account"
    } else {
        "e.credit_account"
    };
    Ok(conn
        .query_row(
            &format!(
                "SELECT acc.owner_id, e.amount, e.recorded_at FROM entries e
                 JOIN accounts acc ON acc.account_id = {member_side}
                 WHERE e.org_id = ?1 AND e.op = ?2 AND e.ref_id = ?3"
            ),
            params![org_id, op, order_ref],
            |row| {
                Ok(OrderEntry {
                    member_id: row.get(0)?,
                    amount: row.get(1)?,
                    recorded_at: row.get(2)?,
                })
            },
        )
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubmitParams;
    use crate::store::testutil::seeded_store_with_period;

    /// Route points into a member's income account through a realized
    /// transfer.
    fn give_income(store: &Store, from: &str, to: &str, amount: i64) {
        let receipt = store
            .submit_transfer(SubmitParams {
                org_id: "acme",
                sender_id: from,
                recipient_id: to,
                amount,
                reason: None,
                client_ref: None,
            })
            .unwrap();
        store
            .approve_transfer("acme", &receipt.transfer_id, "alice")
            .unwrap();
        store
            .realize_transfer("acme", &receipt.transfer_id)
            .unwrap();
    }

    fn balance(store: &Store, owner_kind: OwnerKind, owner: &str, kind: AccountKind) -> i64 {
        store.balance("acme", owner_kind, owner, kind).unwrap()
    }

    // === A) Purchases ===

    #[test]
    fn test_purchase_moves_income_to_market() {
        let store = seeded_store_with_period();
        give_income(&store, "alice", "bob", 30);

        let receipt = store.purchase("acme", "bob", 10, "ord-1").unwrap();
        assert!(receipt.was_new);
        assert_eq!(receipt.amount, 10);

        assert_eq!(balance(&store, OwnerKind::Member, "bob", AccountKind::Income), 20);
        assert_eq!(balance(&store, OwnerKind::Org, "acme", AccountKind::Market), 10);
    }

    #[test]
    fn test_purchase_validations() {
        let store = seeded_store_with_period();
        give_income(&store, "alice", "bob", 30);

        assert!(matches!(
            store.purchase("acme", "bob", 0, "ord-1"),
            Err(LedgerError::InvalidAmount { amount: 0 })
        ));
        assert!(matches!(
            store.purchase("acme", "ghost", 5, "ord-1"),
            Err(LedgerError::MemberNotFound { .. })
        ));
        assert!(matches!(
            store.purchase("acme", "bob", 31, "ord-1"),
            Err(LedgerError::InsufficientFunds {
                kind: AccountKind::Income,
                ..
            })
        ));

        store.set_member_active("acme", "bob", false).unwrap();
        assert!(matches!(
            store.purchase("acme", "bob", 5, "ord-1"),
            Err(LedgerError::MemberInactive { .. })
        ));
    }

    #[test]
    fn test_purchase_order_ref_idempotent() {
        let store = seeded_store_with_period();
        give_income(&store, "alice", "bob", 30);
        give_income(&store, "alice", "carol", 10);

        let first = store.purchase("acme", "bob", 10, "ord-1").unwrap();
        let retry = store.purchase("acme", "bob", 10, "ord-1").unwrap();
        assert!(!retry.was_new);
        assert_eq!(retry.recorded_at, first.recorded_at);
        // Spent exactly once.
        assert_eq!(balance(&store, OwnerKind::Member, "bob", AccountKind::Income), 20);

        assert!(matches!(
            store.purchase("acme", "bob", 11, "ord-1"),
            Err(LedgerError::OrderConflict { ref field, .. }) if field == "amount"
        ));
        assert!(matches!(
            store.purchase("acme", "carol", 10, "ord-1"),
            Err(LedgerError::OrderConflict { ref field, .. }) if field == "member_id"
        ));
    }

    // === B) Refunds ===

    #[test]
    fn test_refund_reverses_purchase() {
        let store = seeded_store_with_period();
        give_income(&store, "alice", "bob", 30);
        store.purchase("acme", "bob", 10, "ord-1").unwrap();

        let refund = store.refund_purchase("acme", "ord-1").unwrap();
        assert!(refund.was_new);
        assert_eq!(refund.amount, 10);
        assert_eq!(refund.member_id, "bob");

        assert_eq!(balance(&store, OwnerKind::Member, "bob", AccountKind::Income), 30);
        assert_eq!(balance(&store, OwnerKind::Org, "acme", AccountKind::Market), 0);
    }

    #[test]
    fn test_refund_unknown_order() {
        let store = seeded_store_with_period();
        let result = store.refund_purchase("acme", "no-such-order");
        assert!(matches!(result, Err(LedgerError::OrderNotFound { .. })));
    }

    #[test]
    fn test_refund_twice_is_idempotent() {
        let store = seeded_store_with_period();
        give_income(&store, "alice", "bob", 30);
        store.purchase("acme", "bob", 10, "ord-1").unwrap();

        store.refund_purchase("acme", "ord-1").unwrap();
        let retry = store.refund_purchase("acme", "ord-1").unwrap();
        assert!(!retry.was_new);
        // Refunded exactly once.
        assert_eq!(balance(&store, OwnerKind::Member, "bob", AccountKind::Income), 30);
    }

    // === C) Bonus conversion ===

    #[test]
    fn test_convert_to_bonus() {
        let store = seeded_store_with_period();
        give_income(&store, "alice", "bob", 30);

        let receipt = store.convert_to_bonus("acme", "bob", 12).unwrap();
        assert_eq!(receipt.bonus_balance, 12);
        assert_eq!(balance(&store, OwnerKind::Member, "bob", AccountKind::Income), 18);

        let receipt = store.convert_to_bonus("acme", "bob", 6).unwrap();
        assert_eq!(receipt.bonus_balance, 18);
        assert_eq!(balance(&store, OwnerKind::Member, "bob", AccountKind::Bonus), 18);
    }

    #[test]
    fn test_convert_validations() {
        let store = seeded_store_with_period();
        give_income(&store, "alice", "bob", 10);

        assert!(matches!(
            store.convert_to_bonus("acme", "bob", -1),
            Err(LedgerError::InvalidAmount { amount: -1 })
        ));
        assert!(matches!(
            store.convert_to_bonus("acme", "bob", 11),
            Err(LedgerError::InsufficientFunds {
                kind: AccountKind::Income,
                requested: 11,
                available: 10,
            })
        ));

        store.set_member_active("acme", "bob", false).unwrap();
        assert!(matches!(
            store.convert_to_bonus("acme", "bob", 5),
            Err(LedgerError::MemberInactive { .. })
        ));
    }
}
