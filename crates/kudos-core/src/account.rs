//! Typed accounts and account ownership.
//!
//! Every point in the system sits in exactly one account. Accounts are
//! typed: the kind decides what movements are legal and who may own the
//! account. Members hold income/distribution/frozen/bonus; orgs hold
//! system/treasury/burnt/market; a challenge owns a single frozen escrow.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The eight account kinds of the ledger.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Points a member has received and may spend (market, bonus).
    Income,
    /// Points a member may give away this period. Emitted at period open,
    /// burnt at period close.
    Distribution,
    /// Points held pending review: transfer holds and challenge escrow.
    Frozen,
    /// Points a member converted for payroll-side redemption.
    Bonus,
    /// Org emission source. Issuance mints here.
    System,
    /// Org fund for treasury-funded challenges.
    Treasury,
    /// Org sink for expired distribution points.
    Burnt,
    /// Org sink for market purchases.
    Market,
}

impl AccountKind {
    /// Stable text form used in storage and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Income => "income",
            AccountKind::Distribution => "distribution",
            AccountKind::Frozen => "frozen",
            AccountKind::Bonus => "bonus",
            AccountKind::System => "system",
            AccountKind::Treasury => "treasury",
            AccountKind::Burnt => "burnt",
            AccountKind::Market => "market",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(AccountKind::Income),
            "distribution" => Some(AccountKind::Distribution),
            "frozen" => Some(AccountKind::Frozen),
            "bonus" => Some(AccountKind::Bonus),
            "system" => Some(AccountKind::System),
            "treasury" => Some(AccountKind::Treasury),
            "burnt" => Some(AccountKind::Burnt),
            "market" => Some(AccountKind::Market),
            _ => None,
        }
    }

    /// Kinds auto-created for every member.
    pub fn member_kinds() -> [AccountKind; 4] {
        [
            AccountKind::Income,
            AccountKind::Distribution,
            AccountKind::Frozen,
            AccountKind::Bonus,
        ]
    }

    /// Kinds auto-created for every org.
    pub fn org_kinds() -> [AccountKind; 4] {
        [
            AccountKind::System,
            AccountKind::Treasury,
            AccountKind::Burnt,
            AccountKind::Market,
        ]
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who an account belongs to.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Member,
    Org,
    Challenge,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::Member => "member",
            OwnerKind::Org => "org",
            OwnerKind::Challenge => "challenge",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "member" => Some(OwnerKind::Member),
            "org" => Some(OwnerKind::Org),
            "challenge" => Some(OwnerKind::Challenge),
            _ => None,
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One account row with its current balance.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Account {
    pub org_id: String,
    pub owner_kind: OwnerKind,
    pub owner_id: String,
    pub kind: AccountKind,
    pub balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_text_roundtrip() {
        for kind in AccountKind::member_kinds()
            .into_iter()
            .chain(AccountKind::org_kinds())
        {
            assert_eq!(AccountKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(AccountKind::parse("escrow"), None);
    }

    #[test]
    fn owner_text_roundtrip() {
        for owner in [OwnerKind::Member, OwnerKind::Org, OwnerKind::Challenge] {
            assert_eq!(OwnerKind::parse(owner.as_str()), Some(owner));
        }
        assert_eq!(OwnerKind::parse(""), None);
    }

    #[test]
    fn member_and_org_kinds_are_disjoint_and_cover_all() {
        let member = AccountKind::member_kinds();
        let org = AccountKind::org_kinds();
        for m in member {
            assert!(!org.contains(&m));
        }
        assert_eq!(member.len() + org.len(), 8);
    }
}
