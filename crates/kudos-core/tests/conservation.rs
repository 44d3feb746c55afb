//! End-to-end conservation test: one period lived in full.
//!
//! Drives every operation the ledger offers and checks after each stage
//! that issued points equal the sum of all balances and that the journal
//! still replays to the stored state.

use chrono::{Duration, Utc};
use kudos_core::{
    AccountKind, CreateChallengeParams, FundingSource, LedgerConfig, OwnerKind, Store,
    SubmitParams, TransferStatus,
};

fn assert_conserved(store: &Store, stage: &str) {
    let report = store.verify_conservation("acme").unwrap();
    assert!(
        report.is_consistent(),
        "conservation broken after {stage}: {:?}",
        report.violations
    );
}

fn balance(store: &Store, owner: &str, kind: AccountKind) -> i64 {
    let owner_kind = if owner == "acme" {
        OwnerKind::Org
    } else {
        OwnerKind::Member
    };
    store.balance("acme", owner_kind, owner, kind).unwrap()
}

#[test]
fn full_period_lifecycle_conserves_points() -> anyhow::Result<()> {
    let store = Store::memory(LedgerConfig::default())?;
    let now = Utc::now();

    // --- Bootstrap: org, members, issuance, treasury ---
    store.create_org("acme", "Acme Corp")?;
    store.add_member("acme", "alice", "Alice", true)?;
    store.add_member("acme", "bob", "Bob", false)?;
    store.add_member("acme", "carol", "Carol", false)?;
    store.issue("acme", 10_000)?;
    store.fund_treasury("acme", 2_000)?;
    assert_conserved(&store, "issuance");

    // --- Period opens: 50 points to each of three members ---
    let opened = store.open_period("acme", "2026-08", now, now + Duration::days(31))?;
    assert_eq!(opened.emitted_total, 150);
    assert_eq!(opened.members_credited, 3);
    assert_eq!(balance(&store, "acme", AccountKind::System), 7_850);
    assert_conserved(&store, "period open");

    // --- Transfers: one realized, one declined, one auto-confirmed,
    // --- one left waiting for the close to decline.
    let t1 = store.submit_transfer(SubmitParams {
        org_id: "acme",
        sender_id: "alice",
        recipient_id: "bob",
        amount: 20,
        reason: Some("code review marathon"),
        client_ref: None,
    })?;
    store.approve_transfer("acme", &t1.transfer_id, "alice")?;
    store.realize_transfer("acme", &t1.transfer_id)?;

    let t2 = store.submit_transfer(SubmitParams {
        org_id: "acme",
        sender_id: "alice",
        recipient_id: "carol",
        amount: 10,
        reason: None,
        client_ref: None,
    })?;
    store.decline_transfer("acme", &t2.transfer_id, "alice")?;

    let t3 = store.submit_transfer(SubmitParams {
        org_id: "acme",
        sender_id: "carol",
        recipient_id: "bob",
        amount: 5,
        reason: None,
        client_ref: None,
    })?;
    // Two days later the grace window has passed; the sweep settles it.
    let swept = store.sweep_due(now + Duration::days(2))?;
    assert_eq!(swept.auto_approved, 1);
    assert_eq!(swept.realized, 1);
    let t3 = store.get_transfer("acme", &t3.transfer_id)?;
    assert_eq!(t3.status, TransferStatus::Realized);
    assert!(t3.auto_confirmed);

    let t4 = store.submit_transfer(SubmitParams {
        org_id: "acme",
        sender_id: "bob",
        recipient_id: "alice",
        amount: 15,
        reason: None,
        client_ref: None,
    })?;
    assert_eq!(balance(&store, "bob", AccountKind::Frozen), 15);
    assert_conserved(&store, "transfers");

    // --- Challenges: creator-funded left open, treasury-funded closed early ---
    let c1 = store.create_challenge(CreateChallengeParams {
        org_id: "acme",
        creator_id: "bob",
        title: "Best onboarding doc",
        fund: 30,
        funded_from: FundingSource::Creator,
        client_ref: None,
    })?;
    store.award_challenge("acme", &c1.challenge_id, "carol", 12, "bob")?;

    let c2 = store.create_challenge(CreateChallengeParams {
        org_id: "acme",
        creator_id: "alice",
        title: "Q3 hackathon",
        fund: 100,
        funded_from: FundingSource::Treasury,
        client_ref: None,
    })?;
    store.award_challenge("acme", &c2.challenge_id, "bob", 40, "alice")?;
    let closed = store.close_challenge("acme", &c2.challenge_id)?;
    assert_eq!(closed.returned, 60);
    assert_eq!(balance(&store, "acme", AccountKind::Treasury), 1_960);
    assert_conserved(&store, "challenges");

    // --- Market and bonus ---
    store.purchase("acme", "bob", 10, "ord-1")?;
    store.refund_purchase("acme", "ord-1")?;
    store.purchase("acme", "carol", 7, "ord-2")?;
    store.convert_to_bonus("acme", "bob", 5)?;
    assert_eq!(balance(&store, "acme", AccountKind::Market), 7);
    assert_eq!(balance(&store, "bob", AccountKind::Bonus), 5);
    assert_conserved(&store, "market");

    // --- Close: t4 declined, c1 refunded to bob, leftovers burnt ---
    let outcome = store.close_period("acme", Utc::now())?;
    assert_eq!(outcome.label, "2026-08");
    assert_eq!(outcome.auto_approved, 0);
    assert_eq!(outcome.declined, 1);
    assert_eq!(outcome.challenges_closed, 1);
    // alice 30 + bob (5 + 15 refund + 18 challenge refund) + carol 45
    assert_eq!(outcome.burnt_total, 113);
    assert_eq!(outcome.stats_rows, 3);
    assert_conserved(&store, "period close");

    // --- Final ledger: nothing spendable, history preserved ---
    for member in ["alice", "bob", "carol"] {
        assert_eq!(balance(&store, member, AccountKind::Distribution), 0);
        assert_eq!(balance(&store, member, AccountKind::Frozen), 0);
    }
    assert_eq!(balance(&store, "alice", AccountKind::Income), 0);
    assert_eq!(balance(&store, "bob", AccountKind::Income), 60);
    assert_eq!(balance(&store, "carol", AccountKind::Income), 5);
    assert_eq!(balance(&store, "acme", AccountKind::Burnt), 113);

    let totals = store.org_totals("acme")?;
    assert_eq!(totals.issued_total, 10_000);
    let sum: i64 = totals.balances.iter().map(|b| b.total).sum();
    assert_eq!(sum, 10_000);

    // --- Snapshot stats survive the close ---
    let stats = store.period_summary("acme", "2026-08")?;
    let get = |id: &str| stats.iter().find(|s| s.member_id == id).unwrap().clone();
    let alice = get("alice");
    assert_eq!(alice.sent_total, 20);
    assert_eq!(alice.declined_total, 10);
    assert_eq!(alice.burnt_total, 30);
    let bob = get("bob");
    assert_eq!(bob.received_total, 25);
    assert_eq!(bob.declined_total, 15);
    assert_eq!(bob.awarded_total, 40);
    assert_eq!(bob.burnt_total, 38);
    let carol = get("carol");
    assert_eq!(carol.sent_total, 5);
    assert_eq!(carol.auto_confirmed_total, 5);
    assert_eq!(carol.awarded_total, 12);
    assert_eq!(carol.burnt_total, 45);

    Ok(())
}

/// A second period over the same books: emission, spending, and close
/// keep conserving even with history from the first period in place.
#[test]
fn back_to_back_periods_stay_consistent() -> anyhow::Result<()> {
    let config = LedgerConfig {
        grace_period_minutes: 0,
        ..LedgerConfig::default()
    };
    let store = Store::memory(config)?;
    let now = Utc::now();

    store.create_org("acme", "Acme Corp")?;
    store.add_member("acme", "alice", "Alice", true)?;
    store.add_member("acme", "bob", "Bob", false)?;
    store.issue("acme", 500)?;

    for (i, label) in ["2026-08", "2026-09"].iter().enumerate() {
        let starts = now + Duration::days(31 * i as i64);
        store.open_period("acme", label, starts, starts + Duration::days(31))?;
        store.submit_transfer(SubmitParams {
            org_id: "acme",
            sender_id: "alice",
            recipient_id: "bob",
            amount: 10,
            reason: None,
            client_ref: None,
        })?;
        // Zero grace: the close sweeps it straight to realized.
        let outcome = store.close_period("acme", Utc::now())?;
        assert_eq!(outcome.auto_approved, 1);
        assert_eq!(outcome.realized, 1);
        // alice burnt 40, bob burnt 50 each round
        assert_eq!(outcome.burnt_total, 90);
        assert_conserved(&store, label);
    }

    // 500 issued minus two rounds of emission still sits in system.
    assert_eq!(balance(&store, "acme", AccountKind::System), 300);
    assert_eq!(balance(&store, "acme", AccountKind::Burnt), 180);
    assert_eq!(balance(&store, "bob", AccountKind::Income), 20);

    let periods = store.list_periods("acme")?;
    assert_eq!(periods.len(), 2);
    Ok(())
}
