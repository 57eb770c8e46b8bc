//! End-to-end scenarios across the sale and lock products.
//!
//! A shared [`InMemoryEscrow`] holds custody for both products, so every
//! scenario ends by checking custody against the records that still owe
//! tokens and the supply conservation of every asset.

use openvest_ledger::{
    AdminConfig, CapabilityTable, EntitlementLedger, InMemoryEscrow, LockRequest,
    StaticClassifier,
};
use openvest_sale::{ProceedsConservation, SaleEngine};
use openvest_types::{
    EngineConfig, LedgerEvent, OpenvestError, SaleId, SaleParams, SaleStatus, SaleWindow,
    UnlockMode,
    fixtures::{addr, day, dec, schedule},
};
use rust_decimal::Decimal;

const PROJECT: u64 = 1;
const ADMIN: u64 = 2;
const ALICE: u64 = 3;
const BOB: u64 = 4;
const TEAM: u64 = 5;
const FEES: u64 = 900;
const TOKEN: u64 = 100;
const USD: u64 = 200;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Harness {
    sales: SaleEngine,
    locks: EntitlementLedger,
    escrow: InMemoryEscrow,
    perms: CapabilityTable,
    admin: AdminConfig,
}

impl Harness {
    fn new() -> Self {
        init_tracing();
        let mut escrow = InMemoryEscrow::new();
        escrow.mint(addr(PROJECT), addr(TOKEN), dec(10_000_000));
        escrow.mint(addr(ALICE), addr(USD), dec(100_000));
        escrow.mint(addr(BOB), addr(USD), dec(100_000));
        Self {
            sales: SaleEngine::new(),
            locks: EntitlementLedger::new(),
            escrow,
            perms: CapabilityTable::with_root(addr(ADMIN)),
            admin: AdminConfig::from_config(&EngineConfig {
                fee_recipient: addr(FEES),
                ..EngineConfig::default()
            })
            .unwrap(),
        }
    }

    fn open(&mut self, params: SaleParams) -> SaleId {
        let id = self
            .sales
            .create_sale(&mut self.escrow, addr(PROJECT), params, day(0))
            .unwrap();
        self.sales.approve(&self.perms, addr(ADMIN), id, day(0)).unwrap();
        id
    }

    fn buy(&mut self, buyer: u64, id: SaleId, payment: i64, at: i64) -> openvest_types::EntitlementId {
        self.sales
            .buy(&mut self.escrow, &self.admin, addr(buyer), id, dec(payment), day(at))
            .unwrap()
    }

    /// Token custody equals what the lock records and unsettled sales still owe.
    fn assert_custody(&self) {
        let owed_by_locks: Decimal = self.locks.iter().map(|r| r.remaining()).sum();
        let owed_by_sales: Decimal = self
            .sales
            .range(0, 100)
            .unwrap()
            .into_iter()
            .map(|sale| {
                let owed: Decimal = self
                    .sales
                    .purchases_for_sale(sale.id)
                    .into_iter()
                    .map(|r| r.remaining())
                    .sum();
                if sale.settlement.is_some() || sale.status == SaleStatus::Rejected {
                    owed
                } else {
                    owed + sale.unsold()
                }
            })
            .sum();
        assert_eq!(
            self.escrow.custody(addr(TOKEN)),
            owed_by_locks + owed_by_sales
        );
        self.escrow.verify_all().unwrap();
    }
}

fn vesting_sale() -> SaleParams {
    SaleParams {
        sale_asset: addr(TOKEN),
        payment_asset: addr(USD),
        token_price: dec(10),
        payment_asset_unit: dec(1),
        window: SaleWindow {
            start: day(1),
            end: day(10),
        },
        min_buy: dec(10),
        max_buy: dec(5_000),
        total_offered: dec(1_000_000),
        schedule: Some(schedule(day(20), 2_000, 30, 1_000)),
        refunds_enabled: true,
        refund_window_end: day(40),
        description: "community round".into(),
    }
}

#[test]
fn sale_lifecycle_with_refund_and_settlement() {
    let mut h = Harness::new();
    let sale = h.open(vesting_sale());

    let alice = h.buy(ALICE, sale, 1_000, 2);
    let bob = h.buy(BOB, sale, 500, 3);
    assert_eq!(h.sales.sale(sale).unwrap().total_sold, dec(15_000));
    assert_eq!(h.sales.sale(sale).unwrap().total_raised, dec(1_500));
    h.assert_custody();

    // TGE: 20% of each purchase.
    assert_eq!(h.sales.claim(&mut h.escrow, addr(ALICE), alice, day(20)).unwrap(), dec(2_000));
    assert_eq!(h.sales.claim(&mut h.escrow, addr(BOB), bob, day(21)).unwrap(), dec(1_000));

    // Alice hands her delivered tokens back for 20% of her payment.
    let refund = h
        .sales
        .refund(&mut h.escrow, &h.admin, addr(ALICE), alice, day(25))
        .unwrap();
    assert_eq!(refund.tokens, dec(2_000));
    assert_eq!(refund.payment, dec(200));
    assert_eq!(h.escrow.balance(addr(ALICE), addr(USD)), dec(99_200));
    assert_eq!(h.sales.sale(sale).unwrap().total_sold, dec(13_000));
    h.assert_custody();

    // Refund window still open.
    assert!(matches!(
        h.sales.withdraw(&mut h.escrow, &h.admin, addr(PROJECT), sale, day(40)),
        Err(OpenvestError::StateConflict { .. })
    ));
    let settlement = h
        .sales
        .withdraw(&mut h.escrow, &h.admin, addr(PROJECT), sale, day(41))
        .unwrap();
    // 1_300 raised after the refund; 2% fee.
    assert_eq!(settlement.fee, dec(26));
    assert_eq!(settlement.proceeds, dec(1_274));
    assert_eq!(settlement.unsold, dec(987_000));
    assert_eq!(h.escrow.balance(addr(FEES), addr(USD)), dec(26));
    assert_eq!(h.escrow.balance(addr(PROJECT), addr(USD)), dec(1_274));
    assert_eq!(h.escrow.custody(addr(USD)), dec(0));
    h.assert_custody();

    assert_eq!(
        h.sales
            .withdraw(&mut h.escrow, &h.admin, addr(PROJECT), sale, day(42))
            .unwrap_err(),
        OpenvestError::AlreadySettled(sale)
    );
    assert!(matches!(
        h.sales.refund(&mut h.escrow, &h.admin, addr(BOB), bob, day(30)),
        Err(OpenvestError::StateConflict { .. })
    ));

    // Vesting keeps running for buyers after settlement.
    assert_eq!(h.sales.claim(&mut h.escrow, addr(BOB), bob, day(800)).unwrap(), dec(4_000));
    assert_eq!(h.sales.claim(&mut h.escrow, addr(ALICE), alice, day(800)).unwrap(), dec(8_000));
    assert_eq!(h.escrow.custody(addr(TOKEN)), dec(0));
    h.assert_custody();
}

#[test]
fn fee_plus_proceeds_equals_raised() {
    let mut h = Harness::new();
    let mut params = vesting_sale();
    params.refunds_enabled = false;
    params.schedule = None;
    let sale = h.open(params);
    h.sales
        .set_sale_fee(&h.perms, &h.admin, addr(ADMIN), sale, 333, day(1))
        .unwrap();
    for (buyer, payment) in [(ALICE, 1_237), (BOB, 4_999), (ALICE, 11)] {
        h.buy(buyer, sale, payment, 5);
    }

    let totals =
        ProceedsConservation::from_purchases(h.sales.purchases_for_sale(sale)).unwrap();
    assert_eq!(totals.expected_raised(), dec(6_247));

    let settlement = h
        .sales
        .withdraw(&mut h.escrow, &h.admin, addr(PROJECT), sale, day(11))
        .unwrap();
    // floor(6_247 * 333 / 10_000) = 208
    assert_eq!(settlement.fee, dec(208));
    assert_eq!(settlement.fee + settlement.proceeds, dec(6_247));
    assert_eq!(settlement.fee_bps, 333);
    h.assert_custody();
}

#[test]
fn notifications_follow_operation_order() {
    let mut h = Harness::new();
    let mut params = vesting_sale();
    params.refund_window_end = day(10);
    let sale = h.open(params);
    let id = h.buy(ALICE, sale, 100, 2);
    h.sales
        .withdraw(&mut h.escrow, &h.admin, addr(PROJECT), sale, day(11))
        .unwrap();
    h.sales.claim(&mut h.escrow, addr(ALICE), id, day(20)).unwrap();

    let events = h.sales.drain_events();
    let seqs: Vec<u64> = events.iter().map(|n| n.seq).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    let names: Vec<&str> = events
        .iter()
        .map(|n| match n.event {
            LedgerEvent::SaleCreated { .. } => "created",
            LedgerEvent::SaleStatusChanged { to: SaleStatus::Approved, .. } => "approved",
            LedgerEvent::PurchaseRecorded { .. } => "purchase",
            LedgerEvent::SaleSettled { .. } => "settled",
            LedgerEvent::SaleStatusChanged { to: SaleStatus::Ended, .. } => "ended",
            LedgerEvent::Released { .. } => "released",
            _ => "other",
        })
        .collect();
    assert_eq!(
        names,
        vec!["created", "approved", "purchase", "settled", "ended", "released"]
    );
}

#[test]
fn locks_and_sales_share_custody() {
    let mut h = Harness::new();
    let sale = h.open(vesting_sale());
    let team = h
        .locks
        .create(
            &mut h.escrow,
            &StaticClassifier::new(),
            &h.admin,
            addr(PROJECT),
            LockRequest {
                owner: addr(TEAM),
                asset: addr(TOKEN),
                is_pool_token: false,
                amount: dec(500_000),
                unlock: UnlockMode::Vesting(schedule(day(30), 0, 90, 2_500)),
                description: "team allocation".into(),
            },
            day(0),
        )
        .unwrap();
    let alice = h.buy(ALICE, sale, 2_000, 2);
    h.assert_custody();

    h.locks.claim(&mut h.escrow, addr(TEAM), team, day(120)).unwrap();
    h.sales.claim(&mut h.escrow, addr(ALICE), alice, day(120)).unwrap();
    assert_eq!(h.escrow.balance(addr(TEAM), addr(TOKEN)), dec(125_000));
    // 20% at TGE plus three 10% cycles.
    assert_eq!(h.escrow.balance(addr(ALICE), addr(TOKEN)), dec(10_000));
    h.assert_custody();

    // Global sale pause leaves locks untouched.
    h.admin
        .set_pause(&h.perms, &addr(ADMIN), false, true, day(121))
        .unwrap();
    assert!(matches!(
        h.sales.buy(&mut h.escrow, &h.admin, addr(BOB), sale, dec(10), day(5)),
        Err(OpenvestError::StateConflict { .. })
    ));
    h.locks.claim(&mut h.escrow, addr(TEAM), team, day(210)).unwrap();
    assert_eq!(h.escrow.balance(addr(TEAM), addr(TOKEN)), dec(250_000));
    h.assert_custody();
}

#[test]
fn rejected_sale_returns_inventory() {
    let mut h = Harness::new();
    let sale = h
        .sales
        .create_sale(&mut h.escrow, addr(PROJECT), vesting_sale(), day(0))
        .unwrap();
    h.sales
        .reject(&mut h.escrow, &h.perms, addr(ADMIN), sale, day(0))
        .unwrap();
    assert_eq!(h.escrow.balance(addr(PROJECT), addr(TOKEN)), dec(10_000_000));
    assert!(matches!(
        h.sales.buy(&mut h.escrow, &h.admin, addr(ALICE), sale, dec(100), day(2)),
        Err(OpenvestError::StateConflict { .. })
    ));
    assert!(h
        .sales
        .withdraw(&mut h.escrow, &h.admin, addr(PROJECT), sale, day(11))
        .is_err());
    h.assert_custody();
}
