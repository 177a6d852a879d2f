//! Layered position ledger: cash, per-instrument partial positions, and the
//! append-only trade/snapshot logs.
//!
//! Buy and sell never fail for ordinary business conditions; an order that
//! cannot fill (sub-lot size, insufficient cash, occupied layer) is rejected
//! without touching any state and the caller treats the signal as not
//! actionable this bar.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// One partial position in an instrument's ladder. Layers are closed whole;
/// a layer's shares are never split across sells.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub layer_index: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub shares: u64,
    pub target_profit_rate: f64,
}

impl Layer {
    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    pub fn profit_rate(&self, price: f64) -> f64 {
        (price - self.entry_price) / self.entry_price
    }

    pub fn profit_amount(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.shares as f64
    }
}

/// Open layers of one instrument plus the entry reference price: the MA120
/// captured at the first entry of the current position cycle. The reference
/// is never touched by later adds and disappears with the manager when the
/// instrument returns to flat.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionManager {
    pub code: String,
    pub layers: Vec<Layer>,
    pub entry_reference: Option<f64>,
}

impl PositionManager {
    pub fn new(code: String) -> Self {
        Self {
            code,
            layers: Vec::new(),
            entry_reference: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn has_layer(&self, layer_index: usize) -> bool {
        self.layers.iter().any(|l| l.layer_index == layer_index)
    }

    pub fn layer(&self, layer_index: usize) -> Option<&Layer> {
        self.layers.iter().find(|l| l.layer_index == layer_index)
    }

    pub fn total_shares(&self) -> u64 {
        self.layers.iter().map(|l| l.shares).sum()
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.layers.iter().map(|l| l.market_value(price)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    SellLayer,
    SellAll,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::SellLayer => "SELL_LAYER",
            TradeAction::SellAll => "SELL_ALL",
        }
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, TradeAction::SellLayer | TradeAction::SellAll)
    }
}

/// Market diagnostics attached to a trade for later analysis; all optional,
/// absent when the data wasn't available on the trade date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeContext {
    pub index_level: Option<f64>,
    pub ma120: Option<f64>,
    /// close / MA120 - 1, in percent
    pub ma120_deviation_pct: Option<f64>,
    pub atr_percent: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
}

/// Unrealized P&L of a buy still open at the end of the run, computed against
/// the final close without closing the position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnrealizedPnl {
    pub price: f64,
    pub profit_amount: f64,
    pub profit_rate: f64,
}

/// Immutable trade log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub action: TradeAction,
    pub date: NaiveDate,
    pub code: String,
    pub name: String,
    pub price: f64,
    pub shares: u64,
    pub amount: f64,
    pub commission: f64,
    /// Sell-side only; zero on buys.
    pub stamp_tax: f64,
    pub layer_index: usize,
    /// Buys: price at which the layer's take-profit triggers.
    pub target_price: Option<f64>,
    pub entry_date: Option<NaiveDate>,
    pub entry_price: Option<f64>,
    pub profit_rate: Option<f64>,
    pub profit_amount: Option<f64>,
    pub holding_days: Option<i64>,
    pub reason: Option<String>,
    /// Realized P&L of this instrument up to and including this record.
    pub cumulative_pnl: f64,
    pub context: TradeContext,
    pub unrealized: Option<UnrealizedPnl>,
}

/// Daily portfolio snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub date: NaiveDate,
    pub cash: f64,
    pub stock_value: f64,
    pub total_value: f64,
    /// Return since the start of the run.
    pub return_rate: f64,
    pub position_count: usize,
    pub layer_counts: BTreeMap<String, usize>,
    pub index_level: Option<f64>,
}

/// Commission/tax rates and the board lot, shared by every order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub commission_rate: f64,
    pub stamp_tax_rate: f64,
    pub board_lot: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuyOutcome {
    Filled {
        shares: u64,
        amount: f64,
        commission: f64,
    },
    Rejected,
}

impl BuyOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, BuyOutcome::Filled { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellTarget {
    Layer(usize),
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SellResult {
    pub layers_closed: usize,
    pub shares_sold: u64,
    pub net_proceeds: f64,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    pub cash: f64,
    pub initial_capital: f64,
    pub costs: CostModel,
    pub positions: HashMap<String, PositionManager>,
    pub trades: Vec<TradeRecord>,
    pub snapshots: Vec<SnapshotRecord>,
    realized: HashMap<String, f64>,
}

impl Ledger {
    pub fn new(initial_capital: f64, costs: CostModel) -> Self {
        Ledger {
            cash: initial_capital,
            initial_capital,
            costs,
            positions: HashMap::new(),
            trades: Vec::new(),
            snapshots: Vec::new(),
            realized: HashMap::new(),
        }
    }

    pub fn manager(&self, code: &str) -> Option<&PositionManager> {
        self.positions.get(code)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_position(&self, code: &str) -> bool {
        self.positions.contains_key(code)
    }

    /// Realized P&L accumulated by an instrument so far.
    pub fn realized_pnl(&self, code: &str) -> f64 {
        self.realized.get(code).copied().unwrap_or(0.0)
    }

    /// Open codes in deterministic (sorted) order, for reproducible per-day
    /// iteration.
    pub fn open_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.positions.keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Round a currency amount down to a whole number of board lots at
    /// `price`. Zero when even one lot is unaffordable.
    fn lot_shares(&self, amount: f64, price: f64) -> u64 {
        let lot = self.costs.board_lot as f64;
        let lots = (amount / price / lot).floor();
        if lots <= 0.0 {
            0
        } else {
            lots as u64 * self.costs.board_lot
        }
    }

    /// Execute a buy of up to `amount` at `price` into `layer_index`.
    ///
    /// `entry_reference` is captured only when this creates the instrument's
    /// first open layer; re-buys of an occupied layer index, sub-lot results
    /// and unaffordable orders are rejected with no state change.
    #[allow(clippy::too_many_arguments)]
    pub fn buy(
        &mut self,
        code: &str,
        name: &str,
        date: NaiveDate,
        price: f64,
        amount: f64,
        layer_index: usize,
        entry_reference: Option<f64>,
        target_profit_rate: f64,
        context: TradeContext,
    ) -> BuyOutcome {
        if price <= 0.0 {
            return BuyOutcome::Rejected;
        }
        if let Some(pm) = self.positions.get(code) {
            if pm.has_layer(layer_index) {
                return BuyOutcome::Rejected;
            }
        }

        let shares = self.lot_shares(amount, price);
        if shares == 0 {
            return BuyOutcome::Rejected;
        }

        let actual_amount = shares as f64 * price;
        let commission = actual_amount * self.costs.commission_rate;
        let total_cost = actual_amount + commission;
        if total_cost > self.cash {
            return BuyOutcome::Rejected;
        }

        self.cash -= total_cost;

        let pm = self
            .positions
            .entry(code.to_string())
            .or_insert_with(|| PositionManager::new(code.to_string()));
        let first_layer = pm.is_empty();
        pm.layers.push(Layer {
            layer_index,
            entry_date: date,
            entry_price: price,
            shares,
            target_profit_rate,
        });
        if first_layer {
            pm.entry_reference = entry_reference;
        }

        self.trades.push(TradeRecord {
            action: TradeAction::Buy,
            date,
            code: code.to_string(),
            name: name.to_string(),
            price,
            shares,
            amount: actual_amount,
            commission,
            stamp_tax: 0.0,
            layer_index,
            target_price: Some(price * (1.0 + target_profit_rate)),
            entry_date: None,
            entry_price: None,
            profit_rate: None,
            profit_amount: None,
            holding_days: None,
            reason: None,
            cumulative_pnl: self.realized_pnl(code),
            context,
            unrealized: None,
        });

        BuyOutcome::Filled {
            shares,
            amount: actual_amount,
            commission,
        }
    }

    /// Sell one layer or the whole position at `price`. Each targeted layer
    /// is removed wholesale and recorded as its own trade; the manager (and
    /// its entry reference) is discarded once no layers remain.
    ///
    /// Returns `None` when the instrument or layer is unknown.
    pub fn sell(
        &mut self,
        code: &str,
        date: NaiveDate,
        price: f64,
        target: SellTarget,
        reason: &str,
        context: TradeContext,
    ) -> Option<SellResult> {
        let pm = self.positions.get_mut(code)?;

        let mut to_close: Vec<Layer> = match target {
            SellTarget::All => {
                let mut all = std::mem::take(&mut pm.layers);
                all.sort_by_key(|l| l.layer_index);
                all
            }
            SellTarget::Layer(idx) => {
                let pos = pm.layers.iter().position(|l| l.layer_index == idx)?;
                vec![pm.layers.remove(pos)]
            }
        };
        if to_close.is_empty() {
            return None;
        }

        let action = match target {
            SellTarget::All => TradeAction::SellAll,
            SellTarget::Layer(_) => TradeAction::SellLayer,
        };
        let name = self
            .trades
            .iter()
            .rev()
            .find(|t| t.code == code)
            .map(|t| t.name.clone())
            .unwrap_or_default();

        let mut shares_sold = 0u64;
        let mut net_proceeds = 0.0;
        let layers_closed = to_close.len();

        for layer in to_close.drain(..) {
            let amount = layer.shares as f64 * price;
            let commission = amount * self.costs.commission_rate;
            let stamp_tax = amount * self.costs.stamp_tax_rate;
            let net = amount - commission - stamp_tax;

            self.cash += net;
            shares_sold += layer.shares;
            net_proceeds += net;

            let profit_amount = layer.profit_amount(price);
            let cumulative = self.realized.entry(code.to_string()).or_insert(0.0);
            *cumulative += profit_amount;
            let cumulative_pnl = *cumulative;

            self.trades.push(TradeRecord {
                action,
                date,
                code: code.to_string(),
                name: name.clone(),
                price,
                shares: layer.shares,
                amount,
                commission,
                stamp_tax,
                layer_index: layer.layer_index,
                target_price: None,
                entry_date: Some(layer.entry_date),
                entry_price: Some(layer.entry_price),
                profit_rate: Some(layer.profit_rate(price)),
                profit_amount: Some(profit_amount),
                holding_days: Some((date - layer.entry_date).num_days()),
                reason: Some(reason.to_string()),
                cumulative_pnl,
                context: context.clone(),
                unrealized: None,
            });
        }

        let emptied = self.positions.get(code).map(|pm| pm.is_empty()) == Some(true);
        if emptied {
            self.positions.remove(code);
        }

        Some(SellResult {
            layers_closed,
            shares_sold,
            net_proceeds,
        })
    }

    /// Mark-to-market equity against a price map (missing codes contribute
    /// nothing).
    pub fn total_value(&self, prices: &HashMap<String, f64>) -> f64 {
        let stock_value: f64 = self
            .positions
            .iter()
            .filter_map(|(code, pm)| prices.get(code).map(|&p| pm.market_value(p)))
            .sum();
        self.cash + stock_value
    }

    /// Append a daily snapshot of cash, exposure and per-instrument layers.
    pub fn record_snapshot(
        &mut self,
        date: NaiveDate,
        prices: &HashMap<String, f64>,
        index_level: Option<f64>,
    ) {
        let total_value = self.total_value(prices);
        let layer_counts: BTreeMap<String, usize> = self
            .positions
            .iter()
            .map(|(code, pm)| (code.clone(), pm.layer_count()))
            .collect();

        self.snapshots.push(SnapshotRecord {
            date,
            cash: self.cash,
            stock_value: total_value - self.cash,
            total_value,
            return_rate: (total_value - self.initial_capital) / self.initial_capital,
            position_count: self.positions.len(),
            layer_counts,
            index_level,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn costs() -> CostModel {
        CostModel {
            commission_rate: 0.0003,
            stamp_tax_rate: 0.001,
            board_lot: 100,
        }
    }

    fn free_costs() -> CostModel {
        CostModel {
            commission_rate: 0.0,
            stamp_tax_rate: 0.0,
            board_lot: 100,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn buy_simple(ledger: &mut Ledger, code: &str, day: u32, price: f64, amount: f64, layer: usize) -> BuyOutcome {
        ledger.buy(
            code,
            "test",
            date(day),
            price,
            amount,
            layer,
            Some(price / 0.88),
            0.12,
            TradeContext::default(),
        )
    }

    #[test]
    fn buy_rounds_to_board_lot() {
        let mut ledger = Ledger::new(100_000.0, costs());
        let outcome = buy_simple(&mut ledger, "600519", 1, 10.0, 2_550.0, 0);

        match outcome {
            BuyOutcome::Filled { shares, amount, .. } => {
                assert_eq!(shares, 200); // 255 shares rounds down to 2 lots
                assert!((amount - 2_000.0).abs() < 1e-9);
            }
            BuyOutcome::Rejected => panic!("expected fill"),
        }
        assert_eq!(ledger.manager("600519").unwrap().total_shares(), 200);
    }

    #[test]
    fn sub_lot_buy_rejected_without_state_change() {
        let mut ledger = Ledger::new(100_000.0, costs());
        let outcome = buy_simple(&mut ledger, "600519", 1, 10.0, 900.0, 0);

        assert_eq!(outcome, BuyOutcome::Rejected);
        assert!((ledger.cash - 100_000.0).abs() < f64::EPSILON);
        assert!(ledger.trades.is_empty());
        assert!(!ledger.has_position("600519"));
    }

    #[test]
    fn unaffordable_buy_rejected() {
        let mut ledger = Ledger::new(1_500.0, costs());
        // 100 shares * 10 = 1000 affordable; ask for 10 lots
        let outcome = buy_simple(&mut ledger, "600519", 1, 10.0, 10_000.0, 0);
        assert_eq!(outcome, BuyOutcome::Rejected);
        assert!((ledger.cash - 1_500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn occupied_layer_index_rejected() {
        let mut ledger = Ledger::new(100_000.0, costs());
        assert!(buy_simple(&mut ledger, "600519", 1, 10.0, 5_000.0, 0).is_filled());
        let again = buy_simple(&mut ledger, "600519", 2, 9.0, 5_000.0, 0);
        assert_eq!(again, BuyOutcome::Rejected);
        assert_eq!(ledger.manager("600519").unwrap().layer_count(), 1);
    }

    #[test]
    fn entry_reference_captured_once_per_cycle() {
        let mut ledger = Ledger::new(100_000.0, costs());
        ledger.buy(
            "600519",
            "test",
            date(1),
            10.0,
            5_000.0,
            0,
            Some(11.36),
            0.12,
            TradeContext::default(),
        );
        // the add passes a different reference; it must not overwrite
        ledger.buy(
            "600519",
            "test",
            date(2),
            9.0,
            5_000.0,
            1,
            Some(99.0),
            0.12,
            TradeContext::default(),
        );

        let pm = ledger.manager("600519").unwrap();
        assert_eq!(pm.entry_reference, Some(11.36));
    }

    #[test]
    fn sell_layer_closes_whole_layer_only() {
        let mut ledger = Ledger::new(100_000.0, free_costs());
        buy_simple(&mut ledger, "600519", 1, 10.0, 5_000.0, 0);
        buy_simple(&mut ledger, "600519", 2, 9.0, 5_000.0, 1);

        let result = ledger
            .sell(
                "600519",
                date(5),
                11.0,
                SellTarget::Layer(0),
                "layer take-profit (12%)",
                TradeContext::default(),
            )
            .unwrap();

        assert_eq!(result.layers_closed, 1);
        assert_eq!(result.shares_sold, 500);
        let pm = ledger.manager("600519").unwrap();
        assert_eq!(pm.layer_count(), 1);
        assert!(pm.has_layer(1));
        // reference survives while any layer is open
        assert!(pm.entry_reference.is_some());
    }

    #[test]
    fn sell_all_clears_manager_and_reference() {
        let mut ledger = Ledger::new(100_000.0, costs());
        buy_simple(&mut ledger, "600519", 1, 10.0, 5_000.0, 0);
        buy_simple(&mut ledger, "600519", 2, 9.0, 5_000.0, 1);

        let result = ledger
            .sell(
                "600519",
                date(10),
                12.0,
                SellTarget::All,
                "forced clear",
                TradeContext::default(),
            )
            .unwrap();

        assert_eq!(result.layers_closed, 2);
        assert!(!ledger.has_position("600519"));
        // one trade record per layer
        let sells: Vec<_> = ledger.trades.iter().filter(|t| t.action.is_sell()).collect();
        assert_eq!(sells.len(), 2);
        assert!(sells.iter().all(|t| t.action == TradeAction::SellAll));
        // layers recorded in ascending index order
        assert_eq!(sells[0].layer_index, 0);
        assert_eq!(sells[1].layer_index, 1);
    }

    #[test]
    fn sell_unknown_layer_is_none() {
        let mut ledger = Ledger::new(100_000.0, costs());
        buy_simple(&mut ledger, "600519", 1, 10.0, 5_000.0, 0);

        let cash_before = ledger.cash;
        assert!(ledger
            .sell(
                "600519",
                date(2),
                11.0,
                SellTarget::Layer(3),
                "layer take-profit (12%)",
                TradeContext::default(),
            )
            .is_none());
        assert!(ledger
            .sell(
                "000001",
                date(2),
                11.0,
                SellTarget::All,
                "forced clear",
                TradeContext::default(),
            )
            .is_none());
        assert!((ledger.cash - cash_before).abs() < f64::EPSILON);
    }

    #[test]
    fn sell_records_profit_and_holding_days() {
        let mut ledger = Ledger::new(100_000.0, costs());
        buy_simple(&mut ledger, "600519", 1, 10.0, 5_000.0, 0);

        ledger.sell(
            "600519",
            date(15),
            11.2,
            SellTarget::Layer(0),
            "layer take-profit (12%)",
            TradeContext::default(),
        );

        let sell = ledger.trades.last().unwrap();
        assert_eq!(sell.holding_days, Some(14));
        assert!((sell.profit_rate.unwrap() - 0.12).abs() < 1e-9);
        assert!((sell.profit_amount.unwrap() - 500.0 * 1.2).abs() < 1e-9);
        assert_eq!(sell.entry_date, Some(date(1)));
        assert!((sell.cumulative_pnl - 600.0).abs() < 1e-9);
    }

    #[test]
    fn cumulative_pnl_tracks_instrument_history() {
        let mut ledger = Ledger::new(100_000.0, free_costs());
        buy_simple(&mut ledger, "600519", 1, 10.0, 5_000.0, 0);
        ledger.sell(
            "600519",
            date(3),
            12.0,
            SellTarget::All,
            "forced clear",
            TradeContext::default(),
        );
        // second cycle, closed at a loss
        buy_simple(&mut ledger, "600519", 5, 10.0, 5_000.0, 0);
        ledger.sell(
            "600519",
            date(7),
            9.0,
            SellTarget::All,
            "forced clear",
            TradeContext::default(),
        );

        // +1000 then -500
        assert!((ledger.realized_pnl("600519") - 500.0).abs() < 1e-9);
        let last = ledger.trades.last().unwrap();
        assert!((last.cumulative_pnl - 500.0).abs() < 1e-9);
    }

    #[test]
    fn cash_identity_round_trip() {
        let mut ledger = Ledger::new(100_000.0, costs());
        let outcome = buy_simple(&mut ledger, "600519", 1, 10.0, 5_000.0, 0);
        let (amount, commission) = match outcome {
            BuyOutcome::Filled {
                amount, commission, ..
            } => (amount, commission),
            _ => panic!("expected fill"),
        };

        let result = ledger
            .sell(
                "600519",
                date(3),
                11.0,
                SellTarget::All,
                "forced clear",
                TradeContext::default(),
            )
            .unwrap();

        let expected = 100_000.0 - amount - commission + result.net_proceeds;
        assert!((ledger.cash - expected).abs() < 1e-9);
    }

    #[test]
    fn snapshot_marks_to_market() {
        let mut ledger = Ledger::new(100_000.0, free_costs());
        buy_simple(&mut ledger, "600519", 1, 10.0, 5_000.0, 0);

        let mut prices = HashMap::new();
        prices.insert("600519".to_string(), 12.0);
        ledger.record_snapshot(date(2), &prices, Some(3_000.0));

        let snap = ledger.snapshots.last().unwrap();
        assert!((snap.stock_value - 6_000.0).abs() < 1e-9);
        assert!((snap.total_value - 101_000.0).abs() < 1e-9);
        assert!((snap.return_rate - 0.01).abs() < 1e-9);
        assert_eq!(snap.position_count, 1);
        assert_eq!(snap.layer_counts.get("600519"), Some(&1));
        assert_eq!(snap.index_level, Some(3_000.0));
    }

    #[test]
    fn shares_always_lot_multiples() {
        let mut ledger = Ledger::new(1_000_000.0, costs());
        for (i, amount) in [5_000.0, 12_345.0, 999.0, 100_000.0].iter().enumerate() {
            buy_simple(&mut ledger, "600519", 1, 10.33, *amount, i);
        }
        for trade in &ledger.trades {
            assert_eq!(trade.shares % 100, 0);
        }
    }

    proptest! {
        /// Cash after any trade sequence equals the initial capital minus
        /// buy costs plus net sell proceeds.
        #[test]
        fn prop_cash_conservation(
            prices in proptest::collection::vec(1.0f64..200.0, 1..20),
            amounts in proptest::collection::vec(500.0f64..50_000.0, 1..20),
        ) {
            let mut ledger = Ledger::new(500_000.0, costs());
            let mut expected = 500_000.0;

            for (i, (&price, &amount)) in prices.iter().zip(amounts.iter()).enumerate() {
                let layer = i % 4;
                match ledger.buy(
                    "600519", "test", date(1), price, amount, layer,
                    None, 0.12, TradeContext::default(),
                ) {
                    BuyOutcome::Filled { amount, commission, .. } => {
                        expected -= amount + commission;
                    }
                    BuyOutcome::Rejected => {}
                }

                if i % 3 == 2 {
                    if let Some(result) = ledger.sell(
                        "600519", date(2), price * 1.1, SellTarget::All,
                        "forced clear", TradeContext::default(),
                    ) {
                        expected += result.net_proceeds;
                    }
                }
            }

            prop_assert!((ledger.cash - expected).abs() < 1e-6);
            prop_assert!(ledger.cash >= 0.0);
        }

        /// Every closed layer sells exactly the shares it was created with.
        #[test]
        fn prop_layer_shares_conserved(
            price in 1.0f64..100.0,
            amount in 1_000.0f64..100_000.0,
        ) {
            let mut ledger = Ledger::new(1_000_000.0, costs());
            let bought = match ledger.buy(
                "600519", "test", date(1), price, amount, 0,
                None, 0.12, TradeContext::default(),
            ) {
                BuyOutcome::Filled { shares, .. } => shares,
                BuyOutcome::Rejected => return Ok(()),
            };

            let result = ledger.sell(
                "600519", date(2), price, SellTarget::Layer(0),
                "layer take-profit (12%)", TradeContext::default(),
            ).unwrap();
            prop_assert_eq!(result.shares_sold, bought);
        }
    }
}
