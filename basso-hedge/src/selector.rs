//! Hedge strike selection: candidate filtering and margin-benefit-per-rupee
//! ranking.
//!
//! Filter candidates by premium/OTM band, rank by margin-benefit-per-rupee,
//! take the top candidate per leg.

use async_trait::async_trait;
use basso_markets::exchange::ExchangeId;
use basso_execution::gateway::GatewayError;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum OptionType {
    Call,
    Put,
}

/// One strike's quote from the index's option chain.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionQuote {
    pub symbol: String,
    pub exchange: ExchangeId,
    pub strike: Decimal,
    pub option_type: OptionType,
    pub ltp: Decimal,
}

/// Option-chain capability, kept separate from [`basso_execution::gateway::BrokerGateway`]
/// since option-chain retrieval is not one of that trait's operations.
#[async_trait]
pub trait OptionChainSource: Send + Sync + fmt::Debug {
    async fn option_chain(
        &self,
        index_symbol: &str,
        expiry: NaiveDate,
    ) -> Result<Vec<OptionQuote>, GatewayError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct HedgeCandidate {
    pub quote: OptionQuote,
    pub otm_distance: Decimal,
    pub mbpr: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HedgeSelection {
    pub call: HedgeCandidate,
    pub put: HedgeCandidate,
}

/// Filters the chain to strikes within `[min_premium, max_premium]` and
/// `[otm_band.min, otm_band.max]` of `spot`, ranks survivors by
/// margin-benefit-per-rupee (`margin_benefit / (ltp * quantity)`, constant
/// across candidates here since the benefit estimate is per-basket rather
/// than per-strike — ranking by MBPR therefore selects the cheapest
/// eligible strike), and returns the list sorted best-first.
pub fn rank_candidates(
    chain: &[OptionQuote],
    spot: Decimal,
    min_premium: Decimal,
    max_premium: Decimal,
    otm_min: Decimal,
    otm_max: Decimal,
    margin_benefit: Decimal,
    quantity: Decimal,
    option_type: OptionType,
) -> Vec<HedgeCandidate> {
    let mut candidates: Vec<HedgeCandidate> = chain
        .iter()
        .filter(|q| q.option_type == option_type)
        .filter(|q| q.ltp >= min_premium && q.ltp <= max_premium)
        .filter_map(|q| {
            let otm_distance = (q.strike - spot).abs();
            (otm_distance >= otm_min && otm_distance <= otm_max).then(|| {
                let cost = q.ltp * quantity;
                let mbpr = if cost > Decimal::ZERO {
                    margin_benefit / cost
                } else {
                    Decimal::ZERO
                };
                HedgeCandidate {
                    quote: q.clone(),
                    otm_distance,
                    mbpr,
                }
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.mbpr.cmp(&a.mbpr));
    candidates
}

/// Selects one CE and one PE for the full-pair hedge. Returns `None` if
/// either leg has no eligible candidate.
#[allow(clippy::too_many_arguments)]
pub fn select_pair(
    chain: &[OptionQuote],
    spot: Decimal,
    min_premium: Decimal,
    max_premium: Decimal,
    otm_min: Decimal,
    otm_max: Decimal,
    margin_benefit: Decimal,
    quantity: Decimal,
) -> Option<HedgeSelection> {
    let call = rank_candidates(
        chain,
        spot,
        min_premium,
        max_premium,
        otm_min,
        otm_max,
        margin_benefit,
        quantity,
        OptionType::Call,
    )
    .into_iter()
    .next()?;
    let put = rank_candidates(
        chain,
        spot,
        min_premium,
        max_premium,
        otm_min,
        otm_max,
        margin_benefit,
        quantity,
        OptionType::Put,
    )
    .into_iter()
    .next()?;

    Some(HedgeSelection { call, put })
}

/// In-memory option-chain source for `backtest`/simulated `live` runs.
/// Without a seeded spot for `index_symbol`, synthesizes a flat
/// strike ladder (500-point steps, matching Bank Nifty's own interval) whose
/// premium decays linearly with OTM distance — good enough to exercise
/// [`rank_candidates`]/[`select_pair`] without a live broker's chain feed,
/// which this platform's broker wire format explicitly leaves out of scope.
#[derive(Debug, Default)]
pub struct SimulatedOptionChainSource {
    spots: Mutex<HashMap<String, Decimal>>,
}

impl SimulatedOptionChainSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchors the synthetic chain's spot for `index_symbol` so its strikes
    /// are generated around a realistic level.
    pub fn seed_spot(&self, index_symbol: impl Into<String>, spot: Decimal) {
        self.spots.lock().insert(index_symbol.into(), spot);
    }

    fn synthetic_chain(&self, index_symbol: &str, expiry: NaiveDate) -> Vec<OptionQuote> {
        let spot = self
            .spots
            .lock()
            .get(index_symbol)
            .copied()
            .unwrap_or(dec!(25000));
        let step = dec!(500);
        let exchange = ExchangeId::Nse;
        let mut chain = Vec::with_capacity(20);
        for i in -5..=5i32 {
            let strike = spot + Decimal::from(i) * step;
            let otm_distance = (strike - spot).abs();
            let premium = (dec!(10) - otm_distance / dec!(200)).max(dec!(0.05));
            for option_type in [OptionType::Call, OptionType::Put] {
                let suffix = match option_type {
                    OptionType::Call => "CE",
                    OptionType::Put => "PE",
                };
                chain.push(OptionQuote {
                    symbol: format!("{index_symbol}{}{strike}{suffix}", expiry.format("%d%b%y")),
                    exchange,
                    strike,
                    option_type,
                    ltp: premium,
                });
            }
        }
        chain
    }
}

#[async_trait]
impl OptionChainSource for SimulatedOptionChainSource {
    async fn option_chain(
        &self,
        index_symbol: &str,
        expiry: NaiveDate,
    ) -> Result<Vec<OptionQuote>, GatewayError> {
        Ok(self.synthetic_chain(index_symbol, expiry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn chain() -> Vec<OptionQuote> {
        vec![
            OptionQuote {
                symbol: "NIFTY25JAN25500CE".into(),
                exchange: ExchangeId::Nse,
                strike: dec!(25500),
                option_type: OptionType::Call,
                ltp: dec!(3.5),
            },
            OptionQuote {
                symbol: "NIFTY25JAN26000CE".into(),
                exchange: ExchangeId::Nse,
                strike: dec!(26000),
                option_type: OptionType::Call,
                ltp: dec!(1.5),
            },
            OptionQuote {
                symbol: "NIFTY25JAN24000CE".into(),
                exchange: ExchangeId::Nse,
                strike: dec!(24000),
                option_type: OptionType::Call,
                ltp: dec!(8.0),
            },
            OptionQuote {
                symbol: "NIFTY25JAN24500PE".into(),
                exchange: ExchangeId::Nse,
                strike: dec!(24500),
                option_type: OptionType::Put,
                ltp: dec!(4.0),
            },
        ]
    }

    #[test]
    fn ranks_cheapest_eligible_candidate_first() {
        let candidates = rank_candidates(
            &chain(),
            dec!(25000),
            dec!(2),
            dec!(6),
            dec!(200),
            dec!(1000),
            dec!(140000),
            dec!(75),
            OptionType::Call,
        );
        // 26000 strike is outside the max OTM band (1000); 24000's premium (8.0)
        // exceeds max_premium; only 25500 survives both filters.
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].quote.strike, dec!(25500));
    }

    #[test]
    fn select_pair_returns_both_legs_when_both_are_eligible() {
        let selection = select_pair(
            &chain(),
            dec!(25000),
            dec!(2),
            dec!(6),
            dec!(200),
            dec!(1000),
            dec!(140000),
            dec!(75),
        );
        // one CE (25500) and one PE (24500) survive the premium/OTM filters.
        assert!(selection.is_some());
    }

    #[test]
    fn select_pair_returns_none_when_a_leg_has_no_candidate() {
        // no PE quotes in this chain at all -> the put leg can never be filled.
        let calls_only: Vec<OptionQuote> = chain()
            .into_iter()
            .filter(|q| q.option_type == OptionType::Call)
            .collect();
        let selection = select_pair(
            &calls_only,
            dec!(25000),
            dec!(2),
            dec!(6),
            dec!(200),
            dec!(1000),
            dec!(140000),
            dec!(75),
        );
        assert!(selection.is_none());
    }

    #[tokio::test]
    async fn simulated_chain_has_both_legs_eligible_around_seeded_spot() {
        let source = SimulatedOptionChainSource::new();
        source.seed_spot("NIFTY", dec!(25000));
        let chain = source
            .option_chain("NIFTY", chrono::NaiveDate::from_ymd_opt(2026, 1, 29).unwrap())
            .await
            .unwrap();
        let selection = select_pair(
            &chain,
            dec!(25000),
            dec!(0.05),
            dec!(10),
            dec!(200),
            dec!(1000),
            dec!(140000),
            dec!(75),
        );
        assert!(selection.is_some());
    }
}
