use serde::{Deserialize, Serialize};

/// Tradable instrument from the broker catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: i64,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument_type: Option<String>,
    /// Route used for order submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_route_id: Option<i64>,
    /// Route used for market data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_route_id: Option<i64>,
    /// Reference price, only known to the paper broker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_price: Option<f64>,
}

impl Instrument {
    pub fn new(id: i64, symbol: impl Into<String>) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            description: None,
            instrument_type: None,
            trade_route_id: None,
            info_route_id: None,
            reference_price: None,
        }
    }
}

/// Top of book quote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub ask: f64,
    pub bid: f64,
}

/// Where a reported price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Live,
    /// The broker had no quote; prices are zero placeholders.
    Placeholder,
}

/// Price lookup result for a symbol.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentPrice {
    pub symbol: String,
    pub instrument_id: i64,
    pub ask_price: f64,
    pub bid_price: f64,
    pub price_source: PriceSource,
}

impl InstrumentPrice {
    pub fn from_quote(instrument: &Instrument, quote: Option<Quote>) -> Self {
        let (ask, bid, source) = match quote {
            Some(q) => (q.ask, q.bid, PriceSource::Live),
            None => (0.0, 0.0, PriceSource::Placeholder),
        };
        Self {
            symbol: instrument.symbol.clone(),
            instrument_id: instrument.id,
            ask_price: ask,
            bid_price: bid,
            price_source: source,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstrumentsPayload {
    pub instruments: Vec<Instrument>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_quote_uses_placeholder() {
        let instrument = Instrument::new(5, "BTCUSD");
        let price = InstrumentPrice::from_quote(&instrument, None);

        assert_eq!(price.ask_price, 0.0);
        assert_eq!(price.bid_price, 0.0);
        assert_eq!(price.price_source, PriceSource::Placeholder);
    }

    #[test]
    fn test_live_quote() {
        let instrument = Instrument::new(5, "BTCUSD");
        let price = InstrumentPrice::from_quote(
            &instrument,
            Some(Quote {
                ask: 101.0,
                bid: 100.0,
            }),
        );

        assert_eq!(price.symbol, "BTCUSD");
        assert_eq!(price.instrument_id, 5);
        assert_eq!(price.ask_price, 101.0);
        assert_eq!(price.price_source, PriceSource::Live);
    }
}
