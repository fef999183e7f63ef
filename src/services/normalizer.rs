//! Order Request Normalizer
//!
//! Validates a raw [`OrderIntent`] and turns it into the parameter set the
//! broker expects. Optional broker fields are added by an ordered table of
//! [`FieldRule`]s on top of the required base.

use crate::error::{GatewayError, Result};
use crate::types::{
    BrokerOrderParams, Instrument, LevelType, OrderIntent, OrderRequest, OrderSide, OrderType,
    Validity,
};

const DEFAULT_USER_ID: &str = "default";

fn join_valid<T>(values: &[T], name: fn(&T) -> &'static str) -> String {
    values.iter().map(name).collect::<Vec<_>>().join(", ")
}

/// Validate a raw intent.
pub fn validate(intent: &OrderIntent) -> Result<OrderRequest> {
    let symbol = intent
        .symbol
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let (Some(symbol), Some(order_type), Some(side), Some(quantity)) = (
        symbol,
        intent.order_type.as_deref(),
        intent.side.as_deref(),
        intent.quantity,
    ) else {
        let missing: Vec<&str> = [
            ("symbol", symbol.is_none()),
            ("order_type", intent.order_type.is_none()),
            ("side", intent.side.is_none()),
            ("quantity", intent.quantity.is_none()),
        ]
        .into_iter()
        .filter_map(|(field, absent)| absent.then_some(field))
        .collect();

        return Err(GatewayError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    };

    let order_type: OrderType = order_type.parse().map_err(|_| {
        GatewayError::Validation(format!(
            "Invalid order_type. Must be one of: {}",
            join_valid(&OrderType::ALL, OrderType::as_str)
        ))
    })?;

    let side: OrderSide = side.parse().map_err(|_| {
        GatewayError::Validation(format!(
            "Invalid side. Must be one of: {}",
            join_valid(&OrderSide::ALL, OrderSide::as_str)
        ))
    })?;

    if !(quantity.is_finite() && quantity > 0.0) {
        return Err(GatewayError::Validation(
            "Quantity must be greater than 0".to_string(),
        ));
    }

    ensure_positive(intent.price, "Price")?;
    ensure_positive(intent.stop_price, "Stop price")?;
    ensure_positive(intent.trailing_distance, "Trailing distance")?;

    if order_type.requires_price() && intent.price.is_none() {
        return Err(GatewayError::Validation(format!(
            "Price is required for {} orders",
            order_type
        )));
    }
    if order_type.requires_stop_price() && intent.stop_price.is_none() {
        return Err(GatewayError::Validation(format!(
            "Stop price is required for {} orders",
            order_type
        )));
    }

    let validity = intent
        .validity
        .as_deref()
        .map(|v| {
            v.parse::<Validity>().map_err(|_| {
                GatewayError::Validation(format!(
                    "Invalid validity. Must be one of: {}",
                    join_valid(&Validity::ALL, Validity::as_str)
                ))
            })
        })
        .transpose()?;

    let stop_loss_type = parse_level_type(intent.stop_loss_type.as_deref(), "stop_loss_type")?;
    let take_profit_type =
        parse_level_type(intent.take_profit_type.as_deref(), "take_profit_type")?;

    Ok(OrderRequest {
        symbol: symbol.to_string(),
        order_type,
        side,
        quantity,
        price: intent.price,
        stop_price: intent.stop_price,
        stop_loss: intent.stop_loss,
        stop_loss_type,
        take_profit: intent.take_profit,
        take_profit_type,
        trailing_distance: intent.trailing_distance,
        validity,
        user_id: intent
            .user_id
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
    })
}

fn ensure_positive(value: Option<f64>, label: &str) -> Result<()> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => Err(GatewayError::Validation(format!(
            "{} must be greater than 0",
            label
        ))),
        _ => Ok(()),
    }
}

fn parse_level_type(value: Option<&str>, field: &str) -> Result<Option<LevelType>> {
    value
        .map(|v| {
            v.parse::<LevelType>().map_err(|_| {
                GatewayError::Validation(format!(
                    "Invalid {}. Must be one of: {}",
                    field,
                    join_valid(&LevelType::ALL, LevelType::as_str)
                ))
            })
        })
        .transpose()
}

/// Exact, case-sensitive symbol lookup.
pub fn resolve_instrument<'a>(symbol: &str, catalog: &'a [Instrument]) -> Result<&'a Instrument> {
    catalog
        .iter()
        .find(|i| i.symbol == symbol)
        .ok_or_else(|| GatewayError::NotFound(format!("Instrument {} not found", symbol)))
}

// =============================================================================
// Field rules
// =============================================================================

/// One conditional field of the broker parameter set.
pub struct FieldRule {
    /// Broker field(s) this rule sets.
    pub field: &'static str,
    pub applies: fn(&OrderRequest) -> bool,
    pub apply: fn(&OrderRequest, &mut BrokerOrderParams),
}

fn has_limit_price(o: &OrderRequest) -> bool {
    matches!(o.order_type, OrderType::Limit | OrderType::StopLimit) && o.price.is_some()
}

fn set_price(o: &OrderRequest, p: &mut BrokerOrderParams) {
    p.price = o.price;
}

fn has_stop_price(o: &OrderRequest) -> bool {
    o.order_type.requires_stop_price() && o.stop_price.is_some()
}

fn set_stop_price(o: &OrderRequest, p: &mut BrokerOrderParams) {
    p.stop_price = o.stop_price;
}

fn has_stop_loss(o: &OrderRequest) -> bool {
    o.stop_loss.is_some()
}

fn set_stop_loss(o: &OrderRequest, p: &mut BrokerOrderParams) {
    p.stop_loss = o.stop_loss;
    p.stop_loss_type = Some(o.stop_loss_type.unwrap_or(LevelType::Absolute));
}

fn has_take_profit(o: &OrderRequest) -> bool {
    o.take_profit.is_some()
}

fn set_take_profit(o: &OrderRequest, p: &mut BrokerOrderParams) {
    p.take_profit = o.take_profit;
    p.take_profit_type = Some(o.take_profit_type.unwrap_or(LevelType::Absolute));
}

fn has_trailing_distance(o: &OrderRequest) -> bool {
    o.trailing_distance.is_some()
}

fn set_trailing_distance(o: &OrderRequest, p: &mut BrokerOrderParams) {
    p.trailing_distance = o.trailing_distance;
}

/// Conditional fields, applied in order.
pub static FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        field: "price",
        applies: has_limit_price,
        apply: set_price,
    },
    FieldRule {
        field: "stop_price",
        applies: has_stop_price,
        apply: set_stop_price,
    },
    FieldRule {
        field: "stop_loss",
        applies: has_stop_loss,
        apply: set_stop_loss,
    },
    FieldRule {
        field: "take_profit",
        applies: has_take_profit,
        apply: set_take_profit,
    },
    FieldRule {
        field: "trailing_distance",
        applies: has_trailing_distance,
        apply: set_trailing_distance,
    },
];

/// Build the broker parameter set for a validated request.
pub fn build_params(request: &OrderRequest, instrument_id: i64) -> BrokerOrderParams {
    let mut params = BrokerOrderParams::base(
        instrument_id,
        request.quantity,
        request.side,
        request.order_type,
        request.effective_validity(),
    );

    for rule in FIELD_RULES.iter().filter(|r| (r.applies)(request)) {
        (rule.apply)(request, &mut params);
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(order_type: &str, side: &str, quantity: f64) -> OrderIntent {
        OrderIntent {
            symbol: Some("BTCUSD".to_string()),
            order_type: Some(order_type.to_string()),
            side: Some(side.to_string()),
            quantity: Some(quantity),
            ..OrderIntent::default()
        }
    }

    fn error_of(intent: &OrderIntent) -> String {
        validate(intent).unwrap_err().to_string()
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn test_missing_all_required_fields() {
        assert_eq!(
            error_of(&OrderIntent::default()),
            "Missing required fields: symbol, order_type, side, quantity"
        );
    }

    #[test]
    fn test_missing_fields_listed_exactly() {
        let intent = OrderIntent {
            symbol: Some("BTCUSD".to_string()),
            order_type: Some("market".to_string()),
            ..OrderIntent::default()
        };
        assert_eq!(error_of(&intent), "Missing required fields: side, quantity");
    }

    #[test]
    fn test_blank_symbol_counts_as_missing() {
        let mut intent = intent("market", "buy", 1.0);
        intent.symbol = Some("   ".to_string());
        assert_eq!(error_of(&intent), "Missing required fields: symbol");
    }

    #[test]
    fn test_invalid_order_type() {
        assert_eq!(
            error_of(&intent("trailing", "buy", 1.0)),
            "Invalid order_type. Must be one of: market, limit, stop, stop_limit"
        );
    }

    #[test]
    fn test_invalid_side() {
        assert_eq!(
            error_of(&intent("market", "long", 1.0)),
            "Invalid side. Must be one of: buy, sell"
        );
    }

    #[test]
    fn test_non_positive_quantity() {
        for qty in [0.0, -1.0, f64::NAN] {
            assert_eq!(
                error_of(&intent("market", "buy", qty)),
                "Quantity must be greater than 0"
            );
        }
    }

    #[test]
    fn test_limit_without_price_is_rejected() {
        assert_eq!(
            error_of(&intent("limit", "buy", 1.0)),
            "Price is required for limit orders"
        );
    }

    #[test]
    fn test_stop_without_stop_price_is_rejected() {
        assert_eq!(
            error_of(&intent("stop", "sell", 1.0)),
            "Stop price is required for stop orders"
        );

        let mut stop_limit = intent("stop_limit", "sell", 1.0);
        stop_limit.price = Some(99.0);
        assert_eq!(
            error_of(&stop_limit),
            "Stop price is required for stop_limit orders"
        );
    }

    #[test]
    fn test_zero_price_is_rejected() {
        let mut limit = intent("limit", "buy", 1.0);
        limit.price = Some(0.0);
        assert_eq!(error_of(&limit), "Price must be greater than 0");
    }

    #[test]
    fn test_invalid_validity_and_level_type() {
        let mut bad_validity = intent("market", "buy", 1.0);
        bad_validity.validity = Some("DAY".to_string());
        assert_eq!(
            error_of(&bad_validity),
            "Invalid validity. Must be one of: GTC, IOC, FOK"
        );

        let mut bad_level = intent("market", "buy", 1.0);
        bad_level.stop_loss = Some(90.0);
        bad_level.stop_loss_type = Some("percent".to_string());
        assert_eq!(
            error_of(&bad_level),
            "Invalid stop_loss_type. Must be one of: absolute, offset, trailingOffset"
        );
    }

    #[test]
    fn test_user_id_defaults() {
        let request = validate(&intent("market", "buy", 1.0)).unwrap();
        assert_eq!(request.user_id, "default");
    }

    // =========================================================================
    // Instrument lookup
    // =========================================================================

    #[test]
    fn test_symbol_lookup_is_exact() {
        let catalog = vec![Instrument::new(206, "BTCUSD.TTF"), Instrument::new(1, "EURUSD")];

        assert_eq!(
            resolve_instrument("BTCUSD", &catalog).unwrap_err().to_string(),
            "Instrument BTCUSD not found"
        );
        assert!(resolve_instrument("eurusd", &catalog).is_err());
        assert_eq!(resolve_instrument("BTCUSD.TTF", &catalog).unwrap().id, 206);
    }

    // =========================================================================
    // Field rules
    // =========================================================================

    #[test]
    fn test_rule_order_is_stable() {
        let fields: Vec<&str> = FIELD_RULES.iter().map(|r| r.field).collect();
        assert_eq!(
            fields,
            vec!["price", "stop_price", "stop_loss", "take_profit", "trailing_distance"]
        );
    }

    #[test]
    fn test_market_order_gets_base_fields_only() {
        let mut raw = intent("market", "buy", 2.0);
        raw.price = Some(100.0);
        let request = validate(&raw).unwrap();
        let params = build_params(&request, 206);

        assert_eq!(params.instrument_id, 206);
        assert_eq!(params.validity, Validity::Ioc);
        assert_eq!(params.price, None);

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_limit_order_gets_price_and_gtc() {
        let mut raw = intent("limit", "sell", 1.0);
        raw.price = Some(101.5);
        let params = build_params(&validate(&raw).unwrap(), 1);

        assert_eq!(params.price, Some(101.5));
        assert_eq!(params.validity, Validity::Gtc);
        assert_eq!(params.stop_price, None);
    }

    #[test]
    fn test_stop_limit_gets_price_and_stop_price() {
        let mut raw = intent("stop_limit", "buy", 1.0);
        raw.price = Some(105.0);
        raw.stop_price = Some(104.0);
        let params = build_params(&validate(&raw).unwrap(), 1);

        assert_eq!(params.price, Some(105.0));
        assert_eq!(params.stop_price, Some(104.0));
    }

    #[test]
    fn test_stop_order_does_not_send_price() {
        let mut raw = intent("stop", "sell", 1.0);
        raw.price = Some(50.0);
        raw.stop_price = Some(95.0);
        let params = build_params(&validate(&raw).unwrap(), 1);

        assert_eq!(params.price, None);
        assert_eq!(params.stop_price, Some(95.0));
    }

    #[test]
    fn test_explicit_validity_wins() {
        let mut raw = intent("market", "buy", 1.0);
        raw.validity = Some("FOK".to_string());
        let params = build_params(&validate(&raw).unwrap(), 1);
        assert_eq!(params.validity, Validity::Fok);
    }

    #[test]
    fn test_protection_levels_and_trailing() {
        let mut raw = intent("market", "buy", 1.0);
        raw.stop_loss = Some(90.0);
        raw.take_profit = Some(5.0);
        raw.take_profit_type = Some("offset".to_string());
        raw.trailing_distance = Some(2.5);
        let params = build_params(&validate(&raw).unwrap(), 1);

        assert_eq!(params.stop_loss, Some(90.0));
        assert_eq!(params.stop_loss_type, Some(LevelType::Absolute));
        assert_eq!(params.take_profit, Some(5.0));
        assert_eq!(params.take_profit_type, Some(LevelType::Offset));
        assert_eq!(params.trailing_distance, Some(2.5));
    }

    #[test]
    fn test_absent_protection_fields_are_not_sent() {
        let params = build_params(&validate(&intent("market", "sell", 1.0)).unwrap(), 1);
        let json = serde_json::to_value(&params).unwrap();
        let obj = json.as_object().unwrap();

        for field in ["stop_loss", "stop_loss_type", "take_profit", "take_profit_type", "trailing_distance"] {
            assert!(!obj.contains_key(field), "{} should be omitted", field);
        }
    }
}
