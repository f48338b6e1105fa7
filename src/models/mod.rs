pub mod black_scholes;
pub mod heatmap;

use crate::errors::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// All pricing models implement this trait.
/// price() must be a pure function: deterministic output from inputs only.
/// Send + Sync required for use across tokio tasks and rayon workers.
pub trait PricingModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fair value, Greeks and per-side P&L for one parameter set.
    /// Fails with InvalidArgument before any arithmetic if the inputs are out of domain.
    fn price(&self, params: &OptionParameters) -> EngineResult<PricingResult>;
}

// ── Option side ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionType {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        if s.eq_ignore_ascii_case("call") {
            Ok(Self::Call)
        } else if s.eq_ignore_ascii_case("put") {
            Ok(Self::Put)
        } else {
            Err(EngineError::invalid_argument(format!(
                "option_type must be \"call\" or \"put\", got {s:?}"
            )))
        }
    }
}

// ── Request / result types ──

/// One evaluation's worth of market and contract inputs, as received over the wire.
/// The side is kept as text so an unrecognised value reaches the engine and is
/// reported as InvalidArgument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionParameters {
    pub spot_price: f64,
    pub strike_price: f64,
    /// Years until expiry
    pub time_to_maturity: f64,
    /// Continuously compounded annual rate (may be negative)
    pub risk_free_rate: f64,
    /// Annualised volatility
    pub volatility: f64,
    pub option_type: String,
    #[serde(default)]
    pub call_purchase_price: Option<f64>,
    #[serde(default)]
    pub put_purchase_price: Option<f64>,
}

impl OptionParameters {
    pub fn new(
        spot_price: f64,
        strike_price: f64,
        time_to_maturity: f64,
        risk_free_rate: f64,
        volatility: f64,
        option_type: impl Into<String>,
    ) -> Self {
        Self {
            spot_price,
            strike_price,
            time_to_maturity,
            risk_free_rate,
            volatility,
            option_type: option_type.into(),
            call_purchase_price: None,
            put_purchase_price: None,
        }
    }

    pub fn with_call_purchase_price(mut self, price: f64) -> Self {
        self.call_purchase_price = Some(price);
        self
    }

    pub fn with_put_purchase_price(mut self, price: f64) -> Self {
        self.put_purchase_price = Some(price);
        self
    }

    /// Copy of these parameters re-pointed at another spot, vol and side.
    /// Only the purchase price of the new side is carried over.
    pub fn at_point(&self, spot: f64, vol: f64, side: OptionType) -> Self {
        Self {
            spot_price: spot,
            volatility: vol,
            option_type: side.as_str().to_string(),
            call_purchase_price: match side {
                OptionType::Call => self.call_purchase_price,
                OptionType::Put => None,
            },
            put_purchase_price: match side {
                OptionType::Put => self.put_purchase_price,
                OptionType::Call => None,
            },
            ..self.clone()
        }
    }

    /// Checks every precondition of the closed form; the returned side is the parsed option_type.
    pub fn validate(&self) -> EngineResult<OptionType> {
        let side: OptionType = self.option_type.parse()?;

        ensure_positive("spot_price", self.spot_price)?;
        ensure_positive("strike_price", self.strike_price)?;
        ensure_positive("time_to_maturity", self.time_to_maturity)?;
        ensure_positive("volatility", self.volatility)?;
        ensure_finite("risk_free_rate", self.risk_free_rate)?;
        if let Some(p) = self.call_purchase_price {
            ensure_finite("call_purchase_price", p)?;
        }
        if let Some(p) = self.put_purchase_price {
            ensure_finite("put_purchase_price", p)?;
        }

        Ok(side)
    }
}

fn ensure_positive(field: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid_argument(format!(
            "{field} must be a finite number > 0, got {value}"
        )))
    }
}

fn ensure_finite(field: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::invalid_argument(format!(
            "{field} must be finite, got {value}"
        )))
    }
}

/// Fair value and sensitivities for one evaluation.
/// A P&L field is None when no purchase price was supplied for that side,
/// which is distinct from a P&L of zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    pub price: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
    pub call_pnl: Option<f64>,
    pub put_pnl: Option<f64>,
}

// ── Precomputed model inputs (stack, no alloc) ──

#[derive(Debug, Clone, Copy)]
pub struct ModelInputs {
    pub side: OptionType,
    pub spot: f64,
    pub strike: f64,
    pub ttm: f64,
    pub rate: f64,
    pub sigma: f64,
    // Precomputed
    pub ln_s_k: f64,
    pub sqrt_t: f64,
    pub sigma_sqrt_t: f64,
    /// e^(-rT)
    pub discount: f64,
}

impl ModelInputs {
    /// Validate and precompute. Nothing downstream divides by zero or takes ln of <= 0.
    pub fn from_params(params: &OptionParameters) -> EngineResult<Self> {
        let side = params.validate()?;
        let sqrt_t = params.time_to_maturity.sqrt();

        // Individually finite inputs can still overflow once combined.
        let carry = (params.risk_free_rate + 0.5 * params.volatility * params.volatility)
            * params.time_to_maturity;
        ensure_finite("(r + sigma^2/2) * T", carry)?;
        let discount = (-params.risk_free_rate * params.time_to_maturity).exp();
        if !(discount.is_finite() && discount > 0.0) {
            return Err(EngineError::invalid_argument(format!(
                "discount factor e^(-rT) out of range for r={} T={}",
                params.risk_free_rate, params.time_to_maturity
            )));
        }

        Ok(Self {
            side,
            spot: params.spot_price,
            strike: params.strike_price,
            ttm: params.time_to_maturity,
            rate: params.risk_free_rate,
            sigma: params.volatility,
            ln_s_k: (params.spot_price / params.strike_price).ln(),
            sqrt_t,
            sigma_sqrt_t: params.volatility * sqrt_t,
            discount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atm(side: &str) -> OptionParameters {
        OptionParameters::new(100.0, 100.0, 1.0, 0.05, 0.2, side)
    }

    #[test]
    fn test_side_parsing_is_case_insensitive() {
        assert_eq!("call".parse::<OptionType>().unwrap(), OptionType::Call);
        assert_eq!("CALL".parse::<OptionType>().unwrap(), OptionType::Call);
        assert_eq!("Put".parse::<OptionType>().unwrap(), OptionType::Put);
    }

    #[test]
    fn test_unknown_side_is_invalid_argument() {
        let err = "invalid".parse::<OptionType>().unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert!(" call".parse::<OptionType>().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_inputs() {
        let mut p = atm("call");
        p.volatility = 0.0;
        assert!(matches!(p.validate(), Err(EngineError::InvalidArgument(_))));

        let mut p = atm("call");
        p.time_to_maturity = 0.0;
        assert!(p.validate().is_err());

        let mut p = atm("put");
        p.spot_price = -1.0;
        assert!(p.validate().is_err());

        let mut p = atm("put");
        p.strike_price = f64::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_negative_rate() {
        let mut p = atm("put");
        p.risk_free_rate = -0.02;
        assert_eq!(p.validate().unwrap(), OptionType::Put);
    }

    #[test]
    fn test_at_point_carries_only_matching_purchase_price() {
        let base = atm("put")
            .with_call_purchase_price(10.0)
            .with_put_purchase_price(5.0);

        let call = base.at_point(80.0, 0.3, OptionType::Call);
        assert_eq!(call.spot_price, 80.0);
        assert_eq!(call.volatility, 0.3);
        assert_eq!(call.option_type, "call");
        assert_eq!(call.strike_price, 100.0);
        assert_eq!(call.call_purchase_price, Some(10.0));
        assert_eq!(call.put_purchase_price, None);

        let put = base.at_point(120.0, 0.1, OptionType::Put);
        assert_eq!(put.call_purchase_price, None);
        assert_eq!(put.put_purchase_price, Some(5.0));
    }

    #[test]
    fn test_params_deserialize_without_purchase_prices() {
        let p: OptionParameters = serde_json::from_str(
            r#"{"spot_price":100,"strike_price":95,"time_to_maturity":0.5,
                "risk_free_rate":0.01,"volatility":0.25,"option_type":"Call"}"#,
        )
        .unwrap();
        assert_eq!(p.call_purchase_price, None);
        assert_eq!(p.validate().unwrap(), OptionType::Call);
    }

    #[test]
    fn test_model_inputs_precompute() {
        let inputs = ModelInputs::from_params(&OptionParameters::new(110.0, 100.0, 4.0, 0.05, 0.2, "call")).unwrap();
        assert_eq!(inputs.sqrt_t, 2.0);
        assert!((inputs.sigma_sqrt_t - 0.4).abs() < 1e-15);
        assert!((inputs.ln_s_k - (1.1f64).ln()).abs() < 1e-15);
        assert!((inputs.discount - (-0.2f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn test_model_inputs_reject_discount_overflow() {
        let err = ModelInputs::from_params(&OptionParameters::new(100.0, 100.0, 1.0, -800.0, 0.2, "call")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        // e^(-rT) underflows to 0 for a huge positive rate
        assert!(ModelInputs::from_params(&OptionParameters::new(100.0, 100.0, 1.0, 800.0, 0.2, "put")).is_err());
        assert!(ModelInputs::from_params(&OptionParameters::new(100.0, 100.0, 1.0, 0.05, 1e200, "put")).is_err());
    }
}
