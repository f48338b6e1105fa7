use crate::errors::{EngineError, EngineResult};
use crate::models::{ModelInputs, OptionParameters, OptionType, PricingModel, PricingResult};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Black-Scholes European option pricing, no dividend yield.
///
/// d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// d2 = d1 - sigma * sqrt(T)
///
/// Call = S*Phi(d1) - K*e^(-rT)*Phi(d2)
/// Put  = K*e^(-rT)*Phi(-d2) - S*Phi(-d1)
///
/// Theta and rho for the put use Phi(-d2) in place of Phi(d2) in the call
/// expressions, without a sign flip. Gamma and vega are side-independent.
pub struct BlackScholes {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl BlackScholes {
    pub fn new() -> Self {
        Self {
            normal: Normal::standard(),
        }
    }

    /// Closed form on already-validated inputs. Never fails.
    #[inline]
    pub fn evaluate(&self, m: &ModelInputs) -> Greeks {
        let d1 = (m.ln_s_k + (m.rate + 0.5 * m.sigma * m.sigma) * m.ttm) / m.sigma_sqrt_t;
        let d2 = d1 - m.sigma_sqrt_t;

        let pdf_d1 = self.normal.pdf(d1);
        let cdf_d1 = self.normal.cdf(d1);
        let k_disc = m.strike * m.discount;

        // Time decay from the diffusion term, shared by both sides
        let decay = -m.spot * pdf_d1 * m.sigma / (2.0 * m.sqrt_t);

        let (price, delta, carry_prob) = match m.side {
            OptionType::Call => {
                let cdf_d2 = self.normal.cdf(d2);
                (m.spot * cdf_d1 - k_disc * cdf_d2, cdf_d1, cdf_d2)
            }
            OptionType::Put => {
                let cdf_neg_d2 = self.normal.cdf(-d2);
                let cdf_neg_d1 = self.normal.cdf(-d1);
                (k_disc * cdf_neg_d2 - m.spot * cdf_neg_d1, cdf_d1 - 1.0, cdf_neg_d2)
            }
        };

        Greeks {
            price,
            delta,
            gamma: pdf_d1 / (m.spot * m.sigma_sqrt_t),
            theta: decay - m.rate * k_disc * carry_prob,
            vega: m.spot * m.sqrt_t * pdf_d1,
            rho: k_disc * m.ttm * carry_prob,
        }
    }
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw closed-form outputs before P&L attribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Greeks {
    pub price: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

impl Greeks {
    /// Reject results the closed form could not represent in f64.
    fn ensure_finite(&self) -> EngineResult<()> {
        let fields = [
            ("price", self.price),
            ("delta", self.delta),
            ("gamma", self.gamma),
            ("theta", self.theta),
            ("vega", self.vega),
            ("rho", self.rho),
        ];
        match fields.iter().find(|(_, v)| !v.is_finite()) {
            Some((name, v)) => Err(EngineError::invalid_argument(format!(
                "{name} is not finite ({v}) for these inputs"
            ))),
            None => Ok(()),
        }
    }
}

impl PricingModel for BlackScholes {
    #[inline]
    fn name(&self) -> &'static str {
        "Black-Scholes"
    }

    fn price(&self, params: &OptionParameters) -> EngineResult<PricingResult> {
        let inputs = ModelInputs::from_params(params)?;
        let g = self.evaluate(&inputs);
        g.ensure_finite()?;

        // P&L only for the side actually priced
        let (call_pnl, put_pnl) = match inputs.side {
            OptionType::Call => (params.call_purchase_price.map(|cost| g.price - cost), None),
            OptionType::Put => (None, params.put_purchase_price.map(|cost| g.price - cost)),
        };

        Ok(PricingResult {
            price: g.price,
            delta: g.delta,
            gamma: g.gamma,
            theta: g.theta,
            vega: g.vega,
            rho: g.rho,
            call_pnl,
            put_pnl,
        })
    }
}
