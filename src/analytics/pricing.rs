//! Black-Scholes-Merton model with a continuous dividend yield
//!
//! Conventions follow exchange option-chain screens:
//! - vega is per one volatility point (1%)
//! - theta is per day of the configured year (365 calendar days by default)
//! - gamma and vega do not depend on the option side

use crate::config::PricingConfig;
use crate::types::OptionSide;
use statrs::function::erf::erfc;
use std::f64::consts::{PI, SQRT_2};

/// Upper bound of the implied-volatility search bracket
const MAX_VOLATILITY: f64 = 10.0;

/// Vega below this is treated as flat and the solver bisects instead
const MIN_VEGA: f64 = 1e-12;

/// Implied-volatility solver settings
#[derive(Debug, Clone, Copy)]
pub struct SolverSettings {
    /// Starting volatility for the Newton iteration
    pub initial_volatility: f64,
    /// Absolute price error accepted as converged
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self::from(&PricingConfig::default())
    }
}

impl From<&PricingConfig> for SolverSettings {
    fn from(config: &PricingConfig) -> Self {
        Self {
            initial_volatility: config.initial_volatility,
            tolerance: config.solver_tolerance,
            max_iterations: config.max_iterations,
        }
    }
}

/// Black-Scholes-Merton calculator
#[derive(Debug, Clone, Copy)]
pub struct BlackScholes {
    /// Annualized risk-free rate
    pub rate: f64,
    /// Continuous dividend yield
    pub dividend: f64,
    /// Days in the year theta is spread over
    pub days_per_year: f64,
}

impl BlackScholes {
    pub fn new(rate: f64, dividend: f64) -> Self {
        Self {
            rate,
            dividend,
            days_per_year: 365.0,
        }
    }

    pub fn with_days_per_year(mut self, days_per_year: f64) -> Self {
        self.days_per_year = days_per_year;
        self
    }

    fn d1_d2(&self, spot: f64, strike: f64, time: f64, vol: f64) -> (f64, f64) {
        let sqrt_t = time.sqrt();
        let d1 = ((spot / strike).ln() + (self.rate - self.dividend + 0.5 * vol * vol) * time)
            / (vol * sqrt_t);
        (d1, d1 - vol * sqrt_t)
    }

    /// Theoretical option price
    pub fn price(&self, side: OptionSide, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        if time <= 0.0 || vol <= 0.0 {
            return self.lower_bound(side, spot, strike, time.max(0.0));
        }

        let carry = (-self.dividend * time).exp();
        let discount = (-self.rate * time).exp();
        let (d1, d2) = self.d1_d2(spot, strike, time, vol);
        match side {
            OptionSide::Call => spot * carry * norm_cdf(d1) - strike * discount * norm_cdf(d2),
            OptionSide::Put => strike * discount * norm_cdf(-d2) - spot * carry * norm_cdf(-d1),
        }
    }

    /// Price at zero volatility (discounted intrinsic value)
    fn lower_bound(&self, side: OptionSide, spot: f64, strike: f64, time: f64) -> f64 {
        let forward_spot = spot * (-self.dividend * time).exp();
        let pv_strike = strike * (-self.rate * time).exp();
        match side {
            OptionSide::Call => (forward_spot - pv_strike).max(0.0),
            OptionSide::Put => (pv_strike - forward_spot).max(0.0),
        }
    }

    /// Price at infinite volatility
    fn upper_bound(&self, side: OptionSide, spot: f64, strike: f64, time: f64) -> f64 {
        match side {
            OptionSide::Call => spot * (-self.dividend * time).exp(),
            OptionSide::Put => strike * (-self.rate * time).exp(),
        }
    }

    pub fn delta(&self, side: OptionSide, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let (d1, _) = self.d1_d2(spot, strike, time, vol);
        let carry = (-self.dividend * time).exp();
        match side {
            OptionSide::Call => carry * norm_cdf(d1),
            OptionSide::Put => carry * (norm_cdf(d1) - 1.0),
        }
    }

    pub fn gamma(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let (d1, _) = self.d1_d2(spot, strike, time, vol);
        (-self.dividend * time).exp() * norm_pdf(d1) / (spot * vol * time.sqrt())
    }

    /// Sensitivity per 1% change in volatility
    pub fn vega(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        self.raw_vega(spot, strike, time, vol) / 100.0
    }

    /// dPrice/dVol, unscaled
    fn raw_vega(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let (d1, _) = self.d1_d2(spot, strike, time, vol);
        spot * (-self.dividend * time).exp() * norm_pdf(d1) * time.sqrt()
    }

    /// Time decay per day of a `days_per_year` year
    pub fn theta(&self, side: OptionSide, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let (d1, d2) = self.d1_d2(spot, strike, time, vol);
        let carry = (-self.dividend * time).exp();
        let discount = (-self.rate * time).exp();
        let decay = -spot * carry * norm_pdf(d1) * vol / (2.0 * time.sqrt());

        let annual = match side {
            OptionSide::Call => {
                decay - self.rate * strike * discount * norm_cdf(d2)
                    + self.dividend * spot * carry * norm_cdf(d1)
            }
            OptionSide::Put => {
                decay + self.rate * strike * discount * norm_cdf(-d2)
                    - self.dividend * spot * carry * norm_cdf(-d1)
            }
        };
        annual / self.days_per_year
    }

    /// Volatility reproducing `market_price`, or NaN when no such
    /// volatility exists (price outside no-arbitrage bounds, expired
    /// contract, non-positive inputs) or the solver fails to converge.
    ///
    /// Newton-Raphson from the seed volatility, falling back to bisection
    /// whenever a step leaves the bracket that is known to contain the root.
    pub fn implied_vol(
        &self,
        side: OptionSide,
        market_price: f64,
        spot: f64,
        strike: f64,
        time: f64,
        settings: &SolverSettings,
    ) -> f64 {
        if !(market_price.is_finite() && spot > 0.0 && strike > 0.0 && time > 0.0) {
            return f64::NAN;
        }
        if market_price <= self.lower_bound(side, spot, strike, time)
            || market_price >= self.upper_bound(side, spot, strike, time)
        {
            return f64::NAN;
        }

        let mut low = 0.0;
        let mut high = MAX_VOLATILITY;
        let mut vol = settings.initial_volatility.clamp(1e-4, MAX_VOLATILITY);

        for _ in 0..settings.max_iterations {
            let diff = self.price(side, spot, strike, time, vol) - market_price;
            if diff.abs() < settings.tolerance {
                return vol;
            }

            // Price is increasing in volatility
            if diff > 0.0 {
                high = vol;
            } else {
                low = vol;
            }

            let vega = self.raw_vega(spot, strike, time, vol);
            let newton = vol - diff / vega;
            vol = if vega > MIN_VEGA && newton > low && newton < high {
                newton
            } else {
                0.5 * (low + high)
            };
        }

        f64::NAN
    }
}

/// Standard normal CDF
#[inline]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal PDF
#[inline]
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}
