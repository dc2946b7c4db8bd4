//! Energy-dependent rate functions of fermionic leads.
//!
//! The kernel engine only sees these through [`RateFunction`]; [`FermiRates`]
//! is the standard flat-band lead with a hard cutoff at `±D` around the
//! chemical potential.

use std::f64::consts::{ PI, TAU };
use num_complex::Complex64 as C64;
use rustc_hash::FxHashMap as HashMap;
use serde::Deserialize;
use crate::error::RateError;

/// Direction of a tunneling event between sectors `charge` and `charge + 1`,
/// as seen from the system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Branch {
    /// An electron enters the system from the lead (`b -> c`).
    In,
    /// An electron leaves the system into the lead (`c -> b`).
    Out,
}

impl Branch {
    /// Position along the last axis of rate-factor tables.
    pub fn index(self) -> usize {
        match self {
            Self::In => 0,
            Self::Out => 1,
        }
    }

    /// Sign `η` in front of the broadened part of first-order rates.
    pub fn eta(self) -> f64 {
        match self {
            Self::In => 1.0,
            Self::Out => -1.0,
        }
    }
}

/// Treatment of the principal-value part of first-order rate factors.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    /// Integrate the principal value numerically over the band.
    #[default]
    PrincipalValue,
    /// Drop the principal value, keeping only the golden-rule part.
    ImaginaryOnly,
}

/// Rate-function oracle consumed by the rate-factor generator.
///
/// `energy` is always the transition energy measured from the lead chemical
/// potential as `E[b] - E[c] + mu` (or its negative for [`Branch::Out`]).
pub trait RateFunction {
    /// Golden-rule rate factor, without the `|T|^2` weight. Non-negative.
    fn pauli_rate(&self, energy: f64, temperature: f64, bandwidth: f64)
        -> Result<f64, RateError>;

    /// Complex first-order rate factor.
    fn first_order_rate(
        &self,
        energy: f64,
        temperature: f64,
        bandwidth: f64,
        branch: Branch,
        method: IntegrationMethod,
        limit: usize,
    ) -> Result<C64, RateError>;
}

/// Flat-band fermionic lead.
///
/// With `n(x) = 1 / (1 + exp(-x / T))`:
/// ```text
/// pauli_rate(x)          = 2π n(x)                      for |x| < D
/// first_order_rate(x, η) = P∫_{-D}^{D} n(w) / (x - w) dw - i η π n(x)
/// ```
/// Both vanish (the broadened part) outside the band.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FermiRates;

/// Occupation `1 / (1 + exp(-x / T))`.
pub fn occupation(x: f64, temperature: f64) -> f64 {
    1.0 / (1.0 + (-x / temperature).exp())
}

fn check_inputs(energy: f64, temperature: f64, bandwidth: f64)
    -> Result<(), RateError>
{
    if !energy.is_finite() {
        return Err(RateError::InvalidInput(
            format!("non-finite energy {}", energy)));
    }
    if !(temperature > 0.0) || !temperature.is_finite() {
        return Err(RateError::InvalidInput(
            format!("temperature must be positive, got {}", temperature)));
    }
    if !(bandwidth > 0.0) {
        return Err(RateError::InvalidInput(
            format!("bandwidth must be positive, got {}", bandwidth)));
    }
    Ok(())
}

impl RateFunction for FermiRates {
    fn pauli_rate(&self, energy: f64, temperature: f64, bandwidth: f64)
        -> Result<f64, RateError>
    {
        check_inputs(energy, temperature, bandwidth)?;
        if energy.abs() < bandwidth {
            Ok(TAU * occupation(energy, temperature))
        } else {
            Ok(0.0)
        }
    }

    fn first_order_rate(
        &self,
        energy: f64,
        temperature: f64,
        bandwidth: f64,
        branch: Branch,
        method: IntegrationMethod,
        limit: usize,
    ) -> Result<C64, RateError>
    {
        check_inputs(energy, temperature, bandwidth)?;
        let im
            = if energy.abs() < bandwidth {
                -branch.eta() * PI * occupation(energy, temperature)
            } else {
                0.0
            };
        let re
            = match method {
                IntegrationMethod::PrincipalValue
                    => principal_value(energy, temperature, bandwidth, limit)?,
                IntegrationMethod::ImaginaryOnly => 0.0,
            };
        Ok(C64::new(re, im))
    }
}

/// `P∫_{-D}^{D} n(w) / (x - w) dw`.
///
/// The pole is removed by subtracting `n(x)`; the subtracted part integrates
/// to `n(x) ln|(x + D) / (x - D)|`.
fn principal_value(x: f64, temperature: f64, bandwidth: f64, limit: usize)
    -> Result<f64, RateError>
{
    if (x.abs() - bandwidth).abs() <= f64::EPSILON * bandwidth {
        return Err(RateError::InvalidInput(
            format!("principal value diverges at the band edge, x = {}", x)));
    }
    let nx = occupation(x, temperature);
    let dnx = nx * (1.0 - nx) / temperature;
    let integrand = |w: f64| {
        let dw = x - w;
        if dw.abs() <= 1e-10 * temperature {
            -dnx
        } else {
            (occupation(w, temperature) - nx) / dw
        }
    };
    let smooth = romberg(integrand, -bandwidth, bandwidth, limit, 1e-10)?;
    Ok(smooth + nx * ((x + bandwidth) / (x - bandwidth)).abs().ln())
}

// levels below this are never accepted as converged; coarse grids can miss a
// feature of width ~T entirely
const ROMBERG_MIN_LEVEL: usize = 5;

/// Largest accepted refinement limit (`2^30 + 1` integrand evaluations).
pub const MAX_REFINEMENT_LEVEL: usize = 30;

/// Check a refinement limit against [`MAX_REFINEMENT_LEVEL`].
pub fn check_refinement_limit(limit: usize) -> Result<(), RateError> {
    if limit > MAX_REFINEMENT_LEVEL {
        return Err(RateError::InvalidInput(
            format!(
                "refinement limit {} exceeds the maximum of {}",
                limit, MAX_REFINEMENT_LEVEL,
            )));
    }
    Ok(())
}

/// Romberg integration of `integrand` over `[a, b]`, refining up to `n_max`
/// levels (`2^n_max + 1` points) until successive diagonal extrapolations
/// agree to within `epsilon * (1 + |I|)`. `n_max` may not exceed
/// [`MAX_REFINEMENT_LEVEL`].
pub(crate) fn romberg<F>(
    integrand: F,
    a: f64,
    b: f64,
    n_max: usize,
    epsilon: f64,
) -> Result<f64, RateError>
where F: Fn(f64) -> f64
{
    check_refinement_limit(n_max)?;
    let mut terms: HashMap<(usize, usize), f64> = HashMap::default();
    let mut h: f64 = b - a;
    let mut trap: f64 = h * (integrand(a) + integrand(b)) / 2.0;
    let mut four_m: f64;
    let mut extrap: f64;
    let mut delta: f64 = f64::INFINITY;
    terms.insert((0, 0), trap);
    for n in 1..=n_max {
        // new midpoints of the previous grid
        h /= 2.0;
        let midpoints: f64
            = (0..1_usize << (n - 1))
            .map(|k| integrand(a + (2 * k + 1) as f64 * h))
            .sum();
        trap = trap / 2.0 + h * midpoints;
        terms.insert((n, 0), trap);
        for m in 1..=n {
            four_m = 4.0_f64.powi(m as i32);
            extrap
                = (four_m * terms[&(n, m - 1)] - terms[&(n - 1, m - 1)])
                / (four_m - 1.0);
            terms.insert((n, m), extrap);
        }
        delta = terms[&(n, n)] - terms[&(n - 1, n - 1)];
        if n >= ROMBERG_MIN_LEVEL
            && delta.abs() < epsilon * (1.0 + terms[&(n, n)].abs())
        {
            return Ok(terms[&(n, n)]);
        }
    }
    Err(RateError::NonConvergent { levels: n_max, delta })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn romberg_polynomial_and_exponential() {
        let i = romberg(|x| 3.0 * x * x, 0.0, 2.0, 20, 1e-12).unwrap();
        assert!((i - 8.0).abs() < 1e-10);
        let i = romberg(f64::exp, -1.0, 1.0, 20, 1e-12).unwrap();
        assert!((i - (1.0_f64.exp() - (-1.0_f64).exp())).abs() < 1e-10);
    }

    #[test]
    fn romberg_reports_nonconvergence() {
        let res = romberg(|x| (50.0 * x).sin().abs(), 0.0, 10.0, 6, 1e-14);
        assert!(matches!(res, Err(RateError::NonConvergent { levels: 6, .. })));
    }

    #[test]
    fn refinement_limit_is_bounded() {
        assert!(matches!(
            romberg(f64::exp, 0.0, 1.0, 10000, 1e-12),
            Err(RateError::InvalidInput(_)),
        ));
        assert!(matches!(
            FermiRates.first_order_rate(
                0.5, 1.0, 10.0, Branch::In, IntegrationMethod::PrincipalValue, 65,
            ),
            Err(RateError::InvalidInput(_)),
        ));
        assert!(check_refinement_limit(MAX_REFINEMENT_LEVEL).is_ok());
    }

    #[test]
    fn low_temperature_converges_within_default_limit() {
        let limit = crate::config::FuncParams::default().dqawc_limit;
        let (t, d) = (0.002, 60.0);
        for x in [-0.61, -0.05, 0.3, 2.0] {
            let phi = FermiRates.first_order_rate(
                x, t, d, Branch::In, IntegrationMethod::PrincipalValue, limit,
            );
            assert!(phi.is_ok(), "x = {}: {:?}", x, phi);
        }
    }

    #[test]
    fn pauli_rate_detailed_balance() {
        let f = FermiRates;
        let (t, d) = (0.7, 50.0);
        for x in [-3.0, -0.2, 0.0, 1.1, 4.0] {
            let rin = f.pauli_rate(x, t, d).unwrap();
            let rout = f.pauli_rate(-x, t, d).unwrap();
            assert!((rin + rout - TAU).abs() < 1e-12);
            assert!((rin / rout - (x / t).exp()).abs() < 1e-9 * (x / t).exp());
        }
        assert_eq!(f.pauli_rate(60.0, t, d).unwrap(), 0.0);
        assert!(f.pauli_rate(0.0, 0.0, d).is_err());
        assert!(f.pauli_rate(f64::NAN, t, d).is_err());
    }

    #[test]
    fn first_order_imaginary_part_matches_pauli() {
        let f = FermiRates;
        let (t, d) = (0.5, 20.0);
        for x in [-1.0, 0.3, 2.5] {
            let p = f.pauli_rate(x, t, d).unwrap();
            let phi = f.first_order_rate(
                x, t, d, Branch::In, IntegrationMethod::ImaginaryOnly, 10,
            ).unwrap();
            assert_eq!(phi.re, 0.0);
            assert!((-2.0 * phi.im - p).abs() < 1e-12);
            let phi = f.first_order_rate(
                -x, t, d, Branch::Out, IntegrationMethod::ImaginaryOnly, 10,
            ).unwrap();
            assert!((2.0 * phi.im - f.pauli_rate(-x, t, d).unwrap()).abs()
                < 1e-12);
        }
    }

    #[test]
    fn principal_value_at_zero_temperature_limit() {
        // for T << |x|, D the occupation is a step and
        // P∫_0^D dw / (x - w) = ln|x / (x - D)|
        let (t, d) = (1e-3, 10.0);
        for x in [-2.0, 1.5, 4.0] {
            let pv = principal_value(x, t, d, 24).unwrap();
            let exact = (x / (x - d)).abs().ln();
            assert!((pv - exact).abs() < 1e-3, "x = {}: {} vs {}", x, pv, exact);
        }
    }

    #[test]
    fn principal_value_band_edge_is_invalid() {
        assert!(matches!(
            principal_value(10.0, 1.0, 10.0, 20),
            Err(RateError::InvalidInput(_)),
        ));
    }
}
