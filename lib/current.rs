//! Lead-resolved charge and energy currents of a stationary state.
//!
//! All currents are counted positive when they flow out of the lead and into
//! the system, so in a stationary state the charge currents of all leads sum
//! to zero.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    error::{ TransportError, TransportResult },
    indexing::StateIndexing,
    kernel::{ Approach, KernelBuilder },
    rates::RateTables,
    system::ManyBody,
};

/// Per-lead currents evaluated on a solved stationary vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Currents {
    /// Charge current from each lead into the system.
    pub current: nd::Array1<f64>,
    /// Energy current from each lead into the system.
    pub energy_current: nd::Array1<f64>,
    /// First-order coherences `[lead, dm1]`; 1vN only.
    pub phi1: Option<nd::Array2<C64>>,
}

impl Currents {
    /// Sum of the charge currents over all leads. Vanishes in a stationary
    /// state.
    pub fn net_current(&self) -> f64 { self.current.sum() }

    /// Sum of the energy currents over all leads.
    pub fn net_energy_current(&self) -> f64 { self.energy_current.sum() }

    /// Heat current from each lead, `J_E - mu * I`.
    pub fn heat_current(&self, mulst: &[f64]) -> TransportResult<nd::Array1<f64>> {
        if mulst.len() != self.current.len() {
            return Err(TransportError::Dimension {
                what: "chemical potentials",
                expected: self.current.len(),
                got: mulst.len(),
            });
        }
        Ok(
            self.energy_current.iter()
                .zip(self.current.iter())
                .zip(mulst)
                .map(|((je, i), mu)| je - mu * i)
                .collect()
        )
    }
}

impl Approach {
    /// Evaluate currents on `phi0`, the solution of the kernel built from
    /// `tables`.
    pub fn generate_current(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        tables: &RateTables,
        phi0: &nd::Array1<f64>,
    ) -> TransportResult<Currents>
    {
        match (self, tables) {
            (Self::Pauli(p), RateTables::Pauli(pf))
                => p.generate_current(si, mb, pf, phi0),
            (Self::OneVN(v), RateTables::OneVN(f))
                => v.generate_current(si, mb, f, phi0),
            _ => Err(TransportError::TablesMismatch { approach: self.name() }),
        }
    }
}
