//! Stationary solutions of assembled kernels and the single-point pipeline.

use ndarray as nd;
use ndarray_linalg::{ LeastSquaresSvd, Norm, Solve };
use num_complex::Complex64 as C64;
use tracing::debug;
use crate::{
    current::Currents,
    error::{ TransportError, TransportResult },
    indexing::StateIndexing,
    kernel::{ Approach, Kernel },
    specfunc::RateFunction,
    system::{ Leads, ManyBody },
};

/// Solve `kern . phi0 = bvec`.
///
/// Square kernels go through an LU factorization; kernels with an appended
/// normalization row are solved in the least-squares sense.
pub fn solve_kern(kernel: &Kernel) -> TransportResult<nd::Array1<f64>> {
    let phi0: nd::Array1<f64>
        = if kernel.is_square() {
            kernel.kern.solve(&kernel.bvec)
                .map_err(|e| TransportError::Solver(e.to_string()))?
        } else {
            kernel.kern.least_squares(&kernel.bvec)
                .map_err(|e| TransportError::Solver(e.to_string()))?
                .solution
        };
    if phi0.iter().any(|x| !x.is_finite()) {
        return Err(TransportError::Solver("non-finite stationary state".into()));
    }
    let residual: f64 = (kernel.kern.dot(&phi0) - &kernel.bvec).norm_l2();
    debug!(residual, nvars = phi0.len(), "solved stationary state");
    Ok(phi0)
}

/// Stationary state of one parameter point with its currents.
#[derive(Clone, Debug, PartialEq)]
pub struct Stationary {
    /// Solution vector: populations (Pauli) or the packed real density matrix
    /// (1vN).
    pub phi0: nd::Array1<f64>,
    /// First-order coherences `[lead, dm1]`; 1vN only.
    pub phi1: Option<nd::Array2<C64>>,
    pub current: nd::Array1<f64>,
    pub energy_current: nd::Array1<f64>,
}

impl Stationary {
    /// Occupation probability of every addressed eigenstate, indexed by
    /// eigenstate; states outside the indexer are zero.
    pub fn populations(&self, si: &StateIndexing) -> nd::Array1<f64> {
        let mut pops: nd::Array1<f64> = nd::Array1::zeros(si.nmany());
        for charge in 0..si.ncharge() {
            for &b in si.sector(charge) {
                if let Some(bb) = si.dm0_index(b, b, charge) {
                    pops[b] = self.phi0[bb];
                }
            }
        }
        pops
    }
}

impl Approach {
    /// Run rate tables, kernel, stationary solve, and currents for one
    /// parameter point.
    pub fn solve_point<R>(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        leads: &Leads,
        oracle: &R,
    ) -> TransportResult<Stationary>
    where R: RateFunction + ?Sized
    {
        let tables = self.generate_factors(si, mb, leads, oracle)?;
        let kernel = self.generate_kern(si, mb, &tables)?;
        let phi0 = solve_kern(&kernel)?;
        let Currents { current, energy_current, phi1 }
            = self.generate_current(si, mb, &tables, &phi0)?;
        debug!(
            approach = self.name(),
            net_current = current.sum(),
            "evaluated stationary currents",
        );
        Ok(Stationary { phi0, phi1, current, energy_current })
    }
}
