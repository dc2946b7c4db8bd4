//! Kernel storage, normalization policy, and the interface shared by the
//! Pauli and first-order von Neumann approaches.
//!
//! Both approaches address the density matrix through one
//! [`StateIndexing`] and differ only in their rate tables and in the shape of
//! the kernel they assemble.

use ndarray as nd;
use tracing::debug;
use crate::{
    config::{ FuncParams, KernType },
    current::Currents,
    error::{ TransportError, TransportResult },
    indexing::StateIndexing,
    neumann1::OneVN,
    pauli::Pauli,
    rates::RateTables,
    specfunc::RateFunction,
    system::{ Leads, ManyBody },
};

/// Assembled master-equation kernel: the stationary state solves
/// `kern . phi0 = bvec`.
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    pub kern: nd::Array2<f64>,
    pub bvec: nd::Array1<f64>,
    /// Row holding the normalization condition.
    pub norm_row: usize,
}

impl Kernel {
    /// `true` if the normalization condition replaced a row of the square
    /// system rather than being appended.
    pub fn is_square(&self) -> bool { self.kern.is_square() }
}

/// Where the normalization condition goes for a system of `nvars` unknowns.
///
/// Returns `(rows, norm_row)`.
pub(crate) fn norm_layout(nvars: usize, symq: bool, norm_row: usize)
    -> TransportResult<(usize, usize)>
{
    if symq {
        if norm_row >= nvars {
            return Err(TransportError::NormRow { row: norm_row, bound: nvars });
        }
        Ok((nvars, norm_row))
    } else {
        Ok((nvars + 1, nvars))
    }
}

/// Owned accumulation buffer for kernel contributions.
///
/// Contributions addressed to the normalization row are discarded; the row
/// is written once by [`Self::finish`].
#[derive(Clone, Debug)]
pub(crate) struct KernelAccumulator {
    kern: nd::Array2<f64>,
    norm_row: usize,
}

impl KernelAccumulator {
    pub(crate) fn new(rows: usize, cols: usize, norm_row: usize) -> Self {
        Self { kern: nd::Array2::zeros((rows, cols)), norm_row }
    }

    pub(crate) fn add(&mut self, row: usize, col: usize, value: f64) {
        if row != self.norm_row { self.kern[[row, col]] += value; }
    }

    /// Write the normalization row (ones over every population) and the
    /// matching right-hand side.
    pub(crate) fn finish(mut self, npauli: usize) -> Kernel {
        let rows = self.kern.nrows();
        let mut norm = self.kern.row_mut(self.norm_row);
        norm.fill(0.0);
        norm.iter_mut().take(npauli).for_each(|k| { *k = 1.0; });
        let mut bvec: nd::Array1<f64> = nd::Array1::zeros(rows);
        bvec[self.norm_row] = 1.0;
        Kernel { kern: self.kern, bvec, norm_row: self.norm_row }
    }
}

/// Common interface of the master-equation approaches.
pub trait KernelBuilder {
    /// Rate tables consumed by the kernel and current functionals.
    type Factors;

    /// Name used in log records.
    const NAME: &'static str;

    /// Number of real unknowns (kernel columns).
    fn nvars(si: &StateIndexing) -> usize;

    /// Evaluate the rate tables for one parameter point.
    fn generate_factors<R>(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        leads: &Leads,
        oracle: &R,
    ) -> TransportResult<Self::Factors>
    where R: RateFunction + ?Sized;

    /// Assemble the kernel.
    fn generate_kern(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        factors: &Self::Factors,
    ) -> TransportResult<Kernel>;

    /// Evaluate currents on a solved stationary vector.
    fn generate_current(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        factors: &Self::Factors,
        phi0: &nd::Array1<f64>,
    ) -> TransportResult<Currents>;
}

pub(crate) fn log_kernel(name: &'static str, kernel: &Kernel, symq: bool) {
    debug!(
        approach = name,
        rows = kernel.kern.nrows(),
        cols = kernel.kern.ncols(),
        symq,
        norm_row = kernel.norm_row,
        "assembled kernel",
    );
}

/// Selected master-equation approach with its kernel parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Approach {
    Pauli(Pauli),
    OneVN(OneVN),
}

impl Approach {
    /// Select the approach named in `funcp`.
    pub fn from_params(funcp: &FuncParams) -> Self {
        match funcp.kerntype {
            KernType::Pauli => Self::Pauli(Pauli::new(funcp.symq, funcp.norm_row)),
            KernType::OneVN => Self::OneVN(OneVN::from_params(funcp)),
        }
    }

    /// Number of real unknowns of the stationary vector.
    pub fn nvars(&self, si: &StateIndexing) -> usize {
        match self {
            Self::Pauli(_) => Pauli::nvars(si),
            Self::OneVN(_) => OneVN::nvars(si),
        }
    }

    /// Name used in log records.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pauli(_) => Pauli::NAME,
            Self::OneVN(_) => OneVN::NAME,
        }
    }

    /// Evaluate the rate tables this approach consumes.
    pub fn generate_factors<R>(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        leads: &Leads,
        oracle: &R,
    ) -> TransportResult<RateTables>
    where R: RateFunction + ?Sized
    {
        match self {
            Self::Pauli(p)
                => p.generate_factors(si, mb, leads, oracle).map(RateTables::Pauli),
            Self::OneVN(v)
                => v.generate_factors(si, mb, leads, oracle).map(RateTables::OneVN),
        }
    }

    /// Assemble the kernel from tables built by [`Self::generate_factors`].
    pub fn generate_kern(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        tables: &RateTables,
    ) -> TransportResult<Kernel>
    {
        match (self, tables) {
            (Self::Pauli(p), RateTables::Pauli(pf)) => p.generate_kern(si, mb, pf),
            (Self::OneVN(v), RateTables::OneVN(f)) => v.generate_kern(si, mb, f),
            _ => Err(TransportError::TablesMismatch { approach: self.name() }),
        }
    }
}
