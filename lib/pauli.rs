//! Pauli (classical rate) master equation over populations.

use ndarray as nd;
use crate::{
    current::Currents,
    error::{ TransportError, TransportResult },
    indexing::StateIndexing,
    kernel::{ Kernel, KernelAccumulator, KernelBuilder, log_kernel, norm_layout },
    rates::{ check_table_shape, generate_paulifct },
    specfunc::{ Branch, RateFunction },
    system::{ Leads, ManyBody },
};

/// Pauli kernel parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pauli {
    /// Replace row `norm_row` by the normalization condition instead of
    /// appending it.
    pub symq: bool,
    pub norm_row: usize,
}

impl Default for Pauli {
    fn default() -> Self { Self { symq: true, norm_row: 0 } }
}

impl Pauli {
    /// Create a new `Pauli`.
    pub fn new(symq: bool, norm_row: usize) -> Self { Self { symq, norm_row } }

    /// Assemble the rate-equation generator over populations.
    ///
    /// Every population `bb` loses weight at the total rate into all adjacent
    /// sectors and gains weight from each adjacent population `aa`/`cc` at the
    /// corresponding incoming rate.
    pub fn kernel(&self, si: &StateIndexing, paulifct: &nd::Array3<f64>)
        -> TransportResult<Kernel>
    {
        check_table_shape(si, paulifct.shape())?;
        let npauli = si.npauli();
        let (rows, norm_row) = norm_layout(npauli, self.symq, self.norm_row)?;
        let (i, o) = (Branch::In.index(), Branch::Out.index());
        let mut acc = KernelAccumulator::new(rows, npauli, norm_row);
        for charge in 0..si.ncharge() {
            for &b in si.sector(charge) {
                let Some(bb) = si.dm0_index(b, b, charge) else { continue };
                for &a in si.sector_below(charge) {
                    let (Some(aa), Some(ba))
                        = (si.dm0_index(a, a, charge - 1), si.dm1_index(b, a, charge - 1))
                        else { continue };
                    for l in 0..si.nleads() {
                        acc.add(bb, bb, -paulifct[[l, ba, o]]);
                        acc.add(bb, aa, paulifct[[l, ba, i]]);
                    }
                }
                for &c in si.sector_above(charge) {
                    let (Some(cc), Some(cb))
                        = (si.dm0_index(c, c, charge + 1), si.dm1_index(c, b, charge))
                        else { continue };
                    for l in 0..si.nleads() {
                        acc.add(bb, bb, -paulifct[[l, cb, i]]);
                        acc.add(bb, cc, paulifct[[l, cb, o]]);
                    }
                }
            }
        }
        let kernel = acc.finish(npauli);
        log_kernel(Self::NAME, &kernel, self.symq);
        Ok(kernel)
    }

    /// Charge and energy current into the system from every lead.
    ///
    /// `phi0` holds the stationary populations.
    pub fn current(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        paulifct: &nd::Array3<f64>,
        phi0: &nd::Array1<f64>,
    ) -> TransportResult<Currents>
    {
        mb.check(si)?;
        check_table_shape(si, paulifct.shape())?;
        if phi0.len() != si.npauli() {
            return Err(TransportError::PackedLength {
                expected: si.npauli(),
                got: phi0.len(),
            });
        }
        let E = mb.energies();
        let (i, o) = (Branch::In.index(), Branch::Out.index());
        let mut current: nd::Array1<f64> = nd::Array1::zeros(si.nleads());
        let mut energy_current: nd::Array1<f64> = nd::Array1::zeros(si.nleads());
        for bcharge in 0..si.ncharge().saturating_sub(1) {
            for &c in si.sector(bcharge + 1) {
                let Some(cc) = si.dm0_index(c, c, bcharge + 1) else { continue };
                for &b in si.sector(bcharge) {
                    let (Some(bb), Some(cb))
                        = (si.dm0_index(b, b, bcharge), si.dm1_index(c, b, bcharge))
                        else { continue };
                    for l in 0..si.nleads() {
                        let flow
                            = phi0[bb] * paulifct[[l, cb, i]]
                            - phi0[cc] * paulifct[[l, cb, o]];
                        current[l] += flow;
                        energy_current[l] += (E[c] - E[b]) * flow;
                    }
                }
            }
        }
        Ok(Currents { current, energy_current, phi1: None })
    }
}

impl KernelBuilder for Pauli {
    type Factors = nd::Array3<f64>;

    const NAME: &'static str = "Pauli";

    fn nvars(si: &StateIndexing) -> usize { si.npauli() }

    fn generate_factors<R>(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        leads: &Leads,
        oracle: &R,
    ) -> TransportResult<Self::Factors>
    where R: RateFunction + ?Sized
    {
        generate_paulifct(si, mb, leads, oracle)
    }

    fn generate_kern(
        &self,
        si: &StateIndexing,
        _mb: &ManyBody,
        factors: &Self::Factors,
    ) -> TransportResult<Kernel>
    {
        self.kernel(si, factors)
    }

    fn generate_current(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        factors: &Self::Factors,
        phi0: &nd::Array1<f64>,
    ) -> TransportResult<Currents>
    {
        self.current(si, mb, factors, phi0)
    }
}
