//! First-order von Neumann (1vN) master equation over populations and
//! coherences.
//!
//! The generator is assembled on the packed real vector of
//! [`StateIndexing`]: row `k < ndm0` holds `Im(i dφ0_k/dt)` and, for every
//! coherence `k`, row `ndm0 + k - npauli` holds `Re(i dφ0_k/dt)`. The dense
//! kernel and the matrix-free [`OneVN::apply`] visit exactly the same
//! couplings, so away from the normalization row one is the matrix of the
//! other.

use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use crate::{
    config::FuncParams,
    current::Currents,
    error::{ TransportError, TransportResult },
    indexing::{ Dm0, Orientation, StateIndexing },
    kernel::{ Kernel, KernelAccumulator, KernelBuilder, log_kernel, norm_layout },
    rates::{ Phi1Factors, check_table_shape, for_each_transition, generate_phi1fct },
    specfunc::{ Branch, IntegrationMethod, RateFunction },
    system::{ Leads, ManyBody },
};

/// 1vN kernel parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OneVN {
    /// Replace row `norm_row` by the normalization condition instead of
    /// appending it.
    pub symq: bool,
    pub norm_row: usize,
    /// Treatment of the principal-value parts of the rate factors.
    pub itype: IntegrationMethod,
    /// Refinement limit handed to the rate-function oracle.
    pub limit: usize,
}

impl Default for OneVN {
    fn default() -> Self { Self::from_params(&FuncParams::default()) }
}

impl OneVN {
    pub fn from_params(funcp: &FuncParams) -> Self {
        Self {
            symq: funcp.symq,
            norm_row: funcp.norm_row,
            itype: funcp.itype,
            limit: funcp.dqawc_limit,
        }
    }

    fn check_inputs(si: &StateIndexing, mb: &ManyBody, phi1fct: &nd::Array3<C64>)
        -> TransportResult<()>
    {
        mb.check(si)?;
        check_table_shape(si, phi1fct.shape())
    }

    /// Assemble the dense Liouvillian over the packed real vector.
    pub fn kernel(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        phi1fct: &nd::Array3<C64>,
    ) -> TransportResult<Kernel>
    {
        Self::check_inputs(si, mb, phi1fct)?;
        let ndm0r = si.ndm0r();
        let (rows, norm_row) = norm_layout(ndm0r, self.symq, self.norm_row)?;
        let mut acc = KernelAccumulator::new(rows, ndm0r, norm_row);
        for_each_coupling(si, mb, phi1fct, |dest, src, fct| {
            // fct * (x + i sgn y), split over the Im and Re rows of dest
            let sgn = src.orientation.sign();
            let src_im = si.imag_position(src.index);
            acc.add(dest, src.index, fct.im);
            if let Some(s) = src_im { acc.add(dest, s, fct.re * sgn); }
            if let Some(d) = si.imag_position(dest) {
                acc.add(d, src.index, fct.re);
                if let Some(s) = src_im { acc.add(d, s, -fct.im * sgn); }
            }
        });
        let kernel = acc.finish(si.npauli());
        log_kernel(Self::NAME, &kernel, self.symq);
        Ok(kernel)
    }

    /// Apply the Liouvillian to a packed real vector without building the
    /// kernel.
    ///
    /// The result uses the row packing of [`Self::kernel`]; slot `norm_row`
    /// holds the normalization residual `Σ populations - 1`. `norm_row` must
    /// address one of the first `ndm0` slots.
    pub fn apply(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        phi1fct: &nd::Array3<C64>,
        phi0p: &nd::Array1<f64>,
    ) -> TransportResult<nd::Array1<f64>>
    {
        Self::check_inputs(si, mb, phi1fct)?;
        if self.norm_row >= si.ndm0() {
            return Err(TransportError::NormRow {
                row: self.norm_row,
                bound: si.ndm0(),
            });
        }
        let phi0 = si.packed_to_complex(phi0p)?;
        let mut i_dphi0_dt: nd::Array1<C64>
            = nd::Array1::from_elem(si.ndm0(), C64::zero());
        for_each_coupling(si, mb, phi1fct, |dest, src, fct| {
            i_dphi0_dt[dest] += fct * src.orientation.apply(phi0[src.index]);
        });
        let mut out: nd::Array1<f64> = nd::Array1::zeros(si.ndm0r());
        for (k, z) in i_dphi0_dt.iter().enumerate() {
            out[k] = z.im;
            if let Some(ki) = si.imag_position(k) { out[ki] = z.re; }
        }
        let norm: f64 = phi0p.iter().take(si.npauli()).sum();
        out[self.norm_row] = norm - 1.0;
        Ok(out)
    }

    /// First-order coherences `phi1[lead, dm1]` and the charge and energy
    /// current into the system from every lead.
    pub fn current(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        factors: &Phi1Factors,
        phi0p: &nd::Array1<f64>,
    ) -> TransportResult<Currents>
    {
        Self::check_inputs(si, mb, &factors.phi1fct)?;
        check_table_shape(si, factors.phi1fct_energy.shape())?;
        let phi0 = si.packed_to_complex(phi0p)?;
        let Tba = mb.tba();
        let (i, o) = (Branch::In.index(), Branch::Out.index());
        let mut phi1: nd::Array2<C64>
            = nd::Array2::from_elem((si.nleads(), si.ndm1()), C64::zero());
        let mut current: nd::Array1<C64>
            = nd::Array1::from_elem(si.nleads(), C64::zero());
        let mut energy_current: nd::Array1<C64>
            = nd::Array1::from_elem(si.nleads(), C64::zero());
        let rho = |a: usize, b: usize, charge: usize| -> Option<C64> {
            si.dm0(a, b, charge).map(|d| d.orientation.apply(phi0[d.index]))
        };
        for_each_transition(si, |c, b, cb, bcharge| {
            for l in 0..si.nleads() {
                let fct1 = factors.phi1fct[[l, cb, i]];
                let fct2 = factors.phi1fct[[l, cb, o]];
                let fct1h = factors.phi1fct_energy[[l, cb, i]];
                let fct2h = factors.phi1fct_energy[[l, cb, o]];
                for &bp in si.sector(bcharge) {
                    let Some(rho_bpb) = rho(bp, b, bcharge) else { continue };
                    phi1[[l, cb]] += Tba[[l, c, bp]] * rho_bpb * fct1;
                    let w = Tba[[l, b, c]] * Tba[[l, c, bp]] * rho_bpb;
                    current[l] += w * fct1;
                    energy_current[l] += w * fct1h;
                }
                for &cp in si.sector(bcharge + 1) {
                    let Some(rho_ccp) = rho(c, cp, bcharge + 1) else { continue };
                    phi1[[l, cb]] += Tba[[l, cp, b]] * rho_ccp * fct2;
                    let w = Tba[[l, b, c]] * rho_ccp * Tba[[l, cp, b]];
                    current[l] += w * fct2;
                    energy_current[l] += w * fct2h;
                }
            }
            Ok(())
        })?;
        Ok(Currents {
            current: current.mapv(|z| -2.0 * z.im),
            energy_current: energy_current.mapv(|z| -2.0 * z.im),
            phi1: Some(phi1),
        })
    }
}

/// Visit every term of `i dφ0/dt` as `(destination, source, factor)`: the
/// destination address `dest` (always a stored ordering) picks up
/// `factor * φ0[source]`, with the source value conjugated when its
/// orientation says so.
fn for_each_coupling<F>(
    si: &StateIndexing,
    mb: &ManyBody,
    phi1fct: &nd::Array3<C64>,
    mut f: F,
)
where F: FnMut(usize, Dm0, C64)
{
    let E = mb.energies();
    let Tba = mb.tba();
    let (i, o) = (Branch::In.index(), Branch::Out.index());
    let leads = 0..si.nleads();
    for charge in 0..si.ncharge() {
        let sector = si.sector(charge);
        let below = si.sector_below(charge);
        let above = si.sector_above(charge);
        for (k, &b) in sector.iter().enumerate() {
            for &bp in sector[k..].iter() {
                let Some(bbp) = si.dm0_index(b, bp, charge) else { continue };

                if b != bp {
                    let free = Dm0 {
                        charge,
                        index: bbp,
                        orientation: Orientation::Canonical,
                    };
                    f(bbp, free, C64::from(E[b] - E[bp]));
                }

                // tunneling out of and back into sector charge - 1
                for (&a, &ap) in below.iter().cartesian_product(below) {
                    let (Some(aap), Some(bpa), Some(bap)) = (
                        si.dm0(a, ap, charge - 1),
                        si.dm1_index(bp, a, charge - 1),
                        si.dm1_index(b, ap, charge - 1),
                    ) else { continue };
                    let fct: C64
                        = leads.clone()
                        .map(|l| {
                            Tba[[l, b, a]] * Tba[[l, ap, bp]]
                                * (phi1fct[[l, bpa, i]].conj() - phi1fct[[l, bap, i]])
                        })
                        .sum();
                    f(bbp, aap, fct);
                }

                // round trips through adjacent sectors, back into this one
                for &bpp in sector {
                    if let Some(bppbp) = si.dm0(bpp, bp, charge) {
                        let mut fct = C64::zero();
                        for &a in below {
                            let Some(bpa) = si.dm1_index(bp, a, charge - 1)
                                else { continue };
                            for l in leads.clone() {
                                fct += Tba[[l, b, a]] * Tba[[l, a, bpp]]
                                    * phi1fct[[l, bpa, o]].conj();
                            }
                        }
                        for &c in above {
                            let Some(cbp) = si.dm1_index(c, bp, charge)
                                else { continue };
                            for l in leads.clone() {
                                fct += Tba[[l, b, c]] * Tba[[l, c, bpp]]
                                    * phi1fct[[l, cbp, i]];
                            }
                        }
                        f(bbp, bppbp, fct);
                    }
                    if let Some(bbpp) = si.dm0(b, bpp, charge) {
                        let mut fct = C64::zero();
                        for &a in below {
                            let Some(ba) = si.dm1_index(b, a, charge - 1)
                                else { continue };
                            for l in leads.clone() {
                                fct -= Tba[[l, bpp, a]] * Tba[[l, a, bp]]
                                    * phi1fct[[l, ba, o]];
                            }
                        }
                        for &c in above {
                            let Some(cb) = si.dm1_index(c, b, charge)
                                else { continue };
                            for l in leads.clone() {
                                fct -= Tba[[l, bpp, c]] * Tba[[l, c, bp]]
                                    * phi1fct[[l, cb, i]].conj();
                            }
                        }
                        f(bbp, bbpp, fct);
                    }
                }

                // tunneling into and back out of sector charge + 1
                for (&c, &cp) in above.iter().cartesian_product(above) {
                    let (Some(ccp), Some(cbp), Some(cpb)) = (
                        si.dm0(c, cp, charge + 1),
                        si.dm1_index(c, bp, charge),
                        si.dm1_index(cp, b, charge),
                    ) else { continue };
                    let fct: C64
                        = leads.clone()
                        .map(|l| {
                            Tba[[l, b, c]] * Tba[[l, cp, bp]]
                                * (phi1fct[[l, cbp, o]] - phi1fct[[l, cpb, o]].conj())
                        })
                        .sum();
                    f(bbp, ccp, fct);
                }
            }
        }
    }
}

impl KernelBuilder for OneVN {
    type Factors = Phi1Factors;

    const NAME: &'static str = "1vN";

    fn nvars(si: &StateIndexing) -> usize { si.ndm0r() }

    fn generate_factors<R>(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        leads: &Leads,
        oracle: &R,
    ) -> TransportResult<Self::Factors>
    where R: RateFunction + ?Sized
    {
        generate_phi1fct(si, mb, leads, oracle, self.itype, self.limit)
    }

    fn generate_kern(
        &self,
        si: &StateIndexing,
        mb: &ManyBody,
        factors: &Self::Factors,
    ) -> TransportResult<Kernel>
    {
        self.kernel(si, mb, &factors.phi1fct)
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

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fixtures,
        pauli::Pauli,
        rates::generate_paulifct,
        specfunc::FermiRates,
    };

    fn double_level(v: f64) -> (StateIndexing, ManyBody, Phi1Factors) {
        let (si, mb)
            = fixtures::double_level(0.4, 1.1, 2.5, fixtures::double_level_couplings());
        let leads = fixtures::two_leads(v, 1.0, 10.0);
        let factors = OneVN::default()
            .generate_factors(&si, &mb, &leads, &FermiRates)
            .unwrap();
        (si, mb, factors)
    }

    #[test]
    fn dense_kernel_matches_operator() {
        let (si, mb, factors) = double_level(0.8);
        for (norm_row, seed) in [(0, 10), (3, 11), (4, 12)] {
            let approach = OneVN { norm_row, ..OneVN::default() };
            let k = approach.kernel(&si, &mb, &factors.phi1fct).unwrap();
            let v = fixtures::random_vector(si.ndm0r(), seed);
            let dense = k.kern.dot(&v) - &k.bvec;
            let applied = approach.apply(&si, &mb, &factors.phi1fct, &v).unwrap();
            for (row, (x, y)) in dense.iter().zip(applied.iter()).enumerate() {
                assert!(
                    (x - y).abs() < 1e-12,
                    "norm_row {}, row {}: {} vs {}", norm_row, row, x, y,
                );
            }
        }
    }

    #[test]
    fn kernel_conserves_trace() {
        let (si, mb, factors) = double_level(1.5);
        let k = OneVN { symq: false, ..OneVN::default() }
            .kernel(&si, &mb, &factors.phi1fct)
            .unwrap();
        assert_eq!(k.kern.dim(), (si.ndm0r() + 1, si.ndm0r()));
        for col in 0..si.ndm0r() {
            let s: f64 = (0..si.npauli()).map(|row| k.kern[[row, col]]).sum();
            assert!(s.abs() < 1e-12, "column {} sums to {}", col, s);
        }
    }

    #[test]
    fn free_evolution_couples_real_and_imaginary_parts() {
        let zero = [[C64::zero(); 2]; 2];
        let (si, mb) = fixtures::double_level(0.4, 1.1, 2.5, zero);
        let leads = fixtures::two_leads(0.0, 1.0, 10.0);
        let factors = OneVN::default()
            .generate_factors(&si, &mb, &leads, &FermiRates)
            .unwrap();
        let k = OneVN { symq: false, ..OneVN::default() }
            .kernel(&si, &mb, &factors.phi1fct)
            .unwrap();
        let coh = si.dm0(1, 2, 1).unwrap();
        assert_eq!(coh.orientation, Orientation::Canonical);
        let cohi = si.imag_position(coh.index).unwrap();
        let mut expected: nd::Array2<f64> = nd::Array2::zeros(k.kern.dim());
        expected[[coh.index, cohi]] = 0.4 - 1.1;
        expected[[cohi, coh.index]] = 0.4 - 1.1;
        expected.row_mut(si.ndm0r()).iter_mut().take(si.npauli())
            .for_each(|x| { *x = 1.0; });
        assert_eq!(k.kern, expected);
    }

    #[test]
    fn reduces_to_pauli_without_coherences() {
        let (si, mb) = fixtures::single_level(0.3, 0.2, 0.35);
        let leads = fixtures::two_leads(0.7, 0.8, 20.0);
        assert_eq!(si.ndm0r(), si.npauli());
        let pf = generate_paulifct(&si, &mb, &leads, &FermiRates).unwrap();
        let factors = OneVN::default()
            .generate_factors(&si, &mb, &leads, &FermiRates)
            .unwrap();
        let kp = Pauli::new(false, 0).kernel(&si, &pf).unwrap();
        let kv = OneVN { symq: false, ..OneVN::default() }
            .kernel(&si, &mb, &factors.phi1fct)
            .unwrap();
        for (x, y) in kp.kern.iter().zip(kv.kern.iter()) {
            assert!((x - y).abs() < 1e-12, "{} vs {}", x, y);
        }
        let phi0 = nd::array![0.35, 0.65];
        let cp = Pauli::default().current(&si, &mb, &pf, &phi0).unwrap();
        let cv = OneVN::default().current(&si, &mb, &factors, &phi0).unwrap();
        for l in 0..si.nleads() {
            assert!((cp.current[l] - cv.current[l]).abs() < 1e-12);
            assert!((cp.energy_current[l] - cv.energy_current[l]).abs() < 1e-12);
        }
        assert_eq!(cv.phi1.map(|p| p.dim()), Some((si.nleads(), si.ndm1())));
    }

    #[test]
    fn operator_validates_inputs() {
        let (si, mb, factors) = double_level(0.0);
        let v = fixtures::random_vector(si.ndm0r(), 1);
        let bad_row = OneVN { norm_row: si.ndm0(), ..OneVN::default() };
        assert!(matches!(
            bad_row.apply(&si, &mb, &factors.phi1fct, &v),
            Err(TransportError::NormRow { .. }),
        ));
        // the dense kernel accepts any row of the packed vector
        assert!(bad_row.kernel(&si, &mb, &factors.phi1fct).is_ok());
        assert!(matches!(
            OneVN::default().apply(&si, &mb, &factors.phi1fct, &v.slice(nd::s![1..]).to_owned()),
            Err(TransportError::PackedLength { .. }),
        ));
        assert!(matches!(
            OneVN { norm_row: si.ndm0r(), ..OneVN::default() }
                .kernel(&si, &mb, &factors.phi1fct),
            Err(TransportError::NormRow { .. }),
        ));
    }
}
