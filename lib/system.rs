//! Data handed to the kernel engine by its collaborators: the diagonalized
//! many-body system and the lead parameters.

use indexmap::IndexMap;
use ndarray as nd;
use num_complex::Complex64 as C64;
use tracing::warn;
use crate::{
    config::LeadParams,
    error::{ TransportError, TransportResult },
    indexing::StateIndexing,
};

/// Eigenenergies and lead-transformed tunneling amplitudes in the many-body
/// eigenbasis.
///
/// `Tba[[l, i, j]]` is the amplitude for lead `l` to take eigenstate `j` to
/// eigenstate `i`; the array is expected to satisfy
/// `Tba[[l, i, j]] == conj(Tba[[l, j, i]])`.
#[derive(Clone, Debug, PartialEq)]
pub struct ManyBody {
    E: nd::Array1<f64>,
    Tba: nd::Array3<C64>,
}

impl ManyBody {
    /// Check dimensions against the sector table and wrap.
    ///
    /// A non-Hermitian `Tba` is logged but accepted.
    pub fn new(E: nd::Array1<f64>, Tba: nd::Array3<C64>, si: &StateIndexing)
        -> TransportResult<Self>
    {
        let nmany = si.nmany();
        if E.len() != nmany {
            return Err(TransportError::Dimension {
                what: "eigenenergies",
                expected: nmany,
                got: E.len(),
            });
        }
        let (nleads, n1, n2) = Tba.dim();
        if nleads != si.nleads() {
            return Err(TransportError::Dimension {
                what: "tunneling amplitude leads",
                expected: si.nleads(),
                got: nleads,
            });
        }
        if n1 != nmany || n2 != nmany {
            return Err(TransportError::Dimension {
                what: "tunneling amplitude states",
                expected: nmany,
                got: if n1 != nmany { n1 } else { n2 },
            });
        }
        let max_dev: f64
            = Tba.indexed_iter()
            .map(|((l, i, j), t)| (*t - Tba[[l, j, i]].conj()).norm())
            .fold(0.0, f64::max);
        if max_dev > 1e-12 {
            warn!(max_dev, "tunneling amplitudes are not Hermitian");
        }
        Ok(Self { E, Tba })
    }

    /// Eigenenergies.
    pub fn energies(&self) -> &nd::Array1<f64> { &self.E }

    /// Tunneling amplitudes, indexed `[lead, to, from]`.
    pub fn tba(&self) -> &nd::Array3<C64> { &self.Tba }

    /// Number of eigenstates.
    pub fn nmany(&self) -> usize { self.E.len() }

    /// Number of leads.
    pub fn nleads(&self) -> usize { self.Tba.dim().0 }

    /// Check that `self` was built for an eigenbasis and lead count matching
    /// `si`.
    pub fn check(&self, si: &StateIndexing) -> TransportResult<()> {
        if self.nmany() != si.nmany() {
            return Err(TransportError::Dimension {
                what: "eigenenergies",
                expected: si.nmany(),
                got: self.nmany(),
            });
        }
        if self.nleads() != si.nleads() {
            return Err(TransportError::Dimension {
                what: "tunneling amplitude leads",
                expected: si.nleads(),
                got: self.nleads(),
            });
        }
        Ok(())
    }
}

/// Chemical potential, temperature, and half-bandwidth of every lead.
#[derive(Clone, Debug, PartialEq)]
pub struct Leads {
    mulst: Vec<f64>,
    tlst: Vec<f64>,
    dlst: Vec<f64>,
}

impl Leads {
    /// Create a new `Leads` from per-lead lists of equal length.
    pub fn new(mulst: Vec<f64>, tlst: Vec<f64>, dlst: Vec<f64>)
        -> TransportResult<Self>
    {
        let nleads = mulst.len();
        for (what, len) in [("lead temperatures", tlst.len()), ("lead bandwidths", dlst.len())] {
            if len != nleads {
                return Err(TransportError::Dimension {
                    what,
                    expected: nleads,
                    got: len,
                });
            }
        }
        Ok(Self { mulst, tlst, dlst })
    }

    /// `nleads` identical leads, differing only in chemical potential.
    pub fn uniform(mulst: Vec<f64>, temperature: f64, dband: f64) -> Self {
        let nleads = mulst.len();
        Self {
            mulst,
            tlst: vec![temperature; nleads],
            dlst: vec![dband; nleads],
        }
    }

    /// Build from `{lead: value}` maps, requiring an entry for every lead in
    /// `0..nleads`.
    pub fn from_maps(
        nleads: usize,
        mulst: &IndexMap<usize, f64>,
        tlst: &IndexMap<usize, f64>,
        dlst: &IndexMap<usize, f64>,
    ) -> TransportResult<Self>
    {
        fn dense(
            what: &'static str,
            nleads: usize,
            map: &IndexMap<usize, f64>,
        ) -> TransportResult<Vec<f64>>
        {
            if map.len() != nleads {
                return Err(TransportError::Dimension {
                    what,
                    expected: nleads,
                    got: map.len(),
                });
            }
            (0..nleads)
                .map(|l| {
                    map.get(&l).copied()
                        .ok_or(TransportError::Dimension {
                            what,
                            expected: nleads,
                            got: l,
                        })
                })
                .collect()
        }

        Ok(Self {
            mulst: dense("lead chemical potentials", nleads, mulst)?,
            tlst: dense("lead temperatures", nleads, tlst)?,
            dlst: dense("lead bandwidths", nleads, dlst)?,
        })
    }

    /// Build from the configuration-file form.
    pub fn from_params(params: &LeadParams) -> TransportResult<Self> {
        Self::new(params.mulst.clone(), params.tlst.clone(), params.dlst.clone())
    }

    /// Number of leads.
    pub fn nleads(&self) -> usize { self.mulst.len() }

    /// Chemical potentials.
    pub fn mulst(&self) -> &[f64] { &self.mulst }

    /// Temperatures.
    pub fn tlst(&self) -> &[f64] { &self.tlst }

    /// Half-bandwidths.
    pub fn dlst(&self) -> &[f64] { &self.dlst }

    /// Replace the chemical potentials, e.g. for the next bias point.
    pub fn set_mulst(&mut self, mulst: Vec<f64>) -> TransportResult<()> {
        if mulst.len() != self.nleads() {
            return Err(TransportError::Dimension {
                what: "lead chemical potentials",
                expected: self.nleads(),
                got: mulst.len(),
            });
        }
        self.mulst = mulst;
        Ok(())
    }

    /// Check the lead count against `si`.
    pub fn check(&self, si: &StateIndexing) -> TransportResult<()> {
        if self.nleads() != si.nleads() {
            return Err(TransportError::Dimension {
                what: "lead parameters",
                expected: si.nleads(),
                got: self.nleads(),
            });
        }
        Ok(())
    }
}
