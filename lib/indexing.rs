//! Addressing of reduced density-matrix elements over charge sectors.
//!
//! The many-body eigenbasis is partitioned by total particle number. Within
//! each sector, every unordered pair of states `(a, b)` owns one address in
//! `[0, ndm0)`: diagonal pairs (populations) come first, in `[0, npauli)`,
//! followed by one address per off-diagonal pair (coherence), in
//! `[npauli, ndm0)`. Only one ordering of a coherence is stored; the other is
//! recovered by complex conjugation, which is tracked by [`Orientation`].
//!
//! Since the solved-for unknown must be real, each coherence is carried as two
//! real degrees of freedom in a packed vector of length
//! `ndm0r = 2 * ndm0 - npauli`:
//! ```text
//! [ populations | Re(coherences) | Im(coherences) ]
//!   0 .. npauli   npauli .. ndm0   ndm0 .. ndm0r
//! ```
//!
//! Pairs straddling adjacent sectors `(c, b)`, with `c` in sector `charge + 1`
//! and `b` in sector `charge`, own an address in `[0, ndm1)` used only to
//! index lead rate-factor tables.

use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use tracing::debug;
use crate::error::{ TransportError, TransportResult };

/* Tags ***********************************************************************/

/// Which of the two Hermitian-conjugate orderings of a pair was queried.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// `(a, b)` is the stored ordering; the addressed value is `rho[a, b]`.
    Canonical,
    /// `(b, a)` is the stored ordering; the addressed value is
    /// `conj(rho[a, b])`.
    Conjugate,
}

impl Orientation {
    /// `+1` for [`Self::Canonical`], `-1` for [`Self::Conjugate`].
    ///
    /// This is the sign carried by the imaginary part of the queried element
    /// relative to the stored one.
    pub fn sign(self) -> f64 {
        match self {
            Self::Canonical => 1.0,
            Self::Conjugate => -1.0,
        }
    }

    /// Convert a stored value into the value of the queried ordering.
    pub fn apply(self, z: C64) -> C64 {
        match self {
            Self::Canonical => z,
            Self::Conjugate => z.conj(),
        }
    }
}

/// Real or imaginary half of a density-matrix element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Part {
    Real,
    Imag,
}

/// A resolved density-matrix address.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Dm0 {
    /// Charge sector containing both states.
    pub charge: usize,
    /// Address in `[0, ndm0)`.
    pub index: usize,
    /// Orientation of the queried ordering relative to the stored one.
    pub orientation: Orientation,
}

/// One real degree of freedom of the packed parameter vector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackedSlot {
    /// Address in `[0, ndm0)`.
    pub index: usize,
    pub part: Part,
}

/* Indexer ********************************************************************/

/// Sector table and address maps for one Hamiltonian sector structure.
///
/// Immutable once built; a change in sector structure requires building a new
/// instance. Instances are cheap to share across threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateIndexing {
    nmany: usize,
    nleads: usize,
    statesdm: Vec<Vec<usize>>,
    // state -> (charge, position within sector)
    location: Vec<Option<(usize, usize)>>,
    shift_pop: Vec<usize>,
    shift_coh: Vec<usize>,
    shift_dm1: Vec<usize>,
    npauli: usize,
    ndm0: usize,
    ndm1: usize,
}

impl StateIndexing {
    /// Build the sector table from the particle number of every eigenstate.
    ///
    /// `charges[i]` is the particle number of the `i`-th eigenstate; sector
    /// order follows eigenbasis order.
    pub fn new(charges: &[usize], nleads: usize) -> Self {
        let ncharge = charges.iter().max().map_or(0, |c| c + 1);
        let mut statesdm: Vec<Vec<usize>> = vec![Vec::new(); ncharge];
        charges.iter().enumerate()
            .for_each(|(state, charge)| { statesdm[*charge].push(state); });
        Self::build(charges.len(), nleads, statesdm)
    }

    /// Build the sector table from explicit sector lists.
    ///
    /// `sectors[charge]` lists the eigenstates with that particle number in
    /// the order they should be addressed. Fails if a state is out of range
    /// for an eigenbasis of size `nmany` or is listed twice.
    pub fn from_sectors(
        nmany: usize,
        sectors: Vec<Vec<usize>>,
        nleads: usize,
    ) -> TransportResult<Self>
    {
        let mut seen: Vec<bool> = vec![false; nmany];
        for (charge, sector) in sectors.iter().enumerate() {
            for &state in sector.iter() {
                match seen.get_mut(state) {
                    Some(s) if !*s => { *s = true; },
                    _ => {
                        return Err(TransportError::Sector { state, charge });
                    },
                }
            }
        }
        Ok(Self::build(nmany, nleads, sectors))
    }

    fn build(nmany: usize, nleads: usize, statesdm: Vec<Vec<usize>>) -> Self {
        let ncharge = statesdm.len();
        let mut location: Vec<Option<(usize, usize)>> = vec![None; nmany];
        for (charge, sector) in statesdm.iter().enumerate() {
            for (pos, &state) in sector.iter().enumerate() {
                location[state] = Some((charge, pos));
            }
        }

        let mut shift_pop: Vec<usize> = Vec::with_capacity(ncharge);
        let mut shift_coh: Vec<usize> = Vec::with_capacity(ncharge);
        let mut npauli: usize = 0;
        let mut ncoh: usize = 0;
        for sector in statesdm.iter() {
            let n = sector.len();
            shift_pop.push(npauli);
            shift_coh.push(ncoh);
            npauli += n;
            ncoh += n * n.saturating_sub(1) / 2;
        }

        let mut shift_dm1: Vec<usize> = Vec::with_capacity(ncharge);
        let mut ndm1: usize = 0;
        for charge in 0..ncharge {
            shift_dm1.push(ndm1);
            if charge + 1 < ncharge {
                ndm1 += statesdm[charge].len() * statesdm[charge + 1].len();
            }
        }

        let si = Self {
            nmany,
            nleads,
            statesdm,
            location,
            shift_pop,
            shift_coh,
            shift_dm1,
            npauli,
            ndm0: npauli + ncoh,
            ndm1,
        };
        debug!(
            ncharge = si.ncharge(),
            npauli = si.npauli,
            ndm0 = si.ndm0,
            ndm0r = si.ndm0r(),
            ndm1 = si.ndm1,
            "built state indexing",
        );
        si
    }

    /// Rebuild, keeping only the states for which `keep` returns `true`.
    ///
    /// Sector order of the kept states is preserved. Every address involving
    /// a removed state becomes invalid.
    pub fn restricted<F>(&self, keep: F) -> Self
    where F: Fn(usize) -> bool
    {
        let statesdm: Vec<Vec<usize>>
            = self.statesdm.iter()
            .map(|sector| sector.iter().copied().filter(|s| keep(*s)).collect())
            .collect();
        Self::build(self.nmany, self.nleads, statesdm)
    }

    /// Rebuild, keeping only the states lying at most `de` above the lowest
    /// eigenenergy.
    pub fn with_energy_cutoff(&self, E: &nd::Array1<f64>, de: f64)
        -> TransportResult<Self>
    {
        if E.len() != self.nmany {
            return Err(TransportError::Dimension {
                what: "eigenenergies",
                expected: self.nmany,
                got: E.len(),
            });
        }
        let emin = E.iter().copied().fold(f64::INFINITY, f64::min);
        Ok(self.restricted(|s| E[s] - emin <= de))
    }

    /// Number of eigenstates in the full eigenbasis.
    pub fn nmany(&self) -> usize { self.nmany }

    /// Number of leads.
    pub fn nleads(&self) -> usize { self.nleads }

    /// Number of charge sectors.
    pub fn ncharge(&self) -> usize { self.statesdm.len() }

    /// Number of populations.
    pub fn npauli(&self) -> usize { self.npauli }

    /// Number of complex density-matrix addresses.
    pub fn ndm0(&self) -> usize { self.ndm0 }

    /// Length of the packed real parameter vector, `2 * ndm0 - npauli`.
    pub fn ndm0r(&self) -> usize { 2 * self.ndm0 - self.npauli }

    /// Number of inter-sector addresses.
    pub fn ndm1(&self) -> usize { self.ndm1 }

    /// States of a sector, in addressing order. Empty for charges out of
    /// range.
    pub fn sector(&self, charge: usize) -> &[usize] {
        self.statesdm.get(charge).map_or(&[], |s| s.as_slice())
    }

    /// States of sector `charge - 1`; empty for `charge == 0`.
    pub fn sector_below(&self, charge: usize) -> &[usize] {
        charge.checked_sub(1).map_or(&[], |c| self.sector(c))
    }

    /// States of sector `charge + 1`; empty for the highest sector.
    pub fn sector_above(&self, charge: usize) -> &[usize] {
        self.sector(charge + 1)
    }

    /// Charge sector of a state, if it is addressed at all.
    pub fn charge_of(&self, state: usize) -> Option<usize> {
        self.location.get(state).copied().flatten().map(|(c, _)| c)
    }

    /// Resolve the ordered pair `(a, b)` within sector `charge`.
    pub fn dm0(&self, a: usize, b: usize, charge: usize) -> Option<Dm0> {
        let (ca, pa) = self.location.get(a).copied().flatten()?;
        let (cb, pb) = self.location.get(b).copied().flatten()?;
        if ca != charge || cb != charge { return None; }
        if pa == pb {
            return Some(Dm0 {
                charge,
                index: self.shift_pop[charge] + pa,
                orientation: Orientation::Canonical,
            });
        }
        let (i, j, orientation)
            = if pa < pb {
                (pa, pb, Orientation::Canonical)
            } else {
                (pb, pa, Orientation::Conjugate)
            };
        let n = self.statesdm[charge].len();
        let pair = i * n - i * (i + 1) / 2 + (j - i - 1);
        Some(Dm0 {
            charge,
            index: self.npauli + self.shift_coh[charge] + pair,
            orientation,
        })
    }

    /// Address of `(a, b)` in sector `charge`, or `None` if the pair is not
    /// realizable there.
    pub fn dm0_index(&self, a: usize, b: usize, charge: usize)
        -> Option<usize>
    {
        self.dm0(a, b, charge).map(|d| d.index)
    }

    /// `true` if `(a, b)` has an address in sector `charge`.
    pub fn dm0_is_valid(&self, a: usize, b: usize, charge: usize) -> bool {
        self.dm0(a, b, charge).is_some()
    }

    /// `true` if `(a, b)`, as given, is the stored ordering. Invalid pairs
    /// give `false`.
    pub fn dm0_is_canonical(&self, a: usize, b: usize, charge: usize)
        -> bool
    {
        self.dm0(a, b, charge)
            .is_some_and(|d| d.orientation == Orientation::Canonical)
    }

    /// Address of `(c, b)` with `c` in sector `bcharge + 1` and `b` in sector
    /// `bcharge`.
    pub fn dm1_index(&self, c: usize, b: usize, bcharge: usize)
        -> Option<usize>
    {
        let (cc, pc) = self.location.get(c).copied().flatten()?;
        let (cb, pb) = self.location.get(b).copied().flatten()?;
        (cb == bcharge && cc == bcharge + 1)
            .then(|| {
                self.shift_dm1[bcharge]
                    + pc * self.statesdm[bcharge].len()
                    + pb
            })
    }

    /// `true` if the address in `[0, ndm0)` is a population.
    pub fn is_population(&self, index: usize) -> bool { index < self.npauli }

    /// Position of a slot in the packed real vector.
    ///
    /// Populations have no imaginary slot.
    pub fn packed_position(&self, slot: PackedSlot) -> Option<usize> {
        match slot.part {
            Part::Real => (slot.index < self.ndm0).then_some(slot.index),
            Part::Imag => (
                slot.index >= self.npauli && slot.index < self.ndm0
            ).then(|| self.ndm0 + slot.index - self.npauli),
        }
    }

    /// Inverse of [`Self::packed_position`].
    pub fn packed_slot(&self, position: usize) -> Option<PackedSlot> {
        if position < self.ndm0 {
            Some(PackedSlot { index: position, part: Part::Real })
        } else if position < self.ndm0r() {
            Some(PackedSlot {
                index: position - self.ndm0 + self.npauli,
                part: Part::Imag,
            })
        } else {
            None
        }
    }

    /// Position of the imaginary slot of a coherence address; `None` for
    /// populations.
    pub fn imag_position(&self, index: usize) -> Option<usize> {
        self.packed_position(PackedSlot { index, part: Part::Imag })
    }

    /// Reassemble complex density-matrix values from the packed real vector.
    pub fn packed_to_complex(&self, phi0p: &nd::Array1<f64>)
        -> TransportResult<nd::Array1<C64>>
    {
        if phi0p.len() != self.ndm0r() {
            return Err(TransportError::PackedLength {
                expected: self.ndm0r(),
                got: phi0p.len(),
            });
        }
        let phi0: nd::Array1<C64>
            = (0..self.ndm0)
            .map(|k| {
                let im
                    = self.imag_position(k).map_or(0.0, |ki| phi0p[ki]);
                C64::new(phi0p[k], im)
            })
            .collect();
        Ok(phi0)
    }

    /// Split complex density-matrix values into the packed real vector.
    ///
    /// Imaginary parts of populations are dropped.
    pub fn complex_to_packed(&self, phi0: &nd::Array1<C64>)
        -> TransportResult<nd::Array1<f64>>
    {
        if phi0.len() != self.ndm0 {
            return Err(TransportError::PackedLength {
                expected: self.ndm0,
                got: phi0.len(),
            });
        }
        let mut phi0p: nd::Array1<f64> = nd::Array1::zeros(self.ndm0r());
        for (k, z) in phi0.iter().enumerate() {
            phi0p[k] = z.re;
            if let Some(ki) = self.imag_position(k) { phi0p[ki] = z.im; }
        }
        Ok(phi0p)
    }

    /// Expand a packed real vector into the full `nmany x nmany` Hermitian
    /// density matrix over the eigenbasis.
    ///
    /// Elements between states of different sectors, or involving states not
    /// addressed by `self`, are zero.
    pub fn density_matrix(&self, phi0p: &nd::Array1<f64>)
        -> TransportResult<nd::Array2<C64>>
    {
        let phi0 = self.packed_to_complex(phi0p)?;
        let mut rho: nd::Array2<C64>
            = nd::Array2::from_elem((self.nmany, self.nmany), C64::zero());
        for (charge, sector) in self.statesdm.iter().enumerate() {
            for &a in sector.iter() {
                for &b in sector.iter() {
                    if let Some(d) = self.dm0(a, b, charge) {
                        rho[[a, b]] = d.orientation.apply(phi0[d.index]);
                    }
                }
            }
        }
        Ok(rho)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rustc_hash::FxHashSet as HashSet;

    // spinful single level: |0>, |up>, |dn>, |up dn>, plus a second
    // single-particle state to make a three-state sector
    fn indexing() -> StateIndexing {
        StateIndexing::new(&[0, 1, 1, 2, 1], 2)
    }

    #[test]
    fn sizes() {
        let si = indexing();
        assert_eq!(si.ncharge(), 3);
        assert_eq!(si.sector(1), &[1, 2, 4]);
        assert_eq!(si.npauli(), 5);
        assert_eq!(si.ndm0(), 5 + 3);
        assert_eq!(si.ndm0r(), 2 * si.ndm0() - si.npauli());
        assert_eq!(si.ndm1(), 3 + 3);
        assert!(si.sector_below(0).is_empty());
        assert!(si.sector_above(2).is_empty());
    }

    #[test]
    fn dm0_is_bijective_and_symmetric() {
        let si = indexing();
        let mut seen: HashSet<usize> = HashSet::default();
        for charge in 0..si.ncharge() {
            let sector = si.sector(charge);
            for (i, &a) in sector.iter().enumerate() {
                for &b in sector.iter().skip(i) {
                    let ab = si.dm0_index(a, b, charge).unwrap();
                    assert_eq!(Some(ab), si.dm0_index(b, a, charge));
                    assert!(seen.insert(ab), "address {} reused", ab);
                    assert!(si.dm0_is_valid(a, b, charge));
                    if a != b {
                        assert!(si.dm0_is_canonical(a, b, charge));
                        assert!(!si.dm0_is_canonical(b, a, charge));
                        assert!(!si.is_population(ab));
                    } else {
                        assert!(si.is_population(ab));
                    }
                }
            }
        }
        assert_eq!(seen, (0..si.ndm0()).collect::<HashSet<usize>>());
    }

    #[test]
    fn cross_sector_pairs_are_invalid() {
        let si = indexing();
        for a in 0..si.nmany() {
            for b in 0..si.nmany() {
                for charge in 0..si.ncharge() + 1 {
                    let same
                        = si.charge_of(a) == Some(charge)
                        && si.charge_of(b) == Some(charge);
                    assert_eq!(si.dm0_index(a, b, charge).is_some(), same);
                }
            }
        }
        assert_eq!(si.dm0_index(0, 1, 0), None);
        assert_eq!(si.dm0_index(0, 1, 1), None);
        assert!(!si.dm0_is_canonical(0, 1, 1));
    }

    #[test]
    fn dm1_is_bijective() {
        let si = indexing();
        let mut seen: HashSet<usize> = HashSet::default();
        for charge in 0..si.ncharge() - 1 {
            for &c in si.sector(charge + 1) {
                for &b in si.sector(charge) {
                    let cb = si.dm1_index(c, b, charge).unwrap();
                    assert!(seen.insert(cb));
                }
            }
        }
        assert_eq!(seen, (0..si.ndm1()).collect::<HashSet<usize>>());
        assert_eq!(si.dm1_index(0, 1, 0), None);
        assert_eq!(si.dm1_index(3, 0, 0), None);
    }

    #[test]
    fn packed_slots_round_trip() {
        let si = indexing();
        for pos in 0..si.ndm0r() {
            let slot = si.packed_slot(pos).unwrap();
            assert_eq!(si.packed_position(slot), Some(pos));
        }
        assert_eq!(si.packed_slot(si.ndm0r()), None);
        assert_eq!(si.imag_position(0), None);
        assert_eq!(si.imag_position(si.npauli()), Some(si.ndm0()));
    }

    #[test]
    fn density_matrix_is_hermitian() {
        let si = indexing();
        let phi0p: nd::Array1<f64>
            = (0..si.ndm0r()).map(|k| 0.1 * (k as f64 + 1.0)).collect();
        let rho = si.density_matrix(&phi0p).unwrap();
        for ((a, b), z) in rho.indexed_iter() {
            assert_eq!(*z, rho[[b, a]].conj());
        }
        let back = si.complex_to_packed(&si.packed_to_complex(&phi0p).unwrap())
            .unwrap();
        assert_eq!(back, phi0p);
        assert!(si.density_matrix(&nd::Array1::zeros(3)).is_err());
    }

    #[test]
    fn from_sectors_rejects_duplicates() {
        assert!(StateIndexing::from_sectors(3, vec![vec![0], vec![1, 1]], 1)
            .is_err());
        assert!(StateIndexing::from_sectors(3, vec![vec![0], vec![1, 5]], 1)
            .is_err());
        let si = StateIndexing::from_sectors(3, vec![vec![0], vec![2, 1]], 1)
            .unwrap();
        assert!(si.dm0_is_canonical(2, 1, 1));
    }

    #[test]
    fn restriction_invalidates_removed_states() {
        let si = indexing();
        let E = nd::array![0.0, 1.0, 1.0, 5.0, 1.5];
        let sr = si.with_energy_cutoff(&E, 2.0).unwrap();
        assert_eq!(sr.npauli(), 4);
        assert_eq!(sr.dm0_index(3, 3, 2), None);
        assert_eq!(sr.dm1_index(3, 1, 1), None);
        assert!(sr.dm0_is_valid(1, 4, 1));
        assert!(si.with_energy_cutoff(&nd::array![0.0], 1.0).is_err());
    }
}
