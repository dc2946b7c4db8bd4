//! Small model systems shared by unit tests.

use ndarray as nd;
use num_complex::Complex64 as C64;
use rand::{ rngs::StdRng, Rng, SeedableRng };
use crate::{
    indexing::StateIndexing,
    system::{ Leads, ManyBody },
};

fn hermitian_from_creation(Tcb: nd::Array3<C64>) -> nd::Array3<C64> {
    let mut Tba = Tcb.clone();
    for ((l, i, j), t) in Tcb.indexed_iter() {
        if *t != C64::from(0.0) { Tba[[l, j, i]] = t.conj(); }
    }
    Tba
}

/// Spinful single level `eps` with charging energy `U`; states
/// `|0>, |up>, |dn>, |up dn>`. Leads: left-up, right-up, left-down,
/// right-down, all with amplitude `t0`.
pub fn anderson(eps: f64, U: f64, t0: f64) -> (StateIndexing, ManyBody) {
    let si = StateIndexing::new(&[0, 1, 1, 2], 4);
    let E = nd::array![0.0, eps, eps, 2.0 * eps + U];
    let t = C64::from(t0);
    let mut Tcb: nd::Array3<C64> = nd::Array3::zeros((4, 4, 4));
    for l in [0, 1] {
        // d_up^† |0> = |up>, d_up^† |dn> = |up dn>
        Tcb[[l, 1, 0]] = t;
        Tcb[[l, 3, 2]] = t;
    }
    for l in [2, 3] {
        // d_dn^† |0> = |dn>, d_dn^† |up> = -|up dn>
        Tcb[[l, 2, 0]] = t;
        Tcb[[l, 3, 1]] = -t;
    }
    let mb = ManyBody::new(E, hermitian_from_creation(Tcb), &si).unwrap();
    (si, mb)
}

/// Spinless single level `eps`, two leads with amplitudes `tl`, `tr`.
pub fn single_level(eps: f64, tl: f64, tr: f64) -> (StateIndexing, ManyBody) {
    let si = StateIndexing::new(&[0, 1], 2);
    let E = nd::array![0.0, eps];
    let mut Tcb: nd::Array3<C64> = nd::Array3::zeros((2, 2, 2));
    Tcb[[0, 1, 0]] = C64::from(tl);
    Tcb[[1, 1, 0]] = C64::from(tr);
    let mb = ManyBody::new(E, hermitian_from_creation(Tcb), &si).unwrap();
    (si, mb)
}

/// Two spinless levels `e1`, `e2` with interaction `U`, both coupled to two
/// leads; `t[l][i]` is the amplitude between lead `l` and level `i`. States
/// `|00>, |10>, |01>, |11>`.
pub fn double_level(e1: f64, e2: f64, U: f64, t: [[C64; 2]; 2])
    -> (StateIndexing, ManyBody)
{
    let si = StateIndexing::new(&[0, 1, 1, 2], 2);
    let E = nd::array![0.0, e1, e2, e1 + e2 + U];
    let mut Tcb: nd::Array3<C64> = nd::Array3::zeros((2, 4, 4));
    for l in 0..2 {
        // |11> = d1^† d2^† |00>
        Tcb[[l, 1, 0]] = t[l][0];
        Tcb[[l, 2, 0]] = t[l][1];
        Tcb[[l, 3, 2]] = t[l][0];
        Tcb[[l, 3, 1]] = -t[l][1];
    }
    let mb = ManyBody::new(E, hermitian_from_creation(Tcb), &si).unwrap();
    (si, mb)
}

/// Asymmetric, complex couplings for [`double_level`].
pub fn double_level_couplings() -> [[C64; 2]; 2] {
    [
        [C64::new(0.3, 0.0), C64::new(0.2, 0.1)],
        [C64::new(0.25, -0.05), C64::new(-0.15, 0.0)],
    ]
}

/// Four leads ordered as in [`anderson`], bias `v` split symmetrically.
pub fn biased_leads(v: f64, temperature: f64, dband: f64) -> Leads {
    Leads::uniform(vec![v / 2.0, -v / 2.0, v / 2.0, -v / 2.0], temperature, dband)
}

/// Left and right lead, bias `v` split symmetrically.
pub fn two_leads(v: f64, temperature: f64, dband: f64) -> Leads {
    Leads::uniform(vec![v / 2.0, -v / 2.0], temperature, dband)
}

/// Reproducible random vector with entries in `[-1, 1)`.
pub fn random_vector(n: usize, seed: u64) -> nd::Array1<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}
