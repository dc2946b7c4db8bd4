//! Lead- and transition-resolved rate-factor tables.
//!
//! Every table is indexed `[lead, dm1 address, branch]`, with the branch axis
//! ordered as in [`Branch::index`]. Tables are pure functions of their inputs
//! and are rebuilt whenever energies, amplitudes, or lead parameters change.

use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use tracing::debug;
use crate::{
    error::{ TransportError, TransportResult },
    indexing::StateIndexing,
    specfunc::{ Branch, IntegrationMethod, RateFunction },
    system::{ Leads, ManyBody },
};

/// Complex first-order rate factors and their energy-current counterparts.
#[derive(Clone, Debug, PartialEq)]
pub struct Phi1Factors {
    pub phi1fct: nd::Array3<C64>,
    pub phi1fct_energy: nd::Array3<C64>,
}

/// Rate tables of either approach for one parameter point.
#[derive(Clone, Debug, PartialEq)]
pub enum RateTables {
    Pauli(nd::Array3<f64>),
    OneVN(Phi1Factors),
}

fn check_inputs(si: &StateIndexing, mb: &ManyBody, leads: &Leads)
    -> TransportResult<()>
{
    mb.check(si)?;
    leads.check(si)?;
    Ok(())
}

/// Visit every pair `(c, b)` of adjacent sectors with its `dm1` address and
/// the lower sector's charge.
pub(crate) fn for_each_transition<F>(si: &StateIndexing, mut f: F)
    -> TransportResult<()>
where F: FnMut(usize, usize, usize, usize) -> TransportResult<()>
{
    for bcharge in 0..si.ncharge().saturating_sub(1) {
        for &c in si.sector(bcharge + 1) {
            for &b in si.sector(bcharge) {
                if let Some(cb) = si.dm1_index(c, b, bcharge) {
                    f(c, b, cb, bcharge)?;
                }
            }
        }
    }
    Ok(())
}

/// Build golden-rule rates `|T_cb|^2 * pauli_rate(±(E[b] - E[c] + mu))` for the
/// Pauli kernel.
pub fn generate_paulifct<R>(
    si: &StateIndexing,
    mb: &ManyBody,
    leads: &Leads,
    oracle: &R,
) -> TransportResult<nd::Array3<f64>>
where R: RateFunction + ?Sized
{
    check_inputs(si, mb, leads)?;
    let E = mb.energies();
    let Tba = mb.tba();
    let mut paulifct: nd::Array3<f64>
        = nd::Array3::zeros((si.nleads(), si.ndm1(), 2));
    for_each_transition(si, |c, b, cb, _| {
        for l in 0..si.nleads() {
            let xcb = (Tba[[l, b, c]] * Tba[[l, c, b]]).re;
            let ecb = E[b] - E[c] + leads.mulst()[l];
            let (t, d) = (leads.tlst()[l], leads.dlst()[l]);
            paulifct[[l, cb, Branch::In.index()]]
                = xcb * oracle.pauli_rate(ecb, t, d)?;
            paulifct[[l, cb, Branch::Out.index()]]
                = xcb * oracle.pauli_rate(-ecb, t, d)?;
        }
        Ok(())
    })?;
    debug!(nleads = si.nleads(), ndm1 = si.ndm1(), "built Pauli rate factors");
    Ok(paulifct)
}

/// Build complex first-order rate factors for the 1vN kernel and currents.
///
/// `phi1fct_energy` carries the bandwidth term and the transition-energy
/// weight used by the energy current.
pub fn generate_phi1fct<R>(
    si: &StateIndexing,
    mb: &ManyBody,
    leads: &Leads,
    oracle: &R,
    itype: IntegrationMethod,
    limit: usize,
) -> TransportResult<Phi1Factors>
where R: RateFunction + ?Sized
{
    check_inputs(si, mb, leads)?;
    let E = mb.energies();
    let shape = (si.nleads(), si.ndm1(), 2);
    let mut phi1fct: nd::Array3<C64> = nd::Array3::from_elem(shape, C64::zero());
    let mut phi1fct_energy: nd::Array3<C64>
        = nd::Array3::from_elem(shape, C64::zero());
    let (i, o) = (Branch::In.index(), Branch::Out.index());
    for_each_transition(si, |c, b, cb, _| {
        for l in 0..si.nleads() {
            let ecb = E[b] - E[c] + leads.mulst()[l];
            let (t, d) = (leads.tlst()[l], leads.dlst()[l]);
            phi1fct[[l, cb, i]]
                = oracle.first_order_rate(ecb, t, d, Branch::In, itype, limit)?;
            phi1fct[[l, cb, o]]
                = oracle.first_order_rate(-ecb, t, d, Branch::Out, itype, limit)?;
            phi1fct_energy[[l, cb, i]]
                = d - (E[b] - E[c]) * phi1fct[[l, cb, i]];
            phi1fct_energy[[l, cb, o]]
                = -d - (E[b] - E[c]) * phi1fct[[l, cb, o]];
        }
        Ok(())
    })?;
    debug!(
        nleads = si.nleads(),
        ndm1 = si.ndm1(),
        ?itype,
        "built first-order rate factors",
    );
    Ok(Phi1Factors { phi1fct, phi1fct_energy })
}

/// Check that a rate table has shape `(nleads, ndm1, 2)`.
pub(crate) fn check_table_shape(si: &StateIndexing, shape: &[usize])
    -> TransportResult<()>
{
    let expected = [si.nleads(), si.ndm1(), 2];
    for (what, (&got, &exp)) in
        ["rate table leads", "rate table transitions", "rate table branches"]
        .into_iter()
        .zip(shape.iter().zip(expected.iter()))
    {
        if got != exp {
            return Err(TransportError::Dimension { what, expected: exp, got });
        }
    }
    Ok(())
}
