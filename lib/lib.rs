#![allow(non_snake_case)]

//! Stationary transport through a few-level quantum system weakly coupled to
//! fermionic leads, in the Pauli and first-order von Neumann (1vN)
//! approximations.
//!
//! A computation for one parameter point runs
//! [`StateIndexing`] → rate tables ([`rates`]) → kernel ([`pauli`],
//! [`neumann1`]) → stationary solve ([`solve`]) → currents ([`current`]);
//! [`Approach::solve_point`] chains these together.

pub mod error;
pub mod config;
pub mod indexing;
pub mod system;
pub mod specfunc;
pub mod rates;
pub mod kernel;
pub mod pauli;
pub mod neumann1;
pub mod current;
pub mod solve;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{ RateError, TransportError, TransportResult };
pub use config::{ Config, FuncParams, KernType, LeadParams };
pub use indexing::{ Dm0, Orientation, PackedSlot, Part, StateIndexing };
pub use system::{ Leads, ManyBody };
pub use specfunc::{ Branch, FermiRates, IntegrationMethod, RateFunction };
pub use rates::{ Phi1Factors, RateTables };
pub use kernel::{ Approach, Kernel, KernelBuilder };
pub use pauli::Pauli;
pub use neumann1::OneVN;
pub use current::Currents;
pub use solve::{ Stationary, solve_kern };
