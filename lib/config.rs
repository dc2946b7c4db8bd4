//! Run-time parameters of the kernel engine, loadable from TOML.
//!
//! ```toml
//! [funcp]
//! kerntype = "1vN"
//! itype = "principal_value"
//! dqawc_limit = 22
//! symq = true
//! norm_row = 0
//!
//! [leads]
//! mulst = [0.25, -0.25]
//! tlst = [0.5, 0.5]
//! dlst = [60.0, 60.0]
//! ```

use std::path::Path;
use serde::Deserialize;
use crate::{
    error::TransportResult,
    specfunc::{ IntegrationMethod, check_refinement_limit },
};

/// Master-equation approach used to build the kernel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum KernType {
    /// Populations only.
    #[default]
    Pauli,
    /// First-order von Neumann: populations and coherences.
    #[serde(rename = "1vN")]
    OneVN,
}

/// Kernel construction parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FuncParams {
    pub kerntype: KernType,
    /// Evaluation of the real (principal-value) parts of first-order rate
    /// factors.
    pub itype: IntegrationMethod,
    /// Maximum refinement level of the principal-value integration, at most
    /// [`crate::specfunc::MAX_REFINEMENT_LEVEL`].
    pub dqawc_limit: usize,
    /// Replace row `norm_row` by the normalization condition, giving a square
    /// kernel. Otherwise the normalization condition is appended as an extra
    /// last row and `norm_row` is ignored.
    pub symq: bool,
    pub norm_row: usize,
}

impl Default for FuncParams {
    fn default() -> Self {
        Self {
            kerntype: KernType::Pauli,
            itype: IntegrationMethod::PrincipalValue,
            dqawc_limit: 22,
            symq: true,
            norm_row: 0,
        }
    }
}

/// Per-lead parameters, indexed by lead.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LeadParams {
    /// Chemical potentials.
    pub mulst: Vec<f64>,
    /// Temperatures.
    pub tlst: Vec<f64>,
    /// Half-bandwidths.
    pub dlst: Vec<f64>,
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub funcp: FuncParams,
    #[serde(default)]
    pub leads: LeadParams,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> TransportResult<Self> {
        let config: Self = toml::from_str(s)?;
        check_refinement_limit(config.funcp.dqawc_limit)?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file<P>(path: P) -> TransportResult<Self>
    where P: AsRef<Path>
    {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
