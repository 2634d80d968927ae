//! `warden.toml` loading

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use warden_admission::AdmissionConfig;
use warden_kernel::{FaultPolicy, KernelConfig};
use warden_pmp::{RegionDescriptor, DEFAULT_REGIONS};

/// Fault policy as written in the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyName {
    Contain,
    Halt,
}

impl From<PolicyName> for FaultPolicy {
    fn from(name: PolicyName) -> Self {
        match name {
            PolicyName::Contain => FaultPolicy::Contain,
            PolicyName::Halt => FaultPolicy::Halt,
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub fault_policy: PolicyName,
    pub trusted_rescreen: bool,
    pub admission: AdmissionConfig,
    /// Replaces the built-in protection table when present
    #[serde(rename = "region")]
    pub regions: Option<Vec<RegionDescriptor>>,
}

impl Default for SimConfig {
    fn default() -> Self {
        let kernel = KernelConfig::DEFAULT;
        Self {
            fault_policy: match kernel.fault_policy {
                FaultPolicy::Contain => PolicyName::Contain,
                FaultPolicy::Halt => PolicyName::Halt,
            },
            trusted_rescreen: kernel.trusted_rescreen,
            admission: kernel.admission,
            regions: None,
        }
    }
}

impl SimConfig {
    /// Read `path`, or fall back to the defaults when no file is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        log::info!("loaded {}", path.display());
        Ok(config)
    }

    pub fn kernel_config(&self) -> KernelConfig {
        KernelConfig {
            fault_policy: self.fault_policy.into(),
            trusted_rescreen: self.trusted_rescreen,
            admission: self.admission,
            ..KernelConfig::DEFAULT
        }
    }

    pub fn regions(&self) -> &[RegionDescriptor] {
        match &self.regions {
            Some(regions) => regions,
            None => &DEFAULT_REGIONS,
        }
    }
}
