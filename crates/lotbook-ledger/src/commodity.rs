use serde::{Deserialize, Serialize};

/// Namespace used for ISO currencies.
pub const CURRENCY_NAMESPACE: &str = "CURRENCY";

/// A currency or a traded security.
///
/// `fraction` is the smallest unit the commodity is counted in (100 for
/// cents, 1 for whole shares).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commodity {
    pub namespace: String,
    pub mnemonic: String,
    #[serde(default = "default_fraction")]
    pub fraction: u64,
}

fn default_fraction() -> u64 {
    100
}

impl Commodity {
    pub fn currency<S: Into<String>>(mnemonic: S, fraction: u64) -> Self {
        Self {
            namespace: CURRENCY_NAMESPACE.to_string(),
            mnemonic: mnemonic.into(),
            fraction,
        }
    }

    pub fn security<N: Into<String>, M: Into<String>>(namespace: N, mnemonic: M, fraction: u64) -> Self {
        Self {
            namespace: namespace.into(),
            mnemonic: mnemonic.into(),
            fraction,
        }
    }

    /// `namespace::mnemonic`, the key of per-currency metadata.
    pub fn unique_name(&self) -> String {
        format!("{}::{}", self.namespace, self.mnemonic)
    }

    /// Same namespace and mnemonic; the fraction is a display detail.
    pub fn equiv(&self, other: &Commodity) -> bool {
        self.namespace == other.namespace && self.mnemonic == other.mnemonic
    }

    pub fn is_currency(&self) -> bool {
        self.namespace == CURRENCY_NAMESPACE
    }
}
