//! BIP32 derivation paths.

use super::{WalletError, WalletResult};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt;
use std::str::FromStr;

/// Offset of hardened child indices.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Prefix every wallet account is derived under.
pub const DEFAULT_DERIVED_PATH: &str = "m/44'/709394'/0'/0";

/// Component count of [`DEFAULT_DERIVED_PATH`].
pub const DEFAULT_DERIVED_PATH_LENGTH: usize = 4;

/// Counter key of the default account in `DerivedPathIndex`.
pub const DEFAULT_ACCOUNT_VALUE: u32 = 0;

/// Index of the segment keying the per-account counter.
pub const ACCOUNT_VALUE_INDEX: usize = 2;

/// Index given to the account created with a new wallet.
pub const ADDRESS_INDEX_START_VALUE: u32 = 1;

/// Sequence of child indices below the master key; hardened indices carry
/// [`HARDENED_OFFSET`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    pub fn new(indices: Vec<u32>) -> Self {
        Self(indices)
    }

    /// The parsed [`DEFAULT_DERIVED_PATH`].
    pub fn default_prefix() -> Self {
        Self(vec![
            44 + HARDENED_OFFSET,
            709394 + HARDENED_OFFSET,
            HARDENED_OFFSET,
            0,
        ])
    }

    /// Path naming only the master key (`"m"`).
    pub fn is_master(&self) -> bool {
        self.0.is_empty()
    }

    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, index: u32) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Account paths are the default prefix plus one address index, and must
    /// agree with the prefix up to the account segment.
    pub fn is_valid_account_path(&self) -> bool {
        let prefix = Self::default_prefix();
        let shared = DEFAULT_DERIVED_PATH_LENGTH - 1;
        self.0.len() == DEFAULT_DERIVED_PATH_LENGTH + 1 && self.0[..shared] == prefix.0[..shared]
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for index in &self.0 {
            if *index >= HARDENED_OFFSET {
                write!(f, "/{}'", index - HARDENED_OFFSET)?;
            } else {
                write!(f, "/{}", index)?;
            }
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = WalletError;

    /// Parses `m/44'/709394'/0'/0/1`; an empty string parses like `"m"`.
    fn from_str(s: &str) -> WalletResult<Self> {
        let s = s.trim();
        if s.is_empty() || s == "m" {
            return Ok(Self::default());
        }
        let rest = s
            .strip_prefix("m/")
            .ok_or(WalletError::InvalidDerivedPath)?;

        let mut indices = Vec::new();
        for component in rest.split('/') {
            let (digits, hardened) = match component
                .strip_suffix('\'')
                .or_else(|| component.strip_suffix('h'))
            {
                Some(d) => (d, true),
                None => (component, false),
            };
            let value: u32 = digits
                .parse()
                .map_err(|_| WalletError::InvalidDerivedPath)?;
            if value >= HARDENED_OFFSET {
                return Err(WalletError::InvalidDerivedPath);
            }
            indices.push(if hardened { value + HARDENED_OFFSET } else { value });
        }
        Ok(Self(indices))
    }
}
