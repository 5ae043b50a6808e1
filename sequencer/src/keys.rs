//! Signing material.
//!
//! Keys are loaded once at startup from a key file or an environment
//! variable; addresses derive deterministically in source order, which is
//! what makes the pool's address listing stable across restarts.

use crate::error::KeyError;
use core_logic::config::WalletSource;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

pub struct KeyStore {
    signers: HashMap<Address, LocalWallet>,
    /// Source order, duplicates removed.
    addresses: Vec<Address>,
}

impl KeyStore {
    pub fn load(source: &WalletSource, chain_id: u64) -> Result<Self, KeyError> {
        let raw_keys = match source {
            WalletSource::File { path } => {
                if !Path::new(path).exists() {
                    return Err(KeyError::FileNotFound { path: path.clone() });
                }
                let content = std::fs::read_to_string(path).map_err(|e| KeyError::Io {
                    path: path.clone(),
                    msg: e.to_string(),
                })?;
                content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            }
            WalletSource::Env { key } => {
                let raw =
                    std::env::var(key).map_err(|_| KeyError::MissingEnv { key: key.clone() })?;
                raw.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            }
        };

        let mut signers = HashMap::new();
        let mut addresses = Vec::new();
        for (index, raw) in raw_keys.iter().enumerate() {
            let wallet: LocalWallet = raw
                .trim_start_matches("0x")
                .parse()
                .map_err(|e| KeyError::InvalidKey {
                    index,
                    reason: format!("{e}"),
                })?;
            let wallet = wallet.with_chain_id(chain_id);
            let address = wallet.address();
            if signers.insert(address, wallet).is_some() {
                warn!("duplicate signing key for {:#x}, keeping one", address);
                continue;
            }
            addresses.push(address);
        }

        if addresses.is_empty() {
            return Err(KeyError::Empty);
        }
        info!("Loaded {} signing keys", addresses.len());

        Ok(Self { signers, addresses })
    }

    /// All managed addresses, in stable source order.
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn signer(&self, address: &Address) -> Option<&LocalWallet> {
        self.signers.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.signers.contains_key(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Throwaway test vectors, never funded.
    const KEY_A: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
    const KEY_B: &str = "0000000000000000000000000000000000000000000000000000000000000002";

    #[test]
    fn test_load_from_file_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# test keys").unwrap();
        writeln!(file, "{}", KEY_A).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{}", KEY_B).unwrap();

        let keys = KeyStore::load(
            &WalletSource::File {
                path: file.path().to_str().unwrap().to_string(),
            },
            1,
        )
        .unwrap();

        assert_eq!(keys.addresses().len(), 2);
        // Key 0x...01 derives the well-known address below.
        assert_eq!(
            format!("{:#x}", keys.addresses()[0]),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
        assert!(keys.contains(&keys.addresses()[1]));
        assert!(keys.signer(&keys.addresses()[0]).is_some());
    }

    #[test]
    fn test_duplicate_keys_collapse() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", KEY_A).unwrap();
        writeln!(file, "{}", KEY_A).unwrap();

        let keys = KeyStore::load(
            &WalletSource::File {
                path: file.path().to_str().unwrap().to_string(),
            },
            1,
        )
        .unwrap();
        assert_eq!(keys.addresses().len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let result = KeyStore::load(
            &WalletSource::File {
                path: "/nonexistent/keys.txt".to_string(),
            },
            1,
        );
        assert!(matches!(result, Err(KeyError::FileNotFound { .. })));
    }

    #[test]
    fn test_invalid_key_reports_position() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", KEY_A).unwrap();
        writeln!(file, "not-a-key").unwrap();

        let result = KeyStore::load(
            &WalletSource::File {
                path: file.path().to_str().unwrap().to_string(),
            },
            1,
        );
        assert!(matches!(result, Err(KeyError::InvalidKey { index: 1, .. })));
    }
}
