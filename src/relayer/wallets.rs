use crate::chain::Wallet;
use std::collections::{HashMap, HashSet};

/**
   The wallets each test's relayer signs with, by test name.

   A transaction signed by one of these races with the relayer's own
   transactions and may fail on account sequence mismatches.
*/
#[derive(Debug, Clone, Default)]
pub struct RelayerWallets {
    wallets: HashMap<String, HashSet<Wallet>>,
}

impl RelayerWallets {
    pub fn add_relayer(&mut self, test_name: &str, wallets: impl IntoIterator<Item = Wallet>) {
        self.wallets
            .entry(test_name.to_owned())
            .or_default()
            .extend(wallets);
    }

    /// Whether `address` belongs to the relayer of `test_name`.
    pub fn contains_relayer(&self, test_name: &str, address: &str) -> bool {
        self.wallets
            .get(test_name)
            .is_some_and(|wallets| wallets.iter().any(|wallet| wallet.address == address))
    }

    pub fn remove(&mut self, test_name: &str) {
        self.wallets.remove(test_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(address: &str) -> Wallet {
        Wallet {
            key_name: "relayer-0".to_owned(),
            address: address.to_owned(),
            mnemonic: String::new(),
        }
    }

    #[test]
    fn test_contains_relayer() {
        let mut wallets = RelayerWallets::default();
        wallets.add_relayer("TestMsgTransfer", [wallet("cosmos1a"), wallet("cosmos1b")]);

        assert!(wallets.contains_relayer("TestMsgTransfer", "cosmos1b"));
        assert!(!wallets.contains_relayer("TestMsgTransfer", "cosmos1c"));
        assert!(!wallets.contains_relayer("TestClientUpdate", "cosmos1a"));

        wallets.remove("TestMsgTransfer");
        assert!(!wallets.contains_relayer("TestMsgTransfer", "cosmos1a"));
    }
}
