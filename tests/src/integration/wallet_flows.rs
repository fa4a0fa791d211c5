//! # Wallet Flows
//!
//! Wallet files across close and reopen, and wallets as the signing
//! identity of devnet verifiers.

#[cfg(test)]
mod tests {
    use super::super::harness::HEIGHT_BUDGET;
    use cs_01_consensus_messages::{MsgSigner, SignableMessage, VoteMsg};
    use cs_02_soft_wallet::{SoftWallet, WalletConfig, WalletError, WalletSigner, WalletStatus};
    use node_runtime::{Devnet, NodeConfig};
    use shared_types::{keccak256, Address};
    use std::sync::Arc;

    #[test]
    fn test_wallet_round_trip_keeps_first_account() {
        let home = tempfile::tempdir().unwrap();
        let path = home.path().join("w");
        let wallet = SoftWallet::new(WalletConfig::for_testing(home.path()));

        let mnemonic = wallet.establish(&path, "w", "12345678", "").unwrap();
        assert_eq!(mnemonic.split_whitespace().count(), 24);
        let first = wallet.accounts().unwrap()[0].address;

        wallet.close().unwrap();
        assert_eq!(wallet.status(), WalletStatus::Closed);

        wallet.open(&path, "w", "12345678").unwrap();
        assert_eq!(wallet.accounts().unwrap()[0].address, first);
    }

    #[test]
    fn test_wrong_password_is_rejected() {
        let home = tempfile::tempdir().unwrap();
        let path = home.path().join("w");
        let wallet = SoftWallet::new(WalletConfig::for_testing(home.path()));
        wallet.establish(&path, "w", "12345678", "").unwrap();
        wallet.close().unwrap();

        let result = wallet.open(&path, "w", "bad_pw");
        assert!(matches!(result, Err(WalletError::WalletPasswordNotValid)));
        assert_eq!(wallet.status(), WalletStatus::Closed);
    }

    #[test]
    fn test_wallet_signer_produces_valid_witness() {
        let home = tempfile::tempdir().unwrap();
        let wallet = Arc::new(SoftWallet::new(WalletConfig::for_testing(home.path())));
        wallet
            .establish(home.path().join("w"), "w", "12345678", "")
            .unwrap();
        let signer = WalletSigner::main_account(Arc::clone(&wallet)).unwrap();

        let vote = VoteMsg::pre_vote(3, 1, keccak256(b"block"))
            .sign_with(&signer)
            .unwrap();
        assert!(vote.valid().is_ok());
        assert_eq!(vote.signer(), Some(signer.address()));

        let mut forged = vote.clone();
        forged.round = 2;
        assert!(forged.valid().is_err());
    }

    #[tokio::test]
    async fn test_devnet_reopens_its_wallets() {
        let home = tempfile::tempdir().unwrap();
        let config = NodeConfig::for_testing(home.path());

        let first = Devnet::with_wallets(config.clone()).unwrap();
        let addresses: Vec<Address> = first.nodes().iter().map(|n| n.address()).collect();
        assert_eq!(addresses.len(), config.devnet.nodes);
        first.stop();
        drop(first);

        let second = Devnet::with_wallets(config).unwrap();
        let reopened: Vec<Address> = second.nodes().iter().map(|n| n.address()).collect();
        assert_eq!(reopened, addresses);
        second.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_backed_devnet_commits() {
        let home = tempfile::tempdir().unwrap();
        let devnet = Devnet::with_wallets(NodeConfig::for_testing(home.path())).unwrap();
        assert!(devnet.wallets().is_some());

        devnet.start();
        assert!(devnet.wait_for_height(2, HEIGHT_BUDGET).await);
        devnet.stop();
    }
}
