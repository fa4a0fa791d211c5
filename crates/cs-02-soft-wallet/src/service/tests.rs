use super::*;
use crate::adapters::WalletSigner;
use crate::config::WalletManagerConfig;
use crate::DEFAULT_DERIVED_PATH;
use async_trait::async_trait;
use cs_01_consensus_messages::{NewRoundMsg, SignableMessage};
use parking_lot::Mutex;
use shared_crypto::recover_address;
use shared_types::{keccak256, ChainResult};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

const PASSWORD: &str = "password123";

// =============================================================================
// Mock implementations for testing
// =============================================================================

#[derive(Default)]
struct MockAddressInfoReader {
    nonces: Mutex<HashMap<Address, u64>>,
    balances: HashMap<Address, U256>,
    broken: bool,
}

impl MockAddressInfoReader {
    fn with_used(accounts: &[(Address, u64, u64)]) -> Self {
        Self {
            nonces: Mutex::new(accounts.iter().map(|(a, n, _)| (*a, *n)).collect()),
            balances: accounts
                .iter()
                .map(|(a, _, b)| (*a, U256::from(*b)))
                .collect(),
            broken: false,
        }
    }

    fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    fn set_nonce(&self, address: Address, nonce: u64) {
        self.nonces.lock().insert(address, nonce);
    }
}

#[async_trait]
impl AddressInfoReader for MockAddressInfoReader {
    async fn current_balance(&self, address: &Address) -> U256 {
        self.balances.get(address).copied().unwrap_or_default()
    }

    async fn get_transaction_nonce(&self, address: &Address) -> ChainResult<u64> {
        if self.broken {
            return Err(ChainError::Other("state unavailable".to_string()));
        }
        self.nonces
            .lock()
            .get(address)
            .copied()
            .ok_or(ChainError::AccountNotExist)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

struct Fixture {
    _home: TempDir,
    wallet: SoftWallet,
    path: PathBuf,
}

fn fixture() -> Fixture {
    let home = TempDir::new().unwrap();
    let config = WalletConfig::for_testing(home.path());
    let path = home.path().join("wallets").join("CSWallet");
    Fixture {
        wallet: SoftWallet::new(config),
        path,
        _home: home,
    }
}

fn established() -> (Fixture, String) {
    let fx = fixture();
    let mnemonic = fx.wallet.establish(&fx.path, "main", PASSWORD, "").unwrap();
    let mnemonic = mnemonic.to_string();
    (fx, mnemonic)
}

fn first_account(wallet: &SoftWallet) -> Account {
    wallet.accounts().unwrap()[0]
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_establish_close_open_roundtrip() {
    let (fx, mnemonic) = established();
    assert_eq!(mnemonic.split_whitespace().count(), 24);
    assert_eq!(fx.wallet.status(), WalletStatus::Opened);

    let before = fx.wallet.accounts().unwrap();
    assert_eq!(before.len(), 1);

    fx.wallet.close().unwrap();
    assert_eq!(fx.wallet.status(), WalletStatus::Closed);

    fx.wallet.open(&fx.path, "main", PASSWORD).unwrap();
    assert_eq!(fx.wallet.accounts().unwrap(), before);

    let hash = keccak256(b"after reopen");
    let signature = fx.wallet.sign_hash(&before[0], &hash).unwrap();
    assert_eq!(recover_address(&hash, &signature).unwrap(), before[0].address);
}

#[test]
fn test_open_with_wrong_password() {
    let (fx, _) = established();
    fx.wallet.close().unwrap();

    assert_eq!(
        fx.wallet.open(&fx.path, "main", "password124"),
        Err(WalletError::WalletPasswordNotValid)
    );
    assert_eq!(fx.wallet.status(), WalletStatus::Closed);
}

#[test]
fn test_open_with_off_policy_password_is_not_valid() {
    let (fx, _) = established();
    fx.wallet.close().unwrap();

    for password in ["bad_pw", "bad pw"] {
        assert_eq!(
            fx.wallet.open(&fx.path, "main", password),
            Err(WalletError::WalletPasswordNotValid)
        );
    }
    assert_eq!(fx.wallet.status(), WalletStatus::Closed);
}

#[test]
fn test_open_missing_file() {
    let fx = fixture();
    assert_eq!(
        fx.wallet.open(&fx.path, "main", PASSWORD),
        Err(WalletError::WalletFileNotExist)
    );
    assert_eq!(
        fx.wallet.open(&fx.path, "main", ""),
        Err(WalletError::PasswordIsNil)
    );
}

#[test]
fn test_establish_refuses_existing_file() {
    let (fx, _) = established();
    let other = SoftWallet::new(fx.wallet.config().clone());

    assert_eq!(
        other.establish(&fx.path, "again", PASSWORD, "").map(|_| ()),
        Err(WalletError::WalletFileExist)
    );
}

#[test]
fn test_establish_policies() {
    let fx = fixture();
    assert_eq!(
        fx.wallet
            .establish("/definitely/not/home/CSWallet", "main", PASSWORD, "")
            .map(|_| ()),
        Err(WalletError::WalletPathError)
    );
    assert_eq!(
        fx.wallet.establish(&fx.path, "main", "short", "").map(|_| ()),
        Err(WalletError::PasswordOrPassPhraseIllegal)
    );
    assert!(!fx.path.exists());
}

#[test]
fn test_wallet_file_is_not_plaintext() {
    let (fx, _) = established();
    let account = first_account(&fx.wallet);

    let raw = std::fs::read_to_string(&fx.path).unwrap();
    assert!(raw.contains("\"Cipher\""));
    assert!(!raw.contains(&account.address.to_hex()));
}

#[test]
fn test_closed_wallet_refuses_operations() {
    let wallet = fixture().wallet;
    let account = Account::new(Address::default());

    assert_eq!(wallet.accounts(), Err(WalletError::WalletNotOpen));
    assert_eq!(wallet.identifier(), Err(WalletError::WalletNotOpen));
    assert_eq!(wallet.close(), Err(WalletError::WalletNotOpen));
    assert_eq!(
        wallet.sign_hash(&account, &keccak256(b"x")),
        Err(WalletError::WalletNotOpen)
    );
    assert_eq!(
        wallet.derive(&DerivationPath::default(), true),
        Err(WalletError::WalletNotOpen)
    );
}

// =============================================================================
// Derivation
// =============================================================================

#[test]
fn test_derive_default_path_advances_index() {
    let (fx, _) = established();
    let first = first_account(&fx.wallet);

    let second = fx.wallet.derive(&DerivationPath::default(), true).unwrap();
    let third = fx.wallet.derive(&DerivationPath::default(), true).unwrap();

    assert_ne!(second, first);
    assert_ne!(third, second);
    assert_eq!(fx.wallet.accounts().unwrap(), vec![first, second, third]);

    // Persisted
    fx.wallet.close().unwrap();
    fx.wallet.open(&fx.path, "main", PASSWORD).unwrap();
    assert_eq!(fx.wallet.accounts().unwrap().len(), 3);
    let fourth = fx.wallet.derive(&DerivationPath::default(), false).unwrap();
    assert!(![first, second, third].contains(&fourth));
}

#[test]
fn test_derive_explicit_path_matches_default() {
    let (fx, _) = established();
    let first = first_account(&fx.wallet);

    let explicit: DerivationPath = "m/44'/709394'/0'/0/1".parse().unwrap();
    assert_eq!(fx.wallet.derive(&explicit, true).unwrap(), first);
    assert_eq!(fx.wallet.accounts().unwrap().len(), 1);

    let by_default = fx.wallet.derive(&DerivationPath::default(), true).unwrap();
    let explicit: DerivationPath = "m/44'/709394'/0'/0/2".parse().unwrap();
    assert_eq!(fx.wallet.derive(&explicit, true).unwrap(), by_default);
}

#[test]
fn test_derive_prefix_uses_next_index() {
    let (fx, _) = established();
    let prefix: DerivationPath = DEFAULT_DERIVED_PATH.parse().unwrap();

    let derived = fx.wallet.derive(&prefix, true).unwrap();
    let expected = fx
        .wallet
        .derive(&"m/44'/709394'/0'/0/2".parse().unwrap(), false)
        .unwrap();
    assert_eq!(derived, expected);
}

#[test]
fn test_derive_rejects_foreign_paths() {
    let (fx, _) = established();
    for path in ["m/44'/60'/0'/0/1", "m/44'/709394'/0'", "m/44'/709394'/0'/0/1/2"] {
        assert_eq!(
            fx.wallet.derive(&path.parse().unwrap(), true),
            Err(WalletError::InvalidDerivedPath),
            "{path}"
        );
    }
    assert_eq!(fx.wallet.accounts().unwrap().len(), 1);
}

#[test]
fn test_derive_without_save_does_not_add() {
    let (fx, _) = established();
    let account = fx.wallet.derive(&DerivationPath::default(), false).unwrap();

    assert!(!fx.wallet.contains(&account).unwrap());
    assert_eq!(
        fx.wallet.sign_hash(&account, &keccak256(b"x")),
        Err(WalletError::InvalidAddress)
    );
}

// =============================================================================
// Signer
// =============================================================================

#[test]
fn test_sign_tx_recovers_sender() {
    let (fx, _) = established();
    let account = first_account(&fx.wallet);
    let tx = Transaction {
        nonce: 1,
        to: Some(Address::default()),
        value: U256::from(10),
        gas_price: U256::from(1),
        gas_limit: 21_000,
        data: vec![],
    };

    let signed = fx.wallet.sign_tx(&account, tx.clone(), 1600).unwrap();

    assert_eq!(signed.from, account.address);
    assert_eq!(
        recover_address(&tx.signing_hash(1600), &signed.signature).unwrap(),
        account.address
    );
}

#[test]
fn test_vrf_eval_verifies() {
    let (fx, _) = established();
    let account = first_account(&fx.wallet);

    let (index, proof) = fx.wallet.vrf_eval(&account, b"round seed").unwrap();

    assert_eq!(
        fx.wallet.vrf_verify(&account, b"round seed", &proof).unwrap(),
        index
    );
    assert!(fx.wallet.vrf_verify(&account, b"other seed", &proof).is_err());
}

#[test]
fn test_exported_secret_matches_public_key() {
    let (fx, _) = established();
    let account = first_account(&fx.wallet);

    let secret = fx.wallet.get_sk(&account.address).unwrap();
    let keypair = Secp256k1KeyPair::from_bytes(&secret).unwrap();

    assert_eq!(keypair.address(), account.address);
    assert_eq!(
        keypair.signing_key().verifying_key(),
        &fx.wallet.get_pk(&account).unwrap()
    );
}

#[test]
fn test_wallet_signer_witness_validates() {
    let (fx, _) = established();
    let wallet = Arc::new(fx.wallet);
    let signer = WalletSigner::main_account(Arc::clone(&wallet)).unwrap();

    let msg = NewRoundMsg::new(4, 2).sign_with(&signer).unwrap();

    assert_eq!(msg.valid(), Ok(()));
    assert_eq!(msg.signer(), Some(signer.account().address));

    wallet.close().unwrap();
    assert!(NewRoundMsg::new(4, 2).sign_with(&signer).is_err());
}

// =============================================================================
// Restore and nonces
// =============================================================================

#[tokio::test]
async fn test_restore_discovers_used_accounts() {
    let (fx, mnemonic) = established();
    let first = first_account(&fx.wallet);
    let second = fx.wallet.derive(&DerivationPath::default(), true).unwrap();
    let third = fx.wallet.derive(&DerivationPath::default(), true).unwrap();
    let unused = fx.wallet.derive(&DerivationPath::default(), true).unwrap();

    let reader = MockAddressInfoReader::with_used(&[(second.address, 5, 100), (third.address, 7, 0)]);
    let restored = SoftWallet::new(fx.wallet.config().clone());
    let restored_path = fx.path.with_file_name("Restored");

    restored
        .restore_wallet(&restored_path, "restored", PASSWORD, "", &mnemonic, &reader)
        .await
        .unwrap();

    let accounts = restored.accounts().unwrap();
    assert_eq!(accounts, vec![first, second, third]);
    assert!(!accounts.contains(&unused));
    assert_eq!(restored.get_address_nonce(&second.address).unwrap(), 5);
    assert_eq!(restored.balance(&second.address).unwrap(), U256::from(100));

    let next = restored.derive(&DerivationPath::default(), true).unwrap();
    assert_eq!(next, unused);
}

#[tokio::test]
async fn test_restore_aborts_on_reader_failure() {
    let (fx, mnemonic) = established();
    let restored = SoftWallet::new(fx.wallet.config().clone());
    let restored_path = fx.path.with_file_name("Restored");

    let result = restored
        .restore_wallet(
            &restored_path,
            "restored",
            PASSWORD,
            "",
            &mnemonic,
            &MockAddressInfoReader::broken(),
        )
        .await;

    assert!(matches!(result, Err(WalletError::Chain(ChainError::Other(_)))));
    assert_eq!(restored.status(), WalletStatus::Closed);
    assert!(!restored_path.exists());
}

#[tokio::test]
async fn test_restore_rejects_bad_mnemonic() {
    let fx = fixture();
    let result = fx
        .wallet
        .restore_wallet(
            &fx.path,
            "main",
            PASSWORD,
            "",
            "not a valid mnemonic",
            &MockAddressInfoReader::default(),
        )
        .await;

    assert!(matches!(result, Err(WalletError::InvalidMnemonic(_))));
}

#[tokio::test]
async fn test_padding_address_nonce() {
    let (fx, _) = established();
    let account = first_account(&fx.wallet);
    let reader = MockAddressInfoReader::with_used(&[(account.address, 11, 0)]);

    assert_eq!(fx.wallet.get_address_nonce(&account.address).unwrap(), 0);
    fx.wallet.padding_address_nonce(&reader).await.unwrap();
    assert_eq!(fx.wallet.get_address_nonce(&account.address).unwrap(), 11);

    fx.wallet.set_address_nonce(&account.address, 12).unwrap();
    assert_eq!(fx.wallet.get_address_nonce(&account.address).unwrap(), 12);
}

// =============================================================================
// Manager
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_manager_refreshes_nonces() {
    let (fx, _) = established();
    let account = first_account(&fx.wallet);
    let identifier = fx.wallet.identifier().unwrap();
    let wallet = Arc::new(fx.wallet);

    let reader = Arc::new(MockAddressInfoReader::with_used(&[(account.address, 3, 0)]));
    let manager = Arc::new(
        WalletManager::new(
            WalletManagerConfig::for_testing(),
            reader.clone(),
            vec![Arc::clone(&wallet)],
        )
        .unwrap(),
    );

    assert_eq!(
        manager.main_account(),
        Err(WalletError::WalletManagerNotRunning)
    );
    manager.start();
    assert_eq!(manager.main_account().unwrap(), account);

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert_eq!(wallet.get_address_nonce(&account.address).unwrap(), 3);

    reader.set_nonce(account.address, 4);
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert_eq!(wallet.get_address_nonce(&account.address).unwrap(), 4);

    assert!(Arc::ptr_eq(&manager.find_wallet(&identifier).unwrap(), &wallet));
    assert!(Arc::ptr_eq(
        &manager.find_wallet_by_address(&account.address).unwrap(),
        &wallet
    ));
    assert_eq!(
        manager.find_wallet_by_address(&Address::default()).map(|_| ()),
        Err(WalletError::NotFindWallet)
    );

    manager.stop();
    assert_eq!(wallet.status(), WalletStatus::Closed);
    assert_eq!(manager.list_identifiers().unwrap(), vec![]);
}

#[test]
fn test_manager_deduplicates_wallets() {
    let (fx, _) = established();
    let wallet = Arc::new(fx.wallet);
    let manager = WalletManager::new(
        WalletManagerConfig::default(),
        Arc::new(MockAddressInfoReader::default()),
        vec![Arc::clone(&wallet)],
    )
    .unwrap();

    manager.add_wallet(Arc::clone(&wallet)).unwrap();
    assert_eq!(manager.list_identifiers().unwrap().len(), 1);

    manager.remove_wallet(&wallet.identifier().unwrap());
    assert!(manager.list_identifiers().unwrap().is_empty());
}
