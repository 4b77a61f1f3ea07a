use crate::{
    aptos_client::{
        AptosClient,
        SignatureDto,
    },
    ledger::{
        Address,
        TransactionHash,
        WagerRequest,
        Wallet,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ed25519_dalek::{
    Signer,
    SigningKey,
};
use eth_keystore::decrypt_key;
use rpassword::prompt_password;
use std::path::{
    Path,
    PathBuf,
};
use tracing::info;

#[derive(Clone, Debug)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn from_path(raw: &str) -> Result<Self> {
        let path = PathBuf::from(shellexpand::tilde(raw).into_owned());
        if !path.is_file() {
            return Err(eyre!("Keystore file {} not found", path.display()));
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid keystore filename {:?}", path))?
            .to_owned();
        Ok(Self { name, path })
    }
}

pub fn unlock_key(descriptor: &WalletDescriptor) -> Result<SigningKey> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read wallet password")?;
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;
    signing_key_from_secret(&secret).wrap_err_with(|| {
        format!("Wallet '{}' contained unsupported key material", descriptor.name)
    })
}

pub fn signing_key_from_secret(secret: &[u8]) -> Result<SigningKey> {
    let bytes: [u8; 32] = secret
        .try_into()
        .map_err(|_| eyre!("expected a 32-byte ed25519 secret, got {} bytes", secret.len()))?;
    Ok(SigningKey::from_bytes(&bytes))
}

/// A decrypted ed25519 account that signs wagers locally and submits them
/// through the fullnode.
pub struct KeystoreWallet {
    client: AptosClient,
    address: Address,
    key: SigningKey,
}

impl KeystoreWallet {
    pub fn new(client: AptosClient, address: Address, key: SigningKey) -> Self {
        Self {
            client,
            address,
            key,
        }
    }

    pub fn open(client: AptosClient, address: Address, keystore: &Path) -> Result<Self> {
        let descriptor = WalletDescriptor::from_path(&keystore.to_string_lossy())?;
        let key = unlock_key(&descriptor)?;
        info!(wallet = %descriptor.name, %address, "wallet unlocked");
        Ok(Self::new(client, address, key))
    }

    pub fn sign(&self, message: &[u8]) -> SignatureDto {
        let signature = self.key.sign(message);
        SignatureDto::ed25519(
            self.key.verifying_key().as_bytes(),
            &signature.to_bytes(),
        )
    }
}

impl Wallet for KeystoreWallet {
    fn address(&self) -> Option<Address> {
        Some(self.address.clone())
    }

    async fn submit(&self, request: &WagerRequest) -> Result<TransactionHash> {
        if request.sender != self.address {
            return Err(eyre!(
                "wager sender {} does not match unlocked wallet {}",
                request.sender,
                self.address
            ));
        }
        let mut submission = self.client.prepare_submission(request).await?;
        let message = self.client.signing_message(&submission).await?;
        submission.signature = Some(self.sign(&message));
        self.client.submit_signed(&submission).await
    }
}

/// Wallet connection for the session; a client started without a keystore
/// is disconnected and cannot place wagers.
pub enum Session {
    Connected(KeystoreWallet),
    Disconnected,
}

impl Wallet for Session {
    fn address(&self) -> Option<Address> {
        match self {
            Session::Connected(wallet) => wallet.address(),
            Session::Disconnected => None,
        }
    }

    async fn submit(&self, request: &WagerRequest) -> Result<TransactionHash> {
        match self {
            Session::Connected(wallet) => wallet.submit(request).await,
            Session::Disconnected => Err(eyre!("wallet not connected")),
        }
    }
}
