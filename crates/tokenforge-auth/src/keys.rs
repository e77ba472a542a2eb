//! RSA signing key management
//!
//! [`KeyStore`] owns the single active RSA keypair for the lifetime of the
//! process. The key is either generated on startup or loaded from a PEM file;
//! a configured path that does not exist yet is populated with a freshly
//! generated key, so one storage path always yields the same logical key
//! across restarts.
//!
//! The key id (`kid`) is the SHA-256 hex digest of the SubjectPublicKeyInfo
//! PEM encoding of the public key. It is computed once at construction.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::{KeyStoreConfig, MIN_KEY_BITS};
use crate::error::{AuthError, AuthResult};
use crate::jwt::jwks::{Jwk, JwkSet};

/// Owner of the active RS256 signing key
pub struct KeyStore {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    signing_key: SigningKey<Sha256>,
    verifying_key: VerifyingKey<Sha256>,
    kid: String,
}

// Manual Debug impl so key material never reaches logs
impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("kid", &self.kid)
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

impl KeyStore {
    /// Build a key store around an existing private key
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyLoad`] if the modulus is smaller than 2048 bits
    /// or the public key cannot be encoded.
    pub fn from_private_key(private_key: RsaPrivateKey) -> AuthResult<Self> {
        let bits = private_key.size() * 8;
        if bits < MIN_KEY_BITS {
            return Err(AuthError::KeyLoad(format!(
                "RSA key has {bits} bits, at least {MIN_KEY_BITS} required"
            )));
        }

        let public_key = RsaPublicKey::from(&private_key);
        let kid = compute_kid(&public_key)?;

        Ok(Self {
            signing_key: SigningKey::<Sha256>::new(private_key.clone()),
            verifying_key: VerifyingKey::<Sha256>::new(public_key.clone()),
            private_key,
            public_key,
            kid,
        })
    }

    /// Generate a fresh in-memory key
    ///
    /// Key generation is CPU-bound (seconds for 4096 bits); do it once at startup.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if `bits` is below 2048, or
    /// [`AuthError::KeyLoad`] if generation fails.
    pub fn generate(bits: usize) -> AuthResult<Self> {
        if bits < MIN_KEY_BITS {
            return Err(AuthError::invalid_config(format!(
                "key_bits must be at least {MIN_KEY_BITS}, got {bits}"
            )));
        }

        debug!(bits, "Generating RSA signing key");
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| AuthError::KeyLoad(format!("Failed to generate RSA key: {e}")))?;

        let store = Self::from_private_key(private_key)?;
        info!(kid = %store.kid, bits, "Generated RSA signing key");
        Ok(store)
    }

    /// Parse an unencrypted PEM private key (PKCS#8, or PKCS#1 `RSA PRIVATE KEY`)
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyLoad`] if the PEM is not an unencrypted RSA key.
    pub fn from_pem(pem: &str) -> AuthResult<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|pkcs8_err| {
                RsaPrivateKey::from_pkcs1_pem(pem).map_err(|_| pkcs8_err.to_string())
            })
            .map_err(|e| AuthError::KeyLoad(format!("Unparsable PEM private key: {e}")))?;

        Self::from_private_key(private_key)
    }

    /// Load a PEM private key from `path`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Io`] if the file cannot be read and
    /// [`AuthError::KeyLoad`] if it cannot be parsed.
    pub fn load(path: &Path) -> AuthResult<Self> {
        let pem = Zeroizing::new(fs::read_to_string(path)?);
        let store = Self::from_pem(&pem).map_err(|e| match e {
            AuthError::KeyLoad(reason) => {
                AuthError::KeyLoad(format!("{}: {reason}", path.display()))
            }
            other => other,
        })?;

        info!(path = %path.display(), kid = %store.kid, "Loaded RSA signing key");
        Ok(store)
    }

    /// Load the configured key, generating (and persisting) it when absent
    ///
    /// - `key_path` set and present: parse it
    /// - `key_path` set and absent: generate, then persist as PKCS#8 PEM
    /// - no `key_path`: generate an ephemeral key
    ///
    /// Persistence goes through a same-directory temporary file that is linked
    /// into place only if the target still does not exist. When two instances
    /// race on the same path, the loser discards its key and loads the
    /// winner's, so both end up with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyLoad`] for an unparsable key file,
    /// [`AuthError::InvalidConfig`] for an undersized `key_bits` and
    /// [`AuthError::Io`] for filesystem failures.
    pub fn load_or_generate(config: &KeyStoreConfig) -> AuthResult<Self> {
        match config.key_path.as_deref() {
            None => Self::generate(config.key_bits),
            Some(path) if path.exists() => Self::load(path),
            Some(path) => Self::generate(config.key_bits)?.persist_or_adopt(path),
        }
    }

    fn persist_or_adopt(self, path: &Path) -> AuthResult<Self> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let pem = self.private_key_pem()?;
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        staged.write_all(pem.as_bytes())?;
        staged.as_file().sync_all()?;

        match staged.persist_noclobber(path) {
            Ok(_) => {
                info!(path = %path.display(), kid = %self.kid, "Persisted RSA signing key");
                Ok(self)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                warn!(
                    path = %path.display(),
                    "Signing key was created concurrently, adopting the existing key"
                );
                Self::load(path)
            }
            Err(e) => Err(AuthError::Io(e.error)),
        }
    }

    /// Deterministic key id: SHA-256 hex of the SPKI PEM public key
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Modulus size in bits
    pub fn bits(&self) -> usize {
        self.public_key.size() * 8
    }

    /// The public half of the keypair
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Sign `data` with RSASSA-PKCS1-v1_5 over SHA-256
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if the RSA operation fails.
    pub fn sign(&self, data: &[u8]) -> AuthResult<Vec<u8>> {
        let signature = self
            .signing_key
            .try_sign(data)
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        Ok(signature.to_vec())
    }

    /// Verify an RSASSA-PKCS1-v1_5/SHA-256 signature; never errors
    pub fn verify(&self, signature: &[u8], data: &[u8]) -> bool {
        match Signature::try_from(signature) {
            Ok(signature) => self.verifying_key.verify(data, &signature).is_ok(),
            Err(_) => false,
        }
    }

    /// Public key as a JWK (`kty`, `kid`, `use`, `n`, `e`)
    pub fn jwk(&self) -> Jwk {
        Jwk::rsa(
            self.kid.clone(),
            URL_SAFE_NO_PAD.encode(self.public_key.n().to_bytes_be()),
            URL_SAFE_NO_PAD.encode(self.public_key.e().to_bytes_be()),
        )
    }

    /// Single-key JWKS document for this key
    pub fn jwks(&self) -> JwkSet {
        JwkSet {
            keys: vec![self.jwk()],
        }
    }

    /// Private key as unencrypted PKCS#8 PEM
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyLoad`] if encoding fails.
    pub fn private_key_pem(&self) -> AuthResult<Zeroizing<String>> {
        self.private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AuthError::KeyLoad(format!("Failed to encode private key: {e}")))
    }

    /// Public key as SubjectPublicKeyInfo PEM
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyLoad`] if encoding fails.
    pub fn public_key_pem(&self) -> AuthResult<String> {
        public_key_pem(&self.public_key)
    }
}

fn public_key_pem(public_key: &RsaPublicKey) -> AuthResult<String> {
    public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| AuthError::KeyLoad(format!("Failed to encode public key: {e}")))
}

fn compute_kid(public_key: &RsaPublicKey) -> AuthResult<String> {
    let pem = public_key_pem(public_key)?;
    Ok(hex::encode(Sha256::digest(pem.as_bytes())))
}
