//! Detached minisign signatures over the release manifest

use minisign::{PublicKey, PublicKeyBox, SecretKey, SecretKeyBox, SignatureBox};
use plugsmith_core::error::{Error, IoResultExt, Result};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Secret key plus the public key derived from it
pub struct ReleaseSigner {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl ReleaseSigner {
    pub fn new(secret_key: SecretKey) -> Result<Self> {
        let public_key = PublicKey::from_secret_key(&secret_key)
            .map_err(|e| Error::signing(format!("failed to derive public key: {}", e)))?;
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Load an encrypted secret key file as written by `minisign -G`
    pub fn from_file(path: &Path, password: &str) -> Result<Self> {
        let text = fs::read_to_string(path).with_path(path)?;
        let secret_key = SecretKeyBox::from_string(&text)
            .and_then(|sk| sk.into_secret_key(Some(password.to_string())))
            .map_err(|e| {
                Error::signing(format!("failed to load secret key {}: {}", path.display(), e))
            })?;
        debug!("Loaded minisign secret key from {}", path.display());
        Self::new(secret_key)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Sign `bytes` and return the `.minisig` file contents
    pub fn sign(&self, bytes: &[u8]) -> Result<String> {
        let signature = minisign::sign(None, &self.secret_key, Cursor::new(bytes), None, None)
            .map_err(|e| Error::signing(format!("failed to sign: {}", e)))?;
        Ok(signature.into_string())
    }
}

/// Load a public key from a `.pub` file or an inline base64 key
pub fn load_public_key(path_or_key: &str) -> Result<PublicKey> {
    let path = Path::new(path_or_key);
    if path.is_file() {
        let text = fs::read_to_string(path).with_path(path)?;
        return parse_public_key(&text)
            .map_err(|e| Error::signing(format!("invalid public key {}: {}", path.display(), e)));
    }
    parse_public_key(path_or_key).map_err(|e| Error::signing(format!("invalid public key: {}", e)))
}

/// Accepts both the two-line box format and a bare base64 key
fn parse_public_key(text: &str) -> std::result::Result<PublicKey, minisign::PError> {
    let text = text.trim();
    if text.lines().count() > 1 {
        PublicKeyBox::from_string(text)?.into_public_key()
    } else {
        PublicKey::from_base64(text)
    }
}

/// Verify a detached signature over `bytes`
pub fn verify(public_key: &PublicKey, file: &str, bytes: &[u8], signature: &[u8]) -> Result<()> {
    let text = std::str::from_utf8(signature)
        .map_err(|_| Error::signature_mismatch(file, "signature is not UTF-8"))?;
    let signature_box = SignatureBox::from_string(text)
        .map_err(|e| Error::signature_mismatch(file, e.to_string()))?;
    minisign::verify(public_key, &signature_box, Cursor::new(bytes), true, false, false)
        .map_err(|e| Error::signature_mismatch(file, e.to_string()))
}
