// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! RSA request signatures for service-to-service calls.
//!
//! Trusted backend callers sign an arbitrary string with their private key
//! and send it as two headers:
//!
//! ```text
//! X-Auth-Data:      <string>
//! X-Auth-Signature: base64(RSASSA-PKCS1-v1_5(SHA-256, X-Auth-Data))
//! ```
//!
//! The service only ever holds the public half. `X-Auth-Data` is not checked
//! for freshness, so a captured header pair can be replayed.
//!
//! ## Accepted key formats
//!
//! - Public: OpenSSH `ssh-rsa` line, PEM `RSA PUBLIC KEY` (PKCS#1) and PEM
//!   `PUBLIC KEY` (SPKI)
//! - Private (signer only): PEM `RSA PRIVATE KEY` (PKCS#1) and PEM
//!   `PRIVATE KEY` (PKCS#8)

use std::path::Path;

use base64ct::{Base64, Encoding};
use ring::rand::SystemRandom;
use ring::signature::{
    RsaKeyPair, UnparsedPublicKey, RSA_PKCS1_2048_8192_SHA256, RSA_PKCS1_SHA256,
};
use spki::der::{asn1::UintRef, Decode, Encode};
use spki::{ObjectIdentifier, SubjectPublicKeyInfoRef};

/// Header carrying the signed string.
pub const AUTH_DATA_HEADER: &str = "X-Auth-Data";
/// Header carrying the base64 signature of [`AUTH_DATA_HEADER`].
pub const AUTH_SIGNATURE_HEADER: &str = "X-Auth-Signature";

/// rsaEncryption (1.2.840.113549.1.1.1)
const RSA_ENCRYPTION_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("failed to read key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported key format: {0}")]
    UnsupportedFormat(String),

    #[error("malformed key: {0}")]
    Malformed(String),

    #[error("signing failed")]
    Signing,
}

impl From<spki::der::Error> for KeyError {
    fn from(err: spki::der::Error) -> Self {
        KeyError::Malformed(err.to_string())
    }
}

fn read_key_file(path: &Path) -> Result<String, KeyError> {
    std::fs::read_to_string(path).map_err(|source| KeyError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Verifies request signatures against one pinned RSA public key.
///
/// The key is held as PKCS#1 `RSAPublicKey` DER, the form ring verifies with.
#[derive(Clone)]
pub struct SignatureVerifier {
    der: Vec<u8>,
    bits: usize,
}

impl SignatureVerifier {
    /// Load the public key from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        Self::from_key_material(&read_key_file(path.as_ref())?)
    }

    /// Load the public key from its textual form.
    pub fn from_key_material(text: &str) -> Result<Self, KeyError> {
        let text = text.trim();
        let der = if text.starts_with("ssh-rsa ") {
            parse_openssh_public_key(text)?
        } else if text.starts_with("-----BEGIN") {
            let pem = pem::parse(text).map_err(|e| KeyError::Malformed(e.to_string()))?;
            match pem.tag() {
                "RSA PUBLIC KEY" => pem.contents().to_vec(),
                "PUBLIC KEY" => spki_rsa_key(pem.contents())?,
                other => return Err(KeyError::UnsupportedFormat(format!("PEM block {other:?}"))),
            }
        } else {
            return Err(KeyError::UnsupportedFormat(
                "expected an ssh-rsa line or a PEM public key".to_string(),
            ));
        };

        let key = pkcs1::RsaPublicKey::from_der(&der)?;
        let bits = key.modulus.as_bytes().len() * 8;
        if !(2048..=8192).contains(&bits) {
            return Err(KeyError::Malformed(format!(
                "RSA modulus of {bits} bits is outside 2048..=8192"
            )));
        }

        Ok(Self { der, bits })
    }

    /// Modulus size of the loaded key in bits.
    pub fn key_bits(&self) -> usize {
        self.bits
    }

    /// Check `signature_b64` against the UTF-8 bytes of `data`.
    ///
    /// Returns `false` for every failure: bad base64, wrong length, or a
    /// signature that does not match. Causes are not distinguished.
    pub fn verify_signature(&self, data: &str, signature_b64: &str) -> bool {
        match Base64::decode_vec(signature_b64.trim()) {
            Ok(signature) => UnparsedPublicKey::new(&RSA_PKCS1_2048_8192_SHA256, &self.der)
                .verify(data.as_bytes(), &signature)
                .is_ok(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("key_bits", &self.key_bits())
            .finish()
    }
}

/// Header pair produced by [`RequestSigner::sign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub data: String,
    pub signature: String,
}

impl SignedHeaders {
    /// `(name, value)` pairs ready to attach to an outgoing request.
    pub fn pairs(&self) -> [(&'static str, &str); 2] {
        [
            (AUTH_DATA_HEADER, self.data.as_str()),
            (AUTH_SIGNATURE_HEADER, self.signature.as_str()),
        ]
    }
}

/// Client-side counterpart of [`SignatureVerifier`].
///
/// The service itself never signs; this exists for trusted callers and tests.
pub struct RequestSigner {
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl RequestSigner {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        Self::from_pem(&read_key_file(path.as_ref())?)
    }

    pub fn from_pem(text: &str) -> Result<Self, KeyError> {
        let pem = pem::parse(text.trim()).map_err(|e| KeyError::Malformed(e.to_string()))?;
        let key_pair = match pem.tag() {
            "RSA PRIVATE KEY" => RsaKeyPair::from_der(pem.contents()),
            "PRIVATE KEY" => RsaKeyPair::from_pkcs8(pem.contents()),
            "OPENSSH PRIVATE KEY" => {
                return Err(KeyError::UnsupportedFormat(
                    "OpenSSH private keys must be converted with `ssh-keygen -p -m PEM`"
                        .to_string(),
                ))
            }
            other => return Err(KeyError::UnsupportedFormat(format!("PEM block {other:?}"))),
        }
        .map_err(|e| KeyError::Malformed(e.to_string()))?;

        Ok(Self {
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    /// Sign `data` and return the header pair.
    pub fn sign(&self, data: &str) -> Result<SignedHeaders, KeyError> {
        let mut signature = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(&RSA_PKCS1_SHA256, &self.rng, data.as_bytes(), &mut signature)
            .map_err(|_| KeyError::Signing)?;

        Ok(SignedHeaders {
            data: data.to_string(),
            signature: Base64::encode_string(&signature),
        })
    }
}

/// Parse `ssh-rsa <base64 blob> [comment]` and re-encode it as PKCS#1 DER.
fn parse_openssh_public_key(line: &str) -> Result<Vec<u8>, KeyError> {
    let encoded = line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| KeyError::Malformed("ssh-rsa line has no key blob".to_string()))?;
    let blob = Base64::decode_vec(encoded)
        .map_err(|_| KeyError::Malformed("ssh key blob is not valid base64".to_string()))?;

    let mut reader = SshReader { input: &blob };
    if reader.read_string()? != b"ssh-rsa" {
        return Err(KeyError::UnsupportedFormat("ssh key blob is not ssh-rsa".to_string()));
    }
    let public_exponent = UintRef::new(reader.read_string()?)?;
    let modulus = UintRef::new(reader.read_string()?)?;
    Ok(pkcs1::RsaPublicKey {
        modulus,
        public_exponent,
    }
    .to_der()?)
}

/// A cursor over the big-endian, length-prefixed fields of an SSH blob.
struct SshReader<'a> {
    input: &'a [u8],
}

impl<'a> SshReader<'a> {
    fn read_string(&mut self) -> Result<&'a [u8], KeyError> {
        if self.input.len() < 4 {
            return Err(KeyError::Malformed("truncated ssh key blob".to_string()));
        }
        let (len, rest) = self.input.split_at(4);
        let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
        if rest.len() < len {
            return Err(KeyError::Malformed("truncated ssh key blob".to_string()));
        }
        let (value, rest) = rest.split_at(len);
        self.input = rest;
        Ok(value)
    }
}

/// Unwrap the PKCS#1 key from a SubjectPublicKeyInfo.
fn spki_rsa_key(der: &[u8]) -> Result<Vec<u8>, KeyError> {
    let info = SubjectPublicKeyInfoRef::from_der(der)?;
    if info.algorithm.oid != RSA_ENCRYPTION_OID {
        return Err(KeyError::UnsupportedFormat("public key is not RSA".to_string()));
    }
    info.subject_public_key
        .as_bytes()
        .map(<[u8]>::to_vec)
        .ok_or_else(|| KeyError::Malformed("subjectPublicKey has unused bits".to_string()))
}
