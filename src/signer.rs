// SPDX-FileCopyrightText: 2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! Signatures over requests to AWS IAM Roles Anywhere using the private key
//! of an X.509 SVID.
//!
//! See <https://docs.aws.amazon.com/rolesanywhere/latest/userguide/authentication-sign-process.html>.
//! RSA keys sign with PKCS#1 v1.5; EC keys sign with ECDSA, producing an
//! ASN.1 DER-encoded signature.

use digest::Digest;
use p256::ecdsa::signature::hazmat::PrehashSigner as _;
use rsa::Pkcs1v15Sign;
use sha2::{Sha256, Sha384, Sha512};

use crate::{
    error::{self, Result},
    identity::{x509::Certificate, x509::PrivateKey, X509Svid},
};

pub(crate) const AWS4_X509_RSA_SHA256: &str = "AWS4-X509-RSA-SHA256";
pub(crate) const AWS4_X509_ECDSA_SHA256: &str = "AWS4-X509-ECDSA-SHA256";

/// A hash function a signature consumer may ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HashFunction {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl std::fmt::Display for HashFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match *self {
            Self::Sha1 => "SHA-1",
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        })
    }
}

/// Signs on behalf of an X.509 SVID without taking ownership of it.
pub(crate) struct Signer<'svid> {
    svid: &'svid X509Svid,
}

impl<'svid> Signer<'svid> {
    pub(crate) const fn new(svid: &'svid X509Svid) -> Self {
        Self { svid }
    }

    /// Hashes `message` with `hash` and signs the result.
    pub(crate) fn sign(&self, message: &[u8], hash: HashFunction) -> Result<Vec<u8>> {
        let digest = match hash {
            HashFunction::Sha256 => Sha256::digest(message).to_vec(),
            HashFunction::Sha384 => Sha384::digest(message).to_vec(),
            HashFunction::Sha512 => Sha512::digest(message).to_vec(),
            HashFunction::Sha1 | HashFunction::Sha224 => {
                return Err(error::Signing::UnsupportedHashFunction(hash.to_string()).into())
            }
        };

        match *self.svid.private_key() {
            PrivateKey::Rsa(ref key) => {
                let padding = match hash {
                    HashFunction::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
                    HashFunction::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
                    HashFunction::Sha1 | HashFunction::Sha224 | HashFunction::Sha256 => {
                        Pkcs1v15Sign::new::<Sha256>()
                    }
                };
                Ok(key
                    .sign(padding, &digest)
                    .map_err(error::Signing::from)?)
            }
            PrivateKey::P256(ref key) => {
                let signature: p256::ecdsa::Signature = p256::ecdsa::SigningKey::from(key)
                    .sign_prehash(&digest)
                    .map_err(error::Signing::from)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            PrivateKey::P384(ref key) => {
                let signature: p384::ecdsa::Signature = p384::ecdsa::SigningKey::from(key)
                    .sign_prehash(&digest)
                    .map_err(error::Signing::from)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            PrivateKey::Unsupported(ref name) => {
                Err(error::Signing::UnsupportedKeyType(name.clone()).into())
            }
        }
    }

    /// The signature algorithm identifier AWS expects for the SVID's key.
    pub(crate) fn signature_algorithm(&self) -> Result<&'static str> {
        match *self.svid.private_key() {
            PrivateKey::Rsa(_) => Ok(AWS4_X509_RSA_SHA256),
            PrivateKey::P256(_) | PrivateKey::P384(_) => Ok(AWS4_X509_ECDSA_SHA256),
            PrivateKey::Unsupported(ref name) => {
                Err(error::Signing::UnsupportedKeyType(name.clone()).into())
            }
        }
    }

    pub(crate) fn certificate(&self) -> &'svid Certificate {
        self.svid.leaf()
    }

    pub(crate) fn certificate_chain(&self) -> &'svid [Certificate] {
        self.svid.intermediates()
    }
}
