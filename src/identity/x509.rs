// SPDX-FileCopyrightText: 2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use p256::{
    elliptic_curve::sec1::ToEncodedPoint as _,
    pkcs8::{ObjectIdentifier, PrivateKeyInfo},
};
use rsa::{
    pkcs1::{DecodeRsaPrivateKey as _, EncodeRsaPublicKey as _},
    RsaPrivateKey,
};
use x509_parser::{extensions::GeneralName, parse_x509_certificate};

use crate::error::{self, Result};

use super::Svid;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

fn malformed<E: std::fmt::Display>(what: &str) -> impl FnOnce(E) -> error::Error + '_ {
    move |err| error::Identity::Malformed(format!("{what}: {err}")).into()
}

/// The private key bound to an X.509 SVID, tagged by what it can do.
///
/// The variant is decided once when the key is parsed. Keys we cannot sign
/// with are kept as [`PrivateKey::Unsupported`] so that callers get a
/// descriptive error rather than a parse failure.
#[derive(Clone)]
pub(crate) enum PrivateKey {
    Rsa(Box<RsaPrivateKey>),
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    Unsupported(String),
}

impl PrivateKey {
    pub(crate) fn from_pem(data: &[u8]) -> Result<Self> {
        let block = pem::parse_many(data)
            .map_err(malformed("private key PEM"))?
            .into_iter()
            .find(|block| block.tag().ends_with("PRIVATE KEY"))
            .ok_or_else(|| error::Identity::Malformed("no private key block found".to_owned()))?;

        match block.tag() {
            "PRIVATE KEY" => Self::from_pkcs8_der(block.contents()),
            "RSA PRIVATE KEY" => Ok(Self::Rsa(Box::new(
                RsaPrivateKey::from_pkcs1_der(block.contents())
                    .map_err(malformed("RSA private key"))?,
            ))),
            "EC PRIVATE KEY" => p256::SecretKey::from_sec1_der(block.contents())
                .map(Self::P256)
                .or_else(|_| p384::SecretKey::from_sec1_der(block.contents()).map(Self::P384))
                .or_else(|_| Ok(Self::Unsupported("EC (unknown curve)".to_owned()))),
            other => Ok(Self::Unsupported(other.to_owned())),
        }
    }

    fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = PrivateKeyInfo::try_from(der).map_err(malformed("PKCS#8 private key"))?;

        if info.algorithm.oid == RSA_ENCRYPTION {
            let key = <RsaPrivateKey as rsa::pkcs8::DecodePrivateKey>::from_pkcs8_der(der)
                .map_err(malformed("RSA private key"))?;
            return Ok(Self::Rsa(Box::new(key)));
        }

        if info.algorithm.oid == EC_PUBLIC_KEY {
            let curve = info
                .algorithm
                .parameters_oid()
                .map_err(malformed("EC private key parameters"))?;
            return if curve == SECP256R1 {
                Ok(Self::P256(
                    p256::SecretKey::try_from(info).map_err(malformed("P-256 private key"))?,
                ))
            } else if curve == SECP384R1 {
                Ok(Self::P384(
                    p384::SecretKey::try_from(info).map_err(malformed("P-384 private key"))?,
                ))
            } else {
                Ok(Self::Unsupported(format!("EC ({curve})")))
            };
        }

        Ok(Self::Unsupported(info.algorithm.oid.to_string()))
    }

    /// The public half of the key, encoded the way a certificate's subject
    /// public key carries it. `None` for keys we cannot sign with.
    fn public_key(&self) -> Result<Option<Vec<u8>>> {
        Ok(match *self {
            Self::Rsa(ref key) => Some(
                key.to_public_key()
                    .to_pkcs1_der()
                    .map_err(malformed("RSA public key"))?
                    .as_bytes()
                    .to_vec(),
            ),
            Self::P256(ref key) => Some(key.public_key().to_encoded_point(false).as_bytes().to_vec()),
            Self::P384(ref key) => Some(key.public_key().to_encoded_point(false).as_bytes().to_vec()),
            Self::Unsupported(_) => None,
        })
    }

    pub(crate) fn type_name(&self) -> &str {
        match *self {
            Self::Rsa(_) => "RSA",
            Self::P256(_) => "ECDSA (P-256)",
            Self::P384(_) => "ECDSA (P-384)",
            Self::Unsupported(ref name) => name,
        }
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PrivateKey").field(&self.type_name()).finish()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Certificate {
    der: Vec<u8>,
    serial_number: BigUint,
    not_after: DateTime<Utc>,
    uris: Vec<String>,
    public_key: Vec<u8>,
}

impl Certificate {
    pub(crate) fn from_der(der: Vec<u8>) -> Result<Self> {
        let (serial_number, not_after, uris, public_key) = {
            let (_, cert) = parse_x509_certificate(&der).map_err(malformed("certificate"))?;
            let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
                .ok_or_else(|| {
                    error::Identity::Malformed("certificate expiry is out of range".to_owned())
                })?;
            let uris = cert
                .subject_alternative_name()
                .map_err(malformed("certificate subject alternative name"))?
                .map(|ext| {
                    ext.value
                        .general_names
                        .iter()
                        .filter_map(|name| match *name {
                            GeneralName::URI(uri) => Some(uri.to_owned()),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default();
            (
                cert.tbs_certificate.serial.clone(),
                not_after,
                uris,
                cert.public_key().subject_public_key.data.to_vec(),
            )
        };

        Ok(Self {
            der,
            serial_number,
            not_after,
            uris,
            public_key,
        })
    }

    pub(crate) fn from_pem(data: &[u8]) -> Result<Vec<Self>> {
        pem::parse_many(data)
            .map_err(malformed("certificate PEM"))?
            .into_iter()
            .filter(|block| block.tag() == "CERTIFICATE")
            .map(|block| Self::from_der(block.into_contents()))
            .collect()
    }

    pub(crate) fn der(&self) -> &[u8] {
        &self.der
    }

    pub(crate) fn serial_number(&self) -> &BigUint {
        &self.serial_number
    }

    pub(crate) fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }
}

/// An X.509 SVID: a leaf certificate carrying the workload's SPIFFE ID, any
/// intermediates needed to chain it to the trust bundle, and its private key.
#[derive(Clone, Debug)]
pub(crate) struct X509Svid {
    id: String,
    hint: String,
    private_key: PrivateKey,
    certificates: Vec<Certificate>,
}

impl X509Svid {
    pub(crate) fn new(
        hint: String,
        private_key: PrivateKey,
        certificates: Vec<Certificate>,
    ) -> Result<Self> {
        let leaf = certificates.first().ok_or_else(|| {
            error::Identity::Malformed("no certificates found in SVID".to_owned())
        })?;
        let id = leaf
            .uris
            .iter()
            .find(|uri| uri.starts_with("spiffe://"))
            .cloned()
            .ok_or_else(|| {
                error::Identity::Malformed("leaf certificate has no SPIFFE ID".to_owned())
            })?;
        if let Some(public_key) = private_key.public_key()? {
            if public_key != leaf.public_key {
                return Err(error::Identity::Malformed(
                    "private key does not match the leaf certificate".to_owned(),
                )
                .into());
            }
        }

        Ok(Self {
            id,
            hint,
            private_key,
            certificates,
        })
    }

    pub(crate) fn from_pem(certificates: &[u8], private_key: &[u8], hint: String) -> Result<Self> {
        Self::new(
            hint,
            PrivateKey::from_pem(private_key)?,
            Certificate::from_pem(certificates)?,
        )
    }

    pub(crate) fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    // `new` rejects an empty certificate list.
    #[allow(clippy::indexing_slicing)]
    pub(crate) fn leaf(&self) -> &Certificate {
        &self.certificates[0]
    }

    /// Every certificate after the leaf, or an empty slice when the SVID is
    /// a single self-contained certificate.
    pub(crate) fn intermediates(&self) -> &[Certificate] {
        self.certificates.get(1..).unwrap_or_default()
    }
}

impl Svid for X509Svid {
    fn id(&self) -> &str {
        &self.id
    }

    fn hint(&self) -> &str {
        &self.hint
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.leaf().not_after()
    }
}
