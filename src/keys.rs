//! PEM key import. OpenSSL does the parsing; the attack only ever sees
//! the components as big integers.

use std::path::Path;

use anyhow::{Context, Result};
use num_bigint::{BigInt, Sign};
use openssl::bn::BigNumRef;
use openssl::rsa::Rsa;

/// Public RSA key material.
pub struct PublicKey {
    pub n: BigInt,
    pub e: BigInt,
}

/// Private RSA key material. Only the test oracle ever decrypts.
pub struct PrivateKey {
    pub n: BigInt,
    pub d: BigInt,
}

fn bn_to_bigint(bn: &BigNumRef) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, &bn.to_vec())
}

/// Parses an RSA public key from PEM, accepting both SubjectPublicKeyInfo
/// (`BEGIN PUBLIC KEY`) and PKCS#1 (`BEGIN RSA PUBLIC KEY`) encodings.
pub fn public_from_pem(pem: &[u8]) -> Result<PublicKey> {
    let rsa = Rsa::public_key_from_pem(pem)
        .or_else(|_| Rsa::public_key_from_pem_pkcs1(pem))
        .context("not an RSA public key in PEM format")?;
    Ok(PublicKey {
        n: bn_to_bigint(rsa.n()),
        e: bn_to_bigint(rsa.e()),
    })
}

pub fn public_from_pem_file(path: &Path) -> Result<PublicKey> {
    let pem = std::fs::read(path)
        .with_context(|| format!("can't read public key file {}", path.display()))?;
    public_from_pem(&pem)
}

/// Parses an RSA private key from PEM.
pub fn private_from_pem(pem: &[u8]) -> Result<PrivateKey> {
    let rsa = Rsa::private_key_from_pem(pem).context("not an RSA private key in PEM format")?;
    Ok(PrivateKey {
        n: bn_to_bigint(rsa.n()),
        d: bn_to_bigint(rsa.d()),
    })
}

pub fn private_from_pem_file(path: &Path) -> Result<PrivateKey> {
    let pem = std::fs::read(path)
        .with_context(|| format!("can't read private key file {}", path.display()))?;
    private_from_pem(&pem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::One;

    #[test]
    fn public_and_private_pems_agree() {
        let rsa = Rsa::generate(1024).unwrap();
        let public = public_from_pem(&rsa.public_key_to_pem().unwrap()).unwrap();
        let private = private_from_pem(&rsa.private_key_to_pem().unwrap()).unwrap();
        assert_eq!(public.n, private.n);
        assert_eq!(public.n, bn_to_bigint(rsa.n()));
        assert_eq!(public.e, 65537.into());
        assert_eq!(public.n.bits(), 1024);
        // d·e = 1 mod (p-1)(q-1): spot-check by round-tripping a value
        let m = BigInt::one() << 100_u32;
        let c = m.modpow(&public.e, &public.n);
        assert_eq!(c.modpow(&private.d, &private.n), m);
    }

    #[test]
    fn pkcs1_public_pem_is_accepted() {
        let rsa = Rsa::generate(1024).unwrap();
        let pem = rsa.public_key_to_pem_pkcs1().unwrap();
        let public = public_from_pem(&pem).unwrap();
        assert_eq!(public.n, bn_to_bigint(rsa.n()));
    }

    #[test]
    fn garbage_pem_is_rejected() {
        assert!(public_from_pem(b"not a key").is_err());
        assert!(private_from_pem(b"not a key").is_err());
    }
}
