use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use coin_codec::{decode_base58_address, decode_privkey};
use coindaemon::Daemon;
use coininfo::Keyseeder;

use crate::error::WalletError;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Size of the process-wide symmetric key.
pub const ENCRYPTION_KEY_LEN: usize = 16;

/// Size of the per-account initialization vector.
pub const IV_LEN: usize = 16;

/// A fresh random IV for encrypting one account key.
pub fn random_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}

/// AES-128-CBC encrypt a raw account key. The 32-byte scalar is block
/// aligned, so no padding is involved.
pub fn encrypt_private_key(
    key: &[u8; ENCRYPTION_KEY_LEN],
    iv: &[u8; IV_LEN],
    privkey: &[u8; 32],
) -> Result<[u8; 32], WalletError> {
    let mut buffer = *privkey;
    Aes128CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buffer, 32)
        .map_err(|e| WalletError::Config(format!("key encryption failed: {e}")))?;
    Ok(buffer)
}

/// Inverse of [`encrypt_private_key`].
pub fn decrypt_private_key(
    key: &[u8; ENCRYPTION_KEY_LEN],
    iv: &[u8; IV_LEN],
    encrypted: &[u8; 32],
) -> Result<[u8; 32], WalletError> {
    let mut buffer = *encrypted;
    Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|e| WalletError::Config(format!("key decryption failed: {e}")))?;
    Ok(buffer)
}

/// RIPEMD160(SHA256(data)), the hash every address form is built from.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// SHA256 applied twice; bearer tokens are stored and matched in this form.
pub fn token_hash(token: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(token);
    Sha256::digest(first).into()
}

/// The hash160 of the compressed public key behind a secp256k1 scalar.
/// Used on key import and to check stored key material.
pub fn pubkeyhash_for_privkey(privkey: &[u8; 32]) -> Result<[u8; 20], WalletError> {
    use k256::elliptic_curve::sec1::ToEncodedPoint;

    let secret = k256::SecretKey::from_slice(privkey).map_err(|_| WalletError::KeyImport)?;
    let public = secret.public_key();
    let point = public.to_encoded_point(true);
    Ok(hash160(point.as_bytes()))
}

/// Fetch a fresh key pair from the keyseeder daemon: a new address, its
/// WIF key, and both decoded against the keyseeder's version bytes.
pub async fn generate_key(
    daemon: &Daemon,
    seeder: &Keyseeder,
) -> Result<([u8; 32], [u8; 20]), WalletError> {
    let address = daemon.get_new_address().await?;
    let wif = daemon.dump_privkey(&address).await?;

    let (_, pubkeyhash) = decode_base58_address(&address, Some(seeder.address_version))?;
    let (_, privkey, _) = decode_privkey(&wif, Some(seeder.privkey_version))?;
    Ok((privkey, pubkeyhash))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 16] {
        let mut key = [0u8; 16];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = (i * 0x11) as u8;
        }
        key
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key();
        let iv = random_iv();
        let privkey = [0x5au8; 32];

        let encrypted = encrypt_private_key(&key, &iv, &privkey).unwrap();
        assert_ne!(encrypted, privkey);
        let decrypted = decrypt_private_key(&key, &iv, &encrypted).unwrap();
        assert_eq!(decrypted, privkey);
    }

    #[test]
    fn encryption_is_deterministic_under_fixed_iv() {
        let key = test_key();
        let iv = [7u8; 16];
        let privkey = [0x5au8; 32];

        let a = encrypt_private_key(&key, &iv, &privkey).unwrap();
        let b = encrypt_private_key(&key, &iv, &privkey).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_ivs_produce_different_ciphertexts() {
        let key = test_key();
        let privkey = [0x5au8; 32];

        let a = encrypt_private_key(&key, &[1u8; 16], &privkey).unwrap();
        let b = encrypt_private_key(&key, &[2u8; 16], &privkey).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_does_not_recover_plaintext() {
        let iv = [3u8; 16];
        let privkey = [0x5au8; 32];
        let encrypted = encrypt_private_key(&test_key(), &iv, &privkey).unwrap();

        let mut wrong = test_key();
        wrong[0] ^= 0xff;
        let decrypted = decrypt_private_key(&wrong, &iv, &encrypted).unwrap();
        assert_ne!(decrypted, privkey);
    }

    #[test]
    fn random_ivs_differ() {
        assert_ne!(random_iv(), random_iv());
    }

    #[test]
    fn hash160_known_vector() {
        // Compressed public key for the scalar 1.
        let pubkey =
            hex::decode("0279BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798")
                .unwrap();
        assert_eq!(
            hex::encode(hash160(&pubkey)),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn token_hash_known_vector() {
        let token = [b'T'; 64];
        assert_eq!(
            hex::encode(token_hash(&token)),
            "bb7d9bc1a343913301146baa430bcf608a1ae80c533c9fa71e6bcd8b9441615f"
        );
    }

    #[test]
    fn pubkeyhash_for_scalar_one() {
        let mut privkey = [0u8; 32];
        privkey[31] = 1;
        assert_eq!(
            hex::encode(pubkeyhash_for_privkey(&privkey).unwrap()),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn zero_scalar_is_rejected() {
        assert!(matches!(
            pubkeyhash_for_privkey(&[0u8; 32]),
            Err(WalletError::KeyImport)
        ));
    }
}
