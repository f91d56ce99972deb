use coininfo::TxOutType;

use crate::encode::encode_blob;
use crate::error::TxBuildError;
use crate::opcodes::*;

/// Assemble the locking script for a destination hash of the given type.
pub fn output_script(
    destination_hash: &[u8],
    output_type: TxOutType,
) -> Result<Vec<u8>, TxBuildError> {
    if destination_hash.len() != output_type.hash_len() {
        return Err(TxBuildError::InvalidHash(
            hex::encode(destination_hash),
            output_type,
        ));
    }

    match output_type {
        TxOutType::P2PKH => {
            let mut script = vec![OP_DUP, OP_HASH160];
            script.extend(encode_blob(destination_hash));
            script.extend([OP_EQUALVERIFY, OP_CHECKSIG]);
            Ok(script)
        }
        TxOutType::P2SH => {
            let mut script = vec![OP_HASH160];
            script.extend(encode_blob(destination_hash));
            script.push(OP_EQUAL);
            Ok(script)
        }
        TxOutType::P2WPKH => {
            let mut script = vec![OP_0];
            script.extend(encode_blob(destination_hash));
            Ok(script)
        }
        TxOutType::P2WSH => Err(TxBuildError::UnsupportedOutputType(output_type)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> [u8; 20] {
        [0xab; 20]
    }

    #[test]
    fn p2pkh_script_layout() {
        let script = output_script(&hash(), TxOutType::P2PKH).unwrap();
        assert_eq!(script.len(), 25);
        assert_eq!(script[0], 0x76);
        assert_eq!(script[1], 0xa9);
        assert_eq!(script[2], 0x14);
        assert_eq!(&script[3..23], &hash());
        assert_eq!(&script[23..], &[0x88, 0xac]);
    }

    #[test]
    fn p2sh_script_layout() {
        let script = output_script(&hash(), TxOutType::P2SH).unwrap();
        assert_eq!(script.len(), 23);
        assert_eq!(script[0], 0xa9);
        assert_eq!(script[1], 0x14);
        assert_eq!(script[22], 0x87);
    }

    #[test]
    fn p2wpkh_script_layout() {
        let script = output_script(&hash(), TxOutType::P2WPKH).unwrap();
        assert_eq!(script.len(), 22);
        assert_eq!(&script[..2], &[0x00, 0x14]);
        assert_eq!(&script[2..], &hash());
    }

    #[test]
    fn rejects_wrong_hash_length() {
        assert!(matches!(
            output_script(&[0u8; 19], TxOutType::P2PKH),
            Err(TxBuildError::InvalidHash(..))
        ));
        // A 20-byte hash is not a valid P2WSH program either.
        assert!(matches!(
            output_script(&hash(), TxOutType::P2WSH),
            Err(TxBuildError::InvalidHash(..))
        ));
    }

    #[test]
    fn rejects_p2wsh_outputs() {
        assert!(matches!(
            output_script(&[0u8; 32], TxOutType::P2WSH),
            Err(TxBuildError::UnsupportedOutputType(_))
        ));
    }
}
