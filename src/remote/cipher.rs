//! API 响应解密。
//!
//! 服务端把载荷 AES-256-ECB（PKCS7 填充, 无 IV）加密后再 base64 编码，
//! 密钥即请求时派生的 32 字节 token 十六进制串。

use aes::Aes256;
use aes::cipher::{BlockDecryptMut, KeyInit, block_padding::Pkcs7};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("密钥长度 {0} 不是 32 字节")]
    KeyLength(usize),
    #[error("base64 解码失败: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("密文填充不合法")]
    Padding,
    #[error("明文不是合法 UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// 解密一段 base64 编码的 AES-256-ECB 密文为 UTF-8 字符串。
pub fn decrypt(encoded: &str, key: &str) -> Result<String, CipherError> {
    let key = key.as_bytes();
    if key.len() != 32 {
        return Err(CipherError::KeyLength(key.len()));
    }

    let mut buf = BASE64.decode(encoded.trim())?;
    if buf.is_empty() || buf.len() % 16 != 0 {
        return Err(CipherError::Padding);
    }

    let cipher =
        ecb::Decryptor::<Aes256>::new_from_slice(key).map_err(|_| CipherError::KeyLength(key.len()))?;
    let plain = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| CipherError::Padding)?;

    Ok(String::from_utf8(plain.to_vec())?)
}

#[cfg(test)]
pub(crate) fn encrypt(plain: &str, key: &str) -> String {
    use aes::cipher::BlockEncryptMut;

    let cipher = ecb::Encryptor::<Aes256>::new_from_slice(key.as_bytes()).unwrap();
    let out = cipher.encrypt_padded_vec_mut::<Pkcs7>(plain.as_bytes());
    BASE64.encode(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn round_trip() {
        let plain = r#"{"version":"2.0.16","img_host":"https://img.example.net"}"#;
        let encoded = encrypt(plain, KEY);
        assert_eq!(decrypt(&encoded, KEY).unwrap(), plain);
    }

    #[test]
    fn rejects_wrong_key_length() {
        let err = decrypt("AAAA", "short").unwrap_err();
        assert!(matches!(err, CipherError::KeyLength(5)));
    }

    #[test]
    fn rejects_garbage_base64() {
        let err = decrypt("!!!not base64!!!", KEY).unwrap_err();
        assert!(matches!(err, CipherError::Base64(_)));
    }

    #[test]
    fn rejects_truncated_ciphertext() {
        // 合法 base64 但长度不是 16 的倍数
        let encoded = BASE64.encode([0u8; 15]);
        let err = decrypt(&encoded, KEY).unwrap_err();
        assert!(matches!(err, CipherError::Padding));
    }

    #[test]
    fn wrong_key_fails_padding_or_utf8() {
        let encoded = encrypt("hello world", KEY);
        let wrong = "ffffffffffffffffffffffffffffffff";
        assert!(decrypt(&encoded, wrong).is_err());
    }
}
