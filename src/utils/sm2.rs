//! SM2 公钥加解密（GM/T 0003，曲线 sm2p256v1）
//!
//! 密文布局固定为 C1C2C3：
//! - C1: 随机点 kG，非压缩编码 (0x04 || X || Y)，65 字节
//! - C2: 明文 XOR KDF(x2 || y2, len)，与明文等长
//! - C3: SM3(x2 || M || y2)，32 字节
//!
//! 对端 (Java Hutool, `SM2Engine.Mode.C1C2C3`) 只接受这一顺序，不做自动识别。
//! 点运算直接使用 libsm 的 `EccCtx`，KDF 与 C3 在此处显式实现。

use libsm::sm2::ecc::{EccCtx, Point};
use libsm::sm2::field::FieldElem;
use libsm::sm3::hash::Sm3Hash;
use num_bigint::BigUint;
use thiserror::Error;

/// 规范公钥长度（含 04 前缀）
pub const CANONICAL_PUBLIC_KEY_LEN: usize = 130;
const BARE_PUBLIC_KEY_LEN: usize = 128;
const UNCOMPRESSED_PREFIX: &str = "04";

const FIELD_BYTES: usize = 32;
const C1_LEN: usize = 1 + 2 * FIELD_BYTES;
const C3_LEN: usize = 32;

// KDF 输出全零时需要换 k 重算，概率可忽略
const MAX_ENCRYPT_ATTEMPTS: usize = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Sm2Error {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    #[error("Ciphertext integrity check failed")]
    IntegrityCheckFailed,

    #[error("Decrypted plaintext is not valid UTF-8")]
    InvalidUtf8,

    #[error("Curve arithmetic error: {0}")]
    Curve(String),
}

pub type Sm2Result<T> = Result<T, Sm2Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sm2KeyPair {
    /// 130 位十六进制，04 开头
    pub public_key: String,
    /// 64 位十六进制私钥标量
    pub private_key: String,
}

/// 将公钥规范化为 `04 || X || Y` 形式（130 位十六进制，小写）。
///
/// - 128 位：补 `04` 前缀
/// - 130 位：必须以 `04` 开头
/// - 其它长度或包含非十六进制字符：拒绝
pub fn normalize_public_key(raw: &str) -> Sm2Result<String> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Sm2Error::InvalidPublicKey(
            "public key must be a non-empty hex string".to_string(),
        ));
    }

    let key = raw.to_ascii_lowercase();
    match key.len() {
        BARE_PUBLIC_KEY_LEN => Ok(format!("{UNCOMPRESSED_PREFIX}{key}")),
        CANONICAL_PUBLIC_KEY_LEN if key.starts_with(UNCOMPRESSED_PREFIX) => Ok(key),
        CANONICAL_PUBLIC_KEY_LEN => Err(Sm2Error::InvalidPublicKey(
            "130-character public key must start with 04".to_string(),
        )),
        n => Err(Sm2Error::InvalidPublicKey(format!(
            "expected 128 or 130 hex characters, got {n}"
        ))),
    }
}

/// SM2 编解码器。无内部可变状态，可在线程间共享。
pub struct Sm2Codec {
    ecc: EccCtx,
}

impl Default for Sm2Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Sm2Codec {
    pub fn new() -> Self {
        Self { ecc: EccCtx::new() }
    }

    /// 加密 UTF-8 明文，返回 C1C2C3 十六进制密文（以 04 开头）
    pub fn encrypt(&self, plaintext: &str, public_key: &str) -> Sm2Result<String> {
        let public_key = normalize_public_key(public_key)?;
        let point = self.parse_public_point(&public_key)?;

        for _ in 0..MAX_ENCRYPT_ATTEMPTS {
            let k = self.ecc.random_uint();
            if let Some(ciphertext) = self.encrypt_with_nonce(plaintext.as_bytes(), &point, &k)? {
                return Ok(hex::encode(ciphertext));
            }
        }

        Err(Sm2Error::Curve(
            "failed to derive a non-zero key stream".to_string(),
        ))
    }

    /// 解密 C1C2C3 十六进制密文，校验 C3 后返回 UTF-8 明文
    pub fn decrypt(&self, ciphertext: &str, private_key: &str) -> Sm2Result<String> {
        let d = parse_private_scalar(private_key, self.ecc.get_n())?;

        let bytes = hex::decode(ciphertext)
            .map_err(|e| Sm2Error::InvalidCiphertext(format!("not a hex string: {e}")))?;
        if bytes.len() < C1_LEN + C3_LEN {
            return Err(Sm2Error::InvalidCiphertext(format!(
                "expected at least {} bytes, got {}",
                C1_LEN + C3_LEN,
                bytes.len()
            )));
        }

        let (c1, rest) = bytes.split_at(C1_LEN);
        let (c2, c3) = rest.split_at(rest.len() - C3_LEN);

        if c1[0] != 0x04 {
            return Err(Sm2Error::InvalidCiphertext(
                "C1 must be an uncompressed point".to_string(),
            ));
        }
        let c1_point = self
            .point_from_coordinates(&c1[1..1 + FIELD_BYTES], &c1[1 + FIELD_BYTES..])
            .map_err(|_| Sm2Error::InvalidCiphertext("C1 is not a curve point".to_string()))?;

        let shared = self
            .ecc
            .mul(&d, &c1_point)
            .map_err(|e| Sm2Error::Curve(e.to_string()))?;
        let (x2, y2) = self.affine_bytes(&shared)?;

        let key_stream = kdf(&[x2.as_slice(), y2.as_slice()].concat(), c2.len());
        if !c2.is_empty() && key_stream.iter().all(|b| *b == 0) {
            return Err(Sm2Error::IntegrityCheckFailed);
        }
        let plaintext: Vec<u8> = c2.iter().zip(&key_stream).map(|(c, t)| c ^ t).collect();

        if !constant_time_eq(&mac(&x2, &plaintext, &y2), c3) {
            return Err(Sm2Error::IntegrityCheckFailed);
        }

        String::from_utf8(plaintext).map_err(|_| Sm2Error::InvalidUtf8)
    }

    /// 生成新的密钥对
    pub fn generate_key_pair(&self) -> Sm2Result<Sm2KeyPair> {
        let d = self.ecc.random_uint();
        let private_key = hex::encode(left_pad(&d.to_bytes_be()));
        let public_key = self.derive_public_key(&private_key)?;
        Ok(Sm2KeyPair {
            public_key,
            private_key,
        })
    }

    /// 由私钥计算规范公钥 P = dG
    pub fn derive_public_key(&self, private_key: &str) -> Sm2Result<String> {
        let d = parse_private_scalar(private_key, self.ecc.get_n())?;
        let point = self
            .ecc
            .g_mul(&d)
            .map_err(|e| Sm2Error::Curve(e.to_string()))?;
        let (x, y) = self.affine_bytes(&point)?;
        Ok(format!(
            "{UNCOMPRESSED_PREFIX}{}{}",
            hex::encode(x),
            hex::encode(y)
        ))
    }

    /// 以给定 k 加密；KDF 结果全零时返回 None 由调用方换 k
    fn encrypt_with_nonce(
        &self,
        message: &[u8],
        public_point: &Point,
        k: &BigUint,
    ) -> Sm2Result<Option<Vec<u8>>> {
        let c1_point = self
            .ecc
            .g_mul(k)
            .map_err(|e| Sm2Error::Curve(e.to_string()))?;
        let (c1_x, c1_y) = self.affine_bytes(&c1_point)?;

        let shared = self
            .ecc
            .mul(k, public_point)
            .map_err(|e| Sm2Error::Curve(e.to_string()))?;
        let (x2, y2) = self.affine_bytes(&shared)?;

        let key_stream = kdf(&[x2.as_slice(), y2.as_slice()].concat(), message.len());
        if !message.is_empty() && key_stream.iter().all(|b| *b == 0) {
            return Ok(None);
        }

        let mut out = Vec::with_capacity(C1_LEN + message.len() + C3_LEN);
        out.push(0x04);
        out.extend_from_slice(&c1_x);
        out.extend_from_slice(&c1_y);
        out.extend(message.iter().zip(&key_stream).map(|(m, t)| m ^ t));
        out.extend_from_slice(&mac(&x2, message, &y2));
        Ok(Some(out))
    }

    fn parse_public_point(&self, canonical: &str) -> Sm2Result<Point> {
        let bytes = hex::decode(&canonical[UNCOMPRESSED_PREFIX.len()..])
            .map_err(|e| Sm2Error::InvalidPublicKey(e.to_string()))?;
        self.point_from_coordinates(&bytes[..FIELD_BYTES], &bytes[FIELD_BYTES..])
            .map_err(|_| Sm2Error::InvalidPublicKey("point is not on the SM2 curve".to_string()))
    }

    fn point_from_coordinates(&self, x: &[u8], y: &[u8]) -> Sm2Result<Point> {
        let x = FieldElem::from_bytes(x).map_err(|e| Sm2Error::Curve(e.to_string()))?;
        let y = FieldElem::from_bytes(y).map_err(|e| Sm2Error::Curve(e.to_string()))?;
        self.ecc
            .new_point(&x, &y)
            .map_err(|e| Sm2Error::Curve(e.to_string()))
    }

    fn affine_bytes(&self, point: &Point) -> Sm2Result<([u8; FIELD_BYTES], [u8; FIELD_BYTES])> {
        let (x, y) = self
            .ecc
            .to_affine(point)
            .map_err(|e| Sm2Error::Curve(e.to_string()))?;
        Ok((left_pad(&x.to_bytes()), left_pad(&y.to_bytes())))
    }
}

/// 私钥: 十六进制标量，允许 Java BigInteger 风格的前导 00 或奇数长度
fn parse_private_scalar(private_key: &str, n: &BigUint) -> Sm2Result<BigUint> {
    if private_key.is_empty() {
        return Err(Sm2Error::InvalidPrivateKey(
            "private key is required".to_string(),
        ));
    }
    let padded = if private_key.len() % 2 == 1 {
        format!("0{private_key}")
    } else {
        private_key.to_string()
    };
    let bytes = hex::decode(&padded)
        .map_err(|e| Sm2Error::InvalidPrivateKey(format!("not a hex string: {e}")))?;

    let d = BigUint::from_bytes_be(&bytes);
    if d == BigUint::from(0u32) || &d >= n {
        return Err(Sm2Error::InvalidPrivateKey(
            "scalar out of range [1, n-1]".to_string(),
        ));
    }
    Ok(d)
}

/// GM/T 0003.4 KDF: SM3(Z || ct)，ct 为从 1 开始的 32 位大端计数器
fn kdf(z: &[u8], klen: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(klen + 32);
    let mut ct: u32 = 1;
    while out.len() < klen {
        let mut input = Vec::with_capacity(z.len() + 4);
        input.extend_from_slice(z);
        input.extend_from_slice(&ct.to_be_bytes());
        out.extend_from_slice(&Sm3Hash::new(&input).get_hash());
        ct += 1;
    }
    out.truncate(klen);
    out
}

fn mac(x2: &[u8], message: &[u8], y2: &[u8]) -> [u8; C3_LEN] {
    let mut input = Vec::with_capacity(x2.len() + message.len() + y2.len());
    input.extend_from_slice(x2);
    input.extend_from_slice(message);
    input.extend_from_slice(y2);
    Sm3Hash::new(&input).get_hash()
}

fn left_pad(bytes: &[u8]) -> [u8; FIELD_BYTES] {
    let mut out = [0u8; FIELD_BYTES];
    let src = if bytes.len() > FIELD_BYTES {
        &bytes[bytes.len() - FIELD_BYTES..]
    } else {
        bytes
    };
    out[FIELD_BYTES - src.len()..].copy_from_slice(src);
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const REF_PUBLIC_KEY: &str = "0453c9e7fba50807852866ad461f60ac013efa00d313308e8a7ef2b6df1e37fd9f4a5415506cd344d0219340fd5ec90a2424845543521f0a4d75c85214d8d1c18e";
    const REF_PRIVATE_KEY: &str =
        "0081f147eb0b0c37d3dc2396be9a9d68bd85c930ecac3a7e23811f79caec4e8056";
    const REF_PLAINTEXT: &str = "17601600216";

    // 由独立实现按 C1C2C3 生成，k = 59276E27...DEAC1BC21
    const REF_NONCE: &str = "59276e27d506861a16680f3ad9c02dccef3cc1fa3cdbe4ce6d54b80deac1bc21";
    const REF_CIPHERTEXT: &str = "0404ebfc718e8d1798620432268e77feb6415e2ede0e073c0f4f640ecd2e149a73e858f9d81e5430a57b36daab8f950a3c64e6ee6a63094d99283aff767e124df03cc986953d91b17cc8805812ccc7663462e05c007e21f16cfa1c3d086932924f0e0f88a84f91144d991634";

    fn flip_bit(hex_str: &str, byte_index: usize) -> String {
        let mut bytes = hex::decode(hex_str).unwrap();
        bytes[byte_index] ^= 0x01;
        hex::encode(bytes)
    }

    #[test]
    fn test_normalize_public_key() {
        let bare = &REF_PUBLIC_KEY[2..];
        assert_eq!(normalize_public_key(bare).unwrap(), REF_PUBLIC_KEY);
        assert_eq!(normalize_public_key(REF_PUBLIC_KEY).unwrap(), REF_PUBLIC_KEY);
        assert_eq!(
            normalize_public_key(&REF_PUBLIC_KEY.to_uppercase()).unwrap(),
            REF_PUBLIC_KEY
        );

        let wrong_prefix = format!("03{bare}");
        assert!(normalize_public_key(&wrong_prefix).is_err());
        assert!(normalize_public_key(&REF_PUBLIC_KEY[..129]).is_err());
        assert!(normalize_public_key(&format!("{REF_PUBLIC_KEY}00")).is_err());
        assert!(normalize_public_key("").is_err());

        let non_hex = format!("zz{}", &bare[2..]);
        assert!(matches!(
            normalize_public_key(&non_hex),
            Err(Sm2Error::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_reference_key_pair_is_on_sm2_curve() {
        let codec = Sm2Codec::new();
        assert_eq!(codec.derive_public_key(REF_PRIVATE_KEY).unwrap(), REF_PUBLIC_KEY);
    }

    #[test]
    fn test_reference_round_trip() {
        let codec = Sm2Codec::new();
        let ciphertext = codec.encrypt(REF_PLAINTEXT, REF_PUBLIC_KEY).unwrap();
        assert_eq!(codec.decrypt(&ciphertext, REF_PRIVATE_KEY).unwrap(), REF_PLAINTEXT);

        // 无前缀公钥结果一致
        let ciphertext = codec.encrypt(REF_PLAINTEXT, &REF_PUBLIC_KEY[2..]).unwrap();
        assert_eq!(codec.decrypt(&ciphertext, REF_PRIVATE_KEY).unwrap(), REF_PLAINTEXT);
    }

    #[test]
    fn test_known_answer_c1c2c3() {
        let codec = Sm2Codec::new();
        let point = codec.parse_public_point(REF_PUBLIC_KEY).unwrap();
        let k = BigUint::from_bytes_be(&hex::decode(REF_NONCE).unwrap());

        let ciphertext = codec
            .encrypt_with_nonce(REF_PLAINTEXT.as_bytes(), &point, &k)
            .unwrap()
            .unwrap();
        assert_eq!(hex::encode(ciphertext), REF_CIPHERTEXT);
        assert_eq!(codec.decrypt(REF_CIPHERTEXT, REF_PRIVATE_KEY).unwrap(), REF_PLAINTEXT);
    }

    #[test]
    fn test_ciphertext_layout() {
        let codec = Sm2Codec::new();
        let message = "hello 國密";
        let ciphertext = codec.encrypt(message, REF_PUBLIC_KEY).unwrap();

        assert!(ciphertext.starts_with("04"));
        assert_eq!(ciphertext.len(), 2 * (C1_LEN + message.len() + C3_LEN));

        // 用私钥重算共享点，确认尾部 32 字节是 C3 而不是 C2
        let bytes = hex::decode(&ciphertext).unwrap();
        let c1 = codec
            .point_from_coordinates(&bytes[1..33], &bytes[33..65])
            .unwrap();
        let d = parse_private_scalar(REF_PRIVATE_KEY, codec.ecc.get_n()).unwrap();
        let (x2, y2) = codec.affine_bytes(&codec.ecc.mul(&d, &c1).unwrap()).unwrap();

        let c3 = &bytes[bytes.len() - C3_LEN..];
        assert_eq!(c3, mac(&x2, message.as_bytes(), &y2));

        let key_stream = kdf(&[x2.as_slice(), y2.as_slice()].concat(), message.len());
        let c2 = &bytes[C1_LEN..bytes.len() - C3_LEN];
        let recovered: Vec<u8> = c2.iter().zip(&key_stream).map(|(c, t)| c ^ t).collect();
        assert_eq!(recovered, message.as_bytes());
    }

    #[test]
    fn test_generated_pair_round_trips() {
        let codec = Sm2Codec::new();
        let pair = codec.generate_key_pair().unwrap();
        assert_eq!(pair.public_key.len(), CANONICAL_PUBLIC_KEY_LEN);
        assert!(pair.public_key.starts_with("04"));
        assert_eq!(pair.private_key.len(), 64);

        let long = "貸款申請資料-0123456789".repeat(64);
        assert!(long.len() >= 1024);

        for message in ["", "a", long.as_str()] {
            let ciphertext = codec.encrypt(message, &pair.public_key).unwrap();
            assert_eq!(codec.decrypt(&ciphertext, &pair.private_key).unwrap(), message);
        }
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let codec = Sm2Codec::new();
        let ciphertext = codec.encrypt(REF_PLAINTEXT, REF_PUBLIC_KEY).unwrap();
        let total = ciphertext.len() / 2;

        // C2 首字节
        let tampered = flip_bit(&ciphertext, C1_LEN);
        assert_eq!(
            codec.decrypt(&tampered, REF_PRIVATE_KEY),
            Err(Sm2Error::IntegrityCheckFailed)
        );

        // C3 末字节
        let tampered = flip_bit(&ciphertext, total - 1);
        assert_eq!(
            codec.decrypt(&tampered, REF_PRIVATE_KEY),
            Err(Sm2Error::IntegrityCheckFailed)
        );

        // C1 坐标
        let tampered = flip_bit(&ciphertext, 10);
        assert!(codec.decrypt(&tampered, REF_PRIVATE_KEY).is_err());
    }

    #[test]
    fn test_wrong_private_key_fails_integrity() {
        let codec = Sm2Codec::new();
        let other = codec.generate_key_pair().unwrap();
        let ciphertext = codec.encrypt(REF_PLAINTEXT, REF_PUBLIC_KEY).unwrap();
        assert_eq!(
            codec.decrypt(&ciphertext, &other.private_key),
            Err(Sm2Error::IntegrityCheckFailed)
        );
    }

    #[test]
    fn test_malformed_inputs_are_rejected() {
        let codec = Sm2Codec::new();

        // 不在曲线上的点
        let off_curve = format!("04{}", "11".repeat(64));
        assert!(matches!(
            codec.encrypt("x", &off_curve),
            Err(Sm2Error::InvalidPublicKey(_))
        ));

        assert!(matches!(
            codec.decrypt("04abcd", REF_PRIVATE_KEY),
            Err(Sm2Error::InvalidCiphertext(_))
        ));
        assert!(matches!(
            codec.decrypt("not-hex", REF_PRIVATE_KEY),
            Err(Sm2Error::InvalidCiphertext(_))
        ));

        let ciphertext = codec.encrypt(REF_PLAINTEXT, REF_PUBLIC_KEY).unwrap();
        let compressed = format!("02{}", &ciphertext[2..]);
        assert!(matches!(
            codec.decrypt(&compressed, REF_PRIVATE_KEY),
            Err(Sm2Error::InvalidCiphertext(_))
        ));

        assert!(matches!(
            codec.decrypt(&ciphertext, ""),
            Err(Sm2Error::InvalidPrivateKey(_))
        ));
        assert!(matches!(
            codec.decrypt(&ciphertext, &"0".repeat(64)),
            Err(Sm2Error::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_private_key_without_leading_zero_byte() {
        let codec = Sm2Codec::new();
        let ciphertext = codec.encrypt(REF_PLAINTEXT, REF_PUBLIC_KEY).unwrap();
        // 去掉 Java BigInteger 的符号字节
        assert_eq!(codec.decrypt(&ciphertext, &REF_PRIVATE_KEY[2..]).unwrap(), REF_PLAINTEXT);

        let n = codec.ecc.get_n();
        assert_eq!(
            parse_private_scalar("abc", n).unwrap(),
            parse_private_scalar("0abc", n).unwrap()
        );
    }
}
