//! One-Time Password generation
//!
//! # otp
//!
//! This module houses the implementation of RFC6238 and RFC4226 for use in
//! generating Time-based One-Time Passwords from an entry's `otp_secret`,
//! which is either a bare base32 seed or an `otpauth://` key URI.

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use data_encoding::BASE32_NOPAD;
use once_cell::sync::Lazy;
use regex::Regex;
use ring::hmac;

use crate::AutopassError;

pub const DEFAULT_DIGITS: usize = 6;
pub const DEFAULT_PERIOD: u64 = 30;
/// A truncated HMAC is below 2^31, so more than 9 digits adds only zeros.
pub const MAX_DIGITS: usize = 9;

// https://github.com/google/google-authenticator/wiki/Key-Uri-Format
static KEY_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^otpauth://(?P<type>totp|hotp)/(?P<label>[^?#]*)\?(?P<query>[^#]*)$")
        .expect("key uri regex is valid")
});

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl Default for HashAlgorithm {
    fn default() -> HashAlgorithm {
        HashAlgorithm::Sha1
    }
}

impl FromStr for HashAlgorithm {
    type Err = AutopassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            algo => Err(AutopassError::InvalidHashFunction(algo.to_owned())),
        }
    }
}

/// Decodes a base32 seed, ignoring case, whitespace and padding.
pub fn decode_base32<S>(secret: S) -> Result<Vec<u8>>
where
    S: AsRef<str>,
{
    let secret = secret
        .as_ref()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .collect::<String>()
        .to_ascii_uppercase();

    BASE32_NOPAD
        .decode(secret.as_bytes())
        .map_err(|_| AutopassError::InvalidBase32.into())
}

macro_rules! otp_builder {
    ($t:ty) => {
        pub fn secret<V>(&mut self, secret: V) -> &mut $t
        where
            V: AsRef<[u8]>,
        {
            self.key = secret.as_ref().to_vec();

            self
        }

        pub fn base32_secret<S>(&mut self, secret: S) -> Result<&mut $t>
        where
            S: AsRef<str>,
        {
            self.key = decode_base32(secret)?;

            Ok(self)
        }

        /// Clamped to `1..=MAX_DIGITS`.
        pub fn output_len(&mut self, output_len: usize) -> &mut $t {
            self.output_len = output_len.max(1).min(MAX_DIGITS);

            self
        }

        pub fn algorithm(&mut self, algo: HashAlgorithm) -> &mut $t {
            self.algo = algo;

            self
        }
    };
}

#[derive(Debug)]
pub struct HOTPBuilder {
    key: Vec<u8>,
    counter: u64,
    output_len: usize,
    algo: HashAlgorithm,
}

impl Default for HOTPBuilder {
    fn default() -> Self {
        HOTPBuilder {
            key: Vec::new(),
            counter: 0,
            output_len: DEFAULT_DIGITS,
            algo: HashAlgorithm::default(),
        }
    }
}

impl HOTPBuilder {
    otp_builder!(HOTPBuilder);

    pub fn counter(&mut self, counter: u64) -> &mut HOTPBuilder {
        self.counter = counter;

        self
    }

    pub fn build(&self) -> HOTP {
        HOTP {
            key: self.key.clone(),
            counter: self.counter,
            output_len: self.output_len,
            algo: self.algo,
        }
    }
}

#[derive(Debug)]
pub struct HOTP {
    key: Vec<u8>,
    counter: u64,
    output_len: usize,
    algo: HashAlgorithm,
}

/// See RFC4226 for more information: https://tools.ietf.org/html/rfc4226
impl HOTP {
    pub fn generate(&self) -> String {
        // "The Key (K), the Counter (C), and Data values are hashed high-order byte first."
        let moving_factor = self.counter.to_be_bytes();

        let key = match self.algo {
            HashAlgorithm::Sha1 => hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, &self.key),
            HashAlgorithm::Sha256 => hmac::Key::new(hmac::HMAC_SHA256, &self.key),
            HashAlgorithm::Sha512 => hmac::Key::new(hmac::HMAC_SHA512, &self.key),
        };

        // HS = HMAC-SHA(K, C)
        let hmac_result = hmac::sign(&key, &moving_factor);
        let hmac_result = hmac_result.as_ref();

        // `offset` is in the range 0..15, inclusive; every digest is at least
        // 20 bytes long, so `offset + 3` is always in bounds
        let offset = (hmac_result[hmac_result.len() - 1] & 0xf) as usize;

        // Convert the hmac_result (S) to a number in 0..2^{31}-1
        let snum = u32::from_be_bytes([
            hmac_result[offset] & 0x7f,
            hmac_result[offset + 1],
            hmac_result[offset + 2],
            hmac_result[offset + 3],
        ]);

        // `code` is Snum mod 10^Digit
        let code = u64::from(snum) % 10_u64.pow(self.output_len as u32);
        format!("{:0width$}", code, width = self.output_len)
    }
}

#[derive(Debug)]
pub struct TOTPBuilder {
    key: Vec<u8>,
    output_len: usize,
    algo: HashAlgorithm,
    period: u64,
}

impl Default for TOTPBuilder {
    fn default() -> Self {
        TOTPBuilder {
            key: Vec::new(),
            output_len: DEFAULT_DIGITS,
            algo: HashAlgorithm::default(),
            period: DEFAULT_PERIOD,
        }
    }
}

impl TOTPBuilder {
    otp_builder!(TOTPBuilder);

    pub fn period(&mut self, period: u64) -> &mut TOTPBuilder {
        self.period = period.max(1);

        self
    }

    pub fn build(&self) -> TOTP {
        TOTP {
            key: self.key.clone(),
            output_len: self.output_len,
            algo: self.algo,
            period: self.period,
        }
    }
}

#[derive(Debug)]
pub struct TOTP {
    key: Vec<u8>,
    output_len: usize,
    algo: HashAlgorithm,
    period: u64,
}

/// For more information see RFC6238: https://tools.ietf.org/html/rfc6238
impl TOTP {
    /// Builds a generator from an `otp_secret` attribute: either a bare
    /// base32 seed (SHA1, 6 digits, 30 seconds) or an `otpauth://totp/` URI.
    pub fn from_secret<S>(secret: S) -> Result<TOTP>
    where
        S: AsRef<str>,
    {
        let secret = secret.as_ref().trim();

        if !secret.starts_with("otpauth://") {
            return Ok(TOTPBuilder::default().base32_secret(secret)?.build());
        }

        let captures = KEY_URI
            .captures(secret)
            .ok_or(AutopassError::InvalidKeyUri)?;
        if &captures["type"] != "totp" {
            // counters are never persisted back to the store
            return Err(AutopassError::InvalidKeyUri.into());
        }

        let mut builder = TOTPBuilder::default();
        let mut has_secret = false;

        for (key, value) in captures["query"]
            .split('&')
            .filter_map(|pair| pair.split_once('='))
        {
            match key {
                "secret" => {
                    builder.base32_secret(value)?;
                    has_secret = true;
                }
                "algorithm" => {
                    builder.algorithm(value.parse()?);
                }
                "digits" => {
                    let digits = value
                        .parse::<usize>()
                        .ok()
                        .filter(|digits| (1..=MAX_DIGITS).contains(digits))
                        .ok_or(AutopassError::InvalidKeyUri)?;
                    builder.output_len(digits);
                }
                "period" => {
                    let period = value
                        .parse::<u64>()
                        .map_err(|_| AutopassError::InvalidKeyUri)?;
                    builder.period(period);
                }
                _ => {}
            }
        }

        if !has_secret {
            return Err(AutopassError::InvalidKeyUri.into());
        }

        Ok(builder.build())
    }

    fn counter(&self, timestamp: u64) -> u64 {
        timestamp / self.period
    }

    /// The code valid at `timestamp` (seconds since the UNIX epoch).
    pub fn generate_at(&self, timestamp: u64) -> String {
        HOTPBuilder::default()
            .secret(&self.key)
            .counter(self.counter(timestamp))
            .output_len(self.output_len)
            .algorithm(self.algo)
            .build()
            .generate()
    }

    pub fn generate(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        self.generate_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // base32("12345678901234567890"), the RFC6238 SHA1 test seed
    const RFC_SEED: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn hotp_rfc4226_vectors() {
        let expected = ["755224", "287082", "359152", "969429", "338314"];

        for (counter, code) in expected.iter().enumerate() {
            let hotp = HOTPBuilder::default()
                .secret("12345678901234567890")
                .counter(counter as u64)
                .build();
            assert_eq!(&hotp.generate(), code);
        }
    }

    #[test]
    fn totp_rfc6238_vectors() {
        let totp = TOTPBuilder::default()
            .secret("12345678901234567890")
            .output_len(8)
            .build();

        assert_eq!(totp.generate_at(59), "94287082");
        assert_eq!(totp.generate_at(1_111_111_109), "07081804");
        assert_eq!(totp.generate_at(1_234_567_890), "89005924");

        let sha256 = TOTPBuilder::default()
            .secret("12345678901234567890123456789012")
            .algorithm(HashAlgorithm::Sha256)
            .output_len(8)
            .build();
        assert_eq!(sha256.generate_at(59), "46119246");

        let sha512 = TOTPBuilder::default()
            .secret("1234567890123456789012345678901234567890123456789012345678901234")
            .algorithm(HashAlgorithm::Sha512)
            .output_len(8)
            .build();
        assert_eq!(sha512.generate_at(59), "90693936");
    }

    #[test]
    fn bare_seed_defaults() {
        let totp = TOTP::from_secret(RFC_SEED).unwrap();

        assert_eq!(totp.generate_at(59), "287082");
        assert_eq!(totp.generate_at(59), totp.generate_at(30));
        assert_ne!(totp.generate_at(59), totp.generate_at(60));
    }

    #[test]
    fn base32_is_lenient() {
        let lower = TOTP::from_secret("gezd gnbv gy3t qojq gezd gnbv gy3t qojq").unwrap();

        assert_eq!(lower.generate_at(59), "287082");
        assert!(decode_base32("JBSWY3DPEHPK3PXP====").is_ok());
        assert!(TOTP::from_secret("not base32!").is_err());
    }

    #[test]
    fn key_uri_parameters() {
        let uri = format!(
            "otpauth://totp/Example:alice@example.com?secret={}&issuer=Example&digits=8&period=60",
            RFC_SEED
        );
        let totp = TOTP::from_secret(uri).unwrap();

        // counter 1 covers 60..=119 with a 60 second period
        assert_eq!(totp.generate_at(119), "94287082");
    }

    #[test]
    fn key_uri_errors() {
        assert!(TOTP::from_secret("otpauth://totp/label?issuer=x").is_err());
        assert!(TOTP::from_secret("otpauth://hotp/label?secret=JBSWY3DP&counter=1").is_err());
        assert!(TOTP::from_secret("otpauth://totp/label?secret=JBSWY3DP&algorithm=md5").is_err());
        assert!(TOTP::from_secret("otpauth://totp/label?secret=JBSWY3DP&digits=six").is_err());
        assert!(TOTP::from_secret("otpauth://totp/label?secret=JBSWY3DP&digits=0").is_err());
        assert!(TOTP::from_secret("otpauth://totp/label?secret=JBSWY3DP&digits=20").is_err());
    }

    #[test]
    fn output_len_is_clamped() {
        let code = HOTPBuilder::default()
            .secret("12345678901234567890")
            .output_len(20)
            .build()
            .generate();
        assert_eq!(code.len(), MAX_DIGITS);

        let code = TOTPBuilder::default()
            .base32_secret(RFC_SEED)
            .unwrap()
            .output_len(0)
            .build()
            .generate_at(59);
        assert_eq!(code.len(), 1);
    }

    #[test]
    fn algorithm_names() {
        assert_eq!("SHA256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("sha512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }
}
