//! HTTP Digest access authentication (RFC 7616, with RFC 2617 legacy mode).
//!
//! Parses `WWW-Authenticate` challenges and computes `Authorization` header
//! values. Supported algorithms are `MD5`, `MD5-sess`, `SHA-256` and
//! `SHA-256-sess`; supported quality of protection is `auth` or none.

use std::fmt;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while interpreting a server challenge.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestError {
    /// A required challenge parameter is absent.
    #[error("digest challenge is missing the {0} parameter")]
    MissingParameter(&'static str),

    /// The server asked for a hash algorithm this client does not implement.
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The server only offers `auth-int` or another unknown qop.
    #[error("unsupported digest qop: {0}")]
    UnsupportedQop(String),
}

/// Username and password used to answer challenges.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Hash algorithm named in a digest challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// `MD5` (the default when the parameter is absent).
    Md5,
    /// `MD5-sess`.
    Md5Sess,
    /// `SHA-256`.
    Sha256,
    /// `SHA-256-sess`.
    Sha256Sess,
}

impl DigestAlgorithm {
    fn parse(value: &str) -> Result<Self, DigestError> {
        match value.to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "MD5-SESS" => Ok(Self::Md5Sess),
            "SHA-256" => Ok(Self::Sha256),
            "SHA-256-SESS" => Ok(Self::Sha256Sess),
            _ => Err(DigestError::UnsupportedAlgorithm(value.to_string())),
        }
    }

    fn is_session(self) -> bool {
        matches!(self, Self::Md5Sess | Self::Sha256Sess)
    }

    fn hash(self, data: &str) -> String {
        match self {
            Self::Md5 | Self::Md5Sess => format!("{:x}", md5::compute(data.as_bytes())),
            Self::Sha256 | Self::Sha256Sess => format!("{:x}", Sha256::digest(data.as_bytes())),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
            Self::Sha256 => "SHA-256",
            Self::Sha256Sess => "SHA-256-sess",
        }
    }

    /// Preference when a server offers several digest challenges.
    fn strength(self) -> u8 {
        match self {
            Self::Md5 => 0,
            Self::Md5Sess => 1,
            Self::Sha256 => 2,
            Self::Sha256Sess => 3,
        }
    }
}

/// A parsed `Digest` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    /// Protection space.
    pub realm: String,
    /// Server nonce.
    pub nonce: String,
    /// Opaque value to echo back unchanged.
    pub opaque: Option<String>,
    /// Hash algorithm.
    pub algorithm: DigestAlgorithm,
    /// Whether `qop=auth` is in use (otherwise RFC 2069 compatibility mode).
    pub qop_auth: bool,
    /// Whether the server flagged the previous nonce as stale.
    pub stale: bool,
}

/// One challenge from a `WWW-Authenticate` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    /// `Digest` scheme.
    Digest(DigestChallenge),
    /// `Basic` scheme.
    Basic,
}

/// Parses every challenge found in a `WWW-Authenticate` header value.
///
/// Challenges with unknown schemes are ignored; digest challenges that
/// cannot be answered are reported as errors.
#[must_use]
pub fn parse_challenges(header: &str) -> Vec<Result<Challenge, DigestError>> {
    split_challenges(header)
        .into_iter()
        .filter_map(|(scheme, params)| {
            if scheme.eq_ignore_ascii_case("digest") {
                Some(digest_from_params(&params).map(Challenge::Digest))
            } else if scheme.eq_ignore_ascii_case("basic") {
                Some(Ok(Challenge::Basic))
            } else {
                None
            }
        })
        .collect()
}

/// Picks the challenge to answer from a set of header values: the strongest
/// digest algorithm if any, else `Basic`.
pub fn select_challenge<'a, I>(headers: I) -> Option<Challenge>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best_digest: Option<DigestChallenge> = None;
    let mut basic = false;
    for header in headers {
        for challenge in parse_challenges(header) {
            match challenge {
                Ok(Challenge::Digest(d)) => {
                    let stronger = best_digest
                        .as_ref()
                        .is_none_or(|b| d.algorithm.strength() > b.algorithm.strength());
                    if stronger {
                        best_digest = Some(d);
                    }
                }
                Ok(Challenge::Basic) => basic = true,
                Err(e) => tracing::debug!(error = %e, "ignoring unusable challenge"),
            }
        }
    }
    best_digest
        .map(Challenge::Digest)
        .or_else(|| basic.then_some(Challenge::Basic))
}

impl DigestChallenge {
    /// Computes the `Authorization` header value for one request.
    ///
    /// `uri` is the request target (path and query), `nonce_count` the
    /// 1-based number of times this nonce has been used.
    #[must_use]
    pub fn authorization(
        &self,
        credentials: &Credentials,
        method: &str,
        uri: &str,
        nonce_count: u32,
        cnonce: &str,
    ) -> String {
        let alg = self.algorithm;
        let nc = format!("{nonce_count:08x}");

        let mut ha1 = alg.hash(&format!(
            "{}:{}:{}",
            credentials.username, self.realm, credentials.password
        ));
        if alg.is_session() {
            ha1 = alg.hash(&format!("{ha1}:{}:{cnonce}", self.nonce));
        }
        let ha2 = alg.hash(&format!("{method}:{uri}"));

        let response = if self.qop_auth {
            alg.hash(&format!("{ha1}:{}:{nc}:{cnonce}:auth:{ha2}", self.nonce))
        } else {
            alg.hash(&format!("{ha1}:{}:{ha2}", self.nonce))
        };

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", algorithm={}, response=\"{response}\"",
            quote_escape(&credentials.username),
            quote_escape(&self.realm),
            self.nonce,
            alg.as_str(),
        );
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(", opaque=\"{opaque}\""));
        }
        if self.qop_auth {
            header.push_str(&format!(", qop=auth, nc={nc}, cnonce=\"{cnonce}\""));
        }
        header
    }
}

/// Generates a random client nonce.
#[must_use]
pub fn generate_cnonce() -> String {
    format!("{:016x}", rand::random::<u64>())
}

fn quote_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn digest_from_params(params: &[(String, String)]) -> Result<DigestChallenge, DigestError> {
    let get = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    };

    let realm = get("realm").ok_or(DigestError::MissingParameter("realm"))?;
    let nonce = get("nonce").ok_or(DigestError::MissingParameter("nonce"))?;
    let algorithm = get("algorithm").map_or(Ok(DigestAlgorithm::Md5), DigestAlgorithm::parse)?;

    let qop_auth = match get("qop") {
        None => false,
        Some(qop) => {
            if qop.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth")) {
                true
            } else {
                return Err(DigestError::UnsupportedQop(qop.to_string()));
            }
        }
    };

    Ok(DigestChallenge {
        realm: realm.to_string(),
        nonce: nonce.to_string(),
        opaque: get("opaque").map(str::to_string),
        algorithm,
        qop_auth,
        stale: get("stale").is_some_and(|s| s.eq_ignore_ascii_case("true")),
    })
}

/// Splits a header value into `(scheme, params)` groups.
///
/// A bare token (no `=`) after a comma starts a new challenge. Quoted values
/// may contain commas and backslash escapes.
fn split_challenges(header: &str) -> Vec<(String, Vec<(String, String)>)> {
    let mut challenges: Vec<(String, Vec<(String, String)>)> = Vec::new();
    let mut chars = header.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut token = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' || c.is_whitespace() {
                break;
            }
            token.push(c);
            chars.next();
        }
        while chars.peek().is_some_and(|c| *c == ' ' || *c == '\t') {
            chars.next();
        }

        if chars.peek() == Some(&'=') {
            chars.next();
            while chars.peek().is_some_and(|c| *c == ' ' || *c == '\t') {
                chars.next();
            }
            let value = read_value(&mut chars);
            if let Some((_, params)) = challenges.last_mut() {
                params.push((token, value));
            }
        } else if !token.is_empty() {
            challenges.push((token, Vec::new()));
        }
    }

    challenges
}

fn read_value(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut value = String::new();
    if chars.peek() == Some(&'"') {
        chars.next();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                }
                '"' => break,
                c => value.push(c),
            }
        }
    } else {
        while let Some(&c) = chars.peek() {
            if c == ',' || c.is_whitespace() {
                break;
            }
            value.push(c);
            chars.next();
        }
    }
    value
}
