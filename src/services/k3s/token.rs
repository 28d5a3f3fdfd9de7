//! Cluster join token

use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;

/// Length of generated tokens
pub const TOKEN_LENGTH: usize = 32;

const ALPHANUMERIC: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

// Used only when the OS random source cannot be read
const INSECURE_PLACEHOLDER: &str = "K3sWizardInsecurePlaceholder0000";

/// Where a token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrigin {
    Supplied,
    Generated,
    /// Fixed placeholder, the random source was unavailable
    InsecureFallback,
}

/// Shared cluster secret. `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    secret: String,
    origin: TokenOrigin,
}

impl Token {
    /// Accept an operator-supplied token, trimmed. Returns `None` if it fails `validate_format`.
    pub fn supplied(value: &str) -> Option<Self> {
        validate_format(value).then(|| Self {
            secret: value.trim().to_string(),
            origin: TokenOrigin::Supplied,
        })
    }

    #[cfg(test)]
    pub(crate) fn fixed(secret: &str, origin: TokenOrigin) -> Self {
        Self {
            secret: secret.to_string(),
            origin,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.secret
    }

    pub fn origin(&self) -> TokenOrigin {
        self.origin
    }

    pub fn is_insecure(&self) -> bool {
        self.origin == TokenOrigin::InsecureFallback
    }

    /// First and last four characters, for operator display
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.secret.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("secret", &"<redacted>")
            .field("origin", &self.origin)
            .finish()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Rejects empty or whitespace-only tokens, and tokens containing whitespace
pub fn validate_format(token: &str) -> bool {
    let trimmed = token.trim();
    !trimmed.is_empty() && !trimmed.chars().any(char::is_whitespace)
}

/// Source of new cluster tokens
pub trait TokenSource {
    fn generate(&self) -> Token;
}

/// Draws tokens from the operating system's CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenProvisioner;

impl TokenSource for TokenProvisioner {
    fn generate(&self) -> Token {
        generate_from(&mut OsRng)
    }
}

/// Generate a token from `rng`, falling back to the insecure placeholder if it fails
pub fn generate_from<R: RngCore + ?Sized>(rng: &mut R) -> Token {
    let mut secret = String::with_capacity(TOKEN_LENGTH);
    let mut buf = [0u8; 64];

    while secret.len() < TOKEN_LENGTH {
        if let Err(e) = rng.try_fill_bytes(&mut buf) {
            tracing::warn!(error = %e, "random source unavailable, using insecure placeholder token");
            return Token {
                secret: INSECURE_PLACEHOLDER.to_string(),
                origin: TokenOrigin::InsecureFallback,
            };
        }
        // Rejection sampling keeps the distribution uniform: 248 = 4 * 62
        for b in buf.iter().filter(|b| **b < 248) {
            if secret.len() == TOKEN_LENGTH {
                break;
            }
            secret.push(ALPHANUMERIC[(*b % 62) as usize] as char);
        }
    }

    Token {
        secret,
        origin: TokenOrigin::Generated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, _dest: &mut [u8]) {}
        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::other("no entropy")))
        }
    }

    #[test]
    fn test_generated_token_shape() {
        let token = TokenProvisioner.generate();
        assert_eq!(token.as_str().len(), TOKEN_LENGTH);
        assert!(token.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(token.origin(), TokenOrigin::Generated);
    }

    #[test]
    fn test_generated_tokens_differ() {
        let a = TokenProvisioner.generate();
        let b = TokenProvisioner.generate();
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_fallback_is_flagged_insecure() {
        let token = generate_from(&mut BrokenRng);
        assert!(token.is_insecure());
        assert_eq!(token.as_str().len(), TOKEN_LENGTH);
    }

    #[test]
    fn test_validate_format() {
        assert!(validate_format("abc123"));
        assert!(validate_format("  K10abc::server:def  "));
        assert!(!validate_format(""));
        assert!(!validate_format("   \t"));
        assert!(!validate_format("two words"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let token = Token::supplied("supersecretvalue123").unwrap();
        let debug = format!("{:?}", token);
        assert!(!debug.contains("supersecretvalue123"));
        assert_eq!(token.to_string(), "supe...e123");
    }

    #[test]
    fn test_masked_handles_multibyte_tokens() {
        let token = Token::supplied("aéééé1234").unwrap();
        assert_eq!(token.to_string(), "aééé...1234");
        assert_eq!(Token::supplied("ééé").unwrap().masked(), "***");
    }
}
