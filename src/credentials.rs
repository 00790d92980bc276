//! Synthetic signup credentials.
//!
//! Generated values are plausible enough to satisfy typical form validation:
//! the email is derived from the generated name, and the password meets common
//! length and character-class rules. The confirmation field always equals the
//! password.

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

const FIRST_NAMES: &[&str] = &[
    "Ava", "Liam", "Mia", "Noah", "Zoe", "Ethan", "Ruby", "Owen", "Ivy", "Leo", "Nora", "Finn",
    "Elsa", "Jude", "Cora", "Rhys",
];

const LAST_NAMES: &[&str] = &[
    "Harper", "Bennett", "Walsh", "Donovan", "Mercer", "Calloway", "Sutton", "Vaughn", "Ellison",
    "Prescott", "Whitfield", "Lockhart",
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "mailinator.com"];

const PASSWORD_CHARS: &[u8] = b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// One set of signup values for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSet {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl CredentialSet {
    /// Generate a fresh credential set using the thread-local RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        // Slices are non-empty constants, so choose never returns None.
        let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Ava");
        let last = LAST_NAMES.choose(rng).copied().unwrap_or("Harper");
        let domain = EMAIL_DOMAINS.choose(rng).copied().unwrap_or("example.com");

        let suffix: u32 = rng.gen_range(100..10_000);
        let email = format!(
            "{}.{}{}@{}",
            first.to_ascii_lowercase(),
            last.to_ascii_lowercase(),
            suffix,
            domain
        );

        let mut password: String = (0..10)
            .map(|_| {
                let idx = rng.gen_range(0..PASSWORD_CHARS.len());
                PASSWORD_CHARS[idx] as char
            })
            .collect();
        // Guarantee a digit and a symbol regardless of the random draw.
        password.push(char::from(b'0' + rng.gen_range(2..10)));
        password.push('!');

        CredentialSet {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email,
            password: password.clone(),
            confirm_password: password,
        }
    }
}
