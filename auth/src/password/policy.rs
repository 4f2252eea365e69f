use std::fmt;

use thiserror::Error;

/// Character classes a password must draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterClass {
    Uppercase,
    Lowercase,
    Digit,
    Special,
}

impl CharacterClass {
    const ALL: [CharacterClass; 4] = [
        CharacterClass::Uppercase,
        CharacterClass::Lowercase,
        CharacterClass::Digit,
        CharacterClass::Special,
    ];

    fn matches(self, c: char) -> bool {
        match self {
            CharacterClass::Uppercase => c.is_ascii_uppercase(),
            CharacterClass::Lowercase => c.is_ascii_lowercase(),
            CharacterClass::Digit => c.is_ascii_digit(),
            CharacterClass::Special => !c.is_ascii_alphanumeric(),
        }
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CharacterClass::Uppercase => "uppercase letter",
            CharacterClass::Lowercase => "lowercase letter",
            CharacterClass::Digit => "digit",
            CharacterClass::Special => "special character",
        };
        f.write_str(name)
    }
}

/// Reason a password was rejected by [`PasswordPolicy`].
///
/// The message never contains the password itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("Password cannot be empty")]
    Empty,

    #[error("Password must be at least {min} characters long")]
    TooShort { min: usize, actual: usize },

    #[error("Password must contain at least one {}", join_classes(.0))]
    MissingClasses(Vec<CharacterClass>),

    #[error("Password is too common and easily guessable")]
    TooCommon,
}

fn join_classes(classes: &[CharacterClass]) -> String {
    classes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Strength requirements applied before any password is hashed.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    min_length: usize,
    denylist: Vec<String>,
}

impl PasswordPolicy {
    pub const DEFAULT_MIN_LENGTH: usize = 12;

    const COMMON_PASSWORDS: &'static [&'static str] = &[
        "password123",
        "qwerty123",
        "123456789",
        "admin123",
        "welcome1",
        "letmein123",
        "123qwerty",
        "adminadmin",
        "p@ssword1",
        "password123!",
        "p@ssword1234",
        "p@ssw0rd1234",
        "welcome123!!",
        "qwerty123456!",
        "administrator1!",
        "changeme123!",
        "letmein12345!",
        "iloveyou123!",
    ];

    /// Create the default policy: 12 characters, all four character classes,
    /// built-in denylist.
    pub fn new() -> Self {
        Self {
            min_length: Self::DEFAULT_MIN_LENGTH,
            denylist: Self::COMMON_PASSWORDS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    /// Add entries to the common-password denylist.
    pub fn with_denied(mut self, passwords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.denylist
            .extend(passwords.into_iter().map(|p| p.into().to_lowercase()));
        self
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Check a candidate password.
    ///
    /// Checks run in a fixed order and the first failing check is reported:
    /// emptiness, length, character classes (all missing classes at once),
    /// then the denylist.
    ///
    /// # Errors
    /// * `PolicyViolation` describing the first unmet requirement
    pub fn validate(&self, password: &str) -> Result<(), PolicyViolation> {
        if password.is_empty() {
            return Err(PolicyViolation::Empty);
        }

        let length = password.chars().count();
        if length < self.min_length {
            return Err(PolicyViolation::TooShort {
                min: self.min_length,
                actual: length,
            });
        }

        let missing: Vec<CharacterClass> = CharacterClass::ALL
            .into_iter()
            .filter(|class| !password.chars().any(|c| class.matches(c)))
            .collect();
        if !missing.is_empty() {
            return Err(PolicyViolation::MissingClasses(missing));
        }

        if self
            .denylist
            .iter()
            .any(|common| common.eq_ignore_ascii_case(password))
        {
            return Err(PolicyViolation::TooCommon);
        }

        Ok(())
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::new()
    }
}
