//! Temporary password generation from operating-system entropy.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;

use crate::domain::TemporaryPassword;
use crate::domain::ports::PasswordGenerator;

const PASSWORD_LENGTH: usize = 12;
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const PUNCTUATION: &[u8] = b"!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Draws 12 characters from letters, digits and punctuation with [`OsRng`],
/// redrawing until every character class is represented.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsPasswordGenerator;

impl PasswordGenerator for OsPasswordGenerator {
    fn generate(&self) -> TemporaryPassword {
        let alphabet = [LOWERCASE, UPPERCASE, DIGITS, PUNCTUATION].concat();
        loop {
            let candidate = (0..PASSWORD_LENGTH)
                .filter_map(|_| alphabet.choose(&mut OsRng).copied().map(char::from))
                .collect::<String>();
            if covers_every_class(&candidate) {
                return TemporaryPassword::new(candidate);
            }
        }
    }
}

fn covers_every_class(candidate: &str) -> bool {
    [LOWERCASE, UPPERCASE, DIGITS, PUNCTUATION]
        .iter()
        .all(|class| candidate.bytes().any(|byte| class.contains(&byte)))
}
