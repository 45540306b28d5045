//! In-memory secret material.
//!
//! `Secret` owns a plaintext password for exactly as long as the procedure
//! needs it. The buffer is overwritten with zeros when the value is dropped,
//! which covers normal returns, `?` propagation and unwinding alike.
//!
//! # Security Guarantees
//!
//! 1. **Scrubbed on drop**: `ZeroizeOnDrop` wipes the heap buffer
//! 2. **Never printed**: `Debug` is redacted and there is no `Display`
//! 3. **No accidental copies**: no `Clone`; callers borrow via `as_bytes()`

use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    value: String,
    #[zeroize(skip)]
    confirmed: bool,
}

impl Secret {
    pub fn new(value: String) -> Self {
        Self {
            value,
            confirmed: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Compare against a second entry and mark this secret confirmed on a
    /// match. The confirmation copy is consumed, and therefore wiped, either way.
    pub fn confirm_with(&mut self, confirmation: Secret) -> bool {
        let matches = constant_time_eq(self.as_bytes(), confirmation.as_bytes());
        drop(confirmation);
        self.confirmed = matches;
        matches
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("value", &"[REDACTED]")
            .field("confirmed", &self.confirmed)
            .finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
