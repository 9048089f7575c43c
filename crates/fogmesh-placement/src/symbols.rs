//! Symbol table mapping user-supplied names to solver-safe tokens.
//!
//! Names may contain characters that are not valid bare atoms in the
//! solver's fact syntax (hyphens, leading digits, punctuation). Every such
//! string is swapped for a fixed-length lowercase token before encoding and
//! swapped back when reading results.
//!
//! A table is not synchronized. Each resolution allocates its own.

use std::collections::HashMap;

use rand::Rng;
use rand::rngs::StdRng;

/// Length of every issued token.
pub const TOKEN_LENGTH: usize = 8;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Bidirectional name ↔ token mapping.
#[derive(Debug)]
pub struct SymbolTable<R = StdRng> {
    by_token: HashMap<String, String>,
    by_name: HashMap<String, String>,
    rng: R,
}

impl<R: Rng> SymbolTable<R> {
    pub fn new(rng: R) -> Self {
        Self {
            by_token: HashMap::new(),
            by_name: HashMap::new(),
            rng,
        }
    }

    /// Return the token for `name`, minting one on first sight.
    pub fn add(&mut self, name: &str) -> String {
        if let Some(token) = self.by_name.get(name) {
            return token.clone();
        }

        let token = loop {
            let candidate = self.mint();
            if !self.by_token.contains_key(&candidate) {
                break candidate;
            }
        };

        self.by_token.insert(token.clone(), name.to_string());
        self.by_name.insert(name.to_string(), token.clone());
        token
    }

    /// Tokenize every entry of a list.
    pub fn add_all(&mut self, names: &[String]) -> Vec<String> {
        names.iter().map(|n| self.add(n)).collect()
    }

    pub fn get_by_token(&self, token: &str) -> Option<&str> {
        self.by_token.get(token).map(String::as_str)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    fn mint(&mut self) -> String {
        (0..TOKEN_LENGTH)
            .map(|_| CHARSET[self.rng.gen_range(0..CHARSET.len())] as char)
            .collect()
    }
}
