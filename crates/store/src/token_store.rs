// SPDX-License-Identifier: MIT

//! `tokens`: the run's token table. Guarded by a single `parking_lot`
//! mutex — the single-actor-per-run invariant means there is never
//! meaningful contention, only the convenience of `Sync` access.

use crate::error::StoreError;
use flowctl_core::{SiblingGroup, Token, TokenId, TokenStatus};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct TokenStore {
    tokens: Mutex<HashMap<TokenId, Token>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: Token) -> Result<(), StoreError> {
        let mut guard = self.tokens.lock();
        if guard.contains_key(&token.id) {
            return Err(StoreError::DuplicateToken(token.id));
        }
        guard.insert(token.id, token);
        Ok(())
    }

    pub fn get(&self, id: TokenId) -> Result<Token, StoreError> {
        self.tokens.lock().get(&id).cloned().ok_or(StoreError::TokenNotFound(id))
    }

    pub fn try_get(&self, id: TokenId) -> Option<Token> {
        self.tokens.lock().get(&id).cloned()
    }

    /// Attempt a status transition. Returns `false` (no-op) if the token
    /// is already terminal, mirroring [`Token::transition`]'s guard.
    pub fn update_status(&self, id: TokenId, status: TokenStatus, now_ms: u64) -> Result<bool, StoreError> {
        let mut guard = self.tokens.lock();
        let token = guard.get_mut(&id).ok_or(StoreError::TokenNotFound(id))?;
        Ok(token.transition(status, now_ms))
    }

    pub fn mark_arrived(&self, id: TokenId, arrived_at_ms: u64) -> Result<(), StoreError> {
        let mut guard = self.tokens.lock();
        let token = guard.get_mut(&id).ok_or(StoreError::TokenNotFound(id))?;
        token.arrived_at_ms = Some(arrived_at_ms);
        Ok(())
    }

    pub fn siblings_in_group(&self, group: &SiblingGroup) -> Vec<Token> {
        self.tokens.lock().values().filter(|t| t.sibling_group.as_ref() == Some(group)).cloned().collect()
    }

    pub fn active_tokens(&self) -> Vec<Token> {
        self.tokens.lock().values().filter(|t| !t.status.is_terminal()).cloned().collect()
    }

    pub fn waiting_tokens(&self) -> Vec<Token> {
        self.tokens.lock().values().filter(|t| t.status.is_waiting()).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "token_store_tests.rs"]
mod tests;
