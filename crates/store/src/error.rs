// SPDX-License-Identifier: MIT

use flowctl_core::TokenId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token {0} not found")]
    TokenNotFound(TokenId),

    #[error("token {0} already exists")]
    DuplicateToken(TokenId),
}
