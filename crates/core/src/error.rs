// SPDX-License-Identifier: MIT

//! The `flowctl-core` error taxonomy.

use crate::ids::{NodeId, TokenId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("condition expression error: {0}")]
    Expr(#[from] crate::expr::ExprError),

    #[error("token {0} not found")]
    TokenNotFound(TokenId),

    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("invalid context path: {0}")]
    InvalidPath(String),
}
