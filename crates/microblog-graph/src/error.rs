use thiserror::Error;

use crate::schema::Entity;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: Entity, key: String },

    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    #[error("{field} already taken: {value}")]
    AlreadyExists { field: &'static str, value: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

impl GraphError {
    pub fn not_found(entity: Entity, key: impl ToString) -> Self {
        GraphError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
