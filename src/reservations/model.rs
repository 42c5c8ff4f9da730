//! Reservation record and naming rules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A reservation row. `id` is assigned by the store on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reservation {
    pub id: Option<i64>,
    pub name: String,
}

impl Reservation {
    /// A reservation that has not been saved yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// A name rejected by [`validate_name`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidNameError {
    #[error("Name must not be empty")]
    Empty,

    #[error("the name must start with an upper case letter: '{0}'")]
    NotCapitalized(String),
}

/// Names must be non-empty and start with an upper-case letter.
pub fn validate_name(name: &str) -> Result<(), InvalidNameError> {
    let first = name.chars().next().ok_or(InvalidNameError::Empty)?;
    if !first.is_uppercase() {
        return Err(InvalidNameError::NotCapitalized(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_capitalized_names() {
        assert_eq!(validate_name("Dhaval"), Ok(()));
        assert_eq!(validate_name("Ökan"), Ok(()));
    }

    #[test]
    fn rejects_empty_and_lowercase() {
        assert_eq!(validate_name(""), Err(InvalidNameError::Empty));
        assert_eq!(
            validate_name("bob"),
            Err(InvalidNameError::NotCapitalized("bob".into()))
        );
        assert!(validate_name("1st").is_err());
    }

    #[test]
    fn unsaved_reservation_has_no_id() {
        let reservation = Reservation::new("Ann");
        assert_eq!(reservation.id, None);
        let json = serde_json::to_string(&reservation).unwrap();
        assert_eq!(json, r#"{"id":null,"name":"Ann"}"#);
    }
}
