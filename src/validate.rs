//! Input validation rule helpers.
//!
//! Rules append their messages to a shared list so a validator reports every
//! violation in one pass instead of stopping at the first.

use crate::error::StoreError;

/// Records a message when `value` is blank after trimming.
pub(crate) fn require(errors: &mut Vec<String>, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.push(message.to_string());
    }
}

/// Records a message when `value` exceeds `max` characters.
pub(crate) fn max_len(errors: &mut Vec<String>, value: &str, max: usize, message: &str) {
    if value.chars().count() > max {
        errors.push(message.to_string());
    }
}

/// Turns the accumulated messages into a validation failure, if there are any.
pub(crate) fn finish(errors: Vec<String>) -> Result<(), StoreError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_rejects_blank_and_whitespace() {
        let mut errors = Vec::new();
        require(&mut errors, "", "a is required");
        require(&mut errors, "   ", "b is required");
        require(&mut errors, "ok", "c is required");
        assert_eq!(errors, vec!["a is required", "b is required"]);
    }

    #[test]
    fn max_len_counts_characters_not_bytes() {
        let mut errors = Vec::new();
        max_len(&mut errors, "héllo", 5, "too long");
        assert!(errors.is_empty());
        max_len(&mut errors, "héllo!", 5, "too long");
        assert_eq!(errors, vec!["too long"]);
    }

    #[test]
    fn finish_aggregates_into_one_error() {
        assert!(finish(Vec::new()).is_ok());
        let err = finish(vec!["x".into(), "y".into()]).unwrap_err();
        match err {
            StoreError::Validation(messages) => assert_eq!(messages.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
