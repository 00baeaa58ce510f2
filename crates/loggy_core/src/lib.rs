pub mod chains;
pub mod deep;
pub mod demo;
pub mod detect;
pub mod domain;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod registry;
pub mod score;
pub mod signatures;
pub mod store;

#[cfg(test)]
mod tests {
    use super::error::AppError;

    #[test]
    fn app_error_is_structured() {
        let err = AppError::new("DETECTOR_TEST", "detector failed").with_retryable(false);
        assert_eq!(err.code, "DETECTOR_TEST");
        assert_eq!(err.message, "detector failed");
        assert_eq!(err.retryable, false);
    }
}
