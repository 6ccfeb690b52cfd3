use validator::{Validate, ValidationErrors};

use crate::errors::AppError;

fn describe(err: ValidationErrors) -> String {
    let details = err
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let errors = errs
                .iter()
                .map(|e| e.code.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}: [{}]", field, errors)
        })
        .collect::<Vec<_>>()
        .join("; ");
    format!("Validation failed: {}", details)
}

pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), AppError> {
    payload.validate().map_err(|err| AppError::Validation(describe(err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Payload {
        #[validate(length(min = 1))]
        title: String,
    }

    #[test]
    fn empty_required_field_is_named_in_the_detail() {
        let err = validate_payload(&Payload { title: String::new() }).unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("title")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn valid_payload_passes() {
        assert!(validate_payload(&Payload { title: "hi".into() }).is_ok());
    }
}
