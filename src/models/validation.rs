use chrono::NaiveDate;

use super::{
    CreateDishRequest, CreateRestaurantRequest, ValidationError, ValidationResult,
    VOTE_DATE_FORMAT,
};

/// Trait for validating input models
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

/// Validation constants
pub const MAX_EMAIL_LENGTH: usize = 100;
pub const MIN_RESTAURANT_NAME_LENGTH: usize = 2;
pub const MAX_RESTAURANT_NAME_LENGTH: usize = 100;
pub const MIN_ADDRESS_LENGTH: usize = 5;
pub const MAX_ADDRESS_LENGTH: usize = 100;
pub const MAX_DISH_NAME_LENGTH: usize = 200;

impl Validate for CreateRestaurantRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_length(
            "name",
            &self.name,
            MIN_RESTAURANT_NAME_LENGTH,
            MAX_RESTAURANT_NAME_LENGTH,
        )?;
        validate_length(
            "address",
            &self.address,
            MIN_ADDRESS_LENGTH,
            MAX_ADDRESS_LENGTH,
        )?;
        Ok(())
    }
}

impl Validate for CreateDishRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_length("name", &self.name, 1, MAX_DISH_NAME_LENGTH)?;

        if self.price < 0 {
            return Err(ValidationError::InvalidValue {
                field: "price".to_string(),
                value: self.price.to_string(),
                reason: "Price cannot be negative".to_string(),
            });
        }

        Ok(())
    }
}

/// Validate a voter email
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "email".to_string(),
        });
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max_length: MAX_EMAIL_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    let valid = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !trimmed.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            expected: "local@domain".to_string(),
        });
    }

    Ok(())
}

/// Validate a restaurant identifier
pub fn validate_restaurant_id(id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::InvalidValue {
            field: "restaurant_id".to_string(),
            value: id.to_string(),
            reason: "Restaurant id must be positive".to_string(),
        });
    }

    Ok(())
}

/// Parse an optional `dd.MM.yyyy` date parameter
pub fn parse_vote_date(raw: Option<&str>) -> ValidationResult<Option<NaiveDate>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, VOTE_DATE_FORMAT)
            .map(Some)
            .map_err(|_| ValidationError::InvalidFormat {
                field: "date".to_string(),
                expected: "dd.MM.yyyy".to_string(),
            }),
    }
}

fn validate_length(field: &str, value: &str, min: usize, max: usize) -> ValidationResult<()> {
    let length = value.trim().chars().count();

    if length == 0 {
        return Err(ValidationError::RequiredField {
            field: field.to_string(),
        });
    }

    if length < min {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: format!("Must be at least {} characters", min),
        });
    }

    if length > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max_length: max,
            actual_length: length,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@x.com").is_ok());
        assert!(validate_email("  user@restaurant.ru ").is_ok());

        assert!(matches!(
            validate_email(""),
            Err(ValidationError::RequiredField { .. })
        ));
        assert!(matches!(
            validate_email("no-at-sign"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(validate_email("@x.com").is_err());
        assert!(validate_email("a@").is_err());
        assert!(validate_email("a@b@c").is_err());
        assert!(validate_email("a b@x.com").is_err());

        let long = format!("{}@x.com", "a".repeat(MAX_EMAIL_LENGTH));
        assert!(matches!(
            validate_email(&long),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_restaurant_id() {
        assert!(validate_restaurant_id(1).is_ok());
        assert!(validate_restaurant_id(0).is_err());
        assert!(validate_restaurant_id(-5).is_err());
    }

    #[test]
    fn test_parse_vote_date() {
        assert_eq!(parse_vote_date(None).unwrap(), None);
        assert_eq!(parse_vote_date(Some("")).unwrap(), None);
        assert_eq!(
            parse_vote_date(Some("31.12.2023")).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );

        assert!(parse_vote_date(Some("2023-12-31")).is_err());
        assert!(parse_vote_date(Some("31.02.2023")).is_err());
        assert!(parse_vote_date(Some("tomorrow")).is_err());
    }

    #[test]
    fn test_create_restaurant_request_validation() {
        let valid = CreateRestaurantRequest {
            name: "Pelmennaya".to_string(),
            address: "Tverskaya 1".to_string(),
        };
        assert!(valid.validate().is_ok());

        let short_name = CreateRestaurantRequest {
            name: "P".to_string(),
            address: "Tverskaya 1".to_string(),
        };
        assert!(short_name.validate().is_err());

        let long_address = CreateRestaurantRequest {
            name: "Pelmennaya".to_string(),
            address: "a".repeat(MAX_ADDRESS_LENGTH + 1),
        };
        assert!(matches!(
            long_address.validate(),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_create_dish_request_validation() {
        let dish = |name: &str, price: i64| CreateDishRequest {
            name: name.to_string(),
            price,
        };

        assert!(dish("Borscht", 350).validate().is_ok());
        assert!(dish("Free bread", 0).validate().is_ok());
        assert!(matches!(
            dish("   ", 100).validate(),
            Err(ValidationError::RequiredField { .. })
        ));
        assert!(matches!(
            dish("Borscht", -1).validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
        assert!(matches!(
            dish(&"x".repeat(MAX_DISH_NAME_LENGTH + 1), 100).validate(),
            Err(ValidationError::TooLong { .. })
        ));
    }
}
