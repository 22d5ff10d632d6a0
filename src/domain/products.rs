//! Product field rules applied before any I/O.

use super::error::DomainError;

pub const NAME_MAX_CHARS: usize = 200;

/// Validated mutable fields of a product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    name: String,
    price: f64,
}

impl ProductDraft {
    pub fn new(name: &str, price: f64) -> Result<Self, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name", "must not be empty"));
        }
        if name.chars().count() > NAME_MAX_CHARS {
            return Err(DomainError::validation(
                "name",
                format!("must be at most {NAME_MAX_CHARS} characters"),
            ));
        }

        if !price.is_finite() {
            return Err(DomainError::validation("price", "must be a finite number"));
        }
        if price < 0.0 {
            return Err(DomainError::validation("price", "must not be negative"));
        }

        Ok(Self {
            name: name.to_string(),
            price,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn into_parts(self) -> (String, f64) {
        (self.name, self.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_name() {
        let draft = ProductDraft::new("  Widget ", 9.99).expect("valid draft");
        assert_eq!(draft.name(), "Widget");
        assert_eq!(draft.price(), 9.99);
    }

    #[test]
    fn rejects_blank_name() {
        let err = ProductDraft::new("   ", 1.0).unwrap_err();
        assert_eq!(err.field(), "name");
    }

    #[test]
    fn rejects_overlong_name() {
        let name = "x".repeat(NAME_MAX_CHARS + 1);
        let err = ProductDraft::new(&name, 1.0).unwrap_err();
        assert_eq!(err.field(), "name");

        let name = "x".repeat(NAME_MAX_CHARS);
        assert!(ProductDraft::new(&name, 1.0).is_ok());
    }

    #[test]
    fn rejects_negative_and_non_finite_price() {
        assert_eq!(ProductDraft::new("a", -0.01).unwrap_err().field(), "price");
        assert_eq!(
            ProductDraft::new("a", f64::NAN).unwrap_err().field(),
            "price"
        );
        assert_eq!(
            ProductDraft::new("a", f64::INFINITY).unwrap_err().field(),
            "price"
        );
        assert!(ProductDraft::new("free sample", 0.0).is_ok());
    }
}
