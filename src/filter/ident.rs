//! SQL identifier validation shared by the filter compiler and the store.

use super::error::FilterError;

pub fn validate_table_name(name: &str) -> Result<(), FilterError> {
    if !is_valid_ident(name) {
        return Err(FilterError::InvalidIdentifier(format!("table name {:?}", name)));
    }
    Ok(())
}

pub fn validate_column(name: &str) -> Result<(), FilterError> {
    if !is_valid_ident(name) {
        return Err(FilterError::InvalidIdentifier(format!("column name {:?}", name)));
    }
    Ok(())
}

fn is_valid_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_snake_case_identifiers() {
        assert!(validate_table_name("safety_classes").is_ok());
        assert!(validate_column("firm_id").is_ok());
        assert!(validate_column("_private").is_ok());
    }

    #[test]
    fn rejects_injection_shapes() {
        assert!(validate_table_name("firms\"; DROP").is_err());
        assert!(validate_column("id = id --").is_err());
        assert!(validate_column("1st").is_err());
        assert!(validate_column("").is_err());
    }
}
