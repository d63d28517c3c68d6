//! Input validation helpers shared by the backend services

/// Validate a document line quantity (strictly positive)
pub fn validate_qty(qty: i64) -> Result<(), &'static str> {
    if qty <= 0 {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a counted quantity supplied by a stock take (zero allowed)
pub fn validate_counted_qty(qty: i64) -> Result<(), &'static str> {
    if qty < 0 {
        return Err("Counted quantity cannot be negative");
    }
    Ok(())
}

/// Validate a product reorder level (zero allowed)
pub fn validate_reorder_level(level: i64) -> Result<(), &'static str> {
    if level < 0 {
        return Err("Reorder level cannot be negative");
    }
    Ok(())
}

/// Validate an entity display name
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("Name cannot be empty");
    }
    if name.len() > 200 {
        return Err("Name must be at most 200 characters");
    }
    Ok(())
}

/// Validate a stock keeping unit code
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.trim().is_empty() {
        return Err("SKU cannot be empty");
    }
    if sku.len() > 64 {
        return Err("SKU must be at most 64 characters");
    }
    if sku.chars().any(char::is_whitespace) {
        return Err("SKU cannot contain whitespace");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qty_must_be_positive() {
        assert!(validate_qty(1).is_ok());
        assert!(validate_qty(0).is_err());
        assert!(validate_qty(-5).is_err());
    }

    #[test]
    fn test_counted_qty_allows_zero() {
        assert!(validate_counted_qty(0).is_ok());
        assert!(validate_counted_qty(42).is_ok());
        assert!(validate_counted_qty(-1).is_err());
    }

    #[test]
    fn test_sku_rules() {
        assert!(validate_sku("WIDGET-001").is_ok());
        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
    }

    #[test]
    fn test_name_rules() {
        assert!(validate_name("Main Warehouse").is_ok());
        assert!(validate_name("  ").is_err());
    }
}
