/// Postgres text values cannot carry NUL bytes.
pub fn reject_nul(field: &str, value: &str) -> Result<(), String> {
    if value.contains('\0') {
        return Err(format!("{} contains invalid characters", field));
    }
    Ok(())
}
