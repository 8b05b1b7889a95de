use uuid::Uuid;

/// Failures of grocery list generation and editing.
///
/// Silent and manual regeneration surface the same variants and text.
#[derive(Debug, thiserror::Error)]
pub enum GroceryError {
    /// A read from the store failed; nothing was mutated.
    #[error("failed to load grocery data: {0:#}")]
    Fetch(anyhow::Error),
    /// Deleting or inserting grocery rows failed; the list is left as the store left it.
    #[error("failed to save grocery list: {0:#}")]
    Write(anyhow::Error),
    #[error("grocery item {0} not found")]
    ItemNotFound(Uuid),
}
