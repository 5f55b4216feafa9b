use std::collections::HashSet;
use std::sync::Arc;

/// Caller predicate over `(hash, sender, receiver)`.
///
/// Runs before any enrichment lookup, so it must be pure and cheap.
pub type InclusionFilter = Arc<dyn Fn(&str, &str, &str) -> bool + Send + Sync>;

pub fn accept_all() -> InclusionFilter {
    Arc::new(|_, _, _| true)
}

/// Accept candidates whose sender or receiver is one of `addresses`
pub fn watch_addresses<I, S>(addresses: I) -> InclusionFilter
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let watched: HashSet<String> = addresses.into_iter().map(Into::into).collect();
    Arc::new(move |_, sender, receiver| watched.contains(sender) || watched.contains(receiver))
}

pub fn from_fn<F>(predicate: F) -> InclusionFilter
where
    F: Fn(&str, &str, &str) -> bool + Send + Sync + 'static,
{
    Arc::new(predicate)
}
