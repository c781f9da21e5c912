/// Helper macro for reading guarded items where a lock violation is impossible
///
/// Only use this when the closure cannot re-enter the same [`crate::utils::Guarded`],
/// otherwise the recursion check turns into a panic.
///
/// ```rust, ignore
///  let len = with_read!(self.items, |items: &Vec<_>| items.len());
/// ```
macro_rules! with_read {
    ($guarded:expr, $closure:expr) => {
        $guarded
            .read($closure)
            .expect("Failed to acquire read lock")
    };
}

