use bon::Builder;

use crate::{heap::HeapStrategy, tre::TreRegistry};

/// Settings for reading a file
///
/// ```rust
/// use libnitf::{HeapStrategy, ParseOptions, SpoolPredicate, TreRegistry};
///
/// let options = ParseOptions::builder()
///     .heap(
///         HeapStrategy::builder()
///             .max_length(64 * 1024 * 1024)
///             .spool(SpoolPredicate::Above(1024 * 1024))
///             .build(),
///     )
///     .registry(TreRegistry::with_builtins())
///     .build();
/// assert_eq!(options.heap.max_length(), 64 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Default, Builder)]
#[non_exhaustive]
pub struct ParseOptions {
    /// Payload placement
    #[builder(default)]
    pub heap: HeapStrategy,
    /// TRE layouts used to decode extension sections
    #[builder(default)]
    pub registry: TreRegistry,
}
