/// Classification of a provider failure.
///
/// Every failure moves the fallback chain on to the next provider; the class
/// decides the side effects and which error is surfaced once the chain is
/// exhausted.
///
/// | Class | Record Circuit Breaker Failure? | Surfaced over the other class? |
/// |-------|--------------------------------|--------------------------------|
/// | `Transient` | Yes | No |
/// | `SymbolSpecific` | No | Yes |
///
/// The derived ordering ranks `SymbolSpecific` above `Transient`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum FailureClass {
    /// Throttling, timeouts and transport failures.
    ///
    /// Says something about the provider's health, nothing about the symbol.
    /// Recorded in the circuit breaker so a provider that keeps failing is
    /// temporarily left out of the chain.
    Transient,

    /// The provider answered but has no usable data for this symbol
    /// (not found, malformed or implausible payload).
    ///
    /// Providers disagree on symbol coverage, so the next provider is still
    /// tried, without penalizing this one.
    SymbolSpecific,
}

impl FailureClass {
    /// Whether a failure of this class counts against the provider's health.
    pub fn penalizes_provider(self) -> bool {
        matches!(self, Self::Transient)
    }
}
