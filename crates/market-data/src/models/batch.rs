use std::collections::BTreeMap;

use serde::Serialize;

use super::quote::Quote;
use super::symbol::Symbol;
use crate::errors::ProviderError;

/// Merged outcome of a batch quote request.
///
/// Every requested symbol appears in exactly one of [`quotes`](Self::quotes)
/// or [`errors`](Self::errors). The recording methods keep that invariant by
/// moving a symbol out of the other map.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    quotes: BTreeMap<Symbol, Quote>,
    errors: BTreeMap<Symbol, ProviderError>,
    cached_count: usize,
    fresh_count: usize,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_cached(&mut self, symbol: Symbol, quote: Quote) {
        self.errors.remove(&symbol);
        if self.quotes.insert(symbol, quote).is_none() {
            self.cached_count += 1;
        }
    }

    pub(crate) fn record_fresh(&mut self, symbol: Symbol, quote: Quote) {
        self.errors.remove(&symbol);
        if self.quotes.insert(symbol, quote).is_none() {
            self.fresh_count += 1;
        }
    }

    pub(crate) fn record_error(&mut self, symbol: Symbol, error: ProviderError) {
        if self.quotes.contains_key(&symbol) {
            return;
        }
        self.errors.insert(symbol, error);
    }

    pub fn quotes(&self) -> &BTreeMap<Symbol, Quote> {
        &self.quotes
    }

    pub fn errors(&self) -> &BTreeMap<Symbol, ProviderError> {
        &self.errors
    }

    pub fn quote(&self, symbol: &str) -> Option<&Quote> {
        self.quotes.get(symbol)
    }

    pub fn error(&self, symbol: &str) -> Option<&ProviderError> {
        self.errors.get(symbol)
    }

    /// Symbols served from the cache without a provider call.
    pub fn cached_count(&self) -> usize {
        self.cached_count
    }

    /// Symbols fetched from a provider during this call.
    pub fn fresh_count(&self) -> usize {
        self.fresh_count
    }

    /// Number of symbols settled (quotes plus errors).
    pub fn len(&self) -> usize {
        self.quotes.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_parts(self) -> (BTreeMap<Symbol, Quote>, BTreeMap<Symbol, ProviderError>) {
        (self.quotes, self.errors)
    }
}
