//! Product ordering driven by the answer prose.
//!
//! A product the assistant names early in its answer is shown first.
//! Products that are not named fall back to the search service's own rank,
//! then to their numeric id and finally the id text, so the order is total
//! and deterministic.

use shopchat_core::ProductRef;

/// Rank used for products the service did not rank.
const UNRANKED: i64 = i64::MAX;

/// Match index used for products whose title is not found.
const UNMATCHED: usize = usize::MAX;

// =============================================================================
// Matching
// =============================================================================

/// Locates a product title inside answer text.
///
/// Implementations only decide *where* a title is mentioned; tie-breaking
/// is owned by [`ProductRanker`].
pub trait TitleMatcher {
    /// Position of the first mention of `title` in `answer`, if any.
    fn locate(&self, answer: &str, title: &str) -> Option<usize>;
}

/// Case-insensitive substring search.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl TitleMatcher for SubstringMatcher {
    fn locate(&self, answer: &str, title: &str) -> Option<usize> {
        let title = title.to_lowercase();
        if title.is_empty() {
            return None;
        }
        answer.to_lowercase().find(&title)
    }
}

// =============================================================================
// ProductRanker
// =============================================================================

/// Orders candidate products for display under a bot answer.
#[derive(Debug, Clone, Default)]
pub struct ProductRanker<M = SubstringMatcher> {
    matcher: M,
}

impl ProductRanker<SubstringMatcher> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M: TitleMatcher> ProductRanker<M> {
    /// Use a different title matcher with the same tie-break rules.
    pub fn with_matcher(matcher: M) -> Self {
        Self { matcher }
    }

    /// Return the products in display order. The input slice is untouched.
    ///
    /// Keys, in order: match index in `answer` (unmatched last), service
    /// rank (unranked last), numeric product id, product id text.
    pub fn order(&self, products: &[ProductRef], answer: &str) -> Vec<ProductRef> {
        let mut ordered = products.to_vec();
        ordered.sort_by_cached_key(|product| {
            (
                self.matcher
                    .locate(answer, &product.title)
                    .unwrap_or(UNMATCHED),
                product.rank.unwrap_or(UNRANKED),
                product.id.numeric_key(),
                product.id.as_str().to_owned(),
            )
        });
        ordered
    }
}

/// Order products with the default substring matcher.
pub fn order_products(products: &[ProductRef], answer: &str) -> Vec<ProductRef> {
    ProductRanker::new().order(products, answer)
}
