//! Asset classification seam.
//!
//! A lock that claims to hold a liquidity-pool token must be confirmed by an
//! [`AssetClassifier`]. The result is fixed on the record at creation.

use std::collections::HashMap;

use openvest_types::{Address, Classification, OpenvestError, Result};

/// Decides whether an asset is a pool token and over which pair.
pub trait AssetClassifier {
    /// # Errors
    /// Any error means the asset could not be classified.
    fn classify(&self, asset: &Address) -> Result<Classification>;
}

/// Classifier backed by a registry of known pools. Everything else is
/// [`Classification::Normal`].
#[derive(Debug, Clone, Default)]
pub struct StaticClassifier {
    pools: HashMap<Address, (Address, Address)>,
}

impl StaticClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pool(&mut self, pool: Address, token0: Address, token1: Address) {
        self.pools.insert(pool, (token0, token1));
    }
}

impl AssetClassifier for StaticClassifier {
    fn classify(&self, asset: &Address) -> Result<Classification> {
        Ok(match self.pools.get(asset) {
            Some(&(token0, token1)) => Classification::Pool { token0, token1 },
            None => Classification::Normal,
        })
    }
}

/// Classification of a new record.
///
/// Unflagged assets are `Normal` without consulting the classifier. Flagged
/// assets must classify as a pool.
///
/// # Errors
/// `NotAPoolToken` if a flagged asset is not a pool or classification fails.
pub fn resolve(
    classifier: &impl AssetClassifier,
    asset: Address,
    is_pool_token: bool,
) -> Result<Classification> {
    if !is_pool_token {
        return Ok(Classification::Normal);
    }
    match classifier.classify(&asset) {
        Ok(pool @ Classification::Pool { .. }) => Ok(pool),
        Ok(Classification::Normal) => Err(OpenvestError::NotAPoolToken(asset)),
        Err(err) => {
            tracing::warn!(asset = %asset, error = %err, "Pool classification failed");
            Err(OpenvestError::NotAPoolToken(asset))
        }
    }
}

#[cfg(test)]
mod tests {
    use openvest_types::fixtures::addr;

    use super::*;

    struct Broken;

    impl AssetClassifier for Broken {
        fn classify(&self, _asset: &Address) -> Result<Classification> {
            Err(OpenvestError::Configuration("no pool registry".into()))
        }
    }

    #[test]
    fn registered_pool_resolves() {
        let mut classifier = StaticClassifier::new();
        classifier.register_pool(addr(50), addr(1), addr(2));
        assert_eq!(
            resolve(&classifier, addr(50), true).unwrap(),
            Classification::Pool {
                token0: addr(1),
                token1: addr(2)
            }
        );
    }

    #[test]
    fn unflagged_asset_is_normal_even_if_pool() {
        let mut classifier = StaticClassifier::new();
        classifier.register_pool(addr(50), addr(1), addr(2));
        assert_eq!(
            resolve(&classifier, addr(50), false).unwrap(),
            Classification::Normal
        );
    }

    #[test]
    fn flagged_non_pool_is_rejected() {
        let classifier = StaticClassifier::new();
        assert_eq!(
            resolve(&classifier, addr(9), true).unwrap_err(),
            OpenvestError::NotAPoolToken(addr(9))
        );
        assert_eq!(
            resolve(&Broken, addr(9), true).unwrap_err(),
            OpenvestError::NotAPoolToken(addr(9))
        );
    }
}
