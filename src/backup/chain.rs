//! Selection of hard-link bases (`--link-dest`) for the next transfer.

use super::catalog::Catalog;
use super::instant::Instant;

/// The `k` most recent snapshots, newest first.
///
/// Returns everything when the catalog holds fewer than `k` entries and an
/// empty chain for an empty catalog, which means a full transfer with no
/// hard-link hints. Identical instants are both kept.
#[must_use]
pub fn select(catalog: &Catalog, k: usize) -> Vec<Instant> {
    let mut chain = catalog.sorted_desc();
    chain.truncate(k);
    chain
}
