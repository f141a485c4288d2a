//! agevec-vectors: the catalog of named test vectors
//!
//! Each vector is a plain function that drives a [`VectorBuilder`] session
//! from an empty container to a finished one. Families live in their own
//! modules; [`catalog`] collects them in name order.

use anyhow::Context;

use agevec_core::Vector;
use agevec_kit::{Fixtures, VectorBuilder};

mod armor;
mod header;
mod scrypt;
mod stanza;
mod stream;
mod x25519;

/// Builds one vector from the session fixtures.
pub type BuildFn = fn(&Fixtures) -> anyhow::Result<VectorBuilder>;

#[derive(Clone, Copy)]
pub struct Definition {
    pub name: &'static str,
    build: BuildFn,
}

impl std::fmt::Debug for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Definition").field("name", &self.name).finish()
    }
}

impl Definition {
    pub const fn new(name: &'static str, build: BuildFn) -> Self {
        Self { name, build }
    }

    /// Run the builder session and close it into a [`Vector`].
    pub fn build(&self, fixtures: &Fixtures) -> anyhow::Result<Vector> {
        tracing::debug!(vector = self.name, "building");
        let builder = (self.build)(fixtures).with_context(|| format!("building {}", self.name))?;
        builder.finish(self.name)
    }
}

/// Every vector definition, sorted by name.
pub fn catalog() -> Vec<Definition> {
    let mut all: Vec<Definition> = [
        armor::VECTORS,
        header::VECTORS,
        scrypt::VECTORS,
        stanza::VECTORS,
        stream::VECTORS,
        x25519::VECTORS,
    ]
    .concat();
    all.sort_by_key(|d| d.name);
    all
}

pub fn find(name: &str) -> Option<Definition> {
    catalog().into_iter().find(|d| d.name == name)
}

/// Definitions whose name contains `filter` (all of them for `None`).
pub fn matching(filter: Option<&str>) -> Vec<Definition> {
    catalog()
        .into_iter()
        .filter(|d| filter.map_or(true, |f| d.name.contains(f)))
        .collect()
}

/// Plaintext of the single-chunk success vectors.
pub(crate) const PAYLOAD: &[u8] = b"age";

/// Version line, one recorded X25519 stanza for the fixture identity, MAC.
pub(crate) fn standard_header(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.x25519(&fx.identity)?;
    f.hmac()?;
    Ok(f)
}

/// A different identity, drawn from the session's byte source.
pub(crate) fn other_identity(f: &mut VectorBuilder) -> anyhow::Result<[u8; 32]> {
    agevec_kit::keys::array32(&f.rand(32), "identity")
}
