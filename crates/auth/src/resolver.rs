//! Effective-permission resolution.

use std::collections::{BTreeSet, HashSet};

use tracing::instrument;

use gatehouse_core::{DomainResult, PrincipalId, Slug};

use crate::grants::GrantSource;

/// The set of slugs a principal effectively holds:
/// direct grants ∪ grants of every role it is a member of.
///
/// Derived on demand and never cached across requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveSlugs(HashSet<Slug>);

impl EffectiveSlugs {
    pub fn from_grants<D, R>(direct: D, roles: R) -> Self
    where
        D: IntoIterator<Item = Slug>,
        R: IntoIterator<Item = (Slug, BTreeSet<Slug>)>,
    {
        let mut slugs: HashSet<Slug> = direct.into_iter().collect();
        for (_role, granted) in roles {
            slugs.extend(granted);
        }
        Self(slugs)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.0.contains(slug)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slug> {
        self.0.iter()
    }

    /// Entries of `wanted` not held, in input order and without repeats.
    pub fn missing(&self, wanted: &[Slug]) -> Vec<Slug> {
        let mut seen = HashSet::new();
        wanted
            .iter()
            .filter(|s| !self.contains(s.as_str()))
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect()
    }

    pub fn into_sorted_vec(self) -> Vec<Slug> {
        let mut v: Vec<Slug> = self.0.into_iter().collect();
        v.sort();
        v
    }
}

/// Compute the effective slug set for `principal` from current storage state.
#[instrument(skip(source), fields(principal = %principal), err)]
pub async fn resolve_effective_slugs<S>(source: &S, principal: PrincipalId) -> DomainResult<EffectiveSlugs>
where
    S: GrantSource + ?Sized,
{
    let direct = source.fetch_direct_permission_slugs(principal).await?;
    let roles = source.fetch_role_slugs_and_their_permissions(principal).await?;
    let role_count = roles.len();

    let effective = EffectiveSlugs::from_grants(direct, roles);
    tracing::trace!(roles = role_count, slugs = effective.len(), "resolved effective permissions");
    Ok(effective)
}
