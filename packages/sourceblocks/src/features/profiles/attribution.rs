//! Per-method profile attribution.
//!
//! For each interaction, pick the best available profile for a method:
//!
//! 1. the raw serialized string from the interaction's profile file
//!    (resolved name first; for accessors the content-hashed name, then the
//!    exact name), keeping the method-level coverage as error fallback;
//! 2. else a flat fallback synthesized from the method-level profile;
//! 3. else, under `always_inject`, an all-zero fallback;
//! 4. else nothing.

use crate::features::profiles::ports::{MethodProfiles, MethodTable};
use crate::features::profiles::reader::InteractionProfile;
use crate::shared::models::{ControlFlowGraph, MethodId, SbValue};
use tracing::trace;

/// One interaction's attribution for one method, consumed by the inserter.
#[derive(Debug, Clone, Copy)]
pub struct ProfileData<'a> {
    /// Raw serialized source-block value string, if the file had the method.
    pub raw: Option<&'a str>,
    /// Val applied when there is no raw string or it fails to parse.
    pub fallback: Option<SbValue>,
}

impl ProfileData<'_> {
    pub fn is_profiled(&self) -> bool {
        self.raw.is_some() || self.fallback.is_some()
    }
}

/// Attribute `method` across all interactions, in interaction-index order.
pub fn attribute<'a>(
    method: &MethodId,
    cfg: &ControlFlowGraph,
    profiles: &'a [InteractionProfile],
    method_profiles: &dyn MethodProfiles,
    table: &dyn MethodTable,
    always_inject: bool,
) -> Vec<ProfileData<'a>> {
    // Lazy: only accessors pay for the body hash.
    let mut body_hash: Option<u64> = None;

    profiles
        .iter()
        .map(|profile| {
            let mut raw = profile.lookup(method);
            if raw.is_none() && method.is_access_method() {
                if let Some(owner) = table.resolve_type(method.owner()) {
                    let hash = *body_hash.get_or_insert_with(|| cfg.body_hash());
                    raw = profile
                        .lookup_hashed_access(&owner, hash)
                        .or_else(|| profile.lookup_exact_access(&owner, method.name()));
                }
            }

            let stats = method_profiles.stats(&profile.interaction_id, method);
            let fallback = stats
                .map(|s| SbValue::new(1.0, s.appear_percent))
                .or(always_inject.then_some(SbValue::ZERO));

            trace!(
                method = %method,
                interaction = %profile.interaction_id,
                has_raw = raw.is_some(),
                has_fallback = fallback.is_some(),
                "attributed profile"
            );
            ProfileData { raw, fallback }
        })
        .collect()
}
