mod contain;
mod radius;

pub(crate) use contain::{resolve_containment, Assignment, ContainmentOutcome};
pub(crate) use radius::{resolve_radius, MembershipEntry, RadiusMembership};
