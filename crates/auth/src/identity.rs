use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use agriops_core::{CollectionPointId, FactoryId, RegionId, SubjectId};

use crate::{Permission, Role};

/// Identity of an authenticated principal.
///
/// An `Identity` is issued whole (by the token codec or the external identity
/// backend) and replaced whole on re-authentication. There are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    subject_id: SubjectId,
    email: String,
    display_name: String,
    primary_role: Role,
    factory_ids: BTreeSet<FactoryId>,
    collection_point_id: Option<CollectionPointId>,
    region_ids: BTreeSet<RegionId>,
    permissions: Vec<Permission>,
}

impl Identity {
    pub fn builder(subject_id: SubjectId, primary_role: Role) -> IdentityBuilder {
        IdentityBuilder {
            identity: Identity {
                subject_id,
                email: String::new(),
                display_name: String::new(),
                primary_role,
                factory_ids: BTreeSet::new(),
                collection_point_id: None,
                region_ids: BTreeSet::new(),
                permissions: Vec::new(),
            },
        }
    }

    pub fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn primary_role(&self) -> &Role {
        &self.primary_role
    }

    pub fn factory_ids(&self) -> &BTreeSet<FactoryId> {
        &self.factory_ids
    }

    pub fn collection_point_id(&self) -> Option<&CollectionPointId> {
        self.collection_point_id.as_ref()
    }

    pub fn region_ids(&self) -> &BTreeSet<RegionId> {
        &self.region_ids
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn has_wildcard(&self) -> bool {
        self.permissions.iter().any(Permission::is_wildcard)
    }
}

/// One-shot builder; `build` hands out the finished, immutable identity.
#[derive(Debug, Clone)]
pub struct IdentityBuilder {
    identity: Identity,
}

impl IdentityBuilder {
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.identity.email = email.into();
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.identity.display_name = name.into();
        self
    }

    pub fn factory_ids(mut self, ids: impl IntoIterator<Item = FactoryId>) -> Self {
        self.identity.factory_ids = ids.into_iter().collect();
        self
    }

    pub fn collection_point_id(mut self, id: Option<CollectionPointId>) -> Self {
        self.identity.collection_point_id = id;
        self
    }

    pub fn region_ids(mut self, ids: impl IntoIterator<Item = RegionId>) -> Self {
        self.identity.region_ids = ids.into_iter().collect();
        self
    }

    pub fn permissions(mut self, perms: impl IntoIterator<Item = Permission>) -> Self {
        self.identity.permissions = perms.into_iter().collect();
        self
    }

    pub fn build(self) -> Identity {
        self.identity
    }
}
