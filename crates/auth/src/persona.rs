//! Fixed persona catalog for the mock identity backend.
//!
//! One persona per role archetype. The catalog is built once per process and
//! never persisted; permissions come from the role templates in
//! [`crate::permissions`].

use std::sync::LazyLock;

use serde::Serialize;

use agriops_core::{CollectionPointId, DomainError, FactoryId, RegionId, SubjectId};

use crate::permissions::permissions_for_role;
use crate::{Identity, Role};

/// A pre-defined identity selectable on the mock login screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Persona {
    persona_id: &'static str,
    label: &'static str,
    identity: Identity,
}

impl Persona {
    pub fn persona_id(&self) -> &str {
        self.persona_id
    }

    pub fn label(&self) -> &str {
        self.label
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

struct PersonaSeed {
    persona_id: &'static str,
    label: &'static str,
    subject: &'static str,
    email: &'static str,
    display_name: &'static str,
    role: &'static str,
    factories: &'static [&'static str],
    collection_point: Option<&'static str>,
    regions: &'static [&'static str],
}

const SEEDS: &[PersonaSeed] = &[
    PersonaSeed {
        persona_id: "factory-manager",
        label: "Factory Manager",
        subject: "mock-factory-manager-001",
        email: "manager@kericho-factory.test",
        display_name: "Jane Chebet",
        role: "factory_manager",
        factories: &["KEN-FAC-001"],
        collection_point: None,
        regions: &[],
    },
    PersonaSeed {
        persona_id: "factory-owner",
        label: "Factory Owner",
        subject: "mock-factory-owner-001",
        email: "owner@kericho-factory.test",
        display_name: "Peter Kamau",
        role: "factory_owner",
        factories: &["KEN-FAC-001", "KEN-FAC-002"],
        collection_point: None,
        regions: &[],
    },
    PersonaSeed {
        persona_id: "platform-admin",
        label: "Platform Admin",
        subject: "mock-platform-admin-001",
        email: "admin@agriops.test",
        display_name: "Platform Administrator",
        role: "platform_admin",
        factories: &[],
        collection_point: None,
        regions: &[],
    },
    PersonaSeed {
        persona_id: "registration-clerk",
        label: "Registration Clerk",
        subject: "mock-registration-clerk-001",
        email: "clerk@kericho-factory.test",
        display_name: "Mary Wanjiku",
        role: "registration_clerk",
        factories: &["KEN-FAC-001"],
        collection_point: Some("KEN-CP-001"),
        regions: &[],
    },
    PersonaSeed {
        persona_id: "regulator",
        label: "Regulator",
        subject: "mock-regulator-001",
        email: "inspector@tea-board.test",
        display_name: "Samuel Otieno",
        role: "regulator",
        factories: &[],
        collection_point: None,
        regions: &["kericho-highland", "nandi-hills"],
    },
];

impl PersonaSeed {
    fn build(&self) -> Result<Persona, DomainError> {
        let factories = self
            .factories
            .iter()
            .map(|f| FactoryId::new(*f))
            .collect::<Result<Vec<_>, _>>()?;
        let regions = self
            .regions
            .iter()
            .map(|r| RegionId::new(*r))
            .collect::<Result<Vec<_>, _>>()?;
        let collection_point = self.collection_point.map(CollectionPointId::new).transpose()?;

        let role = Role::new(self.role);
        let identity = Identity::builder(SubjectId::new(self.subject)?, role.clone())
            .email(self.email)
            .display_name(self.display_name)
            .factory_ids(factories)
            .collection_point_id(collection_point)
            .region_ids(regions)
            .permissions(permissions_for_role(&role))
            .build();

        Ok(Persona {
            persona_id: self.persona_id,
            label: self.label,
            identity,
        })
    }
}

static BUILTIN: LazyLock<PersonaCatalog> = LazyLock::new(|| PersonaCatalog {
    // Seeds are compile-time literals; a seed that fails validation is skipped.
    personas: SEEDS.iter().filter_map(|seed| seed.build().ok()).collect(),
});

/// Read-only persona catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaCatalog {
    personas: Vec<Persona>,
}

impl PersonaCatalog {
    /// The process-wide catalog of role archetypes.
    pub fn builtin() -> &'static PersonaCatalog {
        &BUILTIN
    }

    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    pub fn get(&self, persona_id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.persona_id == persona_id)
    }
}
