use crate::artifact::{Blueprints, CompetitorAnalysis, JourneyMap, Persona, Prd, Research};
use crate::timestamp::{self, iso8601};
use crate::types::{Epic, Product};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// The unit of persistence. Identical shape whichever store served it; only
/// `synced_to_firestore` tells the two apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    /// Denormalized copy of `product.name` for listings.
    pub name: String,
    /// Denormalized copy of `product.description`.
    #[serde(default)]
    pub description: String,
    pub product: Product,
    #[serde(default)]
    pub epics: Vec<Epic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prd: Option<Prd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprints: Option<Blueprints>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub research: Vec<Research>,
    #[serde(
        rename = "competitorAnalysis",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub competitor_analysis: Option<CompetitorAnalysis>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub personas: Vec<Persona>,
    #[serde(rename = "journeyMaps", default, skip_serializing_if = "Vec::is_empty")]
    pub journey_maps: Vec<JourneyMap>,
    #[serde(
        rename = "documentContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub document_content: Option<String>,
    #[serde(
        rename = "documentFileName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub document_file_name: Option<String>,
    /// Owner; only set on records held by the cloud store.
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso8601")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "syncedToFirestore", default)]
    pub synced_to_firestore: bool,
}

impl Project {
    /// Build a fresh, unsynced project from a draft.
    pub fn from_draft(id: impl Into<String>, draft: ProjectDraft) -> Self {
        let now = timestamp::now();
        Self {
            id: id.into(),
            name: draft.product.name.clone(),
            description: draft.product.description.clone(),
            product: draft.product,
            epics: draft.epics,
            prd: draft.prd,
            blueprints: draft.blueprints,
            research: draft.research,
            competitor_analysis: draft.competitor_analysis,
            personas: draft.personas,
            journey_maps: draft.journey_maps,
            document_content: draft.document_content,
            document_file_name: draft.document_file_name,
            user_id: None,
            archived: false,
            created_at: now,
            updated_at: now,
            synced_to_firestore: false,
        }
    }

    /// Replace everything a save carries while keeping `id` and `created_at`.
    pub fn overwrite_with(&mut self, draft: ProjectDraft) {
        let replacement = Project::from_draft(self.id.clone(), draft);
        let created_at = self.created_at;
        let previous = self.updated_at;
        *self = Project {
            created_at,
            updated_at: replacement.updated_at.max(previous),
            ..replacement
        };
    }

    /// Merge `patch` in and stamp `updated_at`.
    pub fn apply(&mut self, patch: ProjectPatch) {
        patch.apply_to(self);
        self.updated_at = timestamp::advance(self.updated_at);
    }

    pub fn story_count(&self) -> usize {
        crate::types::story_count(&self.epics)
    }
}

// ---------------------------------------------------------------------------
// ProjectDraft
// ---------------------------------------------------------------------------

/// Input to `save`: everything a new project carries except identity and
/// timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub product: Product,
    #[serde(default)]
    pub epics: Vec<Epic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prd: Option<Prd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprints: Option<Blueprints>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub research: Vec<Research>,
    #[serde(
        rename = "competitorAnalysis",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub competitor_analysis: Option<CompetitorAnalysis>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub personas: Vec<Persona>,
    #[serde(rename = "journeyMaps", default, skip_serializing_if = "Vec::is_empty")]
    pub journey_maps: Vec<JourneyMap>,
    #[serde(
        rename = "documentContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub document_content: Option<String>,
    #[serde(
        rename = "documentFileName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub document_file_name: Option<String>,
}

impl ProjectDraft {
    pub fn new(product: Product, epics: Vec<Epic>) -> Self {
        Self {
            product,
            epics,
            ..Self::default()
        }
    }

    /// Attach the source document the project was generated from.
    pub fn with_document(
        mut self,
        content: Option<String>,
        file_name: Option<String>,
    ) -> Self {
        self.document_content = content;
        self.document_file_name = file_name;
        self
    }
}

// ---------------------------------------------------------------------------
// ProjectPatch
// ---------------------------------------------------------------------------

/// Partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epics: Option<Vec<Epic>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prd: Option<Prd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprints: Option<Blueprints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research: Option<Vec<Research>>,
    #[serde(
        rename = "competitorAnalysis",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub competitor_analysis: Option<CompetitorAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personas: Option<Vec<Persona>>,
    #[serde(rename = "journeyMaps", default, skip_serializing_if = "Option::is_none")]
    pub journey_maps: Option<Vec<JourneyMap>>,
    #[serde(
        rename = "documentContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub document_content: Option<String>,
    #[serde(
        rename = "documentFileName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub document_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl ProjectPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn archived(archived: bool) -> Self {
        Self {
            archived: Some(archived),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fill `name`/`description` from `product` when the patch replaces the
    /// product without naming the project explicitly.
    pub fn normalized(mut self) -> Self {
        if let Some(product) = &self.product {
            if self.name.is_none() {
                self.name = Some(product.name.clone());
            }
            if self.description.is_none() {
                self.description = Some(product.description.clone());
            }
        }
        self
    }

    /// `normalized`, plus a bare `description` carried into a copy of
    /// `current.product` so the dedup key follows the visible description.
    pub fn resolved_against(self, current: &Project) -> Self {
        let mut patch = self.normalized();
        if patch.product.is_none() {
            if let Some(description) = &patch.description {
                patch.product = Some(Product {
                    description: description.clone(),
                    ..current.product.clone()
                });
            }
        }
        patch
    }

    fn apply_to(self, p: &mut Project) {
        let patch = self.resolved_against(p);
        if let Some(v) = patch.name {
            p.name = v;
        }
        if let Some(v) = patch.description {
            p.description = v;
        }
        if let Some(v) = patch.product {
            p.product = v;
        }
        if let Some(v) = patch.epics {
            p.epics = v;
        }
        if let Some(v) = patch.prd {
            p.prd = Some(v);
        }
        if let Some(v) = patch.blueprints {
            p.blueprints = Some(v);
        }
        if let Some(v) = patch.research {
            p.research = v;
        }
        if let Some(v) = patch.competitor_analysis {
            p.competitor_analysis = Some(v);
        }
        if let Some(v) = patch.personas {
            p.personas = v;
        }
        if let Some(v) = patch.journey_maps {
            p.journey_maps = v;
        }
        if let Some(v) = patch.document_content {
            p.document_content = Some(v);
        }
        if let Some(v) = patch.document_file_name {
            p.document_file_name = Some(v);
        }
        if let Some(v) = patch.archived {
            p.archived = v;
        }
    }
}

// ---------------------------------------------------------------------------
// Id minting
// ---------------------------------------------------------------------------

/// `proj_<unix millis>_<9 lowercase alphanumerics>`
pub fn mint_project_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("proj_{}_{}", Utc::now().timestamp_millis(), suffix)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserStory;

    fn draft(name: &str, description: &str) -> ProjectDraft {
        let mut epic = Epic::new("E1", "Onboarding");
        epic.user_stories.push(UserStory::new("US-1", "sign up"));
        ProjectDraft::new(Product::new(name, description), vec![epic])
    }

    #[test]
    fn from_draft_denormalizes_name() {
        let p = Project::from_draft("proj_1_abc", draft("Acme", "widgets"));
        assert_eq!(p.name, "Acme");
        assert_eq!(p.description, "widgets");
        assert_eq!(p.created_at, p.updated_at);
        assert!(!p.synced_to_firestore);
        assert_eq!(p.story_count(), 1);
    }

    #[test]
    fn patch_preserves_untouched_fields() {
        let mut p = Project::from_draft("proj_1_abc", draft("Acme", "widgets"));
        let before = p.clone();
        p.apply(ProjectPatch::name("X"));
        assert_eq!(p.name, "X");
        assert_eq!(p.product, before.product);
        assert_eq!(p.epics, before.epics);
        assert_eq!(p.id, before.id);
        assert_eq!(p.created_at, before.created_at);
        assert!(p.updated_at >= before.updated_at);
    }

    #[test]
    fn patch_with_product_rederives_name() {
        let mut p = Project::from_draft("proj_1_abc", draft("Acme", "widgets"));
        p.apply(ProjectPatch {
            product: Some(Product::new("Acme Pro", "better widgets")),
            ..ProjectPatch::default()
        });
        assert_eq!(p.name, "Acme Pro");
        assert_eq!(p.description, "better widgets");
    }

    #[test]
    fn description_patch_moves_product_description() {
        let mut p = Project::from_draft("proj_1_abc", draft("Acme", "widgets"));
        p.product.sector = Some("retail".into());
        p.apply(ProjectPatch {
            description: Some("gadgets".into()),
            ..ProjectPatch::default()
        });
        assert_eq!(p.description, "gadgets");
        assert_eq!(p.product.description, "gadgets");
        assert_eq!(p.product.name, "Acme");
        assert_eq!(p.product.sector.as_deref(), Some("retail"));
        assert_eq!(p.name, "Acme");
    }

    #[test]
    fn explicit_name_wins_over_product() {
        let patch = ProjectPatch {
            name: Some("Custom".into()),
            product: Some(Product::new("Acme Pro", "x")),
            ..ProjectPatch::default()
        }
        .normalized();
        assert_eq!(patch.name.as_deref(), Some("Custom"));
    }

    #[test]
    fn overwrite_keeps_identity() {
        let mut p = Project::from_draft("proj_1_abc", draft("A", "foo"));
        let created = p.created_at;
        p.overwrite_with(draft("B", "foo"));
        assert_eq!(p.id, "proj_1_abc");
        assert_eq!(p.name, "B");
        assert_eq!(p.created_at, created);
    }

    #[test]
    fn json_uses_wire_keys() {
        let mut p = Project::from_draft("proj_1_abc", draft("A", "foo"));
        p.document_content = Some("# Doc".into());
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["syncedToFirestore"], false);
        assert_eq!(v["documentContent"], "# Doc");
        assert!(v["created_at"].as_str().unwrap().ends_with('Z'));
        let back: Project = serde_json::from_value(v).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn minted_ids_are_valid_and_distinct() {
        let a = mint_project_id();
        let b = mint_project_id();
        assert!(a.starts_with("proj_"));
        assert_ne!(a, b);
        crate::paths::validate_id(&a).unwrap();
        assert_eq!(a.rsplit('_').next().unwrap().len(), 9);
    }

    #[test]
    fn empty_patch_detected() {
        assert!(ProjectPatch::default().is_empty());
        assert!(!ProjectPatch::archived(true).is_empty());
    }
}
