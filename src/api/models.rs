//! Wire types for the relationship-database backend.
//!
//! Field names match the backend JSON (snake_case) so the structs derive
//! serde without per-field renames.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrgKind {
    #[default]
    Company,
    Group,
    Division,
}

impl OrgKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgKind::Company => "company",
            OrgKind::Group => "group",
            OrgKind::Division => "division",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "company" => Some(OrgKind::Company),
            "group" => Some(OrgKind::Group),
            "division" => Some(OrgKind::Division),
            _ => None,
        }
    }

    /// Groups aggregate for display labels only; they never nest children.
    pub fn is_aggregator(&self) -> bool {
        matches!(self, OrgKind::Group)
    }
}

/// One organization record as returned by the list endpoint.
///
/// `parent_id` may reference another org (nesting) or a group (label
/// annotation); the tree builder sorts that out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrgRecord {
    pub id: String,
    pub name: String,
    pub kind: OrgKind,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl OrgRecord {
    /// Fields the tree filter matches against.
    pub fn searchable_fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.short_name.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company_id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Phone,
    Email,
    Location,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::Phone => "phone",
            ContactKind::Email => "email",
            ContactKind::Location => "location",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "phone" => Some(ContactKind::Phone),
            "email" => Some(ContactKind::Email),
            "location" => Some(ContactKind::Location),
            _ => None,
        }
    }

    /// REST collection segment for this kind.
    pub fn resource(&self) -> &'static str {
        match self {
            ContactKind::Phone => "phones",
            ContactKind::Email => "emails",
            ContactKind::Location => "locations",
        }
    }
}

/// A contact method (phone number, email address, or physical location).
///
/// The detail endpoint embeds the many-to-many links under `associations`;
/// the list endpoint omits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: i64,
    pub kind: ContactKind,
    pub value: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub associations: Vec<AssociationLink>,
}

/// One many-to-many link between a contact method and a company and/or
/// person, optionally tagged with department categories.
///
/// `association_id` is present only once the link is persisted; links added
/// in an edit session don't have one yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AssociationLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departments: Option<Vec<String>>,
}

impl AssociationLink {
    /// Human-readable identity, used in logs and failure reports.
    pub fn key_display(&self) -> String {
        let company = self
            .company_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        let person = self.person_id.map(|id| id.to_string()).unwrap_or_default();
        format!("{}-{}", company, person)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub entity_kind: String,
    pub entity_id: String,
    pub action: String,
    #[serde(default)]
    pub actor: Option<String>,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_record_decodes_backend_json() {
        let json = r#"{
            "id": "42",
            "name": "Acme Robotics",
            "kind": "company",
            "parent_id": "7",
            "short_name": "Acme",
            "industry": "manufacturing"
        }"#;
        let rec: OrgRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.kind, OrgKind::Company);
        assert_eq!(rec.parent_id.as_deref(), Some("7"));
        assert_eq!(rec.city, None);
        let fields: Vec<&str> = rec.searchable_fields().collect();
        assert_eq!(fields, vec!["Acme Robotics", "Acme"]);
    }

    #[test]
    fn test_association_link_omits_absent_fields() {
        let link = AssociationLink {
            company_id: Some(5),
            ..Default::default()
        };
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json, serde_json::json!({"company_id": 5}));
    }

    #[test]
    fn test_contact_detail_embeds_associations() {
        let json = r#"{
            "id": 12,
            "kind": "phone",
            "value": "+372 555 0100",
            "associations": [
                {"association_id": 1, "company_id": 5, "departments": ["HR"]}
            ]
        }"#;
        let contact: ContactRecord = serde_json::from_str(json).unwrap();
        assert_eq!(contact.kind, ContactKind::Phone);
        assert_eq!(contact.associations.len(), 1);
        assert_eq!(contact.associations[0].key_display(), "5-");
    }

    #[test]
    fn test_kind_round_trips() {
        for kind in [OrgKind::Company, OrgKind::Group, OrgKind::Division] {
            assert_eq!(OrgKind::from_str(kind.as_str()), Some(kind));
        }
        for kind in [ContactKind::Phone, ContactKind::Email, ContactKind::Location] {
            assert_eq!(ContactKind::from_str(kind.as_str()), Some(kind));
        }
    }
}
