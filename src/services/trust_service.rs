use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::MySqlPool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

use super::audit::{self, AuditTable};
use super::{ServiceError, ServiceResult};
use crate::database::models::school::{ClassRow, School, Section};
use crate::database::models::trust::Trust;
use crate::database::{is_unique_violation, run_migrations, ConnectionManager, MigrationScope};
use crate::repositories::school::{self as school_repo, NewSchool};
use crate::repositories::trust::{self as trust_repo, NewTrust, TrustChanges};
use crate::tenant::TrustContextResolver;
use crate::validation::{is_academic_year, is_code, is_slug, FieldErrors, Validate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTrustRequest {
    pub trust_name: String,
    pub trust_code: String,
    pub subdomain: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
}

impl Validate for CreateTrustRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if errors.required("trust_name", &self.trust_name) {
            errors.length("trust_name", &self.trust_name, 3, 200);
        }
        if errors.required("trust_code", &self.trust_code) {
            errors.length("trust_code", &self.trust_code, 2, 20);
            if !is_code(self.trust_code.trim()) {
                errors.add("trust_code", "must contain only uppercase letters, digits and underscores");
            }
        }
        if errors.required("subdomain", &self.subdomain) {
            errors.length("subdomain", &self.subdomain, 3, 63);
            if !is_slug(self.subdomain.trim()) {
                errors.add("subdomain", "must contain only lowercase letters, digits and hyphens");
            }
        }
        if errors.required("contact_email", &self.contact_email) {
            errors.email("contact_email", &self.contact_email);
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTrustRequest {
    pub trust_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

impl Validate for UpdateTrustRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.trust_name {
            errors.length("trust_name", name, 3, 200);
        }
        if let Some(email) = &self.contact_email {
            errors.email("contact_email", email);
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSpec {
    pub class_name: String,
    #[serde(default)]
    pub sections: Vec<String>,
}

impl ClassSpec {
    /// Trimmed section names; a class listed without sections gets "A".
    pub fn section_names(&self) -> Vec<&str> {
        if self.sections.is_empty() {
            vec!["A"]
        } else {
            self.sections.iter().map(|s| s.trim()).collect()
        }
    }
}

/// Class and section names must be present, fit their columns, and be
/// unique ignoring case (classes within the school, sections within a class).
pub fn validate_classes(classes: &[ClassSpec]) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let mut class_names = HashSet::new();
    for (i, class) in classes.iter().enumerate() {
        let field = format!("classes[{}].class_name", i);
        if errors.required(&field, &class.class_name) {
            errors.length(&field, &class.class_name, 1, 50);
            if !class_names.insert(class.class_name.trim().to_lowercase()) {
                errors.add(field, "is listed more than once");
            }
        }

        let mut section_names = HashSet::new();
        for (j, section) in class.sections.iter().enumerate() {
            let field = format!("classes[{}].sections[{}]", i, j);
            if errors.required(&field, section) {
                errors.length(&field, section, 1, 10);
                if !section_names.insert(section.trim().to_lowercase()) {
                    errors.add(field, "is listed more than once");
                }
            }
        }
    }
    errors
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSchoolRequest {
    pub school_name: String,
    pub school_code: String,
    pub board: Option<String>,
    pub address: Option<String>,
    pub academic_year: String,
    #[serde(default)]
    pub classes: Vec<ClassSpec>,
}

impl Validate for CreateSchoolRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if errors.required("school_name", &self.school_name) {
            errors.length("school_name", &self.school_name, 3, 200);
        }
        if errors.required("school_code", &self.school_code) && !is_code(self.school_code.trim()) {
            errors.add("school_code", "must contain only uppercase letters, digits and underscores");
        }
        if !is_academic_year(&self.academic_year) {
            errors.add("academic_year", "must look like 2025-2026");
        }
        errors.merge("", validate_classes(&self.classes));
        errors.into_result()
    }
}

#[derive(Debug, Serialize)]
pub struct ClassWithSections {
    #[serde(flatten)]
    pub class: ClassRow,
    pub sections: Vec<Section>,
}

/// Trust registry and tenant provisioning against the master database.
pub struct TrustService {
    connections: Arc<ConnectionManager>,
    contexts: Arc<TrustContextResolver>,
}

impl TrustService {
    pub fn new(connections: Arc<ConnectionManager>, contexts: Arc<TrustContextResolver>) -> Self {
        Self { connections, contexts }
    }

    async fn master(&self) -> ServiceResult<Arc<MySqlPool>> {
        Ok(self.connections.master().await?)
    }

    /// Register a trust, create its schema and bring the schema up to date.
    /// A duplicate code or subdomain is rejected before any row is written.
    pub async fn create_trust(&self, request: CreateTrustRequest, actor: Option<i64>) -> ServiceResult<Trust> {
        request.validate()?;
        let master = self.master().await?;

        let trust_code = request.trust_code.trim().to_ascii_uppercase();
        let subdomain = request.subdomain.trim().to_ascii_lowercase();

        let (code_taken, subdomain_taken) = trust_repo::find_conflicts(&master, &trust_code, &subdomain).await?;
        if code_taken {
            return Err(ServiceError::already_exists(format!("Trust code '{}' already exists", trust_code)));
        }
        if subdomain_taken {
            return Err(ServiceError::already_exists(format!("Subdomain '{}' already exists", subdomain)));
        }

        let new_trust = NewTrust {
            trust_name: request.trust_name.trim(),
            trust_code: &trust_code,
            subdomain: &subdomain,
            contact_email: request.contact_email.trim(),
            contact_phone: request.contact_phone.as_deref(),
            address: request.address.as_deref(),
        };
        let trust_id = match trust_repo::insert(&master, &new_trust).await {
            Ok(id) => id,
            // Lost a race with a concurrent create
            Err(e) if is_unique_violation(&e) => {
                return Err(ServiceError::already_exists("Trust code or subdomain already exists"));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.provision_schema(trust_id, &trust_code).await {
            error!("Provisioning trust {} failed, removing registry row: {}", trust_id, e);
            self.connections.evict_trust(trust_id).await;
            trust_repo::delete(&master, trust_id).await?;
            return Err(e);
        }

        audit::record(
            &master,
            AuditTable::System,
            actor,
            "CREATE",
            "trust",
            Some(trust_id),
            Some(json!({ "trust_code": trust_code, "subdomain": subdomain })),
        )
        .await;
        info!("Created trust {} ({}) as '{}'", trust_id, trust_code, subdomain);

        self.get_trust(trust_id).await
    }

    async fn provision_schema(&self, trust_id: i64, trust_code: &str) -> ServiceResult<()> {
        let schema = self.connections.create_trust_schema(trust_code).await?;
        let trust = self.connections.trust(trust_id).await?;
        let applied = run_migrations(&trust.conn, MigrationScope::Trust)
            .await
            .map_err(crate::database::DatabaseError::from)?;
        info!("Schema {} ready ({} migrations applied)", schema, applied.len());
        Ok(())
    }

    pub async fn list_trusts(&self) -> ServiceResult<Vec<Trust>> {
        let master = self.master().await?;
        Ok(trust_repo::list(&master).await?)
    }

    pub async fn get_trust(&self, trust_id: i64) -> ServiceResult<Trust> {
        let master = self.master().await?;
        trust_repo::find_by_id(&master, trust_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Trust"))
    }

    /// Deactivating a trust drops its cached connection and context so the
    /// next request re-checks the registry.
    pub async fn update_trust(&self, trust_id: i64, request: UpdateTrustRequest, actor: Option<i64>) -> ServiceResult<Trust> {
        request.validate()?;
        let existing = self.get_trust(trust_id).await?;
        let master = self.master().await?;

        let changes = TrustChanges {
            trust_name: request.trust_name.map(|s| s.trim().to_string()),
            contact_email: request.contact_email.map(|s| s.trim().to_string()),
            contact_phone: request.contact_phone,
            address: request.address,
            is_active: request.is_active,
        };
        trust_repo::update(&master, trust_id, &changes).await?;

        if request.is_active == Some(false) {
            self.connections.evict_trust(trust_id).await;
            info!("Trust {} deactivated", trust_id);
        }
        self.contexts.clear(Some(&existing.subdomain)).await;

        audit::record(
            &master,
            AuditTable::System,
            actor,
            "UPDATE",
            "trust",
            Some(trust_id),
            Some(json!({ "is_active": request.is_active })),
        )
        .await;

        self.get_trust(trust_id).await
    }

    /// Upsert trust-scoped `system_config` keys in one transaction.
    pub async fn set_config(&self, trust_id: i64, entries: Map<String, Value>) -> ServiceResult<usize> {
        if entries.is_empty() {
            return Err(ServiceError::invalid_field("config", "must contain at least one key"));
        }
        if let Some(key) = entries.keys().find(|k| k.trim().is_empty() || k.len() > 100) {
            return Err(ServiceError::invalid_field("config", format!("invalid key '{}'", key)));
        }

        let trust = self.get_trust(trust_id).await?;
        let master = self.master().await?;

        let mut tx = master.begin().await?;
        for (key, value) in &entries {
            trust_repo::upsert_config(&mut *tx, trust_id, key, &config_value_text(value)).await?;
        }
        tx.commit().await?;

        self.contexts.clear(Some(&trust.subdomain)).await;
        Ok(entries.len())
    }

    /// Re-run trust-schema migrations for one trust.
    pub async fn migrate_trust(&self, trust_id: i64) -> ServiceResult<Vec<&'static str>> {
        let trust = self.connections.trust(trust_id).await?;
        let applied = run_migrations(&trust.conn, MigrationScope::Trust)
            .await
            .map_err(crate::database::DatabaseError::from)?;
        Ok(applied)
    }

    /// Create a school with its classes and sections inside a trust schema.
    pub async fn create_school(&self, trust_id: i64, request: CreateSchoolRequest) -> ServiceResult<School> {
        request.validate()?;
        let trust = self.connections.trust(trust_id).await?;
        let pool = trust.conn.as_ref();

        let school = NewSchool {
            school_name: request.school_name.trim(),
            school_code: request.school_code.trim(),
            board: request.board.as_deref(),
            address: request.address.as_deref(),
            academic_year: &request.academic_year,
        };
        let mut tx = pool.begin().await?;
        let school_id = match school_repo::insert_school(&mut *tx, &school).await {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => {
                return Err(ServiceError::already_exists(format!(
                    "School code '{}' already exists",
                    request.school_code.trim()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        for (order, class) in request.classes.iter().enumerate() {
            let class_id = school_repo::insert_class(&mut *tx, school_id, class.class_name.trim(), order as i32 + 1).await?;
            for section in class.section_names() {
                school_repo::insert_section(&mut *tx, class_id, section).await?;
            }
        }
        tx.commit().await?;

        info!("Created school {} in trust {} with {} classes", school_id, trust_id, request.classes.len());
        school_repo::find_school(pool, school_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("School"))
    }

    pub async fn list_schools(&self, trust_id: i64) -> ServiceResult<Vec<School>> {
        let trust = self.connections.trust(trust_id).await?;
        Ok(school_repo::list_schools(&trust.conn).await?)
    }

    /// Classes of one school in display order, each with its sections.
    pub async fn list_classes(&self, trust_id: i64, school_id: i64) -> ServiceResult<Vec<ClassWithSections>> {
        let trust = self.connections.trust(trust_id).await?;
        let pool = trust.conn.as_ref();
        school_repo::find_school(pool, school_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("School"))?;

        let mut classes = Vec::new();
        for class in school_repo::list_classes(pool, school_id).await? {
            let sections = school_repo::list_sections(pool, class.id).await?;
            classes.push(ClassWithSections { class, sections });
        }
        Ok(classes)
    }
}

/// Strings are stored raw; everything else as JSON text.
pub fn config_value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateTrustRequest {
        CreateTrustRequest {
            trust_name: "Green Valley Trust".into(),
            trust_code: "GVT".into(),
            subdomain: "greenvalley".into(),
            contact_email: "office@gvt.edu".into(),
            contact_phone: None,
            address: None,
        }
    }

    #[test]
    fn valid_trust_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn trust_request_reports_each_bad_field() {
        let mut bad = request();
        bad.trust_code = "gv t".into();
        bad.subdomain = "Green_Valley".into();
        bad.contact_email = "office".into();
        let errors = bad.validate().unwrap_err();
        assert!(errors.contains("trust_code"));
        assert!(errors.contains("subdomain"));
        assert!(errors.contains("contact_email"));
        assert!(!errors.contains("trust_name"));
    }

    #[test]
    fn school_request_checks_academic_year_and_classes() {
        let school = CreateSchoolRequest {
            school_name: "Green Valley Public School".into(),
            school_code: "GVPS".into(),
            board: Some("CBSE".into()),
            address: None,
            academic_year: "2025-2027".into(),
            classes: vec![ClassSpec {
                class_name: " ".into(),
                sections: vec![],
            }],
        };
        let errors = school.validate().unwrap_err();
        assert!(errors.contains("academic_year"));
        assert!(errors.contains("classes[0].class_name"));
    }

    #[test]
    fn duplicate_class_or_section_names_rejected() {
        let class = |name: &str, sections: &[&str]| ClassSpec {
            class_name: name.into(),
            sections: sections.iter().map(|s| s.to_string()).collect(),
        };
        let errors = validate_classes(&[class("Grade 1", &["A", " a "]), class("grade 1 ", &[]), class("Grade 2", &["A"])]);

        assert!(errors.contains("classes[0].sections[1]"));
        assert!(errors.contains("classes[1].class_name"));
        assert!(!errors.contains("classes[0].class_name"));
        assert!(!errors.contains("classes[2].sections[0]"));
    }

    #[test]
    fn section_names_must_fit() {
        let errors = validate_classes(&[ClassSpec {
            class_name: "Grade 1".into(),
            sections: vec!["".into(), "Section-Eleven".into()],
        }]);
        assert!(errors.contains("classes[0].sections[0]"));
        assert!(errors.contains("classes[0].sections[1]"));
    }

    #[test]
    fn class_without_sections_gets_default() {
        let spec = ClassSpec {
            class_name: "Grade 1".into(),
            sections: vec![],
        };
        assert_eq!(spec.section_names(), vec!["A"]);
    }

    #[test]
    fn config_values_keep_strings_raw() {
        assert_eq!(config_value_text(&json!("https://cdn/logo.png")), "https://cdn/logo.png");
        assert_eq!(config_value_text(&json!({"primary": "#0a0"})), r##"{"primary":"#0a0"}"##);
        assert_eq!(config_value_text(&json!(25)), "25");
    }
}
